//! Runtime interception hooks
//!
//! Patches the page's navigation primitives and installs the capture-phase
//! listeners. Every hook asks the session's [`Interceptor`](st_core::Interceptor)
//! what to do and only applies the answer; none of them throws into the page.

use std::rc::Rc;

use js_sys::{Array, Function, Object, Reflect};
use st_core::interceptor::PointerKind;
use st_core::url::resolve;
use st_core::{ClickOutcome, FallbackTicket, Host, OpenOutcome, WindowHandle};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, Event, EventTarget, HtmlElement, MouseEvent, Node};

use crate::session::Session;

#[wasm_bindgen(inline_js = r#"
export function wrapListenerRegistration(add, remove, hook) {
    const wrappers = new WeakMap();
    const wrap = (listener) => {
        let wrapped = wrappers.get(listener);
        if (!wrapped) {
            wrapped = function (event) {
                try {
                    return listener.apply(this, arguments);
                } finally {
                    hook(this, event);
                }
            };
            wrappers.set(listener, wrapped);
        }
        return wrapped;
    };
    return [
        function (type, listener, options) {
            if (type === 'click' && typeof listener === 'function' && this instanceof HTMLAnchorElement) {
                return add.call(this, type, wrap(listener), options);
            }
            return add.call(this, type, listener, options);
        },
        function (type, listener, options) {
            const wrapped = typeof listener === 'function' ? wrappers.get(listener) : undefined;
            return remove.call(this, type, wrapped || listener, options);
        },
    ];
}
"#)]
extern "C" {
    /// `[add, remove]` replacements that run `hook(anchor, event)` after every
    /// click listener registered on an anchor.
    #[wasm_bindgen(js_name = wrapListenerRegistration, catch)]
    fn wrap_listener_registration(add: &JsValue, remove: &JsValue, hook: &JsValue) -> Result<Array, JsValue>;
}

/// Install every hook. A hook that fails to install is logged and skipped;
/// the others still go in.
pub fn install(session: &Rc<Session>) {
    if let Err(err) = install_window_open(session) {
        log::warn!("window.open not hooked: {:?}", err);
    }
    if let Err(err) = install_capture_listeners(session) {
        log::warn!("capture listeners not installed: {:?}", err);
    }
    if let Err(err) = install_listener_wrapper(session) {
        log::warn!("addEventListener not wrapped: {:?}", err);
    }
}

/// String form of a navigation argument (strings and `URL` objects).
fn url_argument(value: &JsValue) -> Option<String> {
    if let Some(url) = value.as_string() {
        return Some(url);
    }
    if value.is_undefined() || value.is_null() {
        return None;
    }
    value.dyn_ref::<Object>().map(|object| String::from(object.to_string()))
}

/// Element an event is about; text-node targets map to their parent.
fn event_element(event: &Event) -> Option<Element> {
    let target = event.target()?;
    match target.dyn_into::<Element>() {
        Ok(element) => Some(element),
        Err(other) => other.dyn_into::<Node>().ok()?.parent_element(),
    }
}

fn suppress(event: &Event) {
    event.prevent_default();
    event.stop_immediate_propagation();
}

// =============================================================================
// window.open
// =============================================================================

/// Functions shared by every stub window handle.
struct StubParts {
    noop: Function,
    assign: Function,
}

impl StubParts {
    fn new(session: &Rc<Session>) -> Self {
        let noop = Closure::wrap(Box::new(|| {}) as Box<dyn FnMut()>);
        let owner = Rc::clone(session);
        let assign = Closure::wrap(Box::new(move |url: JsValue| {
            let Some(url) = url_argument(&url) else {
                return;
            };
            let host = owner.interceptor.host();
            let target = resolve(&host.current_url(), &url);
            if owner.interceptor.is_active() {
                owner.interceptor.note_navigation();
                host.navigate(&target);
            }
        }) as Box<dyn FnMut(JsValue)>);

        let parts = Self {
            noop: noop.as_ref().unchecked_ref::<Function>().clone(),
            assign: assign.as_ref().unchecked_ref::<Function>().clone(),
        };
        noop.forget();
        assign.forget();
        parts
    }

    /// Object standing in for the window `window.open` would have returned.
    fn build(&self, handle: &WindowHandle) -> Result<JsValue, JsValue> {
        let location = Object::new();
        Reflect::set(&location, &"href".into(), &JsValue::from_str(&handle.href))?;
        Reflect::set(&location, &"assign".into(), &self.assign)?;
        Reflect::set(&location, &"replace".into(), &self.assign)?;

        let stub = Object::new();
        for method in ["focus", "blur", "close"] {
            Reflect::set(&stub, &method.into(), &self.noop)?;
        }
        Reflect::set(&stub, &"closed".into(), &JsValue::from_bool(handle.closed))?;
        Reflect::set(&stub, &"location".into(), &location)?;
        Ok(stub.into())
    }
}

fn install_window_open(session: &Rc<Session>) -> Result<(), JsValue> {
    let window = session.window.clone();
    let original: Function = Reflect::get(&window, &"open".into())?.dyn_into()?;
    let parts = StubParts::new(session);
    let owner = Rc::clone(session);

    let replacement = Closure::wrap(Box::new(move |url: JsValue, target: JsValue, features: JsValue| -> JsValue {
        let raw = url_argument(&url);
        match owner.interceptor.window_open(raw.as_deref()) {
            OpenOutcome::PassThrough => original
                .call3(&owner.window, &url, &target, &features)
                .unwrap_or_else(|err| {
                    log::warn!("original window.open failed: {:?}", err);
                    JsValue::NULL
                }),
            OpenOutcome::Intercepted { handle, .. } => parts.build(&handle).unwrap_or_else(|err| {
                log::warn!("could not build window stub: {:?}", err);
                JsValue::NULL
            }),
        }
    }) as Box<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>);

    Reflect::set(&window, &"open".into(), replacement.as_ref())?;
    replacement.forget();
    Ok(())
}

// =============================================================================
// Capture Listeners
// =============================================================================

fn add_capture_listener<F>(target: &EventTarget, kind: &str, handler: F) -> Result<(), JsValue>
where
    F: FnMut(Event) + 'static,
{
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
    target.add_event_listener_with_callback_and_bool(kind, closure.as_ref().unchecked_ref(), true)?;
    closure.forget();
    Ok(())
}

fn install_capture_listeners(session: &Rc<Session>) -> Result<(), JsValue> {
    let root: &EventTarget = session.dom.document().as_ref();

    let owner = Rc::clone(session);
    add_capture_listener(root, "click", move |event| {
        if let Some(target) = event_element(&event) {
            let outcome = owner.interceptor.on_click(&owner.dom, &target);
            apply_click_outcome(&owner, &event, outcome);
        }
    })?;

    for kind in ["mousedown", "pointerdown", "touchstart"] {
        let owner = Rc::clone(session);
        add_capture_listener(root, kind, move |event| {
            let pointer = match event.dyn_ref::<MouseEvent>() {
                Some(mouse) if event.type_() == "mousedown" => PointerKind::Mouse { button: mouse.button() },
                _ if event.type_() == "touchstart" => PointerKind::Touch,
                _ => PointerKind::Pointer,
            };
            if let Some(target) = event_element(&event) {
                owner.interceptor.on_pointer_down(&owner.dom, &target, pointer);
            }
        })?;
    }
    Ok(())
}

fn apply_click_outcome(session: &Rc<Session>, event: &Event, outcome: ClickOutcome<Element>) {
    match outcome {
        ClickOutcome::Ignored => {}
        ClickOutcome::Suppressed { .. } => suppress(event),
        ClickOutcome::Deferred(ticket) => schedule_fallback(session, ticket),
    }
}

fn schedule_fallback(session: &Rc<Session>, ticket: FallbackTicket<Element>) {
    let delay = i32::try_from(ticket.delay_ms).unwrap_or(i32::MAX);
    let owner = Rc::clone(session);
    let callback = Closure::once_into_js(move || {
        owner.interceptor.fire_fallback(&owner.dom, &ticket);
    });
    if let Err(err) = session
        .window
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
    {
        log::warn!("could not arm fallback: {:?}", err);
    }
}

// =============================================================================
// Site-Family Buttons
// =============================================================================

/// Capture click handler shared by all hooked site-family buttons.
pub fn site_handler(session: &Rc<Session>) -> Function {
    let owner = Rc::clone(session);
    let closure = Closure::wrap(Box::new(move |event: Event| {
        let Some(button) = event.current_target().and_then(|target| target.dyn_into::<Element>().ok()) else {
            return;
        };
        let outcome = owner.interceptor.on_site_button_click(&owner.dom, &button);
        apply_click_outcome(&owner, &event, outcome);
    }) as Box<dyn FnMut(Event)>);
    let handler = closure.as_ref().unchecked_ref::<Function>().clone();
    closure.forget();
    handler
}

/// Attach `handler` and drop the page's inline `onclick`.
pub fn attach_site_handler(element: &Element, handler: &Function) {
    if let Err(err) = element.add_event_listener_with_callback_and_bool("click", handler, true) {
        log::warn!("could not hook site button: {:?}", err);
        return;
    }
    if let Some(html) = element.dyn_ref::<HtmlElement>() {
        html.set_onclick(None);
    }
}

// =============================================================================
// addEventListener Wrapper
// =============================================================================

fn install_listener_wrapper(session: &Rc<Session>) -> Result<(), JsValue> {
    let event_target = Reflect::get(&js_sys::global(), &"EventTarget".into())?;
    let prototype = Reflect::get(&event_target, &"prototype".into())?;
    let add = Reflect::get(&prototype, &"addEventListener".into())?;
    let remove = Reflect::get(&prototype, &"removeEventListener".into())?;

    let owner = Rc::clone(session);
    let hook = Closure::wrap(Box::new(move |anchor: JsValue, event: JsValue| {
        let Ok(anchor) = anchor.dyn_into::<Element>() else {
            return;
        };
        if owner.interceptor.after_link_listener(&owner.dom, &anchor).is_some() {
            if let Some(event) = event.dyn_ref::<Event>() {
                event.prevent_default();
            }
        }
    }) as Box<dyn FnMut(JsValue, JsValue)>);

    let pair = wrap_listener_registration(&add, &remove, hook.as_ref())?;
    hook.forget();

    Reflect::set(&prototype, &"addEventListener".into(), &pair.get(0))?;
    Reflect::set(&prototype, &"removeEventListener".into(), &pair.get(1))?;
    Ok(())
}
