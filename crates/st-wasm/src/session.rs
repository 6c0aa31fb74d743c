//! Content-script session
//!
//! Owns everything a page needs: the live document, the interceptor with its
//! policy slot, the reconciler, the single reconciliation interval and the
//! mutation observer. One session per page; it is torn down on `pagehide` and
//! resumed when the page comes back from the back/forward cache.

use std::cell::{Cell, OnceCell, RefCell};
use std::rc::Rc;

use js_sys::{Array, Function, Reflect};
use st_core::settings::{log_level, policy_from_store};
use st_core::{
    Host, Interceptor, Message, Mutation, Passes, Policy, PolicySlot, PolicyUpdate, Reconciler, Schedule, SiteTable,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, Event, EventTarget, MutationObserver, MutationObserverInit, MutationRecord, Window};

use crate::chrome::{self, Scope};
use crate::host::{ChromeReporter, WebHost};
use crate::hooks;
use crate::web_dom::{elements, WebDom};

pub type PageInterceptor = Interceptor<WebHost, ChromeReporter>;

/// Attributes whose changes are reported by the mutation observer.
const OBSERVED_ATTRIBUTES: [&str; 3] = ["target", "rel", "href"];

pub struct Session {
    pub window: Window,
    pub dom: WebDom,
    pub interceptor: PageInterceptor,
    pub reconciler: Reconciler,
    interval: Cell<Option<i32>>,
    observer: RefCell<Option<MutationObserver>>,
    /// Shared click handler attached to site-family buttons
    site_handler: OnceCell<Function>,
}

thread_local! {
    static SESSION: RefCell<Option<Rc<Session>>> = const { RefCell::new(None) };
}

pub fn is_running() -> bool {
    SESSION.with(|slot| slot.borrow().is_some())
}

pub fn current() -> Option<Rc<Session>> {
    SESSION.with(|slot| slot.borrow().clone())
}

/// Build the page session and install every hook.
///
/// `window.open` and the capture listeners go in synchronously, before the
/// stored settings arrive; until then the default policy applies. Once the
/// session exists nothing here is fatal: a driver that cannot be installed is
/// logged and the rest, including the settings listener, still run.
pub fn start(sites: SiteTable, schedule: Schedule) -> Result<Rc<Session>, JsValue> {
    if is_running() {
        return Err(JsValue::from_str("Already started. Reload the page to restart."));
    }

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let document = window.document().ok_or_else(|| JsValue::from_str("No document"))?;
    let dom = WebDom::new(document).ok_or_else(|| JsValue::from_str("No document element"))?;

    let policy = PolicySlot::new(Policy::default());
    let sites = Rc::new(sites);
    let interceptor = Interceptor::new(
        policy.clone(),
        Rc::clone(&sites),
        WebHost::new(window.clone()),
        ChromeReporter,
    );
    let session = Rc::new(Session {
        window,
        dom,
        interceptor,
        reconciler: Reconciler::new(policy, sites, schedule),
        interval: Cell::new(None),
        observer: RefCell::new(None),
        site_handler: OnceCell::new(),
    });

    SESSION.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&session)));

    if let Err(err) = listen_for_settings(&session) {
        log::warn!("settings updates will not be received: {:?}", err);
    }
    spawn_local(load_settings(Rc::clone(&session)));

    hooks::install(&session);
    if let Err(err) = start_observer(&session) {
        log::warn!("mutation observer not started: {:?}", err);
    }
    if let Err(err) = start_interval(&session) {
        log::warn!("reconciliation interval not started: {:?}", err);
    }
    if let Err(err) = listen_for_lifecycle(&session) {
        log::warn!("lifecycle listeners not installed: {:?}", err);
    }

    log::debug!("session started on {}", session.interceptor.hostname());
    Ok(session)
}

impl Session {
    pub fn hostname(&self) -> String {
        self.interceptor.hostname()
    }

    /// Run `passes` now and hook any new site-family buttons.
    pub fn reconcile(self: &Rc<Self>, passes: Passes) {
        let hooked = self.reconciler.run(&self.dom, &self.hostname(), passes);
        self.attach_site_handlers(hooked);
    }

    fn tick(self: &Rc<Self>) {
        let hooked = self
            .reconciler
            .tick(&self.dom, &self.hostname(), js_sys::Date::now());
        self.attach_site_handlers(hooked);
    }

    fn attach_site_handlers(self: &Rc<Self>, elements: Vec<Element>) {
        if elements.is_empty() {
            return;
        }
        let handler = self.site_handler.get_or_init(|| hooks::site_handler(self));
        for element in elements {
            hooks::attach_site_handler(&element, handler);
        }
    }

    /// Stop the interval and the observer, then leave the document normalized.
    pub fn teardown(&self) {
        if let Some(handle) = self.interval.take() {
            self.window.clear_interval_with_handle(handle);
        }
        if let Some(observer) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
        self.reconciler
            .run(&self.dom, &self.hostname(), Passes::NORMALIZE);
        log::debug!("session torn down");
    }

    pub fn is_suspended(&self) -> bool {
        self.interval.get().is_none()
    }
}

// =============================================================================
// Reconciliation Drivers
// =============================================================================

fn start_interval(session: &Rc<Session>) -> Result<(), JsValue> {
    let owner = Rc::clone(session);
    let callback = Closure::wrap(Box::new(move || owner.tick()) as Box<dyn FnMut()>);
    let period = i32::try_from(session.reconciler.schedule().tick_ms()).unwrap_or(i32::MAX);
    let handle = session
        .window
        .set_interval_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), period)?;
    callback.forget();
    session.interval.set(Some(handle));
    Ok(())
}

fn start_observer(session: &Rc<Session>) -> Result<(), JsValue> {
    let owner = Rc::clone(session);
    let callback = Closure::wrap(Box::new(move |records: Array, _observer: JsValue| {
        let mutations = mutations_from(&records);
        if !mutations.is_empty() {
            owner
                .reconciler
                .on_mutations(&owner.dom, &owner.hostname(), &mutations);
        }
    }) as Box<dyn FnMut(Array, JsValue)>);

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    callback.forget();

    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    init.set_attributes(true);
    let filter: Array = OBSERVED_ATTRIBUTES.iter().map(|name| JsValue::from_str(name)).collect();
    init.set_attribute_filter(&filter);

    observer.observe_with_options(session.dom.document(), &init)?;
    *session.observer.borrow_mut() = Some(observer);
    Ok(())
}

fn mutations_from(records: &Array) -> Vec<Mutation<Element>> {
    let mut mutations = Vec::new();
    for record in records.iter() {
        let Ok(record) = record.dyn_into::<MutationRecord>() else {
            continue;
        };
        match record.type_().as_str() {
            "childList" => {
                mutations.extend(elements(&record.added_nodes()).into_iter().map(Mutation::Added));
            }
            "attributes" => {
                let target = record.target().and_then(|node| node.dyn_into::<Element>().ok());
                if let (Some(target), Some(name)) = (target, record.attribute_name()) {
                    mutations.push(Mutation::AttributeChanged { target, name });
                }
            }
            _ => {}
        }
    }
    mutations
}

// =============================================================================
// Settings
// =============================================================================

async fn load_settings(session: Rc<Session>) {
    match chrome::storage_get(Scope::Sync, None).await {
        Ok(items) => {
            log::set_max_level(log_level(&items));
            session.interceptor.policy().replace(policy_from_store(&items));
        }
        Err(err) => log::warn!("settings unavailable, using defaults: {:?}", err),
    }
    session.reconcile(Passes::ALL);
}

fn listen_for_settings(session: &Rc<Session>) -> Result<(), JsValue> {
    let owner = Rc::clone(session);
    chrome::on_message(move |message, _sender, _respond| {
        if let Some(Message::UpdateSettings { settings }) = chrome::parse_message(&message) {
            apply_update(&owner, &settings);
        }
        JsValue::UNDEFINED
    })
}

fn apply_update(session: &Rc<Session>, update: &PolicyUpdate) {
    session.interceptor.policy().apply(update);
    if session.interceptor.is_active() {
        session.reconcile(Passes::ALL);
    } else {
        // hooks stay installed until the page is rebuilt
        log::info!("interception turned off for {}, reloading", session.hostname());
        session.interceptor.host().reload();
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

fn listen_for_lifecycle(session: &Rc<Session>) -> Result<(), JsValue> {
    // the page started its own navigation; armed fallbacks must stand down
    let owner = Rc::clone(session);
    let on_leave =
        Closure::wrap(Box::new(move |_event: Event| owner.interceptor.note_navigation()) as Box<dyn FnMut(Event)>);
    session
        .window
        .add_event_listener_with_callback("beforeunload", on_leave.as_ref().unchecked_ref())?;
    let navigation = Reflect::get(&session.window, &JsValue::from_str("navigation"))?;
    if let Some(navigation) = navigation.dyn_ref::<EventTarget>() {
        navigation.add_event_listener_with_callback("navigate", on_leave.as_ref().unchecked_ref())?;
    }
    on_leave.forget();

    let owner = Rc::clone(session);
    let on_hide = Closure::wrap(Box::new(move |_event: Event| owner.teardown()) as Box<dyn FnMut(Event)>);
    session
        .window
        .add_event_listener_with_callback("pagehide", on_hide.as_ref().unchecked_ref())?;
    on_hide.forget();

    let owner = Rc::clone(session);
    let on_show = Closure::wrap(Box::new(move |event: Event| {
        let persisted = Reflect::get(&event, &JsValue::from_str("persisted"))
            .map(|value| value.is_truthy())
            .unwrap_or(false);
        if persisted && owner.is_suspended() {
            if let Err(err) = start_observer(&owner).and_then(|_| start_interval(&owner)) {
                log::warn!("resume after back/forward cache failed: {:?}", err);
            }
            owner.reconcile(Passes::ALL);
        }
    }) as Box<dyn FnMut(Event)>);
    session
        .window
        .add_event_listener_with_callback("pageshow", on_show.as_ref().unchecked_ref())?;
    on_show.forget();
    Ok(())
}
