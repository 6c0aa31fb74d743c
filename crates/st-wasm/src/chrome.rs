//! Extension platform APIs (`chrome.storage`, `chrome.runtime`, `chrome.tabs`).
//!
//! Looked up by name on the global object so the same module loads in content
//! scripts, the popup and the service worker, each of which only sees part of
//! the API. Values cross the boundary as JSON.

use js_sys::{Array, Function, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use st_core::Message;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

/// Storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Settings, synchronized across the user's browsers
    Sync,
    /// Statistics, this device only
    Local,
}

impl Scope {
    fn name(self) -> &'static str {
        match self {
            Scope::Sync => "sync",
            Scope::Local => "local",
        }
    }
}

pub fn to_js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Serialize through JSON into a plain JS value.
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value).map_err(to_js_error)?;
    js_sys::JSON::parse(&json)
}

/// Plain JS value to JSON. `undefined` becomes `null`.
pub fn from_js(value: &JsValue) -> Result<Value, JsValue> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    let json = String::from(js_sys::JSON::stringify(value)?);
    serde_json::from_str(&json).map_err(to_js_error)
}

fn namespace(path: &[&str]) -> Result<JsValue, JsValue> {
    let mut current: JsValue = js_sys::global().into();
    for part in path {
        current = Reflect::get(&current, &JsValue::from_str(part))?;
        if current.is_undefined() || current.is_null() {
            return Err(JsValue::from_str(&format!("chrome API unavailable: {}", path.join("."))));
        }
    }
    Ok(current)
}

/// Call `path.method(...args)` and await the result when it is a promise.
async fn call(path: &[&str], method: &str, args: &Array) -> Result<JsValue, JsValue> {
    let target = namespace(path)?;
    let function: Function = Reflect::get(&target, &JsValue::from_str(method))?.dyn_into()?;
    let result = function.apply(&target, args)?;
    match result.dyn_into::<Promise>() {
        Ok(promise) => JsFuture::from(promise).await,
        Err(value) => Ok(value),
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Items of `scope`; all of them when `keys` is `None`.
pub async fn storage_get(scope: Scope, keys: Option<&[&str]>) -> Result<Value, JsValue> {
    let query = match keys {
        Some(keys) => keys.iter().map(|key| JsValue::from_str(key)).collect::<Array>().into(),
        None => JsValue::NULL,
    };
    let items = call(&["chrome", "storage", scope.name()], "get", &Array::of1(&query)).await?;
    from_js(&items)
}

pub async fn storage_set(scope: Scope, items: &Value) -> Result<(), JsValue> {
    call(&["chrome", "storage", scope.name()], "set", &Array::of1(&to_js(items)?)).await?;
    Ok(())
}

pub async fn storage_clear(scope: Scope) -> Result<(), JsValue> {
    call(&["chrome", "storage", scope.name()], "clear", &Array::new()).await?;
    Ok(())
}

// =============================================================================
// Messaging
// =============================================================================

/// Send to the extension's other contexts. Rejects when nobody listens.
pub async fn send_message(message: &Message) -> Result<JsValue, JsValue> {
    call(&["chrome", "runtime"], "sendMessage", &Array::of1(&to_js(message)?)).await
}

pub async fn send_tab_message(tab_id: f64, message: &Message) -> Result<JsValue, JsValue> {
    let args = Array::of2(&JsValue::from_f64(tab_id), &to_js(message)?);
    call(&["chrome", "tabs"], "sendMessage", &args).await
}

/// Register `listener(message, sender, sendResponse)` on `runtime.onMessage`.
/// The listener lives for the rest of the context.
pub fn on_message<F>(listener: F) -> Result<(), JsValue>
where
    F: FnMut(JsValue, JsValue, JsValue) -> JsValue + 'static,
{
    let events = namespace(&["chrome", "runtime", "onMessage"])?;
    let add: Function = Reflect::get(&events, &JsValue::from_str("addListener"))?.dyn_into()?;
    let closure = Closure::wrap(Box::new(listener) as Box<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>);
    add.call1(&events, closure.as_ref())?;
    closure.forget();
    Ok(())
}

/// Decode an incoming message; `None` for anything that is not ours.
pub fn parse_message(value: &JsValue) -> Option<Message> {
    let json = from_js(value).ok()?;
    match serde_json::from_value(json) {
        Ok(message) => Some(message),
        Err(err) => {
            log::trace!("ignoring foreign message: {}", err);
            None
        }
    }
}

// =============================================================================
// Tabs
// =============================================================================

pub async fn tabs_update(tab_id: f64, url: &str) -> Result<(), JsValue> {
    let properties = to_js(&serde_json::json!({ "url": url }))?;
    call(&["chrome", "tabs"], "update", &Array::of2(&JsValue::from_f64(tab_id), &properties)).await?;
    Ok(())
}

/// Tabs matching a `tabs.query` filter, as JSON objects.
pub async fn tabs_query(filter: &Value) -> Result<Vec<Value>, JsValue> {
    let tabs = call(&["chrome", "tabs"], "query", &Array::of1(&to_js(filter)?)).await?;
    match from_js(&tabs)? {
        Value::Array(tabs) => Ok(tabs),
        _ => Ok(Vec::new()),
    }
}

/// Id of the focused window's active tab.
pub async fn active_tab_id() -> Result<Option<f64>, JsValue> {
    let tabs = tabs_query(&serde_json::json!({ "active": true, "currentWindow": true })).await?;
    Ok(tabs.first().and_then(|tab| tab.get("id")).and_then(Value::as_f64))
}
