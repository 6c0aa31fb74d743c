//! WebAssembly bindings for SameTab
//!
//! One module serves all three extension contexts: content scripts call
//! [`start_content_script`] at `document_start`, the service worker calls
//! [`start_background`], and the popup uses the storage helpers in [`popup`].

mod background;
mod chrome;
mod hooks;
mod host;
pub mod popup;
mod session;
pub mod web_dom;

use st_core::{Schedule, SiteTable};
use wasm_bindgen::prelude::*;

// Panics and `log` output go to the browser console
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Trace));
    log::set_max_level(log::LevelFilter::Info);
}

/// Install the interception hooks in the current page. `site_table_json`
/// replaces the built-in site families.
#[wasm_bindgen]
pub fn start_content_script(site_table_json: Option<String>) -> Result<(), JsValue> {
    let sites = match site_table_json {
        Some(json) => SiteTable::from_json(&json)
            .map_err(|e| JsValue::from_str(&format!("Failed to load site table: {}", e)))?,
        None => SiteTable::default(),
    };
    session::start(sites, Schedule::default())?;
    Ok(())
}

#[wasm_bindgen]
pub fn is_running() -> bool {
    session::is_running()
}

#[wasm_bindgen]
pub fn get_session_info() -> JsValue {
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"running".into(), &JsValue::from(session::is_running()));
    if let Some(session) = session::current() {
        let _ = js_sys::Reflect::set(&result, &"hostname".into(), &JsValue::from_str(&session.hostname()));
        let _ = js_sys::Reflect::set(&result, &"active".into(), &JsValue::from(session.interceptor.is_active()));
        let _ = js_sys::Reflect::set(
            &result,
            &"navigations".into(),
            &JsValue::from_f64(session.interceptor.navigations() as f64),
        );
        let _ = js_sys::Reflect::set(&result, &"suspended".into(), &JsValue::from(session.is_suspended()));
    }
    result.into()
}

/// Register the service-worker message handler.
#[wasm_bindgen]
pub fn start_background() -> Result<(), JsValue> {
    background::listen()
}
