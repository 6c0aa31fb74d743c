//! Background coordinator: moves a tab on behalf of its content script.

use st_core::messages::NavigationAck;
use st_core::Message;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;

use crate::chrome::{self, to_js};

/// Id of the tab a message came from.
fn sender_tab_id(sender: &JsValue) -> Option<f64> {
    let tab = js_sys::Reflect::get(sender, &"tab".into()).ok()?;
    js_sys::Reflect::get(&tab, &"id".into()).ok()?.as_f64()
}

pub fn listen() -> Result<(), JsValue> {
    chrome::on_message(|message, sender, respond| {
        let Some(Message::ForceNavigation { url }) = chrome::parse_message(&message) else {
            return JsValue::UNDEFINED;
        };
        let Some(tab_id) = sender_tab_id(&sender) else {
            log::warn!("forceNavigation without a sender tab");
            return JsValue::UNDEFINED;
        };

        log::debug!("moving tab {} to {}", tab_id, url);
        spawn_local(async move {
            if let Err(err) = chrome::tabs_update(tab_id, &url).await {
                log::warn!("tabs.update failed: {:?}", err);
            }
        });

        if let Some(respond) = respond.dyn_ref::<js_sys::Function>() {
            let ack = to_js(&NavigationAck { success: true }).unwrap_or(JsValue::UNDEFINED);
            if let Err(err) = respond.call1(&JsValue::NULL, &ack) {
                log::debug!("sender went away before the reply: {:?}", err);
            }
        }
        JsValue::UNDEFINED
    })
}
