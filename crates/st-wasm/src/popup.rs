//! Popup operations
//!
//! The popup page renders its own UI and calls these for everything that
//! touches storage. Every settings change is written to the synchronized scope
//! and then pushed to the active tab's content script.

use serde_json::json;
use st_core::settings::{self, policy_from_store, policy_to_store, SiteList};
use st_core::url::{count_active_sites as count_sites, hostname_of};
use st_core::{ExportDocument, Message, Policy, PolicyUpdate, Stats};
use wasm_bindgen::prelude::*;

use crate::chrome::{self, from_js, to_js, to_js_error, Scope};
use crate::host::today;

async fn stored_policy() -> Result<Policy, JsValue> {
    let items = chrome::storage_get(Scope::Sync, None).await?;
    Ok(policy_from_store(&items))
}

async fn save_policy(policy: &Policy) -> Result<(), JsValue> {
    let items = policy_to_store(policy).map_err(to_js_error)?;
    chrome::storage_set(Scope::Sync, &items).await
}

async fn stored_stats() -> Result<Stats, JsValue> {
    let items = chrome::storage_get(Scope::Local, Some(&[settings::keys::STATS][..])).await?;
    Ok(Stats::from_store(&items))
}

/// Push `update` to the content script of the active tab, if it has one.
async fn notify_active_tab(update: PolicyUpdate) {
    let tab_id = match chrome::active_tab_id().await {
        Ok(Some(id)) => id,
        Ok(None) => return,
        Err(err) => {
            log::warn!("could not find the active tab: {:?}", err);
            return;
        }
    };
    let message = Message::UpdateSettings { settings: update };
    if let Err(err) = chrome::send_tab_message(tab_id, &message).await {
        // restricted pages (chrome://, the web store) have no content script
        log::debug!("settings not delivered to tab {}: {:?}", tab_id, err);
    }
}

fn list_update(policy: &Policy) -> PolicyUpdate {
    PolicyUpdate {
        allow_list: Some(policy.allow_list.clone()),
        deny_list: Some(policy.deny_list.clone()),
        ..PolicyUpdate::default()
    }
}

/// Stored policy, defaults filling the gaps.
#[wasm_bindgen]
pub async fn load_settings() -> Result<JsValue, JsValue> {
    to_js(&stored_policy().await?)
}

/// Merge a partial policy into the stored one; returns the merged policy.
#[wasm_bindgen]
pub async fn update_settings(update: JsValue) -> Result<JsValue, JsValue> {
    let update: PolicyUpdate = serde_json::from_value(from_js(&update)?).map_err(to_js_error)?;
    let mut policy = stored_policy().await?;
    update.apply_to(&mut policy);
    save_policy(&policy).await?;
    notify_active_tab(update).await;
    to_js(&policy)
}

/// Add `site` to `list` (`alwaysOn` / `alwaysOff`). Returns false when it was
/// already there.
#[wasm_bindgen]
pub async fn add_site(list: String, site: String) -> Result<bool, JsValue> {
    let list: SiteList = list.parse().map_err(to_js_error)?;
    let mut policy = stored_policy().await?;
    if !settings::add_site(&mut policy, list, &site) {
        return Ok(false);
    }
    save_policy(&policy).await?;
    notify_active_tab(list_update(&policy)).await;
    Ok(true)
}

#[wasm_bindgen]
pub async fn remove_site(list: String, site: String) -> Result<bool, JsValue> {
    let list: SiteList = list.parse().map_err(to_js_error)?;
    let mut policy = stored_policy().await?;
    if !settings::remove_site(&mut policy, list, &site) {
        return Ok(false);
    }
    save_policy(&policy).await?;
    notify_active_tab(list_update(&policy)).await;
    Ok(true)
}

/// Clear both storage scopes. Returns the default policy now in effect.
#[wasm_bindgen]
pub async fn reset_settings() -> Result<JsValue, JsValue> {
    chrome::storage_clear(Scope::Sync).await?;
    chrome::storage_clear(Scope::Local).await?;
    let policy = Policy::default();
    notify_active_tab(PolicyUpdate::from(&policy)).await;
    log::info!("settings reset to defaults");
    to_js(&policy)
}

/// Counters with the daily roll-over applied (and persisted when it happened).
#[wasm_bindgen]
pub async fn load_stats() -> Result<JsValue, JsValue> {
    let mut stats = stored_stats().await?;
    if stats.roll_over(&today()) {
        chrome::storage_set(Scope::Local, &stats.to_store().map_err(to_js_error)?).await?;
    }
    to_js(&stats)
}

/// `{ fileName, json }` for the popup to offer as a download.
#[wasm_bindgen]
pub async fn export_settings() -> Result<JsValue, JsValue> {
    let export_date = String::from(js_sys::Date::new_0().to_iso_string());
    let document = ExportDocument::new(stored_policy().await?, stored_stats().await?, export_date);
    let json = document.to_pretty_json().map_err(to_js_error)?;
    to_js(&json!({ "fileName": document.file_name(), "json": json }))
}

/// Hostname of the active tab; `None` when it has no URL the popup may see.
#[wasm_bindgen]
pub async fn current_site() -> Result<Option<String>, JsValue> {
    let tabs = chrome::tabs_query(&json!({ "active": true, "currentWindow": true })).await?;
    let hostname = tabs
        .first()
        .and_then(|tab| tab.get("url"))
        .and_then(|url| url.as_str())
        .map(hostname_of)
        .filter(|host| !host.is_empty());
    Ok(hostname)
}

/// Distinct http(s) hosts across all open tabs.
#[wasm_bindgen]
pub async fn count_active_sites() -> Result<u32, JsValue> {
    let tabs = chrome::tabs_query(&json!({})).await?;
    let urls: Vec<&str> = tabs
        .iter()
        .filter_map(|tab| tab.get("url").and_then(|url| url.as_str()))
        .collect();
    Ok(u32::try_from(count_sites(urls)).unwrap_or(u32::MAX))
}
