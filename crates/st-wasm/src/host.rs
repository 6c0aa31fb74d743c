//! Browser implementations of the interceptor's [`Host`] and [`Reporter`].

use st_core::settings::keys;
use st_core::stats::iso_date;
use st_core::{Host, InterceptionEvent, Message, PendingRecords, Reporter, Stats};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::spawn_local;
use web_sys::Window;

use crate::chrome::{self, Scope};

/// Local calendar date as `YYYY-MM-DD`.
pub fn today() -> String {
    let now = js_sys::Date::new_0();
    iso_date(now.get_full_year(), now.get_month() + 1, now.get_date())
}

pub struct WebHost {
    window: Window,
}

impl WebHost {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl Host for WebHost {
    fn current_url(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn navigate(&self, url: &str) {
        if let Err(err) = self.window.location().set_href(url) {
            // sandboxed frames may refuse; let the background move the tab
            log::warn!("location.href = {:?} failed: {:?}", url, err);
            let message = Message::ForceNavigation { url: url.to_string() };
            spawn_local(async move {
                if let Err(err) = chrome::send_message(&message).await {
                    log::warn!("forceNavigation not delivered: {:?}", err);
                }
            });
        }
    }

    fn reload(&self) {
        if let Err(err) = self.window.location().reload() {
            log::warn!("reload failed: {:?}", err);
        }
    }

    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

thread_local! {
    static PENDING: PendingRecords = const { PendingRecords::new() };
}

/// Counts interceptions in local storage and pings the popup.
#[derive(Debug, Default)]
pub struct ChromeReporter;

impl Reporter for ChromeReporter {
    fn report(&self, event: &InterceptionEvent) {
        log::info!("{:?} {} (from {})", event.decision, event.target_url, event.source);
        if PENDING.with(PendingRecords::push) {
            spawn_local(drain_pending());
        }
    }
}

async fn drain_pending() {
    while let Some(count) = PENDING.with(PendingRecords::take) {
        if let Err(err) = record_interceptions(count).await {
            log::warn!("stats update failed: {:?}", err);
        }
    }
}

async fn record_interceptions(count: u64) -> Result<(), JsValue> {
    let items = chrome::storage_get(Scope::Local, Some(&[keys::STATS][..])).await?;
    let mut stats = Stats::from_store(&items);
    stats.record_many(&today(), count);
    chrome::storage_set(Scope::Local, &stats.to_store().map_err(chrome::to_js_error)?).await?;

    // the popup is usually closed
    if let Err(err) = chrome::send_message(&Message::UpdateStats).await {
        log::trace!("updateStats not delivered: {:?}", err);
    }
    Ok(())
}
