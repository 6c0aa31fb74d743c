//! Messages exchanged between the page, the popup and the background worker.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::settings::{PolicyUpdate, SettingsError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "camelCase")]
#[ts(export)]
pub enum Message {
    /// Popup → page: merge these settings into the live policy
    UpdateSettings { settings: PolicyUpdate },
    /// Page → popup: counters changed, refresh the display
    UpdateStats,
    /// Page → background: navigate the sender tab
    ForceNavigation { url: String },
}

impl Message {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Background reply to [`Message::ForceNavigation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NavigationAck {
    pub success: bool,
}
