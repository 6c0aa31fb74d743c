//! Settings store shapes
//!
//! The extension keeps the policy in the synchronized store scope under one key
//! per field, and statistics in the local scope under `stats`. This module
//! turns raw store items into typed values (defaults for anything missing or
//! malformed), implements the popup's site-list edits and builds the export
//! document.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::stats::Stats;
use crate::types::{Mode, Policy};

/// Store keys.
pub mod keys {
    pub const ENABLED: &str = "enabled";
    pub const MODE: &str = "mode";
    pub const ENHANCED_JOB_SITE_HANDLING: &str = "enhancedJobSiteHandling";
    pub const ALWAYS_ON: &str = "alwaysOn";
    pub const ALWAYS_OFF: &str = "alwaysOff";
    pub const STATS: &str = "stats";
    pub const LOG_LEVEL: &str = "logLevel";
}

/// Error type for settings handling.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Malformed value for `{key}`: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown site list: {0}")]
    UnknownList(String),
}

// =============================================================================
// Policy Updates
// =============================================================================

/// Partial policy carried by `updateSettings` messages. Absent fields keep
/// their current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct PolicyUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub mode: Option<Mode>,
    #[serde(rename = "alwaysOn", skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub allow_list: Option<Vec<String>>,
    #[serde(rename = "alwaysOff", skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub deny_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub enhanced_job_site_handling: Option<bool>,
}

impl PolicyUpdate {
    pub fn apply_to(&self, policy: &mut Policy) {
        if let Some(enabled) = self.enabled {
            policy.enabled = enabled;
        }
        if let Some(mode) = self.mode {
            policy.mode = mode;
        }
        if let Some(list) = &self.allow_list {
            policy.allow_list = list.clone();
        }
        if let Some(list) = &self.deny_list {
            policy.deny_list = list.clone();
        }
        if let Some(enhanced) = self.enhanced_job_site_handling {
            policy.enhanced_job_site_handling = enhanced;
        }
    }

    /// Read known keys from raw store items, skipping malformed ones.
    pub fn from_store(items: &Value) -> Self {
        let Some(map) = items.as_object() else {
            return Self::default();
        };
        Self {
            enabled: lenient_field(map, keys::ENABLED),
            mode: lenient_field(map, keys::MODE),
            allow_list: lenient_field(map, keys::ALWAYS_ON),
            deny_list: lenient_field(map, keys::ALWAYS_OFF),
            enhanced_job_site_handling: lenient_field(map, keys::ENHANCED_JOB_SITE_HANDLING),
        }
    }
}

impl From<&Policy> for PolicyUpdate {
    /// Update that replaces every field.
    fn from(policy: &Policy) -> Self {
        Self {
            enabled: Some(policy.enabled),
            mode: Some(policy.mode),
            allow_list: Some(policy.allow_list.clone()),
            deny_list: Some(policy.deny_list.clone()),
            enhanced_job_site_handling: Some(policy.enhanced_job_site_handling),
        }
    }
}

/// Typed value of `key`, or an error when it is present but malformed.
pub fn read_field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Result<Option<T>, SettingsError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|source| SettingsError::Malformed {
                key: key.to_string(),
                source,
            }),
    }
}

fn lenient_field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Option<T> {
    read_field(map, key).unwrap_or_else(|err| {
        log::warn!("ignoring stored setting: {}", err);
        None
    })
}

/// Policy from raw synchronized-scope items, defaults filling the gaps.
pub fn policy_from_store(items: &Value) -> Policy {
    let mut policy = Policy::default();
    PolicyUpdate::from_store(items).apply_to(&mut policy);
    policy
}

/// Store items for a full policy, one key per field.
pub fn policy_to_store(policy: &Policy) -> Result<Value, SettingsError> {
    Ok(serde_json::to_value(policy)?)
}

/// Console log level from the optional `logLevel` setting.
pub fn log_level(items: &Value) -> log::LevelFilter {
    items
        .get(keys::LOG_LEVEL)
        .and_then(Value::as_str)
        .and_then(|level| log::LevelFilter::from_str(level).ok())
        .unwrap_or(log::LevelFilter::Info)
}

// =============================================================================
// Site Lists
// =============================================================================

/// One of the two hostname pattern lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteList {
    AlwaysOn,
    AlwaysOff,
}

impl SiteList {
    pub fn key(self) -> &'static str {
        match self {
            Self::AlwaysOn => keys::ALWAYS_ON,
            Self::AlwaysOff => keys::ALWAYS_OFF,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::AlwaysOn => Self::AlwaysOff,
            Self::AlwaysOff => Self::AlwaysOn,
        }
    }

    fn entries_mut(self, policy: &mut Policy) -> &mut Vec<String> {
        match self {
            Self::AlwaysOn => &mut policy.allow_list,
            Self::AlwaysOff => &mut policy.deny_list,
        }
    }
}

impl FromStr for SiteList {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alwaysOn" | "whitelist" => Ok(Self::AlwaysOn),
            "alwaysOff" | "blacklist" => Ok(Self::AlwaysOff),
            other => Err(SettingsError::UnknownList(other.to_string())),
        }
    }
}

/// Add `site` to `list` and drop it from the other list.
/// Returns false when it was already listed (nothing changes then).
pub fn add_site(policy: &mut Policy, list: SiteList, site: &str) -> bool {
    let site = site.trim();
    if site.is_empty() {
        return false;
    }
    let entries = list.entries_mut(policy);
    if entries.iter().any(|entry| entry == site) {
        return false;
    }
    entries.push(site.to_string());
    list.opposite().entries_mut(policy).retain(|entry| entry != site);
    true
}

/// Remove `site` from `list`. Returns whether anything was removed.
pub fn remove_site(policy: &mut Policy, list: SiteList, site: &str) -> bool {
    let entries = list.entries_mut(policy);
    let before = entries.len();
    entries.retain(|entry| entry != site);
    entries.len() != before
}

// =============================================================================
// Export
// =============================================================================

/// Downloadable snapshot of the settings and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ExportDocument {
    pub settings: Policy,
    pub stats: Stats,
    /// ISO-8601 timestamp
    pub export_date: String,
}

impl ExportDocument {
    pub fn new(settings: Policy, stats: Stats, export_date: impl Into<String>) -> Self {
        Self {
            settings,
            stats,
            export_date: export_date.into(),
        }
    }

    pub fn to_pretty_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `force-links-same-tab-settings-YYYY-MM-DD.json`
    pub fn file_name(&self) -> String {
        let day = self.export_date.split('T').next().unwrap_or_default();
        format!("force-links-same-tab-settings-{}.json", day)
    }
}
