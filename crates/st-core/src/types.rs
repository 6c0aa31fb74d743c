//! Core type definitions for SameTab
//!
//! These types are shared by the interception engine, the store layer and the
//! wasm bindings. The ones that cross the store or the message bus derive serde
//! and export TypeScript declarations for the popup script.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Policy
// =============================================================================

/// What to do with an intercepted new-tab attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Mode {
    /// Navigate the current tab to the destination
    #[default]
    Redirect,
    /// Swallow the attempt without navigating
    Block,
}

/// Runtime configuration of the interceptor.
///
/// Field names on the wire follow the store keys, so a policy can be read
/// straight out of the synchronized store scope. Missing keys take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct Policy {
    pub enabled: bool,
    pub mode: Mode,
    /// Hostname patterns where interception always runs
    #[serde(rename = "alwaysOn")]
    pub allow_list: Vec<String>,
    /// Hostname patterns where interception never runs; wins over `allow_list`
    #[serde(rename = "alwaysOff")]
    pub deny_list: Vec<String>,
    /// Enables site-family handlers and job-site markers
    pub enhanced_job_site_handling: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: Mode::Redirect,
            allow_list: Vec::new(),
            deny_list: Vec::new(),
            enhanced_job_site_handling: true,
        }
    }
}

// =============================================================================
// Intent Signals
// =============================================================================

/// How the classifier reached its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// Markup states the intent and carries the destination
    Explicit,
    /// Only textual hints; the destination is known once the page acts
    Heuristic,
}

/// Classification of a single interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementIntentSignal {
    pub opens_new_tab: bool,
    pub confidence: Confidence,
    /// Destination as written in the markup (resolved `href` for anchors)
    pub extracted_url: Option<String>,
}

impl ElementIntentSignal {
    /// Explicit new-tab intent with a known destination.
    pub fn explicit(url: impl Into<String>) -> Self {
        Self {
            opens_new_tab: true,
            confidence: Confidence::Explicit,
            extracted_url: Some(url.into()),
        }
    }

    /// New-tab intent whose destination is not in the markup.
    pub fn heuristic() -> Self {
        Self {
            opens_new_tab: true,
            confidence: Confidence::Heuristic,
            extracted_url: None,
        }
    }

    /// Whether the interceptor may act on this signal right away.
    pub fn is_immediate(&self) -> bool {
        self.opens_new_tab && self.confidence == Confidence::Explicit && self.extracted_url.is_some()
    }
}

// =============================================================================
// Interception Events
// =============================================================================

/// Outcome of an interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Redirected,
    Blocked,
}

impl From<Mode> for Decision {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Redirect => Self::Redirected,
            Mode::Block => Self::Blocked,
        }
    }
}

/// Record of one intercepted new-tab attempt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptionEvent {
    /// Milliseconds since the Unix epoch
    pub timestamp: f64,
    pub target_url: String,
    /// Short description of the element that triggered the attempt
    pub source: String,
    pub decision: Decision,
}
