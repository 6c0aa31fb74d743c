//! SameTab Core Library
//!
//! This crate provides the interception engine for the SameTab browser extension,
//! which keeps links and `window.open` calls inside the current tab.
//!
//! # Architecture
//!
//! Everything here is platform-agnostic. The page is reached through the [`Dom`]
//! trait, navigation through [`Host`], and interception reporting through
//! [`Reporter`]. The wasm bindings implement these over the real browser APIs;
//! the tests implement them over [`dom::memory::MemoryDom`] and the recording
//! doubles in [`testing`].
//!
//! # Modules
//!
//! - `policy`: per-site gating and the process-wide policy slot
//! - `normalizer`: strips new-tab `target`/`rel` attributes
//! - `classifier`: decides whether an interaction was meant to open a new tab
//! - `interceptor`: turns decisions into same-tab navigation and reports
//! - `reconcile`: periodic and mutation-driven re-application of the above
//! - `sites`: configurable per-site-family heuristics
//! - `settings`, `stats`, `messages`: store and messaging value shapes
//! - `url`: URL resolution helpers
//! - `types`: shared type definitions

pub mod classifier;
pub mod dom;
pub mod interceptor;
pub mod messages;
pub mod normalizer;
pub mod policy;
pub mod reconcile;
pub mod settings;
pub mod sites;
pub mod stats;
pub mod types;
pub mod url;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use classifier::{Classification, Classifier};
pub use dom::{Dom, Selector};
pub use interceptor::{ClickOutcome, FallbackTicket, Host, Interceptor, OpenOutcome, Reporter, WindowHandle};
pub use messages::Message;
pub use policy::{should_intercept, PolicySlot};
pub use reconcile::{Mutation, Passes, Reconciler, Schedule};
pub use settings::{ExportDocument, PolicyUpdate, SettingsError, SiteList};
pub use sites::{SiteFamily, SiteTable};
pub use stats::{PendingRecords, Stats};
pub use types::{Confidence, Decision, ElementIntentSignal, InterceptionEvent, Mode, Policy};
