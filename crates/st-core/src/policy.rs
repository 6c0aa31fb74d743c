//! Site policy evaluation and the process-wide policy slot.

use std::cell::RefCell;
use std::rc::Rc;

use crate::settings::PolicyUpdate;
use crate::types::Policy;

/// Whether interception runs on `hostname`.
///
/// Order is fixed: disabled → never; deny list hit → never; allow list hit →
/// always; otherwise run everywhere. The deny list is the escape hatch for
/// sites that break under interception, so it wins over the allow list.
pub fn should_intercept(hostname: &str, policy: &Policy) -> bool {
    if !policy.enabled {
        return false;
    }

    let host = hostname.to_ascii_lowercase();

    if matches_any(&host, &policy.deny_list) {
        return false;
    }

    if matches_any(&host, &policy.allow_list) {
        return true;
    }

    true
}

/// Case-insensitive substring containment. Blank patterns never match.
fn matches_any(host: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        let pattern = pattern.trim();
        !pattern.is_empty() && host.contains(pattern.to_ascii_lowercase().as_str())
    })
}

// =============================================================================
// Policy Slot
// =============================================================================

/// Shared, replaceable policy for one page.
///
/// Every holder sees replacements immediately. Callers read the slot at the
/// moment they act; keeping a `Policy` copy across an async continuation is how
/// a stale mode ends up applied.
#[derive(Debug, Clone, Default)]
pub struct PolicySlot(Rc<RefCell<Policy>>);

impl PolicySlot {
    pub fn new(policy: Policy) -> Self {
        Self(Rc::new(RefCell::new(policy)))
    }

    /// Read the current policy without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&Policy) -> R) -> R {
        f(&self.0.borrow())
    }

    pub fn replace(&self, policy: Policy) {
        *self.0.borrow_mut() = policy;
    }

    /// Merge a partial update over the current value.
    pub fn apply(&self, update: &PolicyUpdate) {
        update.apply_to(&mut self.0.borrow_mut());
    }

    pub fn allows(&self, hostname: &str) -> bool {
        self.with(|policy| should_intercept(hostname, policy))
    }
}
