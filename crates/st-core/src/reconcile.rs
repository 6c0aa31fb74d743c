//! Continuous reconciliation
//!
//! Host pages put `target` attributes back, render new links, and swap buttons
//! long after load. The reconciler re-applies normalization and pre-marking on
//! every mutation batch and on a fixed cadence. The cadence is tracked here so
//! the platform needs a single interval: it calls [`Reconciler::tick`] every
//! [`Schedule::tick_ms`] and tears that one interval down on page hide.

use std::cell::Cell;
use std::rc::Rc;

use crate::classifier::{has_indicator_text, is_premarked, FORCE_SAME_TAB_ATTR};
use crate::dom::{Dom, Selector};
use crate::normalizer::{normalize, strip_blank_targets};
use crate::policy::PolicySlot;
use crate::sites::SiteTable;

bitflags::bitflags! {
    /// Reconciliation passes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Passes: u8 {
        /// Whole-document normalization (backstop for missed mutations)
        const NORMALIZE = 1 << 0;
        /// Strip `target="_blank"` everywhere and pre-mark buttons
        const AGGRESSIVE = 1 << 1;
        /// Install site-family handlers on new buttons
        const SITE_HOOKS = 1 << 2;
        const ALL = Self::NORMALIZE.bits() | Self::AGGRESSIVE.bits() | Self::SITE_HOOKS.bits();
    }
}

/// Periods of the reconciliation passes, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub normalize_ms: u32,
    pub aggressive_ms: u32,
    pub site_hooks_ms: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            normalize_ms: 2000,
            aggressive_ms: 1000,
            site_hooks_ms: 500,
        }
    }
}

impl Schedule {
    /// Interval at which the platform should call [`Reconciler::tick`].
    pub fn tick_ms(&self) -> u32 {
        gcd(gcd(self.normalize_ms, self.aggressive_ms), self.site_hooks_ms).max(1)
    }

    fn period(&self, pass: Passes) -> u32 {
        if pass == Passes::NORMALIZE {
            self.normalize_ms
        } else if pass == Passes::AGGRESSIVE {
            self.aggressive_ms
        } else {
            self.site_hooks_ms
        }
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// One mutation observer record, reduced to what reconciliation needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<N> {
    /// An element was inserted (its subtree comes with it)
    Added(N),
    AttributeChanged { target: N, name: String },
}

const PASS_ORDER: [Passes; 3] = [Passes::NORMALIZE, Passes::AGGRESSIVE, Passes::SITE_HOOKS];

pub struct Reconciler {
    policy: PolicySlot,
    sites: Rc<SiteTable>,
    schedule: Schedule,
    last_run: Cell<[Option<f64>; 3]>,
}

impl Reconciler {
    pub fn new(policy: PolicySlot, sites: Rc<SiteTable>, schedule: Schedule) -> Self {
        Self {
            policy,
            sites,
            schedule,
            last_run: Cell::new([None; 3]),
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Passes whose period has elapsed at `now_ms`; marks them as run.
    pub fn due(&self, now_ms: f64) -> Passes {
        let mut last_run = self.last_run.get();
        let mut due = Passes::empty();
        for (slot, pass) in last_run.iter_mut().zip(PASS_ORDER) {
            let elapsed = slot.map_or(true, |last| now_ms - last >= f64::from(self.schedule.period(pass)));
            if elapsed {
                *slot = Some(now_ms);
                due |= pass;
            }
        }
        self.last_run.set(last_run);
        due
    }

    /// Run whatever is due. Returns elements that need a site-family handler.
    pub fn tick<D: Dom + ?Sized>(&self, dom: &D, hostname: &str, now_ms: f64) -> Vec<D::Node> {
        let due = self.due(now_ms);
        self.run(dom, hostname, due)
    }

    /// Run `passes` now, when the policy allows this page.
    pub fn run<D: Dom + ?Sized>(&self, dom: &D, hostname: &str, passes: Passes) -> Vec<D::Node> {
        if passes.is_empty() || !self.policy.allows(hostname) {
            return Vec::new();
        }

        let root = dom.document_element();
        if passes.contains(Passes::NORMALIZE) {
            normalize(dom, &root);
        }
        if passes.contains(Passes::AGGRESSIVE) {
            aggressive_pass(dom);
        }
        if passes.contains(Passes::SITE_HOOKS) {
            return self.site_hook_pass(dom, hostname);
        }
        Vec::new()
    }

    /// React to one mutation observer batch.
    pub fn on_mutations<D: Dom + ?Sized>(&self, dom: &D, hostname: &str, records: &[Mutation<D::Node>]) {
        if !self.policy.allows(hostname) {
            return;
        }
        for record in records {
            match record {
                Mutation::Added(node) => {
                    if dom.is_connected(node) {
                        normalize(dom, node);
                    }
                }
                Mutation::AttributeChanged { target, name } => {
                    if !matches!(name.as_str(), "target" | "rel") {
                        continue;
                    }
                    if !matches!(dom.tag_name(target).as_str(), "A" | "AREA" | "FORM") {
                        continue;
                    }
                    let scope = dom.parent(target).unwrap_or_else(|| dom.document_element());
                    normalize(dom, &scope);
                }
            }
        }
    }

    /// Mark matching elements of every active site family with its
    /// HandledMarker and drop their `target`. Each element is returned once,
    /// the first time it is seen.
    pub fn site_hook_pass<D: Dom + ?Sized>(&self, dom: &D, hostname: &str) -> Vec<D::Node> {
        if !self.policy.with(|policy| policy.enhanced_job_site_handling) {
            return Vec::new();
        }

        let mut hooked = Vec::new();
        for family in self.sites.active(hostname) {
            for selector in &family.buttons {
                for node in dom.query_document(selector) {
                    if family.is_handled(dom, &node) {
                        continue;
                    }
                    dom.set_attribute(&node, &family.handled_attribute, "true");
                    dom.remove_attribute(&node, "target");
                    hooked.push(node);
                }
            }
        }
        if !hooked.is_empty() {
            log::debug!("installing site handlers on {} element(s)", hooked.len());
        }
        hooked
    }
}

/// Strip `target="_blank"` everywhere and pre-mark buttons announcing a new tab.
/// Returns the number of newly marked buttons.
pub fn aggressive_pass<D: Dom + ?Sized>(dom: &D) -> usize {
    let root = dom.document_element();
    strip_blank_targets(dom, &root);

    let controls = [
        Selector::tag("button"),
        Selector::tag("input").with_attr_equals("type", "button"),
        Selector::tag("input").with_attr_equals("type", "submit"),
    ];
    let mut marked = 0;
    for selector in &controls {
        for node in dom.query_all(&root, selector) {
            if !is_premarked(dom, &node) && has_indicator_text(dom, &node) {
                dom.set_attribute(&node, FORCE_SAME_TAB_ATTR, "true");
                marked += 1;
            }
        }
    }
    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::MemoryDom;
    use crate::types::Policy;

    fn reconciler(policy: Policy) -> Reconciler {
        Reconciler::new(PolicySlot::new(policy), Rc::new(SiteTable::default()), Schedule::default())
    }

    #[test]
    fn test_schedule_tick() {
        assert_eq!(Schedule::default().tick_ms(), 500);
        let odd = Schedule {
            normalize_ms: 3000,
            aggressive_ms: 1200,
            site_hooks_ms: 900,
        };
        assert_eq!(odd.tick_ms(), 300);
    }

    #[test]
    fn test_due_cadence() {
        let r = reconciler(Policy::default());
        assert_eq!(r.due(0.0), Passes::ALL);
        assert_eq!(r.due(500.0), Passes::SITE_HOOKS);
        assert_eq!(r.due(1000.0), Passes::SITE_HOOKS | Passes::AGGRESSIVE);
        assert_eq!(r.due(1500.0), Passes::SITE_HOOKS);
        assert_eq!(r.due(2000.0), Passes::ALL);
        assert_eq!(r.due(2100.0), Passes::empty());
    }

    #[test]
    fn test_added_subtree_normalized() {
        let r = reconciler(Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let card = dom.create("div");
        let link = dom.create("a");
        dom.set_attribute(&link, "target", "_blank");
        dom.append(card, link);
        dom.append(dom.body(), card);

        r.on_mutations(&dom, "a.com", &[Mutation::Added(card)]);
        assert!(!dom.has_attribute(&link, "target"));
    }

    #[test]
    fn test_added_link_itself_normalized() {
        let r = reconciler(Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let link = dom.element(dom.body(), "a", &[("target", "_blank")]);
        r.on_mutations(&dom, "a.com", &[Mutation::Added(link)]);
        assert!(!dom.has_attribute(&link, "target"));
    }

    #[test]
    fn test_attribute_readded_is_stripped() {
        let r = reconciler(Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let link = dom.element(dom.body(), "a", &[("href", "/x")]);
        dom.set_attribute(&link, "target", "_new");
        r.on_mutations(
            &dom,
            "a.com",
            &[Mutation::AttributeChanged {
                target: link,
                name: "target".into(),
            }],
        );
        assert!(!dom.has_attribute(&link, "target"));

        let button = dom.element(dom.body(), "button", &[("target", "_blank")]);
        r.on_mutations(
            &dom,
            "a.com",
            &[Mutation::AttributeChanged {
                target: button,
                name: "target".into(),
            }],
        );
        assert!(dom.has_attribute(&button, "target"));
    }

    #[test]
    fn test_detached_additions_ignored() {
        let r = reconciler(Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let link = dom.create("a");
        dom.set_attribute(&link, "target", "_blank");
        r.on_mutations(&dom, "a.com", &[Mutation::Added(link)]);
        assert!(dom.has_attribute(&link, "target"));
    }

    #[test]
    fn test_denied_site_untouched() {
        let r = reconciler(Policy {
            deny_list: vec!["a.com".into()],
            ..Policy::default()
        });
        let dom = MemoryDom::new("https://a.com/");
        let link = dom.element(dom.body(), "a", &[("target", "_blank")]);
        assert!(r.run(&dom, "a.com", Passes::ALL).is_empty());
        r.on_mutations(&dom, "a.com", &[Mutation::Added(link)]);
        assert!(dom.has_attribute(&link, "target"));
    }

    #[test]
    fn test_aggressive_pass() {
        let dom = MemoryDom::new("https://a.com/");
        let div = dom.element(dom.body(), "div", &[("target", "_blank")]);
        let submit = dom.element(dom.body(), "input", &[("type", "submit"), ("title", "Continue in a new tab")]);
        let text = dom.element(dom.body(), "input", &[("type", "text"), ("title", "new tab")]);

        assert_eq!(aggressive_pass(&dom), 1);
        assert!(!dom.has_attribute(&div, "target"));
        assert!(is_premarked(&dom, &submit));
        assert!(!is_premarked(&dom, &text));
        assert_eq!(aggressive_pass(&dom), 0);
    }

    #[test]
    fn test_site_hooks_installed_once() {
        let r = reconciler(Policy::default());
        let dom = MemoryDom::new("https://www.indeed.com/");
        let wrapper = dom.element(dom.body(), "div", &[("class", "jobsearch-IndeedApplyButton")]);
        let button = dom.element(wrapper, "button", &[("aria-label", "Apply now"), ("target", "_blank")]);

        assert_eq!(r.site_hook_pass(&dom, "www.indeed.com"), vec![button]);
        assert_eq!(dom.attribute(&button, "data-indeed-handler-added").as_deref(), Some("true"));
        assert!(!dom.has_attribute(&button, "target"));
        assert!(r.site_hook_pass(&dom, "www.indeed.com").is_empty());

        // re-rendered button is a new element
        dom.remove(button);
        let fresh = dom.element(wrapper, "button", &[]);
        assert_eq!(r.run(&dom, "www.indeed.com", Passes::SITE_HOOKS), vec![fresh]);
    }

    #[test]
    fn test_site_hooks_need_matching_host_and_setting() {
        let dom = MemoryDom::new("https://example.com/");
        dom.element(dom.body(), "button", &[("aria-label", "Apply now")]);
        assert!(reconciler(Policy::default()).site_hook_pass(&dom, "example.com").is_empty());

        let dom = MemoryDom::new("https://www.indeed.com/");
        dom.element(dom.body(), "button", &[("aria-label", "Apply now")]);
        let off = reconciler(Policy {
            enhanced_job_site_handling: false,
            ..Policy::default()
        });
        assert!(off.site_hook_pass(&dom, "www.indeed.com").is_empty());
    }

    #[test]
    fn test_tick_runs_backstop() {
        let r = reconciler(Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let form = dom.element(dom.body(), "form", &[("target", "_new")]);
        r.tick(&dom, "a.com", 0.0);
        assert!(!dom.has_attribute(&form, "target"));

        dom.set_attribute(&form, "target", "_new");
        r.tick(&dom, "a.com", 600.0);
        assert!(dom.has_attribute(&form, "target"));
        r.tick(&dom, "a.com", 2000.0);
        assert!(!dom.has_attribute(&form, "target"));
    }
}
