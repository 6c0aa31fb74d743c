//! Navigation interception
//!
//! The decision half of the runtime hooks. The wasm bindings install the actual
//! `window.open` replacement, capture-phase listeners and the wrapped
//! `addEventListener`; each of them calls into [`Interceptor`] and applies the
//! outcome (suppress the event, return a stub window, arm a timer).
//!
//! Every entry point re-reads the policy slot and re-checks that the element is
//! still in the document. Callbacks run long after the event that scheduled
//! them, and the page may have changed both in between.

use std::cell::Cell;
use std::rc::Rc;

use crate::classifier::{has_indicator_text, Classifier, FORCE_SAME_TAB_ATTR};
use crate::dom::{ancestors_until_body, closest, describe, is_link, Dom};
use crate::normalizer::clear_new_tab_target;
use crate::policy::PolicySlot;
use crate::sites::{SiteDestination, SiteFamily, SiteTable};
use crate::types::{Decision, InterceptionEvent, Mode};
use crate::url::{hostname_of, is_navigable, resolve};

/// Delay before a heuristic click falls back to a guessed destination.
pub const FALLBACK_DELAY_MS: u32 = 100;

/// Destination attributes checked first by the fallback guess.
const FALLBACK_URL_ATTRIBUTES: [&str; 2] = ["data-job-url", "data-apply-url"];

// =============================================================================
// Platform Seams
// =============================================================================

/// The browsing context the interceptor acts on.
pub trait Host {
    fn current_url(&self) -> String;
    /// Same-tab navigation. Must not throw for malformed input.
    fn navigate(&self, url: &str);
    fn reload(&self);
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> f64;
}

/// Sink for interception events (stats store, popup notification).
/// Fire-and-forget: implementations swallow their own failures.
pub trait Reporter {
    fn report(&self, event: &InterceptionEvent);
}

impl<T: Host + ?Sized> Host for Rc<T> {
    fn current_url(&self) -> String {
        (**self).current_url()
    }

    fn navigate(&self, url: &str) {
        (**self).navigate(url)
    }

    fn reload(&self) {
        (**self).reload()
    }

    fn now_ms(&self) -> f64 {
        (**self).now_ms()
    }
}

impl<T: Reporter + ?Sized> Reporter for Rc<T> {
    fn report(&self, event: &InterceptionEvent) {
        (**self).report(event)
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// What `window.open` hands back to the page instead of a real window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHandle {
    /// Always false, so callers polling `closed` keep going
    pub closed: bool,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    /// Interception is off for this page; call the original primitive.
    PassThrough,
    Intercepted {
        handle: WindowHandle,
        event: Option<InterceptionEvent>,
    },
}

/// Fallback armed for a heuristic click.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackTicket<N> {
    pub element: N,
    pub delay_ms: u32,
    navigations: u64,
    interceptions: u64,
    page_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome<N> {
    /// Let the event continue untouched.
    Ignored,
    /// Prevent the default action and stop all further propagation.
    Suppressed { event: Option<InterceptionEvent> },
    /// Let the event continue; run the ticket after its delay.
    Deferred(FallbackTicket<N>),
}

/// Kind of press seen by the pre-marking handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse { button: i16 },
    Pointer,
    Touch,
}

// =============================================================================
// Interceptor
// =============================================================================

pub struct Interceptor<H, R> {
    policy: PolicySlot,
    sites: Rc<SiteTable>,
    host: H,
    reporter: R,
    navigations: Cell<u64>,
    interceptions: Cell<u64>,
}

impl<H: Host, R: Reporter> Interceptor<H, R> {
    pub fn new(policy: PolicySlot, sites: Rc<SiteTable>, host: H, reporter: R) -> Self {
        Self {
            policy,
            sites,
            host,
            reporter,
            navigations: Cell::new(0),
            interceptions: Cell::new(0),
        }
    }

    pub fn policy(&self) -> &PolicySlot {
        &self.policy
    }

    pub fn sites(&self) -> &SiteTable {
        &self.sites
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn hostname(&self) -> String {
        hostname_of(&self.host.current_url())
    }

    /// Whether the policy lets interception act on the current page.
    pub fn is_active(&self) -> bool {
        self.policy.allows(&self.hostname())
    }

    /// Count of same-tab navigations this interceptor has started.
    pub fn navigations(&self) -> u64 {
        self.navigations.get()
    }

    /// Count of interceptions in either mode.
    pub fn interceptions(&self) -> u64 {
        self.interceptions.get()
    }

    /// Record a navigation started outside the interceptor: stub handle
    /// `location.assign`, or the page itself unloading.
    pub fn note_navigation(&self) {
        self.navigations.set(self.navigations.get() + 1);
    }

    fn classifier(&self) -> Classifier {
        self.policy.with(|policy| Classifier::for_policy(&self.sites, policy))
    }

    fn enhanced(&self) -> bool {
        self.policy.with(|policy| policy.enhanced_job_site_handling)
    }

    /// Apply the current mode to `url` and emit one event.
    pub fn intercept(&self, url: &str, source: &str) -> InterceptionEvent {
        let target_url = resolve(&self.host.current_url(), url);
        let mode = self.policy.with(|policy| policy.mode);
        self.interceptions.set(self.interceptions.get() + 1);

        match mode {
            Mode::Redirect => {
                log::debug!("redirecting {} to same tab: {}", source, target_url);
                self.note_navigation();
                self.host.navigate(&target_url);
            }
            Mode::Block => {
                log::debug!("blocked new tab from {}: {}", source, target_url);
            }
        }

        let event = InterceptionEvent {
            timestamp: self.host.now_ms(),
            target_url,
            source: source.to_string(),
            decision: Decision::from(mode),
        };
        self.reporter.report(&event);
        event
    }

    /// Replacement for `window.open(url, ...)`.
    pub fn window_open(&self, url: Option<&str>) -> OpenOutcome {
        if !self.is_active() {
            return OpenOutcome::PassThrough;
        }

        let raw = url.unwrap_or("");
        if !is_navigable(raw) {
            return OpenOutcome::Intercepted {
                handle: WindowHandle {
                    closed: false,
                    href: raw.to_string(),
                },
                event: None,
            };
        }

        let event = self.intercept(raw, "window.open");
        OpenOutcome::Intercepted {
            handle: WindowHandle {
                closed: false,
                href: event.target_url.clone(),
            },
            event: Some(event),
        }
    }

    /// Capture-phase click at the document root.
    pub fn on_click<D: Dom + ?Sized>(&self, dom: &D, target: &D::Node) -> ClickOutcome<D::Node> {
        if !self.is_active() {
            return ClickOutcome::Ignored;
        }

        let Some(found) = self.classifier().classify(dom, target) else {
            return ClickOutcome::Ignored;
        };

        if let Some(url) = found.signal.extracted_url.as_deref().filter(|_| found.signal.is_immediate()) {
            let event = self.intercept(url, &describe(dom, &found.element));
            return ClickOutcome::Suppressed { event: Some(event) };
        }

        if self.enhanced() {
            let hostname = self.hostname();
            if let Some(family) = self.sites.claiming(dom, &found.element, &hostname) {
                if let Some(outcome) = self.run_site_family(dom, &found.element, family) {
                    return outcome;
                }
            }
        }

        log::debug!("heuristic new-tab click on {}, arming fallback", describe(dom, &found.element));
        ClickOutcome::Deferred(FallbackTicket {
            element: found.element,
            delay_ms: FALLBACK_DELAY_MS,
            navigations: self.navigations(),
            interceptions: self.interceptions(),
            page_url: self.host.current_url(),
        })
    }

    /// Click on an element that received a site-family handler.
    pub fn on_site_button_click<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> ClickOutcome<D::Node> {
        if !self.is_active() || !self.enhanced() || !dom.is_connected(node) {
            return ClickOutcome::Ignored;
        }
        let hostname = self.hostname();
        let family = self
            .sites
            .active(&hostname)
            .find(|family| family.is_handled(dom, node));
        family
            .and_then(|family| self.run_site_family(dom, node, family))
            .unwrap_or(ClickOutcome::Ignored)
    }

    fn run_site_family<D: Dom + ?Sized>(
        &self,
        dom: &D,
        node: &D::Node,
        family: &SiteFamily,
    ) -> Option<ClickOutcome<D::Node>> {
        let page_url = self.host.current_url();
        match family.destination_for(dom, node, &page_url) {
            SiteDestination::Navigate(url) => {
                let source = format!("{} ({})", describe(dom, node), family.name);
                Some(ClickOutcome::Suppressed {
                    event: Some(self.intercept(&url, &source)),
                })
            }
            SiteDestination::Reload => {
                log::warn!("no {} identifier found for {}", family.name, describe(dom, node));
                if self.policy.with(|policy| policy.mode) == Mode::Redirect {
                    self.note_navigation();
                    self.host.reload();
                }
                Some(ClickOutcome::Suppressed { event: None })
            }
            SiteDestination::Nothing => None,
        }
    }

    /// Run an armed fallback. Acts only when nothing navigated or was
    /// intercepted since the click and the element is still attached.
    pub fn fire_fallback<D: Dom + ?Sized>(&self, dom: &D, ticket: &FallbackTicket<D::Node>) -> Option<InterceptionEvent> {
        if !self.is_active() {
            return None;
        }
        if self.navigations() != ticket.navigations || self.host.current_url() != ticket.page_url {
            log::trace!("fallback skipped: navigation already happened");
            return None;
        }
        if self.interceptions() != ticket.interceptions {
            log::trace!("fallback skipped: click already intercepted");
            return None;
        }
        if !dom.is_connected(&ticket.element) {
            log::trace!("fallback skipped: element left the document");
            return None;
        }

        let url = self.guess_destination(dom, &ticket.element)?;
        Some(self.intercept(&url, &describe(dom, &ticket.element)))
    }

    /// Best guess at where a heuristic click wanted to go.
    pub fn guess_destination<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> Option<String> {
        if let Some(url) = FALLBACK_URL_ATTRIBUTES
            .iter()
            .filter_map(|attr| dom.attribute(node, attr))
            .find(|value| !value.trim().is_empty())
        {
            return Some(url);
        }

        let page_url = self.host.current_url();
        if self.enhanced() {
            let hostname = hostname_of(&page_url);
            let found = self
                .sites
                .active(&hostname)
                .find_map(|family| family.identifier_destination(dom, node, &page_url));
            if let Some(url) = found {
                return Some(url);
            }
        }

        for attr in ["data-href", "data-url"] {
            let value = closest(dom, node, |n| dom.has_attribute(n, attr))
                .and_then(|holder| dom.attribute(&holder, attr))
                .filter(|value| !value.trim().is_empty());
            if value.is_some() {
                return value;
            }
        }

        closest(dom, node, |n| dom.tag_name(n) == "A")
            .and_then(|link| dom.resolved_href(&link))
    }

    /// Capture-phase mousedown / pointerdown / touchstart: pre-mark elements
    /// announcing a new tab so the click pass can short-circuit. Returns how
    /// many elements were marked.
    pub fn on_pointer_down<D: Dom + ?Sized>(&self, dom: &D, target: &D::Node, kind: PointerKind) -> usize {
        if let PointerKind::Mouse { button } = kind {
            if button != 0 {
                return 0;
            }
        }
        if !self.is_active() {
            return 0;
        }

        let mut marked = 0;
        for element in ancestors_until_body(dom, target) {
            let tag = dom.tag_name(&element);
            if matches!(kind, PointerKind::Mouse { .. }) && is_link(dom, &element) {
                clear_new_tab_target(dom, &element);
                continue;
            }
            let markable = match kind {
                PointerKind::Mouse { .. } => matches!(tag.as_str(), "BUTTON" | "INPUT"),
                PointerKind::Pointer | PointerKind::Touch => {
                    matches!(tag.as_str(), "BUTTON" | "INPUT" | "DIV" | "SPAN")
                }
            };
            if markable && has_indicator_text(dom, &element) {
                dom.set_attribute(&element, FORCE_SAME_TAB_ATTR, "true");
                marked += 1;
            }
        }
        marked
    }

    /// Runs after a page click listener registered on an anchor. Forces the
    /// anchor's destination into the current tab when it targets a new one,
    /// and clears the target so later listeners on the same click pass.
    pub fn after_link_listener<D: Dom + ?Sized>(&self, dom: &D, anchor: &D::Node) -> Option<InterceptionEvent> {
        if !self.is_active() || !dom.is_connected(anchor) {
            return None;
        }
        let href = dom.resolved_href(anchor)?;
        if !clear_new_tab_target(dom, anchor) {
            return None;
        }
        Some(self.intercept(&href, &describe(dom, anchor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::MemoryDom;
    use crate::testing::{RecordingHost, RecordingReporter};
    use crate::types::Policy;

    type TestInterceptor = Interceptor<Rc<RecordingHost>, Rc<RecordingReporter>>;

    fn setup(url: &str, policy: Policy) -> (TestInterceptor, Rc<RecordingHost>, Rc<RecordingReporter>) {
        let host = Rc::new(RecordingHost::new(url));
        let reporter = Rc::new(RecordingReporter::new("2026-10-19"));
        let interceptor = Interceptor::new(
            PolicySlot::new(policy),
            Rc::new(SiteTable::default()),
            host.clone(),
            reporter.clone(),
        );
        (interceptor, host, reporter)
    }

    #[test]
    fn test_window_open_resolves_relative() {
        let (interceptor, host, reporter) = setup("https://a.com/bar/", Policy::default());
        let OpenOutcome::Intercepted { handle, event } = interceptor.window_open(Some("/foo")) else {
            panic!("expected interception");
        };
        assert!(!handle.closed);
        assert_eq!(handle.href, "https://a.com/foo");
        assert_eq!(event.unwrap().decision, Decision::Redirected);
        assert_eq!(host.navigations(), vec!["https://a.com/foo".to_string()]);
        assert_eq!(reporter.events().len(), 1);
    }

    #[test]
    fn test_window_open_blank_returns_stub_only() {
        let (interceptor, host, reporter) = setup("https://a.com/", Policy::default());
        for url in [None, Some(""), Some("about:blank")] {
            let OpenOutcome::Intercepted { handle, event } = interceptor.window_open(url) else {
                panic!("expected stub");
            };
            assert!(!handle.closed);
            assert!(event.is_none());
        }
        assert!(host.navigations().is_empty());
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_window_open_block_mode() {
        let policy = Policy {
            mode: Mode::Block,
            ..Policy::default()
        };
        let (interceptor, host, reporter) = setup("https://a.com/", policy);
        let OpenOutcome::Intercepted { handle, event } = interceptor.window_open(Some("//b.com/x")) else {
            panic!("expected interception");
        };
        assert_eq!(handle.href, "https://b.com/x");
        assert_eq!(event.unwrap().decision, Decision::Blocked);
        assert!(host.navigations().is_empty());
        assert_eq!(reporter.stats().total_interceptions, 1);
    }

    #[test]
    fn test_window_open_passes_through_on_denied_site() {
        let policy = Policy {
            deny_list: vec!["a.com".to_string()],
            ..Policy::default()
        };
        let (interceptor, host, _) = setup("https://www.a.com/", policy);
        assert_eq!(interceptor.window_open(Some("/foo")), OpenOutcome::PassThrough);
        assert!(host.navigations().is_empty());
    }

    #[test]
    fn test_blank_link_click_navigates_once() {
        let (interceptor, host, reporter) = setup("https://a.com/", Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let link = dom.element(dom.body(), "a", &[("href", "https://x.com/y"), ("target", "_blank")]);
        let label = dom.element(link, "span", &[]);

        let outcome = interceptor.on_click(&dom, &label);
        assert!(matches!(outcome, ClickOutcome::Suppressed { event: Some(_) }));
        assert_eq!(host.navigations(), vec!["https://x.com/y".to_string()]);
        assert_eq!(reporter.events().len(), 1);
        assert_eq!(reporter.events()[0].source, "a");
    }

    #[test]
    fn test_explicit_button_click() {
        let (interceptor, host, _) = setup("https://jobs.example/search", Policy::default());
        let dom = MemoryDom::new("https://jobs.example/search");
        let button = dom.element(
            dom.body(),
            "button",
            &[("aria-label", "Apply now opens in a new tab"), ("data-href", "/job/42")],
        );
        let outcome = interceptor.on_click(&dom, &button);
        assert!(matches!(outcome, ClickOutcome::Suppressed { .. }));
        assert_eq!(host.navigations(), vec!["https://jobs.example/job/42".to_string()]);
    }

    #[test]
    fn test_ordinary_click_ignored() {
        let (interceptor, host, reporter) = setup("https://a.com/", Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let link = dom.element(dom.body(), "a", &[("href", "/next")]);
        assert_eq!(interceptor.on_click(&dom, &link), ClickOutcome::Ignored);
        assert!(host.navigations().is_empty());
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_heuristic_click_defers_then_falls_back() {
        let (interceptor, host, _) = setup("https://jobs.example/", Policy::default());
        let dom = MemoryDom::new("https://jobs.example/");
        let card = dom.element(dom.body(), "div", &[("data-url", "/job/7")]);
        let button = dom.element(card, "button", &[("aria-label", "Apply now opens in a new tab")]);

        let ClickOutcome::Deferred(ticket) = interceptor.on_click(&dom, &button) else {
            panic!("expected deferral");
        };
        assert_eq!(ticket.delay_ms, FALLBACK_DELAY_MS);
        assert!(host.navigations().is_empty());

        let event = interceptor.fire_fallback(&dom, &ticket).unwrap();
        assert_eq!(event.target_url, "https://jobs.example/job/7");
        assert_eq!(host.navigations(), vec!["https://jobs.example/job/7".to_string()]);
    }

    #[test]
    fn test_fallback_skipped_after_window_open() {
        let (interceptor, host, reporter) = setup("https://jobs.example/", Policy::default());
        let dom = MemoryDom::new("https://jobs.example/");
        let link = dom.element(dom.body(), "a", &[("href", "/guess")]);
        let button = dom.element(link, "button", &[("title", "Opens in new window")]);

        let ClickOutcome::Deferred(ticket) = interceptor.on_click(&dom, &button) else {
            panic!("expected deferral");
        };
        // the page's own handler calls the hooked window.open
        interceptor.window_open(Some("/real"));
        assert!(interceptor.fire_fallback(&dom, &ticket).is_none());
        assert_eq!(host.navigations(), vec!["https://jobs.example/real".to_string()]);
        assert_eq!(reporter.events().len(), 1);
    }

    #[test]
    fn test_fallback_skipped_after_blocked_window_open() {
        let policy = Policy {
            mode: Mode::Block,
            ..Policy::default()
        };
        let (interceptor, host, reporter) = setup("https://jobs.example/", policy);
        let dom = MemoryDom::new("https://jobs.example/");
        let link = dom.element(dom.body(), "a", &[("href", "/guess")]);
        let button = dom.element(link, "button", &[("title", "Opens in new window")]);

        let ClickOutcome::Deferred(ticket) = interceptor.on_click(&dom, &button) else {
            panic!("expected deferral");
        };
        interceptor.window_open(Some("/real"));
        assert!(interceptor.fire_fallback(&dom, &ticket).is_none());
        assert!(host.navigations().is_empty());
        assert_eq!(reporter.events().len(), 1);
        assert_eq!(reporter.events()[0].target_url, "https://jobs.example/real");
        assert_eq!(reporter.stats().total_interceptions, 1);
    }

    #[test]
    fn test_fallback_skipped_while_page_unloads() {
        let (interceptor, host, reporter) = setup("https://jobs.example/", Policy::default());
        let dom = MemoryDom::new("https://jobs.example/");
        let link = dom.element(dom.body(), "a", &[("href", "/guess")]);
        let button = dom.element(link, "button", &[("title", "new tab")]);
        let ClickOutcome::Deferred(ticket) = interceptor.on_click(&dom, &button) else {
            panic!("expected deferral");
        };
        // location.href assigned by the page; the URL changes only on commit
        interceptor.note_navigation();
        assert!(interceptor.fire_fallback(&dom, &ticket).is_none());
        assert!(host.navigations().is_empty());
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_fallback_skipped_when_page_navigated_itself() {
        let (interceptor, host, _) = setup("https://jobs.example/", Policy::default());
        let dom = MemoryDom::new("https://jobs.example/");
        let link = dom.element(dom.body(), "a", &[("href", "/guess")]);
        let button = dom.element(link, "button", &[("title", "new tab")]);
        let ClickOutcome::Deferred(ticket) = interceptor.on_click(&dom, &button) else {
            panic!("expected deferral");
        };
        host.set_url("https://jobs.example/elsewhere");
        assert!(interceptor.fire_fallback(&dom, &ticket).is_none());
    }

    #[test]
    fn test_fallback_skipped_for_removed_element() {
        let (interceptor, _, _) = setup("https://jobs.example/", Policy::default());
        let dom = MemoryDom::new("https://jobs.example/");
        let link = dom.element(dom.body(), "a", &[("href", "/guess")]);
        let button = dom.element(link, "button", &[("title", "new tab")]);
        let ClickOutcome::Deferred(ticket) = interceptor.on_click(&dom, &button) else {
            panic!("expected deferral");
        };
        dom.remove(link);
        assert!(interceptor.fire_fallback(&dom, &ticket).is_none());
    }

    #[test]
    fn test_fallback_uses_closest_anchor() {
        let (interceptor, _, _) = setup("https://jobs.example/", Policy::default());
        let dom = MemoryDom::new("https://jobs.example/");
        let link = dom.element(dom.body(), "a", &[("href", "/guess")]);
        let button = dom.element(link, "button", &[("title", "new tab")]);
        assert_eq!(
            interceptor.guess_destination(&dom, &button).as_deref(),
            Some("https://jobs.example/guess")
        );
    }

    #[test]
    fn test_site_family_button_is_immediate() {
        let (interceptor, host, _) = setup("https://www.indeed.com/jobs?q=rust", Policy::default());
        let dom = MemoryDom::new("https://www.indeed.com/jobs?q=rust");
        let card = dom.element(dom.body(), "div", &[("data-jk", "abc123")]);
        let button = dom.element(card, "button", &[("data-testid", "indeedApplyButton-test")]);

        let outcome = interceptor.on_click(&dom, &button);
        assert!(matches!(outcome, ClickOutcome::Suppressed { event: Some(_) }));
        assert_eq!(host.navigations(), vec!["https://www.indeed.com/viewjob?jk=abc123".to_string()]);
    }

    #[test]
    fn test_site_button_handler_reloads_without_identifier() {
        let (interceptor, host, reporter) = setup("https://www.indeed.com/", Policy::default());
        let dom = MemoryDom::new("https://www.indeed.com/");
        let button = dom.element(dom.body(), "button", &[("data-indeed-handler-added", "true")]);

        let outcome = interceptor.on_site_button_click(&dom, &button);
        assert_eq!(outcome, ClickOutcome::Suppressed { event: None });
        assert_eq!(host.reloads(), 1);
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_site_button_handler_respects_policy() {
        let policy = Policy {
            enhanced_job_site_handling: false,
            ..Policy::default()
        };
        let (interceptor, host, _) = setup("https://www.indeed.com/", policy);
        let dom = MemoryDom::new("https://www.indeed.com/");
        let button = dom.element(dom.body(), "button", &[("data-indeed-handler-added", "true")]);
        assert_eq!(interceptor.on_site_button_click(&dom, &button), ClickOutcome::Ignored);
        assert_eq!(host.reloads(), 0);
    }

    #[test]
    fn test_pointer_down_premarks() {
        let (interceptor, _, _) = setup("https://a.com/", Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let tile = dom.element(dom.body(), "div", &[("aria-label", "Open in new tab")]);
        let button = dom.element(tile, "button", &[("title", "New Window")]);
        let icon = dom.element(button, "svg", &[]);

        assert_eq!(interceptor.on_pointer_down(&dom, &icon, PointerKind::Pointer), 2);
        assert_eq!(dom.attribute(&tile, FORCE_SAME_TAB_ATTR).as_deref(), Some("true"));

        let dom = MemoryDom::new("https://a.com/");
        let tile = dom.element(dom.body(), "div", &[("aria-label", "Open in new tab")]);
        let button = dom.element(tile, "button", &[("title", "New Window")]);
        assert_eq!(interceptor.on_pointer_down(&dom, &button, PointerKind::Mouse { button: 0 }), 1);
        assert!(!dom.has_attribute(&tile, FORCE_SAME_TAB_ATTR));
    }

    #[test]
    fn test_mouse_down_strips_link_targets() {
        let (interceptor, _, _) = setup("https://a.com/", Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let link = dom.element(dom.body(), "a", &[("href", "/x"), ("target", "_blank")]);

        interceptor.on_pointer_down(&dom, &link, PointerKind::Mouse { button: 1 });
        assert!(dom.has_attribute(&link, "target"));
        interceptor.on_pointer_down(&dom, &link, PointerKind::Mouse { button: 0 });
        assert!(!dom.has_attribute(&link, "target"));
    }

    #[test]
    fn test_premarked_button_short_circuits() {
        let (interceptor, _, _) = setup("https://a.com/", Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let button = dom.element(dom.body(), "button", &[(FORCE_SAME_TAB_ATTR, "true"), ("data-link", "/go")]);
        assert!(matches!(interceptor.on_click(&dom, &button), ClickOutcome::Suppressed { .. }));
    }

    #[test]
    fn test_after_link_listener() {
        let (interceptor, host, _) = setup("https://a.com/", Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let blank = dom.element(dom.body(), "a", &[("href", "/b"), ("target", "_blank")]);
        let plain = dom.element(dom.body(), "a", &[("href", "/p")]);

        assert!(interceptor.after_link_listener(&dom, &plain).is_none());
        let event = interceptor.after_link_listener(&dom, &blank).unwrap();
        assert_eq!(event.target_url, "https://a.com/b");
        assert!(!dom.has_attribute(&blank, "target"));
        // a second listener on the same anchor
        assert!(interceptor.after_link_listener(&dom, &blank).is_none());
        assert_eq!(host.navigations(), vec!["https://a.com/b".to_string()]);
    }

    #[test]
    fn test_policy_update_seen_by_later_clicks() {
        let (interceptor, host, _) = setup("https://a.com/", Policy::default());
        let dom = MemoryDom::new("https://a.com/");
        let link = dom.element(dom.body(), "a", &[("href", "/x"), ("target", "_blank")]);

        interceptor.policy().replace(Policy {
            mode: Mode::Block,
            ..Policy::default()
        });
        let ClickOutcome::Suppressed { event: Some(event) } = interceptor.on_click(&dom, &link) else {
            panic!("expected suppression");
        };
        assert_eq!(event.decision, Decision::Blocked);
        assert!(host.navigations().is_empty());
    }

    #[test]
    fn test_stats_across_day_boundary() {
        let (interceptor, _, reporter) = setup("https://a.com/", Policy::default());
        interceptor.window_open(Some("/1"));
        interceptor.window_open(Some("/2"));
        assert_eq!(reporter.stats().today_interceptions, 2);

        reporter.set_today("2026-10-20");
        interceptor.window_open(Some("/3"));
        let stats = reporter.stats();
        assert_eq!(stats.today_interceptions, 1);
        assert_eq!(stats.total_interceptions, 3);
    }
}
