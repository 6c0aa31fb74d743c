//! Intent classification
//!
//! Decides from markup alone whether an interaction was meant to open a new
//! browsing context. Only reads attributes; never mutates the document.

use crate::dom::{ancestors_until_body, Dom};
use crate::normalizer::is_new_tab_target;
use crate::sites::SiteTable;
use crate::types::{ElementIntentSignal, Policy};

/// Pre-mark placed by pointer handlers and the aggressive pass.
pub const FORCE_SAME_TAB_ATTR: &str = "data-force-same-tab";

/// Attributes that may carry a button's destination, highest priority first.
pub const DIRECT_URL_ATTRIBUTES: [&str; 5] = ["data-href", "data-url", "data-link", "href", "data-target-url"];

/// Lower-case phrases in `aria-label`/`title` announcing a new tab.
pub const INDICATOR_PHRASES: [&str; 2] = ["new tab", "new window"];

/// A decision together with the element that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification<N> {
    pub element: N,
    pub signal: ElementIntentSignal,
}

/// Classifier configured with job-site markers.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    markers: Vec<String>,
}

impl Classifier {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    /// Markers come from the site table, and only with enhanced handling on.
    pub fn for_policy(sites: &SiteTable, policy: &Policy) -> Self {
        if policy.enhanced_job_site_handling {
            Self::new(sites.markers())
        } else {
            Self::default()
        }
    }

    /// Walk from `node` towards the body; the innermost element with a
    /// decision wins. `None` means unknown.
    pub fn classify<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> Option<Classification<D::Node>> {
        ancestors_until_body(dom, node).find_map(|element| {
            self.classify_element(dom, &element)
                .map(|signal| Classification { element, signal })
        })
    }

    /// Decision for a single element, without looking at its ancestors.
    pub fn classify_element<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> Option<ElementIntentSignal> {
        match dom.tag_name(node).as_str() {
            "A" | "AREA" => {
                if !link_opens_new_tab(dom, node) {
                    return None;
                }
                dom.resolved_href(node).map(ElementIntentSignal::explicit)
            }
            "BUTTON" | "INPUT" => {
                if !self.indicates_new_tab(dom, node) {
                    return None;
                }
                Some(match direct_url(dom, node) {
                    Some(url) => ElementIntentSignal::explicit(url),
                    None => ElementIntentSignal::heuristic(),
                })
            }
            _ if is_premarked(dom, node) => Some(ElementIntentSignal::heuristic()),
            _ => None,
        }
    }

    /// Text indicator, job-site marker, or an earlier pre-mark.
    pub fn indicates_new_tab<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> bool {
        is_premarked(dom, node) || has_indicator_text(dom, node) || self.has_job_site_marker(dom, node)
    }

    fn has_job_site_marker<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> bool {
        if self.markers.is_empty() {
            return false;
        }
        ["data-testid", "id"]
            .iter()
            .filter_map(|attr| dom.attribute(node, attr))
            .any(|value| self.markers.iter().any(|marker| value.contains(marker.as_str())))
    }
}

/// `target` is a new-tab value, or `rel` contains `noopener`/`external`.
pub fn link_opens_new_tab<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> bool {
    if dom.attribute(node, "target").is_some_and(|target| is_new_tab_target(&target)) {
        return true;
    }
    dom.attribute(node, "rel")
        .is_some_and(|rel| rel.contains("noopener") || rel.contains("external"))
}

/// "new tab" / "new window" in `aria-label` or `title`, any case.
pub fn has_indicator_text<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> bool {
    ["aria-label", "title"]
        .iter()
        .filter_map(|attr| dom.attribute(node, attr))
        .map(|text| text.to_lowercase())
        .any(|text| INDICATOR_PHRASES.iter().any(|phrase| text.contains(phrase)))
}

/// First non-empty destination attribute, as written.
pub fn direct_url<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> Option<String> {
    DIRECT_URL_ATTRIBUTES
        .iter()
        .filter_map(|attr| dom.attribute(node, attr))
        .find(|value| !value.trim().is_empty())
}

pub fn is_premarked<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> bool {
    dom.attribute(node, FORCE_SAME_TAB_ATTR).as_deref() == Some("true")
}
