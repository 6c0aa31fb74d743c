//! Link/attribute normalization
//!
//! Removes the markup that asks the browser for a new browsing context. Every
//! pass re-queries the live document, so it can run any number of times while
//! the page keeps mutating.

use crate::dom::{Dom, Selector};

/// `target` values that request a new browsing context. Case-sensitive.
pub const NEW_TAB_TARGETS: [&str; 3] = ["_blank", "_new", "blank"];

/// `rel` tokens stripped from de-targeted links.
pub const STRIPPED_REL_TOKENS: [&str; 3] = ["noopener", "noreferrer", "external"];

#[inline]
pub fn is_new_tab_target(value: &str) -> bool {
    NEW_TAB_TARGETS.contains(&value)
}

/// Strip new-tab `target`s (and the matching `rel` tokens) from links, areas
/// and forms in the subtree rooted at `root`, root included.
///
/// Never removes `href` and never removes elements.
pub fn normalize<D: Dom + ?Sized>(dom: &D, root: &D::Node) {
    let mut touched = 0usize;

    for tag in ["a", "area"] {
        for link in dom.query_all(root, &Selector::tag(tag).with_attr("target")) {
            if clear_new_tab_target(dom, &link) {
                strip_rel_tokens(dom, &link);
                touched += 1;
            }
        }
    }

    for form in dom.query_all(root, &Selector::tag("form").with_attr("target")) {
        if clear_new_tab_target(dom, &form) {
            touched += 1;
        }
    }

    if touched > 0 {
        log::trace!("normalized {} element(s)", touched);
    }
}

/// Remove `target="_blank"` from every element under `root`, whatever its tag.
pub fn strip_blank_targets<D: Dom + ?Sized>(dom: &D, root: &D::Node) -> usize {
    let found = dom.query_all(root, &Selector::any().with_attr_equals("target", "_blank"));
    for node in &found {
        dom.remove_attribute(node, "target");
    }
    found.len()
}

/// Remove `target` when it holds a new-tab value. Returns whether it did.
pub fn clear_new_tab_target<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> bool {
    match dom.attribute(node, "target") {
        Some(target) if is_new_tab_target(&target) => {
            dom.remove_attribute(node, "target");
            true
        }
        _ => false,
    }
}

fn strip_rel_tokens<D: Dom + ?Sized>(dom: &D, node: &D::Node) {
    let Some(rel) = dom.attribute(node, "rel") else {
        return;
    };
    match filter_rel(&rel) {
        None => dom.remove_attribute(node, "rel"),
        Some(kept) if kept != rel => dom.set_attribute(node, "rel", &kept),
        Some(_) => {}
    }
}

/// `rel` with the new-tab tokens removed; `None` when nothing is left.
pub fn filter_rel(rel: &str) -> Option<String> {
    let kept: Vec<&str> = rel
        .split_ascii_whitespace()
        .filter(|token| !STRIPPED_REL_TOKENS.contains(token))
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::MemoryDom;

    #[test]
    fn test_blank_target_removed_and_idempotent() {
        let dom = MemoryDom::new("https://example.com/");
        let link = dom.element(dom.body(), "a", &[("href", "/x"), ("target", "_blank")]);

        normalize(&dom, &dom.document_element());
        assert!(!dom.has_attribute(&link, "target"));
        let after_first = dom.attributes(link);

        normalize(&dom, &dom.document_element());
        assert_eq!(dom.attributes(link), after_first);
        assert_eq!(dom.attribute(&link, "href").as_deref(), Some("/x"));
    }

    #[test]
    fn test_rel_tokens_filtered() {
        let dom = MemoryDom::new("https://example.com/");
        let link = dom.element(dom.body(), "a", &[("target", "_blank"), ("rel", "noopener external foo")]);
        normalize(&dom, &dom.body());
        assert_eq!(dom.attribute(&link, "rel").as_deref(), Some("foo"));
    }

    #[test]
    fn test_rel_removed_when_empty() {
        let dom = MemoryDom::new("https://example.com/");
        let area = dom.element(dom.body(), "area", &[("target", "_new"), ("rel", "noopener noreferrer")]);
        normalize(&dom, &dom.body());
        assert!(!dom.has_attribute(&area, "target"));
        assert!(!dom.has_attribute(&area, "rel"));
    }

    #[test]
    fn test_other_targets_untouched() {
        let dom = MemoryDom::new("https://example.com/");
        let framed = dom.element(dom.body(), "a", &[("target", "content"), ("rel", "noopener")]);
        let upper = dom.element(dom.body(), "a", &[("target", "_BLANK")]);
        normalize(&dom, &dom.body());
        assert_eq!(dom.attribute(&framed, "target").as_deref(), Some("content"));
        assert_eq!(dom.attribute(&framed, "rel").as_deref(), Some("noopener"));
        assert_eq!(dom.attribute(&upper, "target").as_deref(), Some("_BLANK"));
    }

    #[test]
    fn test_forms_and_root() {
        let dom = MemoryDom::new("https://example.com/");
        let form = dom.element(dom.body(), "form", &[("target", "blank")]);
        normalize(&dom, &form);
        assert!(!dom.has_attribute(&form, "target"));
    }

    #[test]
    fn test_scoped_to_subtree() {
        let dom = MemoryDom::new("https://example.com/");
        let inside = dom.element(dom.body(), "div", &[]);
        let inner = dom.element(inside, "a", &[("target", "_blank")]);
        let outer = dom.element(dom.body(), "a", &[("target", "_blank")]);
        normalize(&dom, &inside);
        assert!(!dom.has_attribute(&inner, "target"));
        assert!(dom.has_attribute(&outer, "target"));
    }

    #[test]
    fn test_strip_blank_targets_any_tag() {
        let dom = MemoryDom::new("https://example.com/");
        let button = dom.element(dom.body(), "button", &[("target", "_blank")]);
        let kept = dom.element(dom.body(), "a", &[("target", "_new")]);
        assert_eq!(strip_blank_targets(&dom, &dom.document_element()), 1);
        assert!(!dom.has_attribute(&button, "target"));
        assert!(dom.has_attribute(&kept, "target"));
    }

    #[test]
    fn test_filter_rel() {
        assert_eq!(filter_rel("noopener external foo").as_deref(), Some("foo"));
        assert_eq!(filter_rel("nofollow  noreferrer sponsored").as_deref(), Some("nofollow sponsored"));
        assert_eq!(filter_rel("noopener"), None);
        assert_eq!(filter_rel(""), None);
    }
}
