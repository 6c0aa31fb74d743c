//! Document access for the interception engine
//!
//! The engine never touches a browser directly. It reads and mutates the page
//! through [`Dom`], which the wasm bindings implement over `web_sys` and the
//! tests implement over [`memory::MemoryDom`].
//!
//! Implementations must not hand out cached node lists: every query reflects
//! the document as it is at the time of the call, because the host page keeps
//! mutating it between our passes.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::url::resolve;

// =============================================================================
// Dom Trait
// =============================================================================

/// Live view of a page document.
///
/// Methods take `&self`; the document is shared with the host page and
/// implementations use interior mutability where they need it.
pub trait Dom {
    /// Handle to an element. Cheap to clone, compared by identity.
    type Node: Clone + PartialEq + std::fmt::Debug;

    /// The `<html>` element.
    fn document_element(&self) -> Self::Node;

    /// Base URL that relative references resolve against.
    fn base_url(&self) -> String;

    /// Upper-case tag name (`A`, `BUTTON`, ...).
    fn tag_name(&self, node: &Self::Node) -> String;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);

    fn remove_attribute(&self, node: &Self::Node, name: &str);

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn is_body(&self, node: &Self::Node) -> bool;

    /// Whether the element is still attached to the document.
    fn is_connected(&self, node: &Self::Node) -> bool;

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;

    /// All elements below `root` in document order, `root` excluded.
    fn descendants(&self, root: &Self::Node) -> Vec<Self::Node>;

    fn has_attribute(&self, node: &Self::Node, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// `href` resolved against the base URL.
    fn resolved_href(&self, node: &Self::Node) -> Option<String> {
        let href = self.attribute(node, "href")?;
        if href.trim().is_empty() {
            return None;
        }
        Some(resolve(&self.base_url(), &href))
    }

    /// Elements matching `selector` in the subtree rooted at `root`, root included.
    fn query_all(&self, root: &Self::Node, selector: &Selector) -> Vec<Self::Node> {
        let mut found = Vec::new();
        if selector.matches(self, root) {
            found.push(root.clone());
        }
        found.extend(
            self.descendants(root)
                .into_iter()
                .filter(|node| selector.matches(self, node)),
        );
        found
    }

    /// Elements matching `selector` anywhere in the document.
    fn query_document(&self, selector: &Selector) -> Vec<Self::Node> {
        self.query_all(&self.document_element(), selector)
    }
}

// =============================================================================
// Traversal Helpers
// =============================================================================

/// Iterator from an element up to, but not including, the body.
pub struct Ancestors<'a, D: Dom + ?Sized> {
    dom: &'a D,
    next: Option<D::Node>,
}

impl<'a, D: Dom + ?Sized> Iterator for Ancestors<'a, D> {
    type Item = D::Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next.take()?;
        if self.dom.is_body(&node) {
            return None;
        }
        self.next = self.dom.parent(&node);
        Some(node)
    }
}

/// The element itself followed by its ancestors, stopping below the body.
pub fn ancestors_until_body<'a, D: Dom + ?Sized>(dom: &'a D, node: &D::Node) -> Ancestors<'a, D> {
    Ancestors {
        dom,
        next: Some(node.clone()),
    }
}

/// Nearest inclusive ancestor satisfying `predicate`. Walks to the root.
pub fn closest<D, F>(dom: &D, node: &D::Node, mut predicate: F) -> Option<D::Node>
where
    D: Dom + ?Sized,
    F: FnMut(&D::Node) -> bool,
{
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if predicate(&candidate) {
            return Some(candidate);
        }
        current = dom.parent(&candidate);
    }
    None
}

/// Short human-readable description (`button#apply.primary`) for logs and events.
pub fn describe<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> String {
    let mut out = dom.tag_name(node).to_ascii_lowercase();
    if let Some(id) = dom.attribute(node, "id").filter(|id| !id.is_empty()) {
        out.push('#');
        out.push_str(&id);
    }
    if let Some(class) = dom.attribute(node, "class") {
        if let Some(first) = class.split_ascii_whitespace().next() {
            out.push('.');
            out.push_str(first);
        }
    }
    out
}

/// Whether the element is `<a>` or `<area>`.
pub fn is_link<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> bool {
    matches!(dom.tag_name(node).as_str(), "A" | "AREA")
}

// =============================================================================
// Selectors
// =============================================================================

/// Attribute condition of a [`Selector`]. With neither `equals` nor
/// `contains` set it only requires the attribute to be present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeFilter {
    pub name: String,
    pub equals: Option<String>,
    /// Case-sensitive substring, like CSS `*=`
    pub contains: Option<String>,
}

impl AttributeFilter {
    fn accepts(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        if let Some(expected) = &self.equals {
            return value == expected;
        }
        if let Some(needle) = &self.contains {
            return !needle.is_empty() && value.contains(needle.as_str());
        }
        true
    }
}

/// Small selector subset: optional tag, class, one attribute condition and an
/// ancestor class. Enough for the site table, and translatable to CSS so the
/// browser can run it natively.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Selector {
    /// Lower-case tag name; `None` matches any element
    pub tag: Option<String>,
    pub class: Option<String>,
    pub attribute: Option<AttributeFilter>,
    /// Some strict ancestor must carry this class
    pub within_class: Option<String>,
}

impl Selector {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str) -> Self {
        self.attribute = Some(AttributeFilter {
            name: name.to_string(),
            ..AttributeFilter::default()
        });
        self
    }

    pub fn with_attr_equals(mut self, name: &str, value: &str) -> Self {
        self.attribute = Some(AttributeFilter {
            name: name.to_string(),
            equals: Some(value.to_string()),
            contains: None,
        });
        self
    }

    pub fn with_attr_contains(mut self, name: &str, value: &str) -> Self {
        self.attribute = Some(AttributeFilter {
            name: name.to_string(),
            equals: None,
            contains: Some(value.to_string()),
        });
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn within(mut self, class: &str) -> Self {
        self.within_class = Some(class.to_string());
        self
    }

    /// Evaluate against one element.
    pub fn matches<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> bool {
        if let Some(tag) = &self.tag {
            if !dom.tag_name(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(class) = &self.class {
            if !dom.has_class(node, class) {
                return false;
            }
        }
        if let Some(filter) = &self.attribute {
            if !filter.accepts(dom.attribute(node, &filter.name).as_deref()) {
                return false;
            }
        }
        if let Some(class) = &self.within_class {
            let mut current = dom.parent(node);
            loop {
                match current {
                    Some(parent) if dom.has_class(&parent, class) => break,
                    Some(parent) => current = dom.parent(&parent),
                    None => return false,
                }
            }
        }
        true
    }

    /// Equivalent CSS selector.
    pub fn to_css(&self) -> String {
        let mut css = String::new();
        if let Some(class) = &self.within_class {
            css.push('.');
            css.push_str(class);
            css.push(' ');
        }
        let start = css.len();
        if let Some(tag) = &self.tag {
            css.push_str(tag);
        }
        if let Some(class) = &self.class {
            css.push('.');
            css.push_str(class);
        }
        if let Some(filter) = &self.attribute {
            css.push('[');
            css.push_str(&filter.name);
            if let Some(value) = &filter.equals {
                css.push_str("=\"");
                css.push_str(&escape_css_string(value));
                css.push('"');
            } else if let Some(value) = &filter.contains {
                css.push_str("*=\"");
                css.push_str(&escape_css_string(value));
                css.push('"');
            }
            css.push(']');
        }
        if css.len() == start {
            css.push('*');
        }
        css
    }
}

fn escape_css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
