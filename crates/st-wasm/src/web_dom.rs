//! [`Dom`] over the live page document.

use st_core::dom::{Dom, Selector};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, NodeList};

pub struct WebDom {
    document: Document,
    root: Element,
}

impl WebDom {
    /// `None` before the parser has created the root element.
    pub fn new(document: Document) -> Option<Self> {
        let root = document.document_element()?;
        Some(Self { document, root })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

/// Elements of a node list, skipping anything that is not an element.
pub fn elements(list: &NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

impl Dom for WebDom {
    type Node = Element;

    fn document_element(&self) -> Element {
        // pages may replace the root element (document.open, full rewrites)
        self.document.document_element().unwrap_or_else(|| self.root.clone())
    }

    fn base_url(&self) -> String {
        self.document
            .base_uri()
            .ok()
            .flatten()
            .or_else(|| self.document.url().ok())
            .unwrap_or_default()
    }

    fn tag_name(&self, node: &Element) -> String {
        node.tag_name().to_ascii_uppercase()
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&self, node: &Element, name: &str, value: &str) {
        if let Err(err) = node.set_attribute(name, value) {
            log::warn!("set_attribute({}) failed: {:?}", name, err);
        }
    }

    fn remove_attribute(&self, node: &Element, name: &str) {
        if let Err(err) = node.remove_attribute(name) {
            log::warn!("remove_attribute({}) failed: {:?}", name, err);
        }
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn is_body(&self, node: &Element) -> bool {
        node.tag_name().eq_ignore_ascii_case("body")
    }

    fn is_connected(&self, node: &Element) -> bool {
        node.is_connected()
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn descendants(&self, root: &Element) -> Vec<Element> {
        root.query_selector_all("*")
            .map(|list| elements(&list))
            .unwrap_or_default()
    }

    fn query_all(&self, root: &Element, selector: &Selector) -> Vec<Element> {
        let css = selector.to_css();
        let mut found = Vec::new();
        if root.matches(&css).unwrap_or(false) {
            found.push(root.clone());
        }
        match root.query_selector_all(&css) {
            Ok(list) => found.extend(elements(&list)),
            Err(err) => log::warn!("invalid selector {:?}: {:?}", css, err),
        }
        found
    }
}
