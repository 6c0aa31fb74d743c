//! In-memory document used by the test suites.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Removing a node only
//! detaches it, so stale handles stay valid and report `is_connected() == false`
//! the way a real element does after the page drops it.

use std::cell::RefCell;

use super::Dom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

pub struct MemoryDom {
    base_url: String,
    nodes: RefCell<Vec<NodeData>>,
    root: NodeId,
    body: NodeId,
}

impl MemoryDom {
    /// Empty `<html><body></body></html>` document at `base_url`.
    pub fn new(base_url: &str) -> Self {
        let nodes = vec![
            NodeData {
                tag: "HTML".to_string(),
                attributes: Vec::new(),
                parent: None,
                children: vec![NodeId(1)],
            },
            NodeData {
                tag: "BODY".to_string(),
                attributes: Vec::new(),
                parent: Some(NodeId(0)),
                children: Vec::new(),
            },
        ];
        Self {
            base_url: base_url.to_string(),
            nodes: RefCell::new(nodes),
            root: NodeId(0),
            body: NodeId(1),
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Detached element.
    pub fn create(&self, tag: &str) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(NodeData {
            tag: tag.to_ascii_uppercase(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
        });
        NodeId(nodes.len() - 1)
    }

    pub fn append(&self, parent: NodeId, child: NodeId) {
        self.remove(child);
        let mut nodes = self.nodes.borrow_mut();
        nodes[child.0].parent = Some(parent);
        nodes[parent.0].children.push(child);
    }

    /// Create an element with attributes and append it to `parent`.
    pub fn element(&self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let node = self.create(tag);
        for (name, value) in attributes {
            self.set_attribute(&node, name, value);
        }
        self.append(parent, node);
        node
    }

    /// Detach a node (and its subtree) from its parent.
    pub fn remove(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[node.0].parent.take() {
            nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.nodes.borrow()[node.0].attributes.clone()
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn document_element(&self) -> NodeId {
        self.root
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.nodes.borrow()[node.0].tag.clone()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.nodes.borrow()[node.0]
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) {
        let mut nodes = self.nodes.borrow_mut();
        let attributes = &mut nodes[node.0].attributes;
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_attribute(&self, node: &NodeId, name: &str) {
        self.nodes.borrow_mut()[node.0]
            .attributes
            .retain(|(key, _)| key != name);
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes.borrow()[node.0].parent
    }

    fn is_body(&self, node: &NodeId) -> bool {
        *node == self.body
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let mut current = *node;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(&current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map(|value| value.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    fn descendants(&self, root: &NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = nodes[root.0].children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(nodes[node.0].children.iter().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descendants_in_document_order() {
        let dom = MemoryDom::new("https://example.com/");
        let first = dom.element(dom.body(), "div", &[]);
        let nested = dom.element(first, "a", &[]);
        let second = dom.element(dom.body(), "form", &[]);
        assert_eq!(dom.descendants(&dom.body()), vec![first, nested, second]);
    }

    #[test]
    fn test_removed_node_is_disconnected() {
        let dom = MemoryDom::new("https://example.com/");
        let outer = dom.element(dom.body(), "div", &[]);
        let inner = dom.element(outer, "button", &[]);
        assert!(dom.is_connected(&inner));
        dom.remove(outer);
        assert!(!dom.is_connected(&inner));
        assert!(!dom.descendants(&dom.body()).contains(&inner));
    }

    #[test]
    fn test_attribute_overwrite() {
        let dom = MemoryDom::new("https://example.com/");
        let link = dom.element(dom.body(), "a", &[("rel", "noopener")]);
        dom.set_attribute(&link, "rel", "nofollow");
        assert_eq!(dom.attributes(link), vec![("rel".to_string(), "nofollow".to_string())]);
    }
}
