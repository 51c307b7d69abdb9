//! Shared element tree handles.
//!
//! A [`Node`] is a cheap, clonable handle to an element or text node. Children
//! are owned by their parent; the parent link is weak so detached subtrees are
//! freed as soon as the last handle goes away.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::markup;

/// Callback invoked by [`Node::dispatch_event`].
pub type EventListener = Rc<dyn Fn(&Event)>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Element(String),
    Text,
}

struct NodeData {
    kind: NodeKind,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<Node>>,
    attributes: RefCell<Vec<(String, String)>>,
    text: RefCell<String>,
    listeners: RefCell<Vec<(String, EventListener)>>,
}

/// A handle to a node in the element tree.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

impl Node {
    fn with_kind(kind: NodeKind, text: String) -> Self {
        Node(Rc::new(NodeData {
            kind,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            attributes: RefCell::new(Vec::new()),
            text: RefCell::new(text),
            listeners: RefCell::new(Vec::new()),
        }))
    }

    /// Create a detached element. Tag names are lowercased.
    pub fn element(tag: &str) -> Self {
        Self::with_kind(NodeKind::Element(tag.to_ascii_lowercase()), String::new())
    }

    /// Create a detached text node.
    pub fn text(data: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Text, data.into())
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        self.0.kind == NodeKind::Text
    }

    /// Tag name for elements, `None` for text nodes.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element(tag) => Some(tag),
            NodeKind::Text => None,
        }
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .attributes
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.attributes.borrow().iter().any(|(n, _)| n == name)
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut attrs = self.0.attributes.borrow_mut();
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        let mut attrs = self.0.attributes.borrow_mut();
        let index = attrs.iter().position(|(n, _)| n == name)?;
        Some(attrs.remove(index).1)
    }

    /// Snapshot of the attributes in source order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.0.attributes.borrow().clone()
    }

    // ---------------------------------------------------------------------
    // Text
    // ---------------------------------------------------------------------

    /// Text data for text nodes; concatenated descendant text for elements.
    pub fn text_content(&self) -> String {
        match self.0.kind {
            NodeKind::Text => self.0.text.borrow().clone(),
            NodeKind::Element(_) => self.children().iter().map(Node::text_content).collect(),
        }
    }

    /// Replace the text data of a text node, or all children of an element
    /// with a single text node.
    pub fn set_text_content(&self, text: impl Into<String>) {
        let text = text.into();
        match self.0.kind {
            NodeKind::Text => *self.0.text.borrow_mut() = text,
            NodeKind::Element(_) => {
                self.clear_children();
                if !text.is_empty() {
                    self.append_child(&Node::text(text));
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Tree structure
    // ---------------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    /// Snapshot of the child list.
    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn element_children(&self) -> Vec<Node> {
        self.0
            .children
            .borrow()
            .iter()
            .filter(|c| c.is_element())
            .cloned()
            .collect()
    }

    pub fn first_element_child(&self) -> Option<Node> {
        self.0.children.borrow().iter().find(|c| c.is_element()).cloned()
    }

    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let index = parent.0.children.borrow().iter().position(|c| c.ptr_eq(self));
        index
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = self.index_in_parent()?;
        let sibling = parent.0.children.borrow().get(index + 1).cloned();
        sibling
    }

    /// Remove this node from its parent, if it has one.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.0.children.borrow_mut().retain(|c| !c.ptr_eq(self));
        }
        *self.0.parent.borrow_mut() = Weak::new();
    }

    pub fn append_child(&self, child: &Node) {
        child.detach();
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.clone());
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`
    /// or not a child of this node.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        child.detach();
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        let mut children = self.0.children.borrow_mut();
        let index = reference
            .and_then(|r| children.iter().position(|c| c.ptr_eq(r)))
            .unwrap_or(children.len());
        children.insert(index, child.clone());
    }

    /// Insert `child` directly after `reference`.
    pub fn insert_after(&self, child: &Node, reference: &Node) {
        match reference.next_sibling() {
            Some(next) => self.insert_before(child, Some(&next)),
            None => self.append_child(child),
        }
    }

    /// Remove `child`; returns false if it was not a child of this node.
    pub fn remove_child(&self, child: &Node) -> bool {
        let is_child = child.parent().is_some_and(|p| p.ptr_eq(self));
        if is_child {
            child.detach();
        }
        is_child
    }

    pub fn replace_child(&self, new_child: &Node, old_child: &Node) -> bool {
        if !old_child.parent().is_some_and(|p| p.ptr_eq(self)) {
            return false;
        }
        self.insert_before(new_child, Some(old_child));
        old_child.detach();
        true
    }

    pub fn clear_children(&self) {
        let children = std::mem::take(&mut *self.0.children.borrow_mut());
        for child in children {
            *child.0.parent.borrow_mut() = Weak::new();
        }
    }

    /// Copy this node. Listeners are never copied.
    pub fn clone_node(&self, deep: bool) -> Node {
        let copy = Node::with_kind(self.0.kind.clone(), self.0.text.borrow().clone());
        *copy.0.attributes.borrow_mut() = self.attributes();
        if deep {
            for child in self.children() {
                copy.append_child(&child.clone_node(true));
            }
        }
        copy
    }

    /// All descendant text nodes in document order.
    pub fn text_nodes(&self) -> Vec<Node> {
        let mut out = Vec::new();
        collect_text(self, &mut out);
        out
    }

    /// Depth-first, pre-order walk over this element and its descendant
    /// elements.
    pub fn walk_elements(&self, visit: &mut dyn FnMut(&Node)) {
        if !self.is_element() {
            return;
        }
        visit(self);
        for child in self.children() {
            child.walk_elements(visit);
        }
    }

    /// First element (pre-order, self included) carrying `attribute`.
    pub fn find_by_attribute(&self, attribute: &str) -> Option<Node> {
        let mut found = None;
        self.walk_elements(&mut |el| {
            if found.is_none() && el.has_attribute(attribute) {
                found = Some(el.clone());
            }
        });
        found
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub fn add_event_listener(&self, event_type: &str, listener: EventListener) {
        self.0
            .listeners
            .borrow_mut()
            .push((event_type.to_string(), listener));
    }

    /// Dispatch an event at this node, bubbling to each ancestor until a
    /// listener stops propagation.
    pub fn dispatch_event(&self, event_type: &str) {
        let event = Event {
            event_type: event_type.to_string(),
            target: self.clone(),
            stopped: Cell::new(false),
        };
        let mut current = Some(self.clone());
        while let Some(node) = current {
            let listeners: Vec<EventListener> = node
                .0
                .listeners
                .borrow()
                .iter()
                .filter(|(t, _)| *t == event.event_type)
                .map(|(_, l)| Rc::clone(l))
                .collect();
            for listener in listeners {
                listener(&event);
            }
            if event.stopped.get() {
                break;
            }
            current = node.parent();
        }
    }

    // ---------------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------------

    /// Markup for this node and its descendants.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        markup::write_node(self, &mut out);
        out
    }

    /// Markup for the children of this node.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            markup::write_node(&child, &mut out);
        }
        out
    }
}

fn collect_text(node: &Node, out: &mut Vec<Node>) {
    if node.is_text() {
        out.push(node.clone());
        return;
    }
    for child in node.children() {
        collect_text(&child, out);
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.outer_html())
    }
}

/// An event delivered to element listeners.
pub struct Event {
    event_type: String,
    target: Node,
    stopped: Cell<bool>,
}

impl Event {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The node the event was dispatched at.
    pub fn target(&self) -> &Node {
        &self.target
    }

    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("target", &self.target.tag())
            .finish()
    }
}
