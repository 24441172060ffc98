use std::{collections::HashMap, fmt};

use crate::markup::{self, ElementSpec, FragmentNode};

/// Rendering primitives the scheduler drives. Handles are opaque to the
/// core; it only clones them, compares them and hands them back.
pub trait RenderBackend {
    type Handle: Clone + PartialEq + fmt::Debug;

    /// Looks up a container by selector. `None` makes session construction
    /// fail with a configuration error.
    fn query_container(&mut self, selector: &str) -> Option<Self::Handle>;

    fn create_text_unit(&mut self, text: &str) -> Self::Handle;

    /// Creates a detached, empty element.
    fn create_element(&mut self, element: &ElementSpec) -> Self::Handle;

    /// Appends `child` under `parent`, moving it if it is attached elsewhere.
    fn append_child(&mut self, parent: &Self::Handle, child: &Self::Handle);

    fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle);

    fn set_inner_markup(&mut self, node: &Self::Handle, markup: &str);

    fn parse_fragment(&self, markup: &str) -> Vec<FragmentNode> {
        markup::parse_fragment(markup)
    }

    fn inject_global_style(&mut self, css: &str);
}

/// Where a session renders into.
#[derive(Debug, Clone, PartialEq)]
pub enum Container<H> {
    Selector(String),
    Handle(H),
}

impl<H> From<&str> for Container<H> {
    fn from(value: &str) -> Self {
        Container::Selector(value.to_string())
    }
}

/// Render nodes owned by a session, handed read-only to callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct Elements<H> {
    pub container: H,
    pub wrapper: H,
    pub cursor: H,
}

/// Handle into a [`MemoryBackend`]. Slots are reused once their node is
/// freed; the generation keeps stale handles from reaching the new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNodeKind {
    Text(String),
    Element(ElementSpec),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

#[derive(Debug, Clone)]
struct MemoryNode {
    kind: MemoryNodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    node: Option<MemoryNode>,
}

/// Arena-backed render tree. Used by tests and by the terminal host, which
/// paints it after every frame.
///
/// Text units are freed when they are removed from their parent, and
/// `set_inner_markup` frees the subtrees it replaces. Removed elements stay
/// alive so they can be attached again.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: Vec<Slot>,
    free: Vec<usize>,
    containers: HashMap<String, NodeId>,
    styles: Vec<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `div` reachable through `selector`.
    pub fn add_container(&mut self, selector: impl Into<String>) -> NodeId {
        let id = self.insert(MemoryNodeKind::Element(ElementSpec::new("div")));
        self.containers.insert(selector.into(), id);
        id
    }

    pub fn kind(&self, id: NodeId) -> Option<&MemoryNodeKind> {
        self.node(id).map(|node| &node.kind)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots ever allocated, live or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Concatenated text of `id` and all its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    /// Serializes the children of `id` back to markup.
    pub fn inner_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_markup(*child, &mut out);
        }
        out
    }

    pub fn injected_styles(&self) -> &[String] {
        &self.styles
    }

    fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut MemoryNode> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn insert(&mut self, kind: MemoryNodeKind) -> NodeId {
        let node = MemoryNode {
            kind,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    /// Frees `id` and its whole subtree. The caller detaches it first.
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.slots.get_mut(id.index).filter(|slot| slot.generation == id.generation) else {
                continue;
            };
            let Some(node) = slot.node.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
            stack.extend(node.children);
        }
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|id| *id != child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
    }

    fn build_fragment(&mut self, parent: NodeId, fragment: Vec<FragmentNode>) {
        for node in fragment {
            match node {
                FragmentNode::Text(text) => {
                    let id = self.insert(MemoryNodeKind::Text(text));
                    self.append_child(&parent, &id);
                }
                FragmentNode::Element { element, children } => {
                    let id = self.insert(MemoryNodeKind::Element(element));
                    self.append_child(&parent, &id);
                    self.build_fragment(id, children);
                }
            }
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(MemoryNodeKind::Text(text)) => out.push_str(text),
            Some(MemoryNodeKind::Element(_)) => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(MemoryNodeKind::Text(text)) => out.push_str(&escape(text)),
            Some(MemoryNodeKind::Element(element)) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    out.push_str(&format!(" {name}=\"{}\"", escape(value)));
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    return;
                }
                for child in self.children(id) {
                    self.write_markup(*child, out);
                }
                out.push_str(&format!("</{}>", element.tag));
            }
            None => {}
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl RenderBackend for MemoryBackend {
    type Handle = NodeId;

    fn query_container(&mut self, selector: &str) -> Option<NodeId> {
        self.containers.get(selector).copied()
    }

    fn create_text_unit(&mut self, text: &str) -> NodeId {
        self.insert(MemoryNodeKind::Text(text.to_string()))
    }

    fn create_element(&mut self, element: &ElementSpec) -> NodeId {
        self.insert(MemoryNodeKind::Element(element.clone()))
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
        if parent == child || self.node(*parent).is_none() || self.node(*child).is_none() {
            return;
        }
        self.detach(*child);
        if let Some(node) = self.node_mut(*parent) {
            node.children.push(*child);
        }
        if let Some(node) = self.node_mut(*child) {
            node.parent = Some(*parent);
        }
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) {
        if self.parent(*child) != Some(*parent) {
            return;
        }
        self.detach(*child);
        if matches!(self.kind(*child), Some(MemoryNodeKind::Text(_))) {
            self.release(*child);
        }
    }

    fn set_inner_markup(&mut self, node: &NodeId, markup: &str) {
        if self.node(*node).is_none() {
            return;
        }
        for child in self.children(*node).to_vec() {
            self.detach(child);
            self.release(child);
        }
        let fragment = self.parse_fragment(markup);
        self.build_fragment(*node, fragment);
    }

    fn inject_global_style(&mut self, css: &str) {
        self.styles.push(css.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_and_removes_children() {
        let mut backend = MemoryBackend::new();
        let root = backend.add_container("#root");
        let bold = backend.create_element(&ElementSpec::new("b"));
        let text = backend.create_text_unit("hi");

        backend.append_child(&root, &bold);
        backend.append_child(&bold, &text);
        assert_eq!(backend.inner_markup(root), "<b>hi</b>");

        backend.remove_child(&root, &text);
        assert_eq!(backend.text_content(root), "hi", "wrong parent is ignored");

        backend.remove_child(&bold, &text);
        assert_eq!(backend.inner_markup(root), "<b></b>");
        assert_eq!(backend.parent(text), None);
    }

    #[test]
    fn appending_moves_an_attached_node() {
        let mut backend = MemoryBackend::new();
        let a = backend.add_container("a");
        let b = backend.add_container("b");
        let text = backend.create_text_unit("x");

        backend.append_child(&a, &text);
        backend.append_child(&b, &text);

        assert!(backend.children(a).is_empty());
        assert_eq!(backend.children(b), &[text]);
    }

    #[test]
    fn inner_markup_replaces_children() {
        let mut backend = MemoryBackend::new();
        let root = backend.add_container("#root");
        backend.set_inner_markup(&root, "a <i>b</i>");
        assert_eq!(backend.inner_markup(root), "a <i>b</i>");

        backend.set_inner_markup(&root, "");
        assert!(backend.children(root).is_empty());
        assert_eq!(backend.query_container("#root"), Some(root));
        assert_eq!(backend.query_container("#missing"), None);
    }

    #[test]
    fn removed_text_units_are_freed_and_their_handles_go_stale() {
        let mut backend = MemoryBackend::new();
        let root = backend.add_container("#root");
        let first = backend.create_text_unit("a");
        backend.append_child(&root, &first);

        backend.remove_child(&root, &first);
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.kind(first), None);

        let second = backend.create_text_unit("b");
        assert_eq!(backend.slot_count(), 2);
        assert_ne!(first, second);

        backend.append_child(&root, &first);
        assert!(backend.children(root).is_empty());
        backend.append_child(&root, &second);
        assert_eq!(backend.text_content(root), "b");
    }

    #[test]
    fn removed_elements_stay_alive() {
        let mut backend = MemoryBackend::new();
        let root = backend.add_container("#root");
        let bold = backend.create_element(&ElementSpec::new("b"));

        backend.append_child(&root, &bold);
        backend.remove_child(&root, &bold);
        backend.append_child(&root, &bold);

        assert_eq!(backend.inner_markup(root), "<b></b>");
        assert_eq!(backend.len(), 2);
    }

    #[test]
    fn replacing_inner_markup_reuses_slots() {
        let mut backend = MemoryBackend::new();
        let root = backend.add_container("#root");
        backend.set_inner_markup(&root, "<b>x</b>y");
        assert_eq!(backend.slot_count(), 4);

        for _ in 0..10 {
            backend.set_inner_markup(&root, "z");
        }

        assert_eq!(backend.inner_markup(root), "z");
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.slot_count(), 4);
    }

    #[test]
    fn void_elements_serialize_without_a_close_tag() {
        let mut backend = MemoryBackend::new();
        let root = backend.add_container("#root");
        backend.set_inner_markup(&root, "a<br>b");

        assert_eq!(backend.inner_markup(root), "a<br>b");
    }
}
