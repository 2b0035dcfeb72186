use std::collections::BTreeMap;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Style,
    Container,
}

/// Host page surface the widget renders into.
pub trait Document: Send + Sync {
    /// Appends a `<style>` node to the document head.
    fn append_style(&self, css: &str) -> NodeId;
    /// Replaces the text of an existing style node. Returns `false` if it is gone.
    fn update_style(&self, id: NodeId, css: &str) -> bool;
    /// Appends a container element with the given id to the body.
    fn append_container(&self, element_id: &str, html: &str) -> NodeId;
    /// Replaces the inner markup of a container.
    fn render(&self, id: NodeId, html: &str) -> bool;
    fn remove(&self, id: NodeId) -> bool;
    fn focus_input(&self, id: NodeId);
    fn scroll_to_bottom(&self, id: NodeId);
}

#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub kind: NodeKind,
    pub element_id: Option<String>,
    pub content: String,
    pub focus_count: usize,
    pub scroll_count: usize,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    nodes: BTreeMap<NodeId, MemoryNode>,
}

/// In-memory [`Document`] that records every mutation.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    inner: Mutex<Inner>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, kind: NodeKind, element_id: Option<String>, content: &str) -> NodeId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = NodeId(inner.next_id);
        inner.nodes.insert(id, MemoryNode { kind, element_id, content: content.to_string(), focus_count: 0, scroll_count: 0 });
        id
    }

    fn with_node(&self, id: NodeId, f: impl FnOnce(&mut MemoryNode)) -> bool {
        match self.inner.lock().nodes.get_mut(&id) {
            Some(node) => {
                f(node);
                true
            }
            None => false,
        }
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.inner.lock().nodes.values().filter(|n| n.kind == kind).count()
    }

    pub fn node(&self, id: NodeId) -> Option<MemoryNode> {
        self.inner.lock().nodes.get(&id).cloned()
    }

    pub fn content(&self, id: NodeId) -> Option<String> {
        self.node(id).map(|n| n.content)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().nodes.is_empty()
    }
}

impl Document for MemoryDocument {
    fn append_style(&self, css: &str) -> NodeId {
        self.insert(NodeKind::Style, None, css)
    }

    fn update_style(&self, id: NodeId, css: &str) -> bool {
        self.with_node(id, |n| n.content = css.to_string())
    }

    fn append_container(&self, element_id: &str, html: &str) -> NodeId {
        self.insert(NodeKind::Container, Some(element_id.to_string()), html)
    }

    fn render(&self, id: NodeId, html: &str) -> bool {
        self.with_node(id, |n| n.content = html.to_string())
    }

    fn remove(&self, id: NodeId) -> bool {
        self.inner.lock().nodes.remove(&id).is_some()
    }

    fn focus_input(&self, id: NodeId) {
        self.with_node(id, |n| n.focus_count += 1);
    }

    fn scroll_to_bottom(&self, id: NodeId) {
        self.with_node(id, |n| n.scroll_count += 1);
    }
}
