//! The retained view tree that stands in for the DOM.
//!
//! Each UI root owns one `ViewTree`. Regions (the fixed scaffolding of the
//! layout) are created once and attached idempotently; keys and prose are
//! rebuilt only when the state fields they depend on change.
//!
//! Edges go from parent → child. Sibling order is kept explicitly per parent
//! so it does not depend on how `petgraph` iterates adjacency lists.

use kk_core::KeyId;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

// ─── Nodes ───────────────────────────────────────────────────────────────

/// The fixed regions of a keymap UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Root,
    Styling,
    KidContainer,
    Diagram,
    DiamargLeft,
    CenterPanel,
    DiamargRight,
    Keyboard,
    InfoContainer,
    Navbar,
    InfoProse,
}

impl Region {
    pub const ALL: [Region; 11] = [
        Region::Root,
        Region::Styling,
        Region::KidContainer,
        Region::Diagram,
        Region::DiamargLeft,
        Region::CenterPanel,
        Region::DiamargRight,
        Region::Keyboard,
        Region::InfoContainer,
        Region::Navbar,
        Region::InfoProse,
    ];

    pub fn element_name(self) -> &'static str {
        match self {
            Region::Root => "keymap-ui",
            Region::Styling => "style",
            Region::KidContainer => "keymap-ui-kid-container",
            Region::Diagram => "keymap-diagram",
            Region::DiamargLeft => "keymap-ui-diamarg-left",
            Region::CenterPanel => "keymap-ui-center-panel",
            Region::DiamargRight => "keymap-ui-diamarg-right",
            Region::Keyboard => "keymap-keyboard",
            Region::InfoContainer => "keymap-ui-info-container",
            Region::Navbar => "keymap-navbar",
            Region::InfoProse => "keymap-ui-info-prose",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewKind {
    Region(Region),
    /// The keyboard element; replaces the `Keyboard` region placeholder.
    Keyboard { element_name: String },
    Key(KeyId),
    ProseTitle,
    ProseParagraph,
    Attribution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewNode {
    pub kind: ViewKind,
    pub attributes: BTreeMap<String, String>,
    /// Inner markup, for prose nodes.
    pub html: Option<String>,
}

impl ViewNode {
    pub fn new(kind: ViewKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            html: None,
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Boolean attributes are written as `"true"` / `"false"`.
    pub fn flag(&self, name: &str) -> bool {
        self.attribute(name) == Some("true")
    }

    /// Returns true if the attribute changed.
    pub fn set_attribute(&mut self, name: &str, value: Option<&str>) -> bool {
        match value {
            Some(v) => self.attributes.insert(name.to_string(), v.to_string()).as_deref() != Some(v),
            None => self.attributes.remove(name).is_some(),
        }
    }

    pub fn set_flag(&mut self, name: &str, on: bool) -> bool {
        self.set_attribute(name, Some(if on { "true" } else { "false" }))
    }

    fn label(&self) -> String {
        match &self.kind {
            ViewKind::Region(r) => r.element_name().to_string(),
            ViewKind::Keyboard { element_name } => element_name.clone(),
            ViewKind::Key(id) => format!("keymap-key#{id}"),
            ViewKind::ProseTitle => "h3".into(),
            ViewKind::ProseParagraph => "p".into(),
            ViewKind::Attribution => "div.key-info-attribution".into(),
        }
    }
}

// ─── Tree ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ViewTree {
    pub graph: StableDiGraph<ViewNode, ()>,
    regions: HashMap<Region, NodeIndex>,
    key_index: HashMap<KeyId, NodeIndex>,
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
    mutations: usize,
}

impl Default for ViewTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewTree {
    /// A tree with every region created but only the root attached.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let regions = Region::ALL
            .iter()
            .map(|&r| (r, graph.add_node(ViewNode::new(ViewKind::Region(r)))))
            .collect();
        Self {
            graph,
            regions,
            key_index: HashMap::new(),
            child_order: HashMap::new(),
            mutations: 0,
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.region(Region::Root)
    }

    pub fn region(&self, region: Region) -> NodeIndex {
        self.regions[&region]
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&ViewNode> {
        self.graph.node_weight(idx)
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> Option<&mut ViewNode> {
        self.graph.node_weight_mut(idx)
    }

    pub fn key_node(&self, id: KeyId) -> Option<NodeIndex> {
        self.key_index.get(&id).copied()
    }

    /// Count of structural changes since creation.
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append a new node under `parent`.
    pub fn add_child(&mut self, parent: NodeIndex, node: ViewNode) -> NodeIndex {
        let idx = self.insert(node);
        self.attach(parent, idx);
        self.mutations += 1;
        idx
    }

    /// Make `desired` the exact children of `parent`, in order. Nothing is
    /// touched when the children already match. Returns true on change.
    pub fn set_children_idempotently(&mut self, parent: NodeIndex, desired: &[NodeIndex]) -> bool {
        if self.children(parent) == desired {
            return false;
        }
        for child in self.children(parent).to_vec() {
            self.detach(child);
        }
        for &child in desired {
            self.detach(child);
            self.attach(parent, child);
        }
        self.mutations += 1;
        true
    }

    /// Drop every child subtree of `parent` and add `nodes` in their place.
    pub fn replace_children(&mut self, parent: NodeIndex, nodes: Vec<ViewNode>) -> Vec<NodeIndex> {
        for child in self.children(parent).to_vec() {
            self.remove_subtree(child);
        }
        let added = nodes
            .into_iter()
            .map(|node| {
                let idx = self.insert(node);
                self.attach(parent, idx);
                idx
            })
            .collect();
        self.mutations += 1;
        added
    }

    /// Swap the node of `region` for `node`, keeping its slot under the
    /// parent. The old node and its subtree are removed.
    pub fn replace_region(&mut self, region: Region, node: ViewNode) -> NodeIndex {
        let old = self.region(region);
        let new = self.insert(node);
        if let Some(parent) = self.parent(old) {
            let order = self.child_order.entry(parent).or_default();
            if let Some(slot) = order.iter_mut().find(|c| **c == old) {
                *slot = new;
            }
            self.graph.add_edge(parent, new, ());
        }
        self.regions.insert(region, new);
        self.remove_subtree(old);
        self.mutations += 1;
        new
    }

    /// Remove a node and everything below it.
    pub fn remove_subtree(&mut self, idx: NodeIndex) {
        for child in self.children(idx).to_vec() {
            self.remove_subtree(child);
        }
        self.detach(idx);
        self.child_order.remove(&idx);
        if let Some(node) = self.graph.remove_node(idx)
            && let ViewKind::Key(id) = node.kind
            && self.key_index.get(&id) == Some(&idx)
        {
            self.key_index.remove(&id);
        }
    }

    /// Indented outline of the attached tree, for logs and tests.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.outline_into(self.root(), 0, &mut out);
        out
    }

    fn outline_into(&self, idx: NodeIndex, depth: usize, out: &mut String) {
        let Some(node) = self.node(idx) else { return };
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), node.label());
        for &child in self.children(idx) {
            self.outline_into(child, depth + 1, out);
        }
    }

    fn insert(&mut self, node: ViewNode) -> NodeIndex {
        let key = match node.kind {
            ViewKind::Key(id) => Some(id),
            _ => None,
        };
        let idx = self.graph.add_node(node);
        if let Some(id) = key {
            self.key_index.insert(id, idx);
        }
        idx
    }

    fn attach(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.graph.add_edge(parent, child, ());
        self.child_order.entry(parent).or_default().push(child);
    }

    fn detach(&mut self, child: NodeIndex) {
        if let Some(parent) = self.parent(child) {
            if let Some(edge) = self.graph.find_edge(parent, child) {
                self.graph.remove_edge(edge);
            }
            if let Some(order) = self.child_order.get_mut(&parent) {
                order.retain(|c| *c != child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn idempotent_children_skip_when_equal() {
        let mut tree = ViewTree::new();
        let root = tree.root();
        let kids = [tree.region(Region::Styling), tree.region(Region::KidContainer)];
        assert!(tree.set_children_idempotently(root, &kids));
        let before = tree.mutations();
        assert!(!tree.set_children_idempotently(root, &kids));
        assert_eq!(tree.mutations(), before);
    }

    #[test]
    fn reordering_reattaches() {
        let mut tree = ViewTree::new();
        let root = tree.root();
        let a = tree.region(Region::Styling);
        let b = tree.region(Region::Diagram);
        tree.set_children_idempotently(root, &[a, b]);
        assert!(tree.set_children_idempotently(root, &[b, a]));
        assert_eq!(tree.children(root), &[b, a]);
        assert_eq!(tree.parent(a), Some(root));
    }

    #[test]
    fn moving_a_child_detaches_from_old_parent() {
        let mut tree = ViewTree::new();
        let root = tree.root();
        let kid = tree.region(Region::KidContainer);
        let navbar = tree.region(Region::Navbar);
        tree.set_children_idempotently(root, &[navbar]);
        tree.set_children_idempotently(kid, &[navbar]);
        assert!(tree.children(root).is_empty());
        assert_eq!(tree.parent(navbar), Some(kid));
    }

    #[test]
    fn replace_children_updates_key_index() {
        let mut tree = ViewTree::new();
        let board = tree.region(Region::Keyboard);
        let a = KeyId::intern("view-a");
        let b = KeyId::intern("view-b");
        tree.replace_children(board, vec![ViewNode::new(ViewKind::Key(a))]);
        assert!(tree.key_node(a).is_some());
        tree.replace_children(board, vec![ViewNode::new(ViewKind::Key(b))]);
        assert_eq!(tree.key_node(a), None);
        assert_eq!(tree.children(board).len(), 1);
    }

    #[test]
    fn replace_region_keeps_slot() {
        let mut tree = ViewTree::new();
        let center = tree.region(Region::CenterPanel);
        let board = tree.region(Region::Keyboard);
        let info = tree.region(Region::InfoContainer);
        tree.set_children_idempotently(center, &[board, info]);
        let swapped = tree.replace_region(
            Region::Keyboard,
            ViewNode::new(ViewKind::Keyboard { element_name: "my-board".into() }),
        );
        assert_eq!(tree.children(center), &[swapped, info]);
        assert_eq!(tree.region(Region::Keyboard), swapped);
        assert!(tree.node(board).is_none());
    }

    #[test]
    fn set_attribute_reports_change() {
        let mut node = ViewNode::new(ViewKind::ProseTitle);
        assert!(node.set_flag("active", true));
        assert!(!node.set_flag("active", true));
        assert!(node.flag("active"));
        assert!(node.set_flag("active", false));
        assert!(!node.set_flag("active", false));
    }
}
