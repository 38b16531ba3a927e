use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single controllable lighting prop, as described by the layout.
/// Identity is by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub name: String,
    #[serde(default, alias = "strings", alias = "string_count")]
    pub string_count: Option<u32>,
    #[serde(default, alias = "nodes", alias = "node_count")]
    pub node_count: Option<u32>,
}

impl Fixture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            string_count: None,
            node_count: None,
        }
    }

    pub fn with_strings(mut self, strings: u32) -> Self {
        self.string_count = Some(strings);
        self
    }

    pub fn with_nodes(mut self, nodes: u32) -> Self {
        self.node_count = Some(nodes);
        self
    }
}

/// An explicit group as declared by the layout: a name plus member references
/// (fixture or group names). References are resolved best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDecl {
    pub name: String,
    #[serde(default, alias = "members")]
    pub member_refs: Vec<String>,
}

/// Newtype for node identity within one `LayoutTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Where a group node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrigin {
    /// The synthetic root every top-level node hangs from.
    Root,
    /// Declared explicitly by the layout.
    Declared,
    /// Inferred from fixture naming (`<base>_GROUP`).
    Synthesized,
}

/// Payload of a tree node. Fixtures are always leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Fixture(Fixture),
    Group {
        name: String,
        origin: GroupOrigin,
        children: Vec<NodeId>,
    },
}

/// One node of the layout tree. `parent` is a lookup relation only; the
/// owning edge is the parent's `children` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Fixture(f) => &f.name,
            NodeKind::Group { name, .. } => name,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group { .. })
    }

    pub fn as_fixture(&self) -> Option<&Fixture> {
        match &self.kind {
            NodeKind::Fixture(f) => Some(f),
            NodeKind::Group { .. } => None,
        }
    }

    pub fn origin(&self) -> Option<GroupOrigin> {
        match &self.kind {
            NodeKind::Group { origin, .. } => Some(*origin),
            NodeKind::Fixture(_) => None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Group { children, .. } => children,
            NodeKind::Fixture(_) => &[],
        }
    }
}

/// Name of the synthetic root group.
pub const ROOT_NAME: &str = "root";

/// Arena-backed fixture/group hierarchy plus a name → node lookup table.
///
/// Built by `LayoutTreeResolver`; read-only for everyone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutTree {
    nodes: Vec<TreeNode>,
    root: NodeId,
    index: IndexMap<String, NodeId>,
}

impl Default for LayoutTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutTree {
    /// An empty tree holding only the root group.
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode {
                id: NodeId(0),
                parent: None,
                kind: NodeKind::Group {
                    name: ROOT_NAME.to_string(),
                    origin: GroupOrigin::Root,
                    children: Vec::new(),
                },
            }],
            root: NodeId(0),
            index: IndexMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0 as usize)
    }

    /// Look up a fixture or group by exact name.
    pub fn lookup(&self, name: &str) -> Option<&TreeNode> {
        self.index.get(name).and_then(|id| self.node(*id))
    }

    pub fn parent_of(&self, name: &str) -> Option<&TreeNode> {
        self.lookup(name)
            .and_then(|n| n.parent)
            .and_then(|p| self.node(p))
    }

    /// Children of a node in insertion order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &TreeNode> {
        self.node(id)
            .map(TreeNode::children)
            .unwrap_or_default()
            .iter()
            .filter_map(|c| self.node(*c))
    }

    /// Every fixture under `id` (inclusive), depth-first in child order.
    pub fn fixtures_under(&self, id: NodeId) -> Vec<&Fixture> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            match &node.kind {
                NodeKind::Fixture(f) => out.push(f),
                NodeKind::Group { children, .. } => {
                    stack.extend(children.iter().rev().copied());
                }
            }
        }
        out
    }

    /// All fixtures in tree traversal order.
    pub fn fixtures(&self) -> Vec<&Fixture> {
        self.fixtures_under(self.root)
    }

    /// Every group except the root, in creation order.
    pub fn groups(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.origin(), Some(GroupOrigin::Declared | GroupOrigin::Synthesized)))
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups().map(TreeNode::name).collect()
    }

    /// Is `ancestor` on the parent chain of `id` (or `id` itself)?
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.node(c).and_then(|n| n.parent);
        }
        false
    }

    // ── Construction (resolver only) ───────────────────────────────

    /// Add a detached node. Names already indexed keep their first node.
    pub(crate) fn push(&mut self, kind: NodeKind) -> NodeId {
        #[allow(clippy::cast_possible_truncation)]
        let id = NodeId(self.nodes.len() as u32);
        let node = TreeNode {
            id,
            parent: None,
            kind,
        };
        self.index.entry(node.name().to_string()).or_insert(id);
        self.nodes.push(node);
        id
    }

    /// Attach a parentless `child` under the group `parent`. Returns false
    /// (and changes nothing) if that would duplicate membership or form a cycle.
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) -> bool {
        let attachable = self.node(child).is_some_and(|c| c.parent.is_none())
            && self.node(parent).is_some_and(TreeNode::is_group)
            && child != self.root
            && !self.is_ancestor(child, parent);
        if !attachable {
            return false;
        }
        if let Some(NodeKind::Group { children, .. }) =
            self.nodes.get_mut(parent.0 as usize).map(|n| &mut n.kind)
        {
            children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child.0 as usize) {
            c.parent = Some(parent);
        }
        true
    }

    /// Remove `child` from its parent's child list, leaving it parentless.
    pub(crate) fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.node(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(NodeKind::Group { children, .. }) =
            self.nodes.get_mut(parent.0 as usize).map(|n| &mut n.kind)
        {
            children.retain(|c| *c != child);
        }
        if let Some(c) = self.nodes.get_mut(child.0 as usize) {
            c.parent = None;
        }
    }

    /// Reorder a group's children with the given key (stable).
    pub(crate) fn sort_children_by_key<K: Ord>(
        &mut self,
        parent: NodeId,
        mut key: impl FnMut(&TreeNode) -> K,
    ) {
        let Some(mut ids) = self.node(parent).map(|n| n.children().to_vec()) else {
            return;
        };
        ids.sort_by_key(|id| self.node(*id).map(&mut key));
        if let Some(NodeKind::Group { children, .. }) =
            self.nodes.get_mut(parent.0 as usize).map(|n| &mut n.kind)
        {
            *children = ids;
        }
    }

    pub(crate) fn id_of(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn group(name: &str) -> NodeKind {
        NodeKind::Group {
            name: name.into(),
            origin: GroupOrigin::Declared,
            children: Vec::new(),
        }
    }

    #[test]
    fn attach_rejects_double_membership() {
        let mut tree = LayoutTree::new();
        let a = tree.push(group("A"));
        let b = tree.push(group("B"));
        let f = tree.push(NodeKind::Fixture(Fixture::new("Star")));
        assert!(tree.attach(a, f));
        assert!(!tree.attach(b, f));
        assert_eq!(tree.parent_of("Star").unwrap().name(), "A");
    }

    #[test]
    fn attach_rejects_cycles() {
        let mut tree = LayoutTree::new();
        let a = tree.push(group("A"));
        let b = tree.push(group("B"));
        assert!(tree.attach(a, b));
        assert!(!tree.attach(b, a));
        assert!(!tree.attach(a, a));
    }

    #[test]
    fn fixtures_under_is_depth_first_in_child_order() {
        let mut tree = LayoutTree::new();
        let root = tree.root();
        let g = tree.push(group("G"));
        let f1 = tree.push(NodeKind::Fixture(Fixture::new("one")));
        let f2 = tree.push(NodeKind::Fixture(Fixture::new("two")));
        let f3 = tree.push(NodeKind::Fixture(Fixture::new("three")));
        tree.attach(root, f1);
        tree.attach(root, g);
        tree.attach(g, f2);
        tree.attach(root, f3);
        let names: Vec<_> = tree.fixtures().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["one", "two", "three"]);
    }

    #[test]
    fn fixture_deserializes_original_field_names() {
        let f: Fixture =
            serde_json::from_str(r#"{"name":"Tree","strings":10,"nodes":null}"#).unwrap();
        assert_eq!(f.string_count, Some(10));
        assert_eq!(f.node_count, None);
    }
}
