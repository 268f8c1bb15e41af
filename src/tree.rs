use std::fmt::Display;

use crate::revision::Revision;

/// Handle to a node in a [`NodeArena`].
///
/// Arena indices are the node identity used throughout the merge: two
/// deep-cloned subtrees can be structurally identical while standing for
/// different deletions, so sets of nodes are sets of ids, never of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Controls whether the bodies of a leaf should be merged textually
/// when two revisions of it are superimposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergingMechanism {
    /// The body is left untouched by superimposition (first revision wins).
    Default,
    /// The bodies are tagged for a later three-way textual merge.
    #[default]
    ConflictMerge,
}

/// The variant payload of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A leaf carrying a raw source fragment.
    Terminal {
        /// The main source fragment, e.g. a method body.
        body: String,
        /// Leading special tokens, e.g. comments preceding the declaration.
        prefix: String,
        /// How bodies should be combined when superimposed.
        mechanism: MergingMechanism,
    },
    /// An internal node whose children order is significant.
    NonTerminal { children: Vec<NodeId> },
}

/// A node of a semistructured tree.
///
/// Identity within a parent is the `(node_type, name)` pair; `index` records
/// which revision the node last came from and is `None` while unset.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub node_type: &'static str,
    pub name: String,
    pub index: Option<Revision>,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal { .. })
    }

    /// The body of a terminal, or `""` for a non-terminal.
    pub fn body(&self) -> &str {
        match &self.kind {
            NodeKind::Terminal { body, .. } => body,
            NodeKind::NonTerminal { .. } => "",
        }
    }

    /// The special-token prefix of a terminal, or `""` for a non-terminal.
    pub fn prefix(&self) -> &str {
        match &self.kind {
            NodeKind::Terminal { prefix, .. } => prefix,
            NodeKind::NonTerminal { .. } => "",
        }
    }

    pub fn mechanism(&self) -> MergingMechanism {
        match &self.kind {
            NodeKind::Terminal { mechanism, .. } => *mechanism,
            NodeKind::NonTerminal { .. } => MergingMechanism::ConflictMerge,
        }
    }

    /// The ordered children of a non-terminal (empty for a terminal).
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::NonTerminal { children } => children,
            NodeKind::Terminal { .. } => &[],
        }
    }

    /// Structural compatibility: equal type and equal name.
    pub fn compatible_with(&self, other: &Node) -> bool {
        self.node_type == other.node_type && self.name == other.name
    }
}

/// Arena holding every node of a merge run: the three parsed revisions,
/// both superimposition results and all clones made along the way.
///
/// Nodes are never freed during a run; detaching a node only unlinks it from
/// its parent. A node is attached to at most one parent at any time, which
/// rules out the multi-reference ambiguity that plagues identity-based
/// removal of deleted base nodes.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    fn alloc(&mut self, mut node: Node) -> NodeId {
        let id =
            NodeId(u32::try_from(self.nodes.len()).expect("more nodes than fit in a u32 arena"));
        node.id = id;
        self.nodes.push(node);
        id
    }

    pub fn new_terminal(
        &mut self,
        node_type: &'static str,
        name: impl Into<String>,
        body: impl Into<String>,
        prefix: impl Into<String>,
        mechanism: MergingMechanism,
        index: Option<Revision>,
    ) -> NodeId {
        self.alloc(Node {
            id: NodeId(0),
            parent: None,
            node_type,
            name: name.into(),
            index,
            kind: NodeKind::Terminal {
                body: body.into(),
                prefix: prefix.into(),
                mechanism,
            },
        })
    }

    pub fn new_non_terminal(
        &mut self,
        node_type: &'static str,
        name: impl Into<String>,
        index: Option<Revision>,
    ) -> NodeId {
        self.alloc(Node {
            id: NodeId(0),
            parent: None,
            node_type,
            name: name.into(),
            index,
            kind: NodeKind::NonTerminal {
                children: Vec::new(),
            },
        })
    }

    /// Clones the scalar attributes of a node. A terminal keeps its body and
    /// prefix (they are its scalar content); a non-terminal starts with no
    /// children. The clone is detached.
    pub fn shallow_clone(&mut self, id: NodeId) -> NodeId {
        let mut node = self.node(id).clone();
        node.parent = None;
        if let NodeKind::NonTerminal { children } = &mut node.kind {
            children.clear();
        }
        self.alloc(node)
    }

    /// Clones a full subtree under fresh ids. The clone is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let cloned = self.shallow_clone(id);
        for child in self.node(id).children().to_vec() {
            let child_clone = self.deep_clone(child);
            self.attach_child(cloned, child_clone);
        }
        cloned
    }

    /// Appends `child` to the children of `parent`.
    ///
    /// Panics if `child` is already attached somewhere: each node must have a
    /// single parent so that id-based deletion stays unambiguous.
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        let position = self.node(parent).children().len();
        self.insert_child(parent, position, child);
    }

    /// Inserts `child` at `position` among the children of `parent`.
    pub fn insert_child(&mut self, parent: NodeId, position: usize, child: NodeId) {
        assert!(
            self.node(child).parent.is_none(),
            "node {child} is already attached to a parent"
        );
        match &mut self.node_mut(parent).kind {
            NodeKind::NonTerminal { children } => children.insert(position, child),
            NodeKind::Terminal { .. } => panic!("cannot attach a child to terminal {parent}"),
        }
        self.node_mut(child).parent = Some(parent);
    }

    /// Unlinks a node from its parent. A no-op on detached nodes.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        if let NodeKind::NonTerminal { children } = &mut self.node_mut(parent).kind {
            children.retain(|child| *child != id);
        }
        self.node_mut(id).parent = None;
    }

    /// The first child of `parent` compatible with `query`, if any.
    /// Children are few per parent, so a linear scan is appropriate.
    pub fn compatible_child(&self, parent: NodeId, query: NodeId) -> Option<NodeId> {
        let query = self.node(query);
        self.node(parent)
            .children()
            .iter()
            .copied()
            .find(|child| self.node(*child).compatible_with(query))
    }

    /// The position among the children of `parent` of the first child
    /// compatible with `query`, if any.
    pub fn position_of_compatible(&self, parent: NodeId, query: NodeId) -> Option<usize> {
        let query = self.node(query);
        self.node(parent)
            .children()
            .iter()
            .position(|child| self.node(*child).compatible_with(query))
    }

    /// Depth-first search in prefix order, children in original order.
    pub fn dfs(&self, root: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        Dfs {
            arena: self,
            stack: vec![root],
        }
    }

    pub fn set_body(&mut self, id: NodeId, new_body: impl Into<String>) {
        if let NodeKind::Terminal { body, .. } = &mut self.node_mut(id).kind {
            *body = new_body.into();
        }
    }

    pub fn set_prefix(&mut self, id: NodeId, new_prefix: impl Into<String>) {
        if let NodeKind::Terminal { prefix, .. } = &mut self.node_mut(id).kind {
            *prefix = new_prefix.into();
        }
    }
}

struct Dfs<'a> {
    arena: &'a NodeArena,
    stack: Vec<NodeId>,
}

impl Iterator for Dfs<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.arena.node(id).children().iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(arena: &mut NodeArena) -> NodeId {
        let root = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Base));
        let class = arena.new_non_terminal("ClassDecl", "A", Some(Revision::Base));
        let field = arena.new_terminal(
            "FieldDecl",
            "k",
            "int k = 0;",
            "",
            MergingMechanism::ConflictMerge,
            Some(Revision::Base),
        );
        arena.attach_child(root, class);
        arena.attach_child(class, field);
        root
    }

    #[test]
    fn compatibility_is_type_and_name() {
        let mut arena = NodeArena::new();
        let a = arena.new_terminal("FieldDecl", "k", "int k;", "", Default::default(), None);
        let b = arena.new_terminal("FieldDecl", "k", "long k;", "", Default::default(), None);
        let c = arena.new_terminal("FieldDecl", "j", "int j;", "", Default::default(), None);
        let d = arena.new_terminal("MethodDecl", "k", "void k() {}", "", Default::default(), None);

        assert!(arena.node(a).compatible_with(arena.node(b)));
        assert!(!arena.node(a).compatible_with(arena.node(c)));
        assert!(!arena.node(a).compatible_with(arena.node(d)));
    }

    #[test]
    fn compatible_child_returns_first_match() {
        let mut arena = NodeArena::new();
        let parent = arena.new_non_terminal("ClassDecl", "A", None);
        let first = arena.new_terminal("InitBlock", "", "{ a(); }", "", Default::default(), None);
        let second = arena.new_terminal("InitBlock", "", "{ b(); }", "", Default::default(), None);
        arena.attach_child(parent, first);
        arena.attach_child(parent, second);

        let query = arena.new_terminal("InitBlock", "", "{ c(); }", "", Default::default(), None);
        assert_eq!(arena.compatible_child(parent, query), Some(first));
    }

    #[test]
    fn shallow_clone_keeps_terminal_body_and_drops_children() {
        let mut arena = NodeArena::new();
        let root = sample(&mut arena);
        let class = arena.node(root).children()[0];
        let field = arena.node(class).children()[0];

        let class_clone = arena.shallow_clone(class);
        assert!(arena.node(class_clone).children().is_empty());
        assert_eq!(arena.node(class_clone).name, "A");
        assert_eq!(arena.node(class_clone).parent, None);

        let field_clone = arena.shallow_clone(field);
        assert_eq!(arena.node(field_clone).body(), "int k = 0;");
    }

    #[test]
    fn deep_clone_copies_subtree_under_fresh_ids() {
        let mut arena = NodeArena::new();
        let root = sample(&mut arena);

        let clone = arena.deep_clone(root);
        assert_ne!(clone, root);
        let original_nodes: Vec<_> = arena.dfs(root).collect();
        let cloned_nodes: Vec<_> = arena.dfs(clone).collect();
        assert_eq!(original_nodes.len(), cloned_nodes.len());
        for (a, b) in original_nodes.iter().zip(&cloned_nodes) {
            assert_ne!(a, b);
            assert_eq!(arena.node(*a).name, arena.node(*b).name);
            assert_eq!(arena.node(*a).body(), arena.node(*b).body());
        }
    }

    #[test]
    fn detach_unlinks_from_parent() {
        let mut arena = NodeArena::new();
        let root = sample(&mut arena);
        let class = arena.node(root).children()[0];
        let field = arena.node(class).children()[0];

        arena.detach(field);
        assert!(arena.node(class).children().is_empty());
        assert_eq!(arena.node(field).parent, None);

        // detaching again is a no-op
        arena.detach(field);
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn double_attachment_is_rejected() {
        let mut arena = NodeArena::new();
        let root = sample(&mut arena);
        let class = arena.node(root).children()[0];
        let field = arena.node(class).children()[0];
        arena.attach_child(root, field);
    }

    #[test]
    fn dfs_is_prefix_order() {
        let mut arena = NodeArena::new();
        let root = sample(&mut arena);
        let names: Vec<_> = arena.dfs(root).map(|id| arena.node(id).node_type).collect();
        assert_eq!(names, vec!["CompilationUnit", "ClassDecl", "FieldDecl"]);
    }
}
