use std::fmt::Write;

use crate::{
    revision::Revision,
    tree::{NodeArena, NodeId},
};

/// A base element whose body one side emptied relative to base,
/// i.e. a candidate renaming or deletion on that side.
#[derive(Debug, Clone)]
pub struct RenameCandidate {
    /// The body the element had in the base revision.
    pub base_body: String,
    /// The node standing at the element's position in the merged tree.
    pub node: NodeId,
    /// The opposite side's contribution at tagging time.
    pub other_body: String,
}

/// A declaration added with the same type and name on both sides.
#[derive(Debug, Clone)]
pub struct DuplicateCandidate {
    pub node: NodeId,
    pub left_body: String,
    pub right_body: String,
}

/// A base element that one side deleted while the other one may have edited.
#[derive(Debug, Clone)]
pub struct DeletionCandidate {
    pub node: NodeId,
    pub deleted_by: Revision,
    pub base_body: String,
    /// The body contributed by the side that kept the element.
    pub surviving_body: String,
}

/// Bookkeeping of added, deleted, edited and possibly-renamed nodes across
/// the three inputs.
///
/// Created empty before superimposition, mutated by the superimposer and the
/// content merger, read and mutated by each conflict handler in order, and
/// discarded after serialization. All node sets hold ids pointing into the
/// final merged tree: whenever the second superimposition pass re-merges or
/// re-clones a node from the first pass, the corresponding entries are
/// remapped to the new id.
#[derive(Debug)]
pub struct MergeContext {
    pub left_root: NodeId,
    pub base_root: NodeId,
    pub right_root: NodeId,
    /// Root of the running superimposed tree, once both passes have run.
    pub superimposed_root: Option<NodeId>,

    /// New non-terminal children introduced by the left side.
    pub added_left_nodes: Vec<NodeId>,
    /// New non-terminal children introduced by the right side.
    pub added_right_nodes: Vec<NodeId>,
    pub nodes_deleted_by_left: Vec<NodeId>,
    pub nodes_deleted_by_right: Vec<NodeId>,
    /// Base nodes deleted on both sides; must all be detached before
    /// serialization.
    pub deleted_base_nodes: Vec<NodeId>,
    /// Terminals whose body differs from base on exactly the left side.
    pub edited_left_nodes: Vec<NodeId>,
    /// Terminals whose body differs from base on exactly the right side.
    pub edited_right_nodes: Vec<NodeId>,
    pub possible_renamed_left_nodes: Vec<RenameCandidate>,
    pub possible_renamed_right_nodes: Vec<RenameCandidate>,
    pub duplicate_candidates: Vec<DuplicateCandidate>,
    pub deletion_candidates: Vec<DeletionCandidate>,

    /// Serialized intermediate result, available to the handlers.
    pub semistructured_output: String,
}

impl MergeContext {
    pub fn new(left_root: NodeId, base_root: NodeId, right_root: NodeId) -> Self {
        Self {
            left_root,
            base_root,
            right_root,
            superimposed_root: None,
            added_left_nodes: Vec::new(),
            added_right_nodes: Vec::new(),
            nodes_deleted_by_left: Vec::new(),
            nodes_deleted_by_right: Vec::new(),
            deleted_base_nodes: Vec::new(),
            edited_left_nodes: Vec::new(),
            edited_right_nodes: Vec::new(),
            possible_renamed_left_nodes: Vec::new(),
            possible_renamed_right_nodes: Vec::new(),
            duplicate_candidates: Vec::new(),
            deletion_candidates: Vec::new(),
            semistructured_output: String::new(),
        }
    }

    /// Redirects every bookkeeping entry for `old` to `new`, keeping the
    /// sets pointed at the latest incarnation of each node.
    pub fn remap(&mut self, old: NodeId, new: NodeId) {
        for set in [
            &mut self.added_left_nodes,
            &mut self.added_right_nodes,
            &mut self.nodes_deleted_by_left,
            &mut self.nodes_deleted_by_right,
            &mut self.deleted_base_nodes,
        ] {
            for entry in set.iter_mut() {
                if *entry == old {
                    *entry = new;
                }
            }
        }
    }

    /// Drops a node from the edited/deletion bookkeeping, once a handler has
    /// resolved it and later handlers must not touch it again.
    pub fn mark_resolved(&mut self, node: NodeId) {
        self.edited_left_nodes.retain(|id| *id != node);
        self.edited_right_nodes.retain(|id| *id != node);
        self.deletion_candidates.retain(|c| c.node != node);
    }

    pub fn added_nodes(&self, side: Revision) -> &[NodeId] {
        match side {
            Revision::Left => &self.added_left_nodes,
            Revision::Right => &self.added_right_nodes,
            Revision::Base => &[],
        }
    }

    pub fn edited_nodes(&self, side: Revision) -> &[NodeId] {
        match side {
            Revision::Left => &self.edited_left_nodes,
            Revision::Right => &self.edited_right_nodes,
            Revision::Base => &[],
        }
    }

    pub fn revision_root(&self, side: Revision) -> NodeId {
        match side {
            Revision::Left => self.left_root,
            Revision::Base => self.base_root,
            Revision::Right => self.right_root,
        }
    }

    /// Compact rendering of the bookkeeping, attached to semistructured
    /// merge failures for diagnostics.
    pub fn summary(&self, arena: &NodeArena) -> String {
        let mut out = String::new();
        let mut list = |label: &str, ids: &[NodeId]| {
            let _ = write!(out, "{label}:");
            for id in ids {
                let node = arena.node(*id);
                let _ = write!(out, " {}({})", node.node_type, node.name);
            }
            out.push('\n');
        };
        list("added by left", &self.added_left_nodes);
        list("added by right", &self.added_right_nodes);
        list("deleted by left", &self.nodes_deleted_by_left);
        list("deleted by right", &self.nodes_deleted_by_right);
        list("deleted base nodes", &self.deleted_base_nodes);
        list("edited by left", &self.edited_left_nodes);
        list("edited by right", &self.edited_right_nodes);
        out
    }
}
