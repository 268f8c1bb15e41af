//! Pairwise tree superimposition.
//!
//! Two passes run per merge: left over base, then that result over right.
//! Compatible nodes (equal type and name) are combined; the bodies of
//! matched leaves are spliced into a single tagged string which the content
//! merger later splits back into its left, base and right contributions.

use log::warn;

use crate::{
    context::MergeContext,
    revision::Revision,
    tree::{MergingMechanism, NodeArena, NodeId},
};

/// Sentinel opening a tagged leaf body. Chosen to never occur in legal
/// source text.
pub(crate) const SEMANTIC_MARKER: &str = "~~semistructured.merge~~";
/// Sentinel separating the three contributions inside a tagged leaf body.
pub(crate) const SEPARATOR: &str = "##contribution.separator##";

/// Which superimposition pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// First pass: left is superimposed over base.
    LeftBase,
    /// Second pass: the first pass's result is superimposed over right.
    LeftBaseRight,
}

/// Superimposes `b` onto `a` under `parent`, returning the combined node,
/// or `None` when the two nodes are not compatible.
///
/// The result inherits `a`'s attributes and is stamped with `b`'s origin
/// index, encoding provenance for the second pass.
pub fn superimpose(
    arena: &mut NodeArena,
    a: NodeId,
    b: NodeId,
    parent: Option<NodeId>,
    ctx: &mut MergeContext,
    step: Step,
) -> Option<NodeId> {
    if !arena.node(a).compatible_with(arena.node(b)) {
        return None;
    }
    let result = arena.shallow_clone(a);
    let provenance = arena.node(b).index;
    arena.node_mut(result).index = provenance;
    if let Some(parent) = parent {
        arena.attach_child(parent, result);
    }

    match (arena.node(a).is_terminal(), arena.node(b).is_terminal()) {
        (true, true) => {
            if arena.node(a).mechanism() != MergingMechanism::Default {
                let index_a = arena.node(a).index;
                let body =
                    mark_contributions(arena.node(a).body(), arena.node(b).body(), step, index_a);
                let prefix = mark_contributions(
                    arena.node(a).prefix(),
                    arena.node(b).prefix(),
                    step,
                    index_a,
                );
                arena.set_body(result, body);
                arena.set_prefix(result, prefix);
            }
        }
        (false, false) => superimpose_children(arena, a, b, result, ctx, step),
        _ => {
            let node = arena.node(a);
            warn!(
                "nodes {}({}) agree on type and name but not on shape, keeping the first",
                node.node_type, node.name
            );
        }
    }
    Some(result)
}

fn superimpose_children(
    arena: &mut NodeArena,
    a: NodeId,
    b: NodeId,
    result: NodeId,
    ctx: &mut MergeContext,
    step: Step,
) {
    let a_index = arena.node(a).index;
    let b_index = arena.node(b).index;

    // children of B, matched against A where possible
    for child_b in arena.node(b).children().to_vec() {
        if arena.node(child_b).index.is_none() {
            arena.node_mut(child_b).index = b_index;
        }
        match arena.compatible_child(a, child_b) {
            Some(child_a) => {
                if arena.node(child_a).index.is_none() {
                    arena.node_mut(child_a).index = a_index;
                }
                let added_by_left = ctx.added_left_nodes.contains(&child_a);
                let merged = superimpose(arena, child_a, child_b, Some(result), ctx, step)
                    .expect("compatible children always superimpose");
                ctx.remap(child_a, merged);
                if step == Step::LeftBaseRight && added_by_left {
                    // the same declaration was added on both sides
                    ctx.added_right_nodes.push(merged);
                }
            }
            None => {
                let cloned = arena.deep_clone(child_b);
                arena.attach_child(result, cloned);
                match step {
                    Step::LeftBase => ctx.nodes_deleted_by_left.push(cloned),
                    Step::LeftBaseRight => ctx.added_right_nodes.push(cloned),
                }
            }
        }
    }

    // children of A with no counterpart in B, kept near their neighbours
    let a_children = arena.node(a).children().to_vec();
    for (position, child_a) in a_children.iter().copied().enumerate() {
        if arena.compatible_child(b, child_a).is_some() {
            continue;
        }
        if arena.node(child_a).index.is_none() {
            arena.node_mut(child_a).index = a_index;
        }
        let deleted_by_left = ctx.nodes_deleted_by_left.contains(&child_a);
        let cloned = arena.deep_clone(child_a);
        ctx.remap(child_a, cloned);
        insert_near_neighbours(arena, result, &a_children, position, cloned);
        match step {
            Step::LeftBase => ctx.added_left_nodes.push(cloned),
            Step::LeftBaseRight => {
                ctx.nodes_deleted_by_right.push(cloned);
                if deleted_by_left {
                    // both sides deleted this base node
                    ctx.deleted_base_nodes.push(cloned);
                }
            }
        }
    }
}

/// Inserts `node` among the children of `parent` next to the counterpart of
/// its original left neighbour, falling back to the right neighbour and
/// finally to the end of the list.
fn insert_near_neighbours(
    arena: &mut NodeArena,
    parent: NodeId,
    original_siblings: &[NodeId],
    original_position: usize,
    node: NodeId,
) {
    if original_position > 0 {
        let left_neighbour = original_siblings[original_position - 1];
        if let Some(found) = arena.position_of_compatible(parent, left_neighbour) {
            arena.insert_child(parent, found + 1, node);
            return;
        }
    }
    if let Some(right_neighbour) = original_siblings.get(original_position + 1) {
        if let Some(found) = arena.position_of_compatible(parent, *right_neighbour) {
            arena.insert_child(parent, found, node);
            return;
        }
    }
    arena.attach_child(parent, node);
}

/// Splices the bodies of two matched leaves into a single tagged string.
///
/// After both passes, any matched leaf carries exactly
/// `MARKER ++ left ++ SEP ++ base ++ SEP ++ right` (with possibly empty
/// parts), which the content merger can split unambiguously.
pub(crate) fn mark_contributions(
    body_a: &str,
    body_b: &str,
    step: Step,
    index_a: Option<Revision>,
) -> String {
    if body_a.contains(SEMANTIC_MARKER) {
        // second pass over an already-tagged body: append the right part
        format!("{body_a}{body_b}")
    } else {
        match step {
            Step::LeftBase => format!("{SEMANTIC_MARKER}{body_a}{SEPARATOR}{body_b}{SEPARATOR}"),
            Step::LeftBaseRight => {
                if index_a == Some(Revision::Left) {
                    // A was added by left, so the base slot stays empty
                    format!("{SEMANTIC_MARKER}{body_a}{SEPARATOR}{SEPARATOR}{body_b}")
                } else {
                    format!("{SEMANTIC_MARKER}{SEPARATOR}{body_a}{SEPARATOR}{body_b}")
                }
            }
        }
    }
}

/// Detaches from the merged tree every node recorded as deleted on both
/// sides. Identity is the arena id of the exact clone inserted during the
/// second pass, so structurally equal twins are never confused.
pub fn remove_remaining_base_nodes(arena: &mut NodeArena, ctx: &MergeContext) {
    for id in &ctx.deleted_base_nodes {
        arena.detach(*id);
    }
}
