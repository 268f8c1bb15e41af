//! Classifies methods and constructors whose body one side emptied:
//! a similar declaration added on the same side makes it a renaming
//! (merged with the other side's edits when they do not overlap, bracketed
//! as a conflict when they do), and the absence of one makes it a plain
//! deletion, left to the deletions handler.

use rustc_hash::FxHashMap;

use crate::{
    context::{MergeContext, RenameCandidate},
    error::MergeError,
    handlers::ConflictHandler,
    lang::node_type,
    revision::Revision,
    settings::MergeSettings,
    textual::{is_conflicted, normalize_ws, render_conflict, textual_merge},
    tree::{NodeArena, NodeId},
};

/// Body similarity above which an addition is considered a renaming of a
/// deleted declaration.
const SIMILARITY_THRESHOLD: f64 = 0.5;

pub(crate) struct RenamingAndDeletionHandler;

impl ConflictHandler for RenamingAndDeletionHandler {
    fn name(&self) -> &'static str {
        "method-and-constructor-renaming-and-deletion"
    }

    fn handle(
        &self,
        arena: &mut NodeArena,
        ctx: &mut MergeContext,
        settings: &MergeSettings,
    ) -> Result<(), MergeError> {
        for side in [Revision::Left, Revision::Right] {
            let candidates = match side {
                Revision::Left => std::mem::take(&mut ctx.possible_renamed_left_nodes),
                _ => std::mem::take(&mut ctx.possible_renamed_right_nodes),
            };
            for candidate in candidates {
                self.resolve(arena, ctx, settings, side, &candidate)?;
            }
        }
        Ok(())
    }
}

impl RenamingAndDeletionHandler {
    fn resolve(
        &self,
        arena: &mut NodeArena,
        ctx: &mut MergeContext,
        settings: &MergeSettings,
        renaming_side: Revision,
        candidate: &RenameCandidate,
    ) -> Result<(), MergeError> {
        let node = arena.node(candidate.node);
        if !matches!(node.node_type, node_type::METHOD | node_type::CONSTRUCTOR) {
            return Ok(());
        }
        if normalize_ws(&candidate.other_body) == normalize_ws(&candidate.base_body) {
            // the other side left the declaration untouched, so the
            // renaming (or deletion) already went through cleanly
            return Ok(());
        }
        let Some(target) = self.renaming_target(arena, ctx, settings, renaming_side, candidate)
        else {
            // no similar addition: a deletion against an edit,
            // which the deletions handler turns into a conflict
            return Ok(());
        };

        // orient the renamed declaration on the side that renamed it
        let (left, right) = match renaming_side {
            Revision::Left => (arena.node(target).body(), candidate.other_body.as_str()),
            _ => (candidate.other_body.as_str(), arena.node(target).body()),
        };
        let merged = textual_merge(left, &candidate.base_body, right, settings)?;
        if is_conflicted(&merged, settings) {
            // unsafe renaming: bracket both candidates at the original spot
            let conflict = render_conflict(left, &candidate.base_body, right, settings);
            arena.set_body(candidate.node, conflict);
            arena.set_body(target, "");
        } else {
            // safe renaming: the other side's edits flow into the renamed body
            arena.set_body(target, merged);
            arena.set_body(candidate.node, "");
        }
        ctx.mark_resolved(candidate.node);
        Ok(())
    }

    /// The most similar declaration added on the renaming side, if similar
    /// enough to the emptied base body.
    fn renaming_target(
        &self,
        arena: &NodeArena,
        ctx: &MergeContext,
        settings: &MergeSettings,
        side: Revision,
        candidate: &RenameCandidate,
    ) -> Option<NodeId> {
        let wanted_type = arena.node(candidate.node).node_type;
        ctx.added_nodes(side)
            .iter()
            .copied()
            .filter(|id| {
                let node = arena.node(*id);
                node.is_terminal()
                    && node.node_type == wanted_type
                    && !node.body().is_empty()
                    && !is_conflicted(node.body(), settings)
            })
            .map(|id| (id, similarity(arena.node(id).body(), &candidate.base_body)))
            .filter(|(_, score)| *score >= SIMILARITY_THRESHOLD)
            .max_by(|(a_id, a), (b_id, b)| {
                a.partial_cmp(b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b_id.cmp(a_id))
            })
            .map(|(id, _)| id)
    }
}

/// Dice coefficient over word token multisets, ignoring punctuation and
/// whitespace.
fn similarity(a: &str, b: &str) -> f64 {
    let tokens = |s: &str| {
        let mut counts: FxHashMap<String, usize> = FxHashMap::default();
        for token in s.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
            if !token.is_empty() {
                *counts.entry(token.to_owned()).or_default() += 1;
            }
        }
        counts
    };
    let (counts_a, counts_b) = (tokens(a), tokens(b));
    let total: usize = counts_a.values().sum::<usize>() + counts_b.values().sum::<usize>();
    if total == 0 {
        return 1.0;
    }
    let common: usize = counts_a
        .iter()
        .map(|(token, count)| count.min(counts_b.get(token).unwrap_or(&0)))
        .sum();
    2.0 * common as f64 / total as f64
}
