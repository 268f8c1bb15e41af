//! Re-merges static and instance initializer blocks.
//!
//! Initializer blocks have no name, so superimposition matches them purely
//! by position and collapses independent insertions onto one another. Both
//! handlers rebuild the blocks of each class from the three revision trees:
//! the single-block variant handles classes with at most one block per
//! revision, the multiple-blocks variant re-pairs blocks across revisions
//! by body similarity.

use rustc_hash::FxHashMap;

use crate::{
    content_merge::compare_and_merge,
    context::MergeContext,
    error::MergeError,
    handlers::{class_path, classes_of, find_class, ConflictHandler},
    lang::node_type,
    revision::Revision,
    settings::MergeSettings,
    textual::{normalize_ws, textual_merge},
    tree::{MergingMechanism, NodeArena, NodeId},
};

/// Similarity above which two initializer blocks from different revisions
/// are treated as versions of the same block.
const BLOCK_PAIRING_THRESHOLD: f64 = 0.5;

pub(crate) struct InitializationBlocksHandler;

impl ConflictHandler for InitializationBlocksHandler {
    fn name(&self) -> &'static str {
        "initialization-blocks"
    }

    fn handle(
        &self,
        arena: &mut NodeArena,
        ctx: &mut MergeContext,
        settings: &MergeSettings,
    ) -> Result<(), MergeError> {
        let Some(root) = ctx.superimposed_root else {
            return Ok(());
        };
        for class in classes_of(arena, root) {
            let merged_blocks = blocks_of(arena, class);
            if merged_blocks.is_empty() {
                continue;
            }
            let revisions = revision_blocks(arena, ctx, class);
            if revisions.iter().any(|blocks| blocks.len() > 1) {
                // two or more blocks in one revision is the multiple-blocks
                // variant's territory
                continue;
            }
            let [left, base, right] = revisions;
            let body = textual_merge(
                left.first().map_or("", |b| b.body.as_str()),
                base.first().map_or("", |b| b.body.as_str()),
                right.first().map_or("", |b| b.body.as_str()),
                settings,
            )?;
            let prefix = compare_and_merge(
                left.first().map_or("", |b| b.prefix.as_str()),
                base.first().map_or("", |b| b.prefix.as_str()),
                right.first().map_or("", |b| b.prefix.as_str()),
            );
            arena.set_body(merged_blocks[0], body);
            arena.set_prefix(merged_blocks[0], prefix);
            for extra in &merged_blocks[1..] {
                arena.detach(*extra);
            }
        }
        Ok(())
    }
}

pub(crate) struct MultipleInitializationBlocksHandler;

impl ConflictHandler for MultipleInitializationBlocksHandler {
    fn name(&self) -> &'static str {
        "initialization-blocks-multiple"
    }

    fn handle(
        &self,
        arena: &mut NodeArena,
        ctx: &mut MergeContext,
        settings: &MergeSettings,
    ) -> Result<(), MergeError> {
        let Some(root) = ctx.superimposed_root else {
            return Ok(());
        };
        for class in classes_of(arena, root) {
            let merged_blocks = blocks_of(arena, class);
            if merged_blocks.is_empty() {
                continue;
            }
            let [lefts, bases, rights] = revision_blocks(arena, ctx, class);

            // pair the blocks of each side with the most similar base block
            let left_pairing = pair_blocks(&bases, &lefts);
            let right_pairing = pair_blocks(&bases, &rights);

            let mut rebuilt: Vec<(String, String)> = Vec::new();
            for (index, base_block) in bases.iter().enumerate() {
                let left_block = left_pairing.get(&index).map(|i| &lefts[*i]);
                let right_block = right_pairing.get(&index).map(|i| &rights[*i]);
                let body = textual_merge(
                    left_block.map_or("", |b| b.body.as_str()),
                    &base_block.body,
                    right_block.map_or("", |b| b.body.as_str()),
                    settings,
                )?;
                if normalize_ws(&body).is_empty() {
                    continue;
                }
                let prefix = compare_and_merge(
                    left_block.map_or("", |b| b.prefix.as_str()),
                    &base_block.prefix,
                    right_block.map_or("", |b| b.prefix.as_str()),
                );
                rebuilt.push((body, prefix));
            }
            // blocks with no base counterpart are fresh insertions
            let paired_left: Vec<usize> = left_pairing.values().copied().collect();
            for (index, block) in lefts.iter().enumerate() {
                if !paired_left.contains(&index) {
                    rebuilt.push((block.body.clone(), block.prefix.clone()));
                }
            }
            let paired_right: Vec<usize> = right_pairing.values().copied().collect();
            for (index, block) in rights.iter().enumerate() {
                if !paired_right.contains(&index) {
                    rebuilt.push((block.body.clone(), block.prefix.clone()));
                }
            }

            // splice the rebuilt blocks back in at the first block's position
            let anchor = arena
                .node(class)
                .children()
                .iter()
                .position(|id| *id == merged_blocks[0])
                .expect("anchor block is a child of its class");
            for block in &merged_blocks {
                arena.detach(*block);
            }
            for (offset, (body, prefix)) in rebuilt.into_iter().enumerate() {
                let block = arena.new_terminal(
                    node_type::INIT_BLOCK,
                    "",
                    body,
                    prefix,
                    MergingMechanism::ConflictMerge,
                    Some(Revision::Base),
                );
                arena.insert_child(class, anchor + offset, block);
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Block {
    body: String,
    prefix: String,
}

fn blocks_of(arena: &NodeArena, class: NodeId) -> Vec<NodeId> {
    arena
        .node(class)
        .children()
        .iter()
        .copied()
        .filter(|id| arena.node(*id).node_type == node_type::INIT_BLOCK)
        .collect()
}

/// The initializer blocks of the matching class in each revision tree,
/// in left, base, right order.
fn revision_blocks(arena: &NodeArena, ctx: &MergeContext, class: NodeId) -> [Vec<Block>; 3] {
    let path = class_path(arena, class);
    [ctx.left_root, ctx.base_root, ctx.right_root].map(|root| {
        find_class(arena, root, &path)
            .map(|found| {
                blocks_of(arena, found)
                    .into_iter()
                    .map(|id| Block {
                        body: arena.node(id).body().to_owned(),
                        prefix: arena.node(id).prefix().to_owned(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    })
}

/// Greedy pairing of each base block with its most similar counterpart,
/// every counterpart being used at most once.
fn pair_blocks(bases: &[Block], others: &[Block]) -> FxHashMap<usize, usize> {
    let mut pairing = FxHashMap::default();
    let mut taken = vec![false; others.len()];
    for (base_index, base_block) in bases.iter().enumerate() {
        let best = others
            .iter()
            .enumerate()
            .filter(|(other_index, _)| !taken[*other_index])
            .map(|(other_index, other)| {
                (other_index, block_similarity(&base_block.body, &other.body))
            })
            .filter(|(_, score)| *score >= BLOCK_PAIRING_THRESHOLD)
            .max_by(|(a_index, a), (b_index, b)| {
                a.partial_cmp(b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b_index.cmp(a_index))
            });
        if let Some((other_index, _)) = best {
            taken[other_index] = true;
            pairing.insert(base_index, other_index);
        }
    }
    pairing
}

fn block_similarity(a: &str, b: &str) -> f64 {
    if normalize_ws(a) == normalize_ws(b) {
        return 1.0;
    }
    let lines = |s: &str| {
        s.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect::<Vec<_>>()
    };
    let (lines_a, lines_b) = (lines(a), lines(b));
    if lines_a.is_empty() && lines_b.is_empty() {
        return 1.0;
    }
    let common = lines_a.iter().filter(|line| lines_b.contains(line)).count();
    2.0 * common as f64 / (lines_a.len() + lines_b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lang, printer, revision::Revision, superimpose};

    fn merge_with(
        handler: &dyn ConflictHandler,
        left: &str,
        base: &str,
        right: &str,
        settings: &MergeSettings,
    ) -> String {
        let mut arena = NodeArena::new();
        let left_root = lang::parse(left, Revision::Left, &mut arena).unwrap();
        let base_root = lang::parse(base, Revision::Base, &mut arena).unwrap();
        let right_root = lang::parse(right, Revision::Right, &mut arena).unwrap();
        let mut ctx = MergeContext::new(left_root, base_root, right_root);
        let pass1 = superimpose::superimpose(
            &mut arena,
            left_root,
            base_root,
            None,
            &mut ctx,
            superimpose::Step::LeftBase,
        )
        .unwrap();
        let merged = superimpose::superimpose(
            &mut arena,
            pass1,
            right_root,
            None,
            &mut ctx,
            superimpose::Step::LeftBaseRight,
        )
        .unwrap();
        ctx.superimposed_root = Some(merged);
        superimpose::remove_remaining_base_nodes(&mut arena, &ctx);
        crate::content_merge::merge_matched_content(&mut arena, merged, &mut ctx, settings)
            .unwrap();
        handler.handle(&mut arena, &mut ctx, settings).unwrap();
        printer::print(&arena, merged, settings)
    }

    #[test]
    fn independent_edits_to_one_block_compose() {
        let base = "class A {\n    static {\n        a();\n        z();\n    }\n}\n";
        let left = "class A {\n    static {\n        a();\n        l();\n        z();\n    }\n}\n";
        let right = "class A {\n    static {\n        a();\n        z();\n        r();\n    }\n}\n";
        let merged = merge_with(
            &InitializationBlocksHandler,
            left,
            base,
            right,
            &MergeSettings::default(),
        );
        assert_eq!(
            merged,
            "class A {\n    static {\n        a();\n        l();\n        z();\n        r();\n    }\n}\n"
        );
    }

    #[test]
    fn insertions_by_both_sides_keep_both_blocks() {
        let base = "class A {\n    static {\n        shared();\n    }\n}\n";
        let left =
            "class A {\n    static {\n        fromLeft();\n    }\n    static {\n        shared();\n    }\n}\n";
        let right =
            "class A {\n    static {\n        shared();\n    }\n    static {\n        fromRight();\n    }\n}\n";
        let settings = MergeSettings {
            handlers: crate::settings::HandlerSettings {
                initialization_blocks: false,
                initialization_blocks_multiple: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let merged = merge_with(
            &MultipleInitializationBlocksHandler,
            left,
            base,
            right,
            &settings,
        );
        assert!(merged.contains("shared();"));
        assert!(merged.contains("fromLeft();"));
        assert!(merged.contains("fromRight();"));
        assert_eq!(merged.matches("static {").count(), 3);
    }

    #[test]
    fn block_similarity_pairs_matching_blocks() {
        let a = "static {\n    a();\n    b();\n}";
        let close = "static {\n    a();\n    b();\n    c();\n}";
        let far = "static {\n    totally();\n    different();\n}";
        assert!(block_similarity(a, close) >= BLOCK_PAIRING_THRESHOLD);
        assert!(block_similarity(a, far) < BLOCK_PAIRING_THRESHOLD);
    }
}
