//! Splits the contribution-tagged leaf bodies produced by superimposition
//! into their left, base and right parts, classifies edits and deletions,
//! and dispatches the bodies to the configured textual merger.

use crate::{
    context::{DeletionCandidate, DuplicateCandidate, MergeContext, RenameCandidate},
    error::MergeError,
    revision::Revision,
    settings::MergeSettings,
    superimpose::{SEMANTIC_MARKER, SEPARATOR},
    textual::{normalize_ws, textual_merge},
    tree::{NodeArena, NodeId},
};

/// Walks the merged tree and merges the bodies and prefixes of every leaf
/// carrying contribution tags. Also populates the edited/renamed/deleted
/// bookkeeping that the conflict handlers consume.
pub fn merge_matched_content(
    arena: &mut NodeArena,
    root: NodeId,
    ctx: &mut MergeContext,
    settings: &MergeSettings,
) -> Result<(), MergeError> {
    let terminals: Vec<NodeId> = arena
        .dfs(root)
        .filter(|id| arena.node(*id).is_terminal())
        .collect();
    for id in terminals {
        if arena.node(id).prefix().contains(SEPARATOR) {
            let (left, base, right) = split_contributions(arena.node(id).prefix());
            arena.set_prefix(id, compare_and_merge(&left, &base, &right));
        }
        if arena.node(id).body().contains(SEPARATOR) {
            merge_body(arena, id, ctx, settings)?;
        }
    }
    Ok(())
}

fn merge_body(
    arena: &mut NodeArena,
    id: NodeId,
    ctx: &mut MergeContext,
    settings: &MergeSettings,
) -> Result<(), MergeError> {
    let (left, base, right) = split_contributions(arena.node(id).body());
    let (nl, nb, nr) = (
        normalize_ws(&left),
        normalize_ws(&base),
        normalize_ws(&right),
    );

    if nl.is_empty() && !nb.is_empty() {
        // left emptied the body: a deletion, or a renaming if the renaming
        // handler recognizes a similar addition on the left side
        if settings.handlers.method_and_constructor_renaming_and_deletion {
            ctx.possible_renamed_left_nodes.push(RenameCandidate {
                base_body: base.clone(),
                node: id,
                other_body: right.clone(),
            });
        }
        if nr == nb {
            arena.set_body(id, "");
        } else {
            ctx.edited_right_nodes.push(id);
            ctx.deletion_candidates.push(DeletionCandidate {
                node: id,
                deleted_by: Revision::Left,
                base_body: base,
                surviving_body: right.clone(),
            });
            arena.set_body(id, right);
        }
    } else if nr.is_empty() && !nb.is_empty() {
        if settings.handlers.method_and_constructor_renaming_and_deletion {
            ctx.possible_renamed_right_nodes.push(RenameCandidate {
                base_body: base.clone(),
                node: id,
                other_body: left.clone(),
            });
        }
        if nl == nb {
            arena.set_body(id, "");
        } else {
            ctx.edited_left_nodes.push(id);
            ctx.deletion_candidates.push(DeletionCandidate {
                node: id,
                deleted_by: Revision::Right,
                base_body: base,
                surviving_body: left.clone(),
            });
            arena.set_body(id, left);
        }
    } else if nb.is_empty() && !nl.is_empty() && !nr.is_empty() {
        // the same declaration was added on both sides; keep both copies
        // and let the duplicated-declaration handler collapse or conflict
        ctx.duplicate_candidates.push(DuplicateCandidate {
            node: id,
            left_body: left.clone(),
            right_body: right.clone(),
        });
        arena.set_body(id, format!("{left}\n{right}"));
    } else {
        if nb == nr && nb != nl {
            ctx.edited_left_nodes.push(id);
        } else if nb == nl && nb != nr {
            ctx.edited_right_nodes.push(id);
        }
        if nl == nb && nr == nb {
            arena.set_body(id, left);
        } else {
            let merged = textual_merge(&left, &base, &right, settings)?;
            arena.set_body(id, merged);
        }
    }
    Ok(())
}

/// Splits a tagged string into its three contributions, with empty strings
/// for absent parts.
pub(crate) fn split_contributions(tagged: &str) -> (String, String, String) {
    let untagged = tagged.replacen(SEMANTIC_MARKER, "", 1);
    let mut parts = untagged.splitn(3, SEPARATOR);
    let left = parts.next().unwrap_or_default().to_owned();
    let base = parts.next().unwrap_or_default().to_owned();
    let right = parts.next().unwrap_or_default().to_owned();
    (left, base, right)
}

/// Lightweight three-way merge used for special-token prefixes: takes the
/// changed side when only one side changed, and is left-biased when both
/// sides changed to different content. Comparisons are whitespace
/// normalized.
pub(crate) fn compare_and_merge(left: &str, base: &str, right: &str) -> String {
    if normalize_ws(left) == normalize_ws(right) {
        left.to_owned()
    } else if normalize_ws(base) == normalize_ws(left) {
        right.to_owned()
    } else {
        // right unchanged, or both sides changed: left wins
        left.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MergingMechanism;

    fn tagged_terminal(arena: &mut NodeArena, left: &str, base: &str, right: &str) -> NodeId {
        arena.new_terminal(
            "MethodDecl",
            "m()",
            format!("{SEMANTIC_MARKER}{left}{SEPARATOR}{base}{SEPARATOR}{right}"),
            "",
            MergingMechanism::ConflictMerge,
            Some(Revision::Base),
        )
    }

    fn run(arena: &mut NodeArena, node: NodeId) -> MergeContext {
        let root = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Base));
        arena.attach_child(root, node);
        let l = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Left));
        let b = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Base));
        let r = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Right));
        let mut ctx = MergeContext::new(l, b, r);
        merge_matched_content(arena, root, &mut ctx, &MergeSettings::default()).unwrap();
        ctx
    }

    #[test]
    fn untouched_bodies_stay_as_they_are() {
        let mut arena = NodeArena::new();
        let node = tagged_terminal(&mut arena, "void m() {}", "void m() {}", "void m() {}");
        let ctx = run(&mut arena, node);
        assert_eq!(arena.node(node).body(), "void m() {}");
        assert!(ctx.edited_left_nodes.is_empty());
        assert!(ctx.edited_right_nodes.is_empty());
    }

    #[test]
    fn one_sided_edits_are_classified_and_win() {
        let mut arena = NodeArena::new();
        let node = tagged_terminal(&mut arena, "void m() { x(); }", "void m() {}", "void m() {}");
        let ctx = run(&mut arena, node);
        assert_eq!(arena.node(node).body(), "void m() { x(); }");
        assert_eq!(ctx.edited_left_nodes, vec![node]);
        assert!(ctx.edited_right_nodes.is_empty());
    }

    #[test]
    fn agreed_deletion_empties_the_body() {
        let mut arena = NodeArena::new();
        let node = tagged_terminal(&mut arena, "", "void m() {}", "void m() {}");
        let ctx = run(&mut arena, node);
        assert_eq!(arena.node(node).body(), "");
        assert_eq!(ctx.possible_renamed_left_nodes.len(), 1);
        assert!(ctx.deletion_candidates.is_empty());
    }

    #[test]
    fn deletion_against_edit_is_recorded() {
        let mut arena = NodeArena::new();
        let node = tagged_terminal(&mut arena, "", "void m() {}", "void m() { y(); }");
        let ctx = run(&mut arena, node);
        assert_eq!(arena.node(node).body(), "void m() { y(); }");
        assert_eq!(ctx.edited_right_nodes, vec![node]);
        assert_eq!(ctx.deletion_candidates.len(), 1);
        assert_eq!(ctx.deletion_candidates[0].deleted_by, Revision::Left);
        assert_eq!(ctx.deletion_candidates[0].surviving_body, "void m() { y(); }");
    }

    #[test]
    fn double_additions_keep_both_copies_for_the_handler() {
        let mut arena = NodeArena::new();
        let node = tagged_terminal(&mut arena, "int k = 0;", "", "int k = 0;");
        let ctx = run(&mut arena, node);
        assert_eq!(arena.node(node).body(), "int k = 0;\nint k = 0;");
        assert_eq!(ctx.duplicate_candidates.len(), 1);
    }

    #[test]
    fn diverging_edits_are_merged_textually() {
        let mut arena = NodeArena::new();
        let node = tagged_terminal(
            &mut arena,
            "void m() {\n    a();\n    x();\n}",
            "void m() {\n    a();\n}",
            "void m() {\n    b();\n    a();\n}",
        );
        run(&mut arena, node);
        assert_eq!(
            arena.node(node).body(),
            "void m() {\n    b();\n    a();\n    x();\n}"
        );
    }

    #[test]
    fn prefixes_use_the_lightweight_merge() {
        assert_eq!(compare_and_merge("// a", "// a", "// b"), "// b");
        assert_eq!(compare_and_merge("// c", "// a", "// a"), "// c");
        assert_eq!(compare_and_merge("// l", "// a", "// r"), "// l");
        assert_eq!(compare_and_merge("//  a", "// x", "// a"), "//  a");
    }
}
