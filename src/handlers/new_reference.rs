//! Flags declarations added by one side that textually reference an
//! element edited or deleted by the other side. The tree shows no overlap
//! for these, but accepting them silently would leave a latent compile
//! error (e.g. a new method calling a deleted one).

use regex::Regex;

use crate::{
    context::MergeContext,
    error::MergeError,
    handlers::ConflictHandler,
    lang::node_type,
    revision::Revision,
    settings::MergeSettings,
    textual::{is_conflicted, render_conflict},
    tree::{NodeArena, NodeId},
};

pub(crate) struct NewElementReferencingEditedOneHandler;

impl ConflictHandler for NewElementReferencingEditedOneHandler {
    fn name(&self) -> &'static str {
        "new-element-referencing-edited-one"
    }

    fn handle(
        &self,
        arena: &mut NodeArena,
        ctx: &mut MergeContext,
        settings: &MergeSettings,
    ) -> Result<(), MergeError> {
        for adding_side in [Revision::Left, Revision::Right] {
            let touched = touched_identifiers(arena, ctx, adding_side.opposite());
            if touched.is_empty() {
                continue;
            }
            let added: Vec<NodeId> = ctx
                .added_nodes(adding_side)
                .iter()
                .copied()
                .filter(|id| {
                    let node = arena.node(*id);
                    node.is_terminal()
                        && !node.body().is_empty()
                        && !is_conflicted(node.body(), settings)
                })
                .collect();
            for id in added {
                let body = arena.node(id).body();
                if !touched.iter().any(|pattern| pattern.is_match(body)) {
                    continue;
                }
                let conflict = match adding_side {
                    Revision::Left => render_conflict(body, "", "", settings),
                    _ => render_conflict("", "", body, settings),
                };
                arena.set_body(id, conflict);
            }
        }
        Ok(())
    }
}

/// Patterns matching a use of each element the given side edited, deleted
/// or renamed away.
fn touched_identifiers(arena: &NodeArena, ctx: &MergeContext, side: Revision) -> Vec<Regex> {
    let deleted: Vec<NodeId> = match side {
        Revision::Left => ctx.nodes_deleted_by_left.clone(),
        Revision::Right => ctx
            .nodes_deleted_by_right
            .iter()
            // additions of the other side end up in this set too; they were
            // never present in base, so they cannot have been deleted
            .filter(|id| !ctx.added_left_nodes.contains(id))
            .copied()
            .collect(),
        Revision::Base => Vec::new(),
    };
    ctx.edited_nodes(side)
        .iter()
        .chain(&deleted)
        .filter_map(|id| reference_pattern(arena.node(*id).node_type, &arena.node(*id).name))
        .collect()
}

/// A word-boundary pattern for references to the named element: followed by
/// an opening parenthesis for methods and constructors, bare for fields.
fn reference_pattern(declaration_type: &'static str, name: &str) -> Option<Regex> {
    let identifier = name.split('(').next()?.trim();
    if identifier.is_empty() || !identifier.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let escaped = regex::escape(identifier);
    let pattern = match declaration_type {
        node_type::METHOD | node_type::CONSTRUCTOR => format!(r"\b{escaped}\s*\("),
        node_type::FIELD => format!(r"\b{escaped}\b"),
        _ => return None,
    };
    Some(Regex::new(&pattern).expect("reference pattern is statically well-formed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MergingMechanism;

    fn setup() -> (NodeArena, MergeContext) {
        let mut arena = NodeArena::new();
        let l = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Left));
        let b = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Base));
        let r = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Right));
        let ctx = MergeContext::new(l, b, r);
        (arena, ctx)
    }

    fn method(arena: &mut NodeArena, name: &str, body: &str) -> NodeId {
        arena.new_terminal(
            node_type::METHOD,
            name,
            body,
            "",
            MergingMechanism::ConflictMerge,
            Some(Revision::Right),
        )
    }

    #[test]
    fn added_method_calling_a_deleted_one_conflicts() {
        let settings = MergeSettings::default();
        let (mut arena, mut ctx) = setup();
        let deleted = method(&mut arena, "m()", "");
        let added = method(&mut arena, "n()", "void n() {\n    m();\n}");
        ctx.nodes_deleted_by_left.push(deleted);
        ctx.added_right_nodes.push(added);

        NewElementReferencingEditedOneHandler
            .handle(&mut arena, &mut ctx, &settings)
            .unwrap();
        let body = arena.node(added).body();
        assert!(is_conflicted(body, &settings));
        assert!(body.contains("void n() {"));

        // idempotent: the conflicted body is not wrapped again
        let before = body.to_owned();
        NewElementReferencingEditedOneHandler
            .handle(&mut arena, &mut ctx, &settings)
            .unwrap();
        assert_eq!(arena.node(added).body(), before);
    }

    #[test]
    fn unrelated_additions_are_accepted() {
        let settings = MergeSettings::default();
        let (mut arena, mut ctx) = setup();
        let deleted = method(&mut arena, "m()", "");
        let added = method(&mut arena, "n()", "void n() {\n    other();\n}");
        ctx.nodes_deleted_by_left.push(deleted);
        ctx.added_right_nodes.push(added);

        NewElementReferencingEditedOneHandler
            .handle(&mut arena, &mut ctx, &settings)
            .unwrap();
        assert!(!is_conflicted(arena.node(added).body(), &settings));
    }

    #[test]
    fn field_references_do_not_need_a_call() {
        let settings = MergeSettings::default();
        let (mut arena, mut ctx) = setup();
        let edited = arena.new_terminal(
            node_type::FIELD,
            "limit",
            "int limit = 10;",
            "",
            MergingMechanism::ConflictMerge,
            Some(Revision::Base),
        );
        let added = method(&mut arena, "n()", "void n() {\n    use(limit);\n}");
        ctx.edited_left_nodes.push(edited);
        ctx.added_right_nodes.push(added);

        NewElementReferencingEditedOneHandler
            .handle(&mut arena, &mut ctx, &settings)
            .unwrap();
        assert!(is_conflicted(arena.node(added).body(), &settings));
    }
}
