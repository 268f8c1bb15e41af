//! Always-on handler finishing the treatment of deletions: base nodes
//! deleted on both sides are guaranteed to be gone, and a node deleted on
//! one side but edited on the other becomes a delete-versus-edit conflict
//! carrying the surviving body.

use crate::{
    context::MergeContext,
    error::MergeError,
    handlers::ConflictHandler,
    revision::Revision,
    settings::MergeSettings,
    textual::{is_conflicted, render_conflict},
    tree::NodeArena,
};

pub(crate) struct DeletionsHandler;

impl ConflictHandler for DeletionsHandler {
    fn name(&self) -> &'static str {
        "deletions"
    }

    fn handle(
        &self,
        arena: &mut NodeArena,
        ctx: &mut MergeContext,
        settings: &MergeSettings,
    ) -> Result<(), MergeError> {
        for id in &ctx.deleted_base_nodes {
            arena.detach(*id);
        }

        for candidate in ctx.deletion_candidates.clone() {
            let edited_by_other = match candidate.deleted_by {
                Revision::Left => ctx.edited_right_nodes.contains(&candidate.node),
                Revision::Right => ctx.edited_left_nodes.contains(&candidate.node),
                Revision::Base => false,
            };
            if !edited_by_other || is_conflicted(arena.node(candidate.node).body(), settings) {
                continue;
            }
            let (left, right) = match candidate.deleted_by {
                Revision::Left => (String::new(), candidate.surviving_body),
                _ => (candidate.surviving_body, String::new()),
            };
            let conflict = render_conflict(&left, &candidate.base_body, &right, settings);
            arena.set_body(candidate.node, conflict);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::DeletionCandidate,
        tree::{MergingMechanism, NodeId},
    };

    fn setup(deleted_by: Revision) -> (NodeArena, MergeContext, NodeId) {
        let mut arena = NodeArena::new();
        let l = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Left));
        let b = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Base));
        let r = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Right));
        let node = arena.new_terminal(
            "MethodDecl",
            "m()",
            "void m() { y(); }",
            "",
            MergingMechanism::ConflictMerge,
            Some(Revision::Base),
        );
        let mut ctx = MergeContext::new(l, b, r);
        ctx.deletion_candidates.push(DeletionCandidate {
            node,
            deleted_by,
            base_body: "void m() { x(); }".to_owned(),
            surviving_body: "void m() { y(); }".to_owned(),
        });
        (arena, ctx, node)
    }

    #[test]
    fn delete_versus_edit_becomes_a_conflict() {
        let (mut arena, mut ctx, node) = setup(Revision::Left);
        ctx.edited_right_nodes.push(node);
        let settings = MergeSettings::default();
        DeletionsHandler.handle(&mut arena, &mut ctx, &settings).unwrap();
        assert_eq!(
            arena.node(node).body(),
            "<<<<<<< MINE\n||||||| BASE\nvoid m() { x(); }\n=======\nvoid m() { y(); }\n>>>>>>> YOURS\n"
        );

        // second run leaves the conflict untouched
        let before = arena.node(node).body().to_owned();
        DeletionsHandler.handle(&mut arena, &mut ctx, &settings).unwrap();
        assert_eq!(arena.node(node).body(), before);
    }

    #[test]
    fn uncontested_deletions_are_left_alone() {
        let (mut arena, mut ctx, node) = setup(Revision::Left);
        let settings = MergeSettings::default();
        DeletionsHandler.handle(&mut arena, &mut ctx, &settings).unwrap();
        assert_eq!(arena.node(node).body(), "void m() { y(); }");
    }

    #[test]
    fn deleted_base_nodes_are_detached() {
        let mut arena = NodeArena::new();
        let l = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Left));
        let b = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Base));
        let r = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Right));
        let root = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Base));
        let gone = arena.new_terminal(
            "FieldDecl",
            "k",
            "int k;",
            "",
            MergingMechanism::ConflictMerge,
            Some(Revision::Base),
        );
        arena.attach_child(root, gone);
        let mut ctx = MergeContext::new(l, b, r);
        ctx.deleted_base_nodes.push(gone);

        DeletionsHandler
            .handle(&mut arena, &mut ctx, &MergeSettings::default())
            .unwrap();
        assert!(arena.node(root).children().is_empty());
    }
}
