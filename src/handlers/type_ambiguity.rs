//! Detects imports that end up ambiguous after the merge: both sides added
//! an import of the same simple name from different packages, which would
//! make every use of that name ambiguous even though the tree shows no
//! overlap.

use itertools::Itertools;

use crate::{
    context::MergeContext,
    error::MergeError,
    handlers::ConflictHandler,
    lang::node_type,
    settings::MergeSettings,
    textual::{is_conflicted, render_conflict},
    tree::{NodeArena, NodeId},
};

pub(crate) struct TypeAmbiguityHandler;

impl ConflictHandler for TypeAmbiguityHandler {
    fn name(&self) -> &'static str {
        "type-ambiguity"
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
        let parents: Vec<NodeId> = arena
            .dfs(root)
            .filter(|id| !arena.node(*id).is_terminal())
            .collect();
        for parent in parents {
            let imports: Vec<NodeId> = arena
                .node(parent)
                .children()
                .iter()
                .copied()
                .filter(|id| {
                    let node = arena.node(*id);
                    node.node_type == node_type::IMPORT && !node.body().is_empty()
                })
                .collect();
            let mut named: Vec<(String, usize, NodeId)> = imports
                .iter()
                .enumerate()
                .filter_map(|(position, id)| {
                    simple_name(&arena.node(*id).name).map(|name| (name, position, *id))
                })
                .collect();
            named.sort();
            for (_, group) in &named.into_iter().chunk_by(|(name, _, _)| name.clone()) {
                let group = group.map(|(_, _, id)| id).collect_vec();
                self.resolve_group(arena, ctx, settings, &group);
            }
        }
        Ok(())
    }
}

impl TypeAmbiguityHandler {
    fn resolve_group(
        &self,
        arena: &mut NodeArena,
        ctx: &MergeContext,
        settings: &MergeSettings,
        group: &[NodeId],
    ) {
        if group.len() < 2
            || group
                .iter()
                .any(|id| is_conflicted(arena.node(*id).body(), settings))
        {
            return;
        }
        // the collision is merge-made only when both sides contributed to it
        let from_left: Vec<NodeId> = group
            .iter()
            .copied()
            .filter(|id| ctx.added_left_nodes.contains(id))
            .collect();
        let from_right: Vec<NodeId> = group
            .iter()
            .copied()
            .filter(|id| ctx.added_right_nodes.contains(id))
            .collect();
        if from_left.is_empty() || from_right.is_empty() {
            return;
        }
        let left_bodies = from_left
            .iter()
            .map(|id| arena.node(*id).body())
            .join("\n");
        let right_bodies = from_right
            .iter()
            .map(|id| arena.node(*id).body())
            .join("\n");
        let conflict = render_conflict(&left_bodies, "", &right_bodies, settings);
        let anchor = group[0];
        arena.set_body(anchor, conflict);
        for id in from_left.iter().chain(&from_right) {
            if *id != anchor {
                arena.set_body(*id, "");
            }
        }
    }
}

/// The simple (unqualified) name an import brings into scope, if it is not
/// a wildcard import.
fn simple_name(import_name: &str) -> Option<String> {
    let trimmed = import_name.trim_end().trim_end_matches(';').trim_end();
    let last_token = trimmed.split_whitespace().last()?;
    let segment = last_token.rsplit('.').next()?;
    (segment != "*" && !segment.is_empty()).then(|| segment.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{revision::Revision, tree::MergingMechanism};

    #[test]
    fn simple_names_are_extracted() {
        assert_eq!(simple_name("import java.util.List ;"), Some("List".to_owned()));
        assert_eq!(simple_name("import a.b.C;"), Some("C".to_owned()));
        assert_eq!(simple_name("import java.util.*;"), None);
    }

    fn import(arena: &mut NodeArena, parent: NodeId, path: &str, rev: Revision) -> NodeId {
        let body = format!("import {path};");
        let id = arena.new_terminal(
            node_type::IMPORT,
            body.clone(),
            body,
            "",
            MergingMechanism::ConflictMerge,
            Some(rev),
        );
        arena.attach_child(parent, id);
        id
    }

    #[test]
    fn colliding_imports_from_both_sides_conflict() {
        let settings = MergeSettings::default();
        let mut arena = NodeArena::new();
        let l = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Left));
        let b = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Base));
        let r = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Right));
        let root = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Right));
        let from_left = import(&mut arena, root, "acme.List", Revision::Left);
        let from_right = import(&mut arena, root, "util.List", Revision::Right);

        let mut ctx = MergeContext::new(l, b, r);
        ctx.superimposed_root = Some(root);
        ctx.added_left_nodes.push(from_left);
        ctx.added_right_nodes.push(from_right);

        TypeAmbiguityHandler
            .handle(&mut arena, &mut ctx, &settings)
            .unwrap();
        let body = arena.node(from_left).body();
        assert!(is_conflicted(body, &settings));
        assert!(body.contains("import acme.List;"));
        assert!(body.contains("import util.List;"));
        assert_eq!(arena.node(from_right).body(), "");

        // a second run does not grow the conflict
        let before = arena.node(from_left).body().to_owned();
        TypeAmbiguityHandler
            .handle(&mut arena, &mut ctx, &settings)
            .unwrap();
        assert_eq!(arena.node(from_left).body(), before);
    }

    #[test]
    fn one_sided_collisions_are_not_merge_errors() {
        let settings = MergeSettings::default();
        let mut arena = NodeArena::new();
        let l = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Left));
        let b = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Base));
        let r = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Right));
        let root = arena.new_non_terminal("CompilationUnit", "", Some(Revision::Right));
        let kept = import(&mut arena, root, "acme.List", Revision::Base);
        let added = import(&mut arena, root, "util.List", Revision::Left);

        let mut ctx = MergeContext::new(l, b, r);
        ctx.superimposed_root = Some(root);
        ctx.added_left_nodes.push(added);

        TypeAmbiguityHandler
            .handle(&mut arena, &mut ctx, &settings)
            .unwrap();
        assert!(!is_conflicted(arena.node(kept).body(), &settings));
        assert!(!is_conflicted(arena.node(added).body(), &settings));
    }
}
