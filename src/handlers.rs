//! Post-processing pipeline refining the raw superimposition result.
//!
//! Handlers run in a fixed order which is part of the merge contract:
//! type ambiguities first, then references to edited elements, renamings,
//! initializer blocks, duplicated declarations, and finally deletions
//! (which always run). Each handler mutates terminals in place or prunes
//! and inserts children; any failure is wrapped into a semistructured
//! merge error carrying a summary of the bookkeeping.

pub(crate) mod deletions;
pub(crate) mod duplicates;
pub(crate) mod init_blocks;
pub(crate) mod new_reference;
pub(crate) mod renaming;
pub(crate) mod type_ambiguity;

use log::debug;

use crate::{
    context::MergeContext,
    error::MergeError,
    settings::MergeSettings,
    tree::{NodeArena, NodeId},
};

/// A single post-processor of the merged tree.
pub trait ConflictHandler {
    fn name(&self) -> &'static str;

    fn handle(
        &self,
        arena: &mut NodeArena,
        ctx: &mut MergeContext,
        settings: &MergeSettings,
    ) -> Result<(), MergeError>;
}

/// Assembles the handler pipeline from the configuration. The deletions
/// handler is always appended; the multiple-blocks variant of the
/// initialization-blocks handler only runs when the single-block variant
/// is disabled.
pub fn assemble_pipeline(settings: &MergeSettings) -> Vec<Box<dyn ConflictHandler>> {
    let flags = &settings.handlers;
    let mut pipeline: Vec<Box<dyn ConflictHandler>> = Vec::new();
    if flags.type_ambiguity {
        pipeline.push(Box::new(type_ambiguity::TypeAmbiguityHandler));
    }
    if flags.new_element_referencing_edited_one {
        pipeline.push(Box::new(new_reference::NewElementReferencingEditedOneHandler));
    }
    if flags.method_and_constructor_renaming_and_deletion {
        pipeline.push(Box::new(renaming::RenamingAndDeletionHandler));
    }
    if flags.initialization_blocks {
        pipeline.push(Box::new(init_blocks::InitializationBlocksHandler));
    } else if flags.initialization_blocks_multiple {
        pipeline.push(Box::new(init_blocks::MultipleInitializationBlocksHandler));
    }
    if flags.duplicated_declarations {
        pipeline.push(Box::new(duplicates::DuplicatedDeclarationsHandler));
    }
    pipeline.push(Box::new(deletions::DeletionsHandler));
    pipeline
}

/// Runs the pipeline in order over the merged tree.
pub fn run_pipeline(
    pipeline: &[Box<dyn ConflictHandler>],
    arena: &mut NodeArena,
    ctx: &mut MergeContext,
    settings: &MergeSettings,
) -> Result<(), MergeError> {
    for handler in pipeline {
        debug!("running conflict handler {}", handler.name());
        handler
            .handle(arena, ctx, settings)
            .map_err(|err| err.in_stage(handler.name(), ctx.summary(arena)))?;
    }
    Ok(())
}

/// The classes of the merged tree, in document order.
pub(crate) fn classes_of(arena: &NodeArena, root: NodeId) -> Vec<NodeId> {
    arena
        .dfs(root)
        .filter(|id| {
            let node = arena.node(*id);
            !node.is_terminal() && node.node_type == crate::lang::node_type::CLASS
        })
        .collect()
}

/// The chain of class names leading to a class, identifying the same class
/// across the revision trees.
pub(crate) fn class_path(arena: &NodeArena, class: NodeId) -> Vec<String> {
    let mut path = Vec::new();
    let mut cursor = Some(class);
    while let Some(id) = cursor {
        let node = arena.node(id);
        if node.node_type == crate::lang::node_type::CLASS {
            path.push(node.name.clone());
        }
        cursor = node.parent;
    }
    path.reverse();
    path
}

/// Finds the class reached by `path` in the tree rooted at `root`.
pub(crate) fn find_class(arena: &NodeArena, root: NodeId, path: &[String]) -> Option<NodeId> {
    let mut cursor = root;
    for name in path {
        cursor = arena
            .node(cursor)
            .children()
            .iter()
            .copied()
            .find(|child| {
                let node = arena.node(*child);
                node.node_type == crate::lang::node_type::CLASS && node.name == *name
            })?;
    }
    Some(cursor)
}
