//! Collapses declarations added identically on both sides, and turns
//! same-name additions with diverging bodies into an explicit conflict.

use crate::{
    context::MergeContext,
    error::MergeError,
    handlers::ConflictHandler,
    settings::MergeSettings,
    textual::{normalize_ws, render_conflict},
    tree::NodeArena,
};

pub(crate) struct DuplicatedDeclarationsHandler;

impl ConflictHandler for DuplicatedDeclarationsHandler {
    fn name(&self) -> &'static str {
        "duplicated-declarations"
    }

    fn handle(
        &self,
        arena: &mut NodeArena,
        ctx: &mut MergeContext,
        settings: &MergeSettings,
    ) -> Result<(), MergeError> {
        for candidate in std::mem::take(&mut ctx.duplicate_candidates) {
            if normalize_ws(&candidate.left_body) == normalize_ws(&candidate.right_body) {
                arena.set_body(candidate.node, candidate.left_body);
            } else {
                let conflict =
                    render_conflict(&candidate.left_body, "", &candidate.right_body, settings);
                arena.set_body(candidate.node, conflict);
            }
        }
        Ok(())
    }
}
