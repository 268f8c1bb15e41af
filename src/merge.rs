//! The public merge entry points.

use std::{fs, io::ErrorKind, path::Path};

use log::debug;

use crate::{
    content_merge::merge_matched_content,
    context::MergeContext,
    error::MergeError,
    handlers::{assemble_pipeline, run_pipeline, ConflictHandler},
    lang,
    merge_result::MergeResult,
    printer,
    revision::Revision,
    settings::{imitate_line_feeds, normalize_to_lf, MergeSettings},
    superimpose::{remove_remaining_base_nodes, superimpose, Step},
    textual::{count_conflicts, textual_merge},
    tree::NodeArena,
};

pub const SEMISTRUCTURED_METHOD: &str = "semistructured";
pub const TEXTUAL_METHOD: &str = "textual";

/// Merges the three revisions of a Java file with the handler pipeline
/// dictated by the settings.
pub fn semistructured_merge(
    left: &str,
    base: &str,
    right: &str,
    settings: &MergeSettings,
) -> Result<MergeResult, MergeError> {
    let pipeline = assemble_pipeline(settings);
    semistructured_merge_with_handlers(left, base, right, settings, &pipeline)
}

/// Merges the three revisions of a Java file with an explicit handler
/// pipeline, for callers that assemble their own.
pub fn semistructured_merge_with_handlers(
    left: &str,
    base: &str,
    right: &str,
    settings: &MergeSettings,
    handlers: &[Box<dyn ConflictHandler>],
) -> Result<MergeResult, MergeError> {
    let left_lf = normalize_to_lf(left);
    let base_lf = normalize_to_lf(base);
    let right_lf = normalize_to_lf(right);

    let mut arena = NodeArena::new();
    let left_root = lang::parse(&left_lf, Revision::Left, &mut arena)?;
    let base_root = lang::parse(&base_lf, Revision::Base, &mut arena)?;
    let right_root = lang::parse(&right_lf, Revision::Right, &mut arena)?;
    let mut ctx = MergeContext::new(left_root, base_root, right_root);

    let pass1 = superimpose(
        &mut arena,
        left_root,
        base_root,
        None,
        &mut ctx,
        Step::LeftBase,
    )
    .ok_or_else(|| MergeError::Semistructured {
        stage: "superimposition",
        message: "the left and base trees are incompatible at the root".to_owned(),
        summary: ctx.summary(&arena),
    })?;
    let merged = superimpose(
        &mut arena,
        pass1,
        right_root,
        None,
        &mut ctx,
        Step::LeftBaseRight,
    )
    .ok_or_else(|| MergeError::Semistructured {
        stage: "superimposition",
        message: "the combined and right trees are incompatible at the root".to_owned(),
        summary: ctx.summary(&arena),
    })?;
    ctx.superimposed_root = Some(merged);

    remove_remaining_base_nodes(&mut arena, &ctx);
    merge_matched_content(&mut arena, merged, &mut ctx, settings)
        .map_err(|err| err.in_stage("content-merge", ctx.summary(&arena)))?;

    ctx.semistructured_output = printer::print(&arena, merged, settings);
    debug!(
        "intermediate semistructured output is {} bytes",
        ctx.semistructured_output.len()
    );
    run_pipeline(handlers, &mut arena, &mut ctx, settings)?;

    let printed = printer::print(&arena, merged, settings);
    let conflict_count = count_conflicts(&printed, settings);
    Ok(MergeResult {
        contents: imitate_line_feeds(base, &printed),
        conflict_count,
        method: SEMISTRUCTURED_METHOD,
    })
}

/// Purely textual three-way merge of the whole file, used standalone or as
/// a fallback when the semistructured merge fails.
pub fn three_way_textual_merge(
    left: &str,
    base: &str,
    right: &str,
    settings: &MergeSettings,
) -> Result<MergeResult, MergeError> {
    let merged = textual_merge(
        &normalize_to_lf(left),
        &normalize_to_lf(base),
        &normalize_to_lf(right),
        settings,
    )?;
    let conflict_count = count_conflicts(&merged, settings);
    Ok(MergeResult {
        contents: imitate_line_feeds(base, &merged),
        conflict_count,
        method: TEXTUAL_METHOD,
    })
}

/// File-based wrapper for [`semistructured_merge`]. A missing revision is
/// reported as a deletion of the merged file; non-Java extensions are
/// rejected unless running as a git merge driver.
pub fn semistructured_merge_files(
    left: &Path,
    base: &Path,
    right: &Path,
    settings: &MergeSettings,
) -> Result<MergeResult, MergeError> {
    if !settings.is_git {
        for path in [left, base, right] {
            if path.extension().is_none_or(|ext| ext != "java") {
                return Err(MergeError::Parse(format!(
                    "unsupported file extension for {}: expected .java",
                    path.display()
                )));
            }
        }
    }
    let left_contents = read_revision(left)?;
    let base_contents = read_revision(base)?;
    let right_contents = read_revision(right)?;
    semistructured_merge(&left_contents, &base_contents, &right_contents, settings)
}

/// File-based wrapper for [`three_way_textual_merge`]; a nonexistent file
/// is treated as an empty revision.
pub fn three_way_textual_merge_files(
    left: &Path,
    base: &Path,
    right: &Path,
    settings: &MergeSettings,
) -> Result<MergeResult, MergeError> {
    let read_or_empty = |path: &Path| match read_revision(path) {
        Ok(contents) => Ok(contents),
        Err(MergeError::MissingFile { .. }) => Ok(String::new()),
        Err(err) => Err(err),
    };
    three_way_textual_merge(
        &read_or_empty(left)?,
        &read_or_empty(base)?,
        &read_or_empty(right)?,
        settings,
    )
}

fn read_revision(path: &Path) -> Result<String, MergeError> {
    fs::read_to_string(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            MergeError::MissingFile {
                path: path.to_owned(),
            }
        } else {
            MergeError::Parse(format!("cannot read {}: {err}", path.display()))
        }
    })
}
