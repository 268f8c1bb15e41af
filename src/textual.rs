use diffy_imara::{Algorithm, ConflictStyle, MergeOptions};
use itertools::Itertools;

use crate::{error::MergeError, settings::MergeSettings};

/// How leaf bodies (and whole files, for the textual entry point) are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextualMergeStrategy {
    /// Plain line-based three-way merge with conventional conflict brackets.
    #[default]
    Diff3,
    /// First attempt a merge at token granularity, so that edits to
    /// different arguments of the same line do not conflict; fall back to
    /// plain diff3 when the token-level merge still conflicts.
    CsDiffAndDiff3,
}

/// Placeholder for newlines inside whitespace tokens while a body is
/// exploded to one token per line.
const ENCODED_NEWLINE: char = '\u{1F}';

/// Three-way merge of in-memory strings according to the configured
/// strategy. Returns the merged text, possibly containing conflict markers
/// using the labels from `settings`.
pub fn textual_merge(
    left: &str,
    base: &str,
    right: &str,
    settings: &MergeSettings,
) -> Result<String, MergeError> {
    if settings.ignore_whitespace {
        // trivial cases are decided on normalized content, so that
        // whitespace-only divergence never produces a conflict
        if normalize_ws(left) == normalize_ws(right) {
            return Ok(left.to_owned());
        }
        if normalize_ws(left) == normalize_ws(base) {
            return Ok(right.to_owned());
        }
        if normalize_ws(right) == normalize_ws(base) {
            return Ok(left.to_owned());
        }
    }
    match settings.strategy {
        TextualMergeStrategy::Diff3 => Ok(line_merge(left, base, right, settings).0),
        TextualMergeStrategy::CsDiffAndDiff3 => {
            if let Some(clean) = token_merge(left, base, right) {
                Ok(clean)
            } else {
                Ok(line_merge(left, base, right, settings).0)
            }
        }
    }
}

/// Line-based diff3 merge. Returns the merged contents (relabelled with the
/// configured revision names) and whether it contains conflicts.
pub(crate) fn line_merge(
    left: &str,
    base: &str,
    right: &str,
    settings: &MergeSettings,
) -> (String, bool) {
    let merged = MergeOptions::new()
        .set_conflict_marker_length(settings.conflict_marker_size)
        .set_conflict_style(if settings.show_base {
            ConflictStyle::Diff3
        } else {
            ConflictStyle::Merge
        })
        .set_algorithm(Algorithm::Histogram)
        .merge(base, left, right);
    match merged {
        Ok(contents) => (contents, false),
        Err(contents) => (relabel_markers(&contents, settings), true),
    }
}

/// Rewrites the marker lines produced by the diff driver to carry the
/// configured revision labels.
fn relabel_markers(contents: &str, settings: &MergeSettings) -> String {
    let size = settings.conflict_marker_size;
    contents
        .split('\n')
        .map(|line| {
            if is_marker(line, '<', size) {
                settings.left_marker()
            } else if is_marker(line, '|', size) {
                settings.base_marker()
            } else if is_marker(line, '>', size) {
                settings.right_marker()
            } else {
                line.to_owned()
            }
        })
        .join("\n")
}

fn is_marker(line: &str, marker: char, size: usize) -> bool {
    line.chars().take_while(|c| *c == marker).count() == size
        && line[size..].chars().all(|c| c == ' ' || c.is_alphanumeric())
}

/// Attempts a three-way merge at token granularity: every identifier,
/// separator and whitespace run becomes its own line, the lines are merged,
/// and the result is glued back together. Returns `None` when the
/// token-level merge still conflicts.
fn token_merge(left: &str, base: &str, right: &str) -> Option<String> {
    let merged = MergeOptions::new()
        .set_conflict_style(ConflictStyle::Merge)
        .set_algorithm(Algorithm::Histogram)
        .merge(
            &explode_tokens(base),
            &explode_tokens(left),
            &explode_tokens(right),
        );
    match merged {
        Ok(clean) => Some(implode_tokens(&clean)),
        Err(_) => None,
    }
}

fn explode_tokens(contents: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_class: Option<TokenClass> = None;
    for c in contents.chars() {
        let class = TokenClass::of(c);
        let splits = match (current_class, class) {
            (Some(previous), class) => previous != class || class == TokenClass::Separator,
            (None, _) => false,
        };
        if splits && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        current.push(if c == '\n' { ENCODED_NEWLINE } else { c });
        current_class = Some(class);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

fn implode_tokens(exploded: &str) -> String {
    exploded
        .split('\n')
        .join("")
        .replace(ENCODED_NEWLINE, "\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenClass {
    Whitespace,
    Word,
    Separator,
}

impl TokenClass {
    fn of(c: char) -> Self {
        if c.is_whitespace() {
            Self::Whitespace
        } else if c.is_alphanumeric() || c == '_' || c == '$' {
            Self::Word
        } else {
            Self::Separator
        }
    }
}

/// A piece of a merged output: either successfully merged content or a
/// conflict region with its three contributions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MergedChunk {
    Resolved(String),
    Conflict {
        left: String,
        base: String,
        right: String,
    },
}

/// Parses a merged output back into chunks by recognizing marker lines.
/// Both diff3-style (with base section) and two-way conflicts are accepted.
pub(crate) fn parse_chunks(contents: &str, settings: &MergeSettings) -> Vec<MergedChunk> {
    let size = settings.conflict_marker_size;
    let starts = |line: &str, marker: char| {
        line.chars().take_while(|c| *c == marker).count() == size
    };
    let mut chunks = Vec::new();
    let mut resolved = String::new();
    let mut lines = contents.split_inclusive('\n');
    while let Some(line) = lines.next() {
        if !starts(line, '<') {
            resolved.push_str(line);
            continue;
        }
        if !resolved.is_empty() {
            chunks.push(MergedChunk::Resolved(std::mem::take(&mut resolved)));
        }
        let mut left = String::new();
        let mut base = String::new();
        let mut right = String::new();
        let mut section = &mut left;
        for line in lines.by_ref() {
            if starts(line, '|') {
                section = &mut base;
            } else if starts(line, '=') {
                section = &mut right;
            } else if starts(line, '>') {
                break;
            } else {
                section.push_str(line);
            }
        }
        chunks.push(MergedChunk::Conflict { left, base, right });
    }
    if !resolved.is_empty() {
        chunks.push(MergedChunk::Resolved(resolved));
    }
    chunks
}

/// The number of conflict regions in a merged output.
pub fn count_conflicts(contents: &str, settings: &MergeSettings) -> usize {
    parse_chunks(contents, settings)
        .iter()
        .filter(|chunk| matches!(chunk, MergedChunk::Conflict { .. }))
        .count()
}

/// Whether a fragment contains a conflict opening marker.
pub(crate) fn is_conflicted(contents: &str, settings: &MergeSettings) -> bool {
    let opening = "<".repeat(settings.conflict_marker_size);
    contents.lines().any(|line| line.starts_with(&opening))
}

/// Renders one conflict region with the conventional bracket layout.
/// The base section is only emitted when show-base is enabled.
pub(crate) fn render_conflict(
    left: &str,
    base: &str,
    right: &str,
    settings: &MergeSettings,
) -> String {
    fn push_section(output: &mut String, contents: &str) {
        if !contents.is_empty() {
            output.push_str(contents);
            if !contents.ends_with('\n') {
                output.push('\n');
            }
        }
    }
    let mut output = String::new();
    output.push_str(&settings.left_marker());
    output.push('\n');
    push_section(&mut output, left);
    if settings.show_base {
        output.push_str(&settings.base_marker());
        output.push('\n');
        push_section(&mut output, base);
    }
    output.push_str(&settings.middle_marker());
    output.push('\n');
    push_section(&mut output, right);
    output.push_str(&settings.right_marker());
    output.push('\n');
    output
}

/// Single-line, whitespace-collapsed view of a fragment, used for all
/// equality comparisons between contributions.
pub(crate) fn normalize_ws(contents: &str) -> String {
    contents.split_whitespace().join(" ")
}
