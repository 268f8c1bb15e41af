use crate::textual::TextualMergeStrategy;

/// Which conflict handlers run after the content merge, one flag per handler.
///
/// The deletions handler is not listed because it always runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSettings {
    pub type_ambiguity: bool,
    pub new_element_referencing_edited_one: bool,
    pub method_and_constructor_renaming_and_deletion: bool,
    pub initialization_blocks: bool,
    /// Variant of the initialization-blocks handler for classes with two or
    /// more such blocks. Only runs when `initialization_blocks` is disabled.
    pub initialization_blocks_multiple: bool,
    pub duplicated_declarations: bool,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            type_ambiguity: true,
            new_element_referencing_edited_one: true,
            method_and_constructor_renaming_and_deletion: true,
            initialization_blocks: true,
            initialization_blocks_multiple: false,
            duplicated_declarations: true,
        }
    }
}

/// Immutable configuration for a whole merge run.
///
/// Set up once before the merge starts and passed down by reference;
/// the core never consults process-global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSettings {
    /// Whether to show the base revision inside conflicts.
    pub show_base: bool,
    /// Whether the textual merger should ignore whitespace differences.
    pub ignore_whitespace: bool,
    /// Behave as a git merge driver: loosens the file-extension check and
    /// suppresses some diagnostics.
    pub is_git: bool,
    /// Which textual merge strategy to use for leaf bodies.
    pub strategy: TextualMergeStrategy,
    /// The number of characters for conflict markers (7 by default).
    pub conflict_marker_size: usize,
    /// The string that identifies the left revision in conflict markers.
    pub left_label: String,
    /// The string that identifies the base revision in conflict markers.
    pub base_label: String,
    /// The string that identifies the right revision in conflict markers.
    pub right_label: String,
    pub handlers: HandlerSettings,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            show_base: true,
            ignore_whitespace: false,
            is_git: false,
            strategy: TextualMergeStrategy::default(),
            conflict_marker_size: 7,
            left_label: "MINE".to_owned(),
            base_label: "BASE".to_owned(),
            right_label: "YOURS".to_owned(),
            handlers: HandlerSettings::default(),
        }
    }
}

impl MergeSettings {
    /// The marker opening the left part of a conflict, without newline.
    pub fn left_marker(&self) -> String {
        format!("{} {}", "<".repeat(self.conflict_marker_size), self.left_label)
    }

    /// The marker opening the base part of a conflict, without newline.
    pub fn base_marker(&self) -> String {
        format!("{} {}", "|".repeat(self.conflict_marker_size), self.base_label)
    }

    /// The marker separating the two sides of a conflict, without newline.
    pub fn middle_marker(&self) -> String {
        "=".repeat(self.conflict_marker_size)
    }

    /// The marker closing the right part of a conflict, without newline.
    pub fn right_marker(&self) -> String {
        format!("{} {}", ">".repeat(self.conflict_marker_size), self.right_label)
    }

    /// Settings for the same merge looked at from the other side,
    /// used to check label-swap symmetry.
    pub fn swapped(&self) -> Self {
        Self {
            left_label: self.right_label.clone(),
            right_label: self.left_label.clone(),
            ..self.clone()
        }
    }
}

/// Replaces CRLF and lone CR by LF.
pub fn normalize_to_lf(contents: &str) -> String {
    contents.replace("\r\n", "\n").replace('\r', "\n")
}

enum LineFeedStyle {
    Lf,
    CrLf,
    Cr,
}

fn dominant_line_feed(contents: &str) -> LineFeedStyle {
    let lf = contents.matches('\n').count();
    let crlf = contents.matches("\r\n").count();
    let lone_cr = contents.matches('\r').count() - crlf;
    if crlf * 2 > lf {
        LineFeedStyle::CrLf
    } else if lone_cr > lf {
        LineFeedStyle::Cr
    } else {
        LineFeedStyle::Lf
    }
}

/// Renormalizes `output` to the line-feed convention of `reference`
/// (the base revision, whose encoding and newline style the output follows).
pub fn imitate_line_feeds(reference: &str, output: &str) -> String {
    let lf_only = normalize_to_lf(output);
    match dominant_line_feed(reference) {
        LineFeedStyle::Lf => lf_only,
        LineFeedStyle::CrLf => lf_only.replace('\n', "\r\n"),
        LineFeedStyle::Cr => lf_only.replace('\n', "\r"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_follow_the_conventional_layout() {
        let settings = MergeSettings::default();
        assert_eq!(settings.left_marker(), "<<<<<<< MINE");
        assert_eq!(settings.base_marker(), "||||||| BASE");
        assert_eq!(settings.middle_marker(), "=======");
        assert_eq!(settings.right_marker(), ">>>>>>> YOURS");

        let wide = MergeSettings {
            conflict_marker_size: 10,
            ..Default::default()
        };
        assert_eq!(wide.middle_marker(), "==========");
    }

    #[test]
    fn output_imitates_crlf_input() {
        assert_eq!(imitate_line_feeds("a\r\nb\r\n", "x\ny\n"), "x\r\ny\r\n");
        assert_eq!(imitate_line_feeds("a\nb\n", "x\r\ny\n"), "x\ny\n");
        assert_eq!(imitate_line_feeds("a\rb\r", "x\ny\n"), "x\ry\r");
    }
}
