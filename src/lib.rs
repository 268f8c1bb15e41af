//! Semistructured three-way merging of Java source files.
//!
//! ## Overview
//!
//! sesamerge takes three versions of a file (base, left and right) and
//! produces a fourth version integrating the changes from base to left and
//! from base to right. Instead of merging lines, it superimposes the
//! syntax trees of the three revisions, matching declarations by type and
//! name, and only falls back to a textual three-way merge inside the
//! bodies of matched leaves. A pipeline of conflict handlers then refines
//! the raw result, recognizing renamings, deletions against edits,
//! duplicated declarations, ambiguous imports and reshuffled initializer
//! blocks.
//!
//! It is primarily designed to be used as a CLI implementing a Git merge
//! driver; the Rust API is not meant to be stable.

pub(crate) mod content_merge;
pub mod context;
pub mod error;
pub mod handlers;
pub(crate) mod lang;
mod merge;
pub(crate) mod merge_result;
pub(crate) mod printer;
pub mod revision;
pub mod settings;
pub(crate) mod superimpose;
pub mod textual;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::MergeError;
pub use merge::{
    semistructured_merge, semistructured_merge_files, semistructured_merge_with_handlers,
    three_way_textual_merge, three_way_textual_merge_files, SEMISTRUCTURED_METHOD, TEXTUAL_METHOD,
};
pub use merge_result::MergeResult;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_utils::merge_defaults;

    #[test]
    fn merging_a_file_with_itself_is_the_identity() {
        let source = "\
package com.example;

import java.util.List;

public class A {
    int k = 0;

    // entry point
    void m() {
        x();
    }
}
";
        let merged = merge_defaults(source, source, source);
        assert_eq!(merged.contents, source);
        assert_eq!(merged.conflict_count, 0);
    }

    #[test]
    fn one_sided_changes_win() {
        let base = "class A {\n    void m() {\n        x();\n    }\n}\n";
        let changed = "class A {\n    int k;\n\n    void m() {\n        y();\n    }\n}\n";

        let merged = merge_defaults(changed, base, base);
        assert_eq!(merged.contents, changed);

        let merged = merge_defaults(base, base, changed);
        assert_eq!(merged.contents, changed);
    }

    #[test]
    fn merged_output_carries_no_internal_sentinels() {
        let base = "class A {\n    void m() {\n        x();\n    }\n}\n";
        let left = "class A {\n    void m() {\n        left();\n    }\n}\n";
        let right = "class A {\n    void m() {\n        right();\n    }\n}\n";
        let merged = merge_defaults(left, base, right);
        assert!(merged.conflict_count > 0);
        assert!(!merged.contents.contains(crate::superimpose::SEMANTIC_MARKER));
        assert!(!merged.contents.contains(crate::superimpose::SEPARATOR));
    }
}
