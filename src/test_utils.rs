//! Utilities to keep tests concise.

use crate::{merge::semistructured_merge, merge_result::MergeResult, settings::MergeSettings};

/// Merges three Java snippets with default settings.
pub(crate) fn merge_defaults(left: &str, base: &str, right: &str) -> MergeResult {
    semistructured_merge(left, base, right, &MergeSettings::default())
        .expect("semistructured merge failed")
}
