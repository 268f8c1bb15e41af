use std::path::PathBuf;

use thiserror::Error;

/// All the ways a merge can fail.
///
/// Errors never corrupt the merge bookkeeping: a caller receiving
/// [`MergeError::Semistructured`] can discard the attempt and fall back to a
/// pure textual merge of the whole file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    /// The input is not valid source in the target language.
    #[error("parse error: {0}")]
    Parse(String),

    /// One of the three revisions does not exist on disk.
    #[error("the merged file was deleted in one version: {}", path.display())]
    MissingFile { path: PathBuf },

    /// The textual merger failed on the bodies of a single leaf.
    /// The three inputs are kept for diagnostics.
    #[error("textual merge failed on a leaf body")]
    TextualMerge {
        left: String,
        base: String,
        right: String,
    },

    /// A failure during superimposition or in a conflict handler.
    /// `summary` is a rendering of the merge bookkeeping at failure time.
    #[error("semistructured merge failed in {stage}: {message}")]
    Semistructured {
        stage: &'static str,
        message: String,
        summary: String,
    },
}

impl MergeError {
    /// Wraps any error leaving the handler pipeline, as required by the
    /// pipeline contract.
    pub(crate) fn in_stage(self, stage: &'static str, summary: String) -> Self {
        match self {
            Self::Semistructured { .. } => self,
            Self::TextualMerge { left, base, right } => Self::Semistructured {
                stage,
                message: format!(
                    "textual merge failed on bodies of {} / {} / {} bytes",
                    left.len(),
                    base.len(),
                    right.len()
                ),
                summary,
            },
            other => Self::Semistructured {
                stage,
                message: other.to_string(),
                summary,
            },
        }
    }
}
