use std::fmt::Display;

/// One of the three sides to be merged.
///
/// It doubles as the origin tag stamped on every node of the superimposed
/// tree, recording which revision contributed the node last.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub enum Revision {
    Left,
    Base,
    Right,
}

impl Revision {
    /// The revision on the other side of base.
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Base => Self::Base,
            Self::Right => Self::Left,
        }
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Base => "base",
            Self::Right => "right",
        })
    }
}
