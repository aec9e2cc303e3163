use std::cmp::Ordering;
use std::fmt;

/// A release-series value as found in branch names and dist tags.
///
/// Release lines are either a `major.minor` pair (`nb5.0`) or a single
/// integer (`nb5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseLine {
    Dotted { major: u32, minor: u32 },
    Single(u32),
}

impl ReleaseLine {
    /// Parse a release value (e.g. "5.0" or "5").
    ///
    /// Dotted values must have exactly two components.
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.split('.').collect();
        match parts.as_slice() {
            [single] => single.parse::<u32>().ok().map(ReleaseLine::Single),
            [major, minor] => {
                let major = major.parse::<u32>().ok()?;
                let minor = minor.parse::<u32>().ok()?;
                Some(ReleaseLine::Dotted { major, minor })
            }
            _ => None,
        }
    }

    /// The next unallocated release line.
    ///
    /// Only the last component moves: `5.9` becomes `5.10`, `5` becomes `6`.
    /// Returns `None` when that component is already at its maximum.
    pub fn next(&self) -> Option<Self> {
        match *self {
            ReleaseLine::Dotted { major, minor } => minor
                .checked_add(1)
                .map(|minor| ReleaseLine::Dotted { major, minor }),
            ReleaseLine::Single(n) => n.checked_add(1).map(ReleaseLine::Single),
        }
    }

    fn key(&self) -> (u32, u32) {
        match *self {
            ReleaseLine::Dotted { major, minor } => (major, minor),
            ReleaseLine::Single(n) => (n, 0),
        }
    }
}

impl PartialOrd for ReleaseLine {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseLine {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for ReleaseLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseLine::Dotted { major, minor } => write!(f, "{}.{}", major, minor),
            ReleaseLine::Single(n) => write!(f, "{}", n),
        }
    }
}
