use std::fmt;

/// Version number the store attaches to a key.
///
/// Every successful write moves a key to a new, strictly greater revision.
/// [`Revision::NONE`] stands for "the key does not exist", so a conditional
/// write at `NONE` only succeeds on a fresh path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(i64);

impl Revision {
    /// Revision of a key that has never been written (or has been deleted).
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<i64> for Revision {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum WriteOutcome {
    /// The write went through; the key now sits at this revision.
    Applied(Revision),
    /// The key was not at the expected revision. Nothing was written.
    Conflict,
}

/// Result of a conditional delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum DeleteOutcome {
    Deleted,
    /// The key was modified or removed by someone else. Nothing was deleted.
    Conflict,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn none_is_zero_and_lowest() {
        assert!(Revision::NONE.is_none());
        assert_eq!(Revision::NONE.get(), 0);
        assert!(Revision::new(1) > Revision::NONE);
        assert_eq!(Revision::default(), Revision::NONE);
    }

    #[test]
    fn displays_raw_number() {
        assert_eq!(Revision::from(42).to_string(), "42");
    }
}
