//! Small shared building blocks: wall-clock stamps and self-validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock instant as Unix milliseconds
///
/// Serialized as a bare integer so it can sit next to server timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Reads the system clock; a clock set before 1970 reads as 0
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_millis() as i64)
            .unwrap_or_default();
        Self(millis)
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Milliseconds from `earlier` to `self`, clamped at zero
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        u64::try_from(self.0.saturating_sub(earlier.0)).unwrap_or(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Domain values that can list their own problems
pub trait Validator {
    /// Every problem found, or `Ok` when there are none
    fn validate(&self) -> Result<(), Vec<String>>;

    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_reads_the_clock() {
        assert!(Timestamp::now() > Timestamp::from_millis(0));
    }

    #[test]
    fn test_millis_since_clamps_backwards_clock() {
        let start = Timestamp::from_millis(1_000);
        let later = Timestamp::from_millis(4_500);
        assert_eq!(later.millis_since(start), 3_500);
        assert_eq!(start.millis_since(later), 0);
    }

    #[test]
    fn test_serializes_as_integer() {
        let stamp = Timestamp::from_millis(1_700_000_000_000);
        assert_eq!(serde_json::to_string(&stamp).unwrap(), "1700000000000");
        assert_eq!(stamp.to_string(), "1700000000000");
    }

    #[test]
    fn test_validator_default_is_valid() {
        struct Range(u32, u32);

        impl Validator for Range {
            fn validate(&self) -> Result<(), Vec<String>> {
                if self.0 < self.1 {
                    Ok(())
                } else {
                    Err(vec![format!("{} is not before {}", self.0, self.1)])
                }
            }
        }

        assert!(Range(1, 2).is_valid());
        assert!(!Range(2, 2).is_valid());
    }
}
