//! Shared value types.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::Data;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// On the wire timestamps are integer milliseconds since the Unix epoch.
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from epoch milliseconds. Returns `None` when
    /// the value is out of range.
    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    /// Returns epoch milliseconds.
    pub fn as_millis(self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<Timestamp> for Data {
    fn from(value: Timestamp) -> Self {
        Data::from(value.as_millis())
    }
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// Offset/limit window for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Number of items to skip.
    pub offset: u32,
    /// Page size, between 1 and [`Page::MAX_SIZE`].
    pub max: u32,
}

impl Page {
    /// Largest page size a single request may ask for.
    pub const MAX_SIZE: u32 = 100;

    pub fn new(offset: u32, max: u32) -> Self {
        Self { offset, max }
    }

    /// `true` when `max` is between 1 and [`Page::MAX_SIZE`].
    pub fn is_valid(self) -> bool {
        (1..=Self::MAX_SIZE).contains(&self.max)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            max: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_round_trip() {
        let ts = Timestamp::from_millis(1_700_000_000_123).unwrap();
        assert_eq!(ts.as_millis(), 1_700_000_000_123);
        assert_eq!(Data::from(ts).as_i64(), Some(1_700_000_000_123));
    }

    #[test]
    fn page_bounds() {
        assert!(Page::default().is_valid());
        assert!(!Page::new(0, 0).is_valid());
        assert!(!Page::new(0, Page::MAX_SIZE + 1).is_valid());
    }
}
