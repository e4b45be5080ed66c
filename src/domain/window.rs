//! Half-open booking window `[start, end)`

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::shared::errors::{DomainError, DomainResult};

/// A requested or held charging period.
///
/// Construction guarantees `end > start`; fields are private so the
/// invariant cannot be broken afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if end <= start {
            return Err(DomainError::WindowInvalid(format!(
                "end {} is not after start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn starting_at(start: DateTime<Utc>, minutes: i64) -> DomainResult<Self> {
        Self::new(start, start + Duration::minutes(minutes))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Adjacent windows (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
