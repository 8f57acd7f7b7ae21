// crates/caseflow-core/src/core/time.rs
// ============================================================================
// Module: Caseflow Time
// Description: A single canonical timestamp type used across the workspace.
// Purpose: Avoid every crate picking its own serde/time convention; every
//          `performedAt`/`expiresAt`/`createdAt` field in the data model is
//          this one type.
// Dependencies: time
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A UTC instant, serialized on the wire as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "rfc3339")] OffsetDateTime);

impl Timestamp {
    /// Wraps an existing `OffsetDateTime`, normalizing it to UTC.
    #[must_use]
    pub fn new(at: OffsetDateTime) -> Self {
        Self(at.to_offset(time::UtcOffset::UTC))
    }

    /// Returns the current instant.
    ///
    /// Callers that need deterministic tests should inject a `Timestamp`
    /// rather than calling this in code under test.
    #[must_use]
    pub fn now() -> Self {
        Self::new(OffsetDateTime::now_utc())
    }

    /// Returns the wrapped `OffsetDateTime`.
    #[must_use]
    pub const fn as_offset_date_time(self) -> OffsetDateTime {
        self.0
    }

    /// Returns the duration elapsed between `self` and `later`, or `None` if
    /// `later` is before `self`.
    #[must_use]
    pub fn elapsed_until(self, later: Self) -> Option<time::Duration> {
        let delta = later.0 - self.0;
        (delta >= time::Duration::ZERO).then_some(delta)
    }

    /// Returns a new timestamp offset by `delta`.
    #[must_use]
    pub fn checked_add(self, delta: time::Duration) -> Option<Self> {
        self.0.checked_add(delta).map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(&Rfc3339).map_err(|_| fmt::Error)?)
    }
}

mod rfc3339 {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub(super) fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let text = value
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&text, &Rfc3339).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let ts = Timestamp::new(OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid"));
        let json = serde_json::to_string(&ts).expect("serialize");
        let back: Timestamp = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, ts);
    }

    #[test]
    fn elapsed_until_rejects_negative_duration() {
        let earlier = Timestamp::new(OffsetDateTime::from_unix_timestamp(100).expect("valid"));
        let later = Timestamp::new(OffsetDateTime::from_unix_timestamp(200).expect("valid"));
        assert!(earlier.elapsed_until(later).is_some());
        assert!(later.elapsed_until(earlier).is_none());
    }
}
