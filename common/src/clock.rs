use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::protocol::UNKNOWN_TIMESTAMP;

/// 2016-01-01T00:00:00Z. Anything earlier means SNTP has not set the clock yet.
pub const MIN_SYNCED_EPOCH: i64 = 1_451_606_400;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock time, or `Unknown` while the system clock is unsynchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Synced(NaiveDateTime),
    Unknown,
}

impl Timestamp {
    pub fn from_utc(utc: DateTime<Utc>, offset: FixedOffset) -> Self {
        if utc.timestamp() < MIN_SYNCED_EPOCH {
            return Self::Unknown;
        }
        Self::Synced(utc.with_timezone(&offset).naive_local())
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced(_))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced(local) => write!(f, "{}", local.format(TIMESTAMP_FORMAT)),
            Self::Unknown => f.write_str(UNKNOWN_TIMESTAMP),
        }
    }
}

pub trait ClockSource {
    fn now(&self) -> Timestamp;
}

/// Reads the process wall clock, which SNTP adjusts in place on the device.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_utc(Utc::now(), self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc_minus_five() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    #[test]
    fn unsynced_clock_reports_unknown_at_any_uptime() {
        // An unsynced ESP32 counts up from the epoch.
        for uptime_secs in [0, 1, 60, 3_600, 86_400, 365 * 86_400] {
            let utc = DateTime::from_timestamp(uptime_secs, 0).unwrap();
            let ts = Timestamp::from_utc(utc, utc_minus_five());
            assert_eq!(ts, Timestamp::Unknown);
            assert_eq!(ts.to_string(), "unknown");
        }
    }

    #[test]
    fn synced_clock_formats_local_time() {
        // 2024-03-01 17:04:05 UTC
        let utc = DateTime::from_timestamp(1_709_312_645, 0).unwrap();
        let ts = Timestamp::from_utc(utc, utc_minus_five());

        assert!(ts.is_synced());
        assert_eq!(ts.to_string(), "2024-03-01 12:04:05");
    }

    #[test]
    fn threshold_is_inclusive() {
        let at = DateTime::from_timestamp(MIN_SYNCED_EPOCH, 0).unwrap();
        let before = DateTime::from_timestamp(MIN_SYNCED_EPOCH - 1, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();

        assert_eq!(
            Timestamp::from_utc(at, utc).to_string(),
            "2016-01-01 00:00:00"
        );
        assert!(!Timestamp::from_utc(before, utc).is_synced());
    }
}
