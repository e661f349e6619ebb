//! Wall-clock timestamps for log events.
//!
//! Slots record the moment they are populated with microsecond resolution.
//! The value is split into whole seconds and the sub-second microseconds so a
//! slot can store it without any allocation and the display side can render
//! the classic `seconds + .uuuuuu` layout.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};

/// Number of microseconds in one second.
const MICROS_PER_SEC: u64 = 1_000_000;

/// A wall-clock instant with microsecond resolution.
///
/// # Examples
///
/// ```
/// # use ring_logger::efficient_clock::EventTimestamp;
/// let first = EventTimestamp::now();
/// let second = EventTimestamp::now();
///
/// assert!(second >= first);
/// assert!(first.subsec_micros() < 1_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EventTimestamp {
    secs: u64,
    micros: u32,
}

impl EventTimestamp {
    /// The zero timestamp, used by cleared slots.
    pub const ZERO: EventTimestamp = EventTimestamp { secs: 0, micros: 0 };

    /// Captures the current wall-clock time.
    ///
    /// A clock set before the UNIX epoch yields [`EventTimestamp::ZERO`]
    /// rather than failing; logging must never fail because of the clock.
    #[inline]
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| Self {
                secs: d.as_secs(),
                micros: d.subsec_micros(),
            })
            .unwrap_or(Self::ZERO)
    }

    /// Builds a timestamp from a count of microseconds since the UNIX epoch.
    pub const fn from_micros(micros: u64) -> Self {
        Self {
            secs: micros / MICROS_PER_SEC,
            micros: (micros % MICROS_PER_SEC) as u32,
        }
    }

    /// Whole seconds since the UNIX epoch.
    pub const fn secs(&self) -> u64 {
        self.secs
    }

    /// Microseconds past the whole second, always below 1_000_000.
    pub const fn subsec_micros(&self) -> u32 {
        self.micros
    }

    /// Total microseconds since the UNIX epoch.
    pub const fn as_micros(&self) -> u64 {
        self.secs * MICROS_PER_SEC + self.micros as u64
    }

    /// Converts the timestamp to local time for display.
    ///
    /// Returns `None` only for instants chrono cannot represent.
    pub fn to_local(&self) -> Option<DateTime<Local>> {
        let secs = i64::try_from(self.secs).ok()?;
        DateTime::from_timestamp(secs, self.micros * 1_000).map(|utc| utc.with_timezone(&Local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_micros_splits_seconds() {
        let ts = EventTimestamp::from_micros(3_000_042);
        assert_eq!(ts.secs(), 3);
        assert_eq!(ts.subsec_micros(), 42);
        assert_eq!(ts.as_micros(), 3_000_042);
    }

    #[test]
    fn test_zero_is_default() {
        assert_eq!(EventTimestamp::default(), EventTimestamp::ZERO);
        assert_eq!(EventTimestamp::ZERO.as_micros(), 0);
    }

    #[test]
    fn test_to_local_keeps_microseconds() {
        let ts = EventTimestamp::from_micros(1_700_000_000_123_456);
        let local = ts.to_local().unwrap();
        assert_eq!(local.timestamp(), 1_700_000_000);
        assert_eq!(local.timestamp_subsec_micros(), 123_456);
    }
}
