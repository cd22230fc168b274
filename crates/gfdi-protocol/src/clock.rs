//! Wall-clock source and device timestamps.
//!
//! Devices count seconds from 1989-12-31T00:00:00Z.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};

use crate::constants::DEVICE_EPOCH_OFFSET;

/// Source of the current local time.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Current time with its UTC offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The host's clock and time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl FixedClock {
    /// Freeze at a unix timestamp with the given UTC offset in seconds.
    pub fn from_unix(seconds: i64, utc_offset: i32) -> Option<Self> {
        let offset = FixedOffset::east_opt(utc_offset)?;
        offset.timestamp_opt(seconds, 0).single().map(FixedClock)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Convert to a device timestamp, clamping to the representable range.
pub fn to_device_timestamp<Tz: TimeZone>(time: &DateTime<Tz>) -> u32 {
    let seconds = time.timestamp() - DEVICE_EPOCH_OFFSET;
    seconds.clamp(0, u32::MAX as i64) as u32
}

/// Convert a device timestamp to UTC.
pub fn from_device_timestamp(timestamp: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp as i64 + DEVICE_EPOCH_OFFSET, 0)
}
