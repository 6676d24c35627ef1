//! Stored instants and server clocks
//!
//! Instants are stored as `{"seconds": i64, "nanoseconds": u32}` objects so
//! they sort and compare independently of client clocks. Conversion to
//! `chrono` happens at the read boundary.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// An instant as stored in documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Whole seconds since the Unix epoch
    pub seconds: i64,
    /// Sub-second part, `0..1_000_000_000`
    pub nanoseconds: u32,
}

impl Timestamp {
    /// Construct from parts, normalizing overflowing nanoseconds
    #[must_use]
    pub fn new(seconds: i64, nanoseconds: u32) -> Self {
        Self {
            seconds: seconds + i64::from(nanoseconds / NANOS_PER_SEC),
            nanoseconds: nanoseconds % NANOS_PER_SEC,
        }
    }

    /// The smallest instant strictly after `self`
    #[must_use]
    pub fn successor(self) -> Self {
        Self::new(self.seconds, self.nanoseconds + 1)
    }

    /// Encode as a document field value
    #[must_use]
    pub fn to_value(self) -> Value {
        serde_json::json!({
            "seconds": self.seconds,
            "nanoseconds": self.nanoseconds,
        })
    }

    /// Decode from a document field value
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.len() != 2 {
            return None;
        }
        let seconds = obj.get("seconds")?.as_i64()?;
        let nanoseconds = u32::try_from(obj.get("nanoseconds")?.as_u64()?).ok()?;
        (nanoseconds < NANOS_PER_SEC).then_some(Self { seconds, nanoseconds })
    }

    /// Convert to a `chrono` instant
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanoseconds)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::new(value.timestamp(), value.timestamp_subsec_nanos())
    }
}

/// Source of server time
pub trait Clock: Send + Sync + Debug {
    /// Current instant
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().into()
    }
}

/// Hand-driven clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Start at the given instant
    #[must_use]
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start.into()),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        let next = now.to_datetime().unwrap_or_default() + by;
        *now = next.into();
    }

    /// Jump to an instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to.into();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
