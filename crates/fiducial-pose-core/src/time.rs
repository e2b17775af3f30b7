use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Message timestamp: whole seconds plus nanoseconds, as carried in frame headers.
///
/// Ordering compares `sec` first and `nsec` second, so stamps sort chronologically
/// as long as `nsec < 1e9` (guaranteed by every constructor here).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    pub sec: u32,
    pub nsec: u32,
}

impl Time {
    pub const ZERO: Time = Time { sec: 0, nsec: 0 };

    pub fn new(sec: u32, nsec: u32) -> Self {
        let carry = nsec / 1_000_000_000;
        Self {
            sec: sec.saturating_add(carry),
            nsec: nsec % 1_000_000_000,
        }
    }

    /// Build a stamp from floating-point seconds. Negative inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        let whole = secs.floor();
        let nsec = ((secs - whole) * 1e9).round() as u32;
        Self::new(whole.min(u32::MAX as f64) as u32, nsec)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.sec as f64 + self.nsec as f64 * 1e-9
    }

    /// Signed difference `self - earlier` in seconds.
    pub fn secs_since(self, earlier: Time) -> f64 {
        (self.sec as f64 - earlier.sec as f64) + (self.nsec as f64 - earlier.nsec as f64) * 1e-9
    }

    /// Stamp shifted back by `d`, saturating at zero.
    pub fn saturating_sub(self, d: Duration) -> Time {
        Time::from_secs_f64(self.as_secs_f64() - d.as_secs_f64())
    }
}

/// Time selector for transform lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeQuery {
    /// Most recent sample known for every edge on the path.
    Latest,
    /// Interpolated at an exact stamp.
    At(Time),
}

impl From<Time> for TimeQuery {
    fn from(t: Time) -> Self {
        TimeQuery::At(t)
    }
}
