use chrono::{DateTime, Utc};

pub trait Clock {
    fn utc(&self) -> DateTime<Utc>;
}

/// Acquisition time of a sample. Every message derived from a sample carries
/// the sample's timestamp unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    utc: DateTime<Utc>,
}

impl Timestamp {
    pub fn now(clock: &dyn Clock) -> Timestamp {
        Timestamp { utc: clock.utc() }
    }

    /// Microseconds since the unix epoch. `None` if out of range.
    pub fn from_micros(us: i64) -> Option<Timestamp> {
        DateTime::<Utc>::from_timestamp_micros(us).map(|utc| Timestamp { utc })
    }

    pub fn as_micros(&self) -> i64 {
        self.utc.timestamp_micros()
    }

    pub fn utc(&self) -> DateTime<Utc> {
        self.utc
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
