//! Time source for staleness checks and the "now" marker.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Timelike, Utc};
use parking_lot::Mutex;

/// Current instant plus the local calendar view of it
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Hour of day (0-23) in the local zone
    fn local_hour(&self) -> u32;

    /// Calendar date in the local zone
    fn local_date(&self) -> NaiveDate;
}

/// Wall clock of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_hour(&self) -> u32 {
        Local::now().hour()
    }

    fn local_date(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Hand-driven clock with a fixed zone offset, for deterministic tests
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Mutex::new(now),
            offset,
        }
    }

    /// Clock whose local zone is UTC
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, Utc.fix())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    fn local(&self) -> DateTime<FixedOffset> {
        self.now.lock().with_timezone(&self.offset)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn local_hour(&self) -> u32 {
        self.local().hour()
    }

    fn local_date(&self) -> NaiveDate {
        self.local().date_naive()
    }
}
