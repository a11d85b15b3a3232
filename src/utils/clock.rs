//! Platform day boundary handling
//!
//! Every "daily" counter on the platform resets at midnight of a single
//! fixed-offset timezone, not per-user local time. The offset is
//! configuration, not ad hoc per call site, so all counter kinds agree on
//! what "today" means.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Clock with a fixed local-day offset used for daily quota resets
#[derive(Debug, Clone, Copy)]
pub struct PlatformClock {
    offset: FixedOffset,
}

impl PlatformClock {
    /// Create a clock with the given whole-hour UTC offset
    pub fn new(offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Self { offset }
    }

    /// Current instant
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// The platform-local date at the given instant
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// The platform-local date right now
    pub fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }
}

impl Default for PlatformClock {
    fn default() -> Self {
        // Platform day follows MSK (UTC+3)
        Self::new(3)
    }
}
