use chrono::{DateTime, NaiveTime, Utc};

/// Reference clock for the attendance lifecycle. Injected so tests can step
/// time deterministically instead of reading the wall clock inside the core.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// UTC midnight of the instant's calendar day. "Today's record" means any
/// record whose `date` is on or after this point.
pub fn day_start(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.date_naive().and_time(NaiveTime::MIN).and_utc()
}
