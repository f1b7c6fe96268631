use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" in UTC. Everything in the feed that asks whether it is
/// time to act goes through this, so the whole engine runs deterministically
/// under a manual clock in tests.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Default)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests: nanoseconds since the epoch in one atomic.
#[derive(Debug)]
pub struct ManualTimeProvider {
    now_ns: AtomicI64,
}

impl ManualTimeProvider {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now_ns: AtomicI64::new(start.timestamp_nanos_opt().unwrap_or(0)),
        }
    }

    /// Clock positioned at a wall time in the given zone.
    pub fn at_local(naive: NaiveDateTime, tz: Tz) -> Self {
        let utc = tz
            .from_local_datetime(&naive)
            .single()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive))
            .with_timezone(&Utc);
        Self::new(utc)
    }

    pub fn set(&self, t: DateTime<Utc>) {
        self.now_ns
            .store(t.timestamp_nanos_opt().unwrap_or(0), Ordering::SeqCst);
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.num_nanoseconds().unwrap_or(0), Ordering::SeqCst);
    }
}

impl TimeProvider for ManualTimeProvider {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        let ns = self.now_ns.load(Ordering::SeqCst);
        DateTime::from_timestamp(
            ns.div_euclid(1_000_000_000),
            ns.rem_euclid(1_000_000_000) as u32,
        )
        .unwrap_or_default()
    }
}

/// Floor `t` onto a `step` boundary (UTC timeline).
pub fn round_down(t: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let step_ns = step.num_nanoseconds().unwrap_or(1).max(1);
    let ns = t.timestamp_nanos_opt().unwrap_or(0);
    let floored = ns - ns.rem_euclid(step_ns);
    DateTime::from_timestamp(
        floored.div_euclid(1_000_000_000),
        floored.rem_euclid(1_000_000_000) as u32,
    )
    .unwrap_or(t)
}

/// Floor `t` onto a `step` boundary of the local day in `tz`, returned in
/// UTC. Bar windows align with the instrument's local clock, not UTC.
pub fn round_down_local(t: DateTime<Utc>, step: Duration, tz: Tz) -> DateTime<Utc> {
    let step_ns = step.num_nanoseconds().unwrap_or(1).max(1);
    let local = t.with_timezone(&tz);
    let midnight = local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("valid local midnight");
    let since_midnight = local.naive_local() - midnight;
    let ns = since_midnight.num_nanoseconds().unwrap_or(0);
    let floored = midnight + Duration::nanoseconds(ns - ns.rem_euclid(step_ns));
    tz.from_local_datetime(&floored)
        .single()
        .unwrap_or_else(|| tz.from_utc_datetime(&floored))
        .with_timezone(&Utc)
}
