use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub fn utc_ns_now() -> u64 {
    let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    d.as_secs() * 1_000_000_000 + d.subsec_nanos() as u64
}

pub fn format_utc_ns(utc_ns: u64) -> String {
    let seconds = utc_ns / 1_000_000_000;
    let nanos = utc_ns % 1_000_000_000;
    format!("{}.{:09}", seconds, nanos)
}

pub fn ns_since_midnight(utc_ns: u64) -> u64 {
    let seconds_since_epoch = utc_ns / 1_000_000_000;
    let seconds_in_day = 24 * 60 * 60;
    let seconds_since_midnight = seconds_since_epoch % seconds_in_day;
    seconds_since_midnight * 1_000_000_000 + (utc_ns % 1_000_000_000)
}

/// The dual clock discipline threaded through the whole pipeline
/// (spec.md §3, §9): `calc` is host-monotonic and only meaningful for
/// relative arithmetic (durations, ordering); `ref_utc_ns` is wall-clock
/// and only meaningful for user-facing labeling. Downsampling decimates
/// both in lock-step with the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub calc: Instant,
    pub ref_utc_ns: u64,
}

impl Timestamp {
    pub fn now() -> Self {
        Self {
            calc: Instant::now(),
            ref_utc_ns: utc_ns_now(),
        }
    }

    pub fn new(calc: Instant, ref_utc_ns: u64) -> Self {
        Self { calc, ref_utc_ns }
    }

    /// Advance both clocks by the same duration, as a downsampler/filter
    /// does when it drops or merges samples.
    pub fn advance(&self, by: Duration) -> Self {
        Self {
            calc: self.calc + by,
            ref_utc_ns: self.ref_utc_ns + by.as_nanos() as u64,
        }
    }

    /// Elapsed time between two calc timestamps. Only `calc` is trusted
    /// for duration arithmetic; `ref_utc_ns` drifts and jitters at
    /// millisecond scale on some capture devices.
    pub fn calc_since(&self, earlier: &Timestamp) -> Duration {
        self.calc.saturating_duration_since(earlier.calc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_keeps_both_clocks_in_lockstep() {
        let t0 = Timestamp::now();
        let t1 = t0.advance(Duration::from_millis(100));
        assert_eq!(t1.calc_since(&t0), Duration::from_millis(100));
        assert_eq!(t1.ref_utc_ns - t0.ref_utc_ns, 100_000_000);
    }
}
