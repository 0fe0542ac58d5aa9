//! Waiting for the scale to settle
//!
//! [`read_stable_weight`] polls a [`ReadingSource`] on a fixed interval until
//! it sees a stable reading or the timeout runs out. It is a bounded polling
//! wait, cancellable only by its own timeout.

use crate::types::Reading;
use std::time::{Duration, Instant};

/// Anything that can report the newest reading without blocking
#[cfg_attr(test, mockall::automock)]
pub trait ReadingSource {
    /// Newest reading, or `None` if nothing has been decoded yet
    fn latest(&self) -> Option<Reading>;
}

/// Poll `source` until a stable reading appears or `timeout` elapses
///
/// - A stable reading is returned as soon as it is seen.
/// - On timeout, the last reading seen is returned even if unstable.
/// - `None` means no reading was seen at all.
///
/// The source is always checked at least once, so a zero timeout acts as a
/// single non-blocking probe.
pub fn read_stable_weight<S>(source: &S, timeout: Duration, poll_interval: Duration) -> Option<Reading>
where
    S: ReadingSource + ?Sized,
{
    // A timeout too large to represent as an instant never expires
    let deadline = Instant::now().checked_add(timeout);
    let mut last = None;

    loop {
        if let Some(reading) = source.latest() {
            if reading.is_stable {
                return Some(reading);
            }
            last = Some(reading);
        }

        let Some(deadline) = deadline else {
            std::thread::sleep(poll_interval);
            continue;
        };
        let now = Instant::now();
        if now >= deadline {
            if let Some(ref reading) = last {
                tracing::debug!("No stable reading within {:?}, using {}", timeout, reading);
            }
            return last;
        }
        std::thread::sleep(poll_interval.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WeightUnit;
    use mockall::Sequence;

    fn lb(value: f64, stable: bool) -> Reading {
        Reading::new(value, WeightUnit::Pounds, stable)
    }

    #[test]
    fn test_returns_first_stable_reading() {
        let mut source = MockReadingSource::new();
        let mut seq = Sequence::new();
        source
            .expect_latest()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|| Some(lb(1.0, false)));
        source
            .expect_latest()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Some(lb(1.0, true)));

        let result = read_stable_weight(&source, Duration::from_secs(1), Duration::from_millis(1));
        assert_eq!(result, Some(lb(1.0, true)));
    }

    #[test]
    fn test_timeout_returns_last_unstable() {
        let mut source = MockReadingSource::new();
        source.expect_latest().returning(|| Some(lb(3.3, false)));

        let started = Instant::now();
        let result =
            read_stable_weight(&source, Duration::from_millis(60), Duration::from_millis(10));
        assert_eq!(result, Some(lb(3.3, false)));
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_timeout_with_no_reading_is_none() {
        let mut source = MockReadingSource::new();
        source.expect_latest().returning(|| None);

        let result =
            read_stable_weight(&source, Duration::from_millis(30), Duration::from_millis(10));
        assert!(result.is_none());
    }

    #[test]
    fn test_reading_after_none_is_kept() {
        let mut source = MockReadingSource::new();
        let mut calls = 0;
        source.expect_latest().returning(move || {
            calls += 1;
            (calls == 1).then(|| lb(2.0, false))
        });

        let result =
            read_stable_weight(&source, Duration::from_millis(30), Duration::from_millis(5));
        assert_eq!(result, Some(lb(2.0, false)));
    }

    #[test]
    fn test_unbounded_timeout_returns_stable_reading() {
        let mut source = MockReadingSource::new();
        source
            .expect_latest()
            .times(1)
            .returning(|| Some(lb(2.0, true)));

        let result = read_stable_weight(&source, Duration::MAX, Duration::from_millis(1));
        assert_eq!(result, Some(lb(2.0, true)));
    }

    #[test]
    fn test_unbounded_timeout_keeps_polling_until_stable() {
        let mut source = MockReadingSource::new();
        let mut calls = 0;
        source.expect_latest().returning(move || {
            calls += 1;
            Some(lb(6.5, calls >= 5))
        });

        let result = read_stable_weight(&source, Duration::MAX, Duration::from_millis(1));
        assert_eq!(result, Some(lb(6.5, true)));
    }

    #[test]
    fn test_zero_timeout_checks_once() {
        let mut source = MockReadingSource::new();
        source
            .expect_latest()
            .times(1)
            .returning(|| Some(lb(4.0, true)));

        let result = read_stable_weight(&source, Duration::ZERO, Duration::from_millis(50));
        assert_eq!(result, Some(lb(4.0, true)));
    }
}
