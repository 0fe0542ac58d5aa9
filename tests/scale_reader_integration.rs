//! Integration tests for scale acquisition
//!
//! These tests drive the real acquisition loop with scripted transports:
//! - Newest-reading publication
//! - Stable-weight waits with and without a settled platform
//! - Recovery after transport errors
//! - Shutdown

mod common;

use common::mock_helpers::{scripted_reader, wait_until};
use common::worker_wait_timeout;
use std::time::{Duration, Instant};
use weighit::scale::{decode_report, pounds_report, ScriptStep, ScriptedTransport};
use weighit::types::{Reading, WeightUnit};

#[test]
fn test_settling_scale_yields_stable_weight() {
    let reader = scripted_reader(ScriptedTransport::settling(12.4));

    let reading = reader.read_stable_weight(worker_wait_timeout()).unwrap();
    assert!(reading.is_stable);
    assert_eq!(reading.unit, WeightUnit::Pounds);
    assert!((reading.value - 12.4).abs() < 1e-9);
    assert!((reading.pounds().unwrap() - 12.4).abs() < 1e-9);
    reader.close();
}

#[test]
fn test_never_stable_returns_last_reading_after_timeout() {
    let transport =
        ScriptedTransport::from_reports(vec![pounds_report(3.0, false)]).looping();
    let reader = scripted_reader(transport);
    assert!(wait_until(worker_wait_timeout(), || reader.latest().is_some()));

    let timeout = Duration::from_millis(100);
    let start = Instant::now();
    let reading = reader.read_stable_weight(timeout).unwrap();

    assert!(start.elapsed() >= timeout);
    assert!(!reading.is_stable);
    assert_eq!(reading, Reading::new(3.0, WeightUnit::Pounds, false));
    reader.close();
}

#[test]
fn test_silent_scale_returns_none() {
    let reader = scripted_reader(ScriptedTransport::new(Vec::new()));

    assert_eq!(reader.read_stable_weight(Duration::from_millis(50)), None);
    assert_eq!(reader.latest(), None);
    assert!(reader.stats().empty_reads >= 1);
    reader.close();
}

#[test]
fn test_zero_timeout_is_single_probe() {
    let reader = scripted_reader(ScriptedTransport::new(Vec::new()));

    let start = Instant::now();
    assert_eq!(reader.read_stable_weight(Duration::ZERO), None);
    assert!(start.elapsed() < Duration::from_millis(50));
    reader.close();
}

#[test]
fn test_newest_reading_wins() {
    let transport = ScriptedTransport::from_reports(vec![
        pounds_report(1.0, true),
        pounds_report(2.0, true),
        pounds_report(3.0, true),
    ]);
    let reader = scripted_reader(transport);

    assert!(wait_until(worker_wait_timeout(), || reader.stats().decoded == 3));
    assert_eq!(reader.latest().unwrap().value, 3.0);

    let sample = reader.latest_sample().unwrap();
    assert_eq!(sample.reading.value, 3.0);
    assert!(sample.age() < worker_wait_timeout());
    reader.close();
}

#[test]
fn test_recovers_after_transport_errors() {
    let transport = ScriptedTransport::new(vec![
        ScriptStep::Fail("device busy".to_string()),
        ScriptStep::Fail("device busy".to_string()),
        ScriptStep::Empty,
        ScriptStep::Report(vec![0x03, 0x04]),
        ScriptStep::Report(pounds_report(5.5, true)),
    ]);
    let reader = scripted_reader(transport);

    assert!(wait_until(worker_wait_timeout(), || reader.latest().is_some()));
    let stats = reader.stats();
    assert_eq!(stats.transport_errors, 2);
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.decoded, 1);
    assert_eq!(reader.latest().unwrap().value, 5.5);
    reader.close();
}

#[test]
fn test_unknown_unit_is_reported_not_converted() {
    let report = vec![0x03, 0x04, 0x05, 0x00, 0x07, 0x00];
    let reader = scripted_reader(ScriptedTransport::from_reports(vec![report.clone()]));

    assert!(wait_until(worker_wait_timeout(), || reader.latest().is_some()));
    let reading = reader.latest().unwrap();
    assert_eq!(reading, decode_report(&report).unwrap());
    assert_eq!(reading.unit.to_string(), "0x05");
    assert_eq!(reading.pounds(), None);
    reader.close();
}

#[test]
fn test_close_joins_worker() {
    let reader = scripted_reader(ScriptedTransport::settling(1.0));
    assert!(reader.is_running());

    let start = Instant::now();
    reader.close();
    assert!(start.elapsed() < worker_wait_timeout());
}

