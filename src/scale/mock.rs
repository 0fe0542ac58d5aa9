//! Scripted scale transport for testing
//!
//! This module provides a transport that replays a fixed script of raw
//! reports instead of talking to hardware. It lets the acquisition loop and
//! everything above it run without a scale attached.
//!
//! # Script Steps
//!
//! - [`ScriptStep::Report`] - Deliver these bytes as one report
//! - [`ScriptStep::Empty`] - The read times out with no data
//! - [`ScriptStep::Fail`] - The read fails with a transport error
//!
//! When the script runs out the transport either starts over (see
//! [`ScriptedTransport::looping`]) or behaves like an idle device, waiting
//! out each read timeout and returning no data.
//!
//! # Example
//!
//! ```ignore
//! use weighit::scale::{ScaleReader, ScriptedTransport};
//!
//! let transport = ScriptedTransport::settling(12.5);
//! let reader = ScaleReader::with_transport(Box::new(transport), &config.scale);
//! let reading = reader.read_stable_weight(Duration::from_secs(1));
//! ```

use super::protocol::REPORT_LEN;
use super::transport::ScaleTransport;
use crate::error::{Result, WeighError};
use std::collections::VecDeque;
use std::time::Duration;

/// Default simulated latency of one report
const DEFAULT_REPORT_DELAY: Duration = Duration::from_millis(5);

/// One step of a transport script
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Deliver a report
    Report(Vec<u8>),
    /// Time out with no data
    Empty,
    /// Fail with a transport error
    Fail(String),
}

/// Transport that replays a script of reports
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    script: Vec<ScriptStep>,
    pending: VecDeque<ScriptStep>,
    looping: bool,
    report_delay: Duration,
}

impl ScriptedTransport {
    /// Create a transport that plays `script` once
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            pending: script.iter().cloned().collect(),
            script,
            looping: false,
            report_delay: DEFAULT_REPORT_DELAY,
        }
    }

    /// Build a script from raw reports
    pub fn from_reports<I>(reports: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self::new(reports.into_iter().map(ScriptStep::Report).collect())
    }

    /// A platform that wobbles for a few reports and then settles on `pounds`
    pub fn settling(pounds: f64) -> Self {
        let target = pounds_report(pounds, true);
        let mut reports = Vec::new();
        for offset in [0.4, -0.2, 0.1] {
            reports.push(pounds_report((pounds + offset).max(0.0), false));
        }
        reports.push(target);
        Self::from_reports(reports).looping()
    }

    /// Restart the script from the top when it runs out
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Simulated latency of each delivered report
    pub fn with_report_delay(mut self, delay: Duration) -> Self {
        self.report_delay = delay;
        self
    }

    /// Steps left before the script runs out (or restarts)
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    fn next_step(&mut self) -> Option<ScriptStep> {
        if self.pending.is_empty() && self.looping {
            self.pending.extend(self.script.iter().cloned());
        }
        self.pending.pop_front()
    }
}

impl ScaleTransport for ScriptedTransport {
    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        match self.next_step() {
            Some(ScriptStep::Report(bytes)) => {
                std::thread::sleep(self.report_delay);
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(len)
            }
            Some(ScriptStep::Empty) => {
                std::thread::sleep(self.report_delay);
                Ok(0)
            }
            Some(ScriptStep::Fail(message)) => Err(WeighError::Transport(message)),
            None => {
                std::thread::sleep(timeout);
                Ok(0)
            }
        }
    }

    fn describe(&self) -> String {
        format!("scripted scale ({} steps)", self.script.len())
    }
}

/// Encode a pounds value as a report with one decimal place
pub fn pounds_report(pounds: f64, stable: bool) -> Vec<u8> {
    let tenths = (pounds * 10.0).round().clamp(0.0, f64::from(u16::MAX)) as u16;
    let [lo, hi] = tenths.to_le_bytes();
    let status = if stable { 0x04 } else { 0x02 };
    let report = vec![0x03, status, 0x0C, 0xFF, lo, hi];
    debug_assert_eq!(report.len(), REPORT_LEN);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::protocol::decode_report;
    use crate::types::WeightUnit;

    #[test]
    fn test_pounds_report_decodes() {
        let reading = decode_report(&pounds_report(12.5, true)).unwrap();
        assert_eq!(reading.value, 12.5);
        assert_eq!(reading.unit, WeightUnit::Pounds);
        assert!(reading.is_stable);
    }

    #[test]
    fn test_script_plays_in_order_then_idles() {
        let mut transport = ScriptedTransport::new(vec![
            ScriptStep::Report(vec![1, 2, 3]),
            ScriptStep::Empty,
            ScriptStep::Fail("unplugged".to_string()),
        ])
        .with_report_delay(Duration::ZERO);
        let mut buf = [0u8; REPORT_LEN];
        let timeout = Duration::from_millis(1);

        assert_eq!(transport.read_report(&mut buf, timeout).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(transport.read_report(&mut buf, timeout).unwrap(), 0);
        assert!(matches!(
            transport.read_report(&mut buf, timeout),
            Err(WeighError::Transport(_))
        ));
        assert_eq!(transport.remaining(), 0);
        assert_eq!(transport.read_report(&mut buf, timeout).unwrap(), 0);
    }

    #[test]
    fn test_looping_restarts() {
        let mut transport = ScriptedTransport::from_reports(vec![pounds_report(1.0, true)])
            .looping()
            .with_report_delay(Duration::ZERO);
        let mut buf = [0u8; REPORT_LEN];
        for _ in 0..3 {
            let n = transport
                .read_report(&mut buf, Duration::from_millis(1))
                .unwrap();
            assert_eq!(n, REPORT_LEN);
        }
    }

    #[test]
    fn test_settling_ends_stable() {
        let mut transport = ScriptedTransport::settling(7.0).with_report_delay(Duration::ZERO);
        let mut buf = [0u8; REPORT_LEN];
        let mut last = None;
        for _ in 0..4 {
            transport
                .read_report(&mut buf, Duration::from_millis(1))
                .unwrap();
            last = decode_report(&buf);
        }
        let last = last.unwrap();
        assert!(last.is_stable);
        assert_eq!(last.value, 7.0);
    }
}
