//! Background acquisition loop for the USB scale
//!
//! [`ScaleReader`] owns the device transport on a dedicated worker thread.
//! The worker blocks on the transport, decodes every full report and
//! publishes the newest [`Reading`] into a mutex-protected slot. Readers
//! never touch the device; [`ScaleReader::latest`] only copies the slot.
//!
//! # Error Handling
//!
//! - Opening the device is the only fatal error; it surfaces from
//!   [`ScaleReader::open`].
//! - Transport errors inside the loop are retried forever after a fixed
//!   backoff. A disconnected scale just leaves the last reading in place,
//!   and callers can spot that through [`Sample::age`].
//! - Short or garbled reports are dropped and counted.
//!
//! # Shutdown
//!
//! [`ScaleReader::stop`] raises a flag that the worker checks between
//! reads, so the worker may linger for up to one read timeout. The device
//! handle is released when the worker exits. [`ScaleReader::close`] also
//! waits for that to happen.

use super::protocol::{decode_report, REPORT_LEN};
use super::stabilize::{read_stable_weight, ReadingSource};
use super::transport::{HidTransport, ScaleTransport};
use crate::config::ScaleConfig;
use crate::error::{Result, WeighError};
use crate::types::{Reading, Sample};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Counters kept by the acquisition loop
#[derive(Debug, Default)]
struct ScaleStats {
    decoded: AtomicU64,
    discarded: AtomicU64,
    empty_reads: AtomicU64,
    transport_errors: AtomicU64,
}

/// Point-in-time copy of the acquisition counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaleStatsSnapshot {
    /// Reports decoded and published
    pub decoded: u64,
    /// Reports too short to decode
    pub discarded: u64,
    /// Reads that timed out without data
    pub empty_reads: u64,
    /// Reads that failed at the transport
    pub transport_errors: u64,
}

impl ScaleStatsSnapshot {
    /// Share of non-empty reads that produced a reading, as a percentage
    pub fn decode_rate(&self) -> f64 {
        let total = self.decoded + self.discarded;
        if total == 0 {
            100.0
        } else {
            (self.decoded as f64 / total as f64) * 100.0
        }
    }
}

impl ScaleStats {
    fn snapshot(&self) -> ScaleStatsSnapshot {
        ScaleStatsSnapshot {
            decoded: self.decoded.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            empty_reads: self.empty_reads.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the worker and its handle
#[derive(Debug)]
struct Shared {
    latest: Mutex<Option<Sample>>,
    running: AtomicBool,
    stats: ScaleStats,
}

impl Shared {
    fn publish(&self, reading: Reading) {
        let mut slot = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Sample::now(reading));
    }

    fn snapshot(&self) -> Option<Sample> {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Timing knobs for the worker thread
#[derive(Debug, Clone, Copy)]
struct LoopTiming {
    read_timeout: Duration,
    retry_backoff: Duration,
}

/// Handle to the scale's acquisition loop
///
/// Construct one per process and pass it by reference to everything that
/// needs weights.
pub struct ScaleReader {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    poll_interval: Duration,
    stable_timeout: Duration,
    name: String,
}

impl ScaleReader {
    /// Open the configured HID scale and start the acquisition loop
    pub fn open(config: &ScaleConfig) -> Result<Self> {
        let transport = HidTransport::open(config)?;
        Self::with_transport(Box::new(transport), config)
    }

    /// Start the acquisition loop on an already opened transport
    pub fn with_transport(transport: Box<dyn ScaleTransport>, config: &ScaleConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            latest: Mutex::new(None),
            running: AtomicBool::new(true),
            stats: ScaleStats::default(),
        });
        let timing = LoopTiming {
            read_timeout: config.read_timeout(),
            retry_backoff: config.retry_backoff(),
        };
        let name = transport.describe();

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("scale-reader".to_string())
            .spawn(move || acquisition_loop(transport, &worker_shared, timing))
            .map_err(|e| WeighError::Io(e).with_context("Failed to start scale reader thread"))?;

        Ok(Self {
            shared,
            worker: Some(worker),
            poll_interval: config.poll_interval(),
            stable_timeout: config.stable_timeout(),
            name,
        })
    }

    /// Newest reading, or `None` if nothing has been decoded yet
    pub fn latest(&self) -> Option<Reading> {
        self.shared.snapshot().map(|sample| sample.reading)
    }

    /// Newest reading with the instant it was received
    pub fn latest_sample(&self) -> Option<Sample> {
        self.shared.snapshot()
    }

    /// Wait up to `timeout` for a stable reading
    ///
    /// See [`read_stable_weight`] for the exact outcome rules.
    pub fn read_stable_weight(&self, timeout: Duration) -> Option<Reading> {
        read_stable_weight(self, timeout, self.poll_interval)
    }

    /// Wait for a stable reading using the configured timeout
    pub fn read_stable(&self) -> Option<Reading> {
        self.read_stable_weight(self.stable_timeout)
    }

    /// Acquisition counters
    pub fn stats(&self) -> ScaleStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Name of the transport this reader was started on
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True until [`stop`](Self::stop) is called
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// True once the worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Ask the worker to exit after its current read
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            tracing::info!("Stopping scale reader ({})", self.name);
        }
    }

    /// Stop the worker and wait for it to release the device
    pub fn close(mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Scale reader thread panicked");
            }
        }
    }
}

impl ReadingSource for ScaleReader {
    fn latest(&self) -> Option<Reading> {
        ScaleReader::latest(self)
    }
}

impl Drop for ScaleReader {
    fn drop(&mut self) {
        // The worker is detached here; it exits after its current read.
        self.stop();
    }
}

/// Worker body: read, decode, publish until stopped
fn acquisition_loop(mut transport: Box<dyn ScaleTransport>, shared: &Shared, timing: LoopTiming) {
    tracing::info!("Scale reader started ({})", transport.describe());

    let mut buf = [0u8; REPORT_LEN];
    let mut failing = false;

    while shared.running.load(Ordering::Acquire) {
        let len = match transport.read_report(&mut buf, timing.read_timeout) {
            Ok(len) => len,
            Err(e) => {
                shared.stats.transport_errors.fetch_add(1, Ordering::Relaxed);
                if failing {
                    tracing::debug!("Scale read failed again: {}", e);
                } else {
                    tracing::warn!("Scale read failed, retrying: {}", e);
                    failing = true;
                }
                std::thread::sleep(timing.retry_backoff);
                continue;
            }
        };

        if failing {
            tracing::info!("Scale transport recovered");
            failing = false;
        }

        if len == 0 {
            shared.stats.empty_reads.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        let report = &buf[..len.min(REPORT_LEN)];
        match decode_report(report) {
            Some(reading) => {
                tracing::trace!("RAW {:02x?} -> {}", report, reading);
                shared.stats.decoded.fetch_add(1, Ordering::Relaxed);
                shared.publish(reading);
            }
            None => {
                tracing::trace!("Discarding short report {:02x?}", report);
                shared.stats.discarded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    drop(transport);
    tracing::info!("Scale reader stopped");
}
