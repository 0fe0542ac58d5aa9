//! Scale acquisition for the USB HID scale
//!
//! This module turns a stream of raw HID reports into "the newest weight"
//! and answers "give me a settled weight" for the logging action.
//!
//! # Architecture
//!
//! The device is owned by a single background worker, and everything else
//! reads a shared snapshot:
//!
//! - [`protocol`] - Pure decoding of a 6-byte report into a [`Reading`]
//! - [`ScaleTransport`] - Blocking report source ([`HidTransport`] for hardware)
//! - [`ScaleReader`] - Owns the transport on a worker thread and publishes the newest reading
//! - [`read_stable_weight`] - Bounded polling wait for a stable reading
//! - [`ScriptedTransport`] - Replays canned reports, for tests and `--simulate`
//!
//! # Example
//!
//! ```ignore
//! use weighit::config::AppConfig;
//! use weighit::scale::ScaleReader;
//!
//! let config = AppConfig::load_or_default();
//! let scale = ScaleReader::open(&config.scale)?;
//!
//! // Live display
//! if let Some(reading) = scale.latest() {
//!     println!("{}", reading);
//! }
//!
//! // LOG button
//! match scale.read_stable() {
//!     Some(reading) => store.append(reading.pounds().unwrap_or(0.0), "Wegmans", "Produce", None, None)?,
//!     None => println!("No scale reading"),
//! }
//! ```
//!
//! [`Reading`]: crate::types::Reading

pub mod mock;
pub mod protocol;
pub mod reader;
pub mod stabilize;
pub mod transport;

pub use mock::{pounds_report, ScriptStep, ScriptedTransport};
pub use protocol::{decode_report, REPORT_LEN};
pub use reader::{ScaleReader, ScaleStatsSnapshot};
pub use stabilize::{read_stable_weight, ReadingSource};
pub use transport::{list_devices, DeviceInfo, HidTransport, ScaleTransport};
