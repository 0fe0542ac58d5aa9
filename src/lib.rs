//! # weighit: donation weighing kiosk core
//!
//! Weighs incoming food donations on a USB HID postal/kitchen scale and keeps
//! a durable, undoable log of what came in, from whom, and of what kind.
//!
//! ## Architecture
//!
//! - **Scale**: a worker thread owns the HID device, decodes its 6-byte
//!   reports and publishes the newest reading; callers poll it for a stable
//!   weight with a bounded wait
//! - **Store**: a SQLite file with a soft-delete log, undo/redo of the most
//!   recent entry and per-day totals
//! - **Config**: `~/weighit/weighit.toml`, with `WEIGHIT_DB_PATH` overriding
//!   the database location
//!
//! The two halves share no state; the kiosk front end (the `weighit` binary
//! here) reads a weight from one and appends it to the other.
//!
//! ## Example
//!
//! ```ignore
//! use weighit::{config::AppConfig, scale::ScaleReader, store::LogStore};
//!
//! let config = AppConfig::load_or_default();
//! let store = LogStore::open(&config.database)?;
//! let scale = ScaleReader::open(&config.scale)?;
//!
//! if let Some(pounds) = scale.read_stable().and_then(|r| r.pounds()) {
//!     store.append(pounds, "Wegmans", "Produce", None, None)?;
//! }
//! let produce = store.totals_per_type(weighit::store::today_utc(), None)?;
//! ```

pub mod config;
pub mod error;
pub mod scale;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, DatabaseConfig, ScaleConfig};
pub use error::{Result, WeighError};
pub use scale::{read_stable_weight, ScaleReader, ScaleTransport};
pub use store::{LogStore, Total};
pub use types::{FoodType, LogEntry, Reading, Source, WeightUnit};
