//! Error handling for the weighit kiosk core
//!
//! This module defines custom error types and a Result alias for use
//! throughout the crate.
//!
//! Absence is not an error here: "no reading yet", "nothing to undo" and
//! "nothing to redo" are reported as `None` by the operations themselves.

use thiserror::Error;

/// Main error type for weighit operations
#[derive(Error, Debug)]
pub enum WeighError {
    /// The scale could not be found or opened
    #[error("Failed to open scale {vendor_id:04x}:{product_id:04x}: {message}")]
    DeviceOpen {
        vendor_id: u16,
        product_id: u16,
        message: String,
    },

    /// A read from the device transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// A log entry named a source that is not in the `sources` table
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// A log entry named a food type that is not in the `types` table
    #[error("Unknown food type: {0}")]
    UnknownType(String),

    /// The food type requires pickup and dropoff temperatures
    #[error("Food type '{0}' requires pickup and dropoff temperatures")]
    TemperatureRequired(String),

    /// Errors from the embedded database
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Errors while creating or migrating the schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<WeighError>,
    },
}

impl WeighError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        WeighError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True when the caller passed a source or type name that does not exist
    pub fn is_unknown_name(&self) -> bool {
        match self {
            WeighError::UnknownSource(_) | WeighError::UnknownType(_) => true,
            WeighError::WithContext { source, .. } => source.is_unknown_name(),
            _ => false,
        }
    }
}

impl From<hidapi::HidError> for WeighError {
    fn from(err: hidapi::HidError) -> Self {
        WeighError::Transport(err.to_string())
    }
}

/// Result type alias for weighit operations
pub type Result<T> = std::result::Result<T, WeighError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| WeighError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| WeighError::from(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WeighError::UnknownSource("Nowhere Market".to_string());
        assert_eq!(err.to_string(), "Unknown source: Nowhere Market");
    }

    #[test]
    fn test_error_with_context() {
        let err = WeighError::UnknownType("Gravel".to_string());
        let with_ctx = err.with_context("Failed to append log entry");
        assert!(with_ctx.to_string().contains("Failed to append log entry"));
        assert!(with_ctx.is_unknown_name());
    }

    #[test]
    fn test_device_open_error() {
        let err = WeighError::DeviceOpen {
            vendor_id: 0x1018,
            product_id: 0x1006,
            message: "No such device".to_string(),
        };
        assert!(err.to_string().contains("1018:1006"));
        assert!(err.to_string().contains("No such device"));
        assert!(!err.is_unknown_name());
    }
}
