//! Core data types for weighit
//!
//! This module contains the data structures shared between the scale
//! acquisition side and the donation log.
//!
//! # Main Types
//!
//! - [`WeightUnit`] - Unit reported by the scale (lb, oz, g, or an unknown raw code)
//! - [`Reading`] - One decoded weight sample with its stability flag
//! - [`Sample`] - A reading together with the instant it was received
//! - [`Source`] / [`FoodType`] - Reference data for log entries
//! - [`LogEntry`] - One donation row as stored, with source and type names joined in

use crate::error::{Result, WeighError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Ounces per pound
const OUNCES_PER_POUND: f64 = 16.0;

/// Grams per pound
const GRAMS_PER_POUND: f64 = 453.592_37;

/// Unit reported by the scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightUnit {
    /// Pounds (unit code 0x0C)
    Pounds,
    /// Ounces (unit code 0x0B)
    Ounces,
    /// Grams (unit code 0x02)
    Grams,
    /// Any other unit code, kept as reported
    Unknown(u8),
}

impl WeightUnit {
    /// Map a raw HID unit code to a unit
    pub fn from_code(code: u8) -> Self {
        match code {
            0x02 => WeightUnit::Grams,
            0x0B => WeightUnit::Ounces,
            0x0C => WeightUnit::Pounds,
            other => WeightUnit::Unknown(other),
        }
    }

    /// Short label for display ("lb", "oz", "g", or a hex tag like "0x05")
    pub fn label(&self) -> String {
        match self {
            WeightUnit::Pounds => "lb".to_string(),
            WeightUnit::Ounces => "oz".to_string(),
            WeightUnit::Grams => "g".to_string(),
            WeightUnit::Unknown(code) => format!("0x{:02x}", code),
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One decoded weight sample
///
/// Readings are immutable; a newer reading supersedes an older one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Numeric value in `unit`
    pub value: f64,
    /// Unit reported by the scale
    pub unit: WeightUnit,
    /// Device settling flag
    pub is_stable: bool,
}

impl Reading {
    /// Create a new reading
    pub fn new(value: f64, unit: WeightUnit, is_stable: bool) -> Self {
        Self {
            value,
            unit,
            is_stable,
        }
    }

    /// The value converted to pounds, or `None` for an unknown unit
    pub fn pounds(&self) -> Option<f64> {
        match self.unit {
            WeightUnit::Pounds => Some(self.value),
            WeightUnit::Ounces => Some(self.value / OUNCES_PER_POUND),
            WeightUnit::Grams => Some(self.value / GRAMS_PER_POUND),
            WeightUnit::Unknown(_) => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} {}{}",
            self.value,
            self.unit,
            if self.is_stable { "" } else { " (settling)" }
        )
    }
}

/// A reading tagged with the instant the acquisition loop published it
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    /// The decoded reading
    pub reading: Reading,
    /// When it was received
    pub received_at: Instant,
}

impl Sample {
    /// Create a sample stamped with the current instant
    pub fn now(reading: Reading) -> Self {
        Self {
            reading,
            received_at: Instant::now(),
        }
    }

    /// Time since this sample was published
    pub fn age(&self) -> Duration {
        self.received_at.elapsed()
    }
}

/// A donation source (store, farm, food drive, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
}

/// A food type with its display order and temperature requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodType {
    pub id: i64,
    pub name: String,
    /// Display ordering, ascending
    pub sort_order: i64,
    /// Entries of this type must carry pickup and dropoff temperatures
    pub requires_temp: bool,
}

impl FoodType {
    /// Check that an entry of this type carries the temperatures it needs
    pub fn check_temperatures(&self, pickup_f: Option<f64>, dropoff_f: Option<f64>) -> Result<()> {
        if self.requires_temp && (pickup_f.is_none() || dropoff_f.is_none()) {
            return Err(WeighError::TemperatureRequired(self.name.clone()));
        }
        Ok(())
    }
}

/// One row of the donation log, joined with its source and type names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    /// ISO-8601 UTC timestamp assigned at insert
    pub timestamp: String,
    pub weight_lb: f64,
    pub source: String,
    #[serde(rename = "type")]
    pub food_type: String,
    pub deleted: bool,
    pub temp_pickup_f: Option<f64>,
    pub temp_dropoff_f: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_codes() {
        assert_eq!(WeightUnit::from_code(0x02), WeightUnit::Grams);
        assert_eq!(WeightUnit::from_code(0x0B), WeightUnit::Ounces);
        assert_eq!(WeightUnit::from_code(0x0C), WeightUnit::Pounds);
        assert_eq!(WeightUnit::from_code(0x05), WeightUnit::Unknown(0x05));
    }

    #[test]
    fn test_unit_labels() {
        assert_eq!(WeightUnit::Pounds.to_string(), "lb");
        assert_eq!(WeightUnit::Ounces.to_string(), "oz");
        assert_eq!(WeightUnit::Grams.to_string(), "g");
        assert_eq!(WeightUnit::Unknown(0x0a).to_string(), "0x0a");
    }

    #[test]
    fn test_reading_pounds() {
        assert_eq!(Reading::new(1.5, WeightUnit::Pounds, true).pounds(), Some(1.5));
        assert_eq!(Reading::new(8.0, WeightUnit::Ounces, true).pounds(), Some(0.5));
        let grams = Reading::new(453.59237, WeightUnit::Grams, true).pounds().unwrap();
        assert!((grams - 1.0).abs() < 1e-9);
        assert_eq!(Reading::new(3.0, WeightUnit::Unknown(0x07), true).pounds(), None);
    }

    #[test]
    fn test_reading_display() {
        assert_eq!(Reading::new(1.5, WeightUnit::Pounds, true).to_string(), "1.50 lb");
        assert_eq!(
            Reading::new(10.0, WeightUnit::Ounces, false).to_string(),
            "10.00 oz (settling)"
        );
    }

    #[test]
    fn test_temperature_gate() {
        let meat = FoodType {
            id: 4,
            name: "Meat".to_string(),
            sort_order: 4,
            requires_temp: true,
        };
        assert!(meat.check_temperatures(Some(34.0), Some(36.0)).is_ok());
        assert!(matches!(
            meat.check_temperatures(Some(34.0), None),
            Err(WeighError::TemperatureRequired(name)) if name == "Meat"
        ));

        let produce = FoodType {
            requires_temp: false,
            name: "Produce".to_string(),
            ..meat
        };
        assert!(produce.check_temperatures(None, None).is_ok());
    }
}
