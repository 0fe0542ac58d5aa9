//! HID scale report decoding
//!
//! A report is six bytes:
//!
//! | byte | meaning |
//! |------|---------|
//! | 0 | report id (ignored) |
//! | 1 | status bitfield, `0x04` = stable |
//! | 2 | unit code (`0x02` g, `0x0B` oz, `0x0C` lb) |
//! | 3 | signed 8-bit power-of-ten exponent |
//! | 4 | magnitude, low byte |
//! | 5 | magnitude, high byte |
//!
//! `value = magnitude * 10^exponent`. Unknown unit codes still produce a
//! value; the unit carries the raw code.

use crate::types::{Reading, WeightUnit};

/// Length of one scale report
pub const REPORT_LEN: usize = 6;

/// Status bit set while the platform has settled
pub const STATUS_STABLE: u8 = 0x04;

/// Decode one raw report
///
/// Returns `None` when the report is shorter than [`REPORT_LEN`]; short
/// packets are a normal hardware artifact and are simply skipped.
pub fn decode_report(report: &[u8]) -> Option<Reading> {
    if report.len() < REPORT_LEN {
        return None;
    }

    let status = report[1];
    let unit = WeightUnit::from_code(report[2]);
    let exponent = report[3] as i8;
    let magnitude = u16::from_le_bytes([report[4], report[5]]);

    Some(Reading {
        value: scaled(magnitude, exponent),
        unit,
        is_stable: status & STATUS_STABLE != 0,
    })
}

fn scaled(magnitude: u16, exponent: i8) -> f64 {
    let magnitude = f64::from(magnitude);
    let exp = i32::from(exponent);
    // 10^-n is not exact in f64; divide by 10^n instead
    if exp < 0 {
        magnitude / 10f64.powi(-exp)
    } else {
        magnitude * 10f64.powi(exp)
    }
}
