//! Device transport for the USB scale
//!
//! [`ScaleTransport`] is the seam between the acquisition loop and the
//! hardware. [`HidTransport`] is the real implementation on top of
//! `hidapi`; tests and the `--simulate` CLI flag use
//! [`ScriptedTransport`](super::mock::ScriptedTransport) instead.

use crate::config::ScaleConfig;
use crate::error::{Result, WeighError};
use hidapi::{HidApi, HidDevice};
use std::fmt;
use std::time::Duration;

/// Blocking source of raw scale reports
///
/// Implementations must be `Send` so the acquisition loop can own them on
/// its worker thread.
#[cfg_attr(test, mockall::automock)]
pub trait ScaleTransport: Send {
    /// Block for up to `timeout` waiting for one report
    ///
    /// Returns the number of bytes written into `buf`; `0` means the
    /// timeout elapsed without data.
    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Human readable name for logs
    fn describe(&self) -> String;
}

/// Information about a HID device seen during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Vendor ID
    pub vendor_id: u16,
    /// Product ID
    pub product_id: u16,
    /// OS device path
    pub path: String,
    /// Product string (if available)
    pub product: Option<String>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref product) = self.product {
            write!(
                f,
                "{} ({:04x}:{:04x}) - {}",
                product, self.vendor_id, self.product_id, self.path
            )
        } else {
            write!(
                f,
                "({:04x}:{:04x}) - {}",
                self.vendor_id, self.product_id, self.path
            )
        }
    }
}

/// List every HID device visible to this process
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let api = HidApi::new()?;
    Ok(collect_devices(&api))
}

fn collect_devices(api: &HidApi) -> Vec<DeviceInfo> {
    api.device_list()
        .map(|info| DeviceInfo {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            path: info.path().to_string_lossy().into_owned(),
            product: info.product_string().map(str::to_string),
        })
        .collect()
}

/// Scale transport backed by a HID device in blocking mode
pub struct HidTransport {
    device: HidDevice,
    vendor_id: u16,
    product_id: u16,
}

impl HidTransport {
    /// Enumerate devices (for the log) and open the configured scale
    pub fn open(config: &ScaleConfig) -> Result<Self> {
        let open_error = |message: String| WeighError::DeviceOpen {
            vendor_id: config.vendor_id,
            product_id: config.product_id,
            message,
        };

        let api = HidApi::new().map_err(|e| open_error(e.to_string()))?;

        tracing::info!("Enumerating HID devices...");
        for info in collect_devices(&api) {
            tracing::debug!("  {}", info);
        }

        let device = api
            .open(config.vendor_id, config.product_id)
            .map_err(|e| open_error(e.to_string()))?;
        device
            .set_blocking_mode(true)
            .map_err(|e| open_error(format!("failed to enable blocking reads: {}", e)))?;

        tracing::info!(
            "Opened scale VID=0x{:04x} PID=0x{:04x}",
            config.vendor_id,
            config.product_id
        );

        Ok(Self {
            device,
            vendor_id: config.vendor_id,
            product_id: config.product_id,
        })
    }
}

impl ScaleTransport for HidTransport {
    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        Ok(self.device.read_timeout(buf, timeout_ms)?)
    }

    fn describe(&self) -> String {
        format!("HID scale {:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo {
            vendor_id: 0x0922,
            product_id: 0x8009,
            path: "/dev/hidraw0".to_string(),
            product: Some("DYMO M25".to_string()),
        };
        assert_eq!(info.to_string(), "DYMO M25 (0922:8009) - /dev/hidraw0");

        let bare = DeviceInfo {
            product: None,
            ..info
        };
        assert_eq!(bare.to_string(), "(0922:8009) - /dev/hidraw0");
    }

    #[test]
    #[ignore = "USB enumeration needs access to the host's HID devices"]
    fn test_list_devices_does_not_panic() {
        let _ = list_devices();
    }
}
