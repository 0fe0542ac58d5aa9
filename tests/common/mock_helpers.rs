//! Helpers for driving the scale reader without hardware

use std::time::{Duration, Instant};
use weighit::config::ScaleConfig;
use weighit::scale::{ScaleReader, ScriptedTransport};

/// Scale settings with short timeouts so tests stay fast
pub fn fast_scale_config() -> ScaleConfig {
    ScaleConfig {
        read_timeout_ms: 10,
        retry_backoff_ms: 5,
        poll_interval_ms: 5,
        stable_timeout_ms: 500,
        ..ScaleConfig::default()
    }
}

/// Start a reader on a scripted transport
pub fn scripted_reader(transport: ScriptedTransport) -> ScaleReader {
    ScaleReader::with_transport(Box::new(transport), &fast_scale_config()).unwrap()
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
