//! Timing and addressing defaults shared by firmware and host targets.

use core::time::Duration;

use crate::ota::HOSTNAME_PREFIX;

/// Idle window after which a partial provisioning transfer is discarded.
pub const PROVISIONING_TIMEOUT: Duration = Duration::from_millis(5_000);
/// Minimum spacing between two status frames.
pub const STATUS_INTERVAL: Duration = Duration::from_millis(33);
/// Longest time a status frame may wait for a free transmit slot.
pub const STATUS_SEND_WAIT: Duration = Duration::from_millis(10);
/// Duration of the firmware-update window opened by a matching trigger.
pub const UPDATE_WINDOW: Duration = Duration::from_secs(180);
/// Period of the provisioning timeout sweep.
pub const SWEEP_PERIOD: Duration = Duration::from_millis(100);
/// Identifier used for outbound status frames.
pub const STATUS_FRAME_ID: u32 = 0x1B;
/// Nominal bus bitrate.
pub const BUS_BITRATE: u32 = 500_000;

/// Runtime configuration consumed by the controller and its periodic tasks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    pub provisioning_timeout: Duration,
    pub status_interval: Duration,
    pub status_send_wait: Duration,
    pub update_window: Duration,
    pub sweep_period: Duration,
    pub status_frame_id: u32,
    pub hostname_prefix: &'static str,
}

impl ControllerConfig {
    /// Returns the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            provisioning_timeout: PROVISIONING_TIMEOUT,
            status_interval: STATUS_INTERVAL,
            status_send_wait: STATUS_SEND_WAIT,
            update_window: UPDATE_WINDOW,
            sweep_period: SWEEP_PERIOD,
            status_frame_id: STATUS_FRAME_ID,
            hostname_prefix: HOSTNAME_PREFIX,
        }
    }

    /// Overrides the provisioning idle timeout.
    #[must_use]
    pub const fn with_provisioning_timeout(mut self, timeout: Duration) -> Self {
        self.provisioning_timeout = timeout;
        self
    }

    /// Overrides the update window length.
    #[must_use]
    pub const fn with_update_window(mut self, window: Duration) -> Self {
        self.update_window = window;
        self
    }

    /// Overrides the hostname prefix used for update triggers.
    #[must_use]
    pub const fn with_hostname_prefix(mut self, prefix: &'static str) -> Self {
        self.hostname_prefix = prefix;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bus_contract() {
        let config = ControllerConfig::default();
        assert_eq!(config.provisioning_timeout, Duration::from_millis(5_000));
        assert_eq!(config.status_interval, Duration::from_millis(33));
        assert_eq!(config.status_send_wait, Duration::from_millis(10));
        assert_eq!(config.update_window, Duration::from_secs(180));
        assert_eq!(config.status_frame_id, 0x1B);
        assert_eq!(config.hostname_prefix, "esp32-");
    }

    #[test]
    fn builder_overrides_single_fields() {
        let config = ControllerConfig::new()
            .with_provisioning_timeout(Duration::from_millis(250))
            .with_hostname_prefix("pcm-");
        assert_eq!(config.provisioning_timeout, Duration::from_millis(250));
        assert_eq!(config.hostname_prefix, "pcm-");
        assert_eq!(config.update_window, UPDATE_WINDOW);
    }
}
