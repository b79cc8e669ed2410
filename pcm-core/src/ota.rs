//! Firmware-update trigger matching and the update collaborator seam.

use core::fmt::{self, Write as _};
use core::time::Duration;

use heapless::String;

use crate::credentials::Credentials;

/// Prefix of the device identity announced by the update subsystem.
pub const HOSTNAME_PREFIX: &str = "esp32-";
/// Bus identifier carrying update triggers.
pub const UPDATE_TRIGGER_FRAME_ID: u32 = 0;
/// Number of identity bytes carried by a trigger.
pub const TRIGGER_SUFFIX_LEN: usize = 3;
/// Capacity of a formatted identity.
pub const MAX_HOSTNAME_LEN: usize = 32;

pub type Hostname = String<MAX_HOSTNAME_LEN>;

/// Formats `<prefix>XXXXXX` with the suffix bytes as uppercase hex.
pub fn format_hostname(
    prefix: &str,
    suffix: [u8; TRIGGER_SUFFIX_LEN],
) -> Result<Hostname, fmt::Error> {
    let mut hostname = Hostname::new();
    hostname.push_str(prefix).map_err(|_| fmt::Error)?;
    for byte in suffix {
        write!(hostname, "{byte:02X}")?;
    }
    Ok(hostname)
}

/// Compares trigger fragments against this device's identity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OtaTriggerMatcher {
    prefix: &'static str,
}

impl OtaTriggerMatcher {
    #[must_use]
    pub const fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    /// Returns `true` when the first three bytes of `fragment` name `identity`.
    ///
    /// The comparison is exact and case-sensitive.
    #[must_use]
    pub fn matches(&self, fragment: &[u8], identity: &str) -> bool {
        let &[a, b, c, ..] = fragment else {
            return false;
        };
        format_hostname(self.prefix, [a, b, c])
            .is_ok_and(|candidate| candidate.as_str() == identity)
    }
}

impl Default for OtaTriggerMatcher {
    fn default() -> Self {
        Self::new(HOSTNAME_PREFIX)
    }
}

/// Result reported by the update subsystem when its window closes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateOutcome {
    /// An image was received; the device normally restarts before this returns.
    Applied,
    TimedOut,
    /// No credentials are available to join the network.
    NotProvisioned,
    Failed,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateOutcome::Applied => "applied",
            UpdateOutcome::TimedOut => "timed-out",
            UpdateOutcome::NotProvisioned => "not-provisioned",
            UpdateOutcome::Failed => "failed",
        })
    }
}

/// Firmware-update collaborator.
pub trait UpdateAgent {
    /// Identity string compared against trigger fragments.
    fn identity(&self) -> &str;

    /// Blocks for at most `window` waiting for an update image.
    fn wait_for_update(
        &mut self,
        credentials: Option<&Credentials>,
        window: Duration,
    ) -> UpdateOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_uses_uppercase_hex() {
        let hostname = format_hostname(HOSTNAME_PREFIX, [0x8A, 0x3B, 0x4C]).expect("fits");
        assert_eq!(hostname.as_str(), "esp32-8A3B4C");
    }

    #[test]
    fn matcher_is_exact_and_case_sensitive() {
        let matcher = OtaTriggerMatcher::default();
        assert!(matcher.matches(&[0x8A, 0x3B, 0x4C], "esp32-8A3B4C"));
        assert!(matcher.matches(&[0x8A, 0x3B, 0x4C, 0xFF], "esp32-8A3B4C"));
        assert!(!matcher.matches(&[0x8A, 0x3B, 0x4C], "esp32-8a3b4c"));
        assert!(!matcher.matches(&[0x8A, 0x3B, 0x4D], "esp32-8A3B4C"));
        assert!(!matcher.matches(&[0x8A, 0x3B], "esp32-8A3B"));
    }

    #[test]
    fn matcher_honours_custom_prefix() {
        let matcher = OtaTriggerMatcher::new("pcm-");
        assert!(matcher.matches(&[0, 1, 2], "pcm-000102"));
        assert!(!matcher.matches(&[0, 1, 2], "esp32-000102"));
    }
}
