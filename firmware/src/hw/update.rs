//! Update agent backed by the radio module's image-request line.
//!
//! While the window is open the agent polls the request line. A request
//! means the radio module has an image staged for this device, so the MCU
//! restarts into the bootloader and never returns. The window is served
//! synchronously so no bus frame is processed until it closes.

use core::fmt;

use cortex_m::peripheral::SCB;
use embassy_stm32::gpio::Input;
use embassy_time::{Duration, Instant, block_for};
use pcm_core::credentials::Credentials;
use pcm_core::ota::{Hostname, TRIGGER_SUFFIX_LEN, UpdateAgent, UpdateOutcome, format_hostname};

use crate::instant::to_embassy;
use crate::log;

const REQUEST_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct FirmwareUpdateAgent {
    identity: Hostname,
    request: Input<'static>,
}

impl FirmwareUpdateAgent {
    /// Derives the identity from the low bytes of the device unique id.
    pub fn new(prefix: &str, request: Input<'static>) -> Result<Self, fmt::Error> {
        let uid = embassy_stm32::uid::uid();
        let mut suffix = [0u8; TRIGGER_SUFFIX_LEN];
        suffix.copy_from_slice(&uid[uid.len() - TRIGGER_SUFFIX_LEN..]);
        let identity = format_hostname(prefix, suffix)?;
        log::identity(&identity);
        Ok(Self { identity, request })
    }
}

impl UpdateAgent for FirmwareUpdateAgent {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn wait_for_update(
        &mut self,
        credentials: Option<&Credentials>,
        window: core::time::Duration,
    ) -> UpdateOutcome {
        if credentials.is_none_or(Credentials::is_empty) {
            return UpdateOutcome::NotProvisioned;
        }

        let deadline = Instant::now() + to_embassy(window);
        while Instant::now() < deadline {
            if self.request.is_high() {
                log::update_received();
                SCB::sys_reset();
            }
            block_for(REQUEST_POLL_INTERVAL);
        }
        UpdateOutcome::TimedOut
    }
}
