//! Log lines emitted by the runtime tasks, over RTT on target and stdout on host.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt;

use pcm_core::provisioning::{AbortReason, ProvisioningUpdate};
use pcm_core::router::Dispatch;
use pcm_core::shows::ShowKind;
use pcm_core::status::PublishCounters;

use crate::instant::FirmwareInstant;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Severity {
    Debug,
    Info,
    Warn,
}

fn severity<E>(dispatch: &Dispatch<E>) -> Severity {
    match dispatch {
        Dispatch::Lights(_)
        | Dispatch::Provisioning(ProvisioningUpdate::ChunkAccepted { .. })
        | Dispatch::Dropped(_)
        | Dispatch::TriggerMismatch => Severity::Debug,
        Dispatch::Committed {
            persisted: Err(_), ..
        }
        | Dispatch::ProvisioningRejected(_)
        | Dispatch::ShowRefused(_)
        | Dispatch::ShowUnknown(_)
        | Dispatch::LightsIgnored => Severity::Warn,
        _ => Severity::Info,
    }
}

/// One-line rendering of a dispatch result. Credentials are never printed.
struct DispatchSummary<'a, E>(&'a Dispatch<E>);

impl<E: fmt::Display> fmt::Display for DispatchSummary<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Dispatch::Lights(update) => write!(f, "lights {update}"),
            Dispatch::LightsIgnored => f.write_str("light command ignored"),
            Dispatch::Provisioning(ProvisioningUpdate::Started(header)) => write!(
                f,
                "provisioning started ssid_len={} password_len={} chunks={}+{}",
                header.ssid_len, header.password_len, header.ssid_chunks, header.password_chunks
            ),
            Dispatch::Provisioning(ProvisioningUpdate::ChunkAccepted { field, index }) => {
                write!(f, "provisioning chunk {field}[{index}]")
            }
            Dispatch::Provisioning(ProvisioningUpdate::Committed(_)) => {
                f.write_str("provisioning committed")
            }
            Dispatch::ProvisioningRejected(error) => write!(f, "provisioning rejected: {error}"),
            Dispatch::Committed {
                credentials,
                persisted,
            } => {
                write!(f, "credentials committed ssid_len={}", credentials.ssid_bytes().len())?;
                match persisted {
                    Ok(()) => f.write_str(" persisted"),
                    Err(error) => write!(f, " not persisted: {error}"),
                }
            }
            Dispatch::UpdateWindow(outcome) => write!(f, "update window closed: {outcome}"),
            Dispatch::TriggerMismatch => f.write_str("update trigger for another device"),
            Dispatch::ShowTriggered(show) => write!(f, "show {show} queued"),
            Dispatch::ShowRefused(show) => write!(f, "show {show} refused, player busy"),
            Dispatch::ShowUnknown(id) => write!(f, "unknown sequence id {id}"),
            Dispatch::Dropped(reason) => write!(f, "frame dropped: {reason}"),
        }
    }
}

#[cfg(target_os = "none")]
pub fn dispatch<E: fmt::Display>(dispatch: &Dispatch<E>, timestamp: FirmwareInstant) {
    let micros = timestamp.into_embassy().as_micros();
    let summary = defmt::Display2Format(&DispatchSummary(dispatch));
    match severity(dispatch) {
        Severity::Debug => defmt::debug!("bus: {} t={}us", summary, micros),
        Severity::Info => defmt::info!("bus: {} t={}us", summary, micros),
        Severity::Warn => defmt::warn!("bus: {} t={}us", summary, micros),
    }
}

#[cfg(not(target_os = "none"))]
pub fn dispatch<E: fmt::Display>(dispatch: &Dispatch<E>, timestamp: FirmwareInstant) {
    if severity(dispatch) == Severity::Debug {
        return;
    }
    println!(
        "bus: {} t={}us",
        DispatchSummary(dispatch),
        timestamp.into_embassy().as_micros()
    );
}

#[cfg(target_os = "none")]
pub fn provisioning_aborted(reason: AbortReason) {
    defmt::warn!("provisioning: transfer discarded ({})", defmt::Display2Format(&reason));
}

#[cfg(not(target_os = "none"))]
pub fn provisioning_aborted(reason: AbortReason) {
    println!("provisioning: transfer discarded ({reason})");
}

#[cfg(target_os = "none")]
pub fn status_dropped(counters: PublishCounters) {
    defmt::debug!(
        "status: frame dropped (sent={=u32} dropped={=u32})",
        counters.sent,
        counters.dropped
    );
}

#[cfg(not(target_os = "none"))]
pub fn status_dropped(_: PublishCounters) {}

#[cfg(target_os = "none")]
pub fn credentials_loaded(provisioned: bool) {
    if provisioned {
        defmt::info!("credentials: restored from flash");
    } else {
        defmt::info!("credentials: none stored");
    }
}

#[cfg(not(target_os = "none"))]
pub fn credentials_loaded(provisioned: bool) {
    println!(
        "credentials: {}",
        if provisioned {
            "restored from flash"
        } else {
            "none stored"
        }
    );
}

#[cfg(target_os = "none")]
pub fn credentials_unreadable<E: fmt::Display>(error: &E) {
    defmt::error!("credentials: stored record unreadable: {}", defmt::Display2Format(error));
}

#[cfg(not(target_os = "none"))]
pub fn credentials_unreadable<E: fmt::Display>(error: &E) {
    println!("credentials: stored record unreadable: {error}");
}

#[cfg(target_os = "none")]
pub fn identity(hostname: &str) {
    defmt::info!("update: device identity {=str}", hostname);
}

#[cfg(not(target_os = "none"))]
pub fn identity(hostname: &str) {
    println!("update: device identity {hostname}");
}

#[cfg(target_os = "none")]
pub fn update_received() {
    defmt::warn!("update: image request received, restarting");
}

#[cfg(not(target_os = "none"))]
pub fn update_received() {}

#[cfg(target_os = "none")]
pub fn show_started(show: ShowKind) {
    defmt::info!("show: {} started", defmt::Display2Format(&show));
}

#[cfg(not(target_os = "none"))]
pub fn show_started(_: ShowKind) {}

#[cfg(target_os = "none")]
pub fn show_finished(show: ShowKind) {
    defmt::info!("show: {} finished", defmt::Display2Format(&show));
}

#[cfg(not(target_os = "none"))]
pub fn show_finished(_: ShowKind) {}

#[cfg(target_os = "none")]
pub fn bus_error<E: fmt::Debug>(error: &E) {
    defmt::warn!("bus: receive error {}", defmt::Debug2Format(error));
}

#[cfg(not(target_os = "none"))]
pub fn bus_error<E: fmt::Debug>(error: &E) {
    println!("bus: receive error {error:?}");
}

#[cfg(target_os = "none")]
pub fn frame_unconvertible<E: fmt::Display>(error: &E) {
    defmt::warn!("bus: frame discarded: {}", defmt::Display2Format(error));
}

#[cfg(not(target_os = "none"))]
pub fn frame_unconvertible<E: fmt::Display>(error: &E) {
    println!("bus: frame discarded: {error}");
}

#[cfg(test)]
mod tests {
    use pcm_core::credentials::Credentials;
    use pcm_core::router::{CommitError, DropReason};

    use super::*;

    #[test]
    fn summaries_never_include_passwords() {
        let credentials = Credentials::new(b"home", b"hunter22").expect("valid credentials");
        let dispatch: Dispatch<&str> = Dispatch::Committed {
            credentials,
            persisted: Err(CommitError::Store("flash busy")),
        };

        let text = DispatchSummary(&dispatch).to_string();
        assert!(!text.contains("hunter22"));
        assert!(text.contains("not persisted"));
        assert_eq!(severity(&dispatch), Severity::Warn);
    }

    #[test]
    fn routine_traffic_logs_at_debug() {
        let dispatch: Dispatch<&str> = Dispatch::Dropped(DropReason::TooShort);
        assert_eq!(severity(&dispatch), Severity::Debug);
        assert_eq!(
            DispatchSummary(&dispatch).to_string(),
            "frame dropped: too-short"
        );
    }
}
