//! Controller event catalog and ring buffer shared by firmware and host targets.
//!
//! Events are strongly typed and serialize to compact numeric codes so they
//! can be mirrored over diagnostics channels. The recorder is `no_std` and
//! generic over the platform's monotonic instant.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::ota::UpdateOutcome;
use crate::provisioning::AbortReason;
use crate::router::DropReason;
use crate::shows::ShowKind;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Trait implemented by monotonic instant wrappers used for timing decisions.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Discriminated controller events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    FrameDropped(DropReason),
    ProvisioningStarted,
    ProvisioningRejected,
    ProvisioningCommitted { persisted: bool },
    ProvisioningAborted(AbortReason),
    UpdateWindowOpened,
    UpdateWindowClosed(UpdateOutcome),
    ShowTriggered(ShowKind),
    ShowRefused(ShowKind),
    StatusDropped,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::FrameDropped(reason) => write!(f, "frame-dropped {reason}"),
            TelemetryEventKind::ProvisioningStarted => f.write_str("provisioning-started"),
            TelemetryEventKind::ProvisioningRejected => f.write_str("provisioning-rejected"),
            TelemetryEventKind::ProvisioningCommitted { persisted: true } => {
                f.write_str("provisioning-committed")
            }
            TelemetryEventKind::ProvisioningCommitted { persisted: false } => {
                f.write_str("provisioning-committed (not persisted)")
            }
            TelemetryEventKind::ProvisioningAborted(reason) => {
                write!(f, "provisioning-aborted {reason}")
            }
            TelemetryEventKind::UpdateWindowOpened => f.write_str("update-window-opened"),
            TelemetryEventKind::UpdateWindowClosed(outcome) => {
                write!(f, "update-window-closed {outcome}")
            }
            TelemetryEventKind::ShowTriggered(kind) => write!(f, "show-triggered {kind}"),
            TelemetryEventKind::ShowRefused(kind) => write!(f, "show-refused {kind}"),
            TelemetryEventKind::StatusDropped => f.write_str("status-dropped"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const FRAME_DROPPED_BASE: u16 = 0x0000;
    const PROVISIONING_STARTED_CODE: u16 = 0x0010;
    const PROVISIONING_REJECTED_CODE: u16 = 0x0011;
    const PROVISIONING_PERSISTED_CODE: u16 = 0x0012;
    const PROVISIONING_VOLATILE_CODE: u16 = 0x0013;
    const PROVISIONING_ABORTED_BASE: u16 = 0x0018;
    const UPDATE_OPENED_CODE: u16 = 0x0020;
    const UPDATE_CLOSED_BASE: u16 = 0x0024;
    const SHOW_TRIGGERED_BASE: u16 = 0x0030;
    const SHOW_REFUSED_BASE: u16 = 0x0034;
    const STATUS_DROPPED_CODE: u16 = 0x0040;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::FrameDropped(reason) => {
                Self::FRAME_DROPPED_BASE + drop_index(reason)
            }
            TelemetryEventKind::ProvisioningStarted => Self::PROVISIONING_STARTED_CODE,
            TelemetryEventKind::ProvisioningRejected => Self::PROVISIONING_REJECTED_CODE,
            TelemetryEventKind::ProvisioningCommitted { persisted: true } => {
                Self::PROVISIONING_PERSISTED_CODE
            }
            TelemetryEventKind::ProvisioningCommitted { persisted: false } => {
                Self::PROVISIONING_VOLATILE_CODE
            }
            TelemetryEventKind::ProvisioningAborted(reason) => {
                Self::PROVISIONING_ABORTED_BASE + abort_index(reason)
            }
            TelemetryEventKind::UpdateWindowOpened => Self::UPDATE_OPENED_CODE,
            TelemetryEventKind::UpdateWindowClosed(outcome) => {
                Self::UPDATE_CLOSED_BASE + outcome_index(outcome)
            }
            TelemetryEventKind::ShowTriggered(kind) => Self::SHOW_TRIGGERED_BASE + show_index(kind),
            TelemetryEventKind::ShowRefused(kind) => Self::SHOW_REFUSED_BASE + show_index(kind),
            TelemetryEventKind::StatusDropped => Self::STATUS_DROPPED_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        let decoded = match code {
            Self::PROVISIONING_STARTED_CODE => Some(TelemetryEventKind::ProvisioningStarted),
            Self::PROVISIONING_REJECTED_CODE => Some(TelemetryEventKind::ProvisioningRejected),
            Self::PROVISIONING_PERSISTED_CODE => {
                Some(TelemetryEventKind::ProvisioningCommitted { persisted: true })
            }
            Self::PROVISIONING_VOLATILE_CODE => {
                Some(TelemetryEventKind::ProvisioningCommitted { persisted: false })
            }
            Self::UPDATE_OPENED_CODE => Some(TelemetryEventKind::UpdateWindowOpened),
            Self::STATUS_DROPPED_CODE => Some(TelemetryEventKind::StatusDropped),
            value if value < Self::PROVISIONING_STARTED_CODE => {
                drop_from_index(value - Self::FRAME_DROPPED_BASE)
                    .map(TelemetryEventKind::FrameDropped)
            }
            value
                if (Self::PROVISIONING_ABORTED_BASE..Self::UPDATE_OPENED_CODE).contains(&value) =>
            {
                abort_from_index(value - Self::PROVISIONING_ABORTED_BASE)
                    .map(TelemetryEventKind::ProvisioningAborted)
            }
            value if (Self::UPDATE_CLOSED_BASE..Self::SHOW_TRIGGERED_BASE).contains(&value) => {
                outcome_from_index(value - Self::UPDATE_CLOSED_BASE)
                    .map(TelemetryEventKind::UpdateWindowClosed)
            }
            value if (Self::SHOW_TRIGGERED_BASE..Self::SHOW_REFUSED_BASE).contains(&value) => {
                show_from_index(value - Self::SHOW_TRIGGERED_BASE)
                    .map(TelemetryEventKind::ShowTriggered)
            }
            value if (Self::SHOW_REFUSED_BASE..Self::STATUS_DROPPED_CODE).contains(&value) => {
                show_from_index(value - Self::SHOW_REFUSED_BASE)
                    .map(TelemetryEventKind::ShowRefused)
            }
            _ => None,
        };
        decoded.unwrap_or(TelemetryEventKind::Custom(code))
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an event observed at `timestamp`.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });

        id
    }

    /// Time elapsed since the most recent record, if any.
    pub fn since_latest(&self, now: TInstant) -> Option<Duration> {
        self.latest()
            .map(|record| now.saturating_duration_since(record.timestamp))
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

const fn drop_index(reason: DropReason) -> u16 {
    match reason {
        DropReason::RemoteRequest => 0,
        DropReason::TooShort => 1,
        DropReason::UnknownIdentifier => 2,
    }
}

fn drop_from_index(index: u16) -> Option<DropReason> {
    match index {
        0 => Some(DropReason::RemoteRequest),
        1 => Some(DropReason::TooShort),
        2 => Some(DropReason::UnknownIdentifier),
        _ => None,
    }
}

const fn abort_index(reason: AbortReason) -> u16 {
    match reason {
        AbortReason::MissingChunks => 0,
        AbortReason::ChecksumMismatch => 1,
        AbortReason::MissingChecksum => 2,
        AbortReason::TimedOut => 3,
    }
}

fn abort_from_index(index: u16) -> Option<AbortReason> {
    match index {
        0 => Some(AbortReason::MissingChunks),
        1 => Some(AbortReason::ChecksumMismatch),
        2 => Some(AbortReason::MissingChecksum),
        3 => Some(AbortReason::TimedOut),
        _ => None,
    }
}

const fn outcome_index(outcome: UpdateOutcome) -> u16 {
    match outcome {
        UpdateOutcome::Applied => 0,
        UpdateOutcome::TimedOut => 1,
        UpdateOutcome::NotProvisioned => 2,
        UpdateOutcome::Failed => 3,
    }
}

fn outcome_from_index(index: u16) -> Option<UpdateOutcome> {
    match index {
        0 => Some(UpdateOutcome::Applied),
        1 => Some(UpdateOutcome::TimedOut),
        2 => Some(UpdateOutcome::NotProvisioned),
        3 => Some(UpdateOutcome::Failed),
        _ => None,
    }
}

const fn show_index(kind: ShowKind) -> u16 {
    match kind {
        ShowKind::Interior => 0,
        ShowKind::Exterior => 1,
        ShowKind::Startup => 2,
        ShowKind::Melody => 3,
    }
}

fn show_from_index(index: u16) -> Option<ShowKind> {
    match index {
        0 => Some(ShowKind::Interior),
        1 => Some(ShowKind::Exterior),
        2 => Some(ShowKind::Startup),
        3 => Some(ShowKind::Melody),
        _ => None,
    }
}
