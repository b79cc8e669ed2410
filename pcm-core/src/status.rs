//! Periodic status broadcast of the light bank.
//!
//! The publisher only decides *when* a frame is due and what it contains;
//! the platform submits it with a bounded wait and reports back whether the
//! frame left or was dropped. Dropped frames are never retried early.

use core::time::Duration;

use crate::config::{ControllerConfig, STATUS_FRAME_ID, STATUS_INTERVAL};
use crate::frame::BusFrame;
use crate::lights::CHANNEL_COUNT;
use crate::telemetry::TelemetryInstant;

/// Builds the status frame for a snapshot of the eight channel levels.
#[must_use]
pub const fn encode_status(frame_id: u32, levels: [u8; CHANNEL_COUNT]) -> BusFrame {
    BusFrame::from_array(frame_id, levels, CHANNEL_COUNT)
}

/// Outcome of one submission attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PublishOutcome {
    Sent,
    Dropped,
}

/// Running totals kept by the publisher.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PublishCounters {
    pub sent: u32,
    pub dropped: u32,
}

/// Rate limiter for status frames.
#[derive(Clone, Debug)]
pub struct StatusPublisher<TInstant> {
    frame_id: u32,
    interval: Duration,
    last_attempt: Option<TInstant>,
    counters: PublishCounters,
}

impl<TInstant> StatusPublisher<TInstant>
where
    TInstant: TelemetryInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self::with_interval(STATUS_FRAME_ID, STATUS_INTERVAL)
    }

    #[must_use]
    pub const fn from_config(config: &ControllerConfig) -> Self {
        Self::with_interval(config.status_frame_id, config.status_interval)
    }

    #[must_use]
    pub const fn with_interval(frame_id: u32, interval: Duration) -> Self {
        Self {
            frame_id,
            interval,
            last_attempt: None,
            counters: PublishCounters { sent: 0, dropped: 0 },
        }
    }

    /// Returns `true` when at least one interval has passed since the last attempt.
    #[must_use]
    pub fn is_due(&self, now: TInstant) -> bool {
        self.last_attempt
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Returns the frame to submit if one is due, stamping the attempt time.
    pub fn poll(&mut self, now: TInstant, levels: [u8; CHANNEL_COUNT]) -> Option<BusFrame> {
        if !self.is_due(now) {
            return None;
        }
        self.last_attempt = Some(now);
        Some(encode_status(self.frame_id, levels))
    }

    /// Records how the last submitted frame fared.
    pub fn record(&mut self, outcome: PublishOutcome) {
        match outcome {
            PublishOutcome::Sent => self.counters.sent = self.counters.sent.wrapping_add(1),
            PublishOutcome::Dropped => {
                self.counters.dropped = self.counters.dropped.wrapping_add(1);
            }
        }
    }

    #[must_use]
    pub const fn counters(&self) -> PublishCounters {
        self.counters
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl<TInstant> Default for StatusPublisher<TInstant>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    struct MillisInstant(u64);

    impl TelemetryInstant for MillisInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn status_frame_carries_all_levels() {
        let frame = encode_status(STATUS_FRAME_ID, [0, 1, 2, 3, 4, 5, 6, 255]);
        assert_eq!(frame.id(), 0x1B);
        assert!(!frame.is_extended());
        assert_eq!(frame.payload(), &[0, 1, 2, 3, 4, 5, 6, 255]);
    }

    #[test]
    fn publishes_at_most_once_per_interval() {
        let mut publisher = StatusPublisher::new();
        let levels = [0; CHANNEL_COUNT];

        assert!(publisher.poll(MillisInstant(0), levels).is_some());
        assert!(publisher.poll(MillisInstant(20), levels).is_none());
        assert!(publisher.poll(MillisInstant(32), levels).is_none());
        assert!(publisher.poll(MillisInstant(33), levels).is_some());
        assert!(publisher.poll(MillisInstant(40), levels).is_none());
    }

    #[test]
    fn dropped_frames_wait_for_next_interval() {
        let mut publisher = StatusPublisher::new();
        let levels = [9; CHANNEL_COUNT];

        assert!(publisher.poll(MillisInstant(0), levels).is_some());
        publisher.record(PublishOutcome::Dropped);
        assert!(!publisher.is_due(MillisInstant(10)));

        assert!(publisher.poll(MillisInstant(33), levels).is_some());
        publisher.record(PublishOutcome::Sent);
        assert_eq!(
            publisher.counters(),
            PublishCounters {
                sent: 1,
                dropped: 1,
            }
        );
    }
}
