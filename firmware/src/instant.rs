//! Monotonic instant used by the controller on this target.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use embassy_time::Instant;
use pcm_core::telemetry::TelemetryInstant;

/// Embassy instant wrapped so it satisfies the controller's instant trait.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        core::time::Duration::from_micros(elapsed.as_micros())
    }
}

/// Converts a core duration into an embassy duration, saturating on overflow.
pub fn to_embassy(duration: core::time::Duration) -> embassy_time::Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    embassy_time::Duration::from_micros(micros)
}

/// Deadline one `interval` after `previous`. A slot that has already passed
/// at `now` restarts the schedule from `now` instead of firing a burst.
pub fn next_deadline(previous: Instant, interval: embassy_time::Duration, now: Instant) -> Instant {
    (previous + interval).max(now)
}

#[cfg(test)]
mod tests {
    use pcm_core::lights::CHANNEL_COUNT;
    use pcm_core::status::StatusPublisher;

    use super::*;

    #[test]
    fn elapsed_time_saturates_at_zero() {
        let earlier = FirmwareInstant::from(Instant::from_micros(2_500));
        let later = FirmwareInstant::from(Instant::from_micros(7_500));
        assert_eq!(
            later.saturating_duration_since(earlier),
            core::time::Duration::from_millis(5)
        );
        assert_eq!(
            earlier.saturating_duration_since(later),
            core::time::Duration::ZERO
        );
    }

    #[test]
    fn durations_convert_at_microsecond_resolution() {
        assert_eq!(
            to_embassy(core::time::Duration::from_millis(33)),
            embassy_time::Duration::from_millis(33)
        );
    }

    #[test]
    fn polls_stamped_with_the_schedule_survive_a_late_lock() {
        let interval = embassy_time::Duration::from_millis(33);
        let levels = [0; CHANNEL_COUNT];

        let mut late = StatusPublisher::<FirmwareInstant>::new();
        assert!(late.poll(Instant::from_millis(5).into(), levels).is_some());
        assert!(late.poll(Instant::from_millis(33).into(), levels).is_none());

        let mut publisher = StatusPublisher::<FirmwareInstant>::new();
        let mut deadline = Instant::from_millis(0);
        for tick in 0..10u64 {
            let lock_delay = if tick % 2 == 0 { 5 } else { 0 };
            let now = deadline + embassy_time::Duration::from_millis(lock_delay);
            assert!(
                publisher.poll(deadline.into(), levels).is_some(),
                "tick {tick} skipped"
            );
            deadline = next_deadline(deadline, interval, now);
        }
        assert_eq!(deadline, Instant::from_millis(330));
    }

    #[test]
    fn missed_slots_resync_instead_of_bursting() {
        let interval = embassy_time::Duration::from_millis(33);
        assert_eq!(
            next_deadline(Instant::from_millis(0), interval, Instant::from_millis(200)),
            Instant::from_millis(200)
        );
        assert_eq!(
            next_deadline(Instant::from_millis(200), interval, Instant::from_millis(201)),
            Instant::from_millis(233)
        );
    }
}
