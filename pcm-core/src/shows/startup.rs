//! Power-on show across all eight channels: wave, pulse, alternation, spiral
//! and a closing flash.

use super::{ShowKind, ShowPhase, ShowStep, ShowTemplate};
use crate::lights::ChannelMask;

const ALL: ChannelMask = ChannelMask::ALL;
const ODD: ChannelMask = ChannelMask::from_bits(0x55);
const EVEN: ChannelMask = ChannelMask::from_bits(0xAA);

/// Pause between sections.
pub const SECTION_GAP_MS: u64 = 300;

const fn solo(channel: u8, hold_ms: u64) -> ShowStep {
    ShowStep::pattern(ALL, ChannelMask::single(channel), hold_ms)
}

// Channels below `count` lit.
const fn lower(count: u8, hold_ms: u64) -> ShowStep {
    let bits = if count >= 8 {
        0xFF
    } else {
        (1u8 << count) - 1
    };
    ShowStep::pattern(ALL, ChannelMask::from_bits(bits), hold_ms)
}

const BLANK: [ShowStep; 1] = [ShowStep::off(ALL, 500)];
const GAP: [ShowStep; 1] = [ShowStep::off(ALL, SECTION_GAP_MS)];

const WAVE: [ShowStep; 8] = [
    solo(0, 100),
    solo(1, 100),
    solo(2, 100),
    solo(3, 100),
    solo(4, 100),
    solo(5, 100),
    solo(6, 100),
    solo(7, 100),
];

const PULSE: [ShowStep; 2] = [
    ShowStep::ramp(ALL, 0, 255, 25, 30),
    ShowStep::ramp(ALL, 255, 0, 25, 30),
];

const ALTERNATE: [ShowStep; 3] = [
    ShowStep::pattern(ALL, ODD, 200),
    ShowStep::pattern(ALL, EVEN, 200),
    ShowStep::off(ALL, 100),
];

const SPIRAL: [ShowStep; 18] = [
    lower(1, 80),
    lower(2, 80),
    lower(3, 80),
    lower(4, 80),
    lower(5, 80),
    lower(6, 80),
    lower(7, 80),
    lower(8, 80),
    lower(8, 200),
    lower(7, 80),
    lower(6, 80),
    lower(5, 80),
    lower(4, 80),
    lower(3, 80),
    lower(2, 80),
    lower(1, 80),
    lower(0, 80),
    lower(0, 200),
];

const FLASH: [ShowStep; 2] = [ShowStep::pattern(ALL, ALL, 200), ShowStep::off(ALL, 200)];

const FINISH: [ShowStep; 1] = [ShowStep::off(ALL, 0)];

const PHASES: [ShowPhase; 11] = [
    ShowPhase::once(&BLANK),
    ShowPhase::new(&WAVE, 3),
    ShowPhase::once(&GAP),
    ShowPhase::new(&PULSE, 4),
    ShowPhase::once(&GAP),
    ShowPhase::new(&ALTERNATE, 5),
    ShowPhase::once(&GAP),
    ShowPhase::new(&SPIRAL, 3),
    ShowPhase::once(&GAP),
    ShowPhase::new(&FLASH, 8),
    ShowPhase::once(&FINISH),
];

pub const STARTUP_TEMPLATE: ShowTemplate = ShowTemplate::new(ShowKind::Startup, &PHASES);

#[must_use]
pub const fn startup_template() -> ShowTemplate {
    STARTUP_TEMPLATE
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[test]
    fn startup_show_runs_about_half_a_minute() {
        let duration = startup_template().duration();
        assert!(duration > Duration::from_secs(15), "{duration:?}");
        assert!(duration < Duration::from_secs(35), "{duration:?}");
    }

    #[test]
    fn spiral_fills_then_drains() {
        assert_eq!(
            SPIRAL[7],
            ShowStep::pattern(ALL, ChannelMask::ALL, 80),
            "eighth spiral step lights every channel"
        );
        assert!(matches!(
            SPIRAL[16],
            ShowStep::Pattern { lit, .. } if lit == ChannelMask::EMPTY
        ));
    }
}
