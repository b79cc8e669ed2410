//! Interior show on channels 5 to 8: a full fade up and down followed by a
//! back-and-forth chase.

use super::{ShowKind, ShowPhase, ShowStep, ShowTemplate};
use crate::lights::ChannelMask;

/// Channels driven by the interior show.
pub const INTERIOR_GROUP: ChannelMask = ChannelMask::from_bits(0xF0);
/// Hold per ramp level.
pub const INTERIOR_RAMP_STEP_MS: u64 = 10;
/// Hold per chase position.
pub const INTERIOR_CHASE_STEP_MS: u64 = 60;
/// Number of chase sweeps.
pub const INTERIOR_CHASE_REPEATS: u16 = 31;

const fn chase(channel: u8) -> ShowStep {
    ShowStep::pattern(
        INTERIOR_GROUP,
        ChannelMask::single(channel),
        INTERIOR_CHASE_STEP_MS,
    )
}

const FADE: [ShowStep; 3] = [
    ShowStep::off(INTERIOR_GROUP, 0),
    ShowStep::ramp(INTERIOR_GROUP, 0, 255, 1, INTERIOR_RAMP_STEP_MS),
    ShowStep::ramp(INTERIOR_GROUP, 255, 0, 1, INTERIOR_RAMP_STEP_MS),
];

const CHASE: [ShowStep; 7] = [
    chase(7),
    chase(6),
    chase(5),
    chase(4),
    chase(5),
    chase(6),
    chase(7),
];

const FINISH: [ShowStep; 1] = [ShowStep::off(INTERIOR_GROUP, 0)];

const PHASES: [ShowPhase; 3] = [
    ShowPhase::once(&FADE),
    ShowPhase::new(&CHASE, INTERIOR_CHASE_REPEATS),
    ShowPhase::once(&FINISH),
];

pub const INTERIOR_TEMPLATE: ShowTemplate = ShowTemplate::new(ShowKind::Interior, &PHASES);

#[must_use]
pub const fn interior_template() -> ShowTemplate {
    INTERIOR_TEMPLATE
}
