//! Exterior show on channels 3 and 4: a fade up and down, then alternation.

use super::{ShowKind, ShowPhase, ShowStep, ShowTemplate};
use crate::lights::ChannelMask;

/// Channels driven by the exterior show.
pub const EXTERIOR_GROUP: ChannelMask = ChannelMask::from_bits(0x0C);
pub const EXTERIOR_RAMP_STEP_MS: u64 = 10;
pub const EXTERIOR_ALTERNATE_MS: u64 = 250;
pub const EXTERIOR_ALTERNATE_REPEATS: u16 = 31;

const FADE: [ShowStep; 3] = [
    ShowStep::off(EXTERIOR_GROUP, 0),
    ShowStep::ramp(EXTERIOR_GROUP, 0, 255, 1, EXTERIOR_RAMP_STEP_MS),
    ShowStep::ramp(EXTERIOR_GROUP, 255, 0, 1, EXTERIOR_RAMP_STEP_MS),
];

const ALTERNATE: [ShowStep; 2] = [
    ShowStep::pattern(EXTERIOR_GROUP, ChannelMask::single(2), EXTERIOR_ALTERNATE_MS),
    ShowStep::pattern(EXTERIOR_GROUP, ChannelMask::single(3), EXTERIOR_ALTERNATE_MS),
];

const FINISH: [ShowStep; 1] = [ShowStep::off(EXTERIOR_GROUP, 0)];

const PHASES: [ShowPhase; 3] = [
    ShowPhase::once(&FADE),
    ShowPhase::new(&ALTERNATE, EXTERIOR_ALTERNATE_REPEATS),
    ShowPhase::once(&FINISH),
];

pub const EXTERIOR_TEMPLATE: ShowTemplate = ShowTemplate::new(ShowKind::Exterior, &PHASES);

#[must_use]
pub const fn exterior_template() -> ShowTemplate {
    EXTERIOR_TEMPLATE
}
