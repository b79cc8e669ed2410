//! Seasonal melody played as channel patterns, one light group per pitch.
//!
//! Tempo is roughly 150 BPM. Lower pitches sit on the left channels.

use super::{ShowKind, ShowPhase, ShowStep, ShowTemplate};
use crate::lights::ChannelMask;

pub const QUARTER_MS: u64 = 280;
pub const EIGHTH_MS: u64 = 140;
pub const HALF_MS: u64 = 560;
pub const DOTTED_QUARTER_MS: u64 = 420;
pub const WHOLE_MS: u64 = 1_120;

pub const NOTE_C: ChannelMask = ChannelMask::from_bits(0x01);
pub const NOTE_D: ChannelMask = ChannelMask::from_bits(0x06);
pub const NOTE_E: ChannelMask = ChannelMask::from_bits(0x18);
pub const NOTE_F: ChannelMask = ChannelMask::from_bits(0x60);
pub const NOTE_G: ChannelMask = ChannelMask::from_bits(0x80);
pub const NOTE_ALL: ChannelMask = ChannelMask::ALL;

const fn q(lit: ChannelMask) -> ShowStep {
    ShowStep::note(lit, QUARTER_MS)
}

const fn h(lit: ChannelMask) -> ShowStep {
    ShowStep::note(lit, HALF_MS)
}

const INTRO: [ShowStep; 1] = [ShowStep::off(ChannelMask::ALL, 500)];

const CHORUS: [ShowStep; 11] = [
    q(NOTE_E),
    q(NOTE_E),
    h(NOTE_E),
    q(NOTE_E),
    q(NOTE_E),
    h(NOTE_E),
    q(NOTE_E),
    q(NOTE_G),
    ShowStep::note(NOTE_C, DOTTED_QUARTER_MS),
    ShowStep::note(NOTE_D, EIGHTH_MS),
    ShowStep::note(NOTE_E, WHOLE_MS),
];

const VERSE: [ShowStep; 14] = [
    q(NOTE_F),
    q(NOTE_F),
    ShowStep::note(NOTE_F, DOTTED_QUARTER_MS),
    ShowStep::note(NOTE_F, EIGHTH_MS),
    q(NOTE_F),
    q(NOTE_E),
    q(NOTE_E),
    q(NOTE_E),
    q(NOTE_E),
    q(NOTE_D),
    q(NOTE_D),
    q(NOTE_E),
    h(NOTE_D),
    h(NOTE_G),
];

const CLOSING: [ShowStep; 9] = [
    q(NOTE_F),
    q(NOTE_F),
    q(NOTE_F),
    q(NOTE_F),
    q(NOTE_G),
    q(NOTE_G),
    q(NOTE_F),
    q(NOTE_D),
    ShowStep::note(NOTE_ALL, WHOLE_MS),
];

const FINALE: [ShowStep; 5] = [
    ShowStep::off(ChannelMask::ALL, 200),
    ShowStep::note(NOTE_ALL, 300),
    ShowStep::off(ChannelMask::ALL, 100),
    ShowStep::note(NOTE_ALL, 300),
    ShowStep::off(ChannelMask::ALL, 0),
];

const PHASES: [ShowPhase; 6] = [
    ShowPhase::once(&INTRO),
    ShowPhase::once(&CHORUS),
    ShowPhase::once(&VERSE),
    ShowPhase::once(&CHORUS),
    ShowPhase::once(&CLOSING),
    ShowPhase::once(&FINALE),
];

pub const MELODY_TEMPLATE: ShowTemplate = ShowTemplate::new(ShowKind::Melody, &PHASES);

#[must_use]
pub const fn melody_template() -> ShowTemplate {
    MELODY_TEMPLATE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shows::ARTICULATION_GAP;

    #[test]
    fn notes_leave_an_articulation_gap() {
        let mut cursor = melody_template().cursor();
        let intro = cursor.next().expect("intro");
        assert_eq!(intro.lit, ChannelMask::EMPTY);

        let first = cursor.next().expect("first note");
        assert_eq!(first.lit, NOTE_E);
        assert_eq!(first.hold.as_millis(), u128::from(QUARTER_MS) - 30);

        let gap = cursor.next().expect("gap");
        assert_eq!(gap.lit, ChannelMask::EMPTY);
        assert_eq!(gap.hold, ARTICULATION_GAP);
    }

    #[test]
    fn pitch_masks_do_not_overlap() {
        let masks = [NOTE_C, NOTE_D, NOTE_E, NOTE_F, NOTE_G];
        let combined = masks.iter().fold(0u8, |acc, mask| {
            assert_eq!(acc & mask.bits(), 0);
            acc | mask.bits()
        });
        assert_eq!(combined, 0xFF);
    }
}
