//! Decorative light shows shared by firmware and host targets.
//!
//! A show is a static [`ShowTemplate`]: an ordered list of phases, each a
//! short list of [`ShowStep`]s repeated a fixed number of times. The
//! [`ShowCursor`] flattens a template into [`ShowFrame`]s that the platform
//! applies to the PWM outputs before waiting out the frame's hold time.
//! Shows write the outputs directly and never touch the light bank.

use core::fmt;
use core::time::Duration;

use crate::lights::{ChannelIndex, ChannelMask, LEVEL_OFF, LEVEL_ON};

pub mod exterior;
pub mod interior;
pub mod melody;
pub mod startup;

pub use exterior::{EXTERIOR_TEMPLATE, exterior_template};
pub use interior::{INTERIOR_TEMPLATE, interior_template};
pub use melody::{MELODY_TEMPLATE, melody_template};
pub use startup::{STARTUP_TEMPLATE, startup_template};

/// Bus identifier carrying sequence triggers.
pub const SEQUENCE_TRIGGER_FRAME_ID: u32 = 30;
/// Pause inserted after every note longer than [`ARTICULATION_THRESHOLD`].
pub const ARTICULATION_GAP: Duration = Duration::from_millis(30);
/// Notes at or below this length are played without a gap.
pub const ARTICULATION_THRESHOLD: Duration = Duration::from_millis(40);

/// Shows known to the module.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShowKind {
    Interior,
    Exterior,
    Startup,
    Melody,
}

impl ShowKind {
    /// Maps a bus sequence id to a show. Only 0 and 1 are addressable.
    #[must_use]
    pub const fn from_sequence_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(ShowKind::Interior),
            1 => Some(ShowKind::Exterior),
            _ => None,
        }
    }

    #[must_use]
    pub const fn template(self) -> ShowTemplate {
        match self {
            ShowKind::Interior => INTERIOR_TEMPLATE,
            ShowKind::Exterior => EXTERIOR_TEMPLATE,
            ShowKind::Startup => STARTUP_TEMPLATE,
            ShowKind::Melody => MELODY_TEMPLATE,
        }
    }
}

impl fmt::Display for ShowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShowKind::Interior => "interior",
            ShowKind::Exterior => "exterior",
            ShowKind::Startup => "startup",
            ShowKind::Melody => "melody",
        })
    }
}

/// Collaborator that starts shows; returns `false` when the request was refused.
pub trait SequenceTrigger {
    fn trigger(&mut self, show: ShowKind) -> bool;
}

/// Sequence trigger that refuses every request.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSequenceTrigger;

impl SequenceTrigger for NoopSequenceTrigger {
    fn trigger(&mut self, _: ShowKind) -> bool {
        false
    }
}

/// One scripted action.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShowStep {
    /// Drive `lit` at `level` and the rest of `group` off, then hold.
    Pattern {
        group: ChannelMask,
        lit: ChannelMask,
        level: u8,
        hold: Duration,
    },
    /// Sweep every channel of `group` from `from` towards `to` in `step` increments.
    Ramp {
        group: ChannelMask,
        from: u8,
        to: u8,
        step: u8,
        hold: Duration,
    },
    /// Light `lit` across all channels for `duration`, with a short trailing gap.
    Note { lit: ChannelMask, duration: Duration },
}

impl ShowStep {
    #[must_use]
    pub const fn pattern(group: ChannelMask, lit: ChannelMask, hold_ms: u64) -> Self {
        ShowStep::Pattern {
            group,
            lit,
            level: LEVEL_ON,
            hold: Duration::from_millis(hold_ms),
        }
    }

    /// Switches `group` off and holds.
    #[must_use]
    pub const fn off(group: ChannelMask, hold_ms: u64) -> Self {
        ShowStep::Pattern {
            group,
            lit: ChannelMask::EMPTY,
            level: LEVEL_OFF,
            hold: Duration::from_millis(hold_ms),
        }
    }

    #[must_use]
    pub const fn ramp(group: ChannelMask, from: u8, to: u8, step: u8, hold_ms: u64) -> Self {
        ShowStep::Ramp {
            group,
            from,
            to,
            step,
            hold: Duration::from_millis(hold_ms),
        }
    }

    #[must_use]
    pub const fn note(lit: ChannelMask, duration_ms: u64) -> Self {
        ShowStep::Note {
            lit,
            duration: Duration::from_millis(duration_ms),
        }
    }
}

/// Steps played `repeat` times in a row.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ShowPhase {
    pub steps: &'static [ShowStep],
    pub repeat: u16,
}

impl ShowPhase {
    #[must_use]
    pub const fn new(steps: &'static [ShowStep], repeat: u16) -> Self {
        Self { steps, repeat }
    }

    #[must_use]
    pub const fn once(steps: &'static [ShowStep]) -> Self {
        Self::new(steps, 1)
    }
}

/// Immutable show script.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ShowTemplate {
    pub kind: ShowKind,
    pub phases: &'static [ShowPhase],
}

impl ShowTemplate {
    #[must_use]
    pub const fn new(kind: ShowKind, phases: &'static [ShowPhase]) -> Self {
        Self { kind, phases }
    }

    /// Iterates the frames of the show in playback order.
    #[must_use]
    pub const fn cursor(self) -> ShowCursor {
        ShowCursor::new(self)
    }

    /// Total playback time.
    #[must_use]
    pub fn duration(self) -> Duration {
        self.cursor().map(|frame| frame.hold).sum()
    }
}

/// Output levels to apply, followed by a wait of `hold`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ShowFrame {
    pub group: ChannelMask,
    pub lit: ChannelMask,
    pub level: u8,
    pub hold: Duration,
}

impl ShowFrame {
    /// Level for `channel`, or `None` when the frame leaves it untouched.
    #[must_use]
    pub const fn level_for(&self, channel: ChannelIndex) -> Option<u8> {
        if self.lit.contains(channel) {
            Some(self.level)
        } else if self.group.contains(channel) {
            Some(LEVEL_OFF)
        } else {
            None
        }
    }

    /// Iterates `(channel, level)` writes for this frame.
    pub fn writes(self) -> impl Iterator<Item = (ChannelIndex, u8)> {
        self.group
            .union(self.lit)
            .channels()
            .filter_map(move |channel| self.level_for(channel).map(|level| (channel, level)))
    }
}

/// Iterator over the frames of a [`ShowTemplate`].
#[derive(Copy, Clone, Debug)]
pub struct ShowCursor {
    template: ShowTemplate,
    phase: usize,
    repetition: u16,
    step: usize,
    // Ramp level or note stage within the current step.
    sub: Option<u8>,
}

impl ShowCursor {
    #[must_use]
    pub const fn new(template: ShowTemplate) -> Self {
        Self {
            template,
            phase: 0,
            repetition: 0,
            step: 0,
            sub: None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ShowKind {
        self.template.kind
    }

    fn advance_step(&mut self) {
        self.sub = None;
        self.step += 1;
        let Some(phase) = self.template.phases.get(self.phase) else {
            return;
        };
        if self.step < phase.steps.len() {
            return;
        }
        self.step = 0;
        self.repetition += 1;
        if self.repetition < phase.repeat {
            return;
        }
        self.repetition = 0;
        self.phase += 1;
    }

    fn current_step(&mut self) -> Option<ShowStep> {
        loop {
            let phase = self.template.phases.get(self.phase)?;
            if phase.repeat == 0 || phase.steps.is_empty() {
                self.phase += 1;
                self.step = 0;
                self.repetition = 0;
                continue;
            }
            return phase.steps.get(self.step).copied();
        }
    }
}

impl Iterator for ShowCursor {
    type Item = ShowFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let step = self.current_step()?;
        let frame = match step {
            ShowStep::Pattern {
                group,
                lit,
                level,
                hold,
            } => {
                self.advance_step();
                ShowFrame {
                    group,
                    lit,
                    level,
                    hold,
                }
            }
            ShowStep::Ramp {
                group,
                from,
                to,
                step,
                hold,
            } => {
                let level = self.sub.unwrap_or(from);
                let next = if from <= to {
                    level.checked_add(step.max(1)).filter(|next| *next <= to)
                } else {
                    level.checked_sub(step.max(1)).filter(|next| *next >= to)
                };
                match next {
                    Some(next) => self.sub = Some(next),
                    None => self.advance_step(),
                }
                ShowFrame {
                    group,
                    lit: group,
                    level,
                    hold,
                }
            }
            ShowStep::Note { lit, duration } => {
                let articulated = duration > ARTICULATION_THRESHOLD;
                if self.sub.is_none() {
                    self.sub = Some(1);
                    ShowFrame {
                        group: ChannelMask::ALL,
                        lit,
                        level: LEVEL_ON,
                        hold: if articulated {
                            duration.saturating_sub(ARTICULATION_GAP)
                        } else {
                            duration
                        },
                    }
                } else {
                    self.advance_step();
                    ShowFrame {
                        group: ChannelMask::ALL,
                        lit: ChannelMask::EMPTY,
                        level: LEVEL_OFF,
                        hold: if articulated {
                            ARTICULATION_GAP
                        } else {
                            Duration::ZERO
                        },
                    }
                }
            }
        };
        Some(frame)
    }
}
