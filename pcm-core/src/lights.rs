//! Output-intensity model for the eight PWM channels.
//!
//! [`LightBank`] holds the last commanded level for every channel and pushes
//! each mutation to an [`OutputSink`]. Bus payloads are decoded into
//! [`LightCommand`] values first so malformed or out-of-range requests never
//! reach the bank.

use core::fmt;

/// Number of output channels on the module.
pub const CHANNEL_COUNT: usize = 8;
/// Level written when a channel is switched on.
pub const LEVEL_ON: u8 = u8::MAX;
/// Level written when a channel is switched off.
pub const LEVEL_OFF: u8 = 0;

/// Bus identifier carrying brightness commands.
pub const SET_BRIGHTNESS_FRAME_ID: u32 = 21;
/// Bus identifier carrying toggle and group commands.
pub const TOGGLE_FRAME_ID: u32 = 24;

/// Toggle-family selector that switches every channel according to a mode byte.
pub const GROUP_SWITCH: u8 = 8;
/// Toggle-family selector that can only switch every channel on.
pub const GROUP_ON_ONLY: u8 = 9;

/// Zero-based channel index, always below [`CHANNEL_COUNT`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ChannelIndex(u8);

impl ChannelIndex {
    /// Returns the channel for `index`, or `None` when it is out of range.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < CHANNEL_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Iterates every channel in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..CHANNEL_COUNT).filter_map(|index| u8::try_from(index).ok().and_then(Self::new))
    }
}

impl fmt::Display for ChannelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0 + 1)
    }
}

/// Set of channels addressed by a bit per channel (bit 0 = first channel).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ChannelMask(u8);

impl ChannelMask {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(0xFF);

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn single(channel: u8) -> Self {
        Self(1 << (channel & 7))
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, channel: ChannelIndex) -> bool {
        self.0 & (1 << channel.0) != 0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Iterates the channels present in the mask.
    pub fn channels(self) -> impl Iterator<Item = ChannelIndex> {
        ChannelIndex::all().filter(move |channel| self.contains(*channel))
    }
}

/// Sink for PWM output writes.
pub trait OutputSink {
    /// Drives `channel` at `level` (0..=255).
    fn set_intensity(&mut self, channel: ChannelIndex, level: u8);
}

impl<T> OutputSink for &mut T
where
    T: OutputSink + ?Sized,
{
    fn set_intensity(&mut self, channel: ChannelIndex, level: u8) {
        (**self).set_intensity(channel, level);
    }
}

/// Output sink that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopOutputSink;

impl NoopOutputSink {
    /// Creates a new no-op sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl OutputSink for NoopOutputSink {
    fn set_intensity(&mut self, _: ChannelIndex, _: u8) {}
}

/// Command decoded from a toggle-family or set-brightness payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LightCommand {
    Toggle(ChannelIndex),
    SetBrightness(ChannelIndex, u8),
    AllOn,
    AllOff,
    /// Group request that leaves every channel untouched.
    NoOp,
}

impl LightCommand {
    /// Decodes a toggle-family payload (`[channel]`, `[8, mode]`, `[9, mode]`).
    ///
    /// A group selector without its mode byte is treated as mode 0. Selectors
    /// above 9 are ignored.
    #[must_use]
    pub fn decode_toggle(payload: &[u8]) -> Option<Self> {
        let (&selector, rest) = payload.split_first()?;
        let mode = rest.first().copied().unwrap_or(0);
        match selector {
            GROUP_SWITCH if mode == 0 => Some(LightCommand::AllOff),
            GROUP_SWITCH => Some(LightCommand::AllOn),
            GROUP_ON_ONLY if mode == 1 => Some(LightCommand::AllOn),
            GROUP_ON_ONLY => Some(LightCommand::NoOp),
            other => ChannelIndex::new(other).map(LightCommand::Toggle),
        }
    }

    /// Decodes a set-brightness payload (`[channel, level]`).
    #[must_use]
    pub fn decode_brightness(payload: &[u8]) -> Option<Self> {
        match payload {
            [channel, level, ..] => {
                ChannelIndex::new(*channel).map(|channel| LightCommand::SetBrightness(channel, *level))
            }
            _ => None,
        }
    }
}

/// Result of applying a [`LightCommand`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LightUpdate {
    Channel { channel: ChannelIndex, level: u8 },
    AllOn,
    AllOff,
    Unchanged,
}

impl fmt::Display for LightUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightUpdate::Channel { channel, level } => write!(f, "{channel}={level}"),
            LightUpdate::AllOn => f.write_str("all-on"),
            LightUpdate::AllOff => f.write_str("all-off"),
            LightUpdate::Unchanged => f.write_str("unchanged"),
        }
    }
}

/// Last commanded intensity for each channel.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LightBank {
    levels: [u8; CHANNEL_COUNT],
}

impl LightBank {
    /// Creates a bank with every channel off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            levels: [LEVEL_OFF; CHANNEL_COUNT],
        }
    }

    /// Returns the current level of `channel`.
    #[must_use]
    pub const fn level(&self, channel: ChannelIndex) -> u8 {
        self.levels[channel.as_usize()]
    }

    /// Returns a copy of all eight levels.
    #[must_use]
    pub const fn snapshot(&self) -> [u8; CHANNEL_COUNT] {
        self.levels
    }

    /// Switches a lit channel off and a dark channel fully on.
    pub fn toggle<S: OutputSink>(&mut self, channel: ChannelIndex, sink: &mut S) -> u8 {
        let next = if self.level(channel) > LEVEL_OFF {
            LEVEL_OFF
        } else {
            LEVEL_ON
        };
        self.set_brightness(channel, next, sink);
        next
    }

    /// Stores `level` verbatim and writes it out.
    pub fn set_brightness<S: OutputSink>(&mut self, channel: ChannelIndex, level: u8, sink: &mut S) {
        self.levels[channel.as_usize()] = level;
        sink.set_intensity(channel, level);
    }

    pub fn all_on<S: OutputSink>(&mut self, sink: &mut S) {
        self.fill(LEVEL_ON, sink);
    }

    pub fn all_off<S: OutputSink>(&mut self, sink: &mut S) {
        self.fill(LEVEL_OFF, sink);
    }

    /// Re-sends every stored level, e.g. after a show overwrote the outputs.
    pub fn restore<S: OutputSink>(&self, sink: &mut S) {
        for channel in ChannelIndex::all() {
            sink.set_intensity(channel, self.level(channel));
        }
    }

    /// Applies a decoded command.
    pub fn apply<S: OutputSink>(&mut self, command: LightCommand, sink: &mut S) -> LightUpdate {
        match command {
            LightCommand::Toggle(channel) => {
                let level = self.toggle(channel, sink);
                LightUpdate::Channel { channel, level }
            }
            LightCommand::SetBrightness(channel, level) => {
                self.set_brightness(channel, level, sink);
                LightUpdate::Channel { channel, level }
            }
            LightCommand::AllOn => {
                self.all_on(sink);
                LightUpdate::AllOn
            }
            LightCommand::AllOff => {
                self.all_off(sink);
                LightUpdate::AllOff
            }
            LightCommand::NoOp => LightUpdate::Unchanged,
        }
    }

    fn fill<S: OutputSink>(&mut self, level: u8, sink: &mut S) {
        self.levels = [level; CHANNEL_COUNT];
        self.restore(sink);
    }
}
