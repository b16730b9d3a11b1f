use std::time::Duration;

/// Highest selectable timebase index.
pub const MAX_TIMEBASE: u8 = 6;
pub const DEFAULT_TIMEBASE: u8 = 3;

pub const MIN_TRIGGER_LEVEL: u16 = 128;
pub const MAX_TRIGGER_LEVEL: u16 = 3968;
pub const TRIGGER_LEVEL_STEP: u16 = 256;
pub const DEFAULT_TRIGGER_LEVEL: u16 = 2048;

/// Horizontal scale per timebase index. A sweep spans ten divisions.
const TIME_PER_DIVISION_US: [u64; MAX_TIMEBASE as usize + 1] =
    [5, 10, 50, 100, 1_000, 2_000, 10_000];

pub const DIVISIONS_PER_SWEEP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Ch1,
    Ch2,
}

impl Channel {
    pub const ALL: [Self; 2] = [Self::Ch1, Self::Ch2];

    /// Channel number as the device expects it in a capture command.
    pub fn number(self) -> u8 {
        match self {
            Self::Ch1 => 1,
            Self::Ch2 => 2,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::Ch1),
            2 => Some(Self::Ch2),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Ch1 => 0,
            Self::Ch2 => 1,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CH{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerEdge {
    #[default]
    Rising,
    Falling,
}

impl TriggerEdge {
    pub fn toggled(self) -> Self {
        match self {
            Self::Rising => Self::Falling,
            Self::Falling => Self::Rising,
        }
    }

    pub fn is_rising(self) -> bool {
        self == Self::Rising
    }
}

/// Time covered by one horizontal division at the given timebase index.
///
/// Indices past [`MAX_TIMEBASE`] saturate to the slowest setting.
pub fn time_per_division(timebase: u8) -> Duration {
    let index = usize::from(timebase.min(MAX_TIMEBASE));
    Duration::from_micros(TIME_PER_DIVISION_US[index])
}

/// Acquisition parameters of a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSettings {
    timebase: u8,
    trigger_level: u16,
    trigger_edge: TriggerEdge,
}

impl ChannelSettings {
    /// Fresh settings with the default timebase and a rising edge.
    ///
    /// `trigger_level` is clamped into the range the firmware accepts.
    pub fn new(trigger_level: u16) -> Self {
        Self {
            timebase: DEFAULT_TIMEBASE,
            trigger_level: trigger_level.clamp(MIN_TRIGGER_LEVEL, MAX_TRIGGER_LEVEL),
            trigger_edge: TriggerEdge::Rising,
        }
    }

    pub fn timebase(&self) -> u8 {
        self.timebase
    }

    pub fn trigger_level(&self) -> u16 {
        self.trigger_level
    }

    pub fn trigger_edge(&self) -> TriggerEdge {
        self.trigger_edge
    }

    pub fn increase_timebase(&mut self) {
        if self.timebase < MAX_TIMEBASE {
            self.timebase += 1;
        }
    }

    pub fn decrease_timebase(&mut self) {
        self.timebase = self.timebase.saturating_sub(1);
    }

    pub fn toggle_trigger_edge(&mut self) {
        self.trigger_edge = self.trigger_edge.toggled();
    }

    pub fn set_trigger_edge(&mut self, edge: TriggerEdge) {
        self.trigger_edge = edge;
    }

    /// Raise the level by one step unless that would leave the window.
    pub fn increase_trigger_level(&mut self) {
        if self.trigger_level + TRIGGER_LEVEL_STEP <= MAX_TRIGGER_LEVEL {
            self.trigger_level += TRIGGER_LEVEL_STEP;
        }
    }

    pub fn decrease_trigger_level(&mut self) {
        if self.trigger_level >= MIN_TRIGGER_LEVEL + TRIGGER_LEVEL_STEP {
            self.trigger_level -= TRIGGER_LEVEL_STEP;
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_LEVEL)
    }
}

/// Per-channel settings for both inputs of the scope.
///
/// Every mutator is total: a step that would leave the valid range is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsStore {
    channels: [ChannelSettings; 2],
}

impl SettingsStore {
    pub fn new(trigger_level: u16) -> Self {
        Self {
            channels: [ChannelSettings::new(trigger_level); 2],
        }
    }

    /// Snapshot of one channel's settings.
    pub fn settings(&self, channel: Channel) -> ChannelSettings {
        self.channels[channel.index()]
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut ChannelSettings {
        &mut self.channels[channel.index()]
    }

    pub fn increase_timebase(&mut self, channel: Channel) {
        self.channel_mut(channel).increase_timebase();
    }

    pub fn decrease_timebase(&mut self, channel: Channel) {
        self.channel_mut(channel).decrease_timebase();
    }

    pub fn get_timebase(&self, channel: Channel) -> u8 {
        self.settings(channel).timebase()
    }

    pub fn toggle_trigger_edge(&mut self, channel: Channel) {
        self.channel_mut(channel).toggle_trigger_edge();
    }

    pub fn set_trigger_edge(&mut self, channel: Channel, edge: TriggerEdge) {
        self.channel_mut(channel).set_trigger_edge(edge);
    }

    pub fn get_trigger_edge(&self, channel: Channel) -> TriggerEdge {
        self.settings(channel).trigger_edge()
    }

    pub fn increase_trigger_level(&mut self, channel: Channel) {
        self.channel_mut(channel).increase_trigger_level();
    }

    pub fn decrease_trigger_level(&mut self, channel: Channel) {
        self.channel_mut(channel).decrease_trigger_level();
    }

    pub fn get_trigger_level(&self, channel: Channel) -> u16 {
        self.settings(channel).trigger_level()
    }
}
