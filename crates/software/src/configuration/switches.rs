//! Two-position panel switches, each given a name for what its positions mean.

/// Selects the output mode of the two analog channels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    /// Channel 1 carries pitch, channel 2 carries the gate.
    #[default]
    CvGate,
    /// Channel 1 carries the visited column's level, channel 2 the visited row's level.
    XY,
}

impl OutputMode {
    /// Interprets the output mode switch.
    pub fn from_switch(on: bool) -> Self {
        if on { Self::CvGate } else { Self::XY }
    }
}

/// Direction of travel through a motion.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Steps count up.
    #[default]
    Forward,
    /// Steps count down.
    Backward,
}

impl Direction {
    /// Combines the direction switch with the direction CV input and the MIDI direction flip.
    ///
    /// Each source toggles the direction, so any two of them cancel out.
    pub fn resolve(switch: bool, input: bool, midi_reverse: bool) -> Self {
        if switch ^ input ^ midi_reverse {
            Self::Forward
        } else {
            Self::Backward
        }
    }
}

/// Selects the minor or major set of scale tables.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tonality {
    /// Minor tables.
    Minor,
    /// Major tables.
    #[default]
    Major,
}

impl Tonality {
    /// Interprets the tonality switch.
    pub fn from_switch(on: bool) -> Self {
        if on { Self::Major } else { Self::Minor }
    }
}

/// Selects how many octaves a scale table covers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Span {
    /// Two octaves.
    Small,
    /// Four octaves.
    #[default]
    Large,
}

impl Span {
    /// Interprets the span switch.
    pub fn from_switch(on: bool) -> Self {
        if on { Self::Large } else { Self::Small }
    }
}
