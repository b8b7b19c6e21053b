use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Number of clock ticks (at 24 per quarter note) that make up one motion step.
///
/// Variants are ordered the way the clock speed pot selects them when the clock is external: fully counter-clockwise
/// is one step per beat, fully clockwise is one step per tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockDivision {
    /// 24 ticks per step.
    Quarter,
    /// 12 ticks per step.
    Eighth,
    /// 8 ticks per step.
    EighthTriplet,
    /// 6 ticks per step. This is always the division when the internal clock is selected.
    #[default]
    Sixteenth,
    /// 4 ticks per step.
    SixteenthTriplet,
    /// 3 ticks per step.
    ThirtySecond,
    /// 2 ticks per step.
    ThirtySecondTriplet,
    /// Every tick is a step.
    NinetySixth,
}

impl ClockDivision {
    /// Selects a division from the top three bits of a pot value.
    pub fn from_pot(pot: u8) -> Self {
        Self::from_u8(pot >> 5).unwrap_or_default()
    }

    /// Returns the number of ticks per step.
    pub fn ticks(self) -> u8 {
        match self {
            Self::Quarter => 24,
            Self::Eighth => 12,
            Self::EighthTriplet => 8,
            Self::Sixteenth => 6,
            Self::SixteenthTriplet => 4,
            Self::ThirtySecond => 3,
            Self::ThirtySecondTriplet => 2,
            Self::NinetySixth => 1,
        }
    }
}
