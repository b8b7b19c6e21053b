//! Abstractions over the front panel and the analog outputs.
//!
//! The engine reads controls and drives outputs exclusively through [`Panel`], so the same logic runs against real
//! peripherals in firmware and against a recording double in tests.

/// Continuous controls, each read as an 8-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pot {
    /// Gate length in clock ticks.
    GateTime,
    /// Internal tempo, or the clock division when the clock is external.
    ClockSpeed,
    /// Number of motion steps played before wrapping.
    PlayLength,
    /// Pattern selection.
    PatternType,
    /// Transposition of pitch output and bias of X/Y output.
    OutputOffset,
}

/// Two-position controls and logic inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Switch {
    /// On selects the internal clock.
    ClockSource,
    /// On plays forward.
    Direction,
    /// On selects major tables.
    Tonality,
    /// On selects the four octave tables.
    Span,
    /// On selects CV/gate output.
    OutputMode,
    /// The direction CV input, high inverts the direction.
    DirectionInput,
    /// The reset CV input.
    ResetInput,
    /// The push switch of the motion encoder, which also resets the song.
    EncoderSwitch,
}

/// One of the two 12-bit analog outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputChannel {
    /// Pitch in CV mode, X level in X/Y mode.
    One,
    /// Gate in CV mode, Y level in X/Y mode.
    Two,
}

/// Display layers of the 8×8 LED grid, drawn bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Layer {
    /// The active pattern.
    Background,
    /// The playing "ball".
    Foreground,
    /// Transient popups, shown until they time out.
    Overlay,
}

/// Number of rows on the LED grid.
pub const GRID_ROWS: u8 = 8;

/// How long a popup stays on screen, in timer ticks.
pub const POPUP_TICKS: u16 = 300;

/// Hardware collaborator for controls, analog outputs and the LED grid.
pub trait Panel {
    /// Returns the current reading of a pot.
    fn pot(&mut self, pot: Pot) -> u8;

    /// Returns true when a switch is on (or an input is high).
    fn switch(&mut self, switch: Switch) -> bool;

    /// Returns and clears the encoder movement since the last call.
    fn encoder_delta(&mut self) -> i8;

    /// Sets the code of an analog output.
    fn set_output(&mut self, channel: OutputChannel, code: u16);

    /// Replaces one row of a display layer. Bit `n` lights column `n`.
    fn draw_row(&mut self, layer: Layer, row: u8, bits: u8);

    /// Clears every row of a display layer.
    fn clear_layer(&mut self, layer: Layer);

    /// Shows the overlay layer for the given number of timer ticks.
    fn show_overlay(&mut self, ticks: u16);

    /// Shows a numeric popup for the given number of timer ticks.
    fn show_number(&mut self, value: u8, ticks: u16);

    /// Turns the clock LED on or off.
    fn set_clock_led(&mut self, on: bool);
}
