use measurements::Voltage;

/// Largest code accepted by the 12-bit DACs.
pub const DAC_MAX: u16 = 0x0FFF;

/// Velocity of every note this device transmits.
pub const NOTE_VELOCITY: u8 = 100;

/// Describes how musical values become DAC codes on a particular family of analog hardware.
///
/// The output stage inverts, so larger codes produce lower voltages. Two profiles are provided:
/// [`OutputProfile::eurorack`] (±5 V pitch, 2047 gate-off) and [`OutputProfile::buchla`] (0–10 V pitch, pulsed gate
/// with a sustain level).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputProfile {
    /// Code for the lowest X/Y output level.
    pub dac_floor: u16,
    /// Gate channel code while a note sounds.
    pub gate_on: u16,
    /// Gate channel code while no note sounds.
    pub gate_off: u16,
    /// When set, the gate falls from [`OutputProfile::gate_on`] to a sustain level after a short pulse.
    pub gate_sustain: Option<GateSustain>,
    /// The MIDI note whose pitch output is 0 V.
    pub reference_note: u8,
    /// Code which produces 0 V on the pitch channel.
    pub zero_volt_code: u16,
    /// Codes spanned by one volt on either channel.
    pub codes_per_volt: f64,
    /// Pitch scaling of the attached oscillators.
    pub voltage_per_octave: Voltage,
    /// Scale note which, with no offset, lands on [`OutputProfile::reference_note`].
    pub note_center: u8,
    /// Right shift applied to the output offset pot.
    pub offset_shift: u8,
    /// Left shift applied to the output offset when adding it to an X/Y level.
    pub xy_offset_shift: u8,
}

/// A gate which pulses high and then settles on a sustain level until released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GateSustain {
    /// Length of the pulse in timer ticks.
    pub pulse_ticks: u8,
    /// Code held for the remainder of the note.
    pub level: u16,
}

impl OutputProfile {
    /// Eurorack levels: 1 V/octave around middle C, gate swings between 0 V and +5 V.
    pub fn eurorack() -> Self {
        Self {
            dac_floor: 4080,
            gate_on: 0,
            gate_off: 2047,
            gate_sustain: None,
            reference_note: 60,
            zero_volt_code: 2040,
            codes_per_volt: 408.0,
            voltage_per_octave: Voltage::from_volts(1.0),
            note_center: 32,
            offset_shift: 2,
            xy_offset_shift: 1,
        }
    }

    /// Buchla levels: pitch rises from 0 V at the bottom of the MIDI range and the gate pulses before it sustains.
    pub fn buchla() -> Self {
        Self {
            dac_floor: 4085,
            gate_on: 0,
            gate_off: 4085,
            gate_sustain: Some(GateSustain {
                pulse_ticks: 4,
                level: 1935,
            }),
            reference_note: 0,
            zero_volt_code: 4085,
            codes_per_volt: 430.0,
            voltage_per_octave: Voltage::from_volts(1.0),
            note_center: 16,
            offset_shift: 3,
            xy_offset_shift: 2,
        }
    }

    fn voltage_per_half_step(&self) -> Voltage {
        self.voltage_per_octave / 12.0
    }

    /// Returns the pitch [`Voltage`] of a MIDI note number.
    pub fn voltage(&self, note: u8) -> Voltage {
        let nth_key = i16::from(note) - i16::from(self.reference_note);
        f64::from(nth_key) * self.voltage_per_half_step()
    }

    /// Converts a [`Voltage`] to the nearest code the pitch channel can express.
    pub fn code(&self, voltage: Voltage) -> u16 {
        let code = f64::from(self.zero_volt_code) - voltage.as_volts() * self.codes_per_volt;

        if code <= 0.0 {
            0
        } else if code >= f64::from(DAC_MAX) {
            DAC_MAX
        } else {
            // no_std has no f64::round
            (code + 0.5) as u16
        }
    }

    /// Builds the lookup table from MIDI note number to pitch channel code.
    pub fn note_codes(&self) -> [u16; 128] {
        core::array::from_fn(|note| self.code(self.voltage(note as u8)))
    }

    /// Scales a raw output offset pot reading to the offset applied to notes and X/Y levels.
    pub fn output_offset(&self, pot: u8) -> u8 {
        pot >> self.offset_shift
    }

    /// Transposes a scale note by the output offset and the MIDI base note bias, clamped to the MIDI note range.
    pub fn transpose(&self, scale_note: u8, offset: u8, bias: i8) -> u8 {
        let note = i16::from(scale_note) + i16::from(offset) - i16::from(self.note_center) + i16::from(bias);
        note.clamp(0, 127) as u8
    }

    /// Shifts an X/Y table value by the output offset, clamped to a 7-bit level.
    pub fn xy_level(&self, value: u8, offset: u8) -> u8 {
        let level = i16::from(value) + (i16::from(offset) << self.xy_offset_shift) - 64;
        level.clamp(0, 127) as u8
    }

    /// Returns the DAC code for a 7-bit X/Y level.
    pub fn level_code(&self, level: u8) -> u16 {
        self.dac_floor.saturating_sub(u16::from(level & 0x7F) << 5)
    }
}
