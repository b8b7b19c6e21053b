use crate::configuration::{Span, Tonality};

/// Number of scale degrees in a scale-update payload.
pub const SCALE_DEGREES: usize = 8;

/// Number of notes in a scale table, one per grid cell.
pub const SCALE_LEN: usize = 64;

/// Degrees of the factory minor scale, in semitones above the tonic.
pub const MINOR_DEGREES: [u8; SCALE_DEGREES] = [0, 2, 3, 5, 7, 9, 10, 12];

/// Degrees of the factory major scale, in semitones above the tonic.
pub const MAJOR_DEGREES: [u8; SCALE_DEGREES] = [0, 2, 4, 5, 7, 9, 11, 12];

/// Factory X/Y levels, indexed the same way as the scale tables.
pub const FACTORY_XY: [[u8; 8]; 4] = [
    [32, 41, 50, 59, 68, 77, 86, 95],
    [0, 18, 36, 54, 72, 90, 108, 127],
    [95, 86, 77, 68, 59, 50, 41, 32],
    [127, 108, 90, 72, 54, 36, 18, 0],
];

const SMALL_OCTAVES: [u8; 2] = [60, 72];
const LARGE_OCTAVES: [u8; 4] = [48, 60, 72, 84];

/// Returns the storage slot (0 to 3) of a tonality/span combination.
pub fn variant(tonality: Tonality, span: Span) -> usize {
    let tonality = match tonality {
        Tonality::Minor => 0,
        Tonality::Major => 2,
    };
    let span = match span {
        Span::Small => 0,
        Span::Large => 1,
    };
    tonality + span
}

/// The notes and X/Y levels of one tonality/span combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale {
    notes: [u8; SCALE_LEN],
    xy: [u8; 8],
}

impl Default for Scale {
    fn default() -> Self {
        Self::factory(Tonality::default(), Span::default())
    }
}

impl Scale {
    /// Wraps tables read from storage.
    pub fn new(notes: [u8; SCALE_LEN], xy: [u8; 8]) -> Self {
        Self { notes, xy }
    }

    /// Builds the table shipped with the device.
    pub fn factory(tonality: Tonality, span: Span) -> Self {
        let degrees = match tonality {
            Tonality::Minor => MINOR_DEGREES,
            Tonality::Major => MAJOR_DEGREES,
        };
        Self {
            notes: notes_from_degrees(&degrees, span),
            xy: FACTORY_XY[variant(tonality, span)],
        }
    }

    /// Returns the note of a grid cell.
    pub fn note(&self, cell: usize) -> u8 {
        self.notes[cell % SCALE_LEN]
    }

    /// Returns the X/Y level for a row or column index.
    pub fn xy(&self, index: u8) -> u8 {
        self.xy[usize::from(index & 0x07)]
    }

    /// Returns the note table.
    pub fn notes(&self) -> &[u8; SCALE_LEN] {
        &self.notes
    }

    /// Returns the X/Y table.
    pub fn xy_levels(&self) -> &[u8; 8] {
        &self.xy
    }
}

/// Reduces a degree from a scale-update payload to a semitone offset within the octave.
pub fn reduce_degree(degree: u8) -> u8 {
    let degree = degree & 0x0F;
    if degree > 12 { degree - 12 } else { degree }
}

/// Repeats eight degrees across the grid. Each row is one octave: small tables alternate between the octaves at 60
/// and 72, large tables climb through 48, 60, 72 and 84 twice.
pub fn notes_from_degrees(degrees: &[u8; SCALE_DEGREES], span: Span) -> [u8; SCALE_LEN] {
    let octaves: &[u8] = match span {
        Span::Small => &SMALL_OCTAVES,
        Span::Large => &LARGE_OCTAVES,
    };

    core::array::from_fn(|cell| {
        let row = cell / SCALE_DEGREES;
        octaves[row % octaves.len()] + degrees[cell % SCALE_DEGREES]
    })
}

/// Derives X/Y levels from scale degrees. Minor levels rise with the degree, major levels are mirrored so they fall.
pub fn xy_from_degrees(degrees: &[u8; SCALE_DEGREES], tonality: Tonality, span: Span) -> [u8; 8] {
    let level = |degree: u8| -> u8 {
        let degree = u16::from(degree.min(12));
        match span {
            Span::Small => (32 + 63 * degree / 12) as u8,
            Span::Large => (127 * degree / 12) as u8,
        }
    };

    core::array::from_fn(|i| match tonality {
        Tonality::Minor => level(degrees[i]),
        Tonality::Major => level(degrees[SCALE_DEGREES - 1 - i]),
    })
}
