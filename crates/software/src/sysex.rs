//! Live updates of the stored tables, carried by first-party system exclusive messages.
//!
//! Every update shares the layout `00 01 72 <device type> <command> <index> <payload…>`. Malformed updates (wrong
//! length, index out of range) are dropped without touching storage.

use crate::configuration::{Span, Tonality};
use crate::sequencer::{
    END_OF_MOTION, MOTION_LEN, PATTERN_COUNT, PATTERN_NIBBLES, Pattern, SCALE_DEGREES, STORED_MOTIONS,
    notes_from_degrees, reduce_degree, xy_from_degrees,
};
use crate::storage::{Storage, Tables};

/// Replaces a pattern.
pub const UPDATE_PATTERN: u8 = 0x02;

/// Replaces a stored motion.
pub const UPDATE_MOTION: u8 = 0x03;

/// Replaces the scale tables of one tonality.
pub const UPDATE_SCALE: u8 = 0x04;

const COMMAND: usize = 4;
const INDEX: usize = 5;
const PAYLOAD: usize = 6;

/// Motion payload value which marks the end of the motion.
const PAYLOAD_END_OF_MOTION: u8 = 0x7F;

/// A validated table update.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableUpdate {
    /// A new pattern for slot `index`.
    Pattern {
        /// Slot, below [`PATTERN_COUNT`].
        index: u8,
        /// Replacement rows.
        pattern: Pattern,
    },
    /// A new motion for slot `index`.
    Motion {
        /// Slot, below [`STORED_MOTIONS`].
        index: u8,
        /// Replacement entries.
        steps: [u8; MOTION_LEN],
    },
    /// New degrees for both spans of a tonality.
    Scale {
        /// Which set of tables to replace.
        tonality: Tonality,
        /// Semitone offsets within the octave, each 0 to 12.
        degrees: [u8; SCALE_DEGREES],
    },
}

impl TableUpdate {
    /// Validates a system exclusive body (without its start and end bytes).
    pub fn parse(data: &[u8]) -> Option<Self> {
        let command = *data.get(COMMAND)?;
        let index = data.get(INDEX).copied();
        let payload = data.get(PAYLOAD..)?;

        let update = match command {
            UPDATE_PATTERN if payload.len() == PATTERN_NIBBLES => Self::Pattern {
                index: index.filter(|&index| index < PATTERN_COUNT)?,
                pattern: Pattern::from_nibbles(payload)?,
            },
            UPDATE_MOTION if payload.len() == MOTION_LEN => {
                let mut steps: [u8; MOTION_LEN] = core::array::from_fn(|i| match payload[i] & 0x7F {
                    PAYLOAD_END_OF_MOTION => END_OF_MOTION,
                    step => step,
                });
                // a motion must have at least one entry
                if steps[0] == END_OF_MOTION {
                    steps[0] = 0;
                }
                Self::Motion {
                    index: index.filter(|&index| index < STORED_MOTIONS)?,
                    steps,
                }
            }
            UPDATE_SCALE if payload.len() == SCALE_DEGREES => Self::Scale {
                tonality: match index? {
                    0 => Tonality::Minor,
                    1 => Tonality::Major,
                    _ => return None,
                },
                degrees: core::array::from_fn(|i| reduce_degree(payload[i])),
            },
            _ => return None,
        };
        Some(update)
    }

    /// Writes the update to storage. The caller reloads whatever the sequencer is using.
    pub fn apply<S: Storage>(&self, tables: &mut Tables<S>) {
        match self {
            Self::Pattern { index, pattern } => tables.write_pattern(*index, pattern),
            Self::Motion { index, steps } => tables.write_motion(*index, steps),
            Self::Scale { tonality, degrees } => {
                for span in [Span::Small, Span::Large] {
                    tables.write_scale_notes(*tonality, span, &notes_from_degrees(degrees, span));
                    tables.write_xy(*tonality, span, &xy_from_degrees(degrees, *tonality, span));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::Scale;
    use crate::storage::MemoryStorage;

    fn message(command: u8, index: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0x00, 0x01, 0x72, 0x41, command, index];
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn too_short() {
        assert_eq!(None, TableUpdate::parse(&[0x00, 0x01, 0x72, 0x41]));
        assert_eq!(None, TableUpdate::parse(&[0x00, 0x01, 0x72, 0x41, UPDATE_PATTERN]));
    }

    #[test]
    fn wrong_lengths() {
        assert_eq!(None, TableUpdate::parse(&message(UPDATE_PATTERN, 0, &[0; 15])));
        assert_eq!(None, TableUpdate::parse(&message(UPDATE_MOTION, 0, &[0; 65])));
        assert_eq!(None, TableUpdate::parse(&message(UPDATE_SCALE, 0, &[0; 7])));
        assert_eq!(None, TableUpdate::parse(&message(0x05, 0, &[0; 16])));
    }

    #[test]
    fn indices_out_of_range() {
        assert_eq!(None, TableUpdate::parse(&message(UPDATE_PATTERN, 32, &[0; 16])));
        assert_eq!(None, TableUpdate::parse(&message(UPDATE_MOTION, 48, &[0; 64])));
        assert_eq!(None, TableUpdate::parse(&message(UPDATE_SCALE, 2, &[0; 8])));
    }

    #[test]
    fn pattern() {
        let mut payload = [0; 16];
        payload[0] = 0x3;
        payload[1] = 0xA;
        match TableUpdate::parse(&message(UPDATE_PATTERN, 31, &payload)) {
            Some(TableUpdate::Pattern { index, pattern }) => {
                assert_eq!(31, index, "Expected left but right");
                assert_eq!(0x3A, pattern.rows()[0], "Expected left but right");
            }
            other => panic!("Expected a pattern update but got {other:?}"),
        }
    }

    #[test]
    fn motion_end_markers() {
        let mut payload = [0x12; 64];
        payload[0] = 0x7F;
        payload[5] = 0x7F;
        payload[6] = 0xFF;
        match TableUpdate::parse(&message(UPDATE_MOTION, 47, &payload)) {
            Some(TableUpdate::Motion { index, steps }) => {
                assert_eq!(47, index, "Expected left but right");
                assert_eq!(0x00, steps[0], "Expected left but right");
                assert_eq!(0x12, steps[1], "Expected left but right");
                assert_eq!(0xFF, steps[5], "Expected left but right");
                assert_eq!(0xFF, steps[6], "Expected left but right");
            }
            other => panic!("Expected a motion update but got {other:?}"),
        }
    }

    #[test]
    fn scale_degrees_wrap() {
        let payload = [0, 2, 3, 5, 7, 8, 10, 13];
        match TableUpdate::parse(&message(UPDATE_SCALE, 0, &payload)) {
            Some(TableUpdate::Scale { tonality, degrees }) => {
                assert_eq!(Tonality::Minor, tonality);
                assert_eq!([0, 2, 3, 5, 7, 8, 10, 1], degrees, "Expected left but right");
            }
            other => panic!("Expected a scale update but got {other:?}"),
        }
    }

    #[test]
    fn scale_writes_both_spans() {
        let mut tables = Tables::new(MemoryStorage::factory());
        let update = TableUpdate::parse(&message(UPDATE_SCALE, 1, &[0, 1, 2, 3, 4, 5, 6, 7])).unwrap();
        update.apply(&mut tables);

        let small = tables.scale(Tonality::Major, Span::Small);
        assert_eq!(
            &[60, 61, 62, 63, 64, 65, 66, 67],
            &small.notes()[..8],
            "Expected left but right"
        );
        assert_eq!(72, small.note(8), "Expected left but right");

        let large = tables.scale(Tonality::Major, Span::Large);
        assert_eq!(48, large.note(0), "Expected left but right");
        assert_eq!(91, large.note(31), "Expected left but right");
        assert_eq!(
            Scale::factory(Tonality::Minor, Span::Small),
            tables.scale(Tonality::Minor, Span::Small),
            "Minor tables must be untouched"
        );
    }
}
