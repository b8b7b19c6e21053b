use super::{GridPosition, Lfsr};

/// Number of entries in a motion.
pub const MOTION_LEN: usize = 64;

/// Number of motions which may be selected.
pub const MOTION_COUNT: u8 = 64;

/// Number of pre-authored motions held in storage. Higher indices are generated.
pub const STORED_MOTIONS: u8 = 48;

/// Motions from here to [`MOTION_COUNT`] re-seed continuously. Those below (and at or above [`STORED_MOTIONS`])
/// are seeded once.
pub const REPEATING_MOTIONS: u8 = 56;

/// Marks the end of a stored motion. Generated motions never contain it.
pub const END_OF_MOTION: u8 = 0xFF;

/// Row/column masks of the generated motions, selected by the low three bits of the motion index.
pub const RANDOM_MASKS: [u8; 8] = [0x77, 0x33, 0x73, 0x37, 0x71, 0x17, 0x70, 0x07];

const STORED_MASK: u8 = 0xFF;

// draws stay clear of the end marker so a generated motion always spans its play length
const DRAW_MASK: u8 = 0x7F;

/// How a generated motion fills itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Seeding {
    /// Nothing left to draw.
    Complete,
    /// Entries still to be drawn, one bit per entry. Each is drawn the first time playback reads it.
    Once { pending: u64 },
    /// Every read draws a fresh entry.
    Continuous,
}

/// The path playback follows through the pattern grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Motion {
    steps: [u8; MOTION_LEN],
    mask: u8,
    seeding: Seeding,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            steps: [END_OF_MOTION; MOTION_LEN],
            mask: RANDOM_MASKS[0],
            seeding: Seeding::Complete,
        }
    }
}

impl Motion {
    /// Wraps a pre-authored motion read from storage.
    pub fn stored(steps: [u8; MOTION_LEN]) -> Self {
        Self {
            steps,
            mask: STORED_MASK,
            seeding: Seeding::Complete,
        }
    }

    /// Prepares a generated motion for `index` (which must be at least [`STORED_MOTIONS`]).
    ///
    /// Entries are drawn from the generator as playback reaches them; see [`Motion::seed`].
    pub fn random(index: u8) -> Self {
        Self {
            steps: [0; MOTION_LEN],
            mask: RANDOM_MASKS[usize::from(index & 0x07)],
            seeding: if index >= REPEATING_MOTIONS {
                Seeding::Continuous
            } else {
                Seeding::Once { pending: u64::MAX }
            },
        }
    }

    /// Returns true for indices which are generated rather than stored.
    pub fn is_generated(index: u8) -> bool {
        index >= STORED_MOTIONS
    }

    /// Returns the mask applied to each entry before it addresses the grid.
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Returns the raw entries.
    pub fn steps(&self) -> &[u8; MOTION_LEN] {
        &self.steps
    }

    /// Returns the raw entry at `step`, wrapping at [`MOTION_LEN`].
    pub fn entry(&self, step: u8) -> u8 {
        self.steps[usize::from(step) % MOTION_LEN]
    }

    /// Returns true when the entry at `step` is [`END_OF_MOTION`].
    pub fn is_end(&self, step: u8) -> bool {
        self.entry(step) == END_OF_MOTION
    }

    /// Returns the entry read `offset` entries past `step`.
    pub fn read_index(step: u8, offset: u8) -> u8 {
        step.wrapping_add(offset) & 0x3F
    }

    /// Reads the masked grid position `offset` entries past `step`.
    pub fn position(&self, step: u8, offset: u8) -> GridPosition {
        GridPosition::new(self.entry(Self::read_index(step, offset))).masked(self.mask)
    }

    /// Draws the entry about to be read at `index` when it is still pending. Once-seeded motions keep what they
    /// draw; continuously seeded motions draw on every read.
    pub fn seed(&mut self, index: u8, lfsr: &mut Lfsr) {
        let index = index & 0x3F;
        match self.seeding {
            Seeding::Complete => {}
            Seeding::Once { pending } => {
                let bit = 1u64 << index;
                if pending & bit != 0 {
                    self.steps[usize::from(index)] = lfsr.next_byte() & DRAW_MASK;
                    self.seeding = match pending & !bit {
                        0 => Seeding::Complete,
                        pending => Seeding::Once { pending },
                    };
                }
            }
            Seeding::Continuous => self.steps[usize::from(index)] = lfsr.next_byte() & DRAW_MASK,
        }
    }

    /// Returns true while entries remain to be drawn.
    pub fn is_seeding(&self) -> bool {
        self.seeding != Seeding::Complete
    }

    /// Returns true when the entry at `index` has yet to be drawn.
    pub fn is_pending(&self, index: u8) -> bool {
        match self.seeding {
            Seeding::Complete => false,
            Seeding::Once { pending } => pending & (1u64 << (index & 0x3F)) != 0,
            Seeding::Continuous => true,
        }
    }

    /// Moves one step forward, wrapping at the play length first and then at the end marker.
    pub fn step_forward(&self, step: u8, play_len: u8) -> u8 {
        let mut step = step.wrapping_add(1);
        if step >= play_len {
            step = 0;
        }
        if self.is_end(step) {
            step = 0;
        }
        step
    }

    /// Moves one step backward. Stepping back from 0 (or from beyond the play length) lands on the last playable
    /// step, and end markers are skipped downward until an entry is found or step 0 is reached.
    pub fn step_backward(&self, step: u8, play_len: u8) -> u8 {
        let mut step = step.wrapping_sub(1);
        if step == u8::MAX || step >= play_len {
            step = play_len.saturating_sub(1);
        }
        while self.is_end(step) && step > 0 {
            step -= 1;
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_motion(len: usize) -> Motion {
        let mut steps = [END_OF_MOTION; MOTION_LEN];
        for (i, step) in steps.iter_mut().take(len).enumerate() {
            *step = i as u8;
        }
        Motion::stored(steps)
    }

    #[test]
    fn forward_wraps_at_play_length() {
        let motion = short_motion(64);
        assert_eq!(5, motion.step_forward(4, 16), "Expected left but right");
        assert_eq!(0, motion.step_forward(15, 16), "Expected left but right");
        assert_eq!(0, motion.step_forward(63, 64), "Expected left but right");
    }

    #[test]
    fn forward_wraps_at_end_marker() {
        let motion = short_motion(8);
        assert_eq!(7, motion.step_forward(6, 64), "Expected left but right");
        assert_eq!(0, motion.step_forward(7, 64), "Expected left but right");
    }

    #[test]
    fn forward_checks_play_length_before_end_marker() {
        let motion = short_motion(8);
        assert_eq!(0, motion.step_forward(3, 4), "Expected left but right");
    }

    #[test]
    fn backward_wraps_from_zero_to_play_length() {
        let motion = short_motion(64);
        assert_eq!(15, motion.step_backward(0, 16), "Expected left but right");
        assert_eq!(2, motion.step_backward(3, 16), "Expected left but right");
    }

    #[test]
    fn backward_wraps_from_beyond_play_length() {
        let motion = short_motion(64);
        assert_eq!(7, motion.step_backward(40, 8), "Expected left but right");
    }

    #[test]
    fn backward_skips_end_markers() {
        let motion = short_motion(5);
        assert_eq!(4, motion.step_backward(0, 32), "Expected left but right");
    }

    #[test]
    fn backward_stops_at_zero_when_only_end_markers_remain() {
        let mut steps = [END_OF_MOTION; MOTION_LEN];
        steps[3] = 0x12;
        let motion = Motion::stored(steps);
        assert_eq!(0, motion.step_backward(0, 3), "Expected left but right");
        assert_eq!(3, motion.step_backward(0, 10), "Expected left but right");
    }

    #[test]
    fn stored_motions_are_unmasked() {
        let mut steps = [0; MOTION_LEN];
        steps[2] = 0x7E;
        let motion = Motion::stored(steps);
        assert_eq!(GridPosition::new(0x7E), motion.position(2, 0));
        assert_eq!(GridPosition::new(0x7E), motion.position(0, 2));
        assert_eq!(GridPosition::new(0x7E), motion.position(62, 4));
        assert!(!motion.is_seeding());
    }

    #[test]
    fn random_motion_seeds_once() {
        let mut lfsr = Lfsr::default();
        let mut motion = Motion::random(50);
        assert_eq!(RANDOM_MASKS[2], motion.mask(), "Expected left but right");
        assert!(!motion.is_end(0));

        for index in 0..MOTION_LEN as u8 {
            assert!(motion.is_pending(index));
            motion.seed(index, &mut lfsr);
        }
        assert!(!motion.is_seeding());
        assert!(motion.steps().iter().all(|&step| step <= DRAW_MASK));

        let seeded = *motion.steps();
        motion.seed(0, &mut lfsr);
        assert_eq!(&seeded, motion.steps(), "Once-seeded motions must not change");
    }

    #[test]
    fn random_motion_seeds_the_entry_being_read() {
        let mut lfsr = Lfsr::default();
        let mut motion = Motion::random(STORED_MOTIONS);
        motion.seed(Motion::read_index(4, 20), &mut lfsr);

        assert_eq!(0x3C, motion.entry(24), "Expected left but right");
        assert!(!motion.is_pending(24));
        assert!(motion.is_pending(0));
        assert!(motion.is_pending(25));

        motion.seed(24, &mut lfsr);
        assert_eq!(0x3C, motion.entry(24), "Expected left but right");
        motion.seed(25, &mut lfsr);
        assert_eq!(0x1E, motion.entry(25), "Expected left but right");
    }

    #[test]
    fn random_motion_has_no_end_markers() {
        let motion = Motion::random(STORED_MOTIONS);
        assert_eq!(2, motion.step_forward(1, 64), "Expected left but right");
        assert_eq!(63, motion.step_backward(0, 64), "Expected left but right");
    }

    #[test]
    fn random_motion_reseeds_continuously() {
        let mut lfsr = Lfsr::default();
        let mut motion = Motion::random(60);
        motion.seed(0, &mut lfsr);
        assert_eq!(0x3C, motion.entry(0), "Expected left but right");
        assert!(motion.is_pending(0));

        motion.seed(0, &mut lfsr);
        assert_eq!(0x1E, motion.entry(0), "Expected left but right");
        assert!(motion.is_seeding());
    }
}
