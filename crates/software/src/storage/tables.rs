use super::{BLOCK_SIZE, Block, Storage};
use crate::configuration::{Span, Tonality};
use crate::sequencer::{MOTION_LEN, PATTERN_COUNT, Pattern, SCALE_LEN, STORED_MOTIONS, Scale, variant};
use heapless::Deque;

/// First address of the motion tables.
pub const MOTION_BASE: u16 = 0x5000;

/// First address of the scale tables. Each tonality/span variant fills one block.
pub const SCALE_BASE: u16 = 0x6000;

/// First address of the X/Y tables, eight bytes per variant.
pub const XY_BASE: u16 = 0x6100;

/// First address of the pattern tables, eight bytes each.
pub const PATTERN_BASE: u16 = 0x6200;

const BLOCK_MASK: u16 = BLOCK_SIZE as u16 - 1;

/// Number of distinct blocks which may wait to be programmed.
pub const PENDING_BLOCKS: usize = 8;

/// Returns the address of a stored motion.
pub fn motion_address(index: u8) -> u16 {
    MOTION_BASE + u16::from(index) * MOTION_LEN as u16
}

/// Returns the address of a pattern.
pub fn pattern_address(index: u8) -> u16 {
    PATTERN_BASE + u16::from(index) * 8
}

/// Returns the address of a scale note table.
pub fn scale_address(tonality: Tonality, span: Span) -> u16 {
    SCALE_BASE + variant(tonality, span) as u16 * SCALE_LEN as u16
}

/// Returns the address of an X/Y table.
pub fn xy_address(tonality: Tonality, span: Span) -> u16 {
    XY_BASE + variant(tonality, span) as u16 * 8
}

/// Typed access to the tables held in a [`Storage`].
///
/// Each table fits inside one block, so every read and write touches exactly one block. Writes read the surrounding
/// block, patch it and queue it; [`Tables::timer_task`] programs queued blocks one at a time as the storage finishes
/// each write. Reads see queued blocks, so a table reads back as written straight away.
#[derive(Debug)]
pub struct Tables<S> {
    storage: S,
    pending: Deque<(u16, Block), PENDING_BLOCKS>,
    writing: bool,
}

impl<S: Storage> Tables<S> {
    /// Wraps a storage collaborator.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            pending: Deque::new(),
            writing: false,
        }
    }

    /// Returns the storage collaborator.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the storage collaborator.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Unwraps the storage collaborator.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Returns the number of blocks waiting to be programmed.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Programs the oldest queued block, once the previous write has completed.
    pub fn timer_task(&mut self) {
        if self.writing {
            if !self.storage.write_complete() {
                return;
            }
            self.writing = false;
        }

        if let Some((base, block)) = self.pending.pop_front() {
            trace!("programming block {=u16:#x}", base);
            self.storage.write_block(base, &block);
            self.writing = true;
        }
    }

    fn load_block(&mut self, base: u16, block: &mut Block) {
        match self.pending.iter().find(|(address, _)| *address == base) {
            Some((_, queued)) => block.copy_from_slice(queued),
            None => self.storage.read_block(base, block),
        }
    }

    fn read(&mut self, address: u16, buf: &mut [u8]) {
        let offset = usize::from(address & BLOCK_MASK);
        let mut block: Block = [0; BLOCK_SIZE];
        self.load_block(address & !BLOCK_MASK, &mut block);

        match block.get(offset..offset + buf.len()) {
            Some(data) => buf.copy_from_slice(data),
            None => warn!("read of {=usize} bytes at {=u16:#x} crosses a block", buf.len(), address),
        }
    }

    fn write(&mut self, address: u16, data: &[u8]) {
        let base = address & !BLOCK_MASK;
        let range = usize::from(address & BLOCK_MASK)..usize::from(address & BLOCK_MASK) + data.len();
        if range.end > BLOCK_SIZE {
            warn!("write of {=usize} bytes at {=u16:#x} crosses a block", data.len(), address);
            return;
        }

        if let Some((_, queued)) = self.pending.iter_mut().find(|(address, _)| *address == base) {
            queued[range].copy_from_slice(data);
            return;
        }

        let mut block: Block = [0; BLOCK_SIZE];
        self.storage.read_block(base, &mut block);
        block[range].copy_from_slice(data);
        if self.pending.push_back((base, block)).is_err() {
            warn!("table write queue full, dropping write at {=u16:#x}", address);
        }
    }

    /// Reads a pattern. Indices wrap at [`PATTERN_COUNT`].
    pub fn pattern(&mut self, index: u8) -> Pattern {
        let mut rows = [0; 8];
        self.read(pattern_address(index % PATTERN_COUNT), &mut rows);
        Pattern::new(rows)
    }

    /// Reads a stored motion. Indices wrap at [`STORED_MOTIONS`].
    pub fn motion(&mut self, index: u8) -> [u8; MOTION_LEN] {
        let mut steps = [0; MOTION_LEN];
        self.read(motion_address(index % STORED_MOTIONS), &mut steps);
        steps
    }

    /// Reads the note and X/Y tables of a tonality/span combination.
    pub fn scale(&mut self, tonality: Tonality, span: Span) -> Scale {
        let mut notes = [0; SCALE_LEN];
        let mut xy = [0; 8];
        self.read(scale_address(tonality, span), &mut notes);
        self.read(xy_address(tonality, span), &mut xy);
        Scale::new(notes, xy)
    }

    /// Replaces a pattern.
    pub fn write_pattern(&mut self, index: u8, pattern: &Pattern) {
        self.write(pattern_address(index % PATTERN_COUNT), pattern.rows());
    }

    /// Replaces a stored motion.
    pub fn write_motion(&mut self, index: u8, steps: &[u8; MOTION_LEN]) {
        self.write(motion_address(index % STORED_MOTIONS), steps);
    }

    /// Replaces the note table of a tonality/span combination.
    pub fn write_scale_notes(&mut self, tonality: Tonality, span: Span, notes: &[u8; SCALE_LEN]) {
        self.write(scale_address(tonality, span), notes);
    }

    /// Replaces the X/Y table of a tonality/span combination.
    pub fn write_xy(&mut self, tonality: Tonality, span: Span, levels: &[u8; 8]) {
        self.write(xy_address(tonality, span), levels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn addresses() {
        assert_eq!(0x5000, motion_address(0));
        assert_eq!(0x5BC0, motion_address(47));
        assert_eq!(0x6200, pattern_address(0));
        assert_eq!(0x62F8, pattern_address(31));
        assert_eq!(0x6000, scale_address(Tonality::Minor, Span::Small));
        assert_eq!(0x6040, scale_address(Tonality::Minor, Span::Large));
        assert_eq!(0x6080, scale_address(Tonality::Major, Span::Small));
        assert_eq!(0x60C0, scale_address(Tonality::Major, Span::Large));
        assert_eq!(0x6100, xy_address(Tonality::Minor, Span::Small));
        assert_eq!(0x6118, xy_address(Tonality::Major, Span::Large));
    }

    #[test]
    fn factory_scales_read_back() {
        let mut tables = Tables::new(MemoryStorage::factory());
        for tonality in [Tonality::Minor, Tonality::Major] {
            for span in [Span::Small, Span::Large] {
                assert_eq!(
                    Scale::factory(tonality, span),
                    tables.scale(tonality, span),
                    "Expected left but right"
                );
            }
        }
    }

    #[test]
    fn write_preserves_the_rest_of_the_block() {
        let mut tables = Tables::new(MemoryStorage::factory());
        let before = tables.pattern(9);
        let pattern = Pattern::new([1, 2, 3, 4, 5, 6, 7, 8]);

        tables.write_pattern(8, &pattern);
        tables.timer_task();

        assert_eq!(pattern, tables.pattern(8), "Expected left but right");
        assert_eq!(before, tables.pattern(9), "Expected left but right");
        assert_eq!(1, tables.storage().writes(), "Expected left but right");
    }

    #[test]
    fn queued_writes_read_back_before_programming() {
        let mut tables = Tables::new(MemoryStorage::factory());
        let pattern = Pattern::new([9; 8]);

        tables.write_pattern(3, &pattern);
        tables.write_pattern(4, &pattern);

        assert_eq!(pattern, tables.pattern(3), "Expected left but right");
        assert_eq!(0, tables.storage().writes(), "Expected left but right");
        assert_eq!(1, tables.pending_writes(), "Writes to one block should share it");
    }

    #[test]
    fn programs_one_block_per_completed_write() {
        let mut tables = Tables::new(MemoryStorage::factory().with_latency(3));
        let steps = [0x11; MOTION_LEN];
        tables.write_motion(2, &steps);
        tables.write_motion(3, &steps);
        assert_eq!(2, tables.pending_writes(), "Expected left but right");

        tables.timer_task();
        assert_eq!(1, tables.storage().writes(), "Expected left but right");
        for _ in 0..3 {
            tables.timer_task();
        }
        assert_eq!(1, tables.storage().writes(), "Still busy, expected no second write");
        assert_eq!(3, tables.storage().polls_while_busy(), "Expected left but right");

        tables.timer_task();
        assert_eq!(2, tables.storage().writes(), "Expected left but right");
        assert_eq!(0, tables.pending_writes(), "Expected left but right");
        assert_eq!(steps, tables.motion(3), "Expected left but right");
    }

    #[test]
    fn full_queue_drops_further_blocks() {
        let mut tables = Tables::new(MemoryStorage::factory());
        let steps = [0x22; MOTION_LEN];
        for index in 0..=PENDING_BLOCKS as u8 {
            tables.write_motion(index, &steps);
        }

        assert_eq!(PENDING_BLOCKS, tables.pending_writes(), "Expected left but right");
        assert_ne!(steps, tables.motion(PENDING_BLOCKS as u8), "Expected the last write to be dropped");
    }
}
