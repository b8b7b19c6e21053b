use super::{BLOCK_SIZE, Block, Eeprom, MOTION_BASE, Storage, Tables};
use crate::configuration::{Span, Tonality};
use crate::sequencer::{MOTION_LEN, PATTERN_COUNT, Pattern, STORED_MOTIONS, Scale};

/// One past the last address covered by [`MemoryStorage`].
pub const STORAGE_END: u16 = 0x6400;

const STORAGE_LEN: usize = (STORAGE_END - MOTION_BASE) as usize;

/// Value of erased flash and EEPROM cells.
pub const ERASED: u8 = 0xFF;

/// Size of [`MemoryEeprom`].
pub const EEPROM_LEN: usize = 64;

/// RAM-backed [`Storage`] covering the table region.
///
/// Writes can be made to report completion only after a number of polls, which exercises the same wait path as slow
/// flash.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    bytes: [u8; STORAGE_LEN],
    latency: u8,
    busy: u8,
    writes: usize,
    polls_while_busy: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            bytes: [ERASED; STORAGE_LEN],
            latency: 0,
            busy: 0,
            writes: 0,
            polls_while_busy: 0,
        }
    }
}

impl MemoryStorage {
    /// Returns erased storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns storage holding the factory scales, with every pattern cell active and every stored motion tracing
    /// the grid row by row.
    pub fn factory() -> Self {
        let mut tables = Tables::new(Self::new());

        for tonality in [Tonality::Minor, Tonality::Major] {
            for span in [Span::Small, Span::Large] {
                let scale = Scale::factory(tonality, span);
                tables.write_scale_notes(tonality, span, scale.notes());
                tables.write_xy(tonality, span, scale.xy_levels());
                Self::program(&mut tables);
            }
        }

        for index in 0..PATTERN_COUNT {
            tables.write_pattern(index, &Pattern::FULL);
            Self::program(&mut tables);
        }

        let raster: [u8; MOTION_LEN] = core::array::from_fn(|i| (((i / 8) << 4) | (i % 8)) as u8);
        for index in 0..STORED_MOTIONS {
            tables.write_motion(index, &raster);
            Self::program(&mut tables);
        }

        let mut storage = tables.into_storage();
        storage.writes = 0;
        storage
    }

    // without latency every write completes on the next poll
    fn program(tables: &mut Tables<Self>) {
        while tables.pending_writes() > 0 {
            tables.timer_task();
        }
    }

    /// Makes each write report completion only after `polls` calls to [`Storage::write_complete`].
    pub fn with_latency(mut self, polls: u8) -> Self {
        self.latency = polls;
        self
    }

    /// Returns the number of blocks written.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Returns the number of completion polls which found a write still in progress.
    pub fn polls_while_busy(&self) -> usize {
        self.polls_while_busy
    }

    fn block_range(address: u16) -> Option<core::ops::Range<usize>> {
        let start = usize::from(address.checked_sub(MOTION_BASE)?);
        let end = start + BLOCK_SIZE;
        (end <= STORAGE_LEN).then_some(start..end)
    }
}

impl Storage for MemoryStorage {
    fn read_block(&mut self, address: u16, block: &mut Block) {
        match Self::block_range(address) {
            Some(range) => block.copy_from_slice(&self.bytes[range]),
            None => block.fill(ERASED),
        }
    }

    fn write_block(&mut self, address: u16, block: &Block) {
        if let Some(range) = Self::block_range(address) {
            self.bytes[range].copy_from_slice(block);
            self.writes += 1;
            self.busy = self.latency;
        }
    }

    fn write_complete(&mut self) -> bool {
        if self.busy == 0 {
            return true;
        }
        self.busy -= 1;
        self.polls_while_busy += 1;
        false
    }
}

/// RAM-backed [`Eeprom`].
#[derive(Debug, Clone)]
pub struct MemoryEeprom {
    bytes: [u8; EEPROM_LEN],
    latency: u8,
    busy: u8,
    writes: usize,
}

impl Default for MemoryEeprom {
    fn default() -> Self {
        Self {
            bytes: [ERASED; EEPROM_LEN],
            latency: 0,
            busy: 0,
            writes: 0,
        }
    }
}

impl MemoryEeprom {
    /// Returns erased EEPROM.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes each write report completion only after `polls` calls to [`Eeprom::write_complete`].
    pub fn with_latency(mut self, polls: u8) -> Self {
        self.latency = polls;
        self
    }

    /// Returns the number of bytes written.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Eeprom for MemoryEeprom {
    fn read(&mut self, address: u8) -> u8 {
        self.bytes.get(usize::from(address)).copied().unwrap_or(ERASED)
    }

    fn write(&mut self, address: u8, value: u8) {
        if let Some(byte) = self.bytes.get_mut(usize::from(address)) {
            *byte = value;
            self.writes += 1;
            self.busy = self.latency;
        }
    }

    fn write_complete(&mut self) -> bool {
        if self.busy == 0 {
            return true;
        }
        self.busy -= 1;
        false
    }
}
