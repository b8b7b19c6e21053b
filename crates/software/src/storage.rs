//! Persistent tables and settings.
//!
//! Pattern, motion and scale tables live in block-erased flash behind [`Storage`]; the MIDI channel lives in a small
//! byte-addressed EEPROM behind [`Eeprom`]. Both collaborators signal when a write has finished, and neither is
//! written again until it has.

mod config_store;
pub use config_store::*;

mod memory;
pub use memory::*;

mod tables;
pub use tables::*;

/// Size of the unit flash is erased and programmed in.
pub const BLOCK_SIZE: usize = 64;

/// One erase/program unit of flash.
pub type Block = [u8; BLOCK_SIZE];

/// Block-oriented access to the flash holding the tables.
///
/// Addresses passed to [`Storage::read_block`] and [`Storage::write_block`] are always aligned to [`BLOCK_SIZE`].
/// Implementations must make each block update atomic with respect to interrupts, and reads must return the data of
/// a block once its write has been issued.
pub trait Storage {
    /// Reads the block starting at `address`.
    fn read_block(&mut self, address: u16, block: &mut Block);

    /// Erases and programs the block starting at `address`. Completion is reported by [`Storage::write_complete`].
    fn write_block(&mut self, address: u16, block: &Block);

    /// Returns true once the last write has finished.
    fn write_complete(&mut self) -> bool;
}

/// Byte-oriented access to the EEPROM holding settings.
pub trait Eeprom {
    /// Reads one byte.
    fn read(&mut self, address: u8) -> u8;

    /// Starts writing one byte. Completion is reported by [`Eeprom::write_complete`].
    fn write(&mut self, address: u8, value: u8);

    /// Returns true once the last write has finished.
    fn write_complete(&mut self) -> bool;
}
