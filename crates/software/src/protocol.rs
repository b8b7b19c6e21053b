//! The MIDI transport protocol engine: a byte-oriented receive parser and a byte-oriented transmit queue.
//!
//! Nothing here knows what the messages mean musically. The [`Receiver`] turns the inbound byte stream into
//! [`Incoming`] events (handling running status, realtime interleaving and system exclusive framing) and the
//! [`Transmitter`] serializes outbound messages for the serial link.

mod channel_mode;
pub use channel_mode::*;

mod receiver;
pub use receiver::*;

mod transmitter;
pub use transmitter::*;

/// Manufacturer prefix carried by first-party system exclusive messages.
pub const MANUFACTURER_ID: [u8; 3] = [0x00, 0x01, 0x72];

/// Asks a device to identify itself.
pub const DEVICE_TYPE_QUERY: u8 = 0x7C;

/// Identifies a device in reply to [`DEVICE_TYPE_QUERY`].
pub const DEVICE_TYPE_RESPONSE: u8 = 0x7D;

/// Restarts a device when followed by its device type and [`RESTART_CODE`].
pub const RESTART_DEVICE: u8 = 0x7E;

/// Confirmation required by [`RESTART_DEVICE`].
pub const RESTART_CODE: [u8; 4] = *b"KILL";

/// Start of a system exclusive message.
pub const SYSEX_START: u8 = 0xF0;

/// End of a system exclusive message.
pub const SYSEX_END: u8 = 0xF7;

/// Masks a value to 14 bits.
pub(crate) fn u14(value: u16) -> wmidi::U14 {
    wmidi::U14::try_from(value & 0x3FFF).unwrap_or(wmidi::U14::MIN)
}
