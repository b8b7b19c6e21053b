//! This module contains both performer-facing settings (implemented as enums) and the deployment configuration
//! selected when the device starts.

mod clock_division;
pub use clock_division::*;

mod output_profile;
pub use output_profile::*;

mod switches;
pub use switches::*;

use wmidi::Channel;

/// Device type byte used to address first-party system exclusive messages to this model.
pub const DEVICE_TYPE: u8 = 0x41;

/// Startup configuration for an [`Engine`](crate::engine::Engine).
///
/// Values here are fixed for the lifetime of the engine. Settings which may change at runtime (e.g., the MIDI
/// channel, which can be learned) are seeded from here but persisted through the
/// [`ConfigStore`](crate::storage::ConfigStore).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Identifies this model in first-party sysex messages.
    pub device_type: u8,
    /// Output voltage scaling for the attached hardware.
    pub profile: OutputProfile,
    /// Channel used when the persisted channel is missing or out of range.
    pub default_channel: Channel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_type: DEVICE_TYPE,
            profile: OutputProfile::eurorack(),
            default_channel: Channel::Ch1,
        }
    }
}
