/// Lowest controller number reserved for channel mode messages.
pub const FIRST_CHANNEL_MODE: u8 = 120;

/// Channel mode messages, carried by controllers 120 to 127.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelMode {
    /// Controller 120.
    AllSoundOff,
    /// Controller 121.
    ResetAllControllers,
    /// Controller 122; true when local control is switched on.
    LocalControl(bool),
    /// Controller 123.
    AllNotesOff,
    /// Controller 124.
    OmniOff,
    /// Controller 125.
    OmniOn,
    /// Controller 126, with the requested number of channels.
    MonoOn(u8),
    /// Controller 127.
    PolyOn,
}

impl ChannelMode {
    /// Decodes a controller and its value, or returns `None` for regular controllers.
    pub fn from_controller(controller: u8, value: u8) -> Option<Self> {
        match controller {
            120 => Some(Self::AllSoundOff),
            121 => Some(Self::ResetAllControllers),
            122 => Some(Self::LocalControl(value > 63)),
            123 => Some(Self::AllNotesOff),
            124 => Some(Self::OmniOff),
            125 => Some(Self::OmniOn),
            126 => Some(Self::MonoOn(value)),
            127 => Some(Self::PolyOn),
            _ => None,
        }
    }
}
