use super::Eeprom;

/// Persisted settings, by EEPROM address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigKey {
    /// Index (0 to 15) of the MIDI channel the device listens and transmits on.
    MidiChannel,
}

impl ConfigKey {
    fn address(self) -> u8 {
        match self {
            Self::MidiChannel => 0,
        }
    }
}

/// Number of persisted settings.
pub const CONFIG_LEN: usize = 1;

/// A RAM mirror of persisted settings which trickles changes out to EEPROM.
///
/// [`ConfigStore::timer_task`] compares one setting per call against the EEPROM and writes it if it differs, so a
/// change is persisted within a few calls without ever blocking on the slow EEPROM write.
#[derive(Debug)]
pub struct ConfigStore<E> {
    eeprom: E,
    values: [u8; CONFIG_LEN],
    check: usize,
    writing: bool,
}

impl<E: Eeprom> ConfigStore<E> {
    /// Loads every setting from the EEPROM.
    pub fn new(mut eeprom: E) -> Self {
        let values = core::array::from_fn(|address| eeprom.read(address as u8));
        Self {
            eeprom,
            values,
            check: 0,
            writing: false,
        }
    }

    /// Returns a setting.
    pub fn get(&self, key: ConfigKey) -> u8 {
        self.values[usize::from(key.address())]
    }

    /// Changes a setting. It is written out by later calls to [`ConfigStore::timer_task`].
    pub fn set(&mut self, key: ConfigKey, value: u8) {
        self.values[usize::from(key.address())] = value;
    }

    /// Writes at most one changed setting, and only once the previous write has completed.
    pub fn timer_task(&mut self) {
        if self.writing {
            if !self.eeprom.write_complete() {
                return;
            }
            self.writing = false;
        }

        let address = self.check as u8;
        let value = self.values[self.check];
        if self.eeprom.read(address) != value {
            trace!("persisting setting {=u8} = {=u8}", address, value);
            self.eeprom.write(address, value);
            self.writing = true;
        }
        self.check = (self.check + 1) % CONFIG_LEN;
    }

    /// Returns the EEPROM collaborator.
    pub fn eeprom(&self) -> &E {
        &self.eeprom
    }
}
