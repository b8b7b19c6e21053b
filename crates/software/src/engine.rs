//! The owning context which routes bytes, ticks and timer tasks between the engines.

use crate::clock::{ClockController, ClockSource};
use crate::configuration::EngineConfig;
use crate::panel::Panel;
use crate::protocol::{Incoming, Receiver, Transmitter};
use crate::sequencer::{Modulation, Sequencer};
use crate::storage::{ConfigKey, ConfigStore, Eeprom, Storage, Tables};
use crate::sysex::TableUpdate;
use wmidi::{Channel, ControlFunction, MidiMessage};

/// Calls to [`Engine::periodic`] per run of the timer tasks.
pub const TIMER_TASK_DIVIDER: u8 = 4;

/// Controller which sets the pattern type floor.
pub const CC_PATTERN_TYPE: u8 = 20;

/// Controller which offsets the start of the motion.
pub const CC_MOTION_START: u8 = 21;

/// Controller which sets the play length floor.
pub const CC_MOTION_LENGTH: u8 = 22;

/// Sustain pedal, which reverses the direction of play while held.
pub const CC_SUSTAIN: u8 = 64;

/// Controllers are also accepted on this channel, whatever the device channel.
pub const BROADCAST_CHANNEL: Channel = Channel::Ch16;

/// What the caller should do after [`Engine::periodic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// Keep calling.
    Running,
    /// A confirmed restart was requested; silence the outputs and reset.
    Restart,
}

/// Owns every engine and the storage collaborators.
///
/// Interrupt handlers call [`Engine::receive_byte`], [`Engine::external_pulse`] and [`Engine::internal_tick`]; a
/// periodic task calls [`Engine::periodic`]; the main loop drains [`Engine::poll_transmit`]. The firmware serializes
/// these calls, so the engine itself holds no locks.
#[derive(Debug)]
pub struct Engine<S, E> {
    receiver: Receiver,
    transmitter: Transmitter,
    clock: ClockController,
    sequencer: Sequencer,
    tables: Tables<S>,
    config: ConfigStore<E>,
    channel: Channel,
    learning: bool,
    divider: u8,
}

impl<S: Storage, E: Eeprom> Engine<S, E> {
    /// Builds the engines, restoring the persisted MIDI channel.
    pub fn new(config: EngineConfig, storage: S, eeprom: E) -> Self {
        let mut store = ConfigStore::new(eeprom);
        let channel = match Channel::from_index(store.get(ConfigKey::MidiChannel)) {
            Ok(channel) => channel,
            Err(_) => {
                warn!("no valid MIDI channel stored; using the default");
                store.set(ConfigKey::MidiChannel, config.default_channel.index());
                config.default_channel
            }
        };

        Self {
            receiver: Receiver::new(config.device_type),
            transmitter: Transmitter::new(),
            clock: ClockController::new(),
            sequencer: Sequencer::new(config.profile, channel),
            tables: Tables::new(storage),
            config: store,
            channel,
            learning: false,
            divider: 0,
        }
    }

    /// Loads the tables and starts the song.
    pub fn start<P: Panel>(&mut self, panel: &mut P) {
        info!("starting on channel {=u8}", self.channel.index() + 1);
        self.sequencer.start(&mut self.tables, panel);
        self.clock.start(&mut self.transmitter);
    }

    /// Queues an inbound byte. Safe to call from the receive interrupt.
    pub fn receive_byte(&mut self, byte: u8) {
        self.receiver.receive_byte(byte);
    }

    /// Handles an edge on the external clock input.
    pub fn external_pulse<P: Panel>(&mut self, panel: &mut P) {
        self.clock
            .external_pulse(panel, &mut self.sequencer, &mut self.transmitter);
    }

    /// Handles an expiry of the internal clock timer.
    pub fn internal_tick<P: Panel>(&mut self, panel: &mut P) {
        self.clock
            .internal_tick(panel, &mut self.sequencer, &mut self.transmitter);
    }

    /// Returns the next byte to send, if the link is ready.
    pub fn poll_transmit(&mut self, link_ready: bool) -> Option<u8> {
        self.transmitter.poll(link_ready)
    }

    /// Parses one inbound byte, and every [`TIMER_TASK_DIVIDER`] calls runs the timer tasks. Call every 256 µs.
    pub fn periodic<P: Panel>(&mut self, panel: &mut P) -> Status {
        let status = self.poll_receive(panel);

        self.divider += 1;
        if self.divider >= TIMER_TASK_DIVIDER {
            self.divider = 0;
            self.clock
                .timer_task(panel, &mut self.sequencer, &mut self.transmitter);
            let internal = self.clock.source() == ClockSource::Internal;
            self.sequencer
                .timer_task(internal, &mut self.tables, panel, &mut self.transmitter);
            self.config.timer_task();
            self.tables.timer_task();
        }

        status
    }

    /// Parses at most one queued inbound byte and acts on any message it completes.
    pub fn poll_receive<P: Panel>(&mut self, panel: &mut P) -> Status {
        match self.receiver.poll(&mut self.transmitter) {
            Some(Incoming::Message(message)) => self.message(message, panel),
            Some(Incoming::ChannelMode(channel, _mode)) => {
                self.learn(channel);
                trace!("ignoring channel mode message");
            }
            Some(Incoming::Sysex(data)) => self.table_update(&data, panel),
            Some(Incoming::Restart) => return Status::Restart,
            None => {}
        }
        Status::Running
    }

    /// Makes the next inbound channel message set the device channel.
    pub fn set_midi_learn(&mut self, learning: bool) {
        self.learning = learning;
    }

    fn learn(&mut self, channel: Channel) {
        if self.learning {
            self.learning = false;
            self.set_channel(channel);
        }
    }

    /// Changes and persists the device channel.
    pub fn set_channel(&mut self, channel: Channel) {
        info!("MIDI channel set to {=u8}", channel.index() + 1);
        self.channel = channel;
        self.sequencer.set_channel(channel);
        self.config.set(ConfigKey::MidiChannel, channel.index());
    }

    fn message<P: Panel>(&mut self, message: MidiMessage<'static>, panel: &mut P) {
        if let Some(channel) = voice_channel(&message) {
            self.learn(channel);
        }

        match message {
            MidiMessage::NoteOff(channel, note, _) if channel == self.channel => {
                self.sequencer.midi_note_off(u8::from(note));
            }
            MidiMessage::NoteOn(channel, note, _) if channel == self.channel => {
                if self.sequencer.midi_note_on(u8::from(note), panel) {
                    self.clock.reset_phases();
                }
            }
            MidiMessage::ControlChange(channel, ControlFunction(controller), value) => {
                self.control_change(channel, u8::from(controller), u8::from(value));
            }
            MidiMessage::ProgramChange(channel, program) if channel == self.channel => {
                self.sequencer
                    .select_motion(u8::from(program), &mut self.tables, panel);
            }
            MidiMessage::PolyphonicKeyPressure(channel, ..)
            | MidiMessage::ChannelPressure(channel, _)
            | MidiMessage::PitchBendChange(channel, _)
                if channel == self.channel =>
            {
                self.transmitter.send(&message);
            }
            MidiMessage::SongPositionPointer(position) => {
                let position = u16::from(position);
                self.transmitter.song_position(position);
                self.clock.midi_song_position(position);
            }
            MidiMessage::TimingClock => {
                self.clock
                    .midi_tick(panel, &mut self.sequencer, &mut self.transmitter);
            }
            MidiMessage::Start => {
                self.clock
                    .midi_start(panel, &mut self.sequencer, &mut self.transmitter);
            }
            MidiMessage::Continue => self.clock.midi_continue(&mut self.transmitter),
            MidiMessage::Stop => self.clock.midi_stop(&mut self.transmitter),
            MidiMessage::ActiveSensing => self.transmitter.active_sensing(),
            MidiMessage::Reset => {
                self.clock
                    .reset(panel, &mut self.sequencer, &mut self.transmitter);
            }
            _ => {}
        }
    }

    fn control_change(&mut self, channel: Channel, controller: u8, value: u8) {
        if channel != self.channel && channel != BROADCAST_CHANNEL {
            return;
        }

        let modulation = match controller {
            CC_PATTERN_TYPE => Modulation::PatternType,
            CC_MOTION_START => Modulation::MotionStart,
            CC_MOTION_LENGTH => Modulation::MotionLength,
            CC_SUSTAIN => {
                self.sequencer.set_midi_reverse(value > 63);
                return;
            }
            _ => {
                if channel == self.channel {
                    self.transmitter.control_change(self.channel, controller, value);
                }
                return;
            }
        };

        self.sequencer.modulate(modulation, value);
        self.transmitter.control_change(self.channel, controller, value);
    }

    fn table_update<P: Panel>(&mut self, data: &[u8], panel: &mut P) {
        let Some(update) = TableUpdate::parse(data) else {
            debug!("ignoring malformed table update");
            return;
        };

        debug!("applying {}", update);
        update.apply(&mut self.tables);
        match update {
            TableUpdate::Pattern { index, .. } if index == self.sequencer.pattern_index() => {
                self.sequencer.reload_pattern(&mut self.tables, panel);
            }
            TableUpdate::Motion { index, .. } if index == self.sequencer.motion_index() => {
                self.sequencer.reload_motion(&mut self.tables);
            }
            TableUpdate::Scale { .. } => self.sequencer.reload_scale(&mut self.tables),
            _ => {}
        }
    }

    /// Returns the device channel.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Returns the time between internal clock ticks.
    pub fn tick_period_micros(&self) -> u32 {
        self.clock.tick_period_micros()
    }

    /// Returns the clock controller.
    pub fn clock(&self) -> &ClockController {
        &self.clock
    }

    /// Returns the sequencer.
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Returns the stored tables.
    pub fn tables_mut(&mut self) -> &mut Tables<S> {
        &mut self.tables
    }

    /// Returns the persisted settings.
    pub fn config(&self) -> &ConfigStore<E> {
        &self.config
    }
}

fn voice_channel(message: &MidiMessage<'_>) -> Option<Channel> {
    match *message {
        MidiMessage::NoteOff(channel, ..)
        | MidiMessage::NoteOn(channel, ..)
        | MidiMessage::PolyphonicKeyPressure(channel, ..)
        | MidiMessage::ControlChange(channel, ..)
        | MidiMessage::ProgramChange(channel, _)
        | MidiMessage::ChannelPressure(channel, _)
        | MidiMessage::PitchBendChange(channel, _) => Some(channel),
        _ => None,
    }
}
