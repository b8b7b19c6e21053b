use super::{
    ChannelMode, DEVICE_TYPE_QUERY, DEVICE_TYPE_RESPONSE, FIRST_CHANNEL_MODE, MANUFACTURER_ID, RESTART_CODE,
    RESTART_DEVICE, SYSEX_START, Transmitter, u14,
};
use heapless::Deque;
use tinyvec::ArrayVec;
use wmidi::{Channel, ControlFunction, MidiMessage, Note, U7, U14};

/// Capacity of the receive queue in bytes.
pub const RECEIVE_QUEUE_LEN: usize = 128;

/// Capacity of the system exclusive buffer. Longer messages are truncated.
pub const SYSEX_BUFFER_LEN: usize = 128;

/// The body of a system exclusive message, without its start and end bytes.
pub type SysexBuffer = ArrayVec<[u8; SYSEX_BUFFER_LEN]>;

/// Fewest bytes a system exclusive body needs to carry a manufacturer prefix and a device type.
const MIN_SYSEX_LEN: usize = 4;

/// An event decoded from the inbound byte stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A channel voice, system common or system realtime message. Note-ons with zero velocity arrive as note-offs and
    /// controllers 120 to 127 arrive as [`Incoming::ChannelMode`] instead.
    Message(MidiMessage<'static>),
    /// A channel mode message.
    ChannelMode(Channel, ChannelMode),
    /// A first-party system exclusive message addressed to this device, for the application to interpret.
    Sysex(SysexBuffer),
    /// A confirmed request to restart the device.
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum ReceiveState {
    Idle,
    Data0,
    Data1,
    SysexData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoiceStatus {
    NoteOff,
    NoteOn,
    KeyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
}

/// The status which subsequent data bytes belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunningStatus {
    Voice(VoiceStatus, Channel),
    SongPosition,
    SongSelect,
}

impl RunningStatus {
    fn from_status(status: u8) -> Option<Self> {
        let voice = match status & 0xF0 {
            0x80 => VoiceStatus::NoteOff,
            0x90 => VoiceStatus::NoteOn,
            0xA0 => VoiceStatus::KeyPressure,
            0xB0 => VoiceStatus::ControlChange,
            0xC0 => VoiceStatus::ProgramChange,
            0xD0 => VoiceStatus::ChannelPressure,
            0xE0 => VoiceStatus::PitchBend,
            _ => {
                return match status {
                    0xF2 => Some(Self::SongPosition),
                    0xF3 => Some(Self::SongSelect),
                    _ => None,
                };
            }
        };
        Channel::from_index(status & 0x0F)
            .ok()
            .map(|channel| Self::Voice(voice, channel))
    }

    fn data_len(self) -> usize {
        match self {
            Self::Voice(VoiceStatus::ProgramChange | VoiceStatus::ChannelPressure, _) | Self::SongSelect => 1,
            _ => 2,
        }
    }

    /// System common statuses do not carry over to further data bytes.
    fn is_voice(self) -> bool {
        matches!(self, Self::Voice(..))
    }
}

/// Decodes the inbound MIDI byte stream.
///
/// [`Receiver::receive_byte`] is the interrupt-side producer: it only enqueues. [`Receiver::poll`] is the consumer:
/// it takes one byte per call and advances the parser. Running status is kept for channel voice messages, system
/// realtime bytes are reported immediately without disturbing a message in progress, and system exclusive bodies
/// are collected until their end byte (or any other status byte).
#[derive(Debug)]
pub struct Receiver {
    queue: Deque<u8, RECEIVE_QUEUE_LEN>,
    state: ReceiveState,
    running: Option<RunningStatus>,
    data0: u8,
    sysex: SysexBuffer,
    device_type: u8,
}

impl Receiver {
    /// Returns a receiver which answers first-party system exclusive messages addressed to `device_type`.
    pub fn new(device_type: u8) -> Self {
        Self {
            queue: Deque::new(),
            state: ReceiveState::Idle,
            running: None,
            data0: 0,
            sysex: SysexBuffer::default(),
            device_type,
        }
    }

    /// Enqueues a byte from the serial link. When the queue is full the oldest unread byte is discarded.
    pub fn receive_byte(&mut self, byte: u8) {
        if self.queue.is_full() {
            self.queue.pop_front();
        }
        let _ = self.queue.push_back(byte);
    }

    /// Returns the number of bytes waiting to be parsed.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Parses at most one queued byte.
    ///
    /// Replies generated by the protocol layer itself (identity responses and echoed foreign system exclusive
    /// messages) are queued on `transmitter`.
    pub fn poll(&mut self, transmitter: &mut Transmitter) -> Option<Incoming> {
        let byte = self.queue.pop_front()?;
        self.parse(byte, transmitter)
    }

    fn parse(&mut self, byte: u8, transmitter: &mut Transmitter) -> Option<Incoming> {
        if byte >= 0xF8 {
            return realtime(byte).map(Incoming::Message);
        }

        if byte & 0x80 == 0 {
            return self.data(byte);
        }

        let ended = match self.state {
            ReceiveState::SysexData => self.finish_sysex(transmitter),
            _ => None,
        };
        self.status(byte);
        ended
    }

    fn status(&mut self, status: u8) {
        self.running = RunningStatus::from_status(status);
        self.state = match (status, self.running) {
            (SYSEX_START, _) => {
                self.sysex.clear();
                ReceiveState::SysexData
            }
            (_, Some(_)) => ReceiveState::Data0,
            // end of exclusive, and undefined or unsupported system common
            _ => ReceiveState::Idle,
        };
    }

    fn data(&mut self, byte: u8) -> Option<Incoming> {
        match (self.state, self.running) {
            (ReceiveState::SysexData, _) => {
                if self.sysex.len() < SYSEX_BUFFER_LEN {
                    self.sysex.push(byte);
                }
                None
            }
            (ReceiveState::Data0, Some(running)) if running.data_len() == 1 => {
                self.complete(running);
                decode(running, byte, 0)
            }
            (ReceiveState::Data0, Some(_)) => {
                self.data0 = byte;
                self.state = ReceiveState::Data1;
                None
            }
            (ReceiveState::Data1, Some(running)) => {
                self.complete(running);
                decode(running, self.data0, byte)
            }
            _ => None,
        }
    }

    /// Loops back for running status after a voice message, otherwise waits for a new status byte.
    fn complete(&mut self, running: RunningStatus) {
        if running.is_voice() {
            self.state = ReceiveState::Data0;
        } else {
            self.running = None;
            self.state = ReceiveState::Idle;
        }
    }

    fn finish_sysex(&mut self, transmitter: &mut Transmitter) -> Option<Incoming> {
        let data = core::mem::take(&mut self.sysex);
        self.state = ReceiveState::Idle;

        if data.len() < MIN_SYSEX_LEN {
            return None;
        }
        if data[..MANUFACTURER_ID.len()] != MANUFACTURER_ID {
            transmitter.sysex(&data);
            return None;
        }

        // device-wide commands may omit the device type
        let (command, args) = match data[3] {
            DEVICE_TYPE_QUERY | RESTART_DEVICE => (data[3], &data[4..]),
            device_type if device_type == self.device_type => match data.get(4) {
                Some(&command) => (command, &data[5..]),
                None => return None,
            },
            _ => {
                transmitter.sysex(&data);
                return None;
            }
        };

        match command {
            DEVICE_TYPE_QUERY => {
                debug!("answering device type query");
                transmitter.sysex_command(self.device_type, DEVICE_TYPE_RESPONSE, &[self.device_type]);
                None
            }
            RESTART_DEVICE => match args.split_first() {
                Some((&device_type, code)) if device_type == self.device_type && code == RESTART_CODE => {
                    info!("restart requested");
                    Some(Incoming::Restart)
                }
                _ => {
                    warn!("ignoring unconfirmed restart request");
                    None
                }
            },
            _ => Some(Incoming::Sysex(data)),
        }
    }
}

fn realtime(byte: u8) -> Option<MidiMessage<'static>> {
    match byte {
        0xF8 => Some(MidiMessage::TimingClock),
        0xFA => Some(MidiMessage::Start),
        0xFB => Some(MidiMessage::Continue),
        0xFC => Some(MidiMessage::Stop),
        0xFE => Some(MidiMessage::ActiveSensing),
        0xFF => Some(MidiMessage::Reset),
        // 0xF9 and 0xFD are undefined
        _ => None,
    }
}

fn decode(running: RunningStatus, data0: u8, data1: u8) -> Option<Incoming> {
    let value = U7::from_u8_lossy(data1);
    let message = match running {
        RunningStatus::Voice(voice, channel) => match voice {
            VoiceStatus::NoteOff => MidiMessage::NoteOff(channel, Note::from_u8_lossy(data0), value),
            VoiceStatus::NoteOn if data1 == 0 => MidiMessage::NoteOff(channel, Note::from_u8_lossy(data0), value),
            VoiceStatus::NoteOn => MidiMessage::NoteOn(channel, Note::from_u8_lossy(data0), value),
            VoiceStatus::KeyPressure => {
                MidiMessage::PolyphonicKeyPressure(channel, Note::from_u8_lossy(data0), value)
            }
            VoiceStatus::ControlChange if data0 >= FIRST_CHANNEL_MODE => {
                return ChannelMode::from_controller(data0, data1)
                    .map(|mode| Incoming::ChannelMode(channel, mode));
            }
            VoiceStatus::ControlChange => {
                MidiMessage::ControlChange(channel, ControlFunction(U7::from_u8_lossy(data0)), value)
            }
            VoiceStatus::ProgramChange => MidiMessage::ProgramChange(channel, U7::from_u8_lossy(data0)),
            VoiceStatus::ChannelPressure => MidiMessage::ChannelPressure(channel, U7::from_u8_lossy(data0)),
            VoiceStatus::PitchBend => MidiMessage::PitchBendChange(channel, fourteen_bit(data0, data1)),
        },
        RunningStatus::SongPosition => MidiMessage::SongPositionPointer(fourteen_bit(data0, data1)),
        RunningStatus::SongSelect => MidiMessage::SongSelect(U7::from_u8_lossy(data0)),
    };
    Some(Incoming::Message(message))
}

fn fourteen_bit(lsb: u8, msb: u8) -> U14 {
    u14((u16::from(msb & 0x7F) << 7) | u16::from(lsb & 0x7F))
}
