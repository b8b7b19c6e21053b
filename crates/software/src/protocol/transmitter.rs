use super::{MANUFACTURER_ID, SYSEX_END, SYSEX_START, u14};
use heapless::Deque;
use wmidi::{Channel, ControlFunction, MidiMessage, Note, U7};

/// Capacity of the transmit queue in bytes.
pub const TRANSMIT_QUEUE_LEN: usize = 128;

/// Longest encoding of a non-sysex message.
const MAX_MESSAGE_LEN: usize = 3;

/// A FIFO of outbound bytes, drained one byte at a time as the serial link becomes ready.
///
/// Producers are expected not to enqueue faster than the link drains. A byte pushed onto a full queue is dropped and
/// logged rather than overwriting queued data, so a message may arrive truncated but never reordered.
#[derive(Debug, Default)]
pub struct Transmitter {
    queue: Deque<u8, TRANSMIT_QUEUE_LEN>,
}

impl Transmitter {
    /// Returns an empty transmitter.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, byte: u8) {
        if self.queue.push_back(byte).is_err() {
            warn!("transmit queue full; dropping {=u8:#x}", byte);
        }
    }

    /// Returns the next byte to send, if the link is ready and one is queued.
    pub fn poll(&mut self, link_ready: bool) -> Option<u8> {
        if !link_ready {
            return None;
        }
        self.queue.pop_front()
    }

    /// Returns true when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of bytes queued.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Drains every queued byte.
    pub fn drain(&mut self) -> impl Iterator<Item = u8> + '_ {
        core::iter::from_fn(move || self.poll(true))
    }

    /// Queues any message other than system exclusive.
    pub fn send(&mut self, message: &MidiMessage<'_>) {
        let mut bytes = [0; MAX_MESSAGE_LEN];
        let len = message.bytes_size();

        match bytes.get_mut(..len).map(|encoded| message.copy_to_slice(encoded)) {
            Some(Ok(len)) => {
                for &byte in &bytes[..len] {
                    self.push(byte);
                }
            }
            _ => warn!("unable to encode a {=usize} byte message", len),
        }
    }

    /// Queues a note-on.
    pub fn note_on(&mut self, channel: Channel, note: u8, velocity: u8) {
        self.send(&MidiMessage::NoteOn(
            channel,
            Note::from_u8_lossy(note),
            U7::from_u8_lossy(velocity),
        ));
    }

    /// Queues a note-off, encoded as a note-on with zero velocity so it shares running status with note-ons.
    pub fn note_off(&mut self, channel: Channel, note: u8) {
        self.note_on(channel, note, 0);
    }

    /// Queues a control change.
    pub fn control_change(&mut self, channel: Channel, controller: u8, value: u8) {
        self.send(&MidiMessage::ControlChange(
            channel,
            ControlFunction(U7::from_u8_lossy(controller)),
            U7::from_u8_lossy(value),
        ));
    }

    /// Queues a song position pointer, in sixteenth notes.
    pub fn song_position(&mut self, position: u16) {
        self.send(&MidiMessage::SongPositionPointer(u14(position)));
    }

    /// Queues a timing clock tick.
    pub fn timing_tick(&mut self) {
        self.send(&MidiMessage::TimingClock);
    }

    /// Queues a start.
    pub fn start(&mut self) {
        self.send(&MidiMessage::Start);
    }

    /// Queues a continue.
    pub fn continue_song(&mut self) {
        self.send(&MidiMessage::Continue);
    }

    /// Queues a stop.
    pub fn stop(&mut self) {
        self.send(&MidiMessage::Stop);
    }

    /// Queues an active sensing byte.
    pub fn active_sensing(&mut self) {
        self.send(&MidiMessage::ActiveSensing);
    }

    /// Wraps `data` (which must not include the start and end bytes) in a system exclusive envelope.
    pub fn sysex(&mut self, data: &[u8]) {
        self.push(SYSEX_START);
        for &byte in data {
            self.push(byte & 0x7F);
        }
        self.push(SYSEX_END);
    }

    /// Queues a first-party system exclusive message addressed from `device_type`.
    pub fn sysex_command(&mut self, device_type: u8, command: u8, data: &[u8]) {
        self.push(SYSEX_START);
        for &byte in MANUFACTURER_ID.iter().chain(&[device_type, command]).chain(data) {
            self.push(byte & 0x7F);
        }
        self.push(SYSEX_END);
    }
}
