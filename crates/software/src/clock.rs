//! Clock and transport control.
//!
//! Ticks arrive from one of three sources: the internal timer, the external clock input, or inbound MIDI clock. The
//! panel selects between internal and external; MIDI clock takes over from the external input for as long as it keeps
//! arriving. Whichever source is live, the [`ClockController`] echoes a timing tick and forwards the beat phase to the
//! [`Sequencer`].

use crate::panel::{Panel, Pot, Switch};
use crate::protocol::Transmitter;
use crate::sequencer::Sequencer;

/// Clock ticks per quarter note.
pub const TICKS_PER_BEAT: u8 = 24;

/// Timer ticks for which further external pulses are ignored after one is accepted.
pub const HOLDOFF_TICKS: u8 = 10;

/// Timer ticks without a step after which any sounding note is killed.
pub const NOTE_KILL_TICKS: u16 = 10_000;

/// Shortened kill countdown after the transport stops.
pub const NOTE_STOP_TICKS: u16 = 50;

/// Timer ticks for which inbound MIDI clock suppresses the other sources.
pub const MIDI_OVERRIDE_TICKS: u16 = 976;

/// Timer ticks the clock LED stays lit.
pub const CLOCK_LED_TICKS: u8 = 10;

/// Interval counts per step of the clock speed pot.
pub const INTERVAL_COUNTS_PER_STEP: u16 = 245;

/// Length of one interval count.
pub const MICROS_PER_COUNT: u32 = 2;

/// Clock speed pot readings below this stop the internal clock.
pub const SLOW_TEMPO: u8 = 2;

const INTERVAL_RANGE: u32 = 1 << 16;

/// The clock source selected on the panel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Ticks come from the internal timer.
    Internal,
    /// Ticks come from the external clock input, or from MIDI clock while it arrives.
    #[default]
    External,
}

/// Whether ticks advance the song.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transport {
    /// Ticks advance the song.
    Playing,
    /// Ticks are echoed but the song holds its position.
    #[default]
    Stopped,
}

/// Arbitrates between the clock sources and owns the song transport.
#[derive(Debug)]
pub struct ClockController {
    source: ClockSource,
    transport: Transport,
    interval: u16,
    tempo_pot: u8,
    slow: bool,
    phase: u8,
    midi_phase: u8,
    holdoff: u8,
    note_kill: u16,
    midi_override: u16,
    led_timeout: u8,
    reset_pressed: bool,
}

impl Default for ClockController {
    fn default() -> Self {
        Self {
            source: ClockSource::External,
            transport: Transport::Stopped,
            interval: u16::from(u8::MAX),
            tempo_pot: 0,
            slow: false,
            phase: 0,
            midi_phase: 0,
            holdoff: 0,
            note_kill: 0,
            midi_override: 0,
            led_timeout: 0,
            reset_pressed: false,
        }
    }
}

impl ClockController {
    /// Returns a stopped controller listening to the external clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the song from the top.
    pub fn start(&mut self, transmitter: &mut Transmitter) {
        self.restart(transmitter);
    }

    fn restart(&mut self, transmitter: &mut Transmitter) {
        transmitter.song_position(0);
        transmitter.start();
        self.transport = Transport::Playing;
    }

    fn advance(phase: &mut u8) {
        *phase += 1;
        if *phase >= TICKS_PER_BEAT {
            *phase = 0;
        }
    }

    /// Follows the clock source switch, the tempo pot and the reset controls, and runs the countdowns. Runs about once
    /// a millisecond.
    pub fn timer_task<P: Panel>(&mut self, panel: &mut P, sequencer: &mut Sequencer, transmitter: &mut Transmitter) {
        self.holdoff = self.holdoff.saturating_sub(1);

        if panel.switch(Switch::ClockSource) {
            let pot = panel.pot(Pot::ClockSpeed);
            if pot != self.tempo_pot || self.source == ClockSource::External {
                self.interval = u16::from(pot) * INTERVAL_COUNTS_PER_STEP;
                self.tempo_pot = pot;
                if pot < SLOW_TEMPO {
                    self.note_kill = NOTE_STOP_TICKS;
                    self.slow = true;
                    if self.transport == Transport::Playing {
                        debug!("tempo near zero; stopping");
                        transmitter.stop();
                        self.transport = Transport::Stopped;
                    }
                } else if self.slow {
                    debug!("tempo restored; continuing");
                    self.slow = false;
                    transmitter.continue_song();
                    self.transport = Transport::Playing;
                }
            }

            if self.source == ClockSource::External {
                debug!("internal clock selected");
                self.source = ClockSource::Internal;
                self.phase = 0;
                sequencer.clock_reset(true, panel);
                sequencer.kill_note(panel, transmitter);
                self.restart(transmitter);
            }
        } else if self.source == ClockSource::Internal {
            debug!("external clock selected");
            self.source = ClockSource::External;
            self.midi_phase = 0;
            self.phase = 0;
            sequencer.clock_reset(false, panel);
            sequencer.kill_note(panel, transmitter);
            self.restart(transmitter);
        }

        if self.note_kill > 0 {
            self.note_kill -= 1;
            if self.note_kill == 0 {
                debug!("no steps for a while; killing the note");
                sequencer.kill_note(panel, transmitter);
            }
        }

        if self.midi_override > 0 {
            self.midi_override -= 1;
            if self.midi_override == 0 {
                info!("MIDI clock timed out");
                self.phase = 0;
                transmitter.start();
                self.transport = Transport::Playing;
            }
        }

        let reset = panel.switch(Switch::EncoderSwitch) || panel.switch(Switch::ResetInput);
        if reset && !self.reset_pressed {
            self.reset(panel, sequencer, transmitter);
        }
        self.reset_pressed = reset;

        if self.led_timeout > 0 {
            panel.set_clock_led(true);
            self.led_timeout -= 1;
        } else {
            panel.set_clock_led(false);
        }
    }

    /// Rewinds the song and both phases, and tells downstream devices to start over.
    pub fn reset<P: Panel>(&mut self, panel: &mut P, sequencer: &mut Sequencer, transmitter: &mut Transmitter) {
        sequencer.reset_song(panel);
        self.midi_phase = 0;
        self.phase = 0;
        self.restart(transmitter);
    }

    /// Rewinds both phases without announcing it.
    pub fn reset_phases(&mut self) {
        self.midi_phase = 0;
        self.phase = 0;
    }

    /// Handles an expiry of the internal clock timer.
    pub fn internal_tick<P: Panel>(&mut self, panel: &mut P, sequencer: &mut Sequencer, transmitter: &mut Transmitter) {
        if self.source != ClockSource::Internal || self.midi_override_active() || self.slow {
            return;
        }

        transmitter.timing_tick();
        if self.transport == Transport::Playing {
            if self.phase == 0 {
                self.led_timeout = CLOCK_LED_TICKS;
            }
            sequencer.clock_change(self.phase, panel, transmitter);
            Self::advance(&mut self.phase);
            self.note_kill = NOTE_KILL_TICKS;
        }
    }

    /// Handles an edge on the external clock input.
    pub fn external_pulse<P: Panel>(
        &mut self,
        panel: &mut P,
        sequencer: &mut Sequencer,
        transmitter: &mut Transmitter,
    ) {
        if self.source != ClockSource::External || self.midi_override_active() || self.holdoff > 0 {
            return;
        }

        transmitter.timing_tick();
        self.holdoff = HOLDOFF_TICKS;
        if self.transport == Transport::Playing {
            self.led_timeout = CLOCK_LED_TICKS;
            sequencer.clock_change(self.phase, panel, transmitter);
            Self::advance(&mut self.phase);
            self.note_kill = NOTE_KILL_TICKS;
        }
    }

    /// Handles an inbound MIDI timing tick, which is echoed and takes over from the external input.
    pub fn midi_tick<P: Panel>(&mut self, panel: &mut P, sequencer: &mut Sequencer, transmitter: &mut Transmitter) {
        if self.source != ClockSource::External {
            return;
        }

        transmitter.timing_tick();
        if self.transport == Transport::Playing {
            if self.midi_phase == 0 {
                self.led_timeout = CLOCK_LED_TICKS;
            }
            sequencer.clock_change(self.midi_phase, panel, transmitter);
            Self::advance(&mut self.midi_phase);
            self.note_kill = NOTE_KILL_TICKS;
        }
        self.midi_override = MIDI_OVERRIDE_TICKS;
    }

    /// Handles an inbound song position pointer. Only the position within the beat is kept.
    pub fn midi_song_position(&mut self, position: u16) {
        self.midi_phase = (position & 0x03) as u8 * 6;
    }

    /// Handles an inbound start.
    pub fn midi_start<P: Panel>(&mut self, panel: &mut P, sequencer: &mut Sequencer, transmitter: &mut Transmitter) {
        debug!("MIDI start");
        transmitter.start();
        self.reset_phases();
        self.transport = Transport::Playing;
        sequencer.reset_song(panel);
    }

    /// Handles an inbound continue.
    pub fn midi_continue(&mut self, transmitter: &mut Transmitter) {
        debug!("MIDI continue");
        self.transport = Transport::Playing;
        transmitter.continue_song();
    }

    /// Handles an inbound stop. Any sounding note is killed shortly after.
    pub fn midi_stop(&mut self, transmitter: &mut Transmitter) {
        debug!("MIDI stop");
        self.transport = Transport::Stopped;
        transmitter.stop();
        self.note_kill = NOTE_STOP_TICKS;
    }

    /// Returns the selected clock source.
    pub fn source(&self) -> ClockSource {
        self.source
    }

    /// Returns true while inbound MIDI clock has recently been seen.
    pub fn midi_override_active(&self) -> bool {
        self.midi_override > 0
    }

    /// Returns the transport state.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Returns the phase driven by the internal timer and the external input.
    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// Returns the phase driven by MIDI clock.
    pub fn midi_phase(&self) -> u8 {
        self.midi_phase
    }

    /// Returns the internal clock interval, in counts preloaded into a 16-bit timer which counts up to overflow.
    pub fn interval(&self) -> u16 {
        self.interval
    }

    /// Returns the time between internal clock ticks.
    pub fn tick_period_micros(&self) -> u32 {
        (INTERVAL_RANGE - u32::from(self.interval)) * MICROS_PER_COUNT
    }
}
