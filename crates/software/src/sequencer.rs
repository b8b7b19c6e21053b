//! The pattern/motion playback engine.
//!
//! A [`Motion`] is a path of up to 64 grid positions. On each gated clock advance the [`Sequencer`] reads the next
//! position, checks it against the active [`Pattern`], and when the cell is active plays the [`Scale`] note stored
//! for that cell. Notes leave as CV/gate or X/Y levels on the two analog outputs and as MIDI.

mod motion;
pub use motion::*;

mod pattern;
pub use pattern::*;

mod random;
pub use random::*;

mod scale;
pub use scale::*;

use crate::configuration::{ClockDivision, Direction, NOTE_VELOCITY, OutputMode, OutputProfile, Span, Tonality};
use crate::panel::{GRID_ROWS, Layer, OutputChannel, POPUP_TICKS, Panel, Pot, Switch};
use crate::protocol::Transmitter;
use crate::storage::{Storage, Tables};
use wmidi::Channel;

/// Controller carrying the X level in X/Y mode.
pub const CC_X: u8 = 16;

/// Controller carrying the Y level in X/Y mode.
pub const CC_Y: u8 = 17;

/// Controller sent whenever a note is killed.
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Longest play length.
pub const MAX_PLAY_LENGTH: u8 = MOTION_LEN as u8;

/// Program change bit which selects keyboard-triggered playback.
pub const KEYBOARD_TRIGGER: u8 = 0x40;

/// MIDI note which plays scale notes untransposed.
pub const BASE_NOTE: u8 = 60;

/// Live modulations driven by MIDI controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Modulation {
    /// Floor for the pattern selection.
    PatternType,
    /// Offset added to the step before the motion is read.
    MotionStart,
    /// Floor for the play length.
    MotionLength,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Overrides {
    pattern_type: u8,
    motion_start: u8,
    motion_length: u8,
}

/// Owns all musical state: the loaded tables, the playback position and the sounding note.
#[derive(Debug)]
pub struct Sequencer {
    profile: OutputProfile,
    note_codes: [u16; 128],
    channel: Channel,
    motion: Motion,
    motion_index: u8,
    step: u8,
    position: GridPosition,
    pattern_index: u8,
    pattern: Pattern,
    tonality: Tonality,
    span: Span,
    scale: Scale,
    division: ClockDivision,
    pending_division: ClockDivision,
    division_count: u8,
    note: Option<u8>,
    gate_time: u8,
    gate_count: u8,
    gate_pulse: u8,
    output_offset: u8,
    output_mode: OutputMode,
    direction: Direction,
    midi_reverse: bool,
    play_length: u8,
    play_length_pot: u8,
    base_note: i8,
    keyboard_trigger: bool,
    held_key: Option<u8>,
    lfsr: Lfsr,
    overrides: Overrides,
}

impl Sequencer {
    /// Returns a sequencer which transmits on `channel`. Tables are empty until [`Sequencer::start`].
    pub fn new(profile: OutputProfile, channel: Channel) -> Self {
        Self {
            note_codes: profile.note_codes(),
            profile,
            channel,
            motion: Motion::default(),
            motion_index: 0,
            step: 0,
            position: GridPosition::default(),
            pattern_index: 0,
            pattern: Pattern::default(),
            tonality: Tonality::default(),
            span: Span::default(),
            scale: Scale::default(),
            division: ClockDivision::default(),
            pending_division: ClockDivision::default(),
            division_count: 0,
            note: None,
            gate_time: 0,
            gate_count: 0,
            gate_pulse: 0,
            output_offset: 0,
            output_mode: OutputMode::default(),
            direction: Direction::default(),
            midi_reverse: false,
            play_length: MAX_PLAY_LENGTH,
            play_length_pot: MAX_PLAY_LENGTH,
            base_note: 0,
            keyboard_trigger: false,
            held_key: None,
            lfsr: Lfsr::default(),
            overrides: Overrides::default(),
        }
    }

    /// Loads the first motion, pattern and scale and rewinds to the first step.
    pub fn start<S: Storage, P: Panel>(&mut self, tables: &mut Tables<S>, panel: &mut P) {
        self.reload_motion(tables);
        self.reload_pattern(tables, panel);
        self.reload_scale(tables);
        self.reset_song(panel);
    }

    /// Changes the channel notes and controllers are transmitted on.
    pub fn set_channel(&mut self, channel: Channel) {
        self.channel = channel;
    }

    /// Reads the panel. Runs about once a millisecond.
    ///
    /// Table selections reload on change, the clock division only becomes pending (see
    /// [`Sequencer::clock_change`]), and popups report new clock divisions and play lengths.
    pub fn timer_task<S: Storage, P: Panel>(
        &mut self,
        internal_clock: bool,
        tables: &mut Tables<S>,
        panel: &mut P,
        transmitter: &mut Transmitter,
    ) {
        if self.gate_pulse > 0 {
            self.gate_pulse -= 1;
            if let (0, Some(_), Some(sustain)) = (self.gate_pulse, self.note, self.profile.gate_sustain) {
                panel.set_output(OutputChannel::Two, sustain.level);
            }
        }

        let pattern_index = (panel.pot(Pot::PatternType) >> 3).max(self.overrides.pattern_type);
        if pattern_index != self.pattern_index {
            self.pattern_index = pattern_index;
            self.reload_pattern(tables, panel);
        }

        let tonality = Tonality::from_switch(panel.switch(Switch::Tonality));
        let span = Span::from_switch(panel.switch(Switch::Span));
        if tonality != self.tonality || span != self.span {
            self.tonality = tonality;
            self.span = span;
            self.reload_scale(tables);
        }

        self.direction = Direction::resolve(
            panel.switch(Switch::Direction),
            panel.switch(Switch::DirectionInput),
            self.midi_reverse,
        );

        self.gate_time = panel.pot(Pot::GateTime) >> 2;

        if internal_clock {
            self.pending_division = ClockDivision::Sixteenth;
        } else {
            let division = ClockDivision::from_pot(panel.pot(Pot::ClockSpeed));
            if division != self.pending_division {
                self.pending_division = division;
                panel.show_number(division.ticks(), POPUP_TICKS);
            }
        }

        self.output_offset = self.profile.output_offset(panel.pot(Pot::OutputOffset));

        match OutputMode::from_switch(panel.switch(Switch::OutputMode)) {
            mode if mode == self.output_mode => {}
            OutputMode::CvGate => {
                self.output_mode = OutputMode::CvGate;
                self.kill_note(panel, transmitter);
            }
            OutputMode::XY => {
                // the gate must drop while still in CV mode
                self.kill_note(panel, transmitter);
                self.output_mode = OutputMode::XY;
            }
        }

        let play_length_pot = (panel.pot(Pot::PlayLength) >> 2) + 1;
        if play_length_pot != self.play_length_pot {
            self.play_length_pot = play_length_pot;
            panel.show_number(play_length_pot, POPUP_TICKS);
        }
        self.play_length = play_length_pot.max(self.overrides.motion_length);

        let delta = panel.encoder_delta();
        if delta != 0 {
            let motion = self.motion_index.wrapping_add_signed(delta) & 0x3F;
            self.select_motion(motion, tables, panel);
        }
    }

    /// Handles one clock tick at `phase` (0 to 23) within the beat.
    ///
    /// Only every n-th tick advances the motion, where n is the clock division. A new division takes effect at the
    /// next phase 0 so the step grid never shifts mid-beat.
    pub fn clock_change<P: Panel>(&mut self, phase: u8, panel: &mut P, transmitter: &mut Transmitter) {
        if phase == 0 {
            self.division_count = 0;
            self.division = self.pending_division;
        } else {
            self.division_count = self.division_count.wrapping_add(1);
        }
        if self.division_count >= self.division.ticks() {
            self.division_count = 0;
        }
        if self.division_count != 0 {
            return;
        }

        if self.note.is_some() {
            self.gate_count = self.gate_count.saturating_add(1);
            if self.gate_count > self.gate_time || self.gate_count == u8::MAX {
                self.note_off(panel, transmitter);
            }
        }

        if self.keyboard_trigger && self.held_key.is_none() {
            return;
        }

        let offset = self.overrides.motion_start;
        self.motion.seed(Motion::read_index(self.step, offset), &mut self.lfsr);
        self.position = self.motion.position(self.step, offset);

        if self.pattern.is_active(self.position) {
            if self.note.is_some() {
                self.note_off(panel, transmitter);
            }
            self.note_on(self.scale.note(self.position.cell()), panel, transmitter);
        }
        self.render_ball(panel);

        self.step = match self.direction {
            Direction::Forward => self.motion.step_forward(self.step, self.play_length),
            Direction::Backward => self.motion.step_backward(self.step, self.play_length),
        };
    }

    /// Rewinds to the first step.
    pub fn reset_song<P: Panel>(&mut self, panel: &mut P) {
        self.step = 0;
        self.position = self.motion.position(0, 0);
        self.division_count = 0;
        self.render_ball(panel);
    }

    /// Relatches the clock division immediately, after the clock source changes.
    pub fn clock_reset<P: Panel>(&mut self, internal_clock: bool, panel: &mut P) {
        self.division_count = 0;
        self.pending_division = if internal_clock {
            ClockDivision::Sixteenth
        } else {
            ClockDivision::from_pot(panel.pot(Pot::ClockSpeed))
        };
        self.division = self.pending_division;
    }

    fn note_on<P: Panel>(&mut self, scale_note: u8, panel: &mut P, transmitter: &mut Transmitter) {
        match self.output_mode {
            OutputMode::CvGate => {
                let note = self.profile.transpose(scale_note, self.output_offset, self.base_note);
                self.note = Some(note);
                self.gate_count = 0;
                panel.set_output(OutputChannel::One, self.note_codes[usize::from(note)]);
                panel.set_output(OutputChannel::Two, self.profile.gate_on);
                if let Some(sustain) = self.profile.gate_sustain {
                    self.gate_pulse = sustain.pulse_ticks;
                }
                transmitter.note_on(self.channel, note, NOTE_VELOCITY);
            }
            OutputMode::XY => {
                let x = self.profile.xy_level(self.scale.xy(self.position.col()), self.output_offset);
                panel.set_output(OutputChannel::One, self.profile.level_code(x));
                transmitter.control_change(self.channel, CC_X, x);

                let y = self.profile.xy_level(self.scale.xy(self.position.row()), self.output_offset);
                panel.set_output(OutputChannel::Two, self.profile.level_code(y));
                transmitter.control_change(self.channel, CC_Y, y);
            }
        }
    }

    fn note_off<P: Panel>(&mut self, panel: &mut P, transmitter: &mut Transmitter) {
        if self.output_mode != OutputMode::CvGate {
            return;
        }
        panel.set_output(OutputChannel::Two, self.profile.gate_off);
        if let Some(note) = self.note.take() {
            transmitter.note_off(self.channel, note);
        }
        self.gate_count = 0;
        self.gate_pulse = 0;
    }

    /// Silences any sounding note and sends all-notes-off.
    pub fn kill_note<P: Panel>(&mut self, panel: &mut P, transmitter: &mut Transmitter) {
        if self.note.is_some() {
            self.note_off(panel, transmitter);
        }
        transmitter.control_change(self.channel, CC_ALL_NOTES_OFF, 0);
    }

    fn render_ball<P: Panel>(&self, panel: &mut P) {
        panel.clear_layer(Layer::Foreground);
        panel.draw_row(Layer::Foreground, self.position.row(), self.position.column_bit());
    }

    /// Handles a note-on from MIDI: transposes playback, and in keyboard-triggered mode holds the key.
    ///
    /// Returns true when the key press restarted the song, in which case the caller also rewinds the clock phase.
    pub fn midi_note_on<P: Panel>(&mut self, note: u8, panel: &mut P) -> bool {
        let note = note & 0x7F;
        self.base_note = note as i8 - BASE_NOTE as i8;
        if !self.keyboard_trigger {
            return false;
        }

        let restart = self.held_key.is_none();
        if restart {
            self.reset_song(panel);
        }
        self.held_key = Some(note);
        restart
    }

    /// Handles a note-off from MIDI, releasing the held key if it matches.
    pub fn midi_note_off(&mut self, note: u8) {
        if self.held_key == Some(note & 0x7F) {
            self.held_key = None;
        }
    }

    /// Inverts the direction of play while set.
    pub fn set_midi_reverse(&mut self, reverse: bool) {
        self.midi_reverse = reverse;
    }

    /// Applies a MIDI-driven modulation. `value` is a 7-bit controller value.
    pub fn modulate(&mut self, modulation: Modulation, value: u8) {
        let value = value & 0x7F;
        match modulation {
            Modulation::PatternType => self.overrides.pattern_type = value >> 2,
            Modulation::MotionStart => self.overrides.motion_start = value >> 1,
            Modulation::MotionLength => self.overrides.motion_length = value >> 1,
        }
    }

    /// Selects a motion. Bit 6 of `motion` selects keyboard-triggered playback.
    pub fn select_motion<S: Storage, P: Panel>(&mut self, motion: u8, tables: &mut Tables<S>, panel: &mut P) {
        self.motion_index = motion & 0x3F;
        self.keyboard_trigger = motion & KEYBOARD_TRIGGER == KEYBOARD_TRIGGER;
        self.draw_motion_overlay(panel);
        self.reload_motion(tables);
    }

    fn draw_motion_overlay<P: Panel>(&self, panel: &mut P) {
        let column = 1 << (self.motion_index & 0x07);
        panel.clear_layer(Layer::Overlay);
        for row in 0..GRID_ROWS {
            panel.draw_row(Layer::Overlay, row, column);
        }
        panel.draw_row(Layer::Overlay, self.motion_index >> 3, 0xFF);
        panel.show_overlay(POPUP_TICKS);
    }

    /// Reloads the selected motion. Generated motions start drawing again from the first step.
    pub fn reload_motion<S: Storage>(&mut self, tables: &mut Tables<S>) {
        if Motion::is_generated(self.motion_index) {
            self.motion = Motion::random(self.motion_index);
            self.step = 0;
        } else {
            self.motion = Motion::stored(tables.motion(self.motion_index));
        }
    }

    /// Reloads the selected pattern and draws it.
    pub fn reload_pattern<S: Storage, P: Panel>(&mut self, tables: &mut Tables<S>, panel: &mut P) {
        self.pattern = tables.pattern(self.pattern_index);
        for (row, &bits) in (0..GRID_ROWS).zip(self.pattern.rows()) {
            panel.draw_row(Layer::Background, row, bits);
        }
    }

    /// Reloads the scale for the selected tonality and span.
    pub fn reload_scale<S: Storage>(&mut self, tables: &mut Tables<S>) {
        self.scale = tables.scale(self.tonality, self.span);
    }

    /// Returns the index of the next step to play.
    pub fn step(&self) -> u8 {
        self.step
    }

    /// Returns the grid position played most recently.
    pub fn position(&self) -> GridPosition {
        self.position
    }

    /// Returns the sounding note, if any. Notes only sound in CV/gate mode.
    pub fn note(&self) -> Option<u8> {
        self.note
    }

    /// Returns the clock division in effect for the current beat.
    pub fn clock_division(&self) -> ClockDivision {
        self.division
    }

    /// Returns the clock division which takes effect at the next beat.
    pub fn pending_clock_division(&self) -> ClockDivision {
        self.pending_division
    }

    /// Returns the number of steps played before wrapping.
    pub fn play_length(&self) -> u8 {
        self.play_length
    }

    /// Returns the direction of play.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the output mode.
    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Returns the selected motion.
    pub fn motion_index(&self) -> u8 {
        self.motion_index
    }

    /// Returns the loaded motion.
    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    /// Returns the selected pattern.
    pub fn pattern_index(&self) -> u8 {
        self.pattern_index
    }

    /// Returns the loaded pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns the loaded scale.
    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    /// Returns true in keyboard-triggered mode.
    pub fn keyboard_trigger(&self) -> bool {
        self.keyboard_trigger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPanel;
    use crate::storage::MemoryStorage;

    struct Rig {
        sequencer: Sequencer,
        tables: Tables<MemoryStorage>,
        panel: MockPanel,
        transmitter: Transmitter,
    }

    impl Rig {
        fn new(profile: OutputProfile) -> Self {
            let mut rig = Self {
                sequencer: Sequencer::new(profile, Channel::Ch1),
                tables: Tables::new(MemoryStorage::factory()),
                panel: MockPanel::default(),
                transmitter: Transmitter::new(),
            };
            rig.sequencer.start(&mut rig.tables, &mut rig.panel);
            rig.timer_task();
            rig.sequencer.clock_reset(false, &mut rig.panel);
            rig
        }

        fn timer_task(&mut self) {
            self.sequencer
                .timer_task(false, &mut self.tables, &mut self.panel, &mut self.transmitter);
        }

        fn advance(&mut self) {
            self.sequencer.clock_change(0, &mut self.panel, &mut self.transmitter);
        }

        fn sent(&mut self) -> Vec<u8> {
            self.transmitter.drain().collect()
        }
    }

    fn rig() -> Rig {
        Rig::new(OutputProfile::eurorack())
    }

    #[test]
    fn sixteenths_advance_every_sixth_tick() {
        let mut rig = rig();
        for phase in 0..24 {
            rig.sequencer.clock_change(phase, &mut rig.panel, &mut rig.transmitter);
        }

        assert_eq!(4, rig.sequencer.step(), "Expected left but right");
        assert_eq!(
            vec![
                0x90, 48, 100, // step 0
                0x90, 48, 0, 0x90, 50, 100, // step 1
                0x90, 50, 0, 0x90, 52, 100, // step 2
                0x90, 52, 0, 0x90, 53, 100, // step 3
            ],
            rig.sent(),
            "Expected left but right"
        );
        assert_eq!(Some(53), rig.sequencer.note(), "Expected left but right");
    }

    #[test]
    fn pitch_follows_the_note_table() {
        let mut rig = rig();
        rig.advance();
        assert_eq!(2448, rig.panel.output(OutputChannel::One), "Expected left but right");
        assert_eq!(0, rig.panel.output(OutputChannel::Two), "Expected left but right");
    }

    #[test]
    fn new_division_waits_for_the_next_beat() {
        let mut rig = rig();
        rig.panel.set_pot(Pot::ClockSpeed, 0);
        rig.timer_task();

        assert_eq!(vec![24], rig.panel.numbers, "Expected left but right");
        assert_eq!(ClockDivision::Quarter, rig.sequencer.pending_clock_division());
        assert_eq!(ClockDivision::Sixteenth, rig.sequencer.clock_division());

        for phase in 1..24 {
            rig.sequencer.clock_change(phase, &mut rig.panel, &mut rig.transmitter);
        }
        assert_eq!(3, rig.sequencer.step(), "Expected left but right");

        for phase in 0..24 {
            rig.sequencer.clock_change(phase, &mut rig.panel, &mut rig.transmitter);
        }
        assert_eq!(ClockDivision::Quarter, rig.sequencer.clock_division());
        assert_eq!(4, rig.sequencer.step(), "Expected left but right");
    }

    #[test]
    fn internal_clock_plays_sixteenths() {
        let mut rig = rig();
        rig.panel.set_pot(Pot::ClockSpeed, 0);
        rig.sequencer
            .timer_task(true, &mut rig.tables, &mut rig.panel, &mut rig.transmitter);

        assert_eq!(ClockDivision::Sixteenth, rig.sequencer.pending_clock_division());
        assert!(rig.panel.numbers.is_empty());
    }

    #[test]
    fn gate_time_ends_notes() {
        let mut rig = rig();
        rig.tables.write_pattern(0, &Pattern::new([0x01, 0, 0, 0, 0, 0, 0, 0]));
        rig.sequencer.reload_pattern(&mut rig.tables, &mut rig.panel);
        rig.panel.set_pot(Pot::GateTime, 0);
        rig.timer_task();

        rig.advance();
        assert_eq!(Some(48), rig.sequencer.note(), "Expected left but right");
        rig.advance();
        assert_eq!(None, rig.sequencer.note(), "Expected left but right");
        assert_eq!(vec![0x90, 48, 100, 0x90, 48, 0], rig.sent(), "Expected left but right");
        assert_eq!(2047, rig.panel.output(OutputChannel::Two), "Expected left but right");
    }

    #[test]
    fn inactive_cells_are_silent() {
        let mut rig = rig();
        rig.tables.write_pattern(0, &Pattern::new([0; 8]));
        rig.sequencer.reload_pattern(&mut rig.tables, &mut rig.panel);

        rig.advance();
        rig.advance();
        assert!(rig.sent().is_empty());
        assert_eq!(2, rig.sequencer.step(), "Expected left but right");
        assert_eq!(
            0x02,
            rig.panel.layer(Layer::Foreground)[0],
            "Expected left but right"
        );
    }

    fn write_short_motion(rig: &mut Rig, len: u8) {
        let mut steps = [END_OF_MOTION; MOTION_LEN];
        for (i, step) in steps.iter_mut().take(usize::from(len)).enumerate() {
            *step = i as u8;
        }
        rig.tables.write_motion(0, &steps);
        rig.sequencer.select_motion(0, &mut rig.tables, &mut rig.panel);
    }

    #[test]
    fn end_marker_wraps_forward() {
        let mut rig = rig();
        write_short_motion(&mut rig, 3);

        let mut steps = Vec::new();
        for _ in 0..4 {
            rig.advance();
            steps.push(rig.sequencer.step());
        }
        assert_eq!(vec![1, 2, 0, 1], steps, "Expected left but right");
    }

    #[test]
    fn backward_skips_end_markers() {
        let mut rig = rig();
        write_short_motion(&mut rig, 3);
        rig.panel.set_switch(Switch::Direction, false);
        rig.timer_task();
        assert_eq!(Direction::Backward, rig.sequencer.direction());

        let mut steps = Vec::new();
        for _ in 0..4 {
            rig.advance();
            steps.push(rig.sequencer.step());
        }
        assert_eq!(vec![2, 1, 0, 2], steps, "Expected left but right");
    }

    #[test]
    fn play_length_wraps_and_pops_up() {
        let mut rig = rig();
        rig.panel.set_pot(Pot::PlayLength, 8);
        rig.timer_task();
        assert_eq!(3, rig.sequencer.play_length(), "Expected left but right");
        assert_eq!(vec![3], rig.panel.numbers, "Expected left but right");

        for _ in 0..3 {
            rig.advance();
        }
        assert_eq!(0, rig.sequencer.step(), "Expected left but right");
    }

    #[test]
    fn keyboard_trigger_waits_for_a_key() {
        let mut rig = rig();
        rig.sequencer
            .select_motion(KEYBOARD_TRIGGER, &mut rig.tables, &mut rig.panel);
        assert!(rig.sequencer.keyboard_trigger());

        rig.advance();
        assert!(rig.sent().is_empty());

        assert!(rig.sequencer.midi_note_on(64, &mut rig.panel));
        assert!(!rig.sequencer.midi_note_on(67, &mut rig.panel));
        rig.advance();
        assert_eq!(vec![0x90, 55, 100], rig.sent(), "Expected left but right");

        rig.sequencer.midi_note_off(64);
        rig.advance();
        assert!(!rig.sent().is_empty());

        rig.sequencer.midi_note_off(67);
        rig.advance();
        assert!(rig.sent().is_empty());
    }

    #[test]
    fn note_on_transposes_playback() {
        let mut rig = rig();
        assert!(!rig.sequencer.midi_note_on(48, &mut rig.panel));
        rig.advance();
        assert_eq!(vec![0x90, 36, 100], rig.sent(), "Expected left but right");
    }

    #[test]
    fn xy_mode_sends_levels() {
        let mut rig = rig();
        rig.advance();
        rig.sent();

        rig.panel.set_switch(Switch::OutputMode, false);
        rig.timer_task();
        assert_eq!(OutputMode::XY, rig.sequencer.output_mode());
        assert_eq!(
            vec![0x90, 48, 0, 0xB0, CC_ALL_NOTES_OFF, 0],
            rig.sent(),
            "Expected left but right"
        );

        rig.advance();
        assert_eq!(
            vec![0xB0, CC_X, 108, 0xB0, CC_Y, 127],
            rig.sent(),
            "Expected left but right"
        );
        assert_eq!(None, rig.sequencer.note(), "Expected left but right");
        assert_eq!(16, rig.panel.output(OutputChannel::Two), "Expected left but right");
    }

    /// Positions the generator yields for a motion masked with `mask`.
    fn drawn_positions(mask: u8, count: usize) -> Vec<u8> {
        let mut lfsr = Lfsr::default();
        (0..count).map(|_| lfsr.next_byte() & 0x7F & mask).collect()
    }

    fn play_positions(rig: &mut Rig, count: usize) -> (Vec<u8>, Vec<u8>) {
        let mut positions = Vec::new();
        let mut steps = Vec::new();
        for _ in 0..count {
            rig.advance();
            positions.push(rig.sequencer.position().raw());
            steps.push(rig.sequencer.step());
        }
        (positions, steps)
    }

    #[test]
    fn generated_motion_plays_each_drawn_entry() {
        let mut rig = rig();
        rig.sequencer
            .select_motion(STORED_MOTIONS, &mut rig.tables, &mut rig.panel);
        assert!(rig.sequencer.motion().is_seeding());

        let (positions, steps) = play_positions(&mut rig, 6);
        assert_eq!(drawn_positions(RANDOM_MASKS[0], 6), positions, "Expected left but right");
        assert_eq!(vec![1, 2, 3, 4, 5, 6], steps, "Expected left but right");
        assert!(rig.sequencer.motion().is_pending(6));
    }

    #[test]
    fn generated_motion_draws_at_the_start_offset() {
        let mut rig = rig();
        rig.sequencer
            .select_motion(STORED_MOTIONS, &mut rig.tables, &mut rig.panel);
        rig.sequencer.modulate(Modulation::MotionStart, 40);

        let (positions, _) = play_positions(&mut rig, 3);
        assert_eq!(drawn_positions(RANDOM_MASKS[0], 3), positions, "Expected left but right");
        let motion = rig.sequencer.motion();
        assert!(!motion.is_pending(20) && !motion.is_pending(22));
        assert!(motion.is_pending(0));
    }

    #[test]
    fn generated_motion_plays_backward() {
        let mut rig = rig();
        rig.panel.set_switch(Switch::Direction, false);
        rig.timer_task();
        rig.sequencer
            .select_motion(STORED_MOTIONS + 1, &mut rig.tables, &mut rig.panel);

        let (positions, steps) = play_positions(&mut rig, 3);
        assert_eq!(drawn_positions(RANDOM_MASKS[1], 3), positions, "Expected left but right");
        assert_eq!(vec![63, 62, 61], steps, "Expected left but right");
        let motion = rig.sequencer.motion();
        assert!(!motion.is_pending(0) && !motion.is_pending(63) && !motion.is_pending(62));
    }

    #[test]
    fn repeating_motion_draws_on_every_pass() {
        let mut rig = rig();
        rig.panel.set_switch(Switch::Direction, false);
        rig.panel.set_pot(Pot::PlayLength, 4);
        rig.timer_task();
        assert_eq!(2, rig.sequencer.play_length(), "Expected left but right");
        rig.sequencer
            .select_motion(REPEATING_MOTIONS, &mut rig.tables, &mut rig.panel);

        let (positions, steps) = play_positions(&mut rig, 4);
        assert_eq!(drawn_positions(RANDOM_MASKS[0], 4), positions, "Expected left but right");
        assert_eq!(vec![1, 0, 1, 0], steps, "Expected left but right");
        assert!(rig.sequencer.motion().is_seeding());
    }

    #[test]
    fn encoder_selects_motions() {
        let mut rig = rig();
        rig.panel.encoder = -1;
        rig.timer_task();

        assert_eq!(63, rig.sequencer.motion_index(), "Expected left but right");
        assert_eq!(vec![POPUP_TICKS], rig.panel.overlays, "Expected left but right");
        assert_eq!(0xFF, rig.panel.layer(Layer::Overlay)[7], "Expected left but right");
        assert_eq!(0x80, rig.panel.layer(Layer::Overlay)[0], "Expected left but right");
    }

    #[test]
    fn pattern_pot_redraws_the_background() {
        let mut rig = rig();
        let pattern = Pattern::new([1, 2, 4, 8, 16, 32, 64, 128]);
        rig.tables.write_pattern(1, &pattern);

        rig.panel.set_pot(Pot::PatternType, 8);
        rig.timer_task();
        assert_eq!(1, rig.sequencer.pattern_index(), "Expected left but right");
        assert_eq!(pattern.rows(), rig.panel.layer(Layer::Background));
    }

    #[test]
    fn modulation_sets_floors_and_offsets() {
        let mut rig = rig();
        rig.sequencer.modulate(Modulation::PatternType, 127);
        rig.sequencer.modulate(Modulation::MotionLength, 127);
        rig.sequencer.modulate(Modulation::MotionStart, 2);
        rig.panel.set_pot(Pot::PlayLength, 0);
        rig.timer_task();

        assert_eq!(31, rig.sequencer.pattern_index(), "Expected left but right");
        assert_eq!(63, rig.sequencer.play_length(), "Expected left but right");

        rig.advance();
        assert_eq!(1, rig.sequencer.position().raw(), "Expected left but right");
    }

    #[test]
    fn scale_switches_reload_notes() {
        let mut rig = rig();
        rig.panel.set_switch(Switch::Tonality, false);
        rig.panel.set_switch(Switch::Span, false);
        rig.timer_task();

        assert_eq!(&Scale::factory(Tonality::Minor, Span::Small), rig.sequencer.scale());
    }

    #[test]
    fn sustained_gate_settles_after_its_pulse() {
        let mut rig = Rig::new(OutputProfile::buchla());
        rig.advance();
        assert_eq!(0, rig.panel.output(OutputChannel::Two), "Expected left but right");

        for _ in 0..4 {
            rig.timer_task();
        }
        assert_eq!(1935, rig.panel.output(OutputChannel::Two), "Expected left but right");
    }

    #[test]
    fn kill_note_silences_and_broadcasts() {
        let mut rig = rig();
        rig.advance();
        rig.sent();

        rig.sequencer.kill_note(&mut rig.panel, &mut rig.transmitter);
        assert_eq!(None, rig.sequencer.note(), "Expected left but right");
        assert_eq!(
            vec![0x90, 48, 0, 0xB0, CC_ALL_NOTES_OFF, 0],
            rig.sent(),
            "Expected left but right"
        );
    }
}
