//! Binds the [`Panel`] collaborator to the board: two DAC channels, switch inputs, pot readings collected by the pot
//! task, and an 8×8 LED matrix scanned by the display task.

use embassy_stm32::{
    dac::{DacCh1, DacCh2, Value},
    gpio::{Input, Output},
    mode::Async,
    peripherals::DAC1,
};
use pattern_generator_lib::panel::{GRID_ROWS, Layer, OutputChannel, Panel, Pot, Switch};

/// Number of pots, in [`Pot`] order.
pub const POT_COUNT: usize = 5;

/// Number of switches and logic inputs, in [`Switch`] order.
pub const SWITCH_COUNT: usize = 8;

const ROWS: usize = GRID_ROWS as usize;
const LAYERS: usize = 3;

/// The front panel and the analog outputs.
pub struct HardwarePanel {
    channel_one: DacCh1<'static, DAC1, Async>,
    channel_two: DacCh2<'static, DAC1, Async>,
    switches: [Input<'static>; SWITCH_COUNT],
    clock_led: Output<'static>,
    pots: [u8; POT_COUNT],
    encoder: i8,
    layers: [[u8; ROWS]; LAYERS],
    popup_ticks: u16,
    number: Option<u8>,
}

impl HardwarePanel {
    /// Switch inputs are pulled up, so a closed switch reads low.
    pub fn new(
        channel_one: DacCh1<'static, DAC1, Async>,
        channel_two: DacCh2<'static, DAC1, Async>,
        switches: [Input<'static>; SWITCH_COUNT],
        clock_led: Output<'static>,
    ) -> Self {
        Self {
            channel_one,
            channel_two,
            switches,
            clock_led,
            pots: [0; POT_COUNT],
            encoder: 0,
            layers: [[0; ROWS]; LAYERS],
            popup_ticks: 0,
            number: None,
        }
    }

    /// Stores the latest reading of a pot.
    pub fn set_pot(&mut self, index: usize, value: u8) {
        if let Some(pot) = self.pots.get_mut(index) {
            *pot = value;
        }
    }

    /// Accumulates encoder detents until the engine next reads them.
    pub fn nudge_encoder(&mut self, delta: i8) {
        self.encoder = self.encoder.saturating_add(delta);
    }

    /// Returns the bits to light on `row`, counting down any popup once per full scan.
    pub fn scan_row(&mut self, row: usize) -> u8 {
        let row = row % ROWS;
        if row == ROWS - 1 {
            self.popup_ticks = self.popup_ticks.saturating_sub(ROWS as u16);
        }

        match (self.popup_ticks, self.number) {
            (0, _) => self.layers[Layer::Background as usize][row] ^ self.layers[Layer::Foreground as usize][row],
            // numbers show as a bar of lit cells
            (_, Some(number)) => {
                let lit = usize::from(number).saturating_sub(row * 8).min(8);
                ((1u16 << lit) - 1) as u8
            }
            (_, None) => self.layers[Layer::Overlay as usize][row],
        }
    }
}

impl Panel for HardwarePanel {
    fn pot(&mut self, pot: Pot) -> u8 {
        self.pots[pot as usize]
    }

    fn switch(&mut self, switch: Switch) -> bool {
        self.switches[switch as usize].is_low()
    }

    fn encoder_delta(&mut self) -> i8 {
        core::mem::take(&mut self.encoder)
    }

    fn set_output(&mut self, channel: OutputChannel, code: u16) {
        match channel {
            OutputChannel::One => self.channel_one.set(Value::Bit12Right(code)),
            OutputChannel::Two => self.channel_two.set(Value::Bit12Right(code)),
        }
    }

    fn draw_row(&mut self, layer: Layer, row: u8, bits: u8) {
        self.layers[layer as usize][usize::from(row) % ROWS] = bits;
    }

    fn clear_layer(&mut self, layer: Layer) {
        self.layers[layer as usize] = [0; ROWS];
    }

    fn show_overlay(&mut self, ticks: u16) {
        self.number = None;
        self.popup_ticks = ticks;
    }

    fn show_number(&mut self, value: u8, ticks: u16) {
        self.number = Some(value);
        self.popup_ticks = ticks;
    }

    fn set_clock_led(&mut self, on: bool) {
        if on {
            self.clock_led.set_high();
        } else {
            self.clock_led.set_low();
        }
    }
}
