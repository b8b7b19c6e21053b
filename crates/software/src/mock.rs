use crate::panel::{GRID_ROWS, Layer, OutputChannel, Panel, Pot, Switch};

/// A panel which holds its control positions in memory and records everything drawn or output.
#[derive(Debug, Clone)]
pub struct MockPanel {
    pub pots: [u8; 5],
    pub switches: [bool; 8],
    pub encoder: i8,
    pub outputs: [u16; 2],
    pub output_log: Vec<(OutputChannel, u16)>,
    pub rows: [[u8; GRID_ROWS as usize]; 3],
    pub overlays: Vec<u16>,
    pub numbers: Vec<u8>,
    pub clock_led: bool,
}

impl Default for MockPanel {
    fn default() -> Self {
        let mut panel = Self {
            pots: [0; 5],
            switches: [false; 8],
            encoder: 0,
            outputs: [0; 2],
            output_log: Vec::new(),
            rows: [[0; GRID_ROWS as usize]; 3],
            overlays: Vec::new(),
            numbers: Vec::new(),
            clock_led: false,
        };
        // forward, major, large span, CV/gate, external clock, sixteenths, longest gates and motions, no transposition
        panel.set_switch(Switch::Direction, true);
        panel.set_switch(Switch::Tonality, true);
        panel.set_switch(Switch::Span, true);
        panel.set_switch(Switch::OutputMode, true);
        panel.set_pot(Pot::ClockSpeed, 3 << 5);
        panel.set_pot(Pot::PlayLength, 255);
        panel.set_pot(Pot::GateTime, 255);
        panel.set_pot(Pot::OutputOffset, 128);
        panel
    }
}

impl MockPanel {
    pub fn set_pot(&mut self, pot: Pot, value: u8) {
        self.pots[pot as usize] = value;
    }

    pub fn set_switch(&mut self, switch: Switch, on: bool) {
        self.switches[switch as usize] = on;
    }

    pub fn output(&self, channel: OutputChannel) -> u16 {
        self.outputs[channel as usize]
    }

    pub fn layer(&self, layer: Layer) -> &[u8; GRID_ROWS as usize] {
        &self.rows[layer as usize]
    }
}

impl Panel for MockPanel {
    fn pot(&mut self, pot: Pot) -> u8 {
        self.pots[pot as usize]
    }

    fn switch(&mut self, switch: Switch) -> bool {
        self.switches[switch as usize]
    }

    fn encoder_delta(&mut self) -> i8 {
        core::mem::take(&mut self.encoder)
    }

    fn set_output(&mut self, channel: OutputChannel, code: u16) {
        self.outputs[channel as usize] = code;
        self.output_log.push((channel, code));
    }

    fn draw_row(&mut self, layer: Layer, row: u8, bits: u8) {
        self.rows[layer as usize][usize::from(row & 0x07)] = bits;
    }

    fn clear_layer(&mut self, layer: Layer) {
        self.rows[layer as usize] = [0; GRID_ROWS as usize];
    }

    fn show_overlay(&mut self, ticks: u16) {
        self.overlays.push(ticks);
    }

    fn show_number(&mut self, value: u8, _ticks: u16) {
        self.numbers.push(value);
    }

    fn set_clock_led(&mut self, on: bool) {
        self.clock_led = on;
    }
}
