//! Pattern Generator is [Embassy](https://embassy.dev)-based firmware for a MIDI-synchronized pattern generator. A
//! "motion" walks through an 8×8 "pattern" grid in time with an internal, external or MIDI clock; each active cell it
//! visits plays a note from a stored scale. Notes leave the device as [CV/gate](https://en.wikipedia.org/wiki/CV/gate)
//! or X/Y voltages and as MIDI. The firmware runs on the [Nucleo-F767ZI development
//! board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html).
//!
//! All behaviour lives in `pattern_generator_lib`; this crate only binds its collaborators to peripherals and runs the
//! interrupt-driven producers as tasks.

#![no_std]
#![no_main]

mod panel;

use crate::panel::{HardwarePanel, POT_COUNT};
use core::cell::RefCell;
use defmt::*;
use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_stm32::{
    Config,
    adc::{Adc, AdcChannel, AnyAdcChannel},
    bind_interrupts,
    dac::Dac,
    exti::ExtiInput,
    gpio::{Input, Level, Output, Pull, Speed},
    mode::Async,
    peripherals::{self, ADC1},
    time::Hertz,
    usart::{self, RingBufferedUartRx, Uart, UartTx},
};
use embassy_sync::{
    blocking_mutex::{Mutex, raw::CriticalSectionRawMutex},
    signal::Signal,
};
use embassy_time::{Duration, Ticker, Timer};
use pattern_generator_lib::{
    configuration::{EngineConfig, OutputProfile},
    engine::{Engine, Status},
    panel::{OutputChannel, Panel, Switch},
    storage::{MemoryEeprom, MemoryStorage},
};
use static_cell::StaticCell;

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        USART3 => usart::InterruptHandler<peripherals::USART3>;
    }
);

/// MIDI runs at 31.25 kbaud.
const MIDI_BAUD: u32 = 31_250;

/// Period of [`Engine::periodic`].
const PERIODIC_MICROS: u64 = 256;

/// Roughly the time taken to send one MIDI byte.
const BYTE_MICROS: u64 = 320;

/// Everything the tasks share. Interrupt-driven tasks and the periodic task each hold the lock only for the duration of
/// one engine call.
struct Device {
    engine: Engine<MemoryStorage, MemoryEeprom>,
    panel: HardwarePanel,
}

type SharedDevice = Mutex<CriticalSectionRawMutex, RefCell<Device>>;

fn with_device<R>(device: &SharedDevice, f: impl FnOnce(&mut Device) -> R) -> R {
    device.lock(|cell| f(&mut cell.borrow_mut()))
}

/// Publishes the internal clock period whenever the tempo changes.
static TICK_PERIOD: Signal<CriticalSectionRawMutex, u32> = Signal::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing Pattern Generator");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            divq: None,
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
    }
    let p = embassy_stm32::init(config);

    // per RM0410, DAC channel 1 outputs on port A, pin 4 and channel 2 on pin 5
    let (channel_one, channel_two) =
        Dac::new(p.DAC1, p.DMA1_CH5, p.DMA1_CH6, p.PA4, p.PA5).split();

    // switches close to ground, in `Switch` order
    let switches = [
        Input::new(p.PF13, Pull::Up),
        Input::new(p.PE9, Pull::Up),
        Input::new(p.PE11, Pull::Up),
        Input::new(p.PF14, Pull::Up),
        Input::new(p.PE13, Pull::Up),
        Input::new(p.PF15, Pull::Up),
        Input::new(p.PG14, Pull::Up),
        Input::new(p.PG9, Pull::Up),
    ];
    let clock_led = Output::new(p.PB0, Level::Low, Speed::Low);
    let mut panel = HardwarePanel::new(channel_one, channel_two, switches, clock_led);

    // a jumper to ground selects Buchla levels
    let profile_jumper = Input::new(p.PG2, Pull::Up);
    let profile = if profile_jumper.is_low() {
        OutputProfile::buchla()
    } else {
        OutputProfile::eurorack()
    };

    let engine_config = EngineConfig {
        profile,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(engine_config, MemoryStorage::factory(), MemoryEeprom::new());

    // holding reset at power-up learns the MIDI channel from the next channel message
    if panel.switch(Switch::ResetInput) || panel.switch(Switch::EncoderSwitch) {
        info!("Learning MIDI channel");
        engine.set_midi_learn(true);
    }
    engine.start(&mut panel);

    static DEVICE: StaticCell<SharedDevice> = StaticCell::new();
    let device = DEVICE.init(Mutex::new(RefCell::new(Device { engine, panel })));

    let mut uart_config = usart::Config::default();
    uart_config.baudrate = MIDI_BAUD;
    let uart = unwrap!(Uart::new(
        p.USART3,
        p.PD9,
        p.PD8,
        Irqs,
        p.DMA1_CH3,
        p.DMA1_CH1,
        uart_config
    ));
    let (tx, rx) = uart.split();

    static RX_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();
    let rx = rx.into_ring_buffered(RX_BUFFER.init([0; 64]));
    unwrap!(spawner.spawn(midi_rx_task(rx, device)));
    unwrap!(spawner.spawn(midi_tx_task(tx, device)));

    unwrap!(spawner.spawn(periodic_task(device)));
    unwrap!(spawner.spawn(internal_clock_task(device)));

    let clock_input = ExtiInput::new(p.PC13, p.EXTI13, Pull::None);
    unwrap!(spawner.spawn(clock_input_task(clock_input, device)));

    let encoder_a = ExtiInput::new(p.PD1, p.EXTI1, Pull::Up);
    let encoder_b = Input::new(p.PD0, Pull::Up);
    unwrap!(spawner.spawn(encoder_task(encoder_a, encoder_b, device)));

    let pots = [
        p.PA3.degrade_adc(),
        p.PC0.degrade_adc(),
        p.PC3.degrade_adc(),
        p.PB1.degrade_adc(),
        p.PC2.degrade_adc(),
    ];
    unwrap!(spawner.spawn(pot_task(Adc::new(p.ADC1), pots, device)));

    let rows = [
        Output::new(p.PE2, Level::High, Speed::Low),
        Output::new(p.PE3, Level::High, Speed::Low),
        Output::new(p.PE4, Level::High, Speed::Low),
        Output::new(p.PE5, Level::High, Speed::Low),
        Output::new(p.PE6, Level::High, Speed::Low),
        Output::new(p.PF8, Level::High, Speed::Low),
        Output::new(p.PF7, Level::High, Speed::Low),
        Output::new(p.PF9, Level::High, Speed::Low),
    ];
    let columns = [
        Output::new(p.PD7, Level::Low, Speed::Low),
        Output::new(p.PD6, Level::Low, Speed::Low),
        Output::new(p.PD5, Level::Low, Speed::Low),
        Output::new(p.PD4, Level::Low, Speed::Low),
        Output::new(p.PD3, Level::Low, Speed::Low),
        Output::new(p.PE10, Level::Low, Speed::Low),
        Output::new(p.PE12, Level::Low, Speed::Low),
        Output::new(p.PE14, Level::Low, Speed::Low),
    ];
    unwrap!(spawner.spawn(display_task(rows, columns, device)));
}

/// Runs the engine's periodic work, and resets the MCU when a restart is requested.
#[embassy_executor::task]
async fn periodic_task(device: &'static SharedDevice) -> ! {
    let mut ticker = Ticker::every(Duration::from_micros(PERIODIC_MICROS));
    let mut tick_period = 0;

    loop {
        ticker.next().await;
        let (status, period) = with_device(device, |device| {
            let status = device.engine.periodic(&mut device.panel);
            (status, device.engine.tick_period_micros())
        });

        if period != tick_period {
            tick_period = period;
            TICK_PERIOD.signal(period);
        }

        if status == Status::Restart {
            warn!("Restarting");
            with_device(device, |device| {
                device.panel.set_output(OutputChannel::One, 0);
                device.panel.set_output(OutputChannel::Two, 0);
            });
            cortex_m::peripheral::SCB::sys_reset();
        }
    }
}

/// Produces internal clock ticks, restarting the interval whenever the tempo changes.
#[embassy_executor::task]
async fn internal_clock_task(device: &'static SharedDevice) -> ! {
    let mut period = TICK_PERIOD.wait().await;
    loop {
        match select(
            Timer::after_micros(u64::from(period)),
            TICK_PERIOD.wait(),
        )
        .await
        {
            Either::First(_) => with_device(device, |device| device.engine.internal_tick(&mut device.panel)),
            Either::Second(new_period) => {
                debug!("Internal clock period is now {} us", new_period);
                period = new_period;
            }
        }
    }
}

/// Forwards edges on the external clock input.
#[embassy_executor::task]
async fn clock_input_task(mut input: ExtiInput<'static>, device: &'static SharedDevice) -> ! {
    loop {
        input.wait_for_rising_edge().await;
        with_device(device, |device| device.engine.external_pulse(&mut device.panel));
    }
}

/// Decodes the motion encoder. Channel B's level at each rising edge of channel A gives the direction.
#[embassy_executor::task]
async fn encoder_task(
    mut channel_a: ExtiInput<'static>,
    channel_b: Input<'static>,
    device: &'static SharedDevice,
) -> ! {
    loop {
        channel_a.wait_for_rising_edge().await;
        let delta = if channel_b.is_high() { 1 } else { -1 };
        with_device(device, |device| device.panel.nudge_encoder(delta));
    }
}

/// Samples one pot per millisecond.
#[embassy_executor::task]
async fn pot_task(
    mut adc: Adc<'static, ADC1>,
    mut pots: [AnyAdcChannel<ADC1>; POT_COUNT],
    device: &'static SharedDevice,
) -> ! {
    let mut index = 0;
    loop {
        Timer::after_millis(1).await;
        // 12-bit readings, of which the engine uses the top eight
        let value = (adc.blocking_read(&mut pots[index]) >> 4) as u8;
        with_device(device, |device| device.panel.set_pot(index, value));
        index = (index + 1) % POT_COUNT;
    }
}

/// Scans the LED matrix one row per millisecond. Rows are active low.
#[embassy_executor::task]
async fn display_task(
    mut rows: [Output<'static>; 8],
    mut columns: [Output<'static>; 8],
    device: &'static SharedDevice,
) -> ! {
    let mut row = 0;
    loop {
        let bits = with_device(device, |device| device.panel.scan_row(row));

        rows[(row + rows.len() - 1) % rows.len()].set_high();
        for (column, output) in columns.iter_mut().enumerate() {
            if bits & (1 << column) != 0 {
                output.set_high();
            } else {
                output.set_low();
            }
        }
        rows[row].set_low();

        row = (row + 1) % rows.len();
        Timer::after_millis(1).await;
    }
}

/// Queues inbound MIDI bytes for the engine.
#[embassy_executor::task]
async fn midi_rx_task(mut rx: RingBufferedUartRx<'static>, device: &'static SharedDevice) -> ! {
    let mut buf = [0; 16];
    loop {
        match rx.read(&mut buf).await {
            Ok(n) => with_device(device, |device| {
                for &byte in &buf[..n] {
                    device.engine.receive_byte(byte);
                }
            }),
            Err(e) => warn!("MIDI receive error: {}", e),
        }
    }
}

/// Sends queued outbound MIDI bytes. The link is ready whenever the previous write has completed.
#[embassy_executor::task]
async fn midi_tx_task(mut tx: UartTx<'static, Async>, device: &'static SharedDevice) -> ! {
    loop {
        match with_device(device, |device| device.engine.poll_transmit(true)) {
            Some(byte) => {
                if let Err(e) = tx.write(&[byte]).await {
                    warn!("MIDI transmit error: {}", e);
                }
            }
            None => Timer::after_micros(BYTE_MICROS).await,
        }
    }
}
