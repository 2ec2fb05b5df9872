#![no_std]
#![no_main]
#![warn(clippy::all)]

use core::cell::RefCell;
use critical_section::Mutex;
use defmt::{info, panic, warn};
use defmt_rtt as _;
use embedded_hal::digital::InputPin;
use fugit::RateExtU32;
use hz_meter::alarm_timebase::{clear_alarm_interrupt, read_timer, AlarmTimebase, SharedAlarm};
use hz_meter::clock_utils::enable_calibration_output;
use hz_meter::config::{CountingMode, MeterConfig};
use hz_meter::constants::{FIRMWARE_VERSION, SYSTEM_CLOCK_HZ};
use hz_meter::frequency::Channels;
use hz_meter::gate::{
    close_window, on_latch_edge, GateController, MasterTriggerGate, SoftwareLatchGate,
    WindowSignal,
};
use hz_meter::orchestrator::Orchestrator;
use hz_meter::publisher::{FramePublisher, LogPublisher, Publisher};
use hz_meter::pulse_counter::PulseCounter;
use hz_meter::pwm_counter::{PwmCounter, SliceGroup};
use hz_meter::rp2040_flash::load_meter_config;
use panic_probe as _;
use rp2040_hal as hal;

use hal::clocks::init_clocks_and_plls;
use hal::gpio::{self, bank0::Gpio15, FunctionSioInput, Pin, PullDown};
use hal::pac::{self, interrupt};
use hal::uart::{DataBits, StopBits, UartConfig, UartPeripheral};
use hal::{Clock, Sio, Timer, Watchdog};

#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

const XOSC_CRYSTAL_FREQ: u32 = 12_000_000;
const TELEMETRY_BAUD_RATE: u32 = 115_200;

// Inputs go to the B pin of each slice: GPIO5 is slice 2 B, GPIO7 is slice 3 B.
const CHANNEL_1_SLICE: u8 = 2;
const CHANNEL_2_SLICE: u8 = 3;
// No pin, counts the divided system clock.
const REFERENCE_SLICE: u8 = 4;

static CHANNEL_1: PulseCounter<PwmCounter> = PulseCounter::new(PwmCounter::new(CHANNEL_1_SLICE));
static CHANNEL_2: PulseCounter<PwmCounter> = PulseCounter::new(PwmCounter::new(CHANNEL_2_SLICE));
static REFERENCE: PulseCounter<PwmCounter> = PulseCounter::new(PwmCounter::new(REFERENCE_SLICE));

static DIRECT_SLAVES: SliceGroup = SliceGroup::new(
    PwmCounter::new(CHANNEL_1_SLICE).mask() | PwmCounter::new(CHANNEL_2_SLICE).mask(),
);
static RECIPROCAL_SLAVES: SliceGroup = SliceGroup::new(
    PwmCounter::new(CHANNEL_1_SLICE).mask() | PwmCounter::new(REFERENCE_SLICE).mask(),
);

static WINDOW_SIGNAL: WindowSignal = WindowSignal::new();
static WINDOW_ALARM: SharedAlarm = Mutex::new(RefCell::new(None));

type LatchFeedbackPin = Pin<Gpio15, FunctionSioInput, PullDown>;
static LATCH_FEEDBACK: Mutex<RefCell<Option<LatchFeedbackPin>>> = Mutex::new(RefCell::new(None));

#[hal::entry]
fn main() -> ! {
    info!("Startup hz-meter-firmware {}", FIRMWARE_VERSION);
    let mut peripherals = pac::Peripherals::take().unwrap();
    let mut watchdog = Watchdog::new(peripherals.WATCHDOG);
    let clocks = init_clocks_and_plls(
        XOSC_CRYSTAL_FREQ,
        peripherals.XOSC,
        peripherals.CLOCKS,
        peripherals.PLL_SYS,
        peripherals.PLL_USB,
        &mut peripherals.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();
    let system_clock_freq = clocks.system_clock.freq();
    info!("System clock speed {}MHz", system_clock_freq.to_MHz());
    if system_clock_freq.to_Hz() != SYSTEM_CLOCK_HZ {
        warn!(
            "System clock is not the expected {}Hz, the reference frequency will be off",
            SYSTEM_CLOCK_HZ
        );
    }

    let config = match load_meter_config() {
        Ok(config) => config,
        Err(e) => {
            warn!("No usable stored config ({}), using defaults", e);
            MeterConfig::default()
        }
    };
    info!("Config {}", config);
    if let Some(ceiling) = config.max_trackable_frequency_hz() {
        info!(
            "Overflow tracking holds up to {}Hz with {}us interrupt latency",
            ceiling,
            config.max_isr_latency.ticks()
        );
    }

    let mut timer = Timer::new(peripherals.TIMER, &mut peripherals.RESETS, &clocks);
    let sio = Sio::new(peripherals.SIO);
    let pins = gpio::Pins::new(
        peripherals.IO_BANK0,
        peripherals.PADS_BANK0,
        sio.gpio_bank0,
        &mut peripherals.RESETS,
    );
    // Takes the PWM block out of reset, the slices themselves are driven through PwmCounter.
    let _slices = hal::pwm::Slices::new(peripherals.PWM, &mut peripherals.RESETS);

    let uart_pins = (
        pins.gpio0.into_function::<gpio::FunctionUart>(),
        pins.gpio1.into_function::<gpio::FunctionUart>(),
    );
    let uart = UartPeripheral::new(peripherals.UART0, uart_pins, &mut peripherals.RESETS)
        .enable(
            UartConfig::new(TELEMETRY_BAUD_RATE.Hz(), DataBits::Eight, None, StopBits::One),
            clocks.peripheral_clock.freq(),
        )
        .unwrap();
    let publisher = (LogPublisher, FramePublisher::new(uart));

    if let Some(target) = config.calibration_output {
        let _calibration_pin = pins.gpio21.into_function::<gpio::FunctionClock>();
        let clocks_block = unsafe { &*pac::CLOCKS::ptr() };
        if let Some(actual) = enable_calibration_output(clocks_block, system_clock_freq, target) {
            info!("Calibration clock on GPIO21 at {}Hz", actual.to_Hz());
        }
    }

    let _channel_1_input = pins.gpio5.into_function::<gpio::FunctionPwm>();
    CHANNEL_1
        .hardware()
        .configure_edge_counter(config.wrap_threshold);
    CHANNEL_1.hardware().enable_wrap_interrupt();

    match config.counting_mode {
        CountingMode::Direct => {
            let channels = if config.channel_count == 2 {
                let _channel_2_input = pins.gpio7.into_function::<gpio::FunctionPwm>();
                CHANNEL_2
                    .hardware()
                    .configure_edge_counter(config.wrap_threshold);
                CHANNEL_2.hardware().enable_wrap_interrupt();
                Channels::pair(&CHANNEL_1, &CHANNEL_2)
            } else {
                Channels::single(&CHANNEL_1)
            };

            let alarm = timer.alarm_0().unwrap();
            critical_section::with(|cs| WINDOW_ALARM.borrow_ref_mut(cs).replace(alarm));
            let gate = MasterTriggerGate::new(
                AlarmTimebase::new(&WINDOW_ALARM),
                &DIRECT_SLAVES,
                &WINDOW_SIGNAL,
                config.window,
                wait_for_window_interrupt,
            );
            unsafe {
                pac::NVIC::unmask(pac::Interrupt::PWM_IRQ_WRAP);
                pac::NVIC::unmask(pac::Interrupt::TIMER_IRQ_0);
            }
            run(&config, gate, channels, publisher)
        }
        CountingMode::Reciprocal => {
            REFERENCE
                .hardware()
                .configure_reference(config.reference_divider, config.wrap_threshold);
            REFERENCE.hardware().enable_wrap_interrupt();
            info!(
                "Reference is clk_sys/{}, calibrated at {}Hz",
                config.reference_divider,
                config.reference_frequency.raw()
            );

            let gate_output = pins.gpio14.into_push_pull_output();
            let mut latch_feedback = pins.gpio15.into_pull_down_input();
            latch_feedback.set_interrupt_enabled(gpio::Interrupt::EdgeHigh, true);
            latch_feedback.set_interrupt_enabled(gpio::Interrupt::EdgeLow, true);
            critical_section::with(|cs| LATCH_FEEDBACK.borrow_ref_mut(cs).replace(latch_feedback));
            unsafe {
                pac::NVIC::unmask(pac::Interrupt::PWM_IRQ_WRAP);
                pac::NVIC::unmask(pac::Interrupt::IO_IRQ_BANK0);
            }

            let gate = SoftwareLatchGate::new(gate_output, timer, config.window, config.settle);
            run(&config, gate, Channels::pair(&CHANNEL_1, &REFERENCE), publisher)
        }
    }
}

fn run<G: GateController, P: Publisher>(
    config: &MeterConfig,
    gate: G,
    channels: Channels<'static>,
    publisher: P,
) -> ! {
    match Orchestrator::new(config, gate, channels, publisher) {
        Ok(mut orchestrator) => orchestrator.run(),
        Err(e) => panic!("Can't start measuring: {}", e),
    }
}

/// Sleep until an interrupt, unless the window already closed. Checking and sleeping
/// with interrupts masked means a close that lands in between still wakes the core.
fn wait_for_window_interrupt() {
    cortex_m::interrupt::free(|_cs| {
        if !WINDOW_SIGNAL.is_raised() {
            cortex_m::asm::wfi();
        }
    });
}

#[interrupt]
fn PWM_IRQ_WRAP() {
    CHANNEL_1.on_overflow();
    CHANNEL_2.on_overflow();
    REFERENCE.on_overflow();
}

#[interrupt]
fn TIMER_IRQ_0() {
    let now = read_timer();
    close_window(&DIRECT_SLAVES, &WINDOW_SIGNAL, now);
    clear_alarm_interrupt(&WINDOW_ALARM);
}

#[interrupt]
fn IO_IRQ_BANK0() {
    critical_section::with(|cs| {
        if let Some(latch) = LATCH_FEEDBACK.borrow_ref_mut(cs).as_mut() {
            latch.clear_interrupt(gpio::Interrupt::EdgeHigh);
            latch.clear_interrupt(gpio::Interrupt::EdgeLow);
            let latch_is_high = InputPin::is_high(latch).unwrap_or(false);
            on_latch_edge(&RECIPROCAL_SLAVES, latch_is_high);
        }
    });
}
