//! Analog sensor sampling: cable-tension (four-cable kinematics) or
//! pressure (pressure-regulated kinematics) feedback, depending on which
//! variant the board is configured for. Converts each reading through
//! `driver-analog-input`'s circuit model and smoothing window, then
//! publishes the result for `proto_bridge` to fold into the next status
//! report.

use core::cell::RefCell;
use critical_section::Mutex;
use driver_analog_input::{AnalogInputPin, CircuitModel};

use crate::fixed_point::Fixed16_16;

const SAMPLE_WINDOW: usize = 8;

static SENSOR_A: Mutex<RefCell<AnalogInputPin<SAMPLE_WINDOW>>> = Mutex::new(RefCell::new(AnalogInputPin::new(
    CircuitModel::External { scale: 1.0, offset: 0.0 },
    3.0,
    0,
)));
static SENSOR_B: Mutex<RefCell<AnalogInputPin<SAMPLE_WINDOW>>> = Mutex::new(RefCell::new(AnalogInputPin::new(
    CircuitModel::External { scale: 1.0, offset: 0.0 },
    3.0,
    1,
)));

/// Returns the two configured channels' latest smoothed readings, in
/// 16.16 fixed point -- the sampling path runs well below the planning
/// core, and converting once here means the status-report encoder never
/// needs to touch `f32`.
pub fn latest_readings() -> (Option<Fixed16_16>, Option<Fixed16_16>) {
    critical_section::with(|cs| {
        let a = SENSOR_A.borrow(cs).borrow().resistance().map(Fixed16_16::from_float);
        let b = SENSOR_B.borrow(cs).borrow().resistance().map(Fixed16_16::from_float);
        (a, b)
    })
}

fn record_samples(voltage_a: f32, voltage_b: f32) {
    critical_section::with(|cs| {
        SENSOR_A.borrow(cs).borrow_mut().sample(voltage_a);
        SENSOR_B.borrow(cs).borrow_mut().sample(voltage_b);
    });
}

/// The analog sampling task.
///
/// Periodically samples both configured channels and folds the raw ADC
/// counts into the smoothing windows above.
#[cfg(feature = "embassy-rt")]
#[embassy_executor::task]
pub async fn adc_task(
    mut adc: embassy_stm32::adc::Adc<'static, embassy_stm32::peripherals::ADC1>,
    mut pin_a: embassy_stm32::gpio::AnyPin,
    mut pin_b: embassy_stm32::gpio::AnyPin,
) {
    use embassy_time::{Duration, Timer};

    defmt::info!("Analog sensor task started");

    loop {
        let raw_a = adc.blocking_read(&mut pin_a);
        let raw_b = adc.blocking_read(&mut pin_b);
        let voltage_a = (raw_a as f32 / 4095.0) * 3.3;
        let voltage_b = (raw_b as f32 / 4095.0) * 3.3;
        record_samples(voltage_a, voltage_b);
        Timer::after(Duration::from_millis(10)).await;
    }
}
