//! Pin mappings for the MKS SKIPR board.
//! This is a starting point and may need to be adjusted based on your specific setup.

use embassy_stm32::gpio::{AnyPin, Pin};
use embassy_stm32::peripherals::{ADC1, USART1};

/// Struct to hold all the board pins and the peripherals the firmware
/// tasks need direct ownership of (UART for the host link, ADC for the
/// analog sensor channels).
pub struct BoardPins {
    pub led: AnyPin,
    pub stepper_x_step: AnyPin,
    pub stepper_x_dir: AnyPin,
    pub stepper_y_step: AnyPin,
    pub stepper_y_dir: AnyPin,
    pub stepper_z_step: AnyPin,
    pub stepper_z_dir: AnyPin,
    pub stepper_e_step: AnyPin,
    pub stepper_e_dir: AnyPin,
    /// Cable-tension or pressure-sensor analog input, depending on which
    /// kinematics variant the board is configured for.
    pub sensor_a: AnyPin,
    pub sensor_b: AnyPin,
    pub uart_tx: AnyPin,
    pub uart_rx: AnyPin,
    pub usart1: USART1,
    pub adc1: ADC1,
}

impl BoardPins {
    /// Creates a new BoardPins struct for the MKS SKIPR.
    pub fn new(p: embassy_stm32::Peripherals) -> Self {
        use embassy_stm32::gpio::Pin as _;

        // Note: These are example pins. You will need to verify them against the MKS SKIPR schematic.
        Self {
            led: p.PB1.degrade(),
            stepper_x_step: p.PE2.degrade(),
            stepper_x_dir: p.PB8.degrade(),
            stepper_y_step: p.PC5.degrade(),
            stepper_y_dir: p.PB2.degrade(),
            stepper_z_step: p.PB3.degrade(),
            stepper_z_dir: p.PB4.degrade(),
            stepper_e_step: p.PB5.degrade(),
            stepper_e_dir: p.PB6.degrade(),
            sensor_a: p.PA0.degrade(),
            sensor_b: p.PA1.degrade(),
            uart_tx: p.PA9.degrade(),
            uart_rx: p.PA10.degrade(),
            usart1: p.USART1,
            adc1: p.ADC1,
        }
    }
}
