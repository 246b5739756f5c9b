//! A `no_std` driver for debounced, polarity-aware digital input pins
//! (limit switches, interlocks, homing inputs) and polarity-inverting
//! boolean/PWM output pins.
//!
//! Generalizes the teacher's fixed `Endstops<N, PIN>` level-read array into
//! per-pin edge detection with an enabled tri-state, configurable polarity,
//! an opaque action-tag byte, and a debounce lockout window. Edge
//! interpretation (which handler list an action tag routes to) is owned by
//! `motion_core::input`; this crate only turns electrical transitions into
//! logical ones.

#![no_std]

use embedded_hal::digital::{InputPin, OutputPin};

/// Logical edge direction, after polarity conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Transition to active.
    Leading,
    /// Transition to inactive.
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    fn to_logical(self, level_high: bool) -> bool {
        match self {
            Polarity::ActiveHigh => level_high,
            Polarity::ActiveLow => !level_high,
        }
    }
}

/// A single debounced digital input. `action` is an opaque tag index the
/// caller maps onto `motion_core::input::ActionTag`; this crate doesn't
/// depend on that enum so the driver stack stays below the planning core.
pub struct DigitalInputPin<PIN> {
    pin: PIN,
    enabled: bool,
    polarity: Polarity,
    action: u8,
    external_number: u8,
    lockout_ticks: u32,
    lockout_remaining: u32,
    last_logical: bool,
}

impl<PIN, E> DigitalInputPin<PIN>
where
    PIN: InputPin<Error = E>,
{
    pub fn new(pin: PIN, polarity: Polarity, action: u8, external_number: u8, lockout_ticks: u32) -> Self {
        Self {
            pin,
            enabled: true,
            polarity,
            action,
            external_number,
            lockout_ticks,
            lockout_remaining: 0,
            last_logical: false,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn action(&self) -> u8 {
        self.action
    }

    pub fn external_number(&self) -> u8 {
        self.external_number
    }

    pub fn is_active(&self) -> bool {
        self.last_logical
    }

    /// Advances the lockout timer by one tick. Call at the debounce
    /// timebase's rate, independent of whether `poll` is also called.
    pub fn tick_lockout(&mut self) {
        if self.lockout_remaining > 0 {
            self.lockout_remaining -= 1;
        }
    }

    /// Samples the pin and returns a logical edge if one occurred outside
    /// the lockout window. While disabled, never reports an edge but still
    /// tracks `last_logical` so re-enabling doesn't synthesize a spurious one.
    pub fn poll(&mut self) -> Result<Option<EdgeKind>, E> {
        let level_high = self.pin.is_high()?;
        let logical = self.polarity.to_logical(level_high);
        if logical == self.last_logical {
            return Ok(None);
        }
        self.last_logical = logical;
        if !self.enabled || self.lockout_remaining > 0 {
            return Ok(None);
        }
        self.lockout_remaining = self.lockout_ticks;
        Ok(Some(if logical { EdgeKind::Leading } else { EdgeKind::Trailing }))
    }
}

/// A fixed-size collection of digital inputs, polled together (e.g. one
/// GPIO EXTI bank).
pub struct DigitalInputs<const N: usize, PIN> {
    pins: [DigitalInputPin<PIN>; N],
}

impl<const N: usize, PIN, E> DigitalInputs<N, PIN>
where
    PIN: InputPin<Error = E>,
{
    pub fn new(pins: [DigitalInputPin<PIN>; N]) -> Self {
        Self { pins }
    }

    pub fn pin_mut(&mut self, index: usize) -> &mut DigitalInputPin<PIN> {
        &mut self.pins[index]
    }

    /// Polls every pin in order, invoking `on_edge(index, action, external_number, edge)`
    /// for each that produced one.
    pub fn poll_all(&mut self, mut on_edge: impl FnMut(usize, u8, u8, EdgeKind)) -> Result<(), E> {
        for (i, pin) in self.pins.iter_mut().enumerate() {
            if let Some(edge) = pin.poll()? {
                on_edge(i, pin.action(), pin.external_number(), edge);
            }
        }
        Ok(())
    }
}

/// A polarity-inverting boolean/PWM output. `value` is the last-set analog
/// level in `[0, 1]`; PWM-capable outputs additionally remember the last
/// commanded frequency, since most hardware timers can't be read back.
pub struct DigitalOutputPin<PIN> {
    pin: PIN,
    enabled: bool,
    polarity: Polarity,
    external_number: u8,
    value: f32,
    pwm_frequency_hz: Option<u32>,
}

impl<PIN, E> DigitalOutputPin<PIN>
where
    PIN: OutputPin<Error = E>,
{
    pub fn new(pin: PIN, polarity: Polarity, external_number: u8) -> Self {
        Self {
            pin,
            enabled: true,
            polarity,
            external_number,
            value: 0.0,
            pwm_frequency_hz: None,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn external_number(&self) -> u8 {
        self.external_number
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn pwm_frequency_hz(&self) -> Option<u32> {
        self.pwm_frequency_hz
    }

    /// Writes a boolean level, inverted on the wire if active-low.
    pub fn write_bool(&mut self, active: bool) -> Result<(), E> {
        self.value = if active { 1.0 } else { 0.0 };
        if !self.enabled {
            return Ok(());
        }
        let level_high = match self.polarity {
            Polarity::ActiveHigh => active,
            Polarity::ActiveLow => !active,
        };
        if level_high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }

    /// Records the analog `[0, 1]` duty cycle. Driving the actual PWM
    /// peripheral is the caller's responsibility; this tracks the
    /// last-commanded value for status reporting.
    pub fn set_value(&mut self, value: f32) {
        self.value = value.clamp(0.0, 1.0);
    }

    pub fn set_pwm_frequency(&mut self, hz: u32) {
        self.pwm_frequency_hz = Some(hz);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    #[test]
    fn active_high_leading_edge_fires_once_and_then_locks_out() {
        let mock = PinMock::new(&[
            Transaction::get(State::High),
            Transaction::get(State::High),
        ]);
        let mut pin = DigitalInputPin::new(mock, Polarity::ActiveHigh, 0, 3, 10);

        assert_eq!(pin.poll().unwrap(), Some(EdgeKind::Leading));
        // Still high on the next sample: no new edge, already active.
        assert_eq!(pin.poll().unwrap(), None);
        pin.pin.done();
    }

    #[test]
    fn active_low_inverts_polarity() {
        let mock = PinMock::new(&[Transaction::get(State::Low)]);
        let mut pin = DigitalInputPin::new(mock, Polarity::ActiveLow, 0, 1, 5);
        assert_eq!(pin.poll().unwrap(), Some(EdgeKind::Leading));
        pin.pin.done();
    }

    #[test]
    fn disabled_pin_tracks_state_but_reports_no_edge() {
        let mock = PinMock::new(&[Transaction::get(State::High), Transaction::get(State::Low)]);
        let mut pin = DigitalInputPin::new(mock, Polarity::ActiveHigh, 0, 2, 0);
        pin.set_enabled(false);
        assert_eq!(pin.poll().unwrap(), None);
        assert!(pin.is_active());
        pin.pin.done();
    }

    #[test]
    fn lockout_suppresses_bounce_until_it_expires() {
        let mock = PinMock::new(&[
            Transaction::get(State::High),
            Transaction::get(State::Low),
            Transaction::get(State::High),
        ]);
        let mut pin = DigitalInputPin::new(mock, Polarity::ActiveHigh, 0, 4, 2);
        assert_eq!(pin.poll().unwrap(), Some(EdgeKind::Leading));
        // Bounce back low immediately: still within lockout, edge suppressed,
        // but the logical state is still tracked so it doesn't re-fire once
        // lockout expires and the pin is genuinely back high.
        assert_eq!(pin.poll().unwrap(), None);
        pin.tick_lockout();
        pin.tick_lockout();
        assert_eq!(pin.poll().unwrap(), Some(EdgeKind::Leading));
        pin.pin.done();
    }

    #[test]
    fn output_pin_inverts_active_low_writes() {
        let mock = PinMock::new(&[Transaction::set(State::Low), Transaction::set(State::High)]);
        let mut pin = DigitalOutputPin::new(mock, Polarity::ActiveLow, 0);
        pin.write_bool(true).unwrap();
        pin.write_bool(false).unwrap();
        assert_eq!(pin.value(), 0.0);
        pin.pin.done();
    }
}
