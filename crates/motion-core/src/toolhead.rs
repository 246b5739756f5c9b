//! Toolhead contract: the polymorphic actuator coupled to spindle commands.
//!
//! The ESC spindle's ramped engage is a fixed-increment-per-tick ramp, the
//! same shape as the systick event registered by `ESCSpindle`'s C++
//! ancestor: each millisecond tick nudges `speed_actual` toward `speed` by
//! `speed_change_per_tick` and self-unregisters once it arrives. It is not
//! a PID loop — `servo-loops::Pid` is reserved for kinematics idle-loop
//! sensor tracking (see `crate::kinematics::PressureKinematics`), where the
//! corrective motion really is closed-loop control toward a setpoint.

use crate::canonical::{GCodeState, SpindleDirection};

/// A linear map from a commanded speed range to a PWM phase range, one per
/// spindle direction.
#[derive(Debug, Clone, Copy)]
pub struct SpeedToPhaseMap {
    pub speed_lo: f32,
    pub speed_hi: f32,
    pub phase_lo: f32,
    pub phase_hi: f32,
}

impl SpeedToPhaseMap {
    pub fn phase_for(&self, speed: f32) -> f32 {
        if (self.speed_hi - self.speed_lo).abs() < f32::EPSILON {
            return self.phase_lo;
        }
        let t = (speed - self.speed_lo) / (self.speed_hi - self.speed_lo);
        self.phase_lo + t.clamp(0.0, 1.0) * (self.phase_hi - self.phase_lo)
    }
}

/// Trait every toolhead variant implements.
pub trait Toolhead {
    /// Applies the spindle/tool-relevant fields of `gm`, idempotent when
    /// direction and speed are unchanged.
    fn engage(&mut self, gm: &GCodeState);
    /// Drops commanded speed to 0 immediately, retaining the target for resume.
    fn pause(&mut self);
    /// Whether the tool is commanded on, independent of pause state.
    fn is_on(&self) -> bool;
    /// Advances any ramped state by one millisecond tick.
    fn tick_1ms(&mut self);
}

/// An ESC-driven spindle with a ramped PWM engage.
#[derive(Debug, Clone, Copy)]
pub struct EscSpindle {
    pub direction: SpindleDirection,
    pub speed: f32,
    pub speed_actual: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    pub speed_change_per_tick: f32,
    pub spinup_delay_ms: u32,
    pub cw_map: SpeedToPhaseMap,
    pub ccw_map: SpeedToPhaseMap,
    pub pwm_value: f32,
    pub enable_pin: bool,
    pub direction_pin: bool,
    paused: bool,
    spinup_remaining_ms: u32,
    ramping: bool,
}

impl Default for EscSpindle {
    fn default() -> Self {
        Self {
            direction: SpindleDirection::Off,
            speed: 0.0,
            speed_actual: 0.0,
            speed_min: 0.0,
            speed_max: 24000.0,
            speed_change_per_tick: 50.0,
            spinup_delay_ms: 0,
            cw_map: SpeedToPhaseMap {
                speed_lo: 0.0,
                speed_hi: 24000.0,
                phase_lo: 0.0,
                phase_hi: 1.0,
            },
            ccw_map: SpeedToPhaseMap {
                speed_lo: 0.0,
                speed_hi: 24000.0,
                phase_lo: 0.0,
                phase_hi: 1.0,
            },
            pwm_value: 0.0,
            enable_pin: false,
            direction_pin: false,
            paused: false,
            spinup_remaining_ms: 0,
            ramping: false,
        }
    }
}

impl EscSpindle {
    fn active_map(&self) -> Option<SpeedToPhaseMap> {
        match self.direction {
            SpindleDirection::Cw => Some(self.cw_map),
            SpindleDirection::Ccw => Some(self.ccw_map),
            SpindleDirection::Off => None,
        }
    }

    fn recompute_pwm(&mut self) {
        self.pwm_value = self.active_map().map(|m| m.phase_for(self.speed_actual)).unwrap_or(0.0);
    }
}

impl Toolhead for EscSpindle {
    fn engage(&mut self, gm: &GCodeState) {
        let direction_unchanged = gm.spindle_direction == self.direction;
        let speed_unchanged = (gm.spindle_speed - self.speed).abs() < f32::EPSILON;
        if direction_unchanged && speed_unchanged && !self.paused {
            return;
        }
        let reversed = gm.spindle_direction != self.direction
            && gm.spindle_direction != SpindleDirection::Off
            && self.direction != SpindleDirection::Off;
        self.direction = gm.spindle_direction;
        self.speed = gm.spindle_speed.clamp(self.speed_min, self.speed_max);
        self.paused = false;
        if reversed {
            self.speed_actual = 0.0;
        }
        self.enable_pin = self.direction != SpindleDirection::Off;
        self.direction_pin = self.direction == SpindleDirection::Ccw;
        self.spinup_remaining_ms = self.spinup_delay_ms;
        self.ramping = (self.speed_actual - self.speed).abs() > f32::EPSILON;
        self.recompute_pwm();
    }

    fn pause(&mut self) {
        self.speed_actual = 0.0;
        self.paused = true;
        self.ramping = false;
        self.recompute_pwm();
    }

    fn is_on(&self) -> bool {
        self.direction != SpindleDirection::Off
    }

    /// Registered as a once-per-millisecond tick handler while ramping;
    /// advances `speed_actual` toward `speed` and self-unregisters (sets
    /// `ramping = false`) when complete.
    fn tick_1ms(&mut self) {
        if self.spinup_remaining_ms > 0 {
            self.spinup_remaining_ms -= 1;
            return;
        }
        if !self.ramping || self.paused {
            return;
        }
        let delta = self.speed - self.speed_actual;
        if delta.abs() <= self.speed_change_per_tick {
            self.speed_actual = self.speed;
            self.ramping = false;
        } else if delta > 0.0 {
            self.speed_actual += self.speed_change_per_tick;
        } else {
            self.speed_actual -= self.speed_change_per_tick;
        }
        self.recompute_pwm();
    }
}

/// Dual-role laser tool: a toolhead, a pseudo-stepper motor, and a
/// kinematics wrapper that overrides the laser motor's step count.
#[derive(Debug, Clone, Copy)]
pub struct LaserTool {
    pub ppm_for_s: f32,
    pub pulse_duration_us: f32,
    pub min_s: f32,
    pub fire_pwm: f32,
    pub firing: bool,
    ticks_per_pulse: u32,
}

impl Default for LaserTool {
    fn default() -> Self {
        Self {
            ppm_for_s: 1.0,
            pulse_duration_us: 4.0,
            min_s: 1.0,
            fire_pwm: 0.0,
            firing: false,
            ticks_per_pulse: 0,
        }
    }
}

impl LaserTool {
    /// Recomputes `ticks_per_pulse` from `pulse_duration_us` for the given
    /// HI-tier tick period (microseconds).
    pub fn configure_ticks(&mut self, hi_tier_period_us: f32) {
        if hi_tier_period_us > 0.0 {
            self.ticks_per_pulse = (self.pulse_duration_us / hi_tier_period_us).round() as u32;
        }
    }

    pub fn ticks_per_pulse(&self) -> u32 {
        self.ticks_per_pulse
    }

    /// `set_speed`: maps S (with override) to a PWM duty cycle on the fire pin.
    pub fn set_speed(&mut self, s_word: f32, mfo_factor: f32) {
        self.fire_pwm = (s_word * mfo_factor / 255.0).clamp(0.0, 1.0);
    }

    /// Overrides the laser motor's step count: `floor(move_length_mm * ppm_for_s)`.
    pub fn laser_step_count(&self, move_length_mm: f32) -> u32 {
        (move_length_mm * self.ppm_for_s).floor().max(0.0) as u32
    }

    /// Fires only when motion is G1/G2/G3, direction is CW, and S exceeds `min_s`.
    pub fn should_fire(&self, motion_is_linear_or_arc: bool, direction_cw: bool, s_word: f32) -> bool {
        motion_is_linear_or_arc && direction_cw && s_word > self.min_s
    }
}

impl Toolhead for LaserTool {
    fn engage(&mut self, gm: &GCodeState) {
        self.set_speed(gm.spindle_speed, 1.0);
        self.firing = self.fire_pwm > 0.0;
    }

    fn pause(&mut self) {
        self.fire_pwm = 0.0;
        self.firing = false;
    }

    fn is_on(&self) -> bool {
        self.firing
    }

    fn tick_1ms(&mut self) {}
}
