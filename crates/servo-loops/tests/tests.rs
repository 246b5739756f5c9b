use float_cmp::approx_eq;
use servo_loops::filter::{Filter, LowPassFilter, MovingAverageFilter};
use servo_loops::pid::Pid;

#[test]
fn test_low_pass_filter() {
    let mut filter = LowPassFilter::new(0.5, 0.0);
    filter.add_sample(10.0);
    assert!(approx_eq!(f64, filter.output(), 5.0, epsilon = 0.001));
    filter.add_sample(10.0);
    assert!(approx_eq!(f64, filter.output(), 7.5, epsilon = 0.001));
}

#[test]
fn test_moving_average_filter() {
    let mut filter: MovingAverageFilter<f32, 4> = MovingAverageFilter::new();
    filter.add_sample(10.0);
    filter.add_sample(12.0);
    filter.add_sample(11.0);
    filter.add_sample(13.0);
    assert!(approx_eq!(f32, filter.output(), 11.5, epsilon = 0.001));
    filter.add_sample(8.0); // 10.0 is dropped
    assert!(approx_eq!(f32, filter.output(), 11.0, epsilon = 0.001));
}

#[test]
fn test_pid_stability() {
    // A simple first-order plant: output drives the measured value toward
    // setpoint, with some lag, the way a pressure-regulated idle loop tracks
    // a target sensor reading.
    let mut value = 0.0;
    let setpoint = 3.0;
    let mut pid = Pid::new(5.0, 0.1, 1.0, setpoint, -50.0, 50.0);
    let dt = 0.01;

    for _ in 0..500 {
        let output = pid.update(value, dt);
        value += output * dt;
    }

    assert!(approx_eq!(f64, value, setpoint, epsilon = 0.1), "final value {} was not close to setpoint {}", value, setpoint);
}

#[test]
fn test_pid_reset_clears_integral_and_derivative_history() {
    let mut pid = Pid::new(1.0, 1.0, 1.0, 10.0, -100.0, 100.0);
    pid.update(0.0, 1.0);
    pid.update(0.0, 1.0);
    pid.reset();
    // Immediately after reset the derivative term sees a zero previous
    // error again, so the output matches a fresh controller's first step.
    let mut fresh = Pid::new(1.0, 1.0, 1.0, 10.0, -100.0, 100.0);
    assert!(approx_eq!(f64, pid.update(0.0, 1.0), fresh.update(0.0, 1.0), epsilon = 1e-9));
}
