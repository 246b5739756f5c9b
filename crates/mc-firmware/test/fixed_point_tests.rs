#![cfg(test)]

use mc_firmware::fixed_point::Fixed16_16;

#[test]
fn fixed_from_to_float() {
    let f1 = 123.456;
    let fix1 = Fixed16_16::from_float(f1);
    assert!((fix1.to_float() - f1).abs() < 0.0001);

    let f2 = -50.75;
    let fix2 = Fixed16_16::from_float(f2);
    assert!((fix2.to_float() - f2).abs() < 0.0001);
}

#[test]
fn fixed_add_sub() {
    let a = Fixed16_16::from_float(10.5);
    let b = Fixed16_16::from_float(5.25);
    assert_eq!((a + b).to_float(), 15.75);
    assert_eq!((a - b).to_float(), 5.25);
}

#[test]
fn fixed_mul_div() {
    let a = Fixed16_16::from_float(10.5);
    let b = Fixed16_16::from_float(2.0);
    assert!(((a * b).to_float() - 21.0).abs() < 0.0001);
    assert!(((a / b).to_float() - 5.25).abs() < 0.0001);
}

#[test]
fn fixed_mul_fractional() {
    let a = Fixed16_16::from_float(20.0);
    let b = Fixed16_16::from_float(0.25);
    assert!(((a * b).to_float() - 5.0).abs() < 0.0001);
}

#[test]
fn fixed_div_by_zero_saturates_to_max() {
    let a = Fixed16_16::from_float(1.0);
    let b = Fixed16_16::ZERO;
    assert_eq!(a / b, Fixed16_16(i32::MAX));
}
