#![cfg(test)]

use mc_firmware::safety;

#[test]
fn estop_blocks_motion_until_explicit_reset() {
    safety::reset();
    assert!(safety::may_move());
    safety::trip_estop();
    assert!(!safety::may_move());
    // Merely re-closing the interlock doesn't clear a tripped e-stop.
    safety::close_interlock();
    assert!(!safety::may_move());
    safety::reset();
    assert!(safety::may_move());
}

#[test]
fn open_interlock_is_observed_on_the_next_tick() {
    safety::reset();
    safety::open_interlock();
    assert!(safety::may_move(), "opening the interlock alone doesn't trip the fast flag");
    safety::tick(1);
    assert!(!safety::may_move(), "tick() should mirror the manager's may_move gate into the fast flag");
    safety::close_interlock();
    safety::reset();
}

#[test]
fn queue_flush_is_allowed_while_interlock_is_open() {
    safety::reset();
    safety::open_interlock();
    assert!(safety::can_queue_flush());
    safety::close_interlock();
    safety::reset();
}
