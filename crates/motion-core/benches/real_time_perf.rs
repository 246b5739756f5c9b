// Benchmark for the worst-case execution time (WCET) of the LO-tier path:
// draining one planner segment, running kinematics, and deriving the
// dda-stepper rate load. This is the work done once per LO-tier software
// interrupt, not the HI-tier pulse ISR itself (see dda-stepper's own
// `stepper_isr_wcet` benchmark for that).
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use motion_core::canonical::{FeedRateMode, GCodeState};
use motion_core::kinematics::CartesianKinematics;
use motion_core::planner::{MotionPlanner, MoveType};
use motion_core::{prep_segment, MAX_AXES};

fn gm_feed(feed_rate: f32) -> GCodeState {
    let mut gm = GCodeState::default();
    gm.feed_rate_mode = FeedRateMode::UnitsPerMinute;
    gm.feed_rate = feed_rate;
    gm
}

fn bench_lo_tier_exec_and_prep(c: &mut Criterion) {
    let mut jerk = [0.0; MAX_AXES];
    let mut feed = [0.0; MAX_AXES];
    let mut steps = [0.0; MAX_AXES];
    for i in 0..3 {
        jerk[i] = 500.0;
        feed[i] = 12000.0;
        steps[i] = 80.0;
    }
    let mut kinematics = CartesianKinematics::new([80.0, 80.0, 400.0, 0.0, 0.0, 0.0], [0, 1, 2, -1, -1, -1]);

    c.bench_function("lo_tier_exec_and_prep", |b| {
        b.iter(|| {
            let mut planner = MotionPlanner::new(jerk, feed, steps);
            let mut target = [0.0; MAX_AXES];
            target[0] = 150.0;
            target[1] = 50.0;
            target[2] = 20.0;
            planner.aline(&target, &[0.0; MAX_AXES], &gm_feed(6000.0), MoveType::Aligned, 0.1).unwrap();

            let mut position = [0.0; MAX_AXES];
            let mut motor_steps = [0i32; 6];
            let mut is_first = true;
            while let Some(seg) = planner.exec() {
                let _ = black_box(prep_segment(&seg, &mut kinematics, &mut position, &mut motor_steps, is_first));
                is_first = false;
            }
        })
    });
}

criterion_group!(benches, bench_lo_tier_exec_and_prep);
criterion_main!(benches);
