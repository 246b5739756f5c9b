use criterion::{black_box, criterion_group, criterion_main, Criterion};
use motion_core::canonical::{FeedRateMode, GCodeState};
use motion_core::planner::{MotionPlanner, MoveType};
use motion_core::MAX_AXES;

fn gm_feed(feed_rate: f32) -> GCodeState {
    let mut gm = GCodeState::default();
    gm.feed_rate_mode = FeedRateMode::UnitsPerMinute;
    gm.feed_rate = feed_rate;
    gm
}

fn benchmark_plan_and_drain(c: &mut Criterion) {
    let mut jerk = [0.0; MAX_AXES];
    let mut feed = [0.0; MAX_AXES];
    let mut steps = [0.0; MAX_AXES];
    for i in 0..3 {
        jerk[i] = 500.0;
        feed[i] = 12000.0;
        steps[i] = 80.0;
    }

    c.bench_function("plan_and_drain_long_diagonal_move", |b| {
        b.iter(|| {
            let mut planner = MotionPlanner::new(jerk, feed, steps);
            let mut target = [0.0; MAX_AXES];
            target[0] = 150.0;
            target[1] = 50.0;
            target[2] = 20.0;
            planner
                .aline(black_box(&target), black_box(&[0.0; MAX_AXES]), &gm_feed(6000.0), MoveType::Aligned, 0.1)
                .unwrap();
            while planner.exec().is_some() {}
        })
    });
}

criterion_group!(benches, benchmark_plan_and_drain);
criterion_main!(benches);
