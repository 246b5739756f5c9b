// Worst-case execution time (WCET) of the HI-tier pulse ISR: six channels,
// all stepping on the same tick, is the worst case for GPIO write volume.
use core::cell::RefCell;
use critical_section::Mutex;
use criterion::{criterion_group, criterion_main, Criterion};
use dda_stepper::{AtomicGpioPort, DdaChannelLoad, DdaEngine, PreppedSegment, Timer, DDA_SUBSTEPS, MAX_MOTORS};

struct MockPort;
impl AtomicGpioPort for MockPort {
    fn set_and_clear_atomic(&mut self, _set_mask: u8, _clear_mask: u8) {}
    fn write(&mut self, _mask: u8) {}
}

struct MockTimer;
impl Timer for MockTimer {
    fn schedule_next(&mut self, _ticks: u16) {}
    fn trigger_now(&mut self) {}
    fn stop(&mut self) {}
}

fn all_channels_stepping_every_tick() -> PreppedSegment {
    let mut channels = [DdaChannelLoad::EMPTY; MAX_MOTORS];
    for channel in channels.iter_mut() {
        *channel = DdaChannelLoad {
            rate: DDA_SUBSTEPS,
            direction: true,
            steps: u32::MAX,
        };
    }
    PreppedSegment {
        channels,
        hi_tier_ticks: u32::MAX,
        is_end_of_block: false,
        is_new_block: false,
    }
}

fn bench_stepper_isr_wcet(c: &mut Criterion) {
    let step_port = Mutex::new(RefCell::new(MockPort));
    let dir_port = Mutex::new(RefCell::new(MockPort));
    let timer = Mutex::new(RefCell::new(MockTimer));

    let mut engine = DdaEngine::<{ MAX_MOTORS }>::new();
    engine.prep(all_channels_stepping_every_tick());
    engine.start();

    c.bench_function("hi_tier_isr_all_channels_stepping", |b| {
        b.iter(|| {
            engine.on_hi_tier_tick(&step_port, &dir_port, &timer);
        })
    });
}

criterion_group!(benches, bench_stepper_isr_wcet);
criterion_main!(benches);
