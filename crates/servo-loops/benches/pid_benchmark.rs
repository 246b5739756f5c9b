use criterion::{black_box, criterion_group, criterion_main, Criterion};
use servo_loops::Pid;

fn benchmark_pid_update(c: &mut Criterion) {
    let mut pid = Pid::new(5.0_f64, 0.1, 1.0, 3.0, -50.0, 50.0);

    c.bench_function("pid_update", |b| {
        b.iter(|| {
            black_box(pid.update(black_box(1.5), black_box(0.001)));
        })
    });
}

criterion_group!(benches, benchmark_pid_update);
criterion_main!(benches);
