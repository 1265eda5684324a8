//! Benchmarks for the assembler, the bytecode evaluator's loop, and the
//! scheduler's spawn/await round trip.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use argon_rt::compiler::{Assembler, Compile};
use argon_rt::eval::eval_fiber;
use argon_rt::fiber::Fiber;
use argon_rt::frame::Frame;
use argon_rt::function::{Function, FunctionFlags};
use argon_rt::object::namespace::Namespace;
use argon_rt::sched::Scheduler;

fn loop_source(n: i64) -> String {
    format!(
        "\
LSTATIC.INT 0
STLC i
loop:
LDLC i
LSTATIC.INT {n}
CMP.LT
JF done
LDLC i
LSTATIC.INT 1
ADD
STLC i
JMP loop
done:
LDLC i
RET
"
    )
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");
    for &n in &[10, 100, 1000] {
        let source = loop_source(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("loop_{n}"), |b| {
            b.iter(|| black_box(Assembler::new().compile("bench", black_box(&source))))
        });
    }
    group.finish();
}

fn bench_eval_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval_loop");
    for &n in &[10, 100, 1000, 10_000] {
        let code = Assembler::new().compile("bench", &loop_source(n)).unwrap();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("iters_{n}"), |b| {
            b.iter(|| {
                let mut fiber = Fiber::new(8);
                let locals_count = code.locals.len();
                let frame = Frame::new(Arc::new(Namespace::new()), None, code.clone(), locals_count, vec![], fiber.id, None);
                fiber.push_frame(frame, false);
                black_box(eval_fiber(&mut fiber))
            })
        });
    }
    group.finish();
}

fn bench_spawn_and_await(c: &mut Criterion) {
    let code = Assembler::new()
        .compile("answer", "LSTATIC.INT 6\nLSTATIC.INT 7\nMUL\nRET\n")
        .unwrap();

    c.bench_function("spawn_and_await", |b| {
        b.iter(|| {
            let scheduler = Scheduler::new(2, 4, 64, 0);
            scheduler.run_workers(2);
            let func = Function::new_code("answer", code.clone(), 0, FunctionFlags::empty(), vec![], Arc::new(Namespace::new()));
            let future = scheduler.spawn(func, vec![]);
            let result = future.wait();
            scheduler.shutdown();
            black_box(result)
        })
    });
}

criterion_group!(benches, bench_assemble, bench_eval_loop, bench_spawn_and_await);
criterion_main!(benches);
