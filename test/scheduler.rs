//! Integration coverage for the M:N scheduler: spawn/await through a
//! `Future`, synchronous eval, and the work-stealing backlog property
//! from the concrete end-to-end scenario in spec §8.

use std::sync::Arc;
use std::time::Duration;

use argon_rt::code::Code;
use argon_rt::eval::opcode::{encode, Opcode};
use argon_rt::fiber::Fiber;
use argon_rt::function::{Function, FunctionFlags};
use argon_rt::object::namespace::Namespace;
use argon_rt::object::tuple::Tuple;
use argon_rt::object::Value;
use argon_rt::sched::Scheduler;

fn const_function(name: &str, value: i64) -> Arc<Function> {
    let mut instr = Vec::new();
    instr.extend(encode(Opcode::LStatic, 0));
    instr.extend(encode(Opcode::Return, 0));
    let statics = Tuple::new(vec![Value::Int(value)]);
    let empty = Tuple::new(vec![]);
    let code = Code::new(instr, 4, statics, empty.clone(), empty.clone(), empty);
    Function::new_code(name, code, 0, FunctionFlags::empty(), vec![], Arc::new(Namespace::new()))
}

#[test]
fn spawn_and_await_future_observes_fulfillment_once() {
    let scheduler = Scheduler::new(2, 4, 64, 0);
    scheduler.run_workers(2);

    let func = const_function("answer", 42);
    let future = scheduler.spawn(func, vec![]);
    assert!(!future.is_fulfilled());

    let result = future.wait();
    assert!(matches!(result, Ok(Value::Int(42))));
    assert!(future.is_fulfilled());
    // A second wait observes the already-fulfilled future without blocking.
    assert!(matches!(future.wait(), Ok(Value::Int(42))));

    scheduler.shutdown();
}

#[test]
fn eval_sync_runs_a_function_to_completion() {
    let scheduler = Scheduler::new(1, 2, 64, 0);
    scheduler.run_workers(1);

    let func = const_function("six_times_seven", 42);
    let result = scheduler.eval_sync(func, vec![]);
    assert!(matches!(result, Ok(Value::Int(42))));

    scheduler.shutdown();
}

#[test]
fn backlog_on_one_vcore_migrates_to_another_within_ticks() {
    let scheduler = Scheduler::new(2, 2, 64, 0);

    for _ in 0..16 {
        scheduler.enqueue_on_vcore(0, Fiber::new(8));
    }
    assert_eq!(scheduler.vcore_queue_len(0), 16);
    assert_eq!(scheduler.vcore_queue_len(1), 0);

    scheduler.run_workers(2);
    std::thread::sleep(Duration::from_millis(200));

    // Every bare fiber (no frames) completes immediately once picked up;
    // the property under test is that VCore #1's worker actually stole
    // from VCore #0's backlog rather than sitting idle the whole window.
    assert_eq!(scheduler.vcore_queue_len(0) + scheduler.vcore_queue_len(1), 0);

    scheduler.shutdown();
}
