//! The concrete end-to-end walkthroughs: one test per scenario, each
//! driving the real compiler/evaluator/scheduler stack rather than
//! exercising a single module in isolation.

use std::sync::Arc;
use std::time::Duration;

use argon_rt::code::Code;
use argon_rt::compiler::{Assembler, Compile};
use argon_rt::error::ErrorKind;
use argon_rt::eval::{eval_fiber, EvalOutcome};
use argon_rt::fiber::Fiber;
use argon_rt::frame::Frame;
use argon_rt::function::{Function, FunctionFlags};
use argon_rt::object::namespace::Namespace;
use argon_rt::object::types::TypeInfo;
use argon_rt::object::Value;
use argon_rt::sched::Scheduler;

/// Builds a frame whose locals vector is sized to the code's full declared
/// slot count and pre-seeded with `locals`, mirroring the dispatcher's own
/// frame construction (which an external test has no access to).
fn frame_with_locals(code: Arc<Code>, locals: Vec<Value>, fiber_id: u64) -> Frame {
    let slot_count = code.locals.len().max(locals.len());
    let mut frame = Frame::new(Arc::new(Namespace::new()), None, code, slot_count, vec![], fiber_id, None);
    for (i, v) in locals.into_iter().enumerate() {
        frame.locals[i] = v;
    }
    frame
}

fn run_program(code: Arc<Code>, locals: Vec<Value>) -> EvalOutcome {
    let mut fiber = Fiber::new(8);
    let frame = frame_with_locals(code, locals, fiber.id);
    fiber.push_frame(frame, false);
    eval_fiber(&mut fiber)
}

/// Scenario 1: `add(a, b) = a + b`; `inc = add(1)`; `inc(41) == 42`.
/// Driven entirely through the CALL opcode so the partial-application path
/// (bind_call's `Partial` outcome) and the completed call both run for
/// real, rather than calling `bind_call` directly from the test.
#[test]
fn partial_application_reaches_the_full_call() {
    let add_code = Assembler::new().compile("add", "LDLC a\nLDLC b\nADD\nRET\n").unwrap();
    let add = Function::new_code("add", add_code, 2, FunctionFlags::empty(), vec!["a".into(), "b".into()], Arc::new(Namespace::new()));

    let driver = Assembler::new()
        .compile("curry_driver", "LDLC add\nLSTATIC.INT 1\nCALL 1\nLSTATIC.INT 41\nCALL 1\nRET\n")
        .unwrap();

    match run_program(driver, vec![Value::Function(add)]) {
        EvalOutcome::Returned(Value::Int(n)) => assert_eq!(n, 42),
        other => panic!("expected 42, got {:?}", std::mem::discriminant(&other)),
    }
}

/// Scenario 2: a diamond `D(B, C)`, `B(A)`, `C(A)` linearizes to `[B, C, A]`.
#[test]
fn diamond_mro_matches_the_published_linearization() {
    fn trait_type(name: &str, bases: &[Arc<TypeInfo>]) -> Arc<TypeInfo> {
        TypeInfo::new_user(name, name, "", true, Namespace::new(), bases).expect("valid trait graph")
    }

    let a = trait_type("A", &[]);
    let b = trait_type("B", &[a.clone()]);
    let c = trait_type("C", &[a.clone()]);
    let d = trait_type("D", &[b, c]);

    let mro = d.mro();
    let names: Vec<&str> = mro.iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["B", "C", "A"]);
}

/// Scenario 3: a generator yielding `0, 1, 2` then raising
/// `ExhaustedGeneratorError` on the call that would otherwise return
/// normally. Local interning order is forced so parameter `n` lands in
/// slot 0 (the slot `bind_call` actually fills) ahead of the loop
/// counter `i`.
#[test]
fn generator_yields_then_raises_on_exhaustion() {
    let counter_code = Assembler::new()
        .compile(
            "counter",
            "\
LDLC n
POP
LSTATIC.INT 0
STLC i
loop:
LDLC i
LDLC n
CMP.LT
JF end
LDLC i
YIELD
LDLC i
LSTATIC.INT 1
ADD
STLC i
JMP loop
end:
RET
",
        )
        .unwrap();
    let counter = Function::new_code(
        "counter",
        counter_code,
        1,
        FunctionFlags::GENERATOR,
        vec!["n".into()],
        Arc::new(Namespace::new()),
    );

    let collect_three = Assembler::new()
        .compile(
            "collect_three",
            "LDLC counter\nLSTATIC.INT 3\nCALL 1\nLDLC counter\nLSTATIC.INT 3\nCALL 1\nLDLC counter\nLSTATIC.INT 3\nCALL 1\nMKLT 3\nRET\n",
        )
        .unwrap();

    match run_program(collect_three, vec![Value::Function(counter.clone())]) {
        EvalOutcome::Returned(Value::List(list)) => {
            let snapshot = list.snapshot();
            assert!(matches!(snapshot[0], Value::Int(0)));
            assert!(matches!(snapshot[1], Value::Int(1)));
            assert!(matches!(snapshot[2], Value::Int(2)));
        }
        other => panic!("expected [0, 1, 2], got {:?}", std::mem::discriminant(&other)),
    }

    // The fourth call against the same generator function (same
    // `GeneratorState`, carried over via the shared `Arc<Function>`) is the
    // one call too many and surfaces the exhaustion error directly.
    let trap_call = Assembler::new().compile("trap_call", "LDLC counter\nLSTATIC.INT 3\nCALL 1\nRET\n").unwrap();
    match run_program(trap_call, vec![Value::Function(counter)]) {
        EvalOutcome::Panicked(Value::Error(e)) => assert!(e.is_kind(ErrorKind::ExhaustedGeneratorError)),
        other => panic!("expected an exhaustion panic, got {:?}", std::mem::discriminant(&other)),
    }
}

/// Scenario 4: spawning a fiber and awaiting its future observes the
/// fulfilled result exactly once the computation completes.
#[test]
fn spawned_fiber_fulfills_its_future_with_the_computed_value() {
    let code = Assembler::new()
        .compile("six_times_seven", "LSTATIC.INT 6\nLSTATIC.INT 7\nMUL\nRET\n")
        .unwrap();
    let func = Function::new_code("six_times_seven", code, 0, FunctionFlags::empty(), vec![], Arc::new(Namespace::new()));

    let scheduler = Scheduler::new(2, 4, 64, 0);
    scheduler.run_workers(2);
    let future = scheduler.spawn(func, vec![]);
    assert!(matches!(future.wait(), Ok(Value::Int(42))));
    scheduler.shutdown();
}

/// Scenario 5: `f` registers `defer recover()` then panics; the caller
/// observes `nil`, not the panic. Frames are wired by hand (push caller,
/// then `f` on top, then register `f`'s defer) since there's no `DEFER`
/// opcode — `push_defer`/`pop_defer` are Rust-API-only operations.
#[test]
fn deferred_recover_turns_a_panic_into_nil_for_the_caller() {
    let caller_code = Assembler::new().compile("caller", "RET\n").unwrap();
    let f_code = Assembler::new().compile("f", "LSTATIC.STR \"boom\"\nPANIC\n").unwrap();

    let mut fiber = Fiber::new(8);
    let caller_frame = frame_with_locals(caller_code, vec![], fiber.id);
    let f_frame = frame_with_locals(f_code, vec![], fiber.id);
    fiber.push_frame(caller_frame, false);
    fiber.push_frame(f_frame, false);
    fiber.current_frame_mut().unwrap().push_defer(Value::Nil, vec![]);

    match eval_fiber(&mut fiber) {
        EvalOutcome::Returned(Value::Nil) => {}
        other => panic!("expected Returned(Nil), got {:?}", std::mem::discriminant(&other)),
    }
}

/// Scenario 6: a backlog queued on one VCore drains via work-stealing
/// rather than starving while a second worker sits idle.
#[test]
fn idle_worker_steals_a_backlog_from_its_sibling_vcore() {
    let scheduler = Scheduler::new(2, 2, 64, 0);
    for _ in 0..16 {
        scheduler.enqueue_on_vcore(0, Fiber::new(8));
    }
    assert_eq!(scheduler.vcore_queue_len(0), 16);

    scheduler.run_workers(2);
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(scheduler.vcore_queue_len(0) + scheduler.vcore_queue_len(1), 0);
    scheduler.shutdown();
}
