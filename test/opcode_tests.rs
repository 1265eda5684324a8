//! Integration coverage for the textual assembler and bytecode encoding
//! as seen from outside the crate: assembling small programs and running
//! them to completion through the public `eval`/`compiler` surface.

use std::sync::Arc;

use argon_rt::code::Code;
use argon_rt::compiler::{AsmError, Assembler, Compile};
use argon_rt::eval::{eval_fiber, EvalOutcome};
use argon_rt::fiber::Fiber;
use argon_rt::frame::Frame;
use argon_rt::object::namespace::Namespace;
use argon_rt::object::Value;

fn run(code: Arc<Code>) -> EvalOutcome {
    let mut fiber = Fiber::new(8);
    let locals_count = code.locals.len();
    let frame = Frame::new(Arc::new(Namespace::new()), None, code, locals_count, vec![], fiber.id, None);
    fiber.push_frame(frame, false);
    eval_fiber(&mut fiber)
}

#[test]
fn arithmetic_program_round_trips_through_compile() {
    let code = Assembler::new()
        .compile("arith", "LSTATIC.INT 10\nLSTATIC.INT 3\nMUL\nLSTATIC.INT 2\nSUB\nRET\n")
        .expect("assembles");
    match run(code) {
        EvalOutcome::Returned(Value::Int(n)) => assert_eq!(n, 28),
        other => panic!("unexpected outcome {:?}", std::mem::discriminant(&other)),
    }
}

#[test]
fn backward_jump_builds_a_loop() {
    // locals[0] = 0; while locals[0] < 5 { locals[0] = locals[0] + 1 }; return locals[0]
    let source = "\
LSTATIC.INT 0
STLC i
loop:
LDLC i
LSTATIC.INT 5
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
";
    let code = Assembler::new().compile("loop", source).expect("assembles");
    match run(code) {
        EvalOutcome::Returned(Value::Int(n)) => assert_eq!(n, 5),
        other => panic!("unexpected outcome {:?}", std::mem::discriminant(&other)),
    }
}

#[test]
fn division_by_zero_surfaces_as_a_panic_value() {
    let code = Assembler::new()
        .compile("divzero", "LSTATIC.INT 9\nLSTATIC.INT 0\nDIV\nRET\n")
        .expect("assembles");
    match run(code) {
        EvalOutcome::Panicked(Value::Error(e)) => {
            assert!(e.is_kind(argon_rt::error::ErrorKind::DivByZeroError));
        }
        other => panic!("expected a panic, got {:?}", std::mem::discriminant(&other)),
    }
}

#[test]
fn unknown_mnemonic_reports_unit_and_line() {
    let err = Assembler::new().compile("badunit", "ADD\nBOGUS 1\n").unwrap_err();
    match err {
        AsmError::UnknownMnemonic { unit, line, mnemonic } => {
            assert_eq!(unit, "badunit");
            assert_eq!(line, 2);
            assert_eq!(mnemonic, "BOGUS");
        }
        other => panic!("expected UnknownMnemonic, got {:?}", other),
    }
}

#[test]
fn string_concatenation_via_add() {
    let code = Assembler::new()
        .compile("concat", "LSTATIC.STR \"foo\"\nLSTATIC.STR \"bar\"\nADD\nRET\n")
        .expect("assembles");
    match run(code) {
        EvalOutcome::Returned(Value::Str(s)) => assert_eq!(s.as_str(), "foobar"),
        other => panic!("unexpected outcome {:?}", std::mem::discriminant(&other)),
    }
}
