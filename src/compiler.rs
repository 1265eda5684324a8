//! Compiler boundary: `compile(name, source) -> Result<Code, Error>`, plus a
//! minimal textual assembler so this crate is self-exercising without a
//! real Argon front end (lexer/parser are explicitly out of scope).
//!
//! The assembler's shape — a label table, a pending-fixup list resolved in
//! a second pass, `thiserror`-based diagnostics keyed by line number — is
//! grounded on `examples/jeremyhahn-neurlang/src/ir/assembler.rs`'s
//! `Assembler`/`AsmError`, stripped of everything specific to its register
//! machine (intrinsics, RAG resolution, data sections) since Argon's
//! bytecode has no equivalent.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::code::Code;
use crate::eval::opcode::{encode, CallMode, CmpMode, Opcode};
use crate::object::string::ArString;
use crate::object::tuple::Tuple;
use crate::object::Value;

#[derive(Debug, Error)]
pub enum AsmError {
    #[error("{unit}:{line}: unknown mnemonic '{mnemonic}'")]
    UnknownMnemonic {
        unit: String,
        line: usize,
        mnemonic: String,
    },
    #[error("{unit}:{line}: undefined label '{label}'")]
    UndefinedLabel { unit: String, line: usize, label: String },
    #[error("{unit}:{line}: duplicate label '{label}'")]
    DuplicateLabel { unit: String, line: usize, label: String },
    #[error("{unit}:{line}: invalid operand '{operand}'")]
    InvalidOperand {
        unit: String,
        line: usize,
        operand: String,
    },
}

/// A unit of source a front end hands the runtime; this crate only accepts
/// the textual assembly dialect described below.
pub trait Compile {
    fn compile(&self, name: &str, source: &str) -> Result<Arc<Code>, AsmError>;
}

/// One line per instruction: `MNEMONIC operand` or `label:`. Operands are
/// either a bare integer, a `$N` static-pool index, a `%N` local-slot
/// index, or a label reference for jump targets. A leading `;` starts a
/// comment; blank lines are ignored.
pub struct Assembler {
    statics: Vec<Value>,
    names: Vec<String>,
    locals: Vec<String>,
}

struct PendingJump {
    instr_index: usize,
    label: String,
    line: usize,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler {
            statics: Vec::new(),
            names: Vec::new(),
            locals: Vec::new(),
        }
    }

    fn intern_static(&mut self, v: Value) -> u32 {
        if let Some(idx) = self.statics.iter().position(|s| s.eq_value(&v)) {
            return idx as u32;
        }
        self.statics.push(v);
        (self.statics.len() - 1) as u32
    }

    fn intern_name(&mut self, n: &str) -> u32 {
        if let Some(idx) = self.names.iter().position(|s| s == n) {
            return idx as u32;
        }
        self.names.push(n.to_string());
        (self.names.len() - 1) as u32
    }

    fn intern_local(&mut self, n: &str) -> u32 {
        if let Some(idx) = self.locals.iter().position(|s| s == n) {
            return idx as u32;
        }
        self.locals.push(n.to_string());
        (self.locals.len() - 1) as u32
    }

    pub fn assemble(&mut self, unit: &str, source: &str) -> Result<Arc<Code>, AsmError> {
        let mut instr: Vec<u8> = Vec::new();
        let mut labels: HashMap<String, usize> = HashMap::new();
        let mut pending: Vec<PendingJump> = Vec::new();
        // The assembler doesn't track operand-stack depth per instruction;
        // callers writing raw bytecode by hand rarely exceed a handful of
        // live values, so a fixed allowance keeps this module simple.
        let max_stack: u32 = 16;

        for (lineno, raw) in source.lines().enumerate() {
            let line_no = lineno + 1;
            let line = match raw.find(';') {
                Some(idx) => &raw[..idx],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            if let Some(label) = line.strip_suffix(':') {
                let index = instr.len() / Opcode::len();
                if labels.insert(label.trim().to_string(), index).is_some() {
                    return Err(AsmError::DuplicateLabel {
                        unit: unit.to_string(),
                        line: line_no,
                        label: label.trim().to_string(),
                    });
                }
                continue;
            }

            let mut parts = line.splitn(2, char::is_whitespace);
            let mnemonic = parts.next().unwrap_or("").to_uppercase();
            let operand = parts.next().unwrap_or("").trim();

            let index = instr.len() / Opcode::len();
            let (opcode, arg) = self.encode_line(unit, line_no, &mnemonic, operand, index, &mut pending)?;
            instr.extend(encode(opcode, arg));
        }

        for jump in &pending {
            let target = *labels.get(&jump.label).ok_or_else(|| AsmError::UndefinedLabel {
                unit: unit.to_string(),
                line: jump.line,
                label: jump.label.clone(),
            })?;
            let byte_offset = target * Opcode::len();
            let patch = jump.instr_index * Opcode::len();
            let opcode_byte = instr[patch];
            let opcode = Opcode::from_u8(opcode_byte)
                .expect("byte at a jump fixup site was written by encode() in this same pass");
            let patched = encode(opcode, byte_offset as u32);
            instr[patch..patch + Opcode::len()].copy_from_slice(&patched);
        }

        let statics = Tuple::new(self.statics.drain(..).collect());
        let names = Tuple::new(self.names.drain(..).map(|n| Value::Str(Arc::new(ArString::new(n)))).collect());
        let locals = Tuple::new(self.locals.drain(..).map(|n| Value::Str(Arc::new(ArString::new(n)))).collect());
        let enclosed = Tuple::new(vec![]);

        Ok(Code::new(instr, max_stack, statics, names, locals, enclosed))
    }

    fn encode_line(
        &mut self,
        unit: &str,
        line: usize,
        mnemonic: &str,
        operand: &str,
        index: usize,
        pending: &mut Vec<PendingJump>,
    ) -> Result<(Opcode, u32), AsmError> {
        let bad_operand = || AsmError::InvalidOperand {
            unit: unit.to_string(),
            line,
            operand: operand.to_string(),
        };

        let jump_op = |op: Opcode, pending: &mut Vec<PendingJump>| -> Result<(Opcode, u32), AsmError> {
            pending.push(PendingJump {
                instr_index: index,
                label: operand.to_string(),
                line,
            });
            Ok((op, 0))
        };

        match mnemonic {
            "ADD" => Ok((Opcode::Add, 0)),
            "SUB" => Ok((Opcode::Sub, 0)),
            "MUL" => Ok((Opcode::Mul, 0)),
            "DIV" => Ok((Opcode::Div, 0)),
            "IDIV" => Ok((Opcode::IDiv, 0)),
            "MOD" => Ok((Opcode::Mod, 0)),
            "NEG" => Ok((Opcode::Neg, 0)),
            "POS" => Ok((Opcode::Pos, 0)),
            "INC" => Ok((Opcode::Inc, 0)),
            "DEC" => Ok((Opcode::Dec, 0)),
            "INV" => Ok((Opcode::Inv, 0)),
            "LAND" => Ok((Opcode::LAnd, 0)),
            "LOR" => Ok((Opcode::LOr, 0)),
            "LXOR" => Ok((Opcode::LXor, 0)),
            "SHL" => Ok((Opcode::Shl, 0)),
            "SHR" => Ok((Opcode::Shr, 0)),
            "NOT" => Ok((Opcode::Not, 0)),
            "POP" => Ok((Opcode::Pop, 0)),
            "DUP" => Ok((Opcode::Dup, 0)),
            "RET" | "RETURN" => Ok((Opcode::Return, 0)),
            "YIELD" => Ok((Opcode::Yield, 0)),
            "PANIC" => Ok((Opcode::Panic, 0)),
            "RECOVER" => Ok((Opcode::Recover, 0)),
            "CMP.EQ" => Ok((Opcode::Cmp, CmpMode::Eq as u32)),
            "CMP.NE" => Ok((Opcode::Cmp, CmpMode::Ne as u32)),
            "CMP.LT" => Ok((Opcode::Cmp, CmpMode::Lt as u32)),
            "CMP.LE" => Ok((Opcode::Cmp, CmpMode::Le as u32)),
            "CMP.GT" => Ok((Opcode::Cmp, CmpMode::Gt as u32)),
            "CMP.GE" => Ok((Opcode::Cmp, CmpMode::Ge as u32)),
            "EQST" => Ok((Opcode::EqSt, 0)),
            "JMP" => jump_op(Opcode::Jmp, pending),
            "JT" => jump_op(Opcode::Jt, pending),
            "JF" => jump_op(Opcode::Jf, pending),
            "JTOP" => jump_op(Opcode::JtOp, pending),
            "JFOP" => jump_op(Opcode::JfOp, pending),
            "JNIL" => jump_op(Opcode::JNil, pending),
            "LDLC" => {
                let idx = self.intern_local(operand);
                Ok((Opcode::Ldlc, idx))
            }
            "STLC" => {
                let idx = self.intern_local(operand);
                Ok((Opcode::Stlc, idx))
            }
            "LDENC" => operand.parse::<u32>().map(|n| (Opcode::Ldenc, n)).map_err(|_| bad_operand()),
            "STENC" => operand.parse::<u32>().map(|n| (Opcode::Stenc, n)).map_err(|_| bad_operand()),
            "NGV" => {
                let name_idx = self.intern_name(operand);
                Ok((Opcode::Ngv, name_idx))
            }
            "LSTATIC.INT" => {
                let n: i64 = operand.parse().map_err(|_| bad_operand())?;
                Ok((Opcode::LStatic, self.intern_static(Value::Int(n))))
            }
            "LSTATIC.STR" => {
                let s = operand.trim_matches('"').to_string();
                Ok((Opcode::LStatic, self.intern_static(Value::Str(Arc::new(ArString::new(s))))))
            }
            "LSTATIC.NIL" => Ok((Opcode::LStatic, self.intern_static(Value::Nil))),
            "MKLT" => operand.parse::<u32>().map(|n| (Opcode::Mklt, n)).map_err(|_| bad_operand()),
            "MKTP" => operand.parse::<u32>().map(|n| (Opcode::Mktp, n)).map_err(|_| bad_operand()),
            "MKDT" => operand.parse::<u32>().map(|n| (Opcode::Mkdt, n * 2)).map_err(|_| bad_operand()),
            "MKSET" => operand.parse::<u32>().map(|n| (Opcode::Mkset, n)).map_err(|_| bad_operand()),
            "CALL" => {
                let argc: u32 = operand.parse().map_err(|_| bad_operand())?;
                Ok((Opcode::Call, argc | ((CallMode::POSITIONAL.bits() as u32) << 16)))
            }
            "CALL.KW" => {
                let argc: u32 = operand.parse().map_err(|_| bad_operand())?;
                Ok((Opcode::Call, argc | ((CallMode::KW_PARAMS.bits() as u32) << 16)))
            }
            _ => Err(AsmError::UnknownMnemonic {
                unit: unit.to_string(),
                line,
                mnemonic: mnemonic.to_string(),
            }),
        }
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compile for Assembler {
    fn compile(&self, name: &str, source: &str) -> Result<Arc<Code>, AsmError> {
        let mut asm = Assembler::new();
        asm.assemble(name, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::Fiber;
    use crate::frame::Frame;
    use crate::eval::{eval_fiber, EvalOutcome};
    use crate::object::namespace::Namespace;
    use std::sync::Arc;

    fn run(code: Arc<Code>) -> EvalOutcome {
        let mut fiber = Fiber::new(8);
        let frame = Frame::new(Arc::new(Namespace::new()), None, code, 0, vec![], fiber.id, None);
        fiber.push_frame(frame, false);
        eval_fiber(&mut fiber)
    }

    #[test]
    fn assembles_arithmetic_and_returns() {
        let mut asm = Assembler::new();
        let code = asm
            .assemble(
                "test",
                "LSTATIC.INT 40\nLSTATIC.INT 2\nADD\nRET\n",
            )
            .unwrap();
        match run(code) {
            EvalOutcome::Returned(Value::Int(n)) => assert_eq!(n, 42),
            other => panic!("unexpected outcome in {:?}", std::mem::discriminant(&other)),
        }
    }

    #[test]
    fn resolves_forward_jump_labels() {
        let mut asm = Assembler::new();
        let code = asm
            .assemble(
                "test",
                "LSTATIC.INT 1\nJT skip\nLSTATIC.INT 0\nRET\nskip:\nLSTATIC.INT 9\nRET\n",
            )
            .unwrap();
        match run(code) {
            EvalOutcome::Returned(Value::Int(n)) => assert_eq!(n, 9),
            other => panic!("unexpected outcome in {:?}", std::mem::discriminant(&other)),
        }
    }

    #[test]
    fn undefined_label_is_an_error() {
        let mut asm = Assembler::new();
        let result = asm.assemble("test", "JMP nowhere\nRET\n");
        assert!(matches!(result, Err(AsmError::UndefinedLabel { .. })));
    }

    #[test]
    fn unknown_mnemonic_is_an_error() {
        let mut asm = Assembler::new();
        let result = asm.assemble("test", "FROBNICATE\n");
        assert!(matches!(result, Err(AsmError::UnknownMnemonic { .. })));
    }
}
