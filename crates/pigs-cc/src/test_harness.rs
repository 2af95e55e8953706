//! Test harness: compile helpers and a reference interpreter for the
//! PIGS VM, used by the scenario and property tests.
//!
//! The interpreter models the flag rule the code generator has to work
//! around: arithmetic and bitwise ops set `F = A`, `CMP x` sets
//! `F = A - x`, loads leave `F` alone, and the conditional jumps test
//! `F`. A program that relies on a stale `F` therefore fails here the
//! same way it would on the real VM.

use std::collections::HashMap;

use crate::pigs::instruction::{AluOp, Instruction, Operand, TagId, VarId};
use crate::{CompileOptions, CompiledProgram, Error};

pub fn compile_c(src: &str) -> CompiledProgram {
    try_compile_c(src).unwrap_or_else(|errors| {
        panic!(
            "compilation failed:\n{}",
            errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
        )
    })
}

pub fn try_compile_c(src: &str) -> Result<CompiledProgram, Vec<Error>> {
    crate::compile(&[("test.c", src)])
}

pub fn compile_c_with(src: &str, options: &CompileOptions) -> CompiledProgram {
    crate::compile_with_options(&[("test.c", src)], options).unwrap_or_else(|errors| {
        panic!(
            "compilation failed:\n{}",
            errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
        )
    })
}

/// Compile and run, panicking on any compile or runtime error.
pub fn run_c(src: &str) -> Vm {
    run_program(&compile_c(src)).expect("program crashed")
}

pub fn run_program(program: &CompiledProgram) -> Result<Vm, VmError> {
    Vm::new().run(program)
}

#[derive(Debug, PartialEq, Eq)]
pub enum VmError {
    DivideByZero,
    StackUnderflow,
    StepLimit,
    UnknownTag(String),
    Unsupported(String),
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmError::DivideByZero => write!(f, "division by zero"),
            VmError::StackUnderflow => write!(f, "stack underflow"),
            VmError::StepLimit => write!(f, "step limit exceeded"),
            VmError::UnknownTag(name) => write!(f, "unknown tag {name}"),
            VmError::Unsupported(m) => write!(f, "unsupported instruction {m}"),
        }
    }
}

/// Reference PIGS VM state.
#[derive(Debug)]
pub struct Vm {
    pub a: i32,
    pub f: i32,
    pub vars: Vec<i32>,
    pub params: [i32; 10],
    pub steps: usize,
    step_limit: usize,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self {
            a: 0,
            f: 0,
            vars: vec![0; 512],
            params: [0; 10],
            steps: 0,
            step_limit: 1_000_000,
        }
    }

    pub fn param(&self, n: usize) -> i32 {
        self.params[n]
    }

    pub fn run(mut self, program: &CompiledProgram) -> Result<Self, VmError> {
        let code = program.instructions();
        let mut tag_index: HashMap<TagId, usize> = HashMap::new();
        for (i, asm) in code.iter().enumerate() {
            if let Instruction::Tag(tag) = asm.instr {
                tag_index.insert(tag, i);
            }
        }
        let slot = |var: VarId| program.allocation().slot(var) as usize;
        let jump = |tag: TagId| {
            tag_index
                .get(&tag)
                .copied()
                .ok_or_else(|| VmError::UnknownTag(program.tags().name(tag).to_owned()))
        };

        let mut ip = 0usize;
        let mut call_stack: Vec<usize> = Vec::new();
        let mut data_stack: Vec<i32> = Vec::new();

        while ip < code.len() {
            self.steps += 1;
            if self.steps > self.step_limit {
                return Err(VmError::StepLimit);
            }
            let instr = &code[ip].instr;
            ip += 1;
            match instr {
                Instruction::Tag(_) => {}
                Instruction::Lda(op) => self.a = self.value(op, slot)?,
                Instruction::LdaP(n) => self.a = self.params[*n as usize],
                Instruction::Sta(var) => self.vars[slot(*var)] = self.a,
                Instruction::StaP(n) => self.params[*n as usize] = self.a,
                Instruction::Alu(op, operand) => {
                    let x = self.value(operand, slot)?;
                    self.alu(*op, x)?;
                }
                Instruction::Jmp(tag) => ip = jump(*tag)?,
                Instruction::Jz(tag) => {
                    if self.f == 0 {
                        ip = jump(*tag)?;
                    }
                }
                Instruction::Jnz(tag) => {
                    if self.f != 0 {
                        ip = jump(*tag)?;
                    }
                }
                Instruction::Call(tag) => {
                    call_stack.push(ip);
                    ip = jump(*tag)?;
                }
                Instruction::Ret => {
                    ip = call_stack.pop().ok_or(VmError::StackUnderflow)?;
                }
                Instruction::Halt => return Ok(self),
                Instruction::Api { mnemonic, .. } => {
                    if *mnemonic == "HALT" {
                        return Ok(self);
                    }
                    // Hardware commands are inert in the reference VM.
                }
                Instruction::Raw { mnemonic, operand } => match (mnemonic.as_str(), operand) {
                    ("HALT", None) => return Ok(self),
                    ("PUSH" | "PUSHA", Some(op)) => data_stack.push(self.value(op, slot)?),
                    ("PUSHA", None) => data_stack.push(self.a),
                    ("POP" | "POPA", Some(Operand::Var(var))) => {
                        self.vars[slot(*var)] =
                            data_stack.pop().ok_or(VmError::StackUnderflow)?;
                    }
                    ("POP" | "POPA", Some(Operand::Param(n))) => {
                        self.params[*n as usize] =
                            data_stack.pop().ok_or(VmError::StackUnderflow)?;
                    }
                    ("POPA", None) => {
                        self.a = data_stack.pop().ok_or(VmError::StackUnderflow)?;
                    }
                    _ => return Err(VmError::Unsupported(mnemonic.clone())),
                },
            }
        }
        Ok(self)
    }

    fn value<F: Fn(VarId) -> usize>(&self, operand: &Operand, slot: F) -> Result<i32, VmError> {
        match operand {
            Operand::Imm(value) => Ok(*value),
            Operand::Var(var) => Ok(self.vars[slot(*var)]),
            Operand::Param(n) => Ok(self.params[*n as usize]),
            Operand::Text(text) => Err(VmError::Unsupported(format!("operand \"{text}\""))),
        }
    }

    fn alu(&mut self, op: AluOp, x: i32) -> Result<(), VmError> {
        match op {
            AluOp::Cmp => {
                self.f = self.a.wrapping_sub(x);
                return Ok(());
            }
            AluOp::Add => self.a = self.a.wrapping_add(x),
            AluOp::Sub => self.a = self.a.wrapping_sub(x),
            AluOp::Mul => self.a = self.a.wrapping_mul(x),
            AluOp::Div => {
                if x == 0 {
                    return Err(VmError::DivideByZero);
                }
                self.a = self.a.wrapping_div(x);
            }
            AluOp::Mod => {
                if x == 0 {
                    return Err(VmError::DivideByZero);
                }
                self.a = self.a.wrapping_rem(x);
            }
            AluOp::And => self.a &= x,
            AluOp::Or => self.a |= x,
            AluOp::Xor => self.a ^= x,
            AluOp::Shl => self.a = self.a.wrapping_shl(x as u32),
            AluOp::Shr => self.a = self.a.wrapping_shr(x as u32),
        }
        self.f = self.a;
        Ok(())
    }
}
