//! Built-in helper subroutines, emitted once per unit when referenced.
//!
//! Binary helpers read their left operand from `A` and their right from
//! `v0`, produce `0`/`1` in `A` and return. Ordered comparisons have no
//! sign-conditional jump to lean on, so they test the sign bit of the
//! wrapped difference (`SUB v0; SHR 31; AND 1`); every internal branch
//! directly follows an op that refreshes `F`.

use super::CodeGen;
use crate::error::Result;
use crate::pigs::instruction::{AluOp, Instruction, Operand, TagId, SCR0};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    /// `A = !A`
    NotL,
    /// `A = A ? 1 : 0`
    Bool,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Helper {
    pub fn tag_name(self) -> &'static str {
        match self {
            Helper::NotL => "_NOTL",
            Helper::Bool => "_BOOL",
            Helper::Eq => "_EQ",
            Helper::Ne => "_NE",
            Helper::Lt => "_LT",
            Helper::Le => "_LE",
            Helper::Gt => "_GT",
            Helper::Ge => "_GE",
        }
    }
}

pub(crate) fn emit_helper(gen: &mut CodeGen<'_>, helper: Helper, tag: TagId) -> Result<()> {
    // The entry tag was interned at first use; defining it now catches a
    // collision with an inline-asm tag of the same name.
    let loc = crate::source::Loc::new("<builtin>".into(), 0, 0);
    let defined = gen.tags.define(helper.tag_name(), &loc)?;
    debug_assert_eq!(defined, tag);
    gen.emit(Instruction::Tag(tag));

    let imm = Operand::Imm;
    match helper {
        Helper::NotL => {
            let zero = gen.fresh_tag();
            gen.emit(Instruction::Alu(AluOp::Or, imm(0)));
            gen.emit(Instruction::Jz(zero));
            gen.emit(Instruction::Lda(imm(0)));
            gen.emit(Instruction::Ret);
            gen.emit(Instruction::Tag(zero));
            gen.emit(Instruction::Lda(imm(1)));
            gen.emit(Instruction::Ret);
        }
        Helper::Bool => {
            let done = gen.fresh_tag();
            gen.emit(Instruction::Alu(AluOp::Or, imm(0)));
            gen.emit(Instruction::Jz(done));
            gen.emit(Instruction::Lda(imm(1)));
            gen.emit(Instruction::Tag(done));
            gen.emit(Instruction::Ret);
        }
        Helper::Eq => {
            let equal = gen.fresh_tag();
            gen.emit(Instruction::Alu(AluOp::Sub, Operand::Var(SCR0)));
            gen.emit(Instruction::Jz(equal));
            gen.emit(Instruction::Lda(imm(0)));
            gen.emit(Instruction::Ret);
            gen.emit(Instruction::Tag(equal));
            gen.emit(Instruction::Lda(imm(1)));
            gen.emit(Instruction::Ret);
        }
        Helper::Ne => {
            // On the equal path the difference already left 0 in A.
            let equal = gen.fresh_tag();
            gen.emit(Instruction::Alu(AluOp::Sub, Operand::Var(SCR0)));
            gen.emit(Instruction::Jz(equal));
            gen.emit(Instruction::Lda(imm(1)));
            gen.emit(Instruction::Tag(equal));
            gen.emit(Instruction::Ret);
        }
        Helper::Lt => {
            gen.emit(Instruction::Alu(AluOp::Sub, Operand::Var(SCR0)));
            gen.emit(Instruction::Alu(AluOp::Shr, imm(31)));
            gen.emit(Instruction::Alu(AluOp::And, imm(1)));
            gen.emit(Instruction::Ret);
        }
        Helper::Ge => {
            gen.emit(Instruction::Alu(AluOp::Sub, Operand::Var(SCR0)));
            gen.emit(Instruction::Alu(AluOp::Shr, imm(31)));
            gen.emit(Instruction::Alu(AluOp::And, imm(1)));
            gen.emit(Instruction::Alu(AluOp::Xor, imm(1)));
            gen.emit(Instruction::Ret);
        }
        Helper::Gt => {
            // a > b is the sign-complement of a < b once equality is
            // ruled out; equal leaves 0 in A, which is the answer.
            let equal = gen.fresh_tag();
            gen.emit(Instruction::Alu(AluOp::Sub, Operand::Var(SCR0)));
            gen.emit(Instruction::Jz(equal));
            gen.emit(Instruction::Alu(AluOp::Shr, imm(31)));
            gen.emit(Instruction::Alu(AluOp::And, imm(1)));
            gen.emit(Instruction::Alu(AluOp::Xor, imm(1)));
            gen.emit(Instruction::Tag(equal));
            gen.emit(Instruction::Ret);
        }
        Helper::Le => {
            let equal = gen.fresh_tag();
            gen.emit(Instruction::Alu(AluOp::Sub, Operand::Var(SCR0)));
            gen.emit(Instruction::Jz(equal));
            gen.emit(Instruction::Alu(AluOp::Shr, imm(31)));
            gen.emit(Instruction::Alu(AluOp::And, imm(1)));
            gen.emit(Instruction::Ret);
            gen.emit(Instruction::Tag(equal));
            gen.emit(Instruction::Lda(imm(1)));
            gen.emit(Instruction::Ret);
        }
    }
    Ok(())
}
