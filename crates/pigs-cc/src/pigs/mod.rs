pub mod emit;
pub mod instruction;
pub mod reduce;

pub use instruction::{AluOp, Asm, Instruction, Operand, TagId, TagTable, VarId};
