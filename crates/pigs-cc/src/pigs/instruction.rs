use crate::error::{Error, Result};
use crate::source::Loc;

/// A virtual VM variable. Bound to a concrete `vN` slot by the allocator;
/// ids 0..=3 are pre-bound to the reserved scratch slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

pub const SCR0: VarId = VarId(0);
pub const SCRATCH: [VarId; 3] = [VarId(1), VarId(2), VarId(3)];

/// Number of reserved slots (`v0..v3`) preceding user objects.
pub const RESERVED_SLOTS: u32 = 4;
/// Slots available to user objects (`v4..v149`).
pub const USABLE_SLOTS: u32 = 146;
/// Tags the VM accepts per script.
pub const MAX_TAGS: usize = 50;

/// Interned tag, usable as jump and call target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Imm(i32),
    Var(VarId),
    Param(u8),
    /// Verbatim text: inline-asm strings and mapped API letter arguments.
    Text(String),
}

/// Accumulator ops taking one operand: `A = A <op> x`. All of them set
/// `F = A` except `Cmp`, which sets `F = A - x` and leaves `A` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Cmp,
}

impl AluOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::Sub => "SUB",
            AluOp::Mul => "MUL",
            AluOp::Div => "DIV",
            AluOp::Mod => "MOD",
            AluOp::And => "AND",
            AluOp::Or => "OR",
            AluOp::Xor => "XOR",
            AluOp::Shl => "SHL",
            AluOp::Shr => "SHR",
            AluOp::Cmp => "CMP",
        }
    }

    /// Whether executing this op leaves `F == A`.
    pub fn refreshes_flags(self) -> bool {
        self != AluOp::Cmp
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Tag definition, emitted on its own line.
    Tag(TagId),
    /// `LDA x` — load immediate or variable. Does not touch `F`.
    Lda(Operand),
    /// `LDAP n` — load parameter `n`. Does not touch `F`.
    LdaP(u8),
    /// `STA vN`
    Sta(VarId),
    /// `STAP n`
    StaP(u8),
    Alu(AluOp, Operand),
    Jmp(TagId),
    Jz(TagId),
    Jnz(TagId),
    Call(TagId),
    Ret,
    Halt,
    /// VM API command with inline operands.
    Api { mnemonic: &'static str, args: Vec<Operand> },
    /// Inline-asm instruction passed through unoptimised.
    Raw { mnemonic: String, operand: Option<Operand> },
}

impl Instruction {
    /// Control never falls through this instruction. Raw mnemonics are
    /// stored upper-cased, so inline-asm `halt`/`jmp` count too.
    pub fn is_terminating(&self) -> bool {
        match self {
            Instruction::Jmp(_) | Instruction::Ret | Instruction::Halt => true,
            Instruction::Api { mnemonic, .. } => *mnemonic == "HALT",
            Instruction::Raw { mnemonic, .. } => mnemonic == "HALT" || mnemonic == "JMP",
            _ => false,
        }
    }

    pub fn branch_target(&self) -> Option<TagId> {
        match self {
            Instruction::Jmp(t) | Instruction::Jz(t) | Instruction::Jnz(t) | Instruction::Call(t) => {
                Some(*t)
            }
            _ => None,
        }
    }

    pub fn branch_target_mut(&mut self) -> Option<&mut TagId> {
        match self {
            Instruction::Jmp(t) | Instruction::Jz(t) | Instruction::Jnz(t) | Instruction::Call(t) => {
                Some(t)
            }
            _ => None,
        }
    }
}

/// One emitted instruction plus the source location it was lowered from
/// (drives `-c` comments and diagnostics).
#[derive(Debug, Clone)]
pub struct Asm {
    pub instr: Instruction,
    pub loc: Option<Loc>,
}

impl Asm {
    pub fn new(instr: Instruction, loc: Option<Loc>) -> Self {
        Self { instr, loc }
    }
}

/// All tag names of a unit: generated control-flow tags, function entry
/// tags, helper entry tags and inline-asm tags share this namespace.
#[derive(Debug, Default)]
pub struct TagTable {
    tags: Vec<TagEntry>,
    next_generated: u32,
}

#[derive(Debug)]
struct TagEntry {
    name: String,
    defined: bool,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self, id: TagId) -> &str {
        &self.tags[id.0 as usize].name
    }

    pub fn is_defined(&self, id: TagId) -> bool {
        self.tags[id.0 as usize].defined
    }

    pub fn find(&self, name: &str) -> Option<TagId> {
        self.tags
            .iter()
            .position(|t| t.name == name)
            .map(|i| TagId(i as u32))
    }

    fn intern(&mut self, name: String) -> TagId {
        if let Some(id) = self.find(&name) {
            return id;
        }
        let id = TagId(self.tags.len() as u32);
        self.tags.push(TagEntry { name, defined: false });
        id
    }

    /// A fresh generated tag (`_L0`, `_L1`, …), skipping names already
    /// taken by inline asm or function entries.
    pub fn fresh(&mut self) -> TagId {
        loop {
            let name = format!("_L{}", self.next_generated);
            self.next_generated += 1;
            if self.find(&name).is_none() {
                let id = self.intern(name);
                self.mark_defined(id);
                return id;
            }
        }
    }

    /// Intern a tag for a branch reference; it may be defined later.
    pub fn reference(&mut self, name: &str) -> TagId {
        self.intern(name.to_owned())
    }

    /// Define a named tag. A second definition of the same name is a
    /// collision regardless of where either came from.
    pub fn define(&mut self, name: &str, loc: &Loc) -> Result<TagId> {
        let id = self.intern(name.to_owned());
        if self.tags[id.0 as usize].defined {
            return Err(Error::TagCollision { loc: loc.clone(), name: name.to_owned() });
        }
        self.mark_defined(id);
        Ok(id)
    }

    fn mark_defined(&mut self, id: TagId) {
        self.tags[id.0 as usize].defined = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Loc {
        Loc::new("t.c".into(), 1, 1)
    }

    #[test]
    fn fresh_tags_skip_taken_names() {
        let mut tags = TagTable::new();
        tags.define("_L0", &loc()).unwrap();
        let t = tags.fresh();
        assert_eq!(tags.name(t), "_L1");
    }

    #[test]
    fn duplicate_definition_collides() {
        let mut tags = TagTable::new();
        tags.define("loop", &loc()).unwrap();
        assert!(matches!(
            tags.define("loop", &loc()),
            Err(Error::TagCollision { .. })
        ));
    }

    #[test]
    fn reference_then_define() {
        let mut tags = TagTable::new();
        let r = tags.reference("end");
        assert!(!tags.is_defined(r));
        let d = tags.define("end", &loc()).unwrap();
        assert_eq!(r, d);
        assert!(tags.is_defined(r));
    }

    #[test]
    fn terminating_instructions() {
        assert!(Instruction::Halt.is_terminating());
        assert!(Instruction::Jmp(TagId(0)).is_terminating());
        assert!(Instruction::Api { mnemonic: "HALT", args: vec![] }.is_terminating());
        assert!(Instruction::Raw { mnemonic: "HALT".into(), operand: None }.is_terminating());
        assert!(!Instruction::Call(TagId(0)).is_terminating());
        assert!(!Instruction::Jz(TagId(0)).is_terminating());
        assert!(!Instruction::Raw { mnemonic: "PUSHA".into(), operand: None }.is_terminating());
    }
}
