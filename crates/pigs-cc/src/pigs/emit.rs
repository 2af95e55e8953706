//! Serialises the instruction list into the VM's textual assembly.

use std::fmt::Write as _;

use super::instruction::{Asm, Instruction, Operand, TagTable};
use crate::alloc::Allocation;
use crate::source::SourceMap;

pub fn encode(
    code: &[Asm],
    tags: &TagTable,
    alloc: &Allocation,
    sources: &SourceMap,
    comments: bool,
) -> String {
    let mut out = String::new();
    if comments {
        out.push_str("// v0: scratch, v1-v3: expression temporaries\n");
        for note in &alloc.notes {
            let _ = writeln!(out, "// v{}: {}", note.slot, note.what);
        }
        if !alloc.notes.is_empty() {
            out.push('\n');
        }
    }

    let mut last_line = None;
    for asm in code {
        if comments {
            if let Some(loc) = &asm.loc {
                let line_key = (loc.file.clone(), loc.line);
                if last_line.as_ref() != Some(&line_key) {
                    last_line = Some(line_key);
                    if let Some(text) = sources.line_text(loc) {
                        let _ = writeln!(out, "// {}", text.trim());
                    }
                }
            }
        }
        out.push_str(&format_instruction(&asm.instr, tags, alloc));
        out.push('\n');
    }
    out
}

fn format_operand(operand: &Operand, alloc: &Allocation) -> String {
    match operand {
        Operand::Imm(value) => value.to_string(),
        Operand::Var(var) => format!("v{}", alloc.slot(*var)),
        Operand::Param(index) => format!("p{index}"),
        Operand::Text(text) => text.clone(),
    }
}

fn format_instruction(instr: &Instruction, tags: &TagTable, alloc: &Allocation) -> String {
    match instr {
        Instruction::Tag(tag) => format!("tag {}", tags.name(*tag)),
        Instruction::Lda(op) => format!("    LDA {}", format_operand(op, alloc)),
        Instruction::LdaP(index) => format!("    LDAP {index}"),
        Instruction::Sta(var) => format!("    STA v{}", alloc.slot(*var)),
        Instruction::StaP(index) => format!("    STAP {index}"),
        Instruction::Alu(op, operand) => {
            format!("    {} {}", op.mnemonic(), format_operand(operand, alloc))
        }
        Instruction::Jmp(tag) => format!("    JMP {}", tags.name(*tag)),
        Instruction::Jz(tag) => format!("    JZ {}", tags.name(*tag)),
        Instruction::Jnz(tag) => format!("    JNZ {}", tags.name(*tag)),
        Instruction::Call(tag) => format!("    CALL {}", tags.name(*tag)),
        Instruction::Ret => "    RET".into(),
        Instruction::Halt => "    HALT".into(),
        Instruction::Api { mnemonic, args } => {
            let mut line = format!("    {mnemonic}");
            for arg in args {
                line.push(' ');
                line.push_str(&format_operand(arg, alloc));
            }
            line
        }
        Instruction::Raw { mnemonic, operand } => match operand {
            Some(op) => format!("    {mnemonic} {}", format_operand(op, alloc)),
            None => format!("    {mnemonic}"),
        },
    }
}
