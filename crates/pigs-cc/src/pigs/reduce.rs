//! Peephole reducer.
//!
//! Runs a small set of semantics-preserving rewrites to a fixed point:
//!
//! - drop unreachable instructions between an unconditional transfer and
//!   the next tag,
//! - merge adjacent tag definitions (rewriting references),
//! - `STA x; LDA x` → `STA x` (same for `STAP`/`LDAP`),
//! - drop a load immediately overwritten by another load,
//! - drop a `JMP` to the tag that directly follows it,
//! - drop `OR 0` where `F == A` already holds or where no conditional
//!   branch consumes it,
//! - drop tags no branch references.
//!
//! Inline-asm `Raw` instructions are opaque: they are never rewritten and
//! act as barriers for the `OR 0` rules.

use std::collections::HashSet;

use super::instruction::{AluOp, Asm, Instruction, Operand, TagId, TagTable};

pub fn reduce(mut code: Vec<Asm>, tags: &TagTable) -> Vec<Asm> {
    loop {
        let mut changed = sweep_unreachable(&mut code);
        changed |= merge_adjacent_tags(&mut code);
        changed |= peephole(&mut code);
        changed |= drop_unreferenced_tags(&mut code, tags);
        if !changed {
            return code;
        }
    }
}

fn is_or_zero(instr: &Instruction) -> bool {
    matches!(instr, Instruction::Alu(AluOp::Or, Operand::Imm(0)))
}

/// Instructions following an unconditional transfer are unreachable until
/// the next tag definition.
fn sweep_unreachable(code: &mut Vec<Asm>) -> bool {
    let before = code.len();
    let mut reachable = true;
    code.retain(|asm| {
        if matches!(asm.instr, Instruction::Tag(_)) {
            reachable = true;
            return true;
        }
        let keep = reachable;
        if asm.instr.is_terminating() {
            reachable = false;
        }
        keep
    });
    code.len() != before
}

/// `tag a` directly followed by `tag b`: redirect all uses of `b` to `a`
/// and drop `b`. Runs of tags collapse onto the first of the run because
/// the cursor stays put after each removal.
fn merge_adjacent_tags(code: &mut Vec<Asm>) -> bool {
    let mut redirect: Vec<(TagId, TagId)> = Vec::new();
    let mut i = 0;
    while i + 1 < code.len() {
        let pair = match (&code[i].instr, &code[i + 1].instr) {
            (Instruction::Tag(a), Instruction::Tag(b)) => Some((*a, *b)),
            _ => None,
        };
        match pair {
            Some((head, dup)) => {
                redirect.push((dup, head));
                code.remove(i + 1);
            }
            None => i += 1,
        }
    }
    if redirect.is_empty() {
        return false;
    }
    for asm in code.iter_mut() {
        if let Some(target) = asm.instr.branch_target_mut() {
            if let Some((_, to)) = redirect.iter().find(|(from, _)| from == target) {
                *target = *to;
            }
        }
    }
    true
}

fn peephole(code: &mut Vec<Asm>) -> bool {
    let mut out: Vec<Asm> = Vec::with_capacity(code.len());
    let mut changed = false;
    let mut iter = std::mem::take(code).into_iter().peekable();
    while let Some(asm) = iter.next() {
        let next = iter.peek().map(|a| &a.instr);
        match (&asm.instr, next) {
            // Store immediately reloaded: the accumulator already holds
            // the value and LDA would not change F either.
            (Instruction::Sta(v), Some(Instruction::Lda(Operand::Var(w)))) if v == w => {
                out.push(asm);
                iter.next();
                changed = true;
            }
            (Instruction::StaP(n), Some(Instruction::LdaP(m))) if n == m => {
                out.push(asm);
                iter.next();
                changed = true;
            }
            // A load with no observer before the next load.
            (
                Instruction::Lda(_) | Instruction::LdaP(_),
                Some(Instruction::Lda(_) | Instruction::LdaP(_)),
            ) => {
                changed = true; // drop the first load
            }
            // Jump to the tag that directly follows.
            (Instruction::Jmp(t), Some(Instruction::Tag(u))) if t == u => {
                changed = true;
            }
            (instr, next) if is_or_zero(instr) => {
                // `F == A` already holds after any flag-refreshing ALU op,
                // making this a complete no-op.
                let after_alu_op = matches!(
                    out.last().map(|a| &a.instr),
                    Some(Instruction::Alu(op, _)) if op.refreshes_flags()
                );
                // Nothing that reads `F` comes next: conditional branches
                // consume it, raw inline asm might, and a tag means some
                // other path joins here.
                let feeds_branch = matches!(
                    next,
                    Some(
                        Instruction::Jz(_)
                            | Instruction::Jnz(_)
                            | Instruction::Raw { .. }
                            | Instruction::Tag(_)
                    )
                );
                if after_alu_op || !feeds_branch {
                    changed = true;
                } else {
                    out.push(asm);
                }
            }
            _ => out.push(asm),
        }
    }
    *code = out;
    changed
}

fn drop_unreferenced_tags(code: &mut Vec<Asm>, tags: &TagTable) -> bool {
    let mut referenced: HashSet<TagId> = HashSet::new();
    for asm in code.iter() {
        if let Some(target) = asm.instr.branch_target() {
            referenced.insert(target);
        }
        // Raw inline asm may name a tag in a text operand; keep such tags.
        if let Instruction::Raw { operand: Some(Operand::Text(text)), .. } = &asm.instr {
            if let Some(id) = tags.find(text) {
                referenced.insert(id);
            }
        }
    }
    let before = code.len();
    code.retain(|asm| match asm.instr {
        Instruction::Tag(id) => referenced.contains(&id),
        _ => true,
    });
    code.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pigs::instruction::VarId;
    use crate::source::Loc;

    fn asm(instr: Instruction) -> Asm {
        Asm::new(instr, None)
    }

    fn loc() -> Loc {
        Loc::new("t.c".into(), 1, 1)
    }

    #[test]
    fn store_reload_collapses() {
        let mut tags = TagTable::new();
        let t = tags.fresh();
        let code = vec![
            asm(Instruction::Tag(t)),
            asm(Instruction::Sta(VarId(4))),
            asm(Instruction::Lda(Operand::Var(VarId(4)))),
            asm(Instruction::Jmp(t)),
        ];
        let reduced = reduce(code, &tags);
        assert_eq!(reduced.len(), 3);
        assert!(matches!(reduced[1].instr, Instruction::Sta(VarId(4))));
    }

    #[test]
    fn jump_to_next_tag_dropped_then_tag_unreferenced() {
        let mut tags = TagTable::new();
        let t = tags.define("L", &loc()).unwrap();
        let code = vec![
            asm(Instruction::Lda(Operand::Imm(1))),
            asm(Instruction::Jmp(t)),
            asm(Instruction::Tag(t)),
            asm(Instruction::Ret),
        ];
        let reduced = reduce(code, &tags);
        assert_eq!(reduced.len(), 2);
        assert!(matches!(reduced[0].instr, Instruction::Lda(_)));
        assert!(matches!(reduced[1].instr, Instruction::Ret));
    }

    #[test]
    fn or_zero_kept_before_branch_dropped_otherwise() {
        let mut tags = TagTable::new();
        let t = tags.fresh();
        let code = vec![
            asm(Instruction::Tag(t)),
            asm(Instruction::Lda(Operand::Imm(1))),
            asm(Instruction::Alu(AluOp::Or, Operand::Imm(0))),
            asm(Instruction::Jz(t)),
            asm(Instruction::Alu(AluOp::Or, Operand::Imm(0))),
            asm(Instruction::Sta(VarId(4))),
        ];
        let reduced = reduce(code, &tags);
        // The first OR 0 feeds JZ and stays; the second has no consumer.
        let or_count = reduced.iter().filter(|a| is_or_zero(&a.instr)).count();
        assert_eq!(or_count, 1);
    }

    #[test]
    fn or_zero_redundant_after_alu() {
        let mut tags = TagTable::new();
        let t = tags.fresh();
        let code = vec![
            asm(Instruction::Tag(t)),
            asm(Instruction::Alu(AluOp::Add, Operand::Imm(1))),
            asm(Instruction::Alu(AluOp::Or, Operand::Imm(0))),
            asm(Instruction::Jz(t)),
        ];
        let reduced = reduce(code, &tags);
        assert!(matches!(reduced[1].instr, Instruction::Alu(AluOp::Add, _)));
        assert!(matches!(reduced[2].instr, Instruction::Jz(_)));
    }

    #[test]
    fn unreachable_after_ret_swept() {
        let tags = TagTable::new();
        let code = vec![
            asm(Instruction::Ret),
            asm(Instruction::Lda(Operand::Imm(1))),
            asm(Instruction::Ret),
        ];
        let reduced = reduce(code, &tags);
        assert_eq!(reduced.len(), 1);
    }

    #[test]
    fn adjacent_tags_merge() {
        let mut tags = TagTable::new();
        let a = tags.fresh();
        let b = tags.fresh();
        let code = vec![
            asm(Instruction::Jnz(b)),
            asm(Instruction::Tag(a)),
            asm(Instruction::Tag(b)),
            asm(Instruction::Ret),
        ];
        let reduced = reduce(code, &tags);
        // b is folded into a; the branch now references a.
        assert!(matches!(reduced[0].instr, Instruction::Jnz(t) if t == a));
        assert!(matches!(reduced[1].instr, Instruction::Tag(t) if t == a));
        assert_eq!(reduced.len(), 3);
    }

    #[test]
    fn idempotent() {
        let mut tags = TagTable::new();
        let t = tags.fresh();
        let code = vec![
            asm(Instruction::Tag(t)),
            asm(Instruction::Lda(Operand::Imm(3))),
            asm(Instruction::Sta(VarId(4))),
            asm(Instruction::Lda(Operand::Var(VarId(4)))),
            asm(Instruction::Alu(AluOp::Or, Operand::Imm(0))),
            asm(Instruction::Jz(t)),
            asm(Instruction::Ret),
        ];
        let once = reduce(code, &tags);
        let twice = reduce(once.clone(), &tags);
        assert_eq!(
            once.iter().map(|a| format!("{:?}", a.instr)).collect::<Vec<_>>(),
            twice.iter().map(|a| format!("{:?}", a.instr)).collect::<Vec<_>>()
        );
    }
}
