//! Code generator: lowers the resolved AST onto the accumulator machine.
//!
//! The contract throughout is that `gen_expr` leaves the expression value
//! in `A`. `F` is only guaranteed to track `A` after an arithmetic op, so
//! an `OR 0` is inserted before every conditional branch; the reducer
//! strips the redundant ones.

mod expr;
mod helpers;

use std::collections::HashMap;

use crate::alloc::Allocation;
use crate::error::{Error, Result};
use crate::frontend::ast::{AsmOperand, Ast, Expr, Stmt, StmtId};
use crate::pigs::instruction::{
    AluOp, Asm, Instruction, Operand, TagId, TagTable, VarId, SCRATCH,
};
use crate::resolve::{FuncId, Resolved, Symbol, SymbolId};
use crate::source::Loc;

pub use helpers::Helper;

pub fn generate(
    ast: &Ast,
    resolved: &Resolved,
    alloc: &Allocation,
) -> std::result::Result<(Vec<Asm>, TagTable), Vec<Error>> {
    let mut gen = CodeGen::new(ast, resolved, alloc);
    gen.run();
    if gen.errors.is_empty() {
        Ok((gen.code, gen.tags))
    } else {
        Err(gen.errors)
    }
}

pub(crate) struct CodeGen<'a> {
    pub(crate) ast: &'a Ast,
    pub(crate) resolved: &'a Resolved,
    pub(crate) alloc: &'a Allocation,
    pub(crate) code: Vec<Asm>,
    pub(crate) tags: TagTable,
    func_tags: Vec<TagId>,
    pub(crate) helpers_used: Vec<(Helper, TagId)>,
    loop_stack: Vec<LoopTags>,
    pub(crate) current_func: Option<FuncId>,
    pub(crate) scratch_depth: usize,
    pub(crate) temp_depth: usize,
    cur_loc: Option<Loc>,
    /// Inline-asm branch references, checked for definedness at the end.
    named_refs: Vec<(TagId, Loc)>,
    errors: Vec<Error>,
}

#[derive(Clone, Copy)]
struct LoopTags {
    continue_tag: TagId,
    break_tag: TagId,
}

fn is_asm_tag_def(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Asm { mnemonic, .. } if mnemonic.eq_ignore_ascii_case("tag"))
}

impl<'a> CodeGen<'a> {
    fn new(ast: &'a Ast, resolved: &'a Resolved, alloc: &'a Allocation) -> Self {
        let mut tags = TagTable::new();
        let func_tags = resolved
            .functions
            .iter()
            .map(|f| tags.reference(&format!("_{}", f.name)))
            .collect();
        Self {
            ast,
            resolved,
            alloc,
            code: Vec::new(),
            tags,
            func_tags,
            helpers_used: Vec::new(),
            loop_stack: Vec::new(),
            current_func: None,
            scratch_depth: 0,
            temp_depth: 0,
            cur_loc: None,
            named_refs: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(&mut self) {
        self.gen_init_segment();
        for f in 0..self.resolved.functions.len() {
            let func = FuncId(f as u32);
            let info = self.resolved.func(func);
            if !info.reachable || info.body.is_none() {
                continue;
            }
            if let Err(e) = self.gen_function(func) {
                self.errors.push(e);
            }
        }
        if let Err(e) = self.emit_helpers() {
            self.errors.push(e);
        }
        self.check_tag_refs();
    }

    /// Global initialisers, then `CALL _main; HALT`.
    fn gen_init_segment(&mut self) {
        let inits = self.resolved.global_inits.clone();
        for (sym, value) in inits {
            let Symbol::Global { var, loc, .. } = self.resolved.symbol(sym) else {
                continue;
            };
            self.cur_loc = Some(loc.clone());
            let var = *var;
            self.emit(Instruction::Lda(Operand::Imm(value)));
            self.emit(Instruction::Sta(var));
        }
        self.cur_loc = None;
        let main_tag = self.func_tags[self.resolved.main.0 as usize];
        self.emit(Instruction::Call(main_tag));
        self.emit(Instruction::Halt);
    }

    fn gen_function(&mut self, func: FuncId) -> Result<()> {
        let info = self.resolved.func(func);
        let name = format!("_{}", info.name);
        let loc = info.loc.clone();
        let body = info.body.unwrap();
        let returns_value = info.returns_value;
        let func_name = info.name.clone();

        self.current_func = Some(func);
        self.scratch_depth = 0;
        self.temp_depth = 0;
        self.loop_stack.clear();
        self.cur_loc = Some(loc.clone());
        let tag = self.tags.define(&name, &loc)?;
        debug_assert_eq!(tag, self.func_tags[func.0 as usize]);
        self.emit(Instruction::Tag(tag));

        let terminated = self.gen_stmt(body)?;
        if !terminated {
            if returns_value {
                tracing::warn!("{loc}: function \"{func_name}\" should return a value");
            }
            self.emit(Instruction::Ret);
        }
        self.current_func = None;
        Ok(())
    }

    // --- emission helpers ----------------------------------------------

    pub(crate) fn emit(&mut self, instr: Instruction) {
        self.code.push(Asm::new(instr, self.cur_loc.clone()));
    }

    /// Re-establish `F == A` ahead of a conditional branch.
    pub(crate) fn emit_flag_fix(&mut self) {
        self.emit(Instruction::Alu(AluOp::Or, Operand::Imm(0)));
    }

    pub(crate) fn fresh_tag(&mut self) -> TagId {
        self.tags.fresh()
    }

    pub(crate) fn func_tag(&self, func: FuncId) -> TagId {
        self.func_tags[func.0 as usize]
    }

    pub(crate) fn push_scratch(&mut self, loc: &Loc) -> Result<VarId> {
        if self.scratch_depth >= SCRATCH.len() {
            return Err(Error::ScratchExhaustion {
                loc: loc.clone(),
                limit: SCRATCH.len(),
            });
        }
        let var = SCRATCH[self.scratch_depth];
        self.scratch_depth += 1;
        Ok(var)
    }

    pub(crate) fn pop_scratch(&mut self) {
        debug_assert!(self.scratch_depth > 0);
        self.scratch_depth -= 1;
    }

    /// A frame slot for a value that must survive a user-function call.
    pub(crate) fn push_call_temp(&mut self) -> Result<VarId> {
        let func = self
            .current_func
            .ok_or_else(|| Error::Internal("call temporary outside a function".into()))?;
        let var = self
            .alloc
            .call_temp(func, self.temp_depth)
            .ok_or_else(|| Error::Internal("call temporary pool exhausted".into()))?;
        self.temp_depth += 1;
        Ok(var)
    }

    pub(crate) fn pop_call_temp(&mut self) {
        debug_assert!(self.temp_depth > 0);
        self.temp_depth -= 1;
    }

    // --- statements -----------------------------------------------------

    /// Lower one statement. Returns true when every path through it ends
    /// the function (`return` or `exit()`).
    fn gen_stmt(&mut self, id: StmtId) -> Result<bool> {
        self.cur_loc = Some(self.ast.stmt(id).loc().clone());
        match self.ast.stmt(id) {
            Stmt::Expr { expr: None, .. } => Ok(false),
            Stmt::Expr { expr: Some(e), .. } => {
                self.gen_expr(*e)?;
                Ok(self.is_halt_call(*e))
            }
            Stmt::ExprList { exprs, .. } => {
                for e in exprs {
                    self.gen_expr(*e)?;
                }
                Ok(false)
            }
            Stmt::Decl(_) => {
                self.gen_local_decl(id)?;
                Ok(false)
            }
            Stmt::Enum(_) | Stmt::Prototype(_) => Ok(false),
            Stmt::Compound { items, .. } => self.gen_compound(items.clone()),
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.gen_if(*cond, *then_branch, *else_branch)
            }
            Stmt::While { cond, body, .. } => self.gen_while(*cond, *body),
            Stmt::DoWhile { body, cond, .. } => self.gen_do_while(*body, *cond),
            Stmt::For { init, cond, step, body, .. } => {
                self.gen_for(*init, *cond, step.clone(), *body)
            }
            Stmt::Break { loc } => {
                let Some(tags) = self.loop_stack.last() else {
                    return Err(Error::scope(loc.clone(), "\"break\" outside a loop"));
                };
                let target = tags.break_tag;
                self.emit(Instruction::Jmp(target));
                Ok(false)
            }
            Stmt::Continue { loc } => {
                let Some(tags) = self.loop_stack.last() else {
                    return Err(Error::scope(loc.clone(), "\"continue\" outside a loop"));
                };
                let target = tags.continue_tag;
                self.emit(Instruction::Jmp(target));
                Ok(false)
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.gen_expr(*value)?;
                }
                self.emit(Instruction::Ret);
                Ok(true)
            }
            Stmt::Asm { mnemonic, operand, loc } => {
                // An inline `halt` or unconditional `jmp` ends this path
                // just like `return` or `exit()`.
                let transfers = matches!(
                    mnemonic.to_ascii_uppercase().as_str(),
                    "HALT" | "JMP"
                );
                self.gen_asm(id, &mnemonic.clone(), operand.clone(), &loc.clone())?;
                Ok(transfers)
            }
        }
    }

    fn is_halt_call(&self, expr: crate::frontend::ast::ExprId) -> bool {
        matches!(self.ast.expr(expr), Expr::Call { .. })
            && matches!(
                self.resolved.expr_symbol(expr).map(|s| self.resolved.symbol(s)),
                Some(Symbol::Api { spec, .. }) if spec.mnemonic == "HALT"
            )
    }

    fn gen_compound(&mut self, items: Vec<StmtId>) -> Result<bool> {
        let mut live = true;
        let mut ended_by_terminator = false;
        let mut warned = false;
        for item in items {
            if !live && is_asm_tag_def(self.ast.stmt(item)) {
                // A tag definition is a jump target; code after it is
                // reachable again.
                live = true;
            }
            if !live {
                if !warned {
                    let loc = self.ast.stmt(item).loc();
                    tracing::warn!("{loc}: unreachable code");
                    warned = true;
                }
                continue;
            }
            let stmt_terminates = self.gen_stmt(item)?;
            if stmt_terminates {
                live = false;
                ended_by_terminator = true;
            } else if matches!(self.ast.stmt(item), Stmt::Break { .. } | Stmt::Continue { .. }) {
                live = false;
                ended_by_terminator = false;
            }
        }
        Ok(!live && ended_by_terminator)
    }

    fn gen_local_decl(&mut self, id: StmtId) -> Result<()> {
        let Some(syms) = self.resolved.decl_syms.get(&id.0).cloned() else {
            return Ok(());
        };
        let Stmt::Decl(decl) = self.ast.stmt(id) else {
            return Ok(());
        };
        for (var_decl, sym) in decl.vars.iter().zip(syms) {
            if let Some(init) = var_decl.init {
                self.gen_expr(init)?;
                self.store_symbol(sym)?;
            }
        }
        Ok(())
    }

    pub(crate) fn store_symbol(&mut self, sym: SymbolId) -> Result<()> {
        match self.resolved.symbol(sym) {
            Symbol::Global { var, .. } | Symbol::Local { var, .. } => {
                let var = *var;
                self.emit(Instruction::Sta(var));
                Ok(())
            }
            Symbol::Parameter { index, .. } => {
                let index = *index;
                self.emit(Instruction::StaP(index));
                Ok(())
            }
            _ => Err(Error::Internal("store to a non-variable symbol".into())),
        }
    }

    fn gen_if(
        &mut self,
        cond: crate::frontend::ast::ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    ) -> Result<bool> {
        self.gen_expr(cond)?;
        self.emit_flag_fix();
        let end_tag = self.fresh_tag();
        match else_branch {
            None => {
                self.emit(Instruction::Jz(end_tag));
                self.gen_stmt(then_branch)?;
                self.emit(Instruction::Tag(end_tag));
                Ok(false)
            }
            Some(else_branch) => {
                let else_tag = self.fresh_tag();
                self.emit(Instruction::Jz(else_tag));
                let t1 = self.gen_stmt(then_branch)?;
                if !t1 {
                    self.emit(Instruction::Jmp(end_tag));
                }
                self.emit(Instruction::Tag(else_tag));
                let t2 = self.gen_stmt(else_branch)?;
                self.emit(Instruction::Tag(end_tag));
                Ok(t1 && t2)
            }
        }
    }

    fn gen_while(&mut self, cond: crate::frontend::ast::ExprId, body: StmtId) -> Result<bool> {
        let head_tag = self.fresh_tag();
        let end_tag = self.fresh_tag();
        self.emit(Instruction::Tag(head_tag));
        self.gen_expr(cond)?;
        self.emit_flag_fix();
        self.emit(Instruction::Jz(end_tag));
        self.loop_stack.push(LoopTags { continue_tag: head_tag, break_tag: end_tag });
        let result = self.gen_stmt(body);
        self.loop_stack.pop();
        result?;
        self.emit(Instruction::Jmp(head_tag));
        self.emit(Instruction::Tag(end_tag));
        Ok(false)
    }

    fn gen_do_while(&mut self, body: StmtId, cond: crate::frontend::ast::ExprId) -> Result<bool> {
        let head_tag = self.fresh_tag();
        let cont_tag = self.fresh_tag();
        let end_tag = self.fresh_tag();
        self.emit(Instruction::Tag(head_tag));
        self.loop_stack.push(LoopTags { continue_tag: cont_tag, break_tag: end_tag });
        let result = self.gen_stmt(body);
        self.loop_stack.pop();
        let terminated = result?;
        self.emit(Instruction::Tag(cont_tag));
        self.gen_expr(cond)?;
        self.emit_flag_fix();
        self.emit(Instruction::Jnz(head_tag));
        self.emit(Instruction::Tag(end_tag));
        Ok(terminated)
    }

    fn gen_for(
        &mut self,
        init: Option<StmtId>,
        cond: Option<crate::frontend::ast::ExprId>,
        step: Vec<crate::frontend::ast::ExprId>,
        body: StmtId,
    ) -> Result<bool> {
        if let Some(init) = init {
            self.gen_stmt(init)?;
        }
        let head_tag = self.fresh_tag();
        let cont_tag = self.fresh_tag();
        let end_tag = self.fresh_tag();
        self.emit(Instruction::Tag(head_tag));
        if let Some(cond) = cond {
            self.gen_expr(cond)?;
            self.emit_flag_fix();
            self.emit(Instruction::Jz(end_tag));
        }
        self.loop_stack.push(LoopTags { continue_tag: cont_tag, break_tag: end_tag });
        let result = self.gen_stmt(body);
        self.loop_stack.pop();
        result?;
        self.emit(Instruction::Tag(cont_tag));
        for expr in step {
            self.gen_expr(expr)?;
        }
        self.emit(Instruction::Jmp(head_tag));
        self.emit(Instruction::Tag(end_tag));
        Ok(false)
    }

    // --- inline asm ------------------------------------------------------

    fn gen_asm(
        &mut self,
        id: StmtId,
        mnemonic: &str,
        operand: Option<AsmOperand>,
        loc: &Loc,
    ) -> Result<()> {
        let upper = mnemonic.to_ascii_uppercase();
        let is_tag_def = upper == "TAG";
        let is_branch = matches!(upper.as_str(), "JMP" | "JZ" | "JNZ" | "CALL");

        if is_tag_def || is_branch {
            let Some(AsmOperand::Str(name)) = operand else {
                return Err(Error::asm(
                    loc.clone(),
                    format!("\"{mnemonic}\" requires a tag name string"),
                ));
            };
            if is_tag_def {
                let tag = self.tags.define(&name, loc)?;
                self.emit(Instruction::Tag(tag));
            } else {
                let tag = self.tags.reference(&name);
                self.named_refs.push((tag, loc.clone()));
                self.emit(match upper.as_str() {
                    "JMP" => Instruction::Jmp(tag),
                    "JZ" => Instruction::Jz(tag),
                    "JNZ" => Instruction::Jnz(tag),
                    _ => Instruction::Call(tag),
                });
            }
            return Ok(());
        }

        let operand = match operand {
            None => None,
            Some(AsmOperand::Int(value)) => Some(Operand::Imm(value)),
            Some(AsmOperand::Str(text)) => Some(Operand::Text(text)),
            Some(AsmOperand::Ident(name, ident_loc)) => {
                let sym = self.resolved.asm_syms.get(&id.0).copied().ok_or_else(|| {
                    Error::Internal(format!("unresolved asm operand \"{name}\""))
                })?;
                Some(match self.resolved.symbol(sym) {
                    Symbol::Global { var, .. } | Symbol::Local { var, .. } => Operand::Var(*var),
                    Symbol::Parameter { index, .. } => Operand::Param(*index),
                    Symbol::EnumConst { value, .. } => Operand::Imm(*value),
                    _ => {
                        return Err(Error::asm(
                            ident_loc,
                            format!("\"{name}\" does not name a variable"),
                        ))
                    }
                })
            }
        };
        self.emit(Instruction::Raw { mnemonic: upper, operand });
        Ok(())
    }

    // --- finalisation ----------------------------------------------------

    fn emit_helpers(&mut self) -> Result<()> {
        let used = std::mem::take(&mut self.helpers_used);
        self.cur_loc = None;
        for (helper, tag) in used {
            helpers::emit_helper(self, helper, tag)?;
        }
        Ok(())
    }

    fn check_tag_refs(&mut self) {
        let mut seen = HashMap::new();
        for (tag, loc) in std::mem::take(&mut self.named_refs) {
            if !self.tags.is_defined(tag) && !seen.contains_key(&tag.0) {
                seen.insert(tag.0, ());
                self.errors.push(Error::UndefinedTag {
                    loc,
                    name: self.tags.name(tag).to_owned(),
                });
            }
        }
    }
}
