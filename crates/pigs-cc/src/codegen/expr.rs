//! Expression lowering. Every `gen_expr` leaves the value in `A`;
//! compound operands are parked in `v1..v3` (or in a frame temporary when
//! they must survive a user-function call), comparison operands travel
//! through `v0` into the helper routines.

use super::helpers::Helper;
use super::CodeGen;
use crate::alloc::contains_user_call;
use crate::api::ApiSpec;
use crate::error::{Error, Result};
use crate::frontend::ast::{BinOp, Expr, ExprId, UnaryOp};
use crate::pigs::instruction::{AluOp, Instruction, Operand, VarId, SCR0};
use crate::resolve::{FuncId, Symbol, SymbolId};
use crate::source::Loc;

fn alu_op(op: BinOp) -> AluOp {
    match op {
        BinOp::Add => AluOp::Add,
        BinOp::Sub => AluOp::Sub,
        BinOp::Mul => AluOp::Mul,
        BinOp::Div => AluOp::Div,
        BinOp::Mod => AluOp::Mod,
        BinOp::BitAnd => AluOp::And,
        BinOp::BitOr => AluOp::Or,
        BinOp::BitXor => AluOp::Xor,
        BinOp::Shl => AluOp::Shl,
        BinOp::Shr => AluOp::Shr,
        _ => unreachable!("not a direct ALU operator"),
    }
}

fn comparison_helper(op: BinOp) -> Helper {
    match op {
        BinOp::Eq => Helper::Eq,
        BinOp::Ne => Helper::Ne,
        BinOp::Lt => Helper::Lt,
        BinOp::Le => Helper::Le,
        BinOp::Gt => Helper::Gt,
        BinOp::Ge => Helper::Ge,
        _ => unreachable!("not a comparison operator"),
    }
}

impl CodeGen<'_> {
    pub(crate) fn gen_expr(&mut self, id: ExprId) -> Result<()> {
        match self.ast.expr(id) {
            Expr::IntLit { value, .. } => {
                let value = *value;
                self.emit(Instruction::Lda(Operand::Imm(value)));
                Ok(())
            }
            Expr::Ident { .. } => {
                let operand = self
                    .leaf_operand(id)
                    .ok_or_else(|| Error::Internal("unresolved identifier".into()))?;
                self.emit_load(operand);
                Ok(())
            }
            Expr::Unary { op, operand, loc } => {
                self.gen_unary(*op, *operand, &loc.clone())
            }
            Expr::Binary { op, lhs, rhs, loc } => {
                let (op, lhs, rhs, loc) = (*op, *lhs, *rhs, loc.clone());
                if op.is_short_circuit() {
                    self.gen_short_circuit(op, lhs, rhs)
                } else if op.is_comparison() {
                    self.gen_comparison(op, lhs, rhs, &loc)
                } else {
                    self.gen_arith(op, lhs, rhs, &loc)
                }
            }
            Expr::Assign { target, op, value, loc } => {
                let (target, op, value, loc) = (*target, *op, *value, loc.clone());
                self.gen_assign(target, op, value, &loc)
            }
            Expr::Call { args, loc, .. } => {
                let args = args.clone();
                let loc = loc.clone();
                let sym = self
                    .resolved
                    .expr_symbol(id)
                    .ok_or_else(|| Error::Internal("unresolved call".into()))?;
                match self.resolved.symbol(sym) {
                    Symbol::Function(callee) => {
                        let callee = *callee;
                        self.gen_user_call(callee, &args, &loc)
                    }
                    Symbol::Api { spec, .. } => {
                        let spec = *spec;
                        self.gen_api_call(spec, &args, &loc)
                    }
                    _ => Err(Error::Internal("call to a non-function symbol".into())),
                }
            }
        }
    }

    /// Operand form of a leaf expression, if it is one.
    pub(crate) fn leaf_operand(&self, id: ExprId) -> Option<Operand> {
        match self.ast.expr(id) {
            Expr::IntLit { value, .. } => Some(Operand::Imm(*value)),
            Expr::Ident { .. } => {
                let sym = self.resolved.expr_symbol(id)?;
                match self.resolved.symbol(sym) {
                    Symbol::Global { var, .. } | Symbol::Local { var, .. } => {
                        Some(Operand::Var(*var))
                    }
                    Symbol::Parameter { index, .. } => Some(Operand::Param(*index)),
                    Symbol::EnumConst { value, .. } => Some(Operand::Imm(*value)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn emit_load(&mut self, operand: Operand) {
        match operand {
            Operand::Param(index) => self.emit(Instruction::LdaP(index)),
            other => self.emit(Instruction::Lda(other)),
        }
    }

    fn emit_store_operand(&mut self, operand: &Operand) -> Result<()> {
        match operand {
            Operand::Var(var) => {
                let var = *var;
                self.emit(Instruction::Sta(var));
                Ok(())
            }
            Operand::Param(index) => {
                let index = *index;
                self.emit(Instruction::StaP(index));
                Ok(())
            }
            _ => Err(Error::Internal("store to a non-variable operand".into())),
        }
    }

    pub(crate) fn call_helper(&mut self, helper: Helper) {
        let tag = match self.helpers_used.iter().find(|(h, _)| *h == helper) {
            Some((_, tag)) => *tag,
            None => {
                let tag = self.tags.reference(helper.tag_name());
                self.helpers_used.push((helper, tag));
                tag
            }
        };
        self.emit(Instruction::Call(tag));
    }

    // --- operators -------------------------------------------------------

    fn gen_unary(&mut self, op: UnaryOp, operand: ExprId, loc: &Loc) -> Result<()> {
        match op {
            UnaryOp::Plus => self.gen_expr(operand),
            UnaryOp::Neg => {
                if let Expr::IntLit { value, .. } = self.ast.expr(operand) {
                    let value = value.wrapping_neg();
                    self.emit(Instruction::Lda(Operand::Imm(value)));
                    return Ok(());
                }
                self.gen_expr(operand)?;
                self.emit(Instruction::Alu(AluOp::Xor, Operand::Imm(-1)));
                self.emit(Instruction::Alu(AluOp::Add, Operand::Imm(1)));
                Ok(())
            }
            UnaryOp::BitNot => {
                self.gen_expr(operand)?;
                self.emit(Instruction::Alu(AluOp::Xor, Operand::Imm(-1)));
                Ok(())
            }
            UnaryOp::LogicalNot => {
                self.gen_expr(operand)?;
                self.call_helper(Helper::NotL);
                Ok(())
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                let target = self
                    .leaf_operand(operand)
                    .ok_or_else(|| Error::Internal("non-lvalue increment".into()))?;
                let step = if op == UnaryOp::PreInc { AluOp::Add } else { AluOp::Sub };
                self.emit_load(target.clone());
                self.emit(Instruction::Alu(step, Operand::Imm(1)));
                self.emit_store_operand(&target)
            }
            UnaryOp::PostInc | UnaryOp::PostDec => {
                let target = self
                    .leaf_operand(operand)
                    .ok_or_else(|| Error::Internal("non-lvalue increment".into()))?;
                let step = if op == UnaryOp::PostInc { AluOp::Add } else { AluOp::Sub };
                let saved = self.push_scratch(loc)?;
                self.emit_load(target.clone());
                self.emit(Instruction::Sta(saved));
                self.emit(Instruction::Alu(step, Operand::Imm(1)));
                self.emit_store_operand(&target)?;
                self.emit(Instruction::Lda(Operand::Var(saved)));
                self.pop_scratch();
                Ok(())
            }
        }
    }

    fn gen_short_circuit(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId) -> Result<()> {
        let short_tag = self.fresh_tag();
        let end_tag = self.fresh_tag();
        self.gen_expr(lhs)?;
        self.emit_flag_fix();
        if op == BinOp::LogicalAnd {
            self.emit(Instruction::Jz(short_tag));
        } else {
            self.emit(Instruction::Jnz(short_tag));
        }
        self.gen_expr(rhs)?;
        self.call_helper(Helper::Bool);
        self.emit(Instruction::Jmp(end_tag));
        self.emit(Instruction::Tag(short_tag));
        let short_value = i32::from(op == BinOp::LogicalOr);
        self.emit(Instruction::Lda(Operand::Imm(short_value)));
        self.emit(Instruction::Tag(end_tag));
        Ok(())
    }

    /// `a OP b` through the comparison helpers: `a` ends up in `A`, `b`
    /// in `v0`, and the helper leaves 0/1 in `A`. A non-leaf `a` is parked
    /// while `b` evaluates so `v0` is only live for a single instruction.
    fn gen_comparison(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId, loc: &Loc) -> Result<()> {
        if let Some(lhs_operand) = self.leaf_operand(lhs) {
            self.gen_expr(rhs)?;
            self.emit(Instruction::Sta(SCR0));
            self.emit_load(lhs_operand);
        } else {
            let parked = if contains_user_call(self.ast, self.resolved, rhs) {
                self.gen_expr(lhs)?;
                let temp = self.push_call_temp()?;
                self.emit(Instruction::Sta(temp));
                self.gen_expr(rhs)?;
                self.pop_call_temp();
                temp
            } else {
                self.gen_expr(lhs)?;
                let temp = self.push_scratch(loc)?;
                self.emit(Instruction::Sta(temp));
                self.gen_expr(rhs)?;
                self.pop_scratch();
                temp
            };
            self.emit(Instruction::Sta(SCR0));
            self.emit(Instruction::Lda(Operand::Var(parked)));
        }
        self.call_helper(comparison_helper(op));
        Ok(())
    }

    fn gen_arith(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId, loc: &Loc) -> Result<()> {
        if let Some(rhs_operand) = self.leaf_operand(rhs) {
            self.gen_expr(lhs)?;
            self.emit(Instruction::Alu(alu_op(op), rhs_operand));
            return Ok(());
        }
        // Compound right operand evaluates first into a temporary, then
        // the left side lands in `A` and the op consumes the temporary.
        let parked = if contains_user_call(self.ast, self.resolved, lhs) {
            self.gen_expr(rhs)?;
            let temp = self.push_call_temp()?;
            self.emit(Instruction::Sta(temp));
            self.gen_expr(lhs)?;
            self.pop_call_temp();
            temp
        } else {
            self.gen_expr(rhs)?;
            let temp = self.push_scratch(loc)?;
            self.emit(Instruction::Sta(temp));
            self.gen_expr(lhs)?;
            self.pop_scratch();
            temp
        };
        self.emit(Instruction::Alu(alu_op(op), Operand::Var(parked)));
        Ok(())
    }

    fn gen_assign(
        &mut self,
        target: ExprId,
        op: Option<BinOp>,
        value: ExprId,
        loc: &Loc,
    ) -> Result<()> {
        let target_sym = self
            .resolved
            .expr_symbol(target)
            .ok_or_else(|| Error::Internal("unresolved assignment target".into()))?;
        let target_operand = self
            .leaf_operand(target)
            .ok_or_else(|| Error::Internal("assignment to a non-variable".into()))?;
        match op {
            None => {
                self.gen_expr(value)?;
                self.store_symbol(target_sym)
            }
            Some(op) => {
                // `x OP= e` avoids re-evaluating `x`.
                if let Some(value_operand) = self.leaf_operand(value) {
                    self.emit_load(target_operand.clone());
                    self.emit(Instruction::Alu(alu_op(op), value_operand));
                } else {
                    self.gen_expr(value)?;
                    let temp = self.push_scratch(loc)?;
                    self.emit(Instruction::Sta(temp));
                    self.emit_load(target_operand.clone());
                    self.emit(Instruction::Alu(alu_op(op), Operand::Var(temp)));
                    self.pop_scratch();
                }
                self.emit_store_operand(&target_operand)
            }
        }
    }

    // --- calls -----------------------------------------------------------

    /// User-function call: argument values land in the callee's parameter
    /// slots, the return value in `A`. Arguments containing calls are
    /// evaluated first; all but the last of them park their value in a
    /// frame temporary so no later call can clobber it.
    fn gen_user_call(&mut self, callee: FuncId, args: &[ExprId], _loc: &Loc) -> Result<()> {
        let param_syms: Vec<SymbolId> = self.resolved.func(callee).params.clone();
        let param_vars: Vec<VarId> = param_syms
            .iter()
            .map(|sym| match self.resolved.symbol(*sym) {
                Symbol::Local { var, .. } => Ok(*var),
                _ => Err(Error::Internal("parameter without a slot".into())),
            })
            .collect::<Result<_>>()?;

        let with_calls: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| contains_user_call(self.ast, self.resolved, **a))
            .map(|(i, _)| i)
            .collect();
        let (saved, direct_call_arg) = match with_calls.split_last() {
            Some((last, saved)) => (saved, Some(*last)),
            None => (&[][..], None),
        };

        let mut parked: Vec<(usize, VarId)> = Vec::with_capacity(saved.len());
        for &i in saved {
            self.gen_expr(args[i])?;
            let temp = self.push_call_temp()?;
            self.emit(Instruction::Sta(temp));
            parked.push((i, temp));
        }
        if let Some(i) = direct_call_arg {
            self.gen_expr(args[i])?;
            self.emit(Instruction::Sta(param_vars[i]));
        }
        for (i, arg) in args.iter().enumerate() {
            if with_calls.contains(&i) {
                continue;
            }
            self.gen_expr(*arg)?;
            self.emit(Instruction::Sta(param_vars[i]));
        }
        for &(i, temp) in &parked {
            self.emit(Instruction::Lda(Operand::Var(temp)));
            self.emit(Instruction::Sta(param_vars[i]));
        }
        for _ in &parked {
            self.pop_call_temp();
        }

        let tag = self.func_tag(callee);
        self.emit(Instruction::Call(tag));
        Ok(())
    }

    /// VM API call: leaf arguments become operands directly; compound
    /// arguments are evaluated into `v1..v3` (or a frame temporary when a
    /// later argument performs a user call); mapped constant arguments
    /// turn into letter operands.
    fn gen_api_call(&mut self, spec: &'static ApiSpec, args: &[ExprId], loc: &Loc) -> Result<()> {
        let mut operands: Vec<Operand> = Vec::with_capacity(args.len());
        let mut scratch_used = 0usize;
        let mut temps_used = 0usize;

        for (i, arg) in args.iter().enumerate() {
            if let Some((map_idx, mapping)) = spec.arg_map {
                if map_idx == i {
                    let Some(value) = self.resolved.const_value(self.ast, *arg) else {
                        return Err(Error::ty(
                            self.ast.expr(*arg).loc().clone(),
                            format!(
                                "{}: compile-time constant required for argument {}",
                                spec.c_name,
                                i + 1
                            ),
                        ));
                    };
                    operands.push(match mapping.map(value) {
                        Some(letter) => Operand::Text(letter.to_string()),
                        None => Operand::Imm(value),
                    });
                    continue;
                }
            }
            if let Some(operand) = self.leaf_operand(*arg) {
                operands.push(operand);
                continue;
            }
            let later_call = args[i + 1..]
                .iter()
                .any(|a| contains_user_call(self.ast, self.resolved, *a));
            self.gen_expr(*arg)?;
            let temp = if later_call {
                temps_used += 1;
                self.push_call_temp()?
            } else {
                scratch_used += 1;
                self.push_scratch(loc)?
            };
            self.emit(Instruction::Sta(temp));
            operands.push(Operand::Var(temp));
        }

        self.emit(Instruction::Api { mnemonic: spec.mnemonic, args: operands });
        for _ in 0..scratch_used {
            self.pop_scratch();
        }
        for _ in 0..temps_used {
            self.pop_call_temp();
        }
        Ok(())
    }
}
