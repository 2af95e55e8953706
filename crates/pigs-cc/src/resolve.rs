//! Symbol & scope resolver.
//!
//! Walks the merged translation unit in textual order, builds the scope
//! tree, resolves every identifier to a declaration, classifies calls as
//! user or VM API calls, enforces the type wall (everything is `int`,
//! `void` only as a return type), folds enumerators, builds the static
//! call graph and rejects recursion that is not annotated with inline-asm
//! save/restore.

use std::collections::HashMap;

use crate::api::{self, ApiSpec};
use crate::consteval;
use crate::error::{Error, Result};
use crate::frontend::ast::{
    Ast, Declaration, EnumDef, Expr, ExprId, FunctionDecl, Item, Stmt, StmtId, UnaryOp, VarDecl,
};
use crate::frontend::ast::AsmOperand;
use crate::pigs::instruction::{VarId, RESERVED_SLOTS};
use crate::source::Loc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

#[derive(Debug)]
pub enum Symbol {
    Global { name: String, var: VarId, loc: Loc },
    Local { name: String, var: VarId, loc: Loc },
    /// `extern` variable bound to VM parameter `pN`.
    Parameter { name: String, index: u8 },
    EnumConst { name: String, value: i32 },
    Function(FuncId),
    Api { spec: &'static ApiSpec, arity: usize, returns_value: bool },
}

impl Symbol {
    pub fn is_variable(&self) -> bool {
        matches!(self, Symbol::Global { .. } | Symbol::Local { .. } | Symbol::Parameter { .. })
    }
}

#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    names: HashMap<String, SymbolId>,
    /// Variable objects declared in this scope, in declaration order.
    pub vars: Vec<SymbolId>,
    pub children: Vec<ScopeId>,
}

#[derive(Debug)]
pub struct FuncInfo {
    pub name: String,
    pub loc: Loc,
    pub returns_value: bool,
    pub arity: usize,
    pub body: Option<StmtId>,
    /// Parameter objects (anonymous ones included), in positional order.
    pub params: Vec<SymbolId>,
    pub root_scope: Option<ScopeId>,
    /// User-function call sites inside this body.
    pub calls: Vec<(FuncId, Loc)>,
    /// Call edges with exempted recursive back edges removed; filled by
    /// the recursion check and used for frame layout.
    pub layout_calls: Vec<FuncId>,
    /// Body carries inline-asm push/pop save/restore.
    pub has_asm_save: bool,
    pub reachable: bool,
}

#[derive(Debug)]
pub struct Resolved {
    pub symbols: Vec<Symbol>,
    pub scopes: Vec<Scope>,
    pub functions: Vec<FuncInfo>,
    /// Resolution of `Ident` and `Call` expressions, by `ExprId`.
    pub expr_syms: Vec<Option<SymbolId>>,
    /// Symbols declared by a `Stmt::Decl`, one per declarator.
    pub decl_syms: HashMap<u32, Vec<SymbolId>>,
    /// Resolution of identifier operands in `asm()` statements.
    pub asm_syms: HashMap<u32, SymbolId>,
    /// Global initialisers in declaration order, already folded.
    pub global_inits: Vec<(SymbolId, i32)>,
    pub main: FuncId,
    /// Next free virtual variable id (ids `0..4` are the reserved slots).
    pub var_count: u32,
}

impl Resolved {
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn func(&self, id: FuncId) -> &FuncInfo {
        &self.functions[id.0 as usize]
    }

    pub fn expr_symbol(&self, id: ExprId) -> Option<SymbolId> {
        self.expr_syms[id.0 as usize]
    }

    /// Fold an already-resolved expression to a constant if possible.
    pub fn const_value(&self, ast: &Ast, id: ExprId) -> Option<i32> {
        consteval::eval(ast, id, &|ident| {
            match self.expr_symbol(ident).map(|s| self.symbol(s)) {
                Some(Symbol::EnumConst { value, .. }) => Some(*value),
                _ => None,
            }
        })
    }
}

/// Match the `pN` pattern on an extern variable name: an underscore
/// delimited `p0`..`p9` segment, optionally pre- and suffixed
/// (`p3`, `led_p3`, `led_p3_pin`). The rightmost match wins.
fn param_index(name: &str) -> Option<u8> {
    name.rsplit('_').find_map(|seg| {
        let mut chars = seg.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some('p'), Some(d), None) if d.is_ascii_digit() => Some(d as u8 - b'0'),
            _ => None,
        }
    })
}

pub fn resolve(ast: &Ast) -> std::result::Result<Resolved, Vec<Error>> {
    let mut resolver = Resolver::new(ast);
    resolver.run();
    if resolver.errors.is_empty() {
        Ok(resolver.finish())
    } else {
        Err(resolver.errors)
    }
}

struct Resolver<'a> {
    ast: &'a Ast,
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    functions: Vec<FuncInfo>,
    /// Program-wide function name table (block-scope prototypes resolve
    /// to the same symbol as file-scope ones).
    func_syms: HashMap<String, SymbolId>,
    expr_syms: Vec<Option<SymbolId>>,
    decl_syms: HashMap<u32, Vec<SymbolId>>,
    asm_syms: HashMap<u32, SymbolId>,
    global_inits: Vec<(SymbolId, i32)>,
    scope_stack: Vec<ScopeId>,
    current_func: Option<FuncId>,
    next_var: u32,
    errors: Vec<Error>,
}

impl<'a> Resolver<'a> {
    fn new(ast: &'a Ast) -> Self {
        let mut resolver = Self {
            ast,
            symbols: Vec::new(),
            scopes: Vec::new(),
            functions: Vec::new(),
            func_syms: HashMap::new(),
            expr_syms: vec![None; ast.expr_count()],
            decl_syms: HashMap::new(),
            asm_syms: HashMap::new(),
            global_inits: Vec::new(),
            scope_stack: Vec::new(),
            current_func: None,
            next_var: RESERVED_SLOTS,
            errors: Vec::new(),
        };
        resolver.push_scope();
        resolver
    }

    fn run(&mut self) {
        for item in &self.ast.items {
            let result = match item {
                Item::Variables(decl) => self.resolve_global_variables(decl),
                Item::Enum(def) => self.resolve_enum(def),
                Item::Prototype(decl) => self.declare_function(decl, false).map(|_| ()),
                Item::Function(def) => self.resolve_function_def(def),
            };
            if let Err(e) = result {
                self.errors.push(e);
            }
        }
        self.check_unit();
    }

    fn finish(self) -> Resolved {
        let main = self.func_syms.get("main").map(|sym| match &self.symbols[sym.0 as usize] {
            Symbol::Function(f) => *f,
            _ => unreachable!(),
        });
        Resolved {
            symbols: self.symbols,
            scopes: self.scopes,
            functions: self.functions,
            expr_syms: self.expr_syms,
            decl_syms: self.decl_syms,
            asm_syms: self.asm_syms,
            global_inits: self.global_inits,
            main: main.expect("checked by check_unit"),
            var_count: self.next_var,
        }
    }

    // --- scopes & symbols ---------------------------------------------

    fn push_scope(&mut self) -> ScopeId {
        let parent = self.scope_stack.last().copied();
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            names: HashMap::new(),
            vars: Vec::new(),
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.scopes[parent.0 as usize].children.push(id);
        }
        self.scope_stack.push(id);
        id
    }

    fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    fn current_scope(&mut self) -> &mut Scope {
        let id = *self.scope_stack.last().unwrap();
        &mut self.scopes[id.0 as usize]
    }

    fn add_symbol(&mut self, sym: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(sym);
        id
    }

    fn bind(&mut self, name: &str, sym: SymbolId, loc: &Loc) -> Result<()> {
        let scope = self.current_scope();
        if scope.names.contains_key(name) {
            return Err(Error::scope(loc.clone(), format!("redefinition of \"{name}\"")));
        }
        scope.names.insert(name.to_owned(), sym);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<SymbolId> {
        let mut scope = self.scope_stack.last().copied();
        while let Some(id) = scope {
            let frame = &self.scopes[id.0 as usize];
            if let Some(sym) = frame.names.get(name) {
                return Some(*sym);
            }
            scope = frame.parent;
        }
        None
    }

    fn fresh_var(&mut self) -> VarId {
        let id = VarId(self.next_var);
        self.next_var += 1;
        id
    }

    // --- declarations --------------------------------------------------

    fn resolve_global_variables(&mut self, decl: &Declaration) -> Result<()> {
        for var in &decl.vars {
            if decl.is_extern {
                self.declare_parameter(var)?;
            } else {
                let slot = self.fresh_var();
                let sym = self.add_symbol(Symbol::Global {
                    name: var.name.clone(),
                    var: slot,
                    loc: var.loc.clone(),
                });
                self.bind(&var.name.clone(), sym, &var.loc)?;
                let scope = self.current_scope();
                scope.vars.push(sym);
                if let Some(init) = var.init {
                    self.resolve_expr(init, true)?;
                    let value = self.const_expr(init).ok_or_else(|| {
                        Error::ty(
                            var.loc.clone(),
                            format!("initialiser of global \"{}\" must be constant", var.name),
                        )
                    })?;
                    self.global_inits.push((sym, value));
                }
            }
        }
        Ok(())
    }

    fn declare_parameter(&mut self, var: &VarDecl) -> Result<SymbolId> {
        let Some(index) = param_index(&var.name) else {
            return Err(Error::scope(
                var.loc.clone(),
                format!(
                    "{}: external variable names must contain one of \"p0\"..\"p9\"",
                    var.name
                ),
            ));
        };
        if var.init.is_some() {
            return Err(Error::ty(
                var.loc.clone(),
                format!("extern variable \"{}\" cannot have an initialiser", var.name),
            ));
        }
        let sym = self.add_symbol(Symbol::Parameter { name: var.name.clone(), index });
        self.bind(&var.name.clone(), sym, &var.loc)?;
        Ok(sym)
    }

    fn resolve_enum(&mut self, def: &EnumDef) -> Result<()> {
        let mut next = 0i32;
        for enumerator in &def.enumerators {
            let value = match enumerator.value {
                Some(expr) => {
                    self.resolve_expr(expr, true)?;
                    self.const_expr(expr).ok_or_else(|| {
                        Error::ty(
                            enumerator.loc.clone(),
                            format!("enumerator \"{}\" is not constant", enumerator.name),
                        )
                    })?
                }
                None => next,
            };
            next = value.wrapping_add(1);
            let sym = self.add_symbol(Symbol::EnumConst {
                name: enumerator.name.clone(),
                value,
            });
            self.bind(&enumerator.name.clone(), sym, &enumerator.loc)?;
        }
        Ok(())
    }

    fn declare_function(&mut self, decl: &FunctionDecl, _defining: bool) -> Result<SymbolId> {
        if decl.name == "main" {
            if decl.returns_value {
                return Err(Error::ty(
                    decl.loc.clone(),
                    "main() must be declared void",
                ));
            }
            if !decl.params.is_empty() {
                return Err(Error::ty(
                    decl.loc.clone(),
                    "main() cannot take arguments",
                ));
            }
        }
        if let Some(&sym) = self.func_syms.get(&decl.name) {
            // Re-declaration: prototypes must agree.
            let matches = match &self.symbols[sym.0 as usize] {
                Symbol::Function(f) => {
                    let func = &self.functions[f.0 as usize];
                    !decl.is_extern
                        && func.arity == decl.params.len()
                        && func.returns_value == decl.returns_value
                }
                Symbol::Api { arity, returns_value, .. } => {
                    decl.is_extern
                        && *arity == decl.params.len()
                        && *returns_value == decl.returns_value
                }
                _ => false,
            };
            if !matches {
                return Err(Error::ty(
                    decl.loc.clone(),
                    format!(
                        "declaration of \"{}\" conflicts with a previous declaration",
                        decl.name
                    ),
                ));
            }
            // Make the name visible in the current scope as well.
            let in_scope = self.lookup(&decl.name) == Some(sym);
            if !in_scope {
                self.bind(&decl.name.clone(), sym, &decl.loc)?;
            }
            return Ok(sym);
        }

        if self.lookup(&decl.name).is_some() && self.current_scope().names.contains_key(&decl.name)
        {
            return Err(Error::scope(
                decl.loc.clone(),
                format!("redefinition of \"{}\"", decl.name),
            ));
        }

        let sym = if decl.is_extern {
            let Some(spec) = api::lookup(&decl.name) else {
                return Err(Error::scope(
                    decl.loc.clone(),
                    format!("unknown VM API function \"{}\"", decl.name),
                ));
            };
            self.add_symbol(Symbol::Api {
                spec,
                arity: decl.params.len(),
                returns_value: decl.returns_value,
            })
        } else {
            let func = FuncId(self.functions.len() as u32);
            self.functions.push(FuncInfo {
                name: decl.name.clone(),
                loc: decl.loc.clone(),
                returns_value: decl.returns_value,
                arity: decl.params.len(),
                body: None,
                params: Vec::new(),
                root_scope: None,
                calls: Vec::new(),
                layout_calls: Vec::new(),
                has_asm_save: false,
                reachable: false,
            });
            self.add_symbol(Symbol::Function(func))
        };
        self.func_syms.insert(decl.name.clone(), sym);
        self.bind(&decl.name.clone(), sym, &decl.loc)?;
        Ok(sym)
    }

    fn resolve_function_def(&mut self, def: &crate::frontend::ast::FunctionDef) -> Result<()> {
        let sym = self.declare_function(&def.decl, true)?;
        let Symbol::Function(func) = &self.symbols[sym.0 as usize] else {
            return Err(Error::scope(
                def.decl.loc.clone(),
                format!("\"{}\" cannot be defined", def.decl.name),
            ));
        };
        let func = *func;
        if self.functions[func.0 as usize].body.is_some() {
            return Err(Error::scope(
                def.decl.loc.clone(),
                format!("redefinition of function \"{}\"", def.decl.name),
            ));
        }
        self.functions[func.0 as usize].body = Some(def.body);

        let root = self.push_scope();
        self.functions[func.0 as usize].root_scope = Some(root);
        self.current_func = Some(func);

        let mut params = Vec::with_capacity(def.decl.params.len());
        for (i, param) in def.decl.params.iter().enumerate() {
            let slot = self.fresh_var();
            let name = param
                .name
                .clone()
                .unwrap_or_else(|| format!("<arg{i}>"));
            let sym = self.add_symbol(Symbol::Local {
                name,
                var: slot,
                loc: param.loc.clone(),
            });
            if let Some(name) = &param.name {
                self.bind(&name.clone(), sym, &param.loc)?;
            }
            params.push(sym);
        }
        self.functions[func.0 as usize].params = params;

        let result = self.resolve_stmt(def.body);
        self.current_func = None;
        self.pop_scope();
        result
    }

    // --- statements ----------------------------------------------------

    fn resolve_stmt(&mut self, id: StmtId) -> Result<()> {
        match self.ast.stmt(id) {
            Stmt::Expr { expr, .. } => {
                if let Some(expr) = expr {
                    self.resolve_expr(*expr, false)?;
                }
                Ok(())
            }
            Stmt::ExprList { exprs, .. } => {
                for expr in exprs {
                    self.resolve_expr(*expr, false)?;
                }
                Ok(())
            }
            Stmt::Decl(decl) => self.resolve_local_decl(id, decl),
            Stmt::Enum(def) => self.resolve_enum(def),
            Stmt::Prototype(decl) => self.declare_function(decl, false).map(|_| ()),
            Stmt::Compound { items, .. } => {
                self.push_scope();
                let result = items.iter().try_for_each(|item| self.resolve_stmt(*item));
                self.pop_scope();
                result
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.resolve_expr(*cond, true)?;
                self.resolve_stmt(*then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(*else_branch)?;
                }
                Ok(())
            }
            Stmt::While { cond, body, .. } | Stmt::DoWhile { body, cond, .. } => {
                self.resolve_expr(*cond, true)?;
                self.resolve_stmt(*body)
            }
            Stmt::For { init, cond, step, body, .. } => {
                self.push_scope();
                let result = (|| {
                    if let Some(init) = init {
                        self.resolve_stmt(*init)?;
                    }
                    if let Some(cond) = cond {
                        self.resolve_expr(*cond, true)?;
                    }
                    for expr in step {
                        self.resolve_expr(*expr, false)?;
                    }
                    self.resolve_stmt(*body)
                })();
                self.pop_scope();
                result
            }
            Stmt::Break { .. } | Stmt::Continue { .. } => Ok(()),
            Stmt::Return { value, loc } => self.resolve_return(*value, loc),
            Stmt::Asm { mnemonic, operand, .. } => {
                self.resolve_asm(id, mnemonic, operand.as_ref())
            }
        }
    }

    fn resolve_local_decl(&mut self, id: StmtId, decl: &Declaration) -> Result<()> {
        let mut syms = Vec::with_capacity(decl.vars.len());
        for var in &decl.vars {
            if decl.is_extern {
                syms.push(self.declare_parameter(var)?);
                continue;
            }
            let slot = self.fresh_var();
            let sym = self.add_symbol(Symbol::Local {
                name: var.name.clone(),
                var: slot,
                loc: var.loc.clone(),
            });
            self.bind(&var.name.clone(), sym, &var.loc)?;
            self.current_scope().vars.push(sym);
            if let Some(init) = var.init {
                self.resolve_expr(init, true)?;
            }
            syms.push(sym);
        }
        self.decl_syms.insert(id.0, syms);
        Ok(())
    }

    fn resolve_return(&mut self, value: Option<ExprId>, loc: &Loc) -> Result<()> {
        let func = &self.functions[self.current_func.unwrap().0 as usize];
        match (value, func.returns_value) {
            (Some(_), false) => tracing::warn!(
                "{loc}: function \"{}\" should not return a value",
                func.name
            ),
            (None, true) => tracing::warn!(
                "{loc}: function \"{}\" should return a value",
                func.name
            ),
            _ => {}
        }
        if let Some(value) = value {
            self.resolve_expr(value, true)?;
        }
        Ok(())
    }

    fn resolve_asm(
        &mut self,
        id: StmtId,
        mnemonic: &str,
        operand: Option<&AsmOperand>,
    ) -> Result<()> {
        if let Some(AsmOperand::Ident(name, ident_loc)) = operand {
            let Some(sym) = self.lookup(name) else {
                return Err(Error::scope(
                    ident_loc.clone(),
                    format!("\"{name}\" undeclared"),
                ));
            };
            match self.symbols[sym.0 as usize] {
                Symbol::Global { .. }
                | Symbol::Local { .. }
                | Symbol::Parameter { .. }
                | Symbol::EnumConst { .. } => {
                    self.asm_syms.insert(id.0, sym);
                }
                _ => {
                    return Err(Error::asm(
                        ident_loc.clone(),
                        format!("\"{name}\" does not name a variable"),
                    ))
                }
            }
        }
        let upper = mnemonic.to_ascii_uppercase();
        if matches!(upper.as_str(), "PUSH" | "POP" | "PUSHA" | "POPA") {
            if let Some(func) = self.current_func {
                self.functions[func.0 as usize].has_asm_save = true;
            }
        }
        Ok(())
    }

    // --- expressions ----------------------------------------------------

    fn resolve_expr(&mut self, id: ExprId, value_used: bool) -> Result<()> {
        match self.ast.expr(id) {
            Expr::IntLit { .. } => Ok(()),
            Expr::Ident { name, loc } => {
                let Some(sym) = self.lookup(name) else {
                    return Err(Error::scope(loc.clone(), format!("\"{name}\" undeclared")));
                };
                match self.symbols[sym.0 as usize] {
                    Symbol::Function(_) | Symbol::Api { .. } => {
                        return Err(Error::ty(
                            loc.clone(),
                            format!("function \"{name}\" used as a value"),
                        ))
                    }
                    _ => {}
                }
                self.expr_syms[id.0 as usize] = Some(sym);
                Ok(())
            }
            Expr::Unary { op, operand, loc } => {
                self.resolve_expr(*operand, true)?;
                if matches!(
                    op,
                    UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
                ) {
                    self.check_lvalue(*operand, loc)?;
                }
                Ok(())
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.resolve_expr(*lhs, true)?;
                self.resolve_expr(*rhs, true)
            }
            Expr::Assign { target, value, loc, .. } => {
                self.resolve_expr(*target, true)?;
                self.check_lvalue(*target, loc)?;
                self.resolve_expr(*value, true)
            }
            Expr::Call { name, args, loc } => {
                let Some(&sym) = self.func_syms.get(name) else {
                    return Err(Error::scope(
                        loc.clone(),
                        format!("function \"{name}\" undeclared"),
                    ));
                };
                let (arity, returns_value) = match &self.symbols[sym.0 as usize] {
                    Symbol::Function(f) => {
                        let func = &self.functions[f.0 as usize];
                        (func.arity, func.returns_value)
                    }
                    Symbol::Api { arity, returns_value, .. } => (*arity, *returns_value),
                    _ => {
                        return Err(Error::ty(
                            loc.clone(),
                            format!("\"{name}\" is not a function"),
                        ))
                    }
                };
                if args.len() != arity {
                    return Err(Error::ty(
                        loc.clone(),
                        format!(
                            "function \"{name}\" expects {arity} argument(s), {} given",
                            args.len()
                        ),
                    ));
                }
                if value_used && !returns_value {
                    return Err(Error::ty(
                        loc.clone(),
                        format!("void function \"{name}\" used in a value context"),
                    ));
                }
                self.expr_syms[id.0 as usize] = Some(sym);
                if let Symbol::Function(callee) = &self.symbols[sym.0 as usize] {
                    let callee = *callee;
                    // A call in a global initialiser has no caller to
                    // record; the constant check rejects it anyway.
                    if let Some(caller) = self.current_func {
                        self.functions[caller.0 as usize].calls.push((callee, loc.clone()));
                    }
                }
                for arg in args {
                    self.resolve_expr(*arg, true)?;
                }
                Ok(())
            }
        }
    }

    fn check_lvalue(&self, target: ExprId, loc: &Loc) -> Result<()> {
        let sym = self
            .expr_syms[target.0 as usize]
            .map(|s| &self.symbols[s.0 as usize]);
        match sym {
            Some(sym) if sym.is_variable() => Ok(()),
            _ => Err(Error::ty(loc.clone(), "assignment target must be a variable")),
        }
    }

    fn const_expr(&self, id: ExprId) -> Option<i32> {
        consteval::eval(self.ast, id, &|ident| {
            match self.expr_syms[ident.0 as usize].map(|s| &self.symbols[s.0 as usize]) {
                Some(Symbol::EnumConst { value, .. }) => Some(*value),
                _ => None,
            }
        })
    }

    // --- unit-level checks ----------------------------------------------

    fn check_unit(&mut self) {
        let Some(&main_sym) = self.func_syms.get("main") else {
            self.errors.push(Error::MissingMain);
            return;
        };
        let Symbol::Function(main) = &self.symbols[main_sym.0 as usize] else {
            self.errors.push(Error::MissingMain);
            return;
        };
        let main = *main;
        if self.functions[main.0 as usize].body.is_none() {
            self.errors.push(Error::MissingMain);
            return;
        }
        if !self.errors.is_empty() {
            // Call edges may be incomplete; graph checks would mislead.
            return;
        }

        // Reachability from main.
        let mut work = vec![main];
        while let Some(func) = work.pop() {
            if self.functions[func.0 as usize].reachable {
                continue;
            }
            self.functions[func.0 as usize].reachable = true;
            for (callee, _) in self.functions[func.0 as usize].calls.clone() {
                work.push(callee);
            }
        }

        for func in &self.functions {
            if func.reachable && func.body.is_none() {
                self.errors.push(Error::scope(
                    func.loc.clone(),
                    format!("function \"{}\" is called but never defined", func.name),
                ));
            }
            if !func.reachable && func.body.is_some() && func.name != "main" {
                tracing::debug!("dropping unused function \"{}\"", func.name);
            }
        }
        if !self.errors.is_empty() {
            return;
        }

        self.check_recursion(main);
    }

    /// Depth-first cycle check over the reachable call graph. A back edge
    /// is an error unless the calling function saves and restores its
    /// state with inline-asm push/pop; exempted edges are dropped from the
    /// frame-layout graph.
    fn check_recursion(&mut self, main: FuncId) {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut colors = vec![Color::White; self.functions.len()];

        fn visit(
            functions: &mut [FuncInfo],
            colors: &mut [Color],
            errors: &mut Vec<Error>,
            func: FuncId,
        ) {
            colors[func.0 as usize] = Color::Gray;
            let calls = functions[func.0 as usize].calls.clone();
            let exempt = functions[func.0 as usize].has_asm_save;
            for (callee, loc) in calls {
                match colors[callee.0 as usize] {
                    Color::Gray => {
                        if exempt {
                            tracing::debug!(
                                "{loc}: recursive call from \"{}\" allowed by inline-asm save/restore",
                                functions[func.0 as usize].name
                            );
                        } else {
                            errors.push(Error::Recursion {
                                loc,
                                name: functions[callee.0 as usize].name.clone(),
                            });
                        }
                        continue; // never part of the layout graph
                    }
                    Color::White => visit(functions, colors, errors, callee),
                    Color::Black => {}
                }
                functions[func.0 as usize].layout_calls.push(callee);
            }
            colors[func.0 as usize] = Color::Black;
        }

        visit(&mut self.functions, &mut colors, &mut self.errors, main);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_into;

    fn resolve_src(src: &str) -> std::result::Result<Resolved, Vec<Error>> {
        let mut ast = Ast::new();
        parse_into(&mut ast, "vm_api.h".into(), crate::api::API_HEADER).unwrap();
        parse_into(&mut ast, "t.c".into(), src).unwrap();
        resolve(&ast)
    }

    #[test]
    fn param_name_pattern() {
        assert_eq!(param_index("p0"), Some(0));
        assert_eq!(param_index("led_p3"), Some(3));
        assert_eq!(param_index("led_p3_pin"), Some(3));
        assert_eq!(param_index("p1_p2"), Some(2));
        assert_eq!(param_index("pin"), None);
        assert_eq!(param_index("xp0"), None);
    }

    #[test]
    fn shadowing_gets_fresh_slots() {
        let resolved = resolve_src("void main(void) { int a; { int a; } }").unwrap();
        let vars: Vec<_> = resolved
            .symbols
            .iter()
            .filter_map(|s| match s {
                Symbol::Local { name, var, .. } if name == "a" => Some(*var),
                _ => None,
            })
            .collect();
        assert_eq!(vars.len(), 2);
        assert_ne!(vars[0], vars[1]);
    }

    #[test]
    fn undeclared_identifier() {
        let errs = resolve_src("void main(void) { x = 1; }").unwrap_err();
        assert!(errs[0].to_string().contains("undeclared"));
    }

    #[test]
    fn missing_main() {
        let errs = resolve_src("int f(void) { return 1; }").unwrap_err();
        assert!(matches!(errs[0], Error::MissingMain));
    }

    #[test]
    fn void_in_value_context() {
        let errs = resolve_src("void f(void) {} void main(void) { p0 = f(); }").unwrap_err();
        assert!(errs[0].to_string().contains("value context"));
    }

    #[test]
    fn arity_mismatch() {
        let errs =
            resolve_src("int f(int a) { return a; } void main(void) { p0 = f(1, 2); }")
                .unwrap_err();
        assert!(errs[0].to_string().contains("argument"));
    }

    #[test]
    fn self_recursion_rejected() {
        let errs = resolve_src("int f(int n) { return f(n); } void main(void) { p0 = f(1); }")
            .unwrap_err();
        assert!(matches!(errs[0], Error::Recursion { .. }));
    }

    #[test]
    fn recursion_with_asm_save_allowed() {
        resolve_src(
            r#"
            int f(int n)
            {
                if (n == 0) {
                    return 0;
                }
                asm("push", n);
                n = f(n - 1);
                asm("pop", n);
                return n;
            }
            void main(void) { p0 = f(3); }
            "#,
        )
        .unwrap();
    }

    #[test]
    fn mutual_calls_without_cycle_ok() {
        resolve_src(
            "int g(void); int f(void) { return g(); } int g(void) { return 1; } \
             void main(void) { p0 = f(); }",
        )
        .unwrap();
    }

    #[test]
    fn called_but_undefined() {
        let errs =
            resolve_src("int f(void); void main(void) { p0 = f(); }").unwrap_err();
        assert!(errs[0].to_string().contains("never defined"));
    }

    #[test]
    fn unknown_api_function() {
        let errs = resolve_src("extern int fopen(void); void main(void) {}").unwrap_err();
        assert!(errs[0].to_string().contains("unknown VM API function"));
    }

    #[test]
    fn extern_var_must_match_pattern() {
        let errs = resolve_src("extern int sensor; void main(void) {}").unwrap_err();
        assert!(errs[0].to_string().contains("p0"));
    }

    #[test]
    fn global_init_must_be_constant() {
        let errs = resolve_src(
            "int f(void) { return 1; } int g = f(); void main(void) { p0 = g; }",
        )
        .unwrap_err();
        assert!(errs[0].to_string().contains("constant"));
    }

    #[test]
    fn enum_values_fold() {
        let resolved = resolve_src(
            "enum { A = 5, B, C = -1 }; void main(void) { p0 = B; }",
        )
        .unwrap();
        let b = resolved
            .symbols
            .iter()
            .find_map(|s| match s {
                Symbol::EnumConst { name, value } if name == "B" => Some(*value),
                _ => None,
            })
            .unwrap();
        assert_eq!(b, 6);
    }
}
