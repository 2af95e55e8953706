//! Arena-allocated AST for the supported C subset.
//!
//! Expressions and statements live in flat vectors and are referenced by
//! index, which keeps traversal cheap and lets later passes attach side
//! tables keyed by node id.

use crate::source::Loc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(pub u32);

#[derive(Debug, Default)]
pub struct Ast {
    pub items: Vec<Item>,
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }
}

/// Top-level declarations of a translation unit.
#[derive(Debug)]
pub enum Item {
    /// Function definition with a body.
    Function(FunctionDef),
    /// Function prototype (extern API functions included).
    Prototype(FunctionDecl),
    /// One `int a = 1, b;` style declaration (extern parameter variables
    /// included).
    Variables(Declaration),
    /// Free-standing `enum { ... };` definition.
    Enum(EnumDef),
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub is_extern: bool,
    pub returns_value: bool,
    pub params: Vec<ParamDecl>,
    pub loc: Loc,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    /// `None` for an anonymous parameter in a prototype or definition.
    pub name: Option<String>,
    pub loc: Loc,
}

#[derive(Debug)]
pub struct FunctionDef {
    pub decl: FunctionDecl,
    pub body: StmtId,
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub is_extern: bool,
    pub vars: Vec<VarDecl>,
    pub loc: Loc,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub init: Option<ExprId>,
    pub loc: Loc,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub enumerators: Vec<Enumerator>,
    pub loc: Loc,
}

#[derive(Debug, Clone)]
pub struct Enumerator {
    pub name: String,
    pub value: Option<ExprId>,
    pub loc: Loc,
}

#[derive(Debug)]
pub enum Stmt {
    /// Expression statement; `None` is the empty statement `;`.
    Expr { expr: Option<ExprId>, loc: Loc },
    /// Local variable declaration.
    Decl(Declaration),
    /// Block-scope enum definition.
    Enum(EnumDef),
    /// Block-scope function prototype.
    Prototype(FunctionDecl),
    Compound { items: Vec<StmtId>, loc: Loc },
    If {
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
        loc: Loc,
    },
    While { cond: ExprId, body: StmtId, loc: Loc },
    DoWhile { body: StmtId, cond: ExprId, loc: Loc },
    For {
        /// Declaration or expression-list statement, run in the loop scope.
        init: Option<StmtId>,
        cond: Option<ExprId>,
        /// Step expressions, evaluated left to right.
        step: Vec<ExprId>,
        body: StmtId,
        loc: Loc,
    },
    Break { loc: Loc },
    Continue { loc: Loc },
    Return { value: Option<ExprId>, loc: Loc },
    /// `asm("mnemonic")` / `asm("mnemonic", operand)`.
    Asm {
        mnemonic: String,
        operand: Option<AsmOperand>,
        loc: Loc,
    },
    /// Comma list in a `for` initialiser: each expression evaluated and
    /// discarded, left to right.
    ExprList { exprs: Vec<ExprId>, loc: Loc },
}

#[derive(Debug, Clone)]
pub enum AsmOperand {
    /// Copied verbatim into the output.
    Str(String),
    Int(i32),
    /// Emitted as the identifier's VM slot or parameter name.
    Ident(String, Loc),
}

#[derive(Debug)]
pub enum Expr {
    IntLit { value: i32, loc: Loc },
    Ident { name: String, loc: Loc },
    Unary { op: UnaryOp, operand: ExprId, loc: Loc },
    Binary { op: BinOp, lhs: ExprId, rhs: ExprId, loc: Loc },
    /// `target = value` or `target OP= value`; the target is an `Ident`.
    Assign {
        target: ExprId,
        op: Option<BinOp>,
        value: ExprId,
        loc: Loc,
    },
    Call { name: String, args: Vec<ExprId>, loc: Loc },
}

impl Expr {
    pub fn loc(&self) -> &Loc {
        match self {
            Expr::IntLit { loc, .. }
            | Expr::Ident { loc, .. }
            | Expr::Unary { loc, .. }
            | Expr::Binary { loc, .. }
            | Expr::Assign { loc, .. }
            | Expr::Call { loc, .. } => loc,
        }
    }
}

impl Stmt {
    pub fn loc(&self) -> &Loc {
        match self {
            Stmt::Expr { loc, .. }
            | Stmt::Compound { loc, .. }
            | Stmt::If { loc, .. }
            | Stmt::While { loc, .. }
            | Stmt::DoWhile { loc, .. }
            | Stmt::For { loc, .. }
            | Stmt::Break { loc }
            | Stmt::Continue { loc }
            | Stmt::Return { loc, .. }
            | Stmt::Asm { loc, .. }
            | Stmt::ExprList { loc, .. } => loc,
            Stmt::Decl(decl) => &decl.loc,
            Stmt::Enum(def) => &def.loc,
            Stmt::Prototype(decl) => &decl.loc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    BitNot,
    LogicalNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinOp {
    /// Operators lowered through the comparison helper routines.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinOp::LogicalAnd | BinOp::LogicalOr)
    }
}
