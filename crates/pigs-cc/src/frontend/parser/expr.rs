use super::Parser;
use crate::error::{Error, Result};
use crate::frontend::ast::{BinOp, Expr, ExprId, UnaryOp};
use crate::frontend::token::{describe, BinTok, TokenKind};

/// Binary operator precedence, C99 table, tightest first.
const PRECEDENCE: &[&[(TokenKind, BinOp)]] = &[
    &[
        (TokenKind::Star, BinOp::Mul),
        (TokenKind::Slash, BinOp::Div),
        (TokenKind::Percent, BinOp::Mod),
    ],
    &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
    &[(TokenKind::Shl, BinOp::Shl), (TokenKind::Shr, BinOp::Shr)],
    &[
        (TokenKind::Lt, BinOp::Lt),
        (TokenKind::Le, BinOp::Le),
        (TokenKind::Gt, BinOp::Gt),
        (TokenKind::Ge, BinOp::Ge),
    ],
    &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::NotEq, BinOp::Ne)],
    &[(TokenKind::Amp, BinOp::BitAnd)],
    &[(TokenKind::Caret, BinOp::BitXor)],
    &[(TokenKind::Pipe, BinOp::BitOr)],
    &[(TokenKind::AmpAmp, BinOp::LogicalAnd)],
    &[(TokenKind::PipePipe, BinOp::LogicalOr)],
];

fn compound_op(tok: BinTok) -> BinOp {
    match tok {
        BinTok::Add => BinOp::Add,
        BinTok::Sub => BinOp::Sub,
        BinTok::Mul => BinOp::Mul,
        BinTok::Div => BinOp::Div,
        BinTok::Mod => BinOp::Mod,
        BinTok::And => BinOp::BitAnd,
        BinTok::Or => BinOp::BitOr,
        BinTok::Xor => BinOp::BitXor,
        BinTok::Shl => BinOp::Shl,
        BinTok::Shr => BinOp::Shr,
    }
}

impl Parser<'_> {
    /// Full expression. The comma operator is outside the subset, so this
    /// is assignment-expression; callers reject a stray comma themselves.
    pub(crate) fn parse_expression(&mut self) -> Result<ExprId> {
        self.parse_assignment_expr()
    }

    /// Comma-separated expression list (for-loop headers only).
    pub(crate) fn parse_expr_list(&mut self) -> Result<Vec<ExprId>> {
        let mut exprs = vec![self.parse_assignment_expr()?];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_assignment_expr()?);
        }
        Ok(exprs)
    }

    pub(crate) fn parse_assignment_expr(&mut self) -> Result<ExprId> {
        let lhs = self.parse_binary_expr(PRECEDENCE.len())?;

        if self.cur().kind == TokenKind::Question {
            return Err(Error::unsupported(
                self.loc(),
                "the conditional operator \"?:\" is not supported",
            ));
        }

        let op = match self.cur().kind {
            TokenKind::Assign => None,
            TokenKind::AssignOp(tok) => Some(compound_op(tok)),
            _ => return Ok(lhs),
        };
        let loc = self.loc();
        self.advance();
        if !matches!(self.ast().expr(lhs), Expr::Ident { .. }) {
            return Err(Error::ty(loc, "assignment target must be a variable"));
        }
        let value = self.parse_assignment_expr()?;
        Ok(self.ast().alloc_expr(Expr::Assign { target: lhs, op, value, loc }))
    }

    fn parse_binary_expr(&mut self, level: usize) -> Result<ExprId> {
        if level == 0 {
            return self.parse_unary_expr();
        }
        let ops = PRECEDENCE[level - 1];
        let mut lhs = self.parse_binary_expr(level - 1)?;
        'outer: loop {
            for (tok, op) in ops {
                if &self.cur().kind == tok {
                    let loc = self.loc();
                    self.advance();
                    let rhs = self.parse_binary_expr(level - 1)?;
                    lhs = self.ast().alloc_expr(Expr::Binary { op: *op, lhs, rhs, loc });
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn parse_unary_expr(&mut self) -> Result<ExprId> {
        self.check_supported()?;
        let loc = self.loc();
        let op = match self.cur().kind {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::Bang => UnaryOp::LogicalNot,
            TokenKind::PlusPlus => UnaryOp::PreInc,
            TokenKind::MinusMinus => UnaryOp::PreDec,
            TokenKind::Amp => {
                return Err(Error::unsupported(loc, "the address-of operator is not supported"))
            }
            TokenKind::Star => {
                return Err(Error::unsupported(loc, "pointer indirection is not supported"))
            }
            _ => return self.parse_postfix_expr(),
        };
        self.advance();
        let operand = self.parse_unary_expr()?;
        if matches!(op, UnaryOp::PreInc | UnaryOp::PreDec)
            && !matches!(self.ast().expr(operand), Expr::Ident { .. })
        {
            return Err(Error::ty(loc, "operand of \"++\"/\"--\" must be a variable"));
        }
        Ok(self.ast().alloc_expr(Expr::Unary { op, operand, loc }))
    }

    fn parse_postfix_expr(&mut self) -> Result<ExprId> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            let loc = self.loc();
            match self.cur().kind {
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.cur().kind == TokenKind::PlusPlus {
                        UnaryOp::PostInc
                    } else {
                        UnaryOp::PostDec
                    };
                    self.advance();
                    if !matches!(self.ast().expr(expr), Expr::Ident { .. }) {
                        return Err(Error::ty(loc, "operand of \"++\"/\"--\" must be a variable"));
                    }
                    expr = self.ast().alloc_expr(Expr::Unary { op, operand: expr, loc });
                }
                TokenKind::LBracket => {
                    return Err(Error::unsupported(loc, "array subscripts are not supported"))
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    return Err(Error::unsupported(loc, "member access is not supported"))
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary_expr(&mut self) -> Result<ExprId> {
        self.check_supported()?;
        let loc = self.loc();
        match self.cur().kind.clone() {
            TokenKind::Int(value) => {
                self.advance();
                Ok(self.ast().alloc_expr(Expr::IntLit { value, loc }))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.cur().kind == TokenKind::LParen {
                    self.advance();
                    let mut args = Vec::new();
                    if self.cur().kind != TokenKind::RParen {
                        args = self.parse_expr_list()?;
                    }
                    self.expect(&TokenKind::RParen)?;
                    return Ok(self.ast().alloc_expr(Expr::Call { name, args, loc }));
                }
                Ok(self.ast().alloc_expr(Expr::Ident { name, loc }))
            }
            TokenKind::LParen => {
                self.advance();
                // `(int)x` style casts are outside the subset.
                if self.at_declaration() {
                    return Err(Error::unsupported(loc, "casts are not supported"));
                }
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Str(_) => Err(Error::unsupported(
                loc,
                "string literals are only allowed inside asm()",
            )),
            other => Err(Error::parse(
                loc,
                format!("expected expression, found {}", describe(&other)),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::frontend::ast::{Ast, BinOp, Expr, Item, Stmt};
    use crate::frontend::parser::parse_into;

    fn parse(src: &str) -> Ast {
        let mut ast = Ast::new();
        parse_into(&mut ast, "test.c".into(), src).unwrap();
        ast
    }

    fn parse_err(src: &str) -> crate::error::Error {
        let mut ast = Ast::new();
        parse_into(&mut ast, "test.c".into(), src).unwrap_err()
    }

    #[test]
    fn precedence() {
        let ast = parse("void main(void) { x = 1 + 2 * 3; }");
        let Item::Function(def) = &ast.items[0] else { panic!() };
        let Stmt::Compound { items, .. } = ast.stmt(def.body) else { panic!() };
        let Stmt::Expr { expr: Some(e), .. } = ast.stmt(items[0]) else { panic!() };
        let Expr::Assign { value, .. } = ast.expr(*e) else { panic!() };
        let Expr::Binary { op, rhs, .. } = ast.expr(*value) else { panic!() };
        assert_eq!(*op, BinOp::Add);
        let Expr::Binary { op, .. } = ast.expr(*rhs) else { panic!() };
        assert_eq!(*op, BinOp::Mul);
    }

    #[test]
    fn enum_with_declarator() {
        let ast = parse("enum { A, B = 5 } state = B;");
        assert!(matches!(ast.items[0], Item::Enum(_)));
        assert!(matches!(ast.items[1], Item::Variables(_)));
    }

    #[test]
    fn rejects_ternary() {
        let err = parse_err("void main(void) { x = a ? 1 : 2; }");
        assert!(err.to_string().contains("?:"));
    }

    #[test]
    fn rejects_pointer_decl() {
        let err = parse_err("int *p;");
        assert!(err.to_string().contains("pointer"));
    }

    #[test]
    fn rejects_switch() {
        let err = parse_err("void main(void) { switch (x) {} }");
        assert!(err.to_string().contains("switch"));
    }

    #[test]
    fn rejects_comma_operator() {
        let err = parse_err("void main(void) { a = 1, b = 2; }");
        assert!(err.to_string().contains("comma"));
    }

    #[test]
    fn for_header_comma_list() {
        let ast = parse("void main(void) { for (i = 0, j = 9; i < j; ++i, --j) {} }");
        let Item::Function(def) = &ast.items[0] else { panic!() };
        let Stmt::Compound { items, .. } = ast.stmt(def.body) else { panic!() };
        let Stmt::For { init, step, .. } = ast.stmt(items[0]) else { panic!() };
        let Stmt::ExprList { exprs, .. } = ast.stmt(init.unwrap()) else { panic!() };
        assert_eq!(exprs.len(), 2);
        assert_eq!(step.len(), 2);
    }

    #[test]
    fn anonymous_parameter() {
        let ast = parse("int f(int a, int);");
        let Item::Prototype(decl) = &ast.items[0] else { panic!() };
        assert_eq!(decl.params.len(), 2);
        assert!(decl.params[1].name.is_none());
    }
}
