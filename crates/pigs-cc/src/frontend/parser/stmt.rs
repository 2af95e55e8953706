use super::Parser;
use crate::error::{Error, Result};
use crate::frontend::ast::{AsmOperand, Item, Stmt, StmtId};
use crate::frontend::token::{describe, TokenKind};

impl Parser<'_> {
    pub(crate) fn parse_compound(&mut self) -> Result<StmtId> {
        let loc = self.loc();
        self.expect(&TokenKind::LBrace)?;
        let mut items = Vec::new();
        while self.cur().kind != TokenKind::RBrace {
            if self.cur().is_eof() {
                return Err(Error::parse(self.loc(), "unterminated block"));
            }
            if self.at_declaration() {
                items.extend(self.parse_block_declaration()?);
            } else {
                items.push(self.parse_statement()?);
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(self.ast().alloc_stmt(Stmt::Compound { items, loc }))
    }

    fn parse_block_declaration(&mut self) -> Result<Vec<StmtId>> {
        let items = self.parse_declaration(false)?;
        items
            .into_iter()
            .map(|item| {
                let stmt = match item {
                    Item::Variables(decl) => Stmt::Decl(decl),
                    Item::Enum(def) => Stmt::Enum(def),
                    Item::Prototype(decl) => Stmt::Prototype(decl),
                    Item::Function(def) => {
                        return Err(Error::parse(
                            def.decl.loc,
                            "nested function definition",
                        ))
                    }
                };
                Ok(self.ast().alloc_stmt(stmt))
            })
            .collect()
    }

    pub(crate) fn parse_statement(&mut self) -> Result<StmtId> {
        self.check_supported()?;
        let loc = self.loc();
        match self.cur().kind.clone() {
            TokenKind::LBrace => self.parse_compound(),
            TokenKind::Semi => {
                self.advance();
                Ok(self.ast().alloc_stmt(Stmt::Expr { expr: None, loc }))
            }
            TokenKind::KwIf => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                let then_branch = self.parse_statement()?;
                let else_branch = if self.eat(&TokenKind::KwElse) {
                    Some(self.parse_statement()?)
                } else {
                    None
                };
                Ok(self.ast().alloc_stmt(Stmt::If { cond, then_branch, else_branch, loc }))
            }
            TokenKind::KwWhile => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_statement()?;
                Ok(self.ast().alloc_stmt(Stmt::While { cond, body, loc }))
            }
            TokenKind::KwDo => {
                self.advance();
                let body = self.parse_statement()?;
                self.expect(&TokenKind::KwWhile)?;
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                self.expect(&TokenKind::Semi)?;
                Ok(self.ast().alloc_stmt(Stmt::DoWhile { body, cond, loc }))
            }
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwBreak => {
                self.advance();
                self.expect(&TokenKind::Semi)?;
                Ok(self.ast().alloc_stmt(Stmt::Break { loc }))
            }
            TokenKind::KwContinue => {
                self.advance();
                self.expect(&TokenKind::Semi)?;
                Ok(self.ast().alloc_stmt(Stmt::Continue { loc }))
            }
            TokenKind::KwReturn => {
                self.advance();
                let value = if self.cur().kind == TokenKind::Semi {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(&TokenKind::Semi)?;
                Ok(self.ast().alloc_stmt(Stmt::Return { value, loc }))
            }
            TokenKind::Ident(name) if name == "asm" => self.parse_asm(),
            _ => {
                let expr = self.parse_expression()?;
                if self.cur().kind == TokenKind::Comma {
                    return Err(Error::unsupported(
                        self.loc(),
                        "the comma operator is not supported",
                    ));
                }
                self.expect(&TokenKind::Semi)?;
                Ok(self.ast().alloc_stmt(Stmt::Expr { expr: Some(expr), loc }))
            }
        }
    }

    fn parse_for(&mut self) -> Result<StmtId> {
        let loc = self.loc();
        self.expect(&TokenKind::KwFor)?;
        self.expect(&TokenKind::LParen)?;

        let init = if self.eat(&TokenKind::Semi) {
            None
        } else if self.at_declaration() {
            let stmts = self.parse_block_declaration()?;
            // A for-init declaration is a single `int i = 0, j = 1;`.
            match <[StmtId; 1]>::try_from(stmts) {
                Ok([stmt]) => Some(stmt),
                Err(_) => {
                    return Err(Error::parse(loc, "malformed for-loop initialiser"));
                }
            }
        } else {
            let init_loc = self.loc();
            let exprs = self.parse_expr_list()?;
            self.expect(&TokenKind::Semi)?;
            Some(self.ast().alloc_stmt(Stmt::ExprList { exprs, loc: init_loc }))
        };

        let cond = if self.cur().kind == TokenKind::Semi {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semi)?;

        let step = if self.cur().kind == TokenKind::RParen {
            Vec::new()
        } else {
            self.parse_expr_list()?
        };
        self.expect(&TokenKind::RParen)?;

        let body = self.parse_statement()?;
        Ok(self.ast().alloc_stmt(Stmt::For { init, cond, step, body, loc }))
    }

    fn parse_asm(&mut self) -> Result<StmtId> {
        let loc = self.loc();
        self.advance(); // "asm"
        self.expect(&TokenKind::LParen)?;
        let mnemonic = match self.cur().kind.clone() {
            TokenKind::Str(text) => {
                self.advance();
                text
            }
            other => {
                return Err(Error::asm(
                    self.loc(),
                    format!("first argument must be a mnemonic string, found {}", describe(&other)),
                ))
            }
        };
        if mnemonic.is_empty() || !mnemonic.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::asm(loc, format!("invalid mnemonic \"{mnemonic}\"")));
        }
        let operand = if self.eat(&TokenKind::Comma) {
            let op_loc = self.loc();
            Some(match self.cur().kind.clone() {
                TokenKind::Str(text) => {
                    self.advance();
                    AsmOperand::Str(text)
                }
                TokenKind::Int(value) => {
                    self.advance();
                    AsmOperand::Int(value)
                }
                TokenKind::Minus => {
                    self.advance();
                    match self.cur().kind.clone() {
                        TokenKind::Int(value) => {
                            self.advance();
                            AsmOperand::Int(value.wrapping_neg())
                        }
                        other => {
                            return Err(Error::asm(
                                op_loc,
                                format!("expected integer after \"-\", found {}", describe(&other)),
                            ))
                        }
                    }
                }
                TokenKind::Ident(name) => {
                    self.advance();
                    AsmOperand::Ident(name, op_loc)
                }
                other => {
                    return Err(Error::asm(
                        op_loc,
                        format!(
                            "operand must be a string, integer or identifier, found {}",
                            describe(&other)
                        ),
                    ))
                }
            })
        } else {
            None
        };
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Semi)?;
        Ok(self.ast().alloc_stmt(Stmt::Asm { mnemonic, operand, loc }))
    }
}
