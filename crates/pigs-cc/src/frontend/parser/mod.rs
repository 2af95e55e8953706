mod expr;
mod stmt;

use std::sync::Arc;

use super::ast::{
    Ast, Declaration, EnumDef, Enumerator, FunctionDecl, FunctionDef, Item, ParamDecl, VarDecl,
};
use super::lexer::Lexer;
use super::token::{describe, Token, TokenKind};
use crate::error::{Error, Result};
use crate::source::Loc;

/// Parse one source file and append its top-level items to `ast`.
pub fn parse_into(ast: &mut Ast, file: Arc<str>, text: &str) -> Result<()> {
    let tokens = Lexer::new(file, text).tokenize()?;
    Parser::new(ast, tokens).parse_unit()
}

/// The declared type of an object or return value. Everything is a 32-bit
/// signed integer; only void-ness matters past the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeSpec {
    Int,
    Void,
}

pub(crate) struct Parser<'a> {
    ast: &'a mut Ast,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(ast: &'a mut Ast, tokens: Vec<Token>) -> Self {
        Self { ast, tokens, pos: 0 }
    }

    pub(crate) fn ast(&mut self) -> &mut Ast {
        self.ast
    }

    pub(crate) fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub(crate) fn loc(&self) -> Loc {
        self.cur().loc.clone()
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if !tok.is_eof() {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.cur().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if &self.cur().kind == kind {
            Ok(self.advance())
        } else {
            Err(Error::parse(
                self.loc(),
                format!("expected {}, found {}", describe(kind), describe(&self.cur().kind)),
            ))
        }
    }

    pub(crate) fn expect_ident(&mut self) -> Result<(String, Loc)> {
        match self.cur().kind.clone() {
            TokenKind::Ident(name) => {
                let loc = self.loc();
                self.advance();
                Ok((name, loc))
            }
            other => Err(Error::parse(
                self.loc(),
                format!("expected identifier, found {}", describe(&other)),
            )),
        }
    }

    /// Reject constructs outside the subset with a targeted message.
    pub(crate) fn check_supported(&self) -> Result<()> {
        match &self.cur().kind {
            TokenKind::KwUnsupported(kw) => Err(Error::unsupported(
                self.loc(),
                format!("\"{kw}\" is not supported"),
            )),
            _ => Ok(()),
        }
    }

    fn parse_unit(&mut self) -> Result<()> {
        while !self.cur().is_eof() {
            let items = self.parse_declaration(true)?;
            self.ast.items.extend(items);
        }
        Ok(())
    }

    /// Parse a declaration (or function definition when `top_level`).
    /// One source declaration can expand to several items, e.g.
    /// `enum { A } state = A;` yields an enum item and a variable item.
    pub(crate) fn parse_declaration(&mut self, top_level: bool) -> Result<Vec<Item>> {
        self.check_supported()?;
        let loc = self.loc();
        let is_extern = self.eat(&TokenKind::KwExtern);
        self.check_supported()?;

        if self.cur().kind == TokenKind::KwEnum {
            let def = self.parse_enum_specifier()?;
            let mut items = vec![Item::Enum(def)];
            if !self.eat(&TokenKind::Semi) {
                // Enum specifier used as a variable's type.
                let vars = self.parse_var_declarators()?;
                self.expect(&TokenKind::Semi)?;
                items.push(Item::Variables(Declaration { is_extern, vars, loc }));
            }
            return Ok(items);
        }

        let ty = self.parse_type_specifier(is_extern)?;
        let (name, name_loc) = self.parse_declarator_name()?;

        if self.cur().kind == TokenKind::LParen {
            let params = self.parse_param_list(is_extern)?;
            let decl = FunctionDecl {
                name,
                is_extern,
                returns_value: ty == TypeSpec::Int,
                params,
                loc: name_loc,
            };
            if self.eat(&TokenKind::Semi) {
                return Ok(vec![Item::Prototype(decl)]);
            }
            if self.cur().kind == TokenKind::LBrace {
                if !top_level {
                    return Err(Error::parse(self.loc(), "nested function definition"));
                }
                let body = self.parse_compound()?;
                return Ok(vec![Item::Function(FunctionDef { decl, body })]);
            }
            return Err(Error::parse(
                self.loc(),
                format!("expected \";\" or function body, found {}", describe(&self.cur().kind)),
            ));
        }

        if ty == TypeSpec::Void {
            return Err(Error::ty(name_loc, format!("variable \"{name}\" declared void")));
        }
        let mut vars = vec![self.finish_var_declarator(name, name_loc)?];
        while self.eat(&TokenKind::Comma) {
            let (name, name_loc) = self.parse_declarator_name()?;
            vars.push(self.finish_var_declarator(name, name_loc)?);
        }
        self.expect(&TokenKind::Semi)?;
        Ok(vec![Item::Variables(Declaration { is_extern, vars, loc })])
    }

    fn parse_type_specifier(&mut self, is_extern: bool) -> Result<TypeSpec> {
        let loc = self.loc();
        match self.cur().kind.clone() {
            TokenKind::KwVoid => {
                self.advance();
                Ok(TypeSpec::Void)
            }
            TokenKind::KwInt | TokenKind::KwLong => {
                self.advance();
                Ok(TypeSpec::Int)
            }
            TokenKind::KwUnsigned => {
                if !is_extern {
                    return Err(Error::unsupported(
                        loc,
                        "\"unsigned\" is only accepted in extern API declarations",
                    ));
                }
                self.advance();
                // "unsigned", "unsigned int", "unsigned long".
                let _ = self.eat(&TokenKind::KwInt) || self.eat(&TokenKind::KwLong);
                Ok(TypeSpec::Int)
            }
            TokenKind::KwUnsupported(kw) => {
                Err(Error::unsupported(loc, format!("\"{kw}\" is not supported")))
            }
            other => Err(Error::parse(
                loc,
                format!("expected type specifier, found {}", describe(&other)),
            )),
        }
    }

    fn parse_declarator_name(&mut self) -> Result<(String, Loc)> {
        if self.cur().kind == TokenKind::Star {
            return Err(Error::unsupported(self.loc(), "pointer types are not supported"));
        }
        let (name, loc) = self.expect_ident()?;
        if self.cur().kind == TokenKind::LBracket {
            return Err(Error::unsupported(self.loc(), "array types are not supported"));
        }
        Ok((name, loc))
    }

    fn finish_var_declarator(&mut self, name: String, loc: Loc) -> Result<VarDecl> {
        if self.cur().kind == TokenKind::LBracket {
            return Err(Error::unsupported(self.loc(), "array types are not supported"));
        }
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.parse_assignment_expr()?)
        } else {
            None
        };
        Ok(VarDecl { name, init, loc })
    }

    fn parse_var_declarators(&mut self) -> Result<Vec<VarDecl>> {
        let mut vars = Vec::new();
        loop {
            let (name, loc) = self.parse_declarator_name()?;
            vars.push(self.finish_var_declarator(name, loc)?);
            if !self.eat(&TokenKind::Comma) {
                return Ok(vars);
            }
        }
    }

    fn parse_param_list(&mut self, is_extern: bool) -> Result<Vec<ParamDecl>> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(params); // `()` counts as zero parameters
        }
        if self.cur().kind == TokenKind::KwVoid {
            self.advance();
            self.expect(&TokenKind::RParen)?;
            return Ok(params);
        }
        loop {
            let loc = self.loc();
            let ty = self.parse_type_specifier(is_extern)?;
            if ty == TypeSpec::Void {
                return Err(Error::ty(loc, "parameter declared void"));
            }
            let name = match self.cur().kind.clone() {
                TokenKind::Ident(name) => {
                    self.advance();
                    Some(name)
                }
                TokenKind::Star => {
                    return Err(Error::unsupported(self.loc(), "pointer types are not supported"))
                }
                _ => None, // anonymous parameter
            };
            params.push(ParamDecl { name, loc });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_enum_specifier(&mut self) -> Result<EnumDef> {
        let loc = self.loc();
        self.expect(&TokenKind::KwEnum)?;
        // Optional tag name; the subset has no type namespace, so it is
        // accepted and ignored.
        if matches!(self.cur().kind, TokenKind::Ident(_)) {
            self.advance();
        }
        self.expect(&TokenKind::LBrace)?;
        let mut enumerators = Vec::new();
        while self.cur().kind != TokenKind::RBrace {
            let (name, name_loc) = self.expect_ident()?;
            let value = if self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment_expr()?)
            } else {
                None
            };
            enumerators.push(Enumerator { name, value, loc: name_loc });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        if enumerators.is_empty() {
            return Err(Error::parse(loc, "empty enum declaration"));
        }
        Ok(EnumDef { enumerators, loc })
    }

    /// True when the current token starts a declaration.
    pub(crate) fn at_declaration(&self) -> bool {
        matches!(
            self.cur().kind,
            TokenKind::KwInt
                | TokenKind::KwLong
                | TokenKind::KwUnsigned
                | TokenKind::KwVoid
                | TokenKind::KwEnum
                | TokenKind::KwExtern
        )
    }
}
