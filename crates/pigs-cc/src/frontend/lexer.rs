use std::sync::Arc;

use super::token::{BinTok, Token, TokenKind};
use crate::error::{Error, Result};
use crate::source::Loc;

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "auto", "case", "char", "const", "default", "double", "float", "goto", "inline",
    "register", "restrict", "short", "signed", "sizeof", "static", "struct", "switch",
    "typedef", "union", "volatile",
];

/// C lexer over one source file, tracking line/column locations.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    file: Arc<str>,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(file: Arc<str>, text: &'a str) -> Self {
        Self {
            input: text.as_bytes(),
            pos: 0,
            file,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.is_eof();
            tokens.push(tok);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    fn loc(&self) -> Loc {
        Loc::new(self.file.clone(), self.line, self.col)
    }

    fn bump(&mut self) -> u8 {
        let ch = self.input[self.pos];
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.input.get(self.pos + 1).copied()
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek2() == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek2() == Some(b'*') => {
                    let start = self.loc();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek2() == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => return Err(Error::parse(start, "unterminated comment")),
                        }
                    }
                }
                Some(b'#') => {
                    // No preprocessor; reject directives outright.
                    return Err(Error::unsupported(
                        self.loc(),
                        "preprocessor directives are not supported",
                    ));
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments()?;
        let loc = self.loc();
        let Some(ch) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, loc));
        };

        if ch.is_ascii_digit() {
            return self.lex_number(loc);
        }
        if ch == b'_' || ch.is_ascii_alphabetic() {
            return self.lex_identifier(loc);
        }
        if ch == b'"' {
            return self.lex_string(loc);
        }

        self.bump();
        let kind = match ch {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b';' => TokenKind::Semi,
            b',' => TokenKind::Comma,
            b'?' => TokenKind::Question,
            b':' => TokenKind::Colon,
            b'.' => TokenKind::Dot,
            b'~' => TokenKind::Tilde,
            b'+' => {
                if self.eat(b'+') {
                    TokenKind::PlusPlus
                } else if self.eat(b'=') {
                    TokenKind::AssignOp(BinTok::Add)
                } else {
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.eat(b'-') {
                    TokenKind::MinusMinus
                } else if self.eat(b'=') {
                    TokenKind::AssignOp(BinTok::Sub)
                } else if self.eat(b'>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => {
                if self.eat(b'=') {
                    TokenKind::AssignOp(BinTok::Mul)
                } else {
                    TokenKind::Star
                }
            }
            b'/' => {
                if self.eat(b'=') {
                    TokenKind::AssignOp(BinTok::Div)
                } else {
                    TokenKind::Slash
                }
            }
            b'%' => {
                if self.eat(b'=') {
                    TokenKind::AssignOp(BinTok::Mod)
                } else {
                    TokenKind::Percent
                }
            }
            b'&' => {
                if self.eat(b'&') {
                    TokenKind::AmpAmp
                } else if self.eat(b'=') {
                    TokenKind::AssignOp(BinTok::And)
                } else {
                    TokenKind::Amp
                }
            }
            b'|' => {
                if self.eat(b'|') {
                    TokenKind::PipePipe
                } else if self.eat(b'=') {
                    TokenKind::AssignOp(BinTok::Or)
                } else {
                    TokenKind::Pipe
                }
            }
            b'^' => {
                if self.eat(b'=') {
                    TokenKind::AssignOp(BinTok::Xor)
                } else {
                    TokenKind::Caret
                }
            }
            b'!' => {
                if self.eat(b'=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            b'<' => {
                if self.eat(b'<') {
                    if self.eat(b'=') {
                        TokenKind::AssignOp(BinTok::Shl)
                    } else {
                        TokenKind::Shl
                    }
                } else if self.eat(b'=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.eat(b'>') {
                    if self.eat(b'=') {
                        TokenKind::AssignOp(BinTok::Shr)
                    } else {
                        TokenKind::Shr
                    }
                } else if self.eat(b'=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            other => {
                return Err(Error::parse(
                    loc,
                    format!("unexpected character '{}'", other as char),
                ))
            }
        };
        Ok(Token::new(kind, loc))
    }

    fn lex_number(&mut self, loc: Loc) -> Result<Token> {
        let mut text = String::new();
        if self.peek() == Some(b'0') && matches!(self.peek2(), Some(b'x') | Some(b'X')) {
            self.bump();
            self.bump();
            while let Some(c) = self.peek() {
                if !c.is_ascii_hexdigit() {
                    break;
                }
                text.push(self.bump() as char);
            }
            if text.is_empty() {
                return Err(Error::parse(loc, "malformed hex literal"));
            }
            let value = u32::from_str_radix(&text, 16)
                .map_err(|_| Error::parse(loc.clone(), "hex literal out of range"))?;
            return Ok(Token::new(TokenKind::Int(value as i32), loc));
        }
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            text.push(self.bump() as char);
        }
        if matches!(self.peek(), Some(b'.') | Some(b'e') | Some(b'E') | Some(b'f') | Some(b'F')) {
            return Err(Error::unsupported(loc, "floating point literals are not supported"));
        }
        // Octal per C99 when it starts with 0; plain decimal otherwise.
        let (radix, digits) = if text.len() > 1 && text.starts_with('0') {
            (8, &text[1..])
        } else {
            (10, text.as_str())
        };
        let value = u32::from_str_radix(digits, radix)
            .map_err(|_| Error::parse(loc.clone(), "integer literal out of range"))?;
        Ok(Token::new(TokenKind::Int(value as i32), loc))
    }

    fn lex_identifier(&mut self, loc: Loc) -> Result<Token> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c != b'_' && !c.is_ascii_alphanumeric() {
                break;
            }
            name.push(self.bump() as char);
        }
        let kind = match name.as_str() {
            "int" => TokenKind::KwInt,
            "long" => TokenKind::KwLong,
            "unsigned" => TokenKind::KwUnsigned,
            "void" => TokenKind::KwVoid,
            "enum" => TokenKind::KwEnum,
            "extern" => TokenKind::KwExtern,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "while" => TokenKind::KwWhile,
            "do" => TokenKind::KwDo,
            "for" => TokenKind::KwFor,
            "break" => TokenKind::KwBreak,
            "continue" => TokenKind::KwContinue,
            "return" => TokenKind::KwReturn,
            _ => match UNSUPPORTED_KEYWORDS.iter().copied().find(|kw| *kw == name) {
                Some(kw) => TokenKind::KwUnsupported(kw),
                None => TokenKind::Ident(name),
            },
        };
        Ok(Token::new(kind, loc))
    }

    fn lex_string(&mut self, loc: Loc) -> Result<Token> {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.bump();
                    return Ok(Token::new(TokenKind::Str(text), loc));
                }
                Some(b'\n') | None => {
                    return Err(Error::parse(loc, "unterminated string literal"))
                }
                Some(b'\\') => {
                    self.bump();
                    let esc = self
                        .peek()
                        .ok_or_else(|| Error::parse(loc.clone(), "unterminated string literal"))?;
                    self.bump();
                    text.push(match esc {
                        b'n' => '\n',
                        b't' => '\t',
                        b'\\' => '\\',
                        b'"' => '"',
                        other => other as char,
                    });
                }
                Some(_) => text.push(self.bump() as char),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<TokenKind> {
        Lexer::new("test.c".into(), text)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn punctuation_and_numbers() {
        assert_eq!(
            lex("a += 0x10 >> 2;"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::AssignOp(BinTok::Add),
                TokenKind::Int(16),
                TokenKind::Shr,
                TokenKind::Int(2),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn octal_literal() {
        assert_eq!(lex("017")[0], TokenKind::Int(15));
    }

    #[test]
    fn comments_and_locations() {
        let toks = Lexer::new("t.c".into(), "// x\n/* y\n */ foo")
            .tokenize()
            .unwrap();
        assert_eq!(toks[0].kind, TokenKind::Ident("foo".into()));
        assert_eq!(toks[0].loc.line, 3);
        assert_eq!(toks[0].loc.col, 5);
    }

    #[test]
    fn unsupported_keyword_is_flagged() {
        assert_eq!(lex("switch")[0], TokenKind::KwUnsupported("switch"));
    }

    #[test]
    fn rejects_float() {
        assert!(Lexer::new("t.c".into(), "1.5").tokenize().is_err());
    }
}
