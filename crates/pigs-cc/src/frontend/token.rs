use crate::source::Loc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Int(i32),
    Str(String),

    // Keywords of the supported subset.
    KwInt,
    KwLong,
    KwUnsigned,
    KwVoid,
    KwEnum,
    KwExtern,
    KwIf,
    KwElse,
    KwWhile,
    KwDo,
    KwFor,
    KwBreak,
    KwContinue,
    KwReturn,

    // Recognised so the parser can reject them with a precise message.
    KwUnsupported(&'static str),

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Assign,          // =
    AssignOp(BinTok), // += -= *= /= %= &= |= ^= <<= >>=
    Question,
    Colon,
    Dot,
    Arrow,
    Amp,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    AmpAmp,
    PipePipe,
    PlusPlus,
    MinusMinus,

    Eof,
}

/// Binary operator spelled inside a compound assignment token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinTok {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Loc,
}

impl Token {
    pub fn new(kind: TokenKind, loc: Loc) -> Self {
        Self { kind, loc }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

/// Human-readable token name for diagnostics.
pub fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("identifier \"{name}\""),
        TokenKind::Int(v) => format!("integer {v}"),
        TokenKind::Str(_) => "string literal".into(),
        TokenKind::KwUnsupported(kw) => format!("\"{kw}\""),
        TokenKind::Eof => "end of input".into(),
        other => format!("{other:?}"),
    }
}
