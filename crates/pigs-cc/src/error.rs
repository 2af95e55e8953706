use crate::source::Loc;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{loc}: syntax error: {message}")]
    Parse { loc: Loc, message: String },

    #[error("{loc}: unsupported: {message}")]
    SyntaxUnsupported { loc: Loc, message: String },

    #[error("{loc}: {message}")]
    Scope { loc: Loc, message: String },

    #[error("missing main() function definition")]
    MissingMain,

    #[error("{loc}: {message}")]
    Type { loc: Loc, message: String },

    #[error("{loc}: recursive call to \"{name}\" (save/restore with inline asm push/pop to allow it)")]
    Recursion { loc: Loc, name: String },

    #[error("{loc}: expression too deeply nested (more than {limit} scratch slots required)")]
    ScratchExhaustion { loc: Loc, limit: usize },

    #[error("{loc}: duplicate tag \"{name}\"")]
    TagCollision { loc: Loc, name: String },

    #[error("{loc}: tag \"{name}\" is never defined")]
    UndefinedTag { loc: Loc, name: String },

    #[error("{loc}: malformed asm(): {message}")]
    Asm { loc: Loc, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn parse(loc: Loc, message: impl Into<String>) -> Self {
        Self::Parse { loc, message: message.into() }
    }

    pub fn unsupported(loc: Loc, message: impl Into<String>) -> Self {
        Self::SyntaxUnsupported { loc, message: message.into() }
    }

    pub fn scope(loc: Loc, message: impl Into<String>) -> Self {
        Self::Scope { loc, message: message.into() }
    }

    pub fn ty(loc: Loc, message: impl Into<String>) -> Self {
        Self::Type { loc, message: message.into() }
    }

    pub fn asm(loc: Loc, message: impl Into<String>) -> Self {
        Self::Asm { loc, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
