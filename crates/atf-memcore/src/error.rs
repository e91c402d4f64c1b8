use thiserror::Error;

/// Errors produced while compiling or evaluating an expression. `Display` text matches
/// the wire/stdout contract exactly (`#<text>` is prefixed by the caller, not here).
#[derive(Debug, Error, Clone)]
pub enum ExprError {
    #[error("Unexpected char '{0}'")]
    UnexpectedChar(char),

    #[error("Expected '{expected}', got '{got}'")]
    ExpectedToken { expected: String, got: String },

    #[error("Unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Global ident '{0}' not found")]
    IdentNotFound(String),

    #[error("Invalid fetch member, node is not a struct/class/union")]
    InvalidFetchMember,

    #[error("Field '{0}' not found")]
    FieldNotFound(String),

    #[error("Invalid fetch member deref, node is not a pointer")]
    InvalidFetchMemberDeref,

    #[error("Invalid fetch array, invalid index [{index}], have array count {count}.")]
    InvalidFetchArrayIndex { index: u64, count: u64 },

    #[error("Invalid fetch array, node is not an array or pointer")]
    InvalidFetchArrayTarget,

    #[error("Invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("Invalid get-ref, expected an l-value")]
    InvalidGetRef,

    #[error("Invalid deref, node is not a pointer")]
    InvalidDeref,

    #[error("Invalid reinterpret_cast, expected a pointer type")]
    InvalidCast,

    #[error("Invalid expr(final is type, expected l-value/address).")]
    FinalIsType,

    #[error("Invalid expr, stack did not resolve to exactly one value")]
    InvalidExprShape,

    #[error("Unknown scalar type '{0}'")]
    UnknownScalar(String),

    #[error("[{addr:#x}({size})] {text}")]
    Read { addr: u64, size: usize, text: String },

    #[error("{0}")]
    Process(String),
}
