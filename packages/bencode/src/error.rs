/// Errors produced by the decoder and encoder.
///
/// `KeyOrder` can only arise while encoding: a caller handed us a `Dict` whose
/// keys were not already in ascending order, which would make the output
/// non-canonical.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("malformed bencode at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    #[error("truncated bencode: expected {expected} more byte(s) at offset {offset}")]
    Truncated { offset: usize, expected: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("dictionary keys are not in ascending order: {prev:?} before {next:?}")]
    KeyOrder { prev: Vec<u8>, next: Vec<u8> },

    #[error("trailing bytes after a complete value: {remaining} byte(s) unread")]
    TrailingBytes { remaining: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
