//! Error types for trace encoding and decoding
//!
//! Decoding failures are fatal for the stream being read: once the parser
//! returns an error it stops producing calls. Value conversions never error,
//! see [`crate::value::Value`].

use crate::signature::SigKind;
use thiserror::Error;

/// Malformed or truncated byte stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("unknown {context} tag {tag}")]
    UnknownTag { context: &'static str, tag: u8 },

    #[error("varint exceeds 64 bits")]
    VarintOverflow,

    #[error("length {0} does not fit in memory")]
    LengthTooLarge(u64),

    #[error("argument index {index} out of range for `{call}` ({arity} arguments)")]
    ArgIndexOutOfRange {
        call: String,
        index: u64,
        arity: usize,
    },

    #[error("leave event for unknown call number {0}")]
    UnknownCall(u64),

    #[error("signature id {0} exceeds 32 bits")]
    IdOutOfRange(u64),

    #[error("values nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("more than 2^32 calls in one trace")]
    TooManyCalls,
}

/// Misuse of the call model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("call `{0}` is neither traced nor retraced")]
    NeitherTracedNorRetraced(String),

    #[error("argument index {index} out of range for `{call}` ({arity} arguments)")]
    ArgIndexOutOfRange {
        call: String,
        index: usize,
        arity: usize,
    },

    #[error("struct `{name}` expects {expected} members, got {found}")]
    MemberCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Errors that can occur while reading or writing a trace
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("{kind} signature {id} referenced before definition")]
    UnknownSignature { kind: SigKind, id: u32 },

    #[error("{kind} signature {id} redefined with a different shape")]
    SignatureConflict { kind: SigKind, id: u32 },

    #[error("invalid call: {0}")]
    InvalidCall(#[from] CallError),

    #[error("unsupported trace version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u64, supported: u64 },

    #[error("more than 2^32 calls written to one trace")]
    CallNumbersExhausted,

    #[error("writer unusable after an earlier I/O error")]
    WriterPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for trace operations
pub type Result<T> = std::result::Result<T, TraceError>;
