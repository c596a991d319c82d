//! Trace binary format: tags, version number and version-dependent semantics
//!
//! # Grammar
//!
//! ```text
//! trace       = version event* EOF
//! event       = ENTER call_sig flags call_detail* END
//!             | LEAVE call_no call_detail* END
//! call_detail = ARG index value | RET value | THREAD id
//! value       = NULL | FALSE | TRUE | SINT zigzag | UINT uint
//!             | FLOAT f32 | DOUBLE f64 | STRING bytes | BLOB bytes
//!             | ENUM enum_sig | BITMASK bitmask_sig uint
//!             | ARRAY length value* | STRUCT struct_sig value*
//!             | OPAQUE uint
//! sig_ref     = uint((id << 1) | has_definition)
//! call_sig    = sig_ref (name count arg_name*)?
//! struct_sig  = sig_ref (name count member_name*)?
//! enum_sig    = sig_ref (name zigzag)?
//! bitmask_sig = sig_ref (count (name uint)*)?
//! bytes       = length byte*
//! ```
//!
//! Integers are unsigned LEB128; signed integers are zigzag-mapped first.
//! Floats are little-endian IEEE 754.
//!
//! # Versions
//!
//! Old traces must always decode and replay, so the version number covers
//! replay semantics as well as the byte layout:
//!
//! - **0**: initial format.
//! - **1**: a blob is recorded whenever a call refers to user memory. Version 0
//!   traces have no such blobs, so calls passing raw user pointers cannot be
//!   replayed.
//! - **2**: user memory may be passed as malloc'd memory instead of blobs, and a
//!   mapped-range flush only covers the flushed sub-range (earlier versions
//!   flush the whole mapping).

use crate::error::DecodeError;
use std::ops::Range;

/// Newest trace version this crate reads and writes
pub const TRACE_VERSION: u64 = 2;

macro_rules! tag_enum {
    ($(#[$meta:meta])* $name:ident, $context:literal { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl TryFrom<u8> for $name {
            type Error = DecodeError;

            fn try_from(tag: u8) -> Result<Self, DecodeError> {
                match tag {
                    $($value => Ok($name::$variant),)+
                    _ => Err(DecodeError::UnknownTag { context: $context, tag }),
                }
            }
        }
    };
}

tag_enum!(
    /// Top-level event tag
    Event, "event" {
        Enter = 0,
        Leave = 1,
    }
);

tag_enum!(
    /// Record inside an ENTER or LEAVE event
    CallDetail, "call detail" {
        End = 0,
        Arg = 1,
        Ret = 2,
        Thread = 3,
    }
);

tag_enum!(
    /// Value type tag
    TypeTag, "value" {
        Null = 0,
        False = 1,
        True = 2,
        SInt = 3,
        UInt = 4,
        Float = 5,
        Double = 6,
        String = 7,
        Blob = 8,
        Enum = 9,
        Bitmask = 10,
        Array = 11,
        Struct = 12,
        Opaque = 13,
    }
);

/// Replay rules selected by a stream's declared version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionSemantics {
    version: u64,
}

impl VersionSemantics {
    pub fn new(version: u64) -> Self {
        Self { version }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// User memory referenced by a call is recorded as a blob (v1+)
    pub fn describes_user_memory(&self) -> bool {
        self.version >= 1
    }

    /// User memory may be passed as malloc'd memory (v2+)
    pub fn user_memory_as_malloc(&self) -> bool {
        self.version >= 2
    }

    /// Bytes of a mapping covered by a flush of `length` bytes at `offset`
    ///
    /// Before version 2 a flush covers the whole mapping regardless of the
    /// range the call names.
    pub fn flushed_range(&self, mapping_len: u64, offset: u64, length: u64) -> Range<u64> {
        if self.version < 2 {
            return 0..mapping_len;
        }
        let start = offset.min(mapping_len);
        let end = offset.saturating_add(length).min(mapping_len);
        start..end
    }
}

impl Default for VersionSemantics {
    fn default() -> Self {
        Self::new(TRACE_VERSION)
    }
}
