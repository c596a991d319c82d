//! Binary trace encoding and decoding
//!
//! [`Writer`] turns calls into bytes and [`Parser`] turns bytes back into
//! calls. Each owns the [`crate::registry::SignatureRegistry`] of its session.
//!
//! # Example
//!
//! ```
//! use calltrace::call::{Call, CallFlags};
//! use calltrace::codec::{decode_calls, encode_calls};
//! use calltrace::signature::FunctionSig;
//! use calltrace::value::Value;
//! use std::sync::Arc;
//!
//! # fn main() -> calltrace::error::Result<()> {
//! let sig = Arc::new(FunctionSig::new(0, "clearBuffer", &["mask"]));
//! let call = Call::new(0, sig, CallFlags::traced())?.with_args([Value::UInt(16384)])?;
//!
//! let bytes = encode_calls(&[call])?;
//! let decoded = decode_calls(&bytes)?;
//! assert_eq!(decoded[0].to_string(), "clearBuffer(mask = 16384)");
//! # Ok(())
//! # }
//! ```

mod parser;
pub mod varint;
mod writer;

pub use parser::{Parser, MAX_NESTING};
pub use writer::Writer;

use crate::call::Call;
use crate::error::Result;

/// Encode `calls` as a complete trace at the current version
pub fn encode_calls(calls: &[Call]) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new())?;
    for call in calls {
        writer.write_call(call)?;
    }
    writer.finish()
}

/// Decode every call of an in-memory trace
pub fn decode_calls(bytes: &[u8]) -> Result<Vec<Call>> {
    Parser::new(bytes)?.collect()
}
