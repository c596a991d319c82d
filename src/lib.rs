//! calltrace - binary call-trace format and object model
//!
//! A trace is a stream of ENTER/LEAVE events describing intercepted API
//! calls. This library provides the value tree those calls are made of,
//! the signature registry that names functions, structs, enums and bitmasks,
//! the streaming writer and parser for the wire format, and the address
//! table a replayer uses to turn capture-time pointers into live memory.
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
//! let sig = Arc::new(FunctionSig::new(0, "clearBuffer", &["mask"]));
//! let call = Call::new(0, sig, CallFlags::traced())
//!     .unwrap()
//!     .with_args([Value::UInt(16384)])
//!     .unwrap();
//!
//! let bytes = encode_calls(&[call]).unwrap();
//! let calls = decode_calls(&bytes).unwrap();
//! assert_eq!(calls[0].to_string(), "clearBuffer(mask = 16384)");
//! ```

pub mod address;
pub mod call;
pub mod cli;
pub mod codec;
pub mod config;
pub mod diff_state;
pub mod dump;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod format;
pub mod json_output;
pub mod registry;
pub mod signature;
pub mod value;
pub mod visitor;

pub use error::{Result, TraceError};
