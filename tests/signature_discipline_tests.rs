//! Integration tests for signature definition and reference rules

use calltrace::call::{Call, CallFlags};
use calltrace::codec::{decode_calls, Parser, Writer};
use calltrace::error::TraceError;
use calltrace::signature::{EnumSig, FunctionSig, SigKind};
use calltrace::value::Value;
use std::sync::Arc;

/// `f()` defined with id 0, entered and left as call `no`
fn defined_call(name: u8, no: u8) -> Vec<u8> {
    vec![0, 1, 1, name, 0, 3, 0, 1, no, 0]
}

#[test]
fn test_bare_function_reference_before_definition() {
    // version 2, ENTER, bare ref to function 0
    let bytes = [2u8, 0, 0, 3, 0];
    let err = decode_calls(&bytes).unwrap_err();
    assert!(matches!(
        err,
        TraceError::UnknownSignature {
            kind: SigKind::Function,
            id: 0
        }
    ));
}

#[test]
fn test_bare_struct_reference_before_definition() {
    let mut bytes = vec![2u8];
    // ENTER f(p), ARG 0 STRUCT bare ref 4
    bytes.extend_from_slice(&[0, 1, 1, b'f', 1, 1, b'p', 3, 1, 0, 12, 8, 0]);
    let err = decode_calls(&bytes).unwrap_err();
    assert!(matches!(
        err,
        TraceError::UnknownSignature {
            kind: SigKind::Struct,
            id: 4
        }
    ));
}

#[test]
fn test_identical_redefinition_is_silent() {
    let mut bytes = vec![2u8];
    bytes.extend(defined_call(b'f', 0));
    bytes.extend(defined_call(b'f', 1));

    let calls = decode_calls(&bytes).unwrap();
    assert_eq!(calls.len(), 2);
    assert!(Arc::ptr_eq(&calls[0].sig, &calls[1].sig));
}

#[test]
fn test_conflicting_redefinition_is_rejected() {
    let mut bytes = vec![2u8];
    bytes.extend(defined_call(b'f', 0));
    bytes.extend(defined_call(b'g', 1));

    let mut parser = Parser::new(&bytes[..]).unwrap();
    assert_eq!(parser.parse_call().unwrap().unwrap().name(), "f");
    assert!(matches!(
        parser.parse_call().unwrap_err(),
        TraceError::SignatureConflict {
            kind: SigKind::Function,
            id: 0
        }
    ));
}

#[test]
fn test_writer_rejects_conflicting_signatures() {
    let sig = Arc::new(FunctionSig::new(0, "texParameter", &["value"]));
    let mut writer = Writer::new(Vec::new()).unwrap();

    let linear = Call::new(0, Arc::clone(&sig), CallFlags::traced())
        .unwrap()
        .with_args([Value::Enum(Arc::new(EnumSig::new(0, "GL_LINEAR", 0x2601)))])
        .unwrap();
    writer.write_call(&linear).unwrap();

    let nearest = Call::new(1, sig, CallFlags::traced())
        .unwrap()
        .with_args([Value::Enum(Arc::new(EnumSig::new(0, "GL_NEAREST", 0x2600)))])
        .unwrap();
    assert!(matches!(
        writer.write_call(&nearest).unwrap_err(),
        TraceError::SignatureConflict {
            kind: SigKind::Enum,
            id: 0
        }
    ));
    // The rejected call leaves nothing behind
    writer.write_call(&linear).unwrap();
    let calls = decode_calls(&writer.finish().unwrap()).unwrap();
    let dumped: Vec<String> = calls.iter().map(|c| format!("{} {}", c.no, c)).collect();
    assert_eq!(dumped, vec!["0 texParameter(value = GL_LINEAR)", "1 texParameter(value = GL_LINEAR)"]);
}

#[test]
fn test_signature_ids_are_per_kind() {
    let func = Arc::new(FunctionSig::new(0, "setMode", &["mode"]));
    let call = Call::new(0, func, CallFlags::traced())
        .unwrap()
        .with_args([Value::Enum(Arc::new(EnumSig::new(0, "MODE_FAST", 1)))])
        .unwrap();

    let mut writer = Writer::new(Vec::new()).unwrap();
    writer.write_call(&call).unwrap();
    assert_eq!(writer.registry().count(SigKind::Function), 1);
    assert_eq!(writer.registry().count(SigKind::Enum), 1);
    assert!(writer.registry().contains(SigKind::Enum, 0));
    assert!(!writer.registry().contains(SigKind::Struct, 0));

    let calls = decode_calls(&writer.finish().unwrap()).unwrap();
    assert_eq!(calls[0].to_string(), "setMode(mode = MODE_FAST)");
}

#[test]
fn test_call_without_trace_or_retrace_is_rejected() {
    let sig = Arc::new(FunctionSig::new(0, "f", &[]));
    let flags = CallFlags {
        trace: false,
        retrace: false,
        ..CallFlags::default()
    };
    assert!(Call::new(0, Arc::clone(&sig), flags).is_err());

    // The same flags on the wire are a decode error
    let bytes = [2u8, 0, 1, 1, b'f', 0, 0, 0];
    assert!(matches!(
        decode_calls(&bytes).unwrap_err(),
        TraceError::InvalidCall(_)
    ));
}
