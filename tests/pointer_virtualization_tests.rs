//! Integration tests for replay-side address translation

use calltrace::address::AddressTable;
use calltrace::call::{Call, CallFlags};
use calltrace::codec::{decode_calls, encode_calls, Parser};
use calltrace::signature::FunctionSig;
use calltrace::value::{Blob, Value};
use std::sync::Arc;

#[test]
fn test_decoded_blob_binds_once() {
    let sig = Arc::new(FunctionSig::new(0, "bufferSubData", &["data"]));
    let call = Call::new(0, sig, CallFlags::traced())
        .unwrap()
        .with_args([Value::Blob(Blob::new(vec![9, 8, 7]))])
        .unwrap();
    let mut calls = decode_calls(&encode_calls(&[call]).unwrap()).unwrap();
    let mut table = AddressTable::new();

    let arg = calls[0].arg_mut(0).unwrap();
    assert_eq!(arg.to_pointer(&mut table, false), 0);

    let first = arg.to_pointer(&mut table, true);
    let second = arg.to_pointer(&mut table, true);
    assert_ne!(first, 0);
    assert_eq!(first, second);
    assert_eq!(arg.to_pointer(&mut table, false), first);
    assert_eq!(table.blob_count(), 1);

    match arg {
        Value::Blob(blob) => {
            assert!(blob.is_bound());
            assert_eq!(table.blob_bytes(blob.id()), Some(&[9u8, 8, 7][..]));
        }
        other => panic!("expected blob, got {other:?}"),
    }
}

#[test]
fn test_pointer_inside_region_translates() {
    let mut table = AddressTable::new();
    let base = table.add_region(0x4000, 256);

    let mut inside = Value::Pointer(0x4010);
    assert_eq!(inside.to_pointer(&mut table, false), base + 0x10);
    assert_eq!(inside.to_pointer(&mut table, true), base + 0x10);

    let mut past_end = Value::Pointer(0x4100);
    assert_eq!(past_end.to_pointer(&mut table, false), 0);
}

#[test]
fn test_unknown_pointer_passes_through() {
    let mut table = AddressTable::new();
    let mut pointer = Value::Pointer(0xcafe);

    assert_eq!(pointer.to_pointer(&mut table, false), 0);
    assert_eq!(pointer.to_pointer(&mut table, true), 0xcafe);
    assert_eq!(table.translate(0xcafe), Some(0xcafe));
    assert_eq!(pointer.to_pointer(&mut table, false), 0xcafe);
}

#[test]
fn test_null_and_scalars_never_bind() {
    let mut table = AddressTable::new();
    assert_eq!(Value::Pointer(0).to_pointer(&mut table, true), 0);
    assert_eq!(Value::UInt(0x4000).to_pointer(&mut table, true), 0);
    assert_eq!(Value::Null.to_pointer(&mut table, true), 0);
    assert_eq!(table.region_count(), 0);
    assert_eq!(table.blob_count(), 0);
}

#[test]
fn test_empty_blob_binds_to_null() {
    let mut table = AddressTable::new();
    let mut blob = Value::Blob(Blob::new(Vec::new()));
    assert_eq!(blob.to_pointer(&mut table, true), 0);
    match blob {
        Value::Blob(b) => assert!(b.is_bound()),
        other => panic!("expected blob, got {other:?}"),
    }
}

#[test]
fn test_region_writes_are_visible() {
    let mut table = AddressTable::new();
    table.add_region(0x8000, 4);
    table
        .region_bytes_mut(0x8000)
        .unwrap()
        .copy_from_slice(&[1, 2, 3, 4]);
    assert_eq!(table.region_bytes(0x8000), Some(&[1u8, 2, 3, 4][..]));
    assert!(table.remove_region(0x8000));
    assert_eq!(table.translate(0x8000), None);
}

#[test]
fn test_replayed_blobs_never_see_stale_bytes() {
    let sig = Arc::new(FunctionSig::new(0, "bufferSubData", &["data"]));
    let calls: Vec<Call> = (0..50u8)
        .map(|i| {
            Call::new(u32::from(i), Arc::clone(&sig), CallFlags::traced())
                .unwrap()
                .with_args([Value::Blob(Blob::new(vec![i; 16]))])
                .unwrap()
        })
        .collect();
    let bytes = encode_calls(&calls).unwrap();

    // Replay one call at a time, dropping each before decoding the next
    let mut table = AddressTable::new();
    let mut addresses = Vec::new();
    for (i, call) in Parser::new(&bytes[..]).unwrap().enumerate() {
        let mut call = call.unwrap();
        let arg = call.arg_mut(0).unwrap();
        addresses.push(arg.to_pointer(&mut table, true));
        let id = match arg {
            Value::Blob(blob) => blob.id(),
            other => panic!("expected blob, got {other:?}"),
        };
        assert_eq!(table.blob_bytes(id), Some(&[i as u8; 16][..]));
    }

    addresses.sort_unstable();
    addresses.dedup();
    assert_eq!(addresses.len(), 50);
    assert_eq!(table.blob_count(), 50);
}

#[test]
fn test_cloned_call_binds_to_same_copy() {
    let sig = Arc::new(FunctionSig::new(0, "texImage", &["pixels"]));
    let mut call = Call::new(0, sig, CallFlags::traced())
        .unwrap()
        .with_args([Value::Blob(Blob::new(vec![1, 2, 3, 4]))])
        .unwrap();
    let mut table = AddressTable::new();
    let address = call.arg_mut(0).unwrap().to_pointer(&mut table, true);

    let mut copy = call.clone();
    let other = Value::Blob(Blob::new(vec![1, 2, 3, 4]));
    assert_eq!(copy.arg_mut(0).unwrap().to_pointer(&mut table, true), address);
    assert_eq!(copy.arg(0), Some(&other));
    assert_eq!(table.blob_count(), 1);
}
