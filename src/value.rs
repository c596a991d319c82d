//! Value model for call arguments and return values
//!
//! A [`Value`] is a node in an exclusively-owned tree: each value belongs to
//! exactly one call, struct or array. Every conversion method is total. Asking
//! a blob for an integer or a struct for a string returns a fixed default
//! instead of failing, so dump, diff and argument-binding code can treat all
//! values uniformly.
//!
//! | Conversion      | Meaningful for                            | Otherwise |
//! |-----------------|-------------------------------------------|-----------|
//! | `to_bool`       | everything (`Null` is false)              | `true`    |
//! | `to_sint/uint`  | Bool, SInt, UInt, Float, Double, Enum, Bitmask, Pointer | `0` |
//! | `to_float/double` | same as above                           | `0.0`     |
//! | `to_str`        | String                                    | `""`      |
//! | `to_uint_ptr`   | Pointer, Blob                             | `0`       |

use crate::address::AddressTable;
use crate::error::CallError;
use crate::signature::{BitmaskSig, EnumSig, StructSig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NULL: Value = Value::Null;

/// Bitmask value: an unsigned payload described by named flags
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmask {
    pub sig: Arc<BitmaskSig>,
    pub value: u64,
}

/// Struct value with exactly one member per signature member name
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    pub sig: Arc<StructSig>,
    members: Vec<Value>,
}

impl Struct {
    pub fn new(sig: Arc<StructSig>, members: Vec<Value>) -> Result<Self, CallError> {
        if members.len() != sig.num_members() {
            return Err(CallError::MemberCountMismatch {
                name: sig.name.clone(),
                expected: sig.num_members(),
                found: members.len(),
            });
        }
        Ok(Self { sig, members })
    }

    pub fn members(&self) -> &[Value] {
        &self.members
    }

    /// Member names paired with their values
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.sig
            .member_names
            .iter()
            .map(String::as_str)
            .zip(self.members.iter())
    }
}

static NEXT_BLOB_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque captured bytes
///
/// Every blob created by [`Blob::new`] gets a process-unique id, and the
/// replay side keys its copy of the bytes on that id. Clones keep the id and
/// so share one replay copy. `bound` flips to true the first time the blob is
/// virtualized into the replay address space and never flips back.
#[derive(Debug, Clone)]
pub struct Blob {
    id: u64,
    data: Vec<u8>,
    bound: bool,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            id: NEXT_BLOB_ID.fetch_add(1, Ordering::Relaxed),
            data,
            bound: false,
        }
    }

    /// Identity used by [`AddressTable`] to find this blob's replay copy
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Address of the captured bytes in this process
    pub fn original_address(&self) -> u64 {
        if self.data.is_empty() {
            0
        } else {
            self.data.as_ptr() as u64
        }
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

/// A typed node of a call's argument or return tree
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    SInt(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    String(String),
    Enum(Arc<EnumSig>),
    Bitmask(Bitmask),
    Struct(Struct),
    Array(Vec<Value>),
    Blob(Blob),
    Pointer(u64),
}

impl Value {
    /// Short lowercase name of the variant
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::SInt(_) => "sint",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Enum(_) => "enum",
            Value::Bitmask(_) => "bitmask",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
            Value::Blob(_) => "blob",
            Value::Pointer(_) => "pointer",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::SInt(v) => *v != 0,
            Value::UInt(v) | Value::Pointer(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Double(v) => *v != 0.0,
            Value::Enum(sig) => sig.value != 0,
            Value::Bitmask(mask) => mask.value != 0,
            Value::String(_) | Value::Struct(_) | Value::Array(_) | Value::Blob(_) => true,
        }
    }

    pub fn to_sint(&self) -> i64 {
        match self {
            Value::Bool(b) => i64::from(*b),
            Value::SInt(v) => *v,
            Value::UInt(v) | Value::Pointer(v) => *v as i64,
            Value::Float(v) => *v as i64,
            Value::Double(v) => *v as i64,
            Value::Enum(sig) => sig.value,
            Value::Bitmask(mask) => mask.value as i64,
            _ => 0,
        }
    }

    pub fn to_uint(&self) -> u64 {
        match self {
            Value::Bool(b) => u64::from(*b),
            Value::SInt(v) => *v as u64,
            Value::UInt(v) | Value::Pointer(v) => *v,
            Value::Float(v) => *v as u64,
            Value::Double(v) => *v as u64,
            Value::Enum(sig) => sig.value as u64,
            Value::Bitmask(mask) => mask.value,
            _ => 0,
        }
    }

    pub fn to_float(&self) -> f32 {
        match self {
            Value::Float(v) => *v,
            Value::Double(v) => *v as f32,
            _ => self.to_double() as f32,
        }
    }

    pub fn to_double(&self) -> f64 {
        match self {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::SInt(v) => *v as f64,
            Value::UInt(v) | Value::Pointer(v) => *v as f64,
            Value::Float(v) => f64::from(*v),
            Value::Double(v) => *v,
            Value::Enum(sig) => sig.value as f64,
            Value::Bitmask(mask) => mask.value as f64,
            _ => 0.0,
        }
    }

    /// Text of a `String` value, empty for every other kind
    pub fn to_str(&self) -> &str {
        match self {
            Value::String(s) => s,
            _ => "",
        }
    }

    /// Original, unvirtualized address
    ///
    /// Used for trace-side comparisons. Blobs report where their captured
    /// bytes live in this process.
    pub fn to_uint_ptr(&self) -> u64 {
        match self {
            Value::Pointer(address) => *address,
            Value::Blob(blob) => blob.original_address(),
            _ => 0,
        }
    }

    /// Replay-side address for a pointer or blob
    ///
    /// With `bind == false` this only reports an existing translation (0 when
    /// there is none). With `bind == true` the address is virtualized through
    /// `table` on first use; binding again returns the same address.
    pub fn to_pointer(&mut self, table: &mut AddressTable, bind: bool) -> u64 {
        match self {
            Value::Blob(blob) => {
                if !bind {
                    return table.blob_address(blob.id).unwrap_or(0);
                }
                blob.bound = true;
                if blob.data.is_empty() {
                    0
                } else {
                    table.bind_blob(blob.id, &blob.data)
                }
            }
            Value::Pointer(address) => {
                if bind {
                    table.bind_pointer(*address)
                } else {
                    table.translate(*address).unwrap_or(0)
                }
            }
            _ => 0,
        }
    }

    /// Child of an array or struct, or `Null` when out of range
    pub fn get(&self, index: usize) -> &Value {
        let child = match self {
            Value::Array(values) => values.get(index),
            Value::Struct(s) => s.members.get(index),
            _ => None,
        };
        child.unwrap_or(&NULL)
    }

    /// Number of children of an array or struct
    pub fn len(&self) -> usize {
        match self {
            Value::Array(values) => values.len(),
            Value::Struct(s) => s.members.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::ops::Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        self.get(index)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::SInt(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Blob> for Value {
    fn from(value: Blob) -> Self {
        Value::Blob(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_struct() -> Value {
        let sig = Arc::new(StructSig::new(0, "Point", &["x", "y"]));
        Value::Struct(Struct::new(sig, vec![Value::SInt(1), Value::SInt(2)]).unwrap())
    }

    #[test]
    fn test_to_bool_defaults() {
        assert!(!Value::Null.to_bool());
        assert!(Value::Bool(true).to_bool());
        assert!(!Value::UInt(0).to_bool());
        assert!(Value::SInt(-1).to_bool());
        assert!(!Value::Double(0.0).to_bool());
        assert!(Value::String(String::new()).to_bool());
        assert!(Value::Array(vec![]).to_bool());
        assert!(Value::Blob(Blob::new(vec![])).to_bool());
        assert!(sample_struct().to_bool());
    }

    #[test]
    fn test_integer_reinterpretation() {
        assert_eq!(Value::SInt(-1).to_uint(), u64::MAX);
        assert_eq!(Value::UInt(u64::MAX).to_sint(), -1);
        assert_eq!(Value::Bool(true).to_sint(), 1);
        assert_eq!(Value::Double(2.9).to_sint(), 2);
    }

    #[test]
    fn test_bitmask_and_pointer_defer_to_uint() {
        let sig = Arc::new(BitmaskSig::new(0, &[("A", 1), ("B", 2)]));
        let mask = Value::Bitmask(Bitmask { sig, value: 3 });
        assert_eq!(mask.to_uint(), 3);
        assert_eq!(mask.to_sint(), 3);
        assert_eq!(mask.to_double(), 3.0);

        let ptr = Value::Pointer(0x1000);
        assert_eq!(ptr.to_uint(), 0x1000);
        assert_eq!(ptr.to_uint_ptr(), 0x1000);
    }

    #[test]
    fn test_enum_converts_through_value() {
        let value = Value::Enum(Arc::new(EnumSig::new(0, "GL_TRIANGLES", 4)));
        assert_eq!(value.to_sint(), 4);
        assert_eq!(value.to_float(), 4.0);
        assert!(value.to_bool());
    }

    #[test]
    fn test_non_numeric_defaults() {
        for value in [
            Value::String("abc".into()),
            Value::Array(vec![Value::UInt(1)]),
            Value::Blob(Blob::new(vec![1, 2])),
            sample_struct(),
            Value::Null,
        ] {
            assert_eq!(value.to_sint(), 0, "{}", value.kind_name());
            assert_eq!(value.to_uint(), 0, "{}", value.kind_name());
            assert_eq!(value.to_float(), 0.0, "{}", value.kind_name());
            assert_eq!(value.to_double(), 0.0, "{}", value.kind_name());
        }
    }

    #[test]
    fn test_to_str_only_for_strings() {
        assert_eq!(Value::from("hello").to_str(), "hello");
        assert_eq!(Value::UInt(5).to_str(), "");
        assert_eq!(Value::Null.to_str(), "");
    }

    #[test]
    fn test_indexing_is_total() {
        let point = sample_struct();
        assert_eq!(point[0], Value::SInt(1));
        assert_eq!(point[1], Value::SInt(2));
        assert!(point[2].is_null());
        assert!(Value::UInt(3)[0].is_null());
        assert_eq!(point.len(), 2);
    }

    #[test]
    fn test_struct_member_count_checked() {
        let sig = Arc::new(StructSig::new(0, "Point", &["x", "y"]));
        let err = Struct::new(sig, vec![Value::SInt(1)]).unwrap_err();
        assert_eq!(
            err,
            CallError::MemberCountMismatch {
                name: "Point".into(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_blob_bind_is_idempotent() {
        let mut table = AddressTable::new();
        let mut value = Value::Blob(Blob::new(vec![1, 2, 3, 4]));

        assert_eq!(value.to_pointer(&mut table, false), 0);
        let first = value.to_pointer(&mut table, true);
        let second = value.to_pointer(&mut table, true);

        assert_ne!(first, 0);
        assert_eq!(first, second);
        assert_eq!(value.to_pointer(&mut table, false), first);
        match &value {
            Value::Blob(blob) => assert!(blob.is_bound()),
            other => panic!("expected blob, got {other:?}"),
        }
    }

    #[test]
    fn test_sequential_blobs_bind_their_own_bytes() {
        let mut table = AddressTable::new();
        for i in 0..50u8 {
            let mut value = Value::Blob(Blob::new(vec![i; 16]));
            let address = value.to_pointer(&mut table, true);
            let id = match &value {
                Value::Blob(blob) => blob.id(),
                other => panic!("expected blob, got {other:?}"),
            };
            assert_eq!(table.blob_address(id), Some(address));
            assert_eq!(table.blob_bytes(id), Some(&[i; 16][..]));
        }
        assert_eq!(table.blob_count(), 50);
    }

    #[test]
    fn test_cloned_blob_shares_replay_copy() {
        let mut table = AddressTable::new();
        let mut original = Value::Blob(Blob::new(vec![5, 6, 7]));
        let address = original.to_pointer(&mut table, true);

        let mut copy = original.clone();
        assert_eq!(copy.to_pointer(&mut table, false), address);
        assert_eq!(copy.to_pointer(&mut table, true), address);
        assert_eq!(table.blob_count(), 1);
    }

    #[test]
    fn test_pointer_bind_translates_through_region() {
        let mut table = AddressTable::new();
        let base = table.add_region(0x4000, 16);
        let mut value = Value::Pointer(0x4008);

        assert_eq!(value.to_pointer(&mut table, true), base + 8);
        assert_eq!(value.to_pointer(&mut table, true), base + 8);
        assert_eq!(value.to_uint_ptr(), 0x4008);
    }

    #[test]
    fn test_to_pointer_other_kinds_null() {
        let mut table = AddressTable::new();
        assert_eq!(Value::UInt(12).to_pointer(&mut table, true), 0);
        assert_eq!(Value::Null.to_pointer(&mut table, true), 0);
    }
}
