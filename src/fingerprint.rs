//! SHA-256 content fingerprints for calls
//!
//! Two calls with the same fingerprint have the same name, argument names
//! and value trees. Capture-time addresses usually differ between runs, so
//! pointers can be excluded to compare traces of the same program.

use crate::call::Call;
use crate::format::TypeTag;
use crate::signature::EnumSig;
use crate::value::{Bitmask, Blob, Struct, Value};
use crate::visitor::Visitor;
use sha2::{Digest, Sha256};

/// Hashes calls by content
#[derive(Debug, Clone, Copy, Default)]
pub struct Fingerprinter {
    ignore_pointers: bool,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash pointers as a fixed marker instead of their address
    pub fn ignore_pointers(mut self, ignore: bool) -> Self {
        self.ignore_pointers = ignore;
        self
    }

    pub fn call(&self, call: &Call) -> [u8; 32] {
        let mut hasher = ValueHasher {
            digest: Sha256::new(),
            ignore_pointers: self.ignore_pointers,
        };
        hasher.bytes(call.name().as_bytes());
        for (name, value) in call.named_args() {
            hasher.bytes(name.as_bytes());
            value.accept(&mut hasher);
        }
        match &call.ret {
            Some(ret) => {
                hasher.digest.update([1u8]);
                ret.accept(&mut hasher);
            }
            None => hasher.digest.update([0u8]),
        }
        hasher.digest.finalize().into()
    }

    pub fn call_hex(&self, call: &Call) -> String {
        hex::encode(self.call(call))
    }
}

struct ValueHasher {
    digest: Sha256,
    ignore_pointers: bool,
}

impl ValueHasher {
    fn tag(&mut self, tag: TypeTag) {
        self.digest.update([tag as u8]);
    }

    /// Length-prefixed so adjacent strings cannot alias
    fn bytes(&mut self, bytes: &[u8]) {
        self.digest.update((bytes.len() as u64).to_le_bytes());
        self.digest.update(bytes);
    }
}

impl Visitor for ValueHasher {
    fn visit_null(&mut self) {
        self.tag(TypeTag::Null);
    }

    fn visit_bool(&mut self, value: bool) {
        self.tag(if value { TypeTag::True } else { TypeTag::False });
    }

    fn visit_sint(&mut self, value: i64) {
        self.tag(TypeTag::SInt);
        self.digest.update(value.to_le_bytes());
    }

    fn visit_uint(&mut self, value: u64) {
        self.tag(TypeTag::UInt);
        self.digest.update(value.to_le_bytes());
    }

    fn visit_float(&mut self, value: f32) {
        self.tag(TypeTag::Float);
        self.digest.update(value.to_bits().to_le_bytes());
    }

    fn visit_double(&mut self, value: f64) {
        self.tag(TypeTag::Double);
        self.digest.update(value.to_bits().to_le_bytes());
    }

    fn visit_string(&mut self, value: &str) {
        self.tag(TypeTag::String);
        self.bytes(value.as_bytes());
    }

    fn visit_enum(&mut self, sig: &EnumSig) {
        self.tag(TypeTag::Enum);
        self.bytes(sig.name.as_bytes());
        self.digest.update(sig.value.to_le_bytes());
    }

    fn visit_bitmask(&mut self, bitmask: &Bitmask) {
        self.tag(TypeTag::Bitmask);
        self.digest.update(bitmask.value.to_le_bytes());
    }

    fn visit_struct(&mut self, value: &Struct) {
        self.tag(TypeTag::Struct);
        self.bytes(value.sig.name.as_bytes());
        for (name, member) in value.fields() {
            self.bytes(name.as_bytes());
            member.accept(self);
        }
    }

    fn visit_array(&mut self, values: &[Value]) {
        self.tag(TypeTag::Array);
        self.digest.update((values.len() as u64).to_le_bytes());
        for value in values {
            value.accept(self);
        }
    }

    fn visit_blob(&mut self, blob: &Blob) {
        self.tag(TypeTag::Blob);
        self.bytes(blob.data());
    }

    fn visit_pointer(&mut self, address: u64) {
        self.tag(TypeTag::Opaque);
        if !self.ignore_pointers {
            self.digest.update(address.to_le_bytes());
        }
    }
}
