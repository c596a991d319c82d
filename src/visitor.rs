//! Double dispatch over [`Value`] variants
//!
//! [`Value::accept`] calls the visitor method matching the concrete variant.
//! Every method has a default, and the defaults fall back to the value's
//! *family*: bitmasks and pointers are unsigned integers, floats are
//! doubles, and structs and arrays visit their children. A traversal only
//! overrides the families it cares about.
//!
//! # Example
//! ```
//! use calltrace::value::Value;
//! use calltrace::visitor::Visitor;
//!
//! #[derive(Default)]
//! struct SumUInts(u64);
//!
//! impl Visitor for SumUInts {
//!     fn visit_uint(&mut self, value: u64) {
//!         self.0 += value;
//!     }
//! }
//!
//! let tree = Value::Array(vec![Value::UInt(2), Value::Pointer(40)]);
//! let mut sum = SumUInts::default();
//! tree.accept(&mut sum);
//! assert_eq!(sum.0, 42);
//! ```

use crate::signature::EnumSig;
use crate::value::{Bitmask, Blob, Struct, Value};

pub trait Visitor {
    fn visit_null(&mut self) {}

    fn visit_bool(&mut self, _value: bool) {}

    fn visit_sint(&mut self, _value: i64) {}

    fn visit_uint(&mut self, _value: u64) {}

    fn visit_float(&mut self, value: f32) {
        self.visit_double(f64::from(value));
    }

    fn visit_double(&mut self, _value: f64) {}

    fn visit_string(&mut self, _value: &str) {}

    fn visit_enum(&mut self, _sig: &EnumSig) {}

    fn visit_bitmask(&mut self, bitmask: &Bitmask) {
        self.visit_uint(bitmask.value);
    }

    fn visit_struct(&mut self, value: &Struct) {
        for member in value.members() {
            member.accept(self);
        }
    }

    fn visit_array(&mut self, values: &[Value]) {
        for value in values {
            value.accept(self);
        }
    }

    fn visit_blob(&mut self, _blob: &Blob) {}

    fn visit_pointer(&mut self, address: u64) {
        self.visit_uint(address);
    }
}

impl Value {
    /// Dispatch to the `visitor` method for this variant
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Value::Null => visitor.visit_null(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::SInt(v) => visitor.visit_sint(*v),
            Value::UInt(v) => visitor.visit_uint(*v),
            Value::Float(v) => visitor.visit_float(*v),
            Value::Double(v) => visitor.visit_double(*v),
            Value::String(s) => visitor.visit_string(s),
            Value::Enum(sig) => visitor.visit_enum(sig),
            Value::Bitmask(mask) => visitor.visit_bitmask(mask),
            Value::Struct(s) => visitor.visit_struct(s),
            Value::Array(values) => visitor.visit_array(values),
            Value::Blob(blob) => visitor.visit_blob(blob),
            Value::Pointer(address) => visitor.visit_pointer(*address),
        }
    }
}
