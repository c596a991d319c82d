//! Interned call, struct, enum and bitmask signatures
//!
//! A signature describes the *shape* of something that appears many times in
//! a trace. It is written out in full the first time its id is used and by
//! bare id afterwards. Ids are scoped per [`SigKind`]: function 3 and struct 3
//! are unrelated.

use std::fmt;

/// Signature identifier, unique within its kind
pub type Id = u32;

/// The four signature namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigKind {
    Function,
    Struct,
    Enum,
    Bitmask,
}

impl fmt::Display for SigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SigKind::Function => "function",
            SigKind::Struct => "struct",
            SigKind::Enum => "enum",
            SigKind::Bitmask => "bitmask",
        };
        f.write_str(name)
    }
}

/// Common behaviour of every signature kind
pub trait Signature: fmt::Debug + PartialEq {
    /// Namespace the id lives in
    const KIND: SigKind;

    fn id(&self) -> Id;
}

/// Signature of a traced function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSig {
    pub id: Id,
    pub name: String,
    pub arg_names: Vec<String>,
}

impl FunctionSig {
    pub fn new<S: Into<String>>(id: Id, name: S, arg_names: &[&str]) -> Self {
        Self {
            id,
            name: name.into(),
            arg_names: arg_names.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn num_args(&self) -> usize {
        self.arg_names.len()
    }
}

impl Signature for FunctionSig {
    const KIND: SigKind = SigKind::Function;

    fn id(&self) -> Id {
        self.id
    }
}

/// Signature of a struct value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructSig {
    pub id: Id,
    pub name: String,
    pub member_names: Vec<String>,
}

impl StructSig {
    pub fn new<S: Into<String>>(id: Id, name: S, member_names: &[&str]) -> Self {
        Self {
            id,
            name: name.into(),
            member_names: member_names.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn num_members(&self) -> usize {
        self.member_names.len()
    }
}

impl Signature for StructSig {
    const KIND: SigKind = SigKind::Struct;

    fn id(&self) -> Id {
        self.id
    }
}

/// A single named enumerant
///
/// There is one `EnumSig` per distinct (name, value) pair seen in the trace,
/// not one per enumeration type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSig {
    pub id: Id,
    pub name: String,
    pub value: i64,
}

impl EnumSig {
    pub fn new<S: Into<String>>(id: Id, name: S, value: i64) -> Self {
        Self {
            id,
            name: name.into(),
            value,
        }
    }
}

impl Signature for EnumSig {
    const KIND: SigKind = SigKind::Enum;

    fn id(&self) -> Id {
        self.id
    }
}

/// One named flag of a bitmask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmaskFlag {
    pub name: String,
    pub value: u64,
}

/// Signature of a bitmask type: its named flags in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmaskSig {
    pub id: Id,
    pub flags: Vec<BitmaskFlag>,
}

impl BitmaskSig {
    pub fn new(id: Id, flags: &[(&str, u64)]) -> Self {
        Self {
            id,
            flags: flags
                .iter()
                .map(|(name, value)| BitmaskFlag {
                    name: name.to_string(),
                    value: *value,
                })
                .collect(),
        }
    }
}

impl Signature for BitmaskSig {
    const KIND: SigKind = SigKind::Bitmask;

    fn id(&self) -> Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_sig_arity() {
        let sig = FunctionSig::new(0, "glClear", &["mask"]);
        assert_eq!(sig.num_args(), 1);
        assert_eq!(sig.id(), 0);
        assert_eq!(FunctionSig::KIND, SigKind::Function);
    }

    #[test]
    fn test_enum_sigs_differ_by_value() {
        let a = EnumSig::new(1, "GL_TRIANGLES", 4);
        let b = EnumSig::new(1, "GL_TRIANGLES", 5);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sig_kind_display() {
        assert_eq!(SigKind::Bitmask.to_string(), "bitmask");
        assert_eq!(SigKind::Function.to_string(), "function");
    }
}
