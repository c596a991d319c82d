//! Per-session signature interning
//!
//! Every [`crate::codec::Writer`] and [`crate::codec::Parser`] owns one
//! `SignatureRegistry`. Nothing is global, so independent trace sessions
//! never see each other's ids.
//!
//! # Example
//! ```
//! use calltrace::registry::SignatureRegistry;
//! use calltrace::signature::StructSig;
//!
//! let mut registry = SignatureRegistry::new();
//! let point = registry.define(StructSig::new(0, "Point", &["x", "y"]))?;
//! assert_eq!(registry.resolve::<StructSig>(0)?.name, point.name);
//! # Ok::<(), calltrace::error::TraceError>(())
//! ```

use crate::error::{Result, TraceError};
use crate::signature::{BitmaskSig, EnumSig, FunctionSig, Id, SigKind, Signature, StructSig};
use std::collections::HashMap;
use std::sync::Arc;

/// Id → signature table for a single kind
#[derive(Debug)]
pub struct SigTable<T> {
    entries: HashMap<Id, Arc<T>>,
}

impl<T> Default for SigTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Signature> SigTable<T> {
    fn define(&mut self, sig: T) -> Result<Arc<T>> {
        let id = sig.id();
        if let Some(existing) = self.entries.get(&id) {
            if **existing != sig {
                return Err(TraceError::SignatureConflict { kind: T::KIND, id });
            }
            return Ok(Arc::clone(existing));
        }

        let kind = T::KIND;
        tracing::debug!(%kind, id, "defined signature");
        let sig = Arc::new(sig);
        self.entries.insert(id, Arc::clone(&sig));
        Ok(sig)
    }

    fn resolve(&self, id: Id) -> Result<Arc<T>> {
        self.entries
            .get(&id)
            .cloned()
            .ok_or(TraceError::UnknownSignature { kind: T::KIND, id })
    }

    fn remove(&mut self, id: Id) {
        self.entries.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Selects the table that stores a given signature kind
pub trait Registered: Signature + Sized {
    fn table(registry: &SignatureRegistry) -> &SigTable<Self>;
    fn table_mut(registry: &mut SignatureRegistry) -> &mut SigTable<Self>;
}

macro_rules! registered {
    ($ty:ty, $field:ident) => {
        impl Registered for $ty {
            fn table(registry: &SignatureRegistry) -> &SigTable<Self> {
                &registry.$field
            }

            fn table_mut(registry: &mut SignatureRegistry) -> &mut SigTable<Self> {
                &mut registry.$field
            }
        }
    };
}

registered!(FunctionSig, functions);
registered!(StructSig, structs);
registered!(EnumSig, enums);
registered!(BitmaskSig, bitmasks);

/// Interned signatures for one encoding or decoding session
///
/// The first definition of an id is canonical. Defining it again with an
/// identical shape returns the stored entry; any difference is a
/// [`TraceError::SignatureConflict`].
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    functions: SigTable<FunctionSig>,
    structs: SigTable<StructSig>,
    enums: SigTable<EnumSig>,
    bitmasks: SigTable<BitmaskSig>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sig`, or check it against the existing entry with its id
    pub fn define<T: Registered>(&mut self, sig: T) -> Result<Arc<T>> {
        T::table_mut(self).define(sig)
    }

    /// Look up a previously defined signature
    pub fn resolve<T: Registered>(&self, id: Id) -> Result<Arc<T>> {
        T::table(self).resolve(id)
    }

    /// Whether `id` has been defined for `kind`
    pub fn contains(&self, kind: SigKind, id: Id) -> bool {
        match kind {
            SigKind::Function => self.functions.entries.contains_key(&id),
            SigKind::Struct => self.structs.entries.contains_key(&id),
            SigKind::Enum => self.enums.entries.contains_key(&id),
            SigKind::Bitmask => self.bitmasks.entries.contains_key(&id),
        }
    }

    /// Drop a definition whose bytes never reached the stream
    pub(crate) fn forget(&mut self, kind: SigKind, id: Id) {
        match kind {
            SigKind::Function => self.functions.remove(id),
            SigKind::Struct => self.structs.remove(id),
            SigKind::Enum => self.enums.remove(id),
            SigKind::Bitmask => self.bitmasks.remove(id),
        }
    }

    /// Number of signatures defined for `kind`
    pub fn count(&self, kind: SigKind) -> usize {
        match kind {
            SigKind::Function => self.functions.len(),
            SigKind::Struct => self.structs.len(),
            SigKind::Enum => self.enums.len(),
            SigKind::Bitmask => self.bitmasks.len(),
        }
    }
}
