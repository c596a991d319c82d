use super::varint;
use crate::call::{Call, CallFlags};
use crate::error::{Result, TraceError};
use crate::format::{CallDetail, Event, TypeTag, TRACE_VERSION};
use crate::registry::{Registered, SignatureRegistry};
use crate::signature::{BitmaskSig, EnumSig, FunctionSig, Id, SigKind, StructSig};
use crate::value::Value;
use std::io::{BufWriter, Write};

/// Encodes calls into the binary trace format
///
/// Signatures are written in full the first time their id is seen and by
/// bare id afterwards. Call numbers are assigned in ENTER order.
///
/// Capture sources that know the whole call up front use
/// [`Writer::write_call`]. Streaming sources drive the event API directly:
/// [`Writer::begin_enter`], any number of `write_arg`/`write_thread`,
/// [`Writer::end_enter`], then later [`Writer::begin_leave`], output args and
/// `write_ret`, and [`Writer::end_leave`].
///
/// Every public write is all or nothing. A failing call (a signature
/// conflict deep inside an argument, say) leaves no bytes in the stream and
/// no definitions in the registry, so the trace stays decodable. Only an I/O
/// error on the sink poisons the writer.
#[derive(Debug)]
pub struct Writer<W: Write> {
    out: BufWriter<W>,
    scratch: Vec<u8>,
    registry: SignatureRegistry,
    /// Signatures first defined by the write in progress
    defined: Vec<(SigKind, Id)>,
    next_call: u64,
    poisoned: bool,
}

impl<W: Write> Writer<W> {
    /// Start a trace at the current format version
    pub fn new(sink: W) -> Result<Self> {
        Self::with_version(sink, TRACE_VERSION)
    }

    /// Start a trace declaring an older `version`
    ///
    /// The byte layout is identical; only the replay semantics a reader
    /// applies differ.
    pub fn with_version(sink: W, version: u64) -> Result<Self> {
        if version > TRACE_VERSION {
            return Err(TraceError::UnsupportedVersion {
                found: version,
                supported: TRACE_VERSION,
            });
        }
        let mut writer = Self {
            out: BufWriter::new(sink),
            scratch: Vec::new(),
            registry: SignatureRegistry::new(),
            defined: Vec::new(),
            next_call: 0,
            poisoned: false,
        };
        writer.transaction(|w| w.put_uint(version))?;
        Ok(writer)
    }

    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    /// Flush buffered bytes and return the sink
    pub fn finish(self) -> Result<W> {
        if self.poisoned {
            return Err(TraceError::WriterPoisoned);
        }
        self.out
            .into_inner()
            .map_err(|err| TraceError::Io(err.into_error()))
    }

    /// Write a complete call (ENTER and LEAVE), returning its call number
    pub fn write_call(&mut self, call: &Call) -> Result<u32> {
        self.transaction(|w| {
            let no = w.put_enter(&call.sig, call.flags)?;
            if let Some(thread) = call.thread {
                w.put_thread(thread)?;
            }
            for (index, arg) in call.args().iter().enumerate() {
                w.put_arg(index, arg)?;
            }
            w.put_tag(CallDetail::End as u8)?;

            w.put_leave(no)?;
            if let Some(ret) = &call.ret {
                w.put_ret(ret)?;
            }
            w.put_tag(CallDetail::End as u8)?;
            Ok(no)
        })
    }

    pub fn begin_enter(&mut self, sig: &FunctionSig, flags: CallFlags) -> Result<u32> {
        self.transaction(|w| w.put_enter(sig, flags))
    }

    pub fn end_enter(&mut self) -> Result<()> {
        self.transaction(|w| w.put_tag(CallDetail::End as u8))
    }

    pub fn begin_leave(&mut self, no: u32) -> Result<()> {
        self.transaction(|w| w.put_leave(no))
    }

    pub fn end_leave(&mut self) -> Result<()> {
        self.transaction(|w| w.put_tag(CallDetail::End as u8))
    }

    pub fn write_arg(&mut self, index: usize, value: &Value) -> Result<()> {
        self.transaction(|w| w.put_arg(index, value))
    }

    pub fn write_ret(&mut self, value: &Value) -> Result<()> {
        self.transaction(|w| w.put_ret(value))
    }

    pub fn write_thread(&mut self, thread: u64) -> Result<()> {
        self.transaction(|w| w.put_thread(thread))
    }

    /// Write a bare value, as found after an ARG index or RET tag
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        self.transaction(|w| w.put_value(value))
    }

    /// Run `encode` against the scratch buffer, then commit its bytes to the
    /// sink on success or discard them and its new definitions on failure
    fn transaction<T>(&mut self, encode: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.poisoned {
            return Err(TraceError::WriterPoisoned);
        }
        let next_call = self.next_call;
        let mut result = encode(self);

        if result.is_ok() {
            if let Err(err) = self.out.write_all(&self.scratch) {
                // Part of the event may already be in the sink
                self.poisoned = true;
                result = Err(err.into());
            }
        } else {
            self.next_call = next_call;
            for (kind, id) in self.defined.iter().copied() {
                tracing::debug!(%kind, id, "rolled back signature definition");
                self.registry.forget(kind, id);
            }
        }
        self.scratch.clear();
        self.defined.clear();
        result
    }

    fn put_enter(&mut self, sig: &FunctionSig, flags: CallFlags) -> Result<u32> {
        let no = u32::try_from(self.next_call).map_err(|_| TraceError::CallNumbersExhausted)?;
        self.put_tag(Event::Enter as u8)?;
        self.put_function_sig(sig)?;
        self.put_uint(flags.bits())?;
        self.next_call += 1;
        Ok(no)
    }

    fn put_leave(&mut self, no: u32) -> Result<()> {
        self.put_tag(Event::Leave as u8)?;
        self.put_uint(u64::from(no))
    }

    fn put_arg(&mut self, index: usize, value: &Value) -> Result<()> {
        self.put_tag(CallDetail::Arg as u8)?;
        self.put_uint(index as u64)?;
        self.put_value(value)
    }

    fn put_ret(&mut self, value: &Value) -> Result<()> {
        self.put_tag(CallDetail::Ret as u8)?;
        self.put_value(value)
    }

    fn put_thread(&mut self, thread: u64) -> Result<()> {
        self.put_tag(CallDetail::Thread as u8)?;
        self.put_uint(thread)
    }

    fn put_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.put_tag(TypeTag::Null as u8),
            Value::Bool(false) => self.put_tag(TypeTag::False as u8),
            Value::Bool(true) => self.put_tag(TypeTag::True as u8),
            Value::SInt(v) => {
                self.put_tag(TypeTag::SInt as u8)?;
                self.put_uint(varint::zigzag(*v))
            }
            Value::UInt(v) => {
                self.put_tag(TypeTag::UInt as u8)?;
                self.put_uint(*v)
            }
            Value::Float(v) => {
                self.put_tag(TypeTag::Float as u8)?;
                self.put_raw(&v.to_le_bytes())
            }
            Value::Double(v) => {
                self.put_tag(TypeTag::Double as u8)?;
                self.put_raw(&v.to_le_bytes())
            }
            Value::String(s) => {
                self.put_tag(TypeTag::String as u8)?;
                self.put_bytes(s.as_bytes())
            }
            Value::Blob(blob) => {
                self.put_tag(TypeTag::Blob as u8)?;
                self.put_bytes(blob.data())
            }
            Value::Enum(sig) => {
                self.put_tag(TypeTag::Enum as u8)?;
                self.put_enum_sig(sig)
            }
            Value::Bitmask(mask) => {
                self.put_tag(TypeTag::Bitmask as u8)?;
                self.put_bitmask_sig(&mask.sig)?;
                self.put_uint(mask.value)
            }
            Value::Array(values) => {
                self.put_tag(TypeTag::Array as u8)?;
                self.put_uint(values.len() as u64)?;
                values.iter().try_for_each(|v| self.put_value(v))
            }
            Value::Struct(s) => {
                self.put_tag(TypeTag::Struct as u8)?;
                self.put_struct_sig(&s.sig)?;
                s.members().iter().try_for_each(|v| self.put_value(v))
            }
            Value::Pointer(address) => {
                self.put_tag(TypeTag::Opaque as u8)?;
                self.put_uint(*address)
            }
        }
    }

    /// Write a signature reference, returning true when the full definition
    /// must follow
    fn put_sig_ref<T: Registered + Clone>(&mut self, sig: &T) -> Result<bool> {
        let id = sig.id();
        let first_use = match self.registry.resolve::<T>(id) {
            Ok(existing) if *existing == *sig => false,
            Ok(_) => return Err(TraceError::SignatureConflict { kind: T::KIND, id }),
            Err(_) => {
                self.registry.define(sig.clone())?;
                self.defined.push((T::KIND, id));
                true
            }
        };
        self.put_uint((u64::from(id) << 1) | u64::from(first_use))?;
        Ok(first_use)
    }

    fn put_function_sig(&mut self, sig: &FunctionSig) -> Result<()> {
        if self.put_sig_ref(sig)? {
            self.put_bytes(sig.name.as_bytes())?;
            self.put_names(&sig.arg_names)?;
        }
        Ok(())
    }

    fn put_struct_sig(&mut self, sig: &StructSig) -> Result<()> {
        if self.put_sig_ref(sig)? {
            self.put_bytes(sig.name.as_bytes())?;
            self.put_names(&sig.member_names)?;
        }
        Ok(())
    }

    fn put_enum_sig(&mut self, sig: &EnumSig) -> Result<()> {
        if self.put_sig_ref(sig)? {
            self.put_bytes(sig.name.as_bytes())?;
            self.put_uint(varint::zigzag(sig.value))?;
        }
        Ok(())
    }

    fn put_bitmask_sig(&mut self, sig: &BitmaskSig) -> Result<()> {
        if self.put_sig_ref(sig)? {
            self.put_uint(sig.flags.len() as u64)?;
            for flag in &sig.flags {
                self.put_bytes(flag.name.as_bytes())?;
                self.put_uint(flag.value)?;
            }
        }
        Ok(())
    }

    fn put_names(&mut self, names: &[String]) -> Result<()> {
        self.put_uint(names.len() as u64)?;
        names
            .iter()
            .try_for_each(|name| self.put_bytes(name.as_bytes()))
    }

    fn put_tag(&mut self, tag: u8) -> Result<()> {
        self.put_raw(&[tag])
    }

    fn put_uint(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; varint::MAX_LEN];
        let len = varint::encode(value, &mut buf);
        self.put_raw(&buf[..len])
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_uint(bytes.len() as u64)?;
        self.put_raw(bytes)
    }

    fn put_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.scratch.extend_from_slice(bytes);
        Ok(())
    }
}
