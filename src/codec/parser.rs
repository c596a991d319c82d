use super::varint;
use crate::call::{Call, CallFlags};
use crate::error::{DecodeError, Result, TraceError};
use crate::format::{CallDetail, Event, TypeTag, VersionSemantics, TRACE_VERSION};
use crate::registry::SignatureRegistry;
use crate::signature::{BitmaskFlag, BitmaskSig, EnumSig, FunctionSig, Id, StructSig};
use crate::value::{Bitmask, Blob, Struct, Value};
use std::collections::BTreeMap;
use std::io::{self, BufReader, Read};
use std::sync::Arc;

/// Deepest array/struct nesting accepted before the stream is rejected
pub const MAX_NESTING: usize = 256;

/// Upper bound on elements preallocated from an untrusted length prefix
const PREALLOC_LIMIT: usize = 4096;

/// Decodes a binary trace into calls, in LEAVE order
///
/// The version header is read on construction and selects the
/// [`VersionSemantics`] applied to every decoded call. Any error poisons the
/// parser: the trace is unusable past the failure, so later calls to
/// [`Parser::parse_call`] return `Ok(None)`.
#[derive(Debug)]
pub struct Parser<R: Read> {
    input: BufReader<R>,
    registry: SignatureRegistry,
    semantics: VersionSemantics,
    pending: BTreeMap<u32, Call>,
    next_call: u64,
    poisoned: bool,
}

impl<R: Read> Parser<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut input = BufReader::new(reader);
        let version = varint::decode(&mut input)?;
        if version > TRACE_VERSION {
            return Err(TraceError::UnsupportedVersion {
                found: version,
                supported: TRACE_VERSION,
            });
        }
        tracing::debug!(version, "opened trace");

        Ok(Self {
            input,
            registry: SignatureRegistry::new(),
            semantics: VersionSemantics::new(version),
            pending: BTreeMap::new(),
            next_call: 0,
            poisoned: false,
        })
    }

    /// Version declared by the stream header
    pub fn version(&self) -> u64 {
        self.semantics.version()
    }

    pub fn semantics(&self) -> VersionSemantics {
        self.semantics
    }

    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> SignatureRegistry {
        self.registry
    }

    /// Decode the next complete call
    ///
    /// Returns `Ok(None)` at end of stream. Calls that were entered but never
    /// left are returned last, in call-number order.
    pub fn parse_call(&mut self) -> Result<Option<Call>> {
        if self.poisoned {
            return Ok(None);
        }
        let result = self.next_complete_call();
        if result.is_err() {
            self.poisoned = true;
            self.pending.clear();
        }
        result
    }

    fn next_complete_call(&mut self) -> Result<Option<Call>> {
        loop {
            let call = match self.read_event()? {
                Some(Event::Enter) => {
                    self.parse_enter()?;
                    continue;
                }
                Some(Event::Leave) => self.parse_leave()?,
                None => match self.pending.pop_first() {
                    Some((no, call)) => {
                        tracing::warn!(no, name = call.name(), "call entered but never left");
                        call
                    }
                    None => return Ok(None),
                },
            };
            if let Some(call) = self.apply_version_rules(call) {
                return Ok(Some(call));
            }
        }
    }

    /// Version 0 traces never recorded user memory, so calls handing raw
    /// pointers to the API cannot be replayed
    fn apply_version_rules(&self, mut call: Call) -> Option<Call> {
        if !self.semantics.describes_user_memory() && call.has_user_pointer() {
            call.flags.retrace = false;
            if !call.flags.is_valid() {
                tracing::debug!(no = call.no, name = call.name(), "dropping unreplayable fake call");
                return None;
            }
        }
        Some(call)
    }

    fn read_event(&mut self) -> Result<Option<Event>> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(Event::try_from(byte[0])?)),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn parse_enter(&mut self) -> Result<()> {
        let sig = self.parse_function_sig()?;
        let flags = CallFlags::from_bits(self.read_uint()?);
        let no = u32::try_from(self.next_call).map_err(|_| DecodeError::TooManyCalls)?;
        self.next_call += 1;

        let mut call = Call::new(no, sig, flags)?;
        self.parse_details(&mut call)?;
        self.pending.insert(no, call);
        Ok(())
    }

    fn parse_leave(&mut self) -> Result<Call> {
        let raw = self.read_uint()?;
        let mut call = u32::try_from(raw)
            .ok()
            .and_then(|no| self.pending.remove(&no))
            .ok_or(DecodeError::UnknownCall(raw))?;
        self.parse_details(&mut call)?;
        Ok(call)
    }

    fn parse_details(&mut self, call: &mut Call) -> Result<()> {
        loop {
            match CallDetail::try_from(self.read_byte()?)? {
                CallDetail::End => return Ok(()),
                CallDetail::Arg => {
                    let index = self.read_uint()?;
                    let value = self.parse_value(0)?;
                    let arity = call.args().len();
                    match usize::try_from(index).ok().filter(|i| *i < arity) {
                        Some(i) => call.set_arg(i, value)?,
                        None => {
                            return Err(DecodeError::ArgIndexOutOfRange {
                                call: call.name().to_string(),
                                index,
                                arity,
                            }
                            .into())
                        }
                    }
                }
                CallDetail::Ret => call.ret = Some(self.parse_value(0)?),
                CallDetail::Thread => call.thread = Some(self.read_uint()?),
            }
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_NESTING {
            return Err(DecodeError::NestingTooDeep(MAX_NESTING).into());
        }
        let value = match TypeTag::try_from(self.read_byte()?)? {
            TypeTag::Null => Value::Null,
            TypeTag::False => Value::Bool(false),
            TypeTag::True => Value::Bool(true),
            TypeTag::SInt => Value::SInt(varint::unzigzag(self.read_uint()?)),
            TypeTag::UInt => Value::UInt(self.read_uint()?),
            TypeTag::Float => {
                let mut buf = [0u8; 4];
                self.read_raw(&mut buf)?;
                Value::Float(f32::from_le_bytes(buf))
            }
            TypeTag::Double => {
                let mut buf = [0u8; 8];
                self.read_raw(&mut buf)?;
                Value::Double(f64::from_le_bytes(buf))
            }
            TypeTag::String => Value::String(self.read_string()?),
            TypeTag::Blob => Value::Blob(Blob::new(self.read_bytes()?)),
            TypeTag::Enum => Value::Enum(self.parse_enum_sig()?),
            TypeTag::Bitmask => {
                let sig = self.parse_bitmask_sig()?;
                let value = self.read_uint()?;
                Value::Bitmask(Bitmask { sig, value })
            }
            TypeTag::Array => {
                let len = self.read_len()?;
                let mut values = Vec::with_capacity(len.min(PREALLOC_LIMIT));
                for _ in 0..len {
                    values.push(self.parse_value(depth + 1)?);
                }
                Value::Array(values)
            }
            TypeTag::Struct => {
                let sig = self.parse_struct_sig()?;
                let mut members = Vec::with_capacity(sig.num_members());
                for _ in 0..sig.num_members() {
                    members.push(self.parse_value(depth + 1)?);
                }
                Value::Struct(Struct::new(sig, members)?)
            }
            TypeTag::Opaque => Value::Pointer(self.read_uint()?),
        };
        Ok(value)
    }

    fn read_sig_ref(&mut self) -> Result<(Id, bool)> {
        let raw = self.read_uint()?;
        let id = Id::try_from(raw >> 1).map_err(|_| DecodeError::IdOutOfRange(raw >> 1))?;
        Ok((id, raw & 1 == 1))
    }

    fn parse_function_sig(&mut self) -> Result<Arc<FunctionSig>> {
        let (id, defined) = self.read_sig_ref()?;
        if !defined {
            return self.registry.resolve(id);
        }
        let name = self.read_string()?;
        let arg_names = self.read_names()?;
        self.registry.define(FunctionSig { id, name, arg_names })
    }

    fn parse_struct_sig(&mut self) -> Result<Arc<StructSig>> {
        let (id, defined) = self.read_sig_ref()?;
        if !defined {
            return self.registry.resolve(id);
        }
        let name = self.read_string()?;
        let member_names = self.read_names()?;
        self.registry.define(StructSig {
            id,
            name,
            member_names,
        })
    }

    fn parse_enum_sig(&mut self) -> Result<Arc<EnumSig>> {
        let (id, defined) = self.read_sig_ref()?;
        if !defined {
            return self.registry.resolve(id);
        }
        let name = self.read_string()?;
        let value = varint::unzigzag(self.read_uint()?);
        self.registry.define(EnumSig { id, name, value })
    }

    fn parse_bitmask_sig(&mut self) -> Result<Arc<BitmaskSig>> {
        let (id, defined) = self.read_sig_ref()?;
        if !defined {
            return self.registry.resolve(id);
        }
        let count = self.read_len()?;
        let mut flags = Vec::with_capacity(count.min(PREALLOC_LIMIT));
        for _ in 0..count {
            let name = self.read_string()?;
            let value = self.read_uint()?;
            flags.push(BitmaskFlag { name, value });
        }
        self.registry.define(BitmaskSig { id, flags })
    }

    fn read_names(&mut self) -> Result<Vec<String>> {
        let count = self.read_len()?;
        let mut names = Vec::with_capacity(count.min(PREALLOC_LIMIT));
        for _ in 0..count {
            names.push(self.read_string()?);
        }
        Ok(names)
    }

    fn read_byte(&mut self) -> Result<u8> {
        varint::read_byte(&mut self.input)
    }

    fn read_uint(&mut self) -> Result<u64> {
        varint::decode(&mut self.input)
    }

    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_uint()?;
        usize::try_from(len).map_err(|_| DecodeError::LengthTooLarge(len).into())
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        self.input.read_exact(buf).map_err(varint::eof_aware)
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_uint()?;
        let mut bytes = Vec::new();
        let read = (&mut self.input).take(len).read_to_end(&mut bytes)?;
        if (read as u64) < len {
            return Err(DecodeError::UnexpectedEof.into());
        }
        Ok(bytes)
    }

    /// Strings are expected to be UTF-8; invalid sequences are replaced
    fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }
}

impl<R: Read> Iterator for Parser<R> {
    type Item = Result<Call>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parse_call().transpose()
    }
}
