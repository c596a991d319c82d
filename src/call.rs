//! Recorded calls: the unit of the trace stream

use crate::error::CallError;
use crate::signature::FunctionSig;
use crate::value::{Blob, Value};
use crate::visitor::Visitor;
use std::sync::Arc;

/// Behavioural flags attached to every call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallFlags {
    /// The traced program really issued this call.
    ///
    /// Unset for calls emitted only to give the replayer context it could not
    /// otherwise recover.
    pub trace: bool,

    /// The call should be replayed.
    ///
    /// Unset for calls that cannot be replayed safely or have no side effects.
    pub retrace: bool,

    /// The call draws into the current render target.
    pub render: bool,

    /// The call presents/swaps a target. Snapshots belong before it, not after.
    pub swap_buffers: bool,

    /// The call terminates a frame.
    pub end_of_frame: bool,
}

impl CallFlags {
    pub const TRACE: u64 = 1 << 0;
    pub const RETRACE: u64 = 1 << 1;
    pub const RENDER: u64 = 1 << 2;
    pub const SWAP_BUFFERS: u64 = 1 << 3;
    pub const END_OF_FRAME: u64 = 1 << 4;

    /// A call issued by the program and replayed as-is
    pub fn traced() -> Self {
        Self {
            trace: true,
            retrace: true,
            ..Self::none()
        }
    }

    fn none() -> Self {
        Self {
            trace: false,
            retrace: false,
            render: false,
            swap_buffers: false,
            end_of_frame: false,
        }
    }

    /// At least one of `trace`/`retrace` must be set
    pub fn is_valid(&self) -> bool {
        self.trace || self.retrace
    }

    pub fn bits(&self) -> u64 {
        let mut bits = 0;
        if self.trace {
            bits |= Self::TRACE;
        }
        if self.retrace {
            bits |= Self::RETRACE;
        }
        if self.render {
            bits |= Self::RENDER;
        }
        if self.swap_buffers {
            bits |= Self::SWAP_BUFFERS;
        }
        if self.end_of_frame {
            bits |= Self::END_OF_FRAME;
        }
        bits
    }

    /// Unknown bits are ignored
    pub fn from_bits(bits: u64) -> Self {
        Self {
            trace: bits & Self::TRACE != 0,
            retrace: bits & Self::RETRACE != 0,
            render: bits & Self::RENDER != 0,
            swap_buffers: bits & Self::SWAP_BUFFERS != 0,
            end_of_frame: bits & Self::END_OF_FRAME != 0,
        }
    }
}

impl Default for CallFlags {
    fn default() -> Self {
        Self::traced()
    }
}

/// One recorded invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Sequence number, increasing in ENTER order
    pub no: u32,
    pub sig: Arc<FunctionSig>,
    args: Vec<Value>,
    pub ret: Option<Value>,
    pub flags: CallFlags,
    /// Id of the thread that issued the call, when recorded
    pub thread: Option<u64>,
}

impl Call {
    /// Create a call with every argument set to `Null`
    pub fn new(no: u32, sig: Arc<FunctionSig>, flags: CallFlags) -> Result<Self, CallError> {
        if !flags.is_valid() {
            return Err(CallError::NeitherTracedNorRetraced(sig.name.clone()));
        }
        let args = vec![Value::Null; sig.num_args()];
        Ok(Self {
            no,
            sig,
            args,
            ret: None,
            flags,
            thread: None,
        })
    }

    /// Builder-style [`Call::set_arg`] for every argument in order
    pub fn with_args<I>(mut self, values: I) -> Result<Self, CallError>
    where
        I: IntoIterator<Item = Value>,
    {
        for (index, value) in values.into_iter().enumerate() {
            self.set_arg(index, value)?;
        }
        Ok(self)
    }

    pub fn with_ret(mut self, ret: Value) -> Self {
        self.ret = Some(ret);
        self
    }

    pub fn name(&self) -> &str {
        &self.sig.name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn arg_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.args.get_mut(index)
    }

    /// Argument values paired with their names
    pub fn named_args(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.sig
            .arg_names
            .iter()
            .map(String::as_str)
            .zip(self.args.iter())
    }

    pub fn set_arg(&mut self, index: usize, value: Value) -> Result<(), CallError> {
        let arity = self.args.len();
        match self.args.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CallError::ArgIndexOutOfRange {
                call: self.sig.name.clone(),
                index,
                arity,
            }),
        }
    }

    /// Whether any argument carries a non-null raw pointer into user memory
    pub fn has_user_pointer(&self) -> bool {
        let mut scan = MemoryScan::default();
        for arg in &self.args {
            arg.accept(&mut scan);
        }
        scan.pointers > 0
    }

    /// Whether any argument carries captured memory contents
    pub fn has_blob(&self) -> bool {
        let mut scan = MemoryScan::default();
        for arg in &self.args {
            arg.accept(&mut scan);
        }
        scan.blobs > 0
    }
}

#[derive(Default)]
struct MemoryScan {
    pointers: usize,
    blobs: usize,
}

impl Visitor for MemoryScan {
    fn visit_pointer(&mut self, address: u64) {
        if address != 0 {
            self.pointers += 1;
        }
    }

    fn visit_blob(&mut self, _blob: &Blob) {
        self.blobs += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_sig() -> Arc<FunctionSig> {
        Arc::new(FunctionSig::new(0, "clearBuffer", &["mask"]))
    }

    #[test]
    fn test_flags_require_trace_or_retrace() {
        let flags = CallFlags {
            trace: false,
            retrace: false,
            render: true,
            swap_buffers: false,
            end_of_frame: false,
        };
        let err = Call::new(0, clear_sig(), flags).unwrap_err();
        assert_eq!(
            err,
            CallError::NeitherTracedNorRetraced("clearBuffer".to_string())
        );
    }

    #[test]
    fn test_all_valid_flag_combinations_accepted() {
        for bits in 0..32u64 {
            let flags = CallFlags::from_bits(bits);
            let result = Call::new(0, clear_sig(), flags);
            assert_eq!(result.is_ok(), bits & 0b11 != 0, "bits {bits:#07b}");
        }
    }

    #[test]
    fn test_flag_bits_round_trip() {
        for bits in 0..32u64 {
            assert_eq!(CallFlags::from_bits(bits).bits(), bits);
        }
    }

    #[test]
    fn test_args_prefilled_with_null() {
        let call = Call::new(0, clear_sig(), CallFlags::default()).unwrap();
        assert_eq!(call.args().len(), 1);
        assert!(call.arg(0).unwrap().is_null());
        assert!(call.arg(1).is_none());
        assert!(call.ret.is_none());
    }

    #[test]
    fn test_set_arg_out_of_range() {
        let mut call = Call::new(0, clear_sig(), CallFlags::default()).unwrap();
        let err = call.set_arg(1, Value::UInt(1)).unwrap_err();
        assert!(matches!(
            err,
            CallError::ArgIndexOutOfRange {
                index: 1,
                arity: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_user_memory_scan() {
        let sig = Arc::new(FunctionSig::new(1, "vertexPointer", &["size", "pointer"]));
        let with_pointer = Call::new(0, Arc::clone(&sig), CallFlags::default())
            .unwrap()
            .with_args([Value::UInt(3), Value::Pointer(0x1000)])
            .unwrap();
        assert!(with_pointer.has_user_pointer());
        assert!(!with_pointer.has_blob());

        let with_null = Call::new(1, Arc::clone(&sig), CallFlags::default())
            .unwrap()
            .with_args([Value::UInt(3), Value::Pointer(0)])
            .unwrap();
        assert!(!with_null.has_user_pointer());

        let with_blob = Call::new(2, sig, CallFlags::default())
            .unwrap()
            .with_args([Value::UInt(3), Value::Blob(Blob::new(vec![0; 12]))])
            .unwrap();
        assert!(with_blob.has_blob());
        assert!(!with_blob.has_user_pointer());
    }
}
