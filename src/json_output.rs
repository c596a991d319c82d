//! JSON output format for decoded traces
//!
//! `calltrace dump --format json` implementation

use crate::call::Call;
use crate::signature::EnumSig;
use crate::value::{Bitmask, Blob, Struct, Value};
use crate::visitor::Visitor;
use serde::{Deserialize, Serialize};

/// A single named argument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonArg {
    pub name: String,
    pub value: serde_json::Value,
}

/// A single decoded call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonCall {
    /// Call number
    pub no: u32,
    /// Function name (e.g., "glClear")
    pub name: String,
    pub args: Vec<JsonArg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ret: Option<serde_json::Value>,
    /// Set flag names (e.g., ["trace", "retrace"])
    pub flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<u64>,
    /// SHA-256 content fingerprint (if --fingerprint enabled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Summary statistics for the trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    /// Calls decoded (before filtering)
    pub total_calls: u64,
    /// Calls written to the output
    pub shown_calls: u64,
}

/// Root JSON output structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Trace format version declared by the input
    pub version: u64,
    /// Format name
    pub format: String,
    pub calls: Vec<JsonCall>,
    pub summary: JsonSummary,
}

impl JsonOutput {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            format: "calltrace-json-v1".to_string(),
            calls: Vec::new(),
            summary: JsonSummary {
                total_calls: 0,
                shown_calls: 0,
            },
        }
    }

    pub fn add_call(&mut self, call: JsonCall) {
        self.summary.shown_calls += 1;
        self.calls.push(call);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl JsonCall {
    pub fn from_call(call: &Call) -> Self {
        let flags = [
            ("trace", call.flags.trace),
            ("retrace", call.flags.retrace),
            ("render", call.flags.render),
            ("swap_buffers", call.flags.swap_buffers),
            ("end_of_frame", call.flags.end_of_frame),
        ]
        .iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| name.to_string())
        .collect();

        Self {
            no: call.no,
            name: call.name().to_string(),
            args: call
                .named_args()
                .map(|(name, value)| JsonArg {
                    name: name.to_string(),
                    value: value_to_json(value),
                })
                .collect(),
            ret: call.ret.as_ref().map(value_to_json),
            flags,
            thread: call.thread,
            fingerprint: None,
        }
    }
}

/// Convert a value tree to JSON
///
/// Pointers become hex strings, blobs `{"blob": "<hex bytes>"}`, enums their
/// symbolic name and structs objects keyed by member name.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    let mut builder = JsonBuilder(serde_json::Value::Null);
    value.accept(&mut builder);
    builder.0
}

struct JsonBuilder(serde_json::Value);

impl Visitor for JsonBuilder {
    fn visit_null(&mut self) {
        self.0 = serde_json::Value::Null;
    }

    fn visit_bool(&mut self, value: bool) {
        self.0 = value.into();
    }

    fn visit_sint(&mut self, value: i64) {
        self.0 = value.into();
    }

    fn visit_uint(&mut self, value: u64) {
        self.0 = value.into();
    }

    fn visit_double(&mut self, value: f64) {
        // NaN and infinities have no JSON number form and become null
        self.0 = value.into();
    }

    fn visit_string(&mut self, value: &str) {
        self.0 = value.into();
    }

    fn visit_enum(&mut self, sig: &EnumSig) {
        self.0 = if sig.name.is_empty() {
            sig.value.into()
        } else {
            sig.name.as_str().into()
        };
    }

    fn visit_bitmask(&mut self, bitmask: &Bitmask) {
        self.0 = bitmask.value.into();
    }

    fn visit_struct(&mut self, value: &Struct) {
        let object = value
            .fields()
            .map(|(name, member)| (name.to_string(), value_to_json(member)))
            .collect();
        self.0 = serde_json::Value::Object(object);
    }

    fn visit_array(&mut self, values: &[Value]) {
        self.0 = serde_json::Value::Array(values.iter().map(value_to_json).collect());
    }

    fn visit_blob(&mut self, blob: &Blob) {
        self.0 = serde_json::json!({ "blob": hex::encode(blob.data()) });
    }

    fn visit_pointer(&mut self, address: u64) {
        self.0 = format!("{address:#x}").into();
    }
}
