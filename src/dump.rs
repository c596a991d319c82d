//! Canonical text rendering of calls and values
//!
//! `name(arg0 = v0, arg1 = v1) = ret` is the form every textual trace diff
//! works on, so the output here must stay stable.

use crate::call::Call;
use crate::signature::{BitmaskSig, EnumSig};
use crate::value::{Bitmask, Blob, Struct, Value};
use crate::visitor::Visitor;
use std::fmt::{self, Write as _};

const NORMAL: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const LITERAL: &str = "\x1b[32m";
const POINTER: &str = "\x1b[36m";

/// Renders values into a string buffer
pub struct Dumper<'a> {
    out: &'a mut String,
    color: bool,
}

impl<'a> Dumper<'a> {
    pub fn new(out: &'a mut String, color: bool) -> Self {
        Self { out, color }
    }

    fn styled(&mut self, style: &str, text: fmt::Arguments<'_>) {
        if self.color {
            self.out.push_str(style);
        }
        // Writing into a String cannot fail
        let _ = self.out.write_fmt(text);
        if self.color {
            self.out.push_str(NORMAL);
        }
    }

    fn literal(&mut self, text: fmt::Arguments<'_>) {
        self.styled(LITERAL, text);
    }

    /// Render a full call: `name(args) = ret`
    pub fn dump_call(&mut self, call: &Call) {
        self.styled(BOLD, format_args!("{}", call.name()));
        self.out.push('(');
        for (index, (name, value)) in call.named_args().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            self.styled(ITALIC, format_args!("{name}"));
            self.out.push_str(" = ");
            value.accept(self);
        }
        self.out.push(')');
        if let Some(ret) = &call.ret {
            self.out.push_str(" = ");
            ret.accept(self);
        }
    }

    fn dump_bitmask(&mut self, sig: &BitmaskSig, value: u64) {
        let mut remaining = value;
        let mut first = true;
        for flag in &sig.flags {
            let matches = if flag.value == 0 {
                value == 0
            } else {
                remaining & flag.value == flag.value
            };
            if matches {
                if !first {
                    self.out.push_str(" | ");
                }
                first = false;
                self.literal(format_args!("{}", flag.name));
                remaining &= !flag.value;
            }
        }
        if remaining != 0 || first {
            if !first {
                self.out.push_str(" | ");
            }
            if remaining == 0 {
                self.literal(format_args!("0"));
            } else {
                self.literal(format_args!("{remaining:#x}"));
            }
        }
    }

    fn dump_enum(&mut self, sig: &EnumSig) {
        if sig.name.is_empty() {
            self.literal(format_args!("{}", sig.value));
        } else {
            self.literal(format_args!("{}", sig.name));
        }
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('"');
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(escaped, "\\x{:02x}", c as u32);
            }
            c => escaped.push(c),
        }
    }
    escaped.push('"');
    escaped
}

impl Visitor for Dumper<'_> {
    fn visit_null(&mut self) {
        self.literal(format_args!("NULL"));
    }

    fn visit_bool(&mut self, value: bool) {
        self.literal(format_args!("{value}"));
    }

    fn visit_sint(&mut self, value: i64) {
        self.literal(format_args!("{value}"));
    }

    fn visit_uint(&mut self, value: u64) {
        self.literal(format_args!("{value}"));
    }

    fn visit_float(&mut self, value: f32) {
        self.literal(format_args!("{value}"));
    }

    fn visit_double(&mut self, value: f64) {
        self.literal(format_args!("{value}"));
    }

    fn visit_string(&mut self, value: &str) {
        let escaped = escape(value);
        self.literal(format_args!("{escaped}"));
    }

    fn visit_enum(&mut self, sig: &EnumSig) {
        self.dump_enum(sig);
    }

    fn visit_bitmask(&mut self, bitmask: &Bitmask) {
        self.dump_bitmask(&bitmask.sig, bitmask.value);
    }

    fn visit_struct(&mut self, value: &Struct) {
        self.out.push('{');
        for (index, (name, member)) in value.fields().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            self.styled(ITALIC, format_args!("{name}"));
            self.out.push_str(" = ");
            member.accept(self);
        }
        self.out.push('}');
    }

    fn visit_array(&mut self, values: &[Value]) {
        self.out.push('{');
        for (index, value) in values.iter().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            value.accept(self);
        }
        self.out.push('}');
    }

    fn visit_blob(&mut self, blob: &Blob) {
        self.styled(POINTER, format_args!("blob({})", blob.len()));
    }

    fn visit_pointer(&mut self, address: u64) {
        self.styled(POINTER, format_args!("{address:#x}"));
    }
}

impl Value {
    pub fn dump(&self, color: bool) -> String {
        let mut out = String::new();
        self.accept(&mut Dumper::new(&mut out, color));
        out
    }
}

impl Call {
    /// Canonical text form, optionally decorated with ANSI colors
    pub fn dump(&self, color: bool) -> String {
        let mut out = String::new();
        Dumper::new(&mut out, color).dump_call(self);
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump(false))
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump(false))
    }
}
