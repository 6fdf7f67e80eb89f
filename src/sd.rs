// Copyright (C) 2022 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of rfc-5424-encoder.
//
// rfc-5424-encoder is free software: you can redistribute it and/or modify it under the terms of
// the GNU General Public License as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// rfc-5424-encoder is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See
// the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with rfc-5424-encoder.
// If not, see <http://www.gnu.org/licenses/>.
//! RFC [5424] STRUCTURED-DATA
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424
//!
//! Contextual fields are rendered as a single SD-ELEMENT whose SD-ID is `<app-name>@<enterprise
//! ID>`; each field becomes one PARAM:
//!
//! ```text
//! [encoder_test@112 a-str="pebcak" i64="42" b="true"]
//! ```
//!
//! No fields at all yields the NILVALUE, `-`.
//!
//! PARAM-NAMEs are run through [`sanitize_param_name`], so a key containing `=`, space, `]`, `"`
//! or a non-printable byte has those bytes replaced with `_`. Names are never shortened: two
//! distinct keys always yield two distinct PARAM-NAMEs, even where that means exceeding the 32
//! bytes RFC 5424 allows an SD-NAME. PARAM-VALUEs may hold any UTF-8, but `"`, `\` & `]` must be
//! escaped with a backslash (section 6.3.3).

use crate::{
    body::{array_to_json, object_to_json, DurationEncoding},
    error::{record, Error, Result},
    field::{ArrayMarshaler, Field, ObjectEncoder, ObjectMarshaler},
    sanitize::{sanitize_param_name, sanitize_sd_name, SD_NAME_MAX},
};

use bytes::BufMut;
use chrono::prelude::*;

use std::time::Duration;

/// Form the SD-ID for our single SD-ELEMENT from the application name & enterprise ID.
///
/// The whole SD-ID must fit in an SD-NAME (32 bytes), so the name part is cut to make room for
/// `@<enterprise ID>`.
pub fn sd_id(appname: &str, enterprise_id: u32) -> String {
    let suffix = format!("@{}", enterprise_id);
    let name = sanitize_sd_name(appname, SD_NAME_MAX.saturating_sub(suffix.len()));
    let name = if name.is_empty() { "-".to_string() } else { name };
    format!("{}{}", name, suffix)
}

/// Escape `"`, `\` & `]` in a PARAM-VALUE.
pub fn escape_param_value(value: &str, out: &mut Vec<u8>) {
    for b in value.bytes() {
        if matches!(b, b'"' | b'\\' | b']') {
            out.put_u8(b'\\');
        }
        out.put_u8(b);
    }
}

/// Undo [`escape_param_value`]: a backslash removes the special meaning of a following `"`, `\`
/// or `]`; any other backslash is kept as-is.
pub fn unescape_param_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '"' | '\\' | ']') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Render `fields` into `out` as a single SD-ELEMENT (or `-`), returning any failures from
/// nested marshalers. A failed marshaler still produces a PARAM, holding whatever it wrote.
pub fn write_structured_data(
    out: &mut Vec<u8>,
    sd_id: &str,
    fields: &[Field],
    durations: DurationEncoding,
) -> Option<Error> {
    if fields.is_empty() {
        out.put_u8(b'-');
        return None;
    }

    out.put_u8(b'[');
    out.put_slice(sd_id.as_bytes());
    let mut params = ParamWriter {
        out,
        durations,
        prefixes: Vec::new(),
        errors: None,
    };
    for field in fields {
        let res = field.add_to(&mut params);
        record(&mut params.errors, res);
    }
    let errors = params.errors.take();
    out.put_u8(b']');
    errors
}

/// [`ObjectEncoder`] writing ` name="value"` PARAMs.
struct ParamWriter<'a> {
    out: &'a mut Vec<u8>,
    durations: DurationEncoding,
    prefixes: Vec<String>,
    errors: Option<Error>,
}

impl ParamWriter<'_> {
    fn param(&mut self, key: &str, value: &str) {
        let mut name = String::new();
        for prefix in &self.prefixes {
            name.push_str(prefix);
            name.push('.');
        }
        name.push_str(key);

        let name = sanitize_param_name(&name);
        self.out.put_u8(b' ');
        // PARAM-NAME may not be empty
        self.out
            .put_slice(if name.is_empty() { "_" } else { name.as_str() }.as_bytes());
        self.out.put_slice(b"=\"");
        escape_param_value(value, self.out);
        self.out.put_u8(b'"');
    }
    fn float(&mut self, key: &str, x: f64, text: String) {
        if x.is_nan() {
            self.param(key, "NaN")
        } else if x.is_infinite() {
            self.param(key, if x > 0.0 { "+Inf" } else { "-Inf" })
        } else {
            self.param(key, &text)
        }
    }
}

impl ObjectEncoder for ParamWriter<'_> {
    fn add_string(&mut self, key: &str, value: &str) {
        self.param(key, value)
    }
    fn add_bool(&mut self, key: &str, value: bool) {
        self.param(key, if value { "true" } else { "false" })
    }
    fn add_i64(&mut self, key: &str, value: i64) {
        self.param(key, &value.to_string())
    }
    fn add_u64(&mut self, key: &str, value: u64) {
        self.param(key, &value.to_string())
    }
    fn add_f64(&mut self, key: &str, value: f64) {
        self.float(key, value, value.to_string())
    }
    fn add_f32(&mut self, key: &str, value: f32) {
        self.float(key, value as f64, value.to_string())
    }
    fn add_duration(&mut self, key: &str, value: Duration) {
        let text = self.durations.render(value);
        self.param(key, &text)
    }
    fn add_time(&mut self, key: &str, value: DateTime<Utc>) {
        self.param(key, &value.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }
    fn add_binary(&mut self, key: &str, value: &[u8]) {
        self.param(key, &hex::encode(value))
    }
    fn add_error(&mut self, key: &str, value: &dyn std::error::Error) {
        self.param(key, &value.to_string())
    }
    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<()> {
        let (text, res) = object_to_json(value, self.durations);
        self.param(key, &text);
        res
    }
    fn add_array(&mut self, key: &str, value: &dyn ArrayMarshaler) -> Result<()> {
        let (text, res) = array_to_json(value, self.durations);
        self.param(key, &text);
        res
    }
    fn open_namespace(&mut self, key: &str) {
        self.prefixes.push(key.to_string());
    }
}
