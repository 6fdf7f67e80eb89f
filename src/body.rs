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
//! Serializing the MSG part of a syslog message.
//!
//! # Introduction
//!
//! RFC 5424 places no constraint on MSG beyond "SHOULD be UTF-8", so what goes there is a matter
//! of taste. [`BodyWriter`] offers two: a single JSON object ([`BodyFormat::Json`]), or
//! space-separated `key=value` pairs ([`BodyFormat::KeyValue`], a.k.a. "logfmt").
//!
//! A [`BodyWriter`] is an [`ObjectEncoder`]; fields written to it are serialized immediately, so
//! that encoding a record later is just a matter of copying bytes. When a record is encoded,
//! [`BodyWriter::write_entry`] writes the [`Entry`]'s own attributes (time, level, logger name,
//! caller, message) followed by the accumulated fields, then the stack trace, if any.
//!
//! How the entry's attributes are written is governed by [`BodyConfig`]: the key under which each
//! appears (or `None` to leave it out), and how times, levels, durations & callers are rendered.
//!
//! Nested objects & arrays are always rendered as JSON, whatever the top-level format.

use crate::{
    entry::{Caller, Entry, Level},
    error::Result,
    field::{ArrayEncoder, ArrayMarshaler, ObjectEncoder, ObjectMarshaler},
};

use bytes::BufMut;
use chrono::prelude::*;

use std::{io::Write, time::Duration};

/// The overall shape of the MSG body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum BodyFormat {
    /// `{"level":"info","msg":"hi","k":1}`
    #[default]
    Json,
    /// `level=info msg=hi k=1`
    KeyValue,
}

/// How timestamps are rendered in the body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum TimeEncoding {
    /// Floating-point seconds since the Unix epoch
    #[default]
    Epoch,
    /// Floating-point milliseconds since the Unix epoch
    EpochMillis,
    /// Integral nanoseconds since the Unix epoch
    EpochNanos,
    /// ISO8601 with millisecond precision, e.g. `2017-01-02T03:04:05.123+0000`
    Iso8601,
    /// RFC3339 to the second, e.g. `2017-01-02T03:04:05Z`
    Rfc3339,
    /// RFC3339 to the nanosecond, e.g. `2017-01-02T03:04:05.123456789Z`
    Rfc3339Nano,
}

/// How levels are rendered in the body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LevelEncoding {
    /// `info`
    #[default]
    Lowercase,
    /// `INFO`
    Capital,
}

/// How durations are rendered in the body (and in structured data).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum DurationEncoding {
    /// Floating-point seconds
    #[default]
    Seconds,
    /// Floating-point milliseconds
    Millis,
    /// Integral nanoseconds
    Nanos,
    /// Human-readable, e.g. `1.5s`
    String,
}

/// How the caller's location is rendered in the body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum CallerEncoding {
    /// `pkg/file.rs:42`
    #[default]
    Short,
    /// The full path, e.g. `/home/me/pkg/file.rs:42`
    Full,
}

impl DurationEncoding {
    pub(crate) fn render(self, d: Duration) -> String {
        match self {
            DurationEncoding::Seconds => format!("{}", d.as_secs_f64()),
            DurationEncoding::Millis => format!("{}", d.as_secs_f64() * 1000.0),
            DurationEncoding::Nanos => format!("{}", d.as_nanos()),
            DurationEncoding::String => format!("{:?}", d),
        }
    }
}

impl CallerEncoding {
    fn render(self, caller: &Caller) -> String {
        match self {
            CallerEncoding::Short => caller.short(),
            CallerEncoding::Full => caller.full(),
        }
    }
}

impl LevelEncoding {
    fn render(self, level: Level) -> String {
        match self {
            LevelEncoding::Lowercase => level.as_str().to_string(),
            LevelEncoding::Capital => level.as_str().to_ascii_uppercase(),
        }
    }
}

/// Body layout: which entry attributes appear under which keys, and how values are rendered.
#[derive(Clone, Debug)]
pub struct BodyConfig {
    pub format: BodyFormat,
    pub time_key: Option<String>,
    pub level_key: Option<String>,
    pub name_key: Option<String>,
    pub caller_key: Option<String>,
    pub message_key: Option<String>,
    pub stacktrace_key: Option<String>,
    pub time_encoding: TimeEncoding,
    pub level_encoding: LevelEncoding,
    pub duration_encoding: DurationEncoding,
    pub caller_encoding: CallerEncoding,
}

impl std::default::Default for BodyConfig {
    fn default() -> Self {
        BodyConfig {
            format: BodyFormat::default(),
            time_key: Some("ts".to_string()),
            level_key: Some("level".to_string()),
            name_key: Some("logger".to_string()),
            caller_key: Some("caller".to_string()),
            message_key: Some("msg".to_string()),
            stacktrace_key: Some("stacktrace".to_string()),
            time_encoding: TimeEncoding::default(),
            level_encoding: LevelEncoding::default(),
            duration_encoding: DurationEncoding::default(),
            caller_encoding: CallerEncoding::default(),
        }
    }
}

/// Field sink producing a JSON or `key=value` MSG body.
#[derive(Clone, Debug)]
pub struct BodyWriter {
    format: BodyFormat,
    times: TimeEncoding,
    durations: DurationEncoding,
    buf: Vec<u8>,
    /// number of enclosing objects/arrays; zero at the top level
    depth: usize,
    /// JSON namespaces opened in the current object
    open_namespaces: usize,
    /// `key=value` namespaces, applied as key prefixes
    prefixes: Vec<String>,
}

impl BodyWriter {
    pub fn new(format: BodyFormat, times: TimeEncoding, durations: DurationEncoding) -> BodyWriter {
        BodyWriter {
            format,
            times,
            durations,
            buf: Vec::new(),
            depth: 0,
            open_namespaces: 0,
            prefixes: Vec::new(),
        }
    }
    pub fn with_config(config: &BodyConfig) -> BodyWriter {
        BodyWriter::new(
            config.format,
            config.time_encoding,
            config.duration_encoding,
        )
    }
    pub fn into_string(self) -> String {
        String::from_utf8(self.buf).unwrap_or_else(|err| {
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        })
    }

    /// Write the complete body for `entry` to `out`: the entry's attributes, every field
    /// accumulated on `self`, then the stack trace.
    pub fn write_entry(&self, config: &BodyConfig, entry: &Entry, out: &mut Vec<u8>) {
        let mut fin = BodyWriter::new(self.format, self.times, self.durations);
        if self.format == BodyFormat::Json {
            fin.buf.put_u8(b'{');
        }
        if let Some(key) = &config.time_key {
            fin.add_time(key, entry.time);
        }
        if let Some(key) = &config.level_key {
            fin.add_string(key, &config.level_encoding.render(entry.level));
        }
        if let (Some(key), Some(name)) = (&config.name_key, &entry.logger_name) {
            fin.add_string(key, name);
        }
        if let (Some(key), Some(caller)) = (&config.caller_key, &entry.caller) {
            fin.add_string(key, &config.caller_encoding.render(caller));
        }
        if let Some(key) = &config.message_key {
            fin.add_string(key, &entry.message);
        }
        if !self.buf.is_empty() {
            fin.separate();
            fin.buf.put_slice(&self.buf);
        }
        fin.open_namespaces = self.open_namespaces;
        fin.close_namespaces();
        if let (Some(key), Some(stack)) = (&config.stacktrace_key, &entry.stack) {
            fin.add_string(key, stack);
        }
        if self.format == BodyFormat::Json {
            fin.buf.put_u8(b'}');
        }
        out.put_slice(&fin.buf);
    }

    fn top_level_kv(&self) -> bool {
        self.depth == 0 && self.format == BodyFormat::KeyValue
    }

    fn separate(&mut self) {
        let last = match self.buf.last() {
            Some(last) => *last,
            None => return,
        };
        if self.top_level_kv() {
            self.buf.put_u8(b' ');
        } else if !matches!(last, b'{' | b'[' | b':' | b',' | b'=') {
            self.buf.put_u8(b',');
        }
    }

    fn add_key(&mut self, key: &str) {
        self.separate();
        if self.top_level_kv() {
            let mut name = String::new();
            for prefix in &self.prefixes {
                name.push_str(prefix);
                name.push('.');
            }
            name.push_str(key);
            self.write_str_value(&name);
            self.buf.put_u8(b'=');
        } else {
            self.write_json_str(key);
            self.buf.put_u8(b':');
        }
    }

    fn write_json_str(&mut self, s: &str) {
        // serializing a `str` into a `Vec` can't fail
        let _ = serde_json::to_writer(&mut self.buf, s);
    }

    fn write_display(&mut self, v: impl std::fmt::Display) {
        let _ = write!(self.buf, "{}", v);
    }

    fn write_str_value(&mut self, s: &str) {
        if self.top_level_kv() && !needs_quotes(s) {
            self.buf.put_slice(s.as_bytes());
        } else {
            self.write_json_str(s);
        }
    }

    /// Non-finite floats have no JSON representation, so they're written as strings.
    fn write_non_finite(&mut self, text: &str) {
        if self.top_level_kv() {
            self.buf.put_slice(text.as_bytes());
        } else {
            self.write_json_str(text);
        }
    }

    fn write_f64(&mut self, x: f64) {
        if x.is_nan() {
            self.write_non_finite("NaN")
        } else if x.is_infinite() {
            self.write_non_finite(if x > 0.0 { "+Inf" } else { "-Inf" })
        } else {
            self.write_display(x)
        }
    }

    fn write_f32(&mut self, x: f32) {
        if x.is_finite() {
            self.write_display(x)
        } else {
            self.write_f64(x as f64)
        }
    }

    fn write_duration(&mut self, d: Duration) {
        match self.durations {
            DurationEncoding::Seconds => self.write_f64(d.as_secs_f64()),
            DurationEncoding::Millis => self.write_f64(d.as_secs_f64() * 1000.0),
            DurationEncoding::Nanos => self.write_display(d.as_nanos()),
            DurationEncoding::String => self.write_str_value(&format!("{:?}", d)),
        }
    }

    fn write_time(&mut self, t: DateTime<Utc>) {
        match self.times {
            TimeEncoding::Epoch => {
                self.write_f64(t.timestamp() as f64 + t.timestamp_subsec_nanos() as f64 / 1e9)
            }
            TimeEncoding::EpochMillis => self.write_f64(epoch_nanos(t) as f64 / 1e6),
            TimeEncoding::EpochNanos => self.write_display(epoch_nanos(t)),
            TimeEncoding::Iso8601 => {
                self.write_str_value(&t.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string())
            }
            TimeEncoding::Rfc3339 => {
                self.write_str_value(&t.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            TimeEncoding::Rfc3339Nano => {
                self.write_str_value(&t.to_rfc3339_opts(SecondsFormat::Nanos, true))
            }
        }
    }

    fn write_binary(&mut self, bytes: &[u8]) {
        self.write_str_value(&hex::encode(bytes));
    }

    fn write_object(&mut self, value: &dyn ObjectMarshaler) -> Result<()> {
        self.buf.put_u8(b'{');
        self.depth += 1;
        let outer = std::mem::replace(&mut self.open_namespaces, 0);
        let res = value.marshal_object(self);
        self.close_namespaces();
        self.open_namespaces = outer;
        self.depth -= 1;
        self.buf.put_u8(b'}');
        res
    }

    fn write_array(&mut self, value: &dyn ArrayMarshaler) -> Result<()> {
        self.buf.put_u8(b'[');
        self.depth += 1;
        let res = value.marshal_array(self);
        self.depth -= 1;
        self.buf.put_u8(b']');
        res
    }

    fn close_namespaces(&mut self) {
        for _ in 0..self.open_namespaces {
            self.buf.put_u8(b'}');
        }
        self.open_namespaces = 0;
    }
}

fn epoch_nanos(t: DateTime<Utc>) -> i128 {
    t.timestamp() as i128 * 1_000_000_000 + t.timestamp_subsec_nanos() as i128
}

/// Bare `key=value` values may not contain anything that would confuse a logfmt parser.
fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s
            .bytes()
            .any(|b| b <= b' ' || b == b'=' || b == b'"' || b == b'\\' || b == 0x7f)
}

impl ObjectEncoder for BodyWriter {
    fn add_string(&mut self, key: &str, value: &str) {
        self.add_key(key);
        self.write_str_value(value);
    }
    fn add_bool(&mut self, key: &str, value: bool) {
        self.add_key(key);
        self.write_display(value);
    }
    fn add_i64(&mut self, key: &str, value: i64) {
        self.add_key(key);
        self.write_display(value);
    }
    fn add_u64(&mut self, key: &str, value: u64) {
        self.add_key(key);
        self.write_display(value);
    }
    fn add_f64(&mut self, key: &str, value: f64) {
        self.add_key(key);
        self.write_f64(value);
    }
    fn add_f32(&mut self, key: &str, value: f32) {
        self.add_key(key);
        self.write_f32(value);
    }
    fn add_duration(&mut self, key: &str, value: Duration) {
        self.add_key(key);
        self.write_duration(value);
    }
    fn add_time(&mut self, key: &str, value: DateTime<Utc>) {
        self.add_key(key);
        self.write_time(value);
    }
    fn add_binary(&mut self, key: &str, value: &[u8]) {
        self.add_key(key);
        self.write_binary(value);
    }
    fn add_error(&mut self, key: &str, value: &dyn std::error::Error) {
        self.add_key(key);
        self.write_str_value(&value.to_string());
    }
    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<()> {
        self.add_key(key);
        self.write_object(value)
    }
    fn add_array(&mut self, key: &str, value: &dyn ArrayMarshaler) -> Result<()> {
        self.add_key(key);
        self.write_array(value)
    }
    fn open_namespace(&mut self, key: &str) {
        if self.top_level_kv() {
            self.prefixes.push(key.to_string());
        } else {
            self.add_key(key);
            self.buf.put_u8(b'{');
            self.open_namespaces += 1;
        }
    }
}

impl ArrayEncoder for BodyWriter {
    fn append_string(&mut self, value: &str) {
        self.separate();
        self.write_str_value(value);
    }
    fn append_bool(&mut self, value: bool) {
        self.separate();
        self.write_display(value);
    }
    fn append_i64(&mut self, value: i64) {
        self.separate();
        self.write_display(value);
    }
    fn append_u64(&mut self, value: u64) {
        self.separate();
        self.write_display(value);
    }
    fn append_f64(&mut self, value: f64) {
        self.separate();
        self.write_f64(value);
    }
    fn append_f32(&mut self, value: f32) {
        self.separate();
        self.write_f32(value);
    }
    fn append_duration(&mut self, value: Duration) {
        self.separate();
        self.write_duration(value);
    }
    fn append_time(&mut self, value: DateTime<Utc>) {
        self.separate();
        self.write_time(value);
    }
    fn append_binary(&mut self, value: &[u8]) {
        self.separate();
        self.write_binary(value);
    }
    fn append_object(&mut self, value: &dyn ObjectMarshaler) -> Result<()> {
        self.separate();
        self.write_object(value)
    }
    fn append_array(&mut self, value: &dyn ArrayMarshaler) -> Result<()> {
        self.separate();
        self.write_array(value)
    }
}

/// Render a nested value as compact JSON text, as used for structured-data PARAM-VALUEs.
pub(crate) fn object_to_json(
    value: &dyn ObjectMarshaler,
    durations: DurationEncoding,
) -> (String, Result<()>) {
    let mut w = BodyWriter::new(BodyFormat::Json, TimeEncoding::Rfc3339Nano, durations);
    let res = w.append_object(value);
    (w.into_string(), res)
}

pub(crate) fn array_to_json(
    value: &dyn ArrayMarshaler,
    durations: DurationEncoding,
) -> (String, Result<()>) {
    let mut w = BodyWriter::new(BodyFormat::Json, TimeEncoding::Rfc3339Nano, durations);
    let res = w.append_array(value);
    (w.into_string(), res)
}
