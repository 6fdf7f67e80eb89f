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
//! Typed fields & the sinks they are written to.
//!
//! # Introduction
//!
//! A [`Field`] is a key paired with a typed [`Value`]. Fields end up in one of two places in a
//! syslog message: fields *accumulated* on a [`SyslogEncoder`] describe the event itself and are
//! serialized into the MSG body, while *contextual* fields handed to
//! [`SyslogEncoder::encode_entry`] become PARAMs in the STRUCTURED-DATA element.
//!
//! [`SyslogEncoder`]: crate::encoder::SyslogEncoder
//! [`SyslogEncoder::encode_entry`]: crate::encoder::SyslogEncoder::encode_entry
//!
//! Both destinations implement [`ObjectEncoder`]: one method per kind of value. Structured values
//! are expressed through two capabilities, [`ObjectMarshaler`] & [`ArrayMarshaler`]: a type that
//! knows how to write itself into an object (resp. array) sink. Since the sinks they are handed
//! themselves accept nested marshalers, arbitrarily deep structures can be expressed.
//!
//! # Failure
//!
//! Marshalers return a [`Result`]. The sinks in this crate don't stop on failure: whatever the
//! marshaler managed to write stays in the output, siblings are still written, and the failures
//! are combined into a single [`Error::Multiple`](crate::error::Error::Multiple) that the encoder
//! returns alongside the message.

use crate::error::Result;

use chrono::prelude::*;

use std::{sync::Arc, time::Duration};

/// A sink for keyed values.
pub trait ObjectEncoder {
    fn add_string(&mut self, key: &str, value: &str);
    fn add_bool(&mut self, key: &str, value: bool);
    fn add_i64(&mut self, key: &str, value: i64);
    fn add_u64(&mut self, key: &str, value: u64);
    fn add_f64(&mut self, key: &str, value: f64);
    fn add_f32(&mut self, key: &str, value: f32);
    fn add_duration(&mut self, key: &str, value: Duration);
    fn add_time(&mut self, key: &str, value: DateTime<Utc>);
    fn add_binary(&mut self, key: &str, value: &[u8]);
    /// Add an error under `key`; its message (i.e. its [`Display`] form) is what gets written.
    ///
    /// [`Display`]: std::fmt::Display
    fn add_error(&mut self, key: &str, value: &dyn std::error::Error);
    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<()>;
    fn add_array(&mut self, key: &str, value: &dyn ArrayMarshaler) -> Result<()>;
    /// Nest all subsequently added fields under `key`, until the enclosing object is closed.
    fn open_namespace(&mut self, key: &str);

    fn add_i32(&mut self, key: &str, value: i32) {
        self.add_i64(key, value as i64)
    }
    fn add_i16(&mut self, key: &str, value: i16) {
        self.add_i64(key, value as i64)
    }
    fn add_i8(&mut self, key: &str, value: i8) {
        self.add_i64(key, value as i64)
    }
    fn add_u32(&mut self, key: &str, value: u32) {
        self.add_u64(key, value as u64)
    }
    fn add_u16(&mut self, key: &str, value: u16) {
        self.add_u64(key, value as u64)
    }
    fn add_u8(&mut self, key: &str, value: u8) {
        self.add_u64(key, value as u64)
    }
    fn add_usize(&mut self, key: &str, value: usize) {
        self.add_u64(key, value as u64)
    }
}

/// A sink for unkeyed values.
pub trait ArrayEncoder {
    fn append_string(&mut self, value: &str);
    fn append_bool(&mut self, value: bool);
    fn append_i64(&mut self, value: i64);
    fn append_u64(&mut self, value: u64);
    fn append_f64(&mut self, value: f64);
    fn append_f32(&mut self, value: f32);
    fn append_duration(&mut self, value: Duration);
    fn append_time(&mut self, value: DateTime<Utc>);
    fn append_binary(&mut self, value: &[u8]);
    fn append_object(&mut self, value: &dyn ObjectMarshaler) -> Result<()>;
    fn append_array(&mut self, value: &dyn ArrayMarshaler) -> Result<()>;

    fn append_i32(&mut self, value: i32) {
        self.append_i64(value as i64)
    }
    fn append_u32(&mut self, value: u32) {
        self.append_u64(value as u64)
    }
}

/// Something that can write itself into an object.
pub trait ObjectMarshaler: Send + Sync {
    fn marshal_object(&self, enc: &mut dyn ObjectEncoder) -> Result<()>;
}

/// Something that can write itself into an array.
pub trait ArrayMarshaler: Send + Sync {
    fn marshal_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()>;
}

/// Adapt a closure to [`ObjectMarshaler`].
///
/// ```
/// use rfc_5424_encoder::field::{Field, ObjectEncoder, ObjectMarshalerFn};
/// let point = Field::object("point", ObjectMarshalerFn(|enc: &mut dyn ObjectEncoder| {
///     enc.add_i64("x", 1);
///     enc.add_i64("y", 2);
///     Ok(())
/// }));
/// ```
pub struct ObjectMarshalerFn<F>(pub F);

impl<F> ObjectMarshaler for ObjectMarshalerFn<F>
where
    F: Fn(&mut dyn ObjectEncoder) -> Result<()> + Send + Sync,
{
    fn marshal_object(&self, enc: &mut dyn ObjectEncoder) -> Result<()> {
        (self.0)(enc)
    }
}

/// Adapt a closure to [`ArrayMarshaler`].
pub struct ArrayMarshalerFn<F>(pub F);

impl<F> ArrayMarshaler for ArrayMarshalerFn<F>
where
    F: Fn(&mut dyn ArrayEncoder) -> Result<()> + Send + Sync,
{
    fn marshal_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()> {
        (self.0)(enc)
    }
}

/// The payload of a [`Field`].
#[derive(Clone)]
pub enum Value {
    String(String),
    Bool(bool),
    I64(i64),
    I32(i32),
    I16(i16),
    I8(i8),
    U64(u64),
    U32(u32),
    U16(u16),
    U8(u8),
    Usize(usize),
    F64(f64),
    F32(f32),
    Duration(Duration),
    Time(DateTime<Utc>),
    Binary(Vec<u8>),
    /// An error, captured by its message
    Error(String),
    Object(Arc<dyn ObjectMarshaler>),
    Array(Arc<dyn ArrayMarshaler>),
    /// Marks the start of a namespace; the field's key names it
    Namespace,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::I64(n) => write!(f, "I64({})", n),
            Value::I32(n) => write!(f, "I32({})", n),
            Value::I16(n) => write!(f, "I16({})", n),
            Value::I8(n) => write!(f, "I8({})", n),
            Value::U64(n) => write!(f, "U64({})", n),
            Value::U32(n) => write!(f, "U32({})", n),
            Value::U16(n) => write!(f, "U16({})", n),
            Value::U8(n) => write!(f, "U8({})", n),
            Value::Usize(n) => write!(f, "Usize({})", n),
            Value::F64(x) => write!(f, "F64({})", x),
            Value::F32(x) => write!(f, "F32({})", x),
            Value::Duration(d) => write!(f, "Duration({:?})", d),
            Value::Time(t) => write!(f, "Time({})", t),
            Value::Binary(b) => write!(f, "Binary({} bytes)", b.len()),
            Value::Error(e) => write!(f, "Error({:?})", e),
            Value::Object(_) => write!(f, "Object(..)"),
            Value::Array(_) => write!(f, "Array(..)"),
            Value::Namespace => write!(f, "Namespace"),
        }
    }
}

/// A key & a typed value.
#[derive(Clone, Debug)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

impl Field {
    pub fn new<K: Into<String>>(key: K, value: Value) -> Field {
        Field {
            key: key.into(),
            value,
        }
    }
    pub fn string<K: Into<String>, V: Into<String>>(key: K, value: V) -> Field {
        Field::new(key, Value::String(value.into()))
    }
    pub fn bool<K: Into<String>>(key: K, value: bool) -> Field {
        Field::new(key, Value::Bool(value))
    }
    pub fn i64<K: Into<String>>(key: K, value: i64) -> Field {
        Field::new(key, Value::I64(value))
    }
    pub fn i32<K: Into<String>>(key: K, value: i32) -> Field {
        Field::new(key, Value::I32(value))
    }
    pub fn i16<K: Into<String>>(key: K, value: i16) -> Field {
        Field::new(key, Value::I16(value))
    }
    pub fn i8<K: Into<String>>(key: K, value: i8) -> Field {
        Field::new(key, Value::I8(value))
    }
    pub fn u64<K: Into<String>>(key: K, value: u64) -> Field {
        Field::new(key, Value::U64(value))
    }
    pub fn u32<K: Into<String>>(key: K, value: u32) -> Field {
        Field::new(key, Value::U32(value))
    }
    pub fn u16<K: Into<String>>(key: K, value: u16) -> Field {
        Field::new(key, Value::U16(value))
    }
    pub fn u8<K: Into<String>>(key: K, value: u8) -> Field {
        Field::new(key, Value::U8(value))
    }
    pub fn usize<K: Into<String>>(key: K, value: usize) -> Field {
        Field::new(key, Value::Usize(value))
    }
    pub fn f64<K: Into<String>>(key: K, value: f64) -> Field {
        Field::new(key, Value::F64(value))
    }
    pub fn f32<K: Into<String>>(key: K, value: f32) -> Field {
        Field::new(key, Value::F32(value))
    }
    pub fn duration<K: Into<String>>(key: K, value: Duration) -> Field {
        Field::new(key, Value::Duration(value))
    }
    pub fn time<K: Into<String>, Tz: TimeZone>(key: K, value: DateTime<Tz>) -> Field {
        Field::new(key, Value::Time(value.with_timezone(&Utc)))
    }
    pub fn binary<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V) -> Field {
        Field::new(key, Value::Binary(value.into()))
    }
    /// An error under the conventional key "error"
    pub fn error(err: &dyn std::error::Error) -> Field {
        Field::named_error("error", err)
    }
    pub fn named_error<K: Into<String>>(key: K, err: &dyn std::error::Error) -> Field {
        Field::new(key, Value::Error(err.to_string()))
    }
    pub fn object<K: Into<String>, M: ObjectMarshaler + 'static>(key: K, value: M) -> Field {
        Field::new(key, Value::Object(Arc::new(value)))
    }
    pub fn array<K: Into<String>, M: ArrayMarshaler + 'static>(key: K, value: M) -> Field {
        Field::new(key, Value::Array(Arc::new(value)))
    }
    pub fn namespace<K: Into<String>>(key: K) -> Field {
        Field::new(key, Value::Namespace)
    }

    /// Write this field into `enc`, returning the outcome of any nested marshaling.
    pub fn add_to(&self, enc: &mut dyn ObjectEncoder) -> Result<()> {
        let key = self.key.as_str();
        match &self.value {
            Value::String(s) => enc.add_string(key, s),
            Value::Bool(b) => enc.add_bool(key, *b),
            Value::I64(n) => enc.add_i64(key, *n),
            Value::I32(n) => enc.add_i32(key, *n),
            Value::I16(n) => enc.add_i16(key, *n),
            Value::I8(n) => enc.add_i8(key, *n),
            Value::U64(n) => enc.add_u64(key, *n),
            Value::U32(n) => enc.add_u32(key, *n),
            Value::U16(n) => enc.add_u16(key, *n),
            Value::U8(n) => enc.add_u8(key, *n),
            Value::Usize(n) => enc.add_usize(key, *n),
            Value::F64(x) => enc.add_f64(key, *x),
            Value::F32(x) => enc.add_f32(key, *x),
            Value::Duration(d) => enc.add_duration(key, *d),
            Value::Time(t) => enc.add_time(key, *t),
            Value::Binary(b) => enc.add_binary(key, b),
            Value::Error(msg) => enc.add_error(key, &ErrorMessage(msg)),
            Value::Object(m) => return enc.add_object(key, m.as_ref()),
            Value::Array(m) => return enc.add_array(key, m.as_ref()),
            Value::Namespace => enc.open_namespace(key),
        }
        Ok(())
    }
}

/// Lets a captured error message travel back through [`ObjectEncoder::add_error`].
#[derive(Debug)]
struct ErrorMessage<'a>(&'a str);

impl std::fmt::Display for ErrorMessage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for ErrorMessage<'_> {}

/// Fields can be appended to arrays, too: each becomes a single-key object.
impl ArrayMarshaler for Vec<Field> {
    fn marshal_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()> {
        let mut errs = None;
        for field in self.iter() {
            crate::error::record(
                &mut errs,
                enc.append_object(&ObjectMarshalerFn(|obj: &mut dyn ObjectEncoder| {
                    field.add_to(obj)
                })),
            );
        }
        errs.map_or(Ok(()), Err)
    }
}

/// A list of fields written into one object, in order.
impl ObjectMarshaler for Vec<Field> {
    fn marshal_object(&self, enc: &mut dyn ObjectEncoder) -> Result<()> {
        let mut errs = None;
        for field in self.iter() {
            crate::error::record(&mut errs, field.add_to(enc));
        }
        errs.map_or(Ok(()), Err)
    }
}
