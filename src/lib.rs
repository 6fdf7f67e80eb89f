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
//! Encode structured log records as RFC [5424] [`syslog`] messages
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424
//! [`syslog`]: https://en.wikipedia.org/wiki/Syslog
//!
//! # Introduction
//!
//! Structured logging libraries deal in *records*: a time, a level, a message, and any number of
//! typed key/value pairs. RFC 5424 has room for all of that, but makes the caller work for it:
//! the header fields are restricted to printable ASCII & capped in length, key/value pairs belong
//! in STRUCTURED-DATA with its own naming & escaping rules, and on a stream transport each message
//! has to be framed as per RFC [6587].
//!
//! [6587]: https://datatracker.ietf.org/doc/html/rfc6587
//!
//! This crate does that work. A [`SyslogEncoder`] turns an [`Entry`] plus a list of contextual
//! [`Field`]s into a single, framed message:
//!
//! ```text
//! <PRIVAL>1 TIMESTAMP HOSTNAME APP-NAME PROCID MSGID [app@eid k="v" ...] BOM MSG
//! ```
//!
//! where MSG is the record itself (time, level, logger, caller, message & any fields accumulated
//! on the encoder) rendered as JSON or as `key=value` pairs.
//!
//! [`SyslogEncoder`]: encoder::SyslogEncoder
//! [`Entry`]: entry::Entry
//! [`Field`]: field::Field
//!
//! # Usage
//!
//! ```rust
//! use rfc_5424_encoder::{encoder::{EncoderConfig, SyslogEncoder}, entry::{Entry, Level},
//!                        facility::Facility, field::Field, framing::Framing};
//! use std::sync::Arc;
//!
//! let config = EncoderConfig::builder()
//!     .facility(Facility::LOG_LOCAL0)
//!     .appname("my-daemon")
//!     .framing(Framing::OctetCounting)
//!     .build()
//!     .unwrap();
//! let encoder = SyslogEncoder::new(Arc::new(config));
//! let (msg, err) = encoder.encode_entry(&Entry::now(Level::Warn, "disk almost full"),
//!                                       &[Field::u64("free", 1024)]);
//! assert!(err.is_none());
//! // `msg` is ready to be written to a socket; dropping it returns its allocation to the pool
//! ```
//!
//! The encoder does no I/O. For [`tracing`] users, [`layer::Layer`] wraps an encoder in a
//! [`tracing-subscriber`] `Layer` that writes each event to any [`MakeWriter`].
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`MakeWriter`]: tracing_subscriber::fmt::MakeWriter

pub mod body;
pub mod encoder;
pub mod entry;
pub mod error;
pub mod facility;
pub mod field;
pub mod framing;
pub mod header;
pub mod layer;
pub mod pool;
pub mod sanitize;
pub mod sd;
