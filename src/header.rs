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
//! The RFC [5424] HEADER
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424
//!
//! ```text
//! HEADER = PRI VERSION SP TIMESTAMP SP HOSTNAME SP APP-NAME SP PROCID SP MSGID
//! ```

use crate::{encoder::EncoderConfig, entry::Entry, facility::prival};

use bytes::BufMut;
use chrono::prelude::*;

/// The RFC 5424 NILVALUE
pub const NILVALUE: &str = "-";

/// RFC3339, UTC, microsecond precision: `2017-01-02T03:04:05.123456Z`. Sub-microsecond digits
/// are truncated, not rounded (RFC 5424 caps TIME-SECFRAC at six digits).
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn put_field(out: &mut Vec<u8>, value: &str) {
    out.put_slice(if value.is_empty() { NILVALUE } else { value }.as_bytes());
}

/// Write the HEADER for `entry` (without a trailing space).
///
/// The HOSTNAME, APP-NAME, PROCID & MSGID held by an [`EncoderConfig`] have already been
/// sanitized; any that are empty are written as the NILVALUE.
pub fn write_header(out: &mut Vec<u8>, config: &EncoderConfig, entry: &Entry) {
    out.put_u8(b'<');
    out.put_slice(
        prival(config.facility(), entry.level.severity())
            .to_string()
            .as_bytes(),
    );
    out.put_slice(b">1 ");
    out.put_slice(format_timestamp(&entry.time).as_bytes());
    out.put_u8(b' ');
    put_field(out, config.hostname());
    out.put_u8(b' ');
    put_field(out, config.appname());
    out.put_u8(b' ');
    put_field(out, config.procid());
    out.put_u8(b' ');
    put_field(out, config.msgid().unwrap_or(NILVALUE));
}
