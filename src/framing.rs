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
//! Message framing for stream transports.
//!
//! RFC [6587] describes the two ways syslog messages are delimited on a byte stream:
//! "non-transparent framing" (a trailer, here a line feed, after each message) and "octet
//! counting" (each message prefixed with its length in bytes and a space). The former is what
//! most daemons expect on TCP; the latter is the only one that survives a message containing a
//! line feed.
//!
//! [6587]: https://datatracker.ietf.org/doc/html/rfc6587

use crate::error::Error;

use backtrace::Backtrace;
use bytes::BufMut;

type StdResult<T, E> = std::result::Result<T, E>;

/// How each encoded message is delimited.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Framing {
    /// Terminate each message with `\n`
    #[default]
    NonTransparent,
    /// Prefix each message with `<length> `
    OctetCounting,
}

impl Framing {
    /// Frame the record occupying `buf[start..]`, in place.
    pub fn frame(self, buf: &mut Vec<u8>, start: usize) {
        match self {
            Framing::NonTransparent => buf.put_u8(b'\n'),
            Framing::OctetCounting => {
                let prefix = format!("{} ", buf.len() - start);
                drop(buf.splice(start..start, prefix.into_bytes()));
            }
        }
    }
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Framing::NonTransparent => "non-transparent",
                Framing::OctetCounting => "octet-counting",
            }
        )
    }
}

impl std::str::FromStr for Framing {
    type Err = Error;
    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "non-transparent" | "non_transparent" | "newline" => Ok(Framing::NonTransparent),
            "octet-counting" | "octet_counting" | "octet-counted" => Ok(Framing::OctetCounting),
            _ => Err(Error::BadFraming {
                name: s.to_string(),
                back: Backtrace::new(),
            }),
        }
    }
}
