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
//! Coercing text into RFC [5424] header fields.
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424
//!
//! The HOSTNAME, APP-NAME, PROCID & MSGID header fields, along with SD-NAMEs, are all restricted
//! to PRINTUSASCII (octets 33 through 126) and have a maximum length. Rather than rejecting
//! non-conforming input, we replace every offending *byte* with `_` and truncate. Note that this
//! is byte-wise: a character that takes three bytes in UTF-8 becomes three underscores.

/// Maximum length of the HOSTNAME field
pub const HOSTNAME_MAX: usize = 255;
/// Maximum length of the APP-NAME field
pub const APP_NAME_MAX: usize = 48;
/// Maximum length of the PROCID field
pub const PROCID_MAX: usize = 128;
/// Maximum length of the MSGID field
pub const MSGID_MAX: usize = 32;
/// Maximum length of an SD-NAME (the name part of an SD-ID, or a PARAM-NAME)
pub const SD_NAME_MAX: usize = 32;

const REPLACEMENT: u8 = b'_';

fn is_print_us_ascii(b: u8) -> bool {
    (33..=126).contains(&b)
}

fn sanitize_with(input: &str, max_len: usize, valid: impl Fn(u8) -> bool) -> String {
    let bytes: Vec<u8> = input
        .bytes()
        .take(max_len)
        .map(|b| if valid(b) { b } else { REPLACEMENT })
        .collect();
    // every byte is ASCII by now
    String::from_utf8(bytes).unwrap_or_default()
}

/// Replace every byte of `input` outside of [33, 126] with `_`, and truncate the result to
/// `max_len` bytes.
///
/// ```
/// use rfc_5424_encoder::sanitize::sanitize;
/// assert_eq!(sanitize(" abc ", 48), "_abc_");
/// assert_eq!(sanitize("hello", 3), "hel");
/// ```
pub fn sanitize(input: &str, max_len: usize) -> String {
    sanitize_with(input, max_len, is_print_us_ascii)
}

/// Like [`sanitize`], but additionally replaces the four characters an SD-NAME may not contain:
/// `=`, `]`, `"` & `@`.
pub fn sanitize_sd_name(input: &str, max_len: usize) -> String {
    sanitize_with(input, max_len, |b| {
        is_print_us_ascii(b) && !matches!(b, b'=' | b']' | b'"' | b'@')
    })
}

/// Make `input` usable as a PARAM-NAME: every byte outside of [33, 126], along with `=`, `]` &
/// `"`, is replaced with `_`. The result is never truncated, so distinct keys of equal length
/// remain distinct.
pub fn sanitize_param_name(input: &str) -> String {
    sanitize_with(input, usize::MAX, |b| {
        is_print_us_ascii(b) && !matches!(b, b'=' | b']' | b'"')
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fixtures() {
        assert_eq!(sanitize(" abc ", APP_NAME_MAX), "_abc_");
        // Two characters, six bytes
        assert_eq!(sanitize("中文", APP_NAME_MAX), "______");
        assert_eq!(sanitize("\x00\x01\x02\x03\x04test", APP_NAME_MAX), "_____test");
        assert_eq!(sanitize("a\tb\nc d\x7f", APP_NAME_MAX), "a_b_c_d_");
        assert_eq!(sanitize("", APP_NAME_MAX), "");
    }

    #[test]
    fn bounded_and_printable() {
        let inputs = [
            "localhost",
            "💩💩💩💩💩💩💩💩💩💩💩💩💩💩💩💩💩💩💩💩",
            "a very long application name that will not fit in forty-eight bytes",
            "\u{feff}\u{0}\u{1b}[31mred",
        ];
        for input in inputs.iter() {
            for max in [0, 1, 7, MSGID_MAX, APP_NAME_MAX, HOSTNAME_MAX].iter() {
                let out = sanitize(input, *max);
                assert!(out.len() <= *max);
                assert!(out.bytes().all(|b| is_print_us_ascii(b) || b == b'_'));
            }
        }
    }

    #[test]
    fn truncates_bytes_not_chars() {
        assert_eq!(sanitize("中文", 4), "____");
        assert_eq!(sanitize(&"x".repeat(300), HOSTNAME_MAX).len(), 255);
    }

    #[test]
    fn sd_names() {
        assert_eq!(sanitize_sd_name("encoder_test", SD_NAME_MAX), "encoder_test");
        assert_eq!(sanitize_sd_name("a=b]c\"d@e f", SD_NAME_MAX), "a_b_c_d_e_f");
    }

    #[test]
    fn param_names() {
        assert_eq!(sanitize_param_name("a=b]c\"d@e f"), "a_b_c_d@e_f");
        let long = "x".repeat(SD_NAME_MAX * 2);
        assert_eq!(sanitize_param_name(&long), long);
    }
}
