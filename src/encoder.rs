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
//! RFC [5424]-compliant syslog message encoding
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424
//!
//! [`SyslogEncoder`] turns an [`Entry`] plus a list of contextual [`Field`]s into a complete,
//! framed syslog message:
//!
//! ```text
//! <PRIVAL>1 TIMESTAMP HOSTNAME APP-NAME PROCID MSGID STRUCTURED-DATA BOM MSG
//! ```
//!
//! Its configuration lives in an [`EncoderConfig`], built once via [`EncoderConfig::builder`] &
//! shared (read-only) by every copy of the encoder.

use crate::{
    body::{
        BodyConfig, BodyFormat, BodyWriter, CallerEncoding, DurationEncoding, LevelEncoding,
        TimeEncoding,
    },
    entry::Entry,
    error::{Error, Result},
    facility::Facility,
    field::{ArrayMarshaler, Field, ObjectEncoder, ObjectMarshaler},
    framing::Framing,
    header::write_header,
    pool::{Buffer, BufferPool},
    sanitize::{sanitize, APP_NAME_MAX, HOSTNAME_MAX, MSGID_MAX, PROCID_MAX},
    sd::{sd_id, write_structured_data},
};

use backtrace::Backtrace;
use bytes::BufMut;
use chrono::prelude::*;

use std::{sync::Arc, time::Duration};

/// The UTF-8 byte order mark, which RFC 5424 says MUST begin a UTF-8 MSG
pub const BOM: [u8; 3] = [0xef, 0xbb, 0xbf];

/// The enterprise ID used when none is configured: 32473, reserved for documentation by
/// [RFC 5612](https://datatracker.ietf.org/doc/html/rfc5612).
pub const DEFAULT_ENTERPRISE_ID: u32 = 32473;

/// Attempt to figure-out an RFC [5424]-compliant hostname.
///
/// The order of preference for the contents of the HOSTNAME field is as follows:
///
/// 1.  FQDN
/// 2.  Static IP address
/// 3.  hostname
/// 4.  Dynamic IP address
/// 5.  the NILVALUE
///
/// This implementation doesn't quite do that; it will first simply try [gethostname()], then
/// uses [netlink] to try & find an IP address, and failing that returns the empty string (which
/// is rendered as the NILVALUE).
///
/// [5424]: https://datatracker.ietf.org/doc/html/rfc5424
/// [gethostname()]: https://man7.org/linux/man-pages/man2/gethostname.2.html
/// [netlink]: https://man7.org/linux/man-pages/man7/netlink.7.html
pub fn default_hostname() -> String {
    hostname::get()
        .ok()
        .map(|hn| hn.to_string_lossy().into_owned())
        .filter(|hn| !hn.is_empty())
        .or_else(|| local_ip_address::local_ip().ok().map(|ip| ip.to_string()))
        .unwrap_or_default()
}

/// Attempt to figure-out an RFC [5424] Application Name: the file name of the current
/// executable, or the empty string (rendered as the NILVALUE).
///
/// [5424]: https://datatracker.ietf.org/doc/html/rfc5424
pub fn default_appname() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|pbuf| {
            pbuf.file_name()
                .map(|os_str| os_str.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

/// Immutable encoder configuration.
///
/// The HOSTNAME, APP-NAME, PROCID & MSGID it holds have already been sanitized.
#[derive(Clone, Debug)]
pub struct EncoderConfig {
    facility: Facility,
    hostname: String,
    appname: String,
    procid: String,
    msgid: Option<String>,
    enterprise_id: u32,
    sd_id: String,
    framing: Framing,
    body: BodyConfig,
}

impl EncoderConfig {
    /// Start building a configuration; see [`EncoderConfigBuilder`] for the defaults.
    pub fn builder() -> EncoderConfigBuilder {
        EncoderConfigBuilder {
            facility: Facility::default(),
            hostname: None,
            appname: None,
            procid: std::process::id().to_string(),
            msgid: None,
            enterprise_id: DEFAULT_ENTERPRISE_ID,
            framing: Framing::default(),
            body: BodyConfig::default(),
        }
    }
    /// The facility combined with each entry's severity to form PRIVAL
    pub fn facility(&self) -> Facility {
        self.facility
    }
    /// HOSTNAME; empty means NILVALUE
    pub fn hostname(&self) -> &str {
        &self.hostname
    }
    /// APP-NAME; empty means NILVALUE
    pub fn appname(&self) -> &str {
        &self.appname
    }
    /// PROCID; empty means NILVALUE
    pub fn procid(&self) -> &str {
        &self.procid
    }
    /// MSGID, if one was configured
    pub fn msgid(&self) -> Option<&str> {
        self.msgid.as_deref()
    }
    /// The private enterprise number used in the SD-ID
    pub fn enterprise_id(&self) -> u32 {
        self.enterprise_id
    }
    /// The SD-ID under which contextual fields are reported: `<app-name>@<enterprise ID>`
    pub fn sd_id(&self) -> &str {
        &self.sd_id
    }
    /// How each encoded message is delimited
    pub fn framing(&self) -> Framing {
        self.framing
    }
    /// Layout of the MSG body
    pub fn body(&self) -> &BodyConfig {
        &self.body
    }
}

/// Builder for [`EncoderConfig`].
///
/// Anything not set is defaulted: facility `LOG_USER`, the discovered hostname & executable name,
/// the current process ID, no MSGID, enterprise ID [`DEFAULT_ENTERPRISE_ID`], non-transparent
/// framing & a JSON body.
pub struct EncoderConfigBuilder {
    facility: Facility,
    hostname: Option<String>,
    appname: Option<String>,
    procid: String,
    msgid: Option<String>,
    enterprise_id: u32,
    framing: Framing,
    body: BodyConfig,
}

impl EncoderConfigBuilder {
    /// Set the syslog facility (default `LOG_USER`).
    pub fn facility(mut self, facility: Facility) -> Self {
        self.facility = facility;
        self
    }
    /// Set the HOSTNAME; it will be sanitized & truncated to 255 bytes.
    pub fn hostname<S: Into<String>>(mut self, hostname: S) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
    /// Set the APP-NAME; it will be sanitized & truncated to 48 bytes.
    pub fn appname<S: Into<String>>(mut self, appname: S) -> Self {
        self.appname = Some(appname.into());
        self
    }
    /// Set the PROCID to a numeric process identifier.
    pub fn pid(mut self, pid: u32) -> Self {
        self.procid = pid.to_string();
        self
    }
    /// Set the PROCID to arbitrary text.
    pub fn procid<S: Into<String>>(mut self, procid: S) -> Self {
        self.procid = procid.into();
        self
    }
    /// Set the MSGID; it will be sanitized & truncated to 32 bytes.
    pub fn msgid<S: Into<String>>(mut self, msgid: S) -> Self {
        self.msgid = Some(msgid.into());
        self
    }
    /// Set the private enterprise number used in the SD-ID; must be non-zero.
    pub fn enterprise_id(mut self, id: u32) -> Self {
        self.enterprise_id = id;
        self
    }
    /// Set the framing (default non-transparent).
    pub fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }
    /// Replace the entire body layout.
    pub fn body(mut self, body: BodyConfig) -> Self {
        self.body = body;
        self
    }
    /// Render the MSG body as JSON or `key=value` pairs.
    pub fn body_format(mut self, format: BodyFormat) -> Self {
        self.body.format = format;
        self
    }
    /// Key for the entry's time in the body; `None` leaves it out.
    pub fn time_key(mut self, key: Option<&str>) -> Self {
        self.body.time_key = key.map(str::to_string);
        self
    }
    /// Key for the entry's level in the body; `None` leaves it out.
    pub fn level_key(mut self, key: Option<&str>) -> Self {
        self.body.level_key = key.map(str::to_string);
        self
    }
    /// Key for the logger name in the body; `None` leaves it out.
    pub fn name_key(mut self, key: Option<&str>) -> Self {
        self.body.name_key = key.map(str::to_string);
        self
    }
    /// Key for the caller in the body; `None` leaves it out.
    pub fn caller_key(mut self, key: Option<&str>) -> Self {
        self.body.caller_key = key.map(str::to_string);
        self
    }
    /// Key for the message in the body; `None` leaves it out.
    pub fn message_key(mut self, key: Option<&str>) -> Self {
        self.body.message_key = key.map(str::to_string);
        self
    }
    /// Key for the stack trace in the body; `None` leaves it out.
    pub fn stacktrace_key(mut self, key: Option<&str>) -> Self {
        self.body.stacktrace_key = key.map(str::to_string);
        self
    }
    /// How times are rendered in the body.
    pub fn time_encoding(mut self, encoding: TimeEncoding) -> Self {
        self.body.time_encoding = encoding;
        self
    }
    /// How levels are rendered in the body.
    pub fn level_encoding(mut self, encoding: LevelEncoding) -> Self {
        self.body.level_encoding = encoding;
        self
    }
    /// How durations are rendered, in both the body & structured data.
    pub fn duration_encoding(mut self, encoding: DurationEncoding) -> Self {
        self.body.duration_encoding = encoding;
        self
    }
    /// How the caller is rendered in the body.
    pub fn caller_encoding(mut self, encoding: CallerEncoding) -> Self {
        self.body.caller_encoding = encoding;
        self
    }
    /// Validate & sanitize the settings; fails if the enterprise ID is zero.
    pub fn build(self) -> Result<EncoderConfig> {
        if self.enterprise_id == 0 {
            return Err(Error::BadEnterpriseId {
                id: self.enterprise_id,
                back: Backtrace::new(),
            });
        }
        let hostname = sanitize(
            &self.hostname.unwrap_or_else(default_hostname),
            HOSTNAME_MAX,
        );
        let appname = sanitize(&self.appname.unwrap_or_else(default_appname), APP_NAME_MAX);
        Ok(EncoderConfig {
            facility: self.facility,
            sd_id: sd_id(&appname, self.enterprise_id),
            hostname,
            appname,
            procid: sanitize(&self.procid, PROCID_MAX),
            msgid: self
                .msgid
                .map(|id| sanitize(&id, MSGID_MAX))
                .filter(|id| !id.is_empty()),
            enterprise_id: self.enterprise_id,
            framing: self.framing,
            body: self.body,
        })
    }
}

/// Encodes log entries as RFC 5424 syslog messages.
///
/// A [`SyslogEncoder`] is also an [`ObjectEncoder`]: fields added to it are accumulated & written
/// into the MSG body of every subsequent message. Cloning is cheap (the configuration & buffer
/// pool are shared) and yields an encoder whose accumulated fields evolve independently, so the
/// usual pattern is to configure one encoder, then clone it per record (or per logging context):
///
/// ```
/// use rfc_5424_encoder::{encoder::{EncoderConfig, SyslogEncoder}, entry::{Entry, Level},
///                        field::{Field, ObjectEncoder}};
/// use std::sync::Arc;
///
/// let config = EncoderConfig::builder().appname("doc-test").build().unwrap();
/// let base = SyslogEncoder::new(Arc::new(config));
///
/// let mut enc = base.clone();
/// enc.add_string("request-id", "1234");
/// let (msg, err) = enc.encode_entry(&Entry::now(Level::Info, "Hello, world!"),
///                                   &[Field::u32("status", 200)]);
/// assert!(err.is_none());
/// assert!(msg.ends_with(b"\n"));
/// ```
#[derive(Clone)]
pub struct SyslogEncoder {
    config: Arc<EncoderConfig>,
    pool: Arc<BufferPool>,
    body: BodyWriter,
    errors: Option<Error>,
}

impl SyslogEncoder {
    /// Create an encoder drawing its output buffers from the process-wide pool.
    pub fn new(config: Arc<EncoderConfig>) -> SyslogEncoder {
        SyslogEncoder::with_pool(config, BufferPool::shared())
    }
    /// Create an encoder drawing its output buffers from `pool`.
    pub fn with_pool(config: Arc<EncoderConfig>, pool: Arc<BufferPool>) -> SyslogEncoder {
        SyslogEncoder {
            body: BodyWriter::with_config(config.body()),
            config,
            pool,
            errors: None,
        }
    }
    /// The shared configuration
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
    /// Add a [`Field`] to the accumulated body fields.
    pub fn add_field(&mut self, field: &Field) -> Result<()> {
        let res = field.add_to(&mut self.body);
        self.note(res)
    }
    /// Clone this encoder & add `fields` to the clone.
    pub fn with_fields(&self, fields: &[Field]) -> SyslogEncoder {
        let mut enc = self.clone();
        for field in fields {
            // failures are retained by `enc` & reported when it encodes
            let _ = enc.add_field(field);
        }
        enc
    }

    /// Encode `entry` as a complete, framed syslog message.
    ///
    /// `fields` are rendered as STRUCTURED-DATA; the fields accumulated on this encoder, along
    /// with the entry's own attributes, form the MSG. A message is always produced. Failures
    /// reported by any marshaler involved (now, or when the fields were accumulated) are
    /// returned alongside it; the affected values are present in the output, but incomplete.
    pub fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> (Buffer, Option<Error>) {
        let mut buf = self.pool.get();
        let out = buf.as_mut_vec();
        let start = out.len();

        write_header(out, &self.config, entry);
        out.put_u8(b' ');
        let sd_errors = write_structured_data(
            out,
            self.config.sd_id(),
            fields,
            self.config.body().duration_encoding,
        );
        out.put_u8(b' ');
        out.put_slice(&BOM);
        self.body.write_entry(self.config.body(), entry, out);
        self.config.framing().frame(out, start);

        let errors = match sd_errors {
            Some(err) => Some(Error::append(self.errors.clone(), err)),
            None => self.errors.clone(),
        };
        if let Some(err) = &errors {
            tracing::debug!(
                "encoded a syslog message with {} marshaling failure(s): {}",
                err.errors().count(),
                err
            );
        }
        (buf, errors)
    }

    fn note(&mut self, res: Result<()>) -> Result<()> {
        if let Err(err) = &res {
            self.errors = Some(Error::append(self.errors.take(), err.clone()));
        }
        res
    }
}

impl ObjectEncoder for SyslogEncoder {
    fn add_string(&mut self, key: &str, value: &str) {
        self.body.add_string(key, value)
    }
    fn add_bool(&mut self, key: &str, value: bool) {
        self.body.add_bool(key, value)
    }
    fn add_i64(&mut self, key: &str, value: i64) {
        self.body.add_i64(key, value)
    }
    fn add_u64(&mut self, key: &str, value: u64) {
        self.body.add_u64(key, value)
    }
    fn add_f64(&mut self, key: &str, value: f64) {
        self.body.add_f64(key, value)
    }
    fn add_f32(&mut self, key: &str, value: f32) {
        self.body.add_f32(key, value)
    }
    fn add_duration(&mut self, key: &str, value: Duration) {
        self.body.add_duration(key, value)
    }
    fn add_time(&mut self, key: &str, value: DateTime<Utc>) {
        self.body.add_time(key, value)
    }
    fn add_binary(&mut self, key: &str, value: &[u8]) {
        self.body.add_binary(key, value)
    }
    fn add_error(&mut self, key: &str, value: &dyn std::error::Error) {
        self.body.add_error(key, value)
    }
    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<()> {
        let res = self.body.add_object(key, value);
        self.note(res)
    }
    fn add_array(&mut self, key: &str, value: &dyn ArrayMarshaler) -> Result<()> {
        let res = self.body.add_array(key, value);
        self.note(res)
    }
    fn open_namespace(&mut self, key: &str) {
        self.body.open_namespace(key)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{
        entry::{Caller, Level},
        field::{ArrayEncoder, ArrayMarshalerFn, ObjectMarshalerFn},
        sd::unescape_param_value,
    };

    use syslog_rfc5424::{parse_message, SyslogFacility, SyslogSeverity};

    fn test_entry() -> Entry {
        Entry::new(
            Utc.with_ymd_and_hms(2017, 1, 2, 3, 4, 5).unwrap()
                + chrono::Duration::nanoseconds(123_456_789),
            Level::Debug,
            "fake",
        )
    }

    fn test_config(framing: Framing) -> Arc<EncoderConfig> {
        Arc::new(
            EncoderConfig::builder()
                .message_key(Some("msg"))
                .name_key(Some("name"))
                .caller_key(Some("caller"))
                .stacktrace_key(Some("stacktrace"))
                .time_key(None)
                .level_key(None)
                .time_encoding(TimeEncoding::Epoch)
                .level_encoding(LevelEncoding::Lowercase)
                .duration_encoding(DurationEncoding::Seconds)
                .caller_encoding(CallerEncoding::Short)
                .framing(framing)
                .hostname("localhost")
                .appname("encoder_test")
                .enterprise_id(112)
                .pid(9876)
                .facility(Facility::LOG_LOCAL0)
                .build()
                .unwrap(),
        )
    }

    fn test_encoder(framing: Framing) -> SyslogEncoder {
        let mut enc = SyslogEncoder::with_pool(test_config(framing), Arc::new(BufferPool::default()));
        enc.add_string("str", "foo");
        enc.add_i64("int64-1", 1);
        enc.add_i64("int64-2", 2);
        enc.add_f64("float64", 1.0);
        enc.add_string("string1", "\n");
        enc.add_string("string2", "💩");
        enc.add_string("string3", "🤔");
        enc.add_string("string4", "🙊");
        enc.add_bool("bool", true);
        enc
    }

    const PREFIX: &[u8] =
        b"<135>1 2017-01-02T03:04:05.123456Z localhost encoder_test 9876 - - \xef\xbb\xbf";

    #[test]
    fn non_transparent_framing() {
        let enc = test_encoder(Framing::NonTransparent);
        let (buf, err) = enc.encode_entry(&test_entry(), &[]);
        assert!(err.is_none());
        assert!(buf.starts_with(PREFIX));
        assert!(buf.ends_with(b"\n"));
        assert!(!buf[..buf.len() - 1].ends_with(b"\n"));
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 1);

        let body = std::str::from_utf8(&buf[PREFIX.len()..buf.len() - 1]).unwrap();
        assert_eq!(
            body,
            r#"{"msg":"fake","str":"foo","int64-1":1,"int64-2":2,"float64":1,"string1":"\n","string2":"💩","string3":"🤔","string4":"🙊","bool":true}"#
        );
        buf.free();
    }

    #[test]
    fn octet_counting_framing() {
        let enc = test_encoder(Framing::OctetCounting);
        let (buf, err) = enc.encode_entry(&test_entry(), &[]);
        assert!(err.is_none());

        let space = buf.iter().position(|b| *b == b' ').unwrap();
        let n: usize = std::str::from_utf8(&buf[..space]).unwrap().parse().unwrap();
        assert_eq!(n, buf.len() - space - 1);
        assert!(buf[space + 1..].starts_with(PREFIX));
        assert!(!buf.ends_with(b"\n"));
    }

    #[test]
    fn structured_data() {
        let enc = test_encoder(Framing::NonTransparent);
        let boom = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let (buf, err) = enc.encode_entry(
            &test_entry(),
            &[
                Field::string("a-str", "pebcak"),
                Field::i64("i64", 42),
                Field::u32("u32", 314),
                Field::f64("f64", 3.14),
                Field::bool("b", true),
                Field::error(&boom),
            ],
        );
        assert!(err.is_none());
        let expected: &[u8] = b"<135>1 2017-01-02T03:04:05.123456Z localhost encoder_test 9876 - [encoder_test@112 a-str=\"pebcak\" i64=\"42\" u32=\"314\" f64=\"3.14\" b=\"true\" error=\"boom\"] \xef\xbb\xbf";
        assert!(buf.starts_with(expected));
    }

    #[test]
    fn clones_are_independent() {
        let base = test_encoder(Framing::NonTransparent);
        let mut a = base.clone();
        a.add_string("only-in-a", "x");
        let b = base.with_fields(&[Field::string("only-in-b", "y")]);

        let text = |enc: &SyslogEncoder| {
            let (buf, _) = enc.encode_entry(&test_entry(), &[]);
            String::from_utf8(buf.to_vec()).unwrap()
        };
        let (ta, tb, tbase) = (text(&a), text(&b), text(&base));
        assert!(ta.contains("only-in-a") && !ta.contains("only-in-b"));
        assert!(tb.contains("only-in-b") && !tb.contains("only-in-a"));
        assert!(!tbase.contains("only-in"));
        assert!(std::ptr::eq(a.config(), base.config()));
    }

    #[test]
    fn encoding_is_repeatable() {
        let enc = test_encoder(Framing::OctetCounting);
        let entry = test_entry()
            .with_logger_name("main")
            .with_caller(Caller::new("/src/pkg/file.rs", 7))
            .with_stack("stack");
        let fields = [Field::string("k", "v")];
        let (first, _) = enc.encode_entry(&entry, &fields);
        let (second, _) = enc.encode_entry(&entry, &fields);
        assert_eq!(&*first, &*second);
        let text = String::from_utf8(first.to_vec()).unwrap();
        assert!(text.contains(r#""name":"main","caller":"pkg/file.rs:7","msg":"fake""#));
        assert!(text.ends_with(r#""bool":true,"stacktrace":"stack"}"#));
    }

    // Nested array- and object-marshalers
    struct Turducken;

    impl ObjectMarshaler for Turducken {
        fn marshal_object(&self, enc: &mut dyn ObjectEncoder) -> Result<()> {
            enc.add_array(
                "ducks",
                &ArrayMarshalerFn(|arr: &mut dyn ArrayEncoder| {
                    for _ in 0..2 {
                        arr.append_object(&ObjectMarshalerFn(|inner: &mut dyn ObjectEncoder| {
                            inner.add_string("in", "chicken");
                            Ok(())
                        }))?;
                    }
                    Ok(())
                }),
            )
        }
    }

    /// A turducken whose innermost chickens refuse to be marshaled
    struct BadTurducken(&'static str);

    impl ObjectMarshaler for BadTurducken {
        fn marshal_object(&self, enc: &mut dyn ObjectEncoder) -> Result<()> {
            let what = self.0;
            enc.add_array(
                "ducks",
                &ArrayMarshalerFn(move |arr: &mut dyn ArrayEncoder| {
                    let mut err = None;
                    for i in 0..2 {
                        let res = arr.append_object(&ObjectMarshalerFn(
                            move |inner: &mut dyn ObjectEncoder| {
                                inner.add_string("in", "chicken");
                                Err(Error::marshal(format!("{} {}", what, i)))
                            },
                        ));
                        if let Err(e) = res {
                            err = Some(Error::append(err, e));
                        }
                    }
                    err.map_or(Ok(()), Err)
                }),
            )
        }
    }

    #[test]
    fn nested_failures_are_aggregated() {
        let mut enc = test_encoder(Framing::NonTransparent);
        assert!(enc.add_object("good", &Turducken).is_ok());
        let err = enc.add_object("bad", &BadTurducken("body")).unwrap_err();
        assert_eq!(err.errors().count(), 2);
        enc.add_string("after", "present");

        let (buf, err) = enc.encode_entry(
            &test_entry(),
            &[
                Field::object("sd-bad", BadTurducken("sd")),
                Field::string("sd-after", "present"),
            ],
        );
        let err = err.unwrap();
        assert_eq!(
            err.errors().map(|e| e.to_string()).collect::<Vec<_>>(),
            vec!["body 0", "body 1", "sd 0", "sd 1"]
        );
        assert_eq!(err.to_string(), "body 0; body 1; sd 0; sd 1");

        let text = String::from_utf8(buf.to_vec()).unwrap();
        assert!(text.contains(
            r#""good":{"ducks":[{"in":"chicken"},{"in":"chicken"}]},"bad":{"ducks":[{"in":"chicken"},{"in":"chicken"}]},"after":"present""#
        ));
        assert!(text.contains(r#"sd-after="present"]"#));
    }

    #[test]
    fn parses_as_rfc_5424() {
        let enc = test_encoder(Framing::NonTransparent);
        let (buf, _) = enc.encode_entry(
            &test_entry(),
            &[
                Field::string("a-str", "pebcak"),
                Field::string("quoted", r#"a "b" \c [d]"#),
                Field::i64("i64", 42),
            ],
        );
        let text = std::str::from_utf8(&buf).unwrap();
        let msg = parse_message(text.trim_end_matches('\n')).unwrap();
        assert_eq!(msg.facility, SyslogFacility::LOG_LOCAL0);
        assert_eq!(msg.severity, SyslogSeverity::SEV_DEBUG);
        assert_eq!(msg.hostname.as_deref(), Some("localhost"));
        assert_eq!(msg.appname.as_deref(), Some("encoder_test"));
        assert!(msg.msgid.is_none());
        assert_eq!(
            msg.sd.find_tuple("encoder_test@112", "a-str").map(|s| s.as_str()),
            Some("pebcak")
        );
        assert_eq!(
            msg.sd.find_tuple("encoder_test@112", "i64").map(|s| s.as_str()),
            Some("42")
        );
    }

    #[test]
    fn escaped_values_round_trip() {
        let original = r#"a "b" \c [d] \"#;
        let enc = test_encoder(Framing::NonTransparent);
        let (buf, _) = enc.encode_entry(&test_entry(), &[Field::string("v", original)]);
        let text = std::str::from_utf8(&buf).unwrap();
        let start = text.find("v=\"").unwrap() + 3;
        // the value ends at the first unescaped quote
        let bytes = text.as_bytes();
        let mut end = start;
        while bytes[end] != b'"' {
            end += if bytes[end] == b'\\' { 2 } else { 1 };
        }
        assert_eq!(unescape_param_value(&text[start..end]), original);
    }

    #[test]
    fn zero_enterprise_id_is_rejected() {
        assert!(EncoderConfig::builder().enterprise_id(0).build().is_err());
    }

    #[test]
    fn defaults() {
        let config = EncoderConfig::builder().build().unwrap();
        assert_eq!(config.facility(), Facility::LOG_USER);
        assert_eq!(config.procid(), std::process::id().to_string());
        assert_eq!(config.enterprise_id(), DEFAULT_ENTERPRISE_ID);
        assert!(config.hostname().bytes().all(|b| (33..=126).contains(&b)));
        assert!(config.appname().len() <= APP_NAME_MAX);
        assert!(config.sd_id().ends_with("@32473"));
    }

    #[test]
    fn concurrent_encoders() {
        let base = test_encoder(Framing::OctetCounting);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let mut enc = base.clone();
                std::thread::spawn(move || {
                    enc.add_i64("thread", i);
                    for _ in 0..50 {
                        let (buf, err) = enc.encode_entry(&test_entry(), &[Field::i64("i", i)]);
                        assert!(err.is_none());
                        let text = String::from_utf8(buf.to_vec()).unwrap();
                        assert!(text.contains(&format!("\"thread\":{}", i)));
                        assert!(text.contains(&format!("i=\"{}\"", i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
