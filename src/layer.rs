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
//! A [`tracing-subscriber`] [`Layer`] that encodes [`tracing`] events as syslog messages
//!
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//!
//! Each [`Event`] is mapped onto an [`Entry`]:
//!
//! - the `message` field becomes the entry's message
//! - the event's target becomes the logger name
//! - the event's file & line, when known, become the caller
//!
//! Every other field on the event is handed to the encoder as a contextual field, and so lands in
//! the STRUCTURED-DATA element. The framed message is then written to a [`MakeWriter`] (a socket,
//! a file, `stderr`...); the [`Layer`] knows nothing of transports.
//!
//! [`Event`]: tracing::Event
//! [`MakeWriter`]: tracing_subscriber::fmt::MakeWriter

use crate::{
    encoder::SyslogEncoder,
    entry::{Caller, Entry, Level},
    error::Error,
    field::Field,
};

use tracing::Event;
use tracing_core::field::{Field as TracingField, Visit};
use tracing_subscriber::{fmt::MakeWriter, layer::Context};

// When the tracing-log feature is enabled, use NormalizeEvent to recover file/line metadata
// from events that originated from the `log` crate.
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;

use std::{cell::Cell, io::Write};

/// Collects an event's fields: `message` separately, the rest as [`Field`]s.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<Field>,
}

impl FieldVisitor {
    fn skip(field: &TracingField) -> bool {
        // fields added by tracing-log; their content is in the normalized metadata
        cfg!(feature = "tracing-log") && field.name().starts_with("log.")
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else if !Self::skip(field) {
            self.fields.push(Field::string(field.name(), value));
        }
    }
    fn record_i64(&mut self, field: &TracingField, value: i64) {
        if !Self::skip(field) {
            self.fields.push(Field::i64(field.name(), value));
        }
    }
    fn record_u64(&mut self, field: &TracingField, value: u64) {
        if !Self::skip(field) {
            self.fields.push(Field::u64(field.name(), value));
        }
    }
    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.fields.push(Field::f64(field.name(), value));
    }
    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.fields.push(Field::bool(field.name(), value));
    }
    fn record_error(
        &mut self,
        field: &TracingField,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.fields.push(Field::named_error(field.name(), value));
    }
    fn record_debug(&mut self, field: &TracingField, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else if !Self::skip(field) {
            self.fields.push(Field::string(field.name(), format!("{:?}", value)));
        }
    }
}

thread_local! {
    static IN_ON_EVENT: Cell<bool> = const { Cell::new(false) };
}

/// A [`tracing_subscriber::Layer`] writing RFC 5424 syslog messages to `W`.
///
/// ```
/// use rfc_5424_encoder::{encoder::{EncoderConfig, SyslogEncoder}, layer::Layer};
/// use std::sync::Arc;
/// use tracing_subscriber::{layer::SubscriberExt, registry::Registry};
///
/// let encoder = SyslogEncoder::new(Arc::new(EncoderConfig::builder().build().unwrap()));
/// let subscriber = Registry::default().with(Layer::new(encoder, std::io::stderr));
/// let _guard = tracing::subscriber::set_default(subscriber);
/// tracing::info!(request = 11, "Hello, world!");
/// ```
pub struct Layer<W> {
    encoder: SyslogEncoder,
    make_writer: W,
}

impl<W> Layer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    pub fn new(encoder: SyslogEncoder, make_writer: W) -> Layer<W> {
        Layer {
            encoder,
            make_writer,
        }
    }
    pub fn encoder(&self) -> &SyslogEncoder {
        &self.encoder
    }
}

impl<S, W> tracing_subscriber::layer::Layer<S> for Layer<W>
where
    S: tracing::Subscriber,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // Failures are reported via `tracing` itself; anything raised while doing so is dropped
        // rather than fed back into this layer.
        if IN_ON_EVENT.with(|flag| flag.replace(true)) {
            return;
        }

        #[cfg(feature = "tracing-log")]
        let normalized_meta = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut entry = Entry::now(
            Level::from(meta.level()),
            visitor.message.unwrap_or_default(),
        )
        .with_logger_name(meta.target());
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            entry = entry.with_caller(Caller::new(file, line));
        }

        let (buf, err) = self.encoder.encode_entry(&entry, &visitor.fields);
        if let Some(err) = err {
            ::tracing::error!("syslog message encoded with errors: {}", err);
        }
        if let Err(err) = self.make_writer.make_writer_for(meta).write_all(&buf) {
            ::tracing::error!("failed to write syslog message: {}", Error::from(err));
        }

        IN_ON_EVENT.with(|flag| flag.set(false));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{encoder::EncoderConfig, facility::Facility, pool::BufferPool};

    use syslog_rfc5424::{parse_message, SyslogSeverity};
    use tracing::{info, warn};
    use tracing_subscriber::{layer::SubscriberExt, registry::Registry};

    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn encoder() -> SyslogEncoder {
        SyslogEncoder::with_pool(
            Arc::new(
                EncoderConfig::builder()
                    .facility(Facility::LOG_USER)
                    .hostname("bree.local")
                    .appname("layer-test")
                    .pid(123)
                    .build()
                    .unwrap(),
            ),
            Arc::new(BufferPool::default()),
        )
    }

    #[test]
    fn events_become_messages() {
        let captured = Captured::default();
        let subscriber = Registry::default().with(Layer::new(encoder(), captured.clone()));
        tracing::subscriber::with_default(subscriber, || {
            info!(user = "alice", n = 3, ok = true, "Hello, 世界!");
            warn!("careful");
        });

        let bytes = captured.0.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        assert!(lines[0].starts_with("<14>1 "));
        assert!(lines[0].contains(" bree.local layer-test 123 - "));
        assert!(lines[0].contains(r#"[layer-test@32473 user="alice" n="3" ok="true"]"#));
        assert!(lines[0].contains(r#""msg":"Hello, 世界!""#));
        assert!(lines[0].contains(r#""logger":"rfc_5424_encoder::layer::test""#));
        assert!(lines[0].contains(r#""caller":"src/layer.rs:"#));

        let msg = parse_message(lines[1]).unwrap();
        assert_eq!(msg.severity, SyslogSeverity::SEV_WARNING);
        assert!(lines[1].contains(" 123 - - \u{feff}{"));
        assert!(msg.msg.contains(r#""msg":"careful""#));
    }

    #[test]
    fn write_failures_are_contained() {
        let subscriber = Registry::default().with(Layer::new(encoder(), || Broken));
        tracing::subscriber::with_default(subscriber, || {
            info!("into the void");
            info!("and again");
        });
    }
}
