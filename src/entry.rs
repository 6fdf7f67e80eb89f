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
//! Log entries as handed to us by the logging layer.
//!
//! An [`Entry`] is one log occurrence: when it happened, how bad it was, what was said & (maybe)
//! where it was said. The encoder only ever reads it.

use crate::facility::Severity;

use chrono::prelude::*;

type StdResult<T, E> = std::result::Result<T, E>;

/// The logging layer's notion of verbosity.
///
/// This is a superset of the levels commonly found in Rust logging crates (`tracing`, `log`,
/// `slog`), widened so that every syslog severity is reachable. Variants are ordered from most
/// verbose to most severe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Notice,
    Warn,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Level {
    /// Map this level onto a syslog severity.
    ///
    /// The mapping is total & monotonic: a more severe [`Level`] never yields a less severe
    /// [`Severity`]. syslog has no "trace" so it shares `LOG_DEBUG` with [`Level::Debug`].
    pub fn severity(self) -> Severity {
        match self {
            Level::Trace | Level::Debug => Severity::LOG_DEBUG,
            Level::Info => Severity::LOG_INFO,
            Level::Notice => Severity::LOG_NOTICE,
            Level::Warn => Severity::LOG_WARNING,
            Level::Error => Severity::LOG_ERR,
            Level::Critical => Severity::LOG_CRIT,
            Level::Alert => Severity::LOG_ALERT,
            Level::Emergency => Severity::LOG_EMERG,
        }
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Notice => "notice",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Critical => "critical",
            Level::Alert => "alert",
            Level::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.as_str())
    }
}

impl std::convert::From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Where in the source an entry was logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub file: String,
    pub line: u32,
    pub function: Option<String>,
}

impl Caller {
    pub fn new<S: Into<String>>(file: S, line: u32) -> Caller {
        Caller {
            file: file.into(),
            line,
            function: None,
        }
    }
    /// "file:line", with the file trimmed to its final directory & file name
    /// ("/a/b/pkg/file.rs" becomes "pkg/file.rs").
    pub fn short(&self) -> String {
        let file = self.file.as_str();
        let is_sep = |c: char| c == '/' || c == '\\';
        let trimmed = file
            .rfind(is_sep)
            .and_then(|last| file[..last].rfind(is_sep).map(|idx| &file[idx + 1..]))
            .unwrap_or(file);
        format!("{}:{}", trimmed, self.line)
    }
    /// "file:line" with the file as given
    pub fn full(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

/// One log occurrence.
#[derive(Clone, Debug)]
pub struct Entry {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub logger_name: Option<String>,
    pub caller: Option<Caller>,
    pub stack: Option<String>,
}

impl Entry {
    /// Create an entry logged at `time` (in any time zone; it is normalized to UTC).
    pub fn new<Tz: TimeZone, S: Into<String>>(time: DateTime<Tz>, level: Level, message: S) -> Entry {
        Entry {
            time: time.with_timezone(&Utc),
            level,
            message: message.into(),
            logger_name: None,
            caller: None,
            stack: None,
        }
    }
    /// Create an entry logged right now.
    pub fn now<S: Into<String>>(level: Level, message: S) -> Entry {
        Entry::new(Utc::now(), level, message)
    }
    pub fn with_logger_name<S: Into<String>>(mut self, name: S) -> Self {
        self.logger_name = Some(name.into());
        self
    }
    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }
    pub fn with_stack<S: Into<String>>(mut self, stack: S) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn level_mapping_is_monotonic() {
        let levels = [
            Level::Trace,
            Level::Debug,
            Level::Info,
            Level::Notice,
            Level::Warn,
            Level::Error,
            Level::Critical,
            Level::Alert,
            Level::Emergency,
        ];
        // Severity's discriminants run from most (0) to least (7) severe
        for pair in levels.windows(2) {
            assert!(pair[0].severity() as u8 >= pair[1].severity() as u8);
        }
        assert_eq!(Level::Debug.severity() as u8, 7);
        assert_eq!(Level::Info.severity() as u8, 6);
        assert_eq!(Level::Warn.severity() as u8, 4);
        assert_eq!(Level::Error.severity() as u8, 3);
        assert_eq!(Level::Critical.severity() as u8, 2);
        assert_eq!(Level::Alert.severity() as u8, 1);
        assert_eq!(Level::Emergency.severity() as u8, 0);
    }

    #[test]
    fn from_tracing() {
        assert_eq!(Level::from(&tracing::Level::TRACE).severity(), Severity::LOG_DEBUG);
        assert_eq!(Level::from(&tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(&tracing::Level::ERROR).severity(), Severity::LOG_ERR);
    }

    #[test]
    fn caller_forms() {
        let c = Caller::new("/home/me/src/crate/src/entry.rs", 42);
        assert_eq!(c.short(), "src/entry.rs:42");
        assert_eq!(c.full(), "/home/me/src/crate/src/entry.rs:42");
        assert_eq!(Caller::new("entry.rs", 1).short(), "entry.rs:1");
        assert_eq!(Caller::new("src/entry.rs", 1).short(), "src/entry.rs:1");
    }

    #[test]
    fn entry_times_are_utc() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let t = offset.with_ymd_and_hms(2017, 1, 2, 5, 4, 5).unwrap();
        let e = Entry::new(t, Level::Info, "hi");
        assert_eq!(e.time, Utc.with_ymd_and_hms(2017, 1, 2, 3, 4, 5).unwrap());
    }
}
