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
//! [rfc-5424-encoder](crate) errors

use backtrace::Backtrace;

use std::sync::Arc;

/// [rfc-5424-encoder](crate) error type
///
/// This crate eschews libraries like [thiserror], [anyhow] & [Snafu] in favor of a
/// straightforward enumeration with a few match arms chosen on the basis what the caller will
/// need to repond.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
/// [Snafu]: https://docs.rs/snafu/latest/snafu
///
/// Encoding a record never fails outright: the encoder always produces a syslog message, and
/// reports any trouble it had along the way as an [`Error`] alongside the output. Failures from
/// caller-supplied marshalers are gathered into [`Error::Multiple`] rather than reported one at a
/// time; see [`Error::append`].
///
/// Errors are cheap to clone, since a [`SyslogEncoder`] carries the failures recorded while
/// accumulating fields into each copy of itself.
///
/// [`SyslogEncoder`]: crate::encoder::SyslogEncoder
#[derive(Clone)]
#[non_exhaustive]
pub enum Error {
    /// An enterprise ID of zero was configured; RFC 5424 SD-IDs require a private enterprise
    /// number
    BadEnterpriseId { id: u32, back: Backtrace },
    /// Unknown facility name
    BadFacility { name: String, back: Backtrace },
    /// Unknown framing name
    BadFraming { name: String, back: Backtrace },
    /// Failed to write an encoded message to its sink
    Io {
        source: Arc<std::io::Error>,
        back: Backtrace,
    },
    /// A caller-supplied [`ObjectMarshaler`] or [`ArrayMarshaler`] failed
    ///
    /// [`ObjectMarshaler`]: crate::field::ObjectMarshaler
    /// [`ArrayMarshaler`]: crate::field::ArrayMarshaler
    Marshal {
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// Several failures, collected while encoding a single record. Never nested: appending one
    /// composite to another flattens them.
    Multiple { errors: Vec<Error> },
}

impl Error {
    /// Wrap an arbitrary error (or message) as a marshaling failure; this is what
    /// [`ObjectMarshaler`] & [`ArrayMarshaler`] implementations are expected to return.
    ///
    /// [`ObjectMarshaler`]: crate::field::ObjectMarshaler
    /// [`ArrayMarshaler`]: crate::field::ArrayMarshaler
    pub fn marshal<E>(source: E) -> Error
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Error::Marshal {
            source: Arc::from(source.into()),
            back: Backtrace::new(),
        }
    }

    /// Combine `err` with whatever has been collected so far.
    ///
    /// ```
    /// use rfc_5424_encoder::error::Error;
    /// let mut acc = None;
    /// acc = Some(Error::append(acc, Error::marshal("first")));
    /// acc = Some(Error::append(acc, Error::marshal("second")));
    /// assert_eq!(acc.unwrap().errors().count(), 2);
    /// ```
    pub fn append(acc: Option<Error>, err: Error) -> Error {
        let mut errors = match acc {
            None => return err,
            Some(Error::Multiple { errors }) => errors,
            Some(other) => vec![other],
        };
        match err {
            Error::Multiple { errors: more } => errors.extend(more),
            other => errors.push(other),
        }
        Error::Multiple { errors }
    }

    /// Iterate over the individual failures; a non-composite error yields just itself.
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        match self {
            Error::Multiple { errors } => errors.iter().collect::<Vec<_>>().into_iter(),
            other => vec![other].into_iter(),
        }
    }
}

/// Fold the outcome of a marshaling call into an accumulator slot.
pub(crate) fn record(slot: &mut Option<Error>, res: Result<()>) {
    if let Err(err) = res {
        *slot = Some(Error::append(slot.take(), err));
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            source: Arc::new(err),
            back: Backtrace::new(),
        }
    }
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadEnterpriseId { id, .. } => {
                write!(f, "{} is not a usable private enterprise number", id)
            }
            Error::BadFacility { name, .. } => write!(f, "{:?} is not a syslog facility", name),
            Error::BadFraming { name, .. } => {
                write!(f, "{:?} is not a known syslog framing", name)
            }
            Error::Io { source, .. } => write!(f, "I/O error: {}", source),
            Error::Marshal { source, .. } => write!(f, "{}", source),
            Error::Multiple { errors } => {
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            _ => write!(f, "Other rfc-5424-encoder error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadEnterpriseId { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::Io { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::Marshal { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::Multiple { errors } => f.debug_list().entries(errors.iter()).finish(),
            err => write!(f, "rfc-5424-encoder error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Marshal { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
