use std::{error::Error as StdError, fmt, io};

use strum_macros::{Display, EnumIter, EnumString};

use crate::RemoteFailure;

pub type Result<T> = std::result::Result<T, Error>;

/// A list specifying general categories of remoting errors.
#[derive(Debug, Copy, Clone, Display, PartialEq, Eq, Hash, EnumIter, EnumString)]
pub enum ErrorKind {
    /// The endpoint could not be reached, the connection broke or timed out.
    Network,
    /// The endpoint answered with a non-success status or an oversized body.
    Protocol,
    /// Encoding or decoding an invocation or a result failed.
    Serialization,
    /// No operation matches the invocation on the exported service.
    Dispatch,
    /// The remote operation itself failed.
    Application,
    /// The caller misused the local API, including asking for a return
    /// type the remote value does not convert to.
    Client,
    Other,
}

impl ErrorKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network error",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::Serialization => "serialization error",
            ErrorKind::Dispatch => "dispatch error",
            ErrorKind::Application => "remote application failure",
            ErrorKind::Client => "client error",
            ErrorKind::Other => "other error",
        }
    }
}

/// The error type for every remoting operation.
///
/// Modelled after `std::io::Error`: a kind plus an optional boxed cause.
/// Application failures carry the [`RemoteFailure`] transported back from
/// the server so callers can inspect its identity.
pub struct Error {
    repr: Repr,
}

enum Repr {
    Simple(ErrorKind),
    Custom(Box<Custom>),
    Application(Box<RemoteFailure>),
}

#[derive(Debug)]
struct Custom {
    kind: ErrorKind,
    error: Box<dyn StdError + Send + Sync>,
}

/// A message layered on top of another error, keeping it as `source()`.
#[derive(Debug)]
struct Context {
    message: String,
    source: Error,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Context {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

impl Error {
    pub fn new<E>(kind: ErrorKind, error: E) -> Error
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Error {
            repr: Repr::Custom(Box::new(Custom {
                kind,
                error: error.into(),
            })),
        }
    }

    /// Wraps a failure raised by the remote operation.
    pub fn from_failure(failure: RemoteFailure) -> Error {
        Error {
            repr: Repr::Application(Box::new(failure)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            Repr::Simple(kind) => kind,
            Repr::Custom(ref c) => c.kind,
            Repr::Application(_) => ErrorKind::Application,
        }
    }

    /// Returns the remote failure if this is an application error.
    pub fn failure(&self) -> Option<&RemoteFailure> {
        match self.repr {
            Repr::Application(ref f) => Some(f),
            _ => None,
        }
    }

    pub fn into_failure(self) -> Option<RemoteFailure> {
        match self.repr {
            Repr::Application(f) => Some(*f),
            _ => None,
        }
    }

    /// True when the call may never have reached the remote service, so its
    /// effects are unknown.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::Protocol | ErrorKind::Serialization
        )
    }

    pub fn get_ref(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self.repr {
            Repr::Custom(ref c) => Some(&*c.error),
            _ => None,
        }
    }

    /// Layers `message` over this error. The kind is kept, the original
    /// error becomes the `source()`. Application failures pass through
    /// untouched.
    pub fn context<M: Into<String>>(self, message: M) -> Error {
        if let Repr::Application(_) = self.repr {
            return self;
        }
        let kind = self.kind();
        Error::new(
            kind,
            Context {
                message: message.into(),
                source: self,
            },
        )
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            repr: Repr::Simple(kind),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::new(ErrorKind::Network, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::new(ErrorKind::Serialization, err)
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Error {
        Error::new(ErrorKind::Serialization, err)
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Error {
        Error::new(ErrorKind::Serialization, err)
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Error {
        Error::new(ErrorKind::Protocol, err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::new(ErrorKind::Other, err)
    }
}

impl From<RemoteFailure> for Error {
    fn from(failure: RemoteFailure) -> Error {
        Error::from_failure(failure)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            Repr::Simple(kind) => f.debug_tuple("Kind").field(&kind).finish(),
            Repr::Custom(ref c) => fmt::Debug::fmt(c, f),
            Repr::Application(ref failure) => {
                f.debug_tuple("Application").field(failure).finish()
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            Repr::Simple(kind) => f.write_str(kind.as_str()),
            Repr::Custom(ref c) => fmt::Display::fmt(&c.error, f),
            Repr::Application(ref failure) => fmt::Display::fmt(failure, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self.repr {
            Repr::Simple(_) => None,
            Repr::Custom(ref c) => c.error.source(),
            Repr::Application(ref failure) => failure.source(),
        }
    }
}
