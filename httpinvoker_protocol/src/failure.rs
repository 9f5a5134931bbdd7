use std::{error::Error as StdError, fmt};

use serde::{Deserialize, Serialize};

/// A failure raised by a remote operation, in transportable form.
///
/// `kind` identifies the failure type so the caller can tell failures apart
/// the same way it would if the operation had run locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFailure {
    kind: String,
    message: String,
    cause: Option<Box<RemoteFailure>>,
}

impl RemoteFailure {
    pub fn new<K, M>(kind: K, message: M) -> Self
    where
        K: Into<String>,
        M: Into<String>,
    {
        RemoteFailure {
            kind: kind.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: RemoteFailure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Captures `err` and its whole `source()` chain. Nested causes get the
    /// kind `"cause"` since their types are erased.
    pub fn from_error<K: Into<String>>(kind: K, err: &dyn StdError) -> Self {
        let mut chain = Vec::new();
        let mut next = err.source();
        while let Some(e) = next {
            chain.push(e.to_string());
            next = e.source();
        }

        let cause = chain.into_iter().rev().fold(None, |inner, message| {
            Some(Box::new(RemoteFailure {
                kind: "cause".to_owned(),
                message,
                cause: inner,
            }))
        });

        RemoteFailure {
            kind: kind.into(),
            message: err.to_string(),
            cause,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&RemoteFailure> {
        self.cause.as_deref()
    }

    pub fn is<K: AsRef<str>>(&self, kind: K) -> bool {
        self.kind == kind.as_ref()
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl StdError for RemoteFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn StdError + 'static))
    }
}
