use std::{collections::HashMap, fmt};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{normalize_descriptor, Error, ErrorKind, RemoteFailure, Result};

/// Attribute key carrying the caller's codebase hint.
pub const CODEBASE_ATTRIBUTE: &str = "__codebase";

pub type Attributes = HashMap<String, Value>;

/// The serializable description of one remote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    method_name: String,
    parameter_types: Vec<String>,
    arguments: Vec<Value>,
    attributes: Option<Attributes>,
}

impl Invocation {
    /// Creates a new `Invocation` with normalized parameter type descriptors.
    /// Fails when the number of arguments differs from the number of
    /// parameter types.
    pub fn new<S: Into<String>>(
        method_name: S,
        parameter_types: Vec<String>,
        arguments: Vec<Value>,
    ) -> Result<Invocation> {
        let method_name = method_name.into();
        if parameter_types.len() != arguments.len() {
            return Err(Error::new(
                ErrorKind::Client,
                format!(
                    "method '{}' declares {} parameter types but got {} arguments",
                    method_name,
                    parameter_types.len(),
                    arguments.len()
                ),
            ));
        }
        Ok(Invocation {
            method_name,
            parameter_types: parameter_types.iter().map(|t| normalize_descriptor(t)).collect(),
            arguments,
            attributes: None,
        })
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn into_arguments(self) -> Vec<Value> {
        self.arguments
    }

    /// Adds an attribute. Attribute keys are write-once.
    pub fn add_attribute<K: Into<String>>(&mut self, key: K, value: Value) -> Result<()> {
        let key = key.into();
        let attributes = self.attributes.get_or_insert_with(HashMap::new);
        if attributes.contains_key(&key) {
            return Err(Error::new(
                ErrorKind::Client,
                format!("there is already an attribute with key '{}' bound", key),
            ));
        }
        attributes.insert(key, value);
        Ok(())
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.as_ref()?.get(key)
    }

    /// `None` until the first attribute is added.
    pub fn attributes(&self) -> Option<&Attributes> {
        self.attributes.as_ref()
    }

    pub fn codebase(&self) -> Option<&str> {
        self.attribute(CODEBASE_ATTRIBUTE)?.as_str()
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.parameter_types.len() == self.arguments.len()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invocation: method name '{}'; parameter types [{}]",
            self.method_name,
            self.parameter_types.join(", ")
        )
    }
}

/// The outcome of a dispatched [`Invocation`]: either the returned value or
/// the failure the operation raised, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvocationResult {
    Value(Value),
    Failure(RemoteFailure),
}

impl InvocationResult {
    /// Builds a result from what a service operation returned.
    pub fn from_outcome<T: Serialize>(
        outcome: std::result::Result<T, RemoteFailure>,
    ) -> Result<InvocationResult> {
        match outcome {
            Ok(value) => Ok(InvocationResult::Value(to_argument(&value)?)),
            Err(failure) => Ok(InvocationResult::Failure(failure)),
        }
    }

    pub fn has_failure(&self) -> bool {
        matches!(self, InvocationResult::Failure(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            InvocationResult::Value(v) => Some(v),
            InvocationResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RemoteFailure> {
        match self {
            InvocationResult::Value(_) => None,
            InvocationResult::Failure(f) => Some(f),
        }
    }

    /// Turns the result back into the calling convention of the operation.
    pub fn recreate(self) -> std::result::Result<Value, RemoteFailure> {
        match self {
            InvocationResult::Value(v) => Ok(v),
            InvocationResult::Failure(f) => Err(f),
        }
    }
}

/// Converts a call argument or a return value into its transport form.
pub fn to_argument<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| Error::new(ErrorKind::Serialization, err))
}

/// Takes the next positional argument and converts it to `T`.
///
/// A missing or unconvertible argument means the caller's view of the
/// operation does not match ours, so this is a dispatch error.
pub fn next_argument<T, I>(arguments: &mut I) -> Result<T>
where
    T: DeserializeOwned,
    I: Iterator<Item = Value>,
{
    let value = arguments
        .next()
        .ok_or_else(|| Error::new(ErrorKind::Dispatch, "missing argument"))?;
    serde_json::from_value(value).map_err(|err| Error::new(ErrorKind::Dispatch, err))
}
