use std::{collections::HashSet, fmt, sync::Arc};

use crate::{Error, ErrorKind, Result};

/// Canonical form of a parameter type descriptor: whitespace removed, so
/// `Vec < String >` and `Vec<String>` name the same type however the
/// declaring toolchain spaced the stringified type.
pub fn normalize_descriptor(descriptor: &str) -> String {
    descriptor.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Hook consulted for parameter types the registry does not know yet.
///
/// `codebase` is the hint the caller attached to the invocation, if any.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, descriptor: &str, codebase: Option<&str>) -> bool;
}

impl<F> TypeResolver for F
where
    F: Fn(&str, Option<&str>) -> bool + Send + Sync,
{
    fn resolve(&self, descriptor: &str, codebase: Option<&str>) -> bool {
        self(descriptor, codebase)
    }
}

/// The set of parameter type descriptors a receiver can decode.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    known: HashSet<String>,
    resolver: Option<Arc<dyn TypeResolver>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register<S: AsRef<str>>(&mut self, descriptor: S) {
        self.known.insert(normalize_descriptor(descriptor.as_ref()));
    }

    pub fn set_resolver(&mut self, resolver: Arc<dyn TypeResolver>) {
        self.resolver = Some(resolver);
    }

    pub fn is_known(&self, descriptor: &str) -> bool {
        self.known.contains(&normalize_descriptor(descriptor))
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Fails with a serialization error when `descriptor` is neither known
    /// nor accepted by the resolver.
    pub fn check(&self, descriptor: &str, codebase: Option<&str>) -> Result<()> {
        if self.is_known(descriptor) {
            return Ok(());
        }
        if let Some(ref resolver) = self.resolver {
            if resolver.resolve(descriptor, codebase) {
                tracing::debug!(descriptor, ?codebase, "resolved unknown parameter type");
                return Ok(());
            }
        }
        Err(Error::new(
            ErrorKind::Serialization,
            format!("unknown parameter type '{}'", descriptor),
        ))
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("known", &self.known)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_is_asked_for_unknown_types_only() {
        let mut registry = TypeRegistry::new();
        registry.register("i32");
        assert!(registry.check("i32", None).is_ok());
        assert_eq!(
            ErrorKind::Serialization,
            registry.check("Point", None).unwrap_err().kind()
        );

        registry.set_resolver(Arc::new(|descriptor: &str, codebase: Option<&str>| {
            descriptor == "Point" && codebase == Some("http://types.example/")
        }));
        assert!(registry.check("Point", Some("http://types.example/")).is_ok());
        assert!(registry.check("Point", None).is_err());
        assert!(registry.check("Line", Some("http://types.example/")).is_err());
    }

    #[test]
    fn descriptors_ignore_whitespace() {
        assert_eq!("HashMap<String,Vec<u8>>", normalize_descriptor("HashMap < String, Vec<u8> >"));

        let mut registry = TypeRegistry::new();
        registry.register("Option < u32 >");
        assert!(registry.is_known("Option<u32>"));
        assert_eq!(1, registry.len());
    }
}
