use std::{collections::HashMap, fmt};

use httpinvoker_protocol::{
    normalize_descriptor, Error, ErrorKind, Invocation, InvocationResult, Result, TypeRegistry, Value,
};

/// A registered operation: receives the target and the positional
/// arguments, returns the captured outcome.
pub type DispatchFn<T> = Box<dyn Fn(&T, Vec<Value>) -> Result<InvocationResult> + Send + Sync>;

/// Identity of an operation: its name plus its normalized parameter type
/// descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub method_name: String,
    pub parameter_types: Vec<String>,
}

impl Signature {
    pub fn new<S: Into<String>>(method_name: S, parameter_types: &[&str]) -> Self {
        Signature {
            method_name: method_name.into(),
            parameter_types: parameter_types.iter().map(|t| normalize_descriptor(t)).collect(),
        }
    }

    fn of(invocation: &Invocation) -> Self {
        Signature {
            method_name: invocation.method_name().to_owned(),
            parameter_types: invocation
                .parameter_types()
                .iter()
                .map(|t| normalize_descriptor(t))
                .collect(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.method_name, self.parameter_types.join(", "))
    }
}

/// Statically registered operations of an exported service.
///
/// Built once when the service is exported and read-only afterwards.
pub struct DispatchTable<T> {
    operations: HashMap<Signature, DispatchFn<T>>,
}

impl<T> Default for DispatchTable<T> {
    fn default() -> Self {
        DispatchTable {
            operations: HashMap::new(),
        }
    }
}

impl<T> DispatchTable<T> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `f` under `method_name` and `parameter_types`, replacing
    /// any operation with the same signature.
    pub fn register<S, F>(&mut self, method_name: S, parameter_types: &[&str], f: F)
    where
        S: Into<String>,
        F: Fn(&T, Vec<Value>) -> Result<InvocationResult> + Send + Sync + 'static,
    {
        self.operations
            .insert(Signature::new(method_name, parameter_types), Box::new(f));
    }

    pub fn resolve(&self, invocation: &Invocation) -> Result<&DispatchFn<T>> {
        let signature = Signature::of(invocation);
        self.operations.get(&signature).ok_or_else(|| {
            Error::new(
                ErrorKind::Dispatch,
                format!("no operation {} on exported service", signature),
            )
        })
    }

    pub fn dispatch(&self, target: &T, invocation: Invocation) -> Result<InvocationResult> {
        let f = self.resolve(&invocation)?;
        f(target, invocation.into_arguments())
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.operations.contains_key(signature)
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.operations.keys()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Every parameter type some operation accepts.
    pub fn type_registry(&self) -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        for signature in self.operations.keys() {
            for descriptor in &signature.parameter_types {
                registry.register(descriptor.as_str());
            }
        }
        registry
    }
}

impl<T> fmt::Debug for DispatchTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.operations.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpinvoker_protocol::{next_argument, RemoteFailure};

    struct Greeter;

    impl Greeter {
        fn greet(&self, name: String) -> std::result::Result<String, RemoteFailure> {
            if name.is_empty() {
                return Err(RemoteFailure::new("IllegalArgument", "empty name"));
            }
            Ok(format!("hello {}", name))
        }
    }

    fn table() -> DispatchTable<Greeter> {
        let mut table = DispatchTable::new();
        table.register("greet", &["String"], |target: &Greeter, args| {
            let mut args = args.into_iter();
            let name = next_argument(&mut args)?;
            InvocationResult::from_outcome(target.greet(name))
        });
        table.register("greet", &[], |target: &Greeter, _| {
            InvocationResult::from_outcome(target.greet("world".to_owned()))
        });
        table
    }

    fn invocation(types: &[&str], args: Vec<Value>) -> Invocation {
        Invocation::new("greet", types.iter().map(|t| (*t).to_owned()).collect(), args).unwrap()
    }

    #[test]
    fn resolves_overloads_by_parameter_types() {
        let table = table();
        assert_eq!(2, table.len());

        let result = table
            .dispatch(&Greeter, invocation(&["String"], vec![Value::from("bob")]))
            .unwrap();
        assert_eq!(Some(&Value::from("hello bob")), result.value());

        let result = table.dispatch(&Greeter, invocation(&[], vec![])).unwrap();
        assert_eq!(Some(&Value::from("hello world")), result.value());
    }

    #[test]
    fn application_failure_is_captured() {
        let result = table()
            .dispatch(&Greeter, invocation(&["String"], vec![Value::from("")]))
            .unwrap();
        assert!(result.has_failure());
        assert!(result.failure().unwrap().is("IllegalArgument"));
    }

    #[test]
    fn unresolved_operations_are_dispatch_errors() {
        let table = table();

        let err = table
            .dispatch(&Greeter, invocation(&["i32"], vec![Value::from(1)]))
            .unwrap_err();
        assert_eq!(ErrorKind::Dispatch, err.kind());
        assert!(err.to_string().contains("greet(i32)"));

        // right signature, wrong argument value
        let err = table
            .dispatch(&Greeter, invocation(&["String"], vec![Value::from(1)]))
            .unwrap_err();
        assert_eq!(ErrorKind::Dispatch, err.kind());
    }

    #[test]
    fn descriptor_spacing_does_not_matter() {
        let mut table = DispatchTable::new();
        table.register("count", &["Vec < String >"], |_: &Greeter, args| {
            let mut args = args.into_iter();
            let names: Vec<String> = next_argument(&mut args)?;
            InvocationResult::from_outcome(Ok::<_, RemoteFailure>(names.len()))
        });
        assert!(table.contains(&Signature::new("count", &["Vec<String>"])));

        let invocation = Invocation::new(
            "count",
            vec!["Vec<String >".to_owned()],
            vec![Value::from(vec!["a", "b"])],
        )
        .unwrap();
        let result = table.dispatch(&Greeter, invocation).unwrap();
        assert_eq!(Some(&Value::from(2)), result.value());
    }

    #[test]
    fn type_registry_covers_all_parameter_types() {
        let registry = table().type_registry();
        assert!(registry.is_known("String"));
        assert!(!registry.is_known("i32"));
    }
}
