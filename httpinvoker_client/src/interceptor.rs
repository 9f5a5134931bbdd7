use std::{fmt, sync::Arc};

use httpinvoker_protocol::{Error, ErrorKind, Invocation, Result, Value, CODEBASE_ATTRIBUTE};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{ClientConfiguration, EndpointConfig, Opt, RequestExecutor, SimpleRequestExecutor};

/// Name of the operation answered locally instead of remotely.
pub const TO_STRING: &str = "to_string";

/// An intercepted local call: which operation and with what.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method_name: String,
    pub parameter_types: Vec<String>,
    pub arguments: Vec<Value>,
}

impl MethodCall {
    pub fn new<S: Into<String>>(method_name: S, parameter_types: &[&str], arguments: Vec<Value>) -> Self {
        MethodCall {
            method_name: method_name.into(),
            parameter_types: parameter_types.iter().map(|t| (*t).to_owned()).collect(),
            arguments,
        }
    }

    pub fn is_to_string(&self) -> bool {
        self.method_name == TO_STRING && self.parameter_types.is_empty()
    }
}

/// Turns an intercepted call into the invocation that goes on the wire.
///
/// Custom factories typically attach attributes such as a security context.
pub trait InvocationFactory: Send + Sync {
    fn create_invocation(&self, call: MethodCall) -> Result<Invocation>;
}

impl<F> InvocationFactory for F
where
    F: Fn(MethodCall) -> Result<Invocation> + Send + Sync,
{
    fn create_invocation(&self, call: MethodCall) -> Result<Invocation> {
        self(call)
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct DefaultInvocationFactory;

impl InvocationFactory for DefaultInvocationFactory {
    fn create_invocation(&self, call: MethodCall) -> Result<Invocation> {
        Invocation::new(call.method_name, call.parameter_types, call.arguments)
    }
}

/// The call-site side of remoting.
///
/// Builds an invocation per call, has the executor run it, and hands back
/// either the returned value or the remote failure as an
/// [`ErrorKind::Application`] error. Transport errors keep their kind so a
/// caller can tell "never reached the service" from "the service failed".
#[derive(Clone)]
pub struct ClientInterceptor {
    config: EndpointConfig,
    executor: Arc<dyn RequestExecutor>,
    factory: Arc<dyn InvocationFactory>,
}

impl ClientInterceptor {
    /// Uses the direct executor with default options.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let executor = SimpleRequestExecutor::simple(Opt::default())?;
        Ok(ClientInterceptor::with_executor(config, Arc::new(executor)))
    }

    pub fn connect<S: Into<String>>(service_url: S) -> Result<Self> {
        ClientInterceptor::new(EndpointConfig::new(service_url)?)
    }

    pub fn with_executor(config: EndpointConfig, executor: Arc<dyn RequestExecutor>) -> Self {
        ClientInterceptor {
            config,
            executor,
            factory: Arc::new(DefaultInvocationFactory),
        }
    }

    pub fn set_executor(&mut self, executor: Arc<dyn RequestExecutor>) {
        self.executor = executor;
    }

    pub fn set_invocation_factory(&mut self, factory: Arc<dyn InvocationFactory>) {
        self.factory = factory;
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// What the local `to_string` short-circuit answers.
    pub fn describe(&self) -> String {
        format!(
            "HTTP invoker proxy for service URL [{}]",
            self.config.service_url()
        )
    }

    /// Calls `method_name` remotely and converts the returned value to `R`.
    ///
    /// A value that does not convert is a `Client` error: the service did
    /// run the call, the caller expected another return type.
    pub fn invoke<R: DeserializeOwned>(
        &self,
        method_name: &str,
        parameter_types: &[&str],
        arguments: Vec<Value>,
    ) -> Result<R> {
        let value = self.invoke_call(MethodCall::new(method_name, parameter_types, arguments))?;
        serde_json::from_value(value).map_err(|err| {
            Error::new(ErrorKind::Client, err).context(format!(
                "unexpected return value of '{}' from HTTP invoker remote service [{}]",
                method_name,
                self.config.service_url()
            ))
        })
    }

    pub fn invoke_call(&self, call: MethodCall) -> Result<Value> {
        if call.is_to_string() {
            return Ok(Value::String(self.describe()));
        }

        let mut invocation = self.factory.create_invocation(call)?;
        if let Some(codebase) = self.config.codebase_url() {
            if invocation.attribute(CODEBASE_ATTRIBUTE).is_none() {
                invocation.add_attribute(CODEBASE_ATTRIBUTE, Value::from(codebase))?;
            }
        }

        let result = self
            .executor
            .execute(self, &invocation)
            .map_err(|err| self.convert_access_error(err))?;
        if let Some(failure) = result.failure() {
            debug!(method = invocation.method_name(), failure = %failure, "remote operation failed");
        }
        result.recreate().map_err(Error::from_failure)
    }

    fn convert_access_error(&self, err: Error) -> Error {
        let url = self.config.service_url();
        let message = match err.kind() {
            ErrorKind::Network => format!("could not connect to HTTP invoker remote service at [{}]", url),
            ErrorKind::Protocol => format!("could not access HTTP invoker remote service at [{}]", url),
            ErrorKind::Serialization => format!(
                "could not deserialize result from HTTP invoker remote service [{}]",
                url
            ),
            _ => return err,
        };
        warn!(url, kind = %err.kind(), "{}", err);
        err.context(message)
    }
}

impl ClientConfiguration for ClientInterceptor {
    fn service_url(&self) -> &str {
        self.config.service_url()
    }

    fn codebase_url(&self) -> Option<&str> {
        self.config.codebase_url()
    }
}

impl fmt::Debug for ClientInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientInterceptor")
            .field("config", &self.config)
            .finish()
    }
}
