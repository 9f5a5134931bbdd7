use httpinvoker_protocol::{Invocation, InvocationResult, Result};

use crate::DispatchTable;

/// Performs a decoded invocation against the exported target.
///
/// Custom executors can look at the invocation's attributes (a security
/// context, say) before delegating to the dispatch table.
pub trait InvocationExecutor<T>: Send + Sync {
    fn invoke(&self, invocation: Invocation, target: &T, table: &DispatchTable<T>) -> Result<InvocationResult>;
}

impl<T, F> InvocationExecutor<T> for F
where
    F: Fn(Invocation, &T, &DispatchTable<T>) -> Result<InvocationResult> + Send + Sync,
{
    fn invoke(&self, invocation: Invocation, target: &T, table: &DispatchTable<T>) -> Result<InvocationResult> {
        self(invocation, target, table)
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct DefaultInvocationExecutor;

impl<T> InvocationExecutor<T> for DefaultInvocationExecutor {
    fn invoke(&self, invocation: Invocation, target: &T, table: &DispatchTable<T>) -> Result<InvocationResult> {
        table.dispatch(target, invocation)
    }
}
