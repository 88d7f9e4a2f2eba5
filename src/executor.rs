//! The work performed for each admitted item.

use std::{fmt::Display, future::Future};

use futures::future::BoxFuture;

/// Performs the work for one admitted payload.
///
/// [Executor::execute] is called by the admission loop itself, once per payload, in admission
/// order. It should return quickly: the work belongs in the returned future, which runs on its own
/// task.
///
/// Implemented for any `Fn(P) -> impl Future<Output = Result<(), E>>`, so an async closure is
/// usually enough:
///
/// ```
/// use latency_gate::Executor;
///
/// fn assert_executor<P, E: Executor<P>>(_: &E) {}
///
/// let executor = |id: u64| async move {
///     if id == 0 {
///         return Err(format!("bad id {id}"));
///     }
///     Ok(())
/// };
/// assert_executor::<u64, _>(&executor);
/// ```
pub trait Executor<P>: Send + Sync + 'static {
    /// Why an execution failed.
    type Error: Display + Send + 'static;

    /// Start the work for `payload`. The returned future runs it to completion.
    fn execute(&self, payload: P) -> BoxFuture<'static, Result<(), Self::Error>>;
}

impl<P, E, F, Fut> Executor<P> for F
where
    E: Display + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    type Error = E;

    fn execute(&self, payload: P) -> BoxFuture<'static, Result<(), E>> {
        Box::pin((self)(payload))
    }
}
