//! Agent context registry.
//!
//! Tools run deep inside nested agent and team calls and sometimes need to
//! know which agent invoked them. Instead of threading the agent through every
//! call boundary, the executing agent is bound to a tokio task-local slot for
//! the duration of its call.
//!
//! Bindings nest: an inner [`bind`] shadows the outer one and the previous
//! value is restored when the inner scope ends, including on error, panic, or
//! when the future is dropped. Each task, and each future polled inside its
//! own scope, sees only its own binding, so concurrent conversations never
//! observe each other's agent. Tasks spawned with `tokio::spawn` start with no
//! binding.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};

use crate::agent::AgentRef;

tokio::task_local! {
    static CURRENT_AGENT: AgentRef;
}

/// Run `future` with `agent` bound as the current agent.
pub async fn bind<F: Future>(agent: AgentRef, future: F) -> F::Output {
    CURRENT_AGENT.scope(agent, future).await
}

/// Run `f` synchronously with `agent` bound as the current agent.
pub fn bind_sync<F, R>(agent: AgentRef, f: F) -> R
where
    F: FnOnce() -> R,
{
    CURRENT_AGENT.sync_scope(agent, f)
}

/// The agent bound to the current execution context, if any.
pub fn current() -> Option<AgentRef> {
    CURRENT_AGENT.try_with(|agent| agent.clone()).ok()
}

/// Name of the current agent, if any.
pub fn current_name() -> Option<String> {
    CURRENT_AGENT.try_with(|agent| agent.name().to_string()).ok()
}

/// Bind `agent` for every poll of `stream`.
pub fn bind_stream<S>(agent: AgentRef, stream: S) -> BoundStream<S>
where
    S: Stream + Unpin,
{
    BoundStream { agent, inner: stream }
}

/// Stream adapter that binds an agent around each poll of the inner stream.
pub struct BoundStream<S> {
    agent: AgentRef,
    inner: S,
}

impl<S> Stream for BoundStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let agent = this.agent.clone();
        let inner = &mut this.inner;
        CURRENT_AGENT.sync_scope(agent, || inner.poll_next_unpin(cx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
