//! One-shot commands and the executor that runs them.
//!
//! A [`Command`] wraps a single asynchronous effect that resolves to exactly
//! one message. Commands never fail visibly: fallible work maps its `Result`
//! into a message inside the future, conventionally a dedicated failure
//! variant. A panic inside a command is a defect; the executor reports it
//! on the diagnostic log channel and the command simply never produces a
//! message.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::{BoxFuture, FutureExt};

use crate::runtime::Dispatcher;

/// A one-shot asynchronous effect yielding exactly one message.
///
/// Created by `init`/`update`, handed to the runtime, executed exactly once,
/// discarded after its message is dispatched. One-shot commands are not
/// individually cancellable; cancellable behavior belongs in a one-element
/// [`CommandStream`](crate::stream::CommandStream).
pub struct Command<M> {
    name: Cow<'static, str>,
    future: BoxFuture<'static, M>,
}

impl<M: Send + 'static> Command<M> {
    /// Wrap a future as an anonymous command.
    pub fn perform<F>(future: F) -> Self
    where
        F: Future<Output = M> + Send + 'static,
    {
        Self::named("command", future)
    }

    /// Wrap a future as a named command.
    ///
    /// The name shows up in diagnostics when the command panics instead of
    /// resolving, so give external effects names worth reading in a log.
    pub fn named<F>(name: impl Into<Cow<'static, str>>, future: F) -> Self
    where
        F: Future<Output = M> + Send + 'static,
    {
        Self {
            name: name.into(),
            future: future.boxed(),
        }
    }

    /// A command that resolves immediately with `message`.
    pub fn message(message: M) -> Self {
        Self::named("message", async move { message })
    }

    /// Map the resolved message into another message type.
    pub fn map<N, F>(self, f: F) -> Command<N>
    where
        N: Send + 'static,
        F: FnOnce(M) -> N + Send + 'static,
    {
        Command {
            name: self.name,
            future: self.future.map(f).boxed(),
        }
    }

    /// The diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (Cow<'static, str>, BoxFuture<'static, M>) {
        (self.name, self.future)
    }
}

impl<M> fmt::Debug for Command<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish()
    }
}

/// Runs commands on the async substrate and feeds each result back into the
/// dispatch queue.
///
/// Shared by the dispatch loop and every forked stream task, so commands
/// yielded by a stream take the same path as commands returned from
/// `update`, and they survive the stream that produced them.
pub(crate) struct CommandExecutor<M> {
    dispatcher: Dispatcher<M>,
}

impl<M: Send + 'static> CommandExecutor<M> {
    pub(crate) fn new(dispatcher: Dispatcher<M>) -> Self {
        Self { dispatcher }
    }

    /// Start `command` on a fresh task, fire-and-forget.
    ///
    /// The resolved message re-enters through the dispatcher. A panicking
    /// command is logged with its name and payload instead of producing a
    /// message; sibling commands and the loop itself are unaffected.
    pub(crate) fn spawn(&self, command: Command<M>) {
        let dispatcher = self.dispatcher.clone();
        let (name, future) = command.into_parts();
        tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(message) => dispatcher.dispatch(message),
                Err(payload) => tracing::error!(
                    command = %name,
                    panic = panic_message(payload.as_ref()),
                    "command panicked without producing a message"
                ),
            }
        });
    }
}

impl<M> Clone for CommandExecutor<M> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

/// Best-effort extraction of a panic payload's message.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
