//! Stream supervision: at most one running task per registered stream.

use futures::StreamExt;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::command::CommandExecutor;
use crate::descriptor::{DepsTracker, TrackedDescriptor};
use crate::error::{StreamError, StreamResult};
use crate::stream::CommandStream;

/// One registered stream: its deps tracker plus the running task, if any.
struct StreamSlot<Model, M> {
    name: String,
    tracker: Box<dyn DepsTracker<Model, M>>,
    task: Option<RunningTask>,
    /// Set by [`StreamSupervisor::track`], consumed by the restart pass.
    stale: bool,
}

/// A forked consumer task plus the id its log lines carry, fork to cancel.
struct RunningTask {
    id: Uuid,
    handle: JoinHandle<()>,
}

/// Owns every registered command stream and its running task.
///
/// Restart discipline is strict two-phase: the previous task is aborted and
/// awaited to completion, cleanup included, before the replacement is
/// forked. No two tasks for one name are ever live together, and slots
/// never affect each other.
pub(crate) struct StreamSupervisor<Model, M> {
    slots: Vec<StreamSlot<Model, M>>,
}

impl<Model, M> StreamSupervisor<Model, M>
where
    Model: Send + 'static,
    M: Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Register a named descriptor. Names key supervisor slots and show up
    /// in logs; they must be unique and non-empty.
    pub(crate) fn register<D>(
        &mut self,
        name: String,
        model_to_deps: impl Fn(&Model) -> D + Send + 'static,
        deps_to_stream: impl Fn(&D) -> CommandStream<M> + Send + 'static,
    ) -> StreamResult<()>
    where
        D: PartialEq + Send + 'static,
    {
        if name.is_empty() {
            return Err(StreamError::EmptyName);
        }
        if self.slots.iter().any(|slot| slot.name == name) {
            return Err(StreamError::DuplicateName(name));
        }
        self.slots.push(StreamSlot {
            name,
            tracker: Box::new(TrackedDescriptor::new(model_to_deps, deps_to_stream)),
            task: None,
            stale: false,
        });
        Ok(())
    }

    /// Project every slot's deps against the settled model, marking the
    /// slots whose stream must be restarted. Synchronous: the model is not
    /// borrowed past this call.
    pub(crate) fn track(&mut self, model: &Model) {
        for slot in &mut self.slots {
            if slot.tracker.deps_changed(model) {
                slot.stale = true;
            }
        }
    }

    /// Restart every slot [`track`](Self::track) marked stale: abort and
    /// await the old task, then build and fork the replacement.
    pub(crate) async fn resync(&mut self, executor: &CommandExecutor<M>) {
        for slot in &mut self.slots {
            if !slot.stale {
                continue;
            }
            slot.stale = false;
            if let Some(task) = slot.task.take() {
                cancel(&slot.name, task).await;
            }
            let stream = slot.tracker.build();
            slot.task = Some(fork(&slot.name, stream, executor.clone()));
        }
    }

    /// Cancel every running task; used at runtime shutdown.
    pub(crate) async fn shutdown(&mut self) {
        for slot in &mut self.slots {
            if let Some(task) = slot.task.take() {
                cancel(&slot.name, task).await;
            }
        }
    }
}

/// Abort a running task and wait for it to wind down. Its cleanup has run to
/// completion by the time this returns, so the slot is genuinely free.
async fn cancel(name: &str, task: RunningTask) {
    let RunningTask { id, handle } = task;
    handle.abort();
    match handle.await {
        Ok(()) => {
            tracing::debug!(stream = %name, task = %id, "stream task had already completed");
        }
        Err(err) if err.is_cancelled() => {
            tracing::debug!(stream = %name, task = %id, "stream task cancelled");
        }
        Err(err) => {
            tracing::error!(stream = %name, task = %id, error = %err, "stream task panicked");
        }
    }
}

/// Fork the consumer task for a freshly built stream. Every yielded command
/// goes through the shared executor, so commands outlive the stream that
/// produced them. The fork line precedes the spawn: a task cancelled before
/// its first poll has still announced the id its cancel line carries.
fn fork<M: Send + 'static>(
    name: &str,
    stream: CommandStream<M>,
    executor: CommandExecutor<M>,
) -> RunningTask {
    let id = Uuid::new_v4();
    tracing::debug!(stream = %name, task = %id, "stream task forked");
    let name = name.to_owned();
    let handle = tokio::spawn(async move {
        let mut commands = stream.into_inner();
        while let Some(command) = commands.next().await {
            executor.spawn(command);
        }
        tracing::debug!(stream = %name, task = %id, "stream source ended");
    });
    RunningTask { id, handle }
}
