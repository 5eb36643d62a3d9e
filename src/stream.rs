//! Long-lived command streams and their building blocks.
//!
//! A [`CommandStream`] is a lazy, possibly-infinite sequence of
//! [`Command`]s. Streams do nothing on their own: the supervisor forks a
//! task to consume one, and a restarted subscription is always a brand-new
//! stream built from the latest deps, never a resumed one.
//!
//! A stream whose backing resource dies should emit a terminal failure
//! command before ending, so the application learns about the loss instead
//! of silently losing its subscription. That contract belongs to the stream
//! author; the runtime only guarantees delivery and ordering of whatever is
//! emitted.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::command::Command;

/// Cleanup closure returned by a source registrar; runs exactly once, when
/// the stream task is cancelled or the source ends on its own.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// A lazy, possibly-infinite sequence of commands.
pub struct CommandStream<M> {
    inner: BoxStream<'static, Command<M>>,
}

impl<M: Send + 'static> CommandStream<M> {
    /// A stream that never emits. The canonical "no subscription for these
    /// deps" value.
    pub fn empty() -> Self {
        Self {
            inner: stream::empty().boxed(),
        }
    }

    /// Wrap any stream of commands.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Command<M>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    /// Emit `f(tick_index)` every `period`, first tick one period from now.
    pub fn every<F>(period: Duration, f: F) -> Self
    where
        F: Fn(u64) -> M + Send + 'static,
    {
        let start = tokio::time::Instant::now() + period;
        let interval = tokio::time::interval_at(start, period);
        Self::from_stream(stream::unfold(
            (interval, 0u64, f),
            |(mut interval, tick, f)| async move {
                interval.tick().await;
                let message = f(tick);
                let command = Command::named("tick", async move { message });
                Some((command, (interval, tick + 1, f)))
            },
        ))
    }

    /// Bridge an event-callback source into a stream.
    ///
    /// The registrar runs lazily, on first poll inside the forked stream
    /// task: it receives a [`StreamEmitter`] to hook into the source's
    /// callbacks and returns the cleanup that tears the wiring down. Cleanup
    /// runs exactly once, when the supervisor cancels the task or when the
    /// stream ends because every emitter was dropped.
    pub fn from_source<R>(registrar: R) -> Self
    where
        R: FnOnce(StreamEmitter<M>) -> Cleanup + Send + Unpin + 'static,
    {
        Self {
            inner: CallbackSource {
                registrar: Some(registrar),
                receiver: None,
                cleanup: None,
            }
            .boxed(),
        }
    }

    /// Gate the whole stream: `false` yields the empty stream.
    pub fn when(self, enabled: bool) -> Self {
        if enabled {
            self
        } else {
            Self::empty()
        }
    }

    /// Re-tag every yielded command with `f`.
    pub fn map<N, F>(self, f: F) -> CommandStream<N>
    where
        N: Send + 'static,
        F: Fn(M) -> N + Clone + Send + 'static,
    {
        CommandStream {
            inner: self
                .inner
                .map(move |command| command.map(f.clone()))
                .boxed(),
        }
    }

    pub(crate) fn into_inner(self) -> BoxStream<'static, Command<M>> {
        self.inner
    }
}

impl<M> fmt::Debug for CommandStream<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CommandStream")
    }
}

/// Sends commands out of a callback-style source into its stream.
///
/// Emitting after the stream task is gone silently drops the command; a
/// cancelled subscription has no one left to tell.
pub struct StreamEmitter<M> {
    sender: mpsc::UnboundedSender<Command<M>>,
}

impl<M: Send + 'static> StreamEmitter<M> {
    /// Emit one command.
    pub fn emit(&self, command: Command<M>) {
        let _ = self.sender.send(command);
    }

    /// Emit a plain message, the common case.
    pub fn send(&self, message: M) {
        self.emit(Command::message(message));
    }
}

impl<M> Clone for StreamEmitter<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M> fmt::Debug for StreamEmitter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamEmitter")
    }
}

/// State machine behind [`CommandStream::from_source`].
///
/// Registration happens on first poll so construction stays effect-free;
/// cleanup lives in `Drop` so it also runs when the consuming task is
/// aborted mid-poll.
struct CallbackSource<M, R>
where
    R: FnOnce(StreamEmitter<M>) -> Cleanup,
{
    registrar: Option<R>,
    receiver: Option<mpsc::UnboundedReceiver<Command<M>>>,
    cleanup: Option<Cleanup>,
}

impl<M, R> CallbackSource<M, R>
where
    R: FnOnce(StreamEmitter<M>) -> Cleanup,
{
    fn run_cleanup(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl<M, R> Stream for CallbackSource<M, R>
where
    M: Send + 'static,
    R: FnOnce(StreamEmitter<M>) -> Cleanup + Send + Unpin,
{
    type Item = Command<M>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(registrar) = this.registrar.take() {
            let (sender, receiver) = mpsc::unbounded_channel();
            this.receiver = Some(receiver);
            this.cleanup = Some(registrar(StreamEmitter { sender }));
        }
        match this.receiver.as_mut() {
            Some(receiver) => match receiver.poll_recv(cx) {
                Poll::Ready(None) => {
                    this.run_cleanup();
                    Poll::Ready(None)
                }
                other => other,
            },
            None => Poll::Ready(None),
        }
    }
}

impl<M, R> Drop for CallbackSource<M, R>
where
    R: FnOnce(StreamEmitter<M>) -> Cleanup,
{
    fn drop(&mut self) {
        self.run_cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_pending, task};

    async fn resolve(command: Command<u32>) -> u32 {
        command.into_parts().1.await
    }

    #[tokio::test]
    async fn test_empty_stream_yields_nothing() {
        let mut stream = CommandStream::<u32>::empty().into_inner();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_when_false_gates_the_stream() {
        let ticker = CommandStream::from_stream(stream::iter(vec![Command::message(1u32)]));
        let mut gated = ticker.when(false).into_inner();
        assert!(gated.next().await.is_none());

        let ticker = CommandStream::from_stream(stream::iter(vec![Command::message(1u32)]));
        let mut open = ticker.when(true).into_inner();
        assert_eq!(resolve(open.next().await.unwrap()).await, 1);
    }

    #[tokio::test]
    async fn test_map_retags_every_command() {
        let source = CommandStream::from_stream(stream::iter(vec![
            Command::message(1u32),
            Command::message(2),
        ]));
        let mut mapped = source.map(|n| n * 10).into_inner();
        assert_eq!(resolve(mapped.next().await.unwrap()).await, 10);
        assert_eq!(resolve(mapped.next().await.unwrap()).await, 20);
        assert!(mapped.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_ticks_on_the_period() {
        let mut ticks = CommandStream::every(Duration::from_secs(1), |tick| tick as u32)
            .into_inner();
        assert_eq!(resolve(ticks.next().await.unwrap()).await, 0);
        assert_eq!(resolve(ticks.next().await.unwrap()).await, 1);
        assert_eq!(resolve(ticks.next().await.unwrap()).await, 2);
    }

    #[test]
    fn test_source_registration_is_lazy_and_cleanup_runs_on_drop() {
        let registered = Arc::new(AtomicUsize::new(0));
        let cleaned = Arc::new(AtomicUsize::new(0));

        let stream = {
            let registered = registered.clone();
            let cleaned = cleaned.clone();
            CommandStream::<u32>::from_source(move |emitter| {
                registered.fetch_add(1, Ordering::SeqCst);
                Box::new(move || {
                    // Holding the emitter keeps the source open until cleanup.
                    drop(emitter);
                    cleaned.fetch_add(1, Ordering::SeqCst);
                })
            })
        };

        let mut consumer = task::spawn(stream.into_inner());
        assert_eq!(registered.load(Ordering::SeqCst), 0);

        assert_pending!(consumer.poll_next());
        assert_eq!(registered.load(Ordering::SeqCst), 1);
        assert_eq!(cleaned.load(Ordering::SeqCst), 0);

        drop(consumer);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_source_ends_and_cleans_up_when_emitters_drop() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let stream = {
            let cleaned = cleaned.clone();
            CommandStream::<u32>::from_source(move |emitter| {
                emitter.send(4);
                emitter.send(5);
                // The emitter drops here, closing the source.
                Box::new(move || {
                    cleaned.fetch_add(1, Ordering::SeqCst);
                })
            })
        };

        let mut stream = stream.into_inner();
        assert_eq!(resolve(stream.next().await.unwrap()).await, 4);
        assert_eq!(resolve(stream.next().await.unwrap()).await, 5);
        assert!(stream.next().await.is_none());
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);

        // Dropping after a natural end must not run cleanup twice.
        drop(stream);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }
}
