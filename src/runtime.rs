//! The dispatch loop: every message funnels through here, one at a time.

use tokio::sync::mpsc;

use crate::application::Application;
use crate::command::CommandExecutor;
use crate::error::{DispatchError, StreamResult};
use crate::render::{NullBridge, RenderBridge};
use crate::stream::CommandStream;
use crate::supervisor::StreamSupervisor;
use crate::transition::Transition;

/// What travels on the dispatch queue: application messages plus the one
/// control signal the runtime understands.
enum Envelope<M> {
    Message(M),
    Shutdown,
}

/// Cloneable entry point for feeding messages into a runtime.
///
/// `dispatch` is synchronous and non-blocking from the caller's point of
/// view; the message is queued and processed in dispatch-call order by the
/// runtime's single consumer. Calling it from inside an in-flight
/// update/render cycle is fine: the message lands behind whatever is
/// already queued and is processed after the current cycle completes, so
/// reentrant dispatch can never grow the stack or interleave two `update`
/// calls.
pub struct Dispatcher<M> {
    sender: mpsc::UnboundedSender<Envelope<M>>,
}

impl<M: Send + 'static> Dispatcher<M> {
    /// Queue `message` for processing.
    ///
    /// After shutdown this logs a warning and drops the message; use
    /// [`Dispatcher::try_dispatch`] to observe that case instead.
    pub fn dispatch(&self, message: M) {
        if self.try_dispatch(message).is_err() {
            tracing::warn!("dispatch after runtime shutdown; message dropped");
        }
    }

    /// Queue `message`, reporting a stopped runtime instead of logging.
    pub fn try_dispatch(&self, message: M) -> Result<(), DispatchError> {
        self.sender
            .send(Envelope::Message(message))
            .map_err(|_| DispatchError::Closed)
    }
}

impl<M> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// External handle to a runtime: dispatch plus shutdown.
pub struct Handle<M> {
    dispatcher: Dispatcher<M>,
}

impl<M: Send + 'static> Handle<M> {
    /// A dispatcher for event bindings and external sources.
    pub fn dispatcher(&self) -> Dispatcher<M> {
        self.dispatcher.clone()
    }

    /// See [`Dispatcher::dispatch`].
    pub fn dispatch(&self, message: M) {
        self.dispatcher.dispatch(message);
    }

    /// Ask the runtime to stop once the messages already queued have been
    /// processed. Running stream tasks are cancelled, cleanup included,
    /// before [`Runtime::run`] returns.
    pub fn shutdown(&self) {
        let _ = self.dispatcher.sender.send(Envelope::Shutdown);
    }
}

impl<M> Clone for Handle<M> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

/// An MVU runtime: owns the model slot, the dispatch queue, the render
/// bridge, and the stream supervisor.
///
/// The model lives in a local slot inside [`Runtime::run`] and is reachable
/// only through the messages the loop processes; there is no global state,
/// so several independent runtimes can coexist in one process.
pub struct Runtime<A: Application> {
    application: A,
    bridge: Box<dyn RenderBridge<A::Model>>,
    supervisor: StreamSupervisor<A::Model, A::Message>,
    sender: mpsc::UnboundedSender<Envelope<A::Message>>,
    receiver: mpsc::UnboundedReceiver<Envelope<A::Message>>,
}

impl<A: Application> Runtime<A> {
    /// A headless runtime: frames go to a bridge that discards them.
    pub fn new(application: A) -> Self {
        Self::with_render_bridge(application, NullBridge)
    }

    /// A runtime rendering through `bridge`.
    pub fn with_render_bridge(
        application: A,
        bridge: impl RenderBridge<A::Model> + 'static,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            application,
            bridge: Box::new(bridge),
            supervisor: StreamSupervisor::new(),
            sender,
            receiver,
        }
    }

    /// Register a named command stream.
    ///
    /// `model_to_deps` projects the value the stream's lifecycle hangs on;
    /// `deps_to_stream` builds a fresh stream whenever that value changes.
    /// Deps are compared with their own `PartialEq`, so derive structural
    /// equality and keep floats and timestamps out of the projection:
    /// spurious inequality restarts the stream on every update, spurious
    /// equality leaves a stale one running. Keep both functions pure: they
    /// run on the dispatch task, and `deps_to_stream` side effects would
    /// escape the forked task's cancellation.
    pub fn stream<D>(
        &mut self,
        name: impl Into<String>,
        model_to_deps: impl Fn(&A::Model) -> D + Send + 'static,
        deps_to_stream: impl Fn(&D) -> CommandStream<A::Message> + Send + 'static,
    ) -> StreamResult<()>
    where
        D: PartialEq + Send + 'static,
    {
        self.supervisor
            .register(name.into(), model_to_deps, deps_to_stream)
    }

    /// A handle valid before and during [`Runtime::run`].
    pub fn handle(&self) -> Handle<A::Message> {
        Handle {
            dispatcher: self.dispatcher(),
        }
    }

    /// A dispatcher valid before and during [`Runtime::run`]. Messages
    /// dispatched before the loop starts are processed right after `init`.
    pub fn dispatcher(&self) -> Dispatcher<A::Message> {
        Dispatcher {
            sender: self.sender.clone(),
        }
    }

    /// Run the dispatch loop until [`Handle::shutdown`] is processed.
    ///
    /// `init` flows through the same pipeline as every later message:
    /// install the model, render it once, start the command batch, re-sync
    /// the streams. Then, strictly one message at a time and in dispatch
    /// order: `update` consumes the model and the message, the bridge
    /// renders the settled model, the commands fork, and every registered
    /// stream re-evaluates its deps against the new model.
    ///
    /// A panic inside `init` or `update` is a reducer fault and propagates
    /// to the caller: state consistency cannot be guaranteed past a broken
    /// reducer, so the runtime refuses to continue past one.
    pub async fn run(mut self) {
        let executor = CommandExecutor::new(self.dispatcher());
        tracing::info!(streams = self.supervisor.len(), "runtime starting");

        let Transition {
            mut model,
            commands,
        } = self.application.init();
        self.bridge.render_once(&model);
        for command in commands {
            executor.spawn(command);
        }
        self.supervisor.track(&model);
        self.supervisor.resync(&executor).await;

        while let Some(envelope) = self.receiver.recv().await {
            match envelope {
                Envelope::Message(message) => {
                    // No catch around the reducer: its panics must unwind
                    // out of run.
                    let next = self.application.update(model, message);
                    model = next.model;
                    self.bridge.render_once(&model);
                    for command in next.commands {
                        executor.spawn(command);
                    }
                    self.supervisor.track(&model);
                    self.supervisor.resync(&executor).await;
                }
                Envelope::Shutdown => break,
            }
        }

        self.supervisor.shutdown().await;
        tracing::info!("runtime stopped");
    }
}
