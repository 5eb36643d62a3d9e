//! The author-facing seam: a model, a message type, and the reducer.

use crate::transition::Transition;

/// An MVU application: `init` supplies the first model, `update` is the
/// reducer.
///
/// State changes by substitution: `update` takes the current model by value
/// and returns its replacement, so no stale reference can outlive the cycle
/// that produced it. Both functions run on the dispatch task and must not
/// block; long-running or fallible work belongs in [`Command`]s.
///
/// Messages are best modeled as one closed enum matched exhaustively in
/// `update`; the runtime never looks inside them.
///
/// [`Command`]: crate::command::Command
pub trait Application: Send + 'static {
    /// The whole application state at one instant.
    type Model: Send + 'static;

    /// Events the reducer consumes; produced by render-bridge event
    /// bindings, resolved commands, and command streams.
    type Message: Send + 'static;

    /// The first model plus the commands to start immediately. Processed
    /// through the same pipeline as every later message, before any external
    /// message is seen.
    fn init(&self) -> Transition<Self::Model, Self::Message>;

    /// Consume the current model and one message, produce the next model
    /// plus follow-up commands.
    ///
    /// A panic here is a reducer fault: the runtime makes no attempt to
    /// recover and propagates it out of [`Runtime::run`].
    ///
    /// [`Runtime::run`]: crate::runtime::Runtime::run
    fn update(
        &self,
        model: Self::Model,
        message: Self::Message,
    ) -> Transition<Self::Model, Self::Message>;
}
