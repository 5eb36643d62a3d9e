//! Dependency tracking for registered command streams.
//!
//! Each registered stream keeps the last `Deps` value its projection
//! produced. On every settled model the tracker re-projects and compares by
//! structural equality: unchanged deps leave the running task alone, changed
//! deps tell the supervisor to cancel and rebuild. The concrete deps type is
//! erased behind [`DepsTracker`] at registration, so equality always runs on
//! the typed side with the deps type's own `PartialEq`.

use crate::stream::CommandStream;

/// Object-safe face of one registered `{ model_to_deps, deps_to_stream }`
/// pair.
pub(crate) trait DepsTracker<Model, M>: Send {
    /// Project `model`, compare against the stored deps, store the new value
    /// when it differs. The first projection always counts as changed.
    fn deps_changed(&mut self, model: &Model) -> bool;

    /// Build a fresh stream from the stored deps. Meaningful only after
    /// `deps_changed` returned true at least once.
    fn build(&self) -> CommandStream<M>;
}

pub(crate) struct TrackedDescriptor<Model, M, D> {
    model_to_deps: Box<dyn Fn(&Model) -> D + Send>,
    deps_to_stream: Box<dyn Fn(&D) -> CommandStream<M> + Send>,
    last: Option<D>,
}

impl<Model, M, D> TrackedDescriptor<Model, M, D>
where
    Model: Send + 'static,
    M: Send + 'static,
    D: Send + 'static,
{
    pub(crate) fn new(
        model_to_deps: impl Fn(&Model) -> D + Send + 'static,
        deps_to_stream: impl Fn(&D) -> CommandStream<M> + Send + 'static,
    ) -> Self {
        Self {
            model_to_deps: Box::new(model_to_deps),
            deps_to_stream: Box::new(deps_to_stream),
            last: None,
        }
    }
}

impl<Model, M, D> DepsTracker<Model, M> for TrackedDescriptor<Model, M, D>
where
    Model: Send + 'static,
    M: Send + 'static,
    D: PartialEq + Send + 'static,
{
    fn deps_changed(&mut self, model: &Model) -> bool {
        let deps = (self.model_to_deps)(model);
        if self.last.as_ref() == Some(&deps) {
            return false;
        }
        self.last = Some(deps);
        true
    }

    fn build(&self) -> CommandStream<M> {
        match &self.last {
            Some(deps) => (self.deps_to_stream)(deps),
            None => CommandStream::empty(),
        }
    }
}
