//! The render boundary and the memoized-view cache.

use std::collections::HashMap;
use std::sync::Arc;

/// Boundary to the external renderer.
///
/// The dispatch loop calls `render_once` with the settled model after every
/// processed message (and once with the init model), then moves straight on;
/// it never waits for a frame. An implementation may batch or coalesce rapid
/// updates internally, as long as the final model is eventually drawn.
///
/// Event handlers wired up by the renderer feed back through
/// [`Dispatcher::dispatch`](crate::runtime::Dispatcher::dispatch); calling it
/// synchronously from inside `render_once` is safe and queues the message
/// behind the current cycle.
pub trait RenderBridge<Model>: Send {
    fn render_once(&mut self, model: &Model);
}

/// Adapts a closure into a bridge.
pub struct FnBridge<F>(pub F);

impl<Model, F> RenderBridge<Model> for FnBridge<F>
where
    F: FnMut(&Model) + Send,
{
    fn render_once(&mut self, model: &Model) {
        (self.0)(model)
    }
}

/// Discards every frame; for headless runtimes and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBridge;

impl<Model> RenderBridge<Model> for NullBridge {
    fn render_once(&mut self, _model: &Model) {}
}

/// Pure per-key cache for memoized view functions.
///
/// An entry hits only when the view function pointer and every argument
/// `Arc` are the very same as the cached ones (pointer identity, not value
/// equality). A hit hands back the previously built tree untouched, skipping
/// reconstruction and downstream diffing; a miss rebuilds and replaces the
/// entry. Distinct keys cache independently, so structurally identical view
/// instances (list rows, say) don't evict each other.
///
/// Function pointer identity has one sharp edge: distinct `fn` items with
/// identical bodies may fold into one address under optimization. Memoize
/// distinct views under distinct keys rather than relying on two functions
/// comparing unequal.
pub struct ViewCache<Tree> {
    entries: HashMap<String, CachedView<Tree>>,
}

struct CachedView<Tree> {
    view: usize,
    args: Vec<usize>,
    tree: Arc<Tree>,
}

impl<Tree> ViewCache<Tree> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Memoize a one-argument view under `key`.
    pub fn memo<A>(&mut self, key: &str, view: fn(&A) -> Tree, arg: &Arc<A>) -> Arc<Tree> {
        self.lookup(key, view as usize, &[Arc::as_ptr(arg) as usize], || {
            view(arg)
        })
    }

    /// Memoize a two-argument view under `key`.
    pub fn memo2<A, B>(
        &mut self,
        key: &str,
        view: fn(&A, &B) -> Tree,
        first: &Arc<A>,
        second: &Arc<B>,
    ) -> Arc<Tree> {
        self.lookup(
            key,
            view as usize,
            &[Arc::as_ptr(first) as usize, Arc::as_ptr(second) as usize],
            || view(first, second),
        )
    }

    fn lookup(
        &mut self,
        key: &str,
        view: usize,
        args: &[usize],
        build: impl FnOnce() -> Tree,
    ) -> Arc<Tree> {
        if let Some(cached) = self.entries.get(key) {
            if cached.view == view && cached.args == args {
                return Arc::clone(&cached.tree);
            }
        }
        let tree = Arc::new(build());
        self.entries.insert(
            key.to_owned(),
            CachedView {
                view,
                args: args.to_vec(),
                tree: Arc::clone(&tree),
            },
        );
        tree
    }
}

impl<Tree> Default for ViewCache<Tree> {
    fn default() -> Self {
        Self::new()
    }
}
