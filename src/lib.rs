//! A Model-View-Update runtime with one-shot commands and
//! dependency-tracked command streams.
//!
//! State lives in a single model value owned by the dispatch loop. Every
//! event becomes a message; messages are processed strictly one at a time by
//! the application's `update`, which returns the next model plus follow-up
//! [`Command`]s, one-shot asynchronous effects that each resolve to exactly
//! one message. Long-lived subscriptions are [`CommandStream`]s whose
//! lifecycle is derived from the model: every registered stream declares a
//! projection of the model (its deps), and the runtime starts, keeps,
//! restarts, or cancels the stream's task exactly when that projection
//! changes by value.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use corriente::{Application, CommandStream, FnBridge, Runtime, Transition};
//!
//! struct Counter;
//!
//! #[derive(Debug)]
//! enum Msg {
//!     Increment,
//!     Tick,
//! }
//!
//! impl Application for Counter {
//!     type Model = i64;
//!     type Message = Msg;
//!
//!     fn init(&self) -> Transition<i64, Msg> {
//!         Transition::model(0)
//!     }
//!
//!     fn update(&self, model: i64, message: Msg) -> Transition<i64, Msg> {
//!         match message {
//!             Msg::Increment => Transition::model(model + 1),
//!             Msg::Tick => Transition::model(model + 1),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut runtime = Runtime::with_render_bridge(
//!         Counter,
//!         FnBridge(|model: &i64| println!("count = {model}")),
//!     );
//!
//!     // Tick once a second, but only while the count is positive.
//!     runtime
//!         .stream(
//!             "ticker",
//!             |model: &i64| *model > 0,
//!             |active: &bool| {
//!                 CommandStream::every(Duration::from_secs(1), |_| Msg::Tick).when(*active)
//!             },
//!         )
//!         .expect("stream name is unique");
//!
//!     let handle = runtime.handle();
//!     handle.dispatch(Msg::Increment);
//!
//!     runtime.run().await;
//! }
//! ```

pub mod application;
pub mod command;
pub mod error;
pub mod render;
pub mod runtime;
pub mod stream;
pub mod transition;

mod descriptor;
mod supervisor;

pub use application::Application;
pub use command::Command;
pub use error::{DispatchError, StreamError, StreamResult};
pub use render::{FnBridge, NullBridge, RenderBridge, ViewCache};
pub use runtime::{Dispatcher, Handle, Runtime};
pub use stream::{Cleanup, CommandStream, StreamEmitter};
pub use transition::Transition;
