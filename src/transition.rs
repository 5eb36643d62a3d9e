//! The value `init` and `update` return: the next model plus follow-up
//! commands.

use crate::command::Command;

/// Next model plus the commands to start for this cycle.
///
/// The reducer consumes the previous model and returns one of these; the
/// dispatch loop installs the model, renders it once, then starts every
/// command in the batch. Commands in one batch race independently; if two
/// effects must run in order, sequence them inside a single command.
#[derive(Debug)]
pub struct Transition<Model, M> {
    /// The model the application holds after this cycle
    pub model: Model,
    /// One-shot effects to start; each resolves to a follow-up message
    pub commands: Vec<Command<M>>,
}

impl<Model, M> Transition<Model, M> {
    /// Create a transition carrying an explicit command batch
    pub fn new(model: Model, commands: Vec<Command<M>>) -> Self {
        Self { model, commands }
    }

    /// Create a transition with no follow-up effects
    pub fn model(model: Model) -> Self {
        Self {
            model,
            commands: Vec::new(),
        }
    }

    /// Create a transition starting a single command
    pub fn with_command(model: Model, command: Command<M>) -> Self {
        Self {
            model,
            commands: vec![command],
        }
    }

    /// Add one more command to the batch
    pub fn command(mut self, command: Command<M>) -> Self {
        self.commands.push(command);
        self
    }
}
