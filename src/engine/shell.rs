//! The execution loop: parse, expand, dispatch, drain.
//!
//! Every line the user enters is pushed onto the context's command stack
//! and the stack is drained until empty. Commands extend the run by
//! pushing more lines while they execute.
//!
//! Failure handling per entry:
//!
//! - Parse errors and unknown commands reject the entry before any state
//!   changes; the stack is cleared and the error returned.
//! - Handler failures record their message in `_error`. Under `\try` the
//!   drain continues, otherwise the stack is cleared and the error returned.
//! - Draining more than `max_drain_steps` entries clears the stack and
//!   returns [`ShellError::DrainLimit`].

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::context::{self, Context};
use super::error::ShellError;
use super::interpolate::{DEFAULT_MAX_LEN, DEFAULT_MAX_PASSES, Interpolator};
use super::parser::{self, Args, ParsedCommand};
use super::registry::{self as command_registry, CommandRegistry};
use super::scope::Scope;
use super::services::{self, ServiceRegistry};
use super::stack::PendingCommand;
use super::variables::ERROR;

pub const DEFAULT_MAX_DRAIN_STEPS: usize = 10_000;

/// Tunables read from the `[engine]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub max_interpolation_passes: usize,
    /// Longest text, in bytes, that `${...}` expansion may produce.
    pub max_interpolated_len: usize,
    pub max_drain_steps: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_interpolation_passes: DEFAULT_MAX_PASSES,
            max_interpolated_len: DEFAULT_MAX_LEN,
            max_drain_steps: DEFAULT_MAX_DRAIN_STEPS,
        }
    }
}

/// Why a single stack entry did not complete.
enum Failure {
    Rejected(ShellError),
    Handler(ShellError),
}

impl Failure {
    fn into_error(self) -> ShellError {
        match self {
            Failure::Rejected(e) | Failure::Handler(e) => e,
        }
    }
}

pub struct Shell {
    commands: Arc<CommandRegistry>,
    services: Arc<ServiceRegistry>,
    context: Arc<Context>,
    interpolator: Interpolator,
    max_drain_steps: usize,
}

impl Shell {
    pub fn new(
        commands: Arc<CommandRegistry>,
        services: Arc<ServiceRegistry>,
        context: Arc<Context>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            commands,
            services,
            context,
            interpolator: Interpolator::new(settings.max_interpolation_passes)
                .with_max_len(settings.max_interpolated_len),
            max_drain_steps: settings.max_drain_steps.max(1),
        }
    }

    /// A shell with its own registries and context, sharing nothing with
    /// the process-wide defaults.
    pub fn isolated(settings: EngineSettings) -> Self {
        Self::new(
            Arc::new(CommandRegistry::new()),
            Arc::new(ServiceRegistry::new()),
            Arc::new(Context::new()),
            settings,
        )
    }

    /// A shell over the process-wide default registries and current context.
    pub fn from_defaults(settings: EngineSettings) -> Self {
        Self::new(
            command_registry::default_registry(),
            services::default_services(),
            context::current(),
            settings,
        )
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Initialize all registered services against this shell's context.
    pub fn initialize(&self) -> Result<(), ShellError> {
        self.services.initialize_all(&self.context)
    }

    /// Run one logical line and everything it queues. Blank lines are no-ops.
    pub fn run_line(&self, line: &str) -> Result<(), ShellError> {
        if line.trim().is_empty() {
            return Ok(());
        }
        self.context.stack().push_line(line);
        self.drain()
    }

    /// Pop and run stack entries until the stack is empty.
    pub fn drain(&self) -> Result<(), ShellError> {
        let stack = self.context.stack();
        let mut steps = 0usize;

        while let Some(entry) = stack.pop() {
            steps += 1;
            if steps > self.max_drain_steps {
                let dropped = stack.clear() + 1;
                warn!(limit = self.max_drain_steps, dropped, "command stack drain limit reached");
                return Err(ShellError::DrainLimit(self.max_drain_steps));
            }

            match self.run_entry(&entry) {
                Ok(()) => {}
                Err(Failure::Handler(e)) if entry.ignore_failure => {
                    warn!(line = %entry.line, error = %e, "failure ignored");
                }
                Err(failure) => {
                    let e = failure.into_error();
                    let dropped = stack.clear();
                    warn!(line = %entry.line, error = %e, dropped, "command failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn run_entry(&self, entry: &PendingCommand) -> Result<(), Failure> {
        if entry.line.trim().is_empty() {
            return Err(Failure::Rejected(ShellError::parse(
                0,
                "modifiers must be followed by a command",
            )));
        }
        let parsed = self.parse(&entry.line).map_err(Failure::Rejected)?;
        let command = self
            .commands
            .get(&parsed.name)
            .ok_or_else(|| Failure::Rejected(ShellError::UnknownCommand(parsed.name.clone())))?;

        let (args, input) = if command.expands_variables() {
            self.interpolate(&parsed)
        } else {
            (parsed.args, parsed.input)
        };

        debug!(command = %command.name(), silent = entry.silent, "executing");
        let scope = Scope::new(&self.services, &self.commands, &self.context, entry.silent);
        command.execute(&scope, &args, &input).map_err(|e| {
            if let Err(err) = self.context.set_system_variable(ERROR, &e.to_string()) {
                warn!(error = %err, "could not record command failure");
            }
            Failure::Handler(e)
        })
    }

    /// Parse `line` with the parse mode its command is registered with.
    pub fn parse(&self, line: &str) -> Result<ParsedCommand, ShellError> {
        parser::parse_line(line, |name| self.commands.parse_mode(name))
    }

    /// Expand `${...}` in `text` against this shell's variables.
    pub fn expand(&self, text: &str) -> String {
        self.interpolator.expand_with_store(text, self.context.variables())
    }

    /// Expand argument values against the store, then the input against the
    /// scalar arguments layered over the store.
    pub fn interpolate(&self, parsed: &ParsedCommand) -> (Args, String) {
        let store = self.context.variables();
        let args = parsed.args.map_values(|value| self.interpolator.expand_with_store(value, store));
        let input = self.interpolator.expand(&parsed.input, |name| {
            args.get(name).map(str::to_string).or_else(|| store.lookup(name))
        });
        (args, input)
    }
}
