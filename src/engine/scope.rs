//! What a command handler sees while it runs.

use std::sync::Arc;

use super::console::Console;
use super::context::Context;
use super::error::ShellError;
use super::registry::CommandRegistry;
use super::services::{Service, ServiceRegistry};
use super::stack::StackService;
use super::variables::{OUTPUT, VariableService};

pub struct Scope<'a> {
    services: &'a ServiceRegistry,
    commands: &'a CommandRegistry,
    context: &'a Context,
    silent: bool,
}

impl<'a> Scope<'a> {
    pub fn new(
        services: &'a ServiceRegistry,
        commands: &'a CommandRegistry,
        context: &'a Context,
        silent: bool,
    ) -> Self {
        Self { services, commands, context, silent }
    }

    pub fn services(&self) -> &'a ServiceRegistry {
        self.services
    }

    pub fn commands(&self) -> &'a CommandRegistry {
        self.commands
    }

    pub fn context(&self) -> &'a Context {
        self.context
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn service<S: Service>(&self, name: &str) -> Result<Arc<S>, ShellError> {
        self.services.get(name)
    }

    pub fn variables(&self) -> Result<Arc<VariableService>, ShellError> {
        self.services.variables()
    }

    pub fn stack(&self) -> Result<Arc<StackService>, ShellError> {
        self.services.stack()
    }

    pub fn console(&self) -> Result<Arc<Console>, ShellError> {
        self.services.console()
    }

    /// Print through the console unless the entry runs `\silent`.
    pub fn say(&self, text: &str) -> Result<(), ShellError> {
        if self.silent {
            return Ok(());
        }
        self.console()?.print(text);
        Ok(())
    }

    pub fn set_output(&self, value: &str) -> Result<(), ShellError> {
        self.variables()?.set_system_variable(OUTPUT, value)
    }
}
