//! Built-in services and commands.

pub mod ask;
pub mod general;
pub mod models;

use crate::engine::{Console, Shell, ShellError, StackService, VariableService};
use crate::llm::LlmService;

pub use models::{ModelCatalog, ModelRecord};

/// Register the built-in services, in dependency order, and the built-in
/// commands on `shell`. Services still need [`Shell::initialize`].
pub fn install(shell: &Shell, console: Console, default_provider: &str) -> Result<(), ShellError> {
    let services = shell.services();
    services.register(console)?;
    services.register(VariableService::new())?;
    services.register(StackService::new())?;
    services.register(ModelCatalog::new())?;
    services.register(LlmService::new(default_provider))?;

    let commands = shell.commands();
    commands.register(general::Echo)?;
    commands.register(general::Set)?;
    commands.register(general::Unset)?;
    commands.register(general::Vars)?;
    commands.register(general::Help)?;
    commands.register(general::Seq)?;
    commands.register(models::ModelNew)?;
    commands.register(models::ModelList)?;
    commands.register(models::ModelActivate)?;
    commands.register(models::ModelDelete)?;
    commands.register(ask::Ask)?;
    Ok(())
}
