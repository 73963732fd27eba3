//! `\ask` sends text to the active model.

use tracing::debug;
use uuid::Uuid;

use crate::commands::models::ModelCatalog;
use crate::engine::{Args, Command, ParseMode, Scope, ShellError};
use crate::llm::LlmService;

pub struct Ask;

impl Command for Ask {
    fn name(&self) -> &str {
        "ask"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn summary(&self) -> &str {
        "send the input to the active model"
    }

    fn execute(&self, scope: &Scope<'_>, _args: &Args, input: &str) -> Result<(), ShellError> {
        let prompt = input.trim();
        if prompt.is_empty() {
            return Err(ShellError::handler("usage: \\ask <text>"));
        }

        let active = scope
            .context()
            .active("model")
            .ok_or_else(|| ShellError::handler("no active model (see \\model-activate)"))?;
        let catalog = scope.service::<ModelCatalog>(ModelCatalog::NAME)?;
        let record = Uuid::parse_str(&active)
            .ok()
            .and_then(|id| catalog.get(&id))
            .ok_or_else(|| ShellError::handler(format!("active model {active} no longer exists")))?;

        let provider = scope
            .service::<LlmService>(LlmService::NAME)?
            .provider(Some(record.provider.as_str()))?;
        debug!(model = %record.name, provider = provider.name(), "ask");
        let reply = provider.complete(prompt)?;

        scope.say(&reply)?;
        scope.set_output(&reply)
    }
}
