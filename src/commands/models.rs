//! Model configuration catalog and its commands.
//!
//! A model record names a provider, the provider-side model and sampling
//! settings. The active model is tracked in the `#active_model_id` and
//! `#active_model_name` metadata variables.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::context::active_key;
use crate::engine::variables::OUTPUT;
use crate::engine::{Args, Command, Context, Scope, Service, ShellError};
use crate::llm::LlmService;

const ENTITY: &str = "model";
const ACTIVE_NAME: &str = "#active_model_name";
const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRecord {
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub description: String,
    /// RFC 3339, UTC.
    pub created_at: String,
}

impl ModelRecord {
    fn matches(&self, needle: &str) -> bool {
        [&self.name, &self.provider, &self.model, &self.description]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// In-memory model catalog, registered as the `models` service.
#[derive(Default)]
pub struct ModelCatalog {
    models: RwLock<Vec<ModelRecord>>,
}

impl ModelCatalog {
    pub const NAME: &'static str = "models";

    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ModelRecord>> {
        self.models.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ModelRecord>> {
        self.models.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Names are unique, compared case-insensitively.
    pub fn add(&self, record: ModelRecord) -> Result<(), ShellError> {
        let mut models = self.write();
        if models.iter().any(|m| m.name.eq_ignore_ascii_case(&record.name)) {
            return Err(ShellError::Duplicate { kind: "model", name: record.name });
        }
        info!(id = %record.id, name = %record.name, provider = %record.provider, "model created");
        models.push(record);
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Option<ModelRecord> {
        self.read().iter().find(|m| m.id == *id).cloned()
    }

    pub fn find(&self, name: &str) -> Option<ModelRecord> {
        self.read()
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Look up by id, falling back to name.
    pub fn resolve(&self, selector: &str) -> Result<ModelRecord, ShellError> {
        let selector = selector.trim();
        Uuid::parse_str(selector)
            .ok()
            .and_then(|id| self.get(&id))
            .or_else(|| self.find(selector))
            .ok_or_else(|| ShellError::handler(format!("model not found: {selector}")))
    }

    /// Case-insensitive match on name, provider, model and description.
    /// An empty needle matches everything.
    pub fn search(&self, needle: &str) -> Vec<ModelRecord> {
        let needle = needle.trim().to_lowercase();
        self.read()
            .iter()
            .filter(|m| needle.is_empty() || m.matches(&needle))
            .cloned()
            .collect()
    }

    pub fn remove(&self, id: &Uuid) -> Option<ModelRecord> {
        let mut models = self.write();
        let position = models.iter().position(|m| m.id == *id)?;
        Some(models.remove(position))
    }

    pub fn list(&self) -> Vec<ModelRecord> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Service for ModelCatalog {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&self, _context: &Context) -> Result<(), ShellError> {
        debug!(models = self.len(), "model catalog ready");
        Ok(())
    }
}

fn catalog(scope: &Scope<'_>) -> Result<std::sync::Arc<ModelCatalog>, ShellError> {
    scope.service::<ModelCatalog>(ModelCatalog::NAME)
}

/// `id=` wins over the input text.
fn selector<'a>(args: &'a Args, input: &'a str) -> Result<&'a str, ShellError> {
    match args.get("id").map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => Ok(id),
        None if !input.trim().is_empty() => Ok(input.trim()),
        None => Err(ShellError::handler("expected id=<model id> or a model name")),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// `\model-new[name=..., provider=..., model=..., temperature=..., activate=true] description`
pub struct ModelNew;

impl Command for ModelNew {
    fn name(&self) -> &str {
        "model-new"
    }

    fn summary(&self) -> &str {
        "create a model: name, provider, model, temperature, activate"
    }

    fn execute(&self, scope: &Scope<'_>, args: &Args, input: &str) -> Result<(), ShellError> {
        let name = args
            .get("name")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ShellError::handler("model-new requires name=<name>"))?;

        let llm = scope.service::<LlmService>(LlmService::NAME)?;
        let provider = match args.get("provider").map(str::trim).filter(|s| !s.is_empty()) {
            Some(p) if llm.is_known(p) => p.to_string(),
            Some(p) => return Err(ShellError::handler(format!("unknown provider: {p}"))),
            None => llm.default_provider(),
        };

        let temperature = match args.get("temperature") {
            None => DEFAULT_TEMPERATURE,
            Some(raw) => raw
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|t| (0.0..=2.0).contains(t))
                .ok_or_else(|| {
                    ShellError::handler(format!("temperature must be a number in 0..=2, got {raw:?}"))
                })?,
        };
        let activate = args.get_bool("activate")?.unwrap_or(false);

        let record = ModelRecord {
            id: Uuid::now_v7(),
            name: name.to_string(),
            provider,
            model: args.get("model").unwrap_or(name).trim().to_string(),
            temperature,
            description: input.trim().to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        let id = record.id.to_string();
        let summary = format!("created model {} ({}/{}) {id}", record.name, record.provider, record.model);
        catalog(scope)?.add(record)?;

        scope.variables()?.set_system_variables([
            ("#model_id", id.as_str()),
            ("#model_name", name),
            (OUTPUT, id.as_str()),
        ])?;
        scope.say(&summary)?;

        if activate {
            scope
                .stack()?
                .push_command(&format!("\\silent \\model-activate[id={id}]"))?;
        }
        Ok(())
    }
}

/// `\model-list [search text]`
pub struct ModelList;

impl Command for ModelList {
    fn name(&self) -> &str {
        "model-list"
    }

    fn summary(&self) -> &str {
        "list models, optionally filtered by search text"
    }

    fn execute(&self, scope: &Scope<'_>, _args: &Args, input: &str) -> Result<(), ShellError> {
        let models = catalog(scope)?.search(input);
        let active = scope.context().active(ENTITY);

        if models.is_empty() {
            scope.say("(no models)")?;
        }
        for m in &models {
            let marker = if active.as_deref() == Some(m.id.to_string().as_str()) { "*" } else { " " };
            scope.say(&format!(
                "{marker} {:<16} {}/{} t={} {}",
                m.name, m.provider, m.model, m.temperature, m.id
            ))?;
        }
        scope.set_output(&models.len().to_string())
    }
}

/// `\model-activate[id=...]` or `\model-activate name`
pub struct ModelActivate;

impl Command for ModelActivate {
    fn name(&self) -> &str {
        "model-activate"
    }

    fn summary(&self) -> &str {
        "make a model active, by id= or name"
    }

    fn execute(&self, scope: &Scope<'_>, args: &Args, input: &str) -> Result<(), ShellError> {
        let record = catalog(scope)?.resolve(selector(args, input)?)?;
        let id = record.id.to_string();
        let key = active_key(ENTITY);
        scope.variables()?.set_system_variables([
            (key.as_str(), id.as_str()),
            (ACTIVE_NAME, record.name.as_str()),
            (OUTPUT, id.as_str()),
        ])?;
        debug!(id = %id, name = %record.name, "model activated");
        scope.say(&format!("active model: {}", record.name))
    }
}

/// `\model-delete[id=...]` or `\model-delete name`
pub struct ModelDelete;

impl Command for ModelDelete {
    fn name(&self) -> &str {
        "model-delete"
    }

    fn summary(&self) -> &str {
        "delete a model, by id= or name"
    }

    fn execute(&self, scope: &Scope<'_>, args: &Args, input: &str) -> Result<(), ShellError> {
        let catalog = catalog(scope)?;
        let record = catalog.resolve(selector(args, input)?)?;
        catalog.remove(&record.id);

        let id = record.id.to_string();
        let vars = scope.variables()?;
        if vars.lookup(&active_key(ENTITY))?.as_deref() == Some(id.as_str()) {
            vars.remove(&active_key(ENTITY))?;
            vars.remove(ACTIVE_NAME)?;
        }
        info!(id = %id, name = %record.name, "model deleted");
        vars.set_system_variable(OUTPUT, &id)?;
        scope.say(&format!("deleted model {}", record.name))
    }
}
