//! Command registry: name → handler dispatch table.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::debug;

use super::error::ShellError;
use super::parser::{Args, ParseMode};
use super::scope::Scope;

/// A shell command.
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn parse_mode(&self) -> ParseMode {
        ParseMode::KeyValue
    }

    /// One-line description for `\help`.
    fn summary(&self) -> &str {
        ""
    }

    /// Whether the shell expands `${...}` in args and input before calling
    /// [`execute`](Command::execute).
    fn expands_variables(&self) -> bool {
        true
    }

    fn execute(&self, scope: &Scope<'_>, args: &Args, input: &str) -> Result<(), ShellError>;
}

/// Listing entry for a registered command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub mode: &'static str,
    pub summary: String,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<dyn Command>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Command>>> {
        self.commands.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Command>>> {
        self.commands.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register<C: Command + 'static>(&self, command: C) -> Result<(), ShellError> {
        self.register_arc(Arc::new(command))
    }

    pub fn register_arc(&self, command: Arc<dyn Command>) -> Result<(), ShellError> {
        let name = command.name().to_string();
        if !is_valid_name(&name) {
            return Err(ShellError::InvalidName { kind: "command", name });
        }
        let mut commands = self.write();
        if commands.contains_key(&name) {
            return Err(ShellError::Duplicate { kind: "command", name });
        }
        debug!(command = %name, mode = command.parse_mode().as_str(), "command registered");
        commands.insert(name, command);
        Ok(())
    }

    /// Removing an unknown name is a no-op.
    pub fn unregister(&self, name: &str) -> bool {
        self.write().remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.read().get(name).cloned()
    }

    pub fn is_valid_command(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Parse mode for `name`; unknown names parse as key-value.
    pub fn parse_mode(&self, name: &str) -> ParseMode {
        self.read()
            .get(name)
            .map(|c| c.parse_mode())
            .unwrap_or_default()
    }

    /// Look up and run a command. The registry lock is released before the
    /// handler runs, so handlers may register or unregister commands.
    pub fn execute(
        &self,
        name: &str,
        scope: &Scope<'_>,
        args: &Args,
        input: &str,
    ) -> Result<(), ShellError> {
        let command = self
            .get(name)
            .ok_or_else(|| ShellError::UnknownCommand(name.to_string()))?;
        command.execute(scope, args, input)
    }

    /// Sorted command names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn descriptors(&self) -> Vec<CommandInfo> {
        let mut infos: Vec<CommandInfo> = self
            .read()
            .values()
            .map(|c| CommandInfo {
                name: c.name().to_string(),
                mode: c.parse_mode().as_str(),
                summary: c.summary().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// `[A-Za-z_][A-Za-z0-9_-]*`
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ── Process-wide default ──────────────────────────────────────────────────────

static DEFAULT: LazyLock<RwLock<Arc<CommandRegistry>>> =
    LazyLock::new(|| RwLock::new(Arc::new(CommandRegistry::new())));

pub fn default_registry() -> Arc<CommandRegistry> {
    Arc::clone(&DEFAULT.read().unwrap_or_else(PoisonError::into_inner))
}

/// Replace the default registry, returning the previous one.
pub fn set_default_registry(registry: Arc<CommandRegistry>) -> Arc<CommandRegistry> {
    let mut slot = DEFAULT.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, registry)
}
