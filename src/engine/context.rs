//! Session context.
//!
//! A [`Context`] owns the per-session state: the variable store and the
//! command stack. Services bind to the context's parts when the service
//! registry is initialized against it.
//!
//! There is one process-wide current context, swappable for isolation.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use uuid::Uuid;

use super::error::ShellError;
use super::stack::CommandStack;
use super::variables::VariableStore;

#[derive(Debug)]
pub struct Context {
    id: Uuid,
    variables: Arc<VariableStore>,
    stack: Arc<CommandStack>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            variables: Arc::new(VariableStore::new()),
            stack: Arc::new(CommandStack::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn variables(&self) -> &Arc<VariableStore> {
        &self.variables
    }

    pub fn stack(&self) -> &Arc<CommandStack> {
        &self.stack
    }

    pub fn get_variable(&self, name: &str) -> Result<String, ShellError> {
        self.variables.get(name)
    }

    pub fn set_variable(&self, name: &str, value: &str) -> Result<(), ShellError> {
        self.variables.set(name, value)
    }

    pub fn set_system_variable(&self, name: &str, value: &str) -> Result<(), ShellError> {
        self.variables.set_system_variable(name, value)
    }

    /// Id of the active entity of a kind, e.g. `active("model")`.
    pub fn active(&self, entity: &str) -> Option<String> {
        self.variables.lookup(&active_key(entity))
    }

    pub fn set_active(&self, entity: &str, id: &str) -> Result<(), ShellError> {
        self.variables.set_system_variable(&active_key(entity), id)
    }

    pub fn clear_active(&self, entity: &str) -> bool {
        self.variables.remove(&active_key(entity))
    }
}

/// Metadata variable holding the active id for `entity`.
pub fn active_key(entity: &str) -> String {
    format!("#active_{entity}_id")
}

// ── Current context ───────────────────────────────────────────────────────────

static CURRENT: LazyLock<RwLock<Arc<Context>>> =
    LazyLock::new(|| RwLock::new(Arc::new(Context::new())));

/// The process-wide current context.
pub fn current() -> Arc<Context> {
    Arc::clone(&CURRENT.read().unwrap_or_else(PoisonError::into_inner))
}

/// Replace the current context, returning the previous one.
pub fn swap(next: Arc<Context>) -> Arc<Context> {
    let mut slot = CURRENT.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, next)
}

/// Install `next` as current until the returned guard is dropped.
pub fn scoped(next: Arc<Context>) -> ContextGuard {
    ContextGuard { previous: Some(swap(next)) }
}

pub struct ContextGuard {
    previous: Option<Arc<Context>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            swap(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_are_independent() {
        let a = Context::new();
        let b = Context::new();
        a.set_variable("x", "1").unwrap();
        assert!(b.get_variable("x").is_err());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn active_entity_round_trip() {
        let ctx = Context::new();
        assert_eq!(ctx.active("model"), None);
        ctx.set_active("model", "m-1").unwrap();
        assert_eq!(ctx.active("model").as_deref(), Some("m-1"));
        assert_eq!(ctx.get_variable("#active_model_id").unwrap(), "m-1");
        assert!(ctx.clear_active("model"));
        assert_eq!(ctx.active("model"), None);
    }

    #[test]
    fn scoped_context_restores_previous() {
        let mine = Arc::new(Context::new());
        let id = mine.id();
        {
            let _guard = scoped(Arc::clone(&mine));
            assert_eq!(current().id(), id);
        }
        // Other tests may swap concurrently, so only check ours is gone.
        assert_ne!(current().id(), id);
    }
}
