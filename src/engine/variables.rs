//! Variable store: named string values in three namespaces.
//!
//! The namespace is encoded in the first character of the name:
//!
//! | prefix | namespace  | example              |
//! |--------|------------|----------------------|
//! | none   | user       | `topic`              |
//! | `_`    | output     | `_output`, `_error`  |
//! | `#`    | metadata   | `#active_model_id`   |
//!
//! Resolution is always an exact-name lookup; the namespace only affects
//! listing order and which setter is allowed to write the name.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::trace;

use super::context::Context;
use super::error::ShellError;
use super::services::Service;

pub const OUTPUT_PREFIX: char = '_';
pub const METADATA_PREFIX: char = '#';

/// Last-command output slot.
pub const OUTPUT: &str = "_output";
/// Last handler failure message.
pub const ERROR: &str = "_error";

/// Variable namespace, ordered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    User,
    Output,
    Metadata,
}

impl Namespace {
    pub fn of(name: &str) -> Self {
        match name.chars().next() {
            Some(OUTPUT_PREFIX) => Namespace::Output,
            Some(METADATA_PREFIX) => Namespace::Metadata,
            _ => Namespace::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::User => "user",
            Namespace::Output => "output",
            Namespace::Metadata => "meta",
        }
    }

    /// Accepts the names used by `\vars[ns=...]`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "user" => Some(Namespace::User),
            "output" | "out" => Some(Namespace::Output),
            "meta" | "metadata" => Some(Namespace::Metadata),
            _ => None,
        }
    }

    pub fn is_system(&self) -> bool {
        !matches!(self, Namespace::User)
    }
}

/// One listed binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
    pub namespace: Namespace,
}

/// Session-scoped variable bindings. Owned by a [`Context`].
#[derive(Debug, Default)]
pub struct VariableStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every write is a single map operation, so a poisoned guard still holds
    // a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> Result<String, ShellError> {
        self.lookup(name)
            .ok_or_else(|| ShellError::VariableNotFound(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<String> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Set a user variable. System prefixes are rejected.
    pub fn set(&self, name: &str, value: &str) -> Result<(), ShellError> {
        validate_name(name)?;
        if Namespace::of(name).is_system() {
            return Err(ShellError::InvalidVariable {
                name: name.to_string(),
                reason: "names starting with '_' or '#' are reserved for system variables",
            });
        }
        self.insert(name, value);
        Ok(())
    }

    /// Set an output (`_`) or metadata (`#`) variable.
    pub fn set_system_variable(&self, name: &str, value: &str) -> Result<(), ShellError> {
        validate_name(name)?;
        if !Namespace::of(name).is_system() {
            return Err(ShellError::InvalidVariable {
                name: name.to_string(),
                reason: "system variables must start with '_' or '#'",
            });
        }
        self.insert(name, value);
        Ok(())
    }

    /// Set several system variables under one lock.
    ///
    /// All names are validated before anything is written.
    pub fn set_system_variables<'a, I>(&self, entries: I) -> Result<(), ShellError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let entries: Vec<(&str, &str)> = entries.into_iter().collect();
        for (name, _) in &entries {
            validate_name(name)?;
            if !Namespace::of(name).is_system() {
                return Err(ShellError::InvalidVariable {
                    name: name.to_string(),
                    reason: "system variables must start with '_' or '#'",
                });
            }
        }
        let mut values = self.write();
        for (name, value) in entries {
            values.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }

    fn insert(&self, name: &str, value: &str) {
        trace!(%name, "variable set");
        self.write().insert(name.to_string(), value.to_string());
    }

    /// Remove a binding from any namespace. Returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.write().remove(name).is_some()
    }

    /// All bindings, optionally filtered, ordered by namespace then name.
    pub fn list(&self, namespace: Option<Namespace>) -> Vec<Variable> {
        let mut vars: Vec<Variable> = self
            .read()
            .iter()
            .map(|(name, value)| Variable {
                name: name.clone(),
                value: value.clone(),
                namespace: Namespace::of(name),
            })
            .filter(|v| namespace.is_none_or(|ns| v.namespace == ns))
            .collect();
        vars.sort_by(|a, b| (a.namespace, &a.name).cmp(&(b.namespace, &b.name)));
        vars
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}

/// Names must be non-empty and free of whitespace and interpolation syntax.
pub fn validate_name(name: &str) -> Result<(), ShellError> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if name.chars().any(char::is_whitespace) {
        "name must not contain whitespace"
    } else if name.contains(['$', '{', '}']) {
        "name must not contain '$', '{' or '}'"
    } else if name.len() == 1 && Namespace::of(name).is_system() {
        "a bare prefix is not a name"
    } else {
        return Ok(());
    };
    Err(ShellError::InvalidVariable { name: name.to_string(), reason })
}

// ── VariableService ───────────────────────────────────────────────────────────

/// Service view of the active Context's variable store.
///
/// Bound to the store during [`Service::initialize`]; every accessor fails
/// closed with [`ShellError::ServiceUnavailable`] before that.
#[derive(Default)]
pub struct VariableService {
    store: RwLock<Option<Arc<VariableStore>>>,
}

impl VariableService {
    pub const NAME: &'static str = "variables";

    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> Result<Arc<VariableStore>, ShellError> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ShellError::ServiceUnavailable(Self::NAME.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<String, ShellError> {
        self.store()?.get(name)
    }

    pub fn lookup(&self, name: &str) -> Result<Option<String>, ShellError> {
        Ok(self.store()?.lookup(name))
    }

    pub fn set(&self, name: &str, value: &str) -> Result<(), ShellError> {
        self.store()?.set(name, value)
    }

    pub fn set_system_variable(&self, name: &str, value: &str) -> Result<(), ShellError> {
        self.store()?.set_system_variable(name, value)
    }

    pub fn set_system_variables<'a, I>(&self, entries: I) -> Result<(), ShellError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.store()?.set_system_variables(entries)
    }

    pub fn remove(&self, name: &str) -> Result<bool, ShellError> {
        Ok(self.store()?.remove(name))
    }

    pub fn list(&self, namespace: Option<Namespace>) -> Result<Vec<Variable>, ShellError> {
        Ok(self.store()?.list(namespace))
    }
}

impl Service for VariableService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&self, context: &Context) -> Result<(), ShellError> {
        *self.store.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::clone(context.variables()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_overwrite() {
        let store = VariableStore::new();
        store.set("topic", "rust").unwrap();
        assert_eq!(store.get("topic").unwrap(), "rust");
        store.set("topic", "go").unwrap();
        assert_eq!(store.get("topic").unwrap(), "go");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn names_are_case_sensitive() {
        let store = VariableStore::new();
        store.set("Name", "upper").unwrap();
        store.set("name", "lower").unwrap();
        assert_eq!(store.get("Name").unwrap(), "upper");
        assert_eq!(store.get("name").unwrap(), "lower");
    }

    #[test]
    fn missing_variable_errors() {
        let store = VariableStore::new();
        assert_eq!(
            store.get("nope"),
            Err(ShellError::VariableNotFound("nope".into()))
        );
        assert_eq!(store.lookup("nope"), None);
    }

    #[test]
    fn user_setter_rejects_system_prefixes() {
        let store = VariableStore::new();
        assert!(store.set("_output", "x").is_err());
        assert!(store.set("#model_id", "x").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn system_setter_requires_prefix() {
        let store = VariableStore::new();
        assert!(store.set_system_variable("plain", "x").is_err());
        store.set_system_variable("_output", "done").unwrap();
        store.set_system_variable("#model_id", "42").unwrap();
        assert_eq!(store.get("_output").unwrap(), "done");
        assert_eq!(store.get("#model_id").unwrap(), "42");
    }

    #[test]
    fn batch_system_set_is_all_or_nothing() {
        let store = VariableStore::new();
        let err = store.set_system_variables([("#a", "1"), ("b", "2")]);
        assert!(err.is_err());
        assert!(store.is_empty());

        store.set_system_variables([("#a", "1"), ("_b", "2")]).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn invalid_names_rejected() {
        for bad in ["", "has space", "${x}", "#", "_"] {
            assert!(validate_name(bad).is_err(), "expected {bad:?} to be rejected");
        }
        for good in ["x", "model.name", "#active_model_id", "_output", "a-b"] {
            assert!(validate_name(good).is_ok(), "expected {good:?} to be accepted");
        }
    }

    #[test]
    fn list_orders_by_namespace_then_name() {
        let store = VariableStore::new();
        store.set_system_variable("#meta", "m").unwrap();
        store.set_system_variable("_out", "o").unwrap();
        store.set("zeta", "z").unwrap();
        store.set("alpha", "a").unwrap();

        let names: Vec<String> = store.list(None).into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["alpha", "zeta", "_out", "#meta"]);

        let meta = store.list(Some(Namespace::Metadata));
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].namespace, Namespace::Metadata);
    }

    #[test]
    fn namespace_labels() {
        assert_eq!(Namespace::from_label("meta"), Some(Namespace::Metadata));
        assert_eq!(Namespace::from_label("output"), Some(Namespace::Output));
        assert_eq!(Namespace::from_label("user"), Some(Namespace::User));
        assert_eq!(Namespace::from_label("other"), None);
    }

    #[test]
    fn service_fails_closed_until_initialized() {
        let svc = VariableService::new();
        assert_eq!(
            svc.get("x"),
            Err(ShellError::ServiceUnavailable("variables".into()))
        );

        let ctx = Context::new();
        svc.initialize(&ctx).unwrap();
        svc.set("x", "1").unwrap();
        assert_eq!(ctx.get_variable("x").unwrap(), "1");
    }
}
