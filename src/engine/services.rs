//! Service registry.
//!
//! Services are long-lived collaborators that commands look up by name:
//! the console, the variable and stack views, the model catalog and so on.
//! Registration order is preserved and is the order services are
//! initialized in, so a service may rely on anything registered before it.
//!
//! Lookups are typed: [`ServiceRegistry::get`] downcasts to the concrete
//! service type and fails with [`ShellError::IncorrectServiceType`] when the
//! name is bound to something else.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use super::console::Console;
use super::context::Context;
use super::error::ShellError;
use super::stack::StackService;
use super::variables::VariableService;

/// A named, initializable service.
pub trait Service: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Bind to the given context. Called once per [`ServiceRegistry::initialize_all`].
    fn initialize(&self, context: &Context) -> Result<(), ShellError>;
}

struct Entry {
    name: String,
    service: Arc<dyn Service>,
    any: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    initialized: bool,
}

#[derive(Default)]
pub struct ServiceRegistry {
    inner: RwLock<Inner>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a service and return a shared handle to it.
    pub fn register<S: Service>(&self, service: S) -> Result<Arc<S>, ShellError> {
        let service = Arc::new(service);
        self.register_arc(Arc::clone(&service))?;
        Ok(service)
    }

    pub fn register_arc<S: Service>(&self, service: Arc<S>) -> Result<(), ShellError> {
        let name = service.name().to_string();
        if name.trim().is_empty() {
            return Err(ShellError::InvalidName { kind: "service", name });
        }

        let mut inner = self.write();
        if inner.index.contains_key(&name) {
            return Err(ShellError::Duplicate { kind: "service", name });
        }
        let position = inner.entries.len();
        inner.entries.push(Entry {
            name: name.clone(),
            service: Arc::clone(&service) as Arc<dyn Service>,
            any: service as Arc<dyn Any + Send + Sync>,
        });
        inner.index.insert(name.clone(), position);
        debug!(service = %name, "service registered");
        Ok(())
    }

    /// Initialize every service in registration order against `context`.
    ///
    /// Stops at the first failure; services already initialized stay bound.
    /// May be called again, e.g. to rebind to a new context.
    pub fn initialize_all(&self, context: &Context) -> Result<(), ShellError> {
        let services: Vec<Arc<dyn Service>> = {
            let mut inner = self.write();
            inner.initialized = false;
            inner.entries.iter().map(|e| Arc::clone(&e.service)).collect()
        };

        for service in &services {
            if let Err(e) = service.initialize(context) {
                warn!(service = service.name(), error = %e, "service initialization failed");
                return Err(match e {
                    e @ ShellError::ServiceInitialization { .. } => e,
                    other => ShellError::ServiceInitialization {
                        service: service.name().to_string(),
                        message: other.to_string(),
                    },
                });
            }
            debug!(service = service.name(), "service initialized");
        }

        self.write().initialized = true;
        info!(count = services.len(), context = %context.id(), "services initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.read().initialized
    }

    /// Typed lookup. Fails before initialization, for unknown names, and for
    /// names bound to a different type.
    pub fn get<S: Service>(&self, name: &str) -> Result<Arc<S>, ShellError> {
        let any = {
            let inner = self.read();
            if !inner.initialized {
                return Err(ShellError::ServiceUnavailable(name.to_string()));
            }
            let position = inner
                .index
                .get(name)
                .ok_or_else(|| ShellError::ServiceUnavailable(name.to_string()))?;
            Arc::clone(&inner.entries[*position].any)
        };
        any.downcast::<S>().map_err(|_| ShellError::IncorrectServiceType {
            name: name.to_string(),
            expected: type_name::<S>(),
        })
    }

    /// Untyped lookup.
    pub fn get_dyn(&self, name: &str) -> Result<Arc<dyn Service>, ShellError> {
        let inner = self.read();
        if !inner.initialized {
            return Err(ShellError::ServiceUnavailable(name.to_string()));
        }
        inner
            .index
            .get(name)
            .map(|&i| Arc::clone(&inner.entries[i].service))
            .ok_or_else(|| ShellError::ServiceUnavailable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().index.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read().entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    pub fn variables(&self) -> Result<Arc<VariableService>, ShellError> {
        self.get(VariableService::NAME)
    }

    pub fn stack(&self) -> Result<Arc<StackService>, ShellError> {
        self.get(StackService::NAME)
    }

    pub fn console(&self) -> Result<Arc<Console>, ShellError> {
        self.get(Console::NAME)
    }
}

// ── Process-wide default ──────────────────────────────────────────────────────

static DEFAULT: LazyLock<RwLock<Arc<ServiceRegistry>>> =
    LazyLock::new(|| RwLock::new(Arc::new(ServiceRegistry::new())));

pub fn default_services() -> Arc<ServiceRegistry> {
    Arc::clone(&DEFAULT.read().unwrap_or_else(PoisonError::into_inner))
}

/// Replace the default service registry, returning the previous one.
pub fn set_default_services(registry: Arc<ServiceRegistry>) -> Arc<ServiceRegistry> {
    let mut slot = DEFAULT.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, registry)
}
