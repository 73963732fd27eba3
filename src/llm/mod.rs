//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely.
//! Commands run synchronously on the shell loop, so `complete` is a plain
//! blocking call.

pub mod providers;

use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::engine::{Context, Service, ShellError};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
}

impl From<ProviderError> for ShellError {
    fn from(e: ProviderError) -> Self {
        ShellError::handler(e)
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
}

impl LlmProvider {
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => providers::dummy::NAME,
        }
    }

    /// Send `content` to the provider and return its text reply.
    pub fn complete(&self, content: &str) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(content),
        }
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

/// Provider factory exposed to commands as the `llm` service.
pub struct LlmService {
    default_provider: RwLock<String>,
}

impl LlmService {
    pub const NAME: &'static str = "llm";

    pub fn new(default_provider: impl Into<String>) -> Self {
        Self { default_provider: RwLock::new(default_provider.into()) }
    }

    pub fn default_provider(&self) -> String {
        self.default_provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Build the named provider, or the default one for `None`.
    pub fn provider(&self, name: Option<&str>) -> Result<LlmProvider, ProviderError> {
        match name {
            Some(name) => providers::build(name),
            None => providers::build(&self.default_provider()),
        }
    }

    pub fn is_known(&self, name: &str) -> bool {
        providers::build(name).is_ok()
    }
}

impl Service for LlmService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&self, _context: &Context) -> Result<(), ShellError> {
        let default = self.default_provider();
        let provider = providers::build(&default).map_err(|e| ShellError::ServiceInitialization {
            service: Self::NAME.to_string(),
            message: e.to_string(),
        })?;
        debug!(provider = provider.name(), "llm default provider ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_provider_completes() {
        let svc = LlmService::new("dummy");
        let reply = svc.provider(None).unwrap().complete("hi").unwrap();
        assert_eq!(reply, "[echo] hi");
    }

    #[test]
    fn unknown_default_fails_initialization() {
        let svc = LlmService::new("nope");
        let err = svc.initialize(&Context::new()).unwrap_err();
        assert_eq!(
            err,
            ShellError::ServiceInitialization {
                service: "llm".into(),
                message: "unknown provider: nope".into(),
            }
        );
    }

    #[test]
    fn provider_error_maps_to_handler_failure() {
        let e: ShellError = ProviderError::Request("timeout".into()).into();
        assert_eq!(e, ShellError::handler("provider request failed: timeout"));
    }
}
