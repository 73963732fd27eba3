//! LLM provider implementations.
//!
//! `build(name)` is the factory. Adding a new backend = new module + new
//! match arm.

pub mod dummy;

use crate::llm::{LlmProvider, ProviderError};

/// Names accepted by [`build`].
pub const KNOWN: &[&str] = &[dummy::NAME];

/// Construct a `LlmProvider` by name.
pub fn build(name: &str) -> Result<LlmProvider, ProviderError> {
    match name {
        dummy::NAME | "echo" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        _ => Err(ProviderError::UnknownProvider(name.to_string())),
    }
}
