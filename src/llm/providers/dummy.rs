//! Dummy LLM provider: echoes input back prefixed with `[echo]`.
//! Used for exercising model sessions without a real backend.

use crate::llm::ProviderError;

pub const NAME: &str = "dummy";

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub fn complete(&self, content: &str) -> Result<String, ProviderError> {
        Ok(format!("[echo] {content}"))
    }
}
