//! Engine error taxonomy.
//!
//! Every failure the engine can observe is one variant of [`ShellError`].
//! Parse and dispatch failures reject a line before any state changes;
//! handler failures carry whatever message the command produced.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    /// Malformed command syntax. `position` is a byte offset into the line.
    #[error("parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{kind} already registered: {name}")]
    Duplicate { kind: &'static str, name: String },

    #[error("invalid {kind} name: {name:?}")]
    InvalidName { kind: &'static str, name: String },

    /// Unregistered name, or the registry has not been initialized.
    #[error("service not available: {0}")]
    ServiceUnavailable(String),

    #[error("service {name} has incorrect type (expected {expected})")]
    IncorrectServiceType { name: String, expected: &'static str },

    #[error("service {service} failed to initialize: {message}")]
    ServiceInitialization { service: String, message: String },

    #[error("variable not found: {0}")]
    VariableNotFound(String),

    #[error("invalid variable name {name:?}: {reason}")]
    InvalidVariable { name: String, reason: &'static str },

    #[error("command stack exceeded {0} steps, remaining entries discarded")]
    DrainLimit(usize),

    /// Opaque failure returned by a command body.
    #[error("{0}")]
    Handler(String),
}

impl ShellError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        ShellError::Parse { position, message: message.into() }
    }

    pub fn handler(message: impl fmt::Display) -> Self {
        ShellError::Handler(message.to_string())
    }

    /// Errors that reject a line before a handler runs.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ShellError::Parse { .. } | ShellError::UnknownCommand(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_position() {
        let e = ShellError::parse(7, "unterminated '['");
        assert_eq!(e.to_string(), "parse error at 7: unterminated '['");
    }

    #[test]
    fn handler_error_keeps_message_verbatim() {
        let e = ShellError::handler("model not found: gpt");
        assert_eq!(e.to_string(), "model not found: gpt");
    }

    #[test]
    fn rejection_classification() {
        assert!(ShellError::parse(0, "x").is_rejection());
        assert!(ShellError::UnknownCommand("nope".into()).is_rejection());
        assert!(!ShellError::handler("boom").is_rejection());
        assert!(!ShellError::ServiceUnavailable("stack".into()).is_rejection());
    }
}
