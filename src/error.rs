//! Application-wide error types.

use thiserror::Error;

use crate::engine::ShellError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Shell(#[from] ShellError),

    /// A script line failed; `line` is 1-based.
    #[error("line {line}: {source}")]
    Script { line: usize, source: ShellError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(!e.to_string().is_empty());
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn logger_error_display() {
        let e = AppError::Logger("already initialized".into());
        assert!(e.to_string().contains("already initialized"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        // satisfies std::error::Error trait
        let _: &dyn Error = &e;
    }

    #[test]
    fn shell_error_passes_through() {
        let e: AppError = ShellError::UnknownCommand("nope".into()).into();
        assert_eq!(e.to_string(), "unknown command: nope");
    }

    #[test]
    fn script_error_names_line_and_keeps_source() {
        let e = AppError::Script { line: 3, source: ShellError::handler("boom") };
        assert_eq!(e.to_string(), "line 3: boom");
        assert!(e.source().is_some());
    }
}
