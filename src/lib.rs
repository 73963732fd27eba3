//! modelsh: an interactive command shell for orchestrating language-model
//! sessions.
//!
//! The [`engine`] module is the command execution core. [`commands`] holds
//! the built-in commands and services, [`repl`] the console and script
//! front ends.

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod logger;
pub mod repl;

pub use engine::{Shell, ShellError};
pub use error::AppError;
