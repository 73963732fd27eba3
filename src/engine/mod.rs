//! Command execution engine.
//!
//! ```text
//!   line ──► stack ──► parser ──► interpolate ──► registry ──► handler
//!              ▲                                                  │
//!              └──────────────── push follow-up lines ◄───────────┘
//! ```
//!
//! [`Shell`] owns the loop. Handlers reach shared state through the
//! [`Scope`] they are given: the service registry, the command registry
//! and the session [`Context`].

pub mod console;
pub mod context;
pub mod error;
pub mod interpolate;
pub mod parser;
pub mod registry;
pub mod scope;
pub mod services;
pub mod shell;
pub mod stack;
pub mod variables;

pub use console::Console;
pub use context::Context;
pub use error::ShellError;
pub use interpolate::Interpolator;
pub use parser::{ArgValue, Args, LineAssembler, ParseMode, ParsedCommand};
pub use registry::{Command, CommandInfo, CommandRegistry};
pub use scope::Scope;
pub use services::{Service, ServiceRegistry};
pub use shell::{EngineSettings, Shell};
pub use stack::{CommandStack, PendingCommand, StackService};
pub use variables::{Namespace, Variable, VariableService, VariableStore};
