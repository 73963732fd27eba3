//! Execution stack.
//!
//! Commands queue follow-up work by pushing raw lines; the shell pops and
//! runs them until the stack is empty. Pops are LIFO, so a command that
//! wants `a` then `b` to run next pushes `b` first.
//!
//! A line may start with any number of whole-word modifiers:
//!
//! - `\silent` suppresses console output while the entry runs.
//! - `\try` turns a handler failure into a recorded `_error` instead of
//!   aborting the drain.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::trace;

use super::context::Context;
use super::error::ShellError;
use super::services::Service;

pub const SILENT_MODIFIER: &str = "\\silent";
pub const TRY_MODIFIER: &str = "\\try";

/// One stack entry: modifiers stripped off a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub line: String,
    pub silent: bool,
    pub ignore_failure: bool,
}

impl PendingCommand {
    /// Strip leading modifiers. The remaining text is kept as written.
    pub fn parse(raw: &str) -> Self {
        let mut rest = raw.trim_start();
        let mut silent = false;
        let mut ignore_failure = false;
        loop {
            if let Some(tail) = strip_word(rest, SILENT_MODIFIER) {
                silent = true;
                rest = tail;
            } else if let Some(tail) = strip_word(rest, TRY_MODIFIER) {
                ignore_failure = true;
                rest = tail;
            } else {
                break;
            }
        }
        Self { line: rest.to_string(), silent, ignore_failure }
    }

    pub fn plain(line: impl Into<String>) -> Self {
        Self { line: line.into(), silent: false, ignore_failure: false }
    }
}

impl fmt::Display for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.silent {
            write!(f, "{SILENT_MODIFIER} ")?;
        }
        if self.ignore_failure {
            write!(f, "{TRY_MODIFIER} ")?;
        }
        f.write_str(&self.line)
    }
}

/// `word` followed by whitespace or end of text, e.g. `\silent` but not
/// `\silently`.
fn strip_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let tail = text.strip_prefix(word)?;
    match tail.chars().next() {
        None => Some(tail),
        Some(c) if c.is_whitespace() => Some(tail.trim_start()),
        Some(_) => None,
    }
}

/// LIFO queue of pending commands. Owned by a [`Context`].
#[derive(Debug, Default)]
pub struct CommandStack {
    entries: Mutex<Vec<PendingCommand>>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingCommand>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, entry: PendingCommand) {
        trace!(line = %entry.line, silent = entry.silent, "stack push");
        self.lock().push(entry);
    }

    /// Push a raw line, parsing its modifiers.
    pub fn push_line(&self, line: &str) {
        self.push(PendingCommand::parse(line));
    }

    pub fn pop(&self) -> Option<PendingCommand> {
        self.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Pending entries, next-to-run first.
    pub fn snapshot(&self) -> Vec<PendingCommand> {
        self.lock().iter().rev().cloned().collect()
    }

    /// Drop every pending entry. Returns how many were discarded.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        dropped
    }
}

// ── StackService ──────────────────────────────────────────────────────────────

/// Service view of the active Context's command stack.
#[derive(Default)]
pub struct StackService {
    stack: RwLock<Option<Arc<CommandStack>>>,
}

impl StackService {
    pub const NAME: &'static str = "stack";

    pub fn new() -> Self {
        Self::default()
    }

    fn stack(&self) -> Result<Arc<CommandStack>, ShellError> {
        self.stack
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ShellError::ServiceUnavailable(Self::NAME.to_string()))
    }

    pub fn push_command(&self, line: &str) -> Result<(), ShellError> {
        self.stack()?.push_line(line);
        Ok(())
    }

    pub fn pending(&self) -> Result<Vec<PendingCommand>, ShellError> {
        Ok(self.stack()?.snapshot())
    }

    pub fn len(&self) -> Result<usize, ShellError> {
        Ok(self.stack()?.len())
    }
}

impl Service for StackService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&self, context: &Context) -> Result<(), ShellError> {
        *self.stack.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::clone(context.stack()));
        Ok(())
    }
}
