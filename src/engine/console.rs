//! Console output service.
//!
//! Commands print through this service rather than to stdout directly so
//! that `\silent` can suppress them and tests can capture what was said.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use super::context::Context;
use super::error::ShellError;
use super::services::Service;

enum Sink {
    Stdout,
    Capture(Mutex<Vec<String>>),
}

pub struct Console {
    sink: Sink,
}

impl Default for Console {
    fn default() -> Self {
        Self::stdout()
    }
}

impl Console {
    pub const NAME: &'static str = "console";

    pub fn stdout() -> Self {
        Self { sink: Sink::Stdout }
    }

    /// Keeps printed lines in memory instead of writing them out.
    pub fn capture() -> Self {
        Self { sink: Sink::Capture(Mutex::new(Vec::new())) }
    }

    pub fn print(&self, text: &str) {
        match &self.sink {
            Sink::Stdout => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = writeln!(out, "{text}").and_then(|()| out.flush()) {
                    warn!("console write failed: {e}");
                }
            }
            Sink::Capture(lines) => {
                lines
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(text.to_string());
            }
        }
    }

    /// Captured lines so far. Always empty for stdout consoles.
    pub fn captured(&self) -> Vec<String> {
        match &self.sink {
            Sink::Stdout => Vec::new(),
            Sink::Capture(lines) => lines.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }

    /// Captured lines, leaving the buffer empty.
    pub fn take(&self) -> Vec<String> {
        match &self.sink {
            Sink::Stdout => Vec::new(),
            Sink::Capture(lines) => {
                std::mem::take(&mut *lines.lock().unwrap_or_else(PoisonError::into_inner))
            }
        }
    }
}

impl Service for Console {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&self, _context: &Context) -> Result<(), ShellError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_records_in_order() {
        let console = Console::capture();
        console.print("one");
        console.print("two");
        assert_eq!(console.captured(), vec!["one", "two"]);
        assert_eq!(console.take(), vec!["one", "two"]);
        assert!(console.captured().is_empty());
    }

    #[test]
    fn stdout_console_captures_nothing() {
        let console = Console::stdout();
        assert!(console.captured().is_empty());
    }
}
