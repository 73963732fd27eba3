//! Line-oriented front ends: the interactive console and script runner.
//!
//! Both feed physical lines through a [`LineAssembler`], so a line whose
//! last word is `...` continues on the next one. The console reports errors and keeps
//! going; scripts stop at the first failing line.

use std::io::Write as _;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{LineAssembler, Shell};
use crate::error::AppError;

const CONTINUATION_PROMPT: &str = "... ";
const EXIT_COMMANDS: &[&str] = &["\\exit", "\\quit"];

/// Why the console loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    Eof,
    Quit,
    Cancelled,
}

/// Run the console on stdin until EOF, `\exit`/`\quit` or cancellation.
pub async fn run_interactive(
    shell: &Shell,
    prompt: &str,
    shutdown: CancellationToken,
) -> Result<ReplExit, AppError> {
    info!("console started. Ctrl-C or \\exit to quit.");
    run_lines(shell, BufReader::new(tokio::io::stdin()), prompt, shutdown).await
}

/// Console loop over any line source.
pub async fn run_lines<R>(
    shell: &Shell,
    reader: R,
    prompt: &str,
    shutdown: CancellationToken,
) -> Result<ReplExit, AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut assembler = LineAssembler::new();

    loop {
        let shown = if assembler.is_pending() { CONTINUATION_PROMPT } else { prompt };
        print!("{shown}");
        let _ = std::io::stdout().flush();

        let next = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("console shutting down");
                return Ok(ReplExit::Cancelled);
            }

            line = lines.next_line() => line,
        };

        let physical = match next {
            Err(e) => {
                warn!("console read error: {e}");
                return Err(AppError::Io(e));
            }
            Ok(None) => {
                debug!("console input closed");
                if let Some(line) = assembler.finish() {
                    report(shell, &line);
                }
                return Ok(ReplExit::Eof);
            }
            Ok(Some(physical)) => physical,
        };

        let Some(line) = assembler.push(&physical) else {
            continue;
        };
        if EXIT_COMMANDS.iter().any(|c| *c == line.trim()) {
            return Ok(ReplExit::Quit);
        }
        report(shell, &line);
    }
}

fn report(shell: &Shell, line: &str) {
    if let Err(e) = shell.run_line(line) {
        eprintln!("error: {e}");
    }
}

/// Run a script. Blank lines and lines starting with `#` are skipped.
///
/// Returns the number of logical lines executed. The first failure stops
/// the script and names the line it started on.
pub fn run_script(shell: &Shell, source: &str) -> Result<usize, AppError> {
    let mut assembler = LineAssembler::new();
    let mut started_at = 0;
    let mut executed = 0;

    for (index, physical) in source.lines().enumerate() {
        if !assembler.is_pending() {
            let trimmed = physical.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            started_at = index + 1;
        }
        if let Some(line) = assembler.push(physical) {
            run_script_line(shell, &line, started_at)?;
            executed += 1;
        }
    }
    if let Some(line) = assembler.finish() {
        run_script_line(shell, &line, started_at)?;
        executed += 1;
    }

    debug!(executed, "script finished");
    Ok(executed)
}

fn run_script_line(shell: &Shell, line: &str, number: usize) -> Result<(), AppError> {
    shell
        .run_line(line)
        .map_err(|source| AppError::Script { line: number, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands;
    use crate::engine::{Console, EngineSettings, ShellError};

    fn shell() -> (Shell, std::sync::Arc<Console>) {
        let shell = Shell::isolated(EngineSettings::default());
        commands::install(&shell, Console::capture(), "dummy").unwrap();
        shell.initialize().unwrap();
        let console = shell.services().console().unwrap();
        (shell, console)
    }

    #[test]
    fn script_skips_comments_and_joins_continuations() {
        let (shell, console) = shell();
        let script = "# setup\n\n\\set who world\n\\echo[greeting=hello] ...\n  ${greeting} ${who}\n";
        assert_eq!(run_script(&shell, script).unwrap(), 2);
        assert_eq!(console.take(), vec!["hello world"]);
    }

    #[test]
    fn script_stops_at_first_failure() {
        let (shell, console) = shell();
        let script = "\\echo one\n\n\\nope\n\\echo never\n";
        let err = run_script(&shell, script).unwrap_err();
        match err {
            AppError::Script { line, source } => {
                assert_eq!(line, 3);
                assert_eq!(source, ShellError::UnknownCommand("nope".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(console.take(), vec!["one"]);
    }

    #[test]
    fn script_ellipsis_in_text_does_not_join_lines() {
        let (shell, console) = shell();
        let script = "\\echo wait...\n\\echo next\n";
        assert_eq!(run_script(&shell, script).unwrap(), 2);
        assert_eq!(console.take(), vec!["wait...", "next"]);
    }

    #[tokio::test]
    async fn console_continues_after_errors_and_quits() {
        let (shell, console) = shell();
        let input: &[u8] = b"\\nope\n\\echo still here\n\\quit\n\\echo unreachable\n";
        let exit = run_lines(&shell, input, "> ", CancellationToken::new()).await.unwrap();
        assert_eq!(exit, ReplExit::Quit);
        assert_eq!(console.take(), vec!["still here"]);
    }

    #[tokio::test]
    async fn console_flushes_pending_line_at_eof() {
        let (shell, console) = shell();
        let input: &[u8] = b"\\echo a ...\n";
        let exit = run_lines(&shell, input, "> ", CancellationToken::new()).await.unwrap();
        assert_eq!(exit, ReplExit::Eof);
        assert_eq!(console.take(), vec!["a "]);
    }

    #[tokio::test]
    async fn cancelled_console_stops() {
        let (shell, _) = shell();
        let token = CancellationToken::new();
        token.cancel();
        let input: &[u8] = b"\\echo x\n";
        assert_eq!(run_lines(&shell, input, "> ", token).await.unwrap(), ReplExit::Cancelled);
    }
}
