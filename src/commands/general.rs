//! General-purpose commands: output, variables, help and sequencing.

use crate::engine::variables::Namespace;
use crate::engine::{Args, Command, ParseMode, Scope, ShellError};

/// `\echo text` prints its (interpolated) input and stores it in `_output`.
pub struct Echo;

impl Command for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn summary(&self) -> &str {
        "print the input and store it in _output"
    }

    fn execute(&self, scope: &Scope<'_>, _args: &Args, input: &str) -> Result<(), ShellError> {
        scope.say(input)?;
        scope.set_output(input)
    }
}

/// `\set name value...` stores a user variable. The value is kept verbatim,
/// so `${...}` inside it resolves each time the variable is used.
pub struct Set;

impl Command for Set {
    fn name(&self) -> &str {
        "set"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn summary(&self) -> &str {
        "set a user variable: \\set name value"
    }

    fn expands_variables(&self) -> bool {
        false
    }

    fn execute(&self, scope: &Scope<'_>, _args: &Args, input: &str) -> Result<(), ShellError> {
        let input = input.trim_start();
        let (name, value) = match input.split_once(char::is_whitespace) {
            Some((name, value)) => (name, value.trim_start()),
            None => (input, ""),
        };
        if name.is_empty() {
            return Err(ShellError::handler("usage: \\set <name> <value>"));
        }
        scope.variables()?.set(name, value)
    }
}

/// `\unset a b c` removes user variables. Unknown names are ignored.
pub struct Unset;

impl Command for Unset {
    fn name(&self) -> &str {
        "unset"
    }

    fn parse_mode(&self) -> ParseMode {
        ParseMode::Raw
    }

    fn summary(&self) -> &str {
        "remove user variables"
    }

    fn execute(&self, scope: &Scope<'_>, _args: &Args, input: &str) -> Result<(), ShellError> {
        let names: Vec<&str> = input.split_whitespace().collect();
        if names.is_empty() {
            return Err(ShellError::handler("usage: \\unset <name>..."));
        }
        if let Some(system) = names.iter().find(|n| Namespace::of(n).is_system()) {
            return Err(ShellError::InvalidVariable {
                name: system.to_string(),
                reason: "system variables cannot be unset",
            });
        }
        let vars = scope.variables()?;
        for name in names {
            vars.remove(name)?;
        }
        Ok(())
    }
}

/// `\vars[ns=user|output|meta, format=json]`
pub struct Vars;

impl Command for Vars {
    fn name(&self) -> &str {
        "vars"
    }

    fn summary(&self) -> &str {
        "list variables; ns=user|output|meta, format=json"
    }

    fn execute(&self, scope: &Scope<'_>, args: &Args, _input: &str) -> Result<(), ShellError> {
        let namespace = match args.get("ns") {
            None | Some("") | Some("all") => None,
            Some(label) => Some(Namespace::from_label(label).ok_or_else(|| {
                ShellError::handler(format!("unknown namespace {label:?} (expected user, output or meta)"))
            })?),
        };
        let vars = scope.variables()?.list(namespace)?;

        match args.get("format").unwrap_or("text") {
            "json" => {
                let json = serde_json::to_string_pretty(&vars).map_err(ShellError::handler)?;
                scope.say(&json)
            }
            "text" => {
                if vars.is_empty() {
                    return scope.say("(no variables)");
                }
                for var in &vars {
                    scope.say(&format!("{:<6} {} = {}", var.namespace.as_str(), var.name, var.value))?;
                }
                Ok(())
            }
            other => Err(ShellError::handler(format!("unknown format {other:?}"))),
        }
    }
}

/// `\help` lists registered commands.
pub struct Help;

impl Command for Help {
    fn name(&self) -> &str {
        "help"
    }

    fn summary(&self) -> &str {
        "list commands"
    }

    fn execute(&self, scope: &Scope<'_>, _args: &Args, input: &str) -> Result<(), ShellError> {
        let wanted = input.trim().trim_start_matches('\\');
        for info in scope.commands().descriptors() {
            if !wanted.is_empty() && info.name != wanted {
                continue;
            }
            scope.say(&format!("\\{:<16} {}", info.name, info.summary))?;
        }
        Ok(())
    }
}

/// `\seq[steps=[...]]` queues each step so they run in the listed order.
///
/// Steps are pushed unexpanded; each one is interpolated when it runs, so a
/// step sees variables set by the steps before it.
pub struct Seq;

impl Command for Seq {
    fn name(&self) -> &str {
        "seq"
    }

    fn summary(&self) -> &str {
        "run steps=[...] in order"
    }

    fn expands_variables(&self) -> bool {
        false
    }

    fn execute(&self, scope: &Scope<'_>, args: &Args, _input: &str) -> Result<(), ShellError> {
        let steps = args
            .get_list("steps")
            .ok_or_else(|| ShellError::handler("usage: \\seq[steps=[...]]"))?;
        let stack = scope.stack()?;
        for step in steps.iter().rev().filter(|s| !s.trim().is_empty()) {
            stack.push_command(step)?;
        }
        Ok(())
    }
}
