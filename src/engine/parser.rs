//! Command-line parser.
//!
//! Grammar (whitespace around `=`, `,`, `;` and brackets is ignored):
//!
//! ```text
//! line     := ['\'] name [ '[' pairs ']' ] input        (KeyValue mode)
//!           | ['\'] name input                          (Raw mode)
//! name     := [A-Za-z_][A-Za-z0-9_-]*
//! pairs    := [ pair { ',' pair } [','] ]
//! pair     := key '=' value
//! value    := quoted | list | bare
//! list     := '[' [ item { (',' | ';') item } ] ']'
//! quoted   := '"' ... '"' | '\'' ... '\''   (\" \' \\ are escapes)
//! ```
//!
//! The parse mode is chosen by the caller, normally from the command
//! registry, before the text after the name is looked at. The parser never
//! interpolates; `${...}` reaches the caller untouched.

use std::collections::BTreeMap;
use std::fmt;

use super::error::ShellError;

/// How the text after a command name is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Optional `[k=v, ...]` block followed by free text.
    #[default]
    KeyValue,
    /// Everything after the name is input.
    Raw,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::KeyValue => "key-value",
            ParseMode::Raw => "raw",
        }
    }
}

// ── Args ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Scalar(String),
    List(Vec<String>),
}

impl ArgValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ArgValue::Scalar(s) => Some(s),
            ArgValue::List(_) => None,
        }
    }

    /// Scalars read as a one-element list.
    pub fn as_list(&self) -> &[String] {
        match self {
            ArgValue::Scalar(s) => std::slice::from_ref(s),
            ArgValue::List(items) => items,
        }
    }

    pub fn map<F: Fn(&str) -> String>(&self, f: F) -> ArgValue {
        match self {
            ArgValue::Scalar(s) => ArgValue::Scalar(f(s)),
            ArgValue::List(items) => ArgValue::List(items.iter().map(|s| f(s)).collect()),
        }
    }
}

/// Key-value arguments from a `[...]` block. Empty when there was none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    entries: BTreeMap<String, ArgValue>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later inserts of the same key replace earlier ones.
    pub fn insert(&mut self, key: impl Into<String>, value: ArgValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, ArgValue::Scalar(value.to_string()));
        self
    }

    /// Scalar value for `key`; `None` for missing keys and lists.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(ArgValue::as_scalar)
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(ArgValue::as_list)
    }

    pub fn value(&self, key: &str) -> Option<&ArgValue> {
        self.entries.get(key)
    }

    /// `true`/`yes`/`on`/`1` and `false`/`no`/`off`/`0`, case-insensitive.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ShellError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(ShellError::handler(format!(
                "argument {key} expects a boolean, got {raw:?}"
            ))),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn map_values<F: Fn(&str) -> String>(&self, f: F) -> Args {
        Args {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.map(&f)))
                .collect(),
        }
    }
}

// ── ParsedCommand ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub mode: ParseMode,
    pub args: Args,
    pub input: String,
}

/// Serializes back to a command line that parses to the same command.
impl fmt::Display for ParsedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\{}", self.name)?;
        if self.mode == ParseMode::KeyValue && !self.args.is_empty() {
            f.write_str("[")?;
            for (i, (key, value)) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key}=")?;
                match value {
                    ArgValue::Scalar(s) => write_value(f, s)?,
                    ArgValue::List(items) => {
                        f.write_str("[")?;
                        for (j, item) in items.iter().enumerate() {
                            if j > 0 {
                                f.write_str(", ")?;
                            }
                            write_value(f, item)?;
                        }
                        f.write_str("]")?;
                    }
                }
            }
            f.write_str("]")?;
        }
        if !self.input.is_empty() {
            write!(f, " {}", self.input)?;
        }
        Ok(())
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    let needs_quotes = value.is_empty()
        || value.trim() != value
        || value.contains([',', ';', '[', ']', '"', '\'', '\\']);
    if !needs_quotes {
        return f.write_str(value);
    }
    f.write_str("\"")?;
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{ch}")?;
    }
    f.write_str("\"")
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Parse one logical line, asking `mode_of` for the command's parse mode.
pub fn parse_line<F>(line: &str, mode_of: F) -> Result<ParsedCommand, ShellError>
where
    F: Fn(&str) -> ParseMode,
{
    let (name, rest_at) = split_name(line)?;
    let mode = mode_of(name);
    parse_rest(line, name, rest_at, mode)
}

/// Parse with an explicit mode.
pub fn parse_with_mode(line: &str, mode: ParseMode) -> Result<ParsedCommand, ShellError> {
    parse_line(line, |_| mode)
}

/// Extract the command name. Returns the name and the byte offset just past it.
pub fn split_name(line: &str) -> Result<(&str, usize), ShellError> {
    let mut scan = Scanner::new(line);
    scan.skip_whitespace();
    if scan.peek() == Some('\\') {
        scan.bump();
    }
    let start = scan.pos;
    match scan.peek() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            scan.bump();
        }
        Some(c) => {
            return Err(ShellError::parse(
                start,
                format!("command name cannot start with {c:?}"),
            ));
        }
        None => return Err(ShellError::parse(start, "missing command name")),
    }
    while let Some(c) = scan.peek() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            scan.bump();
        } else if c == '[' || c.is_whitespace() {
            break;
        } else {
            return Err(ShellError::parse(
                scan.pos,
                format!("invalid character {c:?} in command name"),
            ));
        }
    }
    Ok((&line[start..scan.pos], scan.pos))
}

fn parse_rest(
    line: &str,
    name: &str,
    rest_at: usize,
    mode: ParseMode,
) -> Result<ParsedCommand, ShellError> {
    let mut scan = Scanner::at(line, rest_at);
    let mut args = Args::new();
    if mode == ParseMode::KeyValue && scan.peek() == Some('[') {
        args = parse_block(&mut scan)?;
    }
    Ok(ParsedCommand {
        name: name.to_string(),
        mode,
        args,
        input: scan.remaining().trim_start().to_string(),
    })
}

fn parse_block(scan: &mut Scanner<'_>) -> Result<Args, ShellError> {
    let open = scan.pos;
    scan.bump();
    let mut args = Args::new();

    loop {
        scan.skip_whitespace();
        match scan.peek() {
            None => return Err(unterminated(open)),
            Some(']') => {
                scan.bump();
                return Ok(args);
            }
            Some(_) => {}
        }

        let key_at = scan.pos;
        let key = scan.take_while(|c| !matches!(c, '=' | ',' | ']')).trim();
        match scan.peek() {
            None => return Err(unterminated(open)),
            Some('=') => {}
            Some(_) => {
                return Err(ShellError::parse(
                    key_at,
                    format!("argument {key:?} has no value (expected key=value)"),
                ));
            }
        }
        validate_key(key, key_at)?;
        let key = key.to_string();
        scan.bump();
        scan.skip_whitespace();

        let value = match scan.peek() {
            None => return Err(unterminated(open)),
            Some('"') | Some('\'') => ArgValue::Scalar(parse_quoted(scan)?),
            Some('[') => ArgValue::List(parse_list(scan, open)?),
            Some(_) => {
                let bare = scan.take_while(|c| !matches!(c, ',' | ']' | '['));
                if scan.peek() == Some('[') {
                    return Err(ShellError::parse(
                        scan.pos,
                        format!("unexpected '[' in value of {key:?} (quote the value)"),
                    ));
                }
                ArgValue::Scalar(bare.trim().to_string())
            }
        };
        args.insert(key, value);

        scan.skip_whitespace();
        match scan.peek() {
            None => return Err(unterminated(open)),
            Some(',') => {
                scan.bump();
            }
            Some(']') => {
                scan.bump();
                return Ok(args);
            }
            Some(c) => {
                return Err(ShellError::parse(
                    scan.pos,
                    format!("expected ',' or ']' but found {c:?}"),
                ));
            }
        }
    }
}

fn parse_list(scan: &mut Scanner<'_>, block_open: usize) -> Result<Vec<String>, ShellError> {
    let open = scan.pos;
    scan.bump();
    let mut items = Vec::new();

    loop {
        scan.skip_whitespace();
        match scan.peek() {
            None => return Err(unterminated(block_open.min(open))),
            Some(']') => {
                scan.bump();
                return Ok(items);
            }
            Some(',') | Some(';') => {
                scan.bump();
                continue;
            }
            Some('[') => {
                return Err(ShellError::parse(scan.pos, "nested lists are not supported"));
            }
            Some('"') | Some('\'') => items.push(parse_quoted(scan)?),
            Some(_) => {
                let item = scan.take_while(|c| !matches!(c, ',' | ';' | ']' | '['));
                items.push(item.trim().to_string());
            }
        }

        scan.skip_whitespace();
        match scan.peek() {
            None => return Err(unterminated(block_open.min(open))),
            Some(',') | Some(';') => {
                scan.bump();
            }
            Some(']') => {
                scan.bump();
                return Ok(items);
            }
            Some(c) => {
                return Err(ShellError::parse(
                    scan.pos,
                    format!("expected ',', ';' or ']' in list but found {c:?}"),
                ));
            }
        }
    }
}

fn parse_quoted(scan: &mut Scanner<'_>) -> Result<String, ShellError> {
    let open = scan.pos;
    let Some(quote) = scan.bump() else {
        return Err(ShellError::parse(open, "expected a quoted value"));
    };
    let mut out = String::new();
    loop {
        match scan.bump() {
            None => {
                return Err(ShellError::parse(open, "unterminated quoted value"));
            }
            Some(c) if c == quote => return Ok(out),
            Some('\\') => match scan.bump() {
                Some(c @ ('"' | '\'' | '\\')) => out.push(c),
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                }
                None => return Err(ShellError::parse(open, "unterminated quoted value")),
            },
            Some(c) => out.push(c),
        }
    }
}

fn validate_key(key: &str, at: usize) -> Result<(), ShellError> {
    if key.is_empty() {
        return Err(ShellError::parse(at, "empty argument name"));
    }
    if key
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '[' | '"' | '\''))
    {
        return Err(ShellError::parse(at, format!("invalid argument name {key:?}")));
    }
    Ok(())
}

fn unterminated(open: usize) -> ShellError {
    ShellError::parse(open, "unterminated '[' block")
}

// ── Scanner ───────────────────────────────────────────────────────────────────

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self::at(src, 0)
    }

    fn at(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn take_while<P: Fn(char) -> bool>(&mut self, pred: P) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn remaining(&self) -> &'a str {
        &self.src[self.pos..]
    }
}

// ── Continuation lines ────────────────────────────────────────────────────────

/// Trailing marker that continues a logical line onto the next physical line.
pub const CONTINUATION_MARKER: &str = "...";

/// Joins physical lines ending in [`CONTINUATION_MARKER`] into one logical
/// line. Joined lines are separated by `\n`.
///
/// The marker only counts as a separate word: `\echo a ...` continues,
/// `\echo Loading...` is a complete line.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<String>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one physical line. Returns the logical line once it is complete.
    pub fn push(&mut self, physical: &str) -> Option<String> {
        let physical = physical.trim_end_matches(['\r', '\n']);
        if let Some(head) = continuation_head(physical) {
            self.pending.push(head.to_string());
            return None;
        }
        self.pending.push(physical.to_string());
        Some(std::mem::take(&mut self.pending).join("\n"))
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Flush whatever is buffered, e.g. at end of input.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending).join("\n"))
    }
}

/// Text before a trailing continuation marker, if the line ends in one.
fn continuation_head(line: &str) -> Option<&str> {
    let head = line.trim_end().strip_suffix(CONTINUATION_MARKER)?;
    (head.is_empty() || head.ends_with(char::is_whitespace)).then_some(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(line: &str) -> ParsedCommand {
        parse_with_mode(line, ParseMode::KeyValue).expect("parse")
    }

    fn kv_err(line: &str) -> ShellError {
        parse_with_mode(line, ParseMode::KeyValue).expect_err("should fail")
    }

    #[test]
    fn name_and_input() {
        let p = kv("\\echo hello world");
        assert_eq!(p.name, "echo");
        assert!(p.args.is_empty());
        assert_eq!(p.input, "hello world");
    }

    #[test]
    fn backslash_is_optional() {
        assert_eq!(kv("echo hi").name, "echo");
        assert_eq!(kv("  \\echo hi").name, "echo");
    }

    #[test]
    fn key_value_block() {
        let p = kv("\\model-new[name=gpt, provider=dummy]   my model");
        assert_eq!(p.name, "model-new");
        assert_eq!(p.args.get("name"), Some("gpt"));
        assert_eq!(p.args.get("provider"), Some("dummy"));
        assert_eq!(p.input, "my model");
    }

    #[test]
    fn block_without_input() {
        let p = kv("\\model-list[limit=3]");
        assert_eq!(p.args.get("limit"), Some("3"));
        assert_eq!(p.input, "");
    }

    #[test]
    fn empty_block_and_trailing_comma() {
        assert!(kv("\\x[] in").args.is_empty());
        let p = kv("\\x[a=1,] in");
        assert_eq!(p.args.len(), 1);
        assert_eq!(p.input, "in");
    }

    #[test]
    fn whitespace_around_separators() {
        let p = kv("\\x[  a =  1 ,b= two words  ]");
        assert_eq!(p.args.get("a"), Some("1"));
        assert_eq!(p.args.get("b"), Some("two words"));
    }

    #[test]
    fn quoted_values_with_escapes() {
        let p = kv(r#"\x[msg="a, \"quoted\" ]value", alt='it\'s']"#);
        assert_eq!(p.args.get("msg"), Some(r#"a, "quoted" ]value"#));
        assert_eq!(p.args.get("alt"), Some("it's"));
    }

    #[test]
    fn unknown_escape_is_kept() {
        let p = kv(r#"\x[cmd="\echo hi"]"#);
        assert_eq!(p.args.get("cmd"), Some("\\echo hi"));
    }

    #[test]
    fn list_values_keep_order_and_duplicates() {
        let p = kv("\\x[tags=[b, a; b], n=1]");
        assert_eq!(
            p.args.get_list("tags").unwrap(),
            &["b".to_string(), "a".to_string(), "b".to_string()]
        );
        assert_eq!(p.args.get("tags"), None);
        assert_eq!(p.args.get_list("n").unwrap(), &["1".to_string()]);
    }

    #[test]
    fn list_with_quoted_items() {
        let p = kv(r#"\seq[steps=["\echo one", "\echo two, three"]]"#);
        assert_eq!(
            p.args.get_list("steps").unwrap(),
            &["\\echo one".to_string(), "\\echo two, three".to_string()]
        );
    }

    #[test]
    fn empty_list() {
        let p = kv("\\x[tags=[]]");
        assert!(p.args.get_list("tags").unwrap().is_empty());
    }

    #[test]
    fn bracket_after_space_is_input() {
        let p = kv("\\echo [not args]");
        assert!(p.args.is_empty());
        assert_eq!(p.input, "[not args]");
    }

    #[test]
    fn raw_mode_keeps_everything() {
        let p = parse_with_mode("\\set[x] =  a, b ${c}  ", ParseMode::Raw).unwrap();
        assert!(p.args.is_empty());
        assert_eq!(p.input, "[x] =  a, b ${c}  ");
    }

    #[test]
    fn interpolation_tokens_untouched() {
        let p = kv("\\echo[x=${y}] ${z}");
        assert_eq!(p.args.get("x"), Some("${y}"));
        assert_eq!(p.input, "${z}");
    }

    #[test]
    fn bare_key_rejected() {
        let e = kv_err("\\x[flag, a=1]");
        assert!(matches!(e, ShellError::Parse { position: 3, .. }), "{e:?}");
        assert!(kv_err("\\x[flag]").to_string().contains("no value"));
    }

    #[test]
    fn unterminated_block_names_opening_position() {
        let e = kv_err("\\x[a=1, b=2");
        assert_eq!(e, ShellError::parse(2, "unterminated '[' block"));
    }

    #[test]
    fn unterminated_quote() {
        let e = kv_err("\\x[a=\"open]");
        assert!(matches!(e, ShellError::Parse { position: 5, .. }), "{e:?}");
    }

    #[test]
    fn junk_after_quoted_value() {
        assert!(kv_err("\\x[a=\"v\" junk]").to_string().contains("expected ','"));
    }

    #[test]
    fn bracket_inside_bare_value_rejected() {
        let e = kv_err("\\x[a=b[c]] tail");
        assert!(matches!(e, ShellError::Parse { position: 6, .. }), "{e:?}");
        let p = kv("\\x[a=\"b[c]\"] tail");
        assert_eq!(p.args.get("a"), Some("b[c]"));
        assert_eq!(p.input, "tail");
    }

    #[test]
    fn nested_list_rejected() {
        assert!(kv_err("\\x[a=[[1]]]").to_string().contains("nested"));
    }

    #[test]
    fn invalid_names() {
        assert!(matches!(kv_err("\\9lives"), ShellError::Parse { position: 1, .. }));
        assert!(matches!(kv_err("\\bad!name x"), ShellError::Parse { position: 4, .. }));
        assert!(kv_err("\\").to_string().contains("missing command name"));
        assert!(kv_err("   ").to_string().contains("missing command name"));
    }

    #[test]
    fn mode_lookup_receives_name() {
        let p = parse_line("\\set[x] y", |name| {
            assert_eq!(name, "set");
            ParseMode::Raw
        })
        .unwrap();
        assert_eq!(p.input, "[x] y");
    }

    #[test]
    fn serialization_reparses_identically() {
        let lines = [
            "\\echo[x=1] hello ${x}",
            r#"\x[msg="a, \"b\"", tags=[one, "t;wo", ""], e=""] tail  text"#,
            "\\x",
            "\\x [not args]",
            r#"\x[path="C:\\dir"]"#,
        ];
        for line in lines {
            let first = kv(line);
            let serialized = first.to_string();
            let second = kv(&serialized);
            assert_eq!(first, second, "round trip of {line:?} via {serialized:?}");
            assert_eq!(second.to_string(), serialized);
        }
    }

    #[test]
    fn simple_command_serializes_plainly() {
        assert_eq!(kv("\\echo[x=1] hello").to_string(), "\\echo[x=1] hello");
    }

    #[test]
    fn assembler_joins_continuations() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push("\\model-new[name=a, ..."), None);
        assert!(asm.is_pending());
        assert_eq!(asm.push("  provider=dummy]   ..."), None);
        let line = asm.push("description").unwrap();
        assert!(!asm.is_pending());

        let p = kv(&line);
        assert_eq!(p.args.get("name"), Some("a"));
        assert_eq!(p.args.get("provider"), Some("dummy"));
        assert_eq!(p.input, "description");
    }

    #[test]
    fn assembler_passes_single_lines_through() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push("\\echo hi\r\n"), Some("\\echo hi".to_string()));
        assert_eq!(asm.finish(), None);
    }

    #[test]
    fn trailing_ellipsis_in_text_is_not_a_marker() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push("\\echo Loading..."), Some("\\echo Loading...".to_string()));
        assert_eq!(
            asm.push("\\ask tell me more...  "),
            Some("\\ask tell me more...  ".to_string())
        );
        assert!(!asm.is_pending());

        assert_eq!(asm.push("..."), None);
        assert_eq!(asm.push("\\echo joined"), Some("\n\\echo joined".to_string()));
    }

    #[test]
    fn assembler_flushes_on_finish() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push("\\echo a ..."), None);
        assert_eq!(asm.finish(), Some("\\echo a ".to_string()));
    }
}
