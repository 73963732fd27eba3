//! `${name}` substitution.
//!
//! Expansion runs in passes. Each pass replaces every complete `${name}`
//! token with the looked-up value (missing names become the empty string);
//! passes repeat while they change the text, up to a fixed limit. A value
//! that itself contains `${...}` is therefore resolved on the next pass,
//! and a self-referencing value stops at the limit instead of looping.
//!
//! Expanded text is also capped in length. A pass that would grow the text
//! past the cap is abandoned and the text from the previous pass is returned.

use tracing::{trace, warn};

use super::variables::VariableStore;

pub const DEFAULT_MAX_PASSES: usize = 10;
pub const DEFAULT_MAX_LEN: usize = 1024 * 1024;

const OPEN: &str = "${";
const CLOSE: char = '}';

#[derive(Debug, Clone, Copy)]
pub struct Interpolator {
    max_passes: usize,
    max_len: usize,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PASSES)
    }
}

impl Interpolator {
    /// A pass count of zero is treated as one.
    pub fn new(max_passes: usize) -> Self {
        Self { max_passes: max_passes.max(1), max_len: DEFAULT_MAX_LEN }
    }

    /// Cap on the length in bytes of expanded text.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(1);
        self
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Expand `text`, resolving names through `lookup`.
    pub fn expand<F>(&self, text: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut current = text.to_string();
        for pass in 0..self.max_passes {
            if !current.contains(OPEN) {
                return current;
            }
            let Some((next, replaced)) = substitute_once(&current, &lookup, self.max_len) else {
                warn!(pass, max_len = self.max_len, "interpolation length limit reached");
                return current;
            };
            if replaced == 0 || next == current {
                return next;
            }
            trace!(pass, replaced, "interpolation pass");
            current = next;
        }
        trace!(max_passes = self.max_passes, "interpolation pass limit reached");
        current
    }

    pub fn expand_with_store(&self, text: &str, store: &VariableStore) -> String {
        self.expand(text, |name| store.lookup(name))
    }
}

/// One left-to-right pass. Returns the new text and the number of tokens
/// replaced, or `None` once the output grows past `max_len`.
fn substitute_once<F>(text: &str, lookup: &F, max_len: usize) -> Option<(String, usize)>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut replaced = 0;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            // Unterminated `${` is literal text.
            out.push_str(&rest[start..]);
            return (out.len() <= max_len).then_some((out, replaced));
        };
        let name = &after[..end];
        if name.contains(OPEN) {
            // `${a${b}}`: keep the outer opener, resolve the inner token first.
            out.push_str(OPEN);
            rest = after;
            continue;
        }
        let value = lookup(name).unwrap_or_default();
        if out.len() + value.len() > max_len {
            return None;
        }
        out.push_str(&value);
        replaced += 1;
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    (out.len() <= max_len).then_some((out, replaced))
}
