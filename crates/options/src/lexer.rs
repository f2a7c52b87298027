//! Tokenizer for the option-string grammar.
//!
//! The grammar is `key '=' value (';' key '=' value)*` where a value is
//! either a bare token or a brace-wrapped nested option string. Braces
//! nest to arbitrary depth; whitespace around tokens is insignificant.
//! [`next_token`] performs the delimiter split honoring brace nesting,
//! [`string_to_map`] drives it to produce an ordered [`OptionMap`], and
//! the escape functions make arbitrary string values survive the trip
//! through trimming and re-parsing.

use crate::error::{Error, Result};

/// String spelling of an absent polymorphic object.
pub const NULLPTR_SENTINEL: &str = "nullptr";

/// An ordered `name -> value` map of option assignments.
///
/// Iteration and serialization follow insertion order, so applying or
/// emitting a map is deterministic across runs. Lookups are linear; maps
/// hold tens of entries, not thousands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    entries: Vec<(String, String)>,
}

impl OptionMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// True if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or replaces `key`, preserving the original position on
    /// replacement.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OptionMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for OptionMap {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Where scanning should continue after [`next_token`].
///
/// `Some(i)` is the byte index of the delimiter that terminated the
/// token; resume at `i + 1`. `None` means the input is exhausted.
pub type TokenEnd = Option<usize>;

/// Finds the first unescaped occurrence of `needle` at or after `start`,
/// treating `\x` pairs as opaque.
fn find_unescaped(input: &str, needle: u8, start: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut pos = start;
    while pos < bytes.len() {
        if bytes[pos] == b'\\' {
            pos += 2;
        } else if bytes[pos] == needle {
            return Some(pos);
        } else {
            pos += 1;
        }
    }
    None
}

/// Reads the next delimiter-separated token from `input` starting at
/// byte offset `start`.
///
/// Leading whitespace is skipped. A token beginning with `{` runs to the
/// matching `}` (tracking nesting depth) and yields the trimmed interior;
/// the next non-space character after the closing brace must be the
/// delimiter or end of input. A bare token runs to the next delimiter or
/// end of input and is trimmed.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] on unbalanced braces or trailing
/// characters after a brace-wrapped token.
pub fn next_token(input: &str, delimiter: char, start: usize) -> Result<(String, TokenEnd)> {
    let bytes = input.as_bytes();
    let mut pos = start;
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    if pos >= bytes.len() {
        // Empty value at the end
        return Ok((String::new(), None));
    }
    if bytes[pos] == b'{' {
        let mut depth = 1usize;
        let mut brace_pos = pos + 1;
        while brace_pos < bytes.len() {
            match bytes[brace_pos] {
                b'\\' => brace_pos += 1,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            brace_pos += 1;
        }
        if depth != 0 || brace_pos >= bytes.len() {
            return Err(Error::invalid_argument("Mismatched curly braces for nested options"));
        }
        let token = input[pos + 1..brace_pos].trim().to_string();
        // Skip whitespace after the matching '}' and demand the delimiter
        // or end of input.
        pos = brace_pos + 1;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos < bytes.len() {
            if bytes[pos] != delimiter as u8 {
                return Err(Error::invalid_argument("Unexpected chars after nested options"));
            }
            Ok((token, Some(pos)))
        } else {
            Ok((token, None))
        }
    } else {
        match find_unescaped(input, delimiter as u8, pos) {
            Some(end) => Ok((input[pos..end].trim().to_string(), Some(end))),
            None => Ok((input[pos..].trim().to_string(), None)),
        }
    }
}

/// Parses an option string into an ordered [`OptionMap`].
///
/// The input is trimmed and any number of enclosing `{...}` layers are
/// peeled before `key=value` pairs are read with [`next_token`] for the
/// value side.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] on an empty key, a missing `=`, or
/// malformed brace nesting in a value.
pub fn string_to_map(input: &str) -> Result<OptionMap> {
    let mut opts = input.trim();
    // If the input starts and ends with "{...}", strip off the brackets
    while opts.len() > 2 && opts.starts_with('{') && opts.ends_with('}') {
        opts = opts[1..opts.len() - 1].trim();
    }

    let mut map = OptionMap::new();
    let mut pos = 0usize;
    while pos < opts.len() {
        let Some(eq_pos) = find_unescaped(opts, b'=', pos) else {
            return Err(Error::invalid_argument("Mismatched key value pair, '=' expected"));
        };
        let key = opts[pos..eq_pos].trim();
        if key.is_empty() {
            return Err(Error::invalid_argument("Empty key found"));
        }
        let (value, end) = next_token(opts, ';', eq_pos + 1)?;
        map.insert(key, value);
        match end {
            Some(delim_pos) => pos = delim_pos + 1,
            None => break,
        }
    }
    Ok(map)
}

/// True if `c` must be escaped wherever it appears in a serialized
/// string value.
fn is_special(c: char) -> bool {
    matches!(c, '\\' | '=' | ';' | '{' | '}' | '#' | '\n' | '\r')
}

fn push_escaped(out: &mut String, c: char) {
    out.push('\\');
    match c {
        '\n' => out.push('n'),
        '\r' => out.push('r'),
        ' ' => out.push('s'),
        '\t' => out.push('t'),
        other => out.push(other),
    }
}

/// Escapes a raw string value for embedding in a serialized option
/// string.
///
/// Structural characters (`= ; { } #`), backslashes, and CR/LF are
/// escaped everywhere; leading and trailing whitespace is escaped so the
/// value survives token trimming. The result round-trips through
/// [`unescape_option_string`].
pub fn escape_option_string(raw: &str) -> String {
    let interior_start = raw.len() - raw.trim_start().len();
    let interior_end = raw.trim_end().len();
    let mut out = String::with_capacity(raw.len());
    for (idx, c) in raw.char_indices() {
        if is_special(c) || ((idx < interior_start || idx >= interior_end) && (c == ' ' || c == '\t')) {
            push_escaped(&mut out, c);
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverses [`escape_option_string`].
///
/// Unrecognized escape sequences decode to the escaped character itself;
/// a dangling trailing backslash is preserved literally.
pub fn unescape_option_string(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('s') => out.push(' '),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
