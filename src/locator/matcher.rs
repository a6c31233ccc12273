//! Anchored line matcher for locator assignments.
//!
//! Recognizes lines of the shape
//!
//! ```text
//! NAME = (By.STRATEGY, "selector")
//! NAME=(By.STRATEGY,'selector')  # trailing content is allowed
//! ```
//!
//! Matching is anchored at column 0. The name must be followed directly by
//! whitespace or `=`, so `LOGIN_BUTTON` never matches a `LOGIN_BUTTON2` line.
//! The selector runs from the opening quote to the first quote that is
//! immediately followed by `)`. Either quote character may close it.

use super::Strategy;

/// A recognized locator assignment line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorAssignment {
    pub name: String,
    /// Strategy token exactly as written (e.g. `XPATH`, or an unknown `FOO`).
    pub strategy_token: String,
    pub selector: String,
}

impl LocatorAssignment {
    /// The strategy, if the token is one of the known set.
    pub fn strategy(&self) -> Option<Strategy> {
        self.strategy_token.parse().ok()
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// Strip the line terminator (`\n` or `\r\n`) for matching.
pub(crate) fn line_body(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Parse everything after the name: `\s*=\s*(NS.WORD,\s*QUOTE...QUOTE)`.
///
/// Returns `(strategy_token, selector)`.
fn parse_rhs<'a>(rest: &'a str, namespace: &str) -> Option<(&'a str, &'a str)> {
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=')?.trim_start();
    let rest = rest.strip_prefix('(')?;
    let rest = rest.strip_prefix(namespace)?;
    let rest = rest.strip_prefix('.')?;

    let token_len: usize = rest
        .chars()
        .take_while(|c| is_word(*c))
        .map(char::len_utf8)
        .sum();
    if token_len == 0 {
        return None;
    }
    let (token, rest) = rest.split_at(token_len);

    let rest = rest.strip_prefix(',')?.trim_start();
    let open = rest.chars().next().filter(|c| is_quote(*c))?;
    let body = &rest[open.len_utf8()..];

    // Lazy: stop at the first quote that closes the paren.
    let close = body
        .char_indices()
        .find(|(i, c)| is_quote(*c) && body[i + c.len_utf8()..].starts_with(')'))
        .map(|(i, _)| i)?;

    Some((token, &body[..close]))
}

/// Whether `line` is an assignment to exactly `name`.
pub fn matches_name(line: &str, name: &str, namespace: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    line_body(line)
        .strip_prefix(name)
        .and_then(|rest| parse_rhs(rest, namespace))
        .is_some()
}

/// Parse a line into an assignment, taking the leading identifier as name.
pub fn parse_assignment(line: &str, namespace: &str) -> Option<LocatorAssignment> {
    let body = line_body(line);
    let first = body.chars().next()?;
    if !(first.is_alphabetic() || first == '_') {
        return None;
    }
    let name_len: usize = body
        .chars()
        .take_while(|c| is_word(*c))
        .map(char::len_utf8)
        .sum();
    let (name, rest) = body.split_at(name_len);
    let (token, selector) = parse_rhs(rest, namespace)?;

    Some(LocatorAssignment {
        name: name.to_string(),
        strategy_token: token.to_string(),
        selector: selector.to_string(),
    })
}
