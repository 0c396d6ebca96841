//! Error types for the VireoPEG runtime

use std::fmt;

use thiserror::Error;

use crate::runtime::state::Position;

/// Error type returned by action and predicate callbacks. Returning an
/// error aborts the parse immediately (see [`crate::runtime::Interpreter`]).
pub type CallbackError = Box<dyn std::error::Error>;

/// Errors that can occur while interpreting a grammar
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("grammar has no rule")]
    NoRule,

    #[error("invalid entrypoint")]
    InvalidEntrypoint,

    #[error("invalid encoding")]
    InvalidEncoding,

    #[error("max number of expressions parsed")]
    MaxExpressions,

    #[error("undefined rule: {0}")]
    UndefinedRule(String),

    #[error("no match found, expected: {0}")]
    NoMatch(String),

    #[error("{0}")]
    Callback(String),
}

/// A [`ParseError`] annotated with the input position where it occurred and
/// a rendered prefix identifying the file, position and active rule.
#[derive(Error, Debug)]
#[error("{prefix}: {inner}")]
pub struct PositionedError {
    #[source]
    pub inner: ParseError,
    pub pos: Position,
    pub prefix: String,
    /// Tokens that were expected at `pos` when the error is a no-match
    /// synthesis. Empty otherwise.
    pub expected: Vec<String>,
}

/// Cumulates the errors found over the course of a parse.
///
/// Lexical errors do not stop the interpreter, so a single run can produce
/// several of them; the list is deduplicated by message before it is handed
/// back to the caller.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<PositionedError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, err: PositionedError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionedError> {
        self.errors.iter()
    }

    /// Drop duplicate entries, keeping the first occurrence of each message.
    pub fn dedupe(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.errors.retain(|e| seen.insert(e.to_string()));
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}

#[cfg(test)]
mod tests {
    use super::*;

    fn positioned(inner: ParseError, prefix: &str) -> PositionedError {
        PositionedError {
            inner,
            pos: Position::default(),
            prefix: prefix.to_string(),
            expected: Vec::new(),
        }
    }

    #[test]
    fn test_display_includes_prefix() {
        let err = positioned(ParseError::InvalidEncoding, "f.x:1:2 (3): rule a");
        assert_eq!(err.to_string(), "f.x:1:2 (3): rule a: invalid encoding");
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let mut list = ErrorList::new();
        list.add(positioned(ParseError::InvalidEncoding, "p"));
        list.add(positioned(ParseError::NoRule, "p"));
        list.add(positioned(ParseError::InvalidEncoding, "p"));
        list.dedupe();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_list_display_joins_with_newline() {
        let mut list = ErrorList::new();
        list.add(positioned(ParseError::NoRule, "a"));
        list.add(positioned(ParseError::InvalidEntrypoint, "b"));
        assert_eq!(
            list.to_string(),
            "a: grammar has no rule\nb: invalid entrypoint"
        );
    }
}
