//! Parse configuration and statistics
//!
//! Options are a plain record applied once at parse start; the same
//! grammar can be parsed with different option sets concurrently.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

#[derive(Clone)]
pub struct ParseOptions {
    /// Start rule name; the grammar's first rule when unset.
    pub entrypoint: Option<String>,
    /// Print an indented evaluation trace to stdout.
    pub debug: bool,
    /// Enable the packrat cache.
    pub memoize: bool,
    /// Abort after this many node evaluations. 0 means unlimited.
    pub max_expressions: u64,
    /// When set, collect per-choice alternative counts; the string is the
    /// counter key used when no alternative matches.
    pub statistics: Option<String>,
    /// Tolerate invalid UTF-8 instead of recording lexical errors.
    pub allow_invalid_utf8: bool,
    /// Trap panics raised by callbacks and convert them into errors.
    pub recover: bool,
    /// Opaque embedder data readable by callbacks.
    pub custom_data: Option<Rc<dyn Any>>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            entrypoint: None,
            debug: false,
            memoize: false,
            max_expressions: 0,
            statistics: None,
            allow_invalid_utf8: false,
            recover: true,
            custom_data: None,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entrypoint(mut self, name: impl Into<String>) -> Self {
        self.entrypoint = Some(name.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    pub fn with_max_expressions(mut self, max: u64) -> Self {
        self.max_expressions = max;
        self
    }

    pub fn with_statistics(mut self, no_match_key: impl Into<String>) -> Self {
        self.statistics = Some(no_match_key.into());
        self
    }

    pub fn with_allow_invalid_utf8(mut self, allow: bool) -> Self {
        self.allow_invalid_utf8 = allow;
        self
    }

    pub fn with_recover(mut self, recover: bool) -> Self {
        self.recover = recover;
        self
    }

    pub fn with_custom_data(mut self, data: Rc<dyn Any>) -> Self {
        self.custom_data = Some(data);
        self
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("entrypoint", &self.entrypoint)
            .field("debug", &self.debug)
            .field("memoize", &self.memoize)
            .field("max_expressions", &self.max_expressions)
            .field("statistics", &self.statistics)
            .field("allow_invalid_utf8", &self.allow_invalid_utf8)
            .field("recover", &self.recover)
            .field("custom_data", &self.custom_data.is_some())
            .finish()
    }
}

/// Counters gathered during parsing. Serializable so embedders can dump
/// them (typically as JSON) to tune alternative ordering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    /// Number of expression nodes evaluated, compared against the
    /// `max_expressions` budget.
    pub expr_cnt: u64,

    /// Outer key: `"<rule-name> <line>:<col>"` of the choice expression.
    /// Inner key: one-based alternative number, or the configured no-match
    /// key. Only populated when the statistics option is set.
    pub choice_alt_cnt: HashMap<String, HashMap<String, u64>>,
}
