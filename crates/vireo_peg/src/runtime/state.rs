//! Parser state for the VireoPEG interpreter
//!
//! [`ParserState`] owns everything that changes over the course of one
//! parse:
//! - the cursor (a [`Savepoint`]: position, current code point and width)
//! - the label-scope, rule, recovery, savepoint and skip-code stacks
//! - the farthest-failure tracker feeding "expected ..." synthesis
//! - the accumulated error list and the statistics counters
//!
//! The grammar itself stays outside, owned read-only by the interpreter;
//! the state only ever refers to it through arena ids.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::error::{ErrorList, ParseError, PositionedError};
use crate::grammar::expr::ExprId;

use super::memo::{MemoNode, MemoTable, ResultTuple};
use super::options::{ParseOptions, Stats};
use super::value::{CallbackCtx, Value};

/// Decoding an empty or invalid input yields the replacement code point,
/// with width 0 (end of input) or 1 (invalid byte).
pub(crate) const RUNE_ERROR: char = '\u{FFFD}';

/// Decode one code point from the front of `bytes`.
///
/// Mirrors the incremental-scanner contract: `(U+FFFD, 0)` at end of
/// input, `(U+FFFD, 1)` on an invalid or truncated sequence, otherwise the
/// code point and its encoded width.
pub(crate) fn decode_rune(bytes: &[u8]) -> (char, usize) {
    if bytes.is_empty() {
        return (RUNE_ERROR, 0);
    }
    let upper = bytes.len().min(4);
    for width in 1..=upper {
        if let Ok(s) = std::str::from_utf8(&bytes[..width]) {
            if let Some(c) = s.chars().next() {
                return (c, width);
            }
        }
    }
    (RUNE_ERROR, 1)
}

/// A position in the input text. `line` is 1-based; `col` counts code
/// points and restarts at zero on the byte following a newline, so the
/// first read of the next line reports column 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, col: usize, offset: usize) -> Self {
        Position { line, col, offset }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} [{}]", self.line, self.col, self.offset)
    }
}

/// Everything required to return the cursor to this point.
#[derive(Debug, Clone, Copy)]
pub struct Savepoint {
    pub pos: Position,
    /// Code point at `pos`, or U+FFFD at end of input.
    pub rn: char,
    /// Encoded width of `rn`; 0 at end of input.
    pub w: usize,
}

impl Savepoint {
    fn start() -> Self {
        Savepoint {
            pos: Position::new(1, 0, 0),
            rn: '\0',
            w: 0,
        }
    }
}

pub struct ParserState<'i> {
    filename: String,
    data: &'i [u8],
    pub(crate) pt: Savepoint,
    errs: ErrorList,

    // (name, display name) per rule ordinal, resolved once at parse start
    rule_meta: Vec<(String, String)>,

    // label scopes; index 0 is a base scope so callbacks always have a view
    vstack: Vec<HashMap<String, Value>>,
    v_pool: Vec<HashMap<String, Value>>,
    rstack: Vec<usize>,
    recovery_stack: Vec<HashMap<String, ExprId>>,
    sp_stack: Vec<Savepoint>,
    sc_stack: Vec<bool>,

    max_fail_pos: Position,
    max_fail_expected: Vec<String>,
    max_fail_invert_expected: bool,

    max_expr_cnt: u64,
    allow_invalid_utf8: bool,
    debug: bool,
    depth: usize,
    pub(crate) memoize: bool,
    memo: MemoTable,

    stats: Stats,
    collect_choice_stats: bool,
    choice_no_match: String,

    custom_data: Option<Rc<dyn Any>>,

    // where to attribute errors raised inside an action callback
    err_pos: Option<Position>,
    cur_pos: Position,
    cur_span: (usize, usize),
}

impl<'i> ParserState<'i> {
    pub(crate) fn new(
        filename: &str,
        data: &'i [u8],
        rule_meta: Vec<(String, String)>,
        options: &ParseOptions,
    ) -> Self {
        ParserState {
            filename: filename.to_string(),
            data,
            pt: Savepoint::start(),
            errs: ErrorList::new(),
            rule_meta,
            vstack: vec![HashMap::new()],
            v_pool: Vec::new(),
            rstack: Vec::new(),
            recovery_stack: Vec::new(),
            sp_stack: Vec::new(),
            sc_stack: vec![false],
            max_fail_pos: Position::new(1, 1, 0),
            max_fail_expected: Vec::with_capacity(20),
            max_fail_invert_expected: false,
            max_expr_cnt: if options.max_expressions == 0 {
                u64::MAX
            } else {
                options.max_expressions
            },
            allow_invalid_utf8: options.allow_invalid_utf8,
            debug: options.debug,
            depth: 0,
            memoize: options.memoize,
            memo: MemoTable::new(),
            stats: Stats::default(),
            collect_choice_stats: options.statistics.is_some(),
            choice_no_match: options.statistics.clone().unwrap_or_default(),
            custom_data: options.custom_data.clone(),
            err_pos: None,
            cur_pos: Position::default(),
            cur_span: (0, 0),
        }
    }

    // =========================================================================
    // Cursor & scanner
    // =========================================================================

    /// Advance the cursor past the current code point and decode the next.
    pub(crate) fn read(&mut self) {
        self.pt.pos.offset += self.pt.w;
        let (rn, w) = decode_rune(&self.data[self.pt.pos.offset..]);
        self.pt.rn = rn;
        self.pt.w = w;
        self.pt.pos.col += 1;
        if rn == '\n' {
            self.pt.pos.line += 1;
            self.pt.pos.col = 0;
        }

        if rn == RUNE_ERROR && w == 1 && !self.allow_invalid_utf8 {
            self.add_err(ParseError::InvalidEncoding);
        }
    }

    /// Return the cursor to `pt`. A no-op when the offsets already match,
    /// so hot backtracking paths skip the copy.
    pub(crate) fn restore(&mut self, pt: Savepoint) {
        if pt.pos.offset == self.pt.pos.offset {
            return;
        }
        self.pt = pt;
    }

    /// Input bytes from `offset` up to the cursor.
    pub(crate) fn slice_from(&self, offset: usize) -> &'i [u8] {
        &self.data[offset..self.pt.pos.offset]
    }

    /// True when the cursor sits past the last code point.
    pub(crate) fn at_eof(&self) -> bool {
        self.pt.rn == RUNE_ERROR && self.pt.w == 0
    }

    // =========================================================================
    // Scoped stacks
    // =========================================================================

    /// Push a fresh label scope, reusing a retired map to avoid churn.
    pub(crate) fn push_v(&mut self) {
        let scope = self.v_pool.pop().unwrap_or_default();
        self.vstack.push(scope);
    }

    /// Pop the current label scope, retiring its (cleared) map for reuse.
    pub(crate) fn pop_v(&mut self) {
        if let Some(mut scope) = self.vstack.pop() {
            scope.clear();
            self.v_pool.push(scope);
        }
    }

    pub(crate) fn bind(&mut self, label: &str, value: Value) {
        if let Some(scope) = self.vstack.last_mut() {
            scope.insert(label.to_string(), value);
        }
    }

    pub(crate) fn push_rule(&mut self, index: usize) {
        self.rstack.push(index);
    }

    pub(crate) fn pop_rule(&mut self) {
        self.rstack.pop();
    }

    pub(crate) fn rule_name(&self, index: usize) -> &str {
        &self.rule_meta[index].0
    }

    pub(crate) fn push_recovery(&mut self, labels: &[String], expr: ExprId) {
        let mut frame = HashMap::with_capacity(labels.len());
        for label in labels {
            frame.insert(label.clone(), expr);
        }
        self.recovery_stack.push(frame);
    }

    pub(crate) fn pop_recovery(&mut self) {
        self.recovery_stack.pop();
    }

    /// Innermost recovery expression bound to `label`, if any.
    pub(crate) fn find_recovery(&self, label: &str) -> Option<ExprId> {
        self.recovery_stack
            .iter()
            .rev()
            .find_map(|frame| frame.get(label).copied())
    }

    pub(crate) fn push_skip_code(&mut self, skip: bool) {
        self.sc_stack.push(skip);
    }

    pub(crate) fn pop_skip_code(&mut self) {
        self.sc_stack.pop();
    }

    pub(crate) fn check_skip_code(&self) -> bool {
        self.sc_stack.last().copied().unwrap_or(false)
    }

    pub(crate) fn sp_push(&mut self, pt: Savepoint) {
        self.sp_stack.push(pt);
    }

    pub(crate) fn sp_pop(&mut self) -> Savepoint {
        self.sp_stack.pop().unwrap_or(self.pt)
    }

    // =========================================================================
    // Failure tracking & errors
    // =========================================================================

    pub(crate) fn toggle_invert(&mut self) {
        self.max_fail_invert_expected = !self.max_fail_invert_expected;
    }

    /// Record an expectation for the farthest-failure tracker.
    ///
    /// Under an inverting predicate the polarity flips: successes are the
    /// interesting events and the expectation is reported negated.
    pub(crate) fn fail_at(&mut self, fail: bool, pos: Position, want: &str) {
        if fail != self.max_fail_invert_expected {
            return;
        }
        if pos.offset < self.max_fail_pos.offset {
            return;
        }
        if pos.offset > self.max_fail_pos.offset {
            self.max_fail_pos = pos;
            self.max_fail_expected.clear();
        }
        if self.max_fail_invert_expected {
            self.max_fail_expected.push(format!("!{}", want));
        } else {
            self.max_fail_expected.push(want.to_string());
        }
    }

    pub(crate) fn add_err(&mut self, err: ParseError) {
        let pos = self.err_pos.unwrap_or(self.pt.pos);
        self.add_err_at(err, pos, Vec::new());
    }

    pub(crate) fn add_err_at(&mut self, err: ParseError, pos: Position, expected: Vec<String>) {
        let mut prefix = String::new();
        if !self.filename.is_empty() {
            prefix.push_str(&self.filename);
            prefix.push(':');
        }
        let _ = write!(prefix, "{}:{} ({})", pos.line, pos.col, pos.offset);
        if let Some(&index) = self.rstack.last() {
            prefix.push_str(": rule ");
            prefix.push_str(&self.rule_meta[index].1);
        }
        self.errs.add(PositionedError {
            inner: err,
            pos,
            prefix,
            expected,
        });
    }

    pub(crate) fn has_errors(&self) -> bool {
        !self.errs.is_empty()
    }

    pub(crate) fn set_err_pos(&mut self, pos: Option<Position>) {
        self.err_pos = pos;
    }

    /// Turn the failure tracker into the final "no match found" error.
    pub(crate) fn synthesize_no_match(&mut self) {
        let mut set: BTreeSet<String> = self.max_fail_expected.drain(..).collect();
        let eof = set.remove("!.");
        let mut expected: Vec<String> = set.into_iter().collect();
        if eof {
            expected.push("EOF".to_string());
        }
        let msg = list_join(&expected, ", ", "or");
        self.add_err_at(ParseError::NoMatch(msg), self.max_fail_pos, expected);
    }

    // =========================================================================
    // Budget & statistics
    // =========================================================================

    /// Count one node evaluation; true when the budget is exhausted.
    pub(crate) fn over_budget(&mut self) -> bool {
        self.stats.expr_cnt += 1;
        self.stats.expr_cnt > self.max_expr_cnt
    }

    pub(crate) fn inc_choice_alt(&mut self, pos: Position, alt: Option<usize>) {
        if !self.collect_choice_stats {
            return;
        }
        let rule = match self.rstack.last() {
            Some(&index) => self.rule_meta[index].0.as_str(),
            None => "",
        };
        let key = format!("{} {}:{}", rule, pos.line, pos.col);
        let alt_key = match alt {
            Some(i) => (i + 1).to_string(),
            None => self.choice_no_match.clone(),
        };
        *self
            .stats
            .choice_alt_cnt
            .entry(key)
            .or_default()
            .entry(alt_key)
            .or_insert(0) += 1;
    }

    // =========================================================================
    // Memoization
    // =========================================================================

    pub(crate) fn memo_get(&self, node: MemoNode) -> Option<&ResultTuple> {
        self.memo.get(self.pt.pos.offset, node)
    }

    pub(crate) fn memo_set(&mut self, start: Savepoint, node: MemoNode, tuple: ResultTuple) {
        self.memo.insert(start.pos.offset, node, tuple);
    }

    // =========================================================================
    // Callback context
    // =========================================================================

    pub(crate) fn set_cur(&mut self, pos: Position, span: (usize, usize)) {
        self.cur_pos = pos;
        self.cur_span = span;
    }

    /// View handed to action callbacks: the match just completed.
    pub(crate) fn action_ctx(&self) -> CallbackCtx<'_> {
        CallbackCtx {
            pos: self.cur_pos,
            text: &self.data[self.cur_span.0..self.cur_span.1],
            data: self.custom_data.as_ref(),
            env: self.vstack.last(),
        }
    }

    /// View handed to predicate callbacks: current position, no text.
    pub(crate) fn predicate_ctx(&self) -> CallbackCtx<'_> {
        let offset = self.pt.pos.offset;
        CallbackCtx {
            pos: self.pt.pos,
            text: &self.data[offset..offset],
            data: self.custom_data.as_ref(),
            env: self.vstack.last(),
        }
    }

    // =========================================================================
    // Debug trace
    // =========================================================================

    pub(crate) fn debug_enabled(&self) -> bool {
        self.debug
    }

    fn print(&self, prefix: &str, s: &str) {
        println!(
            "{} {}:{}:{}: {} [{:?}]",
            prefix, self.pt.pos.line, self.pt.pos.col, self.pt.pos.offset, s, self.pt.rn
        );
    }

    pub(crate) fn print_indent(&self, mark: &str, s: &str) {
        self.print(&format!("{}{}", " ".repeat(self.depth), mark), s);
    }

    pub(crate) fn trace_enter(&mut self, s: &str) {
        self.print_indent(">", s);
        self.depth += 1;
    }

    pub(crate) fn trace_exit(&mut self, s: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.print_indent("<", s);
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    pub(crate) fn finish(mut self) -> (Option<ErrorList>, Stats) {
        self.errs.dedupe();
        let errors = if self.errs.is_empty() {
            None
        } else {
            Some(self.errs)
        };
        (errors, self.stats)
    }
}

/// Join `list` with `sep`, using `last_sep` before the final element.
pub(crate) fn list_join(list: &[String], sep: &str, last_sep: &str) -> String {
    match list.len() {
        0 => String::new(),
        1 => list[0].clone(),
        n => format!(
            "{} {} {}",
            list[..n - 1].join(sep),
            last_sep,
            list[n - 1]
        ),
    }
}
