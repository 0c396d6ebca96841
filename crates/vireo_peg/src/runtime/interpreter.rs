//! The VireoPEG expression interpreter
//!
//! [`Interpreter`] walks a [`Grammar`]'s expression arena depth-first
//! against a [`ParserState`]. Every node either advances the cursor and
//! produces a value, or fails with the cursor restored to where it stood
//! before the attempt; that restore discipline is what makes ordered
//! choice and greedy repetition correct.
//!
//! Cross-cutting concerns (expression budget, debug trace, memoization)
//! live in the dispatcher and the rule wrapper only; the per-operator
//! evaluators contain nothing but their operator's semantics.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{ErrorList, ParseError};
use crate::grammar::expr::{
    ActionFn, CharClassMatcher, Expr, ExprId, Grammar, PredicateFn,
};

use super::memo::{MemoNode, ResultTuple};
use super::options::{ParseOptions, Stats};
use super::state::{ParserState, Position};
use super::value::Value;

/// Conditions that abort the whole parse, propagated eagerly through every
/// evaluator and handled once by the driver.
#[derive(Debug)]
pub(crate) enum Fatal {
    /// The `max_expressions` budget is exhausted.
    MaxExprCnt,
    /// A callback failed; the error is already on the list.
    Aborted,
}

type EvalResult = Result<(Value, bool), Fatal>;

/// Outcome of a parse: a value on success, the (deduplicated) error list
/// when anything went wrong, and the statistics counters either way.
///
/// Both `value` and `errors` can be set at once when lexical errors were
/// recorded but the entry rule still matched.
#[derive(Debug)]
pub struct ParseOutput {
    pub value: Option<Value>,
    pub errors: Option<ErrorList>,
    pub stats: Stats,
}

impl ParseOutput {
    /// Collapse into a `Result`, treating any recorded error as failure.
    pub fn into_result(self) -> Result<Value, ErrorList> {
        match self.errors {
            Some(errors) => Err(errors),
            None => Ok(self.value.unwrap_or(Value::Null)),
        }
    }
}

/// Parse `data` with `grammar`, starting from the configured entrypoint.
pub fn parse(grammar: &Grammar, filename: &str, data: &[u8], options: ParseOptions) -> ParseOutput {
    Interpreter::new(grammar).parse(filename, data, options)
}

pub struct Interpreter<'g> {
    grammar: &'g Grammar,
}

impl<'g> Interpreter<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Interpreter { grammar }
    }

    /// Run the grammar against `data`. `filename` only decorates error
    /// messages.
    pub fn parse(&self, filename: &str, data: &[u8], options: ParseOptions) -> ParseOutput {
        let rule_meta = self
            .grammar
            .rules()
            .iter()
            .map(|r| (r.name.clone(), r.display().to_string()))
            .collect();
        let mut p = ParserState::new(filename, data, rule_meta, &options);

        if self.grammar.rules().is_empty() {
            p.add_err(ParseError::NoRule);
            return Self::output(None, p);
        }

        let start = match &options.entrypoint {
            Some(name) => self.grammar.rule_by_name(name),
            None => Some(0),
        };
        let start = match start {
            Some(index) => index,
            None => {
                p.add_err(ParseError::InvalidEntrypoint);
                return Self::output(None, p);
            }
        };

        // prime the cursor with the first code point
        p.read();

        let evaluated = if options.recover {
            match catch_unwind(AssertUnwindSafe(|| self.eval_rule_wrap(&mut p, start))) {
                Ok(res) => res,
                Err(payload) => {
                    p.add_err(ParseError::Callback(panic_message(payload.as_ref())));
                    Err(Fatal::Aborted)
                }
            }
        } else {
            self.eval_rule_wrap(&mut p, start)
        };

        let value = match evaluated {
            Ok((val, true)) => Some(val),
            Ok((_, false)) => None,
            // the fatal paths recorded their error when they unwound
            Err(Fatal::MaxExprCnt) | Err(Fatal::Aborted) => None,
        };

        if value.is_none() && !p.has_errors() {
            // the expected tokens at the farthest position become the error
            p.synthesize_no_match();
        }
        Self::output(value, p)
    }

    fn output(value: Option<Value>, p: ParserState<'_>) -> ParseOutput {
        let (errors, stats) = p.finish();
        ParseOutput {
            value,
            errors,
            stats,
        }
    }

    // =========================================================================
    // Rule evaluation
    // =========================================================================

    fn eval_rule_wrap(&self, p: &mut ParserState<'_>, index: usize) -> EvalResult {
        let debug = p.debug_enabled();
        let start_offset = p.pt.pos.offset;
        if debug {
            p.trace_enter(&format!("rule {}", self.grammar.rules[index].name));
        }

        let res = if p.memoize {
            self.eval_rule_memoized(p, index)
        } else {
            self.eval_rule(p, index)
        };

        if debug {
            if matches!(res, Ok((_, true))) {
                let text = String::from_utf8_lossy(p.slice_from(start_offset)).into_owned();
                p.print_indent("MATCH", &text);
            }
            p.trace_exit(&format!("rule {}", self.grammar.rules[index].name));
        }
        res
    }

    fn eval_rule_memoized(&self, p: &mut ParserState<'_>, index: usize) -> EvalResult {
        if let Some(tuple) = p.memo_get(MemoNode::Rule(index)) {
            let tuple = tuple.clone();
            p.restore(tuple.end);
            return Ok((tuple.value, tuple.matched));
        }
        let start = p.pt;
        let (value, matched) = self.eval_rule(p, index)?;
        p.memo_set(
            start,
            MemoNode::Rule(index),
            ResultTuple {
                value: value.clone(),
                matched,
                end: p.pt,
            },
        );
        Ok((value, matched))
    }

    fn eval_rule(&self, p: &mut ParserState<'_>, index: usize) -> EvalResult {
        let rule = &self.grammar.rules[index];
        p.push_rule(index);
        p.push_v();
        let res = self.eval_expr_wrap(p, rule.expr);
        p.pop_v();
        p.pop_rule();
        res
    }

    // =========================================================================
    // Dispatcher
    // =========================================================================

    fn eval_expr_wrap(&self, p: &mut ParserState<'_>, id: ExprId) -> EvalResult {
        if p.memoize {
            if let Some(tuple) = p.memo_get(MemoNode::Expr(id)) {
                let tuple = tuple.clone();
                p.restore(tuple.end);
                return Ok((tuple.value, tuple.matched));
            }
            let start = p.pt;
            let (value, matched) = self.eval_expr(p, id)?;
            p.memo_set(
                start,
                MemoNode::Expr(id),
                ResultTuple {
                    value: value.clone(),
                    matched,
                    end: p.pt,
                },
            );
            return Ok((value, matched));
        }
        self.eval_expr(p, id)
    }

    fn eval_expr(&self, p: &mut ParserState<'_>, id: ExprId) -> EvalResult {
        if p.over_budget() {
            // recorded here so the message carries the active rule
            p.add_err(ParseError::MaxExpressions);
            return Err(Fatal::MaxExprCnt);
        }

        let expr = self.grammar.expr(id);
        let debug = p.debug_enabled();
        if debug {
            p.trace_enter(expr.kind());
        }

        let res = match expr {
            Expr::Sequence { exprs } => self.eval_sequence(p, exprs),
            Expr::Choice { alternatives, pos } => self.eval_choice(p, alternatives, *pos),
            Expr::ZeroOrOne { expr } => self.eval_zero_or_one(p, *expr),
            Expr::ZeroOrMore { expr } => self.eval_zero_or_more(p, *expr),
            Expr::OneOrMore { expr } => self.eval_one_or_more(p, *expr),
            Expr::And { expr } => self.eval_and(p, *expr, false),
            Expr::AndLogical { expr } => self.eval_and(p, *expr, true),
            Expr::Not { expr } => self.eval_not(p, *expr, false),
            Expr::NotLogical { expr } => self.eval_not(p, *expr, true),
            Expr::Literal {
                val,
                ignore_case,
                want,
            } => self.eval_literal(p, val, *ignore_case, want),
            Expr::CharClass(matcher) => self.eval_char_class(p, matcher),
            Expr::AnyMatcher => self.eval_any(p),
            Expr::Labeled {
                label,
                expr,
                text_capture,
            } => self.eval_labeled(p, label, *expr, *text_capture),
            Expr::Action { expr, run } => self.eval_action(p, *expr, run),
            Expr::CodePredicate { run, not_skip } => self.eval_code(p, run, *not_skip),
            Expr::AndCode { run } => self.eval_and_code(p, run),
            Expr::NotCode { run } => self.eval_not_code(p, run),
            Expr::RuleRef { name } => self.eval_rule_ref(p, name),
            Expr::RuleIndexRef { index } => self.eval_rule_index_ref(p, *index),
            Expr::Recovery {
                expr,
                recover_expr,
                labels,
            } => self.eval_recovery(p, *expr, *recover_expr, labels),
            Expr::Throw { label } => self.eval_throw(p, label),
        };

        if debug {
            p.trace_exit(expr.kind());
        }
        res
    }

    // =========================================================================
    // Per-operator evaluators
    // =========================================================================

    fn eval_sequence(&self, p: &mut ParserState<'_>, exprs: &[ExprId]) -> EvalResult {
        let pt = p.pt;
        let mut vals = Vec::new();
        for &child in exprs {
            let (val, ok) = self.eval_expr_wrap(p, child)?;
            if !ok {
                p.restore(pt);
                return Ok((Value::Null, false));
            }
            if !val.is_null() && !p.check_skip_code() {
                vals.push(val);
            }
        }
        Ok((Value::List(vals), true))
    }

    fn eval_choice(
        &self,
        p: &mut ParserState<'_>,
        alternatives: &[ExprId],
        pos: Position,
    ) -> EvalResult {
        for (alt_index, &alt) in alternatives.iter().enumerate() {
            p.push_v();
            let res = self.eval_expr_wrap(p, alt);
            p.pop_v();
            let (val, ok) = res?;
            if ok {
                p.inc_choice_alt(pos, Some(alt_index));
                return Ok((val, true));
            }
        }
        p.inc_choice_alt(pos, None);
        Ok((Value::Null, false))
    }

    fn eval_zero_or_one(&self, p: &mut ParserState<'_>, expr: ExprId) -> EvalResult {
        p.push_v();
        let res = self.eval_expr_wrap(p, expr);
        p.pop_v();
        let (val, _) = res?;
        // a miss still counts as a match, with no value
        Ok((val, true))
    }

    fn eval_zero_or_more(&self, p: &mut ParserState<'_>, expr: ExprId) -> EvalResult {
        let mut vals = Vec::new();
        loop {
            p.push_v();
            let res = self.eval_expr_wrap(p, expr);
            p.pop_v();
            let (val, ok) = res?;
            if !ok {
                return Ok((Value::List(vals), true));
            }
            vals.push(val);
        }
    }

    fn eval_one_or_more(&self, p: &mut ParserState<'_>, expr: ExprId) -> EvalResult {
        let mut vals = Vec::new();
        loop {
            p.push_v();
            let res = self.eval_expr_wrap(p, expr);
            p.pop_v();
            let (val, ok) = res?;
            if !ok {
                if vals.is_empty() {
                    return Ok((Value::Null, false));
                }
                return Ok((Value::List(vals), true));
            }
            vals.push(val);
        }
    }

    fn eval_and(&self, p: &mut ParserState<'_>, expr: ExprId, logical: bool) -> EvalResult {
        let pt = p.pt;
        p.push_v();
        p.push_skip_code(true);
        let res = self.eval_expr_wrap(p, expr);
        p.pop_skip_code();
        let matched_offset = p.pt.pos.offset;
        p.pop_v();
        p.restore(pt);

        let (_, ok) = res?;
        if logical {
            return Ok((Value::Null, ok && p.pt.pos.offset != matched_offset));
        }
        Ok((Value::Null, ok))
    }

    fn eval_not(&self, p: &mut ParserState<'_>, expr: ExprId, logical: bool) -> EvalResult {
        let pt = p.pt;
        p.push_v();
        p.toggle_invert();
        p.push_skip_code(true);
        let res = self.eval_expr_wrap(p, expr);
        p.pop_skip_code();
        p.toggle_invert();
        let matched_offset = p.pt.pos.offset;
        p.pop_v();
        p.restore(pt);

        let (_, ok) = res?;
        if logical {
            return Ok((Value::Null, ok && p.pt.pos.offset != matched_offset));
        }
        Ok((Value::Null, !ok))
    }

    fn eval_literal(
        &self,
        p: &mut ParserState<'_>,
        val: &str,
        ignore_case: bool,
        want: &str,
    ) -> EvalResult {
        let start = p.pt;
        for want_ch in val.chars() {
            let mut cur = p.pt.rn;
            if ignore_case {
                cur = to_lower(cur);
            }
            if cur != want_ch {
                p.fail_at(false, start.pos, want);
                p.restore(start);
                return Ok((Value::Null, false));
            }
            p.read();
        }
        p.fail_at(true, start.pos, want);
        Ok((Value::from_match(p.slice_from(start.pos.offset)), true))
    }

    fn eval_char_class(&self, p: &mut ParserState<'_>, matcher: &CharClassMatcher) -> EvalResult {
        let pos = p.pt.pos;

        // end of input never matches, inverted or not
        if p.at_eof() {
            p.fail_at(false, pos, &matcher.val);
            return Ok((Value::Null, false));
        }

        let mut cur = p.pt.rn;
        if matcher.ignore_case {
            cur = to_lower(cur);
        }

        let mut member = matcher.chars.contains(&cur);
        if !member {
            member = matcher.ranges.iter().any(|&(lo, hi)| cur >= lo && cur <= hi);
        }
        if !member {
            member = matcher.classes.iter().any(|class| class.contains(cur));
        }

        if member != matcher.inverted {
            p.fail_at(true, pos, &matcher.val);
            p.read();
            return Ok((Value::from_match(p.slice_from(pos.offset)), true));
        }
        p.fail_at(false, pos, &matcher.val);
        Ok((Value::Null, false))
    }

    fn eval_any(&self, p: &mut ParserState<'_>) -> EvalResult {
        let pos = p.pt.pos;
        if p.at_eof() {
            p.fail_at(false, pos, ".");
            return Ok((Value::Null, false));
        }
        p.fail_at(true, pos, ".");
        p.read();
        Ok((Value::from_match(p.slice_from(pos.offset)), true))
    }

    fn eval_labeled(
        &self,
        p: &mut ParserState<'_>,
        label: &str,
        expr: ExprId,
        text_capture: bool,
    ) -> EvalResult {
        let start_offset = p.pt.pos.offset;
        p.push_v();
        let res = self.eval_expr_wrap(p, expr);
        p.pop_v();
        let (val, ok) = res?;
        if ok && !label.is_empty() {
            let bound = if text_capture {
                Value::from_match(p.slice_from(start_offset))
            } else {
                val.clone()
            };
            p.bind(label, bound);
        }
        Ok((val, ok))
    }

    fn eval_action(&self, p: &mut ParserState<'_>, expr: ExprId, run: &ActionFn) -> EvalResult {
        let skip_code = p.check_skip_code();
        if !skip_code {
            p.sp_push(p.pt);
        }

        let res = self.eval_expr_wrap(p, expr);
        let (_, ok) = match res {
            Ok(r) => r,
            Err(fatal) => {
                if !skip_code {
                    p.sp_pop();
                }
                return Err(fatal);
            }
        };
        if skip_code {
            return Ok((Value::Null, ok));
        }

        let start = p.sp_pop();
        if !ok {
            return Ok((Value::Null, false));
        }

        p.set_cur(start.pos, (start.pos.offset, p.pt.pos.offset));
        // errors raised by the callback are attributed to the match start
        p.set_err_pos(Some(start.pos));
        let out = run.call(&p.action_ctx());
        match out {
            Ok(value) => {
                p.set_err_pos(None);
                Ok((value, true))
            }
            Err(err) => {
                p.add_err(ParseError::Callback(err.to_string()));
                p.set_err_pos(None);
                Err(Fatal::Aborted)
            }
        }
    }

    fn eval_code(&self, p: &mut ParserState<'_>, run: &ActionFn, not_skip: bool) -> EvalResult {
        if !not_skip && p.check_skip_code() {
            return Ok((Value::Null, true));
        }
        match run.call(&p.predicate_ctx()) {
            Ok(value) => Ok((value, true)),
            Err(err) => {
                p.add_err(ParseError::Callback(err.to_string()));
                Err(Fatal::Aborted)
            }
        }
    }

    fn eval_and_code(&self, p: &mut ParserState<'_>, run: &PredicateFn) -> EvalResult {
        match run.call(&p.predicate_ctx()) {
            Ok(ok) => Ok((Value::Null, ok)),
            Err(err) => {
                p.add_err(ParseError::Callback(err.to_string()));
                Err(Fatal::Aborted)
            }
        }
    }

    fn eval_not_code(&self, p: &mut ParserState<'_>, run: &PredicateFn) -> EvalResult {
        match run.call(&p.predicate_ctx()) {
            Ok(ok) => Ok((Value::Null, !ok)),
            Err(err) => {
                p.add_err(ParseError::Callback(err.to_string()));
                Err(Fatal::Aborted)
            }
        }
    }

    fn eval_rule_ref(&self, p: &mut ParserState<'_>, name: &str) -> EvalResult {
        match self.grammar.rule_by_name(name) {
            Some(index) => self.eval_rule_wrap(p, index),
            None => {
                p.add_err(ParseError::UndefinedRule(name.to_string()));
                Ok((Value::Null, false))
            }
        }
    }

    fn eval_rule_index_ref(&self, p: &mut ParserState<'_>, index: usize) -> EvalResult {
        if self.grammar.rule(index).is_none() {
            p.add_err(ParseError::UndefinedRule(format!("#{}", index)));
            return Ok((Value::Null, false));
        }
        self.eval_rule_wrap(p, index)
    }

    fn eval_recovery(
        &self,
        p: &mut ParserState<'_>,
        expr: ExprId,
        recover_expr: ExprId,
        labels: &[String],
    ) -> EvalResult {
        p.push_recovery(labels, recover_expr);
        let res = self.eval_expr_wrap(p, expr);
        p.pop_recovery();
        res
    }

    fn eval_throw(&self, p: &mut ParserState<'_>, label: &str) -> EvalResult {
        match p.find_recovery(label) {
            Some(recover) => self.eval_expr_wrap(p, recover),
            None => Ok((Value::Null, false)),
        }
    }
}

/// Case folding for the ignore-case matchers: the one-to-one mapping only,
/// multi-character expansions keep the original.
fn to_lower(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during parse".to_string()
    }
}
