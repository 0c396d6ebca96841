//! Programmatic grammar construction
//!
//! The grammar front-end (and the test suite) assembles expression trees
//! through [`GrammarBuilder`]: one constructor per operator kind, each
//! returning the arena id of the new node. Rules are registered last, and
//! [`GrammarBuilder::build`] freezes the arena into a [`Grammar`].

use std::collections::HashMap;

use crate::error::CallbackError;
use crate::runtime::state::Position;
use crate::runtime::value::{CallbackCtx, Value};

use super::expr::{
    ActionFn, CharClassMatcher, Expr, ExprId, Grammar, PredicateFn, Rule,
};

#[derive(Debug, Default)]
pub struct GrammarBuilder {
    exprs: Vec<Expr>,
    rules: Vec<Rule>,
    by_name: HashMap<String, usize>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    /// Exact match of `val`, with the conventional quoted display form.
    pub fn literal(&mut self, val: &str) -> ExprId {
        self.push(Expr::Literal {
            val: val.to_string(),
            ignore_case: false,
            want: format!("\"{}\"", val),
        })
    }

    /// Case-folded match of `val`. The stored pattern is lowercased up
    /// front so the evaluator only folds the input side.
    pub fn literal_ignore_case(&mut self, val: &str) -> ExprId {
        self.push(Expr::Literal {
            val: val.to_lowercase(),
            ignore_case: true,
            want: format!("\"{}\"i", val),
        })
    }

    /// Literal with an explicit display form, for front-ends that carry
    /// the source spelling through.
    pub fn literal_with_want(&mut self, val: &str, ignore_case: bool, want: &str) -> ExprId {
        self.push(Expr::Literal {
            val: val.to_string(),
            ignore_case,
            want: want.to_string(),
        })
    }

    pub fn char_class(&mut self, mut matcher: CharClassMatcher) -> ExprId {
        if matcher.val.is_empty() {
            matcher.val = matcher.derived_display();
        }
        self.push(Expr::CharClass(matcher))
    }

    pub fn any(&mut self) -> ExprId {
        self.push(Expr::AnyMatcher)
    }

    pub fn sequence(&mut self, exprs: &[ExprId]) -> ExprId {
        self.push(Expr::Sequence {
            exprs: exprs.to_vec(),
        })
    }

    pub fn choice(&mut self, alternatives: &[ExprId]) -> ExprId {
        self.choice_at(Position::default(), alternatives)
    }

    /// Choice carrying its grammar-source position, which feeds the
    /// per-alternative statistics key.
    pub fn choice_at(&mut self, pos: Position, alternatives: &[ExprId]) -> ExprId {
        self.push(Expr::Choice {
            alternatives: alternatives.to_vec(),
            pos,
        })
    }

    pub fn zero_or_one(&mut self, expr: ExprId) -> ExprId {
        self.push(Expr::ZeroOrOne { expr })
    }

    pub fn zero_or_more(&mut self, expr: ExprId) -> ExprId {
        self.push(Expr::ZeroOrMore { expr })
    }

    pub fn one_or_more(&mut self, expr: ExprId) -> ExprId {
        self.push(Expr::OneOrMore { expr })
    }

    pub fn and_predicate(&mut self, expr: ExprId) -> ExprId {
        self.push(Expr::And { expr })
    }

    pub fn not_predicate(&mut self, expr: ExprId) -> ExprId {
        self.push(Expr::Not { expr })
    }

    pub fn and_logical(&mut self, expr: ExprId) -> ExprId {
        self.push(Expr::AndLogical { expr })
    }

    pub fn not_logical(&mut self, expr: ExprId) -> ExprId {
        self.push(Expr::NotLogical { expr })
    }

    pub fn labeled(&mut self, label: &str, expr: ExprId) -> ExprId {
        self.push(Expr::Labeled {
            label: label.to_string(),
            expr,
            text_capture: false,
        })
    }

    /// Label binding the raw text span of the match rather than its value.
    pub fn labeled_text(&mut self, label: &str, expr: ExprId) -> ExprId {
        self.push(Expr::Labeled {
            label: label.to_string(),
            expr,
            text_capture: true,
        })
    }

    pub fn action<F>(&mut self, expr: ExprId, run: F) -> ExprId
    where
        F: Fn(&CallbackCtx) -> Result<Value, CallbackError> + 'static,
    {
        self.push(Expr::Action {
            expr,
            run: ActionFn::new(run),
        })
    }

    pub fn code<F>(&mut self, not_skip: bool, run: F) -> ExprId
    where
        F: Fn(&CallbackCtx) -> Result<Value, CallbackError> + 'static,
    {
        self.push(Expr::CodePredicate {
            run: ActionFn::new(run),
            not_skip,
        })
    }

    pub fn and_code<F>(&mut self, run: F) -> ExprId
    where
        F: Fn(&CallbackCtx) -> Result<bool, CallbackError> + 'static,
    {
        self.push(Expr::AndCode {
            run: PredicateFn::new(run),
        })
    }

    pub fn not_code<F>(&mut self, run: F) -> ExprId
    where
        F: Fn(&CallbackCtx) -> Result<bool, CallbackError> + 'static,
    {
        self.push(Expr::NotCode {
            run: PredicateFn::new(run),
        })
    }

    pub fn rule_ref(&mut self, name: &str) -> ExprId {
        self.push(Expr::RuleRef {
            name: name.to_string(),
        })
    }

    pub fn rule_index_ref(&mut self, index: usize) -> ExprId {
        self.push(Expr::RuleIndexRef { index })
    }

    pub fn recovery(&mut self, expr: ExprId, recover_expr: ExprId, labels: &[&str]) -> ExprId {
        self.push(Expr::Recovery {
            expr,
            recover_expr,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        })
    }

    pub fn throw(&mut self, label: &str) -> ExprId {
        self.push(Expr::Throw {
            label: label.to_string(),
        })
    }

    /// Register a rule. The first registered rule is the default
    /// entrypoint. Re-registering a name replaces the index entry, matching
    /// last-wins map semantics in the front-end.
    pub fn rule(&mut self, name: &str, expr: ExprId) -> usize {
        self.rule_with_display(name, None, expr)
    }

    pub fn rule_with_display(
        &mut self,
        name: &str,
        display_name: Option<&str>,
        expr: ExprId,
    ) -> usize {
        let index = self.rules.len();
        self.rules.push(Rule {
            name: name.to_string(),
            display_name: display_name.map(|d| d.to_string()),
            expr,
        });
        self.by_name.insert(name.to_string(), index);
        index
    }

    pub fn build(self) -> Grammar {
        Grammar {
            exprs: self.exprs,
            rules: self.rules,
            by_name: self.by_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_registration_and_lookup() {
        let mut b = GrammarBuilder::new();
        let lit = b.literal("x");
        b.rule("first", lit);
        let lit2 = b.literal("y");
        b.rule_with_display("second", Some("the second rule"), lit2);

        let g = b.build();
        assert_eq!(g.rules().len(), 2);
        assert_eq!(g.rule_by_name("second"), Some(1));
        assert_eq!(g.rule(1).unwrap().display(), "the second rule");
        assert_eq!(g.rule(0).unwrap().display(), "first");
        assert!(g.rule_by_name("third").is_none());
    }

    #[test]
    fn test_literal_want_derivation() {
        let mut b = GrammarBuilder::new();
        let id = b.literal("ab");
        let ci = b.literal_ignore_case("AB");
        b.rule("r", id);
        let g = b.build();

        match g.expr(id) {
            Expr::Literal { want, .. } => assert_eq!(want, "\"ab\""),
            other => panic!("expected literal, got {:?}", other),
        }
        match g.expr(ci) {
            Expr::Literal {
                val,
                ignore_case,
                want,
            } => {
                assert_eq!(val, "ab");
                assert!(*ignore_case);
                assert_eq!(want, "\"AB\"i");
            }
            other => panic!("expected literal, got {:?}", other),
        }
    }

    #[test]
    fn test_char_class_display_fallback() {
        let mut b = GrammarBuilder::new();
        let id = b.char_class(CharClassMatcher::new().with_ranges(&[('a', 'z')]));
        b.rule("r", id);
        let g = b.build();
        match g.expr(id) {
            Expr::CharClass(m) => assert_eq!(m.val, "[a-z]"),
            other => panic!("expected char class, got {:?}", other),
        }
    }
}
