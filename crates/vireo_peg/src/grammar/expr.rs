//! Expression tree for the VireoPEG interpreter
//!
//! A grammar is an arena of [`Expr`] nodes addressed by [`ExprId`] plus a
//! rule table addressable both by name and by ordinal position. The arena
//! encoding keeps the (cyclic) rule graph free of reference cycles: rules
//! point at other rules symbolically (`RuleRef`) or positionally
//! (`RuleIndexRef`), never by owning pointer.
//!
//! The node set is closed on purpose: the dispatcher in
//! `runtime::interpreter` matches on every variant and the compiler checks
//! exhaustiveness when an operator is added.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::CallbackError;
use crate::runtime::state::Position;
use crate::runtime::value::{CallbackCtx, Value};

/// Index of an expression node inside a [`Grammar`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub(crate) u32);

impl ExprId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A host callback producing a semantic value.
///
/// Wrapped in a newtype so that [`Expr`] stays `Debug` and `Clone` even
/// though the closure itself is neither.
#[derive(Clone)]
pub struct ActionFn(Rc<dyn Fn(&CallbackCtx) -> Result<Value, CallbackError>>);

impl ActionFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&CallbackCtx) -> Result<Value, CallbackError> + 'static,
    {
        ActionFn(Rc::new(f))
    }

    pub fn call(&self, cx: &CallbackCtx) -> Result<Value, CallbackError> {
        (self.0)(cx)
    }
}

impl fmt::Debug for ActionFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActionFn(..)")
    }
}

/// A host callback answering a yes/no question, used by the semantic
/// predicate operators.
#[derive(Clone)]
pub struct PredicateFn(Rc<dyn Fn(&CallbackCtx) -> Result<bool, CallbackError>>);

impl PredicateFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&CallbackCtx) -> Result<bool, CallbackError> + 'static,
    {
        PredicateFn(Rc::new(f))
    }

    pub fn call(&self, cx: &CallbackCtx) -> Result<bool, CallbackError> {
        (self.0)(cx)
    }
}

impl fmt::Debug for PredicateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PredicateFn(..)")
    }
}

/// A named Unicode membership predicate used by character classes.
///
/// The grammar front-end resolves class names (`\p{L}` and friends) before
/// the tree reaches the interpreter, so at runtime a class is just a name
/// for error display plus a membership function. [`UnicodeClass::named`]
/// covers the common general categories; anything else can be supplied by
/// the embedder through [`UnicodeClass::new`].
#[derive(Clone)]
pub struct UnicodeClass {
    name: String,
    contains: Rc<dyn Fn(char) -> bool>,
}

impl UnicodeClass {
    pub fn new<F>(name: impl Into<String>, contains: F) -> Self
    where
        F: Fn(char) -> bool + 'static,
    {
        UnicodeClass {
            name: name.into(),
            contains: Rc::new(contains),
        }
    }

    /// Resolve a general-category (or property) name to a built-in class.
    pub fn named(name: &str) -> Option<Self> {
        let contains: fn(char) -> bool = match name {
            "L" => |c| c.is_alphabetic(),
            "Lu" => |c| c.is_uppercase(),
            "Ll" => |c| c.is_lowercase(),
            "N" => |c| c.is_numeric(),
            "Nd" => |c| c.to_digit(10).is_some(),
            "White_Space" => |c| c.is_whitespace(),
            "ASCII" => |c| c.is_ascii(),
            _ => return None,
        };
        Some(UnicodeClass {
            name: name.to_string(),
            contains: Rc::new(contains),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, c: char) -> bool {
        (self.contains)(c)
    }
}

impl fmt::Debug for UnicodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnicodeClass({})", self.name)
    }
}

/// Single-code-point matcher data shared by the `CharClass` variant.
///
/// `val` is the display form used in "expected ..." messages; when the
/// front-end leaves it empty the builder derives the conventional `[...]`
/// rendering.
#[derive(Debug, Clone, Default)]
pub struct CharClassMatcher {
    pub val: String,
    pub chars: Vec<char>,
    pub ranges: Vec<(char, char)>,
    pub classes: Vec<UnicodeClass>,
    pub ignore_case: bool,
    pub inverted: bool,
}

impl CharClassMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chars(mut self, chars: &[char]) -> Self {
        self.chars = chars.to_vec();
        self
    }

    pub fn with_ranges(mut self, ranges: &[(char, char)]) -> Self {
        self.ranges = ranges.to_vec();
        self
    }

    pub fn with_classes(mut self, classes: Vec<UnicodeClass>) -> Self {
        self.classes = classes;
        self
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    pub fn with_display(mut self, val: impl Into<String>) -> Self {
        self.val = val.into();
        self
    }

    /// Conventional `[...]` rendering of the matcher for error messages.
    pub(crate) fn derived_display(&self) -> String {
        let mut out = String::from("[");
        if self.inverted {
            out.push('^');
        }
        for &c in &self.chars {
            out.push(c);
        }
        for &(lo, hi) in &self.ranges {
            out.push(lo);
            out.push('-');
            out.push(hi);
        }
        for class in &self.classes {
            out.push_str("\\p{");
            out.push_str(class.name());
            out.push('}');
        }
        out.push(']');
        if self.ignore_case {
            out.push('i');
        }
        out
    }
}

/// A parsing expression node.
///
/// Children are arena ids; the node carries everything the evaluator for
/// its operator needs and nothing else.
#[derive(Debug, Clone)]
pub enum Expr {
    /// All sub-expressions must match in order.
    Sequence { exprs: Vec<ExprId> },
    /// First matching alternative wins. `pos` is the position of the choice
    /// in the grammar source, used as part of the statistics key.
    Choice {
        alternatives: Vec<ExprId>,
        pos: Position,
    },
    ZeroOrOne { expr: ExprId },
    ZeroOrMore { expr: ExprId },
    OneOrMore { expr: ExprId },
    /// `&e` zero-width positive lookahead.
    And { expr: ExprId },
    /// `!e` zero-width negative lookahead.
    Not { expr: ExprId },
    /// As `And`, but additionally requires the child to have consumed at
    /// least one byte before the cursor is restored.
    AndLogical { expr: ExprId },
    /// As `Not` on the failure-tracking side, with the same
    /// consumed-at-least-one-byte conjunct as `AndLogical`.
    NotLogical { expr: ExprId },
    /// Exact code-point sequence. `want` is the display form recorded in
    /// the failure tracker.
    Literal {
        val: String,
        ignore_case: bool,
        want: String,
    },
    CharClass(CharClassMatcher),
    /// Any single code point; fails only at end of input.
    AnyMatcher,
    /// Bind the child's value (or its raw text when `text_capture`) to
    /// `label` in the enclosing label scope.
    Labeled {
        label: String,
        expr: ExprId,
        text_capture: bool,
    },
    /// Run a host callback over the child's match; the callback's return
    /// value replaces the child's.
    Action { expr: ExprId, run: ActionFn },
    /// Zero-width host callback producing a value. Suppressed under
    /// skip-code mode unless `not_skip` is set.
    CodePredicate { run: ActionFn, not_skip: bool },
    /// `&{..}` zero-width semantic predicate.
    AndCode { run: PredicateFn },
    /// `!{..}` zero-width semantic predicate.
    NotCode { run: PredicateFn },
    /// Symbolic reference to a rule.
    RuleRef { name: String },
    /// Positional reference to a rule, pre-resolved by the generator.
    RuleIndexRef { index: usize },
    /// Install `labels -> recover_expr` frames for the duration of `expr`.
    Recovery {
        expr: ExprId,
        recover_expr: ExprId,
        labels: Vec<String>,
    },
    /// Transfer control to the innermost recovery expression bound to
    /// `label`.
    Throw { label: String },
}

impl Expr {
    /// Short operator name used by the debug trace.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Sequence { .. } => "sequence",
            Expr::Choice { .. } => "choice",
            Expr::ZeroOrOne { .. } => "zero_or_one",
            Expr::ZeroOrMore { .. } => "zero_or_more",
            Expr::OneOrMore { .. } => "one_or_more",
            Expr::And { .. } => "and",
            Expr::Not { .. } => "not",
            Expr::AndLogical { .. } => "and_logical",
            Expr::NotLogical { .. } => "not_logical",
            Expr::Literal { .. } => "literal",
            Expr::CharClass(_) => "char_class",
            Expr::AnyMatcher => "any",
            Expr::Labeled { .. } => "labeled",
            Expr::Action { .. } => "action",
            Expr::CodePredicate { .. } => "code",
            Expr::AndCode { .. } => "and_code",
            Expr::NotCode { .. } => "not_code",
            Expr::RuleRef { .. } => "rule_ref",
            Expr::RuleIndexRef { .. } => "rule_iref",
            Expr::Recovery { .. } => "recovery",
            Expr::Throw { .. } => "throw",
        }
    }
}

/// A named production.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    /// Overrides `name` in error messages when set.
    pub display_name: Option<String>,
    pub expr: ExprId,
}

impl Rule {
    /// Name to show in error messages.
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// A complete grammar: the expression arena, the rule table and the by-name
/// index. Immutable once built; a single grammar may back any number of
/// concurrent [`crate::runtime::Interpreter`] parses.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) exprs: Vec<Expr>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) by_name: HashMap<String, usize>,
}

impl Grammar {
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn rule_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
}
