//! Grammar representation for VireoPEG
//!
//! This module provides:
//! - `expr.rs`: the expression-node arena, rule table and callback handles
//! - `builder.rs`: the construction API used by front-ends and tests

pub mod builder;
pub mod expr;

pub use builder::GrammarBuilder;
pub use expr::{
    ActionFn, CharClassMatcher, Expr, ExprId, Grammar, PredicateFn, Rule, UnicodeClass,
};
