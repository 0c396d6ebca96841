//! VireoPEG: a backtracking PEG interpreter runtime
//!
//! This crate executes a parsing-expression grammar, represented as an
//! arena of expression nodes, against a UTF-8 input buffer. It implements
//! the full PEG operator set (ordered choice, sequence, greedy repetition,
//! zero-width predicates, literal / character-class / any matchers) plus
//! two extensions: labeled failure with recovery expressions
//! (throw/recover), and semantic actions and predicates as host closures
//! with labeled captures.
//!
//! The grammar front-end is deliberately out of scope: trees are built
//! programmatically through [`GrammarBuilder`], typically by a generated
//! parser or a grammar-file loader.
//!
//! # Example
//!
//! ```
//! use vireo_peg::{GrammarBuilder, Interpreter, ParseOptions, Value};
//!
//! let mut b = GrammarBuilder::new();
//! let ab = b.literal("ab");
//! let cd = b.literal("cd");
//! let seq = b.sequence(&[ab, cd]);
//! b.rule("pair", seq);
//! let grammar = b.build();
//!
//! let out = Interpreter::new(&grammar).parse("input", b"abcd", ParseOptions::default());
//! let value = out.into_result().unwrap();
//! assert_eq!(
//!     value,
//!     Value::List(vec![Value::Text("ab".into()), Value::Text("cd".into())])
//! );
//! ```
//!
//! On failure the runtime synthesizes a `no match found, expected: ...`
//! error at the farthest position any sub-expression reached:
//!
//! ```
//! use vireo_peg::{GrammarBuilder, Interpreter, ParseOptions};
//!
//! let mut b = GrammarBuilder::new();
//! let lit = b.literal("let");
//! b.rule("keyword", lit);
//! let grammar = b.build();
//!
//! let out = Interpreter::new(&grammar).parse("demo.src", b"fn", ParseOptions::default());
//! let err = out.into_result().unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "demo.src:1:1 (0): no match found, expected: \"let\""
//! );
//! ```

pub mod error;
pub mod grammar;
pub mod runtime;

pub use error::{CallbackError, ErrorList, ParseError, PositionedError};
pub use grammar::{
    ActionFn, CharClassMatcher, Expr, ExprId, Grammar, GrammarBuilder, PredicateFn, Rule,
    UnicodeClass,
};
pub use runtime::{
    parse, CallbackCtx, Interpreter, MemoStats, ParseOptions, ParseOutput, Position, Savepoint,
    Stats, Value,
};
