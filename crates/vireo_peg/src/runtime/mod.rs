//! VireoPEG runtime
//!
//! This module provides the interpreter and its supporting state:
//! - `state.rs`: cursor, scanner, scoped stacks and failure tracking
//! - `value.rs`: semantic values and the callback context view
//! - `memo.rs`: packrat memoization table
//! - `options.rs`: parse configuration and statistics
//! - `interpreter.rs`: the dispatcher, operator evaluators and driver

pub mod interpreter;
pub mod memo;
pub mod options;
pub mod state;
pub mod value;

pub use interpreter::{parse, Interpreter, ParseOutput};
pub use memo::{MemoNode, MemoStats, MemoTable, ResultTuple};
pub use options::{ParseOptions, Stats};
pub use state::{Position, Savepoint};
pub use value::{CallbackCtx, Value};
