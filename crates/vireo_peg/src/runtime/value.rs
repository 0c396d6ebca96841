//! Semantic values and the callback context view
//!
//! Matchers produce [`Value::Text`], sequences and repetitions produce
//! [`Value::List`], and action callbacks may replace those with anything,
//! including an opaque [`Value::Dyn`] handle for embedder AST nodes.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::state::Position;

/// A value produced by expression evaluation.
#[derive(Clone)]
pub enum Value {
    /// No value. Predicates and missed optionals produce this; sequences
    /// drop it from their collected list.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    /// Opaque embedder value, shared by handle.
    Dyn(Rc<dyn Any>),
}

impl Value {
    /// Matched input bytes as a text value. Invalid sequences (tolerated
    /// under `allow_invalid_utf8`) are replaced, not dropped.
    pub(crate) fn from_match(bytes: &[u8]) -> Self {
        Value::Text(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn dyn_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Dyn(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(n) => write!(f, "Int({})", n),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Text(s) => write!(f, "Text({:?})", s),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Dyn(_) => f.write_str("Dyn(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // opaque values compare by handle
            (Value::Dyn(a), Value::Dyn(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Read-only view of the parser state handed to host callbacks.
///
/// Callbacks cannot reach the cursor or the stacks through this view, which
/// makes the no-mutation rule for host code a compile-time property: a
/// callback can only return a value or an error.
pub struct CallbackCtx<'a> {
    pub(crate) pos: Position,
    pub(crate) text: &'a [u8],
    pub(crate) data: Option<&'a Rc<dyn Any>>,
    pub(crate) env: Option<&'a HashMap<String, Value>>,
}

impl<'a> CallbackCtx<'a> {
    /// Start position of the enclosing action's match. For predicate
    /// callbacks this is the current cursor position.
    pub fn pos(&self) -> Position {
        self.pos
    }

    /// Raw bytes of the enclosing action's match. Empty for predicates.
    pub fn text(&self) -> &'a [u8] {
        self.text
    }

    /// Matched text with invalid sequences replaced.
    pub fn text_str(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.text)
    }

    /// Look up a labeled capture in the current rule's scope.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.env.and_then(|m| m.get(label))
    }

    /// Downcast the embedder's custom data, when one was supplied.
    pub fn data<T: 'static>(&self) -> Option<&T> {
        self.data.and_then(|d| d.downcast_ref::<T>())
    }
}
