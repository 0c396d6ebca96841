//! Packrat memoization
//!
//! Caches `(input offset, node) -> outcome` so that, when enabled, each
//! rule or expression node is evaluated at most once per position. Keys use
//! node identity (arena id), never structural equality.

use std::collections::HashMap;

use crate::grammar::expr::ExprId;

use super::state::Savepoint;
use super::value::Value;

/// Identity of a cached node: a rule ordinal or an expression id. The two
/// keyspaces are disjoint because rule evaluation wraps extra bookkeeping
/// around its body expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoNode {
    Rule(usize),
    Expr(ExprId),
}

/// Cached outcome of evaluating a node at some offset.
#[derive(Debug, Clone)]
pub struct ResultTuple {
    pub value: Value,
    pub matched: bool,
    /// Cursor state after the evaluation; restored on a cache hit.
    pub end: Savepoint,
}

#[derive(Debug, Default)]
pub struct MemoTable {
    entries: HashMap<(usize, MemoNode), ResultTuple>,
}

impl MemoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, offset: usize, node: MemoNode) -> Option<&ResultTuple> {
        self.entries.get(&(offset, node))
    }

    pub fn insert(&mut self, offset: usize, node: MemoNode, tuple: ResultTuple) {
        self.entries.insert((offset, node), tuple);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Usage counters, split by outcome.
    pub fn stats(&self) -> MemoStats {
        let matches = self.entries.values().filter(|t| t.matched).count();
        MemoStats {
            total_entries: self.entries.len(),
            matches,
            failures: self.entries.len() - matches,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoStats {
    pub total_entries: usize,
    pub matches: usize,
    pub failures: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::state::Position;

    fn end_at(offset: usize) -> Savepoint {
        Savepoint {
            pos: Position::new(1, offset + 1, offset),
            rn: '\u{FFFD}',
            w: 0,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = MemoTable::new();
        let node = MemoNode::Expr(ExprId(3));

        assert!(table.get(0, node).is_none());

        table.insert(
            0,
            node,
            ResultTuple {
                value: Value::Text("ab".into()),
                matched: true,
                end: end_at(2),
            },
        );

        let hit = table.get(0, node).unwrap();
        assert!(hit.matched);
        assert_eq!(hit.end.pos.offset, 2);
        // same node at a different offset is a distinct entry
        assert!(table.get(1, node).is_none());
    }

    #[test]
    fn test_rule_and_expr_keyspaces_are_disjoint() {
        let mut table = MemoTable::new();
        table.insert(
            0,
            MemoNode::Rule(0),
            ResultTuple {
                value: Value::Null,
                matched: false,
                end: end_at(0),
            },
        );
        assert!(table.get(0, MemoNode::Expr(ExprId(0))).is_none());
        assert!(table.get(0, MemoNode::Rule(0)).is_some());
    }

    #[test]
    fn test_stats() {
        let mut table = MemoTable::new();
        table.insert(
            0,
            MemoNode::Expr(ExprId(0)),
            ResultTuple {
                value: Value::Null,
                matched: true,
                end: end_at(1),
            },
        );
        table.insert(
            1,
            MemoNode::Expr(ExprId(0)),
            ResultTuple {
                value: Value::Null,
                matched: false,
                end: end_at(1),
            },
        );
        let stats = table.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.matches, 1);
        assert_eq!(stats.failures, 1);
    }
}
