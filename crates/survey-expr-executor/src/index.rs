//! Multi-level indexed lookup over one variable's raw answer rows.

use std::collections::HashMap;

use survey_expr::EntityId;

use crate::error::{EvalResult, EvaluatorError};
use crate::variable::AnswerRow;

/// One entity slot's value: `Some(id)` for a populated slot, `None` for the
/// explicit absent marker. Absent markers are ordinary, exactly-matchable
/// keys, never wildcards.
pub type SlotValue = Option<EntityId>;

#[derive(Debug, Clone)]
enum IndexNode {
    Branch(HashMap<SlotValue, IndexNode>),
    Leaf(Vec<i64>),
}

/// An immutable tree index over a fixed row set, one level per key
/// dimension, supporting set-valued (IN-style) lookups.
///
/// Construction groups rows level by level; the terminal level holds the
/// matching rows' values in original row order. Lookup treats each level's
/// acceptable-value list as an OR across branches and composes levels by
/// AND: a row's value is returned only if every one of its key-slot values
/// lies in the corresponding acceptable set.
///
/// The same filter shape is invoked once per entity combination and a
/// respondent can have hundreds of rows, which is why lookups go through
/// this index instead of scanning rows per combination: construction is
/// O(rows), each lookup O(matching branches).
///
/// # Example
///
/// ```rust
/// use survey_expr_executor::{AnswerRow, NestedIndex};
///
/// let rows = vec![
///     AnswerRow::new([Some(1), Some(10), None, None], 5),
///     AnswerRow::new([Some(1), Some(20), None, None], 3),
///     AnswerRow::new([Some(2), Some(10), None, None], 4),
/// ];
/// let index = NestedIndex::new(&rows, &[0, 1]);
///
/// assert_eq!(index.lookup(&[vec![Some(1)], vec![Some(10), Some(20)]]).unwrap(), vec![5, 3]);
/// assert_eq!(index.lookup(&[vec![Some(1), Some(2)], vec![Some(10)]]).unwrap(), vec![5, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct NestedIndex {
    root: HashMap<SlotValue, IndexNode>,
    depth: usize,
}

impl NestedIndex {
    /// Builds an index over `rows`, keyed by the given slot positions in
    /// order. One tree level is created per entry of `key_slots`.
    pub fn new(rows: &[AnswerRow], key_slots: &[usize]) -> Self {
        let depth = key_slots.len();
        let root = if depth == 0 {
            HashMap::new()
        } else {
            build_level(rows.iter().collect(), key_slots)
        };
        Self { root, depth }
    }

    /// Number of key dimensions this index was built over.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of distinct first-level keys.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Returns true if the index holds no rows.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Looks up the values of every row whose key slots match, one
    /// acceptable-value list per key level in construction order.
    ///
    /// Results concatenate in the order of the caller's value lists, branch
    /// by branch, and within a branch in original row order. Keys absent
    /// from the index contribute nothing; only a level-count mismatch is an
    /// error.
    pub fn lookup(&self, values: &[Vec<SlotValue>]) -> EvalResult<Vec<i64>> {
        if values.len() != self.depth {
            return Err(EvaluatorError::WrongDimensionCount {
                expected: self.depth,
                got: values.len(),
            });
        }
        let mut out = Vec::new();
        if self.depth > 0 {
            collect_matches(&self.root, values, &mut out);
        }
        Ok(out)
    }

    /// Like [`lookup`](Self::lookup), but swallows both the
    /// dimension-count error and the no-results case into `default`.
    /// "No match" is an expected, common outcome of filtered lookups, not
    /// an exception condition.
    pub fn get(&self, values: &[Vec<SlotValue>], default: Vec<i64>) -> Vec<i64> {
        match self.lookup(values) {
            Ok(found) if !found.is_empty() => found,
            _ => default,
        }
    }
}

fn build_level(rows: Vec<&AnswerRow>, key_slots: &[usize]) -> HashMap<SlotValue, IndexNode> {
    let slot = key_slots[0];
    let remaining = &key_slots[1..];

    let mut groups: HashMap<SlotValue, Vec<&AnswerRow>> = HashMap::new();
    for row in rows {
        groups.entry(row.slots[slot]).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let node = if remaining.is_empty() {
                IndexNode::Leaf(members.into_iter().map(|r| r.value).collect())
            } else {
                IndexNode::Branch(build_level(members, remaining))
            };
            (key, node)
        })
        .collect()
}

fn collect_matches(
    level: &HashMap<SlotValue, IndexNode>,
    values: &[Vec<SlotValue>],
    out: &mut Vec<i64>,
) {
    let acceptable = &values[0];
    let rest = &values[1..];
    for key in acceptable {
        if let Some(node) = level.get(key) {
            match node {
                IndexNode::Leaf(found) => out.extend_from_slice(found),
                IndexNode::Branch(children) => collect_matches(children, rest, out),
            }
        }
    }
}
