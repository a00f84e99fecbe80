//! Question variables: one respondent's raw answer rows for one survey
//! variable, with entity-filtered lookup.

use std::cell::RefCell;
use std::collections::HashMap;

use survey_expr::EntityId;

use crate::error::{EvalResult, EvaluatorError};
use crate::index::{NestedIndex, SlotValue};

/// Maximum simultaneous entity dimensions: 3 "asked" entities plus 1
/// "answer" entity slot. Raw rows always carry this many slots (absent
/// markers for the unused ones), and an evaluation can request at most this
/// many dimensions.
pub const MAX_ENTITY_SLOTS: usize = 4;

/// One raw answer row: the entity-slot values followed by the answer value.
///
/// Unused slots hold the explicit absent marker (`None`); every row of one
/// variable must populate the same slots as its first row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRow {
    /// Entity-id values per slot, absent markers for unused slots.
    pub slots: [SlotValue; MAX_ENTITY_SLOTS],
    /// The terminal answer value.
    pub value: i64,
}

impl AnswerRow {
    /// Creates a row from explicit slot values and an answer value.
    pub fn new(slots: [SlotValue; MAX_ENTITY_SLOTS], value: i64) -> Self {
        Self { slots, value }
    }

    /// Creates a row with no populated entity slots.
    pub fn unkeyed(value: i64) -> Self {
        Self {
            slots: [None; MAX_ENTITY_SLOTS],
            value,
        }
    }

    /// Creates a row whose leading slots hold the given ids.
    pub fn keyed(ids: &[EntityId], value: i64) -> Self {
        let mut slots = [None; MAX_ENTITY_SLOTS];
        for (slot, &id) in slots.iter_mut().zip(ids) {
            *slot = Some(id);
        }
        Self { slots, value }
    }

    fn occupancy(&self) -> [bool; MAX_ENTITY_SLOTS] {
        let mut occupied = [false; MAX_ENTITY_SLOTS];
        for (flag, slot) in occupied.iter_mut().zip(&self.slots) {
            *flag = slot.is_some();
        }
        occupied
    }
}

/// A single filter argument value: one id or a list of ids. Both normalize
/// to a list before the index lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterIds {
    /// A single acceptable slot value.
    One(SlotValue),
    /// A list of acceptable slot values.
    Many(Vec<SlotValue>),
}

impl FilterIds {
    fn into_list(self) -> Vec<SlotValue> {
        match self {
            FilterIds::One(id) => vec![id],
            FilterIds::Many(ids) => ids,
        }
    }

    fn to_list(&self) -> Vec<SlotValue> {
        self.clone().into_list()
    }
}

impl From<EntityId> for FilterIds {
    fn from(id: EntityId) -> Self {
        FilterIds::One(Some(id))
    }
}

impl From<Vec<EntityId>> for FilterIds {
    fn from(ids: Vec<EntityId>) -> Self {
        FilterIds::Many(ids.into_iter().map(Some).collect())
    }
}

/// One respondent's raw rows for one variable, exposing keyword-filtered
/// value lookup backed by a cache of [`NestedIndex`]es.
///
/// The cache key is the canonical filter signature: the filtered
/// dimensions' slot positions in natural slot order. Two lookups naming the
/// same dimensions in different argument order therefore share one index.
/// Rows are immutable for the variable's lifetime, so the cache is built
/// lazily and never invalidated.
///
/// # Example
///
/// ```rust
/// use survey_expr_executor::{AnswerRow, QuestionVariable};
///
/// let rows = vec![
///     AnswerRow::keyed(&[1], 8),
///     AnswerRow::keyed(&[2], 5),
/// ];
/// let variable = QuestionVariable::new("Recommendation", vec!["Brand".to_string()], rows).unwrap();
///
/// // Unfiltered lookup returns every value in row order.
/// assert_eq!(variable.value_lookup(&[]).unwrap(), vec![8, 5]);
///
/// // Filtered lookup goes through the nested index.
/// assert_eq!(variable.value_lookup(&[("Brand", 2.into())]).unwrap(), vec![5]);
/// ```
#[derive(Debug)]
pub struct QuestionVariable {
    name: String,
    dimensions: Vec<String>,
    occupied_slots: Vec<usize>,
    rows: Vec<AnswerRow>,
    indexes: RefCell<HashMap<Vec<usize>, NestedIndex>>,
}

impl QuestionVariable {
    /// Creates a variable from its dimension names (slot order) and rows.
    ///
    /// The populated slots are derived from the first row and every
    /// subsequent row is validated against them: heterogeneous rows would
    /// silently misattribute entity columns, so they fail fast here instead.
    pub fn new(
        name: impl Into<String>,
        dimensions: Vec<String>,
        rows: Vec<AnswerRow>,
    ) -> EvalResult<Self> {
        let name = name.into();

        let occupied_slots: Vec<usize> = match rows.first() {
            Some(first) => {
                let occupancy = first.occupancy();
                let slots: Vec<usize> = (0..MAX_ENTITY_SLOTS).filter(|&i| occupancy[i]).collect();
                if slots.len() != dimensions.len() {
                    return Err(EvaluatorError::DimensionShapeMismatch {
                        variable: name,
                        declared: dimensions.len(),
                        populated: slots.len(),
                    });
                }
                for (i, row) in rows.iter().enumerate().skip(1) {
                    if row.occupancy() != occupancy {
                        return Err(EvaluatorError::InconsistentRowShape {
                            variable: name,
                            row: i,
                        });
                    }
                }
                slots
            }
            // With no rows every lookup is empty; assume the leading slots.
            None => (0..dimensions.len()).collect(),
        };

        Ok(Self {
            name,
            dimensions,
            occupied_slots,
            rows,
            indexes: RefCell::new(HashMap::new()),
        })
    }

    /// The variable's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The occupied dimension names, in slot order.
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    /// The raw rows, in original order.
    pub fn rows(&self) -> &[AnswerRow] {
        &self.rows
    }

    /// Number of nested indexes built so far (one per distinct filter
    /// signature).
    pub fn cached_index_count(&self) -> usize {
        self.indexes.borrow().len()
    }

    /// Looks up answer values, optionally filtered by entity dimension.
    ///
    /// With no filters, returns every value across all rows in original
    /// order. With filters, every key must be one of the variable's
    /// dimensions; values normalize to lists and the lookup is delegated to
    /// a nested index built once per canonical filter signature.
    pub fn value_lookup(&self, filters: &[(&str, FilterIds)]) -> EvalResult<Vec<i64>> {
        if filters.is_empty() {
            return Ok(self.rows.iter().map(|r| r.value).collect());
        }

        let unknown: Vec<String> = filters
            .iter()
            .filter(|(key, _)| !self.dimensions.iter().any(|d| d == key))
            .map(|(key, _)| key.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(EvaluatorError::UnknownDimension {
                variable: self.name.clone(),
                keys: unknown,
            });
        }

        // Canonical order: the variable's natural slot order, regardless of
        // the call site's argument order.
        let mut selected: Vec<(usize, &FilterIds)> = filters
            .iter()
            .map(|(key, ids)| {
                let dim = self
                    .dimensions
                    .iter()
                    .position(|d| d == key)
                    .ok_or_else(|| EvaluatorError::UnknownDimension {
                        variable: self.name.clone(),
                        keys: vec![key.to_string()],
                    })?;
                Ok((dim, ids))
            })
            .collect::<EvalResult<_>>()?;
        selected.sort_by_key(|(dim, _)| *dim);

        for pair in selected.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(EvaluatorError::DuplicateDimension {
                    variable: self.name.clone(),
                    key: self.dimensions[pair[0].0].clone(),
                });
            }
        }

        let signature: Vec<usize> = selected
            .iter()
            .map(|(dim, _)| self.occupied_slots[*dim])
            .collect();
        let values: Vec<Vec<SlotValue>> = selected.iter().map(|(_, ids)| ids.to_list()).collect();

        let mut indexes = self.indexes.borrow_mut();
        let index = indexes
            .entry(signature.clone())
            .or_insert_with(|| NestedIndex::new(&self.rows, &signature));
        index.lookup(&values)
    }
}
