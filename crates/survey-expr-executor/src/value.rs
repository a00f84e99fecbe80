//! Runtime value model for expression evaluation.

use std::fmt;

use crate::error::{EvalResult, EvaluatorError};

/// A runtime value produced while evaluating a calculation expression.
///
/// The model is deliberately small: survey answer values and entity ids are
/// integers end to end, booleans exist for gates and comparisons, lists
/// carry lookup results and comprehension output, and `None` is the
/// "respondent not applicable" marker that suppresses an output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// The empty value; a combination yielding `None` emits no row.
    None,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// List of values.
    List(Vec<Value>),
}

impl Value {
    /// Returns true for `None`.
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Truthiness, matching the grammar's source conventions: `None`,
    /// `False`, `0` and the empty list are falsy, everything else truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Numeric view of this value. Booleans coerce to 0/1; `None` and lists
    /// have no numeric value.
    pub fn as_int(&self) -> EvalResult<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Bool(true) => Ok(1),
            Value::Bool(false) => Ok(0),
            other => Err(EvaluatorError::TypeMismatch(format!(
                "expected a number, got {}",
                other.type_name()
            ))),
        }
    }

    /// Consumes a list value into its items; anything else is not iterable.
    pub fn into_items(self) -> EvalResult<Vec<Value>> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(EvaluatorError::TypeMismatch(format!(
                "expected a list, got {}",
                other.type_name()
            ))),
        }
    }

    /// Equality as expressions see it: numbers compare numerically (so
    /// `True == 1`), `None` only equals `None`, lists compare elementwise.
    pub fn value_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.value_eq(y))
            }
            (a, b) => match (a.as_int(), b.as_int()) {
                (Ok(x), Ok(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Coerces a compiled-expression result into an output-row value.
    ///
    /// `None` means "no row" and maps to `Ok(None)`; numbers and booleans
    /// coerce to the row's integer value; a list result is an authoring
    /// defect (the expression forgot its aggregate).
    pub fn into_output_value(self) -> EvalResult<Option<i64>> {
        match self {
            Value::None => Ok(None),
            Value::Bool(b) => Ok(Some(i64::from(b))),
            Value::Int(n) => Ok(Some(n)),
            Value::List(_) => Err(EvaluatorError::TypeMismatch(
                "a list is not a valid calculation result; aggregate it first".to_string(),
            )),
        }
    }

    /// The value's type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "a boolean",
            Value::Int(_) => "a number",
            Value::List(_) => "a list",
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}
