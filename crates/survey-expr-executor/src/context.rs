//! The two fixed contexts a compiled expression may touch.
//!
//! Expressions are closed over exactly two receivers: `response` resolves
//! variable lookups against one respondent's data, `result` resolves entity
//! values for the combination currently being evaluated. Modelling them as
//! narrow interfaces (rather than open attribute bags) makes the grammar's
//! attribute-access restriction exact.

use std::collections::HashMap;

use survey_expr::EntityId;

use crate::error::{EvalResult, EvaluatorError};
use crate::variable::QuestionVariable;

/// One respondent's data, exposed to expressions as named
/// [`QuestionVariable`]s.
///
/// Created fresh per respondent-evaluation call with exactly one variable
/// per dependency of the expression being evaluated; never mutated after
/// construction.
#[derive(Debug)]
pub struct ResponseContext {
    variables: HashMap<String, QuestionVariable>,
}

impl ResponseContext {
    /// Creates a context from the dependency variables, keyed by name.
    pub fn new(variables: impl IntoIterator<Item = QuestionVariable>) -> Self {
        Self {
            variables: variables
                .into_iter()
                .map(|v| (v.name().to_string(), v))
                .collect(),
        }
    }

    /// Resolves a variable by name.
    pub fn variable(&self, name: &str) -> EvalResult<&QuestionVariable> {
        self.variables
            .get(name)
            .ok_or_else(|| EvaluatorError::UnknownVariable(name.to_string()))
    }

    /// Returns true if the context holds a variable with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Number of variables in the context.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Returns true if the context holds no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// The entity-value combination an expression is currently being evaluated
/// for: one value per requested dimension, nothing else.
///
/// One instance is built per combination; it is cheap and short-lived, so
/// entries live in a small vector rather than a map.
#[derive(Debug, Default)]
pub struct ResultContext<'a> {
    entities: Vec<(&'a str, EntityId)>,
}

impl<'a> ResultContext<'a> {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
        }
    }

    /// Creates an empty context with room for `capacity` dimensions.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entities: Vec::with_capacity(capacity),
        }
    }

    /// Assigns a dimension's value for this combination.
    pub fn set(&mut self, name: &'a str, id: EntityId) {
        self.entities.push((name, id));
    }

    /// Resolves an entity value by dimension name.
    pub fn entity(&self, name: &str) -> EvalResult<EntityId> {
        self.entities
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, id)| *id)
            .ok_or_else(|| EvaluatorError::UnknownEntity(name.to_string()))
    }

    /// Number of dimensions set on this combination.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no dimensions are set.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::AnswerRow;

    #[test]
    fn test_response_context_resolves_variables_by_name() {
        let age = QuestionVariable::new("Age", vec![], vec![AnswerRow::unkeyed(25)]).unwrap();
        let response = ResponseContext::new([age]);

        assert!(response.contains("Age"));
        assert_eq!(response.len(), 1);
        assert_eq!(response.variable("Age").unwrap().name(), "Age");
        assert_eq!(
            response.variable("Income").unwrap_err(),
            EvaluatorError::UnknownVariable("Income".to_string())
        );
    }

    #[test]
    fn test_result_context_exposes_only_set_dimensions() {
        let mut result = ResultContext::with_capacity(2);
        result.set("Brand", 3);
        result.set("Week", 12);

        assert_eq!(result.entity("Brand").unwrap(), 3);
        assert_eq!(result.entity("Week").unwrap(), 12);
        assert_eq!(result.len(), 2);
        assert_eq!(
            result.entity("Region").unwrap_err(),
            EvaluatorError::UnknownEntity("Region".to_string())
        );
    }
}
