//! The combinatorial per-respondent evaluation driver.

use std::time::Instant;

use survey_expr::EntityId;

use crate::compiler::CompiledExpression;
use crate::config::EvaluatorConfig;
use crate::context::{ResponseContext, ResultContext};
use crate::error::{EvalResult, EvaluatorError, RespondentError};
use crate::index::SlotValue;
use crate::result::{Evaluation, EvaluationStats, ResultRow};
use crate::variable::MAX_ENTITY_SLOTS;

/// Evaluates a compiled expression for one respondent across every
/// requested entity combination.
///
/// The caller names up to [`MAX_ENTITY_SLOTS`] entity dimensions and
/// supplies one instance-id list per name. The id lists are right-padded
/// with single-element absent placeholders up to the full slot count, so
/// the Cartesian product always iterates the complete slot space; padded
/// slots are iterated but never exposed on the result context and never
/// emitted.
///
/// A combination whose compiled result is empty contributes no row: that is
/// how "respondent not applicable to this entity combination" is expressed,
/// not an error.
///
/// # Example
///
/// ```rust
/// use survey_expr_executor::{
///     AnswerRow, CompiledExpression, QuestionVariable, RespondentEvaluator, ResponseContext,
/// };
///
/// let compiled = CompiledExpression::compile("max(response.Age())").unwrap();
/// let age = QuestionVariable::new("Age", vec![], vec![AnswerRow::unkeyed(25)]).unwrap();
/// let response = ResponseContext::new([age]);
///
/// let evaluator = RespondentEvaluator::new();
/// let evaluation = evaluator
///     .evaluate("r-1", &compiled, &[], &[], &response)
///     .unwrap();
///
/// assert_eq!(evaluation.rows.len(), 1);
/// assert_eq!(evaluation.rows[0].value, 25);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RespondentEvaluator {
    config: EvaluatorConfig,
}

impl RespondentEvaluator {
    /// Creates an evaluator with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an evaluator with custom configuration.
    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Returns a reference to the evaluator configuration.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluates one respondent.
    ///
    /// # Arguments
    ///
    /// * `respondent_id` - Opaque id, used only for error attribution
    /// * `expression` - The compiled expression to evaluate per combination
    /// * `entity_names` - Requested entity dimensions, at most 4, in output order
    /// * `entity_instance_ids` - One instance-id list per requested dimension
    /// * `response` - The respondent's dependency variables
    ///
    /// # Returns
    ///
    /// One row per combination with a non-empty result, in combination
    /// order, plus execution statistics. Errors carry the respondent id so
    /// the caller can isolate failures without halting other respondents.
    pub fn evaluate(
        &self,
        respondent_id: &str,
        expression: &CompiledExpression,
        entity_names: &[&str],
        entity_instance_ids: &[Vec<EntityId>],
        response: &ResponseContext,
    ) -> Result<Evaluation, RespondentError> {
        self.evaluate_inner(expression, entity_names, entity_instance_ids, response)
            .map_err(|source| RespondentError {
                respondent_id: respondent_id.to_string(),
                source,
            })
    }

    /// Evaluates many respondents with one shared compiled expression.
    ///
    /// With the `parallel` feature enabled the respondents are sharded
    /// across the rayon thread pool; each respondent's own evaluation is
    /// always sequential and deterministic. Results come back in input
    /// order, one per respondent, failures isolated per respondent.
    #[cfg(feature = "parallel")]
    pub fn evaluate_batch(
        &self,
        expression: &CompiledExpression,
        entity_names: &[&str],
        entity_instance_ids: &[Vec<EntityId>],
        respondents: Vec<(String, ResponseContext)>,
    ) -> Vec<Result<Evaluation, RespondentError>> {
        use rayon::prelude::*;

        respondents
            .into_par_iter()
            .map(|(respondent_id, response)| {
                self.evaluate(
                    &respondent_id,
                    expression,
                    entity_names,
                    entity_instance_ids,
                    &response,
                )
            })
            .collect()
    }

    /// Evaluates many respondents with one shared compiled expression,
    /// sequentially.
    #[cfg(not(feature = "parallel"))]
    pub fn evaluate_batch(
        &self,
        expression: &CompiledExpression,
        entity_names: &[&str],
        entity_instance_ids: &[Vec<EntityId>],
        respondents: Vec<(String, ResponseContext)>,
    ) -> Vec<Result<Evaluation, RespondentError>> {
        respondents
            .into_iter()
            .map(|(respondent_id, response)| {
                self.evaluate(
                    &respondent_id,
                    expression,
                    entity_names,
                    entity_instance_ids,
                    &response,
                )
            })
            .collect()
    }

    fn evaluate_inner(
        &self,
        expression: &CompiledExpression,
        entity_names: &[&str],
        entity_instance_ids: &[Vec<EntityId>],
        response: &ResponseContext,
    ) -> EvalResult<Evaluation> {
        let start = Instant::now();

        if entity_names.len() > MAX_ENTITY_SLOTS {
            return Err(EvaluatorError::TooManyDimensions {
                count: entity_names.len(),
                max: MAX_ENTITY_SLOTS,
            });
        }
        if entity_instance_ids.len() != entity_names.len() {
            return Err(EvaluatorError::DimensionCountMismatch {
                names: entity_names.len(),
                lists: entity_instance_ids.len(),
            });
        }

        // Right-pad to the full slot space with single-element absent
        // placeholders, so slot alignment matches the raw-row convention.
        let mut slots: Vec<Vec<SlotValue>> = entity_instance_ids
            .iter()
            .map(|ids| ids.iter().map(|&id| Some(id)).collect())
            .collect();
        while slots.len() < MAX_ENTITY_SLOTS {
            slots.push(vec![None]);
        }

        let total: usize = slots.iter().map(|values| values.len()).product();
        if let Some(limit) = self.config.max_combinations {
            if total > limit {
                return Err(EvaluatorError::CombinationBudgetExceeded {
                    combinations: total,
                    limit,
                });
            }
        }

        let mut rows = Vec::new();
        let mut combinations = 0usize;

        if total > 0 {
            let mut cursor = [0usize; MAX_ENTITY_SLOTS];
            'product: loop {
                combinations += 1;

                let mut result = ResultContext::with_capacity(entity_names.len());
                let mut combo_ids = Vec::with_capacity(entity_names.len());
                for (i, &name) in entity_names.iter().enumerate() {
                    if let Some(id) = slots[i][cursor[i]] {
                        result.set(name, id);
                        combo_ids.push(id);
                    }
                }

                let value = expression.evaluate(response, &result)?;
                if let Some(value) = value.into_output_value()? {
                    rows.push(ResultRow::new(combo_ids, value));
                }

                // Advance the odometer, rightmost slot fastest.
                let mut level = MAX_ENTITY_SLOTS;
                loop {
                    if level == 0 {
                        break 'product;
                    }
                    level -= 1;
                    cursor[level] += 1;
                    if cursor[level] < slots[level].len() {
                        break;
                    }
                    cursor[level] = 0;
                }
            }
        }

        let stats = EvaluationStats::new(combinations, rows.len(), start.elapsed());
        Ok(Evaluation::new(rows, stats))
    }
}
