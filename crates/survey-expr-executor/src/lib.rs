//! # survey-expr-executor
//!
//! Per-respondent evaluation engine for survey calculation expressions.
//!
//! This crate bridges the [`survey-expr`] parser and one respondent's raw
//! answer data to compute metric values for every entity combination a
//! reporting chart needs broken out by (e.g. brand x week): given the
//! respondent's answer rows for the variables an expression depends on and
//! the entity combinations a caller wants answers for, it returns one row
//! per non-empty answer.
//!
//! ## Quick Start
//!
//! ```rust
//! use survey_expr_executor::{
//!     AnswerRow, CompiledExpression, QuestionVariable, RespondentEvaluator, ResponseContext,
//! };
//!
//! // Compile once, reuse across every respondent.
//! let compiled = CompiledExpression::compile(
//!     "max(response.Recommendation(Brand=result.Brand), default=None)",
//! ).unwrap();
//!
//! // One respondent's raw rows: Brand in slot 0, answer value last.
//! let recommendation = QuestionVariable::new(
//!     "Recommendation",
//!     vec!["Brand".to_string()],
//!     vec![AnswerRow::keyed(&[1], 9), AnswerRow::keyed(&[2], 4)],
//! ).unwrap();
//! let response = ResponseContext::new([recommendation]);
//!
//! // One row per requested brand the respondent has an answer for.
//! let evaluator = RespondentEvaluator::new();
//! let evaluation = evaluator
//!     .evaluate("r-1", &compiled, &["Brand"], &[vec![1, 2, 3]], &response)
//!     .unwrap();
//!
//! assert_eq!(evaluation.rows.len(), 2); // brand 3 has no answer, no row
//! ```
//!
//! ## Evaluation model
//!
//! | Component | Role |
//! |-----------|------|
//! | [`CompiledExpression`] | validated AST, pure in its two context arguments |
//! | [`QuestionVariable`] | one variable's rows + filtered lookup via cached [`NestedIndex`]es |
//! | [`ResponseContext`] | the respondent's dependency variables, by name |
//! | [`ResultContext`] | the entity combination currently being evaluated |
//! | [`RespondentEvaluator`] | Cartesian-product driver collecting non-empty results |
//! | [`ExpressionCache`] | LRU reuse of compilations across calls |
//!
//! Everything is synchronous and respondent-scoped: contexts and index
//! caches are built fresh per respondent call and discarded afterwards, so
//! there is no shared mutable state. Compiled expressions are the one
//! shareable artifact (`Send + Sync`, lock-free to invoke); parallelism
//! across respondents belongs to the caller, with the feature-gated
//! `parallel` batch helper as the sanctioned pattern.
//!
//! ## Feature Flags
//!
//! - `parallel` - Shards batch evaluation across respondents using rayon
//! - `serde` - Serde derives on the expression AST and metric config types

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod cache;
mod compiler;
mod config;
mod context;
mod error;
mod evaluator;
mod index;
mod interpreter;
mod result;
mod value;
mod variable;

// Public re-exports
pub use cache::{normalize_expression_key, ExpressionCache};
pub use compiler::CompiledExpression;
pub use config::{EvaluatorConfig, EvaluatorConfigBuilder};
pub use context::{ResponseContext, ResultContext};
pub use error::{CompileError, EvalResult, EvaluatorError, RespondentError};
pub use evaluator::RespondentEvaluator;
pub use index::{NestedIndex, SlotValue};
pub use result::{Evaluation, EvaluationStats, ResultRow};
pub use value::Value;
pub use variable::{AnswerRow, FilterIds, QuestionVariable, MAX_ENTITY_SLOTS};

// Re-export commonly used types from dependencies for convenience
pub use survey_expr::{Expr, ExprError};
pub use survey_expr::EntityId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _: Option<EvaluatorConfig> = None;
        let _: Option<Evaluation> = None;
        let _: Option<EvaluationStats> = None;
        let _: Option<EvalResult<()>> = None;
        let _: Option<RespondentError> = None;
    }

    #[test]
    fn test_re_exports() {
        let _id: EntityId = 42;
        let _ = survey_expr::parse("max(response.Age())");
        assert_eq!(MAX_ENTITY_SLOTS, 4);
    }
}
