//! Error types for expression evaluation.

use survey_expr::ExprError;
use thiserror::Error;

/// Errors that can occur while compiling or evaluating an expression.
///
/// Every variant is a local, synchronous, non-retryable defect in authored
/// expressions or configuration data; nothing in this crate retries
/// internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    /// Expression text is not in the grammar.
    #[error(transparent)]
    Parse(#[from] ExprError),

    /// A bare identifier is not bound by an enclosing comprehension.
    #[error("name '{0}' is not defined")]
    UnboundName(String),

    /// The expression looked up a variable the response context does not hold.
    #[error("unknown variable '{0}' in response context")]
    UnknownVariable(String),

    /// The expression read an entity the result context does not expose.
    #[error("unknown entity '{0}' in result context")]
    UnknownEntity(String),

    /// A lookup filter named dimensions the variable does not have.
    #[error("unknown dimensions [{}] for variable '{variable}'", .keys.join(", "))]
    UnknownDimension {
        /// The variable whose lookup was filtered.
        variable: String,
        /// Every offending filter key.
        keys: Vec<String>,
    },

    /// The same dimension appeared more than once in one lookup.
    #[error("duplicate dimension '{key}' in lookup on variable '{variable}'")]
    DuplicateDimension {
        /// The variable whose lookup was filtered.
        variable: String,
        /// The repeated filter key.
        key: String,
    },

    /// A nested index lookup supplied the wrong number of key-value lists.
    #[error("expected {expected} key dimensions, got {got}")]
    WrongDimensionCount {
        /// Key dimensions the index was built over.
        expected: usize,
        /// Key-value lists supplied by the caller.
        got: usize,
    },

    /// A raw answer row does not populate the same slots as the first row.
    #[error("variable '{variable}' row {row} does not match the entity slot shape of its first row")]
    InconsistentRowShape {
        /// The variable whose rows are malformed.
        variable: String,
        /// Index of the first offending row.
        row: usize,
    },

    /// The declared dimension names do not match the rows' populated slots.
    #[error("variable '{variable}' declares {declared} dimensions but its rows populate {populated} slots")]
    DimensionShapeMismatch {
        /// The variable with the mismatched shape.
        variable: String,
        /// Number of declared dimension names.
        declared: usize,
        /// Number of populated entity slots in the first row.
        populated: usize,
    },

    /// More entity dimensions were requested than the architecture supports.
    #[error("{count} entity dimensions requested, maximum is {max}")]
    TooManyDimensions {
        /// Requested dimension count.
        count: usize,
        /// The architectural maximum.
        max: usize,
    },

    /// Requested entity names and instance-id lists do not pair up.
    #[error("{names} entity names but {lists} instance-id lists")]
    DimensionCountMismatch {
        /// Number of requested entity names.
        names: usize,
        /// Number of instance-id lists.
        lists: usize,
    },

    /// The combination count exceeds the configured iteration budget.
    #[error("combination budget exceeded: {combinations} combinations, limit {limit}")]
    CombinationBudgetExceeded {
        /// Combinations the request would evaluate.
        combinations: usize,
        /// The configured limit.
        limit: usize,
    },

    /// `max`/`min` over an empty sequence without a `default`.
    #[error("{function}() of an empty sequence with no default")]
    EmptySequence {
        /// The aggregate that was invoked.
        function: &'static str,
    },

    /// An operation was applied to values of the wrong type.
    #[error("type error: {0}")]
    TypeMismatch(String),

    /// Integer division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Arithmetic overflowed the 64-bit value range.
    #[error("integer overflow in '{0}'")]
    Overflow(&'static str),
}

/// Result type for evaluator operations.
pub type EvalResult<T> = std::result::Result<T, EvaluatorError>;

/// Compilation failure, carrying the offending expression verbatim so
/// authors can correct it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot compile expression '{expression}': {source}")]
pub struct CompileError {
    /// The expression text that failed to compile.
    pub expression: String,
    /// The underlying error.
    pub source: EvaluatorError,
}

/// Evaluation failure attributed to one respondent, so a caller sharding
/// many respondents can triage without halting the others.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("evaluation failed for respondent '{respondent_id}': {source}")]
pub struct RespondentError {
    /// The respondent whose evaluation failed.
    pub respondent_id: String,
    /// The underlying error.
    pub source: EvaluatorError,
}
