//! Configuration for the respondent evaluator.

/// Configuration for [`crate::RespondentEvaluator`].
///
/// # Example
///
/// ```rust
/// use survey_expr_executor::EvaluatorConfig;
///
/// let config = EvaluatorConfig::builder()
///     .with_max_combinations(10_000)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct EvaluatorConfig {
    /// Maximum entity combinations one evaluation may iterate
    /// (None = unlimited).
    ///
    /// The Cartesian-product loop is the only unbounded-cost path in the
    /// kernel; a caller imposing a deadline bounds it here rather than
    /// interrupting mid-evaluation.
    pub max_combinations: Option<usize>,
}

impl EvaluatorConfig {
    /// Creates a new builder for EvaluatorConfig.
    pub fn builder() -> EvaluatorConfigBuilder {
        EvaluatorConfigBuilder::default()
    }
}

/// Builder for EvaluatorConfig.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorConfigBuilder {
    max_combinations: Option<usize>,
}

impl EvaluatorConfigBuilder {
    /// Sets the combination budget per evaluation.
    pub fn with_max_combinations(mut self, max_combinations: usize) -> Self {
        self.max_combinations = Some(max_combinations);
        self
    }

    /// Builds the EvaluatorConfig.
    pub fn build(self) -> EvaluatorConfig {
        EvaluatorConfig {
            max_combinations: self.max_combinations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unlimited() {
        let config = EvaluatorConfig::default();
        assert!(config.max_combinations.is_none());
    }

    #[test]
    fn test_builder() {
        let config = EvaluatorConfig::builder().with_max_combinations(64).build();
        assert_eq!(config.max_combinations, Some(64));
    }
}
