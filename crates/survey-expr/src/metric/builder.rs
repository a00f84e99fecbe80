//! Metric expression builder.
//!
//! Turns a metric configuration into expression text for the shared
//! grammar. The builder works on the AST and renders it at the end, so a
//! malformed output is structurally impossible; the final re-parse exists
//! to keep that a checked contract rather than an assumption.

use std::fmt;

use crate::ast::{AggregateFn, CallArg, CompareOp, Expr};
use crate::error::ExprError;
use crate::parser::parse;

use super::filter::TrueValueFilter;

/// The standard calculation shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CalculationType {
    /// Numeric maximum of the (filtered) values; empty when none.
    Average,
    /// True if any (filtered) value is present.
    YesNo,
    /// Net promoter bucketing: -1 for 0-6, 0 for 7-8, +1 for 9-10, then max.
    NetPromoterScore,
}

impl fmt::Display for CalculationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculationType::Average => write!(f, "average"),
            CalculationType::YesNo => write!(f, "yes/no"),
            CalculationType::NetPromoterScore => write!(f, "nps"),
        }
    }
}

impl std::str::FromStr for CalculationType {
    type Err = MetricBuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "average" => Ok(CalculationType::Average),
            "yes/no" | "yesno" => Ok(CalculationType::YesNo),
            "nps" | "netpromoterscore" => Ok(CalculationType::NetPromoterScore),
            _ => Err(MetricBuildError::UnknownCalculationType(s.to_string())),
        }
    }
}

/// Configuration for one metric expression.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricRequest {
    /// The variable holding the metric's answer values.
    pub primary_variable: String,

    /// Entity identifiers passed through to the result context on the
    /// primary lookup: each `e` becomes the argument `e=result.e`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub primary_entities: Vec<String>,

    /// Variable gating the metric: the respondent only counts where this
    /// variable yields at least one row for the entity arguments.
    #[cfg_attr(feature = "serde", serde(default))]
    pub base_variable: Option<String>,

    /// Explicit base gate expression text, used when no base variable is
    /// configured. When both are absent the gate is `True`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub base_expression: Option<String>,

    /// Entity identifiers for the base variable lookup.
    #[cfg_attr(feature = "serde", serde(default))]
    pub base_entities: Vec<String>,

    /// Optional true-value filter text (`"lo>hi"` or `"v1|v2|v3"`).
    #[cfg_attr(feature = "serde", serde(default))]
    pub true_values_filter: Option<String>,

    /// Which calculation shape to generate.
    pub calculation_type: CalculationType,
}

/// Error during metric expression building.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MetricBuildError {
    /// No primary variable name was supplied.
    #[error("a primary variable name is required")]
    MissingPrimaryVariable,

    /// Calculation type text did not name a known shape.
    #[error("unknown calculation type '{0}'")]
    UnknownCalculationType(String),

    /// The true-value filter text failed to parse as integers.
    #[error("invalid true-value filter '{0}': expected 'min>max' or 'v1|v2|...' with integer values")]
    InvalidTrueValueFilter(String),

    /// The caller-supplied base expression is not in the grammar.
    #[error("invalid base expression '{expression}': {source}")]
    InvalidBaseExpression {
        /// The offending base expression text.
        expression: String,
        /// The underlying parse error.
        source: ExprError,
    },

    /// The builder produced text its own grammar rejects.
    #[error("generated expression '{expression}' failed to re-parse: {source}")]
    GeneratedExpressionInvalid {
        /// The generated expression text.
        expression: String,
        /// The underlying parse error.
        source: ExprError,
    },
}

/// Loop variable used by generated comprehensions.
const VALUE_VAR: &str = "v";

/// Builds the expression text for a metric configuration.
///
/// # Examples
///
/// ```rust
/// use survey_expr::metric::{build_metric_expression, CalculationType, MetricRequest};
///
/// let request = MetricRequest {
///     primary_variable: "var1".to_string(),
///     primary_entities: vec!["id1".to_string()],
///     base_variable: None,
///     base_expression: None,
///     base_entities: vec![],
///     true_values_filter: None,
///     calculation_type: CalculationType::Average,
/// };
/// let text = build_metric_expression(&request).unwrap();
/// assert_eq!(
///     text,
///     "max(response.var1(id1=result.id1), default=None) if True else None"
/// );
/// ```
pub fn build_metric_expression(request: &MetricRequest) -> Result<String, MetricBuildError> {
    if request.primary_variable.trim().is_empty() {
        return Err(MetricBuildError::MissingPrimaryVariable);
    }

    let filter = request
        .true_values_filter
        .as_deref()
        .map(str::parse::<TrueValueFilter>)
        .transpose()?;

    let mut values = variable_lookup(&request.primary_variable, &request.primary_entities);
    if let Some(filter) = &filter {
        values = filtered_values(values, filter);
    }

    let primary = match request.calculation_type {
        CalculationType::Average => Expr::aggregate(AggregateFn::Max, values, Some(Expr::None)),
        CalculationType::YesNo => Expr::compare(
            CompareOp::Gt,
            Expr::aggregate(AggregateFn::Len, values, None),
            Expr::int(0),
        ),
        CalculationType::NetPromoterScore => {
            let bucket = Expr::conditional(
                Expr::int(1),
                Expr::compare(CompareOp::GtEq, Expr::name(VALUE_VAR), Expr::int(9)),
                Expr::conditional(
                    Expr::int(0),
                    Expr::compare(CompareOp::GtEq, Expr::name(VALUE_VAR), Expr::int(7)),
                    Expr::int(-1),
                ),
            );
            let buckets = Expr::list_comprehension(bucket, VALUE_VAR, values, None);
            Expr::aggregate(AggregateFn::Max, buckets, Some(Expr::None))
        }
    };

    let base = base_gate(request)?;
    let expression = Expr::conditional(primary, base, Expr::None);

    let text = expression.to_string();
    parse(&text).map_err(|source| MetricBuildError::GeneratedExpressionInvalid {
        expression: text.clone(),
        source,
    })?;
    Ok(text)
}

/// `response.<variable>(e=result.e, ...)` for the given entity roles.
fn variable_lookup(variable: &str, entities: &[String]) -> Expr {
    let args = entities
        .iter()
        .map(|entity| CallArg {
            name: entity.clone(),
            value: Expr::entity(entity.clone()),
        })
        .collect();
    Expr::variable_call(variable, args)
}

/// Wraps a lookup in a comprehension keeping only the filter's values.
fn filtered_values(values: Expr, filter: &TrueValueFilter) -> Expr {
    let cond = match filter {
        TrueValueFilter::Discrete(accepted) => Expr::compare(
            CompareOp::In,
            Expr::name(VALUE_VAR),
            Expr::List(accepted.iter().copied().map(Expr::int).collect()),
        ),
        TrueValueFilter::Range { min, max } => Expr::and(vec![
            Expr::compare(CompareOp::GtEq, Expr::name(VALUE_VAR), Expr::int(*min)),
            Expr::compare(CompareOp::LtEq, Expr::name(VALUE_VAR), Expr::int(*max)),
        ]),
    };
    Expr::list_comprehension(Expr::name(VALUE_VAR), VALUE_VAR, values, Some(cond))
}

/// The gate the whole metric is conditioned on.
fn base_gate(request: &MetricRequest) -> Result<Expr, MetricBuildError> {
    if let Some(base_variable) = &request.base_variable {
        let lookup = variable_lookup(base_variable, &request.base_entities);
        return Ok(Expr::compare(
            CompareOp::Gt,
            Expr::aggregate(AggregateFn::Len, lookup, None),
            Expr::int(0),
        ));
    }
    if let Some(text) = &request.base_expression {
        return parse(text).map_err(|source| MetricBuildError::InvalidBaseExpression {
            expression: text.clone(),
            source,
        });
    }
    Ok(Expr::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;

    fn request(calculation_type: CalculationType) -> MetricRequest {
        MetricRequest {
            primary_variable: "var1".to_string(),
            primary_entities: vec!["id1".to_string()],
            base_variable: None,
            base_expression: None,
            base_entities: vec![],
            true_values_filter: None,
            calculation_type,
        }
    }

    #[test]
    fn test_average_without_base_or_filter() {
        let text = build_metric_expression(&request(CalculationType::Average)).unwrap();
        assert_eq!(
            text,
            "max(response.var1(id1=result.id1), default=None) if True else None"
        );
    }

    #[test]
    fn test_yes_no_shape() {
        let text = build_metric_expression(&request(CalculationType::YesNo)).unwrap();
        assert_eq!(
            text,
            "len(response.var1(id1=result.id1)) > 0 if True else None"
        );
    }

    #[test]
    fn test_nps_shape() {
        let text = build_metric_expression(&request(CalculationType::NetPromoterScore)).unwrap();
        assert_eq!(
            text,
            "max([1 if v >= 9 else 0 if v >= 7 else -1 for v in \
             response.var1(id1=result.id1)], default=None) if True else None"
        );
    }

    #[test]
    fn test_discrete_filter_narrows_values() {
        let mut req = request(CalculationType::Average);
        req.true_values_filter = Some("1|2|3".to_string());
        let text = build_metric_expression(&req).unwrap();
        assert_eq!(
            text,
            "max([v for v in response.var1(id1=result.id1) if v in [1, 2, 3]], \
             default=None) if True else None"
        );
    }

    #[test]
    fn test_range_filter_narrows_values_inclusively() {
        let mut req = request(CalculationType::Average);
        req.true_values_filter = Some("-10>20".to_string());
        let text = build_metric_expression(&req).unwrap();
        assert_eq!(
            text,
            "max([v for v in response.var1(id1=result.id1) if v >= -10 and v <= 20], \
             default=None) if True else None"
        );
    }

    #[test]
    fn test_base_variable_gates_the_metric() {
        let mut req = request(CalculationType::Average);
        req.base_variable = Some("Base".to_string());
        req.base_entities = vec!["id1".to_string()];
        let text = build_metric_expression(&req).unwrap();
        assert_eq!(
            text,
            "max(response.var1(id1=result.id1), default=None) \
             if len(response.Base(id1=result.id1)) > 0 else None"
        );
    }

    #[test]
    fn test_explicit_base_expression() {
        let mut req = request(CalculationType::YesNo);
        req.base_expression = Some("result.id1 == 1".to_string());
        let text = build_metric_expression(&req).unwrap();
        assert_eq!(
            text,
            "len(response.var1(id1=result.id1)) > 0 if result.id1 == 1 else None"
        );
    }

    #[test]
    fn test_invalid_base_expression_is_rejected() {
        let mut req = request(CalculationType::Average);
        req.base_expression = Some("import os".to_string());
        assert!(matches!(
            build_metric_expression(&req),
            Err(MetricBuildError::InvalidBaseExpression { .. })
        ));
    }

    #[test]
    fn test_invalid_filter_is_reported_verbatim() {
        let mut req = request(CalculationType::Average);
        req.true_values_filter = Some("one|two".to_string());
        match build_metric_expression(&req) {
            Err(MetricBuildError::InvalidTrueValueFilter(s)) => assert_eq!(s, "one|two"),
            other => panic!("expected filter error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_primary_variable() {
        let mut req = request(CalculationType::Average);
        req.primary_variable = String::new();
        assert_eq!(
            build_metric_expression(&req),
            Err(MetricBuildError::MissingPrimaryVariable)
        );
    }

    #[test]
    fn test_output_is_always_parseable_and_analyzable() {
        for calc in [
            CalculationType::Average,
            CalculationType::YesNo,
            CalculationType::NetPromoterScore,
        ] {
            let mut req = request(calc);
            req.base_variable = Some("Base".to_string());
            req.base_entities = vec!["id1".to_string(), "id2".to_string()];
            req.true_values_filter = Some("0>10".to_string());
            let text = build_metric_expression(&req).unwrap();
            let analysis = analyze(&text);
            assert!(analysis.is_ok(), "generated text failed analysis: {}", text);
            assert_eq!(analysis.variable_identifiers, vec!["Base", "var1"]);
            assert_eq!(analysis.entity_identifiers, vec!["id1", "id2"]);
        }
    }

    #[test]
    fn test_calculation_type_from_str() {
        assert_eq!(
            "average".parse::<CalculationType>().unwrap(),
            CalculationType::Average
        );
        assert_eq!(
            "yes/no".parse::<CalculationType>().unwrap(),
            CalculationType::YesNo
        );
        assert_eq!(
            "NPS".parse::<CalculationType>().unwrap(),
            CalculationType::NetPromoterScore
        );
        assert!("median".parse::<CalculationType>().is_err());
    }
}
