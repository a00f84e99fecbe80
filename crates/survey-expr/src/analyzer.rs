//! Static dependency analysis for calculation expressions.
//!
//! Authoring tooling needs to know, before any respondent data exists, which
//! entity dimensions an expression reads from the result context and which
//! variables it looks up on the response context. The analyzer parses the
//! expression and walks the AST; nothing is evaluated.

use std::collections::BTreeSet;

use crate::ast::Expr;
use crate::parser::parse;

/// Result of analyzing one calculation expression.
///
/// `error` is populated instead of panicking or returning `Err`: analysis
/// runs in bulk over stored expression text during authoring, and a single
/// malformed expression must not abort the sweep. Callers check `error`
/// before trusting the identifier sets.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Analysis {
    /// Entity dimension names read via `result.<name>`, sorted, deduplicated.
    pub entity_identifiers: Vec<String>,
    /// Variable names looked up via `response.<name>(...)`, sorted, deduplicated.
    pub variable_identifiers: Vec<String>,
    /// Parse diagnostic when the expression is not in the grammar.
    pub error: Option<String>,
}

impl Analysis {
    /// Returns true if the expression parsed and the identifier sets are valid.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn failed(message: String) -> Self {
        Self {
            entity_identifiers: Vec::new(),
            variable_identifiers: Vec::new(),
            error: Some(message),
        }
    }
}

/// Analyzes an expression's entity and variable dependencies.
///
/// Embedded line breaks are normalized to spaces before parsing, so
/// expression text authored across multiple lines analyzes identically to
/// its single-line form.
///
/// # Examples
///
/// ```rust
/// use survey_expr::analyze;
///
/// let analysis = analyze("max(response.Age())");
/// assert!(analysis.is_ok());
/// assert_eq!(analysis.variable_identifiers, vec!["Age"]);
/// assert!(analysis.entity_identifiers.is_empty());
///
/// let analysis = analyze("");
/// assert!(!analysis.is_ok());
/// ```
pub fn analyze(text: &str) -> Analysis {
    let normalized = text.replace(['\r', '\n'], " ");
    let expr = match parse(&normalized) {
        Ok(expr) => expr,
        Err(e) => return Analysis::failed(e.to_string()),
    };

    let mut entities = BTreeSet::new();
    let mut variables = BTreeSet::new();
    collect(&expr, &mut entities, &mut variables);

    Analysis {
        entity_identifiers: entities.into_iter().collect(),
        variable_identifiers: variables.into_iter().collect(),
        error: None,
    }
}

fn collect(expr: &Expr, entities: &mut BTreeSet<String>, variables: &mut BTreeSet<String>) {
    match expr {
        Expr::Int(_) | Expr::Bool(_) | Expr::None | Expr::Name(_) => {}
        Expr::EntityRef(name) => {
            entities.insert(name.clone());
        }
        Expr::VariableCall { variable, args } => {
            variables.insert(variable.clone());
            for arg in args {
                collect(&arg.value, entities, variables);
            }
        }
        Expr::List(items) => {
            for item in items {
                collect(item, entities, variables);
            }
        }
        Expr::Conditional { then, cond, orelse } => {
            collect(then, entities, variables);
            collect(cond, entities, variables);
            collect(orelse, entities, variables);
        }
        Expr::BoolChain { operands, .. } => {
            for operand in operands {
                collect(operand, entities, variables);
            }
        }
        Expr::Not(inner) | Expr::Neg(inner) => collect(inner, entities, variables),
        Expr::Compare { left, right, .. } | Expr::Binary { left, right, .. } => {
            collect(left, entities, variables);
            collect(right, entities, variables);
        }
        Expr::Aggregate { input, default, .. } => {
            collect(input, entities, variables);
            if let Some(default) = default {
                collect(default, entities, variables);
            }
        }
        Expr::Comprehension {
            element,
            iter,
            cond,
            ..
        } => {
            collect(element, entities, variables);
            collect(iter, entities, variables);
            if let Some(cond) = cond {
                collect(cond, entities, variables);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_empty_is_error_with_empty_sets() {
        let analysis = analyze("");
        assert!(!analysis.is_ok());
        assert!(analysis.entity_identifiers.is_empty());
        assert!(analysis.variable_identifiers.is_empty());
    }

    #[test]
    fn test_analyze_parse_failure_is_error_with_empty_sets() {
        let analysis = analyze("import os");
        assert!(!analysis.is_ok());
        assert!(analysis.entity_identifiers.is_empty());
        assert!(analysis.variable_identifiers.is_empty());
    }

    #[test]
    fn test_analyze_unfiltered_lookup() {
        let analysis = analyze("max(response.Age())");
        assert!(analysis.is_ok());
        assert_eq!(analysis.variable_identifiers, vec!["Age"]);
        assert!(analysis.entity_identifiers.is_empty());
    }

    #[test]
    fn test_analyze_collects_entities_inside_call_arguments() {
        let analysis = analyze("max(response.Recommendation(Brand=result.Brand), default=None)");
        assert_eq!(analysis.variable_identifiers, vec!["Recommendation"]);
        assert_eq!(analysis.entity_identifiers, vec!["Brand"]);
    }

    #[test]
    fn test_analyze_sorts_and_deduplicates() {
        let analysis = analyze(
            "len(response.Spend(Week=result.Week, Brand=result.Brand)) > 0 \
             if result.Brand == 1 \
             else max(response.Awareness(Brand=result.Brand), default=None)",
        );
        assert_eq!(analysis.entity_identifiers, vec!["Brand", "Week"]);
        assert_eq!(analysis.variable_identifiers, vec!["Awareness", "Spend"]);
    }

    #[test]
    fn test_analyze_normalizes_line_breaks() {
        let multi_line = "max(\nresponse.Age(),\r\ndefault=None\n)";
        let single_line = "max( response.Age(), default=None )";
        assert_eq!(analyze(multi_line), analyze(single_line));
    }

    #[test]
    fn test_analyze_comprehension_variable_is_not_a_dependency() {
        let analysis = analyze("max([v for v in response.Q4NEW() if v in [1, 2]], default=None)");
        assert!(analysis.is_ok());
        assert_eq!(analysis.variable_identifiers, vec!["Q4NEW"]);
        assert!(analysis.entity_identifiers.is_empty());
    }
}
