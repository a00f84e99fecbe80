//! Expression compilation: parse, validate, and wrap for evaluation.

use survey_expr::Expr;

use crate::context::{ResponseContext, ResultContext};
use crate::error::{CompileError, EvalResult, EvaluatorError};
use crate::interpreter;
use crate::value::Value;

/// A validated, executable calculation expression.
///
/// Compilation is an authoring-time step: parse failures and unbound names
/// are reported against the offending expression text and never tolerated
/// at evaluation time. A compiled expression is stateless, deterministic
/// and pure in its two context arguments, so one instance is safely shared
/// across respondents and invoked concurrently without locking.
///
/// # Example
///
/// ```rust
/// use survey_expr_executor::{
///     AnswerRow, CompiledExpression, QuestionVariable, ResponseContext, ResultContext, Value,
/// };
///
/// let compiled = CompiledExpression::compile("max(response.Age(), default=None)").unwrap();
///
/// let age = QuestionVariable::new("Age", vec![], vec![AnswerRow::unkeyed(25)]).unwrap();
/// let response = ResponseContext::new([age]);
/// let result = ResultContext::new();
///
/// assert_eq!(compiled.evaluate(&response, &result).unwrap(), Value::Int(25));
/// ```
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    text: String,
    ast: Expr,
}

impl CompiledExpression {
    /// Compiles expression text into an executable expression.
    pub fn compile(text: &str) -> Result<Self, CompileError> {
        let fail = |source: EvaluatorError| CompileError {
            expression: text.to_string(),
            source,
        };

        let ast = survey_expr::parse(text).map_err(|e| fail(e.into()))?;
        check_bindings(&ast, &mut Vec::new()).map_err(fail)?;

        Ok(Self {
            text: text.to_string(),
            ast,
        })
    }

    /// The original expression text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The validated syntax tree.
    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Evaluates the expression against one respondent's response context
    /// and one entity-combination result context.
    pub fn evaluate(&self, response: &ResponseContext, result: &ResultContext<'_>) -> EvalResult<Value> {
        interpreter::evaluate(&self.ast, response, result)
    }
}

/// Rejects bare identifiers that are not bound by an enclosing
/// comprehension. The parser already closes the grammar; this closes the
/// one remaining hole where a typo'd name would only surface per
/// respondent at evaluation time.
fn check_bindings(expr: &Expr, scope: &mut Vec<String>) -> EvalResult<()> {
    match expr {
        Expr::Int(_) | Expr::Bool(_) | Expr::None | Expr::EntityRef(_) => Ok(()),
        Expr::Name(name) => {
            if scope.iter().any(|bound| bound == name) {
                Ok(())
            } else {
                Err(EvaluatorError::UnboundName(name.clone()))
            }
        }
        Expr::VariableCall { args, .. } => {
            for arg in args {
                check_bindings(&arg.value, scope)?;
            }
            Ok(())
        }
        Expr::List(items) => {
            for item in items {
                check_bindings(item, scope)?;
            }
            Ok(())
        }
        Expr::Conditional { then, cond, orelse } => {
            check_bindings(then, scope)?;
            check_bindings(cond, scope)?;
            check_bindings(orelse, scope)
        }
        Expr::BoolChain { operands, .. } => {
            for operand in operands {
                check_bindings(operand, scope)?;
            }
            Ok(())
        }
        Expr::Not(inner) | Expr::Neg(inner) => check_bindings(inner, scope),
        Expr::Compare { left, right, .. } | Expr::Binary { left, right, .. } => {
            check_bindings(left, scope)?;
            check_bindings(right, scope)
        }
        Expr::Aggregate { input, default, .. } => {
            check_bindings(input, scope)?;
            if let Some(default) = default {
                check_bindings(default, scope)?;
            }
            Ok(())
        }
        Expr::Comprehension {
            element,
            var,
            iter,
            cond,
            ..
        } => {
            // The source sequence sees the enclosing scope only.
            check_bindings(iter, scope)?;
            scope.push(var.clone());
            let checked = check_bindings(element, scope)
                .and_then(|()| cond.as_deref().map_or(Ok(()), |c| check_bindings(c, scope)));
            scope.pop();
            checked
        }
    }
}
