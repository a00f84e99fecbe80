//! Tree-walking evaluation of compiled expressions.
//!
//! Runs one expression against one respondent's response context and one
//! entity-combination result context. Semantics follow the grammar's source
//! conventions: short-circuit `and`/`or` return an operand value, truthiness
//! is value-based, aggregates take an optional `default` for empty input.

use survey_expr::{AggregateFn, BinaryOp, BoolOp, CompareOp, Expr};

use crate::context::{ResponseContext, ResultContext};
use crate::error::{EvalResult, EvaluatorError};
use crate::value::Value;
use crate::variable::FilterIds;

/// Evaluates a validated expression against the two contexts.
pub(crate) fn evaluate(
    expr: &Expr,
    response: &ResponseContext,
    result: &ResultContext<'_>,
) -> EvalResult<Value> {
    let mut scope = Vec::new();
    eval(expr, response, result, &mut scope)
}

/// Comprehension-variable bindings, innermost last.
type Scope<'e> = Vec<(&'e str, Value)>;

fn eval<'e>(
    expr: &'e Expr,
    response: &ResponseContext,
    result: &ResultContext<'_>,
    scope: &mut Scope<'e>,
) -> EvalResult<Value> {
    match expr {
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::None => Ok(Value::None),

        Expr::Name(name) => scope
            .iter()
            .rev()
            .find(|(bound, _)| *bound == name.as_str())
            .map(|(_, value)| value.clone())
            .ok_or_else(|| EvaluatorError::UnboundName(name.clone())),

        Expr::EntityRef(name) => Ok(Value::Int(result.entity(name)?)),

        Expr::VariableCall { variable, args } => {
            let question = response.variable(variable)?;
            let mut filters = Vec::with_capacity(args.len());
            for arg in args {
                let value = eval(&arg.value, response, result, scope)?;
                filters.push((arg.name.as_str(), filter_ids(value)?));
            }
            let values = question.value_lookup(&filters)?;
            Ok(Value::List(values.into_iter().map(Value::Int).collect()))
        }

        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, response, result, scope)?);
            }
            Ok(Value::List(values))
        }

        Expr::Conditional { then, cond, orelse } => {
            if eval(cond, response, result, scope)?.truthy() {
                eval(then, response, result, scope)
            } else {
                eval(orelse, response, result, scope)
            }
        }

        Expr::BoolChain { op, operands } => {
            let mut last = Value::Bool(matches!(op, BoolOp::And));
            for operand in operands {
                last = eval(operand, response, result, scope)?;
                let stop = match op {
                    BoolOp::And => !last.truthy(),
                    BoolOp::Or => last.truthy(),
                };
                if stop {
                    return Ok(last);
                }
            }
            Ok(last)
        }

        Expr::Not(inner) => Ok(Value::Bool(!eval(inner, response, result, scope)?.truthy())),

        Expr::Compare { op, left, right } => {
            let left = eval(left, response, result, scope)?;
            let right = eval(right, response, result, scope)?;
            compare(*op, &left, &right)
        }

        Expr::Binary { op, left, right } => {
            let left = eval(left, response, result, scope)?.as_int()?;
            let right = eval(right, response, result, scope)?.as_int()?;
            arithmetic(*op, left, right)
        }

        Expr::Neg(inner) => {
            let n = eval(inner, response, result, scope)?.as_int()?;
            n.checked_neg()
                .map(Value::Int)
                .ok_or(EvaluatorError::Overflow("-"))
        }

        Expr::Aggregate { func, input, default } => {
            let items = eval(input, response, result, scope)?.into_items()?;
            if items.is_empty() {
                if let Some(default) = default {
                    return eval(default, response, result, scope);
                }
            }
            aggregate(*func, &items)
        }

        Expr::Comprehension {
            element,
            var,
            iter,
            cond,
            ..
        } => {
            let source = eval(iter, response, result, scope)?.into_items()?;
            let mut out = Vec::new();
            for item in source {
                scope.push((var.as_str(), item));
                let produced = comprehension_item(element, cond.as_deref(), response, result, scope);
                scope.pop();
                if let Some(value) = produced? {
                    out.push(value);
                }
            }
            Ok(Value::List(out))
        }
    }
}

fn comprehension_item<'e>(
    element: &'e Expr,
    cond: Option<&'e Expr>,
    response: &ResponseContext,
    result: &ResultContext<'_>,
    scope: &mut Scope<'e>,
) -> EvalResult<Option<Value>> {
    if let Some(cond) = cond {
        if !eval(cond, response, result, scope)?.truthy() {
            return Ok(None);
        }
    }
    eval(element, response, result, scope).map(Some)
}

/// Normalizes an evaluated filter argument to id lists: a single id, the
/// absent marker, or a list of either.
fn filter_ids(value: Value) -> EvalResult<FilterIds> {
    match value {
        Value::Int(id) => Ok(FilterIds::One(Some(id))),
        Value::None => Ok(FilterIds::One(None)),
        Value::List(items) => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Int(id) => ids.push(Some(id)),
                    Value::None => ids.push(None),
                    other => {
                        return Err(EvaluatorError::TypeMismatch(format!(
                            "entity argument lists may only hold ids, got {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(FilterIds::Many(ids))
        }
        other => Err(EvaluatorError::TypeMismatch(format!(
            "entity arguments must be an id or a list of ids, got {}",
            other.type_name()
        ))),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let outcome = match op {
        CompareOp::Eq => left.value_eq(right),
        CompareOp::NotEq => !left.value_eq(right),
        CompareOp::In | CompareOp::NotIn => {
            let items = match right {
                Value::List(items) => items,
                other => {
                    return Err(EvaluatorError::TypeMismatch(format!(
                        "argument of 'in' must be a list, got {}",
                        other.type_name()
                    )))
                }
            };
            let found = items.iter().any(|item| left.value_eq(item));
            if op == CompareOp::In {
                found
            } else {
                !found
            }
        }
        CompareOp::Lt => left.as_int()? < right.as_int()?,
        CompareOp::LtEq => left.as_int()? <= right.as_int()?,
        CompareOp::Gt => left.as_int()? > right.as_int()?,
        CompareOp::GtEq => left.as_int()? >= right.as_int()?,
    };
    Ok(Value::Bool(outcome))
}

fn arithmetic(op: BinaryOp, left: i64, right: i64) -> EvalResult<Value> {
    let outcome = match op {
        BinaryOp::Add => left.checked_add(right).ok_or(EvaluatorError::Overflow("+")),
        BinaryOp::Sub => left.checked_sub(right).ok_or(EvaluatorError::Overflow("-")),
        BinaryOp::Mul => left.checked_mul(right).ok_or(EvaluatorError::Overflow("*")),
        BinaryOp::Div => {
            if right == 0 {
                Err(EvaluatorError::DivisionByZero)
            } else {
                left.checked_div(right).ok_or(EvaluatorError::Overflow("/"))
            }
        }
    }?;
    Ok(Value::Int(outcome))
}

fn aggregate(func: AggregateFn, items: &[Value]) -> EvalResult<Value> {
    match func {
        AggregateFn::Max | AggregateFn::Min => {
            let mut best: Option<i64> = None;
            for item in items {
                let n = item.as_int()?;
                best = Some(match best {
                    Some(b) if func == AggregateFn::Max => b.max(n),
                    Some(b) => b.min(n),
                    None => n,
                });
            }
            best.map(Value::Int).ok_or(EvaluatorError::EmptySequence {
                function: func.name(),
            })
        }
        AggregateFn::Any => Ok(Value::Bool(items.iter().any(Value::truthy))),
        AggregateFn::All => Ok(Value::Bool(items.iter().all(Value::truthy))),
        AggregateFn::Sum => {
            let mut total = 0i64;
            for item in items {
                total = total
                    .checked_add(item.as_int()?)
                    .ok_or(EvaluatorError::Overflow("sum"))?;
            }
            Ok(Value::Int(total))
        }
        AggregateFn::Len => Ok(Value::Int(items.len() as i64)),
    }
}
