//! Calculation expression parser implemented using nom.
//!
//! The parser accepts exactly the closed grammar documented at the crate
//! level and nothing else. Expression text originates from survey authors,
//! so the parser doubles as the sandbox: attribute access is only parseable
//! on the reserved `response` and `result` receivers, and call syntax is
//! only parseable on a response attribute or one of the six aggregate
//! builtins. Everything outside the grammar is a parse error.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map_res, not, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use crate::ast::{AggregateFn, BinaryOp, BoolOp, CallArg, CompareOp, Expr};
use crate::error::{ExprError, ExprResult};

/// Parse a calculation expression string.
///
/// # Arguments
/// * `input` - The expression text to parse
///
/// # Returns
/// The parsed expression AST or an error
///
/// # Examples
///
/// ```rust
/// use survey_expr::parse;
///
/// // Aggregate over an unfiltered variable lookup
/// let expr = parse("max(response.Age())").unwrap();
///
/// // Filtered lookup with an entity argument
/// let expr = parse("response.Recommendation(Brand=result.Brand)").unwrap();
///
/// // Gated metric shape
/// let expr = parse("max(response.Age(), default=None) if True else None").unwrap();
/// ```
pub fn parse(input: &str) -> ExprResult<Expr> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ExprError::EmptyExpression);
    }

    match all_consuming(terminated(expression, ws))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let position = input.len() - e.input.len();
            Err(ExprError::ParseError {
                position,
                message: format!("unexpected input at: '{}'", truncate(e.input, 30)),
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(ExprError::ParseError {
            position: input.len(),
            message: "incomplete expression".to_string(),
        }),
    }
}

fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Tokens
// ============================================================================

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn name_token(input: &str) -> IResult<&str, &str> {
    preceded(ws, ident)(input)
}

fn err<T>(input: &str) -> IResult<&str, T> {
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}

/// Matches one whole-word keyword (word boundaries respected).
fn keyword(kw: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| {
        let (rest, word) = name_token(input)?;
        if word == kw {
            Ok((rest, word))
        } else {
            err(input)
        }
    }
}

fn is_reserved(word: &str) -> bool {
    matches!(
        word,
        "if" | "else"
            | "for"
            | "in"
            | "and"
            | "or"
            | "not"
            | "None"
            | "True"
            | "False"
            | "response"
            | "result"
    )
}

/// An identifier that is not a keyword or reserved receiver.
fn plain_name(input: &str) -> IResult<&str, &str> {
    let (rest, word) = name_token(input)?;
    if is_reserved(word) {
        err(input)
    } else {
        Ok((rest, word))
    }
}

fn next_char_is(input: &str, c: char) -> bool {
    input.trim_start().starts_with(c)
}

// ============================================================================
// Expression grammar, lowest precedence first
// ============================================================================

/// conditional: or_test ('if' or_test 'else' conditional)?
fn expression(input: &str) -> IResult<&str, Expr> {
    let (input, then) = or_test(input)?;
    match keyword("if")(input) {
        Ok((input, _)) => {
            let (input, cond) = or_test(input)?;
            let (input, _) = keyword("else")(input)?;
            let (input, orelse) = expression(input)?;
            Ok((
                input,
                Expr::Conditional {
                    then: Box::new(then),
                    cond: Box::new(cond),
                    orelse: Box::new(orelse),
                },
            ))
        }
        Err(_) => Ok((input, then)),
    }
}

fn or_test(input: &str) -> IResult<&str, Expr> {
    let (mut input, first) = and_test(input)?;
    let mut operands = vec![first];
    while let Ok((rest, _)) = keyword("or")(input) {
        let (rest, next) = and_test(rest)?;
        operands.push(next);
        input = rest;
    }
    if operands.len() == 1 {
        return Ok((input, operands.remove(0)));
    }
    Ok((
        input,
        Expr::BoolChain {
            op: BoolOp::Or,
            operands,
        },
    ))
}

fn and_test(input: &str) -> IResult<&str, Expr> {
    let (mut input, first) = not_test(input)?;
    let mut operands = vec![first];
    while let Ok((rest, _)) = keyword("and")(input) {
        let (rest, next) = not_test(rest)?;
        operands.push(next);
        input = rest;
    }
    if operands.len() == 1 {
        return Ok((input, operands.remove(0)));
    }
    Ok((
        input,
        Expr::BoolChain {
            op: BoolOp::And,
            operands,
        },
    ))
}

fn not_test(input: &str) -> IResult<&str, Expr> {
    match keyword("not")(input) {
        Ok((rest, _)) => {
            // `not in` belongs to the comparison below, never to a unary `not`
            // with nothing in front of it, so recursing here is unambiguous.
            let (rest, inner) = not_test(rest)?;
            Ok((rest, Expr::Not(Box::new(inner))))
        }
        Err(_) => comparison(input),
    }
}

/// comparison: arith (comp_op arith)?
fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, left) = arith(input)?;
    match compare_op(input) {
        Ok((input, op)) => {
            let (input, right) = arith(input)?;
            Ok((
                input,
                Expr::Compare {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            ))
        }
        Err(_) => Ok((input, left)),
    }
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        preceded(
            ws,
            alt((
                value(CompareOp::Eq, tag("==")),
                value(CompareOp::NotEq, tag("!=")),
                value(CompareOp::LtEq, tag("<=")),
                value(CompareOp::GtEq, tag(">=")),
                value(CompareOp::Lt, tag("<")),
                value(CompareOp::Gt, tag(">")),
            )),
        ),
        value(CompareOp::NotIn, pair(keyword("not"), keyword("in"))),
        value(CompareOp::In, keyword("in")),
    ))(input)
}

fn arith(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut expr) = term(input)?;
    loop {
        let op = match preceded(
            ws,
            alt((
                value(BinaryOp::Add, char('+')),
                value(BinaryOp::Sub, char('-')),
            )),
        )(input)
        {
            Ok((rest, op)) => {
                input = rest;
                op
            }
            Err(_) => break,
        };
        let (rest, right) = term(input)?;
        input = rest;
        expr = Expr::Binary {
            op,
            left: Box::new(expr),
            right: Box::new(right),
        };
    }
    Ok((input, expr))
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut expr) = factor(input)?;
    loop {
        let op = match preceded(
            ws,
            alt((
                value(BinaryOp::Mul, char('*')),
                value(BinaryOp::Div, char('/')),
            )),
        )(input)
        {
            Ok((rest, op)) => {
                input = rest;
                op
            }
            Err(_) => break,
        };
        let (rest, right) = factor(input)?;
        input = rest;
        expr = Expr::Binary {
            op,
            left: Box::new(expr),
            right: Box::new(right),
        };
    }
    Ok((input, expr))
}

fn factor(input: &str) -> IResult<&str, Expr> {
    match preceded(ws, char('-'))(input) {
        Ok((rest, _)) => {
            let (rest, inner) = factor(rest)?;
            let expr = match inner {
                Expr::Int(n) => Expr::Int(-n),
                other => Expr::Neg(Box::new(other)),
            };
            Ok((rest, expr))
        }
        Err(_) => atom(input),
    }
}

// ============================================================================
// Atoms
// ============================================================================

fn atom(input: &str) -> IResult<&str, Expr> {
    preceded(ws, alt((int_literal, list_display, paren_expr, ident_based)))(input)
}

fn int_literal(input: &str) -> IResult<&str, Expr> {
    map_res(digit1, |s: &str| s.parse::<i64>().map(Expr::Int))(input)
}

fn paren_expr(input: &str) -> IResult<&str, Expr> {
    delimited(char('('), expression, preceded(ws, char(')')))(input)
}

/// `[a, b, c]`, `[]` or `[element for var in iter if cond]`.
fn list_display(input: &str) -> IResult<&str, Expr> {
    let (input, _) = char('[')(input)?;
    if let Ok((rest, _)) = preceded(ws, char(']'))(input) {
        return Ok((rest, Expr::List(Vec::new())));
    }
    let (input, first) = expression(input)?;
    if let Ok((rest, _)) = keyword("for")(input) {
        let (rest, comp) = comprehension_tail(rest, first, true)?;
        let (rest, _) = preceded(ws, char(']'))(rest)?;
        return Ok((rest, comp));
    }
    let (input, mut items) = many0(preceded(preceded(ws, char(',')), expression))(input)?;
    items.insert(0, first);
    let (input, _) = preceded(ws, char(']'))(input)?;
    Ok((input, Expr::List(items)))
}

/// Parses the clause after `for`: one loop variable, one source, at most one
/// condition. A second `for` or `if` is left unconsumed and fails the
/// enclosing bracket/parenthesis match.
fn comprehension_tail(input: &str, element: Expr, brackets: bool) -> IResult<&str, Expr> {
    let (input, var) = plain_name(input)?;
    let (input, _) = keyword("in")(input)?;
    let (input, iter) = or_test(input)?;
    let (input, cond) = match keyword("if")(input) {
        Ok((rest, _)) => {
            let (rest, cond) = or_test(rest)?;
            (rest, Some(cond))
        }
        Err(_) => (input, None),
    };
    Ok((
        input,
        Expr::Comprehension {
            element: Box::new(element),
            var: var.to_string(),
            iter: Box::new(iter),
            cond: cond.map(Box::new),
            brackets,
        },
    ))
}

/// Dispatches an identifier: literal keyword, reserved receiver, aggregate
/// call or comprehension variable. Anything call- or attribute-shaped on an
/// ordinary identifier is rejected here.
fn ident_based(input: &str) -> IResult<&str, Expr> {
    let (rest, word) = ident(input)?;
    match word {
        "None" => Ok((rest, Expr::None)),
        "True" => Ok((rest, Expr::Bool(true))),
        "False" => Ok((rest, Expr::Bool(false))),
        "response" => response_call(rest),
        "result" => result_attribute(rest),
        "if" | "else" | "for" | "in" | "and" | "or" | "not" => err(input),
        name => {
            if let Some(func) = AggregateFn::from_name(name) {
                if next_char_is(rest, '(') {
                    let (rest, _) = preceded(ws, char('('))(rest)?;
                    return aggregate_call(rest, func);
                }
            }
            if next_char_is(rest, '(') || next_char_is(rest, '.') {
                return err(input);
            }
            Ok((rest, Expr::Name(name.to_string())))
        }
    }
}

/// `.<variable>(name=value, ...)` after the `response` receiver. A response
/// attribute must be called; a bare `response.<name>` is not an expression.
fn response_call(input: &str) -> IResult<&str, Expr> {
    let (input, _) = preceded(ws, char('.'))(input)?;
    let (input, variable) = plain_name(input)?;
    let (input, _) = preceded(ws, char('('))(input)?;
    let (input, args) = separated_list0(preceded(ws, char(',')), call_arg)(input)?;
    let (input, _) = preceded(ws, char(')'))(input)?;
    Ok((
        input,
        Expr::VariableCall {
            variable: variable.to_string(),
            args,
        },
    ))
}

fn call_arg(input: &str) -> IResult<&str, CallArg> {
    let (input, name) = plain_name(input)?;
    let (input, _) = preceded(ws, char('='))(input)?;
    let (input, _) = not(char('='))(input)?;
    let (input, value) = expression(input)?;
    Ok((
        input,
        CallArg {
            name: name.to_string(),
            value,
        },
    ))
}

/// `.<entity>` after the `result` receiver.
fn result_attribute(input: &str) -> IResult<&str, Expr> {
    let (input, _) = preceded(ws, char('.'))(input)?;
    let (input, name) = plain_name(input)?;
    Ok((input, Expr::EntityRef(name.to_string())))
}

/// Aggregate argument list after the opening parenthesis: one positional
/// input (expression or bare generator comprehension), then an optional
/// `default=` keyword argument.
fn aggregate_call(input: &str, func: AggregateFn) -> IResult<&str, Expr> {
    let (input, first) = expression(input)?;
    let (input, arg) = match keyword("for")(input) {
        Ok((rest, _)) => {
            let (rest, comp) = comprehension_tail(rest, first, false)?;
            (rest, comp)
        }
        Err(_) => (input, first),
    };
    let (input, default) = match preceded(ws, char(','))(input) {
        Ok((rest, _)) => {
            let (rest, _) = default_keyword(rest)?;
            let (rest, _) = preceded(ws, char('='))(rest)?;
            let (rest, value) = expression(rest)?;
            (rest, Some(value))
        }
        Err(_) => (input, None),
    };
    let (input, _) = preceded(ws, char(')'))(input)?;
    Ok((
        input,
        Expr::Aggregate {
            func,
            input: Box::new(arg),
            default: default.map(Box::new),
        },
    ))
}

fn default_keyword(input: &str) -> IResult<&str, &str> {
    let (rest, word) = name_token(input)?;
    if word == "default" {
        Ok((rest, word))
    } else {
        err(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str) {
        let expr = parse(text).unwrap();
        let rendered = expr.to_string();
        let reparsed = parse(&rendered).unwrap();
        assert_eq!(expr, reparsed, "display of '{}' did not round-trip", text);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse(""), Err(ExprError::EmptyExpression));
        assert_eq!(parse("   \n  "), Err(ExprError::EmptyExpression));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("42").unwrap(), Expr::Int(42));
        assert_eq!(parse("-10").unwrap(), Expr::Int(-10));
        assert_eq!(parse("True").unwrap(), Expr::Bool(true));
        assert_eq!(parse("False").unwrap(), Expr::Bool(false));
        assert_eq!(parse("None").unwrap(), Expr::None);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse("[1, 2, 3]").unwrap(),
            Expr::List(vec![Expr::Int(1), Expr::Int(2), Expr::Int(3)])
        );
        assert_eq!(parse("[]").unwrap(), Expr::List(vec![]));
    }

    #[test]
    fn test_parse_unfiltered_lookup() {
        let expr = parse("max(response.Age())").unwrap();
        match expr {
            Expr::Aggregate { func, input, default } => {
                assert_eq!(func, AggregateFn::Max);
                assert!(default.is_none());
                assert_eq!(
                    *input,
                    Expr::VariableCall {
                        variable: "Age".to_string(),
                        args: vec![],
                    }
                );
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_parse_filtered_lookup() {
        let expr = parse("response.var1(id1=result.id1)").unwrap();
        assert_eq!(
            expr,
            Expr::VariableCall {
                variable: "var1".to_string(),
                args: vec![CallArg {
                    name: "id1".to_string(),
                    value: Expr::EntityRef("id1".to_string()),
                }],
            }
        );
    }

    #[test]
    fn test_parse_list_valued_argument() {
        let expr = parse("response.Q4NEW(Q4NEWAnswers=[1, 2, 3])").unwrap();
        match expr {
            Expr::VariableCall { variable, args } => {
                assert_eq!(variable, "Q4NEW");
                assert_eq!(args.len(), 1);
                assert_eq!(args[0].name, "Q4NEWAnswers");
                assert!(matches!(args[0].value, Expr::List(_)));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_parse_conditional() {
        let expr = parse("1 if result.Brand == 2 else None").unwrap();
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_parse_conditional_chain_is_right_associative() {
        let expr = parse("1 if a else 2 if b else 3").unwrap();
        match expr {
            Expr::Conditional { orelse, .. } => {
                assert!(matches!(*orelse, Expr::Conditional { .. }));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_parse_membership() {
        let expr = parse("v in [1, 2]").unwrap();
        assert!(matches!(
            expr,
            Expr::Compare {
                op: CompareOp::In,
                ..
            }
        ));
        let expr = parse("v not in [1, 2]").unwrap();
        assert!(matches!(
            expr,
            Expr::Compare {
                op: CompareOp::NotIn,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_list_comprehension() {
        let expr = parse("[v for v in response.Q4NEW() if v in [1, 2]]").unwrap();
        match expr {
            Expr::Comprehension {
                var,
                cond,
                brackets,
                ..
            } => {
                assert_eq!(var, "v");
                assert!(cond.is_some());
                assert!(brackets);
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_parse_generator_in_aggregate() {
        let expr = parse("sum(v for v in response.Q4NEW())").unwrap();
        match expr {
            Expr::Aggregate { func, input, .. } => {
                assert_eq!(func, AggregateFn::Sum);
                assert!(matches!(
                    *input,
                    Expr::Comprehension {
                        brackets: false,
                        ..
                    }
                ));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_parse_aggregate_default() {
        let expr = parse("max(response.Age(), default=None)").unwrap();
        match expr {
            Expr::Aggregate { default, .. } => assert_eq!(default, Some(Box::new(Expr::None))),
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_parse_boolean_operators() {
        let expr = parse("v >= -10 and v <= 20").unwrap();
        assert!(matches!(
            expr,
            Expr::BoolChain {
                op: BoolOp::And,
                ..
            }
        ));
        let expr = parse("not result.Brand == 1").unwrap();
        assert!(matches!(expr, Expr::Not(_)));
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        match expr {
            Expr::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(
                    *right,
                    Expr::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_parse_whitespace_and_newlines() {
        let expr = parse("max(\n    response.Age(),\n    default=None\n)").unwrap();
        assert!(matches!(expr, Expr::Aggregate { .. }));
    }

    #[test]
    fn test_reject_attribute_on_ordinary_identifier() {
        assert!(parse("foo.bar").is_err());
        assert!(parse("os.system").is_err());
    }

    #[test]
    fn test_reject_arbitrary_calls() {
        assert!(parse("foo(1)").is_err());
        assert!(parse("__import__('os')").is_err());
        assert!(parse("eval(x)").is_err());
    }

    #[test]
    fn test_reject_call_on_result_attribute() {
        assert!(parse("result.Brand(1)").is_err());
    }

    #[test]
    fn test_reject_uncalled_response_attribute() {
        assert!(parse("response.Age").is_err());
    }

    #[test]
    fn test_reject_assignment() {
        assert!(parse("x = 1").is_err());
    }

    #[test]
    fn test_reject_positional_call_arguments() {
        assert!(parse("response.Age(1)").is_err());
    }

    #[test]
    fn test_reject_multiple_comprehension_clauses() {
        assert!(parse("[v for v in xs for w in ys]").is_err());
        assert!(parse("[v for v in xs if a if b]").is_err());
    }

    #[test]
    fn test_reject_unknown_keyword_argument_in_aggregate() {
        assert!(parse("max(response.Age(), initial=0)").is_err());
    }

    #[test]
    fn test_parse_error_reports_position() {
        match parse("max(response.Age(), !!)") {
            Err(ExprError::ParseError { position, message }) => {
                assert!(position > 0);
                assert!(message.contains("unexpected input"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_display_round_trips() {
        roundtrip("max(response.var1(id1=result.id1), default=None) if True else None");
        roundtrip("[1 if v >= 9 else 0 if v >= 7 else -1 for v in response.Q4NEW()]");
        roundtrip("len(response.Base(Brand=result.Brand)) > 0");
        roundtrip("v >= -10 and v <= 20 or v in [1, 2, 3]");
        roundtrip("-(1 + 2) * 3");
        roundtrip("not v in [1]");
    }
}
