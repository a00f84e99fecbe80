//! Abstract syntax tree for calculation expressions.

use std::fmt;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompareOp {
    /// Equal: `==`
    Eq,
    /// Not equal: `!=`
    NotEq,
    /// Less than: `<`
    Lt,
    /// Less than or equal: `<=`
    LtEq,
    /// Greater than: `>`
    Gt,
    /// Greater than or equal: `>=`
    GtEq,
    /// Membership: `in`
    In,
    /// Negated membership: `not in`
    NotIn,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::NotEq => write!(f, "!="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::LtEq => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::GtEq => write!(f, ">="),
            CompareOp::In => write!(f, "in"),
            CompareOp::NotIn => write!(f, "not in"),
        }
    }
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    /// Addition: `+`
    Add,
    /// Subtraction: `-`
    Sub,
    /// Multiplication: `*`
    Mul,
    /// Division: `/`
    Div,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
        }
    }
}

/// Boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoolOp {
    /// Short-circuit conjunction: `and`
    And,
    /// Short-circuit disjunction: `or`
    Or,
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolOp::And => write!(f, "and"),
            BoolOp::Or => write!(f, "or"),
        }
    }
}

/// The closed set of aggregate builtins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AggregateFn {
    /// Largest value: `max(xs)`
    Max,
    /// Smallest value: `min(xs)`
    Min,
    /// True if any element is truthy: `any(xs)`
    Any,
    /// True if every element is truthy: `all(xs)`
    All,
    /// Sum of the elements: `sum(xs)`
    Sum,
    /// Number of elements: `len(xs)`
    Len,
}

impl AggregateFn {
    /// Resolves an identifier to an aggregate, if it names one.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "max" => Some(AggregateFn::Max),
            "min" => Some(AggregateFn::Min),
            "any" => Some(AggregateFn::Any),
            "all" => Some(AggregateFn::All),
            "sum" => Some(AggregateFn::Sum),
            "len" => Some(AggregateFn::Len),
            _ => None,
        }
    }

    /// The source-level name of this aggregate.
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFn::Max => "max",
            AggregateFn::Min => "min",
            AggregateFn::Any => "any",
            AggregateFn::All => "all",
            AggregateFn::Sum => "sum",
            AggregateFn::Len => "len",
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single named argument in a response-variable call.
///
/// Example: `Brand=result.Brand` in `response.Recommendation(Brand=result.Brand)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallArg {
    /// The entity dimension name being filtered.
    pub name: String,
    /// The filter value: a single id or a list of ids.
    pub value: Expr,
}

impl fmt::Display for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Abstract syntax tree for calculation expressions.
///
/// The grammar is closed by construction: attribute access only exists on
/// the two reserved receivers ([`Expr::EntityRef`] for `result.<name>` and
/// [`Expr::VariableCall`] for `response.<name>(...)`), and calls only exist
/// on response attributes and the six [`AggregateFn`] builtins.
///
/// # Examples
///
/// ```rust
/// use survey_expr::{parse, Expr};
///
/// let expr = parse("result.Brand").unwrap();
/// assert!(matches!(expr, Expr::EntityRef(_)));
///
/// let expr = parse("max(response.Age())").unwrap();
/// assert!(matches!(expr, Expr::Aggregate { .. }));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// Integer literal: `42`
    Int(i64),

    /// Boolean literal: `True` or `False`
    Bool(bool),

    /// The empty value: `None`
    None,

    /// Bare identifier; only legal while bound by an enclosing comprehension.
    Name(String),

    /// Entity value from the result context: `result.<name>`
    EntityRef(String),

    /// Filtered lookup on a response-context variable:
    /// `response.<variable>(dim=id, other=[id, id])`
    VariableCall {
        /// The variable name being looked up.
        variable: String,
        /// Named entity-dimension filter arguments.
        args: Vec<CallArg>,
    },

    /// List display: `[a, b, c]`
    List(Vec<Expr>),

    /// Conditional expression: `then if cond else orelse` (right-associative).
    Conditional {
        /// Value when the condition is truthy.
        then: Box<Expr>,
        /// The condition.
        cond: Box<Expr>,
        /// Value when the condition is falsy.
        orelse: Box<Expr>,
    },

    /// Chain of `and` or `or` operands, left to right.
    BoolChain {
        /// The connective joining the operands.
        op: BoolOp,
        /// Two or more operands.
        operands: Vec<Expr>,
    },

    /// Logical negation: `not x`
    Not(Box<Expr>),

    /// A single comparison: `left <op> right`
    Compare {
        /// The comparison operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },

    /// Binary arithmetic: `left <op> right`
    Binary {
        /// The arithmetic operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },

    /// Arithmetic negation: `-x`
    Neg(Box<Expr>),

    /// Aggregate call: `max(xs)` or `max(xs, default=None)`
    Aggregate {
        /// Which builtin.
        func: AggregateFn,
        /// The input sequence (list, lookup or comprehension).
        input: Box<Expr>,
        /// Value to use when the input is empty.
        default: Option<Box<Expr>>,
    },

    /// Single-clause comprehension: `[element for var in iter if cond]`.
    ///
    /// `brackets` distinguishes the list form from the bare generator form
    /// that is only legal as an aggregate argument.
    Comprehension {
        /// The element expression, evaluated per kept item.
        element: Box<Expr>,
        /// The bound loop variable.
        var: String,
        /// The source sequence.
        iter: Box<Expr>,
        /// Optional filter condition.
        cond: Option<Box<Expr>>,
        /// True for `[...]` list form, false for the generator form.
        brackets: bool,
    },
}

impl Expr {
    /// Creates an integer literal.
    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    /// Creates an entity reference `result.<name>`.
    pub fn entity(name: impl Into<String>) -> Self {
        Expr::EntityRef(name.into())
    }

    /// Creates a bare comprehension variable reference.
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    /// Creates a response-variable lookup with named entity arguments.
    pub fn variable_call(variable: impl Into<String>, args: Vec<CallArg>) -> Self {
        Expr::VariableCall {
            variable: variable.into(),
            args,
        }
    }

    /// Creates a comparison expression.
    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates an `and` chain over the given operands.
    pub fn and(operands: Vec<Expr>) -> Self {
        Expr::BoolChain {
            op: BoolOp::And,
            operands,
        }
    }

    /// Creates an `or` chain over the given operands.
    pub fn or(operands: Vec<Expr>) -> Self {
        Expr::BoolChain {
            op: BoolOp::Or,
            operands,
        }
    }

    /// Creates a conditional expression `then if cond else orelse`.
    pub fn conditional(then: Expr, cond: Expr, orelse: Expr) -> Self {
        Expr::Conditional {
            then: Box::new(then),
            cond: Box::new(cond),
            orelse: Box::new(orelse),
        }
    }

    /// Creates an aggregate call.
    pub fn aggregate(func: AggregateFn, input: Expr, default: Option<Expr>) -> Self {
        Expr::Aggregate {
            func,
            input: Box::new(input),
            default: default.map(Box::new),
        }
    }

    /// Creates a bracketed list comprehension.
    pub fn list_comprehension(
        element: Expr,
        var: impl Into<String>,
        iter: Expr,
        cond: Option<Expr>,
    ) -> Self {
        Expr::Comprehension {
            element: Box::new(element),
            var: var.into(),
            iter: Box::new(iter),
            cond: cond.map(Box::new),
            brackets: true,
        }
    }

    /// Returns true if this is a literal (`Int`, `Bool` or `None`).
    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Int(_) | Expr::Bool(_) | Expr::None)
    }

    /// Binding strength used to decide where `Display` must parenthesize.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Conditional { .. } => 1,
            Expr::BoolChain { op: BoolOp::Or, .. } => 2,
            Expr::BoolChain { op: BoolOp::And, .. } => 3,
            Expr::Not(_) => 4,
            Expr::Compare { .. } => 5,
            Expr::Binary {
                op: BinaryOp::Add | BinaryOp::Sub,
                ..
            } => 6,
            Expr::Binary {
                op: BinaryOp::Mul | BinaryOp::Div,
                ..
            } => 7,
            Expr::Neg(_) => 8,
            Expr::Comprehension { brackets: false, .. } => 0,
            _ => 10,
        }
    }

    /// Writes `self`, parenthesized when it binds more loosely than `min`.
    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        let needs_parens = self.precedence() < min;
        if needs_parens {
            write!(f, "(")?;
        }
        match self {
            Expr::Int(n) => write!(f, "{}", n)?,
            Expr::Bool(true) => write!(f, "True")?,
            Expr::Bool(false) => write!(f, "False")?,
            Expr::None => write!(f, "None")?,
            Expr::Name(name) => write!(f, "{}", name)?,
            Expr::EntityRef(name) => write!(f, "result.{}", name)?,
            Expr::VariableCall { variable, args } => {
                write!(f, "response.{}(", variable)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")?;
            }
            Expr::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_prec(f, 0)?;
                }
                write!(f, "]")?;
            }
            Expr::Conditional { then, cond, orelse } => {
                then.fmt_prec(f, 2)?;
                write!(f, " if ")?;
                cond.fmt_prec(f, 2)?;
                write!(f, " else ")?;
                orelse.fmt_prec(f, 1)?;
            }
            Expr::BoolChain { op, operands } => {
                let child_min = self.precedence() + 1;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op)?;
                    }
                    operand.fmt_prec(f, child_min)?;
                }
            }
            Expr::Not(inner) => {
                write!(f, "not ")?;
                inner.fmt_prec(f, 4)?;
            }
            Expr::Compare { op, left, right } => {
                left.fmt_prec(f, 6)?;
                write!(f, " {} ", op)?;
                right.fmt_prec(f, 6)?;
            }
            Expr::Binary { op, left, right } => {
                let prec = self.precedence();
                left.fmt_prec(f, prec)?;
                write!(f, " {} ", op)?;
                right.fmt_prec(f, prec + 1)?;
            }
            Expr::Neg(inner) => {
                write!(f, "-")?;
                inner.fmt_prec(f, 8)?;
            }
            Expr::Aggregate { func, input, default } => {
                write!(f, "{}(", func)?;
                input.fmt_prec(f, 0)?;
                if let Some(default) = default {
                    write!(f, ", default=")?;
                    default.fmt_prec(f, 0)?;
                }
                write!(f, ")")?;
            }
            Expr::Comprehension {
                element,
                var,
                iter,
                cond,
                brackets,
            } => {
                if *brackets {
                    write!(f, "[")?;
                }
                element.fmt_prec(f, 1)?;
                write!(f, " for {} in ", var)?;
                iter.fmt_prec(f, 2)?;
                if let Some(cond) = cond {
                    write!(f, " if ")?;
                    cond.fmt_prec(f, 2)?;
                }
                if *brackets {
                    write!(f, "]")?;
                }
            }
        }
        if needs_parens {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_display() {
        assert_eq!(Expr::int(42).to_string(), "42");
        assert_eq!(Expr::int(-10).to_string(), "-10");
        assert_eq!(Expr::Bool(true).to_string(), "True");
        assert_eq!(Expr::None.to_string(), "None");
    }

    #[test]
    fn test_entity_ref_display() {
        assert_eq!(Expr::entity("Brand").to_string(), "result.Brand");
    }

    #[test]
    fn test_variable_call_display() {
        let expr = Expr::variable_call(
            "Recommendation",
            vec![CallArg {
                name: "Brand".to_string(),
                value: Expr::entity("Brand"),
            }],
        );
        assert_eq!(expr.to_string(), "response.Recommendation(Brand=result.Brand)");
    }

    #[test]
    fn test_aggregate_display() {
        let expr = Expr::aggregate(
            AggregateFn::Max,
            Expr::variable_call("Age", vec![]),
            Some(Expr::None),
        );
        assert_eq!(expr.to_string(), "max(response.Age(), default=None)");
    }

    #[test]
    fn test_conditional_display_right_associative() {
        let expr = Expr::conditional(
            Expr::int(1),
            Expr::compare(CompareOp::GtEq, Expr::name("v"), Expr::int(9)),
            Expr::conditional(
                Expr::int(0),
                Expr::compare(CompareOp::GtEq, Expr::name("v"), Expr::int(7)),
                Expr::int(-1),
            ),
        );
        assert_eq!(expr.to_string(), "1 if v >= 9 else 0 if v >= 7 else -1");
    }

    #[test]
    fn test_nested_conditional_then_is_parenthesized() {
        let inner = Expr::conditional(Expr::int(1), Expr::Bool(true), Expr::int(2));
        let expr = Expr::conditional(inner, Expr::Bool(false), Expr::int(3));
        assert_eq!(expr.to_string(), "(1 if True else 2) if False else 3");
    }

    #[test]
    fn test_bool_chain_display() {
        let expr = Expr::and(vec![
            Expr::compare(CompareOp::GtEq, Expr::name("v"), Expr::int(-10)),
            Expr::compare(CompareOp::LtEq, Expr::name("v"), Expr::int(20)),
        ]);
        assert_eq!(expr.to_string(), "v >= -10 and v <= 20");
    }

    #[test]
    fn test_or_of_and_needs_no_parens() {
        let expr = Expr::or(vec![
            Expr::and(vec![Expr::name("a"), Expr::name("b")]),
            Expr::name("c"),
        ]);
        assert_eq!(expr.to_string(), "a and b or c");
    }

    #[test]
    fn test_comprehension_display() {
        let expr = Expr::list_comprehension(
            Expr::name("v"),
            "v",
            Expr::variable_call("Q4NEW", vec![]),
            Some(Expr::compare(
                CompareOp::In,
                Expr::name("v"),
                Expr::List(vec![Expr::int(1), Expr::int(2), Expr::int(3)]),
            )),
        );
        assert_eq!(
            expr.to_string(),
            "[v for v in response.Q4NEW() if v in [1, 2, 3]]"
        );
    }

    #[test]
    fn test_arithmetic_precedence_display() {
        let expr = Expr::Binary {
            op: BinaryOp::Mul,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(Expr::int(1)),
                right: Box::new(Expr::int(2)),
            }),
            right: Box::new(Expr::int(3)),
        };
        assert_eq!(expr.to_string(), "(1 + 2) * 3");
    }

    #[test]
    fn test_aggregate_from_name() {
        assert_eq!(AggregateFn::from_name("max"), Some(AggregateFn::Max));
        assert_eq!(AggregateFn::from_name("len"), Some(AggregateFn::Len));
        assert_eq!(AggregateFn::from_name("print"), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_expr_serde_round_trip() {
        let expr = Expr::aggregate(
            AggregateFn::Max,
            Expr::variable_call(
                "var1",
                vec![CallArg {
                    name: "id1".to_string(),
                    value: Expr::entity("id1"),
                }],
            ),
            Some(Expr::None),
        );
        let json = serde_json::to_string(&expr).unwrap();
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(expr, back);
    }
}
