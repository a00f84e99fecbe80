//! # survey-expr
//!
//! A Rust library for the calculation expression language used by survey
//! variables and metrics.
//!
//! This crate provides:
//! - **Expression Parser**: Parse calculation expressions into a restricted AST
//! - **Dependency Analyzer**: Report which entities and variables an expression reads
//! - **Metric Builder**: Generate expression text for the standard metric shapes
//!
//! Expression text is authored by survey analysts, not by trusted code, so the
//! grammar is closed: the parser only accepts the constructs below and rejects
//! everything else (assignment, imports, arbitrary calls, attribute access on
//! anything but the two reserved receivers).
//!
//! ## Usage
//!
//! ```rust
//! use survey_expr::{analyze, parse};
//!
//! // Parse a calculation expression
//! let expr = parse("max(response.Age(), default=None)").unwrap();
//!
//! // Discover its dependencies without evaluating it
//! let analysis = analyze("max(response.Recommendation(Brand=result.Brand))");
//! assert_eq!(analysis.variable_identifiers, vec!["Recommendation"]);
//! assert_eq!(analysis.entity_identifiers, vec!["Brand"]);
//! ```
//!
//! ## Grammar Quick Reference
//!
//! | Construct | Example |
//! |-----------|---------|
//! | Literals | `42`, `-10`, `True`, `False`, `None` |
//! | List display | `[1, 2, 3]` |
//! | Conditional | `x if cond else y` |
//! | Boolean operators | `a and b`, `a or b`, `not a` |
//! | Comparisons | `== != < <= > >=`, `in`, `not in` |
//! | Arithmetic | `+ - * /`, unary `-` |
//! | Entity value | `result.Brand` |
//! | Variable lookup | `response.Recommendation(Brand=result.Brand)` |
//! | Aggregates | `max`, `min`, `any`, `all`, `sum`, `len`, each with optional `default=` |
//! | Comprehension | `[v for v in xs if v > 0]` (one `for`, at most one `if`) |
//!
//! `result` and `response` are the two reserved receivers: `result.<name>`
//! reads the entity value the expression is currently being evaluated for,
//! and `response.<name>(...)` looks up the respondent's answer values for a
//! variable, filtered by named entity arguments.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod analyzer;
mod ast;
mod error;
pub mod metric;
mod parser;

pub use analyzer::{analyze, Analysis};
pub use ast::{AggregateFn, BinaryOp, BoolOp, CallArg, CompareOp, Expr};
pub use error::{ExprError, ExprResult};
pub use parser::parse;

/// Entity instance identifier type (64-bit signed integer).
pub type EntityId = i64;
