//! Context and label expressions.
//!
//! ```text
//! core and (customer or !legacy)
//! core, customer            -- comma is `or`
//! not test
//! ```

use std::collections::BTreeSet;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, value, verify},
    multi::many0,
    sequence::{delimited, pair, preceded},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid expression '{expression}': {detail}")]
pub struct ExpressionError {
    pub expression: String,
    pub detail: String,
}

/// Boolean expression tree over names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Name(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate against a set of lower-case names.
    pub fn eval(&self, names: &BTreeSet<String>) -> bool {
        match self {
            Expr::Name(name) => names.contains(&name.to_lowercase()),
            Expr::Not(inner) => !inner.eval(names),
            Expr::And(a, b) => a.eval(names) && b.eval(names),
            Expr::Or(a, b) => a.eval(names) || b.eval(names),
        }
    }
}

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
    expr: Expr,
}

impl Expression {
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        let trimmed = input.trim();
        match all_consuming(delimited(multispace0, or_expr, multispace0))(trimmed) {
            Ok((_, expr)) => Ok(Self {
                source: trimmed.to_string(),
                expr,
            }),
            Err(e) => Err(ExpressionError {
                expression: input.to_string(),
                detail: e.to_string(),
            }),
        }
    }

    /// Blank input means "no expression".
    pub fn parse_optional(input: &str) -> Result<Option<Self>, ExpressionError> {
        if input.trim().is_empty() {
            Ok(None)
        } else {
            Self::parse(input).map(Some)
        }
    }

    pub fn matches(&self, names: &BTreeSet<String>) -> bool {
        self.expr.eval(names)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl std::str::FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Normalize a list of names for matching.
pub fn name_set<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_keyword(s: &str) -> bool {
    ["and", "or", "not"].iter().any(|k| s.eq_ignore_ascii_case(k))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    verify(
        take_while1(|c: char| {
            c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '$' | '@' | '{' | '}')
        }),
        |s: &str| !is_keyword(s),
    )(input)
}

fn or_separator(input: &str) -> IResult<&str, ()> {
    alt((
        value((), delimited(multispace0, char(','), multispace0)),
        value((), delimited(multispace1, tag_no_case("or"), multispace1)),
    ))(input)
}

fn and_separator(input: &str) -> IResult<&str, ()> {
    value((), delimited(multispace1, tag_no_case("and"), multispace1))(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(or_separator, and_expr))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, next| Expr::Or(Box::new(acc), Box::new(next)));
    Ok((input, expr))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(preceded(and_separator, unary))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, next| Expr::And(Box::new(acc), Box::new(next)));
    Ok((input, expr))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(pair(char('!'), multispace0), unary), |e| Expr::Not(Box::new(e))),
        map(preceded(pair(tag_no_case("not"), multispace1), unary), |e| {
            Expr::Not(Box::new(e))
        }),
        delimited(
            pair(char('('), multispace0),
            or_expr,
            pair(multispace0, char(')')),
        ),
        map(identifier, |s: &str| Expr::Name(s.to_string())),
    ))(input)
}
