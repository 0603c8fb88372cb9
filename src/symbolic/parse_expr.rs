//! a module turns a String expression into a symbolic expression
//!
//! Grammar (whitespace allowed between tokens):
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := atom ('**' unary)?
//! atom    := number | func '(' expr ')' | ident | '(' expr ')'
//! ```
//! `^`, implicit multiplication and unknown function names are rejected.
//!# Example
//! ```
//! use derivata::symbolic::symbolic_engine::Expr;
//! let parsed_expression = Expr::parse_expression("x**2 + 3*x + 1").unwrap();
//! println!(" parsed_expression {}", parsed_expression);
//! assert!(Expr::parse_expression("x +* y").is_err());
//! ```
use crate::errors::ParseError;
use crate::symbolic::symbolic_engine::{Expr, FunctionKind, is_function_name};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, one_of},
    combinator::{cut, not, opt, recognize},
    error::{ErrorKind, ParseError as NomParseError},
    multi::{fold_many0, many0},
    sequence::{pair, terminated},
};
use std::str::FromStr;

/// error produced inside the combinators: where it happened and what was expected
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError<'a> {
    pub input: &'a str,
    pub message: String,
}

impl<'a> SyntaxError<'a> {
    fn new(input: &'a str, message: impl Into<String>) -> Self {
        SyntaxError {
            input,
            message: message.into(),
        }
    }
}

impl<'a> NomParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        SyntaxError::new(input, format!("unexpected input ({})", kind.description()))
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, T> = IResult<&'a str, T, SyntaxError<'a>>;

fn failure<'a, T>(input: &'a str, message: impl Into<String>) -> PResult<'a, T> {
    Err(nom::Err::Failure(SyntaxError::new(input, message)))
}

fn sp(input: &str) -> PResult<'_, &str> {
    multispace0(input)
}

fn expect_char(c: char, input: &str) -> PResult<'_, char> {
    let (input, _) = sp(input)?;
    match char::<&str, SyntaxError>(c).parse(input) {
        Ok(ok) => Ok(ok),
        Err(_) if c == ')' => failure(input, "expected ')': unbalanced parentheses"),
        Err(_) => failure(input, format!("expected '{}'", c)),
    }
}

fn number(input: &str) -> PResult<'_, Expr> {
    let (rest, text) = recognize((
        alt((
            recognize((digit1, opt((char('.'), digit0)))),
            recognize((char('.'), digit1)),
        )),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;
    match text.parse::<f64>() {
        Ok(value) => Ok((rest, Expr::Const(value))),
        Err(_) => failure(input, format!("invalid number '{}'", text)),
    }
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(alpha1, many0(alt((alphanumeric1, tag("_")))))).parse(input)
}

fn function_or_variable(input: &str) -> PResult<'_, Expr> {
    let (rest, name) = identifier(input)?;
    let (after_ws, _) = sp(rest)?;
    if after_ws.starts_with('(') {
        let Ok(kind) = FunctionKind::from_str(name) else {
            return failure(input, format!("unknown function '{}'", name));
        };
        let (rest, _) = expect_char('(', after_ws)?;
        let (rest, arg) = cut(expression).parse(rest)?;
        let (rest, _) = expect_char(')', rest)?;
        Ok((rest, Expr::Func(kind, arg.boxed())))
    } else if is_function_name(name) {
        failure(
            input,
            format!("function '{}' must be followed by an argument in parentheses", name),
        )
    } else {
        Ok((rest, Expr::Var(name.to_string())))
    }
}

fn parenthesized(input: &str) -> PResult<'_, Expr> {
    let (rest, _) = char('(').parse(input)?;
    let (rest, inner) = cut(expression).parse(rest)?;
    let (rest, _) = expect_char(')', rest)?;
    Ok((rest, inner))
}

fn atom(input: &str) -> PResult<'_, Expr> {
    let (input, _) = sp(input)?;
    match alt((number, function_or_variable, parenthesized)).parse(input) {
        Err(nom::Err::Error(_)) if input.is_empty() => failure(input, "unexpected end of input"),
        Err(nom::Err::Error(_)) if input.starts_with(')') => {
            failure(input, "unexpected ')': unbalanced parentheses")
        }
        Err(nom::Err::Error(_)) => {
            failure(input, "expected a number, variable, function call or '('")
        }
        other => other,
    }
}

fn power(input: &str) -> PResult<'_, Expr> {
    let (input, base) = atom(input)?;
    let (rest, _) = sp(input)?;
    if rest.starts_with('^') {
        return failure(rest, "'^' is not supported, use '**' for powers");
    }
    match tag::<&str, &str, SyntaxError>("**").parse(rest) {
        Ok((rest, _)) => {
            let (rest, exponent) = cut(unary).parse(rest)?;
            Ok((rest, Expr::Pow(base.boxed(), exponent.boxed())))
        }
        Err(_) => Ok((input, base)),
    }
}

fn unary(input: &str) -> PResult<'_, Expr> {
    let (input, _) = sp(input)?;
    match one_of::<&str, &str, SyntaxError>("+-").parse(input) {
        Ok((rest, '-')) => {
            let (rest, operand) = cut(unary).parse(rest)?;
            let negated = match operand {
                Expr::Const(c) => Expr::Const(-c),
                other => -other,
            };
            Ok((rest, negated))
        }
        Ok((rest, _)) => cut(unary).parse(rest),
        Err(_) => power(input),
    }
}

fn mul_op(input: &str) -> PResult<'_, char> {
    let (input, _) = sp(input)?;
    alt((terminated(char('*'), not(char('*'))), char('/'))).parse(input)
}

fn add_op(input: &str) -> PResult<'_, char> {
    let (input, _) = sp(input)?;
    one_of("+-").parse(input)
}

fn term(input: &str) -> PResult<'_, Expr> {
    let (input, first) = unary(input)?;
    let mut first = Some(first);
    fold_many0(
        pair(mul_op, cut(unary)),
        move || first.take().unwrap_or(Expr::Const(1.0)),
        |acc, (op, rhs)| match op {
            '*' => Expr::Mul(acc.boxed(), rhs.boxed()),
            _ => Expr::Div(acc.boxed(), rhs.boxed()),
        },
    )
    .parse(input)
}

fn expression(input: &str) -> PResult<'_, Expr> {
    let (input, first) = term(input)?;
    let mut first = Some(first);
    fold_many0(
        pair(add_op, cut(term)),
        move || first.take().unwrap_or(Expr::Const(0.0)),
        |acc, (op, rhs)| match op {
            '+' => Expr::Add(acc.boxed(), rhs.boxed()),
            _ => Expr::Sub(acc.boxed(), rhs.boxed()),
        },
    )
    .parse(input)
}

/// Parses the whole of `text` into a symbolic tree.
pub fn parse_expression_func(text: &str) -> Result<Expr, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::new(text, "empty expression", 0));
    }
    let position = |rest: &str| text.len() - rest.len();
    match terminated(expression, multispace0).parse(text) {
        Ok(("", expr)) => Ok(expr),
        Ok((rest, _)) => {
            let message = if rest.starts_with(')') {
                "unexpected ')': unbalanced parentheses".to_string()
            } else {
                format!("unexpected input '{}'", rest)
            };
            Err(ParseError::new(text, message, position(rest)))
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(ParseError::new(text, e.message, position(e.input)))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::new(text, "incomplete input", text.len())),
    }
}

impl Expr {
    /// Parses a string into a symbolic expression.
    pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
        parse_expression_func(input)
    }

    /// Parses several strings, stopping at the first error.
    pub fn parse_vector_expression(inputs: &[&str]) -> Result<Vec<Expr>, ParseError> {
        inputs.iter().map(|s| Expr::parse_expression(s)).collect()
    }
}
