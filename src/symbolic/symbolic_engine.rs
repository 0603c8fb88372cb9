//! # Symbolic Engine Module
//!
//! Core symbolic expression tree of the crate. Expressions are immutable trees of
//! [`Expr`] nodes; every transformation (substitution, differentiation,
//! simplification) returns a new tree.
//!
//! ## Main Structures and Methods
//!
//! ### `Expr` Enum
//! - **Variables**: `Var(String)` - symbolic variables like "x", "y"
//! - **Constants**: `Const(f64)` - numerical constants
//! - **Operations**: `Add`, `Sub`, `Mul`, `Div`, `Pow` - basic arithmetic
//! - **Functions**: `Func(FunctionKind, arg)` - sin, cos, tan, exp, log, sqrt
//!
//! Negation has no node of its own: `-e` is `Mul(Const(-1), e)`.
//!
//! ### Key Methods
//! - `set_variable()`, `set_variable_from_map()` - substitute variables with values
//! - `substitute_variable()` - substitute a variable with an expression
//! - `all_arguments_are_variables()` - sorted list of free variables
//! - `variables_in_order()` - free variables in order of first occurrence
//!
//! ## Printing
//! `Display` prints the same grammar the parser reads (`**` for powers, minimal
//! parentheses), so a printed expression parses back to an equal tree up to
//! simplification.

#![allow(non_camel_case_types)]

use regex::Regex;
use std::collections::HashMap;
use std::f64;
use std::fmt;
use std::sync::LazyLock;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// Elementary functions known to the parser and to the differentiation engine.
///
/// The printed name (strum `Display`/`EnumString`) is the lowercase name used in input text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum FunctionKind {
    Sin,
    Cos,
    Tan,
    Exp,
    /// natural logarithm
    Log,
    Sqrt,
}

impl FunctionKind {
    /// numerical value of the function
    pub fn apply(self, x: f64) -> f64 {
        match self {
            FunctionKind::Sin => x.sin(),
            FunctionKind::Cos => x.cos(),
            FunctionKind::Tan => x.tan(),
            FunctionKind::Exp => x.exp(),
            FunctionKind::Log => x.ln(),
            FunctionKind::Sqrt => x.sqrt(),
        }
    }
}

/// true if `name` is the name of a known function
pub fn is_function_name(name: &str) -> bool {
    FunctionKind::iter().any(|kind| kind.as_ref() == name)
}

/// true if `name` can be used as a variable: `[A-Za-z][A-Za-z0-9_]*` and not a function name
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name) && !is_function_name(name)
}

/// Core symbolic expression enum representing mathematical expressions as an abstract syntax tree.
///
/// # Examples
/// ```rust, ignore
/// use derivata::symbolic::symbolic_engine::Expr;
/// let x = Expr::Var("x".to_string());
/// let expr = Expr::Add(Box::new(x), Box::new(Expr::Const(2.0)));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Symbolic variable with a name (e.g., "x", "y", "velocity")
    Var(String),
    /// Numerical constant value
    Const(f64),
    /// Addition operation: left + right
    Add(Box<Expr>, Box<Expr>),
    /// Subtraction operation: left - right
    Sub(Box<Expr>, Box<Expr>),
    /// Multiplication operation: left * right
    Mul(Box<Expr>, Box<Expr>),
    /// Division operation: left / right
    Div(Box<Expr>, Box<Expr>),
    /// Power operation: base ** exponent
    Pow(Box<Expr>, Box<Expr>),
    /// Elementary function applied to one argument
    Func(FunctionKind, Box<Expr>),
}

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_POW: u8 = 4;
const PREC_ATOM: u8 = 5;

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(_, _) | Expr::Sub(_, _) => PREC_ADD,
            Expr::Mul(_, _) | Expr::Div(_, _) => PREC_MUL,
            Expr::Pow(_, _) => PREC_POW,
            Expr::Var(_) | Expr::Func(_, _) => PREC_ATOM,
            Expr::Const(c) if c.is_sign_negative() => PREC_MUL,
            Expr::Const(_) => PREC_ATOM,
        }
    }

    /// printed form begins with a minus sign
    fn starts_with_minus(&self) -> bool {
        match self {
            Expr::Const(c) => c.is_sign_negative(),
            Expr::Mul(lhs, _) | Expr::Div(lhs, _) => lhs.starts_with_minus(),
            Expr::Add(lhs, _) | Expr::Sub(lhs, _) => lhs.starts_with_minus(),
            _ => false,
        }
    }

    /// `Some(e)` if the expression is `-1 * e` with a non-constant `e`
    pub fn as_negation(&self) -> Option<&Expr> {
        match self {
            Expr::Mul(lhs, rhs) if **lhs == Expr::Const(-1.0) && !matches!(**rhs, Expr::Const(_)) => {
                Some(rhs)
            }
            _ => None,
        }
    }

    /// `Some(e)` if the expression prints as a subtraction of `e` when it is the right side of a sum
    fn negated_form(&self) -> Option<Expr> {
        match self {
            Expr::Const(c) if *c < 0.0 => Some(Expr::Const(-c)),
            Expr::Mul(lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
                (Expr::Const(c), Expr::Const(_)) if *c < 0.0 => None,
                (Expr::Const(c), _) if *c == -1.0 => Some(rhs.as_ref().clone()),
                (Expr::Const(c), _) if *c < 0.0 => Some(Expr::Mul(
                    Box::new(Expr::Const(-c)),
                    rhs.clone(),
                )),
                _ => None,
            },
            _ => None,
        }
    }
}

fn write_operand(f: &mut fmt::Formatter, child: &Expr, parent_prec: u8, right: bool) -> fmt::Result {
    let prec = child.precedence();
    let needs_parens = prec < parent_prec
        || (right && prec == parent_prec)
        || (right && child.starts_with_minus());
    if needs_parens {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

fn latex_operand(child: &Expr, parent_prec: u8, right: bool) -> String {
    let prec = child.precedence();
    if prec < parent_prec || (right && prec == parent_prec) || (right && child.starts_with_minus()) {
        format!("\\left({}\\right)", child.to_latex())
    } else {
        child.to_latex()
    }
}

impl Expr {
    /// LaTeX markup: `\frac` for quotients, juxtaposition for products
    pub fn to_latex(&self) -> String {
        match self {
            Expr::Var(name) => name.clone(),
            Expr::Const(val) => format!("{}", val),
            Expr::Add(lhs, rhs) => match rhs.negated_form() {
                Some(positive) => format!(
                    "{} - {}",
                    latex_operand(lhs, PREC_ADD, false),
                    latex_operand(&positive, PREC_ADD, true)
                ),
                None => format!(
                    "{} + {}",
                    latex_operand(lhs, PREC_ADD, false),
                    latex_operand(rhs, PREC_ADD, true)
                ),
            },
            Expr::Sub(lhs, rhs) => format!(
                "{} - {}",
                latex_operand(lhs, PREC_ADD, false),
                latex_operand(rhs, PREC_ADD, true)
            ),
            Expr::Mul(lhs, rhs) => {
                if let Some(negated) = self.as_negation() {
                    return if negated.starts_with_minus() || negated.precedence() < PREC_POW {
                        format!("-\\left({}\\right)", negated.to_latex())
                    } else {
                        format!("-{}", negated.to_latex())
                    };
                }
                let left = latex_operand(lhs, PREC_MUL, false);
                let right = latex_operand(rhs, PREC_MUL, true);
                // two adjacent numbers need an explicit product sign
                if right.starts_with(|c: char| c.is_ascii_digit()) {
                    format!("{} \\cdot {}", left, right)
                } else {
                    format!("{} {}", left, right)
                }
            }
            Expr::Div(lhs, rhs) => format!("\\frac{{{}}}{{{}}}", lhs.to_latex(), rhs.to_latex()),
            Expr::Pow(base, exp) => {
                let base_text = if base.precedence() <= PREC_POW
                    || base.starts_with_minus()
                    || matches!(**base, Expr::Func(_, _))
                {
                    format!("\\left({}\\right)", base.to_latex())
                } else {
                    base.to_latex()
                };
                format!("{}^{{{}}}", base_text, exp.to_latex())
            }
            Expr::Func(FunctionKind::Exp, arg) => format!("e^{{{}}}", arg.to_latex()),
            Expr::Func(FunctionKind::Sqrt, arg) => format!("\\sqrt{{{}}}", arg.to_latex()),
            Expr::Func(kind, arg) => format!("\\{}{{\\left({}\\right)}}", kind, arg.to_latex()),
        }
    }
}

/// Display implementation printing expressions in the input grammar.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Const(val) => write!(f, "{}", val),
            Expr::Add(lhs, rhs) => {
                write_operand(f, lhs, PREC_ADD, false)?;
                match rhs.negated_form() {
                    Some(positive) => {
                        write!(f, " - ")?;
                        write_operand(f, &positive, PREC_ADD, true)
                    }
                    None => {
                        write!(f, " + ")?;
                        write_operand(f, rhs, PREC_ADD, true)
                    }
                }
            }
            Expr::Sub(lhs, rhs) => {
                write_operand(f, lhs, PREC_ADD, false)?;
                write!(f, " - ")?;
                write_operand(f, rhs, PREC_ADD, true)
            }
            Expr::Mul(lhs, rhs) => {
                if let Some(negated) = self.as_negation() {
                    return if negated.starts_with_minus() || negated.precedence() < PREC_POW {
                        write!(f, "-({})", negated)
                    } else {
                        write!(f, "-{}", negated)
                    };
                }
                write_operand(f, lhs, PREC_MUL, false)?;
                write!(f, "*")?;
                write_operand(f, rhs, PREC_MUL, true)
            }
            Expr::Div(lhs, rhs) => {
                write_operand(f, lhs, PREC_MUL, false)?;
                write!(f, "/")?;
                write_operand(f, rhs, PREC_MUL, true)
            }
            Expr::Pow(base, exp) => {
                if base.precedence() <= PREC_POW || base.starts_with_minus() {
                    write!(f, "({})", base)?;
                } else {
                    write!(f, "{}", base)?;
                }
                write!(f, "**")?;
                if exp.precedence() < PREC_POW || exp.starts_with_minus() {
                    write!(f, "({})", exp)
                } else {
                    write!(f, "{}", exp)
                }
            }
            Expr::Func(kind, arg) => write!(f, "{}({})", kind, arg),
        }
    }
}

impl std::ops::Add for Expr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Expr::Add(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Sub for Expr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Expr::Sub(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Mul for Expr {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Expr::Mul(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Div for Expr {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Expr::Div(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Expr::Mul(Box::new(Expr::Const(-1.0)), Box::new(self))
    }
}

impl Expr {
    /// BASIC FEATURES

    /// Convenience method to wrap expression in Box for recursive structures.
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub fn func(kind: FunctionKind, arg: Expr) -> Expr {
        Expr::Func(kind, arg.boxed())
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Const(c) if *c == 0.0)
    }

    /// Applies `f` to every direct child and rebuilds the node.
    pub fn map_children<F>(&self, mut f: F) -> Expr
    where
        F: FnMut(&Expr) -> Expr,
    {
        match self {
            Expr::Var(_) | Expr::Const(_) => self.clone(),
            Expr::Add(lhs, rhs) => Expr::Add(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Sub(lhs, rhs) => Expr::Sub(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Mul(lhs, rhs) => Expr::Mul(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Div(lhs, rhs) => Expr::Div(f(lhs).boxed(), f(rhs).boxed()),
            Expr::Pow(base, exp) => Expr::Pow(f(base).boxed(), f(exp).boxed()),
            Expr::Func(kind, arg) => Expr::Func(*kind, f(arg).boxed()),
        }
    }

    /// Substitutes a variable with a constant value throughout the expression.
    pub fn set_variable(&self, var: &str, value: f64) -> Expr {
        match self {
            Expr::Var(name) if name == var => Expr::Const(value),
            _ => self.map_children(|child| child.set_variable(var, value)),
        }
    }

    /// Substitutes multiple variables with constant values using a HashMap.
    /// Only variables present in the map are substituted.
    pub fn set_variable_from_map(&self, var_map: &HashMap<String, f64>) -> Expr {
        match self {
            Expr::Var(name) => match var_map.get(name) {
                Some(value) => Expr::Const(*value),
                None => self.clone(),
            },
            _ => self.map_children(|child| child.set_variable_from_map(var_map)),
        }
    }

    /// substitute a variable with an expression
    pub fn substitute_variable(&self, var: &str, expr: &Expr) -> Expr {
        match self {
            Expr::Var(name) if name == var => expr.clone(),
            _ => self.map_children(|child| child.substitute_variable(var, expr)),
        }
    }

    /// check if the expression contains a variable
    pub fn contains_variable(&self, var_name: &str) -> bool {
        match self {
            Expr::Var(name) => name == var_name,
            Expr::Const(_) => false,
            Expr::Add(left, right)
            | Expr::Sub(left, right)
            | Expr::Mul(left, right)
            | Expr::Div(left, right)
            | Expr::Pow(left, right) => {
                left.contains_variable(var_name) || right.contains_variable(var_name)
            }
            Expr::Func(_, arg) => arg.contains_variable(var_name),
        }
    }

    /// check if the expression contains a given function anywhere in the tree
    pub fn contains_function(&self, kind: FunctionKind) -> bool {
        match self {
            Expr::Var(_) | Expr::Const(_) => false,
            Expr::Add(left, right)
            | Expr::Sub(left, right)
            | Expr::Mul(left, right)
            | Expr::Div(left, right)
            | Expr::Pow(left, right) => {
                left.contains_function(kind) || right.contains_function(kind)
            }
            Expr::Func(k, arg) => *k == kind || arg.contains_function(kind),
        }
    }

    /// arguments of all function nodes, outermost first
    pub fn function_arguments(&self) -> Vec<(FunctionKind, &Expr)> {
        let mut found = Vec::new();
        self.collect_function_arguments(&mut found);
        found
    }

    fn collect_function_arguments<'a>(&'a self, found: &mut Vec<(FunctionKind, &'a Expr)>) {
        match self {
            Expr::Var(_) | Expr::Const(_) => {}
            Expr::Add(left, right)
            | Expr::Sub(left, right)
            | Expr::Mul(left, right)
            | Expr::Div(left, right)
            | Expr::Pow(left, right) => {
                left.collect_function_arguments(found);
                right.collect_function_arguments(found);
            }
            Expr::Func(kind, arg) => {
                found.push((*kind, arg.as_ref()));
                arg.collect_function_arguments(found);
            }
        }
    }

    /// free variables in order of their first occurrence (left to right)
    pub fn variables_in_order(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Expr::Var(name) => {
                if !vars.contains(name) {
                    vars.push(name.clone());
                }
            }
            Expr::Const(_) => {}
            Expr::Add(left, right)
            | Expr::Sub(left, right)
            | Expr::Mul(left, right)
            | Expr::Div(left, right)
            | Expr::Pow(left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Expr::Func(_, arg) => arg.collect_variables(vars),
        }
    }

    /// sorted and deduplicated list of all free variables
    pub fn all_arguments_are_variables(&self) -> Vec<String> {
        let mut vars = self.variables_in_order();
        vars.sort();
        vars.dedup();
        vars
    }
}
