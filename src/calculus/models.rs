//! Value objects exchanged between the derivative engine and its callers.
//!
//! All of them are immutable once built: every computation request creates its
//! own results and nothing is cached between requests.
use crate::errors::ParseError;
use crate::symbolic::symbolic_engine::{Expr, is_function_name, is_valid_identifier};
use num_complex::Complex;
use std::collections::HashMap;
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumString};

/// A user supplied expression together with its variables.
///
/// The symbolic tree is not stored: [`Expression::tree`] parses `raw_text` again
/// on every call. Two expressions are equal when their texts are equal.
#[derive(Debug, Clone)]
pub struct Expression {
    raw_text: String,
    variables: Vec<String>,
}

impl Expression {
    /// Parses `raw_text` and builds the variable list: the declared names in the
    /// given order, then every other free symbol of the tree in order of first occurrence.
    pub fn new(raw_text: &str, declared_variables: &[&str]) -> Result<Self, ParseError> {
        for name in declared_variables {
            if is_function_name(name) {
                return Err(ParseError::new(
                    raw_text,
                    format!("'{}' is a function name and cannot be used as a variable", name),
                    0,
                ));
            }
            if !is_valid_identifier(name) {
                return Err(ParseError::new(
                    raw_text,
                    format!("'{}' is not a valid variable name", name),
                    0,
                ));
            }
        }
        let tree = Expr::parse_expression(raw_text)?;
        let mut variables: Vec<String> = Vec::new();
        for name in declared_variables
            .iter()
            .map(|s| s.to_string())
            .chain(tree.variables_in_order())
        {
            if !variables.contains(&name) {
                variables.push(name);
            }
        }
        Ok(Expression {
            raw_text: raw_text.to_string(),
            variables,
        })
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// freshly parsed symbolic tree
    pub fn tree(&self) -> Result<Expr, ParseError> {
        Expr::parse_expression(&self.raw_text)
    }

    pub fn is_multivariable(&self) -> bool {
        self.variables.len() > 1
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.raw_text == other.raw_text
    }
}

impl Eq for Expression {}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.raw_text)
    }
}

/// Ordinary or higher order derivative of an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeResult {
    pub expression: Expression,
    pub variable: String,
    pub order: usize,
    /// simplified `order`-th derivative
    pub result: Expr,
    /// the same derivative before the last simplification pass
    pub unsimplified: Expr,
    /// narration, the last entry states `result`
    pub steps: Vec<String>,
}

impl DerivativeResult {
    /// `result` as LaTeX markup
    pub fn latex(&self) -> String {
        self.result.to_latex()
    }

    /// the whole equation, `\frac{d^n}{dx^n}\left(f\right) = f^{(n)}`
    pub fn equation_latex(&self) -> String {
        let operator = if self.order == 1 {
            format!("\\frac{{d}}{{d{}}}", self.variable)
        } else {
            format!(
                "\\frac{{d^{{{order}}}}}{{d{var}^{{{order}}}}}",
                order = self.order,
                var = self.variable
            )
        };
        let function = match self.expression.tree() {
            Ok(tree) => tree.to_latex(),
            Err(_) => self.expression.raw_text().to_string(),
        };
        format!("{}\\left({}\\right) = {}", operator, function, self.latex())
    }
}

/// First partial derivatives with respect to every variable of an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDerivativeResult {
    pub expression: Expression,
    /// iteration order of `derivatives` and `steps`
    pub variables: Vec<String>,
    pub derivatives: HashMap<String, Expr>,
    pub steps: HashMap<String, Vec<String>>,
}

impl PartialDerivativeResult {
    /// gradient components in variable order
    pub fn gradient(&self) -> Vec<Expr> {
        self.variables
            .iter()
            .filter_map(|var| self.derivatives.get(var).cloned())
            .collect()
    }

    /// Symbolic Hessian: `hessian[i][j]` is the derivative of the `i`-th gradient
    /// component with respect to the `j`-th variable.
    pub fn hessian(&self) -> Vec<Vec<Expr>> {
        let vars: Vec<&str> = self.variables.iter().map(|v| v.as_str()).collect();
        self.gradient()
            .iter()
            .map(|component| component.diff_multi_args(&vars))
            .collect()
    }
}

/// Kind of a critical point given by the second derivative test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Classification {
    Minimum,
    Maximum,
    Saddle,
    /// semidefinite with a zero eigenvalue, non-real eigenvalues, or no Hessian value
    Indeterminate,
}

impl Classification {
    /// Signs of the Hessian eigenvalues: all positive is a minimum, all negative a
    /// maximum, at least one of each sign a saddle, even with zero eigenvalues
    /// present. Otherwise, or with an imaginary part, the test is inconclusive.
    pub fn from_eigenvalues(eigenvalues: &[Complex<f64>], tolerance: f64) -> Self {
        if eigenvalues.is_empty()
            || eigenvalues
                .iter()
                .any(|ev| !ev.re.is_finite() || !ev.im.is_finite() || ev.im.abs() > tolerance)
        {
            return Classification::Indeterminate;
        }
        let positive = eigenvalues.iter().filter(|ev| ev.re > tolerance).count();
        let negative = eigenvalues.iter().filter(|ev| ev.re < -tolerance).count();
        match (positive, negative) {
            (p, 0) if p == eigenvalues.len() => Classification::Minimum,
            (0, n) if n == eigenvalues.len() => Classification::Maximum,
            (p, n) if p > 0 && n > 0 => Classification::Saddle,
            _ => Classification::Indeterminate,
        }
    }
}

/// Point where the gradient vanishes.
///
/// The classification is computed from the Hessian eigenvalues when the point is
/// built and cannot be changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalPoint {
    coordinates: Vec<(String, Expr)>,
    eigenvalues: Vec<Complex<f64>>,
    classification: Classification,
}

impl CriticalPoint {
    pub fn new(coordinates: Vec<(String, Expr)>, eigenvalues: Vec<Complex<f64>>, tolerance: f64) -> Self {
        let classification = Classification::from_eigenvalues(&eigenvalues, tolerance);
        CriticalPoint {
            coordinates,
            eigenvalues,
            classification,
        }
    }

    /// a point whose Hessian could not be evaluated
    pub fn indeterminate(coordinates: Vec<(String, Expr)>) -> Self {
        CriticalPoint {
            coordinates,
            eigenvalues: Vec::new(),
            classification: Classification::Indeterminate,
        }
    }

    /// coordinates in variable order
    pub fn coordinates(&self) -> &[(String, Expr)] {
        &self.coordinates
    }

    pub fn coordinate(&self, variable: &str) -> Option<&Expr> {
        self.coordinates
            .iter()
            .find(|(name, _)| name == variable)
            .map(|(_, value)| value)
    }

    pub fn eigenvalues(&self) -> &[Complex<f64>] {
        &self.eigenvalues
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }
}

impl fmt::Display for CriticalPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let coords: Vec<String> = self
            .coordinates
            .iter()
            .map(|(var, val)| format!("{}={}", var, val))
            .collect();
        write!(f, "({})", coords.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64) -> Complex<f64> {
        Complex::new(re, 0.0)
    }

    #[test]
    fn test_expression_variables() {
        let expr = Expression::new("x**2 + 3*x + 1", &["x"]).unwrap();
        assert_eq!(expr.variables(), &["x".to_string()]);
        let expr = Expression::new("y*z + x", &["x", "t"]).unwrap();
        assert_eq!(expr.variables(), &["x", "t", "y", "z"]);
        assert_eq!(expr.raw_text(), "y*z + x");
        assert!(expr.is_multivariable());
    }

    #[test]
    fn test_expression_rejects_bad_input() {
        let err = Expression::new("x +* y", &[]).unwrap_err();
        assert_eq!(err.text, "x +* y");
        assert!(Expression::new("x", &["sin"]).is_err());
        assert!(Expression::new("x", &["2x"]).is_err());
        assert!(Expression::new("   ", &["x"]).is_err());
    }

    #[test]
    fn test_expression_equality_by_text() {
        let a = Expression::new("x + y", &["x"]).unwrap();
        let b = Expression::new("x + y", &["y"]).unwrap();
        let c = Expression::new("y + x", &["x"]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.tree().unwrap(), b.tree().unwrap());
    }

    #[test]
    fn test_classification_from_eigenvalues() {
        let tol = 1e-9;
        assert_eq!(Classification::from_eigenvalues(&[c(2.0), c(3.0)], tol), Classification::Minimum);
        assert_eq!(Classification::from_eigenvalues(&[c(-2.0), c(-0.5)], tol), Classification::Maximum);
        assert_eq!(Classification::from_eigenvalues(&[c(2.0), c(-2.0)], tol), Classification::Saddle);
        assert_eq!(
            Classification::from_eigenvalues(&[c(2.0), c(0.0)], tol),
            Classification::Indeterminate
        );
        // opposite signs decide even next to a zero eigenvalue
        assert_eq!(
            Classification::from_eigenvalues(&[c(2.0), c(-1.0), c(1e-12)], tol),
            Classification::Saddle
        );
        assert_eq!(
            Classification::from_eigenvalues(&[c(2.0), c(-2.0), c(0.0)], tol),
            Classification::Saddle
        );
        assert_eq!(
            Classification::from_eigenvalues(&[c(-2.0), c(0.0)], tol),
            Classification::Indeterminate
        );
        assert_eq!(
            Classification::from_eigenvalues(&[Complex::new(1.0, 1.0), Complex::new(1.0, -1.0)], tol),
            Classification::Indeterminate
        );
        assert_eq!(Classification::from_eigenvalues(&[], tol), Classification::Indeterminate);
        assert_eq!(Classification::Saddle.to_string(), "saddle");
    }

    #[test]
    fn test_critical_point() {
        let coords = vec![("x".to_string(), Expr::Const(0.0)), ("y".to_string(), Expr::Const(1.5))];
        let point = CriticalPoint::new(coords.clone(), vec![c(2.0), c(2.0)], 1e-9);
        assert_eq!(point.classification(), Classification::Minimum);
        assert_eq!(point.coordinate("y"), Some(&Expr::Const(1.5)));
        assert_eq!(point.to_string(), "(x=0, y=1.5)");
        let point = CriticalPoint::indeterminate(coords);
        assert_eq!(point.classification(), Classification::Indeterminate);
        assert!(point.eigenvalues().is_empty());
    }
}
