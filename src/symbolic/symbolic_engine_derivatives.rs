//! # Symbolic Engine Derivatives Module
//!
//! Analytical differentiation and direct evaluation of symbolic expressions.
//!
//! ## Key Methods
//!
//! ### Differentiation
//! - `diff(var: &str)` - analytical partial/total derivative (not simplified)
//! - `n_th_derivative(var, n)` - higher-order derivative, simplified after every step
//! - `derivative_chain(var, n)` - every intermediate derivative, raw and simplified
//! - `diff_multi_args(vars)` - all first partial derivatives at once
//!
//! ### Checks and evaluation
//! - `find_division_by_zero()` - denominators that are structurally zero
//! - `non_finite_constant()` - inf/NaN constants in the tree
//! - `eval_expression()` - direct evaluation without closure creation

use crate::errors::ComputationError;
use crate::symbolic::symbolic_engine::{Expr, FunctionKind};

impl Expr {
    /// DIFFERENTIATION

    /// Computes the analytical derivative of the expression with respect to a variable.
    ///
    /// - Power rule: d/dx(u**n) = n*u**(n-1)*u'
    /// - Exponential base: d/dx(a**v) = a**v*log(a)*v'
    /// - General power: d/dx(u**v) = u**v*(v'*log(u) + v*u'/u)
    /// - Product rule: d/dx(f*g) = f'*g + f*g'
    /// - Quotient rule: d/dx(f/g) = (f'*g - g'*f)/(g*g)
    /// - Chain rule for every function
    ///
    /// Sub-trees free of `var` differentiate to `0` directly.
    ///
    /// # Examples
    /// ```rust, ignore
    /// let f = Expr::parse_expression("x**2").unwrap();
    /// let df_dx = f.diff("x").simplify(); // 2*x
    /// ```
    pub fn diff(&self, var: &str) -> Expr {
        if !self.contains_variable(var) {
            return Expr::Const(0.0);
        }
        match self {
            Expr::Var(_) => Expr::Const(1.0),
            Expr::Const(_) => Expr::Const(0.0),
            Expr::Add(lhs, rhs) => Expr::Add(Box::new(lhs.diff(var)), Box::new(rhs.diff(var))),
            Expr::Sub(lhs, rhs) => Expr::Sub(Box::new(lhs.diff(var)), Box::new(rhs.diff(var))),
            Expr::Mul(lhs, rhs) => Expr::Add(
                Box::new(Expr::Mul(Box::new(lhs.diff(var)), rhs.clone())),
                Box::new(Expr::Mul(lhs.clone(), Box::new(rhs.diff(var)))),
            ),
            Expr::Div(lhs, rhs) => Expr::Div(
                Box::new(Expr::Sub(
                    Box::new(Expr::Mul(Box::new(lhs.diff(var)), rhs.clone())),
                    Box::new(Expr::Mul(Box::new(rhs.diff(var)), lhs.clone())),
                )),
                Box::new(Expr::Mul(rhs.clone(), rhs.clone())),
            ),
            Expr::Pow(base, exp) if !exp.contains_variable(var) => {
                let reduced_exp = match exp.as_ref() {
                    Expr::Const(n) => Expr::Const(n - 1.0),
                    _ => Expr::Sub(exp.clone(), Box::new(Expr::Const(1.0))),
                };
                Expr::Mul(
                    Box::new(Expr::Mul(
                        exp.clone(),
                        Box::new(Expr::Pow(base.clone(), Box::new(reduced_exp))),
                    )),
                    Box::new(base.diff(var)),
                )
            }
            Expr::Pow(base, exp) if !base.contains_variable(var) => Expr::Mul(
                Box::new(Expr::Mul(
                    Box::new(self.clone()),
                    Box::new(Expr::Func(FunctionKind::Log, base.clone())),
                )),
                Box::new(exp.diff(var)),
            ),
            Expr::Pow(base, exp) => Expr::Mul(
                Box::new(self.clone()),
                Box::new(Expr::Add(
                    Box::new(Expr::Mul(
                        Box::new(exp.diff(var)),
                        Box::new(Expr::Func(FunctionKind::Log, base.clone())),
                    )),
                    Box::new(Expr::Div(
                        Box::new(Expr::Mul(exp.clone(), Box::new(base.diff(var)))),
                        base.clone(),
                    )),
                )),
            ),
            Expr::Func(kind, arg) => {
                let inner = arg.diff(var);
                match kind {
                    FunctionKind::Sin => Expr::Mul(
                        Box::new(Expr::Func(FunctionKind::Cos, arg.clone())),
                        Box::new(inner),
                    ),
                    FunctionKind::Cos => Expr::Mul(
                        Box::new(Expr::Mul(
                            Box::new(Expr::Const(-1.0)),
                            Box::new(Expr::Func(FunctionKind::Sin, arg.clone())),
                        )),
                        Box::new(inner),
                    ),
                    // sec**2 written as 1/cos**2
                    FunctionKind::Tan => Expr::Mul(
                        Box::new(Expr::Div(
                            Box::new(Expr::Const(1.0)),
                            Box::new(Expr::Pow(
                                Box::new(Expr::Func(FunctionKind::Cos, arg.clone())),
                                Box::new(Expr::Const(2.0)),
                            )),
                        )),
                        Box::new(inner),
                    ),
                    FunctionKind::Exp => Expr::Mul(Box::new(self.clone()), Box::new(inner)),
                    FunctionKind::Log => Expr::Div(Box::new(inner), arg.clone()),
                    FunctionKind::Sqrt => Expr::Div(
                        Box::new(inner),
                        Box::new(Expr::Mul(Box::new(Expr::Const(2.0)), Box::new(self.clone()))),
                    ),
                }
            }
        }
    } // end of diff

    /// Every derivative from order 1 to `n` as `(raw, simplified)` pairs.
    ///
    /// Each step differentiates the simplified result of the previous one.
    pub fn derivative_chain(&self, var_name: &str, n: usize) -> Vec<(Expr, Expr)> {
        let mut chain = Vec::with_capacity(n);
        let mut expr = self.clone();
        for _ in 0..n {
            let raw = expr.diff(var_name);
            let simplified = raw.simplify();
            chain.push((raw, simplified.clone()));
            expr = simplified;
        }
        chain
    }

    /// Computes the nth derivative, simplifying after every differentiation.
    /// `n = 0` returns the simplified expression itself.
    pub fn n_th_derivative(&self, var_name: &str, n: usize) -> Expr {
        match self.derivative_chain(var_name, n).pop() {
            Some((_, simplified)) => simplified,
            None => self.simplify(),
        }
    }

    /// first partial derivatives with respect to each of `all_vars`, simplified
    pub fn diff_multi_args(&self, all_vars: &[&str]) -> Vec<Expr> {
        all_vars.iter().map(|var| self.diff(var).simplify()).collect()
    }

    /// First sub-expression whose denominator (or base of a negative power) is
    /// structurally zero once simplified.
    pub fn find_division_by_zero(&self) -> Option<Expr> {
        match self {
            Expr::Var(_) | Expr::Const(_) => None,
            Expr::Div(num, den) => {
                if den.simplify().is_zero() {
                    return Some(self.clone());
                }
                num.find_division_by_zero().or_else(|| den.find_division_by_zero())
            }
            Expr::Pow(base, exp) => {
                let negative_exp = matches!(exp.simplify(), Expr::Const(n) if n < 0.0);
                if negative_exp && base.simplify().is_zero() {
                    return Some(self.clone());
                }
                base.find_division_by_zero().or_else(|| exp.find_division_by_zero())
            }
            Expr::Add(lhs, rhs) | Expr::Sub(lhs, rhs) | Expr::Mul(lhs, rhs) => {
                lhs.find_division_by_zero().or_else(|| rhs.find_division_by_zero())
            }
            Expr::Func(_, arg) => arg.find_division_by_zero(),
        }
    }

    /// first constant in the tree that is inf or NaN
    pub fn non_finite_constant(&self) -> Option<f64> {
        match self {
            Expr::Const(c) if !c.is_finite() => Some(*c),
            Expr::Var(_) | Expr::Const(_) => None,
            Expr::Add(lhs, rhs)
            | Expr::Sub(lhs, rhs)
            | Expr::Mul(lhs, rhs)
            | Expr::Div(lhs, rhs)
            | Expr::Pow(lhs, rhs) => lhs.non_finite_constant().or_else(|| rhs.non_finite_constant()),
            Expr::Func(_, arg) => arg.non_finite_constant(),
        }
    }

    /// Evaluates the expression with `values[i]` substituted for `vars[i]`.
    ///
    /// # Performance
    /// Use lambdify() for repeated evaluation, eval_expression() for one-time use
    pub fn eval_expression(&self, vars: &[&str], values: &[f64]) -> Result<f64, ComputationError> {
        let value = match self {
            Expr::Var(name) => {
                let index = vars
                    .iter()
                    .position(|&x| x == name)
                    .filter(|&i| i < values.len())
                    .ok_or_else(|| ComputationError::UnknownVariable(name.clone()))?;
                values[index]
            }
            Expr::Const(val) => *val,
            Expr::Add(lhs, rhs) => lhs.eval_expression(vars, values)? + rhs.eval_expression(vars, values)?,
            Expr::Sub(lhs, rhs) => lhs.eval_expression(vars, values)? - rhs.eval_expression(vars, values)?,
            Expr::Mul(lhs, rhs) => lhs.eval_expression(vars, values)? * rhs.eval_expression(vars, values)?,
            Expr::Div(lhs, rhs) => lhs.eval_expression(vars, values)? / rhs.eval_expression(vars, values)?,
            Expr::Pow(base, exp) => {
                base.eval_expression(vars, values)?.powf(exp.eval_expression(vars, values)?)
            }
            Expr::Func(kind, arg) => kind.apply(arg.eval_expression(vars, values)?),
        };
        Ok(value)
    }
}
