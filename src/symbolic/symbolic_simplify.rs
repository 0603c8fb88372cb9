//! # Symbolic Expression Simplification Module
//!
//! Rewrite-rule simplifier for symbolic expressions:
//!
//! 1. **Constant Folding**: arithmetic on numerical constants (only when the result is finite)
//! 2. **Algebraic Identities**: `x + 0 = x`, `x * 1 = x`, `x ** 1 = x`, `exp(0) = 1`, ...
//! 3. **Polynomial Term Collection**: `3*x + 2*x = 5*x`
//! 4. **Subtraction Normalization**: `a - b = a + (-1)*b`, so simplified trees contain no `Sub`
//!
//! Simplification is partial: two equal expressions are not guaranteed to reach the same form.
//!
//! The module also provides polynomial analysis used by step narration and by the
//! critical point solver: expansion into monomials, polynomial detection and
//! coefficient extraction.

use crate::symbolic::symbolic_engine::{Expr, FunctionKind};
use std::collections::BTreeMap;

/// largest integer power of a sum that `expand` multiplies out
const MAX_EXPANSION_POWER: f64 = 12.0;
/// largest number of products formed by a single multiplication during expansion
const MAX_EXPANSION_TERMS: usize = 512;

fn is_integer(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

/// folded constant, or `None` when folding would produce inf/NaN
fn fold(value: f64) -> Option<Expr> {
    if value.is_finite() {
        Some(Expr::Const(value))
    } else {
        None
    }
}

impl Expr {
    //___________________________________SIMPLIFICATION____________________________________

    /// Simplifies expressions by evaluating constant arithmetic operations only.
    pub fn simplify_numbers(&self) -> Expr {
        let folded = self.map_children(|child| child.simplify_numbers());
        let value = match &folded {
            Expr::Add(lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
                (Expr::Const(a), Expr::Const(b)) => fold(a + b),
                _ => None,
            },
            Expr::Sub(lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
                (Expr::Const(a), Expr::Const(b)) => fold(a - b),
                _ => None,
            },
            Expr::Mul(lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
                (Expr::Const(a), Expr::Const(b)) => fold(a * b),
                _ => None,
            },
            Expr::Div(lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
                (Expr::Const(a), Expr::Const(b)) if *b != 0.0 => fold(a / b),
                _ => None,
            },
            Expr::Pow(base, exp) => match (base.as_ref(), exp.as_ref()) {
                (Expr::Const(a), Expr::Const(b)) => fold(a.powf(*b)),
                _ => None,
            },
            _ => None,
        };
        value.unwrap_or(folded)
    }

    /// Algebraic simplification using constant folding, identities and like-term collection.
    ///
    /// ### Additive Identities
    /// - `x + 0 = x`, `0 + x = x`, `x - 0 = x`, `x - x = 0`, `x + x = 2*x`
    ///
    /// ### Multiplicative Identities
    /// - `x * 1 = x`, `x * 0 = 0`, `(c1 * x) * c2 = (c1*c2) * x`, `x * c = c * x`
    ///
    /// ### Power Rules
    /// - `x**0 = 1`, `x**1 = x`, `1**x = 1`, `x**a * x**b = x**(a+b)`, `(x**a)**n = x**(a*n)` for integer `n`
    ///
    /// ### Functions
    /// - `exp(0) = 1`, `log(1) = 0`, `sin(0) = 0`, `cos(0) = 1`, `tan(0) = 0`, `sqrt(0) = 0`, `sqrt(1) = 1`
    pub fn simplify_(&self) -> Expr {
        match self {
            Expr::Var(_) => self.clone(),
            Expr::Const(_) => self.clone(),
            Expr::Add(lhs, rhs) => {
                let lhs = lhs.simplify_();
                let rhs = rhs.simplify_();
                Self::simplify_sum(lhs, rhs)
            }
            Expr::Sub(lhs, rhs) => {
                let lhs = lhs.simplify_();
                let rhs = rhs.simplify_();
                match (&lhs, &rhs) {
                    (Expr::Const(a), Expr::Const(b)) if (a - b).is_finite() => Expr::Const(a - b),
                    (_, Expr::Const(0.0)) => lhs,
                    _ if lhs == rhs => Expr::Const(0.0),
                    _ => {
                        // a - b = a + (-1)*b
                        let neg_rhs = Expr::Mul(Box::new(Expr::Const(-1.0)), Box::new(rhs)).simplify_();
                        Self::simplify_sum(lhs, neg_rhs)
                    }
                }
            }
            Expr::Mul(lhs, rhs) => {
                let lhs = lhs.simplify_();
                let rhs = rhs.simplify_();
                Self::simplify_product(lhs, rhs)
            }
            Expr::Div(lhs, rhs) => {
                let lhs = lhs.simplify_();
                let rhs = rhs.simplify_();
                Self::simplify_quotient(lhs, rhs)
            }
            Expr::Pow(base, exp) => {
                let base = base.simplify_();
                let exp = exp.simplify_();
                match (&base, &exp) {
                    (Expr::Const(a), Expr::Const(b)) if a.powf(*b).is_finite() => {
                        Expr::Const(a.powf(*b))
                    }
                    (_, Expr::Const(0.0)) => Expr::Const(1.0),
                    (_, Expr::Const(1.0)) => base,
                    (Expr::Const(0.0), Expr::Const(b)) if *b > 0.0 => Expr::Const(0.0),
                    (Expr::Const(1.0), _) => Expr::Const(1.0),
                    // (x**a)**n = x**(a*n) for integer n
                    (Expr::Pow(inner_base, inner_exp), Expr::Const(n)) if is_integer(*n) => {
                        let new_exp = Expr::Mul(inner_exp.clone(), Box::new(exp.clone())).simplify_();
                        Expr::Pow(inner_base.clone(), Box::new(new_exp)).simplify_()
                    }
                    _ => Expr::Pow(Box::new(base), Box::new(exp)),
                }
            }
            Expr::Func(kind, arg) => {
                let arg = arg.simplify_();
                match (kind, &arg) {
                    (FunctionKind::Exp, Expr::Const(0.0)) => Expr::Const(1.0),
                    (FunctionKind::Log, Expr::Const(1.0)) => Expr::Const(0.0),
                    (FunctionKind::Sin, Expr::Const(0.0)) => Expr::Const(0.0),
                    (FunctionKind::Cos, Expr::Const(0.0)) => Expr::Const(1.0),
                    (FunctionKind::Tan, Expr::Const(0.0)) => Expr::Const(0.0),
                    (FunctionKind::Sqrt, Expr::Const(0.0)) => Expr::Const(0.0),
                    (FunctionKind::Sqrt, Expr::Const(1.0)) => Expr::Const(1.0),
                    // log(exp(u)) = u
                    (FunctionKind::Log, Expr::Func(FunctionKind::Exp, inner)) => inner.as_ref().clone(),
                    _ => Expr::Func(*kind, Box::new(arg)),
                }
            }
        }
    }

    fn simplify_sum(lhs: Expr, rhs: Expr) -> Expr {
        match (&lhs, &rhs) {
            (Expr::Const(a), Expr::Const(b)) if (a + b).is_finite() => Expr::Const(a + b),
            (Expr::Const(0.0), _) => rhs,
            (_, Expr::Const(0.0)) => lhs,
            _ if lhs == rhs => Expr::Mul(Box::new(Expr::Const(2.0)), Box::new(lhs)).simplify_(),
            _ if lhs.as_negation() == Some(&rhs) || rhs.as_negation() == Some(&lhs) => {
                Expr::Const(0.0)
            }
            _ => {
                let expr = Expr::Add(Box::new(lhs), Box::new(rhs));
                Self::simplify_polynomial(&expr).unwrap_or(expr)
            }
        }
    }

    fn simplify_product(lhs: Expr, rhs: Expr) -> Expr {
        match (&lhs, &rhs) {
            (Expr::Const(a), Expr::Const(b)) if (a * b).is_finite() => Expr::Const(a * b),
            (Expr::Const(0.0), _) | (_, Expr::Const(0.0)) => Expr::Const(0.0),
            (Expr::Const(1.0), _) => rhs,
            (_, Expr::Const(1.0)) => lhs,
            // x**a * x**b = x**(a+b)
            (Expr::Pow(base1, exp1), Expr::Pow(base2, exp2)) if base1 == base2 => {
                let new_exp = Expr::Add(exp1.clone(), exp2.clone()).simplify_();
                Expr::Pow(base1.clone(), Box::new(new_exp)).simplify_()
            }
            (Expr::Var(_), Expr::Pow(base, exp)) | (Expr::Pow(base, exp), Expr::Var(_))
                if matches!(base.as_ref(), Expr::Var(_))
                    && (base.as_ref() == &lhs || base.as_ref() == &rhs) =>
            {
                let new_exp = Expr::Add(Box::new(Expr::Const(1.0)), exp.clone()).simplify_();
                Expr::Pow(base.clone(), Box::new(new_exp)).simplify_()
            }
            (Expr::Var(v1), Expr::Var(v2)) if v1 == v2 => {
                Expr::Pow(Box::new(lhs.clone()), Box::new(Expr::Const(2.0)))
            }
            // (c1 * expr) * c2 = (c1 * c2) * expr
            (Expr::Mul(inner_lhs, inner_rhs), Expr::Const(c))
            | (Expr::Const(c), Expr::Mul(inner_lhs, inner_rhs)) => {
                match (inner_lhs.as_ref(), inner_rhs.as_ref()) {
                    (Expr::Const(c1), other) | (other, Expr::Const(c1)) => {
                        Self::simplify_product(Expr::Const(c1 * c), other.clone())
                    }
                    _ => Self::constant_first(lhs, rhs),
                }
            }
            // c * (a / b) with constant numerator
            (Expr::Const(c), Expr::Div(num, den)) | (Expr::Div(num, den), Expr::Const(c))
                if matches!(num.as_ref(), Expr::Const(_)) =>
            {
                let Expr::Const(n) = num.as_ref() else {
                    return Self::constant_first(lhs, rhs);
                };
                Self::simplify_quotient(Expr::Const(c * n), den.as_ref().clone())
            }
            _ => Self::constant_first(lhs, rhs),
        }
    }

    /// keeps numeric coefficients on the left of a product
    fn constant_first(lhs: Expr, rhs: Expr) -> Expr {
        match (&lhs, &rhs) {
            (Expr::Const(_), _) => Expr::Mul(Box::new(lhs), Box::new(rhs)),
            (_, Expr::Const(_)) => Expr::Mul(Box::new(rhs), Box::new(lhs)),
            _ => Expr::Mul(Box::new(lhs), Box::new(rhs)),
        }
    }

    fn simplify_quotient(lhs: Expr, rhs: Expr) -> Expr {
        match (&lhs, &rhs) {
            (Expr::Const(a), Expr::Const(b)) if *b != 0.0 && (a / b).is_finite() => {
                Expr::Const(a / b)
            }
            (_, Expr::Const(b)) if *b == 0.0 => Expr::Div(Box::new(lhs), Box::new(rhs)),
            (Expr::Const(0.0), _) => Expr::Const(0.0),
            (_, Expr::Const(1.0)) => lhs,
            _ if lhs == rhs => Expr::Const(1.0),
            // x**a / x**b = x**(a-b)
            (Expr::Pow(base1, exp1), Expr::Pow(base2, exp2)) if base1 == base2 => {
                let new_exp = Expr::Sub(exp1.clone(), exp2.clone()).simplify_();
                Expr::Pow(base1.clone(), Box::new(new_exp)).simplify_()
            }
            (Expr::Var(_), Expr::Pow(base, exp)) if base.as_ref() == &lhs => {
                let new_exp = Expr::Sub(Box::new(Expr::Const(1.0)), exp.clone()).simplify_();
                Expr::Pow(base.clone(), Box::new(new_exp)).simplify_()
            }
            (Expr::Pow(base, exp), Expr::Var(_)) if base.as_ref() == &rhs => {
                let new_exp = Expr::Sub(exp.clone(), Box::new(Expr::Const(1.0))).simplify_();
                Expr::Pow(base.clone(), Box::new(new_exp)).simplify_()
            }
            // (c1 * expr) / c2 = (c1/c2) * expr
            (Expr::Mul(inner_lhs, inner_rhs), Expr::Const(c)) => {
                match (inner_lhs.as_ref(), inner_rhs.as_ref()) {
                    (Expr::Const(c1), other) | (other, Expr::Const(c1)) => {
                        Self::simplify_product(Expr::Const(c1 / c), other.clone())
                    }
                    _ => Expr::Div(Box::new(lhs), Box::new(rhs)),
                }
            }
            // expr / c = (1/c) * expr
            (_, Expr::Const(c)) => Self::simplify_product(Expr::Const(1.0 / c), lhs),
            _ => Expr::Div(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Simplify polynomial expressions by collecting like terms.
    ///
    /// Returns `None` if a term is not `coefficient * monomial` or nothing was merged.
    /// Collected terms keep the order of their first occurrence.
    fn simplify_polynomial(expr: &Expr) -> Option<Expr> {
        let mut terms = Vec::new();
        flatten_add(expr, &mut terms);
        if terms.len() < 2 {
            return None;
        }
        let mut monomials = Vec::with_capacity(terms.len());
        for term in &terms {
            monomials.push(extract_monomial(term)?);
        }
        let poly = collect_add_terms(monomials);
        if poly.len() == terms.len() && poly.iter().all(|(_, coeff)| *coeff != 0.0) {
            return None;
        }
        let result_terms: Vec<Expr> = poly
            .into_iter()
            .filter(|(_, coeff)| *coeff != 0.0)
            .map(|(monomial, coeff)| Self::build_monomial_term(&monomial, coeff))
            .collect();
        Some(sum_of(result_terms))
    }

    /// Build a term from monomial key and coefficient: `coeff * x**n * y**m ...`
    fn build_monomial_term(monomial: &MonomialKey, coeff: f64) -> Expr {
        if monomial.0.is_empty() {
            return Expr::Const(coeff);
        }
        let mut factors = Vec::new();
        if coeff != 1.0 {
            factors.push(Expr::Const(coeff));
        }
        for (var, exp) in &monomial.0 {
            let var_expr = Expr::Var(var.clone());
            if *exp == 1 {
                factors.push(var_expr);
            } else if *exp != 0 {
                factors.push(Expr::Pow(Box::new(var_expr), Box::new(Expr::Const(*exp as f64))));
            }
        }
        product_of(factors)
    }

    /// Public interface for expression simplification.
    pub fn simplify(&self) -> Expr {
        self.simplify_()
    }

    //___________________________________POLYNOMIALS____________________________________

    /// true if the expression is a polynomial in `var`; sub-expressions free of `var`
    /// (other symbols, functions of other symbols) count as coefficients
    pub fn is_polynomial_in(&self, var: &str) -> bool {
        if !self.contains_variable(var) {
            return true;
        }
        match self {
            Expr::Var(_) | Expr::Const(_) => true,
            Expr::Add(lhs, rhs) | Expr::Sub(lhs, rhs) | Expr::Mul(lhs, rhs) => {
                lhs.is_polynomial_in(var) && rhs.is_polynomial_in(var)
            }
            Expr::Div(num, den) => num.is_polynomial_in(var) && !den.contains_variable(var),
            Expr::Pow(base, exp) => match exp.as_ref() {
                Expr::Const(n) => is_integer(*n) && *n >= 0.0 && base.is_polynomial_in(var),
                _ => false,
            },
            Expr::Func(_, _) => false,
        }
    }

    /// Multiplies out products of sums and integer powers of sums.
    ///
    /// Returns the list of terms of the expanded sum, like terms collected where all
    /// terms are monomials. `None` when a product would have more than
    /// `MAX_EXPANSION_TERMS` terms.
    pub fn expanded_terms(&self) -> Option<Vec<Expr>> {
        let terms: Vec<Expr> = self
            .expand_terms()?
            .into_iter()
            .map(|term| term.simplify_())
            .filter(|term| !term.is_zero())
            .collect();
        Some(collect_like_terms(terms))
    }

    /// Expanded form as a single expression, the expression itself when it is too large to expand
    pub fn expand(&self) -> Expr {
        match self.expanded_terms() {
            Some(terms) => sum_of(terms),
            None => self.clone(),
        }
    }

    fn expand_terms(&self) -> Option<Vec<Expr>> {
        match self {
            Expr::Add(lhs, rhs) => {
                let mut terms = lhs.expand_terms()?;
                terms.extend(rhs.expand_terms()?);
                Some(terms)
            }
            Expr::Sub(lhs, rhs) => {
                let mut terms = lhs.expand_terms()?;
                terms.extend(rhs.expand_terms()?.into_iter().map(|t| -t));
                Some(terms)
            }
            Expr::Mul(lhs, rhs) => multiply_terms(&lhs.expand_terms()?, &rhs.expand_terms()?),
            Expr::Div(num, den) => Some(
                num.expand_terms()?
                    .into_iter()
                    .map(|t| Expr::Div(Box::new(t), den.clone()))
                    .collect(),
            ),
            Expr::Pow(base, exp) => match exp.as_ref() {
                Expr::Const(n) if is_integer(*n) && *n >= 2.0 && *n <= MAX_EXPANSION_POWER => {
                    let base_terms = base.expand_terms()?;
                    if base_terms.len() < 2 {
                        return Some(vec![self.clone()]);
                    }
                    let mut product = base_terms.clone();
                    for _ in 1..(*n as usize) {
                        product = multiply_terms(&product, &base_terms)?;
                    }
                    Some(product)
                }
                _ => Some(vec![self.clone()]),
            },
            _ => Some(vec![self.clone()]),
        }
    }

    /// exponent of `var` in a term that is a product of factors, `None` if it is not a monomial in `var`
    pub fn degree_in(&self, var: &str) -> Option<i32> {
        if !self.contains_variable(var) {
            return Some(0);
        }
        match self {
            Expr::Var(_) => Some(1),
            Expr::Mul(lhs, rhs) => Some(lhs.degree_in(var)? + rhs.degree_in(var)?),
            Expr::Div(num, den) if !den.contains_variable(var) => num.degree_in(var),
            Expr::Pow(base, exp) => match (base.as_ref(), exp.as_ref()) {
                (Expr::Var(_), Expr::Const(n)) if is_integer(*n) => Some(*n as i32),
                _ => None,
            },
            _ => None,
        }
    }

    /// Coefficients `[a0, a1, ..., an]` of a polynomial in the single variable `var`.
    ///
    /// `None` if the expression contains other variables, negative powers or
    /// non-polynomial parts.
    pub fn polynomial_coefficients(&self, var: &str) -> Option<Vec<f64>> {
        if self.variables_in_order().iter().any(|v| v != var) || !self.is_polynomial_in(var) {
            return None;
        }
        let mut coeffs: Vec<f64> = Vec::new();
        for term in self.expanded_terms()? {
            let (monomial, coeff) = extract_monomial(&term)?;
            let degree = match monomial.0.get(var) {
                Some(d) if *d < 0 => return None,
                Some(d) => *d as usize,
                None => 0,
            };
            if coeffs.len() <= degree {
                coeffs.resize(degree + 1, 0.0);
            }
            coeffs[degree] += coeff;
        }
        while coeffs.len() > 1 && coeffs.last() == Some(&0.0) {
            coeffs.pop();
        }
        if coeffs.is_empty() {
            coeffs.push(0.0);
        }
        Some(coeffs)
    }

    /// true if `var` appears at most linearly in every term and no term couples two variables
    pub fn is_linear_in(&self, vars: &[String]) -> bool {
        if vars.iter().all(|v| !self.contains_variable(v)) {
            return true;
        }
        let Some(terms) = self.expanded_terms() else {
            return false;
        };
        terms.iter().all(|term| match extract_monomial(term) {
            Some((monomial, _)) => {
                let degree: i32 = vars.iter().map(|v| monomial.0.get(v).copied().unwrap_or(0)).sum();
                degree <= 1 && vars.iter().all(|v| monomial.0.get(v).copied().unwrap_or(0) >= 0)
            }
            None => false,
        })
    }
}

/// sum of terms, `0` for an empty list
pub fn sum_of(terms: Vec<Expr>) -> Expr {
    terms
        .into_iter()
        .reduce(|a, b| Expr::Add(Box::new(a), Box::new(b)))
        .unwrap_or(Expr::Const(0.0))
}

/// product of factors, `1` for an empty list
pub fn product_of(factors: Vec<Expr>) -> Expr {
    factors
        .into_iter()
        .reduce(|a, b| Expr::Mul(Box::new(a), Box::new(b)))
        .unwrap_or(Expr::Const(1.0))
}

/// Represents the variable part of a polynomial term (monomial).
///
/// - `x**2` → `MonomialKey({"x": 2})`
/// - `x*y**3` → `MonomialKey({"x": 1, "y": 3})`
/// - `5` (constant) → `MonomialKey({})`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonomialKey(pub BTreeMap<String, i32>);

/// Flatten nested Add/Sub expressions into a list of terms.
///
/// - `a - b` → `[a, -1*b]`
/// - `-1 * (x + y)` → `[-1*x, -1*y]`
pub fn flatten_add(expr: &Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Add(a, b) => {
            flatten_add(a, out);
            flatten_add(b, out);
        }
        Expr::Sub(a, b) => {
            flatten_add(a, out);
            let neg_b = Expr::Mul(Box::new(Expr::Const(-1.0)), b.clone());
            flatten_add(&neg_b, out);
        }
        Expr::Mul(lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
            (Expr::Const(-1.0), Expr::Add(a, b)) | (Expr::Add(a, b), Expr::Const(-1.0)) => {
                flatten_add(&Expr::Mul(Box::new(Expr::Const(-1.0)), a.clone()), out);
                flatten_add(&Expr::Mul(Box::new(Expr::Const(-1.0)), b.clone()), out);
            }
            _ => out.push(expr.clone()),
        },
        _ => out.push(expr.clone()),
    }
}

/// Flatten nested multiplication expressions into a list of factors: `(a * b) * c` → `[a, b, c]`
pub fn flatten_mul(expr: &Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Mul(a, b) => {
            flatten_mul(a, out);
            flatten_mul(b, out);
        }
        _ => out.push(expr.clone()),
    }
}

/// every product of a left and a right term, like terms collected after the multiplication
fn multiply_terms(left: &[Expr], right: &[Expr]) -> Option<Vec<Expr>> {
    if left.len() * right.len() > MAX_EXPANSION_TERMS {
        return None;
    }
    let mut terms = Vec::with_capacity(left.len() * right.len());
    for l in left {
        for r in right {
            terms.push(Expr::Mul(Box::new(l.clone()), Box::new(r.clone())).simplify_());
        }
    }
    Some(collect_like_terms(terms))
}

/// sums the coefficients of equal monomials; terms are returned unchanged if one of them is not a monomial
fn collect_like_terms(terms: Vec<Expr>) -> Vec<Expr> {
    let monomials: Option<Vec<(MonomialKey, f64)>> = terms.iter().map(extract_monomial).collect();
    match monomials {
        Some(monomials) => collect_add_terms(monomials)
            .into_iter()
            .filter(|(_, coeff)| *coeff != 0.0)
            .map(|(monomial, coeff)| Expr::build_monomial_term(&monomial, coeff))
            .collect(),
        None => terms,
    }
}

/// Collect terms into `(monomial, coefficient)` pairs, in order of first occurrence.
fn collect_add_terms(monomials: Vec<(MonomialKey, f64)>) -> Vec<(MonomialKey, f64)> {
    let mut poly: Vec<(MonomialKey, f64)> = Vec::new();
    for (mon, coeff) in monomials {
        match poly.iter_mut().find(|(key, _)| *key == mon) {
            Some((_, total)) => *total += coeff,
            None => poly.push((mon, coeff)),
        }
    }
    poly
}

/// Extract a monomial from a product of constants, variables and integer powers of variables.
/// `None` for anything else.
fn extract_monomial(expr: &Expr) -> Option<(MonomialKey, f64)> {
    match expr {
        Expr::Const(c) => Some((MonomialKey(BTreeMap::new()), *c)),
        Expr::Var(v) => {
            let mut m = BTreeMap::new();
            m.insert(v.clone(), 1);
            Some((MonomialKey(m), 1.0))
        }
        Expr::Mul(_, _) => {
            let mut factors = Vec::new();
            flatten_mul(expr, &mut factors);
            let mut coeff = 1.0;
            let mut map: BTreeMap<String, i32> = BTreeMap::new();
            for f in factors {
                let (mon, c) = extract_monomial(&f)?;
                coeff *= c;
                for (var, exp) in mon.0 {
                    *map.entry(var).or_insert(0) += exp;
                }
            }
            map.retain(|_, exp| *exp != 0);
            Some((MonomialKey(map), coeff))
        }
        Expr::Pow(base, exp) => match (base.as_ref(), exp.as_ref()) {
            (Expr::Var(v), Expr::Const(n)) if is_integer(*n) => {
                let mut m = BTreeMap::new();
                if *n != 0.0 {
                    m.insert(v.clone(), *n as i32);
                }
                Some((MonomialKey(m), 1.0))
            }
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Expr {
        Expr::parse_expression(s).unwrap()
    }

    #[test]
    fn test_constant_folding() {
        assert_eq!(parse("2 + 3*4").simplify(), Expr::Const(14.0));
        assert_eq!(parse("2**3").simplify(), Expr::Const(8.0));
        assert_eq!(parse("(1 + 1)/4").simplify(), Expr::Const(0.5));
    }

    #[test]
    fn test_non_finite_folding_is_skipped() {
        let simplified = parse("1/0").simplify();
        assert_eq!(simplified, parse("1/0"));
        let simplified = parse("(-8)**0.5").simplify();
        assert!(matches!(simplified, Expr::Pow(_, _)));
    }

    #[test]
    fn test_identities() {
        assert_eq!(parse("x + 0").simplify(), parse("x"));
        assert_eq!(parse("1*x*1").simplify(), parse("x"));
        assert_eq!(parse("0*sin(x)").simplify(), Expr::Const(0.0));
        assert_eq!(parse("x**1").simplify(), parse("x"));
        assert_eq!(parse("y**0").simplify(), Expr::Const(1.0));
        assert_eq!(parse("x - x").simplify(), Expr::Const(0.0));
        assert_eq!(parse("cos(0) + exp(0)").simplify(), Expr::Const(2.0));
        assert_eq!(parse("log(exp(x))").simplify(), parse("x"));
    }

    #[test]
    fn test_constants_move_left() {
        assert_eq!(parse("x*2").simplify(), parse("2*x"));
        assert_eq!(parse("(2*x)*3").simplify(), parse("6*x"));
        assert_eq!(parse("x/2").simplify(), parse("0.5*x"));
    }

    #[test]
    fn test_like_terms() {
        assert_eq!(parse("3*x + 2*x").simplify(), parse("5*x"));
        assert_eq!(parse("x*y + 2*y*x").simplify(), parse("3*x*y"));
        assert_eq!(parse("x**2 + 2*x**2 - x**2").simplify(), parse("2*x**2"));
        assert_eq!(parse("(a + b) - (a + b)").simplify(), Expr::Const(0.0));
    }

    #[test]
    fn test_sin_terms_are_combined() {
        assert_eq!(parse("sin(x) + sin(x)").simplify(), parse("2*sin(x)"));
        assert_eq!(parse("sin(x) - sin(x)").simplify(), Expr::Const(0.0));
    }

    #[test]
    fn test_power_rules() {
        assert_eq!(parse("x*x").simplify(), parse("x**2"));
        assert_eq!(parse("x**2*x**3").simplify(), parse("x**5"));
        assert_eq!(parse("x*x**2").simplify(), parse("x**3"));
        assert_eq!(parse("x**3/x").simplify(), parse("x**2"));
        assert_eq!(parse("(x**2)**3").simplify(), parse("x**6"));
    }

    #[test]
    fn test_subtraction_is_normalized() {
        let simplified = parse("x - y").simplify();
        assert_eq!(simplified, Expr::Add(parse("x").boxed(), (-parse("y")).boxed()));
        assert_eq!(simplified.to_string(), "x - y");
    }

    #[test]
    fn test_expand() {
        let terms = parse("(x + 1)**2").expanded_terms().unwrap();
        assert_eq!(terms.len(), 3);
        let expanded = parse("(x + 1)*(x - 1)").expand();
        for x in [-2.0, 0.5, 3.0] {
            let value = expanded.set_variable("x", x).simplify();
            assert_eq!(value, Expr::Const(x * x - 1.0));
        }
    }

    #[test]
    fn test_expansion_collects_and_is_bounded() {
        let started = std::time::Instant::now();
        // (x + y + z)**11 has 78 distinct monomials
        let terms = parse("(x + y + z)**11").expanded_terms().unwrap();
        assert_eq!(terms.len(), 78);
        assert!(terms.contains(&parse("x**11").simplify()));
        // too many products, left unexpanded
        let big = parse("(x + y + z + w)**12");
        assert!(big.expanded_terms().is_none());
        assert_eq!(big.expand(), big);
        assert!(!big.is_linear_in(&["x".to_string()]));
        assert_eq!(parse("(x + 1)**12 + (x + 2)**12 + (x + 3)**12").polynomial_coefficients("x").map(|c| c.len()), Some(13));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_is_polynomial_in() {
        assert!(parse("x**2 + 3*x + 1").is_polynomial_in("x"));
        assert!(parse("x*sin(y) + y**0.5").is_polynomial_in("x"));
        assert!(parse("x/3").is_polynomial_in("x"));
        assert!(!parse("1/x").is_polynomial_in("x"));
        assert!(!parse("x**0.5").is_polynomial_in("x"));
        assert!(!parse("sin(x)").is_polynomial_in("x"));
    }

    #[test]
    fn test_polynomial_coefficients() {
        assert_eq!(
            parse("x**3 - 3*x").polynomial_coefficients("x"),
            Some(vec![0.0, -3.0, 0.0, 1.0])
        );
        assert_eq!(parse("(x - 2)**2").polynomial_coefficients("x"), Some(vec![4.0, -4.0, 1.0]));
        assert_eq!(parse("x*y").polynomial_coefficients("x"), None);
        assert_eq!(parse("exp(x)").polynomial_coefficients("x"), None);
    }

    #[test]
    fn test_is_linear_in() {
        let vars = vec!["x".to_string(), "y".to_string()];
        assert!(parse("2*x + y - 3").is_linear_in(&vars));
        assert!(!parse("x*y").is_linear_in(&vars));
        assert!(!parse("x**2").is_linear_in(&vars));
        assert!(!parse("sin(x)").is_linear_in(&vars));
    }

    #[test]
    fn test_degree_in() {
        assert_eq!(parse("3*x**2*y").degree_in("x"), Some(2));
        assert_eq!(parse("sin(y)").degree_in("x"), Some(0));
        assert_eq!(parse("sin(x)").degree_in("x"), None);
    }
}
