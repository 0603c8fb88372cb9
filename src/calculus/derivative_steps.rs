//! Human readable derivation traces.
//!
//! The narration only describes the derivative: it recomputes whatever it shows
//! and nothing here feeds back into the results of the derivative service.
use crate::calculus::models::Expression;
use crate::symbolic::symbolic_engine::{Expr, FunctionKind};
use crate::symbolic::symbolic_simplify::{flatten_mul, product_of, sum_of};
use log::warn;
use strum_macros::{AsRefStr, Display};

/// shown instead of the geometric interpretation when it cannot be produced
pub const INTERPRETATION_PLACEHOLDER: &str = "Could not generate the geometric interpretation.";

/// Shape categories checked in declaration order, the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ExpressionShape {
    Polynomial,
    Trigonometric,
    Exponential,
    Logarithmic,
    Product,
    Rational,
    General,
}

impl ExpressionShape {
    pub fn classify(tree: &Expr, variable: &str) -> Self {
        if tree.is_polynomial_in(variable) {
            ExpressionShape::Polynomial
        } else if tree.contains_function(FunctionKind::Sin) || tree.contains_function(FunctionKind::Cos) {
            ExpressionShape::Trigonometric
        } else if tree.contains_function(FunctionKind::Exp) {
            ExpressionShape::Exponential
        } else if tree.contains_function(FunctionKind::Log) {
            ExpressionShape::Logarithmic
        } else if matches!(tree, Expr::Mul(_, _)) {
            ExpressionShape::Product
        } else if rational_parts(tree, variable).is_some() {
            ExpressionShape::Rational
        } else {
            ExpressionShape::General
        }
    }
}

/// numerator and denominator when both are polynomials in `variable`
fn rational_parts(tree: &Expr, variable: &str) -> Option<(Expr, Expr)> {
    match tree {
        Expr::Div(num, den) if num.is_polynomial_in(variable) && den.is_polynomial_in(variable) => {
            Some((num.as_ref().clone(), den.as_ref().clone()))
        }
        Expr::Pow(base, exp) => match exp.as_ref() {
            Expr::Const(n) if *n < 0.0 && n.fract() == 0.0 && base.is_polynomial_in(variable) => Some((
                Expr::Const(1.0),
                Expr::Pow(base.clone(), Box::new(Expr::Const(-n))).simplify(),
            )),
            _ => None,
        },
        _ => None,
    }
}

/// function nodes whose argument is not a bare variable
fn compositions(tree: &Expr) -> Vec<String> {
    tree.function_arguments()
        .into_iter()
        .filter(|(_, arg)| !matches!(arg, Expr::Var(_)))
        .map(|(kind, arg)| format!("{}({})", kind, arg))
        .collect()
}

fn chain_rule_step(tree: &Expr, step: usize) -> Option<String> {
    let composed = compositions(tree);
    if composed.is_empty() {
        None
    } else {
        Some(format!(
            "Step {}: apply the chain rule to the compositions: {}",
            step,
            composed.join(", ")
        ))
    }
}

fn functions_of_kind(tree: &Expr, kinds: &[FunctionKind]) -> String {
    let mut found: Vec<String> = Vec::new();
    for (kind, arg) in tree.function_arguments() {
        let printed = format!("{}({})", kind, arg);
        if kinds.contains(&kind) && !found.contains(&printed) {
            found.push(printed);
        }
    }
    found.join(", ")
}

/// rule specific lines for the shape of `tree`
fn shape_steps(tree: &Expr, variable: &str) -> Vec<String> {
    let v = variable;
    let mut steps = Vec::new();
    match ExpressionShape::classify(tree, variable) {
        ExpressionShape::Polynomial => {
            steps.push("Applying the rules for polynomials:".to_string());
            let Some(mut terms) = tree.expanded_terms() else {
                steps.push(format!(
                    "Step 1: the expanded form has too many terms to list, apply the power rule \
                     d/d{v}({v}^n) = n·{v}^(n-1) and the chain rule to the powers of sums"
                ));
                return steps;
            };
            // descending degree, stable for terms of equal degree
            terms.sort_by_key(|term| std::cmp::Reverse(term.degree_in(variable).unwrap_or(0)));
            steps.push(format!("Step 1: expand the expression: {}", sum_display(&terms)));
            steps.push(format!(
                "Step 2: differentiate each term separately (power rule d/d{v}({v}^n) = n·{v}^(n-1)):"
            ));
            for term in &terms {
                steps.push(format!("  d/d{}({}) = {}", v, term, term.diff(variable).simplify()));
            }
            steps.push("Step 3: add up the derivatives of the terms".to_string());
        }
        ExpressionShape::Trigonometric => {
            steps.push("Applying the rules for trigonometric functions:".to_string());
            steps.push(format!(
                "Step 1: identify the trigonometric functions in the expression: {}",
                functions_of_kind(tree, &[FunctionKind::Sin, FunctionKind::Cos, FunctionKind::Tan])
            ));
            steps.push("Step 2: apply the differentiation rules:".to_string());
            steps.push(format!("  • d/d{v}(sin({v})) = cos({v})"));
            steps.push(format!("  • d/d{v}(cos({v})) = -sin({v})"));
            steps.push(format!("  • d/d{v}(tan({v})) = sec²({v})"));
            steps.extend(chain_rule_step(tree, 3));
        }
        ExpressionShape::Exponential => {
            steps.push("Applying the rules for exponential functions:".to_string());
            steps.push(format!(
                "Step 1: identify the exponential functions in the expression: {}",
                functions_of_kind(tree, &[FunctionKind::Exp])
            ));
            steps.push(format!("Step 2: apply the rule: d/d{v}(e^u) = e^u · du/d{v}"));
            steps.extend(chain_rule_step(tree, 3));
        }
        ExpressionShape::Logarithmic => {
            steps.push("Applying the rules for logarithmic functions:".to_string());
            steps.push(format!(
                "Step 1: identify the logarithmic functions in the expression: {}",
                functions_of_kind(tree, &[FunctionKind::Log])
            ));
            steps.push(format!("Step 2: apply the rule: d/d{v}(ln(u)) = (1/u) · du/d{v}"));
            steps.extend(chain_rule_step(tree, 3));
        }
        ExpressionShape::Product => {
            let mut factors = Vec::new();
            flatten_mul(tree, &mut factors);
            let printed: Vec<String> = factors.iter().map(|f| f.to_string()).collect();
            steps.push("Applying the product rule:".to_string());
            steps.push(format!("Step 1: identify the factors: {}", printed.join(", ")));
            steps.push("Step 2: differentiate each factor and multiply by the remaining factors:".to_string());
            for (i, factor) in factors.iter().enumerate() {
                let cofactor = product_of(
                    factors
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, f)| f.clone())
                        .collect(),
                );
                steps.push(format!(
                    "  d/d{}({}) = {}, co-factor: {}",
                    v,
                    factor,
                    factor.diff(variable).simplify(),
                    cofactor
                ));
            }
            steps.push("Step 3: add up the products".to_string());
        }
        ExpressionShape::Rational => {
            if let Some((num, den)) = rational_parts(tree, variable) {
                steps.push("Applying the rules for rational functions:".to_string());
                steps.push(format!("Step 1: identify numerator ({}) and denominator ({})", num, den));
                steps.push("Step 2: apply the quotient rule:".to_string());
                steps.push(format!("  d/d{v}(f/g) = (g·f' - f·g')/g²"));
                steps.push(format!("  f' = {}", num.diff(variable).simplify()));
                steps.push(format!("  g' = {}", den.diff(variable).simplify()));
            }
        }
        ExpressionShape::General => {
            steps.push("Applying the general differentiation rules...".to_string());
        }
    }
    steps
}

fn sum_display(terms: &[Expr]) -> String {
    sum_of(terms.to_vec()).to_string()
}

/// closing lines: the unsimplified derivative when it differs, then the final result
fn final_steps(raw: &Expr, simplified: &Expr) -> Vec<String> {
    let mut steps = Vec::new();
    if raw != simplified {
        steps.push(format!("Result before simplification: {}", raw));
    }
    steps.push(format!("Final result: {}", simplified));
    steps
}

/// Narration of the first derivative of `tree` with respect to `variable`.
pub fn narrate(tree: &Expr, variable: &str) -> Vec<String> {
    narrate_order(tree, variable, 1)
}

/// Narration of the `order`-th derivative; an order of 0 is treated as 1.
pub fn narrate_order(tree: &Expr, variable: &str, order: usize) -> Vec<String> {
    let chain = tree.derivative_chain(variable, order.max(1));
    narrate_chain(tree, variable, &chain)
}

/// Narration for an already computed derivative chain, as returned by
/// [`Expr::derivative_chain`].
pub(crate) fn narrate_chain(tree: &Expr, variable: &str, chain: &[(Expr, Expr)]) -> Vec<String> {
    let mut steps = vec![
        format!("Original expression: {}", tree),
        format!("Differentiating with respect to {}...", variable),
    ];
    steps.extend(shape_steps(tree, variable));
    let Some(((raw, simplified), intermediate)) = chain.split_last() else {
        steps.push(format!("Final result: {}", tree.simplify()));
        return steps;
    };
    if !intermediate.is_empty() {
        steps.push(format!(
            "Differentiating {} times with respect to {}:",
            chain.len(),
            variable
        ));
        for (k, (_, derivative)) in intermediate.iter().enumerate() {
            steps.push(format!("  derivative of order {}: {}", k + 1, derivative));
        }
    }
    steps.extend(final_steps(raw, simplified));
    steps
}

/// Narration of the partial derivative with respect to `variable`, every other
/// symbol of the tree held constant.
pub fn narrate_partial(tree: &Expr, variable: &str) -> Vec<String> {
    let held: Vec<String> = tree
        .variables_in_order()
        .into_iter()
        .filter(|name| name != variable)
        .collect();
    let raw = tree.diff(variable);
    let simplified = raw.simplify();
    let mut steps = vec![
        format!("Original expression: {}", tree),
        format!("Computing the partial derivative with respect to {}...", variable),
        "Step 1: treat all other variables as constants".to_string(),
    ];
    if held.is_empty() {
        steps.push("Step 2: no other variables are held constant".to_string());
    } else {
        steps.push(format!("Step 2: variables held constant: {}", held.join(", ")));
    }
    steps.extend(shape_steps(tree, variable));
    steps.extend(final_steps(&raw, &simplified));
    steps
}

/// Markdown text on the geometric meaning of the partial derivatives of `expression`.
pub fn geometric_interpretation(expression: &Expression) -> String {
    let tree = match expression.tree() {
        Ok(tree) => tree,
        Err(e) => {
            warn!("no geometric interpretation for '{}': {}", expression, e);
            return INTERPRETATION_PLACEHOLDER.to_string();
        }
    };
    let variables = expression.variables();
    if variables.is_empty() {
        return INTERPRETATION_PLACEHOLDER.to_string();
    }
    let mut text = String::from("### Geometric meaning of the partial derivatives\n\n");
    text.push_str(&format!("For the function f({}) = {}:\n\n", variables.join(", "), tree));
    for var in variables {
        let derivative = tree.diff(var).simplify();
        text.push_str(&format!("#### Partial derivative with respect to {}\n\n", var));
        text.push_str(&format!("∂f/∂{} = {}\n\n", var, derivative));
        text.push_str(&format!(
            "This is the instantaneous rate of change of the function when {var} varies and all \
             other variables are held constant. Geometrically it is the slope of the curve cut \
             from the surface of the function by a plane perpendicular to the {var} axis.\n\n"
        ));
    }
    if variables.len() > 1 {
        let components: Vec<String> = variables.iter().map(|v| format!("∂f/∂{}", v)).collect();
        text.push_str("#### Gradient of the function\n\n");
        text.push_str(&format!(
            "The gradient ∇f is the vector of the partial derivatives: ∇f = ({})\n\n",
            components.join(", ")
        ));
        text.push_str("It has two important properties:\n");
        text.push_str("1. It points in the direction of greatest increase of the function\n");
        text.push_str("2. It is perpendicular to the level curves (surfaces) of the function\n\n");
        text.push_str("The magnitude |∇f| is the rate of that increase.\n");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Expr {
        Expr::parse_expression(text).unwrap()
    }

    #[test]
    fn test_shape_precedence() {
        let cases = [
            ("x**2 + 3*x + 1", ExpressionShape::Polynomial),
            ("x*sin(y)", ExpressionShape::Polynomial),
            ("sin(x)*exp(x)", ExpressionShape::Trigonometric),
            ("exp(x)*log(x)", ExpressionShape::Exponential),
            ("log(x**2 + 1)", ExpressionShape::Logarithmic),
            ("x*sqrt(x)", ExpressionShape::Product),
            ("(x + 1)/(x - 1)", ExpressionShape::Rational),
            ("(x + 1)**(-2)", ExpressionShape::Rational),
            ("sqrt(x)", ExpressionShape::General),
            ("tan(x)", ExpressionShape::General),
        ];
        for (text, shape) in cases {
            assert_eq!(ExpressionShape::classify(&parse(text), "x"), shape, "{}", text);
        }
    }

    #[test]
    fn test_polynomial_narration() {
        let steps = narrate(&parse("3*x + x**3 + 1"), "x");
        assert_eq!(steps[0], "Original expression: 3*x + x**3 + 1");
        assert_eq!(steps[1], "Differentiating with respect to x...");
        assert_eq!(steps[2], "Applying the rules for polynomials:");
        let first_term = steps.iter().position(|s| s.starts_with("  d/dx(x**3)")).unwrap();
        let second_term = steps.iter().position(|s| s.starts_with("  d/dx(3*x)")).unwrap();
        assert!(first_term < second_term);
        assert!(steps.contains(&"  d/dx(x**3) = 3*x**2".to_string()));
        assert!(steps.contains(&"Step 3: add up the derivatives of the terms".to_string()));
    }

    #[test]
    fn test_large_power_of_sum_is_not_expanded() {
        let started = std::time::Instant::now();
        let tree = parse("(x + y + z + w)**12");
        let steps = narrate(&tree, "x");
        assert!(steps.iter().any(|s| s.contains("too many terms to list")));
        assert_eq!(steps.last().unwrap(), &format!("Final result: {}", tree.diff("x").simplify()));
        let steps = narrate(&parse("(x + y + z)**11"), "x");
        assert!(steps.contains(&"  d/dx(x**11) = 11*x**10".to_string()));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_composition_flag() {
        let steps = narrate(&parse("sin(x**2)"), "x");
        assert!(steps.iter().any(|s| s.starts_with("Step 3: apply the chain rule")));
        assert!(steps.contains(&"  • d/dx(sin(x)) = cos(x)".to_string()));
        let steps = narrate(&parse("sin(x)"), "x");
        assert!(!steps.iter().any(|s| s.contains("chain rule")));
        let steps = narrate(&parse("exp(2*x)"), "x");
        assert!(steps.iter().any(|s| s.contains("chain rule")));
        let steps = narrate(&parse("log(x)"), "x");
        assert!(steps.contains(&"Step 2: apply the rule: d/dx(ln(u)) = (1/u) · du/dx".to_string()));
        assert!(!steps.iter().any(|s| s.contains("chain rule")));
    }

    #[test]
    fn test_product_and_rational_narration() {
        let steps = narrate(&parse("x*sqrt(x)"), "x");
        assert!(steps.contains(&"Step 1: identify the factors: x, sqrt(x)".to_string()));
        assert!(steps.iter().any(|s| s.starts_with("  d/dx(x) = 1, co-factor: sqrt(x)")));
        let steps = narrate(&parse("(x + 1)/(x - 1)"), "x");
        assert!(steps.contains(&"Step 1: identify numerator (x + 1) and denominator (x - 1)".to_string()));
        assert!(steps.contains(&"  g' = 1".to_string()));
    }

    #[test]
    fn test_final_step_states_result() {
        for text in ["x**2", "sin(x)*cos(x)", "sqrt(x)", "x**x"] {
            let tree = parse(text);
            let steps = narrate(&tree, "x");
            let result = tree.diff("x").simplify();
            assert_eq!(steps.last().unwrap(), &format!("Final result: {}", result));
        }
        let steps = narrate(&parse("5"), "x");
        assert_eq!(steps.last().unwrap(), "Final result: 0");
    }

    #[test]
    fn test_higher_order_narration() {
        let steps = narrate_order(&parse("x**3"), "x", 3);
        assert!(steps.contains(&"  derivative of order 1: 3*x**2".to_string()));
        assert!(steps.contains(&"  derivative of order 2: 6*x".to_string()));
        assert_eq!(steps.last().unwrap(), "Final result: 6");
    }

    #[test]
    fn test_partial_narration() {
        let steps = narrate_partial(&parse("x**2*y + z"), "y");
        assert!(steps.contains(&"Step 1: treat all other variables as constants".to_string()));
        assert!(steps.contains(&"Step 2: variables held constant: x, z".to_string()));
        assert_eq!(steps.last().unwrap(), "Final result: x**2");
    }

    #[test]
    fn test_geometric_interpretation() {
        let expression = Expression::new("x**2 + y**2", &["x", "y"]).unwrap();
        let text = geometric_interpretation(&expression);
        assert!(text.starts_with("### Geometric meaning of the partial derivatives"));
        assert!(text.contains("#### Partial derivative with respect to y"));
        assert!(text.contains("∂f/∂x = 2*x"));
        assert!(text.contains("#### Gradient of the function"));
        let expression = Expression::new("x**2", &["x"]).unwrap();
        assert!(!geometric_interpretation(&expression).contains("Gradient"));
    }
}
