use crate::calculus::derivative_steps::{narrate_chain, narrate_partial};
use crate::calculus::models::{DerivativeResult, Expression, PartialDerivativeResult};
use crate::errors::{ComputationError, ParseError};
use crate::symbolic::symbolic_engine::{Expr, is_valid_identifier};
use log::{debug, info};
use std::collections::HashMap;

/// Builds an [`Expression`] from user text and the variables the user declared.
pub fn parse(raw_text: &str, declared_variables: &[&str]) -> Result<Expression, ParseError> {
    let expression = Expression::new(raw_text, declared_variables)?;
    debug!("parsed '{}' with variables {:?}", raw_text, expression.variables());
    Ok(expression)
}

/// rejects trees that divide by a structural zero
fn check_tree(tree: &Expr) -> Result<(), ComputationError> {
    if let Some(division) = tree.find_division_by_zero() {
        return Err(ComputationError::DivisionByZero(division.to_string()));
    }
    if tree.non_finite_constant().is_some() {
        return Err(ComputationError::NonFinite(tree.to_string()));
    }
    Ok(())
}

fn check_result(derivative: &Expr) -> Result<(), ComputationError> {
    match derivative.non_finite_constant() {
        Some(_) => Err(ComputationError::NonFinite(derivative.to_string())),
        None => Ok(()),
    }
}

/// `order`-th derivative of `expression` with respect to `variable`, with steps.
///
/// The variable does not have to occur in the expression, the derivative is 0 then.
/// # Examples
/// ```
/// use derivata::calculus::derivative_service::{differentiate, parse};
/// let expression = parse("x**3 + 2*x", &["x"]).unwrap();
/// let second = differentiate(&expression, "x", 2).unwrap();
/// assert_eq!(second.result.to_string(), "6*x");
/// ```
pub fn differentiate(
    expression: &Expression,
    variable: &str,
    order: usize,
) -> Result<DerivativeResult, ComputationError> {
    if order == 0 {
        return Err(ComputationError::InvalidOrder(order));
    }
    if !is_valid_identifier(variable) {
        return Err(ComputationError::InvalidVariable(variable.to_string()));
    }
    let tree = expression.tree()?;
    check_tree(&tree)?;
    let chain = tree.derivative_chain(variable, order);
    for (_, simplified) in &chain {
        check_result(simplified)?;
    }
    let (unsimplified, result) = match chain.last() {
        Some((raw, simplified)) => (raw.clone(), simplified.clone()),
        None => return Err(ComputationError::InvalidOrder(order)),
    };
    let steps = narrate_chain(&tree, variable, &chain);
    info!(
        "d^{}/d{}^{} of {} = {}",
        order, variable, order, expression, result
    );
    Ok(DerivativeResult {
        expression: expression.clone(),
        variable: variable.to_string(),
        order,
        result,
        unsimplified,
        steps,
    })
}

/// First partial derivatives with respect to every variable of `expression`.
pub fn partial_differentiate(expression: &Expression) -> Result<PartialDerivativeResult, ComputationError> {
    let tree = expression.tree()?;
    check_tree(&tree)?;
    let mut derivatives = HashMap::new();
    let mut steps = HashMap::new();
    for var in expression.variables() {
        let derivative = tree.diff(var).simplify();
        check_result(&derivative)?;
        info!("∂/∂{} of {} = {}", var, expression, derivative);
        derivatives.insert(var.clone(), derivative);
        steps.insert(var.clone(), narrate_partial(&tree, var));
    }
    Ok(PartialDerivativeResult {
        expression: expression.clone(),
        variables: expression.variables().to_vec(),
        derivatives,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse() {
        assert!(parse("x**2 + 3*x + 1", &["x"]).is_ok());
        let err = parse("x +* y", &["x", "y"]).unwrap_err();
        assert_eq!(err.text, "x +* y");
        assert!(parse("x^2", &["x"]).is_err());
        assert!(parse("2x", &["x"]).is_err());
        assert!(parse("sinh(x)", &["x"]).is_err());
    }

    #[test]
    fn test_trigonometric_derivatives() {
        let expression = parse("sin(x)", &["x"]).unwrap();
        let result = differentiate(&expression, "x", 1).unwrap();
        assert_eq!(result.result, Expr::parse_expression("cos(x)").unwrap());
        let expression = parse("cos(x)", &["x"]).unwrap();
        let result = differentiate(&expression, "x", 1).unwrap();
        assert_eq!(result.result.to_string(), "-sin(x)");
        assert_eq!(result.steps.last().unwrap(), "Final result: -sin(x)");
    }

    #[test]
    fn test_latex_rendering() {
        let expression = parse("x**3", &["x"]).unwrap();
        let second = differentiate(&expression, "x", 2).unwrap();
        assert_eq!(second.latex(), "6 x");
        assert_eq!(second.equation_latex(), r"\frac{d^{2}}{dx^{2}}\left(x^{3}\right) = 6 x");
        let expression = parse("cos(x)", &["x"]).unwrap();
        let first = differentiate(&expression, "x", 1).unwrap();
        assert_eq!(first.latex(), r"-\sin{\left(x\right)}");
        assert_eq!(
            first.equation_latex(),
            r"\frac{d}{dx}\left(\cos{\left(x\right)}\right) = -\sin{\left(x\right)}"
        );
    }

    #[test]
    fn test_invalid_requests() {
        let expression = parse("x**2", &["x"]).unwrap();
        assert_eq!(
            differentiate(&expression, "x", 0).unwrap_err(),
            ComputationError::InvalidOrder(0)
        );
        assert!(matches!(
            differentiate(&expression, "1x", 1),
            Err(ComputationError::InvalidVariable(_))
        ));
        assert!(matches!(
            differentiate(&expression, "log", 1),
            Err(ComputationError::InvalidVariable(_))
        ));
        let expression = parse("1/(x - x) + x", &["x"]).unwrap();
        assert!(matches!(
            differentiate(&expression, "x", 1),
            Err(ComputationError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_absent_variable() {
        let expression = parse("x**2 + 1", &["x"]).unwrap();
        let result = differentiate(&expression, "t", 2).unwrap();
        assert_eq!(result.result, Expr::Const(0.0));
        assert_eq!(result.order, 2);
        assert_eq!(result.variable, "t");
    }

    #[test]
    fn test_polynomial_vanishes_after_degree() {
        let expression = parse("4*x**3 - x**2 + 7", &["x"]).unwrap();
        assert_eq!(differentiate(&expression, "x", 4).unwrap().result, Expr::Const(0.0));
        assert_eq!(differentiate(&expression, "x", 3).unwrap().result, Expr::Const(24.0));
    }

    #[test]
    fn test_orders_compose() {
        let expression = parse("x**2*exp(x) + sin(3*x)", &["x"]).unwrap();
        let direct = differentiate(&expression, "x", 3).unwrap().result;
        let first = differentiate(&expression, "x", 1).unwrap().result;
        let first = parse(&first.to_string(), &["x"]).unwrap();
        let composed = differentiate(&first, "x", 2).unwrap().result;
        for point in [-0.7, 0.0, 1.3] {
            assert_relative_eq!(
                direct.eval_expression(&["x"], &[point]).unwrap(),
                composed.eval_expression(&["x"], &[point]).unwrap(),
                epsilon = 1e-9,
                max_relative = 1e-9
            );
        }
    }

    #[test]
    fn test_partial_derivatives() {
        let expression = parse("x**2 + x*y + y**2", &["x", "y"]).unwrap();
        let result = partial_differentiate(&expression).unwrap();
        assert_eq!(result.variables, vec!["x", "y"]);
        assert_eq!(result.derivatives.len(), 2);
        let grad = result.gradient();
        assert_eq!(grad[0], Expr::parse_expression("2*x + y").unwrap().simplify());
        assert_eq!(grad[1], Expr::parse_expression("x + 2*y").unwrap().simplify());
        assert!(result.steps["y"].contains(&"Step 2: variables held constant: x".to_string()));
        let hessian = result.hessian();
        assert_eq!(hessian[0][0], Expr::Const(2.0));
        assert_eq!(hessian[0][1], Expr::Const(1.0));
        assert_eq!(hessian[1][1], Expr::Const(2.0));
    }

    #[test]
    fn test_result_reparses() {
        let expression = parse("x**3*log(x) - sqrt(x)/x", &["x"]).unwrap();
        let result = differentiate(&expression, "x", 1).unwrap();
        let reparsed = Expr::parse_expression(&result.result.to_string()).unwrap();
        assert_relative_eq!(
            reparsed.eval_expression(&["x"], &[1.7]).unwrap(),
            result.result.eval_expression(&["x"], &[1.7]).unwrap(),
            epsilon = 1e-12
        );
    }
}
