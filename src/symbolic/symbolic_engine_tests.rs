use crate::symbolic::symbolic_engine::{Expr, FunctionKind, is_function_name, is_valid_identifier};
use crate::symbolic::utils::linspace;
use std::collections::HashMap;
//___________________________________TESTS____________________________________

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn x() -> Expr {
        Expr::Var("x".to_string())
    }
    fn y() -> Expr {
        Expr::Var("y".to_string())
    }
    fn parse(text: &str) -> Expr {
        Expr::parse_expression(text).unwrap()
    }

    /// largest gap between d/dx and a central difference on 40 points of [start, end]
    fn central_difference_error(f: &Expr, start: f64, end: f64) -> f64 {
        let derivative = f.diff("x").simplify();
        let h = 1e-6;
        linspace(start, end, 40)
            .into_iter()
            .map(|x| {
                let forward = f.eval_expression(&["x"], &[x + h]).unwrap();
                let backward = f.eval_expression(&["x"], &[x - h]).unwrap();
                let analytical = derivative.eval_expression(&["x"], &[x]).unwrap();
                (analytical - (forward - backward) / (2.0 * h)).abs()
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_operators() {
        let expr = x() + Expr::Const(2.0);
        assert_eq!(expr, Expr::Add(Box::new(x()), Box::new(Expr::Const(2.0))));
        let expr = x() - y();
        assert_eq!(expr, Expr::Sub(Box::new(x()), Box::new(y())));
        let expr = -x();
        assert_eq!(expr, Expr::Mul(Box::new(Expr::Const(-1.0)), Box::new(x())));
        let expr = Expr::Pow(x().boxed(), Expr::Const(2.0).boxed()) / y();
        assert_eq!(expr, parse("x**2/y"));
    }

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("x"));
        assert!(is_valid_identifier("x_1"));
        assert!(!is_valid_identifier("1x"));
        assert!(!is_valid_identifier("_x"));
        assert!(!is_valid_identifier("sin"));
        assert!(is_function_name("sqrt"));
        assert!(!is_function_name("sinh"));
    }

    #[test]
    fn test_display() {
        assert_eq!(parse("x**2 + 3*x + 1").to_string(), "x**2 + 3*x + 1");
        assert_eq!(parse("-sin(x)").to_string(), "-sin(x)");
        assert_eq!(parse("-(x + y)").to_string(), "-(x + y)");
        assert_eq!(parse("x - (y - 2)").to_string(), "x - (y - 2)");
        assert_eq!(parse("x/(2*y)").to_string(), "x/(2*y)");
        assert_eq!(parse("(x + 1)**2").to_string(), "(x + 1)**2");
        assert_eq!(parse("x**(-1)").to_string(), "x**(-1)");
        assert_eq!(parse("-3*x").to_string(), "-3*x");
        let sum = Expr::Add(Box::new(x()), Box::new(Expr::Const(-2.0)));
        assert_eq!(sum.to_string(), "x - 2");
        let sum = Expr::Add(
            Box::new(x()),
            Box::new(Expr::Mul(Box::new(Expr::Const(-4.0)), Box::new(y()))),
        );
        assert_eq!(sum.to_string(), "x - 4*y");
    }

    #[test]
    fn test_printed_form_parses_back() {
        for text in [
            "x**2 + 3*x + 1",
            "-sin(x)*cos(y)",
            "exp(-x**2)/(1 + x)",
            "sqrt(x**2 + y**2)",
            "2**x - log(x)",
            "-(x - y)**3",
        ] {
            let expr = parse(text);
            assert_eq!(parse(&expr.to_string()), expr, "printing {}", text);
        }
    }

    #[test]
    fn test_substitution() {
        let expr = parse("x**2 + y");
        assert_eq!(expr.set_variable("x", 3.0).simplify(), parse("9 + y").simplify());
        let values = HashMap::from([("x".to_string(), 2.0), ("y".to_string(), 1.0)]);
        assert_eq!(expr.set_variable_from_map(&values).simplify(), Expr::Const(5.0));
        assert_eq!(expr.substitute_variable("y", &parse("sin(x)")), parse("x**2 + sin(x)"));
    }

    #[test]
    fn test_variables() {
        let expr = parse("z*exp(y) + x*z");
        assert_eq!(expr.variables_in_order(), vec!["z", "y", "x"]);
        assert_eq!(expr.all_arguments_are_variables(), vec!["x", "y", "z"]);
        assert!(expr.contains_variable("y"));
        assert!(!expr.contains_variable("w"));
        assert!(expr.contains_function(FunctionKind::Exp));
        assert!(!expr.contains_function(FunctionKind::Sin));
    }

    #[test]
    fn test_function_arguments() {
        let expr = parse("sin(x**2) + log(y)");
        let args = expr.function_arguments();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0], (FunctionKind::Sin, &parse("x**2")));
        assert_eq!(args[1], (FunctionKind::Log, &y()));
    }

    //___________________________________DERIVATIVES____________________________________

    #[test]
    fn test_diff_trigonometric() {
        assert_eq!(parse("sin(x)").diff("x").simplify(), parse("cos(x)"));
        assert_eq!(parse("cos(x)").diff("x").simplify(), parse("-sin(x)"));
        assert!(central_difference_error(&parse("tan(x)"), -1.0, 1.0) < 1e-5);
    }

    #[test]
    fn test_diff_power_rules() {
        assert_eq!(parse("x**2").diff("x").simplify(), parse("2*x"));
        assert_eq!(parse("x**3").diff("x").simplify(), parse("3*x**2"));
        for text in ["2**x", "x**x", "sqrt(x)", "log(x**2 + 1)", "exp(sin(x))*x"] {
            let error = central_difference_error(&parse(text), 0.5, 2.0);
            assert!(error < 1e-5, "{}: error {}", text, error);
        }
    }

    #[test]
    fn test_diff_quotient_rule() {
        let f = parse("(x**2 + 1)/(x - 3)");
        assert!(central_difference_error(&f, -2.0, 2.0) < 1e-5);
    }

    #[test]
    fn test_diff_of_absent_variable_is_zero() {
        assert_eq!(parse("sin(y)*y**2").diff("x"), Expr::Const(0.0));
    }

    #[test]
    fn test_partial_derivatives() {
        let f = parse("x**2 + x*y + y**2");
        let grad = f.diff_multi_args(&["x", "y"]);
        assert_eq!(grad[0], parse("2*x + y").simplify());
        assert_eq!(grad[1], parse("x + 2*y").simplify());
    }

    #[test]
    fn test_polynomial_derivative_vanishes() {
        for (text, degree) in [("3*x**3 - 2*x + 7", 3), ("(x + 1)**4", 4), ("5", 0), ("x*y**2", 1)] {
            let expr = parse(text);
            assert_eq!(expr.n_th_derivative("x", degree + 1), Expr::Const(0.0), "{}", text);
            if degree > 0 {
                assert_ne!(expr.n_th_derivative("x", degree), Expr::Const(0.0), "{}", text);
            }
        }
    }

    #[test]
    fn test_order_additivity() {
        let expr = parse("x**3*sin(x) + exp(2*x)");
        let third = expr.n_th_derivative("x", 3);
        let stepwise = expr.n_th_derivative("x", 1).n_th_derivative("x", 2);
        for point in [-1.0, 0.3, 1.7] {
            assert_relative_eq!(
                third.eval_expression(&["x"], &[point]).unwrap(),
                stepwise.eval_expression(&["x"], &[point]).unwrap(),
                epsilon = 1e-9,
                max_relative = 1e-9
            );
        }
    }

    #[test]
    fn test_derivative_chain() {
        let chain = parse("x**3").derivative_chain("x", 3);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].1, parse("3*x**2"));
        assert_eq!(chain[2].1, Expr::Const(6.0));
        assert_eq!(parse("x**3").n_th_derivative("x", 0), parse("x**3"));
    }

    #[test]
    fn test_derivative_round_trip() {
        for text in ["x**3*sin(x)", "exp(-x**2)", "log(x)/x", "sqrt(x**2 + 1) - cos(2*x)"] {
            let derivative = parse(text).diff("x").simplify();
            let reparsed = parse(&derivative.to_string());
            for point in [0.5, 1.25, 2.0] {
                assert_relative_eq!(
                    reparsed.eval_expression(&["x"], &[point]).unwrap(),
                    derivative.eval_expression(&["x"], &[point]).unwrap(),
                    epsilon = 1e-12,
                    max_relative = 1e-12
                );
            }
        }
        let derivative = parse("x**2 + 3*x").diff("x").simplify();
        assert_eq!(parse(&derivative.to_string()).simplify(), derivative.simplify());
    }

    #[test]
    fn test_find_division_by_zero() {
        assert!(parse("1/(x - x)").find_division_by_zero().is_some());
        assert!(parse("(y - y)**(-2) + x").find_division_by_zero().is_some());
        assert!(parse("1/x").find_division_by_zero().is_none());
        assert!(parse("(2 - 2)**2").find_division_by_zero().is_none());
    }

    #[test]
    fn test_eval_expression() {
        let expr = parse("x*y + sqrt(x)");
        assert_relative_eq!(expr.eval_expression(&["x", "y"], &[4.0, 0.5]).unwrap(), 4.0);
        assert!(expr.eval_expression(&["x"], &[4.0]).is_err());
    }

    #[test]
    fn test_to_latex() {
        assert_eq!(
            parse("sin(x)**2/(x + 1)").to_latex(),
            r"\frac{\left(\sin{\left(x\right)}\right)^{2}}{x + 1}"
        );
        assert_eq!(parse("exp(2*x) - 3*y").to_latex(), r"e^{2 x} - 3 y");
        assert_eq!(parse("log(x)/sqrt(y)").to_latex(), r"\frac{\log{\left(x\right)}}{\sqrt{y}}");
        assert_eq!(parse("x*2").to_latex(), r"x \cdot 2");
        assert_eq!(parse("(x + y)**3").to_latex(), r"\left(x + y\right)^{3}");
        let negated = Expr::Mul(Box::new(Expr::Const(-1.0)), Box::new(parse("x + 1")));
        assert_eq!(negated.to_latex(), r"-\left(x + 1\right)");
    }
}
