#![allow(non_snake_case)]

use crate::Utils::config::{GridConfig, SolverConfig};
use crate::calculus::critical_points::{critical_points_table, find_critical_points, find_critical_points_with};
use crate::calculus::derivative_service::{differentiate, parse, partial_differentiate};
use crate::calculus::derivative_steps::geometric_interpretation;
use crate::calculus::visualization::{AxisRange, gradient_field, prepare_numeric_grid, surface_data};
use crate::symbolic::symbolic_engine::Expr;
use log::error;

#[allow(dead_code)]
pub fn calculus_examples(example: usize) {
    match example {
        0 => {
            // ORDINARY DERIVATIVE WITH STEPS
            let expression = match parse("x**3*sin(x) + 2*x", &["x"]) {
                Ok(expression) => expression,
                Err(e) => {
                    error!("{}", e);
                    return;
                }
            };
            match differentiate(&expression, "x", 1) {
                Ok(result) => {
                    for step in &result.steps {
                        println!("{}", step);
                    }
                    println!("d/dx {} = {}", expression, result.result);
                }
                Err(e) => error!("{}", e),
            }
        }
        1 => {
            // HIGHER ORDER DERIVATIVES
            let Ok(expression) = parse("exp(-x**2)", &["x"]) else {
                return;
            };
            for order in 1..=4 {
                if let Ok(result) = differentiate(&expression, "x", order) {
                    println!("order {}: {}", order, result.result);
                }
            }
        }
        2 => {
            // PARTIAL DERIVATIVES, GRADIENT AND HESSIAN
            let Ok(expression) = parse("x**2*y + exp(x*y)", &["x", "y"]) else {
                return;
            };
            match partial_differentiate(&expression) {
                Ok(result) => {
                    for var in &result.variables {
                        println!("∂f/∂{} = {}", var, result.derivatives[var]);
                        for step in &result.steps[var] {
                            println!("    {}", step);
                        }
                    }
                    println!("hessian = {:?}", result.hessian());
                }
                Err(e) => error!("{}", e),
            }
            println!("{}", geometric_interpretation(&expression));
        }
        3 => {
            // CRITICAL POINTS
            for text in ["x**2 + y**2", "x**2 - y**2", "x**3 + y**3 - 3*x*y", "x**4 - 2*x**2"] {
                let Ok(expression) = parse(text, &[]) else {
                    continue;
                };
                let points = find_critical_points(&expression);
                println!("critical points of {}\n{}", text, critical_points_table(&points));
            }
            // a wider search box
            let config = SolverConfig {
                search_start: -10.0,
                search_end: 10.0,
                search_points: 9,
                ..SolverConfig::default()
            };
            if let Ok(expression) = parse("sin(x)*cos(y)", &["x", "y"]) {
                let points = find_critical_points_with(&expression, &config);
                println!("{}", critical_points_table(&points));
            }
        }
        4 => {
            // GRIDS FOR PLOTTING
            let Ok(tree) = Expr::parse_expression("log(x**2 + y**2)") else {
                return;
            };
            let ranges = vec![AxisRange::new("x", -1.0, 1.0, 5), AxisRange::new("y", -1.0, 1.0, 5)];
            match prepare_numeric_grid(&tree, &ranges) {
                Ok(grid) => println!("values = {}", grid.values),
                Err(e) => error!("{}", e),
            }
            let Ok(expression) = parse("sin(x)*y", &["x", "y"]) else {
                return;
            };
            let config = GridConfig::default();
            if let Ok(surface) = surface_data(&expression, &config) {
                println!("surface of shape {:?}", surface.function.shape());
            }
            if let Ok(field) = gradient_field(&expression, &config) {
                println!("{} arrows", field.arrows(0.2).len());
            }
        }
        _ => {
            println!("no such example");
        }
    }
}
