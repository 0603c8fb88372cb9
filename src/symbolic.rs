#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// a module turns a String expression into a symbolic expression
///
///# Example
/// ```
/// use derivata::symbolic::symbolic_engine::Expr;
/// let input = "x**2.3*log(x + y + y**2.6)";
/// let parsed_expression = Expr::parse_expression(input).unwrap();
/// println!(" parsed_expression {}", parsed_expression);
/// let parsed_function = parsed_expression.lambdify(&["x", "y"]).unwrap();
/// println!("{}, Rust function: {}  \n", input, parsed_function(&[1.0, 2.0]));
///  ```
/// ________________________________________________________________________________________________________________________________
pub mod parse_expr;
///____________________________________________________________________________________________________________________________
/// # Symbolic engine
/// a module
/// 1) holds the symbolic expression tree
/// 2) turns a symbolic expression into a string expression for printing and control results
///# Example#
/// ```
/// use derivata::symbolic::symbolic_engine::Expr;
/// let input = "exp(x) + log(y)";
/// // here you've got symbolic expression
/// let parsed_expression = Expr::parse_expression(input).unwrap();
/// // return vec of all arguments
/// let all = parsed_expression.all_arguments_are_variables();
/// assert_eq!(all, vec!["x", "y"]);
/// // differentiate with respect to x and y
/// let df_dx = parsed_expression.diff("x").simplify();
/// let df_dy = parsed_expression.diff("y").simplify();
/// println!("df_dx = {}, df_dy = {}", df_dx, df_dy);
/// // convert symbolic expression to a Rust function and evaluate the function
/// let function_of_x_and_y = parsed_expression.lambdify(&["x", "y"]).unwrap();
/// let f_res = function_of_x_and_y(&[0.0, 1.0]);
/// assert_eq!(f_res, 1.0);
/// // vector of derivatives with respect to the listed arguments
/// let vector_of_derivatives = parsed_expression.diff_multi_args(&["x", "y"]);
/// println!("vector_of_derivatives = {:?}", vector_of_derivatives);
/// // LaTeX markup for rendering
/// assert_eq!(Expr::parse_expression("exp(x)/y").unwrap().to_latex(), "\\frac{e^{x}}{y}");
/// ```
pub mod symbolic_engine;
/// analytical derivatives, higher order derivatives and direct evaluation
pub mod symbolic_engine_derivatives;
#[cfg(test)]
mod symbolic_engine_tests;
/// calculate symbolic jacobian, gradient and hessian and evaluate them
pub mod symbolic_functions;
/// symbolic expressions into rust closures over scalars and over ndarray grids
pub mod symbolic_lambdify;
pub mod symbolic_simplify;
pub mod utils;
