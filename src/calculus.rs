//! Derivatives with narrated steps, critical points and plotting grids for
//! expressions entered by a user.
///# Example
/// ```
/// use derivata::calculus::derivative_service::{differentiate, parse, partial_differentiate};
/// let expression = parse("x**2*y + sin(y)", &["x", "y"]).unwrap();
/// let d2 = differentiate(&expression, "x", 2).unwrap();
/// for step in &d2.steps {
///     println!("{}", step);
/// }
/// let partials = partial_differentiate(&expression).unwrap();
/// println!("gradient = {:?}", partials.gradient());
/// ```
pub mod derivative_service;
/// step narration and geometric interpretation
pub mod derivative_steps;
pub mod models;
/// stationary points and their classification through the Hessian eigenvalues
pub mod critical_points;
/// numeric grids of functions and gradients for plotting
pub mod visualization;
