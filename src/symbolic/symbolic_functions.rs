use crate::errors::ComputationError;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_lambdify::ScalarFn;
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
///
/// calculate symbolic jacobian and evaluate it
/// Example#
/// ```
/// use derivata::symbolic::symbolic_engine::Expr;
/// use derivata::symbolic::symbolic_functions::Jacobian;
/// let mut Jacobian_instance = Jacobian::new();
/// // gradient of x**2*y + y**3 as a vector of functions
/// let gradient = Expr::parse_vector_expression(&["2*x*y", "x**2 + 3*y**2"]).unwrap();
/// Jacobian_instance.set_vector_of_functions(gradient);
/// // set vector of variables
/// Jacobian_instance.set_variables(&["x", "y"]);
/// // calculate symbolic jacobian
/// Jacobian_instance.calc_jacobian().unwrap();
/// // transform into human readable form
/// Jacobian_instance.readable_jacobian();
/// println!("readable jacobian {:?}", Jacobian_instance.readable_jacobian);
/// // generate jacobian made of regular rust functions
/// Jacobian_instance.jacobian_generate().unwrap();
/// Jacobian_instance.lambdify_funcvector().unwrap();
/// // evaluate jacobian to nalgebra matrix format
/// Jacobian_instance.evaluate_func_jacobian_DMatrix(&[1.0, 2.0]);
/// assert_eq!(Jacobian_instance.evaluated_jacobian_DMatrix[(1, 1)], 12.0);
/// Jacobian_instance.evaluate_funvector_lambdified_DVector(&[1.0, 2.0]);
/// assert_eq!(Jacobian_instance.evaluated_functions_DVector[0], 4.0);
/// ```
pub struct Jacobian {
    pub vector_of_functions: Vec<Expr>, // vector of symbolic functions/expressions
    pub lambdified_functions: Vec<ScalarFn>, // symbolic functions converted to rust functions
    pub evaluated_functions_DVector: DVector<f64>, // numerical results of evaluated functions
    pub variable_string: Vec<String>,   // vector of string representation of variables
    pub symbolic_jacobian: Vec<Vec<Expr>>, // vector of symbolic jacobian
    pub readable_jacobian: Vec<Vec<String>>, // human readable jacobian
    pub function_jacobian: Vec<Vec<ScalarFn>>,
    pub evaluated_jacobian_DMatrix: DMatrix<f64>, // numerical results of evaluated jacobian
}

impl Default for Jacobian {
    fn default() -> Self {
        Self::new()
    }
}

impl Jacobian {
    pub fn new() -> Self {
        Self {
            vector_of_functions: Vec::new(),
            lambdified_functions: Vec::new(),
            evaluated_functions_DVector: DVector::zeros(0),
            variable_string: Vec::new(),
            symbolic_jacobian: Vec::new(),
            readable_jacobian: Vec::new(),
            function_jacobian: Vec::new(),
            evaluated_jacobian_DMatrix: DMatrix::zeros(0, 0),
        }
    }
    /// Basic functionality: setting variables and functions
    pub fn set_vector_of_functions(&mut self, value: Vec<Expr>) {
        self.vector_of_functions = value;
    }
    pub fn set_variables(&mut self, varvec: &[&str]) {
        self.variable_string = varvec.iter().map(|s| s.trim().to_string()).collect();
    }
    fn variables(&self) -> Vec<&str> {
        self.variable_string.iter().map(|s| s.as_str()).collect()
    }
    /// turn jacobian into readable format
    pub fn readable_jacobian(&mut self) {
        self.readable_jacobian = self
            .symbolic_jacobian
            .iter()
            .map(|row| row.iter().map(|element| element.to_string()).collect())
            .collect();
    }
    /// calculate the symbolic jacobian, every element simplified
    pub fn calc_jacobian(&mut self) -> Result<(), ComputationError> {
        if self.vector_of_functions.is_empty() {
            return Err(ComputationError::Solver("vector_of_functions is empty".to_string()));
        }
        if self.variable_string.is_empty() {
            return Err(ComputationError::Solver("vector_of_variables is empty".to_string()));
        }
        let variables = self.variables();
        let new_jac: Vec<Vec<Expr>> = self
            .vector_of_functions
            .iter()
            .map(|func| func.diff_multi_args(&variables))
            .collect();
        self.symbolic_jacobian = new_jac;
        Ok(())
    }
    //////////////////////////////JACOBIAN AND RESIDUAL VECTOR IN VECTOR FORM FOR
    ///////                               NONLINEAR SOLVERS           ///////////////////////////
    /// creating function jacobian a matrix of functions with partial derivatives
    pub fn jacobian_generate(&mut self) -> Result<(), ComputationError> {
        let variables = self.variables();
        let function_jacobian = self
            .symbolic_jacobian
            .iter()
            .map(|row| {
                row.iter()
                    .map(|element| element.lambdify(&variables))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.function_jacobian = function_jacobian;
        Ok(())
    }

    pub fn lambdify_funcvector(&mut self) -> Result<(), ComputationError> {
        let variables = self.variables();
        let lambdified = self
            .vector_of_functions
            .iter()
            .map(|func| func.lambdify(&variables))
            .collect::<Result<Vec<_>, _>>()?;
        self.lambdified_functions = lambdified;
        Ok(())
    }

    // evaluate jacobian to nalgebra DMatrix
    pub fn evaluate_func_jacobian_DMatrix(&mut self, x: &[f64]) {
        self.evaluated_jacobian_DMatrix = self.evaluate_func_jacobian_DMatrix_unmut(x);
    }
    pub fn evaluate_func_jacobian_DMatrix_unmut(&self, x: &[f64]) -> DMatrix<f64> {
        let rows = self.function_jacobian.len();
        let cols = self.variable_string.len();
        DMatrix::from_fn(rows, cols, |i, j| self.function_jacobian[i][j](x))
    }

    pub fn evaluate_funvector_lambdified_DVector(&mut self, arg_values: &[f64]) {
        self.evaluated_functions_DVector = self.evaluate_funvector_lambdified_DVector_unmut(arg_values);
    }
    pub fn evaluate_funvector_lambdified_DVector_unmut(&self, arg_values: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            self.lambdified_functions.len(),
            self.lambdified_functions.iter().map(|func| func(arg_values)),
        )
    }

    //___________________________________GRADIENT AND HESSIAN____________________________________

    /// symbolic gradient of a scalar function in the order of `variables`
    pub fn gradient(function: &Expr, variables: &[&str]) -> Vec<Expr> {
        function.diff_multi_args(variables)
    }
    /// symbolic Hessian: the jacobian of the gradient
    pub fn hessian(function: &Expr, variables: &[&str]) -> Vec<Vec<Expr>> {
        Self::gradient(function, variables)
            .iter()
            .map(|component| component.diff_multi_args(variables))
            .collect()
    }
    /// Substitutes numerical values of variables into every element and simplifies it.
    /// Elements left without free variables are evaluated to a constant.
    pub fn substitute_matrix(matrix: &[Vec<Expr>], values: &HashMap<String, f64>) -> Vec<Vec<Expr>> {
        matrix
            .iter()
            .map(|row| {
                row.iter()
                    .map(|element| {
                        let substituted = element.set_variable_from_map(values).simplify();
                        match substituted.eval_expression(&[], &[]) {
                            Ok(value) => Expr::Const(value),
                            Err(_) => substituted,
                        }
                    })
                    .collect()
            })
            .collect()
    }
    /// numerical matrix if every element is a finite constant
    pub fn constant_matrix(matrix: &[Vec<Expr>]) -> Option<DMatrix<f64>> {
        let rows = matrix.len();
        let cols = matrix.first().map_or(0, |row| row.len());
        let mut elements = Vec::with_capacity(rows * cols);
        for row in matrix {
            if row.len() != cols {
                return None;
            }
            for element in row {
                match element {
                    Expr::Const(c) if c.is_finite() => elements.push(*c),
                    _ => return None,
                }
            }
        }
        Some(DMatrix::from_row_slice(rows, cols, &elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jacobian_of_linear_system() {
        let mut jac = Jacobian::new();
        jac.set_vector_of_functions(Expr::parse_vector_expression(&["x + 2*y", "3*x - y"]).unwrap());
        jac.set_variables(&["x", "y"]);
        jac.calc_jacobian().unwrap();
        let expected = vec![
            vec![Expr::Const(1.0), Expr::Const(2.0)],
            vec![Expr::Const(3.0), Expr::Const(-1.0)],
        ];
        assert_eq!(jac.symbolic_jacobian, expected);
        assert_eq!(
            Jacobian::constant_matrix(&jac.symbolic_jacobian).unwrap(),
            DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, -1.0])
        );
    }

    #[test]
    fn test_calc_jacobian_empty() {
        let mut jac = Jacobian::new();
        assert!(jac.calc_jacobian().is_err());
    }

    #[test]
    fn test_evaluate_jacobian_and_functions() {
        let mut jac = Jacobian::new();
        jac.set_vector_of_functions(Expr::parse_vector_expression(&["x**2 + y**2 - 10", "x - y - 4"]).unwrap());
        jac.set_variables(&["x", "y"]);
        jac.calc_jacobian().unwrap();
        jac.jacobian_generate().unwrap();
        jac.lambdify_funcvector().unwrap();
        jac.evaluate_func_jacobian_DMatrix(&[1.0, 2.0]);
        jac.evaluate_funvector_lambdified_DVector(&[1.0, 2.0]);
        assert_eq!(
            jac.evaluated_jacobian_DMatrix,
            DMatrix::from_row_slice(2, 2, &[2.0, 4.0, 1.0, -1.0])
        );
        assert_eq!(jac.evaluated_functions_DVector, DVector::from_vec(vec![-5.0, -5.0]));
    }

    #[test]
    fn test_hessian_substitution() {
        let f = Expr::parse_expression("x**3 - 3*x*y**2").unwrap();
        let hessian = Jacobian::hessian(&f, &["x", "y"]);
        let values = HashMap::from([("x".to_string(), 1.0), ("y".to_string(), 1.0)]);
        let substituted = Jacobian::substitute_matrix(&hessian, &values);
        let numeric = Jacobian::constant_matrix(&substituted).unwrap();
        assert_eq!(numeric, DMatrix::from_row_slice(2, 2, &[6.0, -6.0, -6.0, -6.0]));
    }

    #[test]
    fn test_substitute_matrix_evaluates_functions() {
        let f = Expr::parse_expression("sin(x)*y").unwrap();
        let hessian = Jacobian::hessian(&f, &["x", "y"]);
        let values = HashMap::from([("x".to_string(), 0.5)]);
        let substituted = Jacobian::substitute_matrix(&hessian, &values);
        assert!(matches!(substituted[0][1], Expr::Const(c) if (c - 0.5f64.cos()).abs() < 1e-12));
        assert!(Jacobian::constant_matrix(&substituted).is_none());
    }

    #[test]
    fn test_constant_matrix_rejects_symbols() {
        let f = Expr::parse_expression("x**2*y").unwrap();
        let hessian = Jacobian::hessian(&f, &["x", "y"]);
        assert!(Jacobian::constant_matrix(&hessian).is_none());
    }
}
