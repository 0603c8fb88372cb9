///  Example#1
/// ```
/// use derivata::numerical::NR::NR;
/// use derivata::symbolic::symbolic_engine::Expr;
/// use nalgebra::DVector;
/// // first define system of equations and initial guess
/// let vec_of_expr = Expr::parse_vector_expression(&["x**2 + y**2 - 10", "x - y - 4"]).unwrap();
/// let values = vec!["x".to_string(), "y".to_string()];
/// let mut NR_instanse = NR::new();
/// NR_instanse
///     .set_equation_system(vec_of_expr, Some(values), vec![1.0, 1.0], 1e-6, 100)
///     .unwrap();
/// NR_instanse.eq_generate().unwrap();
/// let solution = NR_instanse.main_loop().unwrap();
/// assert!((solution - DVector::from_vec(vec![-1.0, 3.0])).norm() < 1e-6);
///  ```
use crate::errors::ComputationError;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_functions::Jacobian;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use tabled::{builder::Builder, settings::Style};

pub struct NR {
    pub jacobian: Jacobian, // instance of Jacobian struct, contains jacobian matrix function and equation functions
    pub eq_system: Vec<Expr>, // vector of equations
    pub values: Vec<String>, // vector of variables
    pub initial_guess: Vec<f64>, // initial guess
    pub tolerance: f64,     // tolerance
    pub max_iterations: usize, // max number of iterations

    max_error: f64, // max error
    pub dumping_factor: f64,
    pub i: usize, // iteration counter
    calc_statistics: HashMap<String, usize>,
}

impl Default for NR {
    fn default() -> Self {
        Self::new()
    }
}

impl NR {
    pub fn new() -> NR {
        NR {
            jacobian: Jacobian::new(),
            eq_system: Vec::new(),
            values: Vec::new(),
            initial_guess: Vec::new(),
            tolerance: 1e-6,
            max_iterations: 100,
            max_error: 0.0,
            dumping_factor: 1.0,
            i: 0,
            calc_statistics: HashMap::new(),
        }
    }
    ////////////////////////////SETTERS///////////////////////////////////////////////////////////////////
    /// Basic methods to set the equation system
    pub fn set_equation_system(
        &mut self,
        eq_system: Vec<Expr>,
        unknowns: Option<Vec<String>>,
        initial_guess: Vec<f64>,
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<(), ComputationError> {
        let values = match unknowns {
            Some(values) => values,
            None => {
                let mut args: Vec<String> = eq_system
                    .iter()
                    .flat_map(|x| x.all_arguments_are_variables())
                    .collect();
                args.sort();
                args.dedup();
                args
            }
        };
        if values.is_empty() {
            return Err(ComputationError::Solver("No variables found in the equations.".to_string()));
        }
        if values.len() != eq_system.len() {
            return Err(ComputationError::Solver(format!(
                "Equation system ({}) and vector of variables ({}) should have the same length.",
                eq_system.len(),
                values.len()
            )));
        }
        if tolerance < 0.0 {
            return Err(ComputationError::Solver(
                "Tolerance should be a non-negative number.".to_string(),
            ));
        }
        if max_iterations == 0 {
            return Err(ComputationError::Solver(
                "Max iterations should be a positive number.".to_string(),
            ));
        }
        self.eq_system = eq_system;
        self.values = values;
        self.tolerance = tolerance;
        self.max_iterations = max_iterations;
        self.set_initial_guess(initial_guess)
    }
    /// new starting point, clears the state of a previous run
    pub fn set_initial_guess(&mut self, initial_guess: Vec<f64>) -> Result<(), ComputationError> {
        if initial_guess.len() != self.values.len() {
            return Err(ComputationError::Solver(
                "Initial guess and vector of variables should have the same length.".to_string(),
            ));
        }
        self.initial_guess = initial_guess;
        self.i = 0;
        self.max_error = 0.0;
        Ok(())
    }
    pub fn set_solver_params(&mut self, damping_factor: Option<f64>) -> Result<(), ComputationError> {
        if let Some(dumping_factor) = damping_factor {
            if !(dumping_factor > 0.0 && dumping_factor <= 1.0) {
                return Err(ComputationError::Solver(
                    "Dumping factor should be in (0.0, 1.0].".to_string(),
                ));
            }
            self.dumping_factor = dumping_factor;
        }
        Ok(())
    }
    ///Set system of equations with vector of symbolic expressions
    pub fn eq_generate(&mut self) -> Result<(), ComputationError> {
        let args: Vec<&str> = self.values.iter().map(|x| x.as_str()).collect();
        let mut Jacobian_instance = Jacobian::new();
        Jacobian_instance.set_vector_of_functions(self.eq_system.clone());
        Jacobian_instance.set_variables(&args);
        Jacobian_instance.calc_jacobian()?;
        Jacobian_instance.readable_jacobian();
        debug!("symbolic jacobian {:?}", Jacobian_instance.readable_jacobian);
        Jacobian_instance.jacobian_generate()?;
        Jacobian_instance.lambdify_funcvector()?;
        self.jacobian = Jacobian_instance;
        Ok(())
    }
    /////////////////////////////////////////////////////////////////////////////////////////////
    //                ITERATIONS
    /////////////////////////////////////////////////////////////////////////////////////////////
    /// realize iteration of Newton-Raphson - calculate new iteration vector by using Jacobian matrix
    pub fn iteration(&mut self, x: &DVector<f64>) -> Result<DVector<f64>, ComputationError> {
        let Jacobian_instance = &mut self.jacobian;
        Jacobian_instance.evaluate_func_jacobian_DMatrix(x.as_slice());
        Jacobian_instance.evaluate_funvector_lambdified_DVector(x.as_slice());
        let new_j = &Jacobian_instance.evaluated_jacobian_DMatrix;
        let new_f = &Jacobian_instance.evaluated_functions_DVector;
        let delta = Self::solve_linear_system(new_j, new_f)?;
        Ok(x - self.dumping_factor * delta)
    }
    /// Main loop. Stops when the step norm is below the tolerance and the residual norm
    /// below its square root, or when the residual is exactly zero. Near a root with a
    /// singular jacobian the residual gets small long before the iterate converges, so
    /// the residual alone is never enough.
    /// `None` if the iterations diverge, hit a singular jacobian or run out.
    pub fn main_loop(&mut self) -> Option<DVector<f64>> {
        let mut x = DVector::from_vec(self.initial_guess.clone());
        while self.i < self.max_iterations {
            let new_x = match self.iteration(&x) {
                Ok(new_x) => new_x,
                Err(e) => {
                    debug!("iteration {} stopped: {}", self.i, e);
                    return None;
                }
            };
            if new_x.iter().any(|v| !v.is_finite()) {
                debug!("iteration {} left the domain of the functions", self.i);
                return None;
            }
            let error = (&new_x - &x).norm();
            if (error > self.max_error) && (self.i > 0) {
                debug!("Error is increasing");
            }
            self.max_error = error;
            let residual = self.residual_norm(&new_x);
            self.i += 1;
            if residual == 0.0 || (error < self.tolerance && residual < self.tolerance.sqrt()) {
                return Some(new_x);
            }
            debug!("iteration = {}, error = {}, residual = {}", self.i, error, residual);
            x = new_x;
        }
        debug!("Maximum number of iterations reached. No solution found.");
        None
    }
    /// norm of the function vector at `x`
    pub fn residual_norm(&self, x: &DVector<f64>) -> f64 {
        self.jacobian
            .evaluate_funvector_lambdified_DVector_unmut(x.as_slice())
            .norm()
    }
    ////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
    //                                       multistart search
    ////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
    /// Runs the main loop from every starting point and keeps the solutions whose
    /// residual is below `residual_tolerance`. Solutions are merged into clusters, a
    /// solution joins a cluster closer than `distinct_tolerance` or the square root of
    /// its residual, whichever is larger. One point per cluster, the mean of its members.
    pub fn solve_from_starts(
        &mut self,
        starts: &[Vec<f64>],
        residual_tolerance: f64,
        distinct_tolerance: f64,
    ) -> Vec<DVector<f64>> {
        let mut clusters: Vec<Vec<DVector<f64>>> = Vec::new();
        let mut converged = 0;
        for start in starts {
            if let Err(e) = self.set_initial_guess(start.clone()) {
                warn!("skipping starting point {:?}: {}", start, e);
                continue;
            }
            let Some(solution) = self.main_loop() else {
                continue;
            };
            converged += 1;
            let residual = self.residual_norm(&solution);
            if residual > residual_tolerance {
                debug!("rejecting {:?}, residual {}", solution.as_slice(), residual);
                continue;
            }
            let radius = distinct_tolerance.max(residual.sqrt());
            match clusters
                .iter_mut()
                .find(|cluster| (&cluster[0] - &solution).norm() <= radius)
            {
                Some(cluster) => cluster.push(solution),
                None => clusters.push(vec![solution]),
            }
        }
        let solutions: Vec<DVector<f64>> = clusters
            .iter()
            .map(|cluster| cluster.iter().sum::<DVector<f64>>() / cluster.len() as f64)
            .collect();
        self.calc_statistics.insert("starting points".to_string(), starts.len());
        self.calc_statistics.insert("converged runs".to_string(), converged);
        self.calc_statistics.insert("distinct solutions".to_string(), solutions.len());
        self.calc_statistics.insert("number of unknowns".to_string(), self.values.len());
        self.calc_statistics();
        solutions
    }
    fn calc_statistics(&self) {
        let mut table = Builder::from(self.calc_statistics.clone()).build();
        table.with(Style::modern_rounded());
        info!("\n \n NEWTON-RAPHSON STATISTICS \n \n {}", table);
    }
    //////////////////////////////////////////////////////////////////////////////////////////////
    //                  LINEAR SYSTEM SOLVERS
    //////////////////////////////////////////////////////////////////////////////////////////////
    /// LU solution of `A x = b`, error for a singular matrix
    pub fn solve_linear_system(A: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, ComputationError> {
        if !A.is_square() || A.nrows() != b.len() {
            return Err(ComputationError::Solver(format!(
                "linear system of shape {:?} with right hand side of length {}",
                A.shape(),
                b.len()
            )));
        }
        let lu = A.clone().lu();
        match lu.solve(b) {
            Some(x) if x.iter().all(|v| v.is_finite()) => Ok(x),
            _ => Err(ComputationError::Solver("Failed to solve the system, matrix is singular".to_string())),
        }
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
//                                     TESTS
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_NR_set_equation_sysytem() {
        let vec_of_expr = Expr::parse_vector_expression(&["x**2+y**2-10", "x-y-4"]).unwrap();
        let mut NR_instanse = NR::new();
        let values = vec!["x".to_string(), "y".to_string()];
        NR_instanse
            .set_equation_system(vec_of_expr, Some(values), vec![1.0, 1.0], 1e-10, 100)
            .unwrap();
        NR_instanse.eq_generate().unwrap();
        let solution = NR_instanse.main_loop().unwrap();
        assert_relative_eq!(solution[0], -1.0, epsilon = 1e-8);
        assert_relative_eq!(solution[1], 3.0, epsilon = 1e-8);
        assert!(NR_instanse.i > 1);
    }

    #[test]
    fn test_NR_variables_found_automatically() {
        let vec_of_expr = Expr::parse_vector_expression(&["x - 2", "y + 1"]).unwrap();
        let mut NR_instanse = NR::new();
        NR_instanse
            .set_equation_system(vec_of_expr, None, vec![0.0, 0.0], 1e-10, 10)
            .unwrap();
        assert_eq!(NR_instanse.values, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_NR_rejects_bad_input() {
        let vec_of_expr = Expr::parse_vector_expression(&["x*y - 2"]).unwrap();
        let mut NR_instanse = NR::new();
        assert!(
            NR_instanse
                .set_equation_system(vec_of_expr.clone(), None, vec![0.0, 0.0], 1e-10, 10)
                .is_err()
        );
        assert!(
            NR_instanse
                .set_equation_system(vec_of_expr, Some(vec!["x".to_string()]), vec![0.0, 0.0], 1e-10, 10)
                .is_err()
        );
        assert!(NR_instanse.set_solver_params(Some(1.5)).is_err());
    }

    #[test]
    fn test_NR_singular_jacobian_gives_none() {
        // jacobian 2*x vanishes at the starting point
        let vec_of_expr = Expr::parse_vector_expression(&["x**2 + 1"]).unwrap();
        let mut NR_instanse = NR::new();
        NR_instanse
            .set_equation_system(vec_of_expr, None, vec![0.0], 1e-10, 50)
            .unwrap();
        NR_instanse.eq_generate().unwrap();
        assert!(NR_instanse.main_loop().is_none());
    }

    #[test]
    fn test_NR_multistart_finds_both_roots() {
        let vec_of_expr = Expr::parse_vector_expression(&["x**2 - 4"]).unwrap();
        let mut NR_instanse = NR::new();
        NR_instanse
            .set_equation_system(vec_of_expr, None, vec![1.0], 1e-12, 100)
            .unwrap();
        NR_instanse.eq_generate().unwrap();
        let starts = vec![vec![-5.0], vec![-3.0], vec![3.0], vec![5.0]];
        let mut roots: Vec<f64> = NR_instanse
            .solve_from_starts(&starts, 1e-8, 1e-6)
            .iter()
            .map(|s| s[0])
            .collect();
        roots.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(roots.len(), 2);
        assert_relative_eq!(roots[0], -2.0, epsilon = 1e-9);
        assert_relative_eq!(roots[1], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_NR_degenerate_root_is_not_accepted_early() {
        // x**3 = 0: the residual is tiny long before the step is
        let vec_of_expr = Expr::parse_vector_expression(&["x**3"]).unwrap();
        let mut NR_instanse = NR::new();
        NR_instanse
            .set_equation_system(vec_of_expr, None, vec![1.0], 1e-10, 100)
            .unwrap();
        NR_instanse.eq_generate().unwrap();
        let solution = NR_instanse.main_loop().unwrap();
        assert!(solution[0].abs() < 1e-9);
    }

    #[test]
    fn test_NR_multistart_merges_a_degenerate_root() {
        let vec_of_expr = Expr::parse_vector_expression(&["x**3", "y"]).unwrap();
        let mut NR_instanse = NR::new();
        NR_instanse
            .set_equation_system(vec_of_expr, None, vec![0.0, 0.0], 1e-10, 100)
            .unwrap();
        NR_instanse.eq_generate().unwrap();
        let starts = vec![vec![-2.0, 1.0], vec![-1.0, -1.0], vec![1.0, 2.0], vec![2.0, 0.5]];
        let solutions = NR_instanse.solve_from_starts(&starts, 1e-5, 1e-6);
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].norm() < 1e-9);
    }

    #[test]
    fn test_solve_linear_system() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        let b = DVector::from_vec(vec![2.0, 8.0]);
        assert_eq!(NR::solve_linear_system(&a, &b).unwrap(), DVector::from_vec(vec![1.0, 2.0]));
        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(NR::solve_linear_system(&singular, &b).is_err());
    }
}
