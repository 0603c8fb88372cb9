//! Stationary points of a function and their second derivative test.
//!
//! The gradient is set to zero and the equations are eliminated one at a time:
//! - equations without unknowns must vanish, otherwise the branch is dropped;
//! - a square linear system is solved exactly with an LU decomposition;
//! - an equation that is a polynomial in a single unknown gives all real roots
//!   through the eigenvalues of the companion matrix, every root is substituted into
//!   the other equations and the rest is solved again;
//! - whatever is left goes to a multi start Newton-Raphson search. This is best
//!   effort: points outside the search box or points that no start converges to are
//!   not reported.
//!
//! Each point is classified by the signs of the Hessian eigenvalues at that point.
use crate::Utils::config::SolverConfig;
use crate::calculus::models::{Classification, CriticalPoint, Expression};
use crate::errors::ComputationError;
use crate::numerical::NR::NR;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_functions::Jacobian;
use crate::symbolic::utils::{linspace, snap_value};
use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use num_complex::Complex;
use std::cmp::Ordering;
use std::collections::HashMap;
use tabled::{builder::Builder, settings::Style};

/// solutions closer than this are the same point
const DISTINCT_TOLERANCE: f64 = 1e-6;
/// values this close to an integer are reported as the integer
const SNAP_TOLERANCE: f64 = 1e-9;
/// upper bound of the number of Newton-Raphson starts
const MAX_STARTS: usize = 1024;
/// companion matrix eigenvalues closer than this (relative) belong to one multiple root
const ROOT_CLUSTER_TOLERANCE: f64 = 1e-3;

/// Critical points with the default solver settings.
///
/// # Examples
/// ```
/// use derivata::calculus::critical_points::find_critical_points;
/// use derivata::calculus::models::Classification;
/// use derivata::calculus::derivative_service::parse;
/// let expression = parse("x**2 - y**2", &["x", "y"]).unwrap();
/// let points = find_critical_points(&expression);
/// assert_eq!(points.len(), 1);
/// assert_eq!(points[0].classification(), Classification::Saddle);
/// ```
pub fn find_critical_points(expression: &Expression) -> Vec<CriticalPoint> {
    find_critical_points_with(expression, &SolverConfig::default())
}

/// Critical points of `expression` over all of its variables, sorted by coordinates.
/// Never fails: a failed solve gives an empty vector, a failed classification an
/// indeterminate point.
pub fn find_critical_points_with(expression: &Expression, config: &SolverConfig) -> Vec<CriticalPoint> {
    let tree = match expression.tree() {
        Ok(tree) => tree,
        Err(e) => {
            warn!("critical points of '{}' skipped: {}", expression, e);
            return Vec::new();
        }
    };
    let variables = expression.variables().to_vec();
    if variables.is_empty() {
        return Vec::new();
    }
    let vars: Vec<&str> = variables.iter().map(|v| v.as_str()).collect();
    let gradient = Jacobian::gradient(&tree, &vars);
    let hessian = Jacobian::hessian(&tree, &vars);
    let branches = match solve_system(&gradient, &variables, config) {
        Ok(branches) => branches,
        Err(e) => {
            warn!("no critical points of '{}': {}", expression, e);
            return Vec::new();
        }
    };
    let solutions: Vec<Vec<f64>> = branches
        .into_iter()
        .filter_map(|branch| {
            let values: Option<Vec<f64>> = variables.iter().map(|var| branch.get(var).copied()).collect();
            if values.is_none() {
                warn!("dropping incomplete solution branch {:?}", branch);
            }
            values
        })
        .collect();
    let points: Vec<CriticalPoint> = clean_solutions(solutions, variables.len())
        .iter()
        .map(|values| classify_point(&hessian, &variables, values, config.eigen_tolerance))
        .collect();
    info!("{} critical point(s) of {}", points.len(), expression);
    points
}

/// values of the unknowns on one solution branch
type Branch = HashMap<String, f64>;

/// Solutions of `equations = 0` for `unknowns`, one branch per isolated point.
fn solve_system(equations: &[Expr], unknowns: &[String], config: &SolverConfig) -> Result<Vec<Branch>, ComputationError> {
    let consistency = config.tolerance.sqrt();
    let mut remaining: Vec<Expr> = Vec::with_capacity(equations.len());
    for equation in equations {
        let equation = equation.simplify();
        if !equation.variables_in_order().is_empty() {
            remaining.push(equation);
            continue;
        }
        match equation.eval_expression(&[], &[]) {
            Ok(value) if value.abs() <= consistency => {}
            other => {
                debug!("branch dropped, {} does not vanish: {:?}", equation, other);
                return Ok(Vec::new());
            }
        }
    }
    if unknowns.is_empty() {
        return Ok(vec![Branch::new()]);
    }
    if remaining.is_empty() {
        info!("{} not fixed by the equations, no isolated point", unknowns.join(", "));
        return Ok(Vec::new());
    }
    if remaining.len() == unknowns.len() && remaining.iter().all(|equation| equation.is_linear_in(unknowns)) {
        info!("linear system in {}, solving with LU", unknowns.join(", "));
        return solve_linear(&remaining, unknowns);
    }
    if let Some((index, unknown, coeffs)) = univariate_polynomial(&remaining) {
        info!(
            "{} = 0 is a polynomial of degree {} in {}, solving for its real roots",
            remaining[index],
            coeffs.len() - 1,
            unknown
        );
        let others: Vec<String> = unknowns.iter().filter(|var| **var != unknown).cloned().collect();
        let mut branches = Vec::new();
        for root in real_polynomial_roots(&coeffs) {
            let root = snap_value(root, SNAP_TOLERANCE);
            let substituted: Vec<Expr> = remaining
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != index)
                .map(|(_, equation)| equation.set_variable(&unknown, root))
                .collect();
            for mut branch in solve_system(&substituted, &others, config)? {
                branch.insert(unknown.clone(), root);
                branches.push(branch);
            }
        }
        return Ok(branches);
    }
    info!("nonlinear system in {}, multi start Newton-Raphson", unknowns.join(", "));
    solve_with_newton(&remaining, unknowns, config)
}

/// first equation that is a polynomial in exactly one unknown, with its coefficients
fn univariate_polynomial(equations: &[Expr]) -> Option<(usize, String, Vec<f64>)> {
    equations.iter().enumerate().find_map(|(index, equation)| {
        let variables = equation.variables_in_order();
        let [unknown] = variables.as_slice() else {
            return None;
        };
        equation
            .polynomial_coefficients(unknown)
            .map(|coeffs| (index, unknown.clone(), coeffs))
    })
}

/// `A v = -b(0)`, the jacobian `A` of a linear system is the same everywhere
fn solve_linear(equations: &[Expr], unknowns: &[String]) -> Result<Vec<Branch>, ComputationError> {
    let vars: Vec<&str> = unknowns.iter().map(|v| v.as_str()).collect();
    let origin: Branch = unknowns.iter().map(|v| (v.clone(), 0.0)).collect();
    let jacobian: Vec<Vec<Expr>> = equations.iter().map(|equation| equation.diff_multi_args(&vars)).collect();
    let A = Jacobian::constant_matrix(&Jacobian::substitute_matrix(&jacobian, &origin))
        .ok_or_else(|| ComputationError::Solver("jacobian of a linear system is not constant".to_string()))?;
    let b: Vec<f64> = equations
        .iter()
        .map(|equation| equation.set_variable_from_map(&origin).eval_expression(&[], &[]))
        .collect::<Result<_, _>>()?;
    let b = -DVector::from_vec(b);
    match NR::solve_linear_system(&A, &b) {
        Ok(solution) => Ok(vec![unknowns.iter().cloned().zip(solution.iter().cloned()).collect()]),
        Err(e) => {
            // a singular system has no isolated solution
            info!("linear system without an isolated solution: {}", e);
            Ok(Vec::new())
        }
    }
}

/// p(x) and p'(x) for coefficients `[a0, a1, ..., an]`
fn horner(coeffs: &[f64], x: f64) -> (f64, f64) {
    let mut p = 0.0;
    let mut dp = 0.0;
    for a in coeffs.iter().rev() {
        dp = dp * x + p;
        p = p * x + a;
    }
    (p, dp)
}

/// Newton steps that are kept only while they reduce |p|
fn polish_root(coeffs: &[f64], mut x: f64) -> f64 {
    for _ in 0..20 {
        let (p, dp) = horner(coeffs, x);
        if p == 0.0 || dp == 0.0 {
            break;
        }
        let candidate = x - p / dp;
        if !candidate.is_finite() || horner(coeffs, candidate).0.abs() >= p.abs() {
            break;
        }
        x = candidate;
    }
    x
}

/// All real roots of the polynomial `a0 + a1*x + ... + an*x^n`, each multiple root once.
///
/// The zero polynomial has no isolated roots and gives an empty vector.
pub fn real_polynomial_roots(coeffs: &[f64]) -> Vec<f64> {
    let mut coeffs = coeffs.to_vec();
    while coeffs.len() > 1 && coeffs.last() == Some(&0.0) {
        coeffs.pop();
    }
    let n = coeffs.len().saturating_sub(1);
    if n == 0 {
        return Vec::new();
    }
    let leading = coeffs[n];
    let mut companion = DMatrix::<f64>::zeros(n, n);
    for i in 1..n {
        companion[(i, i - 1)] = 1.0;
    }
    for i in 0..n {
        companion[(i, n - 1)] = -coeffs[i] / leading;
    }
    let eigenvalues = companion.complex_eigenvalues();
    // a root of multiplicity k splits into k nearby eigenvalues, their mean is accurate
    let mut clusters: Vec<Vec<Complex<f64>>> = Vec::new();
    for ev in eigenvalues.iter() {
        let scale = ev.norm().max(1.0);
        match clusters
            .iter_mut()
            .find(|cluster| (cluster[0] - ev).norm() < ROOT_CLUSTER_TOLERANCE * scale)
        {
            Some(cluster) => cluster.push(*ev),
            None => clusters.push(vec![*ev]),
        }
    }
    let mut roots: Vec<f64> = clusters
        .iter()
        .map(|cluster| cluster.iter().sum::<Complex<f64>>() / cluster.len() as f64)
        .filter(|mean| mean.re.is_finite() && mean.im.abs() <= 1e-6 * mean.re.abs().max(1.0))
        .map(|mean| polish_root(&coeffs, mean.re))
        .collect();
    roots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    roots.dedup_by(|a, b| (*a - *b).abs() < DISTINCT_TOLERANCE);
    roots
}

/// regular grid of start points, at most `MAX_STARTS` of them
fn start_points(n: usize, config: &SolverConfig) -> Vec<Vec<f64>> {
    let mut per_axis = config.search_points.max(1);
    while per_axis > 1 && per_axis.checked_pow(n as u32).is_none_or(|total| total > MAX_STARTS) {
        per_axis -= 1;
    }
    let axis = if per_axis == 1 {
        vec![0.5 * (config.search_start + config.search_end)]
    } else {
        linspace(config.search_start, config.search_end, per_axis)
    };
    (0..n).map(|_| axis.clone()).multi_cartesian_product().collect()
}

/// Newton-Raphson from a grid of starts on the first `unknowns.len()` equations,
/// the other equations only filter the solutions
fn solve_with_newton(
    equations: &[Expr],
    unknowns: &[String],
    config: &SolverConfig,
) -> Result<Vec<Branch>, ComputationError> {
    let n = unknowns.len();
    if equations.len() < n {
        info!("{} equation(s) for {} unknowns, no isolated point", equations.len(), n);
        return Ok(Vec::new());
    }
    let (square, extra) = equations.split_at(n);
    let consistency = config.tolerance.sqrt();
    let mut solver = NR::new();
    solver.set_equation_system(
        square.to_vec(),
        Some(unknowns.to_vec()),
        vec![0.0; n],
        config.tolerance,
        config.max_iterations,
    )?;
    solver.set_solver_params(Some(config.damping))?;
    solver.eq_generate()?;
    let starts = start_points(n, config);
    let branches = solver
        .solve_from_starts(&starts, consistency, DISTINCT_TOLERANCE)
        .into_iter()
        .map(|solution| unknowns.iter().cloned().zip(solution.iter().cloned()).collect::<Branch>())
        .filter(|branch| {
            extra.iter().all(|equation| {
                matches!(equation.set_variable_from_map(branch).eval_expression(&[], &[]),
                    Ok(value) if value.abs() <= consistency)
            })
        })
        .collect();
    Ok(branches)
}

/// snaps values, drops incomplete or non-finite branches and duplicates, sorts
fn clean_solutions(solutions: Vec<Vec<f64>>, n: usize) -> Vec<Vec<f64>> {
    let mut cleaned: Vec<Vec<f64>> = Vec::new();
    for solution in solutions {
        if solution.len() != n || solution.iter().any(|v| !v.is_finite()) {
            warn!("dropping incomplete solution branch {:?}", solution);
            continue;
        }
        let snapped: Vec<f64> = solution.iter().map(|v| snap_value(*v, SNAP_TOLERANCE)).collect();
        let duplicate = cleaned.iter().any(|known| {
            known
                .iter()
                .zip(snapped.iter())
                .all(|(a, b)| (a - b).abs() < DISTINCT_TOLERANCE)
        });
        if !duplicate {
            cleaned.push(snapped);
        }
    }
    cleaned.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    cleaned
}

/// eigenvalues of a numeric Hessian, symmetric matrices through `SymmetricEigen`
fn hessian_eigenvalues(matrix: &DMatrix<f64>) -> Vec<Complex<f64>> {
    let scale = matrix.amax().max(1.0);
    let asymmetry = (matrix - matrix.transpose()).amax();
    if asymmetry <= 1e-12 * scale {
        SymmetricEigen::new(matrix.clone())
            .eigenvalues
            .iter()
            .map(|ev| Complex::new(*ev, 0.0))
            .collect()
    } else {
        matrix.complex_eigenvalues().iter().cloned().collect()
    }
}

fn classify_point(hessian: &[Vec<Expr>], variables: &[String], values: &[f64], tolerance: f64) -> CriticalPoint {
    let coordinates: Vec<(String, Expr)> = variables
        .iter()
        .zip(values.iter())
        .map(|(var, value)| (var.clone(), Expr::Const(*value)))
        .collect();
    let at_point: HashMap<String, f64> = variables.iter().cloned().zip(values.iter().cloned()).collect();
    let substituted = Jacobian::substitute_matrix(hessian, &at_point);
    let Some(matrix) = Jacobian::constant_matrix(&substituted) else {
        let point = CriticalPoint::indeterminate(coordinates);
        warn!("Hessian at {} is not numeric, point left indeterminate", point);
        return point;
    };
    let point = CriticalPoint::new(coordinates, hessian_eigenvalues(&matrix), tolerance);
    if point.classification() == Classification::Indeterminate {
        warn!("second derivative test is inconclusive at {}", point);
    } else {
        info!("{} is a {}", point, point.classification());
    }
    point
}

/// Table of points with their classification and Hessian eigenvalues.
pub fn critical_points_table(points: &[CriticalPoint]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["point", "classification", "hessian eigenvalues"]);
    for point in points {
        let eigenvalues: Vec<String> = point
            .eigenvalues()
            .iter()
            .map(|ev| {
                if ev.im == 0.0 {
                    format!("{:.6}", ev.re)
                } else {
                    format!("{:.6}{:+.6}i", ev.re, ev.im)
                }
            })
            .collect();
        builder.push_record([
            point.to_string(),
            point.classification().to_string(),
            eigenvalues.join(", "),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::modern_rounded());
    table.to_string()
}
