//! LAMBDIFICATION - Converting Symbolic Expressions to Executable Functions
//!
//! Two flavours:
//! - `lambdify(vars)`: closure over a slice of scalar arguments, used by the
//!   Newton-Raphson solver and for point evaluation
//! - `lambdify_ndarray(vars)`: closure over whole `ndarray` grids, one array operation
//!   per tree node, used to sample functions on meshes for plotting
use crate::errors::ComputationError;
use crate::symbolic::symbolic_engine::Expr;
use ndarray::{ArrayD, IxDyn, Zip};

/// compiled scalar function of a slice of arguments
pub type ScalarFn = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;
/// compiled function evaluated element-wise over equally shaped grids
pub type GridFn = Box<dyn Fn(&[ArrayD<f64>]) -> ArrayD<f64> + Send + Sync>;

fn position_of(vars: &[&str], name: &str) -> Result<usize, ComputationError> {
    vars.iter()
        .position(|&x| x == name)
        .ok_or_else(|| ComputationError::UnknownVariable(name.to_string()))
}

impl Expr {
    /// Converts a symbolic expression into an executable Rust closure whose `i`-th
    /// argument is the value of `vars[i]`.
    ///
    /// # Examples
    /// ```rust, ignore
    /// let f = Expr::parse_expression("x**2 + y").unwrap();
    /// let func = f.lambdify(&["x", "y"]).unwrap();
    /// assert_eq!(func(&[3.0, 1.0]), 10.0);
    /// ```
    pub fn lambdify(&self, vars: &[&str]) -> Result<ScalarFn, ComputationError> {
        let compiled: ScalarFn = match self {
            Expr::Var(name) => {
                let index = position_of(vars, name)?;
                Box::new(move |args| args[index])
            }
            Expr::Const(val) => {
                let val = *val;
                Box::new(move |_| val)
            }
            Expr::Add(lhs, rhs) => {
                let lf = lhs.lambdify(vars)?;
                let rf = rhs.lambdify(vars)?;
                Box::new(move |args| lf(args) + rf(args))
            }
            Expr::Sub(lhs, rhs) => {
                let lf = lhs.lambdify(vars)?;
                let rf = rhs.lambdify(vars)?;
                Box::new(move |args| lf(args) - rf(args))
            }
            Expr::Mul(lhs, rhs) => {
                let lf = lhs.lambdify(vars)?;
                let rf = rhs.lambdify(vars)?;
                Box::new(move |args| lf(args) * rf(args))
            }
            Expr::Div(lhs, rhs) => {
                let lf = lhs.lambdify(vars)?;
                let rf = rhs.lambdify(vars)?;
                Box::new(move |args| lf(args) / rf(args))
            }
            Expr::Pow(b, e) => {
                let bf = b.lambdify(vars)?;
                let ef = e.lambdify(vars)?;
                Box::new(move |args| bf(args).powf(ef(args)))
            }
            Expr::Func(kind, arg) => {
                let kind = *kind;
                let f = arg.lambdify(vars)?;
                Box::new(move |args| kind.apply(f(args)))
            }
        };
        Ok(compiled)
    } // end of lambdify

    /// Vectorized lambdify: the closure takes one grid per variable (all of the same
    /// shape) and returns the grid of function values. IEEE semantics are kept, so
    /// poles and domain errors show up as inf/NaN elements.
    pub fn lambdify_ndarray(&self, vars: &[&str]) -> Result<GridFn, ComputationError> {
        let compiled: GridFn = match self {
            Expr::Var(name) => {
                let index = position_of(vars, name)?;
                Box::new(move |grids| grids[index].clone())
            }
            Expr::Const(val) => {
                let val = *val;
                Box::new(move |grids| match grids.first() {
                    Some(grid) => ArrayD::from_elem(grid.raw_dim(), val),
                    None => ArrayD::from_elem(IxDyn(&[]), val),
                })
            }
            Expr::Add(lhs, rhs) => {
                let lf = lhs.lambdify_ndarray(vars)?;
                let rf = rhs.lambdify_ndarray(vars)?;
                Box::new(move |grids| &lf(grids) + &rf(grids))
            }
            Expr::Sub(lhs, rhs) => {
                let lf = lhs.lambdify_ndarray(vars)?;
                let rf = rhs.lambdify_ndarray(vars)?;
                Box::new(move |grids| &lf(grids) - &rf(grids))
            }
            Expr::Mul(lhs, rhs) => {
                let lf = lhs.lambdify_ndarray(vars)?;
                let rf = rhs.lambdify_ndarray(vars)?;
                Box::new(move |grids| &lf(grids) * &rf(grids))
            }
            Expr::Div(lhs, rhs) => {
                let lf = lhs.lambdify_ndarray(vars)?;
                let rf = rhs.lambdify_ndarray(vars)?;
                Box::new(move |grids| &lf(grids) / &rf(grids))
            }
            Expr::Pow(b, e) => {
                let bf = b.lambdify_ndarray(vars)?;
                let ef = e.lambdify_ndarray(vars)?;
                Box::new(move |grids| {
                    Zip::from(&bf(grids))
                        .and(&ef(grids))
                        .map_collect(|&base, &exp| base.powf(exp))
                })
            }
            Expr::Func(kind, arg) => {
                let kind = *kind;
                let f = arg.lambdify_ndarray(vars)?;
                Box::new(move |grids| f(grids).mapv_into(|x| kind.apply(x)))
            }
        };
        Ok(compiled)
    }
}
