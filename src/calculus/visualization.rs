//! Numeric grids of expressions for an external renderer.
//!
//! Grids use `ij` indexing: axis `k` of every array runs along `ranges[k]`.
//! Non-finite samples are replaced so that the renderer always receives finite
//! numbers: NaN becomes 0, infinities become the signed bound.
use crate::Utils::config::GridConfig;
use crate::calculus::models::Expression;
use crate::errors::VisualizationError;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::utils::linspace;
use csv::Writer;
use log::{debug, info};
use ndarray::{ArrayD, IxDyn, Zip};
use std::path::Path;

/// clamp for function values
pub const VALUE_BOUND: f64 = 10.0;
/// clamp for derivative values
pub const DERIVATIVE_BOUND: f64 = 5.0;
/// gradients shorter than this are not normalized
pub const MIN_GRADIENT_NORM: f64 = 1e-4;

/// sampled interval of one variable
#[derive(Debug, Clone, PartialEq)]
pub struct AxisRange {
    pub variable: String,
    pub start: f64,
    pub end: f64,
    pub samples: usize,
}

impl AxisRange {
    pub fn new(variable: &str, start: f64, end: f64, samples: usize) -> Self {
        AxisRange {
            variable: variable.to_string(),
            start,
            end,
            samples,
        }
    }

    pub fn validate(&self) -> Result<(), VisualizationError> {
        let reason = if !(self.start.is_finite() && self.end.is_finite()) {
            Some("bounds must be finite".to_string())
        } else if self.start >= self.end {
            Some(format!("start {} must be below end {}", self.start, self.end))
        } else if self.samples < 2 {
            Some(format!("at least 2 samples are needed, got {}", self.samples))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(VisualizationError::InvalidRange {
                variable: self.variable.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// evenly spaced sample points, both ends included
    pub fn values(&self) -> Vec<f64> {
        linspace(self.start, self.end, self.samples)
    }
}

/// values of an expression on a regular mesh
#[derive(Debug, Clone, PartialEq)]
pub struct NumericGrid {
    pub axes: Vec<AxisRange>,
    pub values: ArrayD<f64>,
}

impl NumericGrid {
    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// coordinate arrays of the mesh, one per axis
    pub fn mesh(&self) -> Vec<ArrayD<f64>> {
        meshgrid(&self.axes)
    }

    /// Writes the flattened grid as CSV: one column per axis, then `value`.
    pub fn save_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), VisualizationError> {
        let io_error = |e: csv::Error| VisualizationError::Io(e.to_string());
        let mut writer = Writer::from_path(path.as_ref()).map_err(io_error)?;
        let mut header: Vec<String> = self.axes.iter().map(|axis| axis.variable.clone()).collect();
        header.push("value".to_string());
        writer.write_record(&header).map_err(io_error)?;
        let axis_values: Vec<Vec<f64>> = self.axes.iter().map(|axis| axis.values()).collect();
        for (index, value) in self.values.indexed_iter() {
            let mut record: Vec<String> = axis_values
                .iter()
                .enumerate()
                .map(|(k, values)| values[index[k]].to_string())
                .collect();
            record.push(value.to_string());
            writer.write_record(&record).map_err(io_error)?;
        }
        writer.flush().map_err(|e| VisualizationError::Io(e.to_string()))?;
        info!("grid of shape {:?} saved to {}", self.shape(), path.as_ref().display());
        Ok(())
    }
}

/// `ij` indexed coordinate arrays for the given axes
pub fn meshgrid(axes: &[AxisRange]) -> Vec<ArrayD<f64>> {
    let shape: Vec<usize> = axes.iter().map(|axis| axis.samples).collect();
    axes.iter()
        .enumerate()
        .map(|(k, axis)| {
            let values = axis.values();
            ArrayD::from_shape_fn(IxDyn(&shape), |index| values[index[k]])
        })
        .collect()
}

/// NaN to 0, infinities to `±bound`, finite values unchanged
pub fn clamp_non_finite(values: ArrayD<f64>, bound: f64) -> ArrayD<f64> {
    values.mapv_into(|v| {
        if v.is_nan() {
            0.0
        } else if v == f64::INFINITY {
            bound
        } else if v == f64::NEG_INFINITY {
            -bound
        } else {
            v
        }
    })
}

fn prepare_grid_with_bound(
    tree: &Expr,
    value_ranges: &[AxisRange],
    bound: f64,
) -> Result<NumericGrid, VisualizationError> {
    for (i, axis) in value_ranges.iter().enumerate() {
        axis.validate()?;
        if value_ranges[..i].iter().any(|other| other.variable == axis.variable) {
            return Err(VisualizationError::InvalidRange {
                variable: axis.variable.clone(),
                reason: "axis given more than once".to_string(),
            });
        }
    }
    for var in tree.variables_in_order() {
        if !value_ranges.iter().any(|axis| axis.variable == var) {
            return Err(VisualizationError::MissingAxis(var));
        }
    }
    let vars: Vec<&str> = value_ranges.iter().map(|axis| axis.variable.as_str()).collect();
    let function = tree.lambdify_ndarray(&vars)?;
    let mesh = meshgrid(value_ranges);
    let values = function(&mesh);
    debug!("sampled {} on a grid of shape {:?}", tree, values.shape());
    Ok(NumericGrid {
        axes: value_ranges.to_vec(),
        values: clamp_non_finite(values, bound),
    })
}

/// Samples `tree` on the mesh of `value_ranges`; every free variable needs an axis.
/// Non-finite values are clamped to `±VALUE_BOUND`.
pub fn prepare_numeric_grid(tree: &Expr, value_ranges: &[AxisRange]) -> Result<NumericGrid, VisualizationError> {
    prepare_grid_with_bound(tree, value_ranges, VALUE_BOUND)
}

/// as [`prepare_numeric_grid`] with the derivative clamp `±DERIVATIVE_BOUND`
pub fn prepare_derivative_grid(tree: &Expr, value_ranges: &[AxisRange]) -> Result<NumericGrid, VisualizationError> {
    prepare_grid_with_bound(tree, value_ranges, DERIVATIVE_BOUND)
}

fn two_variables(expression: &Expression) -> Result<(Expr, [String; 2]), VisualizationError> {
    match expression.variables() {
        [a, b] => Ok((expression.tree()?, [a.clone(), b.clone()])),
        other => Err(VisualizationError::UnsupportedDimension {
            expected: 2,
            found: other.len(),
        }),
    }
}

/// function surface with the surfaces of both partial derivatives
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceData {
    pub function: NumericGrid,
    /// partial derivatives in variable order
    pub partials: Vec<(String, NumericGrid)>,
}

/// Surface of a function of two variables and of its partial derivatives on the
/// square `[start, end]²` of `config`.
pub fn surface_data(expression: &Expression, config: &GridConfig) -> Result<SurfaceData, VisualizationError> {
    let (tree, variables) = two_variables(expression)?;
    let ranges: Vec<AxisRange> = variables
        .iter()
        .map(|var| AxisRange::new(var, config.start, config.end, config.surface_samples))
        .collect();
    let function = prepare_grid_with_bound(&tree, &ranges, config.value_bound)?;
    let mut partials = Vec::with_capacity(2);
    for var in &variables {
        let derivative = tree.diff(var).simplify();
        partials.push((
            var.clone(),
            prepare_grid_with_bound(&derivative, &ranges, config.derivative_bound)?,
        ));
    }
    info!("surface data of {} on {:?}", expression, function.shape());
    Ok(SurfaceData { function, partials })
}

/// gradient vectors of a function of two variables over a coarse mesh
#[derive(Debug, Clone, PartialEq)]
pub struct GradientField {
    pub function: NumericGrid,
    /// ∂f/∂ of the first variable
    pub u: NumericGrid,
    /// ∂f/∂ of the second variable
    pub v: NumericGrid,
    pub u_normalized: ArrayD<f64>,
    pub v_normalized: ArrayD<f64>,
}

impl GradientField {
    /// `(x_start, y_start, x_end, y_end)` of an arrow of `length` along each normalized gradient
    pub fn arrows(&self, length: f64) -> Vec<(f64, f64, f64, f64)> {
        let mesh = self.function.mesh();
        let mut arrows = Vec::with_capacity(self.u_normalized.len());
        Zip::from(&mesh[0])
            .and(&mesh[1])
            .and(&self.u_normalized)
            .and(&self.v_normalized)
            .for_each(|&x, &y, &un, &vn| arrows.push((x, y, x + length * un, y + length * vn)));
        arrows
    }
}

pub fn gradient_field(expression: &Expression, config: &GridConfig) -> Result<GradientField, VisualizationError> {
    let (tree, [first, second]) = two_variables(expression)?;
    let ranges = vec![
        AxisRange::new(&first, config.start, config.end, config.gradient_samples),
        AxisRange::new(&second, config.start, config.end, config.gradient_samples),
    ];
    let function = prepare_grid_with_bound(&tree, &ranges, config.value_bound)?;
    let u = prepare_grid_with_bound(&tree.diff(&first).simplify(), &ranges, config.derivative_bound)?;
    let v = prepare_grid_with_bound(&tree.diff(&second).simplify(), &ranges, config.derivative_bound)?;
    let norm = Zip::from(&u.values)
        .and(&v.values)
        .map_collect(|&a, &b| {
            let n = (a * a + b * b).sqrt();
            if n > MIN_GRADIENT_NORM { n } else { 1.0 }
        });
    let u_normalized = &u.values / &norm;
    let v_normalized = &v.values / &norm;
    info!("gradient field of {} on {:?}", expression, function.shape());
    Ok(GradientField {
        function,
        u,
        v,
        u_normalized,
        v_normalized,
    })
}
