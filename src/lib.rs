// Copyright (c)  by Gleb E. Zaslavkiy
//MIT License
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
pub mod Examples;
pub mod Utils;
pub mod calculus;
pub mod errors;
pub mod numerical;
pub mod symbolic;

pub use Utils::config::{DerivataConfig, GridConfig, SolverConfig};
pub use Utils::logger::init_logger;
pub use calculus::critical_points::{critical_points_table, find_critical_points, find_critical_points_with};
pub use calculus::derivative_service::{differentiate, parse, partial_differentiate};
pub use calculus::derivative_steps::{geometric_interpretation, narrate};
pub use calculus::models::{Classification, CriticalPoint, DerivativeResult, Expression, PartialDerivativeResult};
pub use calculus::visualization::{
    AxisRange, NumericGrid, gradient_field, prepare_derivative_grid, prepare_numeric_grid, surface_data,
};
pub use errors::{ComputationError, ConfigError, ParseError, VisualizationError};
pub use symbolic::symbolic_engine::Expr;
