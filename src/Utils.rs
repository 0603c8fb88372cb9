//! different utility modules used throughout the project
/// settings of the solver and of the plotting grids, read from TOML
pub mod config;
/// terminal and file logging
pub mod logger;
