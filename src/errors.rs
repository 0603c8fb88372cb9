//! Error types shared by the whole crate.
//!
//! Parsing and differentiation errors are propagated to the caller. Narration has no
//! failure path, the geometric interpretation degrades to placeholder text and critical
//! point classification to an indeterminate classification.
use thiserror::Error;

/// Expression text could not be turned into a symbolic tree.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Parse error in '{text}' at position {position}: {message}")]
pub struct ParseError {
    /// the text that was being parsed
    pub text: String,
    /// what the parser expected or rejected
    pub message: String,
    /// byte offset in `text` where parsing failed
    pub position: usize,
}

impl ParseError {
    pub fn new(text: &str, message: impl Into<String>, position: usize) -> Self {
        ParseError {
            text: text.to_string(),
            message: message.into(),
            position,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    #[error("Derivative order must be at least 1, got {0}")]
    InvalidOrder(usize),
    #[error("'{0}' is not a valid variable name")]
    InvalidVariable(String),
    #[error("Division by zero in '{0}'")]
    DivisionByZero(String),
    #[error("No value given for variable '{0}'")]
    UnknownVariable(String),
    #[error("Expression '{0}' produced a non-finite constant")]
    NonFinite(String),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Reported to the plotting layer as a descriptive message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisualizationError {
    #[error("No grid axis given for variable '{0}'")]
    MissingAxis(String),
    #[error("Invalid range for '{variable}': {reason}")]
    InvalidRange { variable: String, reason: String },
    #[error("This visualization is available only for functions of {expected} variables, got {found}")]
    UnsupportedDimension { expected: usize, found: usize },
    #[error(transparent)]
    Computation(#[from] ComputationError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Failed to write grid: {0}")]
    Io(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
