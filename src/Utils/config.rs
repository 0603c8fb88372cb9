//! Settings of the grid preparer and of the critical point solver.
//!
//! ```toml
//! loglevel = "info"
//! [grid]
//! start = -3.0
//! end = 3.0
//! surface_samples = 50
//! [solver]
//! tolerance = 1e-10
//! search_points = 5
//! ```
//! Every key is optional, missing keys keep the defaults and unknown keys are rejected.
use crate::Utils::logger::parse_loglevel;
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// sampling of the plotting grids
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub start: f64,
    pub end: f64,
    /// samples per axis of the surface plots
    pub surface_samples: usize,
    /// samples per axis of the gradient field
    pub gradient_samples: usize,
    /// clamp for non-finite function values
    pub value_bound: f64,
    /// clamp for non-finite derivative values
    pub derivative_bound: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            start: -3.0,
            end: 3.0,
            surface_samples: 50,
            gradient_samples: 20,
            value_bound: 10.0,
            derivative_bound: 5.0,
        }
    }
}

/// Newton-Raphson search for stationary points and the eigenvalue test
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub tolerance: f64,
    /// degenerate roots converge linearly, keep room for them
    pub max_iterations: usize,
    pub damping: f64,
    /// the start points form a regular grid over [search_start, search_end] per variable
    pub search_start: f64,
    pub search_end: f64,
    pub search_points: usize,
    /// eigenvalues closer to zero count as zero
    pub eigen_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            tolerance: 1e-10,
            max_iterations: 100,
            damping: 1.0,
            search_start: -5.0,
            search_end: 5.0,
            search_points: 5,
            eigen_tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DerivataConfig {
    pub loglevel: String,
    pub grid: GridConfig,
    pub solver: SolverConfig,
}

impl Default for DerivataConfig {
    fn default() -> Self {
        DerivataConfig {
            loglevel: "info".to_string(),
            grid: GridConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.start.is_finite() && self.end.is_finite() && self.start < self.end) {
            return Err(invalid("grid.start", "start must be finite and below end"));
        }
        if self.surface_samples < 2 {
            return Err(invalid("grid.surface_samples", "at least 2 samples are needed"));
        }
        if self.gradient_samples < 2 {
            return Err(invalid("grid.gradient_samples", "at least 2 samples are needed"));
        }
        if !(self.value_bound > 0.0 && self.derivative_bound > 0.0) {
            return Err(invalid("grid.value_bound", "bounds must be positive"));
        }
        Ok(())
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance > 0.0) {
            return Err(invalid("solver.tolerance", "must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("solver.max_iterations", "must be positive"));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(invalid("solver.damping", "must be in (0, 1]"));
        }
        if !(self.search_start.is_finite() && self.search_end.is_finite() && self.search_start <= self.search_end)
        {
            return Err(invalid("solver.search_start", "must be finite and not above search_end"));
        }
        if self.search_points == 0 {
            return Err(invalid("solver.search_points", "must be positive"));
        }
        if !(self.eigen_tolerance >= 0.0) {
            return Err(invalid("solver.eigen_tolerance", "must be non-negative"));
        }
        Ok(())
    }
}

impl DerivataConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_loglevel(&self.loglevel)?;
        self.grid.validate()?;
        self.solver.validate()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: DerivataConfig = toml::from_str(text)?;
        config.loglevel = config.loglevel.to_lowercase();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DerivataConfig::from_toml_str("").unwrap();
        assert_eq!(config, DerivataConfig::default());
        assert_eq!(config.grid.surface_samples, 50);
        assert_eq!(config.grid.gradient_samples, 20);
        assert_eq!(config.solver.tolerance, 1e-10);
    }

    #[test]
    fn test_partial_override() {
        let text = r#"
            loglevel = "DEBUG"
            [grid]
            start = -1
            surface_samples = 11
            [solver]
            damping = 0.5
        "#;
        let config = DerivataConfig::from_toml_str(text).unwrap();
        assert_eq!(config.loglevel, "debug");
        assert_eq!(config.grid.start, -1.0);
        assert_eq!(config.grid.end, 3.0);
        assert_eq!(config.grid.surface_samples, 11);
        assert_eq!(config.solver.damping, 0.5);
        assert_eq!(config.solver.max_iterations, 100);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            DerivataConfig::from_toml_str("[grid]\nsurface_samples = 1"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            DerivataConfig::from_toml_str("[solver]\ndamping = 1.5"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            DerivataConfig::from_toml_str("loglevel = \"loud\""),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            DerivataConfig::from_toml_str("grid = ["),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_type_errors_come_from_toml() {
        assert!(matches!(
            DerivataConfig::from_toml_str("[grid]\nstart = \"left\""),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            DerivataConfig::from_toml_str("[solver]\nsearch_points = -2"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            DerivataConfig::from_toml_str("[solver]\ntolerence = 1e-8"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            DerivataConfig::from_toml_str("grid = 3"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[solver]\nsearch_points = 3").unwrap();
        let config = DerivataConfig::from_file(file.path()).unwrap();
        assert_eq!(config.solver.search_points, 3);
        assert!(matches!(
            DerivataConfig::from_file("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
