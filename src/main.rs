#![allow(non_snake_case)]
use clap::{Parser, Subcommand};
use derivata::calculus::critical_points::{critical_points_table, find_critical_points_with};
use derivata::calculus::derivative_service::{differentiate, parse, partial_differentiate};
use derivata::calculus::derivative_steps::geometric_interpretation;
use derivata::calculus::visualization::{AxisRange, prepare_derivative_grid, prepare_numeric_grid};
use derivata::{DerivataConfig, init_logger};
use log::{error, info};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML file with grid and solver settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Derivative of a given order with the steps that produce it
    Differentiate {
        expression: String,
        /// defaults to the first variable of the expression
        #[arg(short, long)]
        variable: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        order: usize,
        /// also print the result as LaTeX
        #[arg(long)]
        latex: bool,
    },
    /// First partial derivatives with respect to every variable
    Partial {
        expression: String,
        /// variable order, comma separated
        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,
    },
    /// Stationary points classified through the Hessian
    Critical {
        expression: String,
        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,
    },
    /// Samples the expression or one of its partial derivatives into a CSV file
    Grid {
        expression: String,
        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,
        /// sample the partial derivative with respect to this variable instead
        #[arg(short, long)]
        derivative: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn declared(variables: &[String]) -> Vec<&str> {
    variables.iter().map(|v| v.as_str()).collect()
}

fn run(command: &Command, config: &DerivataConfig) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Differentiate {
            expression,
            variable,
            order,
            latex,
        } => {
            let names: Vec<String> = variable.iter().cloned().collect();
            let expression = parse(expression, &declared(&names))?;
            let variable = match variable {
                Some(variable) => variable.clone(),
                None => expression.variables().first().cloned().unwrap_or_else(|| "x".to_string()),
            };
            let result = differentiate(&expression, &variable, *order)?;
            for step in &result.steps {
                println!("{}", step);
            }
            if *latex {
                println!("{}", result.equation_latex());
            }
        }
        Command::Partial { expression, variables } => {
            let expression = parse(expression, &declared(variables))?;
            let partials = partial_differentiate(&expression)?;
            for var in &partials.variables {
                println!("∂f/∂{} = {}", var, partials.derivatives[var]);
                for step in &partials.steps[var] {
                    println!("    {}", step);
                }
            }
            println!("\n{}", geometric_interpretation(&expression));
        }
        Command::Critical { expression, variables } => {
            let expression = parse(expression, &declared(variables))?;
            let points = find_critical_points_with(&expression, &config.solver);
            println!("{}", critical_points_table(&points));
        }
        Command::Grid {
            expression,
            variables,
            derivative,
            output,
        } => {
            let expression = parse(expression, &declared(variables))?;
            let ranges: Vec<AxisRange> = expression
                .variables()
                .iter()
                .map(|var| AxisRange::new(var, config.grid.start, config.grid.end, config.grid.surface_samples))
                .collect();
            let tree = expression.tree()?;
            let grid = match derivative {
                Some(var) => prepare_derivative_grid(&tree.diff(var).simplify(), &ranges)?,
                None => prepare_numeric_grid(&tree, &ranges)?,
            };
            grid.save_to_csv(output)?;
            println!("grid of shape {:?} written to {}", grid.shape(), output.display());
        }
    }
    info!("done");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => match DerivataConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => DerivataConfig::default(),
    };
    if let Err(e) = init_logger(&config.loglevel, None) {
        eprintln!("{}", e);
    }
    match run(&cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_differentiate_arguments() {
        let cli = Cli::try_parse_from(["derivata", "differentiate", "x**3", "-v", "x", "--order", "2"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Differentiate {
                expression: "x**3".to_string(),
                variable: Some("x".to_string()),
                order: 2,
                latex: false,
            }
        );
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_variable_lists_and_global_config() {
        let cli = Cli::try_parse_from(["derivata", "critical", "x*y", "--variables", "y,x", "--config", "d.toml"])
            .unwrap();
        assert_eq!(
            cli.command,
            Command::Critical {
                expression: "x*y".to_string(),
                variables: vec!["y".to_string(), "x".to_string()],
            }
        );
        assert_eq!(cli.config, Some(PathBuf::from("d.toml")));
    }

    #[test]
    fn test_rejected_arguments() {
        assert!(Cli::try_parse_from(["derivata"]).is_err());
        assert!(Cli::try_parse_from(["derivata", "differentiate", "x", "--order", "two"]).is_err());
        assert!(Cli::try_parse_from(["derivata", "grid", "x**2"]).is_err());
    }

    #[test]
    fn test_grid_command_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("grid.csv");
        let command = Command::Grid {
            expression: "x*y".to_string(),
            variables: vec![],
            derivative: Some("x".to_string()),
            output: output.clone(),
        };
        let mut config = DerivataConfig::default();
        config.grid.surface_samples = 3;
        run(&command, &config).unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("x,y,value"));
        assert_eq!(lines.count(), 9);
    }

    #[test]
    fn test_failures_are_reported() {
        let config = DerivataConfig::default();
        let command = Command::Differentiate {
            expression: "x +* 1".to_string(),
            variable: None,
            order: 1,
            latex: false,
        };
        assert!(run(&command, &config).is_err());
        let command = Command::Differentiate {
            expression: "x**2".to_string(),
            variable: None,
            order: 0,
            latex: true,
        };
        assert!(run(&command, &config).is_err());
    }
}
