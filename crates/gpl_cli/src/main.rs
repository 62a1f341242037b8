//! gpl CLI: command-line front end for the global placer.
//!
//! Provides `gpl place` to run the placement flow on a JSON design,
//! `gpl check-config` to validate a `gpl.toml` file, and `gpl generate` to
//! produce random synthetic designs for experiments.

#![warn(missing_docs)]

mod check;
mod generate;
mod place;
mod report;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// gpl: analytic global placement.
#[derive(Parser, Debug)]
#[command(name = "gpl", version, about = "Analytic global placer")]
pub struct Cli {
    /// Suppress progress output; warnings and errors are still shown.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `gpl.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Place a design.
    Place(PlaceArgs),
    /// Validate a configuration file.
    CheckConfig {
        /// Path to the `gpl.toml` file.
        path: String,
    },
    /// Write a random synthetic design.
    Generate(GenerateArgs),
}

/// Arguments for the `gpl place` subcommand.
#[derive(Parser, Debug)]
pub struct PlaceArgs {
    /// Design file in JSON format.
    pub design: String,

    /// Where to write the placed design (default: `<design>.placed.json`).
    #[arg(short, long)]
    pub output: Option<String>,

    /// Re-enter optimization from the design's current positions.
    #[arg(long, conflicts_with = "skip_initial")]
    pub incremental: bool,

    /// Skip the quadratic initial placement.
    #[arg(long)]
    pub skip_initial: bool,

    /// Routing track pitch used by the congestion estimator.
    #[arg(long, default_value_t = 1.0)]
    pub track_pitch: f64,

    /// Output format for the run report.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `gpl generate` subcommand.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Number of movable instances.
    #[arg(long)]
    pub instances: usize,

    /// Number of fixed macros.
    #[arg(long, default_value_t = 0)]
    pub fixed: usize,

    /// Random seed.
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Output path.
    #[arg(short, long, default_value = "design.json")]
    pub output: String,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Run report format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var("TERM").is_ok(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Place(ref args) => place::run(args, &global),
        Command::CheckConfig { ref path } => check::run(path, &global),
        Command::Generate(ref args) => generate::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_place_default() {
        let cli = Cli::parse_from(["gpl", "place", "top.json"]);
        match cli.command {
            Command::Place(ref args) => {
                assert_eq!(args.design, "top.json");
                assert!(args.output.is_none());
                assert!(!args.incremental);
                assert!(!args.skip_initial);
                assert_eq!(args.track_pitch, 1.0);
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Place command"),
        }
    }

    #[test]
    fn parse_place_with_args() {
        let cli = Cli::parse_from([
            "gpl",
            "--config",
            "runs/gpl.toml",
            "place",
            "top.json",
            "--output",
            "placed.json",
            "--incremental",
            "--format",
            "json",
        ]);
        assert_eq!(cli.config.as_deref(), Some("runs/gpl.toml"));
        match cli.command {
            Command::Place(ref args) => {
                assert_eq!(args.output.as_deref(), Some("placed.json"));
                assert!(args.incremental);
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Place command"),
        }
    }

    #[test]
    fn incremental_conflicts_with_skip_initial() {
        let err = Cli::try_parse_from(["gpl", "place", "a.json", "--incremental", "--skip-initial"]);
        assert!(err.is_err());
    }

    #[test]
    fn parse_check_config() {
        let cli = Cli::parse_from(["gpl", "check-config", "gpl.toml"]);
        match cli.command {
            Command::CheckConfig { path } => assert_eq!(path, "gpl.toml"),
            _ => panic!("expected CheckConfig command"),
        }
    }

    #[test]
    fn parse_generate() {
        let cli = Cli::parse_from([
            "gpl", "generate", "--instances", "200", "--fixed", "3", "--seed", "42",
        ]);
        match cli.command {
            Command::Generate(ref args) => {
                assert_eq!(args.instances, 200);
                assert_eq!(args.fixed, 3);
                assert_eq!(args.seed, 42);
                assert_eq!(args.output, "design.json");
            }
            _ => panic!("expected Generate command"),
        }
    }

    #[test]
    fn generate_requires_instances() {
        assert!(Cli::try_parse_from(["gpl", "generate"]).is_err());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["gpl", "--quiet", "--color", "never", "check-config", "x"]);
        assert!(cli.quiet);
        assert_eq!(cli.color, ColorChoice::Never);
    }
}
