// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! varscope - drive hierarchical variable scopes from the command line
//!
//! ## Features
//!
//! - Run scope scripts from a file or inline with `-e`
//! - Interactive REPL with completion, highlighting and history
//! - Root scope defaults from `varscope.toml`

mod repl;
mod script;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use script::{Interpreter, ScriptError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use varscope_core::ScopeConfig;

/// Configuration file looked up in the working directory
const CONFIG_FILE: &str = "varscope.toml";

#[derive(Parser)]
#[command(
    name = "varscope",
    about = "Hierarchical variable scopes with reuse policies and composable getters",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Scope script to execute
    script: Option<PathBuf>,

    /// Evaluate a script from the command line
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Start the interactive REPL after running the script
    #[arg(short = 'i', long = "interactive", alias = "repl")]
    interactive: bool,

    /// Configuration file (defaults to ./varscope.toml, then the user config)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    let interpreter = Interpreter::new(&config);
    let mut ran_script = false;

    if let Some(code) = &cli.eval {
        ran_script = true;
        if !run_source(&interpreter, code) {
            return ExitCode::FAILURE;
        }
    }

    if let Some(path) = &cli.script {
        ran_script = true;
        if !run_file(&interpreter, path) {
            return ExitCode::FAILURE;
        }
    }

    if ran_script && !cli.interactive {
        return ExitCode::SUCCESS;
    }

    run_repl(config)
}

/// Start the interactive REPL
fn run_repl(config: ScopeConfig) -> ExitCode {
    match repl::Repl::new(config) {
        Ok(mut repl) => {
            if let Err(e) = repl.run() {
                eprintln!("{}: {:?}", "REPL Error".red().bold(), e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(
                "{}: Failed to initialize REPL: {:?}",
                "Error".red().bold(),
                e
            );
            ExitCode::FAILURE
        }
    }
}

/// Execute a scope script file. Returns false on failure.
fn run_file(interpreter: &Interpreter, path: &Path) -> bool {
    if !path.exists() {
        eprintln!(
            "{}: file not found '{}'",
            "Error".red().bold(),
            path.display().cyan()
        );
        return false;
    }

    match std::fs::read_to_string(path) {
        Ok(source) => run_source(interpreter, &source),
        Err(e) => {
            repl::print_error(&ScriptError::from(e));
            false
        }
    }
}

/// Run script text and print its output. Returns false on failure.
fn run_source(interpreter: &Interpreter, source: &str) -> bool {
    let mut output = Vec::new();
    let result = interpreter.eval_into(source, &mut output);
    for line in &output {
        println!("{}", line);
    }
    match result {
        Ok(()) => true,
        Err(e) => {
            repl::print_error(&e);
            false
        }
    }
}

/// Candidate configuration files, most specific first.
fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("varscope").join("config.toml"));
    }
    candidates
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<ScopeConfig> {
    if let Some(path) = explicit {
        return ScopeConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }

    for candidate in config_candidates() {
        if candidate.is_file() {
            return ScopeConfig::from_file(&candidate).with_context(|| {
                format!("failed to load configuration from {}", candidate.display())
            });
        }
    }

    Ok(ScopeConfig::default())
}

fn init_logging(config: &ScopeConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("varscope=debug,varscope_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "varscope={0},varscope_core={0}",
                config.log_level
            ))
        })
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use varscope_core::Reuse;

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from(["varscope", "-e", "print", "--verbose", "model.scope"]);
        assert_eq!(cli.eval.as_deref(), Some("print"));
        assert_eq!(cli.script, Some(PathBuf::from("model.scope")));
        assert!(cli.verbose);
        assert!(!cli.interactive);
    }

    #[test]
    fn test_load_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"debug\"\n[root]\nreuse = \"reuse_or_create_new\"").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.root.reuse, Reuse::ReuseOrCreateNew);
    }

    #[test]
    fn test_config_accepts_script_reuse_aliases() {
        for (alias, expected) in [
            ("auto", Reuse::ReuseOrCreateNew),
            ("reuse", Reuse::ReuseExistingOnly),
            ("new", Reuse::CreateNewOnly),
        ] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "[root]\nreuse = \"{}\"", alias).unwrap();
            let config = load_config(Some(file.path())).unwrap();
            assert_eq!(config.root.reuse, expected);
            assert_eq!(alias.parse::<Reuse>(), Ok(expected));
        }
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let err = load_config(Some(Path::new("/nonexistent/varscope.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to load configuration"));
    }

    #[test]
    fn test_run_source_reports_failure() {
        let interpreter = Interpreter::new(&ScopeConfig::default());
        assert!(run_source(&interpreter, "get w shape=1"));
        assert!(!run_source(&interpreter, "get w shape=1"));
    }
}
