// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Chamber Authors

//! # chamberctl
//!
//! Resolves the chamber configuration from defaults, `CHAMBER_*`
//! environment variables, command line flags and override configuration
//! blobs, and prints the result.

use anyhow::{Context, Result};
use chamber::config::{
    ChamberConfigError, Config, Flag, CONFIG_AWS_REGION, CONFIG_BASE,
    CONFIG_KMS_KEY, CONFIG_RETRIES, CONFIG_SKIP_BASE_CONFIG,
    CONFIG_USE_PATHS, DEFAULT_RETRIES,
};
use clap::{
    parser::ValueSource, ArgAction, ArgMatches, CommandFactory,
    FromArgMatches, Parser, Subcommand,
};
use log::{debug, error};
use std::{fs, path::PathBuf, process};

/// Resolve the chamber configuration
#[derive(Debug, Parser)]
#[command(
    name = "chamberctl",
    version,
    about = "Resolve and print the chamber configuration",
    after_long_help = "CONFIGURATION SOURCES (highest to lowest priority):\n  \
        1. Override configuration (--config, then --config-text)\n  \
        2. Command-line arguments (--retries, --kms-key, etc.)\n  \
        3. Environment variables (CHAMBER_RETRIES, CHAMBER_KMS_KEY, etc.)\n  \
        4. Built-in defaults"
)]
struct Cli {
    /// Override configuration file, a JSON object or properties text
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Inline override configuration, merged after --config
    #[arg(long, value_name = "TEXT")]
    config_text: Option<String>,

    /// Number of retries for backend requests
    #[arg(short, long, value_name = "N", default_value_t = DEFAULT_RETRIES)]
    retries: i64,

    /// KMS key ID, ARN or alias used to encrypt secrets
    #[arg(long, value_name = "KEY")]
    kms_key: Option<String>,

    /// Address secrets by path instead of by name
    #[arg(long)]
    use_paths: bool,

    /// Do not load the base configuration
    #[arg(long)]
    skip_base_config: bool,

    /// Enable verbose logging
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Suppress all logging
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, Subcommand)]
enum Commands {
    /// Print every option that is set as JSON (default)
    Show,
    /// Print the value each accessor returns, after normalization
    Resolve,
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli, &matches) {
        error!("{e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli, matches: &ArgMatches) -> Result<()> {
    let mut config =
        Config::new().context("Failed to create configuration")?;

    bind_flags(&mut config, cli, matches)
        .context("Failed to bind command line flags")?;

    if let Some(ref path) = cli.config {
        let text = fs::read_to_string(path).with_context(|| {
            format!("Failed to read configuration file {}", path.display())
        })?;
        config.merge_config(&text).with_context(|| {
            format!("Failed to merge configuration file {}", path.display())
        })?;
    }

    if let Some(ref text) = cli.config_text {
        config
            .merge_config(text)
            .context("Failed to merge inline configuration")?;
    }

    debug!("Resolved configuration: {config}");

    match cli.command.unwrap_or(Commands::Show) {
        Commands::Show => println!("{}", config.marshal()?),
        Commands::Resolve => print_resolved(&config),
    }

    Ok(())
}

/// Bind the parsed flags into the configuration
///
/// Only flags given on the command line override the environment; the
/// default of `--retries` only fills in when nothing else sets it.
fn bind_flags(
    config: &mut Config,
    cli: &Cli,
    matches: &ArgMatches,
) -> Result<(), ChamberConfigError> {
    let retries = if matches.value_source("retries")
        == Some(ValueSource::CommandLine)
    {
        Flag::changed(cli.retries)
    } else {
        Flag::unchanged(cli.retries)
    };
    config.bind_flag(CONFIG_RETRIES, retries)?;

    if let Some(ref key) = cli.kms_key {
        config.bind_flag(CONFIG_KMS_KEY, Flag::changed(key.as_str()))?;
    }

    if cli.use_paths {
        config.bind_flag(CONFIG_USE_PATHS, Flag::changed(true))?;
    }

    if cli.skip_base_config {
        config.bind_flag(CONFIG_SKIP_BASE_CONFIG, Flag::changed(true))?;
    }

    Ok(())
}

fn print_resolved(config: &Config) {
    let unset = || "<unset>".to_string();

    println!("{CONFIG_BASE}: {}", config.base().unwrap_or_else(unset));
    println!("{CONFIG_KMS_KEY}: {}", config.kms_key());
    println!(
        "{CONFIG_AWS_REGION}: {}",
        config.aws_region().unwrap_or_else(unset)
    );
    println!("{CONFIG_USE_PATHS}: {}", config.use_paths());
    println!("{CONFIG_SKIP_BASE_CONFIG}: {}", config.skip_base_config());
    println!("base-config-path: {}", config.base_config_path());
    println!("{CONFIG_RETRIES}: {}", config.retries());
}

fn init_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let log_level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    pretty_env_logger::formatted_builder()
        .filter_level(log_level)
        .target(pretty_env_logger::env_logger::Target::Stderr)
        .init();
}
