//! Weft - live development tool for remote-hosted themes.

#![allow(dead_code)]

mod api;
mod cli;
mod config;
mod core;
mod embed;
mod logger;
mod mirror;
mod reload;
mod serve;
mod sync;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::Config;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Dev { interface, port } => {
            if let Some(interface) = interface {
                config.serve.interface = interface;
            }
            if let Some(port) = port {
                config.serve.port = port;
            }
            cli::dev::run(config)
        }
        Commands::Push { sync_args } => {
            let client = cli::api_client(&config)?;
            sync::push(&config, &client, sync_args.into())
        }
        Commands::Pull { sync_args } => {
            let client = cli::api_client(&config)?;
            sync::pull(&config, &client, sync_args.into())
        }
        Commands::Publish { force } => {
            let client = cli::api_client(&config)?;
            cli::publish::run(&config, &client, force)
        }
    }
}
