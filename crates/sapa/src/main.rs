// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sapa - merchant messaging channel manager and auto-reply engine.
//!
//! This is the binary entry point for the Sapa service.

mod serve;

use clap::{Parser, Subcommand};

/// Sapa - merchant messaging channel manager and auto-reply engine.
#[derive(Parser, Debug)]
#[command(name = "sapa", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the connection manager, auto-reply engine, and gateway.
    Serve,
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match sapa_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            sapa_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("sapa serve failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            match toml::to_string_pretty(&config) {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => {
                    eprintln!("failed to render config: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("sapa: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        let config = sapa_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.service.name, "sapa");
    }
}
