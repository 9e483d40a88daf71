//! ime-bridge-cli entry point.
//!
//! Runs the socket frontend or the helper manager, and queries running
//! servers.

mod cli_parser;
mod runtime_init;

use std::process::ExitCode;

use ime_bridge::cli::{run_factories, run_helpers};
use ime_bridge::config::BridgeConfig;
use ime_bridge::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "help" | "--help" | "-h" => {
            if let Some(sub) = args.get(2) {
                cli_parser::print_command_help(sub);
            } else {
                cli_parser::print_usage();
            }
            return ExitCode::SUCCESS;
        }
        "version" | "--version" | "-V" => {
            println!("ime-bridge {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    // A bare flag list means `serve` with those flags.
    let (command, rest) = if command.starts_with('-') {
        ("serve", args.get(1..).unwrap_or_default())
    } else {
        (command, args.get(2..).unwrap_or_default())
    };
    let options = match cli_parser::parse_options(rest) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            cli_parser::print_command_help(command);
            return ExitCode::FAILURE;
        }
    };

    let config = match BridgeConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2u8);
        }
    };
    let log_format = options.log_format.unwrap_or(config.log_format);
    if let Err(e) = init_logging(options.verbosity, log_format) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    match command {
        "serve" => report(runtime_init::run_frontend(&config).await),
        "helper-manager" => report(runtime_init::run_helper_manager(&config).await),
        "factories" => ExitCode::from(run_factories(&config, options.json).await as u8),
        "helpers" => ExitCode::from(run_helpers(&config, options.json).await as u8),
        _ => {
            eprintln!("Unknown command: {}", command);
            cli_parser::print_usage();
            ExitCode::FAILURE
        }
    }
}

fn report(result: Result<(), Box<dyn std::error::Error>>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
