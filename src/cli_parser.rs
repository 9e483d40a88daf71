//! CLI argument parsing and help text for ime-bridge-cli.

use ime_bridge::logging::LogFormat;

/// Flags shared by all commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub verbosity: u8,
    pub json: bool,
    pub log_format: Option<LogFormat>,
}

/// Parse the flags that follow the command name.
pub fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions { verbosity: 1, ..Default::default() };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-v" | "--verbose" => options.verbosity = options.verbosity.saturating_add(1),
            "-vv" => options.verbosity = options.verbosity.saturating_add(2),
            "-q" | "--quiet" => options.verbosity = 0,
            "--json" => options.json = true,
            "--log-format" => {
                let value = args.get(i + 1).ok_or("Missing value for --log-format")?;
                options.log_format = Some(value.parse()?);
                i += 1;
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
        i += 1;
    }
    Ok(options)
}

/// Print general usage information.
pub fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "ime-bridge - input method coordination over local sockets v{}

USAGE:
    ime-bridge-cli [COMMAND] [OPTIONS]

COMMANDS:
    serve           Run the socket frontend (default when no command given)
    helper-manager  Run the helper manager
    factories       List engine factories of a running frontend
    helpers         List helpers known to a running helper manager
    version         Show version information
    help            Show this help message

OPTIONS:
    -h, --help           Show help for command
    -V, --version        Show version information
    -v, --verbose        More log output (repeatable)
    -q, --quiet          Errors only
    --log-format FORMAT  text or json
    --json               JSON output (factories, helpers)

EXAMPLES:
    ime-bridge-cli                     # Run the socket frontend
    ime-bridge-cli helper-manager -v   # Run the helper manager with info logs
    ime-bridge-cli factories --json    # List factories as JSON

ENVIRONMENT:
    IME_BRIDGE_CONFIG                 Config file (TOML)
    IME_BRIDGE_FRONTEND_ADDRESS       Frontend address (local:/path or inet:host:port)
    IME_BRIDGE_HELPER_MANAGER_ADDRESS Helper manager address
    IME_BRIDGE_STAY_RESIDENT          Keep serving after the last client leaves
    IME_BRIDGE_LOG_FORMAT             text or json
    RUST_LOG                          Log filter (overrides -v)

EXIT CODES:
    0  Success
    1  Failure
    2  Configuration error
    3  Connection error
",
        version
    );
}

/// Print detailed help for a specific command.
pub fn print_command_help(command: &str) {
    match command {
        "serve" => print_serve_help(),
        "helper-manager" => print_helper_manager_help(),
        "factories" => print_factories_help(),
        "helpers" => print_helpers_help(),
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'ime-bridge-cli help' for general usage.",
                command
            );
        }
    }
}

fn print_serve_help() {
    eprintln!(
        "ime-bridge-cli serve - Run the socket frontend

USAGE:
    ime-bridge-cli serve [OPTIONS]

DESCRIPTION:
    Serves SocketIMEngine and SocketConfig clients on the frontend address.
    Stops on Ctrl-C, or when the last client leaves if IME_BRIDGE_STAY_RESIDENT
    is false. Default command when none is specified.

EXAMPLES:
    ime-bridge-cli serve
    IME_BRIDGE_FRONTEND_ADDRESS=inet:127.0.0.1:9999 ime-bridge-cli serve -vv
"
    );
}

fn print_helper_manager_help() {
    eprintln!(
        "ime-bridge-cli helper-manager - Run the helper manager

USAGE:
    ime-bridge-cli helper-manager [OPTIONS]

DESCRIPTION:
    Lists and launches helpers described by *.toml files in the helper
    directory (IME_BRIDGE_HELPER_DIR). Stops on Ctrl-C.
"
    );
}

fn print_factories_help() {
    eprintln!(
        "ime-bridge-cli factories - List engine factories

USAGE:
    ime-bridge-cli factories [OPTIONS]

OPTIONS:
    --json         Output in JSON format

EXIT CODES:
    0  Success
    3  Connection error
"
    );
}

fn print_helpers_help() {
    eprintln!(
        "ime-bridge-cli helpers - List helpers

USAGE:
    ime-bridge-cli helpers [OPTIONS]

OPTIONS:
    --json         Output in JSON format

EXIT CODES:
    0  Success
    3  Connection error
"
    );
}
