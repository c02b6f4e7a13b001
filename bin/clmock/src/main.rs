#![allow(missing_docs)]
//! Consensus-layer mock binary

use clmock_cli::{
    args::{Args, Commands},
    cmd::{init::InitCmd, start::StartCmd},
    config, logging, runtime,
};
use color_eyre::eyre::{Result, eyre};
use tracing::{info, trace};

/// Main entry point for the application
///
/// This function:
/// - Parses command-line arguments
/// - Initializes logging system
/// - Sets up error handling
/// - Loads configuration and runs the selected command
fn main() -> Result<()> {
    color_eyre::install()?;

    // Also forward panics to tracing so they show up alongside the mocker's logs.
    // This supplements color-eyre's pretty panic output on stderr.
    install_tracing_panic_hook();

    let args = Args::new();

    // Logging settings come from the configuration file when there is one, command-line
    // parameters override them.
    let config_file = args
        .get_config_file_path()
        .map_err(|error| eyre!("Failed to get configuration file path: {error}"))?;
    let mut logging = match &args.command {
        Commands::Start(_) if config_file.exists() => {
            config::load_config(&config_file).map(|c| c.logging).unwrap_or_default()
        }
        _ => config::LoggingConfig::default(),
    };
    if let Some(log_level) = args.log_level {
        logging.log_level = log_level;
    }
    if let Some(log_format) = args.log_format {
        logging.log_format = log_format;
    }

    // This is a drop guard responsible for flushing any remaining logs when the program terminates.
    // It must be assigned to a binding that is not _, as _ will result in the guard being dropped
    // immediately.
    let _guard = logging::init(logging.log_level, logging.log_format);

    trace!("Command-line parameters: {args:?}");

    match &args.command {
        Commands::Start(cmd) => start(&args, cmd, logging),
        Commands::Init(cmd) => init(&args, cmd, logging),
    }
}

fn install_tracing_panic_hook() {
    use std::panic;

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let msg: &str = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "panic"
        };

        let bt = std::backtrace::Backtrace::force_capture();
        tracing::error!(target = "panic", %location, message = %msg, backtrace = %format!("{bt}"), "panic occurred");

        default_hook(info);
    }));
}

fn start(args: &Args, cmd: &StartCmd, logging: config::LoggingConfig) -> Result<()> {
    let config_file = args
        .get_config_file_path()
        .map_err(|error| eyre!("Failed to get configuration file path: {error}"))?;

    let mut config = config::load_config(&config_file)
        .map_err(|error| eyre!("Failed to load configuration file: {error}"))?;

    config.logging = logging;
    config.apply_env_overrides();

    let rt = runtime::build_runtime(config.runtime)?;

    info!(file = %config_file.display(), "Loaded configuration");

    trace!(?config, "Configuration");

    rt.block_on(cmd.run(config, &config_file))
        .map_err(|error| eyre!("Failed to run the consensus-layer mock: {error:?}"))
}

fn init(args: &Args, cmd: &InitCmd, logging: config::LoggingConfig) -> Result<()> {
    cmd.run(&args.get_config_file_path()?, &args.get_jwt_secret_file_path()?, logging)
        .map_err(|error| eyre!("Failed to run init command {error:?}"))
}
