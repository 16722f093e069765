// Nudge conversational reminder assistant
// Main entry point for the nudge binary

use clap::Parser;
use nudge_engine::cli::{Cli, Command};
use nudge_engine::config::Config;
use nudge_engine::handlers::{
    handle_calendar_auth, handle_doctor, handle_parse, handle_resolve, handle_secret, handle_serve, handle_simulate,
    OutputFormat,
};
use nudge_engine::telemetry::init_telemetry_with_level;
use sdk::{EngineError, ErrorExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::info!(
        "Nudge v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let result = match cli.command {
        Command::Serve => handle_serve(&config).await,
        Command::Parse { text } => handle_parse(text, &config, format).await,
        Command::Simulate {
            text,
            sender,
            name,
            offline,
        } => handle_simulate(text, sender, name, offline, &config, format).await,
        Command::Resolve { text } => handle_resolve(text, &config, format),
        Command::Doctor => handle_doctor(&config, format).await,
        Command::CalendarAuth { port } => handle_calendar_auth(port, &config).await,
        Command::Secret { action } => handle_secret(action, format),
    };

    if let Err(e) = &result {
        let engine_error = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<EngineError>());
        if let Some(engine_error) = engine_error {
            eprintln!("Hint: {}", engine_error.user_hint());
        }
    }
    result
}
