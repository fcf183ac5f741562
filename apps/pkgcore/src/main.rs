//! pkgcore command line interface
//!
//! Fetches packages into a checksum-named cache and manages detached
//! signatures through pluggable signing backends.

mod cli;
mod commands;
mod display;
mod error;
mod logging;

use crate::cli::{Cli, Commands};
use crate::commands::CommandContext;
use crate::display::{CommandOutput, OutputRenderer};
use crate::error::CliError;
use clap::Parser;
use pkgcore_config::Config;
use pkgcore_events::{AppEvent, EventEmitter, EventReceiver, EventSender, GeneralEvent};
use pkgcore_types::OutputFormat;
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    logging::init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting pkgcore v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    if let Some(cache_dir) = &cli.global.cache_dir {
        config.paths.cache_dir = Some(cache_dir.clone());
    }

    let (event_sender, event_receiver) = pkgcore_events::channel();
    let ctx = CommandContext::new(config, event_sender.clone());

    let format = if cli.global.json {
        OutputFormat::Json
    } else {
        OutputFormat::Tty
    };
    let renderer = OutputRenderer::new(format);

    let result =
        execute_command_with_events(cli.command, &ctx, &event_sender, event_receiver).await?;

    renderer.render_result(&result)?;

    info!("Command completed successfully");
    Ok(())
}

async fn execute_command_with_events(
    command: Commands,
    ctx: &CommandContext,
    events: &EventSender,
    mut event_receiver: EventReceiver,
) -> Result<CommandOutput, CliError> {
    let operation = command.operation().to_string();
    events.emit(AppEvent::General(GeneralEvent::OperationStarted {
        operation: operation.clone(),
    }));

    let mut command_future = Box::pin(ctx.execute(command));

    let result = loop {
        select! {
            result = &mut command_future => break result,

            event = event_receiver.recv() => {
                if let Some(event) = event {
                    logging::log_event_with_tracing(&event);
                }
            }
        }
    };

    events.emit(AppEvent::General(GeneralEvent::OperationCompleted {
        operation,
        success: result.is_ok(),
    }));
    while let Ok(event) = event_receiver.try_recv() {
        logging::log_event_with_tracing(&event);
    }

    result
}
