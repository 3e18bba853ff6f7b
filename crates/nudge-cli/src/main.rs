use clap::Parser;
use nudge_core::db;
use nudge_core::error::CoreError;
use nudge_core::repository::SqliteRepository;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod config;
mod lock;
mod schedule;
mod views;

use cli::Commands;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match config::Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid configuration: {}", "Error:".red().bold(), e);
            std::process::exit(2);
        }
    };
    init_tracing(&config.log_level, cli.verbose);

    if let Err(e) = run(cli.command, &config).await {
        handle_error(e);
        std::process::exit(1);
    }
}

fn init_tracing(level: &str, verbose: u8) {
    let default_level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

async fn run(command: Commands, config: &config::Config) -> anyhow::Result<()> {
    let tz = config.tz().map_err(CoreError::Config)?;
    let pool = db::establish_connection_with(&config.database_path, &config.store_config()).await?;
    let repository = SqliteRepository::with_config(pool, config.store_config());

    match command {
        Commands::Dispatch(command) => {
            commands::dispatch::dispatch_once(repository, config, command).await
        }
        Commands::Run => commands::dispatch::run(repository, config).await,
        Commands::Import(command) => {
            commands::events::import_reminders(&repository, command).await
        }
        Commands::Export(command) => {
            commands::events::export_reminders(&repository, command, &tz).await
        }
        Commands::Cleanup => commands::events::cleanup(&repository, &tz).await,
        Commands::Postpone(command) => commands::occurrence::postpone(&repository, command).await,
        Commands::Reschedule(command) => {
            commands::occurrence::reschedule(&repository, command).await
        }
        Commands::Delete(command) => commands::occurrence::delete(&repository, command).await,
        Commands::Contact(command) => {
            commands::contact::contact_command(&repository, command).await
        }
        Commands::Stats => commands::events::stats(&repository).await,
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.downcast_ref::<CoreError>() {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} {}", "Error:".style(error_style), s);
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            CoreError::InvalidTimeFormat(s) => {
                eprintln!(
                    "{} Could not understand the time '{}'. Try \"2025-08-06 14:30\".",
                    "Error:".style(error_style),
                    s.yellow()
                );
            }
            CoreError::NoRecipients(s) => {
                eprintln!("{} No known recipient among: {}", "Error:".style(error_style), s.yellow());
            }
            CoreError::Config(s) => {
                eprintln!("{} {}", "Configuration error:".style(error_style), s);
            }
            CoreError::Database(e) => {
                eprintln!("{} Database error: {}", "Error:".style(error_style), e);
            }
            _ => eprintln!("{} {}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
    }
}
