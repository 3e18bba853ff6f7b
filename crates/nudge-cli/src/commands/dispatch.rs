use anyhow::{Context, Result};
use nudge_core::dispatch::DispatchEngine;
use nudge_core::error::CoreError;
use nudge_core::messaging::TelegramMessenger;
use nudge_core::repository::SqliteRepository;
use nudge_core::time::{now_minute_in, to_minute_key};
use std::path::Path;

use crate::cli::DispatchCommand;
use crate::config::Config;
use crate::lock::DispatchLock;
use crate::schedule;
use crate::views::table::display_report;

fn build_engine(
    repo: SqliteRepository,
    config: &Config,
) -> Result<DispatchEngine<SqliteRepository, TelegramMessenger>> {
    let messenger = TelegramMessenger::new(&config.telegram_config())?;
    Ok(DispatchEngine::new(repo, messenger, config.dispatch_config()))
}

pub async fn dispatch_once(repo: SqliteRepository, config: &Config, command: DispatchCommand) -> Result<()> {
    let tz = config.tz().map_err(CoreError::Config)?;
    let now = match command.now {
        Some(raw) => to_minute_key(&raw)?,
        None => now_minute_in(&tz),
    };
    let engine = build_engine(repo, config)?;

    let lock_path = Path::new(&config.lock_file);
    let Some(_lock) = DispatchLock::try_acquire(lock_path)
        .with_context(|| format!("Cannot open lock file {}", lock_path.display()))?
    else {
        println!("Another dispatch is in progress; nothing done.");
        return Ok(());
    };

    let report = engine.dispatch(Some(now)).await?;
    display_report(&report);
    Ok(())
}

pub async fn run(repo: SqliteRepository, config: &Config) -> Result<()> {
    let tz = config.tz().map_err(CoreError::Config)?;
    let engine = build_engine(repo, config)?;

    println!("Dispatching every minute ({tz}). Press Ctrl-C to stop.");
    schedule::run_minutely(&engine, Path::new(&config.lock_file), tz).await;
    Ok(())
}
