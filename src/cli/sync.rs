//! Sync command implementation

use anyhow::Result;

use crate::config::Config;
use crate::source::AbsSessionSource;
use crate::store::SessionStore;
use crate::sync::{StopReason, SyncController, SyncOptions, SyncReport};

pub fn run(store: &mut SessionStore, config: &Config) -> Result<SyncReport> {
    let api = config.api_settings()?;
    let source = AbsSessionSource::new(&api)?;

    let report = SyncController::new(store, source, SyncOptions::from(&config.sync)).run()?;

    let stop = match &report.stop {
        StopReason::Exhausted => "reached the end of the remote history".to_string(),
        StopReason::CaughtUp { session_id } => format!("caught up at session {}", session_id),
        StopReason::PageLimit { pages } => format!("stopped at the {}-page ceiling", pages),
    };
    println!(
        "Synced {} new sessions ({} failed, {} skipped) over {} pages; {}.",
        report.inserted, report.failed, report.skipped, report.pages_fetched, stop
    );

    Ok(report)
}
