//! Incremental sync of listening history
//!
//! Pages are fetched newest first. Each record is written in its own
//! transaction, so one bad record never aborts the run. The first record
//! that is already stored means everything older was synced by a previous
//! run, and the crawl stops there.

use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::error::{RecordError, SyncError};
use crate::normalize::{decode_session, normalize_record};
use crate::source::SessionSource;
use crate::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub page_size: u32,
    /// Pages fetched before giving up on a source that never runs dry
    pub max_pages: u32,
    /// Delete stored session history before the first fetch
    pub refresh: bool,
    pub stop_on_existing: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
            refresh: config.refresh,
            stop_on_existing: config.stop_on_existing,
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source returned an empty page
    Exhausted,
    /// Reached a session stored by an earlier run
    CaughtUp { session_id: String },
    /// Hit the page ceiling
    PageLimit { pages: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub pages_fetched: u32,
    pub inserted: usize,
    /// Already-stored sessions passed over when not stopping on them
    pub skipped: usize,
    pub failed: usize,
    /// Rows removed by refresh mode, if it ran and succeeded
    pub reset_rows: Option<usize>,
    pub stop: StopReason,
}

#[derive(Debug, PartialEq, Eq)]
enum RecordOutcome {
    Inserted,
    Existing(String),
}

#[derive(Debug, PartialEq, Eq)]
enum PageOutcome {
    Continue,
    Stop(StopReason),
}

pub struct SyncController<'a, S> {
    store: &'a mut SessionStore,
    source: S,
    options: SyncOptions,
    report: SyncReport,
}

impl<'a, S: SessionSource> SyncController<'a, S> {
    pub fn new(store: &'a mut SessionStore, source: S, options: SyncOptions) -> Self {
        Self {
            store,
            source,
            options,
            report: SyncReport {
                pages_fetched: 0,
                inserted: 0,
                skipped: 0,
                failed: 0,
                reset_rows: None,
                stop: StopReason::Exhausted,
            },
        }
    }

    pub fn run(mut self) -> Result<SyncReport, SyncError> {
        if self.options.refresh {
            self.report.reset_rows = self.reset_history();
        }

        let mut page = 0u32;
        let stop = loop {
            info!(page, "fetching page");
            let records = self.source.fetch_page(page, self.options.page_size)?;
            self.report.pages_fetched += 1;

            if records.is_empty() {
                info!(page, "no more sessions");
                break StopReason::Exhausted;
            }

            if let PageOutcome::Stop(reason) = self.process_page(records) {
                break reason;
            }

            page += 1;
            if page >= self.options.max_pages {
                warn!(pages = page, "page ceiling reached; stopping");
                break StopReason::PageLimit { pages: page };
            }
        };

        self.report.stop = stop;
        info!(
            pages = self.report.pages_fetched,
            inserted = self.report.inserted,
            skipped = self.report.skipped,
            failed = self.report.failed,
            stop = ?self.report.stop,
            "sync finished"
        );
        Ok(self.report)
    }

    /// Full reset. A failure is logged and the crawl goes ahead regardless.
    pub fn reset_history(&mut self) -> Option<usize> {
        warn!("refresh requested; deleting stored listening sessions");
        match self.store.truncate_sessions() {
            Ok(rows) => {
                info!(rows, "session history cleared");
                Some(rows)
            }
            Err(e) => {
                error!(error = %e, "failed to clear session history");
                None
            }
        }
    }

    fn process_page(&mut self, records: Vec<Value>) -> PageOutcome {
        for value in records {
            let id_hint = value
                .get("id")
                .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()));

            match self.process_record(value) {
                Ok(RecordOutcome::Inserted) => self.report.inserted += 1,
                Ok(RecordOutcome::Existing(session_id)) if self.options.stop_on_existing => {
                    info!(session_id = %session_id, "found already-synced session; stopping");
                    return PageOutcome::Stop(StopReason::CaughtUp { session_id });
                }
                Ok(RecordOutcome::Existing(_)) => self.report.skipped += 1,
                Err(e) => {
                    error!(
                        session_id = id_hint.as_deref().unwrap_or("<none>"),
                        error = %e,
                        "failed to store session; skipping"
                    );
                    self.report.failed += 1;
                }
            }
        }
        PageOutcome::Continue
    }

    /// Probe, normalize and write one record inside its own transaction
    fn process_record(&mut self, value: Value) -> Result<RecordOutcome, RecordError> {
        let raw = decode_session(value)?;
        let tx = self.store.begin_record()?;

        if tx.session_exists(&raw.id)? {
            return Ok(RecordOutcome::Existing(raw.id));
        }

        let record = normalize_record(&raw);
        if let Some(user) = &record.user {
            tx.upsert_user(user)?;
        }
        if let Some(device) = &record.device {
            tx.upsert_device(device)?;
        }
        if let Some(item) = &record.library_item {
            tx.upsert_library_item(item)?;
        }
        tx.insert_session(&record.session)?;
        tx.commit()?;

        Ok(RecordOutcome::Inserted)
    }
}
