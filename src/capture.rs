// Capture orchestration: harvest -> enrich -> assemble, one capture at a time

use crate::assembler::{assemble, resolve_source_name};
use crate::config::HarvestConfig;
use crate::enrichment::{EnrichmentReport, Enricher, HttpBackend, LookupBackend, LookupError};
use crate::events::{CaptureStatus, CaptureStatusPayload};
use crate::harvest::{Harvester, LoopState};
use crate::models::Snapshot;
use crate::source::DomSource;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Could not find the message list. Focus the conversation view and try again.")]
    ContainerNotFound,

    #[error("A capture is already running")]
    AlreadyRunning,
}

/// Result of a successful capture
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub snapshot: Snapshot,
    /// Converged, or TimeCapped for a partial history
    pub state: LoopState,
    pub iterations: u32,
    pub enrichment: EnrichmentReport,
}

/// Runs captures against windowed sources, rejecting overlapping requests
pub struct CaptureSession<B> {
    config: HarvestConfig,
    enricher: Option<Enricher<B>>,
    running: AtomicBool,
    status_tx: Option<mpsc::UnboundedSender<CaptureStatusPayload>>,
}

/// Clears the running flag when a capture ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CaptureSession<HttpBackend> {
    /// Session using the HTTP backend described by `config`
    ///
    /// Enrichment is skipped when disabled or when no origin is configured.
    pub fn from_config(config: HarvestConfig) -> Self {
        let backend = if config.backend.enabled {
            match HttpBackend::new(&config.backend) {
                Ok(backend) => Some(backend),
                Err(LookupError::MissingOrigin) => {
                    log::warn!("[Capture] No backend origin configured, enrichment disabled");
                    None
                }
                Err(e) => {
                    log::warn!("[Capture] Failed to create backend client, enrichment disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };
        Self::new(config, backend)
    }
}

impl<B: LookupBackend> CaptureSession<B> {
    pub fn new(config: HarvestConfig, backend: Option<B>) -> Self {
        let enricher = backend.map(|b| Enricher::new(b, &config.backend));
        Self {
            config,
            enricher,
            running: AtomicBool::new(false),
            status_tx: None,
        }
    }

    /// Send status events for every capture to `sender`
    pub fn with_status_sender(mut self, sender: mpsc::UnboundedSender<CaptureStatusPayload>) -> Self {
        self.status_tx = Some(sender);
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Capture the full history rendered by `source`
    ///
    /// Delivers exactly one outcome: a (possibly partial) snapshot, or a
    /// single error.
    pub async fn start_capture<S: DomSource>(
        &self,
        source: &mut S,
    ) -> Result<CaptureOutcome, CaptureError> {
        let Some(_guard) = self.try_begin() else {
            log::warn!("[Capture] Rejected capture request: another capture is running");
            return Err(CaptureError::AlreadyRunning);
        };

        let capture_id = uuid::Uuid::new_v4().to_string();
        log::info!("[Capture] Starting capture {}", capture_id);
        self.emit(&capture_id, CaptureStatus::Running, None, None);

        let result = self.run_capture(source).await;

        match &result {
            Ok(outcome) => {
                log::info!(
                    "[Capture] Capture {} finished: {} records from '{}' ({:?})",
                    capture_id,
                    outcome.snapshot.metadata.total_records,
                    outcome.snapshot.metadata.source_name,
                    outcome.state
                );
                self.emit(
                    &capture_id,
                    CaptureStatus::Done,
                    None,
                    Some(outcome.snapshot.metadata.total_records),
                );
            }
            Err(e) => {
                log::error!("[Capture] Capture {} failed: {}", capture_id, e);
                self.emit(&capture_id, CaptureStatus::Error, Some(e.to_string()), None);
            }
        }

        result
    }

    async fn run_capture<S: DomSource>(&self, source: &mut S) -> Result<CaptureOutcome, CaptureError> {
        let start = Instant::now();

        let harvest = Harvester::new(&self.config).run(source).await;
        if !harvest.state.is_success() {
            return Err(CaptureError::ContainerNotFound);
        }

        let mut records = harvest.records;
        let enrichment = match &self.enricher {
            Some(enricher) if self.config.backend.enabled => enricher.enrich(&mut records).await,
            _ => {
                log::debug!("[Capture] Enrichment skipped");
                EnrichmentReport::default()
            }
        };

        let source_name = resolve_source_name(
            &*source,
            &self.config.selectors.source_name,
            &self.config.output.fallback_source_name,
        );
        let snapshot = assemble(records, source_name, Utc::now(), start.elapsed());

        Ok(CaptureOutcome {
            snapshot,
            state: harvest.state,
            iterations: harvest.iterations,
            enrichment,
        })
    }

    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard(&self.running))
    }

    fn emit(
        &self,
        capture_id: &str,
        status: CaptureStatus,
        message: Option<String>,
        total_records: Option<usize>,
    ) {
        if let Some(tx) = &self.status_tx {
            // A dropped receiver only means nobody is watching
            let _ = tx.send(CaptureStatusPayload {
                capture_id: capture_id.to_string(),
                status,
                message,
                total_records,
            });
        }
    }
}
