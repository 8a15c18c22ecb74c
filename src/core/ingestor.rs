//! Change-triggered snapshot ingestion.
//!
//! Watches the snapshot file for completed rewrites and drives one pass of
//! load, normalize and submit per detected change. Passes run one at a time
//! on the watch loop; notifications that arrive during a pass are coalesced
//! into at most one follow-up pass.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::{debug, error, info, warn};
use metrics::increment_counter;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Interval;
use uuid::Uuid;

use crate::core::normalizer::normalize_all;
use crate::core::snapshot::{self, FileFingerprint, SnapshotError};
use crate::core::transport::{BatchSubmitter, TransportError};
use crate::models::{MonitorConfig, SnapshotSchema, Verdict};

/// Errors that can occur during ingestion
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to inspect snapshot: {0}")]
    Inspect(#[source] std::io::Error),
    #[error("Failed to load snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one pass
#[derive(Debug)]
pub enum PassOutcome {
    /// Size and modification time match the last processed snapshot
    Unchanged,
    /// The snapshot could not be inspected or loaded; nothing was submitted
    Aborted(IngestError),
    /// The batch was delivered and a verdict came back
    Submitted(Verdict),
    /// The batch could not be delivered
    Failed(TransportError),
}

impl PassOutcome {
    pub fn slug(&self) -> &'static str {
        match self {
            PassOutcome::Unchanged => "unchanged",
            PassOutcome::Aborted(_) => "aborted",
            PassOutcome::Submitted(_) => "submitted",
            PassOutcome::Failed(_) => "failed",
        }
    }
}

/// Ingestor settings
#[derive(Debug, Clone)]
pub struct IngestorSettings {
    pub path: PathBuf,
    pub debounce: Duration,
    pub liveness_interval: Duration,
    pub poll_interval: Option<Duration>,
    pub schema: SnapshotSchema,
}

impl From<&MonitorConfig> for IngestorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            path: PathBuf::from(&config.snapshot_path),
            debounce: Duration::from_millis(config.debounce_ms),
            liveness_interval: Duration::from_secs(config.liveness_interval_secs.max(1)),
            poll_interval: match config.poll_interval_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            schema: config.schema.clone(),
        }
    }
}

/// Snapshot ingestor
pub struct Ingestor<S> {
    settings: IngestorSettings,
    /// Watched path with its directory resolved, as reported by notifications
    target: PathBuf,
    submitter: S,
    last_seen: Option<FileFingerprint>,
}

impl<S: BatchSubmitter> Ingestor<S> {
    pub fn new(settings: IngestorSettings, submitter: S) -> Self {
        let target = resolve_target(&settings.path);
        Self {
            settings,
            target,
            submitter,
            last_seen: None,
        }
    }

    /// Record the current snapshot as already processed
    pub fn prime(&mut self) {
        match FileFingerprint::read(&self.settings.path) {
            Ok(fingerprint) => self.last_seen = Some(fingerprint),
            Err(e) => debug!("Nothing to prime from {}: {}", self.settings.path.display(), e),
        }
    }

    pub fn last_seen(&self) -> Option<FileFingerprint> {
        self.last_seen
    }

    /// True for modify or create notifications on the watched file
    pub fn is_watched(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
            && event.paths.iter().any(|p| *p == self.target || *p == self.settings.path)
    }

    /// Debounce, check for a new snapshot, then load and submit it
    pub async fn run_pass(&mut self) -> PassOutcome {
        let pass_id = Uuid::new_v4();
        if !self.settings.debounce.is_zero() {
            tokio::time::sleep(self.settings.debounce).await;
        }

        let fingerprint = match FileFingerprint::read(&self.settings.path) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!("[{}] Failed to inspect {}: {}", pass_id, self.settings.path.display(), e);
                return PassOutcome::Aborted(IngestError::Inspect(e));
            }
        };
        if let Some(last) = &self.last_seen {
            if !fingerprint.differs_from(last) {
                debug!("[{}] Snapshot unchanged ({} bytes)", pass_id, fingerprint.size);
                return PassOutcome::Unchanged;
            }
        }

        info!("[{}] Processing new snapshot ({} bytes)", pass_id, fingerprint.size);
        let rows = match snapshot::load(&self.settings.path, &self.settings.schema) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("[{}] Skipping snapshot: {}", pass_id, e);
                return PassOutcome::Aborted(e.into());
            }
        };
        // recorded before submitting so a rewrite during the request counts as new
        self.last_seen = Some(fingerprint);

        let records = normalize_all(&rows);
        info!("[{}] Submitting {} records", pass_id, records.len());
        match self.submitter.submit(records).await {
            Ok(verdict) => {
                info!("[{}] Verdict: {}", pass_id, verdict.status.slug());
                PassOutcome::Submitted(verdict)
            }
            Err(e) => {
                warn!("[{}] Submission failed: {}", pass_id, e);
                PassOutcome::Failed(e)
            }
        }
    }

    /// Watch the snapshot until `shutdown` resolves, reporting every pass outcome
    pub async fn run<F, R>(mut self, shutdown: F, mut report: R) -> Result<(), IngestError>
    where
        F: Future<Output = ()>,
        R: FnMut(&PassOutcome),
    {
        let dir = watch_dir(&self.settings.path);
        std::fs::create_dir_all(&dir)?;
        self.target = resolve_target(&self.settings.path);

        let (watcher_tx, mut watcher_rx) = mpsc::channel::<Result<Event, notify::Error>>(100);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = watcher_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching snapshot {}", self.target.display());

        let mut liveness = tokio::time::interval(self.settings.liveness_interval);
        let mut poll = self.settings.poll_interval.map(tokio::time::interval);
        if poll.is_some() {
            self.prime();
        }
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }

                Some(res) = watcher_rx.recv() => {
                    match res {
                        Ok(event) if self.is_watched(&event) => {
                            self.process(&mut watcher_rx, &mut report).await;
                        }
                        Ok(event) => debug!("Ignoring notification {:?} for {:?}", event.kind, event.paths),
                        Err(e) => error!("File watcher error: {}", e),
                    }
                }

                _ = liveness.tick() => {
                    debug!("Monitor alive, last seen {:?}", self.last_seen);
                }

                _ = next_poll(&mut poll) => {
                    self.process(&mut watcher_rx, &mut report).await;
                }
            }
        }

        drop(watcher);
        info!("Stopped watching {}", self.target.display());
        Ok(())
    }

    async fn process<R: FnMut(&PassOutcome)>(
        &mut self,
        watcher_rx: &mut mpsc::Receiver<Result<Event, notify::Error>>,
        report: &mut R,
    ) {
        loop {
            let outcome = self.run_pass().await;
            increment_counter!("ingest_passes_total", "outcome" => outcome.slug());
            report(&outcome);

            let mut pending = false;
            while let Ok(res) = watcher_rx.try_recv() {
                match res {
                    Ok(event) => pending |= self.is_watched(&event),
                    Err(e) => error!("File watcher error: {}", e),
                }
            }
            if !pending {
                break;
            }
            debug!("Notifications arrived during the pass, checking again");
        }
    }
}

async fn next_poll(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn resolve_target(path: &Path) -> PathBuf {
    let dir = watch_dir(path);
    match (dir.canonicalize(), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}
