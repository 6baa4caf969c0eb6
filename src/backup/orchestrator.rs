use crate::backup::artifact::{artifact_stem, BackupArtifact};
use crate::backup::backup_config::{BackupConfig, BackupFormat};
use crate::backup::change_tracker::ChangeTracker;
use crate::backup::debounce::BackupCycle;
use crate::backup::event_log::EventLog;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::retention::{ArtifactRemover, FsRemover, RetentionManager};
use crate::backup::snapshot::SnapshotWriter;
use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;
use std::sync::Arc;

/// What one successful cycle produced.
#[derive(Debug)]
pub struct CycleReport {
    pub artifact: PathBuf,
    /// Artifacts pruned by retention afterwards.
    pub removed: Vec<BackupArtifact>,
}

/// Writes a snapshot, records it with the tracker, then prunes old artifacts.
pub struct BackupOrchestrator<W: SnapshotWriter = BackupFormat, R: ArtifactRemover = FsRemover> {
    source: PathBuf,
    backup_dir: PathBuf,
    retention_count: i64,
    base_name: Arc<str>,
    writer: W,
    retention: RetentionManager<R>,
    log: Arc<EventLog>,
}

impl BackupOrchestrator<BackupFormat> {
    pub fn new(config: &BackupConfig, log: Arc<EventLog>) -> Self {
        Self::with_writer(config, config.format(), log)
    }
}

impl<W: SnapshotWriter> BackupOrchestrator<W> {
    pub fn with_writer(config: &BackupConfig, writer: W, log: Arc<EventLog>) -> Self {
        let base_name = config.archive_base_name();
        Self {
            source: config.source_path().clone(),
            backup_dir: config.backup_dir(),
            retention_count: config.retention_count(),
            retention: RetentionManager::new(base_name.clone()),
            base_name,
            writer,
            log,
        }
    }

}

impl<W: SnapshotWriter, R: ArtifactRemover> BackupOrchestrator<W, R> {
    /// Swaps how out-of-retention artifacts are deleted.
    pub fn with_remover<R2: ArtifactRemover>(self, remover: R2) -> BackupOrchestrator<W, R2> {
        BackupOrchestrator {
            retention: RetentionManager::with_remover(self.base_name.clone(), remover),
            source: self.source,
            backup_dir: self.backup_dir,
            retention_count: self.retention_count,
            base_name: self.base_name,
            writer: self.writer,
            log: self.log,
        }
    }

    fn prune(&self) -> Vec<BackupArtifact> {
        match self.retention.reconcile(&self.backup_dir, self.retention_count) {
            Ok((removed, error)) => {
                for artifact in &removed {
                    self.log
                        .cleanup(format!("Removed old backup: {}", artifact.file_name()));
                }
                for e in error.into_iter().flat_map(Error::into_iter) {
                    self.log.warning(format!("Removing old backup failed: {e}"));
                }
                removed
            }
            Err(e) => {
                self.log.warning(format!("Retention check skipped: {e}"));
                Vec::new()
            }
        }
    }
}

impl<W: SnapshotWriter, R: ArtifactRemover> BackupCycle for BackupOrchestrator<W, R> {
    /// `now` is the cycle start. It names the artifact (in local time) and
    /// becomes the tracker's backup time, so a change landing while the
    /// snapshot is written still counts as pending.
    fn run_cycle(&self, tracker: &ChangeTracker, now: DateTime<Utc>) -> Result<CycleReport> {
        let stem = artifact_stem(&self.base_name, &now.with_timezone(&Local));
        tracing::debug!("Starting backup cycle {stem}");

        let artifact = match self.writer.write(&self.source, &self.backup_dir, &stem) {
            Ok(path) => path,
            Err(e) => {
                self.log.error(format!("Backup {stem} failed: {e}"));
                return Err(e);
            }
        };
        tracker.record_backup_completed(now);

        match self.writer.format() {
            BackupFormat::Archive => self
                .log
                .backup(format!("Created ZIP: {}", artifact.display())),
            BackupFormat::Copy => self
                .log
                .backup(format!("Copied folder: {}", artifact.display())),
        }

        let removed = self.prune();
        Ok(CycleReport { artifact, removed })
    }
}
