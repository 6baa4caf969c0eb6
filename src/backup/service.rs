use crate::backup::backup_config::BackupConfig;
use crate::backup::change_tracker::ChangeTracker;
use crate::backup::debounce::{DebounceEngine, TickOutcome, Ticker};
use crate::backup::event_log::EventLog;
use crate::backup::orchestrator::BackupOrchestrator;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::shutdown::ShutdownSignal;
use crate::backup::validate::validate_dir_exist_or_created;
use crate::backup::watcher::ChangeListener;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Process lifecycle around one watched source.
pub struct BackupService;

impl BackupService {
    /// Runs until `shutdown` is raised. The source must already be resolved.
    ///
    /// A cycle in flight when shutdown arrives is allowed to finish. Startup
    /// failures after the log is open are recorded there as well as returned.
    pub fn run(config: &BackupConfig, shutdown: &ShutdownSignal) -> Result<()> {
        let backup_dir = config.backup_dir();
        validate_dir_exist_or_created(&backup_dir)
            .map_err(Error::from)
            .with_msg(format!("Preparing backup directory {:?} failed", backup_dir))?;
        let log = Arc::new(EventLog::open_append(config.log_path())?);

        log.info(format!("Watching source: {}", config.source_path().display()));
        log.info(format!("Backups stored in: {}", backup_dir.display()));
        log.info(config.describe());
        log.separator();
        if config.is_poll_interval_coarse() {
            log.warning(format!(
                "Poll interval {} exceeds half the cooldown, backups may start late",
                humantime::format_duration(config.poll_interval())
            ));
        }

        let tracker = Arc::new(ChangeTracker::new());
        let listener = backup_dir
            .canonicalize()
            .map_err(Error::from)
            .and_then(|ignored| {
                ChangeListener::start(config.source_path(), Some(ignored), tracker.clone())
            });
        let listener = match listener {
            Ok(listener) => listener,
            Err(e) => {
                log.error(format!("Starting change listener failed: {e}"));
                return Err(e);
            }
        };

        let orchestrator = BackupOrchestrator::new(config, log.clone());
        let mut engine = DebounceEngine::from_config(config);
        let ticker = Ticker::new(config.poll_interval());
        while ticker.wait(shutdown) {
            match engine.tick(&tracker, Utc::now(), &orchestrator) {
                TickOutcome::BackedUp(report) => debug!(
                    "Backed up to {:?}, pruned {}",
                    report.artifact,
                    report.removed.len()
                ),
                TickOutcome::Deferred { until } => debug!("Retry deferred until {until}"),
                TickOutcome::Idle | TickOutcome::Failed { .. } => {}
            }
        }

        info!("Shutdown requested");
        let stopped = listener.stop();
        drop(orchestrator);
        match &stopped {
            Ok(events) => log.info(format!("Backup service stopped after {events} change events")),
            Err(e) => log.error(format!("Stopping change listener failed: {e}")),
        }

        match Arc::try_unwrap(log) {
            Ok(log) => log.close()?,
            Err(_) => debug!("Event log still shared, closing on drop"),
        }
        stopped.map(|_| ())
    }
}
