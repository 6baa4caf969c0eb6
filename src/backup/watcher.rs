//! Adapter from `notify` to the [`ChangeTracker`].
//!
//! The notify callback does nothing but filter and enqueue. A single drain
//! thread owns the receiving end and folds events into the tracker, so a slow
//! backup cycle never holds up the notification backend.

use crate::backup::change_tracker::ChangeTracker;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use chrono::{DateTime, Utc};
use notify::event::{CreateKind, RemoveKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;

static DRAIN_THREAD_NAME: &str = "change-drain";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub at: DateTime<Utc>,
}

/// Reads, directory-only create/remove events and anything confined to
/// `ignored_dir` do not count as changes.
pub fn is_relevant(event: &Event, ignored_dir: Option<&Path>) -> bool {
    match event.kind {
        EventKind::Access(_)
        | EventKind::Create(CreateKind::Folder)
        | EventKind::Remove(RemoveKind::Folder) => false,
        _ => match ignored_dir {
            Some(dir) if !event.paths.is_empty() => {
                !event.paths.iter().all(|p| p.starts_with(dir))
            }
            _ => true,
        },
    }
}

/// Records every queued event until all senders are gone. Returns how many
/// events were recorded.
pub fn drain_into(rx: Receiver<ChangeEvent>, tracker: &ChangeTracker) -> usize {
    let mut count = 0usize;
    for event in rx {
        tracing::trace!("Change at {} in {:?}", event.at, event.path);
        tracker.record_change(event.at);
        count += 1;
    }
    count
}

pub struct ChangeListener {
    watcher: RecommendedWatcher,
    drain: JoinHandle<usize>,
}

impl ChangeListener {
    /// Starts watching `source` recursively.
    pub fn start(
        source: &Path,
        ignored_dir: Option<PathBuf>,
        tracker: Arc<ChangeTracker>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<ChangeEvent>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event, ignored_dir.as_deref()) => {
                let change = ChangeEvent {
                    path: event.paths.into_iter().next().unwrap_or_default(),
                    at: Utc::now(),
                };
                if let Err(e) = tx.send(change) {
                    tracing::debug!("Change listener is shutting down: {}", Error::from(e));
                }
            }
            Ok(event) => tracing::trace!("Ignoring {:?} on {:?}", event.kind, event.paths),
            Err(e) => tracing::warn!("Watcher error: {e}"),
        })?;
        watcher
            .watch(source, RecursiveMode::Recursive)
            .map_err(Error::from)
            .with_msg(format!("Watching {:?} failed", source))?;

        let drain = std::thread::Builder::new()
            .name(DRAIN_THREAD_NAME.to_string())
            .spawn(move || drain_into(rx, &tracker))?;

        tracing::debug!("Watching {:?} recursively", source);
        Ok(Self { watcher, drain })
    }

    /// Stops delivery and waits for queued events to be recorded. Returns the
    /// total number of events recorded.
    pub fn stop(self) -> Result<usize> {
        let Self { watcher, drain } = self;
        // Dropping the watcher drops the callback and with it the sender.
        drop(watcher);
        drain
            .join()
            .map_err(|_| Error::ThreadJoin(DRAIN_THREAD_NAME.to_string()))
    }
}
