use crate::backup::artifact::BackupArtifact;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use crate::backup::snapshot::remove_path;
use itertools::Itertools;
use rayon::prelude::*;
use std::cmp::Reverse;
use std::fs::read_dir;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

/// How many artifacts survive a reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionPolicy {
    Unlimited,
    KeepLatest(NonZeroUsize),
}

impl From<i64> for RetentionPolicy {
    /// `<= 0` means unlimited.
    fn from(count: i64) -> Self {
        usize::try_from(count)
            .ok()
            .and_then(NonZeroUsize::new)
            .map_or(RetentionPolicy::Unlimited, RetentionPolicy::KeepLatest)
    }
}

impl RetentionPolicy {
    /// Newest first by modification time, ties broken by name descending.
    pub fn get_delete<I>(&self, artifacts: I) -> Vec<BackupArtifact>
    where
        I: IntoIterator<Item = BackupArtifact>,
    {
        match self {
            RetentionPolicy::Unlimited => Vec::new(),
            RetentionPolicy::KeepLatest(keep) => artifacts
                .into_iter()
                .sorted_by_cached_key(|a| (Reverse(a.created_at), Reverse(a.file_name())))
                .skip(keep.get())
                .collect(),
        }
    }
}

/// Deletes one artifact. Called from rayon workers.
pub trait ArtifactRemover: Send + Sync {
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Removes files and directory trees from disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsRemover;

impl ArtifactRemover for FsRemover {
    fn remove(&self, path: &Path) -> Result<()> {
        remove_path(path)
    }
}

/// Prunes artifacts of one source beyond the configured count.
#[derive(Clone, Debug)]
pub struct RetentionManager<R: ArtifactRemover = FsRemover> {
    base_name: Arc<str>,
    remover: R,
}

impl RetentionManager<FsRemover> {
    pub fn new<S: Into<Arc<str>>>(base_name: S) -> Self {
        Self::with_remover(base_name, FsRemover)
    }
}

impl<R: ArtifactRemover> RetentionManager<R> {
    pub fn with_remover<S: Into<Arc<str>>>(base_name: S, remover: R) -> Self {
        Self {
            base_name: base_name.into(),
            remover,
        }
    }

    /// Direct children of `backup_dir` following the artifact naming
    /// convention. Anything else is ignored.
    pub fn enumerate(&self, backup_dir: &Path) -> Result<Vec<BackupArtifact>> {
        let artifacts = read_dir(backup_dir)?
            .filter_map(|r| r.ok())
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                BackupArtifact::from_entry(&self.base_name, entry.path(), &metadata)
            })
            .collect_vec();
        tracing::debug!(
            "Found {} backup artifacts in {:?}",
            artifacts.len(),
            backup_dir
        );
        Ok(artifacts)
    }

    /// Deletes everything outside the retained window.
    ///
    /// The outer error covers enumeration failures. Per-artifact deletion
    /// failures do not stop the remaining deletions and come back aggregated
    /// next to the list of artifacts that were removed.
    pub fn reconcile(
        &self,
        backup_dir: &Path,
        retention_count: i64,
    ) -> Result<(Vec<BackupArtifact>, Option<Error>)> {
        let policy = RetentionPolicy::from(retention_count);
        if policy == RetentionPolicy::Unlimited {
            return Ok((Vec::new(), None));
        }

        let to_delete = policy.get_delete(
            self.enumerate(backup_dir)
                .with_msg(format!("Listing backups in {:?} failed", backup_dir))?,
        );

        let (removed, errors): (Vec<_>, Vec<_>) = to_delete
            .into_par_iter()
            .map(|artifact| {
                tracing::debug!("Removing out of retention {} {:?}", artifact.kind, artifact.path);
                self.remover
                    .remove(&artifact.path)
                    .with_debug_object_and_fn_name(artifact.path.clone(), "remove_artifact")
                    .map(|_| artifact)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .partition_result();

        Ok((removed, convert_error_vec(errors).err()))
    }
}
