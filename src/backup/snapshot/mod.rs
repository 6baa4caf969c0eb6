pub mod copy;
pub mod source_walk;
pub mod archive;

use crate::backup::artifact::{artifact_file_name, temp_file_name};
use crate::backup::backup_config::BackupFormat;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use std::path::{Path, PathBuf};

/// Materializes one snapshot of `source` inside `destination_dir`.
///
/// Implementations are all-or-nothing: on success the returned path is a
/// complete artifact, on failure nothing is left under the final name.
pub trait SnapshotWriter {
    fn format(&self) -> BackupFormat;

    fn write(&self, source: &Path, destination_dir: &Path, stem: &str) -> Result<PathBuf>;
}

impl SnapshotWriter for BackupFormat {
    fn format(&self) -> BackupFormat {
        *self
    }

    fn write(&self, source: &Path, destination_dir: &Path, stem: &str) -> Result<PathBuf> {
        match self {
            BackupFormat::Archive => archive::ZipSnapshotWriter::default().write(source, destination_dir, stem),
            BackupFormat::Copy => copy::CopySnapshotWriter.write(source, destination_dir, stem),
        }
        .with_debug_object_and_fn_name(source.to_path_buf(), "write_snapshot")
    }
}

/// Builds an artifact under a hidden temp name via `build` and renames it
/// into place. An existing artifact with the final name is never replaced.
pub(crate) fn write_via_temp<F>(
    destination_dir: &Path,
    stem: &str,
    format: BackupFormat,
    build: F,
) -> Result<PathBuf>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let final_name = artifact_file_name(stem, format);
    let final_path = destination_dir.join(&final_name);
    if final_path.symlink_metadata().is_ok() {
        return Err(Error::ArtifactExists(final_path));
    }

    let tmp_path = destination_dir.join(temp_file_name(&final_name));
    // Leftover from an interrupted run.
    if tmp_path.symlink_metadata().is_ok() {
        tracing::debug!("Removing stale temp artifact {:?}", tmp_path);
        remove_path(&tmp_path)?;
    }

    let res = build(&tmp_path).and_then(|_| {
        if final_path.symlink_metadata().is_ok() {
            return Err(Error::ArtifactExists(final_path.clone()));
        }
        std::fs::rename(&tmp_path, &final_path).map_err(Error::from)
    });

    match res {
        Ok(_) => Ok(final_path),
        Err(mut e) => {
            if tmp_path.symlink_metadata().is_ok() {
                if let Err(e2) = remove_path(&tmp_path) {
                    e = e.chain(e2).with_msg(format!("Delete tmp artifact {:?} failed", tmp_path));
                }
            }
            Err(e)
        }
    }
}

/// Removes a file or a whole directory tree.
pub(crate) fn remove_path(path: &Path) -> Result<()> {
    let md = path.symlink_metadata()?;
    if md.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
