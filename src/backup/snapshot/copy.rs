use crate::backup::backup_config::BackupFormat;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::WithDebugObjectAndFnName;
use crate::backup::snapshot::source_walk::{nested_backup_dir, walk_source, SnapshotEntry};
use crate::backup::snapshot::{write_via_temp, SnapshotWriter};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Copies the source tree verbatim into a directory artifact.
#[derive(Clone, Copy, Debug, Default)]
pub struct CopySnapshotWriter;

impl CopySnapshotWriter {
    fn copy_tree(source: &Path, skip: Option<PathBuf>, tmp_path: &Path) -> Result<()> {
        std::fs::create_dir(tmp_path)?;

        let (dirs, files): (Vec<SnapshotEntry>, Vec<SnapshotEntry>) = walk_source(source, skip)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .partition(|e| e.is_dir);

        // Walk order puts parents first.
        for dir in &dirs {
            std::fs::create_dir_all(tmp_path.join(&dir.dst))?;
        }

        let errors = files
            .par_iter()
            .filter_map(|file| {
                std::fs::copy(&file.src, tmp_path.join(&file.dst))
                    .map_err(Error::from)
                    .with_debug_object_and_fn_name(file.src.clone(), "copy_file")
                    .err()
            })
            .collect::<Vec<_>>();
        tracing::debug!(
            "Copied {} directories and {} files into {:?}",
            dirs.len(),
            files.len() - errors.len(),
            tmp_path
        );

        convert_error_vec(errors)
    }
}

impl SnapshotWriter for CopySnapshotWriter {
    fn format(&self) -> BackupFormat {
        BackupFormat::Copy
    }

    fn write(&self, source: &Path, destination_dir: &Path, stem: &str) -> Result<PathBuf> {
        let skip = nested_backup_dir(source, destination_dir);
        write_via_temp(destination_dir, stem, BackupFormat::Copy, |tmp_path| {
            Self::copy_tree(source, skip, tmp_path)
        })
    }
}
