//! Recursive enumeration of the source tree for snapshot writers.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A file or directory under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Absolute path on disk.
    pub src: PathBuf,
    /// Path relative to the source root.
    pub dst: PathBuf,
    pub is_dir: bool,
}

impl SnapshotEntry {
    /// `dst` with `/` separators, as stored in ZIP archives. Fails on names
    /// that are not valid UTF-8 rather than storing a mangled name.
    pub fn archive_name(&self) -> Result<String> {
        let parts = self
            .dst
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_str()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::NonUtf8Path(self.src.clone()))?;
        Ok(parts.join("/"))
    }
}

/// Returns the backup directory when it lies inside the source tree, so the
/// walk can skip it. The result is rooted at `source` as given.
pub fn nested_backup_dir(source: &Path, destination_dir: &Path) -> Option<PathBuf> {
    let canonical_source = source.canonicalize().ok()?;
    let destination_dir = destination_dir.canonicalize().ok()?;
    destination_dir
        .strip_prefix(&canonical_source)
        .ok()
        .map(|rel| source.join(rel))
}

/// Walks `source` depth first, parents before children, following symlinks.
/// The root itself is not yielded.
pub fn walk_source(
    source: &Path,
    skip: Option<PathBuf>,
) -> impl Iterator<Item = Result<SnapshotEntry>> {
    let base = source.to_path_buf();
    tracing::debug!("Scanning source {:?}", base);
    WalkDir::new(source)
        .follow_links(true)
        .min_depth(1)
        .into_iter()
        .filter_entry(move |de| match &skip {
            Some(skip) => !de.path().starts_with(skip),
            None => true,
        })
        .map(move |res| match res {
            Ok(de) => process_dir_entry(de, &base),
            Err(e) => Err(e.into()),
        })
}

fn process_dir_entry<P: AsRef<Path>>(de: DirEntry, base_src_dir: P) -> Result<SnapshotEntry> {
    let is_dir = de.file_type().is_dir();
    let src = de.into_path();
    let dst = src
        .strip_prefix(base_src_dir.as_ref())
        .map(Path::to_path_buf)
        .map_err(|e| {
            Error::from(e).with_msg(format!(
                "Stripping {:?} from {:?} failed",
                base_src_dir.as_ref(),
                src
            ))
        })?;
    tracing::trace!("Including {:?} -> {:?}", src, dst);
    Ok(SnapshotEntry { src, dst, is_dir })
}
