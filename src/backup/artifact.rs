//! Backup artifact model and the naming convention shared by the snapshot
//! writers and retention.
//!
//! An artifact is named `<base>_<YYYY-MM-DD_HH-MM-SS>` and is either a `.zip`
//! file or an extension-less directory.

use crate::backup::backup_config::BackupFormat;
use crate::backup::file_ext::FileExtProvider;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fmt::{Display, Formatter};
use std::fs::Metadata;
use std::path::PathBuf;

pub static ARTIFACT_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
/// Rendered length of [`ARTIFACT_TIME_FORMAT`].
const ARTIFACT_TIME_LEN: usize = 19;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Archive,
    Directory,
}

impl From<BackupFormat> for ArtifactKind {
    fn from(value: BackupFormat) -> Self {
        match value {
            BackupFormat::Archive => ArtifactKind::Archive,
            BackupFormat::Copy => ArtifactKind::Directory,
        }
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Archive => f.write_str("archive"),
            ArtifactKind::Directory => f.write_str("directory"),
        }
    }
}

/// One materialized backup found in (or written to) the backup directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    /// Filesystem modification time at enumeration.
    pub created_at: DateTime<Utc>,
    pub kind: ArtifactKind,
}

impl BackupArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Builds an artifact from a directory entry if its name and type follow
    /// the convention for `base_name`.
    pub fn from_entry(base_name: &str, path: PathBuf, metadata: &Metadata) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let kind = parse_artifact_name(base_name, file_name)?.1;
        let type_matches = match kind {
            ArtifactKind::Archive => metadata.is_file(),
            ArtifactKind::Directory => metadata.is_dir(),
        };
        if !type_matches {
            return None;
        }
        let created_at: DateTime<Utc> = metadata.modified().ok()?.into();
        Some(Self {
            path,
            created_at,
            kind,
        })
    }
}

/// Artifact stem for a snapshot taken at `dt`, without extension.
pub fn artifact_stem<Tz: TimeZone>(base_name: &str, dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("{base_name}_{}", dt.format(ARTIFACT_TIME_FORMAT))
}

/// Final file name of an artifact with the given stem.
pub fn artifact_file_name(stem: &str, format: BackupFormat) -> String {
    match format.file_ext() {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

/// Hidden working name used until a snapshot is complete.
pub fn temp_file_name(final_name: &str) -> String {
    format!(".{final_name}.tmp")
}

/// Parses `<base_name>_<timestamp>[.zip]`, returning the embedded timestamp
/// and the artifact kind implied by the extension.
pub fn parse_artifact_name(base_name: &str, file_name: &str) -> Option<(NaiveDateTime, ArtifactKind)> {
    let rest = file_name.strip_prefix(base_name)?.strip_prefix('_')?;
    let archive_ext = BackupFormat::Archive.file_ext().map(|ext| format!(".{ext}"))?;
    let (time_str, kind) = match rest.strip_suffix(archive_ext.as_str()) {
        Some(stem) => (stem, ArtifactKind::Archive),
        None => (rest, ArtifactKind::Directory),
    };
    if time_str.len() != ARTIFACT_TIME_LEN {
        return None;
    }
    NaiveDateTime::parse_from_str(time_str, ARTIFACT_TIME_FORMAT)
        .ok()
        .map(|dt| (dt, kind))
}
