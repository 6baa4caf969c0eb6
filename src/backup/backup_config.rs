use crate::backup::file_ext::FileExtProvider;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::{validate_non_zero_duration, validate_source_dir};
use bon::Builder;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use validator::Validate;

pub static DEFAULT_BACKUP_DIR_NAME: &str = "AutoBackups";
pub static LOG_FILE_NAME: &str = "backup_log.txt";
pub static DEFAULT_RETENTION_COUNT: i64 = 5;
pub static DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);
pub static DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub static DEFAULT_MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// How a snapshot of the source tree is materialized.
#[derive(Clone, Copy, Default, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BackupFormat {
    /// Deflate-compressed ZIP archive.
    Archive,
    /// Verbatim recursive directory copy.
    #[default]
    Copy,
}

static ZIP_FILE_EXT: OnceLock<Arc<str>> = OnceLock::new();

impl FileExtProvider for BackupFormat {
    fn file_ext(&self) -> Option<Arc<str>> {
        match self {
            BackupFormat::Archive => Some(ZIP_FILE_EXT.get_or_init(|| "zip".into()).clone()),
            BackupFormat::Copy => None,
        }
    }
}

/// Settings for one watched source. Immutable for the lifetime of a run.
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    #[validate(custom(function = validate_source_dir))]
    #[builder(into)]
    #[getset(get = "pub")]
    source_path: PathBuf,
    /// Defaults to `AutoBackups` next to the source, see [`BackupConfig::backup_dir`].
    #[builder(into)]
    backup_dir: Option<PathBuf>,
    /// Maximum number of artifacts kept; `<= 0` keeps everything.
    #[serde(default = "default_retention_count")]
    #[builder(default = DEFAULT_RETENTION_COUNT)]
    #[getset(get_copy = "pub")]
    retention_count: i64,
    /// Quiet period required after the last change before a backup is taken.
    #[serde(default = "default_cooldown", with = "humantime_serde")]
    #[builder(default = DEFAULT_COOLDOWN)]
    #[getset(get_copy = "pub")]
    cooldown: Duration,
    #[serde(default)]
    #[builder(default)]
    #[getset(get_copy = "pub")]
    format: BackupFormat,
    #[validate(custom(function = validate_non_zero_duration))]
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    #[getset(get_copy = "pub")]
    poll_interval: Duration,
    /// Upper bound of the retry delay after failed cycles; zero retries on every poll.
    #[serde(default = "default_max_retry_backoff", with = "humantime_serde")]
    #[builder(default = DEFAULT_MAX_RETRY_BACKOFF)]
    #[getset(get_copy = "pub")]
    max_retry_backoff: Duration,
}

fn default_retention_count() -> i64 {
    DEFAULT_RETENTION_COUNT
}

fn default_cooldown() -> Duration {
    DEFAULT_COOLDOWN
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_max_retry_backoff() -> Duration {
    DEFAULT_MAX_RETRY_BACKOFF
}

impl BackupConfig {
    pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .and_then(|f| serde_yml::from_reader::<_, BackupConfig>(f).map_err(Error::from))
            .with_msg(format!("Parse YAML config failed: {:?}", path))
    }

    /// Fails with [`Error::SourceMissing`] when the source does not exist and
    /// canonicalizes it otherwise. Touches nothing on disk.
    pub fn resolve_source(mut self) -> Result<Self> {
        if !self.source_path.exists() {
            return Err(Error::SourceMissing(self.source_path));
        }
        if !self.source_path.is_dir() {
            return Err(Error::NotADirectory(self.source_path));
        }
        self.source_path = self.source_path.canonicalize()?;
        Ok(self)
    }

    pub fn backup_dir(&self) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => self
                .source_path
                .parent()
                .unwrap_or(self.source_path.as_path())
                .join(DEFAULT_BACKUP_DIR_NAME),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.backup_dir().join(LOG_FILE_NAME)
    }

    /// Source basename used as the prefix of every artifact name.
    pub fn archive_base_name(&self) -> Arc<str> {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into())
            .unwrap_or_else(|| "backup".into())
    }

    /// Polling slower than half the cooldown can stretch the quiet period
    /// noticeably.
    pub fn is_poll_interval_coarse(&self) -> bool {
        self.poll_interval > self.cooldown / 2
    }

    /// One-line summary in the form printed at startup.
    pub fn describe(&self) -> String {
        format!(
            "Cooldown={}s, Buffer={}, ZIP={}",
            self.cooldown.as_secs(),
            self.retention_count,
            self.format == BackupFormat::Archive
        )
    }
}
