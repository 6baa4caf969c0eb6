use auto_backup::backup::backup_config::{
    BackupConfig, BackupFormat, DEFAULT_RETENTION_COUNT,
};
use auto_backup::backup::result_error::error::Error;
use auto_backup::backup::result_error::result::Result;
use auto_backup::backup::result_error::WithMsg;
use auto_backup::backup::service::BackupService;
use auto_backup::backup::shutdown::ShutdownSignal;
use clap::Parser;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;
use tracing::error;
use validator::{Validate, ValidationError};

/// Watch a folder and keep debounced, rotated backups of it
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory to watch
    #[arg(long, required_unless_present = "config")]
    source_path: Option<PathBuf>,
    /// Destination directory, defaults to AutoBackups next to the source
    #[arg(long)]
    backup_path: Option<PathBuf>,
    /// Number of backups to keep, 0 or less keeps all
    #[arg(long, default_value_t = DEFAULT_RETENTION_COUNT, allow_negative_numbers = true)]
    buffer_size: i64,
    /// Seconds without changes before a backup starts
    #[arg(long, default_value_t = 5)]
    cooldown: u64,
    /// Store backups as ZIP archives instead of folder copies
    #[arg(long)]
    zip: bool,
    /// How often the debounce condition is checked
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1s")]
    poll_interval: Duration,
    /// Upper bound of the delay between retries of a failing backup, 0s retries every poll
    #[arg(long, value_parser = humantime::parse_duration, default_value = "60s")]
    max_retry_backoff: Duration,
    /// YAML config file used instead of the flags above
    #[arg(short, long, conflicts_with_all = ["source_path", "backup_path"])]
    config: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<BackupConfig> {
        if let Some(path) = self.config {
            return BackupConfig::load_yaml(path);
        }
        let source_path = self.source_path.ok_or_else(|| {
            Error::from(
                ValidationError::new("MissingSource")
                    .with_message("--source-path is required".into()),
            )
        })?;
        Ok(BackupConfig::builder()
            .source_path(source_path)
            .maybe_backup_dir(self.backup_path)
            .retention_count(self.buffer_size)
            .cooldown(Duration::from_secs(self.cooldown))
            .format(if self.zip {
                BackupFormat::Archive
            } else {
                BackupFormat::Copy
            })
            .poll_interval(self.poll_interval)
            .max_retry_backoff(self.max_retry_backoff)
            .build())
    }
}

fn run(args: Args) -> Result<()> {
    // Nothing may be created before the source is known to exist.
    let config = args.into_config()?.resolve_source()?;
    config
        .validate()
        .map_err(Error::from)
        .with_msg("Config validation failed")?;

    let shutdown = ShutdownSignal::new();
    shutdown.install_signal_handlers()?;
    BackupService::run(&config, &shutdown)
}

fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run(Args::parse()) {
        error!("{e}");
        exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_flags_defaults() {
        let config = Args::try_parse_from(["auto-backup", "--source-path", "/data/docs"])
            .unwrap()
            .into_config()
            .unwrap();

        assert_eq!(config.source_path(), &PathBuf::from("/data/docs"));
        assert_eq!(config.backup_dir(), PathBuf::from("/data/AutoBackups"));
        assert_eq!(config.retention_count(), 5);
        assert_eq!(config.cooldown(), Duration::from_secs(5));
        assert_eq!(config.format(), BackupFormat::Copy);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.max_retry_backoff(), Duration::from_secs(60));
    }

    #[test]
    fn test_flags_all_set() {
        let config = Args::try_parse_from([
            "auto-backup",
            "--source-path",
            "/data/docs",
            "--backup-path",
            "/mnt/b",
            "--buffer-size",
            "-1",
            "--cooldown",
            "30",
            "--zip",
            "--poll-interval",
            "500ms",
            "--max-retry-backoff",
            "0s",
        ])
        .unwrap()
        .into_config()
        .unwrap();

        assert_eq!(config.backup_dir(), PathBuf::from("/mnt/b"));
        assert_eq!(config.retention_count(), -1);
        assert_eq!(config.cooldown(), Duration::from_secs(30));
        assert_eq!(config.format(), BackupFormat::Archive);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.max_retry_backoff(), Duration::ZERO);
    }

    #[test]
    fn test_source_required_without_config() {
        assert!(Args::try_parse_from(["auto-backup"]).is_err());
        assert!(Args::try_parse_from(["auto-backup", "--config", "c.yml"]).is_ok());
        assert!(Args::try_parse_from([
            "auto-backup",
            "--config",
            "c.yml",
            "--source-path",
            "/data/docs"
        ])
        .is_err());
    }

    #[test]
    fn test_missing_source_fails_before_creating_anything() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let source = temp_dir.path().join("missing");
        let args = Args::try_parse_from([
            OsStr::new("auto-backup"),
            OsStr::new("--source-path"),
            source.as_os_str(),
        ])
        .unwrap();

        match run(args) {
            Err(Error::SourceMissing(p)) => assert_eq!(p, source),
            other => panic!("Expected SourceMissing, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
