//! # auto-backup
//!
//! Watches a directory tree and snapshots it once activity settles.
//!
//! ## Features
//!
//! - **Debounced Backups**: A snapshot is taken only after a quiet cooldown following the last change
//! - **Formats**: Deflate-compressed ZIP archive or verbatim directory copy
//! - **Retention Management**: Keeps the N most recent artifacts, unlimited when N <= 0
//! - **Retry Backoff**: Failed cycles are retried with exponential backoff
//! - **Event Log**: Append-only `backup_log.txt` next to the artifacts
//!
//! ## Quick Start
//!
//! ```no_run
//! use auto_backup::backup::backup_config::BackupConfig;
//! use auto_backup::backup::service::BackupService;
//! use auto_backup::backup::shutdown::ShutdownSignal;
//!
//! let config = BackupConfig::builder()
//!     .source_path("/data/docs")
//!     .retention_count(3)
//!     .build()
//!     .resolve_source()?;
//!
//! let shutdown = ShutdownSignal::new();
//! shutdown.install_signal_handlers()?;
//! BackupService::run(&config, &shutdown)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
