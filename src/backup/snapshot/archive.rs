use crate::backup::backup_config::BackupFormat;
use crate::backup::finish::Finish;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use crate::backup::snapshot::source_walk::{nested_backup_dir, walk_source};
use crate::backup::snapshot::{write_via_temp, SnapshotWriter};
use function_name::named;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Files at or above this size need ZIP64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Writes the source tree into a single ZIP file, entries relative to the
/// source root.
#[derive(Clone, Copy, Debug)]
pub struct ZipSnapshotWriter {
    compression: CompressionMethod,
}

impl Default for ZipSnapshotWriter {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }
}

impl ZipSnapshotWriter {
    pub fn new(compression: CompressionMethod) -> Self {
        Self { compression }
    }

    #[named]
    fn write_archive(&self, source: &Path, skip: Option<PathBuf>, tmp_path: &Path) -> Result<()> {
        let options = SimpleFileOptions::default().compression_method(self.compression);
        let mut zip = File::create_new(tmp_path)
            .map(BufWriter::new)
            .map(ZipWriter::new)?;

        let mut entry_count = 0usize;
        for entry in walk_source(source, skip) {
            let entry = entry?;
            let name = entry.archive_name()?;
            if entry.is_dir {
                zip.add_directory(name, options.clone())?;
            } else {
                let mut file = File::open(&entry.src)
                    .map_err(Error::from)
                    .with_debug_object_and_fn_name(entry.src.clone(), function_path!())?;
                let large_file = file.metadata()?.len() >= ZIP64_THRESHOLD;
                zip.start_file(name, options.clone().large_file(large_file))?;
                std::io::copy(&mut file, &mut zip)?;
            }
            entry_count += 1;
        }
        tracing::debug!("Archived {} entries into {:?}", entry_count, tmp_path);

        let buffered: BufWriter<File> = Finish::finish(zip)?;
        buffered.finish()?.sync_all()?;
        Ok(())
    }
}

impl SnapshotWriter for ZipSnapshotWriter {
    fn format(&self) -> BackupFormat {
        BackupFormat::Archive
    }

    fn write(&self, source: &Path, destination_dir: &Path, stem: &str) -> Result<PathBuf> {
        let skip = nested_backup_dir(source, destination_dir);
        write_via_temp(destination_dir, stem, BackupFormat::Archive, |tmp_path| {
            self.write_archive(source, skip, tmp_path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> String {
        let mut content = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
    }

    #[test]
    fn test_zip_contains_tree() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("docs");
        std::fs::create_dir_all(source.join("nested/empty")).unwrap();
        std::fs::write(source.join("top.txt"), "top").unwrap();
        std::fs::write(source.join("nested/inner.txt"), "inner").unwrap();
        let backups = temp_dir.path().join("AutoBackups");
        std::fs::create_dir(&backups).unwrap();

        let path = ZipSnapshotWriter::default()
            .write(&source, &backups, "docs_2024-01-01_00-00-00")
            .unwrap();
        assert_eq!(path, backups.join("docs_2024-01-01_00-00-00.zip"));

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(read_entry(&mut archive, "top.txt"), "top");
        assert_eq!(read_entry(&mut archive, "nested/inner.txt"), "inner");
        assert!(archive.by_name("nested/empty/").unwrap().is_dir());
        assert_eq!(
            archive.by_name("top.txt").unwrap().compression(),
            CompressionMethod::Deflated
        );
    }

    #[test]
    fn test_zip_skips_nested_backup_dir() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("docs");
        let backups = source.join("AutoBackups");
        std::fs::create_dir_all(&backups).unwrap();
        std::fs::write(source.join("a.txt"), "a").unwrap();
        std::fs::write(backups.join("backup_log.txt"), "log").unwrap();

        let path = ZipSnapshotWriter::new(CompressionMethod::Stored)
            .write(&source, &backups, "docs_2024-01-01_00-00-00")
            .unwrap();

        let archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let names: Vec<_> = archive.file_names().map(str::to_owned).collect();
        assert_eq!(names, vec!["a.txt".to_string()]);
    }

    #[test]
    fn test_zip_missing_source_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let backups = temp_dir.path().join("AutoBackups");
        std::fs::create_dir(&backups).unwrap();

        let res = ZipSnapshotWriter::default().write(
            &temp_dir.path().join("missing"),
            &backups,
            "missing_2024-01-01_00-00-00",
        );
        assert!(res.is_err());
        assert_eq!(std::fs::read_dir(&backups).unwrap().count(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_zip_non_utf8_name_fails_and_leaves_nothing() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("docs");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("a.txt"), "a").unwrap();
        std::fs::write(source.join(OsStr::from_bytes(b"bad\xff.txt")), "b").unwrap();
        let backups = temp_dir.path().join("AutoBackups");
        std::fs::create_dir(&backups).unwrap();

        let res = ZipSnapshotWriter::default().write(&source, &backups, "docs_2024-01-01_00-00-00");

        let error = res.unwrap_err();
        assert!(error.to_string().contains("not valid UTF-8"));
        assert_eq!(std::fs::read_dir(&backups).unwrap().count(), 0);
    }
}
