//! Pending-update finalizer
//!
//! A download is written to `<archive>.tmp`, renamed to `<archive>.update`
//! once complete, and swapped in later. A crash between those steps leaves
//! staged files behind; this pass moves them over their archives before the
//! next resolution run.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::descriptor::read_descriptor;

/// Completed download awaiting activation.
pub const UPDATE_SUFFIX: &str = "update";
/// In-flight download.
pub const TEMP_SUFFIX: &str = "tmp";
/// Previous archive kept while a swap is in progress.
pub const BACKUP_SUFFIX: &str = "bak";

/// `path` with `.suffix` appended to its file name.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

pub fn staged_path(archive: &Path) -> PathBuf {
    with_suffix(archive, UPDATE_SUFFIX)
}

pub fn temp_path(archive: &Path) -> PathBuf {
    with_suffix(archive, TEMP_SUFFIX)
}

pub fn backup_path(archive: &Path) -> PathBuf {
    with_suffix(archive, BACKUP_SUFFIX)
}

/// Outcome of a finalizer run.
#[derive(Debug, Default)]
pub struct FinalizeReport {
    /// Archives replaced by a staged file.
    pub promoted: Vec<PathBuf>,
    /// Incomplete downloads deleted.
    pub discarded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

/// Move every staged file in `modules_dir` over its archive.
///
/// `.update` files are always promoted. A `.tmp` file is promoted only when
/// it is a readable archive with a valid manifest, and deleted otherwise.
pub fn finalize_pending_updates(
    modules_dir: &Path,
    archive_extension: &str,
    manifest_name: &str,
) -> io::Result<FinalizeReport> {
    let mut report = FinalizeReport::default();
    if !modules_dir.is_dir() {
        return Ok(report);
    }

    let mut temps = Vec::new();
    let mut updates = Vec::new();
    for entry in fs::read_dir(modules_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(TEMP_SUFFIX) => temps.push(path),
            Some(UPDATE_SUFFIX) => updates.push(path),
            _ => {}
        }
    }
    temps.sort();
    updates.sort();

    // a completed download wins over an in-flight one for the same archive
    for staged in temps {
        if let Err(e) = read_descriptor(&staged, manifest_name) {
            warn!("Discarding incomplete download {:?}: {}", staged, e);
            match fs::remove_file(&staged) {
                Ok(()) => report.discarded.push(staged),
                Err(e) => {
                    error!("Failed to delete {:?}: {}", staged, e);
                    report.failed.push((staged, e));
                }
            }
            continue;
        }
        promote(&staged, archive_extension, &mut report);
    }
    for staged in updates {
        promote(&staged, archive_extension, &mut report);
    }

    Ok(report)
}

fn promote(staged: &Path, archive_extension: &str, report: &mut FinalizeReport) {
    let target = target_for(staged, archive_extension);
    match replace(staged, &target) {
        Ok(()) => {
            info!("Applied pending update {:?} -> {:?}", staged, target);
            report.promoted.push(target);
        }
        Err(e) => {
            error!("Failed to apply pending update {:?}: {}", staged, e);
            report.failed.push((staged.to_path_buf(), e));
        }
    }
}

/// The archive a staged file replaces: suffix stripped, archive extension
/// appended if it is not already there.
pub fn target_for(staged: &Path, archive_extension: &str) -> PathBuf {
    let stem = staged.with_extension("");
    let has_ext = stem
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(archive_extension));
    if has_ext {
        stem
    } else {
        with_suffix(&stem, archive_extension)
    }
}

fn replace(from: &Path, to: &Path) -> io::Result<()> {
    match fs::remove_file(to) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::rename(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_paths() {
        let archive = Path::new("/m/shop.zip");
        assert_eq!(staged_path(archive), PathBuf::from("/m/shop.zip.update"));
        assert_eq!(temp_path(archive), PathBuf::from("/m/shop.zip.tmp"));
        assert_eq!(backup_path(archive), PathBuf::from("/m/shop.zip.bak"));
    }

    #[test]
    fn test_target_for() {
        assert_eq!(
            target_for(Path::new("/m/shop.zip.update"), "zip"),
            PathBuf::from("/m/shop.zip")
        );
        assert_eq!(
            target_for(Path::new("/m/shop.update"), "zip"),
            PathBuf::from("/m/shop.zip")
        );
        assert_eq!(
            target_for(Path::new("/m/shop-1.2.tmp"), "zip"),
            PathBuf::from("/m/shop-1.2.zip")
        );
    }

    #[test]
    fn test_missing_directory_is_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let report =
            finalize_pending_updates(&dir.path().join("absent"), "zip", "module.yml").unwrap();
        assert!(report.promoted.is_empty());
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_update_replaces_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("shop.zip");
        fs::write(&archive, b"old").unwrap();
        fs::write(staged_path(&archive), b"new").unwrap();
        fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        let report = finalize_pending_updates(dir.path(), "zip", "module.yml").unwrap();

        assert_eq!(report.promoted, vec![archive.clone()]);
        assert_eq!(fs::read(&archive).unwrap(), b"new");
        assert!(!staged_path(&archive).exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_invalid_tmp_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("shop.zip");
        fs::write(&archive, b"old").unwrap();
        fs::write(temp_path(&archive), b"truncated").unwrap();

        let report = finalize_pending_updates(dir.path(), "zip", "module.yml").unwrap();

        assert!(report.promoted.is_empty());
        assert_eq!(report.discarded, vec![temp_path(&archive)]);
        assert_eq!(fs::read(&archive).unwrap(), b"old");
    }
}
