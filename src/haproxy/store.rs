//! Config file repository.
//!
//! # Responsibilities
//! - Read the live config as raw text or as a parsed document
//! - Replace the live file atomically
//! - Keep timestamped backups (`<path>.backup.<epoch-ms>`), never pruned
//!
//! # Design Decisions
//! - The file on disk is the system of record; nothing is cached
//! - Writes go through a sibling temp file and a rename, keeping permissions

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::haproxy::model::ConfigDocument;
use crate::haproxy::parser::parse;

/// A backup copy of the live config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub timestamp_ms: u64,
    pub size: u64,
}

/// Storage seam between the mutation pipeline and the filesystem.
pub trait ConfigStore: Send + Sync + std::fmt::Debug {
    /// Path the external validator should inspect after a write.
    fn location(&self) -> &Path;

    fn exists(&self) -> bool;

    fn read_raw(&self) -> io::Result<String>;

    fn write_raw(&self, content: &str) -> io::Result<()>;

    /// Copy the live file aside. `None` when there is nothing to back up.
    fn backup(&self) -> io::Result<Option<PathBuf>>;

    /// Copy a backup back over the live file.
    fn restore(&self, backup: &Path) -> io::Result<()>;

    /// Remove the live file (rollback of a first-ever write).
    fn discard(&self) -> io::Result<()>;

    /// Backups, newest first.
    fn list_backups(&self) -> io::Result<Vec<BackupEntry>>;

    fn read(&self) -> io::Result<ConfigDocument> {
        Ok(parse(&self.read_raw()?))
    }
}

/// [`ConfigStore`] over a single file path.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn backup_prefix(&self) -> String {
        format!("{}.backup.", self.file_name())
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

impl ConfigStore for FileStore {
    fn location(&self) -> &Path {
        &self.path
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read_raw(&self) -> io::Result<String> {
        fs::read_to_string(&self.path)
    }

    fn write_raw(&self, content: &str) -> io::Result<()> {
        let tmp = self.sibling(&format!(".tmp.{}", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, content)?;
        if let Ok(meta) = fs::metadata(&self.path) {
            fs::set_permissions(&tmp, meta.permissions())?;
        }
        fs::rename(&tmp, &self.path).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
    }

    fn backup(&self) -> io::Result<Option<PathBuf>> {
        if !self.exists() {
            return Ok(None);
        }
        let mut stamp = now_millis();
        let mut target = self.sibling(&format!(".backup.{stamp}"));
        while target.exists() {
            stamp += 1;
            target = self.sibling(&format!(".backup.{stamp}"));
        }
        fs::copy(&self.path, &target)?;
        tracing::debug!(backup = %target.display(), "Config backed up");
        Ok(Some(target))
    }

    fn restore(&self, backup: &Path) -> io::Result<()> {
        fs::copy(backup, &self.path).map(|_| ())
    }

    fn discard(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn list_backups(&self) -> io::Result<Vec<BackupEntry>> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = self.backup_prefix();

        let mut backups = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = name
                .strip_prefix(&prefix)
                .and_then(|s| s.parse::<u64>().ok())
            else {
                continue;
            };
            backups.push(BackupEntry {
                path: entry.path(),
                timestamp_ms: stamp,
                size: entry.metadata()?.len(),
            });
        }
        backups.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        Ok(backups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("haproxy.cfg"));

        assert!(store.backup().unwrap().is_none());

        store.write_raw("global\n").unwrap();
        let backup = store.backup().unwrap().unwrap();
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("haproxy.cfg.backup."));

        store.write_raw("broken\n").unwrap();
        store.restore(&backup).unwrap();
        assert_eq!(store.read_raw().unwrap(), "global\n");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "global\n");
    }

    #[test]
    fn test_list_backups_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("haproxy.cfg"));
        store.write_raw("a\n").unwrap();
        let first = store.backup().unwrap().unwrap();
        let second = store.backup().unwrap().unwrap();
        fs::write(dir.path().join("haproxy.cfg.backup.junk"), "x").unwrap();
        fs::write(dir.path().join("other.cfg.backup.1"), "x").unwrap();

        let backups = store.list_backups().unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].path, second);
        assert_eq!(backups[1].path, first);
        assert_eq!(backups[0].size, 2);
    }

    #[test]
    fn test_discard_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("haproxy.cfg"));
        store.discard().unwrap();
        store.write_raw("x").unwrap();
        store.discard().unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn test_read_parses_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("haproxy.cfg"));
        store.write_raw("backend be1\n    server s1 10.0.0.1:8080\n").unwrap();
        let doc = store.read().unwrap();
        assert_eq!(doc.backends["be1"].servers[0].name, "s1");
    }
}
