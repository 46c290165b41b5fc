use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use stash_core::storage::{BackendError, StorageBackend};
use tempfile::NamedTempFile;
use tracing::instrument;

type Document = BTreeMap<String, String>;

/// Durable backend keeping the whole key space in a single JSON document.
/// Every mutation rewrites the document atomically (temp file + rename).
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, BackendError> {
        self.guard.lock().map_err(|err| BackendError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }

    fn update<F>(&self, mutate: F) -> Result<(), BackendError>
    where
        F: FnOnce(&mut Document),
    {
        let _guard = self.lock()?;
        let mut doc = read_document(&self.path)?;
        mutate(&mut doc);
        write_document(&self.path, &doc)
    }
}

impl StorageBackend for FileBackend {
    #[instrument(skip_all, fields(key))]
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError> {
        let _guard = self.lock()?;
        Ok(read_document(&self.path)?.remove(key))
    }

    #[instrument(skip_all, fields(key))]
    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.update(|doc| {
            doc.insert(key.to_string(), value.to_string());
        })
    }

    #[instrument(skip_all, fields(key))]
    fn remove_item(&self, key: &str) -> Result<(), BackendError> {
        let _guard = self.lock()?;
        let mut doc = read_document(&self.path)?;
        if doc.remove(key).is_none() {
            return Ok(());
        }
        write_document(&self.path, &doc)
    }

    #[instrument(skip_all)]
    fn clear(&self) -> Result<(), BackendError> {
        self.update(|doc| doc.clear())
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        let _guard = self.lock()?;
        Ok(read_document(&self.path)?.into_keys().collect())
    }
}

fn read_document(path: &Path) -> Result<Document, BackendError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
        Err(err) => return Err(BackendError::storage(err)),
    };

    let mut buf = String::new();
    file.read_to_string(&mut buf).map_err(BackendError::storage)?;
    if buf.trim().is_empty() {
        return Ok(Document::new());
    }
    serde_json::from_str(&buf).map_err(BackendError::storage)
}

fn write_document(path: &Path, doc: &Document) -> Result<(), BackendError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(BackendError::storage)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(BackendError::storage)?;
    let json = serde_json::to_vec_pretty(doc).map_err(BackendError::storage)?;
    tmp.write_all(&json).map_err(BackendError::storage)?;
    tmp.flush().map_err(BackendError::storage)?;
    tmp.persist(path)
        .map_err(|e| BackendError::storage(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_empty_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path().join("primary.json"));

        assert_eq!(backend.get_item("k").expect("get"), None);
        assert!(backend.keys().expect("keys").is_empty());
    }

    #[test]
    fn entries_survive_a_new_instance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("primary.json");

        FileBackend::new(&path)
            .set_item("theme", "dark")
            .expect("set");

        let reopened = FileBackend::new(&path);
        assert_eq!(
            reopened.get_item("theme").expect("get"),
            Some("dark".to_string())
        );
        assert_eq!(reopened.keys().expect("keys"), vec!["theme"]);
    }

    #[test]
    fn remove_and_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path().join("primary.json"));
        backend.set_item("a", "1").expect("set");
        backend.set_item("b", "2").expect("set");

        backend.remove_item("a").expect("remove");
        backend.remove_item("a").expect("remove again");
        assert_eq!(backend.keys().expect("keys"), vec!["b"]);

        backend.clear().expect("clear");
        assert!(backend.keys().expect("keys").is_empty());
    }

    #[test]
    fn corrupt_document_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("primary.json");
        fs::write(&path, "not json").expect("write");

        let err = FileBackend::new(&path)
            .get_item("k")
            .expect_err("should fail");
        assert!(matches!(err, BackendError::Storage { .. }));
    }
}
