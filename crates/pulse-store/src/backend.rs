use dashmap::DashMap;
use pulse_core::{ChatError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// String key/value storage local to this machine
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the whole value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Volatile backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory.
///
/// Writes go to a temporary file that is then renamed over the old one, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| ChatError::Storage(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ChatError::Storage(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| ChatError::Storage(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| ChatError::Storage(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChatError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_backend_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let key = "pulse_private_0xaa_0xbb";

        let first = FileBackend::new(dir.path()).unwrap();
        assert_eq!(first.get(key).unwrap(), None);
        first.set(key, "[1]").unwrap();
        first.set(key, "[1,2]").unwrap();

        let second = FileBackend::new(dir.path()).unwrap();
        assert_eq!(second.get(key).unwrap().as_deref(), Some("[1,2]"));

        second.remove(key).unwrap();
        second.remove(key).unwrap();
        assert_eq!(first.get(key).unwrap(), None);
    }

    #[test]
    fn test_file_names_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        backend.set("../escape", "x").unwrap();

        assert!(dir.path().join("___escape.json").exists());
        assert_eq!(backend.get("../escape").unwrap().as_deref(), Some("x"));
    }
}
