//! YAML file store for named secret values
//!
//! The file is a mapping of name → list of values. Each `put` rewrites the
//! whole file with one name replaced; every other name is carried over.

use crate::error::{Error, Result};
use crate::types::StoredValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

type StoreContents = BTreeMap<String, Vec<StoredValue>>;

/// Secret store backed by a single YAML file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every value stored under `name`
    pub fn get(&self, name: &str) -> Result<Vec<StoredValue>> {
        let mut contents = self.load()?;
        contents
            .remove(name)
            .ok_or_else(|| Error::name_not_found(name, self.path.display().to_string()))
    }

    /// Like `get`, but a missing file or name yields an empty list
    pub fn get_or_empty(&self, name: &str) -> Result<Vec<StoredValue>> {
        match self.get(name) {
            Ok(values) => Ok(values),
            Err(e) if e.is_empty_store() => {
                debug!("No values for '{}' yet: {}", name, e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Replace everything stored under `name`
    pub fn put(&self, name: &str, values: Vec<StoredValue>) -> Result<()> {
        let mut contents = match self.load() {
            Ok(contents) => contents,
            Err(Error::NewStore { .. }) => StoreContents::new(),
            Err(e) => return Err(e),
        };
        contents.insert(name.to_string(), values);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let yaml = serde_yaml_ng::to_string(&contents)?;
        fs::write(&self.path, yaml)?;
        debug!("Wrote {} names to {}", contents.len(), self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<StoreContents> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::new_store(self.path.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
        if content.trim().is_empty() {
            return Ok(StoreContents::new());
        }
        Ok(serde_yaml_ng::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn value(key_id: &str, manager: &str) -> StoredValue {
        StoredValue::template_entry(key_id, manager, "aesgcm256")
    }

    #[test]
    fn test_missing_file_is_new_store() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("secrets.yml"));

        let err = store.get("_keys").unwrap_err();
        assert!(matches!(err, Error::NewStore { .. }));
        assert!(store.get_or_empty("_keys").unwrap().is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("secrets.yml"));

        store.put("_keys", vec![value("arn:k1", "kms")]).unwrap();
        assert_eq!(store.get("_keys").unwrap(), vec![value("arn:k1", "kms")]);

        let err = store.get("database").unwrap_err();
        assert!(matches!(err, Error::NameNotFound { .. }));
    }

    #[test]
    fn test_put_preserves_other_names() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("secrets.yml"));

        let mut secret = value("arn:k1", "kms");
        secret.key_ciphertext = "wrapped".to_string();
        secret.ciphertext = "sealed".to_string();
        store.put("database", vec![secret.clone()]).unwrap();
        store.put("_keys", vec![value("arn:k1", "kms")]).unwrap();
        store.put("_keys", vec![value("arn:k2", "kms")]).unwrap();

        assert_eq!(store.get("database").unwrap(), vec![secret]);
        assert_eq!(store.get("_keys").unwrap(), vec![value("arn:k2", "kms")]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.yml");
        fs::write(&path, "not: [valid").unwrap();
        let store = FileStore::new(&path);

        let err = store.get_or_empty("_keys").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }
}
