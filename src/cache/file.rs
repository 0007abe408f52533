//! File-system backed cache.
//!
//! Each entry is one JSON file `{"result": ..., "debug_data": ...}` named
//! `<key>.json`; a child namespace is a sub-directory named `@<name>`. Keys and
//! names are escaped so that distinct strings never share a path.

use super::backend::Cache;
use crate::{Error, ErrorContext, Result};
use serde_json::{json, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Cache rooted at `base_dir`; the directory is created on first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: base_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", escape(key)))
    }

    fn read_entry(&self, key: &str) -> Result<Option<Value>> {
        match fs::read(self.entry_path(key)) {
            Ok(bytes) => {
                let entry: Value = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::cache_with_context(
                        format!("corrupt cache entry: {}", e),
                        ErrorContext::new()
                            .with_field_path(key.to_string())
                            .with_source("file_cache"),
                    )
                })?;
                Ok(Some(entry))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Injective file-name encoding: `[A-Za-z0-9_-]` pass through, every other
/// byte becomes `%XX`. The output never contains `.`, `/` or `@`.
fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .read_entry(key)?
            .and_then(|mut entry| entry.get_mut("result").map(Value::take)))
    }

    fn set(&self, key: &str, value: Value, debug_data: Option<Value>) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let mut entry = json!({ "result": value });
        if let Some(debug) = debug_data {
            entry["debug_data"] = debug;
        }
        let bytes = serde_json::to_vec(&entry)?;
        // Write then rename so readers never observe a partial entry.
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", escape(key), uuid::Uuid::new_v4()));
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, self.entry_path(key)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.entry_path(key).is_file())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn child(&self, name: &str) -> Arc<dyn Cache> {
        Arc::new(FileCache {
            root: self.root.join(format!("@{}", escape(name))),
        })
    }

    fn name(&self) -> &'static str {
        "file"
    }

    fn blocking_io(&self) -> bool {
        true
    }
}
