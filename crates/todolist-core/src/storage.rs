use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const TODOS_KEY: &str = "@toDos";
pub const MODE_KEY: &str = "@isWorking";

/// String-keyed slot storage. Each slot holds one serialized value and is
/// overwritten wholesale.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        (**self).set_item(key, value)
    }
}

/// One file per slot inside a data directory.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(slot_file_name(key))
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.slot_path(key);
        if !path.exists() {
            debug!(file = %path.display(), "slot absent");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        debug!(file = %path.display(), bytes = raw.len(), "read slot");
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value))]
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.slot_path(key);
        write_atomic(&path, value).with_context(|| format!("failed to save slot {key}"))
    }
}

#[tracing::instrument(skip(path, payload))]
fn write_atomic(path: &Path, payload: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = payload.len(), "writing slot atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(payload.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

/// `@toDos` -> `toDos.json`. Anything outside `[A-Za-z0-9_-]` becomes `_`.
fn slot_file_name(key: &str) -> String {
    let stem: String = key
        .trim_start_matches('@')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() { "_".to_string() } else { stem };
    format!("{stem}.json")
}

/// In-process storage for tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, key: &str, value: &str) -> Self {
        self.items.lock().insert(key.to_string(), value.to_string());
        self
    }

    pub fn item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.item(key))
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{FileStore, KeyValueStore, MODE_KEY, MemoryStore, TODOS_KEY, slot_file_name};

    #[test]
    fn slot_names_are_filesystem_safe() {
        assert_eq!(slot_file_name(TODOS_KEY), "toDos.json");
        assert_eq!(slot_file_name(MODE_KEY), "isWorking.json");
        assert_eq!(slot_file_name("a/b c"), "a_b_c.json");
        assert_eq!(slot_file_name("@"), "_.json");
    }

    #[test]
    fn file_store_overwrites_whole_slot() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(&temp.path().join("nested")).expect("open store");

        assert_eq!(store.get_item(TODOS_KEY).expect("get"), None);

        store.set_item(TODOS_KEY, "{\"a\":1}").expect("first write");
        store.set_item(TODOS_KEY, "{}").expect("second write");
        assert_eq!(store.get_item(TODOS_KEY).expect("get").as_deref(), Some("{}"));
        assert!(store.slot_path(TODOS_KEY).exists());
    }

    #[test]
    fn memory_store_seeds_and_reads_back() {
        let store = MemoryStore::new().with_item(MODE_KEY, "false");
        assert_eq!(store.get_item(MODE_KEY).expect("get").as_deref(), Some("false"));

        store.set_item(MODE_KEY, "true").expect("set");
        assert_eq!(store.item(MODE_KEY).as_deref(), Some("true"));
        assert_eq!(store.item(TODOS_KEY), None);
    }
}
