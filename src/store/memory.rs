use super::{ObjectStore, StoreEntry, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Upload,
    Download,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub path: String,
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<String, StoredObject>,
    calls: Vec<StoreCall>,
    failures: HashSet<(StoreOp, String)>,
}

/// In-process object store with flat keys.
///
/// Folders exist only as key prefixes, exactly like the remote backends this
/// crate targets. Individual `(op, path)` pairs can be set to fail, and every
/// call is logged.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed objects without going through the call log.
    pub fn with_objects<I, K>(objects: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        let store = Self::new();
        {
            let mut state = store.state.lock();
            let now = Utc::now();
            for (key, bytes) in objects {
                state.objects.insert(
                    key.into(),
                    StoredObject {
                        bytes,
                        updated_at: now,
                    },
                );
            }
        }
        store
    }

    /// Make every future `op` on `path` fail with a transport error.
    pub fn fail_on(&self, op: StoreOp, path: &str) {
        self.state.lock().failures.insert((op, path.to_string()));
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().objects.keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().objects.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().objects.get(key).map(|o| o.bytes.clone())
    }

    fn begin(&self, op: StoreOp, path: &str) -> StoreResult<parking_lot::MutexGuard<'_, MemoryState>> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall {
            op,
            path: path.to_string(),
        });
        if state.failures.contains(&(op, path.to_string())) {
            return Err(StoreError::Transport(format!(
                "injected {:?} failure for {}",
                op, path
            )));
        }
        Ok(state)
    }
}

fn normalize(key: &str) -> String {
    key.trim_matches('/').to_string()
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str) -> StoreResult<Vec<StoreEntry>> {
        let prefix = normalize(prefix);
        let state = self.begin(StoreOp::List, &prefix)?;
        let scan = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };

        let mut folders = BTreeSet::new();
        let mut files = Vec::new();
        for (key, object) in state.objects.range(scan.clone()..) {
            let Some(rest) = key.strip_prefix(&scan) else {
                break;
            };
            match rest.split_once('/') {
                Some((folder, _)) => {
                    folders.insert(folder.to_string());
                }
                None => files.push(StoreEntry::file(
                    rest,
                    object.bytes.len() as u64,
                    object.updated_at,
                )),
            }
        }

        let mut entries: Vec<StoreEntry> = folders.into_iter().map(StoreEntry::folder).collect();
        entries.extend(files);
        Ok(entries)
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> StoreResult<()> {
        let path = normalize(path);
        let mut state = self.begin(StoreOp::Upload, &path)?;
        state.objects.insert(
            path,
            StoredObject {
                bytes,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn download(&self, path: &str) -> StoreResult<Vec<u8>> {
        let path = normalize(path);
        let state = self.begin(StoreOp::Download, &path)?;
        state
            .objects
            .get(&path)
            .map(|o| o.bytes.clone())
            .ok_or(StoreError::NotFound(path))
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let path = normalize(path);
        let mut state = self.begin(StoreOp::Delete, &path)?;
        state
            .objects
            .remove(&path)
            .map(|_| ())
            .ok_or(StoreError::NotFound(path))
    }
}
