use crate::config::TreeConfig;
use crate::models::{ItemKind, ItemRef};
use crate::ops::error::{LeafFailure, OpsError, OpsResult};
use crate::path::{name_violation, VirtualPath};
use crate::store::{ObjectStore, StoreEntry, StoreError};
use chrono::Utc;
use sha1::{Digest, Sha1};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns user intents into sequences of store calls.
///
/// The engine validates names and checks for collisions before touching the
/// store, processes multi-leaf work strictly in order, and never writes
/// history; callers record successful results themselves.
pub struct OperationEngine<S: ?Sized> {
    store: Arc<S>,
    config: TreeConfig,
}

impl<S> OperationEngine<S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(store: Arc<S>, config: TreeConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn update_config(&mut self, config: TreeConfig) {
        self.config = config;
    }

    pub fn get_config(&self) -> &TreeConfig {
        &self.config
    }

    pub(crate) fn validate_name(name: &str) -> OpsResult<()> {
        match name_violation(name) {
            Some(reason) => Err(OpsError::InvalidName(format!("{:?}: {}", name, reason))),
            None => Ok(()),
        }
    }

    /// Name rules plus the folder marker, which no user item may take.
    pub(crate) fn check_name(&self, name: &str) -> OpsResult<()> {
        Self::validate_name(name)?;
        if name == self.config.folder_marker {
            return Err(OpsError::InvalidName(format!(
                "{:?} is reserved for folder markers",
                name
            )));
        }
        Ok(())
    }

    /// Fail with `Conflict` if `parent` already lists an entry called `name`.
    pub(crate) async fn ensure_free(&self, parent: &VirtualPath, name: &str) -> OpsResult<()> {
        let entries = self.store.list(&parent.to_key()).await?;
        if entries.iter().any(|entry| entry.name == name) {
            return Err(OpsError::Conflict(parent.join(name)));
        }
        Ok(())
    }

    /// Materialize an empty folder by uploading its marker object.
    pub async fn create_folder(&self, parent: &VirtualPath, name: &str) -> OpsResult<StoreEntry> {
        self.check_name(name)?;
        self.ensure_free(parent, name).await?;

        let marker = parent.join(name).join(&self.config.folder_marker);
        self.store.upload(&marker.to_key(), Vec::new()).await?;
        info!(path = %parent.join(name), "folder created");
        Ok(StoreEntry::folder(name))
    }

    pub async fn upload_file(
        &self,
        parent: &VirtualPath,
        name: &str,
        bytes: Vec<u8>,
    ) -> OpsResult<StoreEntry> {
        self.check_name(name)?;
        self.ensure_free(parent, name).await?;

        let size = bytes.len() as u64;
        self.store.upload(&parent.join(name).to_key(), bytes).await?;
        info!(path = %parent.join(name), size, "file uploaded");
        Ok(StoreEntry::file(name, size, Utc::now()))
    }

    pub async fn download_file(&self, path: &VirtualPath) -> OpsResult<Vec<u8>> {
        Ok(self.store.download(&path.to_key()).await?)
    }

    /// Bytes stored at `path` right now, `None` when the key is free.
    pub(crate) async fn occupant(&self, path: &VirtualPath) -> OpsResult<Option<Vec<u8>>> {
        match self.store.download(&path.to_key()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn is_marker(&self, path: &VirtualPath) -> bool {
        path.name() == Some(self.config.folder_marker.as_str())
    }

    /// Every stored object at or beneath `item`, in listing order. Folder
    /// markers count as leaves so empty folders travel with their parent.
    pub(crate) async fn collect_leaves(&self, item: &ItemRef) -> OpsResult<Vec<VirtualPath>> {
        if item.kind == ItemKind::File {
            return Ok(vec![item.path.clone()]);
        }

        let mut leaves = Vec::new();
        let mut pending = VecDeque::from([item.path.clone()]);
        while let Some(prefix) = pending.pop_front() {
            for entry in self.store.list(&prefix.to_key()).await? {
                let path = prefix.join(&entry.name);
                if entry.is_folder() {
                    pending.push_back(path);
                } else {
                    leaves.push(path);
                }
            }
        }

        if leaves.is_empty() {
            return Err(OpsError::NotFound(item.path.to_string()));
        }
        debug!(path = %item.path, leaves = leaves.len(), "collected leaves");
        Ok(leaves)
    }

    /// Copy one object to a new key, then remove the original.
    pub(crate) async fn transfer_leaf(&self, from: &VirtualPath, to: &VirtualPath) -> OpsResult<()> {
        let bytes = self.store.download(&from.to_key()).await?;
        let expected = self.config.verify_transfers.then(|| digest(&bytes));
        self.store.upload(&to.to_key(), bytes).await?;

        if let Some(expected) = expected {
            let copied = self.store.download(&to.to_key()).await?;
            let actual = digest(&copied);
            if actual != expected {
                self.discard_copy(to).await;
                return Err(OpsError::TransportFailure(format!(
                    "copy verification failed for {}: {} != {}",
                    to, actual, expected
                )));
            }
        }

        if let Err(err) = self.store.delete(&from.to_key()).await {
            // Keep the item in exactly one place.
            self.discard_copy(to).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn discard_copy(&self, path: &VirtualPath) {
        if let Err(err) = self.store.delete(&path.to_key()).await {
            warn!(path = %path, error = %err, "failed to remove stray copy");
        }
    }
}

pub(crate) fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Tally of a leaf-by-leaf run.
#[derive(Debug, Default)]
pub(crate) struct LeafReport {
    pub succeeded: Vec<VirtualPath>,
    pub failed: Vec<LeafFailure>,
    first_error: Option<OpsError>,
}

impl LeafReport {
    pub fn success(&mut self, path: VirtualPath) {
        self.succeeded.push(path);
    }

    pub fn failure(&mut self, path: VirtualPath, err: OpsError) {
        warn!(path = %path, error = %err, "leaf operation failed");
        self.failed.push(LeafFailure {
            path,
            reason: err.to_string(),
        });
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }

    /// All leaves done: the count. Nothing done: the first error as-is.
    /// Anything in between: `PartialFailure`.
    pub fn finish(self) -> OpsResult<usize> {
        match self.first_error {
            None => Ok(self.succeeded.len()),
            Some(err) if self.succeeded.is_empty() => Err(err),
            Some(_) => Err(OpsError::PartialFailure {
                succeeded: self.succeeded,
                failed: self.failed,
            }),
        }
    }
}
