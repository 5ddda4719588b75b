//! Persisted push subscription list.
//!
//! The store owns both the on-disk document and its in-memory mirror.
//! Every mutating call rewrites the whole list and swaps it into place, so
//! a crash mid-write leaves the previous version intact. The write itself
//! runs on the blocking pool; callers share the store behind a
//! `tokio::sync::Mutex` so writes never interleave.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::push::PushSubscription;

/// Ordered list of push subscriptions, unique by endpoint.
#[derive(Debug)]
pub struct SubscriptionStore {
    path: PathBuf,
    subscriptions: Vec<PushSubscription>,
}

impl SubscriptionStore {
    /// Load the list stored at `path`.
    ///
    /// A missing file yields an empty store. An unreadable or corrupt file is
    /// logged and also yields an empty store; it is overwritten on the next
    /// mutation.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let subscriptions = if path.exists() {
            match Self::read(&path) {
                Ok(subscriptions) => subscriptions,
                Err(e) => {
                    log::warn!("[Store] Could not load subscriptions: {e:#}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let mut store = Self {
            path,
            subscriptions,
        };
        let dropped = store.dedup_by_endpoint();
        if dropped > 0 {
            log::warn!("[Store] Dropped {dropped} duplicate subscription(s) on load");
        }

        log::info!("[Store] Loaded {} push subscription(s)", store.len());
        store
    }

    fn read(path: &Path) -> Result<Vec<PushSubscription>> {
        let content = fs::read_to_string(path).context("Failed to read subscriptions file")?;
        serde_json::from_str(&content).context("Failed to parse subscriptions file")
    }

    /// Add a subscription unless one with the same endpoint exists.
    ///
    /// Returns `Ok(false)` for a duplicate (the store is untouched), `Ok(true)`
    /// once the new entry has been persisted.
    pub async fn add(&mut self, subscription: PushSubscription) -> Result<bool> {
        if self
            .subscriptions
            .iter()
            .any(|s| s.endpoint == subscription.endpoint)
        {
            return Ok(false);
        }

        self.subscriptions.push(subscription);
        if let Err(e) = self.persist().await {
            // Keep memory and disk in agreement.
            self.subscriptions.pop();
            return Err(e);
        }

        log::info!("[Store] Push subscription added ({} total)", self.len());
        Ok(true)
    }

    /// Remove every entry at the given positions in one pass, then persist.
    ///
    /// Remaining entries keep their relative order. Out-of-range indices are
    /// ignored. Returns how many entries were removed. The in-memory list is
    /// updated even if persisting fails.
    pub async fn remove_many(&mut self, indices: &BTreeSet<usize>) -> Result<usize> {
        let before = self.subscriptions.len();
        let mut position = 0;
        self.subscriptions.retain(|_| {
            let keep = !indices.contains(&position);
            position += 1;
            keep
        });

        let removed = before - self.subscriptions.len();
        if removed > 0 {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Current positions of the given endpoints.
    pub fn indices_of<'a, I>(&self, endpoints: I) -> BTreeSet<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: BTreeSet<&str> = endpoints.into_iter().collect();
        self.subscriptions
            .iter()
            .enumerate()
            .filter(|(_, s)| wanted.contains(s.endpoint.as_str()))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// All stored subscriptions, in insertion order.
    pub fn all(&self) -> &[PushSubscription] {
        &self.subscriptions
    }

    /// Number of stored subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Location of the persisted document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the first entry for each endpoint.
    fn dedup_by_endpoint(&mut self) -> usize {
        let before = self.subscriptions.len();
        let mut seen = BTreeSet::new();
        self.subscriptions.retain(|s| seen.insert(s.endpoint.clone()));
        before - self.subscriptions.len()
    }

    /// Serialize the current list and write it out on the blocking pool.
    async fn persist(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.subscriptions)
            .context("Failed to serialize push subscriptions")?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &content))
            .await
            .context("Push subscriptions write task failed")??;

        log::debug!("[Store] Saved push subscriptions to {:?}", self.path);
        Ok(())
    }
}

/// Write `content` to a sibling temp file and rename it over `path`.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "subscriptions.json".into());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, content).context("Failed to write push subscriptions file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))
            .context("Failed to set push subscriptions file permissions")?;
    }

    fs::rename(&tmp_path, path).context("Failed to replace push subscriptions file")?;
    Ok(())
}
