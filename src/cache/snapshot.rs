use std::path::Path;

use rkyv::rancor::Error as RkyvError;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use super::entry::SerializableCacheEntry;
use super::fingerprint::Fingerprint;
use super::{DnsCache, Kind};

/// On-disk form of a [`DnsCache`]: every still-live message and RRset
/// entry, keyed by its fingerprint, written with rkyv so a restart can
/// warm the cache instead of starting cold.
#[derive(Debug, Serialize, Deserialize, rkyv::Archive, rkyv::Deserialize, rkyv::Serialize)]
#[rkyv(derive(Debug))]
pub struct CacheSnapshot {
    pub messages: Vec<(Fingerprint, SerializableCacheEntry)>,
    pub rrsets: Vec<(Fingerprint, SerializableCacheEntry)>,
}

impl CacheSnapshot {
    pub fn capture(cache: &DnsCache) -> Self {
        CacheSnapshot {
            messages: cache
                .messages
                .iter_entries()
                .map(|(k, v)| (k, (&v).into()))
                .collect(),
            rrsets: cache
                .rrsets
                .iter_entries()
                .map(|(k, v)| (k, (&v).into()))
                .collect(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RkyvError> {
        let bytes = rkyv::to_bytes::<RkyvError>(self)?;
        Ok(bytes.to_vec())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RkyvError> {
        rkyv::from_bytes::<CacheSnapshot, RkyvError>(bytes)
    }

    /// Restores every still-unexpired entry back into `cache`. Entries
    /// that expired while the process was down are silently dropped
    /// (`SerializableCacheEntry`'s `From<_> for CacheEntry` would produce
    /// an already-expired entry anyway, but skipping them avoids paying
    /// the shard-insert cost for dead weight).
    pub fn restore_into(self, cache: &DnsCache) {
        let now = std::time::Instant::now();
        let mut restored = 0usize;
        for (key, serialized) in self.messages {
            let entry: super::CacheEntry = serialized.into();
            if !entry.is_expired(now) {
                restored += 1;
                cache.messages.insert(key, entry);
            }
        }
        for (key, serialized) in self.rrsets {
            let entry: super::CacheEntry = serialized.into();
            if !entry.is_expired(now) {
                cache.rrsets.insert(key, entry);
            }
        }
        info!(restored, "restored cache entries from snapshot");
    }
}

pub async fn save_to_disk(cache: &DnsCache, path: impl AsRef<Path>) -> std::io::Result<()> {
    let snapshot = CacheSnapshot::capture(cache);
    let bytes = snapshot
        .to_bytes()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    fs::write(path, bytes).await
}

pub async fn load_from_disk(cache: &DnsCache, path: impl AsRef<Path>) {
    let path = path.as_ref();
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "no cache snapshot to restore");
            return;
        }
    };
    match CacheSnapshot::from_bytes(&bytes) {
        Ok(snapshot) => snapshot.restore_into(cache),
        Err(err) => warn!(path = %path.display(), error = %err, "failed to parse cache snapshot, starting cold"),
    }
}

/// Failure markers never survive a restart — a fresh process should
/// re-attempt resolution rather than inherit a stale "upstream is down"
/// verdict from before it was even started.
pub fn strip_failure_markers(entries: Vec<(Fingerprint, SerializableCacheEntry)>) -> Vec<(Fingerprint, SerializableCacheEntry)> {
    entries
        .into_iter()
        .filter(|(_, e)| e.kind != Kind::FailureMarker)
        .collect()
}
