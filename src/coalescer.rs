//! Request coalescing: at most one in-flight resolution per question
//! fingerprint. Callers that arrive while a resolution is already running
//! join it as followers instead of issuing a second upstream query.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use tracing::debug;

use crate::cache::Fingerprint;
use crate::dns::DNSPacket;
use crate::error::Result;

/// A resolution already running on behalf of an earlier caller. Anyone else
/// asking for the same fingerprint subscribes to `sender` instead of
/// starting a second one.
#[derive(Debug)]
struct InFlight {
    sender: broadcast::Sender<Result<DNSPacket>>,
    waiting_count: AtomicU32,
}

/// Tracks in-flight resolutions keyed by question fingerprint. Plain
/// lookups (`+refresh` prefetch runs included) go through [`Self::execute`];
/// the fingerprint passed in should already reflect whether this is a
/// normal miss or a background refresh, since both share the same
/// deduplication table.
#[derive(Debug, Default)]
pub struct Coalescer {
    in_flight: Arc<DashMap<Fingerprint, InFlight>>,
}

impl Coalescer {
    pub fn new() -> Self {
        Coalescer {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Runs `operation` for `key` if nobody else is already resolving it;
    /// otherwise waits for the in-flight leader's result. The leader's
    /// result is broadcast to every follower that joined while it ran.
    pub async fn execute<F, Fut>(&self, key: Fingerprint, operation: F) -> Result<DNSPacket>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<DNSPacket>>,
    {
        // `entry()` takes the shard lock for the whole check-and-set, so
        // exactly one caller ever observes `Vacant` for a given key; every
        // other concurrent caller sees the `Occupied` entry the leader just
        // installed and subscribes to it instead of inserting its own.
        let receiver = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => {
                existing.get().waiting_count.fetch_add(1, Ordering::Relaxed);
                Some(existing.get().sender.subscribe())
            }
            Entry::Vacant(vacant) => {
                let (sender, _receiver) = broadcast::channel(16);
                vacant.insert(InFlight {
                    sender,
                    waiting_count: AtomicU32::new(1),
                });
                None
            }
        };

        match receiver {
            None => {
                debug!(%key, "coalescer: leading resolution");
                let result = operation().await;

                if let Some((_, leader)) = self.in_flight.remove(&key) {
                    let waiting = leader.waiting_count.load(Ordering::Relaxed);
                    if waiting > 1 {
                        debug!(%key, followers = waiting - 1, "coalescer: broadcasting to followers");
                    }
                    let _ = leader.sender.send(clone_result(&result));
                }
                result
            }
            Some(mut receiver) => {
                debug!(%key, "coalescer: joining in-flight resolution as follower");
                match receiver.recv().await {
                    Ok(result) => result,
                    Err(_) => {
                        debug!(%key, "coalescer: leader channel closed, running independently");
                        operation().await
                    }
                }
            }
        }
    }
}

fn clone_result(result: &Result<DNSPacket>) -> Result<DNSPacket> {
    match result {
        Ok(packet) => Ok(packet.clone()),
        Err(e) => Err(e.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::enums::DNSResourceType;
    use std::sync::atomic::AtomicUsize;

    fn fp(name: &str) -> Fingerprint {
        let labels: Vec<String> = name.split('.').map(|l| l.to_string()).collect();
        Fingerprint::new(&labels, DNSResourceType::A, crate::dns::enums::DNSResourceClass::IN)
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_resolution() {
        let coalescer = Arc::new(Coalescer::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coalescer = coalescer.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .execute(fp("example.com"), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(DNSPacket::new_query(1, vec!["example".into(), "com".into()], DNSResourceType::A))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        // Concurrent joins while the leader is in flight must not each
        // trigger a separate resolution: exactly one of the five callers
        // should ever run `operation`.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
