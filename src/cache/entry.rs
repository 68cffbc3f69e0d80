use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

use crate::dns::DNSPacket;
use crate::dnssec::ValidationResult;

/// What a cache slot is standing in for. `FailureMarker` exists so a
/// transient upstream failure can be remembered briefly without ever
/// being confused for a real answer (Open Question: SERVFAIL is never
/// stored as `Positive`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Archive, RkyvDeserialize, RkyvSerialize)]
#[rkyv(derive(Debug, PartialEq))]
pub enum Kind {
    Positive,
    NoData,
    NxDomain,
    FailureMarker,
}

/// DNSSEC trust state attached to a cache entry, re-exported from the
/// validator's own result type so the cache never invents a second
/// notion of "secure".
pub type TrustState = ValidationResult;

/// Fixed TTL for a failure marker: long enough to stop a thundering herd
/// of retries against a server that just failed, short enough that a
/// brief outage doesn't stick around once it's over.
pub const FAILURE_MARKER_TTL: Duration = Duration::from_secs(5);

/// Default prefetch threshold (Open Question: fixed at 10% of original
/// TTL remaining, configurable via `CacheConfig::prefetch_ratio`).
pub const DEFAULT_PREFETCH_RATIO: f64 = 0.1;

/// Stale-while-revalidate grace window: an expired entry may still be
/// served for this long while a refresh is coalesced in the background,
/// so a burst of requests right at expiry doesn't all block on the
/// network.
pub const SWR_WINDOW: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub packet: DNSPacket,
    pub kind: Kind,
    pub trust: TrustState,
    pub stored_at: Instant,
    pub original_ttl: u32,
    pub expires_at: Instant,
    pub prefetch_threshold: Duration,
}

impl CacheEntry {
    pub fn new(packet: DNSPacket, kind: Kind, trust: TrustState, ttl: u32) -> Self {
        let now = Instant::now();
        let ttl = if kind == Kind::FailureMarker {
            FAILURE_MARKER_TTL
        } else {
            Duration::from_secs(ttl as u64)
        };
        CacheEntry {
            packet,
            kind,
            trust,
            stored_at: now,
            original_ttl: ttl.as_secs() as u32,
            expires_at: now + ttl,
            prefetch_threshold: Duration::from_secs_f64(ttl.as_secs_f64() * DEFAULT_PREFETCH_RATIO),
        }
    }

    pub fn with_prefetch_ratio(mut self, ratio: f64) -> Self {
        let ttl = Duration::from_secs(self.original_ttl as u64);
        self.prefetch_threshold = Duration::from_secs_f64(ttl.as_secs_f64() * ratio);
        self
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// An expired entry is still servable for a short grace window while
    /// a refresh is coalesced in the background (RFC 8767-style
    /// stale-while-revalidate, generalized beyond just SERVFAIL).
    pub fn is_servable_stale(&self, now: Instant) -> bool {
        self.kind != Kind::FailureMarker && now < self.expires_at + SWR_WINDOW
    }

    pub fn remaining_ttl(&self, now: Instant) -> u32 {
        self.expires_at
            .checked_duration_since(now)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }

    /// True once the remaining TTL has dropped below the prefetch
    /// threshold — the recursor should refresh this entry in the
    /// background before it goes stale.
    pub fn should_prefetch(&self, now: Instant) -> bool {
        if self.kind == Kind::FailureMarker {
            return false;
        }
        match self.expires_at.checked_duration_since(now) {
            Some(remaining) => remaining <= self.prefetch_threshold,
            None => true,
        }
    }

    /// The response to hand back to a client, with every record's TTL
    /// rewritten to the remaining TTL rather than the originally stored
    /// value (RFC 1035 §4.1.3 TTLs tick down in cache, not on the wire
    /// from upstream).
    pub fn response_with_live_ttl(&self, now: Instant) -> DNSPacket {
        let remaining = self.remaining_ttl(now);
        let mut packet = self.packet.clone();
        for record in packet
            .answers
            .iter_mut()
            .chain(packet.authorities.iter_mut())
            .chain(packet.resources.iter_mut())
        {
            if record.rtype != crate::dns::enums::DNSResourceType::OPT {
                record.ttl = remaining;
            }
        }
        packet
    }
}

/// Snapshot-friendly form of [`CacheEntry`] with `Instant`s converted to
/// Unix timestamps, since `Instant` has no stable epoch and can't be
/// serialized across a process restart.
#[derive(Debug, Clone, Serialize, Deserialize, Archive, RkyvDeserialize, RkyvSerialize)]
#[rkyv(derive(Debug, PartialEq))]
pub struct SerializableCacheEntry {
    pub packet: DNSPacket,
    pub kind: Kind,
    pub trust: TrustStateSnapshot,
    pub original_ttl: u32,
    pub expires_at_unix: u64,
    pub prefetch_threshold_secs: u64,
}

/// [`TrustState`] (an alias for [`ValidationResult`]) doesn't derive the
/// snapshot traits, so the snapshot form collapses it to a small
/// serializable tag and restores a generic message for the `Bogus`
/// reason on load — the live validator will re-derive the real reason
/// the next time this entry is revalidated anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Archive, RkyvDeserialize, RkyvSerialize)]
#[rkyv(derive(Debug, PartialEq))]
pub enum TrustStateSnapshot {
    Secure,
    Insecure,
    Bogus,
    Indeterminate,
}

impl From<&TrustState> for TrustStateSnapshot {
    fn from(value: &TrustState) -> Self {
        match value {
            ValidationResult::Secure => TrustStateSnapshot::Secure,
            ValidationResult::Insecure => TrustStateSnapshot::Insecure,
            ValidationResult::Bogus(_) => TrustStateSnapshot::Bogus,
            ValidationResult::Indeterminate => TrustStateSnapshot::Indeterminate,
        }
    }
}

impl From<TrustStateSnapshot> for TrustState {
    fn from(value: TrustStateSnapshot) -> Self {
        match value {
            TrustStateSnapshot::Secure => ValidationResult::Secure,
            TrustStateSnapshot::Insecure => ValidationResult::Insecure,
            TrustStateSnapshot::Bogus => {
                ValidationResult::Bogus("restored from snapshot".to_string())
            }
            TrustStateSnapshot::Indeterminate => ValidationResult::Indeterminate,
        }
    }
}

fn instant_to_unix(instant: Instant) -> u64 {
    let now_instant = Instant::now();
    let now_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    if instant >= now_instant {
        (now_unix + (instant - now_instant)).as_secs()
    } else {
        now_unix.saturating_sub(now_instant - instant).as_secs()
    }
}

fn unix_to_instant(unix_secs: u64) -> Instant {
    let now_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let now_instant = Instant::now();
    if unix_secs >= now_unix {
        now_instant + Duration::from_secs(unix_secs - now_unix)
    } else {
        now_instant - Duration::from_secs(now_unix - unix_secs)
    }
}

impl From<&CacheEntry> for SerializableCacheEntry {
    fn from(entry: &CacheEntry) -> Self {
        SerializableCacheEntry {
            packet: entry.packet.clone(),
            kind: entry.kind,
            trust: TrustStateSnapshot::from(&entry.trust),
            original_ttl: entry.original_ttl,
            expires_at_unix: instant_to_unix(entry.expires_at),
            prefetch_threshold_secs: entry.prefetch_threshold.as_secs(),
        }
    }
}

impl From<SerializableCacheEntry> for CacheEntry {
    fn from(snapshot: SerializableCacheEntry) -> Self {
        let expires_at = unix_to_instant(snapshot.expires_at_unix);
        CacheEntry {
            packet: snapshot.packet,
            kind: snapshot.kind,
            trust: snapshot.trust.into(),
            stored_at: Instant::now(),
            original_ttl: snapshot.original_ttl,
            expires_at,
            prefetch_threshold: Duration::from_secs(snapshot.prefetch_threshold_secs),
        }
    }
}
