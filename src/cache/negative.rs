use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::cache::entry::Kind;
use crate::dns::Name;
use crate::dns::enums::DNSResourceType;

/// A proven NSEC/NSEC3 denial-of-existence range for one zone: owner and
/// next-owner names bracket a span of the namespace that DNSSEC has
/// proven contains no records (RFC 8198 aggressive negative caching).
/// Any query for a name inside this span can be answered NXDOMAIN/NODATA
/// directly, without asking upstream again.
///
/// `kind` distinguishes the two proofs an NSEC/NSEC3 record can make:
/// `NxDomain` for the gap strictly between `owner` and `next_owner` (no
/// name in that span exists at all), and `NoData` for the owner name
/// itself lacking a specific record type (`covered_type`), which is only
/// ever a single point, not a range.
#[derive(Debug, Clone)]
pub struct DenialRange {
    pub zone: Name,
    pub owner: Name,
    pub next_owner: Name,
    pub kind: Kind,
    pub covered_type: Option<DNSResourceType>,
    pub expires_at: Instant,
}

impl DenialRange {
    /// Whether `name` is proven covered by this range: for `NoData`,
    /// `name` must equal `owner` exactly (the type-absence proof only
    /// ever applies to that one name); for `NxDomain`, `name` must fall
    /// strictly between `owner` and `next_owner` in canonical DNS
    /// ordering, treating a wrap-around range (next_owner < owner, i.e.
    /// the range covers the end of the zone) as covering everything past
    /// `owner` or before `next_owner`.
    pub fn covers(&self, name: &Name) -> bool {
        if self.kind == Kind::NoData {
            return &self.owner == name;
        }

        let owner = self.owner.to_string();
        let next = self.next_owner.to_string();
        let target = name.to_string();

        if owner == next {
            // A single-record zone: NSEC points back to itself, covering
            // the whole namespace under the zone.
            return name.is_subdomain_of(&self.zone);
        }

        if owner < next {
            target > owner && target < next
        } else {
            target > owner || target < next
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Aggressive negative cache: a flat list of proven denial ranges per
/// zone, consulted before issuing a new query for a name that might
/// already be covered by a previously-validated NSEC/NSEC3 proof.
///
/// Kept as a simple `RwLock<Vec<_>>` rather than sharded like
/// [`super::ShardedCache`] — ranges are looked up by containment, not by
/// exact key, so they can't be hashed into a shard the way a
/// [`super::Fingerprint`] can.
pub struct NegativeCache {
    ranges: RwLock<Vec<DenialRange>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for NegativeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NegativeCache {
    pub fn new() -> Self {
        NegativeCache {
            ranges: RwLock::new(Vec::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn insert(&self, range: DenialRange) {
        let mut ranges = self.ranges.write();
        ranges.retain(|r| !r.is_expired(Instant::now()));
        ranges.push(range);
    }

    /// Whether `name`/`qtype` is proven to not exist under `zone` by an
    /// unexpired range already on file. `qtype` is only consulted for a
    /// `NoData` range (it must match `covered_type`); an `NxDomain` range
    /// denies the name outright regardless of the type asked for.
    pub fn covers(&self, zone: &Name, name: &Name, qtype: Option<DNSResourceType>) -> bool {
        self.lookup(zone, name, qtype).is_some()
    }

    /// Like [`Self::covers`], but returns which kind of denial proof
    /// covered the name, so a caller can synthesize the right rcode
    /// (NXDOMAIN vs. NOERROR/NODATA) instead of just a yes/no answer.
    pub fn lookup(&self, zone: &Name, name: &Name, qtype: Option<DNSResourceType>) -> Option<Kind> {
        let now = Instant::now();
        let ranges = self.ranges.read();
        let found = ranges
            .iter()
            .find(|r| {
                &r.zone == zone
                    && !r.is_expired(now)
                    && r.covers(name)
                    && match r.kind {
                        Kind::NoData => r.covered_type == qtype,
                        _ => true,
                    }
            })
            .map(|r| r.kind);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Drops every expired range. Call periodically; lookups also filter
    /// out expired ranges on their own, this just bounds memory growth.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.ranges.write().retain(|r| !r.is_expired(now));
    }

    pub fn len(&self) -> usize {
        self.ranges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }
}

pub const DEFAULT_DENIAL_TTL: Duration = Duration::from_secs(3600);
