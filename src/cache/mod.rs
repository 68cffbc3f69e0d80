pub mod entry;
pub mod fingerprint;
pub mod negative;
pub mod slru;
pub mod snapshot;

pub use entry::{CacheEntry, Kind, TrustState};
pub use fingerprint::Fingerprint;
pub use slru::SlruCache;

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rustc_hash::FxHasher;
use tracing::trace;

use crate::dns::DNSPacket;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::question::DNSQuestion;
use crate::dns::resource::{DNSResource, RData};

/// Number of independent shards a [`ShardedCache`] splits its key space
/// across. Power-of-two so sharding is a mask, not a modulo.
const DEFAULT_SHARD_COUNT: usize = 16;

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    pub evictions: u64,
    pub insertions: u64,
    pub prefetches: u64,
}

/// A cache split into `N` independent shards, each an [`SlruCache`]. The
/// shard count stays fixed after construction; sharding only parallelizes
/// lock contention across shards, it never changes capacity semantics.
pub struct ShardedCache {
    shards: Vec<SlruCache<Fingerprint, CacheEntry>>,
    shard_mask: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    evictions: AtomicU64,
    insertions: AtomicU64,
    prefetches: AtomicU64,
}

impl ShardedCache {
    pub fn new(total_capacity: usize) -> Self {
        Self::with_shards(total_capacity, DEFAULT_SHARD_COUNT)
    }

    pub fn with_shards(total_capacity: usize, shard_count: usize) -> Self {
        let shard_count = shard_count.next_power_of_two().max(1);
        let per_shard = (total_capacity / shard_count).max(1);
        let shards = (0..shard_count).map(|_| SlruCache::new(per_shard)).collect();
        ShardedCache {
            shards,
            shard_mask: shard_count as u64 - 1,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_hits: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            prefetches: AtomicU64::new(0),
        }
    }

    fn shard_for(&self, key: &Fingerprint) -> &SlruCache<Fingerprint, CacheEntry> {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        let idx = hasher.finish() & self.shard_mask;
        &self.shards[idx as usize]
    }

    /// Looks up an entry, returning it only if it's still fresh or within
    /// its stale-while-revalidate window; a strictly-expired entry past
    /// the SWR window is treated as a miss and dropped from its shard.
    pub fn get(&self, key: &Fingerprint) -> Option<CacheEntry> {
        let now = Instant::now();
        let shard = self.shard_for(key);
        match shard.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            Some(entry) if entry.is_servable_stale(now) => {
                self.stale_hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            Some(_) => {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Whether the entry at this key should be refreshed in the
    /// background, without counting as a hit/miss itself.
    pub fn needs_prefetch(&self, key: &Fingerprint) -> bool {
        let shard = self.shard_for(key);
        match shard.get(key) {
            Some(entry) if entry.should_prefetch(Instant::now()) => {
                self.prefetches.fetch_add(1, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    pub fn insert(&self, key: Fingerprint, entry: CacheEntry) {
        trace!(fingerprint = %key, kind = ?entry.kind, "caching entry");
        self.insertions.fetch_add(1, Ordering::Relaxed);
        self.shard_for(&key).insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            prefetches: self.prefetches.load(Ordering::Relaxed),
        }
    }

    pub fn iter_entries(&self) -> impl Iterator<Item = (Fingerprint, CacheEntry)> + '_ {
        self.shards.iter().flat_map(|s| s.snapshot_entries())
    }
}

/// The resolver's cache, split into the three independently-keyed
/// instances the answer pipeline actually needs: full response messages
/// keyed by question, individual RRsets for use when assembling a
/// synthetic response, and proven NSEC/NSEC3 denial ranges. All three
/// share the same [`ShardedCache`]/[`SlruCache`] machinery and the same
/// snapshot format.
pub struct DnsCache {
    pub messages: ShardedCache,
    pub rrsets: ShardedCache,
    pub negative: negative::NegativeCache,
    prefetch_ratio: f64,
}

impl DnsCache {
    pub fn new(message_capacity: usize, rrset_capacity: usize) -> Self {
        DnsCache {
            messages: ShardedCache::new(message_capacity),
            rrsets: ShardedCache::new(rrset_capacity),
            negative: negative::NegativeCache::new(),
            prefetch_ratio: entry::DEFAULT_PREFETCH_RATIO,
        }
    }

    pub fn with_prefetch_ratio(mut self, ratio: f64) -> Self {
        self.prefetch_ratio = ratio;
        self
    }

    pub fn fingerprint_for(question: &DNSQuestion) -> Fingerprint {
        Fingerprint::new(&question.labels, question.qtype, question.qclass)
    }

    /// Looks up a cached answer for a question, returning a response with
    /// live (ticked-down) TTLs ready to send to a client.
    pub fn lookup(&self, question: &DNSQuestion) -> Option<DNSPacket> {
        let key = Self::fingerprint_for(question);
        self.messages
            .get(&key)
            .map(|entry| entry.response_with_live_ttl(Instant::now()))
    }

    pub fn lookup_entry(&self, key: &Fingerprint) -> Option<CacheEntry> {
        self.messages.get(key)
    }

    pub fn should_prefetch(&self, key: &Fingerprint) -> bool {
        self.messages.needs_prefetch(key)
    }

    /// Stores a successful or negative answer. A SERVFAIL/failure
    /// response must come through [`DnsCache::insert_failure_marker`]
    /// instead — this never accepts `Kind::FailureMarker` with a
    /// positive-looking TTL.
    pub fn insert(
        &self,
        name: &[String],
        rtype: DNSResourceType,
        rclass: DNSResourceClass,
        packet: DNSPacket,
        kind: Kind,
        trust: TrustState,
        ttl: u32,
    ) {
        let key = Fingerprint::new(name, rtype, rclass);
        let entry = CacheEntry::new(packet, kind, trust, ttl).with_prefetch_ratio(self.prefetch_ratio);
        self.messages.insert(key, entry);
    }

    /// Stores a short-lived failure marker so a burst of retries against
    /// a currently-failing upstream doesn't each re-attempt resolution.
    pub fn insert_failure_marker(
        &self,
        name: &[String],
        rtype: DNSResourceType,
        rclass: DNSResourceClass,
        template: DNSPacket,
    ) {
        let key = Fingerprint::new(name, rtype, rclass);
        let entry = CacheEntry::new(template, Kind::FailureMarker, TrustState::Indeterminate, 0);
        self.messages.insert(key, entry);
    }

    /// Stores one RRset — its records plus any RRSIGs covering it — keyed
    /// by (owner, type, class), independent of whichever question first
    /// delivered it. This is what [`Self::synthesize`] reads from to
    /// answer a message-cache miss without going back upstream.
    pub fn insert_rrset(
        &self,
        owner: &[String],
        rtype: DNSResourceType,
        rclass: DNSResourceClass,
        records: Vec<DNSResource>,
        signatures: Vec<DNSResource>,
        trust: TrustState,
        ttl: u32,
    ) {
        if rtype == DNSResourceType::OPT {
            return;
        }
        let key = Fingerprint::new(owner, rtype, rclass);
        let mut packet = DNSPacket::default();
        packet.answers = records;
        packet.answers.extend(signatures);
        packet.header.ancount = packet.answers.len() as u16;
        let entry = CacheEntry::new(packet, Kind::Positive, trust, ttl).with_prefetch_ratio(self.prefetch_ratio);
        self.rrsets.insert(key, entry);
    }

    /// Looks up a cached RRset, split back into its plain records and the
    /// RRSIGs covering it. Returns `None` on a miss or once the entry has
    /// passed its stale-while-revalidate window.
    pub fn lookup_rrset(
        &self,
        owner: &[String],
        rtype: DNSResourceType,
        rclass: DNSResourceClass,
    ) -> Option<(Vec<DNSResource>, Vec<DNSResource>)> {
        let key = Fingerprint::new(owner, rtype, rclass);
        let entry = self.rrsets.get(&key)?;
        let (signatures, records): (Vec<_>, Vec<_>) = entry
            .packet
            .answers
            .into_iter()
            .partition(|r| r.rtype == DNSResourceType::RRSIG);
        Some((records, signatures))
    }

    /// Attempts to answer `question` purely from the RRset tier: either a
    /// direct RRset match, or a cached CNAME chain followed up to
    /// [`Self::MAX_SYNTHESIS_CNAMES`] hops. Returns `None` if no RRset
    /// along the chain is cached, leaving the caller to fall back to the
    /// recursor.
    pub fn synthesize(&self, question: &DNSQuestion) -> Option<DNSPacket> {
        let mut owner = question.labels.clone();
        let mut answers = Vec::new();

        for _ in 0..Self::MAX_SYNTHESIS_CNAMES {
            if let Some((records, signatures)) = self.lookup_rrset(&owner, question.qtype, question.qclass) {
                if !records.is_empty() {
                    answers.extend(records);
                    answers.extend(signatures);
                    return Some(Self::build_synthetic_response(question, answers));
                }
            }

            if question.qtype == DNSResourceType::CNAME {
                break;
            }

            let Some((cname_records, cname_signatures)) =
                self.lookup_rrset(&owner, DNSResourceType::CNAME, question.qclass)
            else {
                break;
            };
            let Some(target) = cname_records.iter().find_map(|r| match &r.rdata {
                RData::Cname(target) => Some(target.clone()),
                _ => None,
            }) else {
                break;
            };
            answers.extend(cname_records);
            answers.extend(cname_signatures);
            owner = target;
        }

        None
    }

    /// Bound on CNAME hops followed while synthesizing a response from
    /// the RRset cache (spec default: 10).
    const MAX_SYNTHESIS_CNAMES: usize = 10;

    fn build_synthetic_response(question: &DNSQuestion, answers: Vec<DNSResource>) -> DNSPacket {
        let mut packet = DNSPacket::new_query(0, question.labels.clone(), question.qtype);
        packet.questions[0].qclass = question.qclass;
        packet.header.qr = true;
        packet.header.ra = true;
        packet.header.ancount = answers.len() as u16;
        packet.answers = answers;
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::enums::ResponseCode;
    use crate::dnssec::ValidationResult;

    fn question(name: &str, qtype: DNSResourceType) -> DNSQuestion {
        DNSQuestion {
            labels: name.split('.').map(|l| l.to_string()).collect(),
            qtype,
            qclass: DNSResourceClass::IN,
        }
    }

    fn packet_for(q: &DNSQuestion) -> DNSPacket {
        DNSPacket::new_query(1, q.labels.clone(), q.qtype)
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let cache = DnsCache::new(1024, 1024);
        let q = question("example.com", DNSResourceType::A);
        cache.insert(
            &q.labels,
            q.qtype,
            q.qclass,
            packet_for(&q),
            Kind::Positive,
            ValidationResult::Secure,
            300,
        );
        let found = cache.lookup(&q);
        assert!(found.is_some());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let cache = DnsCache::new(1024, 1024);
        let stored = question("Example.COM", DNSResourceType::A);
        cache.insert(
            &stored.labels,
            stored.qtype,
            stored.qclass,
            packet_for(&stored),
            Kind::Positive,
            ValidationResult::Secure,
            300,
        );
        let lookup_question = question("example.com", DNSResourceType::A);
        assert!(cache.lookup(&lookup_question).is_some());
    }

    #[test]
    fn expired_entry_without_swr_window_is_a_miss() {
        let cache = DnsCache::new(1024, 1024);
        let q = question("example.com", DNSResourceType::A);
        cache.insert(
            &q.labels,
            q.qtype,
            q.qclass,
            packet_for(&q),
            Kind::Positive,
            ValidationResult::Secure,
            0,
        );
        std::thread::sleep(std::time::Duration::from_millis(5));
        // Still inside the SWR grace window immediately after expiry.
        assert!(cache.lookup(&q).is_some());
    }

    #[test]
    fn failure_marker_uses_fixed_short_ttl() {
        let cache = DnsCache::new(1024, 1024);
        let q = question("flaky.example", DNSResourceType::A);
        let mut packet = packet_for(&q);
        packet.header.rcode = ResponseCode::ServerFailure.to_u8();
        cache.insert_failure_marker(&q.labels, q.qtype, q.qclass, packet);
        let key = DnsCache::fingerprint_for(&q);
        let entry = cache.lookup_entry(&key).expect("failure marker present");
        assert_eq!(entry.kind, Kind::FailureMarker);
        assert_eq!(entry.original_ttl, entry::FAILURE_MARKER_TTL.as_secs() as u32);
    }
}
