use crate::blocking::updater::{BlocklistUpdater, default_blocklist_sources};
use crate::blocking::{BlockingMode, BlocklistFormat, DnsBlocker};
use crate::cache::negative::{DEFAULT_DENIAL_TTL, DenialRange};
use crate::cache::{DnsCache, Fingerprint, Kind, TrustState};
use crate::config::DnsConfig;
use crate::dns::{
    DNSPacket,
    enums::{DNSResourceClass, DNSResourceType, ResponseCode},
    name::Name,
    question::DNSQuestion,
    resource::{DNSResource, RData},
};
use crate::dnssec::{DnsSecValidator, TrustAnchorStore, ValidationResult};
use crate::error::{DnsError, Result};
use crate::metrics::DnsMetrics;
use crate::zone::{QueryResult, ZoneStore};

use dashmap::DashMap;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock, Weak};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{Mutex, broadcast};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

static QUERY_ID_COUNTER: AtomicU16 = AtomicU16::new(1);

/// Server health status tracking
#[derive(Debug)]
struct ServerHealth {
    /// Number of consecutive failures
    consecutive_failures: AtomicU64,
    /// Last failure time
    last_failure: Mutex<Option<Instant>>,
    /// Total requests sent to this server
    total_requests: AtomicU64,
    /// Total successful responses from this server
    successful_responses: AtomicU64,
    /// Average response time (exponential moving average)
    avg_response_time: Mutex<Option<Duration>>,
    /// Whether the server is currently marked as healthy
    is_healthy: std::sync::atomic::AtomicBool,
    /// Last health check time
    last_health_check: Mutex<Option<Instant>>,
}

impl ServerHealth {
    fn new() -> Self {
        Self {
            consecutive_failures: AtomicU64::new(0),
            last_failure: Mutex::new(None),
            total_requests: AtomicU64::new(0),
            successful_responses: AtomicU64::new(0),
            avg_response_time: Mutex::new(None),
            is_healthy: std::sync::atomic::AtomicBool::new(true),
            last_health_check: Mutex::new(None),
        }
    }

    /// Record a successful response
    fn record_success(&self, response_time: Duration) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_responses.fetch_add(1, Ordering::Relaxed);
        self.is_healthy.store(true, Ordering::Relaxed);

        // Update exponential moving average of response time (async-safe)
        if let Ok(mut avg_time) = self.avg_response_time.try_lock() {
            if let Some(current_avg) = *avg_time {
                // EMA with alpha = 0.2 (more weight to recent responses)
                let new_avg = Duration::from_millis(
                    (current_avg.as_millis() as f64 * 0.8 + response_time.as_millis() as f64 * 0.2)
                        as u64,
                );
                *avg_time = Some(new_avg);
            } else {
                *avg_time = Some(response_time);
            }
        }
    }

    /// Record a failure
    fn record_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last_failure) = self.last_failure.try_lock() {
            *last_failure = Some(Instant::now());
        }

        // Mark as unhealthy after 3 consecutive failures
        if self.consecutive_failures.load(Ordering::Relaxed) >= 3 {
            self.is_healthy.store(false, Ordering::Relaxed);
        }
    }

    /// Check if the server is currently healthy
    fn is_healthy(&self) -> bool {
        self.is_healthy.load(Ordering::Relaxed)
    }

    /// Check if enough time has passed for a health check retry
    fn should_retry_health_check(&self) -> bool {
        if self.is_healthy() {
            return true; // Always allow healthy servers
        }

        if let Ok(last_check) = self.last_health_check.try_lock() {
            match *last_check {
                Some(last) => {
                    let failures = self.consecutive_failures.load(Ordering::Relaxed);
                    // Exponential backoff: 5s, 10s, 20s, 40s, max 60s
                    let backoff_seconds = std::cmp::min(5 * (2_u64.pow(failures as u32 - 1)), 60);
                    last.elapsed() >= Duration::from_secs(backoff_seconds)
                }
                None => true, // Never checked, allow retry
            }
        } else {
            true // Can't acquire lock, be conservative and allow retry
        }
    }

    /// Update health check timestamp
    fn update_health_check_time(&self) {
        if let Ok(mut last_check) = self.last_health_check.try_lock() {
            *last_check = Some(Instant::now());
        }
    }

    /// Get server statistics
    fn get_stats(&self) -> ServerStats {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_responses.load(Ordering::Relaxed);
        let success_rate = if total > 0 {
            successful as f64 / total as f64
        } else {
            1.0
        };

        let avg_response_time = self
            .avg_response_time
            .try_lock()
            .map(|guard| *guard)
            .unwrap_or(None);

        ServerStats {
            total_requests: total,
            successful_responses: successful,
            success_rate,
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            is_healthy: self.is_healthy(),
            avg_response_time,
        }
    }
}

/// Server statistics for monitoring
#[derive(Debug, Clone)]
pub struct ServerStats {
    pub total_requests: u64,
    pub successful_responses: u64,
    pub success_rate: f64,
    pub consecutive_failures: u64,
    pub is_healthy: bool,
    pub avg_response_time: Option<Duration>,
}

/// Connection pool for reusing UDP sockets to upstream servers
#[derive(Debug)]
struct ConnectionPool {
    udp_sockets: Arc<Mutex<HashMap<SocketAddr, Vec<UdpSocket>>>>,
    max_connections_per_server: usize,
}

impl ConnectionPool {
    fn new(max_connections_per_server: usize) -> Self {
        Self {
            udp_sockets: Arc::new(Mutex::new(HashMap::new())),
            max_connections_per_server,
        }
    }

    /// Get a UDP socket for the given server, reusing existing connections when possible
    async fn get_udp_socket(&self, server_addr: SocketAddr) -> Result<UdpSocket> {
        let mut pool = self.udp_sockets.lock().await;

        // Try to get an existing socket for this server
        if let Some(sockets) = pool.get_mut(&server_addr) {
            if let Some(socket) = sockets.pop() {
                debug!("Reusing pooled UDP socket for {}", server_addr);
                return Ok(socket);
            }
        }

        // No available socket, create a new one
        debug!("Creating new UDP socket for {}", server_addr);
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;
        socket
            .connect(server_addr)
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;

        Ok(socket)
    }

    /// Return a UDP socket to the pool for reuse
    async fn return_udp_socket(&self, server_addr: SocketAddr, socket: UdpSocket) {
        let mut pool = self.udp_sockets.lock().await;

        let sockets = pool.entry(server_addr).or_insert_with(Vec::new);

        // Only pool the socket if we haven't exceeded the limit
        if sockets.len() < self.max_connections_per_server {
            debug!("Returning UDP socket to pool for {}", server_addr);
            sockets.push(socket);
        } else {
            debug!("Connection pool full for {}, dropping socket", server_addr);
            // Socket will be dropped and closed automatically
        }
    }

    /// Get pool statistics for monitoring
    async fn stats(&self) -> HashMap<SocketAddr, usize> {
        let pool = self.udp_sockets.lock().await;
        pool.iter()
            .map(|(&addr, sockets)| (addr, sockets.len()))
            .collect()
    }
}

pub struct DnsResolver {
    config: DnsConfig,
    #[allow(dead_code)]
    client_socket: UdpSocket,
    cache: Option<DnsCache>,
    /// Deduplicates concurrent resolutions of the same question fingerprint
    coalescer: crate::coalescer::Coalescer,
    /// Connection pool for upstream queries
    connection_pool: ConnectionPool,
    /// Health tracking for upstream servers
    server_health: Arc<DashMap<SocketAddr, ServerHealth>>,
    /// Metrics collector (optional)
    #[allow(dead_code)]
    metrics: Option<Arc<DnsMetrics>>,
    /// Query counter
    query_counter: AtomicU64,
    /// Error counter
    error_counter: AtomicU64,
    /// DNSSEC validator (optional)
    dnssec_validator: Option<Arc<DnsSecValidator>>,
    /// Zone store for authoritative DNS serving
    zone_store: Option<Arc<ZoneStore>>,
    /// DNS blocker (optional)
    pub blocker: Option<Arc<DnsBlocker>>,
    /// Handle back to this resolver's own `Arc`, set once via
    /// [`Self::bind_self_arc`]. A background prefetch refresh needs an
    /// owned handle that outlives the request which triggered it; until
    /// this is bound, prefetch is skipped rather than refusing to run.
    self_ref: OnceLock<Weak<DnsResolver>>,
}

impl DnsResolver {
    pub async fn new(config: DnsConfig, metrics: Option<Arc<DnsMetrics>>) -> Result<Self> {
        // Bind to a random port for upstream queries
        let client_socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;

        // Initialize cache if enabled
        let cache = if config.enable_caching {
            let rrset_capacity = (config.max_cache_size / 4).max(1);
            let cache = DnsCache::new(config.max_cache_size, rrset_capacity)
                .with_prefetch_ratio(config.cache_config.prefetch_ratio);

            if let Some(cache_path) = &config.cache_file_path {
                info!(
                    "DNS cache initialized with persistence: max_size={}, file={}",
                    config.max_cache_size, cache_path
                );
                crate::cache::snapshot::load_from_disk(&cache, cache_path).await;
            } else {
                info!(
                    "DNS cache initialized: max_size={}",
                    config.max_cache_size
                );
            }
            Some(cache)
        } else {
            info!("DNS caching disabled");
            None
        };

        info!(
            "DNS resolver initialized with {} upstream servers",
            config.upstream_servers.len()
        );
        debug!("Upstream servers: {:?}", config.upstream_servers);

        let server_health = Arc::new(DashMap::new());

        // Initialize health tracking for all upstream servers
        for &server_addr in &config.upstream_servers {
            server_health.insert(server_addr, ServerHealth::new());
        }

        // Initialize DNSSEC validator if enabled
        let dnssec_validator = if config.dnssec_enabled {
            info!("DNSSEC validation enabled");
            let trust_anchors = TrustAnchorStore::new();
            if let Some(path) = &config.trust_anchor_file {
                match trust_anchors.load_from_file(path) {
                    Ok(n) => info!("Loaded {} supplementary trust anchors from {}", n, path),
                    Err(e) => error!("Failed to load trust anchor file {}: {}", path, e),
                }
            }
            Some(Arc::new(DnsSecValidator::new(Arc::new(trust_anchors))))
        } else {
            info!("DNSSEC validation disabled");
            None
        };

        // Initialize zone store if authoritative serving is enabled
        let zone_store = if config.authoritative_enabled {
            info!("Authoritative DNS serving enabled");
            let store = Arc::new(ZoneStore::new());

            // Load configured zone files
            for zone_file in &config.zone_files {
                match store.load_zone_file(zone_file) {
                    Ok(origin) => info!("Loaded zone {} from {}", origin, zone_file),
                    Err(e) => error!("Failed to load zone file {}: {}", zone_file, e),
                }
            }

            info!("Loaded {} zones", store.zone_count());
            Some(store)
        } else {
            info!("Authoritative DNS serving disabled");
            None
        };

        // Initialize DNS blocker if enabled
        let blocker = if config.blocking_enabled {
            info!("DNS blocking enabled");
            let blocking_mode = match config.blocking_mode.as_str() {
                "nxdomain" => BlockingMode::NxDomain,
                "zero_ip" => BlockingMode::ZeroIp,
                "custom_ip" => {
                    if let Some(ref ip_str) = config.blocking_custom_ip {
                        if let Ok(ip) = ip_str.parse() {
                            BlockingMode::CustomIp(ip)
                        } else {
                            warn!(
                                "Invalid custom blocking IP: {}, falling back to NxDomain",
                                ip_str
                            );
                            BlockingMode::NxDomain
                        }
                    } else {
                        warn!(
                            "Custom IP mode selected but no IP provided, falling back to NxDomain"
                        );
                        BlockingMode::NxDomain
                    }
                }
                "refused" => BlockingMode::Refused,
                _ => {
                    warn!(
                        "Unknown blocking mode: {}, using NxDomain",
                        config.blocking_mode
                    );
                    BlockingMode::NxDomain
                }
            };

            let blocker = Arc::new(DnsBlocker::new(
                blocking_mode,
                config.blocking_enable_wildcards,
            ));

            // Initialize the Public Suffix List for domain deduplication
            if let Err(e) = blocker.initialize_psl().await {
                warn!("Failed to initialize PSL: {}", e);
            }

            // Load allowlist
            for domain in &config.allowlist {
                blocker.add_to_allowlist(domain);
            }
            info!("Loaded {} allowlist entries", config.allowlist.len());

            // Load blocklists
            let mut _total_blocked = 0;
            let mut missing_blocklists = Vec::new();

            for blocklist_spec in &config.blocklists {
                let parts: Vec<&str> = blocklist_spec.split(':').collect();
                if parts.len() == 3 {
                    let path = parts[0];
                    let format = match parts[1] {
                        "domain_list" => BlocklistFormat::DomainList,
                        "hosts" => BlocklistFormat::Hosts,
                        "adblock" => BlocklistFormat::AdBlockPlus,
                        "pihole" => BlocklistFormat::PiHole,
                        "dnsmasq" => BlocklistFormat::Dnsmasq,
                        "unbound" => BlocklistFormat::Unbound,
                        _ => {
                            warn!("Unknown blocklist format: {}", parts[1]);
                            continue;
                        }
                    };
                    let name = parts[2];

                    // Check if file exists
                    let path_buf = std::path::PathBuf::from(path);
                    if !path_buf.exists() {
                        warn!(
                            "Blocklist file not found: {} (will download if auto-update enabled)",
                            path
                        );
                        missing_blocklists.push((path_buf, format, name.to_string()));
                        continue;
                    }

                    match blocker.load_blocklist(&path_buf, format, name) {
                        Ok(count) => {
                            info!("Loaded {} domains from blocklist: {}", count, name);
                            _total_blocked += count;
                        }
                        Err(e) => {
                            error!("Failed to load blocklist {}: {}", name, e);
                        }
                    }
                }
            }

            // If auto-update is enabled and we have missing blocklists, try to download them
            if config.blocklist_auto_update && !missing_blocklists.is_empty() {
                info!("Auto-update enabled, downloading missing blocklists...");

                // Use default blocklist sources
                let mut sources = default_blocklist_sources();

                // Update the update interval from config
                for source in &mut sources {
                    source.update_interval = Some(std::time::Duration::from_secs(
                        config.blocklist_update_interval,
                    ));
                }

                let updater = BlocklistUpdater::new(sources, Arc::clone(&blocker));

                // Try to download missing blocklists
                for (path, _format, name) in missing_blocklists {
                    // Find matching source
                    if let Some(source) = updater.sources.iter().find(|s| s.path == path) {
                        match updater.update_blocklist(source).await {
                            Ok(_) => {
                                info!("Successfully downloaded blocklist: {}", name);
                                // The updater already loads the blocklist into the blocker
                            }
                            Err(e) => {
                                warn!("Failed to download blocklist {}: {}", name, e);
                            }
                        }
                    }
                }

                // Start background auto-updater task if needed
                let updater = Arc::new(updater);
                tokio::spawn(async move {
                    updater.start_auto_update().await;
                });
            }

            info!("Total blocked domains: {}", blocker.blocked_domain_count());

            Some(blocker)
        } else {
            info!("DNS blocking disabled");
            None
        };

        Ok(Self {
            config,
            client_socket,
            cache,
            coalescer: crate::coalescer::Coalescer::new(),
            connection_pool: ConnectionPool::new(5), // Pool up to 5 connections per server
            server_health,
            metrics,
            query_counter: AtomicU64::new(0),
            error_counter: AtomicU64::new(0),
            dnssec_validator,
            zone_store,
            blocker,
            self_ref: OnceLock::new(),
        })
    }

    /// Registers a handle back to this resolver's own `Arc`, needed so a
    /// background prefetch refresh can spawn a task that outlives the
    /// request which triggered it. Call once, right after wrapping the
    /// resolver in an `Arc`; idempotent if called more than once.
    pub fn bind_self_arc(self: &Arc<Self>) {
        let _ = self.self_ref.set(Arc::downgrade(self));
    }

    /// Resolve a DNS query with automatic mode detection
    pub async fn resolve(&self, query: DNSPacket, original_id: u16) -> Result<DNSPacket> {
        // Increment query counter
        self.query_counter.fetch_add(1, Ordering::Relaxed);

        // Check for blocked domains if blocking is enabled
        if let Some(blocker) = &self.blocker {
            if !query.questions.is_empty() {
                let question = &query.questions[0];
                let domain = question.labels.join(".");

                if blocker.is_blocked(&domain) {
                    debug!("Domain {} is blocked", domain);

                    // Update blocking metrics if available
                    if let Some(metrics) = &self.metrics {
                        metrics.blocked_queries.inc();
                    }

                    // Return appropriate response based on blocking mode
                    return match blocker.blocking_mode() {
                        BlockingMode::NxDomain => Ok(self.create_nxdomain_response(&query)),
                        BlockingMode::ZeroIp => {
                            Ok(self.create_zero_ip_response(&query, original_id))
                        }
                        BlockingMode::CustomIp(ip) => {
                            Ok(self.create_custom_ip_response(&query, original_id, ip))
                        }
                        BlockingMode::Refused => Ok(self.create_refused_response(&query)),
                    };
                }
            }
        }

        // Check for authoritative answer first if enabled
        if let Some(zone_store) = &self.zone_store {
            if !query.questions.is_empty() {
                let question = &query.questions[0];
                let qname = question.labels.join(".");

                match zone_store.query(&qname, question.qtype) {
                    QueryResult::Success { records, .. } => {
                        debug!(
                            "Authoritative answer for {}: {} records",
                            qname,
                            records.len()
                        );
                        return self.build_authoritative_response(
                            query,
                            original_id,
                            records,
                            ResponseCode::NoError,
                            true,
                        );
                    }
                    QueryResult::NoData { soa, .. } => {
                        debug!("Authoritative NODATA for {}", qname);
                        let soa_records = soa.map(|s| vec![s]).unwrap_or_default();
                        return self.build_authoritative_response(
                            query,
                            original_id,
                            soa_records,
                            ResponseCode::NoError,
                            true,
                        );
                    }
                    QueryResult::NXDomain { soa, .. } => {
                        debug!("Authoritative NXDOMAIN for {}", qname);
                        let soa_records = soa.map(|s| vec![s]).unwrap_or_default();
                        return self.build_authoritative_response(
                            query,
                            original_id,
                            soa_records,
                            ResponseCode::NameError,
                            true,
                        );
                    }
                    QueryResult::Delegation { ns_records, .. } => {
                        debug!("Delegation for {}: {} NS records", qname, ns_records.len());
                        return self.build_authoritative_response(
                            query,
                            original_id,
                            ns_records,
                            ResponseCode::NoError,
                            false,
                        );
                    }
                    QueryResult::NotAuthoritative => {
                        // Fall through to recursive resolution
                        debug!("Not authoritative for {}", qname);
                    }
                    QueryResult::Error(e) => {
                        warn!("Zone query error for {}: {}", qname, e);
                        // Fall through to recursive resolution
                    }
                }
            }
        }

        // Check cache if enabled and we have questions
        if let Some(cache) = &self.cache {
            if !query.questions.is_empty() {
                let question = &query.questions[0];
                let fingerprint = DnsCache::fingerprint_for(question);
                if let Some(mut cached_response) = cache.lookup(question) {
                    // Restore original query ID
                    cached_response.header.id = original_id;
                    debug!("Cache hit for query: {}", fingerprint);
                    if cache.should_prefetch(&fingerprint) {
                        self.spawn_prefetch_refresh(question.clone(), fingerprint);
                    }
                    return Ok(cached_response);
                }

                // RFC 8198 aggressive negative caching: a previously
                // validated NSEC/NSEC3 denial proof may already cover this
                // name/type without a cached message to match, e.g. the
                // proof came from a different query under the same gap.
                if let Some(mut response) = self.negative_cache_answer(cache, question) {
                    response.header.id = original_id;
                    return Ok(response);
                }

                // The message cache missed, but the RRset tier or a cached
                // CNAME chain may still be able to answer without going
                // upstream.
                if let Some(mut response) = cache.synthesize(question) {
                    response.header.id = original_id;
                    debug!(%fingerprint, "answered from RRset cache synthesis");
                    return Ok(response);
                }
            }
        }

        // Not a cache hit; the coalescer makes sure at most one caller
        // resolves this fingerprint at a time, everyone else joins in.
        if !query.questions.is_empty() {
            let fingerprint = DnsCache::fingerprint_for(&query.questions[0]);
            self.resolve_with_deduplication(query, original_id, fingerprint)
                .await
        } else {
            // No questions, resolve directly without deduplication
            self.recurse(query, original_id).await
        }
    }

    /// Single entry point into the recursor for a cache/coalescer miss.
    ///
    /// The server's resolution *strategy* (start from the root and follow
    /// referrals vs. forward to a configured upstream full resolver) is a
    /// deployment choice (`config.enable_iterative`), not something the
    /// client's RD bit should pick: this resolver always sets `RA=1` and
    /// does the recursive work itself. `QueryMode` only governs response
    /// flags, not which internal path runs.
    async fn recurse(&self, query: DNSPacket, original_id: u16) -> Result<DNSPacket> {
        if self.config.enable_iterative && !self.config.root_servers.is_empty() {
            self.resolve_iteratively(query, original_id).await
        } else {
            self.resolve_recursively(query, original_id).await
        }
    }

    /// Checks the aggressive negative cache for a proof that already
    /// covers `question`, walking from the queried name up toward the
    /// root since the resolver doesn't track zone cuts independently of
    /// the proofs it has stored. Returns a synthesized NXDOMAIN/NODATA
    /// response on a hit.
    fn negative_cache_answer(&self, cache: &DnsCache, question: &DNSQuestion) -> Option<DNSPacket> {
        let qname = Name::from_labels(question.labels.clone());
        let mut zone = qname.clone();
        loop {
            if let Some(kind) = cache.negative.lookup(&zone, &qname, Some(question.qtype)) {
                debug!(name = %qname, zone = %zone, ?kind, "aggressive negative cache hit");
                let rcode = match kind {
                    Kind::NxDomain => ResponseCode::NameError,
                    _ => ResponseCode::NoError,
                };
                let mut response = DNSPacket::new_query(0, question.labels.clone(), question.qtype);
                response.questions[0].qclass = question.qclass;
                response.header.qr = true;
                response.header.ra = true;
                response.header.rcode = rcode.to_u8();
                // Only ever inserted for a Secure-validated proof.
                response.header.ad = true;
                return Some(response);
            }
            match zone.parent() {
                Some(parent) => zone = parent,
                None => break,
            }
        }
        None
    }

    /// Spawns a background refresh of an entry that's crossed its
    /// prefetch threshold. Runs through the coalescer under a
    /// `+refresh`-suffixed key so it never joins (or blocks on) a live
    /// miss for the same question, and replaces the cache entry on
    /// success. A no-op until [`Self::bind_self_arc`] has been called.
    fn spawn_prefetch_refresh(&self, question: DNSQuestion, fingerprint: Fingerprint) {
        let Some(resolver) = self.self_ref.get().and_then(Weak::upgrade) else {
            trace!(%fingerprint, "prefetch skipped: resolver has no self-reference bound");
            return;
        };

        tokio::spawn(async move {
            let refresh_key = fingerprint.for_refresh();
            let refresh_question = question.clone();
            let op_resolver = resolver.clone();
            let result = resolver
                .coalescer
                .execute(refresh_key, move || {
                    let mut refresh_query =
                        DNSPacket::new_query(0, refresh_question.labels.clone(), refresh_question.qtype);
                    refresh_query.questions[0].qclass = refresh_question.qclass;
                    async move { op_resolver.recurse(refresh_query, 0).await }
                })
                .await;

            match &result {
                Ok(_) => debug!(%fingerprint, "prefetch refresh completed"),
                Err(e) => {
                    debug!(%fingerprint, error = %e, "prefetch refresh failed");
                    return;
                }
            }

            let mut refresh_query = DNSPacket::new_query(0, question.labels.clone(), question.qtype);
            refresh_query.questions[0].qclass = question.qclass;
            resolver.finalize_result(result, &refresh_query).await.ok();
        });
    }

    /// Resolve a query with deduplication support: at most one upstream
    /// resolution per fingerprint runs at a time, everyone else joins it.
    async fn resolve_with_deduplication(
        &self,
        query: DNSPacket,
        original_id: u16,
        fingerprint: Fingerprint,
    ) -> Result<DNSPacket> {
        let result = self
            .coalescer
            .execute(fingerprint, || {
                let query = query.clone();
                async move { self.recurse(query, original_id).await }
            })
            .await;

        let result = self.finalize_result(result, &query).await;

        result.map(|mut response| {
            response.header.id = original_id;
            response
        })
    }

    /// Settles a resolved result before it reaches the client: derives its
    /// DNSSEC trust state once, sets `AD` when that state is `Secure`,
    /// turns a `Bogus` answer into SERVFAIL unless the query's `CD` bit
    /// asked to see it anyway, and caches the outcome across all three
    /// cache tiers (message, RRset, and NSEC/NSEC3 denial proofs).
    async fn finalize_result(&self, result: Result<DNSPacket>, query: &DNSPacket) -> Result<DNSPacket> {
        let Some(question) = query.questions.first().cloned() else {
            return result;
        };

        match result {
            Ok(mut response) => {
                let trust = self.trust_state_for(&response, &question).await;

                if let TrustState::Bogus(reason) = &trust {
                    if !query.header.cd {
                        warn!(
                            name = %question.labels.join("."),
                            reason = %reason,
                            "returning SERVFAIL for bogus DNSSEC answer"
                        );
                        if let Some(cache) = &self.cache {
                            cache.insert_failure_marker(
                                &question.labels,
                                question.qtype,
                                question.qclass,
                                response,
                            );
                        }
                        return Ok(self.create_servfail_response(query));
                    }
                    // CD=1: the client asked to see bogus data itself, so
                    // it's returned as-is, just never marked Authentic.
                    response.header.ad = false;
                } else {
                    response.header.ad = matches!(trust, TrustState::Secure);
                }

                self.cache_result(&response, &question, trust);

                Ok(response)
            }
            Err(e) => {
                // A transient failure (timeout, no healthy servers) still
                // leaves a marker so a retry storm doesn't pile onto the
                // same failing name.
                if let Some(cache) = &self.cache {
                    let template = self.create_servfail_response(query);
                    cache.insert_failure_marker(
                        &question.labels,
                        question.qtype,
                        question.qclass,
                        template,
                    );
                }
                Err(e)
            }
        }
    }

    /// Stores a successful answer across every cache tier it belongs in:
    /// the full message (for an exact-question hit), its constituent
    /// RRsets (for synthesis), and — for a Secure NXDOMAIN/NODATA — the
    /// NSEC/NSEC3 denial proof it carried (for aggressive negative
    /// caching). A `Bogus` result is never cached as a usable answer,
    /// only as a short-lived failure marker.
    fn cache_result(&self, response: &DNSPacket, question: &DNSQuestion, trust: TrustState) {
        let Some(cache) = &self.cache else { return };

        let kind = match response.header.rcode {
            rcode if rcode == ResponseCode::NameError.to_u8() => Kind::NxDomain,
            rcode if rcode == ResponseCode::NoError.to_u8() => {
                if response.header.ancount == 0 {
                    Kind::NoData
                } else {
                    Kind::Positive
                }
            }
            _ => {
                cache.insert_failure_marker(
                    &question.labels,
                    question.qtype,
                    question.qclass,
                    response.clone(),
                );
                return;
            }
        };

        if matches!(trust, TrustState::Bogus(_)) {
            cache.insert_failure_marker(
                &question.labels,
                question.qtype,
                question.qclass,
                response.clone(),
            );
            return;
        }

        let ttl = min_record_ttl(response).unwrap_or(self.config.default_ttl);
        cache.insert(
            &question.labels,
            question.qtype,
            question.qclass,
            response.clone(),
            kind,
            trust.clone(),
            ttl,
        );

        if matches!(kind, Kind::Positive) {
            self.cache_rrsets(cache, response, trust.clone());
        }

        if matches!(trust, TrustState::Secure) && matches!(kind, Kind::NxDomain | Kind::NoData) {
            if let Some(range) = extract_denial_range(response, question, kind) {
                cache.negative.insert(range);
            }
        }

        let stats = cache.messages.stats();
        let total = stats.hits + stats.misses;
        if total > 0 && total % 100 == 0 {
            debug!(
                hits = stats.hits,
                misses = stats.misses,
                stale_hits = stats.stale_hits,
                "cache performance"
            );
        }
    }

    /// Decomposes a positive answer's records into per-`(owner, type,
    /// class)` RRsets and stores each one, pairing it with whichever
    /// RRSIGs cover that type at that owner. OPT pseudo-records never
    /// participate (handled by [`DnsCache::insert_rrset`] too, but
    /// skipped here first to avoid grouping EDNS0 options as if they were
    /// answer data).
    fn cache_rrsets(&self, cache: &DnsCache, response: &DNSPacket, trust: TrustState) {
        let mut groups: HashMap<(Vec<String>, DNSResourceType), Vec<DNSResource>> = HashMap::new();
        let mut signatures: HashMap<(Vec<String>, DNSResourceType), Vec<DNSResource>> = HashMap::new();

        for record in response.answers.iter().chain(response.resources.iter()) {
            if record.rtype == DNSResourceType::OPT {
                continue;
            }
            let owner: Vec<String> = record.name.iter().map(|l| l.to_ascii_lowercase()).collect();
            if let RData::Rrsig { type_covered, .. } = &record.rdata {
                let covered = DNSResourceType::from(*type_covered);
                signatures.entry((owner, covered)).or_default().push(record.clone());
            } else {
                groups.entry((owner, record.rtype)).or_default().push(record.clone());
            }
        }

        for ((owner, rtype), records) in groups {
            let ttl = records.iter().map(|r| r.ttl).min().unwrap_or(self.config.default_ttl);
            let sigs = signatures.remove(&(owner.clone(), rtype)).unwrap_or_default();
            cache.insert_rrset(&owner, rtype, records[0].class(), records, sigs, trust.clone(), ttl);
        }
    }

    /// Re-derives the DNSSEC trust state for a response already returned
    /// from upstream, for cache-insertion purposes. Cheap: it revalidates
    /// signature material already present in `response`, it does not issue
    /// another query.
    async fn trust_state_for(&self, response: &DNSPacket, question: &DNSQuestion) -> TrustState {
        match &self.dnssec_validator {
            Some(validator) => {
                let qname = question.labels.join(".");
                validator
                    .validate_with_denial(response, &qname, question.qtype)
                    .await
            }
            None => TrustState::Insecure,
        }
    }

    /// Resolve a DNS query by forwarding it to upstream servers (recursive)
    async fn resolve_recursively(
        &self,
        mut query: DNSPacket,
        original_id: u16,
    ) -> Result<DNSPacket> {
        // Generate a new query ID for upstream request
        let upstream_id = QUERY_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        query.header.id = upstream_id;

        debug!(
            "Resolving query: original_id={}, upstream_id={}, questions={}",
            original_id, upstream_id, query.header.qdcount
        );

        // Use parallel queries if we have multiple upstream servers
        if self.config.upstream_servers.len() > 1 && self.config.enable_parallel_queries {
            match self
                .resolve_with_parallel_queries(&query, original_id)
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        "Parallel queries failed, falling back to sequential: {:?}",
                        e
                    );
                    // Fall through to sequential resolution
                }
            }
        }

        // Sequential fallback (original behavior)
        self.resolve_sequentially(&query, original_id).await
    }

    /// Resolve using parallel queries to multiple upstream servers with health awareness
    async fn resolve_with_parallel_queries(
        &self,
        query: &DNSPacket,
        original_id: u16,
    ) -> Result<DNSPacket> {
        use futures::future::FutureExt;
        use tokio::time::timeout;

        // Get healthy servers for parallel queries
        let servers_to_query = self.get_servers_by_health_priority();

        if servers_to_query.is_empty() {
            error!("No healthy servers available for parallel queries");
            return Err(DnsError::Parse("No healthy servers available".to_string()));
        }

        debug!(
            "Starting parallel queries to {} healthy upstream servers",
            servers_to_query.len()
        );

        // Create futures for each healthy upstream server
        let query_futures: Vec<_> = servers_to_query
            .iter()
            .enumerate()
            .filter_map(|(idx, &upstream_addr)| {
                // Check if we should try this server
                if let Some(health) = self.server_health.get(&upstream_addr) {
                    if !health.should_retry_health_check() {
                        debug!(
                            "Skipping unhealthy server {} in parallel query",
                            upstream_addr
                        );
                        return None;
                    }
                    health.update_health_check_time();
                }

                let query = query.clone();
                Some(
                    async move {
                        debug!(
                            "Parallel query {}: starting query to {}",
                            idx, upstream_addr
                        );
                        let start_time = std::time::Instant::now();

                        match self.query_upstream(&query, upstream_addr).await {
                            Ok(mut response) => {
                                let elapsed = start_time.elapsed();

                                // Record successful response
                                if let Some(health) = self.server_health.get(&upstream_addr) {
                                    health.record_success(elapsed);

                                    // Record individual response time metric
                                    if let Some(metrics) = &self.metrics {
                                        metrics
                                            .upstream_response_time
                                            .with_label_values(&[&upstream_addr.to_string()])
                                            .observe(elapsed.as_secs_f64());
                                    }
                                }

                                debug!(
                                    "Parallel query {}: SUCCESS from {} in {:?}",
                                    idx, upstream_addr, elapsed
                                );

                                // Restore original query ID
                                response.header.id = original_id;

                                // Handle EDNS response setup
                                self.setup_edns_response(&query, &mut response);

                                Ok((response, upstream_addr, elapsed))
                            }
                            Err(e) => {
                                let elapsed = start_time.elapsed();

                                // Record failure
                                if let Some(health) = self.server_health.get(&upstream_addr) {
                                    health.record_failure();
                                }

                                debug!(
                                    "Parallel query {}: FAILED from {} in {:?}: {:?}",
                                    idx, upstream_addr, elapsed, e
                                );
                                Err(e)
                            }
                        }
                    }
                    .boxed(),
                )
            })
            .collect();

        if query_futures.is_empty() {
            warn!("No servers available for parallel queries after health filtering");
            return Err(DnsError::Parse(
                "No healthy servers available for parallel queries".to_string(),
            ));
        }

        // Race all queries with a timeout
        let parallel_timeout =
            std::cmp::min(self.config.upstream_timeout, Duration::from_millis(2000));

        match timeout(parallel_timeout, futures::future::select_ok(query_futures)).await {
            Ok(Ok(((response, upstream_addr, elapsed), _remaining_futures))) => {
                debug!(
                    "Parallel query SUCCESS: {} responded in {:?} (faster than others)",
                    upstream_addr, elapsed
                );
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!("All parallel queries failed: {:?}", e);
                Err(e)
            }
            Err(_) => {
                warn!(
                    "All parallel queries timed out after {:?}",
                    parallel_timeout
                );
                Err(DnsError::Parse(
                    "All parallel queries timed out".to_string(),
                ))
            }
        }
    }

    /// Sequential resolution with automatic failover
    async fn resolve_sequentially(&self, query: &DNSPacket, original_id: u16) -> Result<DNSPacket> {
        let mut last_error = None;

        // Get healthy servers first, then unhealthy ones as fallback
        let servers_to_try = self.get_servers_by_health_priority();

        if servers_to_try.is_empty() {
            error!("No upstream servers available");
            return Err(DnsError::Parse("No upstream servers available".to_string()));
        }

        for (attempt, &upstream_addr) in servers_to_try.iter().enumerate() {
            // Check if we should try this server
            if let Some(health) = self.server_health.get(&upstream_addr) {
                if !health.should_retry_health_check() {
                    debug!(
                        "Skipping unhealthy server {} (in backoff period)",
                        upstream_addr
                    );
                    continue;
                }
                health.update_health_check_time();
            }

            let start_time = Instant::now();
            match self.query_upstream(query, upstream_addr).await {
                Ok(mut response) => {
                    let response_time = start_time.elapsed();

                    // Record successful response
                    if let Some(health) = self.server_health.get(&upstream_addr) {
                        health.record_success(response_time);

                        // Record individual response time metric
                        if let Some(metrics) = &self.metrics {
                            metrics
                                .upstream_response_time
                                .with_label_values(&[&upstream_addr.to_string()])
                                .observe(response_time.as_secs_f64());
                        }

                        debug!(
                            "Successfully resolved query from upstream {} (attempt {}, response_time: {:?})",
                            upstream_addr,
                            attempt + 1,
                            response_time
                        );
                    }

                    // Restore original query ID
                    response.header.id = original_id;

                    // Handle EDNS response setup
                    self.setup_edns_response(query, &mut response);

                    return Ok(response);
                }
                Err(e) => {
                    // Record failure
                    if let Some(health) = self.server_health.get(&upstream_addr) {
                        health.record_failure();
                        let stats = health.get_stats();
                        warn!(
                            "Failed to resolve from upstream {} (attempt {}): {:?} - Server stats: {} failures, {:.1}% success rate",
                            upstream_addr,
                            attempt + 1,
                            e,
                            stats.consecutive_failures,
                            stats.success_rate * 100.0
                        );
                    }

                    last_error = Some(e);

                    // If this isn't the last server, continue to next
                    if attempt < servers_to_try.len() - 1 {
                        continue;
                    }
                }
            }
        }

        // All upstream servers failed
        error!(
            "All upstream servers failed to resolve query after trying {} servers",
            servers_to_try.len()
        );
        Err(last_error.unwrap_or(DnsError::Parse("No upstream servers available".to_string())))
    }

    /// Get upstream servers ordered by health priority (healthy first, then unhealthy)
    fn get_servers_by_health_priority(&self) -> Vec<SocketAddr> {
        let mut healthy_servers = Vec::new();
        let mut unhealthy_servers = Vec::new();

        for &server_addr in &self.config.upstream_servers {
            if let Some(health) = self.server_health.get(&server_addr) {
                if health.is_healthy() {
                    healthy_servers.push(server_addr);
                } else if health.should_retry_health_check() {
                    unhealthy_servers.push(server_addr);
                }
            } else {
                // No health data yet, treat as healthy
                healthy_servers.push(server_addr);
            }
        }

        // Sort healthy servers by average response time (fastest first)
        healthy_servers.sort_by(|&a, &b| {
            let a_health = self.server_health.get(&a);
            let b_health = self.server_health.get(&b);

            match (a_health, b_health) {
                (Some(a_health), Some(b_health)) => {
                    let a_time = a_health
                        .avg_response_time
                        .try_lock()
                        .map(|guard| *guard)
                        .unwrap_or(None)
                        .unwrap_or(Duration::from_millis(1000));
                    let b_time = b_health
                        .avg_response_time
                        .try_lock()
                        .map(|guard| *guard)
                        .unwrap_or(None)
                        .unwrap_or(Duration::from_millis(1000));
                    a_time.cmp(&b_time)
                }
                _ => std::cmp::Ordering::Equal,
            }
        });

        // Return healthy servers first, then unhealthy as fallback
        healthy_servers.extend(unhealthy_servers);
        healthy_servers
    }

    /// Setup EDNS response based on query capabilities
    fn setup_edns_response(&self, query: &DNSPacket, response: &mut DNSPacket) {
        if !query.supports_edns() {
            return;
        }
        let client_buffer_size = query.max_udp_payload_size();
        let server_buffer_size = std::cmp::min(client_buffer_size, 4096); // Cap at 4KB
        let do_flag = response.supports_edns() && response.dnssec_do();
        response.add_edns(server_buffer_size, do_flag);
        debug!(
            "Negotiated EDNS buffer size: client={}, server={}",
            client_buffer_size, server_buffer_size
        );
    }

    /// Query a specific upstream server
    async fn query_upstream(
        &self,
        query: &DNSPacket,
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket> {
        // Clone query to modify for DNSSEC if needed
        let mut query_to_send = query.clone();

        // Set DNSSEC DO flag if validation is enabled
        if self.dnssec_validator.is_some() {
            let payload_size = if query_to_send.supports_edns() {
                query_to_send.max_udp_payload_size()
            } else {
                4096
            };
            query_to_send.add_edns(payload_size, true); // DO flag set
        }

        // Serialize the query
        let query_bytes = query_to_send
            .serialize()
            .map_err(|e| DnsError::Parse(format!("Failed to serialize query: {:?}", e)))?;

        trace!(
            "Sending {} bytes to upstream {}",
            query_bytes.len(),
            upstream_addr
        );

        // Send query with retries
        for retry in 0..=self.config.max_retries {
            match self
                .send_query_with_timeout(&query_bytes, upstream_addr)
                .await
            {
                Ok(response) => {
                    if retry > 0 {
                        debug!("Query succeeded on retry {}", retry);
                    }

                    // Perform DNSSEC validation if enabled
                    if let Some(dnssec_validator) = &self.dnssec_validator {
                        if !query.questions.is_empty() {
                            let qname = query.questions[0].labels.join(".");
                            let qtype = query.questions[0].qtype;

                            let validation_result = dnssec_validator
                                .validate_with_denial(&response, &qname, qtype)
                                .await;

                            match validation_result {
                                ValidationResult::Secure => {
                                    debug!("DNSSEC validation successful for {}", qname);
                                }
                                ValidationResult::Insecure => {
                                    debug!("Response is not DNSSEC signed for {}", qname);
                                }
                                ValidationResult::Bogus(reason) => {
                                    warn!("DNSSEC validation failed for {}: {}", qname, reason);
                                    if self.config.dnssec_strict && !query.header.cd {
                                        // In strict mode, treat bogus responses as failures
                                        // unless the client explicitly asked to see them (CD=1).
                                        return Err(DnsError::Parse(format!(
                                            "DNSSEC validation failed: {}",
                                            reason
                                        )));
                                    }
                                    // In non-strict mode, or when the client set CD, still
                                    // return the response; finalize_result decides AD/rcode.
                                }
                                ValidationResult::Indeterminate => {
                                    debug!("DNSSEC validation indeterminate for {}", qname);
                                }
                            }
                        }
                    }

                    return Ok(response);
                }
                Err(e) => {
                    if retry < self.config.max_retries {
                        debug!("Query attempt {} failed, retrying: {:?}", retry + 1, e);
                        // Brief delay before retry
                        tokio::time::sleep(Duration::from_millis(100 * (retry + 1) as u64)).await;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        unreachable!("Loop should have returned")
    }

    /// Send query with timeout (try UDP first, fallback to TCP if truncated)
    async fn send_query_with_timeout(
        &self,
        query_bytes: &[u8],
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket> {
        let query_future = async {
            // Try UDP first
            match self.send_udp_query(query_bytes, upstream_addr).await {
                Ok(response) => {
                    // Check if response is truncated
                    if response.header.tc {
                        debug!("UDP response truncated, retrying with TCP");
                        // Fallback to TCP
                        self.send_tcp_query(query_bytes, upstream_addr).await
                    } else {
                        Ok(response)
                    }
                }
                Err(e) => Err(e),
            }
        };

        // Apply timeout
        timeout(self.config.upstream_timeout, query_future)
            .await
            .map_err(|_| DnsError::Parse("Upstream query timeout".to_string()))?
    }

    /// Send query via UDP using connection pooling
    async fn send_udp_query(
        &self,
        query_bytes: &[u8],
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket> {
        // Get a socket from the connection pool
        let socket = self.connection_pool.get_udp_socket(upstream_addr).await?;

        // Send the query
        socket
            .send(query_bytes)
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;

        // Wait for response
        let mut response_buf = vec![0u8; 4096];
        let response_len = socket
            .recv(&mut response_buf)
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;

        // Return the socket to the pool for reuse
        self.connection_pool
            .return_udp_socket(upstream_addr, socket)
            .await;

        // Log the raw response for debugging
        trace!(
            "Raw UDP response data ({} bytes): {:02x?}",
            response_len,
            &response_buf[..response_len.min(64)]
        );

        // Parse the response
        let response = DNSPacket::parse(&response_buf[..response_len]).map_err(|e| {
            // Log more details about the parsing failure
            debug!(
                "Failed to parse UDP response from {}: {:?}",
                upstream_addr, e
            );
            debug!("Response length: {} bytes", response_len);
            debug!(
                "First 64 bytes: {:02x?}",
                &response_buf[..response_len.min(64)]
            );
            DnsError::Parse(format!("Failed to parse response: {:?}", e))
        })?;

        self.log_response_details(&response, response_len, "UDP");
        Ok(response)
    }

    /// Send query via TCP
    async fn send_tcp_query(
        &self,
        query_bytes: &[u8],
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket> {
        // Connect to upstream server
        let mut stream = TcpStream::connect(upstream_addr)
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;

        // Send length-prefixed query
        let query_length = query_bytes.len() as u16;
        stream
            .write_all(&query_length.to_be_bytes())
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;
        stream
            .write_all(query_bytes)
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;

        // Read response length
        let mut length_buf = [0u8; 2];
        stream
            .read_exact(&mut length_buf)
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;
        let response_length = u16::from_be_bytes(length_buf) as usize;

        // Read response data
        let mut response_buf = vec![0; response_length];
        stream
            .read_exact(&mut response_buf)
            .await
            .map_err(|e| DnsError::Io(e.to_string()))?;

        // Log the raw response for debugging
        trace!(
            "Raw TCP response data ({} bytes): {:02x?}",
            response_length,
            &response_buf[..response_length.min(64)]
        );

        // Parse the response
        let response = DNSPacket::parse(&response_buf).map_err(|e| {
            // Log more details about the parsing failure
            debug!(
                "Failed to parse TCP response from {}: {:?}",
                upstream_addr, e
            );
            debug!("Response length: {} bytes", response_length);
            debug!(
                "First 64 bytes: {:02x?}",
                &response_buf[..response_length.min(64)]
            );
            DnsError::Parse(format!("Failed to parse response: {:?}", e))
        })?;

        self.log_response_details(&response, response_length, "TCP");
        Ok(response)
    }

    /// Log response details for debugging
    fn log_response_details(&self, response: &DNSPacket, response_len: usize, protocol: &str) {
        debug!(
            "Parsed {} response: questions={}, answers={}, authorities={}, additional={}",
            protocol,
            response.header.qdcount,
            response.header.ancount,
            response.header.nscount,
            response.header.arcount
        );

        for (i, answer) in response.answers.iter().enumerate() {
            debug!(
                "Answer {}: type={:?}, class={:?}, ttl={}, rdata={:?}",
                i,
                answer.rtype,
                answer.class(),
                answer.ttl,
                answer.rdata
            );
        }

        trace!(
            "Received {} response: {} bytes, {} answers",
            protocol, response_len, response.header.ancount
        );
    }

    /// Create a SERVFAIL response for when resolution fails
    pub fn create_servfail_response(&self, query: &DNSPacket) -> DNSPacket {
        let mut response = query.clone();
        response.header.qr = true; // This is a response
        response.header.ra = true; // Recursion available
        response.header.rcode = ResponseCode::ServerFailure.to_u8(); // SERVFAIL
        response.header.ancount = 0; // No answers
        response.header.nscount = 0; // No authority records
        response.header.arcount = 0; // No additional records

        // Clear answer sections
        response.answers.clear();
        response.authorities.clear();
        response.resources.clear();

        // Note: SERVFAIL responses typically don't include SOA records
        // as they indicate a server problem rather than a definitive
        // negative answer about the domain's existence

        response
    }

    /// Create a truncated response for UDP size limits
    pub fn create_truncated_response(&self, query: &DNSPacket) -> DNSPacket {
        let mut response = query.clone();
        response.header.qr = true; // This is a response
        response.header.ra = true; // Recursion available
        response.header.tc = true; // Truncated - client should retry with TCP
        response.header.rcode = ResponseCode::NoError.to_u8(); // NOERROR
        response.header.ancount = 0; // No answers (truncated)
        response.header.nscount = 0; // No authority records
        response.header.arcount = 0; // No additional records (except EDNS if present)

        // Clear answer sections to ensure response fits in UDP
        response.answers.clear();
        response.authorities.clear();
        response.resources.clear();

        response
    }

    /// Create a NXDOMAIN response for non-existent domains with proper SOA authority
    pub fn create_nxdomain_response(&self, query: &DNSPacket) -> DNSPacket {
        let mut response = query.clone();
        response.header.qr = true; // This is a response
        response.header.ra = true; // Recursion available
        response.header.rcode = ResponseCode::NameError.to_u8(); // NXDOMAIN
        response.header.ancount = 0; // No answers
        response.header.arcount = 0; // No additional records

        // Clear answer and additional sections
        response.answers.clear();
        response.authorities.clear();
        response.resources.clear();

        // Add SOA record in authority section for RFC 2308 compliance
        if !query.questions.is_empty() {
            if let Some(soa_record) = self.create_synthetic_soa_record(&query.questions[0].labels) {
                response.authorities.push(soa_record);
                response.header.nscount = 1;
            } else {
                response.header.nscount = 0;
            }
        } else {
            response.header.nscount = 0;
        }

        response
    }

    /// Create a REFUSED response for policy violations or administrative refusal
    pub fn create_refused_response(&self, query: &DNSPacket) -> DNSPacket {
        let mut response = query.clone();
        response.header.qr = true; // This is a response
        response.header.ra = true; // Recursion available
        response.header.rcode = ResponseCode::Refused.to_u8(); // REFUSED
        response.header.ancount = 0; // No answers
        response.header.nscount = 0; // No authority records
        response.header.arcount = 0; // No additional records

        // Clear answer sections
        response.answers.clear();
        response.authorities.clear();
        response.resources.clear();

        response
    }

    /// Create a NOTIMPL response for unsupported operations
    pub fn create_notimpl_response(&self, query: &DNSPacket) -> DNSPacket {
        let mut response = query.clone();
        response.header.qr = true; // This is a response
        response.header.ra = false; // May not support recursion for this operation
        response.header.rcode = ResponseCode::NotImplemented.to_u8(); // NOTIMPL
        response.header.ancount = 0; // No answers
        response.header.nscount = 0; // No authority records
        response.header.arcount = 0; // No additional records

        // Clear answer sections but preserve question
        response.answers.clear();
        response.authorities.clear();
        response.resources.clear();

        response
    }

    /// Create a FORMERR response for malformed queries
    pub fn create_formerr_response(&self, query: &DNSPacket) -> DNSPacket {
        let mut response = query.clone();
        response.header.qr = true; // This is a response
        response.header.ra = true; // Recursion available
        response.header.rcode = ResponseCode::FormatError.to_u8(); // FORMERR
        response.header.ancount = 0; // No answers
        response.header.nscount = 0; // No authority records
        response.header.arcount = 0; // No additional records

        // Clear answer sections
        response.answers.clear();
        response.authorities.clear();
        response.resources.clear();

        response
    }

    /// Resolve a DNS query iteratively starting from root servers
    async fn resolve_iteratively(
        &self,
        query: DNSPacket,
        original_id: u16,
    ) -> Result<DNSPacket> {
        const MAX_CNAME_CHAIN: u8 = 10;

        if query.questions.is_empty() {
            return Err(DnsError::Parse("No questions in query".to_string()));
        }

        let original_question = query.questions[0].clone();
        let mut current_question = original_question.clone();
        let mut cname_chain: Vec<DNSResource> = Vec::new();

        debug!(
            "Starting iterative resolution for query id={} name={}",
            original_id,
            Name::from_labels(current_question.labels.clone())
        );

        loop {
            let response = self.resolve_name_from_root(&current_question).await?;

            // An authoritative NXDOMAIN/NODATA or genuine answer ends the
            // chase unless the answer is itself a CNAME we need to follow.
            let cname_hop = response
                .answers
                .iter()
                .find(|rr| rr.rtype == DNSResourceType::CNAME);

            match cname_hop {
                Some(hop) if current_question.qtype != DNSResourceType::CNAME => {
                    let RData::Cname(target) = &hop.rdata else {
                        unreachable!("CNAME record without Cname rdata")
                    };
                    cname_chain.push(hop.clone());
                    if cname_chain.len() as u8 >= MAX_CNAME_CHAIN {
                        warn!(
                            "CNAME chain for {} exceeded {} hops, giving up",
                            Name::from_labels(original_question.labels.clone()),
                            MAX_CNAME_CHAIN
                        );
                        return Err(DnsError::Recursor("CNAME chain too long".to_string()));
                    }

                    // The answer may already carry the final record alongside
                    // the CNAME (authoritative servers often do); if so we're done.
                    if response
                        .answers
                        .iter()
                        .any(|rr| rr.rtype == current_question.qtype)
                    {
                        let mut final_response = response;
                        final_response.header.id = original_id;
                        return Ok(final_response);
                    }

                    current_question = DNSQuestion {
                        labels: target.clone(),
                        qtype: current_question.qtype,
                        qclass: current_question.qclass,
                    };
                    continue;
                }
                _ => {
                    let hops = cname_chain.len();
                    let mut final_response = response;
                    final_response.header.id = original_id;
                    // Splice earlier CNAME hops back in front of the final answer.
                    if !cname_chain.is_empty() {
                        let mut answers = std::mem::take(&mut cname_chain);
                        answers.extend(final_response.answers.drain(..));
                        final_response.header.ancount = answers.len() as u16;
                        final_response.answers = answers;
                    }
                    info!(
                        "Iterative resolution for {} completed ({} CNAME hop(s))",
                        Name::from_labels(original_question.labels.clone()),
                        hops
                    );
                    return Ok(final_response);
                }
            }
        }
    }

    /// Follow referrals from the configured root hints down to an
    /// authoritative answer for a single question, without CNAME chasing.
    async fn resolve_name_from_root(&self, question: &DNSQuestion) -> Result<DNSPacket> {
        let mut current_servers = self.config.root_servers.clone();
        let mut iteration = 0;
        let mut last_error = None;

        while iteration < self.config.max_iterations {
            iteration += 1;
            debug!(
                "Iteration {}: querying {} servers",
                iteration,
                current_servers.len()
            );

            let mut referral_servers = Vec::new();

            for &server in &current_servers {
                let iterative_id = QUERY_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
                let mut iter_query =
                    DNSPacket::new_query(iterative_id, question.labels.clone(), question.qtype);
                iter_query.questions[0].qclass = question.qclass;

                match self.query_iterative_server(&iter_query, server).await {
                    Ok(response) => {
                        if response.header.ancount > 0 {
                            info!("Iterative resolution completed in {} iterations", iteration);
                            return Ok(response);
                        }

                        // Authoritative no-data or NXDOMAIN ends the chase.
                        if response.header.aa
                            && matches!(
                                ResponseCode::from_u8(response.header.rcode),
                                ResponseCode::NoError | ResponseCode::NameError
                            )
                        {
                            return Ok(response);
                        }

                        let mut new_servers = self.extract_referral_servers(&response).await;
                        if !new_servers.is_empty() {
                            debug!(
                                "Found {} referral servers from {}",
                                new_servers.len(),
                                server
                            );
                            referral_servers.append(&mut new_servers);
                            break; // Use this referral
                        }
                    }
                    Err(e) => {
                        warn!("Failed to query iterative server {}: {:?}", server, e);
                        last_error = Some(e);
                        continue;
                    }
                }
            }

            if !referral_servers.is_empty() {
                current_servers = referral_servers;
                continue;
            }

            break;
        }

        error!("Iterative resolution failed after {} iterations", iteration);
        if let Some(e) = last_error {
            Err(e)
        } else {
            Err(DnsError::Recursor(
                "Iterative resolution failed - no more referrals".to_string(),
            ))
        }
    }

    /// Query a single server for iterative resolution
    async fn query_iterative_server(
        &self,
        query: &DNSPacket,
        server: SocketAddr,
    ) -> Result<DNSPacket> {
        // Create a copy of the query with RD=0 for iterative queries
        let mut iterative_query = query.clone();
        iterative_query.header.rd = false; // Don't ask for recursion

        debug!("Sending iterative query to {}", server);

        // Serialize and send
        let query_bytes = iterative_query.serialize().map_err(|e| {
            DnsError::Parse(format!("Failed to serialize iterative query: {:?}", e))
        })?;

        self.send_query_with_timeout(&query_bytes, server).await
    }

    /// Extract nameserver addresses from a referral response. Glue
    /// addresses in the additional section are only trusted when their
    /// owner name is in-bailiwick of the delegated zone named by the
    /// corresponding NS record; anything else is resolved out-of-band.
    async fn extract_referral_servers(&self, response: &DNSPacket) -> Vec<SocketAddr> {
        let mut servers = Vec::new();
        let mut delegated_zones: Vec<Name> = Vec::new();
        let mut ns_names: Vec<Name> = Vec::new();

        for authority in &response.authorities {
            if authority.rtype == DNSResourceType::NS {
                if let RData::Ns(target) = &authority.rdata {
                    let zone = Name::from_labels(authority.name.clone());
                    delegated_zones.push(zone);
                    ns_names.push(Name::from_labels(target.clone()));
                }
            }
        }

        // Prefer in-bailiwick glue from the additional section: avoids an
        // extra round trip and can't be poisoned by an off-path server.
        for additional in &response.resources {
            let owner = Name::from_labels(additional.name.clone());
            let in_bailiwick = delegated_zones.iter().any(|zone| owner.is_subdomain_of(zone));
            if !in_bailiwick {
                continue;
            }
            match &additional.rdata {
                RData::A(octets) if additional.rtype == DNSResourceType::A => {
                    let ip = std::net::Ipv4Addr::from(*octets);
                    servers.push(SocketAddr::new(ip.into(), 53));
                }
                RData::Aaaa(octets) if additional.rtype == DNSResourceType::AAAA => {
                    let ip = std::net::Ipv6Addr::from(*octets);
                    servers.push(SocketAddr::new(ip.into(), 53));
                }
                _ => {}
            }
        }

        if !servers.is_empty() {
            return servers;
        }

        // No usable glue: resolve each nameserver name out-of-band.
        for ns_name in ns_names {
            debug!("Resolving nameserver {} out-of-band (no in-bailiwick glue)", ns_name);
            if let Ok(addr) = self.resolve_nameserver_address(&ns_name.to_string()).await {
                servers.push(addr);
            }
        }

        servers
    }

    /// Resolve a nameserver hostname to an IP address
    async fn resolve_nameserver_address(&self, ns_name: &str) -> Result<SocketAddr> {
        let mut ns_query = DNSPacket::new_query(
            QUERY_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            ns_name.split('.').map(|s| s.to_string()).collect(),
            DNSResourceType::A,
        );
        ns_query.header.rd = true;

        match self.resolve_recursively(ns_query, 0).await {
            Ok(response) => {
                for answer in &response.answers {
                    if let RData::A(octets) = &answer.rdata {
                        return Ok(SocketAddr::new(std::net::Ipv4Addr::from(*octets).into(), 53));
                    }
                }
                Err(DnsError::Recursor(format!(
                    "No A record found for nameserver {}",
                    ns_name
                )))
            }
            Err(e) => Err(e),
        }
    }

    /// Perform cache maintenance (cleanup expired entries)
    pub fn cleanup_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.cleanup_expired();
        }
    }

    /// Get cache debug information
    pub fn cache_info(&self) -> Option<String> {
        self.cache.as_ref().map(|cache| cache.debug_info())
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> Option<&crate::cache::CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    /// Get current cache size
    pub fn cache_size(&self) -> Option<usize> {
        self.cache.as_ref().map(|cache| cache.size())
    }

    /// Get connection pool statistics
    pub async fn connection_pool_stats(&self) -> HashMap<SocketAddr, usize> {
        self.connection_pool.stats().await
    }

    /// Save cache to disk if persistence is enabled
    pub async fn save_cache(&self) -> Result<()> {
        if let Some(cache) = &self.cache {
            if cache.has_persistence() {
                cache
                    .save_to_disk()
                    .await
                    .map_err(|e| DnsError::Io(format!("Failed to save cache: {}", e)))?;
                debug!(
                    "Cache saved to disk: {}",
                    cache.cache_file_path().unwrap_or("unknown")
                );
            }
        }
        Ok(())
    }

    /// Check if cache persistence is enabled
    pub fn has_cache_persistence(&self) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|cache| cache.has_persistence())
    }

    /// Get server health statistics for all upstream servers
    pub fn get_server_health_stats(&self) -> HashMap<SocketAddr, ServerStats> {
        let mut stats = HashMap::new();
        for server_addr in &self.config.upstream_servers {
            if let Some(health) = self.server_health.get(server_addr) {
                stats.insert(*server_addr, health.get_stats());
            }
        }
        stats
    }

    /// Get detailed health info for debugging
    pub fn get_health_debug_info(&self) -> String {
        let mut info = String::new();
        info.push_str("=== Upstream Server Health Status ===\n");

        for &server_addr in &self.config.upstream_servers {
            if let Some(health) = self.server_health.get(&server_addr) {
                let stats = health.get_stats();
                info.push_str(&format!(
                    "Server: {} - {} - Requests: {}, Success Rate: {:.1}%, Failures: {}, Avg Response: {:?}\n",
                    server_addr,
                    if stats.is_healthy { "HEALTHY" } else { "UNHEALTHY" },
                    stats.total_requests,
                    stats.success_rate * 100.0,
                    stats.consecutive_failures,
                    stats.avg_response_time.map_or("N/A".to_string(), |d| format!("{:?}", d))
                ));
            }
        }

        info
    }

    /// Force mark a server as healthy (for testing/admin purposes)
    pub fn reset_server_health(&self, server_addr: SocketAddr) {
        if let Some(health) = self.server_health.get(&server_addr) {
            health.consecutive_failures.store(0, Ordering::Relaxed);
            health.is_healthy.store(true, Ordering::Relaxed);
            if let Ok(mut last_failure) = health.last_failure.try_lock() {
                *last_failure = None;
            }
            info!("Reset health status for server: {}", server_addr);
        }
    }

    /// Create a synthetic SOA record for negative responses (RFC 2308 compliance)
    fn create_synthetic_soa_record(&self, query_labels: &[String]) -> Option<DNSResource> {
        // Extract the domain from the query labels
        // For queries like "nonexistent.example.com", we want to create SOA for "example.com"
        if query_labels.is_empty() {
            return None;
        }

        // For simplicity, create a generic SOA record for the queried domain
        // In a real authoritative server, this would be based on actual zone data
        let domain_labels = if query_labels.len() >= 2 {
            // Use the last two labels as the domain (e.g., example.com)
            query_labels[query_labels.len() - 2..].to_vec()
        } else {
            query_labels.to_vec()
        };

        let mut mname = domain_labels.clone();
        mname.push(String::new()); // root terminator
        let mut rname = vec!["admin".to_string()];
        rname.extend(domain_labels.clone());
        rname.push(String::new());

        let soa_record = DNSResource::new(
            domain_labels,
            DNSResourceClass::IN,
            300, // 5 minutes TTL for synthetic SOA
            RData::Soa {
                mname,
                rname,
                serial: 1,
                refresh: 3600,  // 1 hour
                retry: 1800,    // 30 minutes
                expire: 604800, // 1 week
                minimum: 180,   // used for negative caching per RFC 2308
            },
        );

        Some(soa_record)
    }

    /// Get total number of queries handled
    pub fn total_queries(&self) -> u64 {
        self.query_counter.load(Ordering::Relaxed)
    }

    /// Get total number of errors
    pub fn total_errors(&self) -> u64 {
        self.error_counter.load(Ordering::Relaxed)
    }

    /// Build an authoritative DNS response
    fn build_authoritative_response(
        &self,
        query: DNSPacket,
        original_id: u16,
        records: Vec<DNSResource>,
        rcode: ResponseCode,
        authoritative: bool,
    ) -> Result<DNSPacket> {
        let mut response = DNSPacket {
            header: query.header.clone(),
            questions: query.questions.clone(),
            answers: vec![],
            authorities: vec![],
            resources: vec![],
        };
        if let Some(opt) = query.edns_opt() {
            response.set_edns(&opt);
        }

        // Set response header flags
        response.header.id = original_id;
        response.header.qr = true; // This is a response
        response.header.aa = authoritative; // Authoritative answer
        response.header.tc = false; // Not truncated
        response.header.rd = query.header.rd; // Copy recursion desired
        response.header.ra = false; // Recursion not available for authoritative answers
        response.header.rcode = rcode as u8;

        // Place records in appropriate section based on type and response code
        match rcode {
            ResponseCode::NoError => {
                if authoritative && !records.is_empty() {
                    // Check if this is a NODATA response (SOA record only)
                    if records.len() == 1 && records[0].rtype == DNSResourceType::SOA {
                        // NODATA - SOA goes in authority section
                        response.authorities = records;
                    } else {
                        // Authoritative answer - records go in answer section
                        response.answers = records;
                    }
                } else {
                    // Delegation - NS records go in authority section
                    response.authorities = records;
                }
            }
            ResponseCode::NameError => {
                // NXDOMAIN - SOA record goes in authority section
                response.authorities = records;
            }
            _ => {
                // Other response codes - records in authority section
                response.authorities = records;
            }
        }

        // Update counts
        response.header.ancount = response.answers.len() as u16;
        response.header.nscount = response.authorities.len() as u16;
        response.header.arcount = response.resources.len() as u16;

        Ok(response)
    }

    /// Check if DNSSEC validation is enabled
    pub fn is_dnssec_enabled(&self) -> bool {
        self.dnssec_validator.is_some()
    }

    /// Create a response with zero IP (0.0.0.0 or ::) for blocked domains
    fn create_zero_ip_response(&self, query: &DNSPacket, original_id: u16) -> DNSPacket {
        let mut response = query.clone();
        response.header.qr = true; // This is a response
        response.header.ra = true; // Recursion available
        response.header.rcode = ResponseCode::NoError.to_u8();
        response.header.id = original_id;

        // Clear existing sections
        response.answers.clear();
        response.authorities.clear();
        response.resources.clear();

        // Add appropriate zero IP response based on query type
        if !query.questions.is_empty() {
            let question = &query.questions[0];
            match question.qtype {
                DNSResourceType::A => {
                    // Return 0.0.0.0 for A records
                    let answer = DNSResource::new(
                        question.labels.clone(),
                        DNSResourceClass::IN,
                        300, // 5 minutes
                        RData::A([0, 0, 0, 0]),
                    );
                    response.answers.push(answer);
                    response.header.ancount = 1;
                }
                DNSResourceType::AAAA => {
                    // Return :: for AAAA records
                    let answer = DNSResource::new(
                        question.labels.clone(),
                        DNSResourceClass::IN,
                        300, // 5 minutes
                        RData::Aaaa([0; 16]),
                    );
                    response.answers.push(answer);
                    response.header.ancount = 1;
                }
                _ => {
                    // For other types, return NODATA (no answers)
                    response.header.ancount = 0;
                }
            }
        }

        response
    }

    /// Create a response with custom IP for blocked domains
    fn create_custom_ip_response(
        &self,
        query: &DNSPacket,
        original_id: u16,
        custom_ip: std::net::IpAddr,
    ) -> DNSPacket {
        let mut response = query.clone();
        response.header.qr = true; // This is a response
        response.header.ra = true; // Recursion available
        response.header.rcode = ResponseCode::NoError.to_u8();
        response.header.id = original_id;

        // Clear existing sections
        response.answers.clear();
        response.authorities.clear();
        response.resources.clear();

        // Add appropriate custom IP response based on query type and IP version
        if !query.questions.is_empty() {
            let question = &query.questions[0];
            match (question.qtype, &custom_ip) {
                (DNSResourceType::A, std::net::IpAddr::V4(ipv4)) => {
                    // Return custom IPv4 for A records
                    let answer = DNSResource::new(
                        question.labels.clone(),
                        DNSResourceClass::IN,
                        300, // 5 minutes
                        RData::A(ipv4.octets()),
                    );
                    response.answers.push(answer);
                    response.header.ancount = 1;
                }
                (DNSResourceType::AAAA, std::net::IpAddr::V6(ipv6)) => {
                    // Return custom IPv6 for AAAA records
                    let answer = DNSResource::new(
                        question.labels.clone(),
                        DNSResourceClass::IN,
                        300, // 5 minutes
                        RData::Aaaa(ipv6.octets()),
                    );
                    response.answers.push(answer);
                    response.header.ancount = 1;
                }
                _ => {
                    // Type mismatch or other types, return NODATA
                    response.header.ancount = 0;
                }
            }
        }

        response
    }
}

/// The TTL to cache a message under: the smallest TTL among its records,
/// since any single expired record would make the whole cached message
/// stale. `None` for a message with no records to derive one from (e.g.
/// an empty NODATA with no SOA), leaving the caller's own default.
fn min_record_ttl(packet: &DNSPacket) -> Option<u32> {
    packet
        .answers
        .iter()
        .chain(packet.authorities.iter())
        .chain(packet.resources.iter())
        .filter(|r| r.rtype != DNSResourceType::OPT)
        .map(|r| r.ttl)
        .min()
}

/// Builds the NSEC/NSEC3 denial proof carried by a Secure NXDOMAIN/NODATA
/// response, if the authority section actually has one: an NSEC record
/// bracketing the gap (or the owner itself, for NODATA) plus the zone's
/// SOA, whose MINIMUM field bounds how long the proof may be cached (RFC
/// 2308 §5 / RFC 8198 §5). `None` if either piece is missing — an
/// unsigned or incomplete denial is simply not retained.
fn extract_denial_range(response: &DNSPacket, question: &DNSQuestion, kind: Kind) -> Option<DenialRange> {
    let soa = response
        .authorities
        .iter()
        .find(|r| r.rtype == DNSResourceType::SOA)?;
    let minimum = match &soa.rdata {
        RData::Soa { minimum, .. } => *minimum,
        _ => return None,
    };
    let ttl = Duration::from_secs(minimum.min(DEFAULT_DENIAL_TTL.as_secs() as u32) as u64);

    let (owner, next_owner) = response.authorities.iter().find_map(|r| match &r.rdata {
        RData::Nsec { next_domain, .. } => Some((r.name.clone(), next_domain.clone())),
        _ => None,
    })?;

    Some(DenialRange {
        zone: Name::from_labels(soa.name.clone()),
        owner: Name::from_labels(owner),
        next_owner: Name::from_labels(next_owner),
        kind,
        covered_type: matches!(kind, Kind::NoData).then_some(question.qtype),
        expires_at: Instant::now() + ttl,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::DnsBlocker;
    use crate::dns::enums::DNSResourceType;

    fn test_config() -> DnsConfig {
        DnsConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            upstream_servers: vec!["127.0.0.1:1".parse().unwrap()],
            root_servers: vec![],
            enable_iterative: false,
            enable_caching: true,
            max_cache_size: 100,
            blocking_enabled: false,
            blocklists: vec![],
            allowlist: vec![],
            http_bind_addr: None,
            cache_file_path: None,
            ..Default::default()
        }
    }

    fn query(domain: &str, qtype: DNSResourceType) -> DNSPacket {
        DNSPacket::new_query(
            42,
            domain.split('.').map(|l| l.to_string()).collect(),
            qtype,
        )
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_before_recursion() {
        let resolver = DnsResolver::new(test_config(), None).await.unwrap();
        let cache = resolver.cache.as_ref().expect("caching enabled");

        let answer = DNSResource::new(
            vec!["example".into(), "com".into()],
            DNSResourceClass::IN,
            300,
            RData::A([192, 0, 2, 1]),
        );
        let mut response = query("example.com", DNSResourceType::A);
        response.header.qr = true;
        response.answers.push(answer);
        response.header.ancount = 1;

        cache.insert(
            &["example".to_string(), "com".to_string()],
            DNSResourceType::A,
            DNSResourceClass::IN,
            response,
            Kind::Positive,
            TrustState::Secure,
            300,
        );

        let q = query("example.com", DNSResourceType::A);
        let resolved = resolver.resolve(q, 99).await.unwrap();

        assert_eq!(resolved.header.id, 99);
        assert_eq!(resolved.answers.len(), 1);
    }

    #[tokio::test]
    async fn blocked_domain_short_circuits_with_configured_mode() {
        let mut resolver = DnsResolver::new(test_config(), None).await.unwrap();
        let blocker = Arc::new(DnsBlocker::new(BlockingMode::NxDomain, false));
        blocker.add_blocked_domain("blocked.test");
        resolver.blocker = Some(blocker);

        let q = query("blocked.test", DNSResourceType::A);
        let resolved = resolver.resolve(q, 7).await.unwrap();

        assert_eq!(resolved.header.rcode, ResponseCode::NameError.to_u8());
        assert!(resolved.answers.is_empty());
    }

    #[tokio::test]
    async fn allowed_domain_is_not_intercepted_by_blocker() {
        let mut resolver = DnsResolver::new(test_config(), None).await.unwrap();
        let blocker = Arc::new(DnsBlocker::new(BlockingMode::NxDomain, false));
        blocker.add_blocked_domain("blocked.test");
        resolver.blocker = Some(blocker);

        // seed the cache so the unrelated domain resolves without touching the network
        let cache = resolver.cache.as_ref().unwrap();
        let mut response = query("allowed.test", DNSResourceType::A);
        response.header.qr = true;
        cache.insert(
            &["allowed".to_string(), "test".to_string()],
            DNSResourceType::A,
            DNSResourceClass::IN,
            response,
            Kind::NxDomain,
            TrustState::Insecure,
            60,
        );

        let q = query("allowed.test", DNSResourceType::A);
        let resolved = resolver.resolve(q, 1).await.unwrap();
        assert_eq!(resolved.header.id, 1);
    }

    #[tokio::test]
    async fn create_servfail_response_sets_rcode_and_flags() {
        let resolver = DnsResolver::new(test_config(), None).await.unwrap();
        let q = query("example.com", DNSResourceType::A);
        let response = resolver.create_servfail_response(&q);
        assert_eq!(response.header.rcode, ResponseCode::ServerFailure.to_u8());
        assert!(response.header.qr);
        assert_eq!(response.header.id, q.header.id);
    }

    #[tokio::test]
    async fn create_nxdomain_and_refused_responses() {
        let resolver = DnsResolver::new(test_config(), None).await.unwrap();
        let q = query("example.com", DNSResourceType::A);

        let nx = resolver.create_nxdomain_response(&q);
        assert_eq!(nx.header.rcode, ResponseCode::NameError.to_u8());

        let refused = resolver.create_refused_response(&q);
        assert_eq!(refused.header.rcode, ResponseCode::Refused.to_u8());
    }

    #[tokio::test]
    async fn total_queries_counts_each_resolve_call() {
        let resolver = DnsResolver::new(test_config(), None).await.unwrap();
        let cache = resolver.cache.as_ref().unwrap();
        let mut response = query("counted.test", DNSResourceType::A);
        response.header.qr = true;
        cache.insert(
            &["counted".to_string(), "test".to_string()],
            DNSResourceType::A,
            DNSResourceClass::IN,
            response,
            Kind::Positive,
            TrustState::Secure,
            60,
        );

        assert_eq!(resolver.total_queries(), 0);
        let _ = resolver
            .resolve(query("counted.test", DNSResourceType::A), 1)
            .await
            .unwrap();
        assert_eq!(resolver.total_queries(), 1);
    }
}
