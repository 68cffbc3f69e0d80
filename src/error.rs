use thiserror::Error;

use crate::dns::ParseError;
use crate::dnssec::errors::DnsSecError;

pub type Result<T> = std::result::Result<T, DnsError>;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("invalid bind address: {0}")]
    InvalidBindAddress(String),
    #[error("invalid upstream server: {0}")]
    InvalidUpstreamServer(String),
    #[error("invalid HTTP bind address: {0}")]
    InvalidHttpBindAddress(String),
    #[error("invalid worker thread count: {0}")]
    InvalidWorkerThreads(String),
    #[error("invalid cache size: {0}")]
    InvalidCacheSize(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    #[error("invalid trust anchor file: {0}")]
    InvalidTrustAnchorFile(String),
    #[error("failed to parse config: {0}")]
    ParseError(String),
}

/// One error type for the whole resolution pipeline, covering the five
/// kinds the front-end handler maps to client-visible RCODEs:
/// protocol (malformed input), transient network (upstream unreachable
/// or timed out), upstream logical (SERVFAIL/REFUSED from upstream),
/// cryptographic (DNSSEC Bogus), and internal (everything else).
#[derive(Debug, Clone, Error)]
pub enum DnsError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("malformed DNS message: {0}")]
    Protocol(#[from] ParseError),

    #[error("failed to parse DNS message: {0}")]
    ParseError(String),

    #[error("internal parse/resolution error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("request coalescing error: {0}")]
    Coalesce(String),

    #[error("recursive resolution failed: {0}")]
    Recursor(String),

    #[error("upstream server returned an error: {0}")]
    Upstream(String),

    #[error("DNSSEC validation error: {0}")]
    DnsSec(#[from] DnsSecError),

    #[error("operation timed out")]
    Timeout,

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("too many concurrent requests")]
    TooManyRequests,

    #[error("server is shutting down")]
    ServerShutdown,

    #[error("query validation error: {0}")]
    ValidationError(String),

    #[error("zone error: {0}")]
    Zone(String),
}

impl From<std::io::Error> for DnsError {
    fn from(e: std::io::Error) -> Self {
        DnsError::Io(e.to_string())
    }
}

impl DnsError {
    /// The RCODE the front-end handler should send back to the client,
    /// per the error-kind mapping table.
    pub fn response_code(&self) -> u8 {
        use crate::dns::enums::ResponseCode;
        match self {
            DnsError::Protocol(_) | DnsError::ParseError(_) | DnsError::Parse(_) | DnsError::ValidationError(_) => {
                ResponseCode::FormatError.to_u8()
            }
            DnsError::DnsSec(_) => ResponseCode::ServerFailure.to_u8(),
            _ => ResponseCode::ServerFailure.to_u8(),
        }
    }

    /// Whether a failure marker may be cached for this error (never true
    /// for cryptographic or internal failures).
    pub fn cacheable_as_failure(&self) -> bool {
        matches!(
            self,
            DnsError::Recursor(_) | DnsError::Upstream(_) | DnsError::Timeout
        )
    }
}

impl Clone for DnsError {
    fn clone(&self) -> Self {
        match self {
            DnsError::Io(s) => DnsError::Io(s.clone()),
            DnsError::Protocol(e) => DnsError::Parse(e.to_string()),
            DnsError::ParseError(s) => DnsError::ParseError(s.clone()),
            DnsError::Parse(s) => DnsError::Parse(s.clone()),
            DnsError::Config(e) => DnsError::Parse(e.to_string()),
            DnsError::Cache(s) => DnsError::Cache(s.clone()),
            DnsError::Coalesce(s) => DnsError::Coalesce(s.clone()),
            DnsError::Recursor(s) => DnsError::Recursor(s.clone()),
            DnsError::Upstream(s) => DnsError::Upstream(s.clone()),
            DnsError::DnsSec(e) => DnsError::Parse(e.to_string()),
            DnsError::Timeout => DnsError::Timeout,
            DnsError::RateLimitExceeded(s) => DnsError::RateLimitExceeded(s.clone()),
            DnsError::TooManyRequests => DnsError::TooManyRequests,
            DnsError::ServerShutdown => DnsError::ServerShutdown,
            DnsError::ValidationError(s) => DnsError::ValidationError(s.clone()),
            DnsError::Zone(s) => DnsError::Zone(s.clone()),
        }
    }
}
