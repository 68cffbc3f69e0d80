use thiserror::Error;

/// DNSSEC validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DnsSecError {
    #[error("No DNSKEY record found for validation")]
    NoDnsKey,
    #[error("No DS record found at parent zone")]
    NoDs,
    #[error("No RRSIG record found for RRset")]
    NoRrsig,
    #[error("DNSSEC signature has expired")]
    SignatureExpired,
    #[error("DNSSEC signature is not yet valid")]
    SignatureNotYetValid,
    #[error("Key tag does not match")]
    KeyTagMismatch,
    #[error("Unsupported DNSSEC algorithm: {0}")]
    UnsupportedAlgorithm(u8),
    #[error("Unsupported digest type: {0}")]
    UnsupportedDigestType(u8),
    #[error("DNSSEC signature verification failed")]
    SignatureVerificationFailed,
    #[error("DS record digest does not match DNSKEY")]
    DsDigestMismatch,
    #[error("Invalid DNSKEY public key format")]
    InvalidPublicKey,
    #[error("Invalid RRSIG signature format")]
    InvalidSignature,
    #[error("NSEC/NSEC3 denial of existence validation failed")]
    DenialOfExistenceFailed,
    #[error("Too many validation iterations")]
    TooManyIterations,
    #[error("Invalid NSEC3 parameters")]
    InvalidNsec3Parameters,
    #[error("Trust anchor not found for validation")]
    TrustAnchorNotFound,
    #[error("DNSSEC validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DnsSecError>;
