pub mod common;
pub mod edns;
pub mod enums;
pub mod header;
pub mod name;
pub mod packet;
pub mod question;
pub mod resource;

pub use common::PacketComponent;
pub use edns::{EdnsOpt, EdnsOption, EdnsOptionCode};
pub use enums::{DNSResourceClass, DNSResourceType, DnsOpcode, ResponseCode};
pub use header::DNSHeader;
pub use name::Name;
pub use packet::DNSPacket;
pub use question::DNSQuestion;
pub use resource::{DNSResource, RData};

use thiserror::Error;

/// Errors produced while decoding or encoding the wire format.
///
/// Distinct from [`crate::error::ResolverError`], which wraps this (and
/// every other component error) for the rest of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of packet")]
    UnexpectedEof,
    #[error("malformed header")]
    InvalidHeader,
    #[error("malformed question section")]
    InvalidQuestionSection,
    #[error("malformed answer section")]
    InvalidAnswerSection,
    #[error("invalid label")]
    InvalidLabel,
    #[error("invalid resource record data: {0}")]
    InvalidRData(String),
    #[error("too many questions in a single message")]
    TooManyQuestions,
    #[error("bit stream error: {0}")]
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> Self {
        ParseError::InvalidBitStream(err.to_string())
    }
}
