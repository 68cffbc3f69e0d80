use super::{
    ParseError,
    common::{
        read_bytes, read_name_uncompressed, read_u8, read_u16, read_u32,
        write_name_uncompressed,
    },
    enums::{DNSResourceClass, DNSResourceType},
};

/// Typed resource record data. Unknown/unsupported types are kept as raw
/// bytes rather than dropped, so a record this resolver doesn't interpret
/// can still be cached and relayed verbatim.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
)]
#[rkyv(derive(Debug, PartialEq))]
pub enum RData {
    A([u8; 4]),
    Aaaa([u8; 16]),
    Ns(Vec<String>),
    Cname(Vec<String>),
    Ptr(Vec<String>),
    Soa {
        mname: Vec<String>,
        rname: Vec<String>,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Mx {
        preference: u16,
        exchange: Vec<String>,
    },
    Txt(Vec<Vec<u8>>),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: Vec<String>,
    },
    Caa {
        flags: u8,
        tag: String,
        value: Vec<u8>,
    },
    Ds {
        key_tag: u16,
        algorithm: u8,
        digest_type: u8,
        digest: Vec<u8>,
    },
    DnsKey {
        flags: u16,
        protocol: u8,
        algorithm: u8,
        public_key: Vec<u8>,
    },
    Rrsig {
        type_covered: u16,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        expiration: u32,
        inception: u32,
        key_tag: u16,
        signer_name: Vec<String>,
        signature: Vec<u8>,
    },
    Nsec {
        next_domain: Vec<String>,
        type_bitmap: Vec<u8>,
    },
    Nsec3 {
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Vec<u8>,
        next_owner_hash: Vec<u8>,
        type_bitmap: Vec<u8>,
    },
    Nsec3Param {
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Vec<u8>,
    },
    /// Raw EDNS0 OPT rdata; decoded further by `dns::edns::EdnsOpt`.
    Opt(Vec<u8>),
    Unknown(Vec<u8>),
}

impl RData {
    pub fn record_type(&self) -> DNSResourceType {
        match self {
            RData::A(_) => DNSResourceType::A,
            RData::Aaaa(_) => DNSResourceType::AAAA,
            RData::Ns(_) => DNSResourceType::NS,
            RData::Cname(_) => DNSResourceType::CNAME,
            RData::Ptr(_) => DNSResourceType::PTR,
            RData::Soa { .. } => DNSResourceType::SOA,
            RData::Mx { .. } => DNSResourceType::MX,
            RData::Txt(_) => DNSResourceType::TXT,
            RData::Srv { .. } => DNSResourceType::SRV,
            RData::Caa { .. } => DNSResourceType::CAA,
            RData::Ds { .. } => DNSResourceType::DS,
            RData::DnsKey { .. } => DNSResourceType::DNSKEY,
            RData::Rrsig { .. } => DNSResourceType::RRSIG,
            RData::Nsec { .. } => DNSResourceType::NSEC,
            RData::Nsec3 { .. } => DNSResourceType::NSEC3,
            RData::Nsec3Param { .. } => DNSResourceType::NSEC3PARAM,
            RData::Opt(_) => DNSResourceType::OPT,
            RData::Unknown(_) => DNSResourceType::Unknown,
        }
    }

    /// Parse rdata starting at `offset` in the full packet buffer,
    /// advancing a *local* cursor for names that may use compression
    /// (relative to `buf`, not the rdata slice, since pointers are
    /// absolute message offsets). The caller is responsible for
    /// resetting its own cursor to `rdata_start + rdlength` afterwards;
    /// `rdlength` is authoritative, not whatever this function consumes.
    pub fn parse(
        rtype: DNSResourceType,
        buf: &[u8],
        offset: usize,
        rdlength: usize,
    ) -> Result<Self, ParseError> {
        let mut cursor = offset;
        let rdata = match rtype {
            DNSResourceType::A => {
                let bytes = read_bytes(buf, &mut cursor, 4)?;
                let mut arr = [0u8; 4];
                arr.copy_from_slice(bytes);
                RData::A(arr)
            }
            DNSResourceType::AAAA => {
                let bytes = read_bytes(buf, &mut cursor, 16)?;
                let mut arr = [0u8; 16];
                arr.copy_from_slice(bytes);
                RData::Aaaa(arr)
            }
            DNSResourceType::NS => {
                let (labels, _) = super::common::decode_name_at(buf, cursor)?;
                RData::Ns(labels)
            }
            DNSResourceType::CNAME => {
                let (labels, _) = super::common::decode_name_at(buf, cursor)?;
                RData::Cname(labels)
            }
            DNSResourceType::PTR => {
                let (labels, _) = super::common::decode_name_at(buf, cursor)?;
                RData::Ptr(labels)
            }
            DNSResourceType::SOA => {
                let (mname, len) = super::common::decode_name_at(buf, cursor)?;
                cursor += len;
                let (rname, len) = super::common::decode_name_at(buf, cursor)?;
                cursor += len;
                let serial = read_u32(buf, &mut cursor)?;
                let refresh = read_u32(buf, &mut cursor)?;
                let retry = read_u32(buf, &mut cursor)?;
                let expire = read_u32(buf, &mut cursor)?;
                let minimum = read_u32(buf, &mut cursor)?;
                RData::Soa {
                    mname,
                    rname,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                }
            }
            DNSResourceType::MX => {
                let preference = read_u16(buf, &mut cursor)?;
                let (exchange, _) = super::common::decode_name_at(buf, cursor)?;
                RData::Mx {
                    preference,
                    exchange,
                }
            }
            DNSResourceType::TXT => {
                let raw = read_bytes(buf, &mut cursor, rdlength)?;
                let mut segments = Vec::new();
                let mut pos = 0usize;
                while pos < raw.len() {
                    let len = raw[pos] as usize;
                    pos += 1;
                    let end = (pos + len).min(raw.len());
                    segments.push(raw[pos..end].to_vec());
                    pos = end;
                }
                RData::Txt(segments)
            }
            DNSResourceType::SRV => {
                let priority = read_u16(buf, &mut cursor)?;
                let weight = read_u16(buf, &mut cursor)?;
                let port = read_u16(buf, &mut cursor)?;
                let (target, _) = super::common::decode_name_at(buf, cursor)?;
                RData::Srv {
                    priority,
                    weight,
                    port,
                    target,
                }
            }
            DNSResourceType::CAA => {
                let raw = read_bytes(buf, &mut cursor, rdlength)?;
                if raw.len() < 2 {
                    return Err(ParseError::InvalidRData("CAA record too short".into()));
                }
                let flags = raw[0];
                let tag_len = raw[1] as usize;
                let tag_end = 2 + tag_len;
                let tag = std::str::from_utf8(
                    raw.get(2..tag_end)
                        .ok_or_else(|| ParseError::InvalidRData("CAA tag truncated".into()))?,
                )
                .map_err(|_| ParseError::InvalidRData("CAA tag not utf8".into()))?
                .to_string();
                let value = raw.get(tag_end..).unwrap_or(&[]).to_vec();
                RData::Caa { flags, tag, value }
            }
            DNSResourceType::DS | DNSResourceType::CDS => {
                let key_tag = read_u16(buf, &mut cursor)?;
                let algorithm = read_u8(buf, &mut cursor)?;
                let digest_type = read_u8(buf, &mut cursor)?;
                let digest_len = rdlength.saturating_sub(4);
                let digest = read_bytes(buf, &mut cursor, digest_len)?.to_vec();
                RData::Ds {
                    key_tag,
                    algorithm,
                    digest_type,
                    digest,
                }
            }
            DNSResourceType::DNSKEY | DNSResourceType::CDNSKEY => {
                let flags = read_u16(buf, &mut cursor)?;
                let protocol = read_u8(buf, &mut cursor)?;
                let algorithm = read_u8(buf, &mut cursor)?;
                let key_len = rdlength.saturating_sub(4);
                let public_key = read_bytes(buf, &mut cursor, key_len)?.to_vec();
                RData::DnsKey {
                    flags,
                    protocol,
                    algorithm,
                    public_key,
                }
            }
            DNSResourceType::RRSIG => {
                let type_covered = read_u16(buf, &mut cursor)?;
                let algorithm = read_u8(buf, &mut cursor)?;
                let labels = read_u8(buf, &mut cursor)?;
                let original_ttl = read_u32(buf, &mut cursor)?;
                let expiration = read_u32(buf, &mut cursor)?;
                let inception = read_u32(buf, &mut cursor)?;
                let key_tag = read_u16(buf, &mut cursor)?;
                let signer_name = read_name_uncompressed(buf, &mut cursor)?;
                let rdata_end = offset + rdlength;
                let sig_len = rdata_end.saturating_sub(cursor);
                let signature = read_bytes(buf, &mut cursor, sig_len)?.to_vec();
                RData::Rrsig {
                    type_covered,
                    algorithm,
                    labels,
                    original_ttl,
                    expiration,
                    inception,
                    key_tag,
                    signer_name,
                    signature,
                }
            }
            DNSResourceType::NSEC => {
                let (next_domain, consumed) = super::common::decode_name_at(buf, cursor)?;
                cursor += consumed;
                let rdata_end = offset + rdlength;
                let bitmap_len = rdata_end.saturating_sub(cursor);
                let type_bitmap = read_bytes(buf, &mut cursor, bitmap_len)?.to_vec();
                RData::Nsec {
                    next_domain,
                    type_bitmap,
                }
            }
            DNSResourceType::NSEC3 => {
                let hash_algorithm = read_u8(buf, &mut cursor)?;
                let flags = read_u8(buf, &mut cursor)?;
                let iterations = read_u16(buf, &mut cursor)?;
                let salt_len = read_u8(buf, &mut cursor)? as usize;
                let salt = read_bytes(buf, &mut cursor, salt_len)?.to_vec();
                let hash_len = read_u8(buf, &mut cursor)? as usize;
                let next_owner_hash = read_bytes(buf, &mut cursor, hash_len)?.to_vec();
                let rdata_end = offset + rdlength;
                let bitmap_len = rdata_end.saturating_sub(cursor);
                let type_bitmap = read_bytes(buf, &mut cursor, bitmap_len)?.to_vec();
                RData::Nsec3 {
                    hash_algorithm,
                    flags,
                    iterations,
                    salt,
                    next_owner_hash,
                    type_bitmap,
                }
            }
            DNSResourceType::NSEC3PARAM => {
                let hash_algorithm = read_u8(buf, &mut cursor)?;
                let flags = read_u8(buf, &mut cursor)?;
                let iterations = read_u16(buf, &mut cursor)?;
                let salt_len = read_u8(buf, &mut cursor)? as usize;
                let salt = read_bytes(buf, &mut cursor, salt_len)?.to_vec();
                RData::Nsec3Param {
                    hash_algorithm,
                    flags,
                    iterations,
                    salt,
                }
            }
            DNSResourceType::OPT => {
                let raw = read_bytes(buf, &mut cursor, rdlength)?.to_vec();
                RData::Opt(raw)
            }
            _ => {
                let raw = read_bytes(buf, &mut cursor, rdlength)?.to_vec();
                RData::Unknown(raw)
            }
        };
        Ok(rdata)
    }

    /// Encode this rdata to wire format. Never emits compression pointers
    /// (see [`super::common::write_name_uncompressed`]).
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut out = Vec::new();
        match self {
            RData::A(addr) => out.extend_from_slice(addr),
            RData::Aaaa(addr) => out.extend_from_slice(addr),
            RData::Ns(labels) | RData::Cname(labels) | RData::Ptr(labels) => {
                write_name_uncompressed(&mut out, labels)
            }
            RData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                write_name_uncompressed(&mut out, mname);
                write_name_uncompressed(&mut out, rname);
                out.extend_from_slice(&serial.to_be_bytes());
                out.extend_from_slice(&refresh.to_be_bytes());
                out.extend_from_slice(&retry.to_be_bytes());
                out.extend_from_slice(&expire.to_be_bytes());
                out.extend_from_slice(&minimum.to_be_bytes());
            }
            RData::Mx {
                preference,
                exchange,
            } => {
                out.extend_from_slice(&preference.to_be_bytes());
                write_name_uncompressed(&mut out, exchange);
            }
            RData::Txt(segments) => {
                for segment in segments {
                    let len = segment.len().min(255) as u8;
                    out.push(len);
                    out.extend_from_slice(&segment[..len as usize]);
                }
            }
            RData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                out.extend_from_slice(&priority.to_be_bytes());
                out.extend_from_slice(&weight.to_be_bytes());
                out.extend_from_slice(&port.to_be_bytes());
                write_name_uncompressed(&mut out, target);
            }
            RData::Caa { flags, tag, value } => {
                out.push(*flags);
                out.push(tag.len() as u8);
                out.extend_from_slice(tag.as_bytes());
                out.extend_from_slice(value);
            }
            RData::Ds {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => {
                out.extend_from_slice(&key_tag.to_be_bytes());
                out.push(*algorithm);
                out.push(*digest_type);
                out.extend_from_slice(digest);
            }
            RData::DnsKey {
                flags,
                protocol,
                algorithm,
                public_key,
            } => {
                out.extend_from_slice(&flags.to_be_bytes());
                out.push(*protocol);
                out.push(*algorithm);
                out.extend_from_slice(public_key);
            }
            RData::Rrsig {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                signer_name,
                signature,
            } => {
                out.extend_from_slice(&type_covered.to_be_bytes());
                out.push(*algorithm);
                out.push(*labels);
                out.extend_from_slice(&original_ttl.to_be_bytes());
                out.extend_from_slice(&expiration.to_be_bytes());
                out.extend_from_slice(&inception.to_be_bytes());
                out.extend_from_slice(&key_tag.to_be_bytes());
                write_name_uncompressed(&mut out, signer_name);
                out.extend_from_slice(signature);
            }
            RData::Nsec {
                next_domain,
                type_bitmap,
            } => {
                write_name_uncompressed(&mut out, next_domain);
                out.extend_from_slice(type_bitmap);
            }
            RData::Nsec3 {
                hash_algorithm,
                flags,
                iterations,
                salt,
                next_owner_hash,
                type_bitmap,
            } => {
                out.push(*hash_algorithm);
                out.push(*flags);
                out.extend_from_slice(&iterations.to_be_bytes());
                out.push(salt.len() as u8);
                out.extend_from_slice(salt);
                out.push(next_owner_hash.len() as u8);
                out.extend_from_slice(next_owner_hash);
                out.extend_from_slice(type_bitmap);
            }
            RData::Nsec3Param {
                hash_algorithm,
                flags,
                iterations,
                salt,
            } => {
                out.push(*hash_algorithm);
                out.push(*flags);
                out.extend_from_slice(&iterations.to_be_bytes());
                out.push(salt.len() as u8);
                out.extend_from_slice(salt);
            }
            RData::Opt(raw) | RData::Unknown(raw) => out.extend_from_slice(raw),
        }
        Ok(out)
    }
}

/// A single resource record: owner name, type/class, TTL, and typed rdata.
///
/// `class_raw` is kept alongside the typed `RData` because EDNS0 OPT
/// pseudo-records repurpose the class field as the requestor's UDP
/// payload size rather than a `DNSResourceClass` (RFC 6891 §6.1.2);
/// `dns::edns::EdnsOpt::parse_from_resource` decodes that case.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
)]
#[rkyv(derive(Debug, PartialEq))]
pub struct DNSResource {
    pub name: Vec<String>,
    pub rtype: DNSResourceType,
    pub class_raw: u16,
    pub ttl: u32,
    pub rdata: RData,
}

impl DNSResource {
    pub fn class(&self) -> DNSResourceClass {
        DNSResourceClass::from(self.class_raw)
    }

    pub fn new(name: Vec<String>, class: DNSResourceClass, ttl: u32, rdata: RData) -> Self {
        DNSResource {
            name,
            rtype: rdata.record_type(),
            class_raw: class.into(),
            ttl,
            rdata,
        }
    }

    /// Parse one resource record starting at `offset`, returning the
    /// record and the cursor position immediately after it (always
    /// `name + 10 + rdlength` bytes from `offset`, per RFC 1035 §4.1.3 —
    /// rdlength is authoritative regardless of what rdata parsing itself
    /// consumed).
    pub fn parse(buf: &[u8], offset: usize) -> Result<(Self, usize), ParseError> {
        let mut cursor = offset;
        let (name, consumed) = super::common::decode_name_at(buf, cursor)?;
        cursor += consumed;

        let rtype_raw = read_u16(buf, &mut cursor)?;
        let rtype = DNSResourceType::from(rtype_raw);
        let class_raw = read_u16(buf, &mut cursor)?;
        let ttl = read_u32(buf, &mut cursor)?;
        let rdlength = read_u16(buf, &mut cursor)? as usize;

        let rdata_start = cursor;
        let rdata = RData::parse(rtype, buf, rdata_start, rdlength)?;
        let next = rdata_start + rdlength;

        Ok((
            DNSResource {
                name,
                rtype,
                class_raw,
                ttl,
                rdata,
            },
            next,
        ))
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut out = Vec::new();
        write_name_uncompressed(&mut out, &self.name);
        let rtype_raw: u16 = self.rtype.into();
        out.extend_from_slice(&rtype_raw.to_be_bytes());
        out.extend_from_slice(&self.class_raw.to_be_bytes());
        out.extend_from_slice(&self.ttl.to_be_bytes());

        let rdata_bytes = self.rdata.serialize()?;
        if rdata_bytes.len() > u16::MAX as usize {
            return Err(ParseError::InvalidRData("rdata too large to encode".into()));
        }
        out.extend_from_slice(&(rdata_bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(&rdata_bytes);
        Ok(out)
    }
}
