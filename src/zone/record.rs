use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::resource::{DNSResource, RData};

/// A zone record represents a single resource record in a zone file
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRecord {
    /// Domain name (relative to zone origin or FQDN)
    pub name: String,
    /// Time to live in seconds
    pub ttl: Option<u32>,
    /// Record class (usually IN)
    pub class: DNSResourceClass,
    /// Record type (A, AAAA, MX, etc.)
    pub rtype: DNSResourceType,
    /// Record data in text format
    pub rdata: String,
}

impl ZoneRecord {
    /// Create a new zone record
    pub fn new(
        name: String,
        ttl: Option<u32>,
        class: DNSResourceClass,
        rtype: DNSResourceType,
        rdata: String,
    ) -> Self {
        Self {
            name,
            ttl,
            class,
            rtype,
            rdata,
        }
    }

    /// Convert to DNS resource record with given origin and default TTL
    pub fn to_dns_resource(&self, origin: &str, default_ttl: u32) -> Result<DNSResource, String> {
        let full_name = self.normalize_name(origin)?;
        let labels: Vec<String> = full_name
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();

        let ttl = self.ttl.unwrap_or(default_ttl);
        let rdata = self.parse_rdata(origin)?;

        Ok(DNSResource::new(labels, self.class, ttl, rdata))
    }

    /// Normalize domain name relative to origin
    fn normalize_name(&self, origin: &str) -> Result<String, String> {
        let name = self.name.trim();

        if name == "@" {
            // @ represents the zone origin
            Ok(origin.to_string())
        } else if name.ends_with('.') {
            // Already fully qualified
            Ok(name.trim_end_matches('.').to_string())
        } else if name.is_empty() {
            // Empty name means origin
            Ok(origin.to_string())
        } else {
            // Relative name - append origin
            Ok(format!("{}.{}", name, origin.trim_end_matches('.')))
        }
    }

    /// Parse rdata from zone-file text into typed `RData`.
    fn parse_rdata(&self, origin: &str) -> Result<RData, String> {
        match self.rtype {
            DNSResourceType::A => self.parse_a_record(),
            DNSResourceType::AAAA => self.parse_aaaa_record(),
            DNSResourceType::NS => self.parse_ns_record(origin),
            DNSResourceType::CNAME => self.parse_cname_record(origin),
            DNSResourceType::SOA => self.parse_soa_record(origin),
            DNSResourceType::PTR => self.parse_ptr_record(origin),
            DNSResourceType::MX => self.parse_mx_record(origin),
            DNSResourceType::TXT => self.parse_txt_record(),
            DNSResourceType::SRV => self.parse_srv_record(origin),
            DNSResourceType::CAA => self.parse_caa_record(),
            _ => Err(format!(
                "Unsupported record type for zone files: {:?}",
                self.rtype
            )),
        }
    }

    fn parse_a_record(&self) -> Result<RData, String> {
        use std::net::Ipv4Addr;
        let addr: Ipv4Addr = self
            .rdata
            .parse()
            .map_err(|_| format!("Invalid IPv4 address: {}", self.rdata))?;
        Ok(RData::A(addr.octets()))
    }

    fn parse_aaaa_record(&self) -> Result<RData, String> {
        use std::net::Ipv6Addr;
        let addr: Ipv6Addr = self
            .rdata
            .parse()
            .map_err(|_| format!("Invalid IPv6 address: {}", self.rdata))?;
        Ok(RData::Aaaa(addr.octets()))
    }

    fn parse_ns_record(&self, origin: &str) -> Result<RData, String> {
        Ok(RData::Ns(self.name_labels(&self.rdata, origin)))
    }

    fn parse_cname_record(&self, origin: &str) -> Result<RData, String> {
        Ok(RData::Cname(self.name_labels(&self.rdata, origin)))
    }

    fn parse_ptr_record(&self, origin: &str) -> Result<RData, String> {
        Ok(RData::Ptr(self.name_labels(&self.rdata, origin)))
    }

    fn parse_soa_record(&self, origin: &str) -> Result<RData, String> {
        // SOA format: mname rname serial refresh retry expire minimum
        let parts: Vec<&str> = self.rdata.split_whitespace().collect();
        if parts.len() != 7 {
            return Err(format!("SOA record requires 7 fields, got {}", parts.len()));
        }

        let serial: u32 = parts[2]
            .parse()
            .map_err(|_| format!("Invalid SOA serial: {}", parts[2]))?;
        let refresh: u32 = parts[3]
            .parse()
            .map_err(|_| format!("Invalid SOA refresh: {}", parts[3]))?;
        let retry: u32 = parts[4]
            .parse()
            .map_err(|_| format!("Invalid SOA retry: {}", parts[4]))?;
        let expire: u32 = parts[5]
            .parse()
            .map_err(|_| format!("Invalid SOA expire: {}", parts[5]))?;
        let minimum: u32 = parts[6]
            .parse()
            .map_err(|_| format!("Invalid SOA minimum: {}", parts[6]))?;

        Ok(RData::Soa {
            mname: self.name_labels(parts[0], origin),
            rname: self.name_labels(parts[1], origin),
            serial,
            refresh,
            retry,
            expire,
            minimum,
        })
    }

    fn parse_mx_record(&self, origin: &str) -> Result<RData, String> {
        // MX format: priority exchange
        let parts: Vec<&str> = self.rdata.split_whitespace().collect();
        if parts.len() != 2 {
            return Err(format!("MX record requires 2 fields, got {}", parts.len()));
        }

        let preference: u16 = parts[0]
            .parse()
            .map_err(|_| format!("Invalid MX priority: {}", parts[0]))?;

        Ok(RData::Mx {
            preference,
            exchange: self.name_labels(parts[1], origin),
        })
    }

    fn parse_txt_record(&self) -> Result<RData, String> {
        let text = self.rdata.trim_matches('"');
        let mut chunks = Vec::new();
        for chunk in text.as_bytes().chunks(255) {
            chunks.push(chunk.to_vec());
        }
        if chunks.is_empty() {
            chunks.push(Vec::new());
        }
        Ok(RData::Txt(chunks))
    }

    fn parse_srv_record(&self, origin: &str) -> Result<RData, String> {
        // SRV format: priority weight port target
        let parts: Vec<&str> = self.rdata.split_whitespace().collect();
        if parts.len() != 4 {
            return Err(format!("SRV record requires 4 fields, got {}", parts.len()));
        }

        let priority: u16 = parts[0]
            .parse()
            .map_err(|_| format!("Invalid SRV priority: {}", parts[0]))?;
        let weight: u16 = parts[1]
            .parse()
            .map_err(|_| format!("Invalid SRV weight: {}", parts[1]))?;
        let port: u16 = parts[2]
            .parse()
            .map_err(|_| format!("Invalid SRV port: {}", parts[2]))?;

        Ok(RData::Srv {
            priority,
            weight,
            port,
            target: self.name_labels(parts[3], origin),
        })
    }

    fn parse_caa_record(&self) -> Result<RData, String> {
        // CAA format: flags tag value
        let parts: Vec<&str> = self.rdata.splitn(3, ' ').collect();
        if parts.len() != 3 {
            return Err(format!("CAA record requires 3 fields, got {}", parts.len()));
        }

        let flags: u8 = parts[0]
            .parse()
            .map_err(|_| format!("Invalid CAA flags: {}", parts[0]))?;
        let tag = parts[1].to_string();
        let value = parts[2].trim_matches('"').as_bytes().to_vec();

        Ok(RData::Caa { flags, tag, value })
    }

    /// Split a zone-file name into labels, qualifying it against `origin`
    /// the same way [`Self::normalize_name`] does for the record's owner.
    fn name_labels(&self, name: &str, origin: &str) -> Vec<String> {
        let trimmed = name.trim();
        let fqdn = if trimmed.ends_with('.') {
            trimmed.trim_end_matches('.').to_string()
        } else if trimmed.is_empty() || trimmed == "@" {
            origin.trim_end_matches('.').to_string()
        } else {
            format!("{}.{}", trimmed, origin.trim_end_matches('.'))
        };
        fqdn.split('.').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect()
    }
}
