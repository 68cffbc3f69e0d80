use bitstream_io::{BigEndian, BitReader, BitWriter};

use super::{
    ParseError,
    common::{PacketComponent, decode_name_at, read_u16, write_name_uncompressed},
    edns::EdnsOpt,
    enums::{DNSResourceClass, DNSResourceType},
    header::DNSHeader,
    question::DNSQuestion,
    resource::DNSResource,
};

/// A full DNS message: header, questions, and the three resource-record
/// sections. Parsing happens in two styles — the header is read through
/// `bitstream_io` (its fields are sub-byte bit-packed), everything after
/// it is read with an explicit byte cursor, since resource records are
/// byte-aligned and need absolute offsets to resolve compression
/// pointers (RFC 1035 §4.1.4) in their rdata.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
)]
#[rkyv(derive(Debug, PartialEq))]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
}

/// Defensive upper bound on section counts. A real message is bounded by
/// its transport (512B classic UDP, 64KB TCP/EDNS); this catches a
/// corrupt or hostile header claiming far more records than could
/// possibly fit, before any allocation is attempted per count.
const MAX_RECORDS_PER_SECTION: u16 = 4096;

impl DNSPacket {
    pub fn new_query(id: u16, name: Vec<String>, qtype: DNSResourceType) -> Self {
        DNSPacket {
            header: DNSHeader {
                id,
                qr: false,
                opcode: 0,
                aa: false,
                tc: false,
                rd: true,
                ra: false,
                z: false,
                ad: false,
                cd: false,
                rcode: 0,
                qdcount: 1,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions: vec![DNSQuestion {
                labels: name,
                qtype,
                qclass: DNSResourceClass::IN,
            }],
            answers: Vec::new(),
            authorities: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        let mut header = DNSHeader::default();
        {
            let mut reader = BitReader::<_, BigEndian>::new(buf);
            header.read(&mut reader)?;
        }

        if header.qdcount > MAX_RECORDS_PER_SECTION
            || header.ancount > MAX_RECORDS_PER_SECTION
            || header.nscount > MAX_RECORDS_PER_SECTION
            || header.arcount > MAX_RECORDS_PER_SECTION
        {
            return Err(ParseError::TooManyQuestions);
        }

        let mut offset = 12; // header is always 12 bytes on the wire

        let mut questions = Vec::with_capacity(header.qdcount as usize);
        for _ in 0..header.qdcount {
            let (labels, consumed) = decode_name_at(buf, offset)?;
            offset += consumed;
            let qtype = DNSResourceType::from(read_u16(buf, &mut offset)?);
            let qclass = DNSResourceClass::from(read_u16(buf, &mut offset)?);
            questions.push(DNSQuestion {
                labels,
                qtype,
                qclass,
            });
        }

        let mut answers = Vec::with_capacity(header.ancount as usize);
        for _ in 0..header.ancount {
            let (resource, next) = DNSResource::parse(buf, offset)?;
            offset = next;
            answers.push(resource);
        }

        let mut authorities = Vec::with_capacity(header.nscount as usize);
        for _ in 0..header.nscount {
            let (resource, next) = DNSResource::parse(buf, offset)?;
            offset = next;
            authorities.push(resource);
        }

        let mut resources = Vec::with_capacity(header.arcount as usize);
        for _ in 0..header.arcount {
            let (resource, next) = DNSResource::parse(buf, offset)?;
            offset = next;
            resources.push(resource);
        }

        Ok(DNSPacket {
            header,
            questions,
            answers,
            authorities,
            resources,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = self.resources.len() as u16;

        let mut out = Vec::new();
        {
            let mut writer = BitWriter::<_, BigEndian>::new(&mut out);
            header.write(&mut writer)?;
        }

        for question in &self.questions {
            write_name_uncompressed(&mut out, &question.labels);
            let qtype: u16 = question.qtype.into();
            let qclass: u16 = question.qclass.into();
            out.extend_from_slice(&qtype.to_be_bytes());
            out.extend_from_slice(&qclass.to_be_bytes());
        }

        for resource in self
            .answers
            .iter()
            .chain(self.authorities.iter())
            .chain(self.resources.iter())
        {
            out.extend_from_slice(&resource.serialize()?);
        }

        Ok(out)
    }

    /// The EDNS0 OPT pseudo-record, if the message carries one, always in
    /// the additional section (RFC 6891 §6.1.1).
    pub fn edns_opt(&self) -> Option<EdnsOpt> {
        self.resources
            .iter()
            .find(|r| r.rtype == DNSResourceType::OPT)
            .and_then(|r| match &r.rdata {
                super::resource::RData::Opt(raw) => {
                    EdnsOpt::parse_from_resource(r.class_raw, r.ttl, raw).ok()
                }
                _ => None,
            })
    }

    pub fn max_udp_payload_size(&self) -> u16 {
        self.edns_opt().map(|opt| opt.udp_payload_size).unwrap_or(512)
    }

    pub fn dnssec_do(&self) -> bool {
        self.edns_opt().map(|opt| opt.do_flag()).unwrap_or(false)
    }

    /// Whether this message already carries an EDNS0 OPT record.
    pub fn supports_edns(&self) -> bool {
        self.resources.iter().any(|r| r.rtype == DNSResourceType::OPT)
    }

    /// Attach an EDNS0 OPT record to the additional section, replacing
    /// any existing one. `root` (empty owner name) per RFC 6891 §6.1.2.
    pub fn add_edns(&mut self, udp_payload_size: u16, dnssec_do: bool) {
        self.remove_edns();
        let mut opt = EdnsOpt::with_payload_size(udp_payload_size);
        opt.set_do_flag(dnssec_do);
        let (class_raw, ttl, raw) = opt.to_resource_format();
        self.resources.push(DNSResource {
            name: Vec::new(),
            rtype: DNSResourceType::OPT,
            class_raw,
            ttl,
            rdata: super::resource::RData::Opt(raw),
        });
        self.header.arcount = self.resources.len() as u16;
    }

    /// Replace the OPT record's payload size / DO flag in place, or add
    /// one if the message didn't have one yet.
    pub fn set_edns(&mut self, opt: &EdnsOpt) {
        self.add_edns(opt.udp_payload_size, opt.do_flag());
    }

    fn remove_edns(&mut self) {
        self.resources.retain(|r| r.rtype != DNSResourceType::OPT);
    }

    pub fn set_id(&mut self, id: u16) {
        self.header.id = id;
    }

    /// Clone this message as a template for a failure response: same id
    /// and question, `qr=true`, no records, rcode set by the caller.
    pub fn error_response(&self, rcode: u8) -> DNSPacket {
        DNSPacket {
            header: DNSHeader {
                id: self.header.id,
                qr: true,
                opcode: self.header.opcode,
                aa: false,
                tc: false,
                rd: self.header.rd,
                ra: true,
                z: false,
                ad: false,
                cd: false,
                rcode,
                qdcount: self.questions.len() as u16,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions: self.questions.clone(),
            answers: Vec::new(),
            authorities: Vec::new(),
            resources: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::resource::RData;

    fn labels(s: &str) -> Vec<String> {
        s.split('.').map(|l| l.to_string()).collect()
    }

    #[test]
    fn round_trip_simple_query() {
        let packet = DNSPacket::new_query(0x1234, labels("example.com"), DNSResourceType::A);
        let bytes = packet.serialize().unwrap();
        let parsed = DNSPacket::parse(&bytes).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn round_trip_response_with_answer() {
        let mut packet = DNSPacket::new_query(0xABCD, labels("example.com"), DNSResourceType::A);
        packet.header.qr = true;
        packet.header.ancount = 1;
        packet.answers.push(DNSResource::new(
            labels("example.com"),
            DNSResourceClass::IN,
            300,
            RData::A([93, 184, 216, 34]),
        ));

        let bytes = packet.serialize().unwrap();
        let parsed = DNSPacket::parse(&bytes).unwrap();
        assert_eq!(parsed.answers.len(), 1);
        assert_eq!(parsed.answers[0].rdata, RData::A([93, 184, 216, 34]));
    }

    #[test]
    fn rejects_absurd_section_counts() {
        let mut bytes = vec![0u8; 12];
        bytes[4] = 0xFF;
        bytes[5] = 0xFF; // qdcount = 65535
        assert!(matches!(
            DNSPacket::parse(&bytes),
            Err(ParseError::TooManyQuestions)
        ));
    }
}
