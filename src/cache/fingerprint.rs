use std::hash::{Hash, Hasher};

use crate::dns::enums::{DNSResourceClass, DNSResourceType};

/// Cache key: the question a message/RRset/negative entry answers,
/// excluding the transaction ID (which never participates in identity —
/// two queries for the same name/type/class are the same cache slot
/// regardless of which client ID either carried).
#[derive(
    Debug,
    Clone,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
)]
#[rkyv(derive(Debug, PartialEq))]
pub struct Fingerprint {
    /// Lowercased labels, root first is implicit (labels are stored
    /// leaf-to-root same as the wire order).
    name: Vec<String>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
}

impl Fingerprint {
    pub fn new(labels: &[String], rtype: DNSResourceType, rclass: DNSResourceClass) -> Self {
        Fingerprint {
            name: labels.iter().map(|l| l.to_ascii_lowercase()).collect(),
            rtype,
            rclass,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.name
    }

    pub fn name_string(&self) -> String {
        if self.name.is_empty() {
            ".".to_string()
        } else {
            self.name.join(".")
        }
    }

    /// Coalescer key for a background prefetch refresh of this
    /// fingerprint. Distinct from the plain fingerprint so a refresh
    /// never joins (or gets joined by) a live miss resolving the same
    /// question concurrently; only ever used as an `in_flight` key, never
    /// for a cache lookup.
    pub fn for_refresh(&self) -> Fingerprint {
        let mut name = self.name.clone();
        match name.last_mut() {
            Some(last) => last.push_str("+refresh"),
            None => name.push("+refresh".to_string()),
        }
        Fingerprint {
            name,
            rtype: self.rtype,
            rclass: self.rclass,
        }
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.rtype == other.rtype && self.rclass == other.rclass
    }
}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.rtype.hash(state);
        self.rclass.hash(state);
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?} {:?}", self.name_string(), self.rtype, self.rclass)
    }
}
