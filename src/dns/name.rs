use std::fmt;

/// A domain name as a sequence of labels, compared case-insensitively per
/// RFC 4343. Used as the identity component of cache fingerprints and for
/// bailiwick checks in the recursor, so equality and hashing are defined
/// over the lowercased label sequence rather than the original casing.
#[derive(Clone, Debug, Default, Eq, serde::Serialize, serde::Deserialize)]
pub struct Name {
    labels: Vec<String>,
}

impl Name {
    pub fn root() -> Self {
        Name { labels: Vec::new() }
    }

    pub fn from_labels(labels: Vec<String>) -> Self {
        Name { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// True if `self` is `other` or a descendant of `other` (same
    /// bailiwick). Compares lowercased labels from the right.
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        if other.labels.len() > self.labels.len() {
            return false;
        }
        let offset = self.labels.len() - other.labels.len();
        self.labels[offset..]
            .iter()
            .zip(other.labels.iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// The immediate parent name, or `None` for the root.
    pub fn parent(&self) -> Option<Name> {
        if self.labels.is_empty() {
            None
        } else {
            Some(Name::from_labels(self.labels[1..].to_vec()))
        }
    }

    fn canonical_key(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.to_ascii_lowercase()).collect()
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state);
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        let trimmed = s.trim_end_matches('.');
        if trimmed.is_empty() {
            return Name::root();
        }
        Name::from_labels(trimmed.split('.').map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for Name {
    fn from(labels: Vec<String>) -> Self {
        Name::from_labels(labels)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.labels.join("."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_equality() {
        let a = Name::from("Example.COM");
        let b = Name::from("example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn subdomain_check() {
        let child = Name::from("www.example.com");
        let parent = Name::from("example.com");
        let unrelated = Name::from("example.org");
        assert!(child.is_subdomain_of(&parent));
        assert!(!unrelated.is_subdomain_of(&parent));
        assert!(parent.is_subdomain_of(&parent));
    }

    #[test]
    fn root_is_empty() {
        let root = Name::root();
        assert!(root.is_root());
        assert_eq!(root.to_string(), ".");
    }

    #[test]
    fn parent_walks_up() {
        let name = Name::from("a.b.example.com");
        let p1 = name.parent().unwrap();
        assert_eq!(p1, Name::from("b.example.com"));
    }
}
