//! Metric identity.
//!
//! A series is identified by its name plus its tags sorted by key and joined
//! as `k1=v1,k2=v2`. Callers pass tags as `&[(&str, &str)]` in any order;
//! duplicate keys collapse with the last value winning.

use std::collections::BTreeMap;
use std::fmt;

/// Canonical (sorted, de-duplicated) tag set.
pub type Tags = BTreeMap<String, String>;

/// Normalise caller-supplied tags. An empty slice is the empty tag set.
pub fn normalize_tags(tags: &[(&str, &str)]) -> Tags {
    tags.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    name: String,
    tags: String,
}

impl MetricKey {
    pub fn new(name: &str, tags: &[(&str, &str)]) -> Self {
        Self::from_tags(name, &normalize_tags(tags))
    }

    pub fn from_tags(name: &str, tags: &Tags) -> Self {
        let tags = tags
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            name: name.to_string(),
            tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The joined tag string, empty when the series is untagged.
    pub fn tag_string(&self) -> &str {
        &self.tags
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}{{{}}}", self.name, self.tags)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_does_not_matter() {
        let a = MetricKey::new("x", &[("b", "2"), ("a", "1")]);
        let b = MetricKey::new("x", &[("a", "1"), ("b", "2")]);
        assert_eq!(a, b);
        assert_eq!(a.tag_string(), "a=1,b=2");
        assert_eq!(a.to_string(), "x{a=1,b=2}");
    }

    #[test]
    fn duplicate_tag_keeps_last_value() {
        let k = MetricKey::new("x", &[("a", "1"), ("a", "9")]);
        assert_eq!(k.tag_string(), "a=9");
    }

    #[test]
    fn untagged_key_renders_bare_name() {
        let k = MetricKey::new("requests", &[]);
        assert_eq!(k.tag_string(), "");
        assert_eq!(k.to_string(), "requests");
    }
}
