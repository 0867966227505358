//! Deterministic cache key generation.
//!
//! Keys have the shape
//! `{prefix}:cache:{domain}:{kind}:{discriminators...}:{param_hash}` where
//! `param_hash` is the SHA-256 of the canonical JSON form of the query
//! parameters. Object keys are sorted at every depth, arrays keep their order.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::Error;

/// Separator between key segments. Never appears unescaped inside a segment.
pub const KEY_SEPARATOR: char = ':';

/// Fixed namespace segment placed after the prefix.
const NAMESPACE: &str = "cache";

/// Fixed namespace segment for tag records.
const TAG_NAMESPACE: &str = "tag";

/// Opaque cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-composed key string (e.g. one read back from a tag set).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Named group of cache keys that are invalidated together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Every cached list page.
    pub fn all_lists() -> Self {
        Self("all-lists".into())
    }

    pub fn author(author_id: &str) -> Self {
        Self(format!("author:{author_id}"))
    }

    pub fn item(item_id: &str) -> Self {
        Self(format!("item:{item_id}"))
    }

    pub fn comments(item_id: &str) -> Self {
        Self(format!("comments:{item_id}"))
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compose a namespaced cache key.
///
/// Two parameter objects that differ only in object key order produce the
/// same key. Any difference in values, array order, or discriminators
/// produces a different key.
pub fn build_key(prefix: &str, domain: &str, kind: &str, discriminators: &[&str], params: &Value) -> CacheKey {
    let mut segments: Vec<String> = Vec::with_capacity(5 + discriminators.len());
    segments.push(escape_segment(prefix));
    segments.push(NAMESPACE.to_string());
    segments.push(escape_segment(domain));
    segments.push(escape_segment(kind));
    segments.extend(discriminators.iter().map(|d| escape_segment(d)));
    segments.push(hash_params(params));

    CacheKey(segments.join(&KEY_SEPARATOR.to_string()))
}

/// Compose a key from any serializable parameter struct.
///
/// # Errors
///
/// Returns `Error::InvalidKey` if `params` does not serialize to JSON
/// (for example a map with non-string keys).
pub fn build_key_from<T: Serialize>(
    prefix: &str, domain: &str, kind: &str, discriminators: &[&str], params: &T,
) -> Result<CacheKey, Error> {
    let value = serde_json::to_value(params).map_err(|e| Error::InvalidKey(e.to_string()))?;
    Ok(build_key(prefix, domain, kind, discriminators, &value))
}

/// Storage key under which a tag's member set lives.
pub fn tag_storage_key(prefix: &str, tag: &Tag) -> String {
    [escape_segment(prefix), TAG_NAMESPACE.to_string(), tag.as_str().to_string()].join(&KEY_SEPARATOR.to_string())
}

/// SHA-256 over the canonical serialization, hex encoded.
pub fn hash_params(params: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(params, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonical JSON text: object keys sorted, no insignificant whitespace.
pub fn canonicalize(params: &Value) -> String {
    let mut out = String::new();
    write_canonical(params, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Value::String's Display is its escaped JSON form.
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Percent-escape `%` and the separator so segments can never collide.
fn escape_segment(segment: &str) -> String {
    if !segment.contains(['%', KEY_SEPARATOR]) {
        return segment.to_string();
    }
    segment.replace('%', "%25").replace(KEY_SEPARATOR, "%3A")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;

    fn key(params: &Value) -> CacheKey {
        build_key("postcache", "blog", "list", &["1", "20", "public"], params)
    }

    #[test]
    fn test_key_order_independent() {
        let a = json!({"sort": ["-published_at"], "filter": {"tag": "rust", "author": "42"}});
        let b = json!({"filter": {"author": "42", "tag": "rust"}, "sort": ["-published_at"]});
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn test_array_order_significant() {
        let a = json!({"sort": ["title", "-published_at"]});
        let b = json!({"sort": ["-published_at", "title"]});
        assert_ne!(key(&a), key(&b));
    }

    #[test]
    fn test_discriminators_change_key() {
        let params = json!({});
        let page1 = build_key("postcache", "blog", "list", &["1", "20", "public"], &params);
        let page2 = build_key("postcache", "blog", "list", &["2", "20", "public"], &params);
        assert_ne!(page1, page2);
    }

    #[test]
    fn test_key_layout() {
        let k = build_key("postcache", "blog", "item", &["post-9"], &json!({}));
        let parts: Vec<&str> = k.as_str().split(KEY_SEPARATOR).collect();
        assert_eq!(&parts[..5], &["postcache", "cache", "blog", "item", "post-9"]);
        assert_eq!(parts[5].len(), 64);
        assert!(parts[5].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_separator_escaped_in_segments() {
        let a = build_key("postcache", "blog", "item", &["a:b"], &json!({}));
        let b = build_key("postcache", "blog", "item", &["a", "b"], &json!({}));
        assert_ne!(a, b);
        assert_eq!(a.as_str().matches(KEY_SEPARATOR).count(), 5);
    }

    #[test]
    fn test_escape_is_injective() {
        assert_ne!(escape_segment("a:b"), escape_segment("a%3Ab"));
    }

    #[test]
    fn test_canonical_form() {
        let value = json!({"b": 1, "a": {"d": [3, 1], "c": null}, "e": "x\"y"});
        assert_eq!(canonicalize(&value), r#"{"a":{"c":null,"d":[3,1]},"b":1,"e":"x\"y"}"#);
    }

    #[test]
    fn test_no_collisions_in_corpus() {
        let mut seen = HashSet::new();
        for page in 0..50 {
            for author in 0..20 {
                for sort in ["title", "-title", "published_at", "-published_at"] {
                    let params = json!({"page": page, "author": author.to_string(), "sort": [sort]});
                    assert!(seen.insert(key(&params)), "collision for {params}");
                }
            }
        }
        assert_eq!(seen.len(), 50 * 20 * 4);
    }

    #[test]
    fn test_build_key_from_struct() {
        #[derive(Serialize)]
        struct Filter {
            tag: Option<String>,
            author: Option<String>,
        }

        let from_struct = build_key_from(
            "postcache",
            "blog",
            "list",
            &["1", "20", "public"],
            &Filter { tag: Some("rust".into()), author: None },
        )
        .unwrap();
        let from_value = key(&json!({"author": null, "tag": "rust"}));
        assert_eq!(from_struct, from_value);
    }

    #[test]
    fn test_build_key_from_rejects_non_string_map_keys() {
        let mut params = std::collections::HashMap::new();
        params.insert(vec![1u8], "x");
        let result = build_key_from("postcache", "blog", "list", &[], &params);
        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_tag_storage_key() {
        assert_eq!(tag_storage_key("postcache", &Tag::author("42")), "postcache:tag:author:42");
        assert_eq!(Tag::all_lists().as_str(), "all-lists");
        assert_eq!(Tag::item("post-9").as_str(), "item:post-9");
        assert_eq!(Tag::comments("post-9").as_str(), "comments:post-9");
    }
}
