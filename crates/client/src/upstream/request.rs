//! List request parameters and validation.

use postcache_core::{ListScope, Visibility};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::UpstreamError;

/// Largest page size the upstream accepts.
pub const MAX_PER_PAGE: u32 = 100;

const DEFAULT_PER_PAGE: u32 = 20;

/// Parameters of a post listing.
///
/// Pagination and visibility select the cache slot directly; sort clauses and
/// filters are folded into the hashed params of the list key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    /// 1-based page number.
    pub page: u32,
    /// Page size (1-100, default 20).
    pub per_page: u32,
    pub visibility: Visibility,
    /// Sort clauses in priority order, `-` prefix for descending
    /// (e.g. `["-published_at", "title"]`).
    pub sort: Vec<String>,
    /// Only posts by this author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    /// Only posts carrying this topic tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            visibility: Visibility::Public,
            sort: Vec::new(),
            author_id: None,
            tag: None,
        }
    }
}

impl ListRequest {
    /// Validate the request parameters.
    ///
    /// Returns an error if any parameters are out of range or malformed.
    pub fn validate(&self) -> Result<(), UpstreamError> {
        if self.page == 0 {
            return Err(UpstreamError::InvalidRequest("page must be >= 1".to_string()));
        }

        if !(1..=MAX_PER_PAGE).contains(&self.per_page) {
            return Err(UpstreamError::InvalidRequest(format!(
                "per_page must be 1-{MAX_PER_PAGE}, got {}",
                self.per_page
            )));
        }

        for clause in &self.sort {
            let field = clause.strip_prefix('-').unwrap_or(clause);
            if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(UpstreamError::InvalidRequest(format!("invalid sort clause: {clause:?}")));
            }
        }

        if let Some(author) = &self.author_id
            && author.trim().is_empty()
        {
            return Err(UpstreamError::InvalidRequest("author_id cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Cache slot selected by pagination and visibility.
    pub fn cache_scope(&self) -> ListScope {
        ListScope::new(self.page, self.per_page, self.visibility)
    }

    /// Hashed part of the list key. Sort order is significant and kept as is.
    pub fn cache_params(&self) -> Value {
        json!({
            "sort": self.sort,
            "filter": {
                "author_id": self.author_id,
                "tag": self.tag,
            },
        })
    }

    /// Query string pairs for `GET /posts`.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
            ("visibility", self.visibility.to_string()),
        ];
        if !self.sort.is_empty() {
            pairs.push(("sort", self.sort.join(",")));
        }
        if let Some(author) = &self.author_id {
            pairs.push(("author_id", author.clone()));
        }
        if let Some(tag) = &self.tag {
            pairs.push(("tag", tag.clone()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let req = ListRequest { sort: vec!["-published_at".into(), "title".into()], ..Default::default() };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_page_zero() {
        let req = ListRequest { page: 0, ..Default::default() };
        assert!(matches!(req.validate(), Err(UpstreamError::InvalidRequest(_))));
    }

    #[test]
    fn test_per_page_bounds() {
        for per_page in [0, 101] {
            let req = ListRequest { per_page, ..Default::default() };
            assert!(req.validate().is_err(), "per_page {per_page} should be rejected");
        }
        let req = ListRequest { per_page: 100, ..Default::default() };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_invalid_sort_clause() {
        for clause in ["", "-", "title desc", "a:b"] {
            let req = ListRequest { sort: vec![clause.into()], ..Default::default() };
            assert!(req.validate().is_err(), "sort clause {clause:?} should be rejected");
        }
    }

    #[test]
    fn test_empty_author_filter() {
        let req = ListRequest { author_id: Some("  ".into()), ..Default::default() };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let req: ListRequest = serde_json::from_value(json!({"page": 3})).unwrap();
        assert_eq!(req.page, 3);
        assert_eq!(req.per_page, 20);
        assert_eq!(req.visibility, Visibility::Public);
    }

    #[test]
    fn test_cache_scope() {
        let req = ListRequest { page: 2, per_page: 50, visibility: Visibility::All, ..Default::default() };
        assert_eq!(req.cache_scope(), ListScope::new(2, 50, Visibility::All));
    }

    #[test]
    fn test_cache_params_keep_sort_order() {
        let a = ListRequest { sort: vec!["-published_at".into(), "title".into()], ..Default::default() };
        let b = ListRequest { sort: vec!["title".into(), "-published_at".into()], ..Default::default() };
        assert_ne!(a.cache_params(), b.cache_params());
        assert_eq!(a.cache_params()["sort"][0], "-published_at");
    }

    #[test]
    fn test_query_pairs() {
        let req = ListRequest {
            sort: vec!["-published_at".into(), "title".into()],
            tag: Some("rust".into()),
            ..Default::default()
        };
        let pairs = req.query_pairs();
        assert!(pairs.contains(&("sort", "-published_at,title".to_string())));
        assert!(pairs.contains(&("tag", "rust".to_string())));
        assert!(pairs.contains(&("visibility", "public".to_string())));
        assert!(!pairs.iter().any(|(k, _)| *k == "author_id"));
    }
}
