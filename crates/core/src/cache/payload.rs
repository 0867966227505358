//! What the facade needs to know about cached payloads.
//!
//! List pages and posts are tagged by author, so their payload types expose
//! author ids. The upstream client implements these for its response types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A cached list page.
pub trait ListPayload {
    /// Author ids present on the page. Duplicates are fine.
    fn author_ids(&self) -> Vec<String>;
}

/// A single cached item.
pub trait ItemPayload {
    fn author_id(&self) -> Option<String>;
}

/// Which posts a list includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    /// Hidden and draft posts included (admin views).
    All,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => f.write_str("public"),
            Visibility::All => f.write_str("all"),
        }
    }
}

/// Discriminators of a list page key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListScope {
    pub page: u32,
    pub per_page: u32,
    pub visibility: Visibility,
}

impl ListScope {
    pub fn new(page: u32, per_page: u32, visibility: Visibility) -> Self {
        Self { page, per_page, visibility }
    }
}

impl Default for ListScope {
    fn default() -> Self {
        Self { page: 1, per_page: 20, visibility: Visibility::Public }
    }
}
