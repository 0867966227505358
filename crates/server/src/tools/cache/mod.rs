//! Cache administration tools.

pub mod get;
pub mod invalidate;

pub use get::{CacheGetParams, get_impl};
pub use invalidate::{CacheInvalidateParams, invalidate_impl};
