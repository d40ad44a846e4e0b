//! Card permission cache for the door controller.
//!
//! [`CardCache`] keeps the permission list of the remote service in memory
//! and answers swipes from it; [`HttpPermissionSource`] is the HTTP client for
//! that service. The cache is generic over [`PermissionSource`] so tests can
//! substitute the service.

pub mod cache;
pub mod error;
pub mod http;
pub mod source;

pub use cache::{CacheConfig, CardCache};
pub use error::{CacheError, Result};
pub use http::{HttpPermissionSource, HttpSourceConfig};
pub use source::{LookupOutcome, PermissionRecord, PermissionSource};
