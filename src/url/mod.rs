//! URL handling utilities
//!
//! Normalization, reference resolution, and host comparison. Every URL
//! that reaches the dedup filter, the frontier, or a result list has gone
//! through [`normalize_url`] first, so string equality is meaningful.

mod domain;
mod normalize;

pub use domain::{host_of, is_same_domain, is_valid_http};
pub use normalize::{normalize_url, resolve_url};
