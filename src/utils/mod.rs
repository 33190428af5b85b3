//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use url::{parse_digits, resolve_url};
