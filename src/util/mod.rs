//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **Date normalization**: Tolerant RFC-2822 / RFC-3339 parsing into UTC instants
//! - **Atomic writes**: Write-to-temp-then-rename so readers never see a partial file
//!
//! # Examples
//!
//! ```
//! use rss_mirror::util::parse_pub_date;
//!
//! let date = parse_pub_date("Mon, 01 Jan 2024 10:00:00 +0100").unwrap();
//! assert_eq!(date.to_rfc3339(), "2024-01-01T09:00:00+00:00");
//!
//! // Malformed input is "no date known", not an error
//! assert!(parse_pub_date("yesterday-ish").is_none());
//! ```

mod date;
mod fs;

pub use date::parse_pub_date;
pub use fs::atomic_write;
