//! Mechanic forum scraper library.
//!
//! Walks a Vanilla-style forum's discussion listing, enriches every
//! discussion with its root post and paginated comments, persists the corpus
//! as one JSON document, and derives instruction-tuning pairs from it.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod assembler;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod fetch;
pub mod forum;
pub mod models;
pub mod pairs;
pub mod storage;
