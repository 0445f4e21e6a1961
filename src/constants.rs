//! Shared constants used across the application.

/// User agent string used for forum requests.
pub const SCRAPER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Listing base for the repairs and maintenance tag.
pub const DEFAULT_LISTING_URL: &str =
    "https://forums.edmunds.com/discussions/tagged/x/repairs-maintenance/";

/// Blob path the corpus is persisted under.
pub const DEFAULT_CORPUS_KEY: &str = "mechanic-forums/edmunds_forum.json";

/// Content type of the persisted corpus.
pub const CORPUS_CONTENT_TYPE: &str = "application/json";
