//! Extraction of discussion records from forum markup.
//!
//! Each extractor is a pure function of one page's HTML. Fetching, pacing and
//! concurrency live in [`crate::fetch`], [`crate::dispatch`] and
//! [`crate::assembler`].

pub mod comments;
pub mod discussion;
pub mod html;
pub mod listing;

use thiserror::Error;

pub use comments::{extract_comment_page, CommentPage, CommentPaginator};
pub use discussion::{extract_discussion, ContainerMatcher, DiscussionPage};
pub use listing::{extract_listing, Layout};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("listing container not found")]
    MissingListing,
    #[error("listing entry is missing its {0}")]
    ListingEntry(&'static str),
    #[error("listing entry matches no known field layout")]
    UnknownLayout,
    #[error("comment entry is missing its {0}")]
    CommentEntry(&'static str),
}
