//! Comment page extraction and pagination.

use std::sync::{Arc, LazyLock};

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::discussion::author_fields;
use super::html::{element_text, fragment, parse_timestamp};
use super::ExtractError;
use crate::fetch::{FetchError, PageFetcher, Pacer};
use crate::models::{Comment, DiscussionStatus};

static ACCEPTED: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("ul.MessageList.DataList.AcceptedAnswers > li").expect("Invalid selector")
});
static REGULAR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("ul.MessageList.DataList.Comments > li").expect("Invalid selector")
});
static DATE_CREATED: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("span.MItem.DateCreated time[datetime]").expect("Invalid selector")
});
static MESSAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.Message.userContent").expect("Invalid selector"));

/// Comments extracted from one comment page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentPage {
    /// First entry of the accepted-answers block, if one was rendered.
    pub accepted: Option<Comment>,
    /// Regular comments in document order.
    pub comments: Vec<Comment>,
    /// Entries that could not be parsed.
    pub skipped: usize,
}

impl CommentPage {
    /// The page's comments with the accepted answer first.
    #[must_use]
    pub fn into_ordered(self) -> Vec<Comment> {
        self.accepted.into_iter().chain(self.comments).collect()
    }
}

/// Extract one comment page.
///
/// The accepted-answers block is only read when `status` is answered. A
/// missing comment list yields an empty page.
#[must_use]
pub fn extract_comment_page(html: &str, status: DiscussionStatus, page_url: &str) -> CommentPage {
    let document = Html::parse_document(html);
    let mut page = CommentPage::default();

    if status.is_answered() {
        if let Some(entry) = document.select(&ACCEPTED).next() {
            match extract_comment(&entry) {
                Ok(comment) => page.accepted = Some(comment),
                Err(e) => {
                    page.skipped += 1;
                    warn!(page = %page_url, fragment = %fragment(&entry), "Skipping accepted answer: {e}");
                }
            }
        }
    }

    for entry in document.select(&REGULAR) {
        match extract_comment(&entry) {
            Ok(comment) => page.comments.push(comment),
            Err(e) => {
                page.skipped += 1;
                warn!(page = %page_url, fragment = %fragment(&entry), "Skipping comment: {e}");
            }
        }
    }

    page
}

fn extract_comment(entry: &ElementRef<'_>) -> Result<Comment, ExtractError> {
    let (author, post_count, role_title) = author_fields(entry);

    let date = entry
        .select(&DATE_CREATED)
        .next()
        .and_then(|time| time.value().attr("datetime"))
        .and_then(parse_timestamp)
        .ok_or(ExtractError::CommentEntry("creation date"))?;
    let text = entry
        .select(&MESSAGE)
        .next()
        .map(|message| element_text(&message))
        .ok_or(ExtractError::CommentEntry("message body"))?;

    Ok(Comment {
        comment_author: author.ok_or(ExtractError::CommentEntry("author"))?,
        comment_author_post_count: post_count.ok_or(ExtractError::CommentEntry("post count"))?,
        comment_author_role_title: role_title.unwrap_or_default(),
        comment_date_created: date,
        comment_text: text,
    })
}

/// URL of comment page `page` of the discussion at `link`.
#[must_use]
pub fn comment_page_url(link: &str, page: u32) -> String {
    format!("{}/p{page}", link.trim_end_matches('/'))
}

/// Walks a discussion's comment pages in ascending order.
#[derive(Clone)]
pub struct CommentPaginator {
    fetcher: Arc<dyn PageFetcher>,
    pacer: Pacer,
}

impl CommentPaginator {
    #[must_use]
    pub fn new(fetcher: Arc<dyn PageFetcher>, pacer: Pacer) -> Self {
        Self { fetcher, pacer }
    }

    /// Fetch pages `1..=page_count` and concatenate their comments.
    ///
    /// Each page contributes its accepted answer (if any) followed by its
    /// regular comments. A page count of zero fetches nothing.
    ///
    /// # Errors
    ///
    /// Returns the first transport failure; comments gathered so far are
    /// discarded so a discussion never has gaps in its thread.
    pub async fn paginate(
        &self,
        link: &str,
        status: DiscussionStatus,
        page_count: u32,
    ) -> Result<Vec<Comment>, FetchError> {
        let mut comments = Vec::new();

        for page in 1..=page_count {
            self.pacer.pace().await;

            let url = comment_page_url(link, page);
            let html = self.fetcher.fetch(&url).await?;
            let extracted = extract_comment_page(&html, status, &url);

            debug!(
                url = %url,
                accepted = extracted.accepted.is_some(),
                comments = extracted.comments.len(),
                skipped = extracted.skipped,
                "Extracted comment page"
            );

            comments.extend(extracted.into_ordered());
        }

        Ok(comments)
    }
}

impl std::fmt::Debug for CommentPaginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentPaginator")
            .field("pacer", &self.pacer)
            .finish_non_exhaustive()
    }
}
