//! Listing page extraction.
//!
//! A listing entry's meta line is a run of `<span>`s whose positions shift
//! depending on what precedes the view counter:
//!
//! ```text
//! no tag:           [views] [n] [comments] [n] ... [date] [category]
//! tag:        [tag] [views] [n] [comments] [n] ... [date] [category]
//! tag+closed: [tag] [glyph] [views] [n] [comments] [n] ... [date] [category]
//! ```
//!
//! Spans are counted in document order including nested ones, so each
//! counter occupies two positions.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::html::{element_text, fragment, parse_count, parse_timestamp};
use super::ExtractError;
use crate::models::{DiscussionMetadata, DiscussionStatus, DiscussionSummary};

static LISTING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.DataList.Discussions").expect("Invalid selector"));
static ENTRY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.DataList.Discussions > li").expect("Invalid selector"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.Title").expect("Invalid selector"));
static TITLE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("Invalid selector"));
static META: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.Meta.Meta-Discussion").expect("Invalid selector"));
static SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("Invalid selector"));
static COUNT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span[title]").expect("Invalid selector"));
static TIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time[datetime]").expect("Invalid selector"));

/// Field layout of one listing entry's meta line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Open discussion, counters start at the first span.
    NoStatusTag,
    /// A status tag precedes the counters.
    WithStatusTag(DiscussionStatus),
    /// A status tag and the closed glyph precede the counters.
    WithStatusTagAndClosedMarker(DiscussionStatus),
}

impl Layout {
    /// Classify an entry from its meta spans.
    ///
    /// Tagged entries probe the plain tag layout first and fall back to the
    /// closed-marker layout; the first whose counters parse wins.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::UnknownLayout`] when no layout yields both
    /// counters.
    pub fn classify(spans: &[ElementRef<'_>]) -> Result<Self, ExtractError> {
        let first = spans.first().ok_or(ExtractError::ListingEntry("meta spans"))?;

        let candidates = match DiscussionStatus::from_tag_text(&element_text(first)) {
            Some(status) => vec![
                Self::WithStatusTag(status),
                Self::WithStatusTagAndClosedMarker(status),
            ],
            None => vec![Self::NoStatusTag],
        };

        candidates
            .into_iter()
            .find(|layout| layout.views(spans).is_some() && layout.comments(spans).is_some())
            .ok_or(ExtractError::UnknownLayout)
    }

    /// Number of spans preceding the view counter.
    #[must_use]
    pub const fn offset(&self) -> usize {
        match self {
            Self::NoStatusTag => 0,
            Self::WithStatusTag(_) => 1,
            Self::WithStatusTagAndClosedMarker(_) => 2,
        }
    }

    #[must_use]
    pub const fn status(&self) -> DiscussionStatus {
        match self {
            Self::NoStatusTag => DiscussionStatus::Open,
            Self::WithStatusTag(status) | Self::WithStatusTagAndClosedMarker(status) => *status,
        }
    }

    #[must_use]
    pub const fn closed(&self) -> bool {
        matches!(self, Self::WithStatusTagAndClosedMarker(_))
    }

    /// View count, read from the titled span inside the view counter.
    #[must_use]
    pub fn views(&self, spans: &[ElementRef<'_>]) -> Option<u64> {
        counter_at(spans, self.offset())
    }

    /// Comment count, two positions after the view counter.
    #[must_use]
    pub fn comments(&self, spans: &[ElementRef<'_>]) -> Option<u64> {
        counter_at(spans, self.offset() + 2)
    }
}

fn counter_at(spans: &[ElementRef<'_>], index: usize) -> Option<u64> {
    let span = spans.get(index)?;
    let number = span.select(&COUNT).next()?;
    parse_count(number.value().attr("title")?)
}

/// Extract every discussion summary from one listing page, in page order.
///
/// Entries whose markup matches no known layout are logged and skipped.
///
/// # Errors
///
/// Returns [`ExtractError::MissingListing`] if the page has no listing
/// container at all.
pub fn extract_listing(html: &str, page_url: &str) -> Result<Vec<DiscussionSummary>, ExtractError> {
    let document = Html::parse_document(html);
    if document.select(&LISTING).next().is_none() {
        return Err(ExtractError::MissingListing);
    }

    let base = Url::parse(page_url).ok();
    let mut summaries = Vec::new();

    for entry in document.select(&ENTRY) {
        match extract_entry(&entry, base.as_ref()) {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                warn!(page = %page_url, fragment = %fragment(&entry), "Skipping listing entry: {e}");
            }
        }
    }

    debug!(page = %page_url, count = summaries.len(), "Extracted listing page");
    Ok(summaries)
}

fn extract_entry(
    entry: &ElementRef<'_>,
    base: Option<&Url>,
) -> Result<DiscussionSummary, ExtractError> {
    let title = entry
        .select(&TITLE)
        .next()
        .ok_or(ExtractError::ListingEntry("title"))?;
    let href = title
        .select(&TITLE_LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or(ExtractError::ListingEntry("link"))?;

    let meta = entry
        .select(&META)
        .next()
        .ok_or(ExtractError::ListingEntry("meta line"))?;
    let spans: Vec<ElementRef<'_>> = meta.select(&SPAN).collect();

    let layout = Layout::classify(&spans)?;
    let views = layout.views(&spans).ok_or(ExtractError::UnknownLayout)?;
    let comments = layout.comments(&spans).ok_or(ExtractError::UnknownLayout)?;

    // Date and category are anchored to the end of the meta line
    let date = spans
        .len()
        .checked_sub(2)
        .and_then(|i| spans.get(i))
        .and_then(|span| span.select(&TIME).next())
        .and_then(|time| time.value().attr("datetime"))
        .and_then(parse_timestamp)
        .ok_or(ExtractError::ListingEntry("date"))?;
    let category = spans
        .last()
        .map(element_text)
        .ok_or(ExtractError::ListingEntry("category"))?;

    Ok(DiscussionSummary {
        title: element_text(&title),
        link: resolve_link(base, href),
        metadata: DiscussionMetadata {
            views,
            comments,
            date,
            category,
            status: layout.status(),
            closed: layout.closed(),
        },
    })
}

fn resolve_link(base: Option<&Url>, href: &str) -> String {
    base.and_then(|base| base.join(href).ok())
        .map_or_else(|| href.to_string(), String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://forum.example.com/discussions/tagged/x/repairs-maintenance/p1";

    fn listing(entries: &str) -> String {
        format!(
            r#"<html><body>
            <ul class="DataList Discussions pageBox">{entries}</ul>
            </body></html>"#
        )
    }

    fn entry(title: &str, href: &str, lead: &str, views: &str, comments: &str) -> String {
        format!(
            r#"<li class="Item ItemDiscussion">
              <div class="ItemContent Discussion">
                <div class="Title"><a href="{href}">{title}</a></div>
                <div class="Meta Meta-Discussion">
                  {lead}
                  <span class="MItem MCount ViewCount"><span title="{views}" class="Number">1.2K</span> views</span>
                  <span class="MItem MCount CommentCount"><span title="{comments}" class="Number">5</span> comments</span>
                  <span class="MItem LastCommentDate"><time datetime="2019-03-12T14:05:33+00:00">March 2019</time></span>
                  <span class="MItem Category"><a href="/categories/maintenance">Maintenance &amp; Repair</a></span>
                </div>
              </div>
            </li>"#
        )
    }

    #[test]
    fn test_entry_without_status_tag() {
        let html = listing(&entry("Brake squeal", "/discussion/1/brake-squeal", "", "1,234", "5"));
        let summaries = extract_listing(&html, PAGE_URL).unwrap();

        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.title, "Brake squeal");
        assert_eq!(
            summary.link,
            "https://forum.example.com/discussion/1/brake-squeal"
        );
        assert_eq!(summary.metadata.views, 1234);
        assert_eq!(summary.metadata.comments, 5);
        assert_eq!(
            summary.metadata.date.to_rfc3339(),
            "2019-03-12T14:05:33+00:00"
        );
        assert_eq!(summary.metadata.category, "Maintenance & Repair");
        assert_eq!(summary.metadata.status, DiscussionStatus::Open);
        assert!(!summary.metadata.closed);
    }

    #[test]
    fn test_entry_with_status_tag() {
        let lead = r#"<span class="Tag Tag-Answered">Answered ✓</span>"#;
        let html = listing(&entry("Idle surge", "/discussion/2/idle", lead, "88", "12"));
        let summaries = extract_listing(&html, PAGE_URL).unwrap();

        let meta = &summaries[0].metadata;
        assert_eq!(meta.views, 88);
        assert_eq!(meta.comments, 12);
        assert_eq!(meta.status, DiscussionStatus::Answered);
        assert!(!meta.closed);
    }

    #[test]
    fn test_entry_with_status_tag_and_closed_marker() {
        let lead = r#"<span class="Tag Tag-Question">Question</span><span class="Closed" aria-label="closed">🔒</span>"#;
        let html = listing(&entry("Coolant leak", "/discussion/3/coolant", lead, "7", "0"));
        let summaries = extract_listing(&html, PAGE_URL).unwrap();

        let meta = &summaries[0].metadata;
        assert_eq!(meta.views, 7);
        assert_eq!(meta.comments, 0);
        assert_eq!(meta.status, DiscussionStatus::Question);
        assert!(meta.closed);
    }

    #[test]
    fn test_broken_entry_is_skipped_without_affecting_siblings() {
        let broken = r#"<li class="Item"><div class="Title"><a href="/discussion/9/x">Broken</a></div>
            <div class="Meta Meta-Discussion"><span class="Tag Tag-Poll">Poll</span><span>?</span></div></li>"#;
        let entries = format!(
            "{}{broken}{}",
            entry("First", "/discussion/1/first", "", "1", "1"),
            entry("Last", "/discussion/2/last", "", "2", "2"),
        );
        let summaries = extract_listing(&listing(&entries), PAGE_URL).unwrap();

        let titles: Vec<&str> = summaries.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Last"]);
    }

    #[test]
    fn test_missing_listing_container() {
        let result = extract_listing("<html><body><p>Maintenance</p></body></html>", PAGE_URL);
        assert!(matches!(result, Err(ExtractError::MissingListing)));
    }

    #[test]
    fn test_classify_prefers_plain_tag_layout() {
        let html = Html::parse_fragment(
            r#"<div><span>Closed</span><span><span title="3">3</span></span><span><span title="3">3</span></span><span><span title="4">4</span></span></div>"#,
        );
        let spans: Vec<ElementRef<'_>> = html.select(&SPAN).collect();

        let layout = Layout::classify(&spans).unwrap();
        assert_eq!(layout, Layout::WithStatusTag(DiscussionStatus::Closed));
        assert_eq!(layout.offset(), 1);
        assert!(!layout.closed());
    }
}
