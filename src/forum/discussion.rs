//! Discussion root page extraction.
//!
//! The root post container carries one class token per author role, so its
//! class attribute varies from thread to thread. Containers are located by
//! an ordered list of [`ContainerMatcher`]s; the first match wins.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::html::{element_text, has_class_tokens, last_number, parse_count};
use crate::models::DiscussionDetails;

static DIV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div").expect("Invalid selector"));
static HEADER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.Item-Header.DiscussionHeader").expect("Invalid selector")
});
static AUTHOR_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.Author a").expect("Invalid selector"));
static AUTHOR_INFO: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.AuthorInfo").expect("Invalid selector"));
static SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("Invalid selector"));
static BOLD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b").expect("Invalid selector"));
static MESSAGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.Item-BodyWrap div.Message.userContent").expect("Invalid selector")
});
static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("Invalid selector"));
static TAG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.InlineTags.Meta li").expect("Invalid selector"));
static PAGER_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.CommentsWrap span.Pager.NumberedPager a").expect("Invalid selector")
});

/// Locates the root post container of a discussion page.
pub trait ContainerMatcher: Send + Sync {
    /// Short name of the markup variant, for logs.
    fn signature(&self) -> &'static str;

    /// Find the container, or `None` if this variant is not on the page.
    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>>;
}

/// Matches the first `<div>` whose class tokens include all of `required`.
#[derive(Debug, Clone, Copy)]
pub struct ClassTokens {
    pub signature: &'static str,
    pub required: &'static [&'static str],
}

impl ContainerMatcher for ClassTokens {
    fn signature(&self) -> &'static str {
        self.signature
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        document
            .select(&DIV)
            .find(|div| has_class_tokens(div, self.required))
    }
}

/// Known container variants, most specific first.
///
/// Role tokens (`Role_Member`, `Role_Moderator`, `Banned`, ...) are ignored,
/// so every role combination matches the first entry.
pub static DEFAULT_MATCHERS: [ClassTokens; 2] = [
    ClassTokens {
        signature: "item-discussion-pagebox",
        required: &["Item", "ItemDiscussion", "noPhotoWrap", "pageBox"],
    },
    ClassTokens {
        signature: "item-discussion",
        required: &["Item", "ItemDiscussion"],
    },
];

/// Root page fields plus the number of comment pages to walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionPage {
    pub details: DiscussionDetails,
    /// Number of comment pages; one when the page has no pager.
    pub comment_pages: u32,
    /// Signature of the matcher that located the container.
    pub matched: &'static str,
}

/// Extract a discussion root page using [`DEFAULT_MATCHERS`].
///
/// Returns `None` when no known container variant is present; the caller
/// keeps the discussion un-enriched.
#[must_use]
pub fn extract_discussion(html: &str) -> Option<DiscussionPage> {
    let matchers: Vec<&dyn ContainerMatcher> = DEFAULT_MATCHERS
        .iter()
        .map(|m| m as &dyn ContainerMatcher)
        .collect();
    extract_discussion_with(html, &matchers)
}

/// Extract a discussion root page, trying `matchers` in order.
#[must_use]
pub fn extract_discussion_with(
    html: &str,
    matchers: &[&dyn ContainerMatcher],
) -> Option<DiscussionPage> {
    let document = Html::parse_document(html);

    let (container, matched) = matchers
        .iter()
        .find_map(|m| m.locate(&document).map(|container| (container, m.signature())))?;

    debug!(matched, "Located discussion container");

    let header = container.select(&HEADER).next();
    let (author, author_post_count, author_role_title) =
        header.map_or((None, None, None), |header| author_fields(&header));

    let message = container.select(&MESSAGE).next();
    let description = message.as_ref().map(element_text).unwrap_or_default();
    let image = message
        .as_ref()
        .and_then(|m| m.select(&IMAGE).next())
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    let tags = container
        .select(&TAG)
        .map(|li| element_text(&li))
        .filter(|tag| !tag.is_empty())
        .collect();

    Some(DiscussionPage {
        details: DiscussionDetails {
            author,
            author_post_count,
            author_role_title,
            description,
            image,
            tags,
        },
        comment_pages: comment_page_count(&document),
        matched,
    })
}

/// Author name, post count and role title from an element holding the
/// author block. Shared with comment entries, which render the same block.
pub(crate) fn author_fields(
    scope: &ElementRef<'_>,
) -> (Option<String>, Option<u64>, Option<String>) {
    // Role badges may precede the profile link; the name is the last link
    let author = scope
        .select(&AUTHOR_LINK)
        .last()
        .map(|a| element_text(&a))
        .filter(|name| !name.is_empty());

    let info = scope.select(&AUTHOR_INFO).next();
    let info_spans: Vec<ElementRef<'_>> = info
        .as_ref()
        .map(|info| info.select(&SPAN).collect())
        .unwrap_or_default();

    let post_count = info_spans
        .last()
        .and_then(|span| span.select(&BOLD).next())
        .and_then(|b| parse_count(&element_text(&b)))
        .or_else(|| info.as_ref().and_then(|info| last_number(&element_text(info))));

    let role_title = info_spans
        .first()
        .map(element_text)
        .filter(|title| !title.is_empty());

    (author, post_count, role_title)
}

/// Highest page number linked from the comment pager, or one without a pager.
fn comment_page_count(document: &Html) -> u32 {
    document
        .select(&PAGER_LINK)
        .filter_map(|a| parse_count(&element_text(&a)))
        .filter_map(|n| u32::try_from(n).ok())
        .max()
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discussion_page(container_class: &str, pager: &str) -> String {
        format!(
            r#"<html><body>
            <div class="{container_class}">
              <div class="Item-Header DiscussionHeader">
                <span class="Author">
                  <a class="Badge" href="/badges/mod">MOD</a>
                  <a href="/profile/wrenchhead">wrenchhead</a>
                </span>
                <span class="AuthorInfo">
                  <span class="MItem RoleTitle">Member</span>
                  <span class="MItem PostCount">Posts: <b>1,024</b></span>
                </span>
              </div>
              <div class="Item-BodyWrap">
                <div class="Item-Body">
                  <div class="Message userContent">
                    My 2009 Civic squeals when braking cold.
                    <img src="https://img.example.com/rotor.jpg" alt="rotor">
                  </div>
                </div>
              </div>
              <div class="InlineTags Meta">
                <ul><li><a href="/tagged/brakes">brakes</a></li><li><a href="/tagged/honda">honda</a></li></ul>
              </div>
            </div>
            <div class="CommentsWrap">{pager}</div>
            </body></html>"#
        )
    }

    const PAGER: &str = r#"<span class="Pager PagerLinkCount-11 NumberedPager">
        <a class="Previous">«</a><a class="Highlight">1</a><a>2</a><a>3</a>
        <a class="Ellipsis">…</a><a>14</a><a class="Next">»</a></span>"#;

    #[test]
    fn test_extract_member_discussion() {
        let html = discussion_page(
            "Item ItemDiscussion Role_Member noPhotoWrap pageBox",
            PAGER,
        );
        let page = extract_discussion(&html).unwrap();

        assert_eq!(page.matched, "item-discussion-pagebox");
        assert_eq!(page.details.author.as_deref(), Some("wrenchhead"));
        assert_eq!(page.details.author_post_count, Some(1024));
        assert_eq!(page.details.author_role_title.as_deref(), Some("Member"));
        assert!(page
            .details
            .description
            .starts_with("My 2009 Civic squeals"));
        assert_eq!(
            page.details.image.as_deref(),
            Some("https://img.example.com/rotor.jpg")
        );
        assert_eq!(page.details.tags, vec!["brakes", "honda"]);
        assert_eq!(page.comment_pages, 14);
    }

    #[test]
    fn test_role_variants_match() {
        for class in [
            "Item ItemDiscussion  Role_Member Role_Administrator Role_Moderator noPhotoWrap pageBox",
            "Item ItemDiscussion Role_Guest noPhotoWrap pageBox",
            "Item ItemDiscussion  Role_Member Banned noPhotoWrap pageBox",
            "Item ItemDiscussion noPhotoWrap pageBox",
        ] {
            let page = extract_discussion(&discussion_page(class, ""));
            assert!(page.is_some(), "no match for {class}");
        }
    }

    #[test]
    fn test_fallback_matcher() {
        let html = discussion_page("Item ItemDiscussion Role_Member", "");
        let page = extract_discussion(&html).unwrap();
        assert_eq!(page.matched, "item-discussion");
    }

    #[test]
    fn test_no_container_is_unparseable() {
        let html = discussion_page("Item ItemComment", "");
        assert!(extract_discussion(&html).is_none());
    }

    #[test]
    fn test_missing_pager_defaults_to_one_page() {
        let html = discussion_page("Item ItemDiscussion noPhotoWrap pageBox", "");
        assert_eq!(extract_discussion(&html).unwrap().comment_pages, 1);
    }

    #[test]
    fn test_missing_optional_fields_degrade() {
        let html = r#"<div class="Item ItemDiscussion"><div class="Item-BodyWrap">
            <div class="Message userContent">Just text</div></div></div>"#;
        let page = extract_discussion(html).unwrap();

        assert_eq!(page.details.author, None);
        assert_eq!(page.details.author_post_count, None);
        assert_eq!(page.details.image, None);
        assert!(page.details.tags.is_empty());
        assert_eq!(page.details.description, "Just text");
    }

    #[test]
    fn test_custom_matcher_order() {
        struct Never;
        impl ContainerMatcher for Never {
            fn signature(&self) -> &'static str {
                "never"
            }
            fn locate<'a>(&self, _document: &'a Html) -> Option<ElementRef<'a>> {
                None
            }
        }

        let html = discussion_page("Item ItemDiscussion noPhotoWrap pageBox", "");
        let never = Never;
        let page =
            extract_discussion_with(&html, &[&never, &DEFAULT_MATCHERS[1]]).unwrap();
        assert_eq!(page.matched, "item-discussion");
    }
}
