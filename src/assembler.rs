//! Corpus assembly.
//!
//! A run has two dispatch phases followed by a single persistence call:
//!
//! 1. every listing page is fetched and reduced to discussion summaries;
//! 2. every summary is enriched from its root page and comment pages.
//!
//! Cancellation during either phase skips straight to persistence with
//! whatever discussions completed.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::fetch::{FetchError, PageFetcher, Pacer};
use crate::forum::{extract_discussion, extract_listing, CommentPaginator};
use crate::models::{Discussion, DiscussionSummary};
use crate::storage::{persist_corpus, CorpusStore};

/// Summary of one scrape run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub listing_pages_ok: usize,
    /// Listing pages that failed or timed out.
    pub listing_pages_failed: usize,
    pub summaries: usize,
    /// Discussions in the persisted corpus.
    pub discussions: usize,
    /// Discussions whose root page was parsed.
    pub discussions_enriched: usize,
    pub discussions_failed: usize,
    pub discussions_timed_out: usize,
    pub cancelled: bool,
    /// Where the corpus was written.
    pub location: String,
    pub bytes: usize,
}

/// Orchestrates listing, enrichment and persistence.
pub struct CorpusAssembler {
    config: Config,
    fetcher: Arc<dyn PageFetcher>,
    store: Box<dyn CorpusStore>,
    discussion_pacer: Pacer,
    paginator: CommentPaginator,
}

impl CorpusAssembler {
    #[must_use]
    pub fn new(config: Config, fetcher: Arc<dyn PageFetcher>, store: Box<dyn CorpusStore>) -> Self {
        let discussion_pacer = Pacer::new(config.discussion_delay);
        let paginator =
            CommentPaginator::new(Arc::clone(&fetcher), Pacer::new(config.comment_page_delay));
        Self {
            config,
            fetcher,
            store,
            discussion_pacer,
            paginator,
        }
    }

    /// Scrape the configured listing range and persist the corpus once.
    ///
    /// # Errors
    ///
    /// Returns an error only if persisting the corpus fails; unit failures
    /// are counted in the report.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport> {
        let mut report = RunReport::default();

        let summaries = self.collect_summaries(cancel, &mut report).await;
        report.summaries = summaries.len();

        let corpus = if report.cancelled {
            info!("Run cancelled during listing phase, skipping enrichment");
            Vec::new()
        } else {
            self.enrich_all(summaries, cancel, &mut report).await
        };

        report.discussions = corpus.len();
        report.discussions_enriched = corpus.iter().filter(|d| d.is_enriched()).count();

        let key = &self.config.corpus_key;
        report.location = self.store.location(key);
        report.bytes = persist_corpus(self.store.as_ref(), key, &corpus)
            .await
            .context("Failed to save corpus")?;

        info!(
            location = %report.location,
            discussions = report.discussions,
            bytes = report.bytes,
            cancelled = report.cancelled,
            "Corpus persisted"
        );

        Ok(report)
    }

    async fn collect_summaries(
        &self,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> Vec<DiscussionSummary> {
        let dispatcher = Dispatcher::new(self.config.listing_concurrency, self.config.unit_timeout);
        let pages = self.config.listing_pages();

        info!(
            first = pages.start(),
            last = pages.end(),
            concurrency = dispatcher.max_concurrency(),
            "Starting listing phase"
        );

        let outcome = dispatcher
            .run(pages, |page| self.scrape_listing_page(page), cancel)
            .await;

        report.listing_pages_ok = outcome.completed.len();
        report.listing_pages_failed = outcome.failed + outcome.timed_out;
        report.cancelled = outcome.cancelled;

        let mut pages = outcome.completed;
        pages.sort_unstable_by_key(|(page, _)| *page);
        let summaries: Vec<DiscussionSummary> =
            pages.into_iter().flat_map(|(_, summaries)| summaries).collect();

        info!(
            pages = report.listing_pages_ok,
            failed = report.listing_pages_failed,
            discussions = summaries.len(),
            cancelled = report.cancelled,
            "Listing phase finished"
        );

        summaries
    }

    async fn scrape_listing_page(&self, page: u32) -> Result<(u32, Vec<DiscussionSummary>)> {
        let url = self.config.listing_page_url(page);
        let html = self.fetcher.fetch(&url).await?;
        let summaries = extract_listing(&html, &url)
            .with_context(|| format!("Failed to extract listing page {url}"))?;
        Ok((page, summaries))
    }

    async fn enrich_all(
        &self,
        summaries: Vec<DiscussionSummary>,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> Vec<Discussion> {
        let dispatcher =
            Dispatcher::new(self.config.discussion_concurrency, self.config.unit_timeout);

        info!(
            discussions = summaries.len(),
            concurrency = dispatcher.max_concurrency(),
            "Starting discussion phase"
        );

        let outcome = dispatcher
            .run(summaries, |summary| self.enrich_discussion(summary), cancel)
            .await;

        report.discussions_failed = outcome.failed;
        report.discussions_timed_out = outcome.timed_out;
        report.cancelled = outcome.cancelled;

        info!(
            discussions = outcome.completed.len(),
            failed = outcome.failed,
            timed_out = outcome.timed_out,
            cancelled = outcome.cancelled,
            "Discussion phase finished"
        );

        outcome.completed
    }

    /// Enrich one summary with its root page and every comment page.
    ///
    /// A root page with no recognizable container yields the summary
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the root page or any comment page cannot be
    /// fetched.
    pub async fn enrich_discussion(
        &self,
        summary: DiscussionSummary,
    ) -> Result<Discussion, FetchError> {
        self.discussion_pacer.pace().await;

        let html = self.fetcher.fetch(&summary.link).await?;
        let Some(page) = extract_discussion(&html) else {
            warn!(link = %summary.link, "Unrecognized discussion layout, keeping summary only");
            return Ok(Discussion::from_summary(summary));
        };

        let comments = self
            .paginator
            .paginate(&summary.link, summary.metadata.status, page.comment_pages)
            .await?;

        debug!(
            link = %summary.link,
            pages = page.comment_pages,
            comments = comments.len(),
            "Enriched discussion"
        );

        Ok(Discussion {
            summary,
            details: Some(page.details),
            comments,
        })
    }
}

impl std::fmt::Debug for CorpusAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusAssembler")
            .field("config", &self.config)
            .field("discussion_pacer", &self.discussion_pacer)
            .finish_non_exhaustive()
    }
}
