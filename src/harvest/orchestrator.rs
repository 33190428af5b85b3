//! Crawl orchestrator.
//!
//! Drives the listing pagination loop, the multi-category fan-out with
//! deduplication, and the bounded concurrent detail-enrichment pool.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::harvest::{HarvestSink, ListingSource};
use crate::models::{CrawlerConfig, Record, Startup};

/// Orchestrates one harvest over a [`ListingSource`].
///
/// The cancellation token is injected at construction and checked at
/// page and dispatch boundaries; an in-flight fetch is never
/// interrupted. Errors from the source degrade to "stop this sub-task,
/// keep what was collected" and are never fatal.
pub struct Orchestrator {
    source: Arc<dyn ListingSource>,
    cancel: CancellationToken,
    request_delay: Duration,
    detail_concurrency: usize,
}

impl Orchestrator {
    /// Create a new orchestrator for one run.
    pub fn new(
        source: Arc<dyn ListingSource>,
        config: &CrawlerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            cancel,
            request_delay: Duration::from_millis(config.request_delay_ms),
            detail_concurrency: config.detail_concurrency.max(1),
        }
    }

    /// Crawl a single listing.
    ///
    /// `max_pages == 0` keeps requesting successive pages until one
    /// comes back empty; `max_pages == N` requests pages `0..N-1`,
    /// stopping early at the first empty page. With `with_details`,
    /// every record carrying a detail URL is enriched through the
    /// bounded worker pool after the listing is exhausted.
    pub async fn run(
        &self,
        max_pages: usize,
        with_details: bool,
        category: Option<&str>,
        sink: &dyn HarvestSink,
    ) -> Vec<Startup> {
        let (mut collected, pages_scraped) =
            self.crawl_listing(max_pages, category, sink).await;

        let mut final_total = pages_scraped;
        if with_details && !collected.is_empty() && !self.cancel.is_cancelled() {
            let total_steps = pages_scraped + collected.len();
            final_total = total_steps;
            collected = self
                .enrich_details(collected, pages_scraped, total_steps, sink)
                .await;
        }

        if !self.cancel.is_cancelled() {
            sink.progress(
                final_total,
                final_total,
                &format!("Harvest complete: {} startups", collected.len()),
            );
        }
        collected
    }

    /// Crawl every discovered category, deduplicating across them.
    ///
    /// A record listed under several categories is stored and delivered
    /// once, first occurrence wins. Cancellation abandons the remaining
    /// category list entirely.
    pub async fn run_all_categories(
        &self,
        with_details: bool,
        sink: &dyn HarvestSink,
    ) -> Vec<Startup> {
        let categories = self.source.categories().await;
        if categories.is_empty() {
            sink.progress(0, 0, "No categories discovered");
            return Vec::new();
        }

        let category_count = categories.len();
        let mut seen: HashSet<String> = HashSet::new();
        let mut collected: Vec<Startup> = Vec::new();

        'categories: for (index, (slug, category)) in categories.iter().enumerate() {
            if self.cancel.is_cancelled() {
                debug!("stop requested, abandoning remaining categories");
                break;
            }

            let mut page = 0;
            loop {
                if self.cancel.is_cancelled() {
                    break 'categories;
                }
                sink.progress(
                    index,
                    category_count,
                    &format!(
                        "Category {}/{} [{}] page {} ({} unique startups)",
                        index + 1,
                        category_count,
                        category.name,
                        page + 1,
                        collected.len()
                    ),
                );

                match self.source.listing_page(page, Some(slug.as_str())).await {
                    Ok(batch) if batch.is_empty() => break,
                    Ok(batch) => {
                        let fresh: Vec<Startup> = batch
                            .into_iter()
                            .filter(|s| seen.insert(s.identity_key().to_string()))
                            .collect();
                        if !fresh.is_empty() {
                            sink.records(fresh.iter().cloned().map(Record::from).collect());
                            collected.extend(fresh);
                        }
                    }
                    Err(error) => {
                        warn!("category '{}' page {} failed: {}", slug, page, error);
                        break;
                    }
                }

                page += 1;
                self.pace().await;
            }
        }

        if with_details && !collected.is_empty() && !self.cancel.is_cancelled() {
            let total = collected.len();
            collected = self.enrich_details(collected, 0, total, sink).await;
            if !self.cancel.is_cancelled() {
                sink.progress(
                    total,
                    total,
                    &format!("Harvest complete: {} startups", collected.len()),
                );
            }
        } else if !self.cancel.is_cancelled() {
            sink.progress(
                category_count,
                category_count,
                &format!("Harvest complete: {} startups", collected.len()),
            );
        }
        collected
    }

    /// The listing pagination loop. Returns the collected records and
    /// the number of pages that yielded data.
    async fn crawl_listing(
        &self,
        max_pages: usize,
        category: Option<&str>,
        sink: &dyn HarvestSink,
    ) -> (Vec<Startup>, usize) {
        let unbounded = max_pages == 0;
        let label = category.map(|c| format!(" [{c}]")).unwrap_or_default();
        let mut collected: Vec<Startup> = Vec::new();
        let mut page = 0;
        // Rolling estimate while the true page count is unknown
        let mut total_estimate = if unbounded { 1 } else { max_pages };

        loop {
            if !unbounded && page >= max_pages {
                break;
            }
            if self.cancel.is_cancelled() {
                debug!("stop requested, ending listing loop before page {}", page);
                break;
            }

            if unbounded {
                total_estimate = total_estimate.max(page + 1);
                sink.progress(
                    page,
                    total_estimate,
                    &format!(
                        "Crawling{} page {} ({} startups so far)",
                        label,
                        page + 1,
                        collected.len()
                    ),
                );
            } else {
                sink.progress(
                    page,
                    total_estimate,
                    &format!("Crawling{} page {}/{}", label, page + 1, max_pages),
                );
            }

            match self.source.listing_page(page, category).await {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => {
                    sink.records(batch.iter().cloned().map(Record::from).collect());
                    collected.extend(batch);
                }
                Err(error) => {
                    warn!("listing page {} failed: {}", page, error);
                    break;
                }
            }

            page += 1;
            self.pace().await;
        }

        (collected, page)
    }

    /// Concurrently enrich records through the bounded detail pool.
    ///
    /// Records without a detail URL skip the fetch but still count as
    /// processed. Listing order is preserved in the returned sequence;
    /// completion order across the pool is not.
    async fn enrich_details(
        &self,
        records: Vec<Startup>,
        progress_base: usize,
        total: usize,
        sink: &dyn HarvestSink,
    ) -> Vec<Startup> {
        let record_count = records.len();
        let completed = AtomicUsize::new(0);
        let completed = &completed;

        stream::iter(records)
            .map(|mut startup| async move {
                // Checked at dispatch; an already-started fetch runs on
                if !self.cancel.is_cancelled() && !startup.detail_url.is_empty() {
                    self.pace().await;
                    match self.source.detail(&startup.detail_url).await {
                        Ok(details) => startup.merge_details(&details),
                        Err(error) => {
                            warn!(
                                "detail fetch failed for '{}': {}",
                                startup.identity_key(),
                                error
                            );
                        }
                    }
                }

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                sink.progress(
                    progress_base + done,
                    total,
                    &format!("Details {}/{}: {}", done, record_count, startup.name),
                );
                startup
            })
            .buffered(self.detail_concurrency)
            .collect()
            .await
    }

    async fn pace(&self) {
        if self.request_delay.as_millis() > 0 {
            tokio::time::sleep(self.request_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{AppError, Result};
    use crate::models::{Category, CategoryMap, DetailFields};

    fn startup(name: &str) -> Startup {
        Startup {
            name: name.to_string(),
            detail_url: format!("https://directory.example/startup/{name}"),
            ..Startup::default()
        }
    }

    fn test_config() -> CrawlerConfig {
        CrawlerConfig {
            request_delay_ms: 0,
            detail_concurrency: 4,
            ..CrawlerConfig::default()
        }
    }

    /// Scripted source: pages per category key ("" = no category).
    #[derive(Default)]
    struct StubSource {
        pages: HashMap<String, Vec<Vec<Startup>>>,
        categories: CategoryMap,
        details: HashMap<String, DetailFields>,
        failing_pages: Vec<(String, usize)>,
        failing_details: Vec<String>,
        listing_calls: AtomicUsize,
        detail_calls: AtomicUsize,
    }

    impl StubSource {
        fn with_pages(pages: Vec<Vec<Startup>>) -> Self {
            let mut source = Self::default();
            source.pages.insert(String::new(), pages);
            source
        }
    }

    #[async_trait]
    impl ListingSource for StubSource {
        async fn listing_page(
            &self,
            page: usize,
            category: Option<&str>,
        ) -> Result<Vec<Startup>> {
            self.listing_calls.fetch_add(1, Ordering::SeqCst);
            let key = category.unwrap_or("").to_string();
            if self.failing_pages.contains(&(key.clone(), page)) {
                return Err(AppError::config("scripted listing failure"));
            }
            Ok(self
                .pages
                .get(&key)
                .and_then(|pages| pages.get(page))
                .cloned()
                .unwrap_or_default())
        }

        async fn detail(&self, detail_url: &str) -> Result<DetailFields> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_details.iter().any(|u| u == detail_url) {
                return Err(AppError::config("scripted detail failure"));
            }
            Ok(self.details.get(detail_url).cloned().unwrap_or_default())
        }

        async fn categories(&self) -> CategoryMap {
            self.categories.clone()
        }
    }

    /// Sink that records every callback.
    #[derive(Default)]
    struct CollectingSink {
        progress: Mutex<Vec<(usize, usize, String)>>,
        batches: Mutex<Vec<Vec<Record>>>,
        cancel_after_first_batch: Option<CancellationToken>,
    }

    impl CollectingSink {
        fn final_progress(&self) -> (usize, usize, String) {
            self.progress.lock().unwrap().last().cloned().unwrap()
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    impl HarvestSink for CollectingSink {
        fn progress(&self, current: usize, total: usize, message: &str) {
            self.progress
                .lock()
                .unwrap()
                .push((current, total, message.to_string()));
        }

        fn records(&self, batch: Vec<Record>) {
            self.batches.lock().unwrap().push(batch);
            if let Some(token) = &self.cancel_after_first_batch {
                token.cancel();
            }
        }
    }

    #[tokio::test]
    async fn test_bounded_run_collects_both_pages() {
        let source = Arc::new(StubSource::with_pages(vec![
            (0..5).map(|i| startup(&format!("a{i}"))).collect(),
            (0..3).map(|i| startup(&format!("b{i}"))).collect(),
            vec![startup("never-fetched")],
        ]));
        let sink = CollectingSink::default();
        let orchestrator =
            Orchestrator::new(source.clone(), &test_config(), CancellationToken::new());

        let result = orchestrator.run(2, false, None, &sink).await;

        assert_eq!(result.len(), 8);
        assert_eq!(sink.batch_sizes(), vec![5, 3]);
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 2);
        let (current, total, _) = sink.final_progress();
        assert_eq!((current, total), (2, 2));
    }

    #[tokio::test]
    async fn test_unbounded_run_stops_at_first_empty_page() {
        let source = Arc::new(StubSource::with_pages(vec![
            vec![startup("a")],
            vec![startup("b")],
            vec![startup("c")],
            vec![],
        ]));
        let sink = CollectingSink::default();
        let orchestrator =
            Orchestrator::new(source.clone(), &test_config(), CancellationToken::new());

        let result = orchestrator.run(0, false, None, &sink).await;

        // 3 data pages + 1 empty probe
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 4);
        assert_eq!(sink.batch_sizes(), vec![1, 1, 1]);
        assert_eq!(result.len(), 3);
        let (current, total, _) = sink.final_progress();
        assert_eq!(current, total);
    }

    #[tokio::test]
    async fn test_bounded_run_stops_early_on_empty_page() {
        let source = Arc::new(StubSource::with_pages(vec![vec![startup("a")], vec![]]));
        let sink = CollectingSink::default();
        let orchestrator =
            Orchestrator::new(source.clone(), &test_config(), CancellationToken::new());

        let result = orchestrator.run(5, false, None, &sink).await;

        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.len(), 1);
        let (current, total, _) = sink.final_progress();
        assert_eq!((current, total), (1, 1));
    }

    #[tokio::test]
    async fn test_listing_error_keeps_collected_records() {
        let mut source = StubSource::with_pages(vec![
            vec![startup("a"), startup("b")],
            vec![startup("c")],
        ]);
        source.failing_pages.push((String::new(), 1));
        let sink = CollectingSink::default();
        let orchestrator =
            Orchestrator::new(Arc::new(source), &test_config(), CancellationToken::new());

        let result = orchestrator.run(0, false, None, &sink).await;

        assert_eq!(result.len(), 2);
        assert_eq!(sink.batch_sizes(), vec![2]);
        let (current, total, _) = sink.final_progress();
        assert_eq!(current, total);
    }

    #[tokio::test]
    async fn test_detail_phase_enriches_and_skips_keyless() {
        let enriched = startup("acme");
        let keyless = Startup {
            name: "no-link".to_string(),
            ..Startup::default()
        };
        let mut source = StubSource::with_pages(vec![vec![enriched.clone(), keyless]]);
        source.details.insert(
            enriched.detail_url.clone(),
            DetailFields {
                founder: "Jeanne Martin".to_string(),
                ..DetailFields::default()
            },
        );
        let source = Arc::new(source);
        let sink = CollectingSink::default();
        let orchestrator =
            Orchestrator::new(source.clone(), &test_config(), CancellationToken::new());

        let result = orchestrator.run(1, true, None, &sink).await;

        assert_eq!(result[0].founder, "Jeanne Martin");
        assert_eq!(result[1].founder, "");
        // Only the record with a detail URL reaches the source
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 1);
        // 1 listing page + 2 processed records
        let (current, total, _) = sink.final_progress();
        assert_eq!((current, total), (3, 3));
    }

    #[tokio::test]
    async fn test_detail_failure_only_drops_that_enrichment() {
        let first = startup("first");
        let second = startup("second");
        let mut source = StubSource::with_pages(vec![vec![first.clone(), second.clone()]]);
        source.failing_details.push(first.detail_url.clone());
        source.details.insert(
            second.detail_url.clone(),
            DetailFields {
                twitter: "https://x.com/second".to_string(),
                ..DetailFields::default()
            },
        );
        let sink = CollectingSink::default();
        let orchestrator =
            Orchestrator::new(Arc::new(source), &test_config(), CancellationToken::new());

        let result = orchestrator.run(1, true, None, &sink).await;

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].twitter, "");
        assert_eq!(result[1].twitter, "https://x.com/second");
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_page_requests() {
        let source = Arc::new(StubSource::with_pages(vec![
            vec![startup("a"), startup("b")],
            vec![startup("c")],
            vec![startup("d")],
        ]));
        let token = CancellationToken::new();
        let sink = CollectingSink {
            cancel_after_first_batch: Some(token.clone()),
            ..CollectingSink::default()
        };
        let orchestrator = Orchestrator::new(source.clone(), &test_config(), token);

        let result = orchestrator.run(0, false, None, &sink).await;

        // The page in flight when stop() arrived is the last one issued
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 1);
        // Already-returned records stay in the result set
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_detail_dispatch() {
        let source = Arc::new(StubSource::with_pages(vec![vec![startup("a")], vec![]]));
        let token = CancellationToken::new();
        let sink = CollectingSink {
            cancel_after_first_batch: Some(token.clone()),
            ..CollectingSink::default()
        };
        let orchestrator = Orchestrator::new(source.clone(), &test_config(), token);

        let result = orchestrator.run(0, true, None, &sink).await;

        assert_eq!(result.len(), 1);
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 0);
    }

    fn category_map(entries: &[(&str, &str)]) -> CategoryMap {
        entries
            .iter()
            .map(|(slug, name)| {
                (
                    slug.to_string(),
                    Category {
                        name: name.to_string(),
                        count: None,
                    },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_multi_category_deduplicates_shared_records() {
        let shared = startup("shared");
        let mut source = StubSource::default();
        source.categories = category_map(&[("saas", "SaaS"), ("fintech", "Fintech")]);
        source.pages.insert(
            "saas".to_string(),
            vec![vec![shared.clone(), startup("saas-only")], vec![]],
        );
        source.pages.insert(
            "fintech".to_string(),
            vec![vec![shared.clone(), startup("fintech-only")], vec![]],
        );
        let sink = CollectingSink::default();
        let orchestrator =
            Orchestrator::new(Arc::new(source), &test_config(), CancellationToken::new());

        let result = orchestrator.run_all_categories(false, &sink).await;

        assert_eq!(result.len(), 3);
        // The shared record is delivered exactly once across all batches
        let delivered: Vec<Record> = sink
            .batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .cloned()
            .collect();
        let shared_count = delivered
            .iter()
            .filter(|r| matches!(r, Record::Startup(s) if s.name == "shared"))
            .count();
        assert_eq!(shared_count, 1);
        let (current, total, _) = sink.final_progress();
        assert_eq!((current, total), (2, 2));
    }

    #[tokio::test]
    async fn test_multi_category_empty_discovery_returns_immediately() {
        let source = Arc::new(StubSource::default());
        let sink = CollectingSink::default();
        let orchestrator =
            Orchestrator::new(source.clone(), &test_config(), CancellationToken::new());

        let result = orchestrator.run_all_categories(false, &sink).await;

        assert!(result.is_empty());
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_multi_category_cancellation_abandons_remaining() {
        let token = CancellationToken::new();
        let mut source = StubSource::default();
        source.categories = category_map(&[("saas", "SaaS"), ("fintech", "Fintech")]);
        source
            .pages
            .insert("saas".to_string(), vec![vec![startup("a")], vec![]]);
        source
            .pages
            .insert("fintech".to_string(), vec![vec![startup("b")], vec![]]);
        let source = Arc::new(source);
        let sink = CollectingSink {
            cancel_after_first_batch: Some(token.clone()),
            ..CollectingSink::default()
        };
        let orchestrator = Orchestrator::new(source.clone(), &test_config(), token);

        let result = orchestrator.run_all_categories(false, &sink).await;

        // Only the first category's first page was requested
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn test_multi_category_detail_phase_runs_over_dedup_set() {
        let a = startup("a");
        let b = startup("b");
        let mut source = StubSource::default();
        source.categories = category_map(&[("saas", "SaaS")]);
        source
            .pages
            .insert("saas".to_string(), vec![vec![a.clone(), b.clone()], vec![]]);
        source.details.insert(
            a.detail_url.clone(),
            DetailFields {
                location: "Paris".to_string(),
                ..DetailFields::default()
            },
        );
        let sink = CollectingSink::default();
        let orchestrator =
            Orchestrator::new(Arc::new(source), &test_config(), CancellationToken::new());

        let result = orchestrator.run_all_categories(true, &sink).await;

        assert_eq!(result[0].location, "Paris");
        let (current, total, _) = sink.final_progress();
        assert_eq!((current, total), (2, 2));
    }
}
