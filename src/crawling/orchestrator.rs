//! # Crawl Engine
//!
//! Drives one run from a start URL. Listing pages are fetched and resolved strictly in
//! sequence; every detail link found on them is handed to a bounded pool of
//! fetch-and-extract tasks. All fetches pass through one shared token bucket.
//!
//! A run always terminates: through pagination exhaustion, the page limit, the runtime
//! limit or an explicit [`CrawlEngine::cancel`]. Per-item failures become
//! [`CrawlEvent::Skipped`] or [`CrawlEvent::Dropped`] events; only configuration and
//! resume-load failures abort a run.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::crawling::assembler;
use crate::crawling::dedup::{DedupTracker, KeyField, parse_key_fields};
use crate::crawling::pagination::PaginationResolver;
use crate::crawling::rate_gate::RateGate;
use crate::domain::extraction::ExtractionSource;
use crate::domain::hints::{SiteHints, SiteHintsCatalog};
use crate::domain::page::RenderHint;
use crate::domain::pagination::{ExhaustionReason, PaginationState, PaginationStrategy};
use crate::domain::ports::{FallbackExtractor, PageFetcher, ResumeStore};
use crate::domain::record::{CrawlEvent, DropReason, SkipReason};
use crate::domain::schema::FieldSchema;
use crate::error::{ConfigurationError, CrawlError, EngineResult};
use crate::infrastructure::config::{CrawlSettings, EngineConfig};
use crate::infrastructure::llm_fallback::DisabledFallback;
use crate::infrastructure::parsing::{CandidateItem, FieldExtractor, ItemDetector, ParsingConfig};
use crate::infrastructure::url_normalizer;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Pagination ran out of pages (including loop and fetch-failure exhaustion)
    Exhausted,
    MaxPages,
    MaxRuntime,
    Cancelled,
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub start_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub listing_pages: u32,
    pub detail_pages: u32,
    pub records: u32,
    pub dropped: BTreeMap<DropReason, u32>,
    /// Keyed by skip reason code
    pub skipped: BTreeMap<String, u32>,
    pub fallback_calls: u32,
    pub strategy: PaginationStrategy,
    pub exhaustion: Option<ExhaustionReason>,
    pub termination: Termination,
    /// Failed resume-state saves
    pub store_errors: u32,
}

impl RunReport {
    pub fn dropped_total(&self) -> u32 {
        self.dropped.values().sum()
    }

    pub fn skipped_total(&self) -> u32 {
        self.skipped.values().sum()
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at).to_std().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
struct RunStats {
    listing_pages: u32,
    detail_pages: u32,
    records: u32,
    dropped: BTreeMap<DropReason, u32>,
    skipped: BTreeMap<String, u32>,
    fallback_calls: u32,
    store_errors: u32,
}

/// Counts every event on its way out
#[derive(Clone)]
struct EventSink {
    events: mpsc::Sender<CrawlEvent>,
    stats: Arc<RwLock<RunStats>>,
    cancel: CancellationToken,
}

impl EventSink {
    /// Returns the number of records emitted so far
    async fn emit(&self, event: CrawlEvent) -> u32 {
        let records = {
            let mut stats = self.stats.write().await;
            match &event {
                CrawlEvent::Record(_) => stats.records += 1,
                CrawlEvent::Dropped(drop) => *stats.dropped.entry(drop.reason()).or_default() += 1,
                CrawlEvent::Skipped { reason, .. } => {
                    *stats.skipped.entry(reason.code().to_string()).or_default() += 1;
                }
            }
            stats.records
        };

        if self.events.send(event).await.is_err() && !self.cancel.is_cancelled() {
            warn!("Event receiver dropped, cancelling the run");
            self.cancel.cancel();
        }
        records
    }
}

/// Everything a detail task needs, shared across the pool
struct DetailWorker {
    schema: Arc<FieldSchema>,
    hints: Option<Arc<SiteHints>>,
    fetcher: Arc<dyn PageFetcher>,
    fallback: Arc<dyn FallbackExtractor>,
    extractor: Arc<FieldExtractor>,
    dedup: Arc<DedupTracker>,
    gate: Arc<RateGate>,
    semaphore: Arc<Semaphore>,
    store: Option<Arc<dyn ResumeStore>>,
    checkpoint_every: usize,
    checkpoint_lock: Mutex<()>,
    sink: EventSink,
    cancel: CancellationToken,
}

impl DetailWorker {
    /// Runs one detail item while holding a pool slot taken by the listing loop
    async fn process(self: Arc<Self>, item: CandidateItem, hint: RenderHint, _permit: OwnedSemaphorePermit) {
        let url = item.detail_url;

        if self.cancel.is_cancelled() || !self.gate.acquire(&self.cancel).await {
            self.dedup.release(&url).await;
            self.sink
                .emit(CrawlEvent::Skipped {
                    url: url.to_string(),
                    reason: SkipReason::Cancelled,
                })
                .await;
            return;
        }

        let page = match self.fetcher.fetch(&url, hint).await {
            Ok(page) => page,
            Err(error) => {
                warn!("⚠️ Skipping {}: {}", url, CrawlError::from(error.clone()));
                self.dedup.release(&url).await;
                self.sink
                    .emit(CrawlEvent::Skipped {
                        url: url.to_string(),
                        reason: SkipReason::FetchFailed { error },
                    })
                    .await;
                return;
            }
        };
        self.sink.stats.write().await.detail_pages += 1;

        let results = self
            .extractor
            .extract(&page, &self.schema, self.hints.as_deref(), self.fallback.as_ref())
            .await;
        let fallback_calls = results
            .iter()
            .filter(|(_, result)| result.source == Some(ExtractionSource::LlmFallback))
            .count();
        if fallback_calls > 0 {
            let calls = u32::try_from(fallback_calls).unwrap_or(u32::MAX);
            self.sink.stats.write().await.fallback_calls += calls;
        }

        match assembler::assemble(&self.schema, &url, &results) {
            Err(drop) => {
                self.sink.emit(CrawlEvent::Dropped(drop)).await;
            }
            Ok(record) => match self.dedup.try_admit(&record).await {
                Err(key) => {
                    self.sink
                        .emit(CrawlEvent::Skipped {
                            url: url.to_string(),
                            reason: SkipReason::DuplicateRecord { key },
                        })
                        .await;
                }
                Ok(_) => {
                    let emitted = self.sink.emit(CrawlEvent::Record(record)).await;
                    let every = u32::try_from(self.checkpoint_every).unwrap_or(u32::MAX);
                    if every > 0 && emitted % every == 0 {
                        self.checkpoint().await;
                    }
                }
            },
        }
    }

    async fn checkpoint(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let _guard = self.checkpoint_lock.lock().await;
        let snapshot = self.dedup.snapshot().await;
        match store.save(&snapshot).await {
            Ok(()) => debug!(
                "💾 Checkpoint saved ({} URLs, {} keys)",
                snapshot.visited_urls.len(),
                snapshot.dedup_keys.len()
            ),
            Err(e) => {
                error!("Failed to save resume state: {}", e);
                self.sink.stats.write().await.store_errors += 1;
            }
        }
    }
}

/// Builder for [`CrawlEngine`]
pub struct CrawlEngineBuilder {
    schema: FieldSchema,
    fetcher: Arc<dyn PageFetcher>,
    settings: CrawlSettings,
    fallback: Arc<dyn FallbackExtractor>,
    store: Option<Arc<dyn ResumeStore>>,
    hints: Option<SiteHints>,
    catalog: Option<SiteHintsCatalog>,
    parsing: ParsingConfig,
}

impl CrawlEngineBuilder {
    pub fn new(schema: FieldSchema, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            schema,
            fetcher,
            settings: CrawlSettings::default(),
            fallback: Arc::new(DisabledFallback),
            store: None,
            hints: None,
            catalog: None,
            parsing: ParsingConfig::default(),
        }
    }

    #[must_use]
    pub fn settings(mut self, settings: CrawlSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Take the crawl section of a loaded configuration
    #[must_use]
    pub fn config(self, config: &EngineConfig) -> Self {
        self.settings(config.crawl.clone())
    }

    #[must_use]
    pub fn fallback(mut self, fallback: Arc<dyn FallbackExtractor>) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn resume_store(mut self, store: Arc<dyn ResumeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Hints used for every run, whatever the start URL
    #[must_use]
    pub fn hints(mut self, hints: SiteHints) -> Self {
        self.hints = Some(hints);
        self
    }

    /// Hints looked up by the start URL's domain
    #[must_use]
    pub fn hints_catalog(mut self, catalog: SiteHintsCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn parsing(mut self, parsing: ParsingConfig) -> Self {
        self.parsing = parsing;
        self
    }

    pub fn build(self) -> Result<CrawlEngine, ConfigurationError> {
        self.settings.validate()?;
        let key_fields = parse_key_fields(&self.settings.dedup_key_fields, &self.schema)?;
        if self.settings.resume && self.store.is_none() {
            return Err(ConfigurationError::invalid_value(
                "crawl.resume",
                "resuming requires a resume store",
            ));
        }

        let gate = RateGate::from_settings(&self.settings)?;
        let mut parsing = self.parsing;
        parsing.min_group_size = self.settings.min_group_size;

        Ok(CrawlEngine {
            schema: Arc::new(self.schema),
            fetcher: self.fetcher,
            fallback: self.fallback,
            store: self.store,
            hints: self.hints.map(Arc::new),
            catalog: self.catalog,
            detector: ItemDetector::with_config(parsing.clone()),
            extractor: Arc::new(FieldExtractor::with_config(parsing.clone())),
            parsing,
            gate: Arc::new(gate),
            key_fields,
            settings: self.settings,
            cancel: CancellationToken::new(),
        })
    }
}

/// The crawl engine. Cheap to share; each [`run`](Self::run) owns its own traversal
/// and dedup state.
pub struct CrawlEngine {
    schema: Arc<FieldSchema>,
    fetcher: Arc<dyn PageFetcher>,
    fallback: Arc<dyn FallbackExtractor>,
    store: Option<Arc<dyn ResumeStore>>,
    hints: Option<Arc<SiteHints>>,
    catalog: Option<SiteHintsCatalog>,
    detector: ItemDetector,
    extractor: Arc<FieldExtractor>,
    parsing: ParsingConfig,
    gate: Arc<RateGate>,
    key_fields: Vec<KeyField>,
    settings: CrawlSettings,
    cancel: CancellationToken,
}

fn parse_start_url(raw: &str) -> Result<Url, ConfigurationError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigurationError::InvalidStartUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !url_normalizer::is_http(&url) {
        return Err(ConfigurationError::InvalidStartUrl {
            url: raw.to_string(),
            reason: "only http(s) URLs can be crawled".to_string(),
        });
    }
    Ok(url_normalizer::normalize(&url))
}

fn spawn_deadline(limit: Duration, cancel: CancellationToken, hit: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(limit) => {
                warn!("⏱️ Max runtime of {:?} reached, cancelling", limit);
                hit.store(true, Ordering::SeqCst);
                cancel.cancel();
            }
            () = cancel.cancelled() => {}
        }
    })
}

impl CrawlEngine {
    pub fn builder(schema: FieldSchema, fetcher: Arc<dyn PageFetcher>) -> CrawlEngineBuilder {
        CrawlEngineBuilder::new(schema, fetcher)
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub const fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Abort current and future runs. In-flight detail tasks finish; nothing new starts.
    pub fn cancel(&self) {
        info!("🛑 Crawl cancellation requested");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn hints_for(&self, start: &Url) -> Option<Arc<SiteHints>> {
        self.hints
            .clone()
            .or_else(|| self.catalog.as_ref()?.for_url(start).cloned().map(Arc::new))
    }

    /// Run in the background, yielding events as a stream and the report from the handle
    pub fn stream(
        self: Arc<Self>,
        start_url: impl Into<String>,
    ) -> (ReceiverStream<CrawlEvent>, JoinHandle<EngineResult<RunReport>>) {
        let (sender, receiver) = mpsc::channel(self.settings.event_buffer);
        let start_url = start_url.into();
        let handle = tokio::spawn(async move { self.run(&start_url, sender).await });
        (ReceiverStream::new(receiver), handle)
    }

    /// Crawl from `start_url`, sending every record, drop and skip to `events`
    pub async fn run(&self, start_url: &str, events: mpsc::Sender<CrawlEvent>) -> EngineResult<RunReport> {
        let start = parse_start_url(start_url)?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let hints = self.hints_for(&start);

        let dedup = Arc::new(DedupTracker::new(self.key_fields.clone()));
        if self.settings.resume {
            if let Some(store) = &self.store {
                let snapshot = store.load().await?;
                info!(
                    "📂 Resuming with {} visited URLs and {} record keys",
                    snapshot.visited_urls.len(),
                    snapshot.dedup_keys.len()
                );
                dedup.restore(snapshot).await;
            }
        }

        let cancel = self.cancel.child_token();
        let deadline_hit = Arc::new(AtomicBool::new(false));
        let timer = self
            .settings
            .max_runtime()
            .map(|limit| spawn_deadline(limit, cancel.clone(), Arc::clone(&deadline_hit)));

        let stats = Arc::new(RwLock::new(RunStats::default()));
        let sink = EventSink {
            events,
            stats: Arc::clone(&stats),
            cancel: cancel.clone(),
        };
        let worker = Arc::new(DetailWorker {
            schema: Arc::clone(&self.schema),
            hints: hints.clone(),
            fetcher: Arc::clone(&self.fetcher),
            fallback: Arc::clone(&self.fallback),
            extractor: Arc::clone(&self.extractor),
            dedup: Arc::clone(&dedup),
            gate: Arc::clone(&self.gate),
            semaphore: Arc::new(Semaphore::new(self.settings.max_concurrent_details)),
            store: self.store.clone(),
            checkpoint_every: self.settings.checkpoint_every,
            checkpoint_lock: Mutex::new(()),
            sink: sink.clone(),
            cancel: cancel.clone(),
        });
        let resolver = PaginationResolver::with_cues(
            self.settings.max_pages,
            self.fetcher.supports_scroll_loading(),
            self.parsing.pagination.clone(),
        );

        info!("🚀 Crawl {} starting at {}", run_id, start);
        if hints.is_some() {
            debug!("Site hints active for {}", start);
        }

        let mut render_mode = if hints.as_ref().is_some_and(|h| h.requires_rendering) {
            RenderHint::Rendered
        } else {
            RenderHint::Static
        };
        let mut state = PaginationState::new();
        let mut queue = VecDeque::from([(start.clone(), render_mode)]);
        let mut tasks = JoinSet::new();
        let mut first_page = true;

        while let Some((url, hint)) = queue.pop_front() {
            if cancel.is_cancelled() || !self.gate.acquire(&cancel).await {
                state.exhaust(ExhaustionReason::Cancelled);
                break;
            }

            let mut page = match self.fetcher.fetch(&url, hint).await {
                Ok(page) => page,
                Err(error) => {
                    warn!("⚠️ Listing page {} failed: {}", url, CrawlError::from(error.clone()));
                    sink.emit(CrawlEvent::Skipped {
                        url: url.to_string(),
                        reason: SkipReason::FetchFailed { error },
                    })
                    .await;
                    state.exhaust(ExhaustionReason::FetchFailed);
                    break;
                }
            };
            stats.write().await.listing_pages += 1;
            let mut items = self.detector.detect(&page, hints.as_deref());

            // Script-rendered directories show nothing to a static fetch
            if items.is_empty() && first_page && self.settings.render_on_empty && !hint.is_rendered() {
                info!("No items on {}, retrying with a rendered fetch", url);
                if self.gate.acquire(&cancel).await {
                    match self.fetcher.fetch(&url, RenderHint::Rendered).await {
                        Ok(rendered) => {
                            stats.write().await.listing_pages += 1;
                            let rendered_items = self.detector.detect(&rendered, hints.as_deref());
                            if !rendered_items.is_empty() {
                                info!("Rendered fetch found {} items, rendering from now on", rendered_items.len());
                                render_mode = RenderHint::Rendered;
                                page = rendered;
                                items = rendered_items;
                            }
                        }
                        Err(e) => warn!("Rendered retry of {} failed: {}", url, e),
                    }
                }
            }
            first_page = false;

            if items.is_empty() {
                info!("Listing page {} has no items, stopping traversal", page.url());
                state.exhaust(ExhaustionReason::EmptyListing);
                break;
            }
            info!("📄 Listing page {}: {} items", page.url(), items.len());

            for item in items {
                if cancel.is_cancelled() {
                    break;
                }
                if !dedup.should_process(&item.detail_url).await {
                    sink.emit(CrawlEvent::Skipped {
                        url: item.detail_url.to_string(),
                        reason: SkipReason::AlreadyVisited,
                    })
                    .await;
                    continue;
                }
                // Listing traversal waits here while every slot is busy
                let permit = tokio::select! {
                    permit = Arc::clone(&worker.semaphore).acquire_owned() => permit.ok(),
                    () = cancel.cancelled() => None,
                };
                let Some(permit) = permit else {
                    dedup.release(&item.detail_url).await;
                    sink.emit(CrawlEvent::Skipped {
                        url: item.detail_url.to_string(),
                        reason: SkipReason::Cancelled,
                    })
                    .await;
                    break;
                };
                tasks.spawn(Arc::clone(&worker).process(item, render_mode, permit));
            }

            let resolution = resolver.resolve(&page, hints.as_deref(), state);
            state = resolution.state;
            if let Some(refetch) = resolution.refetch {
                queue.push_back((page.url().clone(), refetch));
            }
            queue.extend(resolution.next_urls.into_iter().map(|next| (next, render_mode)));

            if state.exhaustion().is_some_and(ExhaustionReason::is_loop) {
                warn!(
                    "{}",
                    CrawlError::PaginationLoopDetected {
                        url: page.url().to_string()
                    }
                );
            }
        }

        if !state.is_exhausted() {
            state.exhaust(if cancel.is_cancelled() {
                ExhaustionReason::Cancelled
            } else {
                ExhaustionReason::NoCandidate
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Detail task failed: {}", e);
            }
        }
        if let Some(timer) = timer {
            timer.abort();
        }
        worker.checkpoint().await;

        let termination = if deadline_hit.load(Ordering::SeqCst) {
            Termination::MaxRuntime
        } else {
            match state.exhaustion() {
                Some(ExhaustionReason::MaxPages) => Termination::MaxPages,
                Some(ExhaustionReason::Cancelled) => Termination::Cancelled,
                _ => Termination::Exhausted,
            }
        };

        let stats = stats.read().await.clone();
        let report = RunReport {
            run_id,
            start_url: start.to_string(),
            started_at,
            finished_at: Utc::now(),
            listing_pages: stats.listing_pages,
            detail_pages: stats.detail_pages,
            records: stats.records,
            dropped: stats.dropped,
            skipped: stats.skipped,
            fallback_calls: stats.fallback_calls,
            strategy: state.strategy(),
            exhaustion: state.exhaustion(),
            termination,
            store_errors: stats.store_errors,
        };

        info!(
            "🏁 Crawl {} finished ({:?}): {} listing pages, {} detail pages, {} records, {} dropped, {} skipped, strategy {}",
            run_id,
            report.termination,
            report.listing_pages,
            report.detail_pages,
            report.records,
            report.dropped_total(),
            report.skipped_total(),
            report.strategy
        );
        Ok(report)
    }
}
