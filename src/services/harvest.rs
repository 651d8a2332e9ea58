//! Article harvest service.
//!
//! Drains the discovery queue through the extraction cascade and persists
//! the results: article text, downloaded images, metadata documents, and
//! catalog rows. Separated from UI concerns - emits events for progress
//! tracking.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::diagnostics;
use crate::extract::{is_pdf_url, ExtractionPipeline, PdfFetcher};
use crate::models::{ArticleRequest, CatalogEntry, ExtractionMethod, PdfEntry, QualityTier};
use crate::repository::{CatalogRepository, DiscoveryRepository, PdfRepository};
use crate::scrapers::HttpClient;
use crate::storage::{self, ArticleMetadata};

/// Events emitted during harvest operations.
#[derive(Debug, Clone)]
pub enum HarvestEvent {
    /// Processing started for a URL
    Started {
        worker_id: usize,
        url: String,
        title: String,
    },
    /// Article text and images were persisted
    Extracted {
        worker_id: usize,
        url: String,
        method: ExtractionMethod,
        tier: QualityTier,
        content_length: usize,
        image_count: usize,
    },
    /// Queue entry skipped by the catalog ledger
    Skipped { url: String, reason: String },
    /// PDF downloaded and saved to the document store
    PdfSaved {
        worker_id: usize,
        url: String,
        bytes: usize,
    },
    /// Every strategy failed, or the article could not be persisted
    Failed {
        worker_id: usize,
        url: String,
        error: String,
    },
}

/// Final tallies for one harvest run.
#[derive(Debug, Default)]
pub struct HarvestResult {
    pub harvested: usize,
    pub pdfs: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Configuration for the harvest service.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub storage_dir: PathBuf,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub request_delay: Duration,
    /// Cap on URLs scheduled in one run; negative means unlimited.
    pub max_blogs: i64,
    /// Process every URL even when the ledger says it is already done.
    pub force_reextract: bool,
    /// Restrict the run to catalog entries with failed or low quality.
    pub test_problematic: bool,
    pub workers: usize,
}

/// Service for extracting queued articles into the catalog.
pub struct HarvestService {
    discovery: DiscoveryRepository,
    catalog: CatalogRepository,
    pdfs: PdfRepository,
    pipeline: Arc<ExtractionPipeline>,
    config: HarvestConfig,
}

impl HarvestService {
    /// Create a new harvest service.
    pub fn new(
        discovery: DiscoveryRepository,
        catalog: CatalogRepository,
        pdfs: PdfRepository,
        pipeline: Arc<ExtractionPipeline>,
        config: HarvestConfig,
    ) -> Self {
        Self {
            discovery,
            catalog,
            pdfs,
            pipeline,
            config,
        }
    }

    /// Harvest every scheduled URL.
    ///
    /// Applies the ledger's skip policy, then spawns worker tasks that drain
    /// a shared queue. Progress is reported over `event_tx`; the final
    /// tallies come back in the returned [`HarvestResult`].
    pub async fn run(&self, event_tx: mpsc::Sender<HarvestEvent>) -> anyhow::Result<HarvestResult> {
        let skipped = Arc::new(AtomicUsize::new(0));
        let work = self.build_work_list(&event_tx, &skipped).await?;
        info!("Scheduling {} URLs for harvest", work.len());

        let queue = Arc::new(Mutex::new(VecDeque::from(work)));
        let harvested = Arc::new(AtomicUsize::new(0));
        let pdfs_saved = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let workers = self.config.workers.max(1);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let queue = queue.clone();
            let catalog = self.catalog.clone();
            let pdf_repo = self.pdfs.clone();
            let pipeline = self.pipeline.clone();
            let storage_dir = self.config.storage_dir.clone();
            let user_agent = self.config.user_agent.clone();
            let timeout = self.config.request_timeout;
            let delay = self.config.request_delay;
            let harvested = harvested.clone();
            let pdfs_saved = pdfs_saved.clone();
            let failed = failed.clone();
            let event_tx = event_tx.clone();

            let handle = tokio::spawn(async move {
                let client = HttpClient::new(&user_agent, timeout, delay);

                loop {
                    // Bind before matching so the queue lock drops here.
                    let next = queue.lock().await.pop_front();
                    let Some(request) = next else {
                        break;
                    };

                    let url = request.url.clone();
                    let _ = event_tx
                        .send(HarvestEvent::Started {
                            worker_id,
                            url: url.clone(),
                            title: request.title.clone(),
                        })
                        .await;

                    if is_pdf_url(&url) {
                        match save_pdf(&client, &pdf_repo, &storage_dir, &request).await {
                            Ok(entry) => {
                                pdfs_saved.fetch_add(1, Ordering::Relaxed);
                                let _ = event_tx
                                    .send(HarvestEvent::PdfSaved {
                                        worker_id,
                                        url,
                                        bytes: entry.file_size as usize,
                                    })
                                    .await;
                            }
                            Err(e) => {
                                failed.fetch_add(1, Ordering::Relaxed);
                                let _ = event_tx
                                    .send(HarvestEvent::Failed {
                                        worker_id,
                                        url,
                                        error: e.to_string(),
                                    })
                                    .await;
                            }
                        }
                        continue;
                    }

                    match harvest_article(&pipeline, &catalog, &storage_dir, &request).await {
                        Ok(entry) if entry.extraction_quality == QualityTier::Failed => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            let _ = event_tx
                                .send(HarvestEvent::Failed {
                                    worker_id,
                                    url,
                                    error: "all extraction strategies failed".to_string(),
                                })
                                .await;
                        }
                        Ok(entry) => {
                            harvested.fetch_add(1, Ordering::Relaxed);
                            let _ = event_tx
                                .send(HarvestEvent::Extracted {
                                    worker_id,
                                    url,
                                    method: entry.extraction_method,
                                    tier: entry.extraction_quality,
                                    content_length: entry.content_length as usize,
                                    image_count: entry.image_count as usize,
                                })
                                .await;
                        }
                        Err(e) => {
                            warn!("Harvest failed for {}: {}", url, e);
                            failed.fetch_add(1, Ordering::Relaxed);
                            let _ = event_tx
                                .send(HarvestEvent::Failed {
                                    worker_id,
                                    url,
                                    error: e.to_string(),
                                })
                                .await;
                        }
                    }
                }
            });

            handles.push(handle);
        }

        for handle in handles {
            let _ = handle.await;
        }

        Ok(HarvestResult {
            harvested: harvested.load(Ordering::Relaxed),
            pdfs: pdfs_saved.load(Ordering::Relaxed),
            skipped: skipped.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
        })
    }

    /// Apply the ledger's skip/retry policy and the run cap to the queue.
    async fn build_work_list(
        &self,
        event_tx: &mpsc::Sender<HarvestEvent>,
        skipped: &AtomicUsize,
    ) -> anyhow::Result<Vec<ArticleRequest>> {
        let candidates: Vec<ArticleRequest> = if self.config.test_problematic {
            let entries = self.catalog.problematic().await?;
            info!("Retrying {} problematic catalog entries", entries.len());
            entries
                .into_iter()
                .map(|e| ArticleRequest::new(e.url, e.title, e.company, e.tags, e.year))
                .collect()
        } else {
            self.discovery.all().await?
        };

        let mut work = Vec::new();
        for request in candidates {
            if self.config.max_blogs >= 0 && work.len() as i64 >= self.config.max_blogs {
                break;
            }
            if let Some(reason) = self.skip_reason(&request).await? {
                debug!("Skipping {}: {}", request.url, reason);
                skipped.fetch_add(1, Ordering::Relaxed);
                let _ = event_tx
                    .send(HarvestEvent::Skipped {
                        url: request.url.clone(),
                        reason,
                    })
                    .await;
                continue;
            }
            work.push(request);
        }
        Ok(work)
    }

    /// Ledger consult for one URL. `None` means the URL should be processed.
    async fn skip_reason(&self, request: &ArticleRequest) -> anyhow::Result<Option<String>> {
        // Problematic entries are selected for retry; low-tier rows would
        // otherwise trip the content-length skip themselves.
        if self.config.force_reextract || self.config.test_problematic {
            return Ok(None);
        }
        if is_pdf_url(&request.url) {
            if self.pdfs.get_by_url(&request.url).await?.is_some() {
                return Ok(Some("pdf already saved".to_string()));
            }
            return Ok(None);
        }
        match self.catalog.get_by_url(&request.url).await? {
            Some(entry) if entry.is_skippable() => Ok(Some(format!(
                "already harvested ({}, {} chars)",
                entry.extraction_quality.as_str(),
                entry.content_length
            ))),
            _ => Ok(None),
        }
    }
}

/// Run the cascade for one article and persist every artifact.
///
/// Always records diagnostics and upserts a catalog row, even when all
/// strategies fail. Text, metadata, and image files exist only for accepted
/// results.
async fn harvest_article(
    pipeline: &ExtractionPipeline,
    catalog: &CatalogRepository,
    storage_dir: &Path,
    request: &ArticleRequest,
) -> anyhow::Result<CatalogEntry> {
    let blog_id = request.blog_id();
    let images_dir = storage::images_dir(storage_dir, &blog_id);
    let output = pipeline.extract(request, &images_dir).await;

    if let Err(e) = diagnostics::record_extraction(storage_dir, &blog_id, request, &output) {
        warn!("Failed to write diagnostics for {}: {}", request.url, e);
    }

    let result = &output.result;
    let now = Utc::now();
    // Upserts replace the whole row; keep the original insertion time.
    let created_at = match catalog.get(&blog_id).await? {
        Some(prior) => prior.created_at,
        None => now,
    };

    let entry = if result.is_failed() {
        CatalogEntry {
            blog_id,
            title: request.title.clone(),
            company: request.company.clone(),
            tags: request.tags.clone(),
            year: request.year.clone(),
            url: request.url.clone(),
            content_length: 0,
            image_count: 0,
            text_file_path: None,
            images_dir_path: None,
            extraction_method: result.method,
            extraction_quality: result.tier,
            has_images: false,
            has_embedded_links: false,
            created_at,
            updated_at: now,
        }
    } else {
        let text_path = storage::write_article_text(storage_dir, request, result)?;
        let meta = ArticleMetadata {
            blog_id: blog_id.clone(),
            url: request.url.clone(),
            title: result.title.clone(),
            company: request.company.clone(),
            tags: request.tags.clone(),
            year: request.year.clone(),
            extraction_method: result.method.as_str().to_string(),
            extraction_quality: result.tier.as_str().to_string(),
            content_length: result.content_length(),
            images: result.images.clone(),
            text_file_path: text_path.clone(),
            extracted_at: now,
        };
        storage::write_article_metadata(storage_dir, &meta)?;

        let has_images = !result.images.is_empty();
        CatalogEntry {
            blog_id,
            title: request.title.clone(),
            company: request.company.clone(),
            tags: request.tags.clone(),
            year: request.year.clone(),
            url: request.url.clone(),
            content_length: result.content_length() as i64,
            image_count: result.images.len() as i64,
            text_file_path: Some(text_path),
            images_dir_path: has_images.then(|| images_dir.clone()),
            extraction_method: result.method,
            extraction_quality: result.tier,
            has_images,
            has_embedded_links: result.text.contains("http://")
                || result.text.contains("https://"),
            created_at,
            updated_at: now,
        }
    };

    catalog.save(&entry).await?;
    Ok(entry)
}

/// Download a PDF with the repository-tuned fetcher and catalog it.
async fn save_pdf(
    client: &HttpClient,
    pdfs: &PdfRepository,
    storage_dir: &Path,
    request: &ArticleRequest,
) -> anyhow::Result<PdfEntry> {
    let bytes = PdfFetcher::new(client).download(&request.url).await?;
    let pdf_id = request.blog_id();
    let path = storage::write_pdf_file(storage_dir, &pdf_id, &request.title, &bytes)?;
    debug!("Saved PDF {} ({} bytes)", path.display(), bytes.len());

    let entry = PdfEntry {
        pdf_id,
        title: request.title.clone(),
        company: request.company.clone(),
        tags: request.tags.clone(),
        year: request.year.clone(),
        url: request.url.clone(),
        file_path: path,
        file_size: bytes.len() as i64,
        file_type: "pdf".to_string(),
        created_at: Utc::now(),
    };
    pdfs.save(&entry).await?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::DbContext;
    use crate::scrapers::DEFAULT_USER_AGENT;
    use tempfile::tempdir;

    // Nothing listens on port 9; connections are refused immediately.
    const DEAD_BASE: &str = "http://127.0.0.1:9";

    async fn context(dir: &tempfile::TempDir) -> DbContext {
        let ctx = DbContext::new(&dir.path().join("test.db"), &dir.path().join("storage"));
        ctx.init_schema().await.unwrap();
        ctx
    }

    fn config(storage_dir: PathBuf) -> HarvestConfig {
        HarvestConfig {
            storage_dir,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(2),
            request_delay: Duration::ZERO,
            max_blogs: -1,
            force_reextract: false,
            test_problematic: false,
            workers: 2,
        }
    }

    fn service(ctx: &DbContext, config: HarvestConfig) -> HarvestService {
        let client = HttpClient::new(&config.user_agent, config.request_timeout, Duration::ZERO);
        let pipeline = Arc::new(ExtractionPipeline::new(client, None));
        HarvestService::new(ctx.discovery(), ctx.catalog(), ctx.pdfs(), pipeline, config)
    }

    fn request(url: &str, title: &str) -> ArticleRequest {
        ArticleRequest::new(
            url.to_string(),
            title.to_string(),
            "Example Corp".to_string(),
            vec!["search".to_string()],
            "2024".to_string(),
        )
    }

    fn catalog_row(request: &ArticleRequest, tier: QualityTier, len: i64) -> CatalogEntry {
        let now = Utc::now();
        CatalogEntry {
            blog_id: request.blog_id(),
            title: request.title.clone(),
            company: request.company.clone(),
            tags: request.tags.clone(),
            year: request.year.clone(),
            url: request.url.clone(),
            content_length: len,
            image_count: 0,
            text_file_path: None,
            images_dir_path: None,
            extraction_method: ExtractionMethod::Structured,
            extraction_quality: tier,
            has_images: false,
            has_embedded_links: false,
            created_at: now,
            updated_at: now,
        }
    }

    async fn drain(mut rx: mpsc::Receiver<HarvestEvent>) -> Vec<HarvestEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn test_ledger_skips_high_quality_entries() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir).await;
        let req = request(&format!("{}/good", DEAD_BASE), "Good Post");
        ctx.discovery().insert(&req).await.unwrap();
        ctx.catalog()
            .save(&catalog_row(&req, QualityTier::High, 5000))
            .await
            .unwrap();

        let svc = service(&ctx, config(ctx.storage_dir().to_path_buf()));
        let (tx, rx) = mpsc::channel(64);
        let result = svc.run(tx).await.unwrap();

        assert_eq!(result.skipped, 1);
        assert_eq!(result.harvested, 0);
        assert_eq!(result.failed, 0);

        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(
            e,
            HarvestEvent::Skipped { reason, .. } if reason.contains("already harvested")
        )));
    }

    #[tokio::test]
    async fn test_force_reextract_overwrites_and_keeps_created_at() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir).await;
        let req = request(&format!("{}/good", DEAD_BASE), "Good Post");
        ctx.discovery().insert(&req).await.unwrap();
        ctx.catalog()
            .save(&catalog_row(&req, QualityTier::High, 5000))
            .await
            .unwrap();
        let before = ctx.catalog().get(&req.blog_id()).await.unwrap().unwrap();

        let mut cfg = config(ctx.storage_dir().to_path_buf());
        cfg.force_reextract = true;
        let svc = service(&ctx, cfg);
        let (tx, _rx) = mpsc::channel(64);
        let result = svc.run(tx).await.unwrap();

        // The URL is unreachable, so the forced rerun records a failure row.
        assert_eq!(result.skipped, 0);
        assert_eq!(result.failed, 1);

        let after = ctx.catalog().get(&req.blog_id()).await.unwrap().unwrap();
        assert_eq!(after.extraction_quality, QualityTier::Failed);
        assert_eq!(after.content_length, 0);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(ctx.catalog().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_entries_are_retry_candidates() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir).await;
        let req = request(&format!("{}/broken", DEAD_BASE), "Broken Post");
        ctx.discovery().insert(&req).await.unwrap();
        ctx.catalog()
            .save(&catalog_row(&req, QualityTier::Failed, 0))
            .await
            .unwrap();

        let svc = service(&ctx, config(ctx.storage_dir().to_path_buf()));
        let (tx, _rx) = mpsc::channel(64);
        let result = svc.run(tx).await.unwrap();

        assert_eq!(result.skipped, 0);
        assert_eq!(result.failed, 1);
    }

    #[tokio::test]
    async fn test_max_blogs_caps_scheduling() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir).await;
        for i in 0..3 {
            let req = request(&format!("{}/post-{}", DEAD_BASE, i), &format!("Post {}", i));
            ctx.discovery().insert(&req).await.unwrap();
        }

        let mut cfg = config(ctx.storage_dir().to_path_buf());
        cfg.max_blogs = 1;
        let svc = service(&ctx, cfg);
        let (tx, rx) = mpsc::channel(64);
        let result = svc.run(tx).await.unwrap();

        assert_eq!(result.failed, 1);
        assert_eq!(ctx.catalog().count().await.unwrap(), 1);

        let events = drain(rx).await;
        let started = events
            .iter()
            .filter(|e| matches!(e, HarvestEvent::Started { .. }))
            .count();
        assert_eq!(started, 1);
    }

    #[tokio::test]
    async fn test_problematic_mode_reruns_low_and_failed_only() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir).await;
        let good = request(&format!("{}/good", DEAD_BASE), "Good Post");
        let low = request(&format!("{}/low", DEAD_BASE), "Low Post");
        let bad = request(&format!("{}/bad", DEAD_BASE), "Bad Post");
        ctx.catalog()
            .save(&catalog_row(&good, QualityTier::High, 5000))
            .await
            .unwrap();
        ctx.catalog()
            .save(&catalog_row(&low, QualityTier::Low, 800))
            .await
            .unwrap();
        ctx.catalog()
            .save(&catalog_row(&bad, QualityTier::Failed, 0))
            .await
            .unwrap();

        let mut cfg = config(ctx.storage_dir().to_path_buf());
        cfg.test_problematic = true;
        let svc = service(&ctx, cfg);
        let (tx, rx) = mpsc::channel(64);
        let result = svc.run(tx).await.unwrap();

        assert_eq!(result.failed, 2);
        assert_eq!(result.skipped, 0);

        let events = drain(rx).await;
        let started: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                HarvestEvent::Started { url, .. } => Some(url.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(started.len(), 2);
        assert!(!started.contains(&good.url.as_str()));

        let untouched = ctx.catalog().get(&good.blog_id()).await.unwrap().unwrap();
        assert_eq!(untouched.extraction_quality, QualityTier::High);
    }

    #[tokio::test]
    async fn test_unreachable_urls_get_failure_rows_not_files() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir).await;
        let a = request(&format!("{}/a", DEAD_BASE), "Post A");
        let b = request(&format!("{}/b", DEAD_BASE), "Post B");
        ctx.discovery().insert(&a).await.unwrap();
        ctx.discovery().insert(&b).await.unwrap();

        let svc = service(&ctx, config(ctx.storage_dir().to_path_buf()));
        let (tx, rx) = mpsc::channel(64);
        let result = svc.run(tx).await.unwrap();

        assert_eq!(result.failed, 2);
        assert_eq!(result.harvested, 0);
        assert_eq!(ctx.catalog().count().await.unwrap(), 2);

        let row = ctx.catalog().get(&a.blog_id()).await.unwrap().unwrap();
        assert_eq!(row.extraction_quality, QualityTier::Failed);
        assert_eq!(row.extraction_method, ExtractionMethod::None);
        assert_eq!(row.content_length, 0);
        assert!(row.text_file_path.is_none());
        assert!(row.images_dir_path.is_none());
        assert!(!storage::text_file_path(ctx.storage_dir(), &a.blog_id(), &a.title).exists());

        // Diagnostics are written for failures too.
        assert!(storage::issues_summary_path(ctx.storage_dir()).exists());
        assert!(storage::issues_path(ctx.storage_dir(), &a.blog_id()).exists());

        let events = drain(rx).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, HarvestEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_pdf_urls_skip_when_already_saved() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir).await;
        let req = request(&format!("{}/papers/attention.pdf", DEAD_BASE), "Attention");
        ctx.discovery().insert(&req).await.unwrap();
        ctx.pdfs()
            .save(&PdfEntry {
                pdf_id: req.blog_id(),
                title: req.title.clone(),
                company: req.company.clone(),
                tags: req.tags.clone(),
                year: req.year.clone(),
                url: req.url.clone(),
                file_path: PathBuf::from("/s/pdfs/x.pdf"),
                file_size: 1024,
                file_type: "pdf".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let svc = service(&ctx, config(ctx.storage_dir().to_path_buf()));
        let (tx, rx) = mpsc::channel(64);
        let result = svc.run(tx).await.unwrap();

        assert_eq!(result.skipped, 1);
        assert_eq!(result.failed, 0);

        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(
            e,
            HarvestEvent::Skipped { reason, .. } if reason.contains("pdf")
        )));
    }

    #[tokio::test]
    async fn test_pdf_urls_route_to_pdf_path() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir).await;
        let req = request(&format!("{}/papers/attention.pdf", DEAD_BASE), "Attention");
        ctx.discovery().insert(&req).await.unwrap();

        let svc = service(&ctx, config(ctx.storage_dir().to_path_buf()));
        let (tx, _rx) = mpsc::channel(64);
        let result = svc.run(tx).await.unwrap();

        // Download retries exhaust against the dead port; no article
        // extraction is attempted and no catalog row appears.
        assert_eq!(result.failed, 1);
        assert_eq!(result.pdfs, 0);
        assert_eq!(ctx.catalog().count().await.unwrap(), 0);
        assert_eq!(ctx.pdfs().count().await.unwrap(), 0);
    }
}
