//! Batch orchestration
//!
//! Every image of a batch runs as its own task. On a cache miss the heatmap
//! extraction (bounded CV pool) and the report request (service pool) run
//! together and are both awaited before validation, classification and
//! caching. Whatever goes wrong inside one image's task ends up in that
//! image's slot; the batch always completes.

use super::cache::{CacheStats, ScanCache};
use super::mime::resolve_mime;
use super::parser::parse_scan_report;
use super::types::{
    AnalysisResult, BatchResponse, ClassificationResult, CombinedArtifact, ImageOutcome, Organ,
    ResultSource, ScanBatch, ScanRequest,
};
use super::validator::ScanPolicy;
use crate::ai::{ScanAnalyst, TumorClassifier};
use crate::config::ScanSageConfig;
use crate::error::{BatchError, ScanError};
use crate::vision::{self, RegionExtraction};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-batch controller. Cheap to clone; clones share pools and cache.
#[derive(Clone)]
pub struct ScanOrchestrator {
    cache: Arc<ScanCache>,
    analyst: Arc<dyn ScanAnalyst>,
    classifier: Arc<dyn TumorClassifier>,
    cv_pool: Arc<Semaphore>,
    cv_gauge: Arc<PoolGauge>,
    service_pool: Arc<Semaphore>,
    policy: Arc<ScanPolicy>,
}

/// Snapshot of CV pool activity since the orchestrator was built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub in_flight: usize,
    pub peak: usize,
    pub completed: usize,
}

#[derive(Debug, Default)]
struct PoolGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
}

impl PoolGauge {
    fn enter(&self) -> GaugeGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self)
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            in_flight: self.active.load(Ordering::SeqCst),
            peak: self.peak.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
        }
    }
}

struct GaugeGuard<'a>(&'a PoolGauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
        self.0.completed.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScanOrchestrator {
    pub fn new(
        config: &ScanSageConfig,
        analyst: Arc<dyn ScanAnalyst>,
        classifier: Arc<dyn TumorClassifier>,
    ) -> Self {
        let cache = Arc::new(ScanCache::new(config.cache_max_size, config.cache_ttl));
        Self::with_cache(config, cache, analyst, classifier)
    }

    /// Build around an existing cache, e.g. one shared with another orchestrator
    pub fn with_cache(
        config: &ScanSageConfig,
        cache: Arc<ScanCache>,
        analyst: Arc<dyn ScanAnalyst>,
        classifier: Arc<dyn TumorClassifier>,
    ) -> Self {
        Self {
            cache,
            analyst,
            classifier,
            cv_pool: Arc::new(Semaphore::new(config.cv_workers.max(1))),
            cv_gauge: Arc::new(PoolGauge::default()),
            service_pool: Arc::new(Semaphore::new(config.service_concurrency.max(1))),
            policy: Arc::new(config.policy()),
        }
    }

    pub fn cache(&self) -> &ScanCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Extractions running now, the most ever running at once, and the total
    pub fn cv_stats(&self) -> PoolStats {
        self.cv_gauge.stats()
    }

    #[cfg(test)]
    pub(crate) fn cv_pool(&self) -> &Semaphore {
        &self.cv_pool
    }

    /// Close both worker pools. Work already holding a slot finishes;
    /// anything that needs a slot afterwards fails with [`ScanError::ShutDown`].
    pub fn shutdown(&self) {
        self.cv_pool.close();
        self.service_pool.close();
        info!("Scan orchestrator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.cv_pool.is_closed()
    }

    /// Process every image of a batch and answer its shared message.
    ///
    /// Returns one outcome per non-empty image, in input order.
    pub async fn process_batch(&self, batch: ScanBatch) -> Result<BatchResponse, BatchError> {
        let batch_id = Uuid::new_v4();
        let question: Option<Arc<str>> = batch.question().map(Arc::from);

        let submitted = batch.images.len();
        let images: Vec<ScanRequest> = batch.images.into_iter().filter(|r| !r.is_empty()).collect();
        if images.is_empty() && question.is_none() {
            return Err(BatchError::EmptyRequest);
        }

        let started = Instant::now();
        info!(
            %batch_id,
            images = images.len(),
            dropped = submitted - images.len(),
            has_message = question.is_some(),
            "Processing scan batch"
        );

        let tasks = images.into_iter().map(|request| {
            let this = self.clone();
            let question = question.clone();
            let filename = request.filename.clone();
            let handle = tokio::spawn(async move {
                this.process_image(request, question.as_deref(), batch_id).await
            });
            async move {
                // A panicked task still owns exactly one slot
                handle.await.unwrap_or_else(|e| {
                    warn!(%batch_id, filename = %filename, "Image task aborted: {}", e);
                    ImageOutcome::failed(filename, &ScanError::Worker(e.to_string()))
                })
            }
        });
        let image_analysis = futures::future::join_all(tasks).await;

        let (message, message_error) = match question.as_deref() {
            None => (String::new(), None),
            Some(q) => match answer_from_outcomes(&image_analysis) {
                Some(answer) => (answer, None),
                None => match self.answer_question(q).await {
                    Ok(answer) => (answer, None),
                    Err(e) => {
                        warn!(%batch_id, "Text-only answer failed: {}", e);
                        (String::new(), Some(e.to_string()))
                    }
                },
            },
        };

        let succeeded = image_analysis.iter().filter(|o| o.is_success()).count();
        info!(
            %batch_id,
            succeeded,
            failed = image_analysis.len() - succeeded,
            cv_peak = self.cv_gauge.stats().peak,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan batch complete"
        );

        Ok(BatchResponse {
            batch_id,
            message,
            message_error,
            image_analysis,
        })
    }

    async fn process_image(
        &self,
        request: ScanRequest,
        question: Option<&str>,
        batch_id: Uuid,
    ) -> ImageOutcome {
        match self.run_pipeline(&request, question).await {
            Ok((analysis, source)) => {
                debug!(%batch_id, filename = %request.filename, ?source, "Image done");
                ImageOutcome::Success {
                    filename: request.filename,
                    analysis,
                    source,
                }
            }
            Err(e) => {
                warn!(%batch_id, filename = %request.filename, "Image failed: {}", e);
                ImageOutcome::failed(request.filename, &e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &ScanRequest,
        question: Option<&str>,
    ) -> Result<(Arc<CombinedArtifact>, ResultSource), ScanError> {
        if self.is_shut_down() {
            return Err(ScanError::ShutDown);
        }

        if let Some(hit) = self.cache.get(&request.data) {
            return Ok((hit, ResultSource::Cache));
        }

        let mime = resolve_mime(request);
        let (regions, report) = tokio::join!(
            self.run_extraction(Arc::clone(&request.data)),
            self.run_report(&request.data, &mime, question),
        );
        let regions = regions?;
        let report = report?;

        let analysis = parse_scan_report(&report);
        if !self.policy.is_medical_scan(&analysis) {
            return Err(ScanError::NotMedicalScan);
        }

        let organ = self.policy.resolve_organ(&analysis);
        let prediction = self.run_classifier(&request.data, organ).await?;

        let artifact = Arc::new(CombinedArtifact {
            llm_analysis: analysis,
            tumor_prediction: Some(prediction),
            heatmap: regions.heatmap,
            roi: regions.roi,
        });
        self.cache.set(&request.data, Arc::clone(&artifact));

        Ok((artifact, ResultSource::Processed))
    }

    async fn cv_permit(&self) -> Result<SemaphorePermit<'_>, ScanError> {
        self.cv_pool.acquire().await.map_err(|_| ScanError::ShutDown)
    }

    async fn service_permit(&self) -> Result<SemaphorePermit<'_>, ScanError> {
        self.service_pool.acquire().await.map_err(|_| ScanError::ShutDown)
    }

    async fn run_extraction(&self, data: Arc<[u8]>) -> Result<RegionExtraction, ScanError> {
        let _permit = self.cv_permit().await?;
        let gauge = Arc::clone(&self.cv_gauge);
        tokio::task::spawn_blocking(move || {
            let _running = gauge.enter();
            vision::extract_regions(&data)
        })
            .await
            .map_err(|e| ScanError::Worker(e.to_string()))?
    }

    async fn run_report(
        &self,
        data: &[u8],
        mime: &str,
        question: Option<&str>,
    ) -> Result<String, ScanError> {
        let _permit = self.service_permit().await?;
        self.analyst.analyze_scan(data, mime, question).await
    }

    async fn run_classifier(&self, data: &[u8], organ: Organ) -> Result<ClassificationResult, ScanError> {
        let _permit = self.service_permit().await?;
        self.classifier.classify(data, organ).await
    }

    async fn answer_question(&self, question: &str) -> Result<String, ScanError> {
        let _permit = self.service_permit().await?;
        self.analyst.chat(question).await
    }

    /// Report only: one analysis request, parsed. Bypasses the cache.
    pub async fn analyze(
        &self,
        request: &ScanRequest,
        message: Option<&str>,
    ) -> Result<AnalysisResult, ScanError> {
        ensure_image(&request.data)?;
        let mime = resolve_mime(request);
        let report = self.run_report(&request.data, &mime, message).await?;
        Ok(parse_scan_report(&report))
    }

    /// Heatmap and ROI only, on the CV pool. Bypasses the cache.
    pub async fn extract_regions(&self, data: Arc<[u8]>) -> Result<RegionExtraction, ScanError> {
        ensure_image(&data)?;
        self.run_extraction(data).await
    }

    /// Classification only, with an explicit organ. Bypasses the cache.
    pub async fn predict(&self, data: &[u8], organ: Organ) -> Result<ClassificationResult, ScanError> {
        ensure_image(data)?;
        self.run_classifier(data, organ).await
    }
}

fn ensure_image(data: &[u8]) -> Result<(), ScanError> {
    if data.is_empty() {
        return Err(ScanError::Decode("empty image".to_string()));
    }
    Ok(())
}

/// First non-empty direct answer from a freshly processed image
fn answer_from_outcomes(outcomes: &[ImageOutcome]) -> Option<String> {
    outcomes
        .iter()
        .filter(|o| o.source() == Some(ResultSource::Processed))
        .filter_map(|o| o.analysis())
        .filter_map(|a| a.llm_analysis.llm_response.as_deref())
        .find(|r| !r.trim().is_empty())
        .map(str::to_string)
}
