//! Pipeline orchestration.
//!
//! One coordinating task drives the run: the sampler decodes sequentially on
//! a blocking worker while every kept frame is fanned out to its own
//! analyzer task, so several analyses stay in flight while the next frame
//! decodes. Completions flow through a channel into a single collector that
//! assembles the ordered result.

use crate::events::{PipelineEvent, ProgressSink};
use crate::result::{FrameAnalysisResult, VideoAnalysisResult};
use carscan_analyze::{AnalyzeContext, FrameAnalyzer};
use carscan_cache::{BufferCache, BufferCategory, CacheConfig};
use carscan_core::{image_ops, Result, ScanError};
use carscan_media::{CancelHandle, FrameData, FrameSampler, SamplerConfig, VideoSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for one analysis pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frame sampling parameters.
    pub sampler: SamplerConfig,
    /// Memory budget for retained derived buffers.
    pub cache: CacheConfig,
    /// Retain a thumbnail for every analyzed frame.
    pub keep_thumbnails: bool,
    /// Retain a preview for frames where damage was found.
    pub preview_on_detection: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            cache: CacheConfig::default(),
            keep_thumbnails: true,
            preview_on_detection: true,
        }
    }
}

/// Orchestrates a single video analysis run.
///
/// A pipeline value drives one run: create it, call [`AnalysisPipeline::run`]
/// once, and use [`AnalysisPipeline::stop`] (or a timeout) to end the run
/// early. Cancellation is permanent for the value.
pub struct AnalysisPipeline {
    config: PipelineConfig,
    cache: Arc<BufferCache>,
    cancel: CancelHandle,
}

impl AnalysisPipeline {
    /// Create a pipeline, validating the sampler configuration.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.sampler.validate()?;
        let cache = Arc::new(BufferCache::new(config.cache));
        Ok(Self {
            config,
            cache,
            cancel: CancelHandle::new(),
        })
    }

    /// The buffer cache backing this pipeline (read-only stats surface).
    pub fn cache(&self) -> &BufferCache {
        &self.cache
    }

    /// A clonable handle onto this run's cancellation flag.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cooperatively stop the in-flight run.
    ///
    /// No further frames are dispatched to the analyzer; analyses already
    /// in flight complete and are drained into the result. Thumbnails are
    /// released since the live view is over.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.cache.cleanup_category(BufferCategory::Thumbnail);
    }

    /// Run the full pipeline over one video.
    ///
    /// Returns the assembled result, or an error when extraction itself is
    /// impossible (unreadable metadata, zero-length video). Per-frame
    /// analyzer failures are recorded inside the result instead.
    pub async fn run(
        &self,
        source: Arc<dyn VideoSource>,
        analyzer: Arc<dyn FrameAnalyzer>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<VideoAnalysisResult> {
        let run_id = Uuid::new_v4();
        let video_id = source.id().to_string();
        let sampler = FrameSampler::new(self.config.sampler.clone())?;

        // Read metadata up front so a bad container fails before any work
        // is scheduled.
        let meta = {
            let source = Arc::clone(&source);
            tokio::task::spawn_blocking(move || source.metadata())
                .await
                .map_err(|e| ScanError::Internal(format!("metadata task failed: {e}")))?
        };
        let meta = match meta {
            Ok(meta) if meta.duration_ms > 0 => meta,
            Ok(_) => {
                let err = ScanError::MetadataUnavailable(format!("zero-length video: {video_id}"));
                sink.on_event(PipelineEvent::Error {
                    message: err.to_string(),
                });
                return Err(err);
            }
            Err(err) => {
                sink.on_event(PipelineEvent::Error {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        info!(
            video = %video_id,
            run = %run_id,
            duration_ms = meta.duration_ms,
            "starting analysis run"
        );
        sink.on_event(PipelineEvent::ExtractionStarted {
            duration_ms: meta.duration_ms,
        });

        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<FrameData>();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<f32>();
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<FrameAnalysisResult>();

        // Sequential decode walk on a blocking worker.
        let sampler_task = {
            let source = Arc::clone(&source);
            let cancel = self.cancel.clone();
            tokio::task::spawn_blocking(move || {
                sampler.extract(
                    &*source,
                    &cancel,
                    |frame| {
                        let _ = frame_tx.send(frame);
                    },
                    |fraction| {
                        let _ = progress_tx.send(fraction);
                    },
                )
            })
        };

        // Forward extraction progress to the sink.
        let progress_task = {
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                while let Some(fraction) = progress_rx.recv().await {
                    sink.on_event(PipelineEvent::ExtractionProgress { fraction });
                }
            })
        };

        // Fan each kept frame out to its own analyzer task. Dropping the
        // dispatcher's `result_tx` clone last means the collector's channel
        // closes only after every in-flight analysis has finished.
        let dispatcher_task = {
            let analyzer = Arc::clone(&analyzer);
            let cache = Arc::clone(&self.cache);
            let cancel = self.cancel.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                let mut dispatched = 0usize;
                while let Some(frame) = frame_rx.recv().await {
                    if cancel.is_cancelled() {
                        // Stop submitting; the frame's buffer drops here.
                        debug!(frame = frame.frame_index, "skipping dispatch after stop");
                        continue;
                    }
                    dispatched += 1;
                    let analyzer = Arc::clone(&analyzer);
                    let cache = Arc::clone(&cache);
                    let result_tx = result_tx.clone();
                    let config = config.clone();
                    tokio::task::spawn_blocking(move || {
                        let result = analyze_frame(frame, run_id, &*analyzer, &cache, &config);
                        let _ = result_tx.send(result);
                    });
                }
                dispatched
            })
        };

        // Single collector task assembles results and reports completions.
        let collector_task = {
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                let mut results = Vec::new();
                while let Some(result) = result_rx.recv().await {
                    sink.on_event(PipelineEvent::FrameProcessed {
                        processed: results.len() + 1,
                        result: result.clone(),
                    });
                    results.push(result);
                }
                results
            })
        };

        let summary = sampler_task
            .await
            .map_err(|e| ScanError::Internal(format!("sampler task failed: {e}")))?;
        let dispatched = dispatcher_task
            .await
            .map_err(|e| ScanError::Internal(format!("dispatcher task failed: {e}")))?;
        let mut frames = collector_task
            .await
            .map_err(|e| ScanError::Internal(format!("collector task failed: {e}")))?;
        let _ = progress_task.await;

        let summary = match summary {
            Ok(summary) => summary,
            Err(err) => {
                sink.on_event(PipelineEvent::Error {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        frames.sort_by_key(|f| f.frame_index);

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            self.cache.cleanup_category(BufferCategory::Thumbnail);
        }

        let result = VideoAnalysisResult {
            video_id,
            total_detections: frames.iter().map(|f| f.detections.len()).sum(),
            total_processing_ms: frames.iter().map(|f| f.processing_time_ms).sum(),
            duration_ms: meta.duration_ms,
            error_message: cancelled.then(|| "run cancelled before completion".to_string()),
            frames,
        };

        info!(
            run = %run_id,
            frames = result.frames.len(),
            dispatched,
            sampled = summary.frames_emitted,
            detections = result.total_detections,
            cancelled,
            "analysis run finished"
        );
        sink.on_event(PipelineEvent::Completed {
            result: result.clone(),
        });
        Ok(result)
    }

    /// Run with a whole-run timeout. Expiry behaves exactly like
    /// [`AnalysisPipeline::stop`]: in-flight analyses drain, the partial
    /// result is returned with its cancellation marker set.
    pub async fn run_with_timeout(
        &self,
        source: Arc<dyn VideoSource>,
        analyzer: Arc<dyn FrameAnalyzer>,
        sink: Arc<dyn ProgressSink>,
        timeout: Duration,
    ) -> Result<VideoAnalysisResult> {
        let run = self.run(source, analyzer, sink);
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => result,
            _ = tokio::time::sleep(timeout) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "run timed out, stopping");
                self.stop();
                run.await
            }
        }
    }
}

/// Analyze one frame: derive retained buffers, invoke the analyzer, and
/// convert failures into data. The original raster drops when this returns.
fn analyze_frame(
    frame: FrameData,
    run_id: Uuid,
    analyzer: &dyn FrameAnalyzer,
    cache: &BufferCache,
    config: &PipelineConfig,
) -> FrameAnalysisResult {
    let started = Instant::now();
    let FrameData {
        frame_index,
        timestamp_ms,
        image,
        reason,
    } = frame;

    let mut thumbnail_key = None;
    if config.keep_thumbnails {
        match image_ops::thumbnail(&image) {
            Ok(thumb) => {
                let key = format!("{run_id}/f{frame_index}/thumb");
                cache.register(key.clone(), thumb, BufferCategory::Thumbnail, frame_index);
                thumbnail_key = Some(key);
            }
            Err(e) => warn!(frame = frame_index, error = %e, "thumbnail derivation failed"),
        }
    }

    let ctx = AnalyzeContext {
        run_id,
        frame_index,
        timestamp_ms,
    };

    match analyzer.analyze(&image, &ctx) {
        Ok(detections) => {
            let mut preview_key = None;
            if config.preview_on_detection && !detections.is_empty() {
                match image_ops::preview(&image) {
                    Ok(preview) => {
                        let key = format!("{run_id}/f{frame_index}/preview");
                        cache.register(key.clone(), preview, BufferCategory::Preview, frame_index);
                        preview_key = Some(key);
                    }
                    Err(e) => warn!(frame = frame_index, error = %e, "preview derivation failed"),
                }
            }
            FrameAnalysisResult {
                frame_index,
                timestamp_ms,
                detections,
                processing_time_ms: started.elapsed().as_millis() as u64,
                reason,
                error_message: None,
                thumbnail_key,
                preview_key,
            }
        }
        Err(e) => {
            warn!(frame = frame_index, error = %e, "frame analysis failed");
            FrameAnalysisResult {
                frame_index,
                timestamp_ms,
                detections: Vec::new(),
                processing_time_ms: started.elapsed().as_millis() as u64,
                reason,
                error_message: Some(e.to_string()),
                thumbnail_key,
                preview_key: None,
            }
        }
    }
}

/// Convenience entry point: run one video through a default-configured
/// pipeline.
pub async fn run_pipeline(
    source: Arc<dyn VideoSource>,
    analyzer: Arc<dyn FrameAnalyzer>,
    sink: Arc<dyn ProgressSink>,
) -> Result<VideoAnalysisResult> {
    AnalysisPipeline::new(PipelineConfig::default())?
        .run(source, analyzer, sink)
        .await
}
