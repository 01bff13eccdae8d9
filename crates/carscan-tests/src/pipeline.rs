//! End-to-end pipeline scenarios.
//!
//! Exercises cross-crate interactions between carscan-media,
//! carscan-analyze, carscan-cache and carscan-pipeline.

use carscan_analyze::{
    AnalyzeContext, AnalyzeResult, DamageType, Detection, FrameAnalyzer, ScriptedAnalyzer,
    Severity,
};
use carscan_core::{FrameBuffer, Rect, Result, ScanError};
use carscan_media::{
    CancelHandle, ExtractionReason, ScriptedVideoSource, VideoMetadata, VideoSource,
};
use carscan_pipeline::{
    run_pipeline, AnalysisPipeline, ChannelSink, NullSink, PipelineConfig, PipelineEvent,
    VideoAnalysisResult,
};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

fn scratch(confidence: f32) -> Detection {
    Detection {
        damage_type: DamageType::Scratch,
        confidence,
        bbox: Rect::new(12.0, 8.0, 40.0, 24.0),
        severity: Severity::Minor,
    }
}

async fn run_default(
    source: ScriptedVideoSource,
    analyzer: ScriptedAnalyzer,
) -> Result<VideoAnalysisResult> {
    run_pipeline(Arc::new(source), Arc::new(analyzer), Arc::new(NullSink)).await
}

// ── Sampling through the full pipeline ─────────────────────────

#[tokio::test]
async fn static_video_samples_on_interval_boundaries() {
    // 65s at the default 30s interval, no visual change: exactly the
    // frames at 0, 30000 and 60000 survive sampling.
    let source = ScriptedVideoSource::new("walkaround.mp4", 65_000, 320, 240);
    let result = run_default(source, ScriptedAnalyzer::new()).await.unwrap();

    let kept: Vec<(u64, ExtractionReason)> = result
        .frames
        .iter()
        .map(|f| (f.timestamp_ms, f.reason))
        .collect();
    assert_eq!(
        kept,
        vec![
            (0, ExtractionReason::FirstFrame),
            (30_000, ExtractionReason::TimeInterval),
            (60_000, ExtractionReason::TimeInterval),
        ]
    );
    assert_eq!(result.duration_ms, 65_000);
    assert!(result.error_message.is_none());
}

#[tokio::test]
async fn analyzer_failure_stays_per_frame() {
    // Five frames (0-120s on 30s boundaries); the analyzer fails for
    // frame 2. The run still completes with all five results.
    let source = ScriptedVideoSource::new("walkaround.mp4", 125_000, 320, 240);
    let analyzer = ScriptedAnalyzer::new()
        .with_detections(0, vec![scratch(0.91)])
        .with_detections(1, vec![scratch(0.88)])
        .with_failure(2, "model timeout")
        .with_detections(3, vec![scratch(0.79)])
        .with_detections(4, vec![scratch(0.85)]);

    let result = run_default(source, analyzer).await.unwrap();

    assert_eq!(result.frames.len(), 5);
    let failed = &result.frames[2];
    assert_eq!(failed.frame_index, 2);
    assert!(failed.detections.is_empty());
    assert!(failed
        .error_message
        .as_deref()
        .unwrap()
        .contains("model timeout"));
    for frame in result.frames.iter().filter(|f| f.frame_index != 2) {
        assert!(frame.error_message.is_none());
        assert_eq!(frame.detections.len(), 1);
    }
    assert_eq!(result.total_detections, 4);
}

#[tokio::test]
async fn unreadable_video_never_yields_a_partial_result() {
    let source = ScriptedVideoSource::new("corrupt.mp4", 60_000, 64, 64).with_metadata_failure();
    let (sink, rx) = ChannelSink::new();
    let result = run_pipeline(
        Arc::new(source),
        Arc::new(ScriptedAnalyzer::new()),
        Arc::new(sink),
    )
    .await;

    assert!(matches!(result, Err(ScanError::MetadataUnavailable(_))));
    let events: Vec<PipelineEvent> = rx.try_iter().collect();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], PipelineEvent::Error { .. }));
}

// ── Event stream contract ──────────────────────────────────────

#[tokio::test]
async fn event_stream_brackets_the_run() {
    let source = ScriptedVideoSource::new("walkaround.mp4", 65_000, 320, 240)
        .with_scene_change_at(15_000, [250, 250, 250]);
    let (sink, rx) = ChannelSink::new();
    let result = run_pipeline(
        Arc::new(source),
        Arc::new(ScriptedAnalyzer::new()),
        Arc::new(sink),
    )
    .await
    .unwrap();

    let events: Vec<PipelineEvent> = rx.try_iter().collect();
    assert!(matches!(
        events.first(),
        Some(PipelineEvent::ExtractionStarted { duration_ms: 65_000 })
    ));
    assert!(matches!(events.last(), Some(PipelineEvent::Completed { .. })));

    let fractions: Vec<f32> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::ExtractionProgress { fraction } => Some(*fraction),
            _ => None,
        })
        .collect();
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(fractions.last().copied(), Some(1.0));

    let processed: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::FrameProcessed { processed, .. } => Some(*processed),
            _ => None,
        })
        .collect();
    assert_eq!(processed.len(), result.frames.len());
    assert_eq!(processed, (1..=result.frames.len()).collect::<Vec<_>>());
}

// ── Cancellation ───────────────────────────────────────────────

/// Video source whose decodes past t=0 wait for a permit, so the test
/// controls exactly when the sampler advances.
struct GatedSource {
    inner: ScriptedVideoSource,
    gate: crossbeam_channel::Receiver<()>,
}

impl VideoSource for GatedSource {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn metadata(&self) -> Result<VideoMetadata> {
        self.inner.metadata()
    }

    fn decode_frame_near(&self, timestamp_ms: u64) -> Result<FrameBuffer> {
        if timestamp_ms > 0 {
            let _ = self.gate.recv();
        }
        self.inner.decode_frame_near(timestamp_ms)
    }
}

/// Analyzer that stops the pipeline from inside its first call — the call
/// itself is "in flight" at the moment of cancellation.
struct CancellingAnalyzer {
    cancel: CancelHandle,
    gate: crossbeam_channel::Sender<()>,
}

impl FrameAnalyzer for CancellingAnalyzer {
    fn analyze(&self, _frame: &FrameBuffer, ctx: &AnalyzeContext) -> AnalyzeResult<Vec<Detection>> {
        if ctx.frame_index == 0 {
            self.cancel.cancel();
            let _ = self.gate.send(());
        }
        Ok(vec![scratch(0.9)])
    }
}

#[tokio::test]
async fn stop_prevents_new_dispatch_but_drains_in_flight_work() {
    let pipeline = AnalysisPipeline::new(PipelineConfig::default()).unwrap();
    let (gate_tx, gate_rx) = crossbeam_channel::unbounded();

    let source = GatedSource {
        inner: ScriptedVideoSource::new("walkaround.mp4", 600_000, 320, 240),
        gate: gate_rx,
    };
    let analyzer = CancellingAnalyzer {
        cancel: pipeline.cancel_handle(),
        gate: gate_tx,
    };

    let result = pipeline
        .run(Arc::new(source), Arc::new(analyzer), Arc::new(NullSink))
        .await
        .unwrap();

    // The in-flight analysis of frame 0 completed and was incorporated;
    // nothing after it was ever dispatched.
    assert_eq!(result.frames.len(), 1);
    assert_eq!(result.frames[0].frame_index, 0);
    assert_eq!(result.frames[0].detections.len(), 1);
    assert!(result.error_message.is_some());

    // Cancellation reclaims thumbnail-category buffers.
    assert_eq!(pipeline.cache().stats().thumbnail_count, 0);
}

#[tokio::test]
async fn timeout_behaves_like_stop() {
    let pipeline = AnalysisPipeline::new(PipelineConfig::default()).unwrap();
    let (gate_tx, gate_rx) = crossbeam_channel::unbounded();

    // The gate opens only once the timeout has fired stop(), so the walk
    // can never outrun the timeout.
    let cancel = pipeline.cancel_handle();
    let unblocker = std::thread::spawn(move || {
        while !cancel.is_cancelled() {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let _ = gate_tx.send(());
    });

    let source = GatedSource {
        inner: ScriptedVideoSource::new("walkaround.mp4", 600_000, 320, 240),
        gate: gate_rx,
    };

    let result = pipeline
        .run_with_timeout(
            Arc::new(source),
            Arc::new(ScriptedAnalyzer::new()),
            Arc::new(NullSink),
            std::time::Duration::from_millis(200),
        )
        .await
        .unwrap();
    unblocker.join().unwrap();

    assert!(result.error_message.is_some());
    assert_eq!(result.frames.len(), 1);
}

// ── Reports ────────────────────────────────────────────────────

#[tokio::test]
async fn analysis_report_roundtrips_through_json() {
    let source = ScriptedVideoSource::new("walkaround.mp4", 65_000, 320, 240);
    let analyzer = ScriptedAnalyzer::new().with_detections(1, vec![scratch(0.93)]);
    let result = run_default(source, analyzer).await.unwrap();

    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let path = dir.path().join("report.json");
    let file = std::fs::File::create(&path).unwrap();
    serde_json::to_writer_pretty(file, &result).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let back: VideoAnalysisResult = serde_json::from_str(&raw).unwrap();
    assert_eq!(back.video_id, "walkaround.mp4");
    assert_eq!(back.frames.len(), result.frames.len());
    assert_eq!(back.total_detections, 1);
    assert_eq!(back.peak_severity(), Some(Severity::Minor));
}
