//! Cache behavior under realistic pipeline pressure.

use carscan_analyze::ScriptedAnalyzer;
use carscan_cache::{BufferCache, BufferCategory, CacheConfig};
use carscan_core::FrameBuffer;
use carscan_media::ScriptedVideoSource;
use carscan_pipeline::{AnalysisPipeline, NullSink, PipelineConfig};
use std::sync::Arc;

const MB: usize = 1024 * 1024;

/// 2048x2560 RGBA8 is exactly 20 MiB.
fn frame_20mb() -> FrameBuffer {
    FrameBuffer::solid(2048, 2560, 80, 80, 80)
}

#[test]
fn registration_pressure_triggers_automatic_cleanup() {
    // Five 20 MiB thumbnails against an 80 MiB threshold: the fifth
    // registration crosses the threshold and cleanup must bring usage to
    // 56 MiB (0.7 x 80) or below before register returns.
    let cache = BufferCache::new(CacheConfig {
        max_bytes: 100 * MB,
        cleanup_threshold_bytes: 80 * MB,
        ..Default::default()
    });

    for i in 0..4u32 {
        cache.register(
            format!("f{i}/thumb"),
            frame_20mb(),
            BufferCategory::Thumbnail,
            i,
        );
        assert_eq!(cache.total_bytes(), (i as usize + 1) * 20 * MB);
    }

    cache.register("f4/thumb", frame_20mb(), BufferCategory::Thumbnail, 4);
    assert!(cache.total_bytes() <= 56 * MB);
    assert!(!cache.is_critical());
}

#[test]
fn concurrent_registration_keeps_the_ledger_exact() {
    // Many threads register and unregister concurrently; the byte total
    // must match the surviving entries exactly — no lost updates.
    let cache = Arc::new(BufferCache::with_defaults());
    let threads: Vec<_> = (0..8u32)
        .map(|t| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..16u32 {
                    let key = format!("t{t}/f{i}");
                    let frame = FrameBuffer::solid(64, 64, t as u8, 0, 0);
                    cache.register(key.clone(), frame, BufferCategory::Thumbnail, i);
                    if i % 2 == 0 {
                        assert!(cache.unregister(&key));
                    }
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.total_buffers, 8 * 8);
    let per_buffer = FrameBuffer::solid(64, 64, 0, 0, 0).memory_size();
    assert_eq!(cache.total_bytes(), 8 * 8 * per_buffer);
}

#[tokio::test]
async fn pipeline_survives_a_starved_cache() {
    // A budget too small for even one thumbnail: every registration gets
    // evicted straight away, and the run still completes normally —
    // memory pressure is never an error.
    let config = PipelineConfig {
        cache: CacheConfig {
            max_bytes: 4096,
            cleanup_threshold_bytes: 2048,
            ..Default::default()
        },
        ..Default::default()
    };
    let pipeline = AnalysisPipeline::new(config).unwrap();
    let source = ScriptedVideoSource::new("walkaround.mp4", 65_000, 320, 240);

    let result = pipeline
        .run(
            Arc::new(source),
            Arc::new(ScriptedAnalyzer::new()),
            Arc::new(NullSink),
        )
        .await
        .unwrap();

    assert_eq!(result.frames.len(), 3);
    assert!(result.error_message.is_none());
    assert!(pipeline.cache().total_bytes() <= 4096);
}
