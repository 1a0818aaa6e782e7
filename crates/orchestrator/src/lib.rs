//! # Batch Orchestrator
//!
//! Processes many comic pages concurrently. A controlling task owns the
//! queue and the run counters; a fixed pool of executors runs one
//! [`pipeline::Pipeline`] each on blocking threads.
//!
//! - Lazy dispatch: pause and stop are checked before every task is pulled
//! - Per-task failure isolation: a failed image never affects its siblings
//! - Progress, status and error events through a [`NotificationSink`]
//! - Optional [`QuotaGate`] consulted before a task starts
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use orchestrator::{BatchConfig, ChannelSink, Orchestrator, RunOptions};
//! use bubble_common::ProcessingMode;
//!
//! let (sink, mut events) = ChannelSink::new();
//! let orchestrator = Orchestrator::new(factory, BatchConfig::default())
//!     .with_sink(Arc::new(sink));
//!
//! orchestrator.add(["page_01.png", "page_02.png"])?;
//! orchestrator.start(RunOptions::new("output", ProcessingMode::Full))?;
//! let summary = orchestrator.wait().await?;
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod notify;
pub mod orchestrator;
pub mod quota;
pub mod run;
pub mod task;

// Re-exports for convenience
pub use config::{BatchConfig, QuotaConfig};
pub use error::{BatchError, Result};
pub use executor::Executor;
pub use notify::{BatchEvent, ChannelSink, NotificationSink, TracingSink};
pub use orchestrator::{Orchestrator, RunOptions};
pub use quota::{AllowAll, QuotaGate, QuotaStatus, UsageQuota};
pub use run::{
    BatchRun, LifecycleState, ProgressSnapshot, TaskSummary, estimate_remaining,
    select_worker_count,
};
pub use task::{Task, TaskId, TaskSpec};

#[cfg(test)]
mod tests {
    use super::*;
    use bubble_common::{ProcessingMode, RegionClass};
    use image::{Rgb, RgbImage};
    use mask::{Detection, Region, RegionMask};
    use bubble_common::BubbleRecord;
    use pipeline::{Detector, OcrEngine, Pipeline, PipelineFactory, Renderer, Translator};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc::UnboundedReceiver;

    #[derive(Clone, Copy)]
    enum Behavior {
        Normal,
        Slow(Duration),
        Panic,
    }

    struct StubDetector {
        behavior: Behavior,
    }

    impl Detector for StubDetector {
        fn detect(&self, image: &RgbImage) -> pipeline::Result<Detection> {
            match self.behavior {
                Behavior::Normal => {}
                Behavior::Slow(delay) => std::thread::sleep(delay),
                Behavior::Panic => panic!("detector crashed"),
            }
            let mask = RegionMask::from_polygon(
                image.width(),
                image.height(),
                &[[10, 10], [40, 10], [40, 30], [10, 30]],
            )?;
            let region = Region::new(RegionClass::Bubble, 0.9, mask)?;
            Ok(Detection::from_model(image.width(), image.height(), vec![region])?)
        }
    }

    struct FixedOcr;

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _crop: &RgbImage) -> pipeline::Result<String> {
            Ok("HELLO".to_string())
        }
    }

    struct EchoTranslator;

    impl Translator for EchoTranslator {
        fn translate(&self, text: &str) -> pipeline::Result<String> {
            Ok(format!("[fr] {}", text))
        }
    }

    /// Leaves pages untouched, so tests do not depend on installed fonts
    struct PlainRenderer;

    impl Renderer for PlainRenderer {
        fn clean(&self, image: &RgbImage, _regions: &[Region]) -> pipeline::Result<RgbImage> {
            Ok(image.clone())
        }

        fn draw(&self, image: &RgbImage, _records: &[BubbleRecord]) -> pipeline::Result<RgbImage> {
            Ok(image.clone())
        }
    }

    struct StubFactory {
        behavior: Behavior,
        creates: Arc<AtomicUsize>,
    }

    impl PipelineFactory for StubFactory {
        fn create(&self, _slot: usize) -> pipeline::Result<Pipeline> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Pipeline::builder()
                .detector(StubDetector {
                    behavior: self.behavior,
                })
                .ocr(FixedOcr)
                .translator(EchoTranslator)
                .renderer(PlainRenderer)
                .build()
        }
    }

    fn build_orchestrator(behavior: Behavior, config: BatchConfig) -> (Orchestrator, UnboundedReceiver<BatchEvent>, Arc<AtomicUsize>) {
        let creates = Arc::new(AtomicUsize::new(0));
        let factory = StubFactory {
            behavior,
            creates: Arc::clone(&creates),
        };
        let (sink, events) = ChannelSink::new();
        let orchestrator = Orchestrator::new(Arc::new(factory), config).with_sink(Arc::new(sink));
        (orchestrator, events, creates)
    }

    fn write_page(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(64, 48, Rgb([120, 120, 120]))
            .save(&path)
            .unwrap();
        path
    }

    fn drain(events: &mut UnboundedReceiver<BatchEvent>) -> Vec<BatchEvent> {
        let mut collected = Vec::new();
        while let Ok(event) = events.try_recv() {
            collected.push(event);
        }
        collected
    }

    #[tokio::test]
    async fn test_batch_with_one_undecodable_image() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_page(dir.path(), "a.png");
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"not an image").unwrap();
        let c = write_page(dir.path(), "c.png");
        let output = dir.path().join("out");

        let (orchestrator, mut events, _) = build_orchestrator(Behavior::Normal, BatchConfig::default());
        assert_eq!(orchestrator.add([&a, &broken, &c]).unwrap(), 3);
        orchestrator
            .start(RunOptions::new(&output, ProcessingMode::Full).with_parallelism(2))
            .expect("Should start");

        let summary = orchestrator.wait().await.expect("Should finish");
        assert_eq!(summary.state, LifecycleState::Done);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.percent, 100.0);

        let errors: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|event| match event {
                BatchEvent::Error { source, .. } => Some(source),
                _ => None,
            })
            .collect();
        assert_eq!(errors, vec![Some(broken.clone())]);

        assert!(output.join("final/a_translated.png").exists());
        assert!(output.join("translations/c.json").exists());
        assert!(!output.join("final/broken_translated.png").exists());

        let results = orchestrator.results();
        assert_eq!(results.len(), 3);
        let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].failed_at, Some(pipeline::PipelineStage::Detecting));
    }

    #[tokio::test]
    async fn test_single_image_uses_one_worker() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(dir.path(), "only.png");
        let (orchestrator, _events, creates) = build_orchestrator(Behavior::Normal, BatchConfig::default());

        orchestrator.add([page]).unwrap();
        orchestrator
            .start(RunOptions::new(dir.path().join("out"), ProcessingMode::CleanOnly))
            .unwrap();
        assert_eq!(orchestrator.progress().workers, 1);

        let summary = orchestrator.wait().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(creates.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("out/cleaned/cleaned_only.png").exists());
    }

    #[tokio::test]
    async fn test_executors_are_built_once_per_slot() {
        let dir = tempfile::tempdir().unwrap();
        let pages: Vec<_> = (0..6)
            .map(|i| write_page(dir.path(), &format!("p{}.png", i)))
            .collect();
        let (orchestrator, _events, creates) = build_orchestrator(Behavior::Normal, BatchConfig::default());

        orchestrator.add(&pages).unwrap();
        orchestrator
            .start(RunOptions::new(dir.path().join("out"), ProcessingMode::TranslateOnly).with_parallelism(2))
            .unwrap();
        let summary = orchestrator.wait().await.unwrap();

        assert_eq!(summary.processed, 6);
        assert_eq!(summary.workers, 2);
        let built = creates.load(Ordering::SeqCst);
        assert!((1..=2).contains(&built), "built {} pipelines", built);
    }

    #[tokio::test]
    async fn test_pause_holds_new_tasks_until_resume() {
        let dir = tempfile::tempdir().unwrap();
        let pages: Vec<_> = (0..3)
            .map(|i| write_page(dir.path(), &format!("p{}.png", i)))
            .collect();
        let (orchestrator, _events, _) = build_orchestrator(Behavior::Normal, BatchConfig::default());

        orchestrator.add(&pages).unwrap();
        orchestrator
            .start(RunOptions::new(dir.path().join("out"), ProcessingMode::CleanOnly))
            .unwrap();
        orchestrator.pause().expect("Should pause");
        assert!(orchestrator.pause().is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let paused = orchestrator.progress();
        assert_eq!(paused.state, LifecycleState::Paused);
        assert_eq!(paused.processed, 0);

        orchestrator.resume().expect("Should resume");
        let summary = orchestrator.wait().await.unwrap();
        assert_eq!(summary.state, LifecycleState::Done);
        assert_eq!(summary.processed, 3);
    }

    #[tokio::test]
    async fn test_stop_keeps_unstarted_tasks_queued() {
        let dir = tempfile::tempdir().unwrap();
        let pages: Vec<_> = (0..3)
            .map(|i| write_page(dir.path(), &format!("p{}.png", i)))
            .collect();
        let (orchestrator, mut events, _) = build_orchestrator(Behavior::Normal, BatchConfig::default());

        orchestrator.add(&pages).unwrap();
        orchestrator
            .start(RunOptions::new(dir.path().join("out"), ProcessingMode::CleanOnly))
            .unwrap();
        orchestrator.stop().expect("Should stop");

        let stopped = orchestrator.wait().await.unwrap();
        assert_eq!(stopped.state, LifecycleState::Stopped);
        assert_eq!(stopped.processed, 0);
        assert_eq!(orchestrator.pending_len(), 3);
        assert!(drain(&mut events).iter().any(|event| matches!(
            event,
            BatchEvent::Status {
                state: LifecycleState::Stopped,
                ..
            }
        )));

        orchestrator
            .start(RunOptions::new(dir.path().join("out"), ProcessingMode::CleanOnly))
            .expect("Should restart with the leftovers");
        let summary = orchestrator.wait().await.unwrap();
        assert_eq!(summary.state, LifecycleState::Done);
        assert_eq!(summary.processed, 3);
        assert_eq!(orchestrator.pending_len(), 0);
    }

    fn statuses(events: &mut UnboundedReceiver<BatchEvent>) -> Vec<LifecycleState> {
        drain(events)
            .into_iter()
            .filter_map(|event| match event {
                BatchEvent::Status { state, .. } => Some(state),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_status_events_follow_the_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let pages: Vec<_> = (0..2)
            .map(|i| write_page(dir.path(), &format!("p{}.png", i)))
            .collect();
        let (orchestrator, mut events, _) = build_orchestrator(Behavior::Normal, BatchConfig::default());
        let options = RunOptions::new(dir.path().join("out"), ProcessingMode::CleanOnly);

        orchestrator.add(&pages).unwrap();
        orchestrator.start(options.clone()).unwrap();
        orchestrator.stop().unwrap();
        orchestrator.wait().await.unwrap();
        assert_eq!(
            statuses(&mut events),
            vec![LifecycleState::Running, LifecycleState::Stopping, LifecycleState::Stopped]
        );

        orchestrator.start(options).unwrap();
        orchestrator.pause().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        orchestrator.resume().unwrap();
        orchestrator.wait().await.unwrap();
        assert_eq!(
            statuses(&mut events),
            vec![
                LifecycleState::Running,
                LifecycleState::Paused,
                LifecycleState::Running,
                LifecycleState::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_lifecycle_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(dir.path(), "p.png");
        let (orchestrator, _events, _) = build_orchestrator(Behavior::Normal, BatchConfig::default());
        let options = RunOptions::new(dir.path().join("out"), ProcessingMode::Full);

        assert!(matches!(orchestrator.start(options.clone()), Err(BatchError::EmptyQueue)));
        assert!(matches!(
            orchestrator.pause(),
            Err(BatchError::InvalidTransition { action: "pause", .. })
        ));
        assert!(orchestrator.resume().is_err());
        assert!(orchestrator.stop().is_err());

        orchestrator.add([&page]).unwrap();
        assert!(matches!(
            orchestrator.start(options.clone().with_parallelism(0)),
            Err(BatchError::InvalidWorkerCount(0))
        ));

        orchestrator.start(options.clone()).unwrap();
        assert!(matches!(orchestrator.start(options), Err(BatchError::Busy(_))));
        assert!(matches!(orchestrator.add([&page]), Err(BatchError::Busy(_))));
        assert!(orchestrator.clear().is_err());
        orchestrator.wait().await.unwrap();
    }

    #[test]
    fn test_start_needs_a_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(dir.path(), "p.png");
        let (orchestrator, _events, _) = build_orchestrator(Behavior::Normal, BatchConfig::default());
        orchestrator.add([page]).unwrap();

        let result = orchestrator.start(RunOptions::new(dir.path(), ProcessingMode::Full));
        assert!(matches!(result, Err(BatchError::NoRuntime)));
        assert_eq!(orchestrator.state(), LifecycleState::Idle);
    }

    #[test]
    fn test_add_filters_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(dir.path(), "page.PNG");
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "x").unwrap();
        let (orchestrator, _events, _) = build_orchestrator(Behavior::Normal, BatchConfig::default());

        let accepted = orchestrator
            .add([page.clone(), notes, dir.path().join("missing.png")])
            .unwrap();
        assert_eq!(accepted, 1);
        assert_eq!(orchestrator.progress().total, 1);

        orchestrator.add([page]).unwrap();
        let snapshot = orchestrator.progress();
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.remaining, Duration::ZERO);

        orchestrator.clear().unwrap();
        assert_eq!(orchestrator.pending_len(), 0);
    }

    struct DenyNamed(&'static str);

    impl QuotaGate for DenyNamed {
        fn admit(&self, task: &Task) -> bool {
            task.source().file_name().and_then(|n| n.to_str()) != Some(self.0)
        }
    }

    #[tokio::test]
    async fn test_quota_denied_tasks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let pages: Vec<_> = ["a.png", "b.png", "c.png"]
            .iter()
            .map(|name| write_page(dir.path(), name))
            .collect();
        let (orchestrator, mut events, _) = build_orchestrator(Behavior::Normal, BatchConfig::default());
        let orchestrator = orchestrator.with_quota(Arc::new(DenyNamed("b.png")));

        orchestrator.add(&pages).unwrap();
        orchestrator
            .start(RunOptions::new(dir.path().join("out"), ProcessingMode::CleanOnly))
            .unwrap();
        let summary = orchestrator.wait().await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert!(!drain(&mut events).iter().any(|e| matches!(e, BatchEvent::Error { .. })));
        assert!(!dir.path().join("out/cleaned/cleaned_b.png").exists());
    }

    /// Reads the file on every check, like a content-hashing quota
    struct SlowGate(Duration);

    impl QuotaGate for SlowGate {
        fn admit(&self, _task: &Task) -> bool {
            std::thread::sleep(self.0);
            true
        }
    }

    #[tokio::test]
    async fn test_quota_check_does_not_block_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(dir.path(), "p.png");
        let (orchestrator, _events, _) = build_orchestrator(Behavior::Normal, BatchConfig::default());
        let orchestrator = orchestrator.with_quota(Arc::new(SlowGate(Duration::from_millis(400))));

        orchestrator.add([page]).unwrap();
        orchestrator
            .start(RunOptions::new(dir.path().join("out"), ProcessingMode::CleanOnly))
            .unwrap();

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let woke_after = started.elapsed();
        assert!(woke_after < Duration::from_millis(300), "runtime stalled for {:?}", woke_after);

        let summary = orchestrator.wait().await.unwrap();
        assert_eq!(summary.processed, 1);
    }

    #[tokio::test]
    async fn test_task_timeout_fails_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(dir.path(), "slow.png");
        let config = BatchConfig {
            task_timeout_secs: Some(1),
            ..BatchConfig::default()
        };
        let (orchestrator, _events, _) = build_orchestrator(Behavior::Slow(Duration::from_secs(2)), config);

        orchestrator.add([page]).unwrap();
        orchestrator
            .start(RunOptions::new(dir.path().join("out"), ProcessingMode::CleanOnly))
            .unwrap();
        let summary = orchestrator.wait().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);
        let results = orchestrator.results();
        assert!(results[0].error.as_deref().unwrap_or_default().contains("timed out"));
    }

    #[tokio::test]
    async fn test_timed_out_task_never_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(dir.path(), "stalled.png");
        let output = dir.path().join("out");
        let config = BatchConfig {
            task_timeout_secs: Some(1),
            ..BatchConfig::default()
        };
        let (orchestrator, _events, _) = build_orchestrator(Behavior::Slow(Duration::from_secs(2)), config);

        orchestrator.add([page]).unwrap();
        orchestrator
            .start(RunOptions::new(&output, ProcessingMode::CleanOnly))
            .unwrap();
        let summary = orchestrator.wait().await.unwrap();
        assert_eq!(summary.failed, 1);

        // Let the abandoned pipeline run to completion
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!output.join("cleaned/cleaned_stalled.png").exists());
        assert!(!output.join("cleaned").exists());
    }

    #[tokio::test]
    async fn test_pipeline_panic_is_confined_to_its_task() {
        let dir = tempfile::tempdir().unwrap();
        let pages: Vec<_> = (0..2)
            .map(|i| write_page(dir.path(), &format!("p{}.png", i)))
            .collect();
        let (orchestrator, _events, _) = build_orchestrator(Behavior::Panic, BatchConfig::default());

        orchestrator.add(&pages).unwrap();
        orchestrator
            .start(RunOptions::new(dir.path().join("out"), ProcessingMode::Full))
            .unwrap();
        let summary = orchestrator.wait().await.unwrap();

        assert_eq!(summary.state, LifecycleState::Done);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 2);
    }
}
