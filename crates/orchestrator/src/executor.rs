use std::sync::Arc;
use std::time::{Duration, Instant};

use pipeline::{ArtifactWriter, Pipeline, PipelineFactory, PipelineResult};
use tracing::{debug, error, warn};

use crate::{run::TaskSummary, task::Task};

/// One execution slot. Owns its pipeline, built on first use and kept for
/// every later task of the slot.
pub struct Executor {
    slot: usize,
    pipeline: Option<Pipeline>,
}

impl Executor {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            pipeline: None,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Run the pipeline for one task. Blocking. Nothing is written to disk;
    /// an `Err` means the slot could not build its pipeline.
    pub fn execute(&mut self, task: &Task, factory: &dyn PipelineFactory) -> pipeline::Result<PipelineResult> {
        let pipeline = match self.pipeline.take() {
            Some(pipeline) => pipeline,
            None => {
                debug!("Building pipeline for executor {}", self.slot);
                factory.create(self.slot)?
            }
        };

        let result = pipeline.run(&task.input());
        self.pipeline = Some(pipeline);
        Ok(result)
    }
}

/// Persist a finished result and describe it. Only successful results
/// reach the disk. Blocking.
pub(crate) fn conclude(task: &Task, outcome: pipeline::Result<PipelineResult>, started: Instant) -> TaskSummary {
    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            error!("Could not build a pipeline for task {}: {}", task.id(), e);
            let mut summary = TaskSummary::failed(
                task.id(),
                task.source().to_path_buf(),
                format!("pipeline setup failed: {}", e),
            );
            summary.duration = started.elapsed();
            return summary;
        }
    };

    let mut summary = TaskSummary {
        task_id: task.id(),
        source: task.source().to_path_buf(),
        success: result.is_success(),
        stage: result.stage,
        failed_at: result.failed_at,
        error: result.error.clone(),
        records: result.records.len(),
        artifacts: Default::default(),
        duration: Duration::ZERO,
    };

    if result.is_success() {
        match ArtifactWriter::new(task.output_root()).persist(&result) {
            Ok(paths) => summary.artifacts = paths,
            Err(e) => {
                warn!("Failed to save artifacts for {}: {}", task.source().display(), e);
                summary.success = false;
                summary.error = Some(format!("saving artifacts failed: {}", e));
            }
        }
    }
    summary.duration = started.elapsed();
    summary
}

/// Run one task on a blocking thread, handing the executor back when done.
///
/// A panic inside the pipeline or an elapsed timeout fails the task and
/// returns a fresh executor for the slot. A timed-out thread is abandoned
/// and its result dropped, so it never writes artifacts.
pub(crate) async fn dispatch(
    mut executor: Executor,
    task: Task,
    factory: Arc<dyn PipelineFactory>,
    timeout: Option<Duration>,
) -> (Executor, TaskSummary) {
    let slot = executor.slot();
    let task_id = task.id();
    let source = task.source().to_path_buf();
    let started = Instant::now();

    let handle = tokio::task::spawn_blocking(move || {
        let outcome = executor.execute(&task, factory.as_ref());
        (executor, task, outcome)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("Task {} timed out after {:?}, replacing executor {}", task_id, limit, slot);
                let mut summary = TaskSummary::failed(
                    task_id,
                    source,
                    format!("timed out after {}s", limit.as_secs_f64()),
                );
                summary.duration = started.elapsed();
                return (Executor::new(slot), summary);
            }
        },
        None => handle.await,
    };

    let (executor, task, outcome) = match joined {
        Ok(done) => done,
        Err(e) => {
            error!("Executor {} panicked on task {}: {}", slot, task_id, e);
            let summary = TaskSummary::failed(task_id, source, format!("executor panicked: {}", e));
            return (Executor::new(slot), summary);
        }
    };

    let persisted = tokio::task::spawn_blocking(move || conclude(&task, outcome, started)).await;
    match persisted {
        Ok(summary) => (executor, summary),
        Err(e) => {
            error!("Saving task {} panicked: {}", task_id, e);
            let summary = TaskSummary::failed(task_id, source, format!("saving artifacts panicked: {}", e));
            (executor, summary)
        }
    }
}
