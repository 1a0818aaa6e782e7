use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bubble_common::{ProcessingMode, utils};
use pipeline::PipelineFactory;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::{
    config::BatchConfig,
    error::{BatchError, Result},
    executor::{Executor, dispatch},
    notify::{BatchEvent, NotificationSink, TracingSink},
    quota::{AllowAll, QuotaGate},
    run::{BatchRun, LifecycleState, ProgressSnapshot, TaskSummary, select_worker_count},
    task::{Task, TaskId, TaskSpec},
};

/// Per-run options given to [`Orchestrator::start`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub output_root: PathBuf,
    pub mode: ProcessingMode,
    /// Overrides the configured parallel degree
    pub parallelism: Option<usize>,
}

impl RunOptions {
    pub fn new(output_root: impl Into<PathBuf>, mode: ProcessingMode) -> Self {
        Self {
            output_root: output_root.into(),
            mode,
            parallelism: None,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }
}

/// Signal from the public API to the controlling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Stop,
}

#[derive(Default)]
struct Shared {
    pending: VecDeque<TaskSpec>,
    run: BatchRun,
    results: Vec<TaskSummary>,
}

/// Everything the controlling loop needs, cloned out of the orchestrator
struct RunContext {
    shared: Arc<Mutex<Shared>>,
    factory: Arc<dyn PipelineFactory>,
    sink: Arc<dyn NotificationSink>,
    quota: Arc<dyn QuotaGate>,
    config: BatchConfig,
}

impl RunContext {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs queued images through per-slot pipelines with pause, resume and stop.
///
/// Public methods only touch shared state under a lock; the queue of a
/// started run and all counter updates belong to one controlling task.
pub struct Orchestrator {
    shared: Arc<Mutex<Shared>>,
    factory: Arc<dyn PipelineFactory>,
    sink: Arc<dyn NotificationSink>,
    quota: Arc<dyn QuotaGate>,
    config: BatchConfig,
    control: Mutex<Option<watch::Sender<Control>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl Orchestrator {
    pub fn new(factory: Arc<dyn PipelineFactory>, config: BatchConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            factory,
            sink: Arc::new(TracingSink),
            quota: Arc::new(AllowAll),
            config,
            control: Mutex::new(None),
            handle: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_quota(mut self, quota: Arc<dyn QuotaGate>) -> Self {
        self.quota = quota;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue image files. Missing files and unsupported formats are dropped
    /// with a warning. Counters reset to the new queue size.
    pub fn add<I, P>(&self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.add_tasks(paths.into_iter().map(TaskSpec::new))
    }

    /// Queue prepared entries, e.g. images with edited outlines
    pub fn add_tasks<I>(&self, specs: I) -> Result<usize>
    where
        I: IntoIterator<Item = TaskSpec>,
    {
        let mut shared = self.lock();
        if shared.run.state.is_active() {
            return Err(BatchError::Busy(shared.run.state));
        }

        let mut accepted = 0;
        for spec in specs {
            if !spec.source.is_file() {
                warn!("Skipping {}: file not found", spec.source.display());
                continue;
            }
            if !utils::is_supported_image(&spec.source) {
                warn!("Skipping {}: unsupported format", spec.source.display());
                continue;
            }
            shared.pending.push_back(spec);
            accepted += 1;
        }

        let queued = shared.pending.len();
        shared.run.reset(queued);
        shared.results.clear();
        info!("📥 Added {} images ({} queued)", accepted, queued);
        Ok(accepted)
    }

    /// Empty the queue
    pub fn clear(&self) -> Result<()> {
        let mut shared = self.lock();
        if shared.run.state.is_active() {
            return Err(BatchError::Busy(shared.run.state));
        }
        shared.pending.clear();
        shared.run.reset(0);
        shared.results.clear();
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().run.state
    }

    /// Start processing the queue. Needs a tokio runtime.
    pub fn start(&self, options: RunOptions) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BatchError::NoRuntime)?;
        let parallelism = options.parallelism.unwrap_or(self.config.parallelism);
        if parallelism == 0 {
            return Err(BatchError::InvalidWorkerCount(parallelism));
        }

        let (queue, workers) = {
            let mut shared = self.lock();
            if shared.run.state.is_active() {
                return Err(BatchError::Busy(shared.run.state));
            }
            if shared.pending.is_empty() {
                return Err(BatchError::EmptyQueue);
            }

            let queue: VecDeque<Task> = shared
                .pending
                .drain(..)
                .map(|spec| {
                    let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
                    Task::new(id, spec, options.mode, options.output_root.clone())
                })
                .collect();
            let workers = select_worker_count(queue.len(), parallelism);
            shared.run.begin(queue.len(), workers);
            shared.results.clear();
            (queue, workers)
        };

        info!(
            "🚀 Starting batch of {} images in {} mode with {} workers",
            queue.len(),
            options.mode,
            workers
        );

        let (control_tx, control_rx) = watch::channel(Control::Run);
        *self.control.lock().unwrap_or_else(PoisonError::into_inner) = Some(control_tx);

        let context = RunContext {
            shared: Arc::clone(&self.shared),
            factory: Arc::clone(&self.factory),
            sink: Arc::clone(&self.sink),
            quota: Arc::clone(&self.quota),
            config: self.config.clone(),
        };
        let handle = runtime.spawn(drive(context, queue, workers, control_rx));
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Stop pulling new tasks; in-flight tasks finish.
    ///
    /// Lifecycle methods only validate, update the state and signal the
    /// controlling loop, which emits the matching status event.
    pub fn pause(&self) -> Result<()> {
        self.transition("pause", LifecycleState::Running, LifecycleState::Paused, Control::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.transition("resume", LifecycleState::Paused, LifecycleState::Running, Control::Run)
    }

    /// End the run once in-flight tasks finish; unstarted tasks stay queued
    pub fn stop(&self) -> Result<()> {
        let from = self.state();
        if !matches!(from, LifecycleState::Running | LifecycleState::Paused) {
            return Err(BatchError::InvalidTransition {
                action: "stop",
                state: from,
            });
        }
        self.transition("stop", from, LifecycleState::Stopping, Control::Stop)
    }

    fn transition(
        &self,
        action: &'static str,
        from: LifecycleState,
        to: LifecycleState,
        signal: Control,
    ) -> Result<()> {
        let mut shared = self.lock();
        if shared.run.state != from {
            return Err(BatchError::InvalidTransition {
                action,
                state: shared.run.state,
            });
        }
        shared.run.state = to;

        // Signalled under the lock so the loop never observes a stale state
        if let Some(control) = self.control.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            control.send_replace(signal);
        }
        info!("Batch {}", to);
        Ok(())
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.lock().run.snapshot()
    }

    /// Summaries of the tasks finished in the current run, in completion order
    pub fn results(&self) -> Vec<TaskSummary> {
        self.lock().results.clone()
    }

    /// Wait for the current run to end and return the final snapshot
    pub async fn wait(&self) -> Result<ProgressSnapshot> {
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| BatchError::Join(e.to_string()))?;
        }
        Ok(self.progress())
    }
}

/// The controlling loop: pulls tasks lazily, checks pause and stop before
/// every dispatch, and funnels every result through one place.
async fn drive(
    context: RunContext,
    mut queue: VecDeque<Task>,
    workers: usize,
    mut control: watch::Receiver<Control>,
) {
    let timeout = context.config.task_timeout();
    let mut idle: Vec<Executor> = (0..workers).rev().map(Executor::new).collect();
    let mut in_flight: JoinSet<(Executor, TaskSummary)> = JoinSet::new();
    let mut control_open = true;

    context.sink.notify(BatchEvent::Status {
        state: LifecycleState::Running,
        message: format!("Processing {} images", queue.len()),
    });
    let mut signal = *control.borrow_and_update();
    if signal != Control::Run {
        announce(&context);
    }

    loop {
        if signal == Control::Run {
            while !idle.is_empty() {
                let Some(task) = queue.pop_front() else {
                    break;
                };
                if !admit(&context, &task).await {
                    skip(&context, &task);
                    continue;
                }
                let Some(executor) = idle.pop() else {
                    queue.push_front(task);
                    break;
                };

                debug!("Dispatching task {} to executor {}", task.id(), executor.slot());
                {
                    let mut shared = context.lock();
                    shared.run.current_task = Some(task.id());
                    shared.run.current_source = Some(task.source().to_path_buf());
                }
                in_flight.spawn(dispatch(executor, task, Arc::clone(&context.factory), timeout));
            }
        }

        if in_flight.is_empty() && (queue.is_empty() || signal == Control::Stop) {
            break;
        }

        tokio::select! {
            joined = in_flight.join_next(), if !in_flight.is_empty() => match joined {
                Some(Ok((executor, summary))) => {
                    record(&context, summary);
                    idle.push(executor);
                }
                Some(Err(e)) => {
                    in_flight.abort_all();
                    fail_run(&context, queue, format!("dispatch failed: {}", e));
                    return;
                }
                None => {}
            },
            changed = control.changed(), if control_open => {
                if changed.is_err() {
                    // Orchestrator dropped: wind down as if stopped
                    control_open = false;
                    signal = Control::Stop;
                } else {
                    let observed = *control.borrow_and_update();
                    if observed != signal {
                        signal = observed;
                        announce(&context);
                    }
                }
            }
            else => break,
        }
    }

    finish_run(&context, queue, signal == Control::Stop);
}

/// Consult the quota gate on a blocking thread; gates may read and hash files
async fn admit(context: &RunContext, task: &Task) -> bool {
    let quota = Arc::clone(&context.quota);
    let candidate = task.clone();
    match tokio::task::spawn_blocking(move || quota.admit(&candidate)).await {
        Ok(admitted) => admitted,
        Err(e) => {
            warn!("Quota check for {} panicked: {}", task.source().display(), e);
            false
        }
    }
}

/// Report the lifecycle state set by the last public transition
fn announce(context: &RunContext) {
    let state = context.lock().run.state;
    context.sink.notify(BatchEvent::Status {
        state,
        message: format!("Batch {}", state),
    });
}

/// The single place where task outcomes reach the counters
fn record(context: &RunContext, summary: TaskSummary) {
    let (snapshot, failure) = {
        let mut shared = context.lock();
        shared.run.processed += 1;
        let failure = (!summary.success).then(|| {
            (
                summary.source.clone(),
                summary.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            )
        });
        if failure.is_some() {
            shared.run.failed += 1;
        }
        shared.results.push(summary);
        (shared.run.snapshot(), failure)
    };

    if let Some((source, detail)) = failure {
        warn!("❌ {} failed: {}", source.display(), detail);
        context.sink.notify(BatchEvent::Error {
            source: Some(source),
            detail,
        });
    }
    context.sink.notify(BatchEvent::Progress(snapshot));
}

fn skip(context: &RunContext, task: &Task) {
    info!("Quota denied {}, skipping", task.source().display());
    let snapshot = {
        let mut shared = context.lock();
        shared.run.skipped += 1;
        shared.run.snapshot()
    };
    context.sink.notify(BatchEvent::Progress(snapshot));
}

fn requeue(shared: &mut Shared, queue: VecDeque<Task>) {
    if !queue.is_empty() {
        debug!("Returning {} unstarted tasks to the queue", queue.len());
    }
    shared.pending.extend(queue.into_iter().map(Task::into_spec));
}

fn finish_run(context: &RunContext, queue: VecDeque<Task>, stopped: bool) {
    let state = if stopped {
        LifecycleState::Stopped
    } else {
        LifecycleState::Done
    };
    let run = {
        let mut shared = context.lock();
        requeue(&mut shared, queue);
        shared.run.finish(state);
        shared.run.clone()
    };

    let success_rate = if run.processed == 0 {
        0.0
    } else {
        run.succeeded() as f64 / run.processed as f64 * 100.0
    };
    let elapsed = utils::format_duration(run.elapsed().as_secs_f64());
    info!(
        "✅ Batch {}: {}/{} succeeded ({:.1}%), {} failed, {} skipped in {}",
        state,
        run.succeeded(),
        run.processed,
        success_rate,
        run.failed,
        run.skipped,
        elapsed
    );

    context.sink.notify(BatchEvent::Status {
        state,
        message: format!(
            "{} of {} images processed ({} failed, {} skipped) in {}",
            run.processed, run.total, run.failed, run.skipped, elapsed
        ),
    });
}

fn fail_run(context: &RunContext, queue: VecDeque<Task>, detail: String) {
    error!("💥 Batch aborted: {}", detail);
    {
        let mut shared = context.lock();
        requeue(&mut shared, queue);
        shared.run.finish(LifecycleState::Errored);
    }
    context.sink.notify(BatchEvent::Status {
        state: LifecycleState::Errored,
        message: format!("Batch aborted: {}", detail),
    });
    context.sink.notify(BatchEvent::Error {
        source: None,
        detail,
    });
}
