use std::path::PathBuf;

use bubble_common::utils::format_duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::run::{LifecycleState, ProgressSnapshot};

/// Events emitted while a batch runs
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Counters changed after a task finished or was skipped
    Progress(ProgressSnapshot),
    /// Lifecycle changed
    Status {
        state: LifecycleState,
        message: String,
    },
    /// A task failed, or the run itself did (`source` is `None`)
    Error {
        source: Option<PathBuf>,
        detail: String,
    },
}

/// Receives batch events; called from the controlling loop only
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: BatchEvent);
}

/// Posts events to an unbounded channel the caller drains on its own schedule
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<BatchEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: BatchEvent) {
        if self.tx.send(event).is_err() {
            debug!("Notification receiver dropped, event discarded");
        }
    }
}

/// Logs every event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: BatchEvent) {
        match event {
            BatchEvent::Progress(snapshot) => info!(
                "Progress {:.1}% ({}/{}, {} failed), ETA {}",
                snapshot.percent,
                snapshot.processed,
                snapshot.total,
                snapshot.failed,
                format_duration(snapshot.remaining.as_secs_f64())
            ),
            BatchEvent::Status { state, message } => info!("[{}] {}", state, message),
            BatchEvent::Error {
                source: Some(source),
                detail,
            } => error!("{}: {}", source.display(), detail),
            BatchEvent::Error { source: None, detail } => error!("Fatal error: {}", detail),
        }
    }
}
