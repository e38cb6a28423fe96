//! Task worker: drains the queue one task at a time
//!
//! Pops with a short timeout, dispatches `process_note` to enrichment and
//! `update_embedding` to the embedder, then pauses briefly. Malformed tasks
//! and dispatch errors are logged and dropped; nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use pkos_core::Task;
use tokio::sync::broadcast;

use crate::state::AppState;
use crate::subsystems::{embedder, enrich};

/// What a single worker iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The pop timed out.
    Idle,
    /// The envelope could not be parsed or named an unknown task type.
    Skipped,
    Processed(Task),
    Failed(Task),
}

/// Run until `shutdown` fires. Shutdown is checked between iterations, so a
/// task in flight always finishes.
pub async fn run_worker(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) {
    let poll_timeout = Duration::from_secs(state.config.worker.poll_timeout_secs.max(1));
    let idle_delay = Duration::from_millis(state.config.worker.idle_delay_ms);

    tracing::info!(
        queue = state.queue.name(),
        poll_timeout_secs = poll_timeout.as_secs(),
        "Task worker started"
    );

    loop {
        match shutdown.try_recv() {
            Err(broadcast::error::TryRecvError::Empty) => {}
            _ => break,
        }

        match run_worker_iteration(&state, poll_timeout).await {
            WorkerOutcome::Processed(task) => {
                tracing::debug!(task = task.kind(), note_id = %task.note_id(), "Task processed");
            }
            WorkerOutcome::Failed(task) => {
                tracing::warn!(task = task.kind(), note_id = %task.note_id(), "Task failed");
            }
            WorkerOutcome::Idle | WorkerOutcome::Skipped => {}
        }

        tokio::select! {
            _ = shutdown.recv() => break,
            _ = tokio::time::sleep(idle_delay) => {}
        }
    }

    tracing::info!("Task worker stopped");
}

/// Pop at most one task and dispatch it.
pub async fn run_worker_iteration(state: &AppState, poll_timeout: Duration) -> WorkerOutcome {
    let raw = match state.queue.pop(poll_timeout).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return WorkerOutcome::Idle,
        Err(e) => {
            tracing::error!(error = %e, "Error popping task");
            return WorkerOutcome::Idle;
        }
    };

    let task: Task = match serde_json::from_str(&raw) {
        Ok(task) => task,
        Err(e) => {
            tracing::debug!(error = %e, raw = %raw, "Skipping malformed or unknown task");
            return WorkerOutcome::Skipped;
        }
    };

    if dispatch(state, &task).await {
        WorkerOutcome::Processed(task)
    } else {
        WorkerOutcome::Failed(task)
    }
}

async fn dispatch(state: &AppState, task: &Task) -> bool {
    let result = match task {
        Task::ProcessNote { note_id } => enrich::process_note(state, *note_id).await.map(|_| ()),
        Task::UpdateEmbedding { note_id } => embedder::update_note_embedding(state, *note_id, None)
            .await
            .map(|_| ()),
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(task = task.kind(), note_id = %task.note_id(), error = %e, "Error processing task");
            false
        }
    }
}
