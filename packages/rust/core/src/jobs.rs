//! Asynchronous job manager.
//!
//! `submit` records a `pending` job and returns its id at once; the pipeline
//! runs on a spawned task. Status only moves forward:
//! `pending -> running -> {completed, failed}`. After every terminal
//! transition the table is pruned back to `capacity`, oldest submission
//! first, whatever the status.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, Semaphore};
use tracing::{debug, info, warn};

use contentgen_shared::{ContentGenError, JobId, JobsConfig, Result};

use crate::cancel::CancellationToken;
use crate::fragments::ContentBundle;
use crate::pipeline::{Pipeline, RunRequest, SilentProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one job.
///
/// A `completed` job may still hold degraded fragments; inspect
/// `result.diagnostics`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub product_name: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ContentBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct Entry {
    record: JobRecord,
    /// Submission order, used for pruning.
    seq: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Table {
    jobs: HashMap<JobId, Entry>,
    next_seq: u64,
}

struct Shared {
    pipeline: Arc<Pipeline>,
    table: Mutex<Table>,
    permits: Semaphore,
    changed: Notify,
    capacity: usize,
}

/// Job table plus scheduler. Clone is cheap and shares the table.
#[derive(Clone)]
pub struct JobManager {
    shared: Arc<Shared>,
}

impl JobManager {
    /// `capacity` bounds the number of retained records; `max_concurrent`
    /// bounds the number of pipelines running at once. Both are raised to at
    /// least 1; `AppConfig::validate` rejects zero in config files.
    pub fn new(pipeline: Arc<Pipeline>, capacity: usize, max_concurrent: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                pipeline,
                table: Mutex::new(Table::default()),
                permits: Semaphore::new(max_concurrent.max(1)),
                changed: Notify::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn from_config(pipeline: Arc<Pipeline>, config: &JobsConfig) -> Self {
        Self::new(pipeline, config.capacity, config.max_concurrent)
    }

    /// Record a pending job and schedule it. Never waits for the run.
    pub async fn submit(&self, request: RunRequest) -> JobId {
        let id = JobId::new();
        let cancel = CancellationToken::new();
        {
            let mut table = self.shared.table.lock().await;
            let seq = table.next_seq;
            table.next_seq += 1;
            table.jobs.insert(
                id,
                Entry {
                    record: JobRecord {
                        id,
                        status: JobStatus::Pending,
                        product_name: request.primary.product_name.clone(),
                        submitted_at: Utc::now(),
                        started_at: None,
                        finished_at: None,
                        result: None,
                        error: None,
                    },
                    seq,
                    cancel: cancel.clone(),
                },
            );
        }
        info!(job_id = %id, product = %request.primary.product_name, "job submitted");

        let shared = self.shared.clone();
        tokio::spawn(async move {
            let _permit = match shared.permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    shared
                        .finish(id, Err(ContentGenError::state("job scheduler closed")))
                        .await;
                    return;
                }
            };
            if !shared.start(id).await {
                return;
            }
            let result = shared
                .pipeline
                .run(&request, &SilentProgress, &cancel)
                .await;
            shared.finish(id, result).await;
        });

        id
    }

    pub async fn get(&self, id: JobId) -> Result<JobRecord> {
        let table = self.shared.table.lock().await;
        table
            .jobs
            .get(&id)
            .map(|e| e.record.clone())
            .ok_or_else(|| ContentGenError::JobNotFound(id.to_string()))
    }

    /// Every retained job, oldest submission first.
    pub async fn list(&self) -> Vec<JobRecord> {
        let table = self.shared.table.lock().await;
        let mut entries: Vec<&Entry> = table.jobs.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.record.clone()).collect()
    }

    /// Request cooperative cancellation. The job fails at its next stage
    /// boundary. Returns the status at the time of the call.
    pub async fn cancel(&self, id: JobId) -> Result<JobStatus> {
        let table = self.shared.table.lock().await;
        let entry = table
            .jobs
            .get(&id)
            .ok_or_else(|| ContentGenError::JobNotFound(id.to_string()))?;
        if !entry.record.status.is_terminal() {
            entry.cancel.cancel();
            info!(job_id = %id, status = %entry.record.status, "job cancellation requested");
        }
        Ok(entry.record.status)
    }

    /// Resolve once the job is terminal. `JobNotFound` if it is unknown or
    /// gets pruned while waiting.
    pub async fn wait(&self, id: JobId) -> Result<JobRecord> {
        loop {
            // Registered before the check so no transition is missed.
            let notified = self.shared.changed.notified();
            {
                let table = self.shared.table.lock().await;
                let entry = table
                    .jobs
                    .get(&id)
                    .ok_or_else(|| ContentGenError::JobNotFound(id.to_string()))?;
                if entry.record.status.is_terminal() {
                    return Ok(entry.record.clone());
                }
            }
            notified.await;
        }
    }
}

impl Shared {
    /// `pending -> running`. False if the job was pruned while queued.
    async fn start(&self, id: JobId) -> bool {
        let mut table = self.table.lock().await;
        let Some(entry) = table.jobs.get_mut(&id) else {
            debug!(job_id = %id, "job pruned before it started");
            return false;
        };
        if entry.record.status == JobStatus::Pending {
            entry.record.status = JobStatus::Running;
            entry.record.started_at = Some(Utc::now());
            debug!(job_id = %id, "job running");
        }
        drop(table);
        self.changed.notify_waiters();
        true
    }

    /// Record the terminal state, then prune.
    async fn finish(&self, id: JobId, result: Result<ContentBundle>) {
        let mut table = self.table.lock().await;
        if let Some(entry) = table.jobs.get_mut(&id) {
            if !entry.record.status.is_terminal() {
                entry.record.finished_at = Some(Utc::now());
                match result {
                    Ok(bundle) => {
                        info!(
                            job_id = %id,
                            degraded = bundle.degraded_stages().len(),
                            "job completed"
                        );
                        entry.record.status = JobStatus::Completed;
                        entry.record.result = Some(bundle);
                    }
                    Err(e) => {
                        warn!(job_id = %id, error = %e, "job failed");
                        entry.record.status = JobStatus::Failed;
                        entry.record.error = Some(e.to_string());
                    }
                }
            }
        } else {
            debug!(job_id = %id, "finished job was already pruned");
        }
        prune(&mut table, self.capacity);
        drop(table);
        self.changed.notify_waiters();
    }
}

fn prune(table: &mut Table, capacity: usize) {
    while table.jobs.len() > capacity {
        let Some(oldest) = table
            .jobs
            .iter()
            .min_by_key(|(_, e)| e.seq)
            .map(|(id, _)| *id)
        else {
            break;
        };
        if let Some(entry) = table.jobs.remove(&oldest) {
            entry.cancel.cancel();
            debug!(job_id = %oldest, status = %entry.record.status, "pruned job record");
        }
    }
}
