//! Batch controller: runs N simulations sequentially on one worker task.
//!
//! Each job publishes its `BatchStatus` through a `watch` channel. Status
//! reads borrow the latest snapshot and never wait on the worker. Pause and
//! cancel are cooperative: the worker checks them between simulations and
//! blocks on the channel while paused, so resume or cancel wakes it
//! immediately.

use chrono::Utc;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    BatchConfig, BatchErrorEntry, BatchRunSummary, BatchState, BatchStatus, IngestionStatus,
};
use crate::services::knowledge_store::KnowledgeStore;
use crate::services::simulation_pipeline::SimulationPipeline;

/// Why a control request was refused. Nothing is mutated on rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchRejection {
    /// Another job still owns the controller.
    #[error("A batch is already {state} (job {job_id})")]
    AlreadyRunning {
        /// The active job.
        job_id: Uuid,
        /// Its state.
        state: BatchState,
    },

    /// The previous job was stopped but its worker has not exited yet.
    #[error("The previous batch is still finishing its current simulation")]
    WorkerDraining {
        /// The draining job.
        job_id: Uuid,
    },

    /// Pause needs a running job.
    #[error("Cannot pause: batch is {state}")]
    NotRunning {
        /// State at the time of the request.
        state: BatchState,
    },

    /// Resume needs a paused job.
    #[error("Cannot resume: batch is {state}")]
    NotPaused {
        /// State at the time of the request.
        state: BatchState,
    },

    /// Cancel needs a running or paused job.
    #[error("Cannot cancel: batch is {state}")]
    NotActive {
        /// State at the time of the request.
        state: BatchState,
    },

    /// Zero simulations requested.
    #[error("Batch count must be at least 1")]
    InvalidCount,
}

impl BatchRejection {
    /// Machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::AlreadyRunning { .. } => "already_running",
            Self::WorkerDraining { .. } => "worker_draining",
            Self::NotRunning { .. } => "not_running",
            Self::NotPaused { .. } => "not_paused",
            Self::NotActive { .. } => "not_active",
            Self::InvalidCount => "invalid_count",
        }
    }
}

impl Serialize for BatchRejection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("BatchRejection", 3)?;
        s.serialize_field("status", "error")?;
        s.serialize_field("reason", self.reason())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

/// Accepted control request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlAck {
    /// A new job was spawned.
    Started {
        /// Id of the new job.
        job_id: Uuid,
        /// Taxonomy it simulates against.
        domain: String,
        /// Simulations requested.
        total: usize,
    },
    /// The worker will park at the next boundary.
    Paused {
        /// The job paused.
        job_id: Uuid,
    },
    /// The worker may continue.
    Resumed {
        /// The job resumed.
        job_id: Uuid,
    },
    /// The worker will stop at the next boundary.
    Cancelled {
        /// The job cancelled.
        job_id: Uuid,
    },
}

/// Reference to one batch job. Cheap to clone; every clone controls the
/// same job.
#[derive(Clone)]
pub struct BatchJobHandle {
    id: Uuid,
    tx: Arc<watch::Sender<BatchStatus>>,
}

impl BatchJobHandle {
    /// Job id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latest snapshot with elapsed time filled in.
    pub fn status(&self) -> BatchStatus {
        let mut status = self.tx.borrow().clone();
        if let Some(started) = status.started_at {
            let end = status.finished_at.unwrap_or_else(Utc::now);
            #[allow(clippy::cast_precision_loss)]
            {
                status.elapsed_secs = (end - started).num_milliseconds().max(0) as f64 / 1000.0;
            }
        }
        status
    }

    /// Park the worker at the next simulation boundary.
    pub fn pause(&self) -> Result<ControlAck, BatchRejection> {
        self.transition(BatchState::Paused, |state| match state {
            BatchState::Running => Ok(()),
            state => Err(BatchRejection::NotRunning { state }),
        })?;
        info!(job_id = %self.id, "Batch paused");
        Ok(ControlAck::Paused { job_id: self.id })
    }

    /// Let a paused worker continue.
    pub fn resume(&self) -> Result<ControlAck, BatchRejection> {
        self.transition(BatchState::Running, |state| match state {
            BatchState::Paused => Ok(()),
            state => Err(BatchRejection::NotPaused { state }),
        })?;
        info!(job_id = %self.id, "Batch resumed");
        Ok(ControlAck::Resumed { job_id: self.id })
    }

    /// Takes effect at the next simulation boundary; a paused worker wakes
    /// up straight away.
    pub fn cancel(&self) -> Result<ControlAck, BatchRejection> {
        self.transition(BatchState::Cancelled, |state| {
            if state.is_active() {
                Ok(())
            } else {
                Err(BatchRejection::NotActive { state })
            }
        })?;
        info!(job_id = %self.id, "Batch cancel requested");
        Ok(ControlAck::Cancelled { job_id: self.id })
    }

    /// Wait until the worker has exited.
    pub async fn wait_until_finished(&self) -> BatchStatus {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|s| !s.worker_active).await;
        self.status()
    }

    /// Resolves whenever the status changes. For progress displays.
    pub fn subscribe(&self) -> watch::Receiver<BatchStatus> {
        self.tx.subscribe()
    }

    fn transition(
        &self,
        to: BatchState,
        allowed: impl Fn(BatchState) -> Result<(), BatchRejection>,
    ) -> Result<(), BatchRejection> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|status| match allowed(status.state) {
            Ok(()) if status.state.can_transition_to(to) => {
                status.state = to;
                true
            }
            Ok(()) => false,
            Err(rejection) => {
                outcome = Err(rejection);
                false
            }
        });
        outcome
    }
}

/// Supervises at most one running batch job at a time.
pub struct BatchController {
    pipeline: Arc<SimulationPipeline>,
    knowledge: Arc<KnowledgeStore>,
    config: BatchConfig,
    current: Mutex<Option<BatchJobHandle>>,
}

impl BatchController {
    /// Controller with no job yet.
    pub fn new(
        pipeline: Arc<SimulationPipeline>,
        knowledge: Arc<KnowledgeStore>,
        config: BatchConfig,
    ) -> Self {
        Self {
            pipeline,
            knowledge,
            config,
            current: Mutex::new(None),
        }
    }

    /// The most recently started job, if any.
    pub fn current(&self) -> Option<BatchJobHandle> {
        self.current.lock().ok().and_then(|guard| guard.clone())
    }

    /// Start `count` simulations for `domain` on a new worker task.
    ///
    /// Rejected while another job is running or paused, or while a cancelled
    /// job's worker is still finishing its in-flight simulation.
    pub fn start(&self, count: usize, domain: &str) -> Result<BatchJobHandle, BatchRejection> {
        if count == 0 {
            return Err(BatchRejection::InvalidCount);
        }

        let mut current = self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(job) = current.as_ref() {
            let status = job.tx.borrow();
            if status.state.is_active() {
                return Err(BatchRejection::AlreadyRunning {
                    job_id: job.id,
                    state: status.state,
                });
            }
            if status.worker_active {
                return Err(BatchRejection::WorkerDraining { job_id: job.id });
            }
        }

        let id = Uuid::new_v4();
        let (tx, _rx) = watch::channel(BatchStatus {
            job_id: Some(id),
            domain: domain.to_string(),
            state: BatchState::Running,
            total: count,
            started_at: Some(Utc::now()),
            worker_active: true,
            ..BatchStatus::idle()
        });
        let handle = BatchJobHandle {
            id,
            tx: Arc::new(tx),
        };

        let worker = BatchWorker {
            pipeline: Arc::clone(&self.pipeline),
            knowledge: Arc::clone(&self.knowledge),
            config: self.config.clone(),
            handle: handle.clone(),
            domain: domain.to_string(),
            total: count,
        };
        tokio::spawn(worker.run());

        info!(job_id = %id, domain, count, "Batch started");
        *current = Some(handle.clone());
        Ok(handle)
    }

    /// Pause the current job.
    pub fn pause(&self) -> Result<ControlAck, BatchRejection> {
        self.with_current(BatchJobHandle::pause, |state| BatchRejection::NotRunning { state })
    }

    /// Resume the current job.
    pub fn resume(&self) -> Result<ControlAck, BatchRejection> {
        self.with_current(BatchJobHandle::resume, |state| BatchRejection::NotPaused { state })
    }

    /// Cancel the current job.
    pub fn cancel(&self) -> Result<ControlAck, BatchRejection> {
        self.with_current(BatchJobHandle::cancel, |state| BatchRejection::NotActive { state })
    }

    /// Snapshot of the current job, or an idle status.
    pub fn status(&self) -> BatchStatus {
        self.current()
            .map_or_else(BatchStatus::idle, |job| job.status())
    }

    fn with_current(
        &self,
        op: impl Fn(&BatchJobHandle) -> Result<ControlAck, BatchRejection>,
        idle: impl Fn(BatchState) -> BatchRejection,
    ) -> Result<ControlAck, BatchRejection> {
        match self.current() {
            Some(job) => op(&job),
            None => Err(idle(BatchState::Idle)),
        }
    }
}

struct BatchWorker {
    pipeline: Arc<SimulationPipeline>,
    knowledge: Arc<KnowledgeStore>,
    config: BatchConfig,
    handle: BatchJobHandle,
    domain: String,
    total: usize,
}

impl BatchWorker {
    async fn run(self) {
        let job_id = self.handle.id;
        let mut rx = self.handle.tx.subscribe();
        self.pipeline.reset_scenarios().await;

        for index in 1..=self.total {
            if !self.await_runnable(&mut rx).await {
                info!(%job_id, completed = index - 1, "Batch cancelled");
                break;
            }

            match self.run_one(index).await {
                Ok(summary) => self.record_success(summary),
                Err(message) => self.record_error(index, message),
            }

            if index < self.total && self.config.inter_run_delay_ms > 0 {
                let delay = tokio::time::sleep(Duration::from_millis(self.config.inter_run_delay_ms));
                tokio::select! {
                    () = delay => {}
                    _ = rx.wait_for(|s| s.state == BatchState::Cancelled) => {}
                }
            }
        }

        self.handle.tx.send_modify(|status| {
            if status.state != BatchState::Cancelled {
                status.state = BatchState::Completed;
            }
            status.finished_at = Some(Utc::now());
            status.worker_active = false;
        });
        let status = self.handle.status();
        info!(
            %job_id,
            state = %status.state,
            completed = status.completed,
            total = status.total,
            errors = status.error_count,
            elapsed_secs = status.elapsed_secs,
            "Batch finished"
        );
    }

    /// Block while paused. Returns false once the job is cancelled.
    async fn await_runnable(&self, rx: &mut watch::Receiver<BatchStatus>) -> bool {
        let runnable = rx.wait_for(|s| s.state != BatchState::Paused).await;
        match runnable {
            Ok(status) => status.state != BatchState::Cancelled,
            Err(_) => false,
        }
    }

    async fn run_one(&self, index: usize) -> Result<BatchRunSummary, String> {
        let run = self
            .pipeline
            .run_single(&self.domain)
            .await
            .map_err(|e| e.to_string())?;
        let record = run.record;

        let ingestion = self
            .ingest(&record.id)
            .await
            .map_err(|e| format!("simulation {} saved to inbox but ingestion failed: {e}", record.id))?;

        Ok(BatchRunSummary {
            index,
            record_id: record.id,
            query: record.query,
            prediction: record.ai_prediction,
            ground_truth: record.ground_truth,
            correct: record.diagnosis_correct,
            turns: record.turn_count,
            confidence: record.confidence,
            outcome: record.outcome,
            ingestion,
        })
    }

    async fn ingest(&self, record_id: &str) -> DomainResult<IngestionStatus> {
        let report = self.knowledge.ingest(record_id, &self.domain).await?;
        Ok(report.outcome.status())
    }

    fn record_success(&self, summary: BatchRunSummary) {
        let window = self.config.results_window;
        self.handle.tx.send_modify(|status| {
            status.completed += 1;
            status.success_count += 1;
            status.progress_percent = percent(status.completed, status.total);
            status.recent_results.insert(0, summary);
            status.recent_results.truncate(window);
        });
    }

    fn record_error(&self, index: usize, message: String) {
        error!(job_id = %self.handle.id, index, error = %message, "Simulation failed, continuing batch");
        let window = self.config.errors_window;
        self.handle.tx.send_modify(|status| {
            status.completed += 1;
            status.error_count += 1;
            status.progress_percent = percent(status.completed, status.total);
            status.recent_errors.insert(
                0,
                BatchErrorEntry {
                    index,
                    message,
                    timestamp: Utc::now(),
                },
            );
            status.recent_errors.truncate(window);
        });
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = completed as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

impl Drop for BatchWorker {
    fn drop(&mut self) {
        // A panicking worker must not leave the job looking alive.
        let still_active = self.handle.tx.borrow().worker_active;
        if still_active {
            warn!(job_id = %self.handle.id, "Batch worker exited unexpectedly");
            self.handle.tx.send_modify(|status| {
                status.worker_active = false;
                status.finished_at = Some(Utc::now());
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_serializes_as_error_status() {
        let rejection = BatchRejection::NotPaused {
            state: BatchState::Running,
        };
        let json = serde_json::to_value(&rejection).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["reason"], "not_paused");
        assert_eq!(json["message"], "Cannot resume: batch is running");
    }

    #[test]
    fn test_ack_serializes_with_status_tag() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(ControlAck::Started {
            job_id: id,
            domain: "hr".to_string(),
            total: 5,
        })
        .unwrap();
        assert_eq!(json["status"], "started");
        assert_eq!(json["total"], 5);
    }

    #[test]
    fn test_percent_rounds_to_one_decimal() {
        assert!((percent(1, 3) - 33.3).abs() < f64::EPSILON);
        assert!((percent(3, 3) - 100.0).abs() < f64::EPSILON);
        assert!(percent(0, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_handle_transitions_without_worker() {
        let (tx, _rx) = watch::channel(BatchStatus {
            state: BatchState::Running,
            worker_active: true,
            ..BatchStatus::idle()
        });
        let handle = BatchJobHandle {
            id: Uuid::new_v4(),
            tx: Arc::new(tx),
        };

        assert!(handle.resume().is_err());
        assert!(handle.pause().is_ok());
        assert!(matches!(handle.pause(), Err(BatchRejection::NotRunning { .. })));
        assert!(handle.resume().is_ok());
        assert!(handle.cancel().is_ok());
        assert_eq!(handle.status().state, BatchState::Cancelled);
        assert!(matches!(handle.cancel(), Err(BatchRejection::NotActive { .. })));
    }
}
