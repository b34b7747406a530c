// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted calling provider for deterministic tests.
//!
//! Batches get sequential ids (`batch-1`, `batch-2`, ...). A batch status is
//! served from a per-batch FIFO of scripted reports; once the queue is empty
//! the last served report repeats. A freshly created batch reports `pending`
//! with every recipient pending.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use outreach_core::types::{
    BatchCreated, BatchRequest, BatchStatusReport, CallRequest, PlacedCall, ProviderBatchStatus,
    RecipientStatus,
};
use outreach_core::{CallingProvider, OutreachError};
use tokio::sync::{Mutex, Semaphore};

/// Build a batch status report from `(phone_number, sub_status)` pairs.
pub fn batch_report(
    status: &str,
    dispatched: u32,
    recipients: &[(&str, &str)],
) -> BatchStatusReport {
    BatchStatusReport {
        status: ProviderBatchStatus::parse(status),
        total_calls_dispatched: dispatched,
        total_calls_scheduled: recipients.len() as u32,
        recipients: recipients
            .iter()
            .enumerate()
            .map(|(i, (phone, sub_status))| RecipientStatus {
                phone_number: Some(phone.to_string()),
                status: Some(sub_status.to_string()),
                conversation_id: Some(format!("conv-{}", i + 1)),
            })
            .collect(),
    }
}

struct ScriptedBatch {
    queue: VecDeque<BatchStatusReport>,
    last: BatchStatusReport,
}

#[derive(Default)]
struct MockState {
    next_batch: u64,
    batches: HashMap<String, ScriptedBatch>,
    created: Vec<BatchRequest>,
    cancelled: Vec<String>,
    placed: Vec<CallRequest>,
    status_fetches: usize,
    fail_create: Option<String>,
    fail_cancel: Option<String>,
    fail_status: Option<String>,
    failing_phones: HashSet<String>,
    call_gate: Option<Arc<Semaphore>>,
}

/// A calling provider that serves scripted responses and records requests.
#[derive(Default)]
pub struct MockCallingProvider {
    state: Mutex<MockState>,
}

impl MockCallingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a status report for `batch_id`.
    pub async fn script_status(&self, batch_id: &str, report: BatchStatusReport) {
        let mut state = self.state.lock().await;
        if let Some(batch) = state.batches.get_mut(batch_id) {
            batch.queue.push_back(report);
            return;
        }
        state.batches.insert(
            batch_id.to_string(),
            ScriptedBatch {
                queue: VecDeque::from([report.clone()]),
                last: report,
            },
        );
    }

    /// Replace whatever is queued for `batch_id` with one fixed report.
    pub async fn set_status(&self, batch_id: &str, report: BatchStatusReport) {
        self.state.lock().await.batches.insert(
            batch_id.to_string(),
            ScriptedBatch {
                queue: VecDeque::new(),
                last: report,
            },
        );
    }

    pub async fn fail_batch_creation(&self, message: &str) {
        self.state.lock().await.fail_create = Some(message.to_string());
    }

    pub async fn fail_batch_cancellation(&self, message: &str) {
        self.state.lock().await.fail_cancel = Some(message.to_string());
    }

    /// Make status fetches fail (`Some`) or succeed again (`None`).
    pub async fn fail_status_fetch(&self, message: Option<&str>) {
        self.state.lock().await.fail_status = message.map(str::to_string);
    }

    /// Make single calls to `phone_number` fail.
    pub async fn fail_calls_to(&self, phone_number: &str) {
        self.state
            .lock()
            .await
            .failing_phones
            .insert(phone_number.to_string());
    }

    /// Hold every `place_call` until [`release_calls`](Self::release_calls)
    /// lets it through.
    pub async fn gate_calls(&self) {
        self.state.lock().await.call_gate = Some(Arc::new(Semaphore::new(0)));
    }

    pub async fn release_calls(&self, n: usize) {
        if let Some(gate) = self.state.lock().await.call_gate.as_ref() {
            gate.add_permits(n);
        }
    }

    pub async fn created_batches(&self) -> Vec<BatchRequest> {
        self.state.lock().await.created.clone()
    }

    pub async fn cancelled_batches(&self) -> Vec<String> {
        self.state.lock().await.cancelled.clone()
    }

    pub async fn placed_calls(&self) -> Vec<CallRequest> {
        self.state.lock().await.placed.clone()
    }

    pub async fn status_fetches(&self) -> usize {
        self.state.lock().await.status_fetches
    }
}

fn pending_report(request: &BatchRequest) -> BatchStatusReport {
    BatchStatusReport {
        status: ProviderBatchStatus::Pending,
        total_calls_dispatched: 0,
        total_calls_scheduled: request.recipients.len() as u32,
        recipients: request
            .recipients
            .iter()
            .map(|r| RecipientStatus {
                phone_number: Some(r.phone_number.clone()),
                status: Some("pending".to_string()),
                conversation_id: None,
            })
            .collect(),
    }
}

#[async_trait]
impl CallingProvider for MockCallingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_batch(&self, request: &BatchRequest) -> Result<BatchCreated, OutreachError> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_create.clone() {
            return Err(OutreachError::provider(message));
        }
        state.next_batch += 1;
        let batch_id = format!("batch-{}", state.next_batch);
        state.created.push(request.clone());
        state.batches.insert(
            batch_id.clone(),
            ScriptedBatch {
                queue: VecDeque::new(),
                last: pending_report(request),
            },
        );
        Ok(BatchCreated { batch_id })
    }

    async fn get_batch_status(&self, batch_id: &str) -> Result<BatchStatusReport, OutreachError> {
        let mut state = self.state.lock().await;
        state.status_fetches += 1;
        if let Some(message) = state.fail_status.clone() {
            return Err(OutreachError::provider(message));
        }
        let batch = state
            .batches
            .get_mut(batch_id)
            .ok_or_else(|| OutreachError::provider(format!("batch {batch_id} not found")))?;
        if let Some(next) = batch.queue.pop_front() {
            batch.last = next;
        }
        Ok(batch.last.clone())
    }

    async fn cancel_batch(&self, batch_id: &str) -> Result<(), OutreachError> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_cancel.clone() {
            return Err(OutreachError::provider(message));
        }
        state.cancelled.push(batch_id.to_string());
        Ok(())
    }

    async fn place_call(&self, request: &CallRequest) -> Result<PlacedCall, OutreachError> {
        let gate = self.state.lock().await.call_gate.clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| OutreachError::Internal(e.to_string()))?;
            permit.forget();
        }

        let mut state = self.state.lock().await;
        state.placed.push(request.clone());
        if state.failing_phones.contains(&request.phone_number) {
            return Err(OutreachError::provider(format!(
                "call to {} rejected",
                request.phone_number
            )));
        }
        Ok(PlacedCall {
            conversation_id: Some(format!("conv-{}", state.placed.len())),
        })
    }
}
