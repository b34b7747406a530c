// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Calling provider trait for external voice-AI batch calling services.

use async_trait::async_trait;

use crate::error::OutreachError;
use crate::types::{BatchCreated, BatchRequest, BatchStatusReport, CallRequest, PlacedCall};

/// Adapter for an external calling provider.
///
/// Implementations own transport concerns (authentication, retries,
/// payload shapes). All failures surface as [`OutreachError::Provider`].
#[async_trait]
pub trait CallingProvider: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Open a batch that dials every recipient of `request`.
    async fn create_batch(&self, request: &BatchRequest) -> Result<BatchCreated, OutreachError>;

    /// Fetch the provider's current snapshot of a batch.
    async fn get_batch_status(&self, batch_id: &str) -> Result<BatchStatusReport, OutreachError>;

    /// Ask the provider to stop dialing a batch.
    async fn cancel_batch(&self, batch_id: &str) -> Result<(), OutreachError>;

    /// Place a single outbound call (direct-dial path).
    async fn place_call(&self, request: &CallRequest) -> Result<PlacedCall, OutreachError>;
}
