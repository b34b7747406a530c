// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead lookup trait.

use async_trait::async_trait;

use crate::error::OutreachError;
use crate::types::LeadContact;

/// Resolves lead references to dialable contacts.
#[async_trait]
pub trait LeadDirectory: Send + Sync {
    /// Resolve `lead_ids` within `tenant_id`.
    ///
    /// The result keeps the order of first appearance in `lead_ids`, holds
    /// each lead at most once, and silently drops ids that are unknown,
    /// belong to another tenant, or have no phone number.
    async fn resolve_phone_numbers(
        &self,
        tenant_id: &str,
        lead_ids: &[String],
    ) -> Result<Vec<LeadContact>, OutreachError>;
}
