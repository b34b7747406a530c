// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign orchestration for outreach.
//!
//! - [`CampaignService`] drives user-initiated transitions and campaign creation
//! - [`DirectDialer`] runs the sequential per-campaign dial loops
//! - [`BatchReconciler`] folds provider batch status into local rows; the
//!   poller and the on-demand sync share it

pub mod dialer;
pub mod reconcile;
pub mod service;

pub use dialer::{DialOutcome, DirectDialer};
pub use reconcile::{BatchReconciler, ReconcileOutcome};
pub use service::{CampaignService, CreateCampaign};
