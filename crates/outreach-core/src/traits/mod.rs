// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits the campaign core is written against.

pub mod clock;
pub mod leads;
pub mod provider;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use leads::LeadDirectory;
pub use provider::CallingProvider;
pub use store::CampaignStore;
