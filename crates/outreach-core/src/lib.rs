// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the outreach campaign platform.
//!
//! This crate provides the error type, the campaign and call state machines,
//! the domain records, and the collaborator traits (store, calling provider,
//! lead directory, clock) that every other workspace crate is written against.

pub mod error;
pub mod state;
pub mod traits;
pub mod types;

pub use error::OutreachError;
pub use state::{CallStatus, CampaignStatus};
pub use types::{
    Campaign, CampaignCall, CampaignPatch, CampaignType, DispatchMode, UpdateOutcome, WriteGuard,
};

pub use traits::{CallingProvider, CampaignStore, Clock, LeadDirectory, SystemClock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_traits_are_object_safe() {
        fn _store(_: &dyn CampaignStore) {}
        fn _provider(_: &dyn CallingProvider) {}
        fn _leads(_: &dyn LeadDirectory) {}
        fn _clock(_: &dyn Clock) {}
    }

    #[test]
    fn guards_constructors() {
        let guard = WriteGuard::from_statuses(&CampaignStatus::IN_FLIGHT);
        assert_eq!(guard.expected_version, None);
        assert_eq!(guard.allowed_from.len(), 2);
        assert_eq!(WriteGuard::at_version(7).expected_version, Some(7));
        assert_eq!(WriteGuard::any(), WriteGuard::default());
    }
}
