// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for outreach integration tests.
//!
//! Provides mock collaborators and a harness for fast, deterministic tests
//! without a real calling provider.
//!
//! # Components
//!
//! - [`MockCallingProvider`] - scripted provider that records every request
//! - [`ManualClock`] - clock whose sleeps advance time instantly
//! - [`FaultyStore`] - campaign store wrapper with failure switches
//! - [`TestHarness`] - temp SQLite store, mock provider, orchestrator and poller

pub mod clock;
pub mod faulty_store;
pub mod harness;
pub mod mock_provider;

pub use clock::ManualClock;
pub use faulty_store::FaultyStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{MockCallingProvider, batch_report};
