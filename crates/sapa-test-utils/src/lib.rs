// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Sapa integration tests.
//!
//! Provides mock seams and fixture infrastructure for fast, deterministic,
//! CI-runnable tests without the external chat network.
//!
//! # Components
//!
//! - [`MockTransport`] - Scriptable chat-network transport double
//! - [`RecordingNotifier`] - Notifier that records emissions for assertions
//! - [`TestStack`] - Temp-SQLite store plus doubles, ready to wire

pub mod harness;
pub mod mock_transport;
pub mod recording_notifier;

pub use harness::{wait_until, TestStack};
pub use mock_transport::MockTransport;
pub use recording_notifier::{RecordedEvent, RecordingNotifier};
