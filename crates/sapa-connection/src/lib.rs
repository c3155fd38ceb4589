// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle manager for the Sapa messaging platform.
//!
//! Owns the tenant-to-link registry, serializes connect attempts per
//! tenant, persists pairing state transitions, and supervises reconnection
//! after unplanned drops.

pub mod manager;

pub use manager::ConnectionManager;
