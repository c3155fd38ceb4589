// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel link lifecycle for the Sapa messaging platform.
//!
//! Wraps one live chat-network connection per tenant behind the
//! [`ChannelTransport`] seam: the [`link::ChannelLink`] owns the handle and
//! the teardown ordering, and [`loopback::LoopbackTransport`] provides a
//! local development backend.
//!
//! [`ChannelTransport`]: sapa_core::ChannelTransport

pub mod link;
pub mod loopback;
pub mod qr;

pub use link::ChannelLink;
pub use loopback::LoopbackTransport;
