// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport capability consumed by the control core.
//!
//! The core never owns sockets. The enclosing TCP transport implements
//! [`Transport`] and the message manager borrows it at call time, so the
//! ownership graph stays acyclic: transport -> manager -> (borrowed)
//! transport.

use crate::channel::Channel;
use crate::config::RtcpConfig;

/// Narrow view of the enclosing TCP transport.
pub trait Transport {
    /// Write `data` on the channel's connection.
    ///
    /// Returns the number of bytes the transport accepted; the transport
    /// may buffer or block per its own policy. Writes from concurrent
    /// callers are serialized by the transport itself.
    fn send(&self, channel: &Channel, data: &[u8]) -> usize;

    /// Tear down the channel's connection.
    fn close(&self, channel: &Channel);

    /// Whether a local input resource is listening on the logical port.
    fn is_input_port_open(&self, port: u16) -> bool;

    /// The transport's configuration; read-only during message
    /// processing.
    fn configuration(&self) -> &RtcpConfig;
}

// ============================================================================
// Test mock transport
// ============================================================================
