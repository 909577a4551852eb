// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # RTCP - Control plane for RTPS over TCP
//!
//! RTPS over TCP multiplexes many logical ports onto one physical
//! connection. Before data flows, the two participants run the RTCP
//! control protocol on logical port 0: a bind handshake establishes the
//! session, logical ports are negotiated open, and keep-alives hold the
//! session up. This crate implements that control plane: the wire codec,
//! the transaction-correlated request/response exchange, and the
//! per-channel connection state machine.
//!
//! The TCP transport itself stays outside: socket I/O is reached through
//! the narrow [`Transport`] capability, borrowed at call time.
//!
//! # Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                     RtcpMessageManager                       |
//! |  +--------------------+      +---------------------------+  |
//! |  |  Message builder   |      |    Message dispatcher     |  |
//! |  |  fill_headers      |      |    process_rtcp_message   |  |
//! |  |  send_* helpers    |      |    per-kind handlers      |  |
//! |  +---------+----------+      +-------------+-------------+  |
//! |            |     +---------------------+   |                |
//! |            +---->| TransactionRegistry |<--+                |
//! |                  +---------------------+                    |
//! +------------------------|-------------------|----------------+
//!                          v                   v
//!              +--------------------+   +-------------+
//!              | Wire codec         |   |  Channel    |
//!              | headers, payloads, |   |  status,    |
//!              | CRC                |   |  port lists |
//!              +--------------------+   +-------------+
//!                          |
//!                          v
//!                 Transport capability
//!             (send / close / is_input_port_open)
//! ```
//!
//! # Wire Format
//!
//! Every control frame is a 10-byte TCP header (logical port 0, total
//! length, CRC) followed by a 12-byte control header (kind, flags,
//! length, transaction id), an optional 4-byte response code, and an
//! optional payload envelope. See [`protocol`] for the exact layouts.
//!
//! # Example
//!
//! ```no_run
//! use rtcp::{Channel, ResponseCode, RtcpMessageManager, Transport};
//!
//! fn on_control_frame(
//!     manager: &RtcpMessageManager,
//!     transport: &dyn Transport,
//!     channel: &Channel,
//!     frame: &[u8],
//! ) {
//!     match manager.process_rtcp_message(transport, channel, frame) {
//!         ResponseCode::Ok => {}
//!         // Fatal for this channel; tear it down.
//!         _ => transport.close(channel),
//!     }
//! }
//! ```

pub mod channel;
pub mod config;
pub mod locator;
pub mod manager;
pub mod protocol;
pub mod transaction;
pub mod transport;

mod dispatcher;


pub use channel::{Channel, ChannelStatus};
pub use config::RtcpConfig;
pub use locator::{Locator, LocatorKind};
pub use manager::RtcpMessageManager;
pub use protocol::{
    ControlKind, Endianness, ProtocolVersion, ResponseCode, DEFAULT_ENDIAN,
    RTCP_PROTOCOL_VERSION,
};
pub use transaction::{TransactionId, TransactionRegistry};
pub use transport::Transport;
