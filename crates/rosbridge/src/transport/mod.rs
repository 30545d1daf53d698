// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Text-frame transports.
//!
//! A [`Transport`] opens one logical connection and splits it into a
//! [`FrameSink`] (owned by the connection's send lock) and a [`FrameSource`]
//! (owned by the read loop). Every frame is one complete JSON envelope.

mod memory;
mod websocket;

pub use memory::{MemoryPeer, MemoryTransport};
pub use websocket::WebSocketTransport;

use crate::error::ConnectionError;
use async_trait::async_trait;

/// Both halves of an open connection.
pub type Link = (Box<dyn FrameSink>, Box<dyn FrameSource>);

/// Opens connections to a bridge.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `url`.
    async fn open(&self, url: &str) -> Result<Link, ConnectionError>;
}

/// Outbound half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Inbound half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame; `None` once the peer has closed the connection.
    async fn next_text(&mut self) -> Option<Result<String, ConnectionError>>;
}
