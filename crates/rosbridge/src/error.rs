// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the rosbridge client.
//!
//! Inbound failures ([`DecodeError`], [`UnknownOperation`]) never reach callers:
//! the read loop logs them and drops the frame. Everything a caller can observe
//! is folded into [`RosError`].

use std::time::Duration;
use thiserror::Error;

/// Result type for caller-facing operations.
pub type RosResult<T> = Result<T, RosError>;

/// Transport-level failures (open, send, close).
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to open {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("send failed: {0}")]
    Send(String),

    #[error("close failed: {0}")]
    Close(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("connection closed")]
    Closed,
}

/// An inbound frame could not be turned into a dispatchable envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope has no string 'op' field")]
    MissingOp,

    #[error("'{op}' envelope has no '{field}' field")]
    MissingField { op: &'static str, field: &'static str },

    #[error("no topic registered as '{0}'")]
    UnresolvedTopic(String),

    #[error("no service registered as '{0}'")]
    UnresolvedService(String),

    #[error("payload does not match {type_name}: {source}")]
    Payload {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("compressed payload: {0}")]
    Png(String),

    #[error("fragment: {0}")]
    Fragment(String),

    #[error("reconstructed envelopes nested too deeply")]
    TooDeep,
}

/// The `op` field named an operation this client does not know.
#[derive(Debug, Error)]
#[error("unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

/// Everything that can go wrong with one inbound frame.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    UnknownOperation(#[from] UnknownOperation),
}

/// Registry misuse. These are caller bugs, reported immediately.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("topic '{0}' is already registered by another Topic")]
    DuplicateTopic(String),

    #[error("service '{0}' is already registered by another Service")]
    DuplicateService(String),
}

/// Caller-facing errors.
#[derive(Debug, Error)]
pub enum RosError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("timed out after {0:?} waiting for the bridge")]
    ConnectTimeout(Duration),

    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("call '{0}' timed out")]
    CallTimeout(String),

    #[error("call '{0}' was aborted before a response arrived")]
    CallAborted(String),
}
