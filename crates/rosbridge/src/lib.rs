// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # rosbridge - ROS topics and services over a JSON websocket
//!
//! A client for the rosbridge protocol: every message is a JSON object with
//! an `op` field, exchanged over one websocket with a rosbridge server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rosbridge::{Ros, RosConfig, RosResult, Topic};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Chatter {
//!     data: String,
//! }
//!
//! # async fn run() -> RosResult<()> {
//! let ros = Ros::new(RosConfig::new("localhost", 9090));
//! ros.connect().await?;
//!
//! let chatter = Topic::<Chatter>::new(&ros, "/chatter", "std_msgs/String");
//! chatter
//!     .subscribe("printer", |msg: &Chatter, _id| println!("{}", msg.data))
//!     .await?;
//! chatter.publish(&Chatter { data: "hello".into() }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        Application Layer                            |
//! |        Topic<M> (pub/sub)          Service<Req, Resp> (rpc)         |
//! +---------------------------------------------------------------------+
//! |                           Ros                                       |
//! |   Registry | Two-pass resolver | Dispatch | png / fragment unwrap   |
//! +---------------------------------------------------------------------+
//! |                        Transport Layer                              |
//! |      WebSocketTransport (ws/wss)   |   MemoryTransport (in-process) |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Ros`] | One connection to a bridge; owns the registry and read loop |
//! | [`Topic`] | Named, typed channel: subscribe, advertise, publish |
//! | [`Service`] | Named request/response channel, caller or responder |
//! | [`Envelope`] | Every protocol operation as a typed value |
//! | [`RosConfig`] | Host, port, scheme and timeouts |
//!
//! Inbound text is decoded in two passes: the `op` and topic/service name
//! pick the registered payload type, then the payload is decoded as that
//! type. Envelopes for names nobody registered are dropped.

pub mod codec;
pub mod config;
pub mod error;
pub mod fragment;
pub mod png;
pub mod protocol;
pub mod ros;
pub mod service;
pub mod topic;
pub mod transport;

mod registry;
mod resolver;

pub use codec::{AnyPayload, JsonCodec, Message, PayloadCodec};
pub use config::{ConfigError, RosConfig, Scheme, DEFAULT_HOSTNAME, DEFAULT_PORT};
pub use error::{
    ConnectionError, DecodeError, InboundError, ProtocolViolation, RosError, RosResult,
    UnknownOperation,
};
pub use fragment::Reassembler;
pub use protocol::{op, Authenticate, Compression, Envelope};
pub use ros::Ros;
pub use service::{RequestCallback, Service, ServiceReply};
pub use topic::{Topic, TopicCallback, TopicOptions};
pub use transport::{MemoryPeer, MemoryTransport, Transport, WebSocketTransport};
