// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! rosbridge wire protocol.
//!
//! Every message is one JSON object whose `op` field selects the operation:
//!
//! ```text
//! {"op":"subscribe","topic":"/chatter","id":"subscribe:/chatter:0","type":"std_msgs/String","throttle_rate":0,"compression":"none"}
//! {"op":"publish","topic":"/chatter","msg":{"data":"hello"}}
//! {"op":"call_service","service":"/add","id":"call_service:/add:1","args":{"a":1,"b":2}}
//! {"op":"service_response","service":"/add","id":"call_service:/add:1","values":{"sum":3},"result":true}
//! ```

mod envelope;

pub use envelope::{
    Advertise, AdvertiseService, Authenticate, CallService, Envelope, Fragment, PngCompression,
    Publish, ServiceResponse, Subscribe, Unadvertise, UnadvertiseService, Unsubscribe,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation names as they appear in the `op` field.
pub mod op {
    pub const ADVERTISE: &str = "advertise";
    pub const UNADVERTISE: &str = "unadvertise";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const ADVERTISE_SERVICE: &str = "advertise_service";
    pub const UNADVERTISE_SERVICE: &str = "unadvertise_service";
    pub const CALL_SERVICE: &str = "call_service";
    pub const SERVICE_RESPONSE: &str = "service_response";
    pub const PUBLISH: &str = "publish";
    pub const AUTH: &str = "auth";
    pub const PNG: &str = "png";
    pub const FRAGMENT: &str = "fragment";

    /// Every operation this client can decode.
    pub const ALL: [&str; 12] = [
        ADVERTISE,
        UNADVERTISE,
        SUBSCRIBE,
        UNSUBSCRIBE,
        ADVERTISE_SERVICE,
        UNADVERTISE_SERVICE,
        CALL_SERVICE,
        SERVICE_RESPONSE,
        PUBLISH,
        AUTH,
        PNG,
        FRAGMENT,
    ];

    /// The static name for `op`, or `None` if the operation is unknown.
    pub fn parse(op: &str) -> Option<&'static str> {
        ALL.iter().find(|known| **known == op).copied()
    }
}

/// Compression requested from the bridge for a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Png,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Png => "png",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
