// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Envelope types, one per rosbridge operation.
//!
//! Field order matches the order the bridge documents; optional fields are
//! omitted from the wire when absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::op;

/// One complete protocol message, tagged by `op`.
///
/// `P` is the payload carried by `publish`, `call_service` and
/// `service_response`. Outbound envelopes and undecoded inbound envelopes use
/// `serde_json::Value`; after type resolution the payload becomes the
/// registered type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Envelope<P = Value> {
    Advertise(Advertise),
    Unadvertise(Unadvertise),
    Subscribe(Subscribe),
    Unsubscribe(Unsubscribe),
    AdvertiseService(AdvertiseService),
    UnadvertiseService(UnadvertiseService),
    CallService(CallService<P>),
    ServiceResponse(ServiceResponse<P>),
    Publish(Publish<P>),
    Auth(Authenticate),
    Png(PngCompression),
    Fragment(Fragment),
}

/// `advertise`: announce this client as a publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertise {
    pub topic: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// `unadvertise`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unadvertise {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// `subscribe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscribe {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
}

/// `unsubscribe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unsubscribe {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// `advertise_service`: announce this client as the responder for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertiseService {
    pub service: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// `unadvertise_service`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnadvertiseService {
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// `call_service`: a request, either outbound (caller) or inbound (responder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "P: Deserialize<'de>"))]
pub struct CallService<P = Value> {
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<P>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
}

/// `service_response`
///
/// A missing `result` decodes as `true`; `result` is always written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "P: Deserialize<'de>"))]
pub struct ServiceResponse<P = Value> {
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<P>,
    #[serde(default = "default_result")]
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

fn default_result() -> bool {
    true
}

/// `publish`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publish<P = Value> {
    pub topic: String,
    pub msg: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// `auth`: credentials issued by a trusted source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticate {
    /// MAC (hash) string given by the trusted source.
    pub mac: String,
    /// Client IP.
    pub client: String,
    /// Destination IP.
    pub dest: String,
    /// Random string given by the trusted source.
    pub rand: String,
    /// Time of the authorization request.
    pub t: i64,
    /// User level.
    pub level: String,
    /// End time of the client's session.
    pub end: i64,
}

/// `png`: a whole envelope carried as pixels of a base64 PNG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PngCompression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
}

/// `fragment`: one slice of a larger envelope's JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
}

impl<P> Envelope<P> {
    /// Wire name of this operation.
    pub fn op(&self) -> &'static str {
        match self {
            Envelope::Advertise(_) => op::ADVERTISE,
            Envelope::Unadvertise(_) => op::UNADVERTISE,
            Envelope::Subscribe(_) => op::SUBSCRIBE,
            Envelope::Unsubscribe(_) => op::UNSUBSCRIBE,
            Envelope::AdvertiseService(_) => op::ADVERTISE_SERVICE,
            Envelope::UnadvertiseService(_) => op::UNADVERTISE_SERVICE,
            Envelope::CallService(_) => op::CALL_SERVICE,
            Envelope::ServiceResponse(_) => op::SERVICE_RESPONSE,
            Envelope::Publish(_) => op::PUBLISH,
            Envelope::Auth(_) => op::AUTH,
            Envelope::Png(_) => op::PNG,
            Envelope::Fragment(_) => op::FRAGMENT,
        }
    }

    /// Correlation id, if the envelope carries one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Envelope::Advertise(m) => m.id.as_deref(),
            Envelope::Unadvertise(m) => m.id.as_deref(),
            Envelope::Subscribe(m) => m.id.as_deref(),
            Envelope::Unsubscribe(m) => m.id.as_deref(),
            Envelope::AdvertiseService(m) => m.id.as_deref(),
            Envelope::UnadvertiseService(m) => m.id.as_deref(),
            Envelope::CallService(m) => m.id.as_deref(),
            Envelope::ServiceResponse(m) => m.id.as_deref(),
            Envelope::Publish(m) => m.id.as_deref(),
            Envelope::Auth(_) => None,
            Envelope::Png(m) => m.id.as_deref(),
            Envelope::Fragment(m) => Some(&m.id),
        }
    }

    /// Convert the payload of `publish`/`call_service`/`service_response`,
    /// leaving every other variant untouched.
    pub fn try_map_payload<Q, E>(
        self,
        mut f: impl FnMut(P) -> Result<Q, E>,
    ) -> Result<Envelope<Q>, E> {
        Ok(match self {
            Envelope::Publish(m) => Envelope::Publish(Publish {
                topic: m.topic,
                msg: f(m.msg)?,
                id: m.id,
            }),
            Envelope::CallService(m) => Envelope::CallService(CallService {
                service: m.service,
                id: m.id,
                args: m.args.map(&mut f).transpose()?,
                type_name: m.type_name,
                fragment_size: m.fragment_size,
                compression: m.compression,
            }),
            Envelope::ServiceResponse(m) => Envelope::ServiceResponse(ServiceResponse {
                service: m.service,
                values: m.values.map(&mut f).transpose()?,
                result: m.result,
                id: m.id,
            }),
            Envelope::Advertise(m) => Envelope::Advertise(m),
            Envelope::Unadvertise(m) => Envelope::Unadvertise(m),
            Envelope::Subscribe(m) => Envelope::Subscribe(m),
            Envelope::Unsubscribe(m) => Envelope::Unsubscribe(m),
            Envelope::AdvertiseService(m) => Envelope::AdvertiseService(m),
            Envelope::UnadvertiseService(m) => Envelope::UnadvertiseService(m),
            Envelope::Auth(m) => Envelope::Auth(m),
            Envelope::Png(m) => Envelope::Png(m),
            Envelope::Fragment(m) => Envelope::Fragment(m),
        })
    }
}

impl<P: Serialize> Envelope<P> {
    /// Serialize to one line of JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(envelope: Envelope) {
        let text = envelope.to_json().expect("encode");
        let decoded: Envelope = serde_json::from_str(&text).expect("decode");
        assert_eq!(decoded, envelope, "roundtrip of {}", text);
    }

    #[test]
    fn test_subscribe_wire_format() {
        let envelope: Envelope = Envelope::Subscribe(Subscribe {
            topic: "myTopic1".into(),
            id: Some("subscribe:myTopic1:0".into()),
            type_name: Some("myType1".into()),
            throttle_rate: Some(0),
            queue_length: None,
            fragment_size: None,
            compression: Some("none".into()),
        });
        assert_eq!(
            envelope.to_json().expect("encode"),
            r#"{"op":"subscribe","topic":"myTopic1","id":"subscribe:myTopic1:0","type":"myType1","throttle_rate":0,"compression":"none"}"#
        );
    }

    #[test]
    fn test_advertise_wire_format() {
        let envelope: Envelope = Envelope::Advertise(Advertise {
            topic: "myTopic1".into(),
            type_name: "myType1".into(),
            id: Some("advertise:myTopic1:0".into()),
        });
        assert_eq!(
            envelope.to_json().expect("encode"),
            r#"{"op":"advertise","topic":"myTopic1","type":"myType1","id":"advertise:myTopic1:0"}"#
        );
    }

    #[test]
    fn test_publish_wire_format() {
        let envelope = Envelope::Publish(Publish {
            topic: "myTopic1".into(),
            msg: json!({"test1": "test2"}),
            id: Some("publish:myTopic1:1".into()),
        });
        assert_eq!(
            envelope.to_json().expect("encode"),
            r#"{"op":"publish","topic":"myTopic1","msg":{"test1":"test2"},"id":"publish:myTopic1:1"}"#
        );
    }

    #[test]
    fn test_service_response_result_defaults_true() {
        let decoded: Envelope =
            serde_json::from_str(r#"{"op":"service_response","service":"s","id":"x"}"#)
                .expect("decode");
        match decoded {
            Envelope::ServiceResponse(m) => {
                assert!(m.result);
                assert!(m.values.is_none());
            }
            other => panic!("Expected ServiceResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_service_response_always_writes_result() {
        let envelope: Envelope = Envelope::ServiceResponse(ServiceResponse {
            service: "s".into(),
            values: None,
            result: true,
            id: None,
        });
        assert_eq!(
            envelope.to_json().expect("encode"),
            r#"{"op":"service_response","service":"s","result":true}"#
        );
    }

    #[test]
    fn test_publish_requires_msg() {
        let result: Result<Envelope, _> = serde_json::from_str(r#"{"op":"publish","topic":"t"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_op_rejected() {
        let result: Result<Envelope, _> = serde_json::from_str(r#"{"op":"status","level":"error"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_all_optionals_present() {
        let envelopes: Vec<Envelope> = vec![
            Envelope::Advertise(Advertise {
                topic: "/a".into(),
                type_name: "std_msgs/String".into(),
                id: Some("advertise:/a:1".into()),
            }),
            Envelope::Unadvertise(Unadvertise {
                topic: "/a".into(),
                id: Some("advertise:/a:1".into()),
            }),
            Envelope::Subscribe(Subscribe {
                topic: "/a".into(),
                id: Some("subscribe:/a:2".into()),
                type_name: Some("std_msgs/String".into()),
                throttle_rate: Some(100),
                queue_length: Some(5),
                fragment_size: Some(1000),
                compression: Some("png".into()),
            }),
            Envelope::Unsubscribe(Unsubscribe {
                topic: "/a".into(),
                id: Some("subscribe:/a:2".into()),
            }),
            Envelope::AdvertiseService(AdvertiseService {
                service: "/add".into(),
                type_name: "AddTwoInts".into(),
                id: Some("adv".into()),
            }),
            Envelope::UnadvertiseService(UnadvertiseService {
                service: "/add".into(),
                id: Some("adv".into()),
            }),
            Envelope::CallService(CallService {
                service: "/add".into(),
                id: Some("call_service:/add:3".into()),
                args: Some(json!({"a": 1, "b": 2})),
                type_name: Some("AddTwoInts".into()),
                fragment_size: Some(512),
                compression: Some("none".into()),
            }),
            Envelope::ServiceResponse(ServiceResponse {
                service: "/add".into(),
                values: Some(json!({"sum": 3})),
                result: false,
                id: Some("call_service:/add:3".into()),
            }),
            Envelope::Publish(Publish {
                topic: "/a".into(),
                msg: json!({"data": "hi"}),
                id: Some("publish:/a:4".into()),
            }),
            Envelope::Auth(Authenticate {
                mac: "mac".into(),
                client: "192.168.1.2".into(),
                dest: "192.168.1.3".into(),
                rand: "r".into(),
                t: 5,
                level: "admin".into(),
                end: 10,
            }),
            Envelope::Png(PngCompression {
                id: Some("p".into()),
                data: "AAAA".into(),
                num: Some(0),
                total: Some(1),
            }),
            Envelope::Fragment(Fragment {
                id: "f".into(),
                data: "{\"op\"".into(),
                num: Some(0),
                total: Some(3),
            }),
        ];
        for envelope in envelopes {
            roundtrip(envelope);
        }
    }

    #[test]
    fn test_roundtrip_all_optionals_absent() {
        let envelopes: Vec<Envelope> = vec![
            Envelope::Advertise(Advertise {
                topic: "/a".into(),
                type_name: "T".into(),
                id: None,
            }),
            Envelope::Unadvertise(Unadvertise {
                topic: "/a".into(),
                id: None,
            }),
            Envelope::Subscribe(Subscribe {
                topic: "/a".into(),
                id: None,
                type_name: None,
                throttle_rate: None,
                queue_length: None,
                fragment_size: None,
                compression: None,
            }),
            Envelope::Unsubscribe(Unsubscribe {
                topic: "/a".into(),
                id: None,
            }),
            Envelope::AdvertiseService(AdvertiseService {
                service: "/s".into(),
                type_name: "T".into(),
                id: None,
            }),
            Envelope::UnadvertiseService(UnadvertiseService {
                service: "/s".into(),
                id: None,
            }),
            Envelope::CallService(CallService {
                service: "/s".into(),
                id: None,
                args: None,
                type_name: None,
                fragment_size: None,
                compression: None,
            }),
            Envelope::ServiceResponse(ServiceResponse {
                service: "/s".into(),
                values: None,
                result: true,
                id: None,
            }),
            Envelope::Publish(Publish {
                topic: "/a".into(),
                msg: json!({}),
                id: None,
            }),
            Envelope::Png(PngCompression {
                id: None,
                data: "AAAA".into(),
                num: None,
                total: None,
            }),
            Envelope::Fragment(Fragment {
                id: "f".into(),
                data: "x".into(),
                num: None,
                total: None,
            }),
        ];
        for envelope in envelopes {
            roundtrip(envelope);
        }
    }

    #[test]
    fn test_op_and_id_accessors() {
        let envelope: Envelope = Envelope::CallService(CallService {
            service: "/s".into(),
            id: Some("call_service:/s:0".into()),
            args: None,
            type_name: None,
            fragment_size: None,
            compression: None,
        });
        assert_eq!(envelope.op(), "call_service");
        assert_eq!(envelope.id(), Some("call_service:/s:0"));
    }

    #[test]
    fn test_try_map_payload() {
        let envelope = Envelope::Publish(Publish {
            topic: "/n".into(),
            msg: json!(41),
            id: None,
        });
        let mapped: Envelope<u64> = envelope
            .try_map_payload(|v| v.as_u64().map(|n| n + 1).ok_or("not a number"))
            .expect("map");
        match mapped {
            Envelope::Publish(m) => assert_eq!(m.msg, 42),
            other => panic!("Expected Publish, got {:?}", other),
        }
    }
}
