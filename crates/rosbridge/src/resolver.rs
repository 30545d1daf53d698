// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Two-pass decoding of inbound frames.
//!
//! The JSON of a `publish`, `call_service` or `service_response` does not say
//! what type its payload is. The first pass reads `op` plus the topic or
//! service name and looks the owner up in the [`Registry`]; the second pass
//! decodes the envelope with that owner's codec. The owner found in the first
//! pass travels with the decoded envelope, so dispatch never repeats the
//! lookup.

use crate::codec::{AnyPayload, PayloadCodec};
use crate::error::{DecodeError, InboundError, UnknownOperation};
use crate::protocol::{op, Envelope};
use crate::registry::{Registry, ServiceEntry, TopicEntry};
use serde_json::Value;
use std::sync::Arc;

/// Where a decoded envelope is headed.
pub(crate) enum Target {
    /// Operation carries no typed payload.
    None,
    Topic(Arc<dyn TopicEntry>),
    Request(Arc<dyn ServiceEntry>),
    Response(Arc<dyn ServiceEntry>),
}

impl Target {
    fn codec(&self) -> Option<Arc<dyn PayloadCodec>> {
        match self {
            Target::None => None,
            Target::Topic(topic) => Some(topic.codec()),
            Target::Request(service) => Some(service.request_codec()),
            Target::Response(service) => Some(service.response_codec()),
        }
    }
}

/// A fully decoded inbound envelope and its owner.
pub(crate) struct Resolved {
    pub envelope: Envelope<AnyPayload>,
    pub target: Target,
}

fn name_field<'a>(
    value: &'a Value,
    op: &'static str,
    field: &'static str,
) -> Result<&'a str, DecodeError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingField { op, field })
}

/// First pass: pick the owner for `op` from the registry.
pub(crate) fn resolve(
    op: &'static str,
    value: &Value,
    registry: &Registry,
) -> Result<Target, DecodeError> {
    match op {
        op::PUBLISH => {
            let topic = name_field(value, op, "topic")?;
            registry
                .topic(topic)
                .map(Target::Topic)
                .ok_or_else(|| DecodeError::UnresolvedTopic(topic.to_owned()))
        }
        op::CALL_SERVICE => {
            let service = name_field(value, op, "service")?;
            registry
                .service(service)
                .map(Target::Request)
                .ok_or_else(|| DecodeError::UnresolvedService(service.to_owned()))
        }
        op::SERVICE_RESPONSE => {
            let service = name_field(value, op, "service")?;
            registry
                .service(service)
                .map(Target::Response)
                .ok_or_else(|| DecodeError::UnresolvedService(service.to_owned()))
        }
        _ => Ok(Target::None),
    }
}

/// Parse, resolve and decode one frame.
pub(crate) fn decode(text: &str, registry: &Registry) -> Result<Resolved, InboundError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::Json)?;
    let raw_op = value
        .get("op")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingOp)?;
    let op = op::parse(raw_op).ok_or_else(|| UnknownOperation(raw_op.to_owned()))?;

    let target = resolve(op, &value, registry)?;
    let codec = target.codec();

    let envelope: Envelope<Value> = serde_json::from_value(value).map_err(DecodeError::Json)?;
    let envelope = envelope.try_map_payload(|payload| match &codec {
        Some(codec) => codec
            .decode(payload)
            .map_err(|source| DecodeError::Payload {
                type_name: codec.type_name(),
                source,
            }),
        None => Ok(Box::new(payload) as AnyPayload),
    })?;

    Ok(Resolved { envelope, target })
}
