// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload codecs.
//!
//! The concrete shape of a `msg`, `args` or `values` field is not described by
//! the envelope itself. Each Topic and Service registers a [`PayloadCodec`] for
//! its payload type; the resolver picks the codec by topic/service name and the
//! dispatcher hands the decoded, type-erased [`AnyPayload`] back to the owner,
//! which downcasts it to its own type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A payload type carried in `msg`, `args` or `values`.
///
/// Implemented for every serde type that can cross threads, including
/// `serde_json::Value` for untyped access.
pub trait Message: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Message for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A decoded payload whose concrete type is known only to its codec's owner.
pub type AnyPayload = Box<dyn Any + Send + Sync>;

/// Decode capability for one payload type.
pub trait PayloadCodec: Send + Sync {
    /// Rust type name, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Decode a JSON payload into the concrete type.
    fn decode(&self, value: serde_json::Value) -> Result<AnyPayload, serde_json::Error>;
}

/// [`PayloadCodec`] backed by serde for any [`Message`].
pub struct JsonCodec<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M: Message> JsonCodec<M> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// Shared codec handle.
    pub fn shared() -> Arc<dyn PayloadCodec> {
        Arc::new(Self::new())
    }
}

impl<M: Message> Default for JsonCodec<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for JsonCodec<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonCodec<{}>", std::any::type_name::<M>())
    }
}

impl<M: Message> PayloadCodec for JsonCodec<M> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    fn decode(&self, value: serde_json::Value) -> Result<AnyPayload, serde_json::Error> {
        let decoded: M = serde_json::from_value(value)?;
        Ok(Box::new(decoded))
    }
}

/// Recover a concrete payload from an erased one.
pub(crate) fn downcast<M: Message>(payload: AnyPayload) -> Option<M> {
    payload.downcast::<M>().ok().map(|boxed| *boxed)
}
