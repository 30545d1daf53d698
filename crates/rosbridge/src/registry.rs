// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-connection registry of Topics and Services.
//!
//! Entries are type-erased: the registry only knows how to obtain a payload
//! codec and how to hand a decoded payload back to its owner. Lookups clone
//! the entry `Arc` out of the map so no shard lock is held while callbacks
//! run.

use crate::codec::{AnyPayload, PayloadCodec};
use crate::error::ProtocolViolation;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// A registered Topic, seen from the dispatcher.
pub(crate) trait TopicEntry: Send + Sync {
    /// Codec for the `msg` field.
    fn codec(&self) -> Arc<dyn PayloadCodec>;

    /// Fan a decoded message out to every subscriber.
    fn deliver(&self, msg: AnyPayload, id: Option<&str>);

    /// No subscribers and not advertised.
    fn is_idle(&self) -> bool;
}

/// A registered Service, seen from the dispatcher.
pub(crate) trait ServiceEntry: Send + Sync {
    /// Codec for `call_service.args`.
    fn request_codec(&self) -> Arc<dyn PayloadCodec>;

    /// Codec for `service_response.values`.
    fn response_codec(&self) -> Arc<dyn PayloadCodec>;

    /// Inbound request for the responder.
    fn on_request(&self, args: Option<AnyPayload>, id: Option<&str>);

    /// Inbound response for a pending caller.
    fn on_response(&self, values: Option<AnyPayload>, result: bool, id: Option<&str>);

    /// No pending calls and no responder.
    fn is_idle(&self) -> bool;
}

/// Topic and Service maps, keyed by name.
#[derive(Default)]
pub(crate) struct Registry {
    topics: DashMap<String, Arc<dyn TopicEntry>>,
    services: DashMap<String, Arc<dyn ServiceEntry>>,
}

fn same_entry<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entry` under `name`.
    ///
    /// Registering the same entry again is a no-op; a different entry under
    /// a taken name is rejected.
    pub fn register_topic(
        &self,
        name: &str,
        entry: Arc<dyn TopicEntry>,
    ) -> Result<(), ProtocolViolation> {
        match self.topics.entry(name.to_owned()) {
            Entry::Occupied(existing) if same_entry(existing.get(), &entry) => Ok(()),
            Entry::Occupied(_) => Err(ProtocolViolation::DuplicateTopic(name.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                tracing::debug!("registered topic '{}'", name);
                Ok(())
            }
        }
    }

    /// Remove `entry` if it is the one registered under `name` and it is idle.
    pub fn deregister_topic(&self, name: &str, entry: &Arc<dyn TopicEntry>) -> bool {
        let removed = self
            .topics
            .remove_if(name, |_, current| {
                same_entry(current, entry) && current.is_idle()
            })
            .is_some();
        if removed {
            tracing::debug!("deregistered topic '{}'", name);
        }
        removed
    }

    pub fn register_service(
        &self,
        name: &str,
        entry: Arc<dyn ServiceEntry>,
    ) -> Result<(), ProtocolViolation> {
        match self.services.entry(name.to_owned()) {
            Entry::Occupied(existing) if same_entry(existing.get(), &entry) => Ok(()),
            Entry::Occupied(_) => Err(ProtocolViolation::DuplicateService(name.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                tracing::debug!("registered service '{}'", name);
                Ok(())
            }
        }
    }

    pub fn deregister_service(&self, name: &str, entry: &Arc<dyn ServiceEntry>) -> bool {
        let removed = self
            .services
            .remove_if(name, |_, current| {
                same_entry(current, entry) && current.is_idle()
            })
            .is_some();
        if removed {
            tracing::debug!("deregistered service '{}'", name);
        }
        removed
    }

    pub fn topic(&self, name: &str) -> Option<Arc<dyn TopicEntry>> {
        self.topics.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn service(&self, name: &str) -> Option<Arc<dyn ServiceEntry>> {
        self.services.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
