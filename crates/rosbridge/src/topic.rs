// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topics: named, typed publish/subscribe channels.
//!
//! The wire subscription is lazy. The first local subscriber sends
//! `subscribe`, later ones only join the fan-out, and the last one to leave
//! sends `unsubscribe`. Publishing on a topic that was never advertised
//! advertises it first.

use crate::codec::{downcast, AnyPayload, JsonCodec, Message, PayloadCodec};
use crate::error::RosResult;
use crate::protocol::{
    op, Advertise, Compression, Envelope, Publish, Subscribe, Unadvertise, Unsubscribe,
};
use crate::registry::TopicEntry;
use crate::ros::Ros;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Subscriber callback: the decoded message and the publish envelope's id.
pub type TopicCallback<M> = Arc<dyn Fn(&M, Option<&str>) + Send + Sync>;

/// Subscription options sent with `subscribe`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicOptions {
    pub compression: Compression,
    /// Minimum interval between messages, in milliseconds. Enforced by the
    /// bridge, not locally.
    pub throttle_rate: u32,
    pub queue_length: Option<u32>,
    pub fragment_size: Option<u32>,
}

impl TopicOptions {
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn throttle_rate(mut self, throttle_rate: u32) -> Self {
        self.throttle_rate = throttle_rate;
        self
    }

    pub fn queue_length(mut self, queue_length: u32) -> Self {
        self.queue_length = Some(queue_length);
        self
    }

    pub fn fragment_size(mut self, fragment_size: u32) -> Self {
        self.fragment_size = Some(fragment_size);
        self
    }
}

#[derive(Default)]
struct TopicIds {
    advertise: Option<String>,
    subscribe: Option<String>,
}

struct TopicShared<M> {
    name: String,
    type_name: String,
    options: TopicOptions,
    codec: Arc<dyn PayloadCodec>,
    subscribers: DashMap<String, TopicCallback<M>>,
    ids: parking_lot::Mutex<TopicIds>,
    /// Serializes subscribe/unsubscribe/advertise/unadvertise.
    lifecycle: tokio::sync::Mutex<()>,
}

impl<M: Message> TopicEntry for TopicShared<M> {
    fn codec(&self) -> Arc<dyn PayloadCodec> {
        Arc::clone(&self.codec)
    }

    fn deliver(&self, msg: AnyPayload, id: Option<&str>) {
        let Some(message) = downcast::<M>(msg) else {
            warn!("Topic '{}' received a payload of the wrong type", self.name);
            return;
        };
        let callbacks: Vec<TopicCallback<M>> = self
            .subscribers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for callback in callbacks {
            callback(&message, id);
        }
    }

    fn is_idle(&self) -> bool {
        self.subscribers.is_empty() && self.ids.lock().advertise.is_none()
    }
}

/// Registry slot taken for a pending subscribe or advertise. Dropped
/// uncommitted, it gives the slot back if the topic is idle.
struct Registration<'a, M: Message> {
    topic: &'a Topic<M>,
    armed: bool,
}

impl<M: Message> Registration<'_, M> {
    fn commit(mut self) {
        self.armed = false;
    }
}

impl<M: Message> Drop for Registration<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            let topic = self.topic;
            topic.ros.deregister_topic(topic.name(), &topic.entry());
        }
    }
}

/// A named, typed publish/subscribe channel on one [`Ros`] connection.
///
/// `M` is the message payload; use `serde_json::Value` for untyped access.
/// Clones share state.
pub struct Topic<M: Message> {
    ros: Ros,
    shared: Arc<TopicShared<M>>,
}

impl<M: Message> Clone for Topic<M> {
    fn clone(&self) -> Self {
        Self {
            ros: self.ros.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: Message> fmt::Debug for Topic<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.shared.name)
            .field("type", &self.shared.type_name)
            .field("options", &self.shared.options)
            .field("subscribers", &self.shared.subscribers.len())
            .finish()
    }
}

impl<M: Message> Topic<M> {
    /// Topic with no compression and throttle rate 0.
    pub fn new(ros: &Ros, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::with_options(ros, name, type_name, TopicOptions::default())
    }

    pub fn with_options(
        ros: &Ros,
        name: impl Into<String>,
        type_name: impl Into<String>,
        options: TopicOptions,
    ) -> Self {
        Self {
            ros: ros.clone(),
            shared: Arc::new(TopicShared {
                name: name.into(),
                type_name: type_name.into(),
                options,
                codec: JsonCodec::<M>::shared(),
                subscribers: DashMap::new(),
                ids: parking_lot::Mutex::new(TopicIds::default()),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn ros(&self) -> &Ros {
        &self.ros
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn type_name(&self) -> &str {
        &self.shared.type_name
    }

    pub fn compression(&self) -> Compression {
        self.shared.options.compression
    }

    pub fn throttle_rate(&self) -> u32 {
        self.shared.options.throttle_rate
    }

    pub fn is_advertised(&self) -> bool {
        self.shared.ids.lock().advertise.is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.ids.lock().subscribe.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    fn entry(&self) -> Arc<dyn TopicEntry> {
        self.shared.clone()
    }

    fn register(&self) -> RosResult<Registration<'_, M>> {
        self.ros.register_topic(self.name(), self.entry())?;
        Ok(Registration {
            topic: self,
            armed: true,
        })
    }

    /// Add a subscriber under `handle`.
    ///
    /// Returns `Ok(false)` if `handle` is already subscribed. The first
    /// subscriber registers the topic and sends `subscribe`; if that send
    /// fails nothing is kept.
    pub async fn subscribe<F>(&self, handle: impl Into<String>, callback: F) -> RosResult<bool>
    where
        F: Fn(&M, Option<&str>) + Send + Sync + 'static,
    {
        let handle = handle.into();
        let _lifecycle = self.shared.lifecycle.lock().await;
        if self.shared.subscribers.contains_key(&handle) {
            return Ok(false);
        }

        if self.shared.subscribers.is_empty() {
            let registration = self.register()?;
            let id = self.ros.correlation_id(op::SUBSCRIBE, self.name());
            let options = &self.shared.options;
            let envelope: Envelope = Envelope::Subscribe(Subscribe {
                topic: self.shared.name.clone(),
                id: Some(id.clone()),
                type_name: Some(self.shared.type_name.clone()),
                throttle_rate: Some(options.throttle_rate),
                queue_length: options.queue_length,
                fragment_size: options.fragment_size,
                compression: Some(options.compression.as_str().to_owned()),
            });
            self.ros.send(&envelope).await?;
            registration.commit();
            self.shared.ids.lock().subscribe = Some(id);
            debug!("Subscribed to '{}'", self.shared.name);
        }

        self.shared.subscribers.insert(handle, Arc::new(callback));
        Ok(true)
    }

    /// Remove the subscriber under `handle`.
    ///
    /// Returns `Ok(false)` if `handle` was not subscribed. Removing the last
    /// subscriber sends `unsubscribe` with the stored subscribe id.
    pub async fn unsubscribe(&self, handle: &str) -> RosResult<bool> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        if self.shared.subscribers.remove(handle).is_none() {
            return Ok(false);
        }

        if self.shared.subscribers.is_empty() {
            let id = self.shared.ids.lock().subscribe.take();
            self.ros.deregister_topic(self.name(), &self.entry());
            let envelope: Envelope = Envelope::Unsubscribe(Unsubscribe {
                topic: self.shared.name.clone(),
                id,
            });
            self.ros.send(&envelope).await?;
            debug!("Unsubscribed from '{}'", self.shared.name);
        }
        Ok(true)
    }

    /// Announce this client as a publisher with a fresh advertise id.
    pub async fn advertise(&self) -> RosResult<()> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        self.advertise_locked().await
    }

    async fn advertise_locked(&self) -> RosResult<()> {
        let registration = self.register()?;
        let id = self.ros.correlation_id(op::ADVERTISE, self.name());
        let envelope: Envelope = Envelope::Advertise(Advertise {
            topic: self.shared.name.clone(),
            type_name: self.shared.type_name.clone(),
            id: Some(id.clone()),
        });
        self.ros.send(&envelope).await?;
        registration.commit();
        self.shared.ids.lock().advertise = Some(id);
        Ok(())
    }

    /// Withdraw the publisher announcement.
    ///
    /// Returns `Ok(false)` without sending anything if the topic is not
    /// advertised.
    pub async fn unadvertise(&self) -> RosResult<bool> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        let Some(id) = self.shared.ids.lock().advertise.take() else {
            return Ok(false);
        };
        self.ros.deregister_topic(self.name(), &self.entry());
        let envelope: Envelope = Envelope::Unadvertise(Unadvertise {
            topic: self.shared.name.clone(),
            id: Some(id),
        });
        self.ros.send(&envelope).await?;
        Ok(true)
    }

    /// Publish `message`, advertising the topic first if needed.
    pub async fn publish(&self, message: &M) -> RosResult<()> {
        if !self.is_advertised() {
            let _lifecycle = self.shared.lifecycle.lock().await;
            if !self.is_advertised() {
                self.advertise_locked().await?;
            }
        }

        let envelope = Envelope::Publish(Publish {
            topic: self.shared.name.clone(),
            msg: message,
            id: Some(self.ros.correlation_id(op::PUBLISH, self.name())),
        });
        self.ros.send(&envelope).await
    }
}
