// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Services: named request/response channels.
//!
//! A [`Service`] plays either role. As a caller it correlates each
//! `call_service` with its `service_response` by id; as a responder it
//! receives `call_service` requests and answers with
//! [`send_response`](Service::send_response). The Service stays registered
//! while it has pending calls or a responder.

use crate::codec::{downcast, AnyPayload, JsonCodec, Message, PayloadCodec};
use crate::error::{RosError, RosResult};
use crate::protocol::{
    op, AdvertiseService, CallService, Envelope, ServiceResponse, UnadvertiseService,
};
use crate::registry::ServiceEntry;
use crate::ros::Ros;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Outcome of one service call.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceReply<Resp> {
    /// Response payload; `None` if the bridge sent no `values`.
    pub values: Option<Resp>,
    /// `false` if the service reported a failure.
    pub result: bool,
    /// Correlation id of the call.
    pub id: Option<String>,
}

/// One-shot caller callback. Wrapped in a mutex so the pending map is `Sync`.
type ResponseCallback<Resp> = parking_lot::Mutex<Box<dyn FnOnce(ServiceReply<Resp>) + Send>>;

/// Responder callback: the request (if any) and the call id to answer.
pub type RequestCallback<Req> = Arc<dyn Fn(Option<Req>, Option<String>) + Send + Sync>;

struct ServiceShared<Req, Resp> {
    name: String,
    type_name: String,
    request_codec: Arc<dyn PayloadCodec>,
    response_codec: Arc<dyn PayloadCodec>,
    pending: DashMap<String, ResponseCallback<Resp>>,
    responder: parking_lot::Mutex<Option<RequestCallback<Req>>>,
}

fn typed<M: Message>(payload: Option<AnyPayload>, service: &str) -> Option<M> {
    let payload = payload?;
    let typed = downcast::<M>(payload);
    if typed.is_none() {
        warn!("Service '{}' received a payload of the wrong type", service);
    }
    typed
}

impl<Req: Message, Resp: Message> ServiceEntry for ServiceShared<Req, Resp> {
    fn request_codec(&self) -> Arc<dyn PayloadCodec> {
        Arc::clone(&self.request_codec)
    }

    fn response_codec(&self) -> Arc<dyn PayloadCodec> {
        Arc::clone(&self.response_codec)
    }

    fn on_request(&self, args: Option<AnyPayload>, id: Option<&str>) {
        let responder = self.responder.lock().clone();
        match responder {
            Some(callback) => callback(typed::<Req>(args, &self.name), id.map(str::to_owned)),
            None => debug!("No responder for '{}', request dropped", self.name),
        }
    }

    fn on_response(&self, values: Option<AnyPayload>, result: bool, id: Option<&str>) {
        let Some(id) = id else {
            warn!("Response for '{}' without id dropped", self.name);
            return;
        };
        match self.pending.remove(id) {
            Some((id, callback)) => (callback.into_inner())(ServiceReply {
                values: typed::<Resp>(values, &self.name),
                result,
                id: Some(id),
            }),
            None => debug!("No pending call '{}' on '{}'", id, self.name),
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.responder.lock().is_none()
    }
}

/// A named service on one [`Ros`] connection.
///
/// `Req` and `Resp` are the request and response payloads. Clones share
/// state.
pub struct Service<Req: Message, Resp: Message> {
    ros: Ros,
    shared: Arc<ServiceShared<Req, Resp>>,
}

impl<Req: Message, Resp: Message> Clone for Service<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            ros: self.ros.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<Req: Message, Resp: Message> fmt::Debug for Service<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.shared.name)
            .field("type", &self.shared.type_name)
            .field("pending", &self.shared.pending.len())
            .field("advertised", &self.is_advertised())
            .finish()
    }
}

/// Removes a pending call and releases the Service when dropped while armed:
/// a failed or cancelled send, or an abandoned wait.
struct PendingGuard<'a, Req: Message, Resp: Message> {
    service: &'a Service<Req, Resp>,
    id: &'a str,
    armed: bool,
}

impl<'a, Req: Message, Resp: Message> PendingGuard<'a, Req, Resp> {
    fn new(service: &'a Service<Req, Resp>, id: &'a str) -> Self {
        Self {
            service,
            id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

/// Restores the previous responder unless the advertise went out.
struct ResponderRollback<'a, Req: Message, Resp: Message> {
    service: &'a Service<Req, Resp>,
    previous: Option<Option<RequestCallback<Req>>>,
}

impl<Req: Message, Resp: Message> ResponderRollback<'_, Req, Resp> {
    fn commit(mut self) {
        self.previous = None;
    }
}

impl<Req: Message, Resp: Message> Drop for ResponderRollback<'_, Req, Resp> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.service.shared.responder.lock() = previous;
            self.service.release();
        }
    }
}

impl<Req: Message, Resp: Message> Drop for PendingGuard<'_, Req, Resp> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.service.shared.pending.remove(self.id).is_some() {
            debug!("Call '{}' abandoned", self.id);
        }
        self.service.release();
    }
}

impl<Req: Message, Resp: Message> Service<Req, Resp> {
    /// `type_name` is the bridge-side service type, e.g.
    /// `rospy_tutorials/AddTwoInts`.
    pub fn new(ros: &Ros, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            ros: ros.clone(),
            shared: Arc::new(ServiceShared {
                name: name.into(),
                type_name: type_name.into(),
                request_codec: JsonCodec::<Req>::shared(),
                response_codec: JsonCodec::<Resp>::shared(),
                pending: DashMap::new(),
                responder: parking_lot::Mutex::new(None),
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

    /// Whether this Service is advertised as a responder.
    pub fn is_advertised(&self) -> bool {
        self.shared.responder.lock().is_some()
    }

    /// Calls still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.shared.pending.len()
    }

    fn entry(&self) -> Arc<dyn ServiceEntry> {
        self.shared.clone()
    }

    /// Leave the registry if nothing is pending and no responder is set.
    fn release(&self) {
        self.ros.deregister_service(self.name(), &self.entry());
    }

    /// Call the service; `callback` runs once with the matching response.
    ///
    /// Returns the call's correlation id.
    pub async fn call<F>(&self, request: &Req, callback: F) -> RosResult<String>
    where
        F: FnOnce(ServiceReply<Resp>) + Send + 'static,
    {
        let id = self.ros.correlation_id(op::CALL_SERVICE, self.name());
        self.shared
            .pending
            .insert(id.clone(), parking_lot::Mutex::new(Box::new(callback)));
        let guard = PendingGuard::new(self, &id);
        self.ros.register_service(self.name(), self.entry())?;

        let envelope = Envelope::CallService(CallService {
            service: self.shared.name.clone(),
            id: Some(id.clone()),
            args: Some(request),
            type_name: Some(self.shared.type_name.clone()),
            fragment_size: None,
            compression: None,
        });
        self.ros.send(&envelope).await?;
        guard.disarm();
        Ok(id)
    }

    /// Call the service and wait for its response.
    ///
    /// With `timeout` set, gives up with [`RosError::CallTimeout`]. Whether
    /// it times out or the future is dropped, the pending call is removed.
    pub async fn call_and_wait(
        &self,
        request: &Req,
        timeout: Option<Duration>,
    ) -> RosResult<ServiceReply<Resp>> {
        let (tx, rx) = oneshot::channel();
        let id = self
            .call(request, move |reply| {
                let _ = tx.send(reply);
            })
            .await?;
        let _guard = PendingGuard::new(self, &id);

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(RosError::CallTimeout(id.clone())),
            },
            None => rx.await,
        };
        outcome.map_err(|_| RosError::CallAborted(id.clone()))
    }

    /// Drop every pending call without a response. Callers blocked in
    /// [`call_and_wait`](Self::call_and_wait) get [`RosError::CallAborted`].
    pub fn abort_calls(&self) -> usize {
        let ids: Vec<String> = self
            .shared
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let aborted = ids
            .iter()
            .filter(|id| self.shared.pending.remove(id.as_str()).is_some())
            .count();
        self.release();
        aborted
    }

    /// Act as the responder for this service.
    ///
    /// `callback` runs on the read loop for every inbound request; answer
    /// with [`send_response`](Self::send_response), typically from a spawned
    /// task.
    pub async fn advertise<F>(&self, callback: F) -> RosResult<()>
    where
        F: Fn(Option<Req>, Option<String>) + Send + Sync + 'static,
    {
        let previous = self.shared.responder.lock().replace(Arc::new(callback));
        let rollback = ResponderRollback {
            service: self,
            previous: Some(previous),
        };
        self.ros.register_service(self.name(), self.entry())?;

        let envelope: Envelope = Envelope::AdvertiseService(AdvertiseService {
            service: self.shared.name.clone(),
            type_name: self.shared.type_name.clone(),
            id: None,
        });
        self.ros.send(&envelope).await?;
        rollback.commit();
        debug!("Advertised service '{}'", self.shared.name);
        Ok(())
    }

    /// Answer the request with correlation id `id`.
    pub async fn send_response(
        &self,
        response: Option<&Resp>,
        result: bool,
        id: Option<&str>,
    ) -> RosResult<()> {
        let envelope = Envelope::ServiceResponse(ServiceResponse {
            service: self.shared.name.clone(),
            values: response,
            result,
            id: id.map(str::to_owned),
        });
        self.ros.send(&envelope).await
    }

    /// Stop acting as the responder.
    ///
    /// Returns `Ok(false)` without sending anything if not advertised.
    pub async fn unadvertise(&self) -> RosResult<bool> {
        if self.shared.responder.lock().take().is_none() {
            return Ok(false);
        }
        self.release();
        let envelope: Envelope = Envelope::UnadvertiseService(UnadvertiseService {
            service: self.shared.name.clone(),
            id: None,
        });
        self.ros.send(&envelope).await?;
        Ok(true)
    }
}
