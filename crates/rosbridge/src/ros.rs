// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection manager.
//!
//! [`Ros`] owns one bridge connection: the transport sink behind a send lock,
//! the read loop task, the correlation-id counter and the Topic/Service
//! registries. It is a cheap handle; clones share the same connection.
//!
//! Inbound frames are processed one at a time on the read loop:
//! resolve, decode, dispatch. Compressed and fragmented envelopes are
//! unwrapped and fed back through the same path.

use crate::config::RosConfig;
use crate::error::{DecodeError, InboundError, RosError, RosResult};
use crate::fragment::Reassembler;
use crate::protocol::{Authenticate, Envelope, Fragment, PngCompression};
use crate::registry::{Registry, ServiceEntry, TopicEntry};
use crate::resolver::{self, Resolved, Target};
use crate::transport::{FrameSink, FrameSource, Transport, WebSocketTransport};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// How many times reconstructed text may itself be a `png` or `fragment`.
const MAX_UNWRAP_DEPTH: usize = 2;

/// The live half of a connection, guarded by the send lock.
struct Link {
    sink: Option<Box<dyn FrameSink>>,
    /// Bumped on every connect so a finished read loop only tears down its
    /// own session.
    generation: u64,
}

pub(crate) struct RosInner {
    config: RosConfig,
    transport: Arc<dyn Transport>,
    link: tokio::sync::Mutex<Link>,
    /// Set by `disconnect` without taking the send lock; in-flight sends
    /// give up when it turns `true`.
    shutdown: watch::Sender<bool>,
    connected: AtomicBool,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    registry: Registry,
    fragments: parking_lot::Mutex<Reassembler>,
}

/// Handle to one rosbridge connection.
///
/// ```no_run
/// use rosbridge::{Ros, RosConfig};
///
/// # async fn run() -> rosbridge::RosResult<()> {
/// let ros = Ros::new(RosConfig::new("localhost", 9090));
/// ros.connect().await?;
/// // ... create Topics and Services on `ros` ...
/// ros.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Ros {
    inner: Arc<RosInner>,
}

impl Ros {
    /// Connection over websocket, not yet connected.
    pub fn new(config: RosConfig) -> Self {
        Self::with_transport(config, Arc::new(WebSocketTransport))
    }

    /// Connection over a caller-supplied transport, not yet connected.
    pub fn with_transport(config: RosConfig, transport: Arc<dyn Transport>) -> Self {
        let fragments = Reassembler::new(
            config.max_fragment_bytes,
            config.fragment_timeout_duration(),
        );
        Self {
            inner: Arc::new(RosInner {
                config,
                transport,
                link: tokio::sync::Mutex::new(Link {
                    sink: None,
                    generation: 0,
                }),
                shutdown: watch::channel(false).0,
                connected: AtomicBool::new(false),
                reader: parking_lot::Mutex::new(None),
                next_id: AtomicU64::new(0),
                registry: Registry::new(),
                fragments: parking_lot::Mutex::new(fragments),
            }),
        }
    }

    pub fn config(&self) -> &RosConfig {
        &self.inner.config
    }

    /// `scheme://hostname:port`
    pub fn url(&self) -> String {
        self.inner.config.url()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Open the transport and start the read loop.
    ///
    /// Fails with [`RosError::AlreadyConnected`] if a connection is open and
    /// with [`RosError::ConnectTimeout`] if the session is not ready within
    /// the configured connect timeout.
    pub async fn connect(&self) -> RosResult<()> {
        let mut link = self.inner.link.lock().await;
        if link.sink.is_some() {
            return Err(RosError::AlreadyConnected);
        }

        let url = self.url();
        let timeout = self.inner.config.connect_timeout_duration();
        let (sink, source) = tokio::time::timeout(timeout, self.inner.transport.open(&url))
            .await
            .map_err(|_| RosError::ConnectTimeout(timeout))??;

        link.generation += 1;
        link.sink = Some(sink);
        self.inner.shutdown.send_replace(false);
        self.inner.connected.store(true, Ordering::SeqCst);

        let reader = tokio::spawn(read_loop(
            Arc::downgrade(&self.inner),
            source,
            link.generation,
        ));
        if let Some(previous) = self.inner.reader.lock().replace(reader) {
            previous.abort();
        }

        info!("Connected to {}", url);
        Ok(())
    }

    /// Close the transport and stop the read loop.
    ///
    /// Returns `false` if there was no open connection. Registries are kept,
    /// so Topics and Services survive a reconnect.
    pub async fn disconnect(&self) -> bool {
        // Release a send stuck on the transport before taking the send lock.
        self.inner.shutdown.send_replace(true);
        let mut link = self.inner.link.lock().await;
        let Some(mut sink) = link.sink.take() else {
            return false;
        };
        self.inner.connected.store(false, Ordering::SeqCst);
        if let Some(reader) = self.inner.reader.lock().take() {
            reader.abort();
        }
        let limit = self.inner.config.connect_timeout_duration();
        match tokio::time::timeout(limit, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Closing {}: {}", self.url(), e),
            Err(_) => debug!("Closing {} timed out", self.url()),
        }
        info!("Disconnected from {}", self.url());
        true
    }

    /// Serialize and write one envelope. Never retries.
    ///
    /// A write still pending when [`disconnect`](Self::disconnect) starts
    /// fails with [`RosError::NotConnected`].
    pub async fn send<P: Serialize>(&self, envelope: &Envelope<P>) -> RosResult<()> {
        let text = envelope.to_json().map_err(RosError::Encode)?;
        let shutdown = self.inner.shutdown.subscribe();
        let mut link = self.inner.link.lock().await;
        let sink = link.sink.as_mut().ok_or(RosError::NotConnected)?;
        trace!("-> {}", text);
        tokio::select! {
            sent = sink.send_text(text) => sent?,
            () = closing(shutdown) => return Err(RosError::NotConnected),
        }
        Ok(())
    }

    /// Current counter value, then increment it.
    pub fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// `"<verb>:<name>:<counter>"`
    pub(crate) fn correlation_id(&self, verb: &str, name: &str) -> String {
        format!("{}:{}:{}", verb, name, self.next_id())
    }

    /// Send an `auth` envelope. No reply is expected.
    pub async fn authenticate(&self, credentials: Authenticate) -> RosResult<()> {
        let envelope: Envelope = Envelope::Auth(credentials);
        self.send(&envelope).await
    }

    /// Run one inbound text frame through resolve, decode and dispatch.
    ///
    /// The read loop calls this for every frame it receives. Invalid frames
    /// are logged and dropped.
    pub fn handle_text(&self, text: &str) {
        self.inner.handle_text(text, 0);
    }

    /// Names with a registered Topic, sorted.
    pub fn topic_names(&self) -> Vec<String> {
        self.inner.registry.topic_names()
    }

    /// Names with a registered Service, sorted.
    pub fn service_names(&self) -> Vec<String> {
        self.inner.registry.service_names()
    }

    pub(crate) fn register_topic(
        &self,
        name: &str,
        entry: Arc<dyn TopicEntry>,
    ) -> RosResult<()> {
        Ok(self.inner.registry.register_topic(name, entry)?)
    }

    pub(crate) fn deregister_topic(&self, name: &str, entry: &Arc<dyn TopicEntry>) -> bool {
        self.inner.registry.deregister_topic(name, entry)
    }

    pub(crate) fn register_service(
        &self,
        name: &str,
        entry: Arc<dyn ServiceEntry>,
    ) -> RosResult<()> {
        Ok(self.inner.registry.register_service(name, entry)?)
    }

    pub(crate) fn deregister_service(&self, name: &str, entry: &Arc<dyn ServiceEntry>) -> bool {
        self.inner.registry.deregister_service(name, entry)
    }

    /// Whether two handles share one connection.
    pub fn same_connection(&self, other: &Ros) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Ros {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ros")
            .field("url", &self.url())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl RosInner {
    fn handle_text(&self, text: &str, depth: usize) {
        trace!("<- {}", text);
        match resolver::decode(text, &self.registry) {
            Ok(resolved) => self.dispatch(resolved, depth),
            Err(InboundError::Decode(
                e @ (DecodeError::UnresolvedTopic(_) | DecodeError::UnresolvedService(_)),
            )) => {
                debug!("Dropping inbound frame: {}", e);
            }
            Err(e) => warn!("Dropping inbound frame: {}", e),
        }
    }

    fn dispatch(&self, resolved: Resolved, depth: usize) {
        match (resolved.envelope, resolved.target) {
            (Envelope::Publish(m), Target::Topic(topic)) => {
                topic.deliver(m.msg, m.id.as_deref());
            }
            (Envelope::CallService(m), Target::Request(service)) => {
                service.on_request(m.args, m.id.as_deref());
            }
            (Envelope::ServiceResponse(m), Target::Response(service)) => {
                service.on_response(m.values, m.result, m.id.as_deref());
                self.registry.deregister_service(&m.service, &service);
            }
            (Envelope::Png(m), _) => self.unwrap_png(m, depth),
            (Envelope::Fragment(m), _) => self.reassemble(m, depth),
            (other, _) => debug!("Ignoring inbound '{}'", other.op()),
        }
    }

    fn unwrap_png(&self, envelope: PngCompression, depth: usize) {
        if depth >= MAX_UNWRAP_DEPTH {
            warn!("Dropping png envelope: {}", DecodeError::TooDeep);
            return;
        }

        // A large image may itself arrive split over several png envelopes.
        let data = match envelope.total {
            Some(total) if total > 1 => {
                let Some(id) = envelope.id else {
                    warn!("Dropping png piece without id");
                    return;
                };
                let piece = Fragment {
                    id: format!("png:{}", id),
                    data: envelope.data,
                    num: envelope.num,
                    total: envelope.total,
                };
                let pushed = self.fragments.lock().push(piece);
                match pushed {
                    Ok(Some(data)) => data,
                    Ok(None) => return,
                    Err(e) => {
                        warn!("Dropping png piece: {}", e);
                        return;
                    }
                }
            }
            _ => envelope.data,
        };

        match crate::png::decode_text(&data) {
            Ok(text) => self.handle_text(&text, depth + 1),
            Err(e) => warn!("Dropping png envelope: {}", e),
        }
    }

    fn reassemble(&self, fragment: Fragment, depth: usize) {
        if depth >= MAX_UNWRAP_DEPTH {
            warn!("Dropping fragment: {}", DecodeError::TooDeep);
            return;
        }
        let pushed = self.fragments.lock().push(fragment);
        match pushed {
            Ok(Some(text)) => self.handle_text(&text, depth + 1),
            Ok(None) => {}
            Err(e) => warn!("Dropping fragment: {}", e),
        }
    }

    /// Read loop ended on its own: forget the sink if it is still ours.
    async fn connection_lost(&self, generation: u64) {
        let mut link = self.link.lock().await;
        if link.generation == generation && link.sink.take().is_some() {
            self.connected.store(false, Ordering::SeqCst);
            self.reader.lock().take();
        }
    }
}

impl Drop for RosInner {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

/// Resolves once `disconnect` has been requested.
async fn closing(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closing| *closing).await;
}

async fn read_loop(inner: Weak<RosInner>, mut source: Box<dyn FrameSource>, generation: u64) {
    loop {
        let frame = source.next_text().await;
        let Some(ros) = inner.upgrade() else {
            break;
        };
        match frame {
            Some(Ok(text)) => ros.handle_text(&text, 0),
            Some(Err(e)) => {
                warn!("Read from {} failed: {}", ros.config.url(), e);
                ros.connection_lost(generation).await;
                break;
            }
            None => {
                info!("Bridge {} closed the connection", ros.config.url());
                ros.connection_lost(generation).await;
                break;
            }
        }
    }
}
