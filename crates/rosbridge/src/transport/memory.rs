// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport.
//!
//! [`MemoryTransport`] stands in for a bridge without a socket: every frame
//! the client sends shows up on the paired [`MemoryPeer`], and frames the
//! peer injects arrive on the client's read loop. Each `open` starts a fresh
//! link; the peer always talks to the most recent one.

use super::{FrameSink, FrameSource, Link, Transport};
use crate::error::ConnectionError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

struct Shared {
    sent_tx: mpsc::UnboundedSender<String>,
    inbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    opens: AtomicUsize,
    refuse: AtomicBool,
    stall: AtomicBool,
    fail_sends: AtomicBool,
    stall_sends: AtomicBool,
}

/// Transport half handed to `Ros`.
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Bridge side of a [`MemoryTransport`].
pub struct MemoryPeer {
    shared: Arc<Shared>,
    sent_rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryTransport {
    /// Create a transport and the peer that observes it.
    pub fn pair() -> (Self, MemoryPeer) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            sent_tx,
            inbound: Mutex::new(None),
            opens: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
            stall: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            stall_sends: AtomicBool::new(false),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MemoryPeer { shared, sent_rx },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &str) -> Result<Link, ConnectionError> {
        if self.shared.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(ConnectionError::Open {
                url: url.to_owned(),
                reason: "connection refused".into(),
            });
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        *self.shared.inbound.lock() = Some(inbound_tx);
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        Ok((
            Box::new(MemorySink {
                shared: Arc::clone(&self.shared),
                closed: false,
            }),
            Box::new(MemorySource { rx: inbound_rx }),
        ))
    }
}

struct MemorySink {
    shared: Arc<Shared>,
    closed: bool,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        if self.shared.fail_sends.load(Ordering::SeqCst) {
            return Err(ConnectionError::Send("peer rejected frame".into()));
        }
        if self.shared.stall_sends.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.shared
            .sent_tx
            .send(text)
            .map_err(|_| ConnectionError::Closed)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.closed = true;
        self.shared.inbound.lock().take();
        Ok(())
    }
}

struct MemorySource {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn next_text(&mut self) -> Option<Result<String, ConnectionError>> {
        self.rx.recv().await.map(Ok)
    }
}

impl MemoryPeer {
    /// Wait for the next frame the client sends.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent_rx.recv().await
    }

    /// Next already-sent frame, without waiting.
    pub fn try_sent(&mut self) -> Option<String> {
        self.sent_rx.try_recv().ok()
    }

    /// Every frame sent so far that has not been read yet.
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_sent() {
            frames.push(frame);
        }
        frames
    }

    /// Deliver a frame to the client's read loop. Returns `false` if no link
    /// is open.
    pub fn inject(&self, text: impl Into<String>) -> bool {
        match self.shared.inbound.lock().as_ref() {
            Some(tx) => tx.send(text.into()).is_ok(),
            None => false,
        }
    }

    /// Close the current link from the bridge side.
    pub fn close(&self) {
        self.shared.inbound.lock().take();
    }

    /// Whether a link is currently open.
    pub fn is_linked(&self) -> bool {
        self.shared
            .inbound
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Number of successful `open` calls.
    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Make subsequent `open` calls fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make subsequent `open` calls never complete.
    pub fn stall_connections(&self, stall: bool) {
        self.shared.stall.store(stall, Ordering::SeqCst);
    }

    /// Make every send fail until reset.
    pub fn fail_sends(&self, fail: bool) {
        self.shared.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make every send hang, like a peer that stopped reading. Sends already
    /// hanging stay stuck until cancelled.
    pub fn stall_sends(&self, stall: bool) {
        self.shared.stall_sends.store(stall, Ordering::SeqCst);
    }
}
