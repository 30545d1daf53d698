// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Minimal rosbridge server for integration tests.
//!
//! Accepts websocket clients on an ephemeral localhost port, one at a time.
//! Every text frame a client sends is recorded; frames queued with
//! [`DummyBridge::send`] go to the connected client.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use rosbridge::RosConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DummyBridge {
    port: u16,
    received: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

impl DummyBridge {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let outbound_rx = Arc::new(Mutex::new(outbound_rx));

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                serve(ws, received_tx.clone(), Arc::clone(&outbound_rx)).await;
            }
        });

        Self {
            port,
            received,
            outbound,
            task,
        }
    }

    pub fn config(&self) -> RosConfig {
        RosConfig::new("127.0.0.1", self.port)
    }

    /// Next frame the client sent.
    pub async fn next_frame(&mut self) -> String {
        tokio::time::timeout(FRAME_TIMEOUT, self.received.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("bridge stopped")
    }

    /// Assert the client sends nothing for a short while.
    pub async fn assert_quiet(&mut self) {
        let frame = tokio::time::timeout(Duration::from_millis(150), self.received.recv()).await;
        assert!(frame.is_err(), "unexpected frame: {:?}", frame);
    }

    pub fn send(&self, text: impl Into<String>) {
        self.outbound
            .send(Message::text(text.into()))
            .expect("bridge stopped");
    }

    /// Close the current client connection from the server side.
    pub fn close(&self) {
        self.outbound
            .send(Message::Close(None))
            .expect("bridge stopped");
    }
}

impl Drop for DummyBridge {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    ws: WebSocketStream<TcpStream>,
    received: mpsc::UnboundedSender<String>,
    outbound: Arc<Mutex<mpsc::UnboundedReceiver<Message>>>,
) {
    let (mut sink, mut stream) = ws.split();
    let mut outbound = outbound.lock().await;
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = received.send(text.as_str().to_owned());
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            message = outbound.recv() => match message {
                Some(message) => {
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
}

/// Wait until `condition` holds, polling briefly.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Receive one item or panic after [`FRAME_TIMEOUT`].
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(FRAME_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("channel closed")
}
