// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end behavior over the in-process transport.

#![allow(clippy::missing_panics_doc)] // Tests panic on failure

use rosbridge::{MemoryPeer, MemoryTransport, Ros, RosConfig, Service, Topic};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

async fn connected() -> (Ros, MemoryPeer) {
    let (transport, peer) = MemoryTransport::pair();
    let ros = Ros::with_transport(RosConfig::default(), Arc::new(transport));
    ros.connect().await.expect("connect");
    (ros, peer)
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out")
        .expect("closed")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ids_unique_across_tasks() {
    let (ros, _peer) = connected().await;
    let mut tasks = Vec::new();
    for _ in 0..4 {
        let ros = ros.clone();
        tasks.push(tokio::spawn(async move {
            (0..250).map(|_| ros.next_id()).collect::<Vec<_>>()
        }));
    }
    let mut seen = HashSet::new();
    for task in tasks {
        for id in task.await.expect("join") {
            assert!(seen.insert(id), "id {} repeated", id);
        }
    }
    assert_eq!(seen.len(), 1000);
    assert_eq!(ros.next_id(), 1000);
}

#[tokio::test]
async fn test_topic_and_service_share_one_link() {
    let (ros, mut peer) = connected().await;

    let topic = Topic::<Value>::new(&ros, "/status", "std_msgs/String");
    let (topic_tx, mut topic_rx) = mpsc::unbounded_channel();
    topic
        .subscribe("s", move |msg: &Value, _| {
            let _ = topic_tx.send(msg.clone());
        })
        .await
        .expect("subscribe");

    let service = Service::<Value, Value>::new(&ros, "/status", "std_srvs/Trigger");
    let (call_tx, mut call_rx) = mpsc::unbounded_channel();
    service
        .call(&json!({}), move |reply| {
            let _ = call_tx.send(reply);
        })
        .await
        .expect("call");

    // Topics and services live in separate namespaces.
    assert_eq!(ros.topic_names(), ["/status"]);
    assert_eq!(ros.service_names(), ["/status"]);

    let sent = peer.drain_sent();
    assert_eq!(sent.len(), 2);
    let call: Value = serde_json::from_str(&sent[1]).expect("json");
    assert_eq!(call["id"], "call_service:/status:1");

    assert!(peer.inject(r#"{"op":"publish","topic":"/status","msg":{"data":"ok"}}"#));
    assert!(peer.inject(
        r#"{"op":"service_response","service":"/status","id":"call_service:/status:1","values":{"success":true}}"#
    ));

    assert_eq!(recv(&mut topic_rx).await, json!({"data": "ok"}));
    let reply = recv(&mut call_rx).await;
    assert!(reply.result);
    assert_eq!(reply.values, Some(json!({"success": true})));

    // The read loop releases the idle service right after the callback.
    for _ in 0..100 {
        if ros.service_names().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(ros.service_names().is_empty());
}

#[tokio::test]
async fn test_png_pieces_reassembled() {
    let (ros, peer) = connected().await;
    let topic = Topic::<Value>::new(&ros, "t", "std_msgs/Int32");
    let (tx, mut rx) = mpsc::unbounded_channel();
    topic
        .subscribe("s", move |msg: &Value, _| {
            let _ = tx.send(msg.clone());
        })
        .await
        .expect("subscribe");

    let data = rosbridge::png::encode_text(r#"{"op":"publish","topic":"t","msg":{"a":1}}"#)
        .expect("encode");
    let (head, tail) = data.split_at(data.len() / 2);
    assert!(peer.inject(json!({"op":"png","id":"p1","data":tail,"num":1,"total":2}).to_string()));
    assert!(peer.inject(json!({"op":"png","id":"p1","data":head,"num":0,"total":2}).to_string()));

    assert_eq!(recv(&mut rx).await, json!({"a": 1}));
}
