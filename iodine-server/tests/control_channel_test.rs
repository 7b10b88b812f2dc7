// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod common;

use common::TestCenter;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Channel = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn open(center: &TestCenter, addr: SocketAddr, cluster_id: &str, secret: &str) -> Channel {
    let url = format!(
        "ws://{}/openbmclapi-agent/channel?token={}",
        addr,
        center.token(cluster_id, secret)
    );
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn request(ws: &mut Channel, frame: Value) -> Value {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

fn no_redirect() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn enable_keep_alive_and_close() {
    let center = TestCenter::new("ws-lifecycle", 1000.0);
    let addr = center.spawn().await;
    let mut ws = open(&center, addr, "c2", "s2").await;

    let ack = request(
        &mut ws,
        json!({ "id": 1, "event": "enable", "data": { "port": 4000, "version": "1.13.1" } }),
    )
    .await;
    assert_eq!(ack, json!({ "id": 1, "ack": [null, true] }));
    let entry = center.ctx.pool.get("c2").unwrap();
    assert_eq!(entry.host, "127.0.0.1");
    assert_eq!(entry.port, 4000);

    let ack = request(
        &mut ws,
        json!({ "id": 2, "event": "keep-alive", "data": { "hits": 3, "bytes": 1024 } }),
    )
    .await;
    assert_eq!(ack["id"], 2);
    assert!(ack["ack"][0].is_null());
    assert!(ack["ack"][1].as_str().unwrap().starts_with("2023-11-14T"));

    // Enabled: files go to the node.
    let client = no_redirect();
    let resp = client
        .get(format!("http://{}/files/a.txt", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FOUND);
    let location = resp.headers()[reqwest::header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("http://127.0.0.1:4000/download/"));

    // The node goes away without disabling first.
    ws.close(None).await.unwrap();
    wait_until(|| center.ctx.pool.is_empty() && center.ctx.sessions.is_empty()).await;

    let resp = client
        .get(format!("http://{}/files/a.txt", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), common::FILE_BODY);
}

#[tokio::test]
async fn slow_node_is_told_why() {
    let center = TestCenter::new("ws-slow", 5.0);
    let addr = center.spawn().await;
    let mut ws = open(&center, addr, "c2", "s2").await;

    let ack = request(
        &mut ws,
        json!({ "id": 1, "event": "enable", "data": { "port": 4000 } }),
    )
    .await;
    assert_eq!(ack["id"], 1);
    let message = ack["ack"][0]["message"].as_str().unwrap();
    assert!(message.contains("below the required"), "{}", message);
    assert!(center.ctx.pool.is_empty());

    // Still connected: keep-alive is answered, with false.
    let ack = request(&mut ws, json!({ "id": 2, "event": "keep-alive" })).await;
    assert_eq!(ack, json!({ "id": 2, "ack": [null, false] }));
}

#[tokio::test]
async fn disable_then_enable_again() {
    let center = TestCenter::new("ws-disable", 1000.0);
    let addr = center.spawn().await;
    let mut ws = open(&center, addr, "c1", "s1").await;

    let enable = json!({ "id": 1, "event": "enable", "data": { "host": "10.0.0.9", "port": 4000 } });
    assert_eq!(request(&mut ws, enable.clone()).await["ack"], json!([null, true]));
    assert_eq!(center.ctx.pool.get("c1").unwrap().host, "10.0.0.9");

    let ack = request(&mut ws, json!({ "id": 2, "event": "disable" })).await;
    assert_eq!(ack["ack"], json!([null, true]));
    assert!(center.ctx.pool.is_empty());
    assert_eq!(center.ctx.sessions.len(), 1);

    assert_eq!(request(&mut ws, enable).await["ack"], json!([null, true]));
    assert!(center.ctx.pool.contains("c1"));
}

#[tokio::test]
async fn malformed_frames_are_rejected() {
    let center = TestCenter::new("ws-malformed", 1000.0);
    let addr = center.spawn().await;
    let mut ws = open(&center, addr, "c1", "s1").await;

    let ack = request(&mut ws, json!({ "id": 5, "event": "reboot" })).await;
    assert_eq!(ack["id"], 5);
    assert!(ack["ack"][0]["message"]
        .as_str()
        .unwrap()
        .contains("unknown event"));

    let ack = request(&mut ws, json!({ "id": 6, "event": "enable", "data": {} })).await;
    assert!(ack["ack"][0]["message"].is_string());
    assert!(center.ctx.pool.is_empty());
}

#[tokio::test]
async fn bad_token_is_refused_before_upgrade() {
    let center = TestCenter::new("ws-bad-token", 1000.0);
    let addr = center.spawn().await;

    let url = format!("ws://{}/openbmclapi-agent/channel?token=garbage", addr);
    match connect_async(url).await {
        Err(WsError::Http(resp)) => assert_eq!(resp.status(), 401),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
    assert!(center.ctx.sessions.is_empty());
}
