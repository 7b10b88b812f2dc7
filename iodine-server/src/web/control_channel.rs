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

use crate::center::CenterContext;
use crate::lifecycle::NodeHandler;
use crate::session::Session;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use log::{error, warn};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

const WRITE_QUEUE: usize = 64;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChannelQuery {
    token: Option<String>,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|v| v.trim().to_string())
}

/// Authenticates before upgrading; a refused node never gets a socket.
pub(crate) async fn channel(
    State(ctx): State<Arc<CenterContext>>,
    connect: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<ChannelQuery>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let remote_addr = connect.map(|ConnectInfo(addr)| addr);
    let token = match query.token.or_else(|| bearer(&headers)) {
        Some(v) => v,
        None => return (StatusCode::UNAUTHORIZED, "missing token").into_response(),
    };

    let session = match ctx.sessions.open(&token, remote_addr) {
        Ok(v) => v,
        Err(e) => return (StatusCode::UNAUTHORIZED, e.to_string()).into_response(),
    };

    let ws = match ws {
        Some(v) => v,
        None => {
            ctx.sessions.close(session.connection_id);
            return (StatusCode::BAD_REQUEST, "websocket upgrade expected").into_response();
        }
    };

    let sessions = ctx.sessions.clone();
    let connection_id = session.connection_id;
    ws.on_failed_upgrade(move |e| {
        warn!("Upgrade of control channel {} failed: {}", connection_id, e);
        sessions.close(connection_id);
    })
    .on_upgrade(move |socket| serve(ctx, session, socket))
}

// Requests run as independent tasks; their acks reach the socket through one writer.
async fn serve(ctx: Arc<CenterContext>, session: Arc<Session>, socket: WebSocket) {
    let handler = NodeHandler::new(ctx, session);
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(WRITE_QUEUE);

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut tasks = JoinSet::new();
    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let handler = handler.clone();
                    let tx = tx.clone();
                    tasks.spawn(async move {
                        if let Some(ack) = handler.handle_text(&text).await {
                            let _ = tx.send(Message::Text(ack.to_text())).await;
                        }
                    });
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Control channel {} read error: {}", handler.session(), e);
                    break;
                }
            },

            Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!("Control request of {} panicked: {}", handler.session(), e);
                    }
                }
            }
        }
    }

    // Nothing may touch the pool on behalf of this connection after close.
    tasks.shutdown().await;
    handler.close().await;

    drop(tx);
    let _ = writer.await;
}
