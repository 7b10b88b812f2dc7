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
use crate::error::{AuthError, FileError};
use crate::pool::OnlinePoolEntry;
use crate::router::RouteDecision;
use axum::body::Body;
use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use iodine_common::state::ClusterInfo;
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use std::path::Path as FsPath;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

type Ctx = State<Arc<CenterContext>>;

#[derive(Debug, Deserialize)]
pub(crate) struct ChallengeQuery {
    // Missing is an unknown cluster, answered like any other.
    #[serde(rename = "clusterId", default)]
    cluster_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenRequest {
    cluster_id: String,
    challenge: String,
    signature: String,
}

pub(crate) async fn challenge(State(ctx): Ctx, Query(q): Query<ChallengeQuery>) -> Response {
    match ctx.auth.issue_challenge(&q.cluster_id) {
        Ok(challenge) => Json(json!({ "challenge": challenge })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Accepts a JSON body or a urlencoded form. Every failure is a 401.
pub(crate) async fn token(State(ctx): Ctx, req: Request) -> Response {
    let is_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    let body = if is_json {
        Json::<TokenRequest>::from_request(req, &())
            .await
            .map(|Json(v)| v)
            .map_err(|e| e.body_text())
    } else {
        Form::<TokenRequest>::from_request(req, &())
            .await
            .map(|Form(v)| v)
            .map_err(|e| e.body_text())
    };

    let res = match body {
        Ok(b) => ctx
            .auth
            .exchange_token(&b.cluster_id, &b.challenge, &b.signature),
        Err(e) => Err(AuthError::InvalidChallenge(e)),
    };

    match res {
        Ok(token) => Json(token).into_response(),
        Err(AuthError::Internal(e)) => {
            error!("Token exchange failed: {}", e);
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
        Err(e) => {
            info!("Token exchange refused: {}", e);
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

pub(crate) async fn configuration(State(ctx): Ctx) -> Response {
    let sync = &ctx.conf.sync;
    Json(json!({
        "sync": {
            "source": sync.source,
            "concurrency": sync.concurrency,
        }
    }))
    .into_response()
}

pub(crate) async fn manifest(State(ctx): Ctx) -> Response {
    let snapshot = ctx.manifest.current();
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        snapshot.encoded(),
    )
        .into_response()
}

pub(crate) async fn file(State(ctx): Ctx, Path(path): Path<String>) -> Response {
    match ctx.router.route(&path).await {
        Ok(RouteDecision::Local(local)) => {
            ctx.metrics.route_decision("local");
            send_file(&local).await
        }
        Ok(RouteDecision::Redirect { url, .. }) => {
            ctx.metrics.route_decision("redirect");
            redirect(&url)
        }
        Err(e) => {
            ctx.metrics.route_decision("not_found");
            e.into_response()
        }
    }
}

pub(crate) async fn download(State(ctx): Ctx, Path(hash): Path<String>) -> Response {
    match ctx.router.direct_download(&hash).await {
        Ok(local) => send_file(&local).await,
        Err(e) => e.into_response(),
    }
}

pub(crate) async fn cluster_list(State(ctx): Ctx) -> Response {
    match ctx.registry.list() {
        Ok(list) => {
            let list: Vec<ClusterInfo> = list.iter().map(|c| c.info()).collect();
            Json(list).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub(crate) async fn online(State(ctx): Ctx) -> Response {
    let list: Vec<OnlinePoolEntry> = ctx.pool.snapshot().iter().map(|e| (**e).clone()).collect();
    Json(list).into_response()
}

pub(crate) async fn metrics(State(ctx): Ctx) -> Response {
    ctx.update_pool_gauge();
    ctx.metrics
        .manifest_files
        .set(ctx.manifest.current().len() as i64);
    match ctx.metrics.text_output() {
        Ok(text) => text.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn send_file(local: &FsPath) -> Response {
    let file = match tokio::fs::File::open(local).await {
        Ok(v) => v,
        Err(e) => return FileError::from(e).into_response(),
    };
    let len = match file.metadata().await {
        Ok(m) => m.len(),
        Err(e) => return FileError::from(e).into_response(),
    };

    let mut resp = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    resp
}

fn redirect(url: &str) -> Response {
    match HeaderValue::from_str(url) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
