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
use crate::web::control_channel;
use crate::web::handlers;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct WebRouter;

impl WebRouter {
    pub const CHALLENGE: &'static str = "/openbmclapi-agent/challenge";
    pub const TOKEN: &'static str = "/openbmclapi-agent/token";
    pub const CHANNEL: &'static str = "/openbmclapi-agent/channel";

    /// Every HTTP endpoint of the center.
    pub fn build(ctx: Arc<CenterContext>) -> Router {
        Router::new()
            .route(Self::CHALLENGE, get(handlers::challenge))
            .route(Self::TOKEN, post(handlers::token))
            .route(Self::CHANNEL, get(control_channel::channel))
            .route("/openbmclapi/configuration", get(handlers::configuration))
            .route("/openbmclapi/files", get(handlers::manifest))
            .route("/openbmclapi/download/:hash", get(handlers::download))
            .route("/files/*path", get(handlers::file))
            .route("/iodine/cluster-list", get(handlers::cluster_list))
            .route("/iodine/online", get(handlers::online))
            .route("/metrics", get(handlers::metrics))
            .route("/healthz", get(|| async { "ok" }))
            .layer(TraceLayer::new_for_http())
            .with_state(ctx)
    }
}
