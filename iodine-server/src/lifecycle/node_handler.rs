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
use crate::error::ProbeError;
use crate::lifecycle::{
    AckFrame, ControlAck, ControlFrame, ControlRequest, EnableRequest, KeepAliveRequest,
    NodeEvent, NodeState,
};
use crate::session::Session;
use iodine_common::state::ClusterEdit;
use iodine_common::utils::LocalTime;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};

/// Lifecycle of one authenticated control connection.
///
/// Requests may run concurrently. Anything that changes the pool for this
/// cluster runs under the cluster's lock, and the state moves while that lock is held.
#[derive(Clone)]
pub struct NodeHandler {
    inner: Arc<Inner>,
}

struct Inner {
    ctx: Arc<CenterContext>,
    session: Arc<Session>,
    state: Mutex<NodeState>,
}

impl NodeHandler {
    pub fn new(ctx: Arc<CenterContext>, session: Arc<Session>) -> Self {
        let state = NodeState::Unauthenticated
            .apply(NodeEvent::Connect)
            .unwrap_or(NodeState::Connected);
        ctx.metrics.control_channels.inc();

        Self {
            inner: Arc::new(Inner {
                ctx,
                session,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn state(&self) -> NodeState {
        *self.lock_state()
    }

    /// Handle one text frame. Returns the answer to send, if any.
    pub async fn handle_text(&self, text: &str) -> Option<AckFrame> {
        let frame = match ControlFrame::parse(text) {
            Ok(v) => v,
            Err(e) => {
                let id = serde_json::from_str::<serde_json::Value>(text)
                    .ok()
                    .and_then(|v| v.get("id").and_then(|id| id.as_u64()));
                warn!("{}: {}", self.inner.session, e);
                return Some(AckFrame::new(id, &ControlAck::rejected(e)));
            }
        };

        let ack = match ControlRequest::from_frame(&frame) {
            Ok(req) => self.handle(req).await,
            Err(e) => {
                warn!("{}: {}", self.inner.session, e);
                ControlAck::rejected(e)
            }
        };
        frame.id.map(|id| AckFrame::new(Some(id), &ack))
    }

    pub async fn handle(&self, req: ControlRequest) -> ControlAck {
        debug!("{} sent {}", self.inner.session, req.name());
        match req {
            ControlRequest::Enable(req) => self.enable(req).await,
            ControlRequest::KeepAlive(req) => self.keep_alive(req),
            ControlRequest::Disable => self.disable().await,
        }
    }

    /// The connection is gone: drop its pool entry and its session.
    /// Requests still running must be stopped before this is called.
    pub async fn close(&self) {
        let ctx = &self.inner.ctx;
        let lock = ctx.pool.cluster_lock(&self.inner.session.cluster_id);
        let _guard = lock.lock().await;

        // Only a second close fails here.
        if self.transition(NodeEvent::Close).is_err() {
            return;
        }
        ctx.sessions.close(self.inner.session.connection_id);
        ctx.metrics.control_channels.dec();
        ctx.update_pool_gauge();
    }

    async fn enable(&self, req: EnableRequest) -> ControlAck {
        let ctx = &self.inner.ctx;
        let session = &self.inner.session;

        let edit = match self.cluster_edit(req) {
            Ok(v) => v,
            Err(msg) => {
                ctx.metrics.enable_outcome("rejected");
                return ControlAck::rejected(msg);
            }
        };

        let lock = ctx.pool.cluster_lock(&session.cluster_id);
        let _guard = lock.lock().await;
        if let Err(e) = self.check_live() {
            return ControlAck::rejected(e);
        }

        let (event, ack) = match ctx.admission.admit(session, edit).await {
            Ok(_) => {
                ctx.metrics.enable_outcome("accepted");
                (NodeEvent::EnableSucceeded, ControlAck::ok(true))
            }
            Err(e) => {
                let outcome = match e {
                    ProbeError::BelowThreshold { .. } => "below_threshold",
                    ProbeError::Registry(_) => "rejected",
                    _ => "probe_failed",
                };
                ctx.metrics.enable_outcome(outcome);
                (NodeEvent::EnableFailed, ControlAck::rejected(e))
            }
        };

        self.transition_or_warn(event);
        ctx.update_pool_gauge();
        ack
    }

    fn keep_alive(&self, req: KeepAliveRequest) -> ControlAck {
        let state = match self.transition(NodeEvent::KeepAlive) {
            Ok(v) => v,
            Err(e) => return ControlAck::rejected(e),
        };
        match state {
            NodeState::Enabled => {
                let metrics = &self.inner.ctx.metrics;
                metrics.keep_alive_total.inc();
                metrics.keep_alive_hits.inc_by(req.hits);
                metrics.keep_alive_bytes.inc_by(req.bytes);
                info!(
                    "Keep-alive from {}: hits = {}, bytes = {}",
                    self.inner.session.cluster_id, req.hits, req.bytes
                );
                ControlAck::ok(LocalTime::iso_string(self.inner.ctx.clock.now_ms()))
            }
            _ => ControlAck::ok(false),
        }
    }

    async fn disable(&self) -> ControlAck {
        let ctx = &self.inner.ctx;
        let cluster_id = &self.inner.session.cluster_id;

        let lock = ctx.pool.cluster_lock(cluster_id);
        let _guard = lock.lock().await;
        if let Err(e) = self.check_live() {
            return ControlAck::rejected(e);
        }

        if ctx.pool.remove(cluster_id) {
            info!("Cluster {} disabled", cluster_id);
        } else {
            debug!("Disable of cluster {} that is not online", cluster_id);
        }
        ctx.metrics.disable_total.inc();
        self.transition_or_warn(NodeEvent::Disable);
        ctx.update_pool_gauge();
        ControlAck::ok(true)
    }

    fn cluster_edit(&self, req: EnableRequest) -> Result<ClusterEdit, String> {
        let host = match req.host.filter(|h| !h.trim().is_empty()) {
            Some(h) => h,
            None => match self.inner.session.remote_addr {
                Some(addr) => addr.ip().to_string(),
                None => return Err("host is required".to_string()),
            },
        };
        if req.port == 0 {
            return Err("port is required".to_string());
        }

        Ok(ClusterEdit {
            host,
            port: req.port,
            version: req.version,
            runtime: req.flavor.runtime,
        })
    }

    fn check_live(&self) -> Result<(), String> {
        let state = self.state();
        if state.is_live() {
            Ok(())
        } else {
            Err(format!("connection is {}", state))
        }
    }

    fn transition(&self, event: NodeEvent) -> Result<NodeState, String> {
        let mut state = self.lock_state();
        let next = state.apply(event)?;
        *state = next;
        Ok(next)
    }

    fn transition_or_warn(&self, event: NodeEvent) {
        if let Err(e) = self.transition(event) {
            warn!("{}: {}", self.inner.session, e);
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, NodeState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
