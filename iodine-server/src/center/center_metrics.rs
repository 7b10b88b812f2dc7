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

use iodine_common::error::IodineError;
use iodine_common::IodineResult;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct CenterMetrics {
    registry: Registry,

    pub(crate) online_nodes: IntGauge,
    pub(crate) control_channels: IntGauge,

    // label: accepted | below_threshold | probe_failed | rejected
    pub(crate) enable_total: IntCounterVec,
    pub(crate) disable_total: IntCounter,

    pub(crate) keep_alive_total: IntCounter,
    pub(crate) keep_alive_hits: IntCounter,
    pub(crate) keep_alive_bytes: IntCounter,

    // label: local | redirect | not_found
    pub(crate) route_total: IntCounterVec,

    pub(crate) manifest_files: IntGauge,
    pub(crate) manifest_refresh_failures: IntCounter,
}

impl CenterMetrics {
    pub fn new() -> IodineResult<Self> {
        let registry = Registry::new_custom(Some("iodine".to_string()), None).map_err(Self::err)?;

        let m = Self {
            online_nodes: IntGauge::new("online_nodes", "Nodes in the online pool")
                .map_err(Self::err)?,
            control_channels: IntGauge::new("control_channels", "Open control channels")
                .map_err(Self::err)?,
            enable_total: IntCounterVec::new(
                Opts::new("enable_total", "Enable requests by outcome"),
                &["outcome"],
            )
            .map_err(Self::err)?,
            disable_total: IntCounter::new("disable_total", "Disable requests")
                .map_err(Self::err)?,
            keep_alive_total: IntCounter::new("keep_alive_total", "Keep-alive messages")
                .map_err(Self::err)?,
            keep_alive_hits: IntCounter::new("keep_alive_hits", "Hits reported by nodes")
                .map_err(Self::err)?,
            keep_alive_bytes: IntCounter::new("keep_alive_bytes", "Bytes reported by nodes")
                .map_err(Self::err)?,
            route_total: IntCounterVec::new(
                Opts::new("route_total", "File requests by routing decision"),
                &["decision"],
            )
            .map_err(Self::err)?,
            manifest_files: IntGauge::new("manifest_files", "Files in the current manifest")
                .map_err(Self::err)?,
            manifest_refresh_failures: IntCounter::new(
                "manifest_refresh_failures",
                "Failed manifest recomputations",
            )
            .map_err(Self::err)?,
            registry,
        };

        m.register(Box::new(m.online_nodes.clone()))?;
        m.register(Box::new(m.control_channels.clone()))?;
        m.register(Box::new(m.enable_total.clone()))?;
        m.register(Box::new(m.disable_total.clone()))?;
        m.register(Box::new(m.keep_alive_total.clone()))?;
        m.register(Box::new(m.keep_alive_hits.clone()))?;
        m.register(Box::new(m.keep_alive_bytes.clone()))?;
        m.register(Box::new(m.route_total.clone()))?;
        m.register(Box::new(m.manifest_files.clone()))?;
        m.register(Box::new(m.manifest_refresh_failures.clone()))?;

        Ok(m)
    }

    pub fn enable_outcome(&self, outcome: &str) {
        self.enable_total.with_label_values(&[outcome]).inc();
    }

    pub fn route_decision(&self, decision: &str) {
        self.route_total.with_label_values(&[decision]).inc();
    }

    pub fn text_output(&self) -> IodineResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(Self::err)?;
        String::from_utf8(buf).map_err(|e| IodineError::encode(e.to_string()))
    }

    fn register(&self, c: Box<dyn prometheus::core::Collector>) -> IodineResult<()> {
        self.registry.register(c).map_err(Self::err)
    }

    fn err(e: prometheus::Error) -> IodineError {
        IodineError::Common(format!("metrics: {}", e))
    }
}
