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

use crate::error::ProbeError;
use crate::pool::{OnlinePool, OnlinePoolEntry};
use crate::probe::{BandwidthProbe, ProbeTarget};
use crate::registry::NodeRegistry;
use crate::session::Session;
use crate::sign::UrlSigner;
use iodine_common::conf::ProbeConf;
use iodine_common::state::ClusterEdit;
use iodine_common::utils::Clock;
use log::{info, warn};
use std::sync::Arc;

/// Decides whether a node that asked to be enabled may receive traffic.
pub struct AdmissionProbe {
    registry: NodeRegistry,
    pool: Arc<OnlinePool>,
    probe: Arc<dyn BandwidthProbe>,
    signer: UrlSigner,
    clock: Arc<dyn Clock>,
    min_bandwidth_mbps: f64,
    probe_size_mb: u32,
}

impl AdmissionProbe {
    pub fn new(
        registry: NodeRegistry,
        pool: Arc<OnlinePool>,
        probe: Arc<dyn BandwidthProbe>,
        signer: UrlSigner,
        clock: Arc<dyn Clock>,
        conf: &ProbeConf,
    ) -> Self {
        Self {
            registry,
            pool,
            probe,
            signer,
            clock,
            min_bandwidth_mbps: conf.min_bandwidth_mbps,
            probe_size_mb: conf.probe_size_mb,
        }
    }

    pub fn measure_path(&self) -> String {
        format!("/measure/{}", self.probe_size_mb)
    }

    pub fn probe_target(&self, edit: &ClusterEdit, secret: &str) -> ProbeTarget {
        let path = self.measure_path();
        ProbeTarget {
            url: format!(
                "http://{}:{}{}{}",
                edit.host,
                edit.port,
                path,
                self.signer.sign(&path, secret)
            ),
            expected_bytes: self.probe_size_mb as u64 * 1024 * 1024,
        }
    }

    /// Record the reported fields, probe the node and on success put it into the pool.
    /// Callers serialize runs of one cluster with [`OnlinePool::cluster_lock`].
    pub async fn admit(
        &self,
        session: &Session,
        edit: ClusterEdit,
    ) -> Result<Arc<OnlinePoolEntry>, ProbeError> {
        let cluster = self.registry.edit(&session.cluster_id, &edit)?;
        let target = self.probe_target(&edit, &cluster.secret);

        let mbps = match self.probe.measure(&target).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Cluster {} failed the admission probe: {}", session.cluster_id, e);
                return Err(e);
            }
        };
        if mbps < self.min_bandwidth_mbps {
            warn!(
                "Cluster {} measured {:.2} Mbps, below the {:.2} Mbps minimum",
                session.cluster_id, mbps, self.min_bandwidth_mbps
            );
            return Err(ProbeError::BelowThreshold {
                measured: mbps,
                minimum: self.min_bandwidth_mbps,
            });
        }

        let entry = OnlinePoolEntry {
            cluster_id: cluster.id,
            host: edit.host,
            port: edit.port,
            secret: cluster.secret,
            connection_id: session.connection_id,
            bandwidth_mbps: mbps,
            enabled_at: self.clock.now_ms(),
        };
        self.pool.upsert(entry.clone());
        info!("Cluster enabled: {}", entry);
        Ok(Arc::new(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FixedBandwidthProbe;
    use iodine_common::state::Cluster;
    use iodine_common::utils::ManualClock;
    use std::time::Duration;

    fn admission(probe: FixedBandwidthProbe) -> (AdmissionProbe, Arc<OnlinePool>, NodeRegistry) {
        let registry = NodeRegistry::memory(vec![Cluster::new("c2", "s2")]);
        let pool = Arc::new(OnlinePool::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let signer = UrlSigner::new(Duration::from_secs(300), clock.clone());
        let mut conf = ProbeConf::default();
        conf.init().unwrap();
        let admission = AdmissionProbe::new(
            registry.clone(),
            pool.clone(),
            Arc::new(probe),
            signer,
            clock,
            &conf,
        );
        (admission, pool, registry)
    }

    fn session(conn: u64) -> Session {
        Session {
            connection_id: conn,
            cluster_id: "c2".to_string(),
            cluster_secret: "s2".to_string(),
            token: String::new(),
            remote_addr: None,
        }
    }

    fn edit() -> ClusterEdit {
        ClusterEdit {
            host: "10.0.0.2".to_string(),
            port: 4000,
            version: "1.13.1".to_string(),
            runtime: "Node.js/v20.11.0".to_string(),
        }
    }

    #[tokio::test]
    async fn fast_node_is_admitted() {
        let (admission, pool, registry) = admission(FixedBandwidthProbe::new(1000.0));
        let entry = admission.admit(&session(1), edit()).await.unwrap();

        assert_eq!(entry.cluster_id, "c2");
        assert_eq!(entry.base_url(), "http://10.0.0.2:4000");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get("c2").unwrap().secret, "s2");
        assert_eq!(registry.get("c2").unwrap().unwrap().port, Some(4000));
    }

    #[tokio::test]
    async fn slow_node_is_refused() {
        let (admission, pool, registry) = admission(FixedBandwidthProbe::new(5.0));
        let err = admission.admit(&session(1), edit()).await.unwrap_err();

        assert!(matches!(err, ProbeError::BelowThreshold { .. }));
        assert!(err.to_string().contains("enable again"));
        assert!(pool.is_empty());
        // The report is recorded even when admission fails.
        assert_eq!(
            registry.get("c2").unwrap().unwrap().host.as_deref(),
            Some("10.0.0.2")
        );
    }

    #[tokio::test]
    async fn probe_failure_is_refused() {
        let (admission, pool, _) = admission(FixedBandwidthProbe::failing(ProbeError::Timeout {
            url: "u".to_string(),
            timeout_ms: 10_000,
        }));
        assert!(matches!(
            admission.admit(&session(1), edit()).await,
            Err(ProbeError::Timeout { .. })
        ));
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn concurrent_enables_leave_one_entry() {
        let (admission, pool, _) =
            admission(FixedBandwidthProbe::new(100.0).with_delay(Duration::from_millis(5)));
        let admission = Arc::new(admission);

        let mut tasks = tokio::task::JoinSet::new();
        for conn in 0..16 {
            let admission = admission.clone();
            tasks.spawn(async move { admission.admit(&session(conn), edit()).await });
        }
        while let Some(res) = tasks.join_next().await {
            assert!(res.unwrap().is_ok());
        }
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn target_is_signed_measure_url() {
        let (admission, _, _) = admission(FixedBandwidthProbe::new(1.0));
        let target = admission.probe_target(&edit(), "s2");
        assert!(target.url.starts_with("http://10.0.0.2:4000/measure/10?s="));
        assert!(target.url.contains("&e="));
        assert_eq!(target.expected_bytes, 10 * 1024 * 1024);
    }
}
