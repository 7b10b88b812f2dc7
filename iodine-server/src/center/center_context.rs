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

use crate::auth::{AuthBroker, TokenCodec};
use crate::center::CenterMetrics;
use crate::manifest::ManifestCache;
use crate::pool::OnlinePool;
use crate::probe::{AdmissionProbe, BandwidthProbe, HttpBandwidthProbe};
use crate::registry::NodeRegistry;
use crate::router::FileRouter;
use crate::session::SessionManager;
use crate::sign::UrlSigner;
use iodine_common::conf::IodineConf;
use iodine_common::utils::{Clock, SystemClock};
use iodine_common::IodineResult;
use std::sync::Arc;

/// Everything a running center owns. Built once at startup and handed to every
/// handler and control connection through an `Arc`.
pub struct CenterContext {
    pub conf: IodineConf,
    pub clock: Arc<dyn Clock>,
    pub registry: NodeRegistry,
    pub auth: Arc<AuthBroker>,
    pub pool: Arc<OnlinePool>,
    pub sessions: Arc<SessionManager>,
    pub admission: Arc<AdmissionProbe>,
    pub manifest: Arc<ManifestCache>,
    pub router: FileRouter,
    pub metrics: Arc<CenterMetrics>,
}

impl CenterContext {
    pub fn from_conf(conf: IodineConf) -> IodineResult<Self> {
        let registry = NodeRegistry::from_conf(&conf.server)?;
        let probe = Arc::new(HttpBandwidthProbe::new(conf.probe.timeout));
        let codec = TokenCodec::from_conf(&conf.auth);
        Self::with_parts(conf, registry, codec, probe, Arc::new(SystemClock))
    }

    pub fn with_parts(
        conf: IodineConf,
        registry: NodeRegistry,
        codec: TokenCodec,
        probe: Arc<dyn BandwidthProbe>,
        clock: Arc<dyn Clock>,
    ) -> IodineResult<Self> {
        let signer = UrlSigner::new(conf.auth.sign_ttl, clock.clone());
        let pool = Arc::new(OnlinePool::new());
        let auth = Arc::new(AuthBroker::new(
            registry.clone(),
            codec,
            clock.clone(),
            &conf.auth,
        ));
        let sessions = Arc::new(SessionManager::new(
            auth.clone(),
            registry.clone(),
            pool.clone(),
        ));
        let admission = Arc::new(AdmissionProbe::new(
            registry.clone(),
            pool.clone(),
            probe,
            signer.clone(),
            clock.clone(),
            &conf.probe,
        ));
        let manifest = Arc::new(ManifestCache::new(&conf.server.files_dir, clock.clone()));
        let router = FileRouter::new(
            &conf.server.files_dir,
            pool.clone(),
            manifest.clone(),
            signer,
        );
        let metrics = Arc::new(CenterMetrics::new()?);

        Ok(Self {
            conf,
            clock,
            registry,
            auth,
            pool,
            sessions,
            admission,
            manifest,
            router,
            metrics,
        })
    }

    pub fn update_pool_gauge(&self) {
        self.metrics.online_nodes.set(self.pool.len() as i64);
    }
}
