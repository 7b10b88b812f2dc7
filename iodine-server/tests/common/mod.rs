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

#![allow(dead_code)]

use axum::Router;
use iodine_common::conf::{ClusterStoreKind, IodineConf};
use iodine_common::state::Cluster;
use iodine_common::utils::{ManualClock, Utils};
use iodine_server::auth::{ChallengeSignature, TokenCodec};
use iodine_server::center::{CenterContext, IodineCenter};
use iodine_server::probe::FixedBandwidthProbe;
use iodine_server::registry::NodeRegistry;
use iodine_server::web::WebRouter;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

pub const FILE_BODY: &[u8] = b"hello";
// sha1("hello")
pub const FILE_HASH: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

/// A center wired with an in-memory registry, a frozen clock and a fixed probe result.
pub struct TestCenter {
    pub ctx: Arc<CenterContext>,
    pub clock: Arc<ManualClock>,
    pub files_dir: PathBuf,
}

impl TestCenter {
    pub fn new(name: &str, mbps: f64) -> Self {
        let dir = Utils::test_sub_dir(name);
        let mut conf = IodineConf::default();
        conf.server.files_dir = dir.join("files").to_string_lossy().to_string();
        conf.server.data_dir = dir.join("data").to_string_lossy().to_string();
        conf.server.cluster_store = ClusterStoreKind::Memory;
        conf.init().unwrap();
        IodineCenter::prepare_dirs(&conf.server).unwrap();

        let files_dir = PathBuf::from(&conf.server.files_dir);
        fs::create_dir_all(files_dir.join("sub")).unwrap();
        fs::write(files_dir.join("a.txt"), FILE_BODY).unwrap();

        let registry = NodeRegistry::memory(vec![
            Cluster::new("c1", "s1"),
            Cluster::new("c2", "s2"),
            Cluster::new("banned", "s3").with_ban("serving stale files"),
        ]);
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let ctx = CenterContext::with_parts(
            conf,
            registry,
            TokenCodec::new("test-server-key"),
            Arc::new(FixedBandwidthProbe::new(mbps)),
            clock.clone(),
        )
        .unwrap();

        Self {
            ctx: Arc::new(ctx),
            clock,
            files_dir,
        }
    }

    pub fn app(&self) -> Router {
        WebRouter::build(self.ctx.clone())
    }

    /// Serve on an ephemeral loopback port.
    pub async fn spawn(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = self.app();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        addr
    }

    pub fn token(&self, cluster_id: &str, secret: &str) -> String {
        let challenge = self.ctx.auth.issue_challenge(cluster_id).unwrap();
        let signature = ChallengeSignature::sign(secret, &challenge);
        self.ctx
            .auth
            .exchange_token(cluster_id, &challenge, &signature)
            .unwrap()
            .token
    }
}
