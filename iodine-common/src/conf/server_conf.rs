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

use crate::error::IodineError;
use crate::IodineResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStoreKind {
    // clusters.json under data_dir
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConf {
    pub name: String,
    pub hostname: String,
    pub port: u16,

    // Files served to clients and mirrored by nodes.
    pub files_dir: String,

    // Cluster registry and other local state.
    pub data_dir: String,

    pub worker_threads: usize,

    pub cluster_store: ClusterStoreKind,
}

impl ServerConf {
    pub const CLUSTER_FILE: &'static str = "clusters.json";

    pub fn init(&mut self) -> IodineResult<()> {
        if self.files_dir.trim().is_empty() {
            return Err(IodineError::invalid_conf("server.files_dir is empty"));
        }
        if self.data_dir.trim().is_empty() {
            return Err(IodineError::invalid_conf("server.data_dir is empty"));
        }
        if self.worker_threads == 0 {
            self.worker_threads = 1;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    pub fn cluster_file(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(Self::CLUSTER_FILE)
    }
}

impl Default for ServerConf {
    fn default() -> Self {
        Self {
            name: "iodine-center".to_string(),
            hostname: "0.0.0.0".to_string(),
            port: 8080,
            files_dir: "./files".to_string(),
            data_dir: "./data".to_string(),
            worker_threads: 8,
            cluster_store: ClusterStoreKind::File,
        }
    }
}
