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

use crate::registry::{ClusterStore, FileClusterStore, MemClusterStore};
use iodine_common::conf::{ClusterStoreKind, ServerConf};
use iodine_common::err_box;
use iodine_common::state::{Cluster, ClusterEdit};
use iodine_common::IodineResult;
use log::info;
use std::sync::Arc;

/// Durable record of every known cluster.
#[derive(Clone)]
pub struct NodeRegistry {
    store: Arc<dyn ClusterStore>,
}

impl NodeRegistry {
    pub fn new(store: Arc<dyn ClusterStore>) -> Self {
        Self { store }
    }

    pub fn memory(clusters: Vec<Cluster>) -> Self {
        Self::new(Arc::new(MemClusterStore::with_clusters(clusters)))
    }

    pub fn from_conf(conf: &ServerConf) -> IodineResult<Self> {
        let store: Arc<dyn ClusterStore> = match conf.cluster_store {
            ClusterStoreKind::File => Arc::new(FileClusterStore::open(conf.cluster_file())?),
            ClusterStoreKind::Memory => {
                info!("Cluster registry is in memory, records are lost on restart");
                Arc::new(MemClusterStore::new())
            }
        };
        Ok(Self::new(store))
    }

    pub fn get(&self, id: &str) -> IodineResult<Option<Cluster>> {
        self.store.get(id)
    }

    pub fn put(&self, cluster: Cluster) -> IodineResult<()> {
        self.store.put(cluster)
    }

    /// Apply the reported fields to an existing record, leaving everything else untouched.
    pub fn edit(&self, id: &str, edit: &ClusterEdit) -> IodineResult<Cluster> {
        let mut cluster = match self.store.get(id)? {
            Some(v) => v,
            None => return err_box!("cluster {} not found", id),
        };

        cluster.apply(edit);
        self.store.put(cluster.clone())?;
        Ok(cluster)
    }

    pub fn list(&self) -> IodineResult<Vec<Cluster>> {
        self.store.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_updates_reported_fields_only() {
        let registry = NodeRegistry::memory(vec![Cluster::new("c1", "s1").with_ban("x")]);
        let edit = ClusterEdit {
            host: "1.2.3.4".to_string(),
            port: 4000,
            version: "1.13.1".to_string(),
            runtime: "Node.js/v20.11.0".to_string(),
        };

        let updated = registry.edit("c1", &edit).unwrap();
        assert_eq!(updated.secret, "s1");
        assert!(updated.is_banned);
        assert_eq!(registry.get("c1").unwrap().unwrap().port, Some(4000));
    }

    #[test]
    fn edit_of_unknown_cluster_fails() {
        let registry = NodeRegistry::memory(vec![]);
        let edit = ClusterEdit {
            host: "h".to_string(),
            port: 1,
            version: "v".to_string(),
            runtime: "r".to_string(),
        };
        assert!(registry.edit("nope", &edit).is_err());
    }
}
