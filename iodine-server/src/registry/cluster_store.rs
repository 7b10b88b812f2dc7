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

use dashmap::DashMap;
use iodine_common::error::IodineError;
use iodine_common::state::Cluster;
use iodine_common::IodineResult;
use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Keyed store of cluster records. Records are never deleted through this interface.
pub trait ClusterStore: Send + Sync {
    fn get(&self, id: &str) -> IodineResult<Option<Cluster>>;

    fn put(&self, cluster: Cluster) -> IodineResult<()>;

    fn list(&self) -> IodineResult<Vec<Cluster>>;
}

#[derive(Default)]
pub struct MemClusterStore {
    clusters: DashMap<String, Cluster>,
}

impl MemClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clusters(clusters: Vec<Cluster>) -> Self {
        let store = Self::new();
        for c in clusters {
            store.clusters.insert(c.id.clone(), c);
        }
        store
    }
}

impl ClusterStore for MemClusterStore {
    fn get(&self, id: &str) -> IodineResult<Option<Cluster>> {
        Ok(self.clusters.get(id).map(|x| x.value().clone()))
    }

    fn put(&self, cluster: Cluster) -> IodineResult<()> {
        self.clusters.insert(cluster.id.clone(), cluster);
        Ok(())
    }

    fn list(&self) -> IodineResult<Vec<Cluster>> {
        let mut list: Vec<Cluster> = self.clusters.iter().map(|x| x.value().clone()).collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }
}

/// A JSON array of clusters on disk, fully cached in memory.
/// Every put rewrites the file through a temp file and a rename.
pub struct FileClusterStore {
    path: PathBuf,
    cache: MemClusterStore,
    write_lock: Mutex<()>,
}

impl FileClusterStore {
    pub fn open(path: impl AsRef<Path>) -> IodineResult<Self> {
        let path = path.as_ref().to_path_buf();
        let clusters: Vec<Cluster> = if path.exists() {
            let content = fs::read(&path)?;
            if content.is_empty() {
                vec![]
            } else {
                serde_json::from_slice(&content)?
            }
        } else {
            vec![]
        };

        info!(
            "Loaded {} clusters from {}",
            clusters.len(),
            path.display()
        );

        Ok(Self {
            path,
            cache: MemClusterStore::with_clusters(clusters),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> IodineResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| IodineError::store("cluster store lock poisoned"))?;

        let list = self.cache.list()?;
        let bytes = serde_json::to_vec_pretty(&list)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!("Flushed {} clusters to {}", list.len(), self.path.display());
        Ok(())
    }
}

impl ClusterStore for FileClusterStore {
    fn get(&self, id: &str) -> IodineResult<Option<Cluster>> {
        self.cache.get(id)
    }

    fn put(&self, cluster: Cluster) -> IodineResult<()> {
        self.cache.put(cluster)?;
        self.flush()
    }

    fn list(&self) -> IodineResult<Vec<Cluster>> {
        self.cache.list()
    }
}
