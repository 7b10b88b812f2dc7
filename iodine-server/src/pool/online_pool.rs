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

use crate::error::PoolError;
use dashmap::DashMap;
use indexmap::IndexMap;
use rand::Rng;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// A node that currently receives redirected traffic. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlinePoolEntry {
    pub cluster_id: String,
    pub host: String,
    pub port: u16,
    #[serde(skip)]
    pub secret: String,
    // The control connection that enabled this entry.
    pub connection_id: u64,
    pub bandwidth_mbps: f64,
    pub enabled_at: u64,
}

impl OnlinePoolEntry {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Display for OnlinePoolEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cluster_id = {}, addr = {}:{}, conn = {}, bandwidth = {:.2} Mbps",
            self.cluster_id, self.host, self.port, self.connection_id, self.bandwidth_mbps
        )
    }
}

/// Nodes eligible for redirects, at most one entry per cluster id.
///
/// Every mutation takes the write lock, so readers always observe a state that
/// some sequence of complete mutations produced. Slow work that ends in a
/// mutation of a single cluster (the admission probe) is serialized through
/// [`OnlinePool::cluster_lock`] instead of holding the map lock.
#[derive(Default)]
pub struct OnlinePool {
    entries: RwLock<IndexMap<String, Arc<OnlinePoolEntry>>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl OnlinePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry of `entry.cluster_id`. Returns the replaced entry.
    pub fn upsert(&self, entry: OnlinePoolEntry) -> Option<Arc<OnlinePoolEntry>> {
        let mut entries = self.write();
        entries.insert(entry.cluster_id.clone(), Arc::new(entry))
    }

    /// Remove the entry of a cluster; absent is a no-op.
    pub fn remove(&self, cluster_id: &str) -> bool {
        self.write().swap_remove(cluster_id).is_some()
    }

    pub fn try_remove(&self, cluster_id: &str) -> Result<Arc<OnlinePoolEntry>, PoolError> {
        self.write()
            .swap_remove(cluster_id)
            .ok_or_else(|| PoolError::NotPresent(cluster_id.to_string()))
    }

    /// Remove the entry of a cluster only if it was enabled by `connection_id`.
    /// A newer connection of the same cluster keeps its entry.
    pub fn remove_owned(&self, cluster_id: &str, connection_id: u64) -> bool {
        let mut entries = self.write();
        match entries.get(cluster_id) {
            Some(e) if e.connection_id == connection_id => {
                entries.swap_remove(cluster_id);
                true
            }
            _ => false,
        }
    }

    pub fn sample_random(&self) -> Option<Arc<OnlinePoolEntry>> {
        let entries = self.read();
        if entries.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..entries.len());
        entries.get_index(index).map(|(_, v)| v.clone())
    }

    pub fn get(&self, cluster_id: &str) -> Option<Arc<OnlinePoolEntry>> {
        self.read().get(cluster_id).cloned()
    }

    pub fn contains(&self, cluster_id: &str) -> bool {
        self.read().contains_key(cluster_id)
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn snapshot(&self) -> Vec<Arc<OnlinePoolEntry>> {
        self.read().values().cloned().collect()
    }

    /// Async lock serializing the admission work of one cluster.
    pub fn cluster_lock(&self, cluster_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(cluster_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // A poisoned lock only means a panic happened between two complete mutations.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<String, Arc<OnlinePoolEntry>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<String, Arc<OnlinePoolEntry>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
