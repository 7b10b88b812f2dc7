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

use crate::center::CenterMetrics;
use crate::manifest::{ManifestBuilder, ManifestSnapshot};
use arc_swap::ArcSwap;
use iodine_common::error::IodineError;
use iodine_common::executor::LoopTask;
use iodine_common::utils::Clock;
use iodine_common::IodineResult;
use log::info;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// The current manifest. Readers load a snapshot without waiting on a rebuild.
pub struct ManifestCache {
    snapshot: ArcSwap<ManifestSnapshot>,
    builder: ManifestBuilder,
    clock: Arc<dyn Clock>,
    // One rebuild at a time.
    refresh_lock: Mutex<()>,
}

impl ManifestCache {
    pub fn new(files_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(ManifestSnapshot::default()),
            builder: ManifestBuilder::new(files_dir),
            clock,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn current(&self) -> Arc<ManifestSnapshot> {
        self.snapshot.load_full()
    }

    /// Rebuild and publish. On failure the previous snapshot stays current.
    pub fn refresh(&self) -> IodineResult<Arc<ManifestSnapshot>> {
        let _guard = self.refresh_lock.lock().unwrap_or_else(|e| e.into_inner());

        let previous = self.current();
        let next = Arc::new(self.builder.scan(&previous, self.clock.now_ms())?);
        self.snapshot.store(next.clone());

        info!("Manifest refreshed: {} files", next.len());
        Ok(next)
    }
}

/// Periodic [`ManifestCache::refresh`], run by a `ScheduledExecutor`.
pub struct ManifestRefreshTask {
    cache: Arc<ManifestCache>,
    metrics: Arc<CenterMetrics>,
    stop: Arc<AtomicBool>,
}

impl ManifestRefreshTask {
    pub fn new(cache: Arc<ManifestCache>, metrics: Arc<CenterMetrics>, stop: Arc<AtomicBool>) -> Self {
        Self {
            cache,
            metrics,
            stop,
        }
    }
}

impl LoopTask for ManifestRefreshTask {
    type Error = IodineError;

    fn run(&self) -> Result<(), IodineError> {
        match self.cache.refresh() {
            Ok(snapshot) => {
                self.metrics.manifest_files.set(snapshot.len() as i64);
                Ok(())
            }
            Err(e) => {
                self.metrics.manifest_refresh_failures.inc();
                Err(e)
            }
        }
    }

    fn terminate(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iodine_common::utils::{ManualClock, Utils};
    use std::fs;

    #[test]
    fn failed_refresh_keeps_last_good() {
        let root = Utils::test_sub_dir("manifest-cache");
        fs::write(root.join("a.txt"), b"hello").unwrap();
        let cache = ManifestCache::new(&root, Arc::new(ManualClock::new(7)));
        assert!(cache.current().is_empty());

        let first = cache.refresh().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(cache.current().built_at(), 7);

        let reader = cache.current();
        fs::remove_dir_all(&root).unwrap();
        assert!(cache.refresh().is_err());
        assert_eq!(cache.current().len(), 1);
        assert_eq!(reader.len(), 1);
    }

    #[test]
    fn task_counts_failures() {
        let root = Utils::test_sub_dir("manifest-task").join("missing");
        let cache = Arc::new(ManifestCache::new(root, Arc::new(ManualClock::new(0))));
        let metrics = Arc::new(CenterMetrics::new().unwrap());
        let task = ManifestRefreshTask::new(cache, metrics.clone(), Arc::new(AtomicBool::new(false)));

        assert!(task.run().is_err());
        assert_eq!(metrics.manifest_refresh_failures.get(), 1);
        assert!(!task.terminate());
    }
}
