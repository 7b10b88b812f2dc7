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

use crate::utils::DurationUnit;
use crate::IodineResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConf {
    #[serde(skip)]
    pub refresh_interval: Duration,
    #[serde(alias = "refresh_interval")]
    pub refresh_interval_str: String,
}

impl ManifestConf {
    pub fn init(&mut self) -> IodineResult<()> {
        self.refresh_interval =
            DurationUnit::from_str(&self.refresh_interval_str)?.as_duration();
        Ok(())
    }
}

impl Default for ManifestConf {
    fn default() -> Self {
        Self {
            refresh_interval: Default::default(),
            refresh_interval_str: "10m".to_string(),
        }
    }
}

/// Advisory sync parameters handed to nodes, served as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConf {
    pub source: String,
    pub concurrency: u32,
}

impl Default for SyncConf {
    fn default() -> Self {
        Self {
            source: "center".to_string(),
            concurrency: 100,
        }
    }
}
