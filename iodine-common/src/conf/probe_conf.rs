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
use crate::utils::DurationUnit;
use crate::IodineResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Admission bandwidth probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConf {
    // Nodes measured below this are not admitted.
    pub min_bandwidth_mbps: f64,

    // Size of the synthetic object fetched from the node, in MiB.
    pub probe_size_mb: u32,

    #[serde(skip)]
    pub timeout: Duration,
    #[serde(alias = "timeout")]
    pub timeout_str: String,
}

impl ProbeConf {
    pub fn init(&mut self) -> IodineResult<()> {
        if self.probe_size_mb == 0 {
            return Err(IodineError::invalid_conf("probe.probe_size_mb must be > 0"));
        }
        self.timeout = DurationUnit::from_str(&self.timeout_str)?.as_duration();
        Ok(())
    }

    pub fn probe_size_bytes(&self) -> u64 {
        self.probe_size_mb as u64 * 1024 * 1024
    }
}

impl Default for ProbeConf {
    fn default() -> Self {
        Self {
            min_bandwidth_mbps: 10.0,
            probe_size_mb: 10,
            timeout: Default::default(),
            timeout_str: "10s".to_string(),
        }
    }
}
