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
use log::debug;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    // Fully signed url of the synthetic object.
    pub url: String,
    pub expected_bytes: u64,
}

/// One timed download from a candidate node, in megabits per second.
#[async_trait::async_trait]
pub trait BandwidthProbe: Send + Sync {
    async fn measure(&self, target: &ProbeTarget) -> Result<f64, ProbeError>;
}

pub struct HttpBandwidthProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpBandwidthProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn mbps(bytes: u64, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64().max(1e-6);
        bytes as f64 * 8.0 / secs / 1e6
    }

    fn map_err(&self, url: &str, e: reqwest::Error) -> ProbeError {
        if e.is_timeout() {
            ProbeError::Timeout {
                url: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            ProbeError::NetworkFailure {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait::async_trait]
impl BandwidthProbe for HttpBandwidthProbe {
    async fn measure(&self, target: &ProbeTarget) -> Result<f64, ProbeError> {
        let url = target.url.as_str();
        let start = Instant::now();

        // The request timeout covers the body as well.
        let mut resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_err(url, e))?;
        if !resp.status().is_success() {
            return Err(ProbeError::NetworkFailure {
                url: url.to_string(),
                reason: format!("status {}", resp.status()),
            });
        }

        let mut bytes = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(|e| self.map_err(url, e))? {
            bytes += chunk.len() as u64;
        }
        let elapsed = start.elapsed();

        if bytes < target.expected_bytes {
            return Err(ProbeError::NetworkFailure {
                url: url.to_string(),
                reason: format!("short body, {} of {} bytes", bytes, target.expected_bytes),
            });
        }

        let mbps = Self::mbps(bytes, elapsed);
        debug!("Probe {} read {} bytes in {:?}, {:.2} Mbps", url, bytes, elapsed, mbps);
        Ok(mbps)
    }
}

/// Reports a preset result without touching the network.
pub struct FixedBandwidthProbe {
    result: Result<f64, ProbeError>,
    delay: Duration,
}

impl FixedBandwidthProbe {
    pub fn new(mbps: f64) -> Self {
        Self {
            result: Ok(mbps),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(err: ProbeError) -> Self {
        Self {
            result: Err(err),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait::async_trait]
impl BandwidthProbe for FixedBandwidthProbe {
    async fn measure(&self, _: &ProbeTarget) -> Result<f64, ProbeError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}
