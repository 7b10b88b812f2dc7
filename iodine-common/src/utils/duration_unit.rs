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
use std::time::Duration;

/// Human readable duration used in configuration files, e.g. "500ms", "10s", "5m", "1d".
/// A bare number is read as seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationUnit(Duration);

impl DurationUnit {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(value: &str) -> IodineResult<Self> {
        let value = value.trim();
        let split = value
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(value.len());
        let (num, unit) = value.split_at(split);

        let num: u64 = num
            .parse()
            .map_err(|_| IodineError::invalid_conf(format!("invalid duration: '{}'", value)))?;

        let millis = match unit.trim().to_ascii_lowercase().as_str() {
            "ms" => num,
            "" | "s" => num * 1000,
            "m" | "min" => num * 60 * 1000,
            "h" => num * 60 * 60 * 1000,
            "d" => num * 24 * 60 * 60 * 1000,
            other => {
                return Err(IodineError::invalid_conf(format!(
                    "unknown duration unit '{}' in '{}'",
                    other, value
                )))
            }
        };

        Ok(Self(Duration::from_millis(millis)))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> u64 {
        self.0.as_millis() as u64
    }
}
