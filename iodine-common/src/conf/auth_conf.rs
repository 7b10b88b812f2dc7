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

/// Node authentication and URL signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConf {
    // Key of the server-issued challenges and tokens.
    // Empty means a random key per process; tokens then die with a restart.
    pub token_secret: String,

    #[serde(skip)]
    pub challenge_ttl: Duration,
    #[serde(alias = "challenge_ttl")]
    pub challenge_ttl_str: String,

    // Declared to the node with every token.
    #[serde(skip)]
    pub token_ttl: Duration,
    #[serde(alias = "token_ttl")]
    pub token_ttl_str: String,

    // Validity of signed download and measure urls.
    #[serde(skip)]
    pub sign_ttl: Duration,
    #[serde(alias = "sign_ttl")]
    pub sign_ttl_str: String,
}

impl AuthConf {
    pub fn init(&mut self) -> IodineResult<()> {
        self.challenge_ttl = DurationUnit::from_str(&self.challenge_ttl_str)?.as_duration();
        self.token_ttl = DurationUnit::from_str(&self.token_ttl_str)?.as_duration();
        self.sign_ttl = DurationUnit::from_str(&self.sign_ttl_str)?.as_duration();
        Ok(())
    }
}

impl Default for AuthConf {
    fn default() -> Self {
        Self {
            token_secret: "".to_string(),

            challenge_ttl: Default::default(),
            challenge_ttl_str: "5m".to_string(),

            token_ttl: Default::default(),
            token_ttl_str: "1d".to_string(),

            sign_ttl: Default::default(),
            sign_ttl_str: "5m".to_string(),
        }
    }
}
