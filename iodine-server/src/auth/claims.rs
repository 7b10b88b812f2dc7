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

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Challenge,
    Access,
}

/// Claims of a challenge. The cluster secret is echoed back to the node because
/// deployed nodes expect it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeClaims {
    pub kind: TokenKind,
    pub cluster_id: String,
    pub cluster_secret: String,
    // Epoch seconds.
    pub exp: u64,
}

impl ChallengeClaims {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.exp.saturating_mul(1000) <= now_ms
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub kind: TokenKind,
    pub cluster_id: String,
    pub cluster_secret: String,
    // Epoch millis.
    pub iat: u64,
}

/// Body of a successful token exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    // Millis.
    pub ttl: u64,
}
