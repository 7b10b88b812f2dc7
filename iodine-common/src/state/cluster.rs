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
use std::fmt::{Display, Formatter};

/// A mirror node as known to the registry.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub secret: String,
    pub is_banned: bool,
    // Present iff is_banned.
    pub ban_reason: Option<String>,

    // Reported by the node on enable.
    pub host: Option<String>,
    pub port: Option<u16>,
    pub version: Option<String>,
    pub runtime: Option<String>,
}

impl Cluster {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            secret: secret.into(),
            ..Default::default()
        }
    }

    pub fn with_ban(mut self, reason: impl Into<String>) -> Self {
        self.ban(reason);
        self
    }

    pub fn ban(&mut self, reason: impl Into<String>) {
        self.is_banned = true;
        self.ban_reason = Some(reason.into());
    }

    pub fn unban(&mut self) {
        self.is_banned = false;
        self.ban_reason = None;
    }

    pub fn ban_reason(&self) -> &str {
        self.ban_reason.as_deref().unwrap_or_default()
    }

    pub fn apply(&mut self, edit: &ClusterEdit) {
        self.host = Some(edit.host.clone());
        self.port = Some(edit.port);
        self.version = Some(edit.version.clone());
        self.runtime = Some(edit.runtime.clone());
    }

    /// Everything but the secret, for diagnostic listings.
    pub fn info(&self) -> ClusterInfo {
        ClusterInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            is_banned: self.is_banned,
            ban_reason: self.ban_reason.clone(),
            host: self.host.clone(),
            port: self.port,
            version: self.version.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl Display for Cluster {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cluster_id = {}, addr = {}:{}, banned = {}",
            self.id,
            self.host.as_deref().unwrap_or("-"),
            self.port.unwrap_or_default(),
            self.is_banned
        )
    }
}

/// Fields a node reports about itself when it asks to be enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEdit {
    pub host: String,
    pub port: u16,
    pub version: String,
    pub runtime: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub id: String,
    pub name: String,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub version: Option<String>,
    pub runtime: Option<String>,
}
