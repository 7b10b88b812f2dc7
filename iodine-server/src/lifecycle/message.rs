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

//! Control channel frames.
//!
//! A request is `{"id": 1, "event": "enable", "data": {...}}`. The answer echoes
//! the id: `{"id": 1, "ack": [null, result]}` or `{"id": 1, "ack": [{"message": "..."}]}`.
//! Requests without an id are handled but not answered.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct ControlFrame {
    #[serde(default)]
    pub id: Option<u64>,
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl ControlFrame {
    pub fn parse(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("malformed frame: {}", e))
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Flavor {
    #[serde(default)]
    pub runtime: String,
    #[serde(default)]
    pub storage: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EnableRequest {
    // Absent means the remote address of the connection.
    #[serde(default)]
    pub host: Option<String>,
    pub port: u16,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub flavor: Flavor,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct KeepAliveRequest {
    #[serde(default)]
    pub hits: u64,
    #[serde(default)]
    pub bytes: u64,
}

/// The closed set of events a node may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Enable(EnableRequest),
    KeepAlive(KeepAliveRequest),
    Disable,
}

impl ControlRequest {
    pub const ENABLE: &'static str = "enable";
    pub const KEEP_ALIVE: &'static str = "keep-alive";
    pub const DISABLE: &'static str = "disable";

    pub fn from_frame(frame: &ControlFrame) -> Result<Self, String> {
        let data = || {
            if frame.data.is_null() {
                json!({})
            } else {
                frame.data.clone()
            }
        };

        match frame.event.as_str() {
            Self::ENABLE => serde_json::from_value(data())
                .map(ControlRequest::Enable)
                .map_err(|e| format!("invalid enable request: {}", e)),
            Self::KEEP_ALIVE => serde_json::from_value(data())
                .map(ControlRequest::KeepAlive)
                .map_err(|e| format!("invalid keep-alive request: {}", e)),
            Self::DISABLE => Ok(ControlRequest::Disable),
            other => Err(format!("unknown event: {}", other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControlRequest::Enable(_) => Self::ENABLE,
            ControlRequest::KeepAlive(_) => Self::KEEP_ALIVE,
            ControlRequest::Disable => Self::DISABLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlAck {
    Ok(Value),
    Rejected(String),
}

impl ControlAck {
    pub fn ok(v: impl Into<Value>) -> Self {
        ControlAck::Ok(v.into())
    }

    pub fn rejected(msg: impl ToString) -> Self {
        ControlAck::Rejected(msg.to_string())
    }

    pub fn to_value(&self) -> Value {
        match self {
            ControlAck::Ok(v) => json!([null, v]),
            ControlAck::Rejected(msg) => json!([{ "message": msg }]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AckFrame {
    // Null when the request could not be read far enough to find its id.
    pub id: Option<u64>,
    pub ack: Value,
}

impl AckFrame {
    pub fn new(id: Option<u64>, ack: &ControlAck) -> Self {
        Self {
            id,
            ack: ack.to_value(),
        }
    }

    pub fn to_text(&self) -> String {
        // A Value-only struct always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}
