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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IodineError {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConf(String),

    #[error("cluster store error: {0}")]
    Store(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("{0}")]
    Common(String),
}

impl IodineError {
    pub fn invalid_conf(msg: impl Into<String>) -> Self {
        IodineError::InvalidConf(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        IodineError::Store(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        IodineError::Encode(msg.into())
    }
}

impl From<String> for IodineError {
    fn from(value: String) -> Self {
        IodineError::Common(value)
    }
}

impl From<&str> for IodineError {
    fn from(value: &str) -> Self {
        IodineError::Common(value.to_string())
    }
}
