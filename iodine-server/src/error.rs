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

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use iodine_common::error::IodineError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not Found")]
    NotFound(String),

    #[error("Your cluster has been banned for the following reasons: {0}")]
    Banned(String),

    #[error("invalid challenge: {0}")]
    InvalidChallenge(String),

    #[error("{0} expired")]
    Expired(&'static str),

    #[error("{0}")]
    Mismatch(String),

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Banned(_) => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<IodineError> for AuthError {
    fn from(value: IodineError) -> Self {
        AuthError::Internal(value.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProbeError {
    #[error("bandwidth probe to {url} failed: {reason}")]
    NetworkFailure { url: String, reason: String },

    #[error("bandwidth probe to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error(
        "measured bandwidth {measured:.2} Mbps is below the required {minimum:.2} Mbps, \
         check the node's uplink and enable again"
    )]
    BelowThreshold { measured: f64, minimum: f64 },

    #[error("cluster record unavailable: {0}")]
    Registry(String),
}

impl From<IodineError> for ProbeError {
    fn from(value: IodineError) -> Self {
        ProbeError::Registry(value.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("cluster {0} is not in the online pool")]
    NotPresent(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FileError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("path is a directory: {0}")]
    IsDirectory(String),

    #[error("io error: {0}")]
    Io(String),
}

impl FileError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FileError::NotFound(_) | FileError::IsDirectory(_) => StatusCode::NOT_FOUND,
            FileError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for FileError {
    fn from(value: std::io::Error) -> Self {
        FileError::Io(value.to_string())
    }
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        let body = match &self {
            FileError::NotFound(_) | FileError::IsDirectory(_) => "Not Found".to_string(),
            FileError::Io(_) => self.to_string(),
        };
        (self.status_code(), body).into_response()
    }
}
