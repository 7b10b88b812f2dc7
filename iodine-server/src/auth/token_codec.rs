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

//! Compact HS256 tokens (`header.payload.signature`, base64url without padding).
//!
//! Challenges and access tokens are both issued in this format, keyed by the
//! server's own secret. The node's proof of possession is a separate HMAC, see
//! [`ChallengeSignature`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use iodine_common::conf::AuthConf;
use log::warn;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("bad token signature")]
    BadSignature,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Clone)]
pub struct TokenCodec {
    key: Arc<Vec<u8>>,
}

impl TokenCodec {
    const ALG: &'static str = "HS256";

    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: Arc::new(key.as_ref().to_vec()),
        }
    }

    pub fn random() -> Self {
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(key)
    }

    pub fn from_conf(conf: &AuthConf) -> Self {
        if conf.token_secret.is_empty() {
            warn!("auth.token_secret is not set, using a random key; issued tokens will not survive a restart");
            Self::random()
        } else {
            Self::new(conf.token_secret.as_bytes())
        }
    }

    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let header = Header {
            alg: Self::ALG.to_string(),
            typ: "JWT".to_string(),
        };
        let header = serde_json::to_vec(&header).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let payload = serde_json::to_vec(claims).map_err(|e| TokenError::Malformed(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let sig = mac.finalize().into_bytes();

        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(sig)))
    }

    /// Verify the signature and return the claims. Expiry is the caller's business.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut parts = token.split('.');
        let (h, p, s) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(TokenError::Malformed("expected 3 segments".to_string())),
        };

        let header: Header = serde_json::from_slice(&Self::b64_decode(h)?)
            .map_err(|e| TokenError::Malformed(format!("header: {}", e)))?;
        if header.alg != Self::ALG {
            return Err(TokenError::Malformed(format!(
                "unsupported alg {}",
                header.alg
            )));
        }

        let sig = Self::b64_decode(s)?;
        let mut mac = self.mac()?;
        mac.update(h.as_bytes());
        mac.update(b".");
        mac.update(p.as_bytes());
        mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;

        serde_json::from_slice(&Self::b64_decode(p)?)
            .map_err(|e| TokenError::Malformed(format!("payload: {}", e)))
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| TokenError::Malformed(e.to_string()))
    }

    fn b64_decode(segment: &str) -> Result<Vec<u8>, TokenError> {
        URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|e| TokenError::Malformed(e.to_string()))
    }
}

/// The node's proof of possession: hex HMAC-SHA256 of the raw challenge, keyed by the
/// cluster secret.
pub struct ChallengeSignature;

impl ChallengeSignature {
    pub fn sign(secret: &str, challenge: &str) -> String {
        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(v) => v,
            Err(_) => return String::new(),
        };
        mac.update(challenge.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison against the expected signature.
    pub fn verify(secret: &str, challenge: &str, signature: &str) -> bool {
        let Ok(sig) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(challenge.as_bytes());
        mac.verify_slice(&sig).is_ok()
    }
}
