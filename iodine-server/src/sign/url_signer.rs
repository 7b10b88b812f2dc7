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

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use iodine_common::utils::Clock;
use sha1::{Digest, Sha1};
use std::sync::Arc;
use std::time::Duration;

/// Time-scoped query signatures understood by the node software:
/// `s = base64url(sha1(secret + subject + e))`, `e` = expiry millis in base 36.
#[derive(Clone)]
pub struct UrlSigner {
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl UrlSigner {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, clock }
    }

    /// Returns the query string, `?` included.
    pub fn sign(&self, subject: &str, secret: &str) -> String {
        let exp = self.clock.now_ms() + self.ttl.as_millis() as u64;
        let e = to_base36(exp);
        format!("?s={}&e={}", Self::digest(secret, subject, &e), e)
    }

    pub fn verify(&self, subject: &str, secret: &str, s: &str, e: &str) -> bool {
        let exp = match u64::from_str_radix(e, 36) {
            Ok(v) => v,
            Err(_) => return false,
        };
        exp > self.clock.now_ms() && Self::digest(secret, subject, e) == s
    }

    fn digest(secret: &str, subject: &str, e: &str) -> String {
        let mut sha1 = Sha1::new();
        sha1.update(secret.as_bytes());
        sha1.update(subject.as_bytes());
        sha1.update(e.as_bytes());
        URL_SAFE_NO_PAD.encode(sha1.finalize())
    }
}

pub fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(13);
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use iodine_common::utils::ManualClock;

    fn parse(query: &str) -> (String, String) {
        let mut s = String::new();
        let mut e = String::new();
        for kv in query.trim_start_matches('?').split('&') {
            match kv.split_once('=') {
                Some(("s", v)) => s = v.to_string(),
                Some(("e", v)) => e = v.to_string(),
                _ => {}
            }
        }
        (s, e)
    }

    #[test]
    fn base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(u64::from_str_radix(&to_base36(1_700_000_300_000), 36).unwrap(), 1_700_000_300_000);
    }

    #[test]
    fn expires_after_ttl() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let signer = UrlSigner::new(Duration::from_secs(300), clock.clone());
        let hash = "0a05c94acbaf988be64bb250c7c9a6407c6fbb34";

        let (s, e) = parse(&signer.sign(hash, "secret"));
        assert_eq!(u64::from_str_radix(&e, 36).unwrap(), 1_700_000_300_000);
        assert!(signer.verify(hash, "secret", &s, &e));
        assert!(!signer.verify(hash, "other", &s, &e));
        assert!(!signer.verify("/measure/10", "secret", &s, &e));

        clock.advance(Duration::from_secs(300));
        assert!(!signer.verify(hash, "secret", &s, &e));
    }

    #[test]
    fn signature_is_url_safe() {
        let signer = UrlSigner::new(Duration::from_secs(300), Arc::new(ManualClock::new(0)));
        for i in 0..50 {
            let (s, _) = parse(&signer.sign(&format!("/measure/{}", i), "k"));
            assert_eq!(s.len(), 27);
            assert!(s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
        }
    }
}
