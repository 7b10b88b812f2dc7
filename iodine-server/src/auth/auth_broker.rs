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

use crate::auth::{
    AccessToken, ChallengeClaims, ChallengeSignature, TokenClaims, TokenCodec, TokenError,
    TokenKind,
};
use crate::error::AuthError;
use crate::registry::NodeRegistry;
use iodine_common::conf::AuthConf;
use iodine_common::state::Cluster;
use iodine_common::utils::Clock;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Challenge issuing and token exchange. Stateless apart from the registry and the clock.
pub struct AuthBroker {
    registry: NodeRegistry,
    codec: TokenCodec,
    clock: Arc<dyn Clock>,
    challenge_ttl: Duration,
    token_ttl: Duration,
}

impl AuthBroker {
    pub fn new(
        registry: NodeRegistry,
        codec: TokenCodec,
        clock: Arc<dyn Clock>,
        conf: &AuthConf,
    ) -> Self {
        Self {
            registry,
            codec,
            clock,
            challenge_ttl: conf.challenge_ttl,
            token_ttl: conf.token_ttl,
        }
    }

    pub fn token_ttl_ms(&self) -> u64 {
        self.token_ttl.as_millis() as u64
    }

    pub fn issue_challenge(&self, cluster_id: &str) -> Result<String, AuthError> {
        let cluster = self.lookup(cluster_id)?;
        if cluster.is_banned {
            info!(
                "Refused challenge for banned cluster {}: {}",
                cluster_id,
                cluster.ban_reason()
            );
            return Err(AuthError::Banned(cluster.ban_reason().to_string()));
        }

        let now = self.clock.now_ms();
        let claims = ChallengeClaims {
            kind: TokenKind::Challenge,
            cluster_id: cluster.id.clone(),
            cluster_secret: cluster.secret.clone(),
            exp: (now + self.challenge_ttl.as_millis() as u64) / 1000,
        };

        debug!("Issued challenge for cluster {}, exp {}", cluster_id, claims.exp);
        self.encode(&claims)
    }

    pub fn exchange_token(
        &self,
        cluster_id: &str,
        challenge: &str,
        signature: &str,
    ) -> Result<AccessToken, AuthError> {
        let claims: ChallengeClaims = self
            .codec
            .decode(challenge)
            .map_err(|e| AuthError::InvalidChallenge(e.to_string()))?;
        if claims.kind != TokenKind::Challenge {
            return Err(AuthError::InvalidChallenge("not a challenge".to_string()));
        }

        if claims.cluster_id != cluster_id {
            return Err(AuthError::Mismatch(format!(
                "challenge was issued for {}, not {}",
                claims.cluster_id, cluster_id
            )));
        }
        if claims.is_expired(self.clock.now_ms()) {
            return Err(AuthError::Expired("challenge"));
        }

        let cluster = self.lookup(cluster_id)?;
        if cluster.secret != claims.cluster_secret {
            return Err(AuthError::Mismatch("cluster secret changed".to_string()));
        }
        if !ChallengeSignature::verify(&cluster.secret, challenge, signature) {
            warn!("Signature mismatch in token exchange for cluster {}", cluster_id);
            return Err(AuthError::SignatureMismatch);
        }

        let token = self.encode(&TokenClaims {
            kind: TokenKind::Access,
            cluster_id: cluster.id.clone(),
            cluster_secret: cluster.secret.clone(),
            iat: self.clock.now_ms(),
        })?;

        info!("Issued access token for cluster {}", cluster_id);
        Ok(AccessToken {
            token,
            ttl: self.token_ttl_ms(),
        })
    }

    /// Decode an access token and check it is still inside its declared ttl.
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let claims: TokenClaims = self.codec.decode(token).map_err(|e| match e {
            TokenError::BadSignature => AuthError::SignatureMismatch,
            TokenError::Malformed(msg) => AuthError::InvalidChallenge(msg),
        })?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::InvalidChallenge("not an access token".to_string()));
        }
        if claims.iat.saturating_add(self.token_ttl_ms()) <= self.clock.now_ms() {
            return Err(AuthError::Expired("token"));
        }
        Ok(claims)
    }

    fn lookup(&self, cluster_id: &str) -> Result<Cluster, AuthError> {
        match self.registry.get(cluster_id)? {
            Some(c) => Ok(c),
            None => Err(AuthError::NotFound(cluster_id.to_string())),
        }
    }

    fn encode<T: serde::Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        self.codec
            .encode(claims)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iodine_common::utils::ManualClock;

    fn broker() -> (AuthBroker, Arc<ManualClock>) {
        let registry = NodeRegistry::memory(vec![
            Cluster::new("c1", "secret-1"),
            Cluster::new("banned", "secret-2").with_ban("serving corrupted files"),
        ]);
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let mut conf = AuthConf::default();
        conf.init().unwrap();
        let broker = AuthBroker::new(registry, TokenCodec::new("server-key"), clock.clone(), &conf);
        (broker, clock)
    }

    #[test]
    fn challenge_then_token() {
        let (broker, clock) = broker();
        let challenge = broker.issue_challenge("c1").unwrap();
        let signature = ChallengeSignature::sign("secret-1", &challenge);

        clock.advance(Duration::from_secs(4 * 60));
        let token = broker.exchange_token("c1", &challenge, &signature).unwrap();
        assert_eq!(token.ttl, 86_400_000);

        let claims = broker.verify_token(&token.token).unwrap();
        assert_eq!(claims.cluster_id, "c1");
        assert_eq!(claims.cluster_secret, "secret-1");
    }

    #[test]
    fn expired_challenge() {
        let (broker, clock) = broker();
        let challenge = broker.issue_challenge("c1").unwrap();
        let signature = ChallengeSignature::sign("secret-1", &challenge);

        clock.advance(Duration::from_secs(6 * 60));
        assert_eq!(
            broker.exchange_token("c1", &challenge, &signature),
            Err(AuthError::Expired("challenge"))
        );
    }

    #[test]
    fn wrong_signature() {
        let (broker, _) = broker();
        let challenge = broker.issue_challenge("c1").unwrap();

        for signature in [
            ChallengeSignature::sign("not-the-secret", &challenge),
            ChallengeSignature::sign("secret-1", "another challenge"),
            "".to_string(),
            "not hex".to_string(),
        ] {
            assert_eq!(
                broker.exchange_token("c1", &challenge, &signature),
                Err(AuthError::SignatureMismatch)
            );
        }
    }

    #[test]
    fn banned_and_unknown() {
        let (broker, _) = broker();
        assert_eq!(
            broker.issue_challenge("banned"),
            Err(AuthError::Banned("serving corrupted files".to_string()))
        );
        assert_eq!(
            broker.issue_challenge("ghost"),
            Err(AuthError::NotFound("ghost".to_string()))
        );
    }

    #[test]
    fn challenge_bound_to_cluster() {
        let (broker, _) = broker();
        let challenge = broker.issue_challenge("c1").unwrap();
        let signature = ChallengeSignature::sign("secret-1", &challenge);

        assert!(matches!(
            broker.exchange_token("c2", &challenge, &signature),
            Err(AuthError::Mismatch(_))
        ));
        assert!(matches!(
            broker.exchange_token("c1", "garbage", &signature),
            Err(AuthError::InvalidChallenge(_))
        ));
    }

    #[test]
    fn tokens_and_challenges_are_not_interchangeable() {
        let (broker, _) = broker();
        let challenge = broker.issue_challenge("c1").unwrap();
        assert!(broker.verify_token(&challenge).is_err());

        let signature = ChallengeSignature::sign("secret-1", &challenge);
        let token = broker.exchange_token("c1", &challenge, &signature).unwrap();
        let token_sig = ChallengeSignature::sign("secret-1", &token.token);
        assert!(matches!(
            broker.exchange_token("c1", &token.token, &token_sig),
            Err(AuthError::InvalidChallenge(_))
        ));
    }

    #[test]
    fn token_expires_after_declared_ttl() {
        let (broker, clock) = broker();
        let challenge = broker.issue_challenge("c1").unwrap();
        let signature = ChallengeSignature::sign("secret-1", &challenge);
        let token = broker.exchange_token("c1", &challenge, &signature).unwrap();

        clock.advance(Duration::from_secs(23 * 3600));
        assert!(broker.verify_token(&token.token).is_ok());
        clock.advance(Duration::from_secs(3600));
        assert_eq!(
            broker.verify_token(&token.token),
            Err(AuthError::Expired("token"))
        );
    }
}
