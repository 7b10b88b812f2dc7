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

use crate::auth::AuthBroker;
use crate::error::AuthError;
use crate::pool::OnlinePool;
use crate::registry::NodeRegistry;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An authenticated control connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: u64,
    pub cluster_id: String,
    pub cluster_secret: String,
    pub token: String,
    pub remote_addr: Option<SocketAddr>,
}

impl Display for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.remote_addr {
            Some(addr) => write!(f, "conn {} ({}) from {}", self.connection_id, self.cluster_id, addr),
            None => write!(f, "conn {} ({})", self.connection_id, self.cluster_id),
        }
    }
}

pub struct SessionManager {
    auth: Arc<AuthBroker>,
    registry: NodeRegistry,
    pool: Arc<OnlinePool>,
    sessions: DashMap<u64, Arc<Session>>,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(auth: Arc<AuthBroker>, registry: NodeRegistry, pool: Arc<OnlinePool>) -> Self {
        Self {
            auth,
            registry,
            pool,
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Authenticate a new connection. On error no session exists.
    pub fn open(
        &self,
        token: &str,
        remote_addr: Option<SocketAddr>,
    ) -> Result<Arc<Session>, AuthError> {
        let claims = self.auth.verify_token(token).map_err(|e| {
            warn!("Refused control connection from {:?}: {}", remote_addr, e);
            e
        })?;

        let cluster = match self.registry.get(&claims.cluster_id)? {
            Some(c) => c,
            None => {
                warn!("Refused control connection of unknown cluster {}", claims.cluster_id);
                return Err(AuthError::NotFound(claims.cluster_id));
            }
        };
        if cluster.secret != claims.cluster_secret {
            warn!(
                "Refused control connection of cluster {}: secret changed since the token was issued",
                cluster.id
            );
            return Err(AuthError::Mismatch("cluster secret changed".to_string()));
        }

        let session = Arc::new(Session {
            connection_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            cluster_id: cluster.id,
            cluster_secret: cluster.secret,
            token: token.to_string(),
            remote_addr,
        });
        self.sessions.insert(session.connection_id, session.clone());

        info!("Control channel opened: {}", session);
        Ok(session)
    }

    /// Destroy the session and drop the pool entry this connection enabled.
    /// Returns false if there was no such session.
    pub fn close(&self, connection_id: u64) -> bool {
        let session = match self.sessions.remove(&connection_id) {
            Some((_, v)) => v,
            None => return false,
        };

        if self.pool.remove_owned(&session.cluster_id, connection_id) {
            info!("Cluster {} left the online pool on disconnect", session.cluster_id);
        } else {
            debug!("No pool entry owned by {}", session);
        }
        info!("Control channel closed: {}", session);
        true
    }

    pub fn get(&self, connection_id: u64) -> Option<Arc<Session>> {
        self.sessions.get(&connection_id).map(|x| x.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ChallengeSignature, TokenCodec};
    use crate::pool::OnlinePoolEntry;
    use iodine_common::conf::AuthConf;
    use iodine_common::state::Cluster;
    use iodine_common::utils::ManualClock;

    struct Fixture {
        registry: NodeRegistry,
        auth: Arc<AuthBroker>,
        pool: Arc<OnlinePool>,
        manager: SessionManager,
    }

    fn fixture() -> Fixture {
        let registry = NodeRegistry::memory(vec![Cluster::new("c1", "s1")]);
        let mut conf = AuthConf::default();
        conf.init().unwrap();
        let auth = Arc::new(AuthBroker::new(
            registry.clone(),
            TokenCodec::new("k"),
            Arc::new(ManualClock::new(1_700_000_000_000)),
            &conf,
        ));
        let pool = Arc::new(OnlinePool::new());
        let manager = SessionManager::new(auth.clone(), registry.clone(), pool.clone());
        Fixture {
            registry,
            auth,
            pool,
            manager,
        }
    }

    fn token(auth: &AuthBroker) -> String {
        let challenge = auth.issue_challenge("c1").unwrap();
        let sig = ChallengeSignature::sign("s1", &challenge);
        auth.exchange_token("c1", &challenge, &sig).unwrap().token
    }

    #[test]
    fn open_and_close() {
        let f = fixture();
        let session = f.manager.open(&token(&f.auth), None).unwrap();
        assert_eq!(session.cluster_id, "c1");
        assert_eq!(f.manager.len(), 1);

        f.pool.upsert(OnlinePoolEntry {
            cluster_id: "c1".to_string(),
            host: "h".to_string(),
            port: 1,
            secret: "s1".to_string(),
            connection_id: session.connection_id,
            bandwidth_mbps: 50.0,
            enabled_at: 0,
        });
        assert!(f.manager.close(session.connection_id));
        assert!(f.pool.is_empty());
        assert!(f.manager.is_empty());
        assert!(!f.manager.close(session.connection_id));
    }

    #[test]
    fn rotated_secret_is_refused() {
        let f = fixture();
        let token = token(&f.auth);
        f.registry.put(Cluster::new("c1", "rotated")).unwrap();

        assert!(matches!(f.manager.open(&token, None), Err(AuthError::Mismatch(_))));
        assert!(f.manager.is_empty());
    }

    #[test]
    fn bad_tokens_are_refused() {
        let f = fixture();
        assert!(f.manager.open("", None).is_err());
        assert!(f.manager.open("a.b.c", None).is_err());

        let forged = TokenCodec::new("not-the-server-key")
            .encode(&serde_json::json!({
                "kind": "access",
                "cluster_id": "c1",
                "cluster_secret": "s1",
                "iat": 1_700_000_000_000u64,
            }))
            .unwrap();
        assert_eq!(
            f.manager.open(&forged, None).unwrap_err(),
            AuthError::SignatureMismatch
        );
        assert!(f.manager.is_empty());
    }

    #[test]
    fn connection_ids_are_unique() {
        let f = fixture();
        let token = token(&f.auth);
        let a = f.manager.open(&token, None).unwrap();
        let b = f.manager.open(&token, None).unwrap();
        assert_ne!(a.connection_id, b.connection_id);
        assert_eq!(f.manager.len(), 2);
    }
}
