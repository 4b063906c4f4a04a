//! Login and session validation.
//!
//! Sessions are persisted through the auth repository. When a cache is
//! configured it is consulted first and filled on misses; without one every
//! check goes to the repository.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::cache::Cache;
use crate::config::AuthConfig;
use crate::domain::{Principal, Session};
use crate::repo::AuthRepository;
use crate::service::{ServiceError, ServiceResult};

pub struct AuthService {
    repo: Arc<dyn AuthRepository>,
    cache: Option<Arc<dyn Cache>>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(config: &AuthConfig, repo: Arc<dyn AuthRepository>, cache: Option<Arc<dyn Cache>>) -> Self {
        Self {
            repo,
            cache,
            session_ttl: Duration::from_secs(config.session_ttl_secs),
        }
    }

    /// Whether session checks are served from the cache.
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Exchange an email/password pair for a session.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<Session> {
        let credential = self
            .repo
            .find_credential(email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;
        if credential.password_sha256 != hash_password(password) {
            return Err(ServiceError::InvalidCredentials);
        }

        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            principal: Principal {
                credential_id: credential.id,
                email: credential.email,
                role: credential.role,
            },
            expires_at: Utc::now().timestamp() + self.session_ttl.as_secs() as i64,
        };
        self.repo.save_session(&session).await?;
        self.cache_session(&session).await;

        tracing::info!(email = %session.principal.email, "Session issued");
        Ok(session)
    }

    /// Resolve a bearer token to its principal. Expired or unknown tokens yield `None`.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<Option<Principal>> {
        if let Some(cache) = &self.cache {
            match cache.get(&session_key(token)).await {
                Ok(Some(raw)) => match serde_json::from_str::<Principal>(&raw) {
                    Ok(principal) => return Ok(Some(principal)),
                    Err(e) => tracing::warn!(error = %e, "Discarding malformed cached session"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Session cache lookup failed"),
            }
        }

        let Some(session) = self.repo.find_session(token).await? else {
            return Ok(None);
        };
        if session.expires_at <= Utc::now().timestamp() {
            self.repo.delete_session(token).await?;
            return Ok(None);
        }
        self.cache_session(&session).await;
        Ok(Some(session.principal))
    }

    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        self.repo.delete_session(token).await?;
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(&session_key(token)).await {
                tracing::warn!(error = %e, "Failed to evict cached session");
            }
        }
        Ok(())
    }

    async fn cache_session(&self, session: &Session) {
        let Some(cache) = &self.cache else {
            return;
        };
        let remaining = session.expires_at - Utc::now().timestamp();
        if remaining <= 0 {
            return;
        }
        let ttl = Duration::from_secs(remaining as u64).min(self.session_ttl);
        match serde_json::to_string(&session.principal) {
            Ok(raw) => {
                if let Err(e) = cache.set(&session_key(&session.token), &raw, ttl).await {
                    tracing::warn!(error = %e, "Failed to cache session");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode session"),
        }
    }
}

/// Hex encoded SHA-256 of a password, as stored in credentials.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::domain::Credential;
    use crate::repo::memory::MemoryAuthRepository;

    fn repo() -> MemoryAuthRepository {
        let repo = MemoryAuthRepository::new();
        repo.add_credential(Credential {
            id: 7,
            email: "lead@example.com".into(),
            password_sha256: hash_password("hunter2"),
            role: "admin".into(),
        });
        repo
    }

    #[tokio::test]
    async fn login_then_authenticate_without_cache() {
        let svc = AuthService::new(&AuthConfig::default(), Arc::new(repo()), None);
        assert!(!svc.is_cached());

        let session = svc.login("lead@example.com", "hunter2").await.unwrap();
        let principal = svc.authenticate(&session.token).await.unwrap().unwrap();
        assert_eq!(principal.credential_id, 7);
        assert_eq!(principal.role, "admin");

        svc.logout(&session.token).await.unwrap();
        assert!(svc.authenticate(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let svc = AuthService::new(&AuthConfig::default(), Arc::new(repo()), None);
        assert!(matches!(
            svc.login("lead@example.com", "nope").await,
            Err(ServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("ghost@example.com", "hunter2").await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn cache_serves_sessions() {
        let cache = MemoryCache::new();
        let repo = repo();
        let svc = AuthService::new(&AuthConfig::default(), Arc::new(repo.clone()), Some(Arc::new(cache.clone())));

        let session = svc.login("lead@example.com", "hunter2").await.unwrap();
        assert_eq!(cache.len(), 1);

        // Served from the cache even once the persisted row is gone.
        repo.delete_session(&session.token).await.unwrap();
        assert!(svc.authenticate(&session.token).await.unwrap().is_some());
    }
}
