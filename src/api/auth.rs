//! Campus Authentication
//!
//! Credentials are supplied through the [`CredentialProvider`] trait so that
//! the transport never depends on how they were obtained. Static credentials
//! come straight from the client configuration; [`CachedCredentials`] wraps
//! a provider that is expensive to call (a token exchange, for example).

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the provider gives none (conservative: 30 minutes)
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Authentication material attached to each request
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// HTTP basic auth with a client id and secret
    Basic {
        client_id: String,
        client_secret: String,
    },
}

impl Credential {
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credential::Bearer(token) => request.bearer_auth(token),
            Credential::Basic {
                client_id,
                client_secret,
            } => request.basic_auth(client_id, Some(client_secret)),
        }
    }
}

// Security: never print secrets, even in debug logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Bearer(_) => f.write_str("Bearer(***)"),
            Credential::Basic { client_id, .. } => f
                .debug_struct("Basic")
                .field("client_id", client_id)
                .field("client_secret", &"***")
                .finish(),
        }
    }
}

/// Source of credentials for outgoing requests
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Credential to attach to the next request
    async fn credential(&self) -> Result<Credential>;
}

/// Credentials fixed at construction time
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credential);

impl StaticCredentials {
    pub fn new(credential: Credential) -> Self {
        Self(credential)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credential(&self) -> Result<Credential> {
        Ok(self.0.clone())
    }
}

#[derive(Clone)]
struct CachedToken {
    credential: Credential,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    /// Check if this cached token is still valid
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Caches the credential of an inner provider for a fixed TTL
pub struct CachedCredentials<P> {
    inner: P,
    ttl: Duration,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl<P: CredentialProvider> CachedCredentials<P> {
    pub fn new(inner: P) -> Self {
        Self::with_ttl(inner, DEFAULT_TOKEN_TTL)
    }

    pub fn with_ttl(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Drop the cached credential and fetch a fresh one
    pub async fn refresh(&self) -> Result<Credential> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }
        self.credential().await
    }
}

#[async_trait]
impl<P: CredentialProvider> CredentialProvider for CachedCredentials<P> {
    async fn credential(&self) -> Result<Credential> {
        // Check cache first - but only return if token is still valid
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.credential.clone());
                }
                tracing::debug!("Cached credential expired, fetching a new one");
            }
        }

        let credential = self.inner.credential().await?;

        let expires_at = Instant::now() + self.ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);
        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                credential: credential.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New credential cached, expires in ~{} minutes",
            self.ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(credential)
    }
}
