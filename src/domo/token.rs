//! Process-wide cache for the Domo client-credentials token.
//!
//! The cached token carries no expiry. It is reused until an upstream call
//! answers 401, at which point callers invalidate it and acquire a new one.
//! There is no single-flight guard: concurrent callers on an empty cache may
//! each run a grant, and the last one to finish wins the cache slot.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::api::{DomoApi, TokenSet};
use crate::error::RelayError;

pub struct TokenManager {
    api: Arc<dyn DomoApi>,
    scope: String,
    cache: RwLock<Option<String>>,
}

impl TokenManager {
    pub fn new(api: Arc<dyn DomoApi>, scope: impl Into<String>) -> Self {
        Self {
            api,
            scope: scope.into(),
            cache: RwLock::new(None),
        }
    }

    /// Cached token if present, otherwise a fresh grant.
    pub async fn ensure_token(&self) -> Result<String, RelayError> {
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.as_deref().filter(|t| !t.is_empty()) {
                return Ok(token.to_string());
            }
        }

        debug!("No cached Domo token, acquiring");
        Ok(self.acquire_token().await?.access_token)
    }

    /// Run the client-credentials grant and replace the cached token.
    pub async fn acquire_token(&self) -> Result<TokenSet, RelayError> {
        let tokens = self.api.request_token(&self.scope).await.map_err(|e| {
            warn!("Domo token acquisition failed: {e}");
            RelayError::TokenAcquisition {
                status: e.status,
                payload: e.payload,
            }
        })?;

        *self.cache.write().await = Some(tokens.access_token.clone());
        info!("Acquired Domo access token (scope: {})", self.scope);
        Ok(tokens)
    }

    /// Drop the cached token so the next caller re-acquires.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    pub async fn cached(&self) -> Option<String> {
        self.cache.read().await.clone()
    }
}
