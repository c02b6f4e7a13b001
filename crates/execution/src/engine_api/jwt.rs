// Engine API authentication: HS256 tokens carrying only an `iat` claim. Clients reject tokens
// whose `iat` drifts more than 60s from their clock, so a cached token is re-issued well before
// that.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use color_eyre::eyre;
use jsonwebtoken::{Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::ExecutionError;

const TOKEN_VALIDITY_DURATION: Duration = Duration::from_secs(55);

/// Claims for the JWT token, as required by the Engine API specification.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iat: u64,
}

#[derive(Clone)]
struct JwtCache {
    token: String,
    created_at: SystemTime,
}

/// Provides JWT tokens for authenticating with the Engine API.
pub struct JwtProvider {
    key: jsonwebtoken::EncodingKey,
    cache: RwLock<Option<JwtCache>>,
}

impl JwtProvider {
    /// Creates a new `JwtProvider` with the given secret.
    pub fn new(secret: [u8; 32]) -> Self {
        Self { key: jsonwebtoken::EncodingKey::from_secret(&secret), cache: RwLock::new(None) }
    }

    /// Returns a valid JWT token, either from the cache or by generating a new one.
    pub async fn get_token(&self) -> eyre::Result<String> {
        {
            let cached_guard = self.cache.read().await;
            if let Some(cached) = cached_guard.as_ref() &&
                cached.created_at.elapsed()? < TOKEN_VALIDITY_DURATION
            {
                return Ok(cached.token.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed the token while we waited for the write lock.
        if let Some(cached) = cache.as_ref() &&
            cached.created_at.elapsed()? < TOKEN_VALIDITY_DURATION
        {
            return Ok(cached.token.clone());
        }

        let now = SystemTime::now();
        let iat = now.duration_since(UNIX_EPOCH)?.as_secs();
        let token = encode(&Header::default(), &Claims { iat }, &self.key)
            .map_err(|e| ExecutionError::Jwt(e.to_string()))?;

        cache.replace(JwtCache { token: token.clone(), created_at: now });

        Ok(token)
    }
}

/// Parses a hex-encoded 32 byte secret, as written to `jwt.hex` by execution clients.
pub fn parse_secret(contents: &str) -> Result<[u8; 32], ExecutionError> {
    let trimmed = contents.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = alloy_primitives::hex::decode(hex).map_err(|e| ExecutionError::Jwt(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| ExecutionError::Jwt(format!("expected 32 bytes, got {}", b.len())))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::task::JoinSet;

    use super::*;

    #[tokio::test]
    async fn can_generate_and_cache_token() {
        let provider = JwtProvider::new([1; 32]);
        let token1 = provider.get_token().await.unwrap();
        assert!(!token1.is_empty());

        let token2 = provider.get_token().await.unwrap();
        assert_eq!(token1, token2);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_regenerated_token() {
        let provider = Arc::new(JwtProvider::new([4u8; 32]));
        let initial_token = provider.get_token().await.unwrap();

        {
            let mut cache = provider.cache.write().await;
            if let Some(cached) = cache.as_mut() {
                cached.created_at = SystemTime::now() - Duration::from_secs(60);
            }
        }
        // `iat` has second resolution; make sure the new token differs.
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut set = JoinSet::new();
        for _ in 0..10 {
            let provider = provider.clone();
            set.spawn(async move { provider.get_token().await.unwrap() });
        }

        let mut new_tokens = Vec::new();
        while let Some(res) = set.join_next().await {
            new_tokens.push(res.unwrap());
        }

        assert_eq!(new_tokens.len(), 10);
        assert!(new_tokens.iter().all(|t| t == &new_tokens[0]));
        assert_ne!(initial_token, new_tokens[0]);
    }

    #[test]
    fn parses_secret_with_and_without_prefix() {
        let hex = "11".repeat(32);
        assert_eq!(parse_secret(&hex).unwrap(), [0x11; 32]);
        assert_eq!(parse_secret(&format!("0x{hex}\n")).unwrap(), [0x11; 32]);
        assert!(parse_secret("0x1234").is_err());
        assert!(parse_secret("zz").is_err());
    }
}
