//! Identity provider binding: user pool, application client, and the
//! token validation seam consumed by the public API gateway.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use weft_graph::{Attr, ResourceKind, ResourceSpec};

/// Identity provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub pool_name: String,
    pub client_name: String,
    /// Whether users may register themselves.
    pub self_sign_up: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            pool_name: "assistant-users".to_string(),
            client_name: "assistant-chat-ui".to_string(),
            self_sign_up: false,
        }
    }
}

impl IdentityConfig {
    pub fn pool_spec(&self, name: &str) -> ResourceSpec {
        ResourceSpec::new(name, ResourceKind::UserPool)
            .with_property("pool_name", Attr::lit(&self.pool_name))
            .with_property("self_sign_up", Attr::lit(self.self_sign_up.to_string()))
    }

    pub fn client_spec(&self, name: &str, pool: &str) -> ResourceSpec {
        ResourceSpec::new(name, ResourceKind::UserPoolClient)
            .with_property("client_name", Attr::lit(&self.client_name))
            .with_property("user_pool", Attr::output(pool, "id"))
    }
}

/// Identity claims extracted from a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Stable subject identifier.
    pub subject: String,
    /// Remaining claims as attached to the forwarded request.
    pub claims: BTreeMap<String, String>,
}

impl Claims {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            claims: BTreeMap::new(),
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }
}

/// Token validation errors, mapped by the gateway to 401/403.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No bearer token presented")]
    MissingToken,

    #[error("Token rejected: {0}")]
    InvalidToken(String),
}

/// Validates bearer tokens issued by the identity provider.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, bearer: &str) -> Result<Claims, AuthError>;
}

/// Fixed-token validator for tests and local runs.
#[derive(Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, Claims>,
}

impl StaticTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, claims: Claims) -> Self {
        self.tokens.insert(token.into(), claims);
        self
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, bearer: &str) -> Result<Claims, AuthError> {
        self.tokens
            .get(bearer)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_depends_on_its_pool() {
        let config = IdentityConfig::default();
        let spec = config.client_spec("user-pool-client", "user-pool");
        assert!(spec.dependencies().contains("user-pool"));
    }

    #[tokio::test]
    async fn static_validator_accepts_known_tokens_only() {
        let validator = StaticTokenValidator::new()
            .with_token("good-token", Claims::new("user-1"));

        let claims = validator.validate("good-token").await.unwrap();
        assert_eq!(claims.subject, "user-1");

        let err = validator.validate("bad-token").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }
}
