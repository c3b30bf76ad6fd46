//! Session provider boundary.
//!
//! A [`Session`] is the only source of the owner identity used for store
//! access. The orchestrator receives it read-only and rejects calls without
//! one.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::config::AuthConfig;
use crate::journal::OwnerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub owner: OwnerId,
    pub credential: String,
}

impl Session {
    pub fn new(owner: OwnerId, credential: impl Into<String>) -> Self {
        Self {
            owner,
            credential: credential.into(),
        }
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve a bearer credential into a session, or `None` if it is missing
    /// or unknown.
    async fn resolve(&self, credential: Option<&str>) -> Option<Session>;
}

/// Sessions from the `[[auth.tokens]]` table of the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenSessions {
    tokens: HashMap<String, OwnerId>,
}

impl StaticTokenSessions {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .filter(|t| !t.token.is_empty() && !t.owner.trim().is_empty())
            .map(|t| (t.token.clone(), OwnerId::new(t.owner.trim())))
            .collect();
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl SessionProvider for StaticTokenSessions {
    async fn resolve(&self, credential: Option<&str>) -> Option<Session> {
        let token = credential?.trim();
        self.tokens
            .get(token)
            .map(|owner| Session::new(owner.clone(), token))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
