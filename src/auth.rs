//! Identity resolution boundary.
//!
//! The core never validates credentials; it asks a collaborator to turn a
//! bearer token into a stable player identity. Credential issuance,
//! password hashing, and login flows live outside this crate.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// A resolved caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user id.
    pub user_id: String,
    /// Display name.
    pub username: String,
}

/// Resolves bearer tokens to player identities.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves a token, or `None` if it is unknown or expired.
    async fn resolve(&self, token: &str) -> Option<Identity>;
}

/// In-memory token table. Backs the binary and the tests; a deployment
/// would wire a real authentication service behind the same trait.
#[derive(Debug, Default)]
pub struct TokenTable {
    tokens: RwLock<HashMap<String, Identity>>,
}

impl TokenTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token for an identity.
    pub fn insert(&self, token: impl Into<String>, identity: Identity) {
        self.tokens
            .write()
            .expect("token table lock poisoned")
            .insert(token.into(), identity);
    }

    /// Loads `token=user_id:username` entries from a comma-separated list,
    /// the format of the `GOMOKU_TOKENS` environment variable.
    pub fn load(&self, spec: &str) -> usize {
        let mut loaded = 0;
        for entry in spec.split(',').filter(|e| !e.trim().is_empty()) {
            if let Some((token, rest)) = entry.trim().split_once('=')
                && let Some((user_id, username)) = rest.split_once(':')
            {
                self.insert(
                    token,
                    Identity {
                        user_id: user_id.to_string(),
                        username: username.to_string(),
                    },
                );
                loaded += 1;
            }
        }
        loaded
    }
}

#[async_trait]
impl IdentityResolver for TokenTable {
    async fn resolve(&self, token: &str) -> Option<Identity> {
        let identity = self
            .tokens
            .read()
            .expect("token table lock poisoned")
            .get(token)
            .cloned();
        if identity.is_none() {
            debug!("unknown token");
        }
        identity
    }
}
