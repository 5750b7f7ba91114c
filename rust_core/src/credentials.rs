// rust_core/src/credentials.rs
// Tokens are handed to the channel and the REST client at construction.
// Nothing in the crate reads them from global state.

use std::env;
use std::sync::RwLock;

use crate::models::{AuthTokens, UserId};

pub const ACCESS_TOKEN_ENV: &str = "LOTUS_ACCESS_TOKEN";
pub const REFRESH_TOKEN_ENV: &str = "LOTUS_REFRESH_TOKEN";

pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    /// Called after a successful refresh.
    fn store_tokens(&self, tokens: &AuthTokens);
    /// Called when a refresh is rejected; the user has to log in again.
    fn clear(&self);
}

#[derive(Debug, Default, Clone)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
    user_id: Option<UserId>,
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct TokenStore {
    inner: RwLock<Tokens>,
}

impl TokenStore {
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            inner: RwLock::new(Tokens {
                access: Some(access.into()),
                refresh,
                user_id: None,
            }),
        }
    }

    /// Reads `LOTUS_ACCESS_TOKEN` and `LOTUS_REFRESH_TOKEN`. Missing or empty
    /// variables leave the slot empty.
    pub fn from_env() -> Self {
        let read = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            inner: RwLock::new(Tokens {
                access: read(ACCESS_TOKEN_ENV),
                refresh: read(REFRESH_TOKEN_ENV),
                user_id: None,
            }),
        }
    }

    /// User id reported by the last refresh, if any.
    pub fn user_id(&self) -> Option<UserId> {
        self.read().user_id
    }

    fn read(&self) -> Tokens {
        // A poisoned lock still holds the last written tokens.
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write(&self, f: impl FnOnce(&mut Tokens)) {
        match self.inner.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl CredentialProvider for TokenStore {
    fn access_token(&self) -> Option<String> {
        self.read().access
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh
    }

    fn store_tokens(&self, tokens: &AuthTokens) {
        self.write(|t| {
            t.access = Some(tokens.access_token.clone());
            t.refresh = Some(tokens.refresh_token.clone());
            if tokens.user_id.is_some() {
                t.user_id = tokens.user_id;
            }
        });
    }

    fn clear(&self) {
        self.write(|t| *t = Tokens::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_replaces_both_tokens() {
        let store = TokenStore::new("old", Some("r-old".into()));
        store.store_tokens(&AuthTokens {
            access_token: "new".into(),
            refresh_token: "r-new".into(),
            user_id: Some(9),
            username: None,
        });
        assert_eq!(store.access_token().as_deref(), Some("new"));
        assert_eq!(store.refresh_token().as_deref(), Some("r-new"));
        assert_eq!(store.user_id(), Some(9));
    }

    #[test]
    fn clear_forgets_everything() {
        let store = TokenStore::new("a", Some("r".into()));
        store.clear();
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
    }
}
