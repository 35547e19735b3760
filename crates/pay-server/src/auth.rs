//! Identity Resolution Boundary
//!
//! Authentication itself is delegated to an external identity provider;
//! this service only consumes a resolved, stable token identifier and
//! links it to a user row.

use async_trait::async_trait;

use pay_core::{Result, User, UserStore};

/// A resolved caller identity
#[derive(Clone, Debug)]
pub struct Identity {
    /// Issuer-prefixed subject, the user-table join key
    pub token_identifier: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// External identity provider boundary
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Map a bearer token to an identity; `None` means unauthenticated
    async fn resolve(&self, bearer_token: &str) -> Option<Identity>;
}

/// Resolver for development and tests
///
/// Accepts any non-empty token and derives a stable identity from it,
/// so the same token always maps to the same user.
#[derive(Default)]
pub struct MockIdentityResolver;

#[async_trait]
impl IdentityResolver for MockIdentityResolver {
    async fn resolve(&self, bearer_token: &str) -> Option<Identity> {
        if bearer_token.is_empty() {
            return None;
        }
        Some(Identity {
            token_identifier: format!("https://mock-issuer|{}", bearer_token),
            email: Some(format!("{}@example.com", bearer_token)),
            name: None,
        })
    }
}

/// Find the user row for an identity, creating it on first contact
pub fn link_identity(users: &dyn UserStore, identity: &Identity) -> Result<User> {
    if let Some(user) = users.find_by_token(&identity.token_identifier)? {
        return Ok(user);
    }
    let user = User::new(identity.token_identifier.clone())
        .with_profile(identity.email.clone(), identity.name.clone());
    users.insert(user.clone())?;
    tracing::info!(user_id = %user.id, "linked new identity");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pay_core::MemoryStore;

    #[tokio::test]
    async fn test_same_token_links_same_user() {
        let store = MemoryStore::new();
        let resolver = MockIdentityResolver;

        let identity = resolver.resolve("alice").await.unwrap();
        let first = link_identity(&store, &identity).unwrap();
        let second = link_identity(&store, &identity).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_empty_token_is_unauthenticated() {
        let resolver = MockIdentityResolver;
        assert!(resolver.resolve("").await.is_none());
    }
}
