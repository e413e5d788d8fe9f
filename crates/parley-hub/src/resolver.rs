use async_trait::async_trait;
use parley_core::config::{ResolverConfig, ResolverMode};
use parley_core::types::{Identity, SessionToken};
use std::collections::HashMap;

use crate::error::ResolveError;

/// Maps a session token to the identity that owns it.
///
/// Token parsing and validation live behind this seam; the hub only ever
/// sees the resolved identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Short label for logs (e.g. `"pass-through"`).
    fn name(&self) -> &str;

    async fn resolve(&self, token: &SessionToken) -> Result<Identity, ResolveError>;
}

/// identity = token. Every token resolves.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughResolver;

#[async_trait]
impl IdentityResolver for PassThroughResolver {
    fn name(&self) -> &str {
        "pass-through"
    }

    async fn resolve(&self, token: &SessionToken) -> Result<Identity, ResolveError> {
        Ok(Identity::new(token.as_str()))
    }
}

/// Fixed token → identity table; unknown tokens fail to resolve.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    tokens: HashMap<SessionToken, Identity>,
}

impl StaticResolver {
    pub fn new(tokens: HashMap<SessionToken, Identity>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl IdentityResolver for StaticResolver {
    fn name(&self) -> &str {
        "static"
    }

    async fn resolve(&self, token: &SessionToken) -> Result<Identity, ResolveError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownToken {
                token: token.to_string(),
            })
    }
}

/// Build the resolver selected by `resolver.mode`.
pub fn resolver_from_config(config: &ResolverConfig) -> Box<dyn IdentityResolver> {
    match config.mode {
        ResolverMode::PassThrough => Box::new(PassThroughResolver),
        ResolverMode::Static => Box::new(StaticResolver::new(
            config
                .tokens
                .iter()
                .map(|(t, i)| (SessionToken::new(t.as_str()), Identity::new(i.as_str())))
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pass_through_uses_token_as_identity() {
        let id = PassThroughResolver.resolve(&"tok-1".into()).await.unwrap();
        assert_eq!(id.as_str(), "tok-1");
    }

    #[tokio::test]
    async fn static_resolver_from_config() {
        let config = ResolverConfig {
            mode: ResolverMode::Static,
            tokens: HashMap::from([
                ("tab-1".to_string(), "alice".to_string()),
                ("tab-2".to_string(), "alice".to_string()),
            ]),
            reject_unresolved: true,
        };
        let resolver = resolver_from_config(&config);
        assert_eq!(resolver.name(), "static");

        assert_eq!(resolver.resolve(&"tab-1".into()).await.unwrap().as_str(), "alice");
        assert_eq!(resolver.resolve(&"tab-2".into()).await.unwrap().as_str(), "alice");
        assert!(matches!(
            resolver.resolve(&"nope".into()).await,
            Err(ResolveError::UnknownToken { .. })
        ));
    }
}
