//! Session trust policy
//!
//! Decides whether a session's stored token counts as authenticated. The
//! decision is an ordered chain of named strategies, each independently
//! toggled by configuration, so every acceptance can be attributed and every
//! fallback can be switched off. With the default configuration only strict
//! signature verification is enabled.

use common::token::TokenService;
use tracing::warn;

/// Named strategy that accepted a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustStrategy {
    /// Debug builds accept any non-empty token
    DebugAcceptAll,
    /// Exact match of the configured sentinel value (identity-service-down
    /// fallback)
    SentinelToken,
    /// HS256 signature and expiry verified against the shared secret
    SignedToken,
    /// Alphanumeric string of at least 32 characters, treated as a legacy
    /// opaque hash token
    LegacyOpaqueHash,
    /// Last-resort acceptance of any non-empty token
    FailOpen,
}

/// Outcome of evaluating a token against the policy chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    Accepted(TrustStrategy),
    Rejected,
}

impl TrustDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TrustDecision::Accepted(_))
    }
}

/// Trust policy configuration
///
/// Every fallback defaults to off; production deployments run with nothing
/// but `SignedToken` enabled.
#[derive(Debug, Clone, Default)]
pub struct TrustConfig {
    pub debug_accept_all: bool,
    pub sentinel_token: Option<String>,
    pub accept_legacy_hash: bool,
    pub fail_open: bool,
}

impl TrustConfig {
    /// Strict configuration: signature verification only
    pub fn strict() -> Self {
        Self::default()
    }

    /// Create a TrustConfig from environment variables
    ///
    /// # Environment Variables
    /// - `DEBUG`: accept any non-empty token (default: false)
    /// - `TRUST_SENTINEL_TOKEN`: sentinel value accepted verbatim (default: unset)
    /// - `TRUST_ACCEPT_LEGACY_HASH`: accept legacy opaque hash tokens (default: false)
    /// - `TRUST_FAIL_OPEN`: accept any non-empty token as a last resort (default: false)
    pub fn from_env() -> Self {
        TrustConfig {
            debug_accept_all: env_flag("DEBUG"),
            sentinel_token: std::env::var("TRUST_SENTINEL_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            accept_legacy_hash: env_flag("TRUST_ACCEPT_LEGACY_HASH"),
            fail_open: env_flag("TRUST_FAIL_OPEN"),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Session trust policy
#[derive(Clone)]
pub struct TrustPolicy {
    config: TrustConfig,
    token_service: TokenService,
}

impl TrustPolicy {
    /// Create a new trust policy
    pub fn new(config: TrustConfig, token_service: TokenService) -> Self {
        Self {
            config,
            token_service,
        }
    }

    /// Evaluate a token against the strategy chain, in precedence order
    ///
    /// Never mutates state; an empty token is always rejected regardless of
    /// configuration.
    pub fn evaluate(&self, token: &str) -> TrustDecision {
        let token = token.trim();
        if token.is_empty() {
            return TrustDecision::Rejected;
        }

        if self.config.debug_accept_all {
            return self.accept(TrustStrategy::DebugAcceptAll);
        }

        if let Some(sentinel) = &self.config.sentinel_token {
            if token == sentinel {
                return self.accept(TrustStrategy::SentinelToken);
            }
        }

        if self.token_service.verify(token).is_ok() {
            return TrustDecision::Accepted(TrustStrategy::SignedToken);
        }

        if self.config.accept_legacy_hash
            && token.len() >= 32
            && token.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return self.accept(TrustStrategy::LegacyOpaqueHash);
        }

        if self.config.fail_open {
            return self.accept(TrustStrategy::FailOpen);
        }

        TrustDecision::Rejected
    }

    /// Get the trust policy configuration
    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    fn accept(&self, strategy: TrustStrategy) -> TrustDecision {
        // Every acceptance outside strict verification is an over-trust
        // event worth seeing in the logs.
        warn!("Token accepted by fallback strategy {:?}", strategy);
        TrustDecision::Accepted(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::token::{TokenConfig, TokenKind, TokenService};
    use uuid::Uuid;

    fn token_service(secret: &str) -> TokenService {
        TokenService::new(TokenConfig {
            secret: secret.to_string(),
            access_token_expiry: 86400,
            refresh_token_expiry: 604800,
        })
    }

    fn signed_token(secret: &str) -> String {
        token_service(secret)
            .issue(Uuid::new_v4(), "alice", TokenKind::Access)
            .unwrap()
    }

    #[test]
    fn strict_policy_accepts_only_signed_tokens() {
        let policy = TrustPolicy::new(TrustConfig::strict(), token_service("secret"));

        assert_eq!(
            policy.evaluate(&signed_token("secret")),
            TrustDecision::Accepted(TrustStrategy::SignedToken)
        );
        assert_eq!(policy.evaluate(&signed_token("other")), TrustDecision::Rejected);
        assert_eq!(policy.evaluate("demo-token"), TrustDecision::Rejected);
        assert_eq!(
            policy.evaluate(&"a".repeat(40)),
            TrustDecision::Rejected
        );
        assert_eq!(policy.evaluate("anything"), TrustDecision::Rejected);
    }

    #[test]
    fn empty_tokens_are_always_rejected() {
        let config = TrustConfig {
            debug_accept_all: true,
            fail_open: true,
            ..TrustConfig::default()
        };
        let policy = TrustPolicy::new(config, token_service("secret"));

        assert_eq!(policy.evaluate(""), TrustDecision::Rejected);
        assert_eq!(policy.evaluate("   "), TrustDecision::Rejected);
    }

    #[test]
    fn debug_accepts_anything_nonempty_first() {
        let config = TrustConfig {
            debug_accept_all: true,
            ..TrustConfig::default()
        };
        let policy = TrustPolicy::new(config, token_service("secret"));

        assert_eq!(
            policy.evaluate("whatever"),
            TrustDecision::Accepted(TrustStrategy::DebugAcceptAll)
        );
        // Even a valid signed token is attributed to the debug strategy.
        assert_eq!(
            policy.evaluate(&signed_token("secret")),
            TrustDecision::Accepted(TrustStrategy::DebugAcceptAll)
        );
    }

    #[test]
    fn sentinel_takes_precedence_over_signature() {
        let config = TrustConfig {
            sentinel_token: Some("demo-token".to_string()),
            ..TrustConfig::default()
        };
        let policy = TrustPolicy::new(config, token_service("secret"));

        assert_eq!(
            policy.evaluate("demo-token"),
            TrustDecision::Accepted(TrustStrategy::SentinelToken)
        );
        assert_eq!(
            policy.evaluate(&signed_token("secret")),
            TrustDecision::Accepted(TrustStrategy::SignedToken)
        );
        assert_eq!(policy.evaluate("not-the-sentinel"), TrustDecision::Rejected);
    }

    #[test]
    fn legacy_hash_requires_opt_in_and_shape() {
        let config = TrustConfig {
            accept_legacy_hash: true,
            ..TrustConfig::default()
        };
        let policy = TrustPolicy::new(config, token_service("secret"));

        assert_eq!(
            policy.evaluate(&"a1b2".repeat(8)),
            TrustDecision::Accepted(TrustStrategy::LegacyOpaqueHash)
        );
        // Too short, or not alphanumeric.
        assert_eq!(policy.evaluate("abc123"), TrustDecision::Rejected);
        let with_dash = format!("{}-{}", "a".repeat(16), "b".repeat(16));
        assert_eq!(policy.evaluate(&with_dash), TrustDecision::Rejected);
    }

    #[test]
    fn fail_open_catches_everything_when_enabled() {
        let config = TrustConfig {
            fail_open: true,
            ..TrustConfig::default()
        };
        let policy = TrustPolicy::new(config, token_service("secret"));

        assert_eq!(
            policy.evaluate("garbage"),
            TrustDecision::Accepted(TrustStrategy::FailOpen)
        );
        // A valid signature is still attributed to the stricter strategy.
        assert_eq!(
            policy.evaluate(&signed_token("secret")),
            TrustDecision::Accepted(TrustStrategy::SignedToken)
        );
    }
}
