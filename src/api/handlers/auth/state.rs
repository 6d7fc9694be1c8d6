//! Shared application state for the sign-in flow.
//!
//! Everything the handlers need travels in one `AuthState` behind an
//! `Extension(Arc<..>)`, there are no process-wide singletons.

use crate::api::handlers::auth::{pending::PendingAuthorizations, providers::ProviderRegistry};
use crate::api::APP_USER_AGENT;
use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

const PROVIDER_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct AuthConfig {
    base_url: String,
    argon2_time_cost: u32,
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
}

impl AuthConfig {
    #[must_use]
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub(crate) const fn argon2_time_cost(&self) -> u32 {
        self.argon2_time_cost
    }

    #[must_use]
    pub(crate) const fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub(crate) const fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }
}

pub struct AuthState {
    config: AuthConfig,
    registry: ProviderRegistry,
    client: Client,
    pending: PendingAuthorizations,
}

impl AuthState {
    pub fn new(globals: &GlobalArgs) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(PROVIDER_HTTP_TIMEOUT)
            .build()
            .context("failed to build provider HTTP client")?;

        Ok(Self {
            config: AuthConfig {
                base_url: globals.base_url.clone(),
                argon2_time_cost: globals.argon2_time_cost,
                session_ttl_seconds: globals.session_ttl_seconds,
                session_cookie_secure: globals.session_cookie_secure,
            },
            registry: ProviderRegistry::from_globals(globals),
            client,
            pending: PendingAuthorizations::default(),
        })
    }

    #[must_use]
    pub(crate) fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub(crate) fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    #[must_use]
    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub(crate) fn pending(&self) -> &PendingAuthorizations {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::providers::Provider;
    use crate::cli::globals::ProviderCredentials;
    use secrecy::SecretString;

    #[test]
    fn state_from_globals() -> Result<()> {
        let mut globals = GlobalArgs::new("https://stores.example.com".to_string());
        globals.facebook = Some(ProviderCredentials {
            client_id: "fb-id".to_string(),
            client_secret: SecretString::from("fb-secret"),
        });
        globals.session_cookie_secure = true;

        let state = AuthState::new(&globals)?;
        assert_eq!(state.config().base_url(), "https://stores.example.com");
        assert_eq!(state.config().argon2_time_cost(), 4);
        assert_eq!(state.config().session_ttl_seconds(), 86400);
        assert!(state.config().session_cookie_secure());
        assert!(state.registry().is_configured(Provider::Facebook));
        assert!(!state.registry().is_configured(Provider::Google));
        Ok(())
    }
}
