use crate::api::handlers::auth::password::DEFAULT_TIME_COST;
use secrecy::SecretString;

/// Client credentials for one OAuth2 provider, sourced from CLI/env.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    /// External base URL used to build provider redirect URIs.
    pub base_url: String,
    pub google: Option<ProviderCredentials>,
    pub facebook: Option<ProviderCredentials>,
    /// Argon2 time cost ("rounds") for local password hashing.
    pub argon2_time_cost: u32,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
}

impl Default for GlobalArgs {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            google: None,
            facebook: None,
            argon2_time_cost: DEFAULT_TIME_COST,
            session_ttl_seconds: 86400,
            session_cookie_secure: false,
        }
    }
}

impl GlobalArgs {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }
}
