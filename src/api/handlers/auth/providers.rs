//! OAuth2 provider adapters.
//!
//! The provider set is a closed enum; adding a provider means adding a
//! variant and its endpoints here, there is no runtime registration.

use crate::cli::globals::{GlobalArgs, ProviderCredentials};
use anyhow::anyhow;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub(crate) enum OAuth2Error {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider not configured: {0}")]
    NotConfigured(Provider),
    #[error("authorization denied by {0}")]
    Denied(Provider),
    #[error("missing or mismatched state")]
    StateMismatch,
    #[error("token exchange with {0} failed: {1}")]
    TokenExchange(Provider, anyhow::Error),
    #[error("{0} returned no access token")]
    MissingAccessToken(Provider),
    #[error("profile fetch from {0} failed: {1}")]
    ProfileFetch(Provider, anyhow::Error),
    #[error("{0} profile is missing a stable user id")]
    MissingSocialId(Provider),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Provider {
    Google,
    Facebook,
}

impl Provider {
    pub(crate) const ALL: [Self; 2] = [Self::Google, Self::Facebook];

    pub(crate) fn from_name(name: &str) -> Result<Self, OAuth2Error> {
        match name {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            other => Err(OAuth2Error::UnknownProvider(other.to_string())),
        }
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
        }
    }

    const fn authorize_endpoint(self) -> &'static str {
        match self {
            Self::Google => "https://accounts.google.com/o/oauth2/auth",
            Self::Facebook => "https://www.facebook.com/dialog/oauth",
        }
    }

    const fn token_endpoint(self) -> &'static str {
        match self {
            Self::Google => "https://accounts.google.com/o/oauth2/token",
            Self::Facebook => "https://graph.facebook.com/oauth/access_token",
        }
    }

    const fn userinfo_endpoint(self) -> &'static str {
        match self {
            Self::Google => "https://www.googleapis.com/userinfo/v2/me",
            Self::Facebook => "https://graph.facebook.com/me?fields=id,name,email",
        }
    }

    const fn scope(self) -> &'static str {
        match self {
            Self::Google => "https://www.googleapis.com/auth/userinfo.email",
            Self::Facebook => "email",
        }
    }

    /// Callback URL registered with the provider.
    pub(crate) fn redirect_uri(self, base_url: &str) -> String {
        format!("{base_url}/oauth2/sign-in/{}/authorized", self.name())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized view of a provider's userinfo payload.
#[derive(Debug, Clone)]
pub(crate) struct ProviderProfile {
    pub provider: Provider,
    pub social_id: String,
    pub email_address: Option<String>,
    pub username: Option<String>,
}

/// Credentials per configured provider. Unconfigured providers stay out
/// of the map and their routes answer as not available.
pub(crate) struct ProviderRegistry {
    credentials: HashMap<Provider, ProviderCredentials>,
}

impl ProviderRegistry {
    pub(crate) fn from_globals(globals: &GlobalArgs) -> Self {
        let mut credentials = HashMap::new();
        if let Some(google) = &globals.google {
            credentials.insert(Provider::Google, google.clone());
        }
        if let Some(facebook) = &globals.facebook {
            credentials.insert(Provider::Facebook, facebook.clone());
        }
        Self { credentials }
    }

    pub(crate) fn credentials(
        &self,
        provider: Provider,
    ) -> Result<&ProviderCredentials, OAuth2Error> {
        self.credentials
            .get(&provider)
            .ok_or(OAuth2Error::NotConfigured(provider))
    }

    pub(crate) fn is_configured(&self, provider: Provider) -> bool {
        self.credentials.contains_key(&provider)
    }
}

/// Build the URL the browser is redirected to for consent.
pub(crate) fn authorization_url(
    registry: &ProviderRegistry,
    provider: Provider,
    base_url: &str,
    state: &str,
) -> Result<String, OAuth2Error> {
    let credentials = registry.credentials(provider)?;
    let mut url = Url::parse(provider.authorize_endpoint())
        .map_err(|err| OAuth2Error::Internal(anyhow!("bad authorize endpoint: {err}")))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &credentials.client_id)
        .append_pair("redirect_uri", &provider.redirect_uri(base_url))
        .append_pair("scope", provider.scope())
        .append_pair("state", state);
    Ok(url.into())
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchange an authorization code for a bearer token.
pub(crate) async fn exchange_code(
    client: &Client,
    registry: &ProviderRegistry,
    provider: Provider,
    base_url: &str,
    code: &str,
) -> Result<String, OAuth2Error> {
    let credentials = registry.credentials(provider)?;
    let redirect_uri = provider.redirect_uri(base_url);
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri.as_str()),
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.expose_secret()),
    ];

    let response = client
        .post(provider.token_endpoint())
        .form(&params)
        .send()
        .await
        .map_err(|err| OAuth2Error::TokenExchange(provider, err.into()))?;

    let status = response.status();
    if !status.is_success() {
        debug!(%provider, %status, "token endpoint rejected the code");
        return Err(OAuth2Error::TokenExchange(
            provider,
            anyhow!("token endpoint returned {status}"),
        ));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|err| OAuth2Error::TokenExchange(provider, err.into()))?;

    token
        .access_token
        .ok_or(OAuth2Error::MissingAccessToken(provider))
}

/// Fetch the userinfo document and normalize it into a profile.
pub(crate) async fn fetch_profile(
    client: &Client,
    provider: Provider,
    access_token: &str,
) -> Result<ProviderProfile, OAuth2Error> {
    let response = client
        .get(provider.userinfo_endpoint())
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|err| OAuth2Error::ProfileFetch(provider, err.into()))?;

    let status = response.status();
    if !status.is_success() {
        debug!(%provider, %status, "userinfo endpoint rejected the token");
        return Err(OAuth2Error::ProfileFetch(
            provider,
            anyhow!("userinfo endpoint returned {status}"),
        ));
    }

    let data: Value = response
        .json()
        .await
        .map_err(|err| OAuth2Error::ProfileFetch(provider, err.into()))?;

    extract_profile(provider, &data)
}

/// Map the raw userinfo payload to the fields this application keeps.
///
/// Google documents `id`, `email` and `name`. Facebook with the `email`
/// scope still omits the address for accounts registered by phone
/// number, so only `id` and `name` are read and the email stays unset.
pub(crate) fn extract_profile(
    provider: Provider,
    data: &Value,
) -> Result<ProviderProfile, OAuth2Error> {
    let social_id = data
        .get("id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or(OAuth2Error::MissingSocialId(provider))?;

    let username = data
        .get("name")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    let email_address = match provider {
        Provider::Google => data
            .get("email")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        Provider::Facebook => None,
    };

    Ok(ProviderProfile {
        provider,
        social_id,
        email_address,
        username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;

    fn registry_with_google() -> ProviderRegistry {
        let mut globals = GlobalArgs::new("https://stores.example.com".to_string());
        globals.google = Some(ProviderCredentials {
            client_id: "google-id".to_string(),
            client_secret: SecretString::from("google-secret"),
        });
        ProviderRegistry::from_globals(&globals)
    }

    #[test]
    fn from_name_resolves_known_providers() {
        assert_eq!(Provider::from_name("google").ok(), Some(Provider::Google));
        assert_eq!(
            Provider::from_name("facebook").ok(),
            Some(Provider::Facebook)
        );
        assert!(matches!(
            Provider::from_name("github"),
            Err(OAuth2Error::UnknownProvider(name)) if name == "github"
        ));
    }

    #[test]
    fn redirect_uri_points_at_callback_route() {
        assert_eq!(
            Provider::Google.redirect_uri("https://stores.example.com"),
            "https://stores.example.com/oauth2/sign-in/google/authorized"
        );
    }

    #[test]
    fn unconfigured_provider_is_rejected() {
        let registry = registry_with_google();
        assert!(registry.is_configured(Provider::Google));
        assert!(!registry.is_configured(Provider::Facebook));
        assert!(matches!(
            registry.credentials(Provider::Facebook),
            Err(OAuth2Error::NotConfigured(Provider::Facebook))
        ));
    }

    #[test]
    fn authorization_url_carries_the_flow_params() {
        let registry = registry_with_google();
        let url = authorization_url(
            &registry,
            Provider::Google,
            "https://stores.example.com",
            "a1b2c3",
        )
        .expect("url");

        let parsed = Url::parse(&url).expect("parse");
        assert_eq!(parsed.host_str(), Some("accounts.google.com"));
        let pairs: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(pairs.get("client_id").map(String::as_str), Some("google-id"));
        assert_eq!(
            pairs.get("redirect_uri").map(String::as_str),
            Some("https://stores.example.com/oauth2/sign-in/google/authorized")
        );
        assert_eq!(
            pairs.get("scope").map(String::as_str),
            Some("https://www.googleapis.com/auth/userinfo.email")
        );
        assert_eq!(pairs.get("state").map(String::as_str), Some("a1b2c3"));
    }

    #[test]
    fn google_profile_extraction() {
        let data = json!({
            "id": "109876543210987654321",
            "email": "alice@example.com",
            "name": "Alice",
            "verified_email": true
        });
        let profile = extract_profile(Provider::Google, &data).expect("profile");
        assert_eq!(profile.social_id, "109876543210987654321");
        assert_eq!(profile.email_address.as_deref(), Some("alice@example.com"));
        assert_eq!(profile.username.as_deref(), Some("Alice"));
    }

    #[test]
    fn facebook_profile_never_carries_email() {
        let data = json!({
            "id": "1234567890",
            "name": "Alice",
            "email": "alice@example.com"
        });
        let profile = extract_profile(Provider::Facebook, &data).expect("profile");
        assert_eq!(profile.social_id, "1234567890");
        assert_eq!(profile.email_address, None);
        assert_eq!(profile.username.as_deref(), Some("Alice"));
    }

    #[test]
    fn profile_without_id_is_rejected() {
        let data = json!({ "name": "Alice" });
        assert!(matches!(
            extract_profile(Provider::Google, &data),
            Err(OAuth2Error::MissingSocialId(Provider::Google))
        ));
    }
}
