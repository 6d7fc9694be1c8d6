//! OAuth2 sign-in flow: redirect, callback and sign-out.
//!
//! Provider failures never surface as error pages; the callback answers
//! with a redirect carrying a failure notice and the details go to the
//! logs.

use crate::api::handlers::auth::{
    identity::{reconcile, Identity},
    pending::PendingAuthorization,
    providers::{
        authorization_url, exchange_code, fetch_profile, OAuth2Error, Provider,
    },
    session::{clear_session_cookie, extract_session_token, require_authentication, session_cookie},
    state::AuthState,
    storage::{
        clear_provider_token, delete_session, insert_session, sweep_expired_sessions,
        PgIdentityStore,
    },
    types::{AuthorizedQuery, SignInQuery},
    utils::{generate_state_nonce, hash_session_token, sanitize_next},
};
use axum::{
    extract::{Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

const AUTH_FAILED_TARGET: &str = "/?notice=authentication-failed";

fn provider_not_available() -> Response {
    (StatusCode::NOT_FOUND, "Provider not available").into_response()
}

fn auth_failed() -> Response {
    Redirect::to(AUTH_FAILED_TARGET).into_response()
}

/// Start the flow: record the attempt and send the browser to the
/// provider's consent page.
#[utoipa::path(
    get,
    path = "/oauth2/sign-in/{provider}",
    tag = "auth",
    responses(
        (status = 303, description = "Redirect to the provider's consent page"),
        (status = 404, description = "Provider not available")
    )
)]
pub(crate) async fn oauth2_redirect(
    Path(provider): Path<String>,
    Query(query): Query<SignInQuery>,
    Extension(auth): Extension<Arc<AuthState>>,
) -> Response {
    let Ok(provider) = Provider::from_name(&provider) else {
        return provider_not_available();
    };
    if !auth.registry().is_configured(provider) {
        return provider_not_available();
    }

    let state_nonce = match generate_state_nonce() {
        Ok(nonce) => nonce,
        Err(err) => {
            error!("state nonce generation failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match authorization_url(
        auth.registry(),
        provider,
        auth.config().base_url(),
        &state_nonce,
    ) {
        Ok(url) => {
            auth.pending().insert(
                state_nonce,
                provider,
                sanitize_next(query.next.as_deref()),
            );
            Redirect::to(&url).into_response()
        }
        Err(err) => {
            error!(%provider, "failed to build authorization url: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

struct CallbackOutcome {
    identity: Identity,
    access_token: String,
    next: Option<String>,
}

/// Validate the callback, exchange the code, fetch the profile and
/// reconcile the identity. The state nonce must round-trip: no entry,
/// a replayed entry or a provider mismatch all abort before any
/// provider traffic.
async fn run_callback(
    auth: &AuthState,
    pool: &PgPool,
    provider: Provider,
    query: &AuthorizedQuery,
) -> Result<CallbackOutcome, OAuth2Error> {
    let state = query.state.as_deref().ok_or(OAuth2Error::StateMismatch)?;
    let pending: PendingAuthorization = auth
        .pending()
        .take(state)
        .ok_or(OAuth2Error::StateMismatch)?;
    if pending.provider != provider {
        return Err(OAuth2Error::StateMismatch);
    }

    if query.error.is_some() {
        return Err(OAuth2Error::Denied(provider));
    }
    let code = query.code.as_deref().ok_or(OAuth2Error::Denied(provider))?;

    let access_token = exchange_code(
        auth.client(),
        auth.registry(),
        provider,
        auth.config().base_url(),
        code,
    )
    .await?;

    let profile = fetch_profile(auth.client(), provider, &access_token).await?;

    let store = PgIdentityStore::new(pool.clone());
    let identity = reconcile(&store, &profile)
        .await
        .map_err(OAuth2Error::Internal)?;

    Ok(CallbackOutcome {
        identity,
        access_token,
        next: pending.next,
    })
}

/// Callback route the provider redirects back to.
#[utoipa::path(
    get,
    path = "/oauth2/sign-in/{provider}/authorized",
    tag = "auth",
    responses(
        (status = 303, description = "Signed in or redirected with a failure notice"),
        (status = 404, description = "Provider not available")
    )
)]
pub(crate) async fn oauth2_authorized(
    Path(provider): Path<String>,
    Query(query): Query<AuthorizedQuery>,
    Extension(auth): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let Ok(provider) = Provider::from_name(&provider) else {
        return provider_not_available();
    };

    match run_callback(&auth, &pool, provider, &query).await {
        Ok(outcome) => {
            if let Err(err) = sweep_expired_sessions(&pool).await {
                warn!("session sweep failed: {err}");
            }

            match insert_session(
                &pool,
                outcome.identity.id,
                Some(&outcome.access_token),
                auth.config().session_ttl_seconds(),
            )
            .await
            {
                Ok(token) => {
                    info!(%provider, "signed in {}", outcome.identity.display_name());
                    let target = outcome
                        .next
                        .unwrap_or_else(|| "/?notice=signed-in".to_string());
                    (
                        [(header::SET_COOKIE, session_cookie(auth.config(), &token))],
                        Redirect::to(&target),
                    )
                        .into_response()
                }
                Err(err) => {
                    error!(%provider, "session insert failed: {err}");
                    auth_failed()
                }
            }
        }
        Err(OAuth2Error::UnknownProvider(_) | OAuth2Error::NotConfigured(_)) => {
            provider_not_available()
        }
        Err(err) => {
            warn!(%provider, "sign-in failed: {err}");
            auth_failed()
        }
    }
}

/// End the session: detach the provider token, drop the session row and
/// clear the cookie.
#[utoipa::path(
    get,
    path = "/oauth2/sign-out",
    tag = "auth",
    responses(
        (status = 303, description = "Signed out, or redirected to sign-in when anonymous")
    )
)]
pub(crate) async fn sign_out(
    headers: HeaderMap,
    Extension(auth): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let identity = match require_authentication(&headers, &pool, "/oauth2/sign-out").await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let Some(token) = extract_session_token(&headers) else {
        return Redirect::to("/").into_response();
    };
    let token_hash = hash_session_token(&token);

    if let Err(err) = clear_provider_token(&pool, &token_hash).await {
        warn!("provider token clear failed: {err}");
    }
    if let Err(err) = delete_session(&pool, &token_hash).await {
        error!("session delete failed: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    info!("signed out {}", identity.display_name());
    (
        [(header::SET_COOKIE, clear_session_cookie(auth.config()))],
        Redirect::to("/?notice=signed-out"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::pending::PendingAuthorizations;
    use crate::cli::globals::{GlobalArgs, ProviderCredentials};
    use secrecy::SecretString;

    fn auth_state() -> AuthState {
        let mut globals = GlobalArgs::new("http://localhost:8080".to_string());
        globals.google = Some(ProviderCredentials {
            client_id: "id".to_string(),
            client_secret: SecretString::from("secret"),
        });
        AuthState::new(&globals).expect("auth state")
    }

    fn query(state: Option<&str>, code: Option<&str>, error: Option<&str>) -> AuthorizedQuery {
        AuthorizedQuery {
            code: code.map(ToString::to_string),
            state: state.map(ToString::to_string),
            error: error.map(ToString::to_string),
        }
    }

    async fn callback_error(
        auth: &AuthState,
        provider: Provider,
        query: &AuthorizedQuery,
    ) -> OAuth2Error {
        // The pool is never reached on validation failures.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        match run_callback(auth, &pool, provider, query).await {
            Ok(_) => panic!("callback unexpectedly succeeded"),
            Err(err) => err,
        }
    }

    #[tokio::test]
    async fn callback_without_state_is_a_mismatch() {
        let auth = auth_state();
        let err = callback_error(&auth, Provider::Google, &query(None, Some("code"), None)).await;
        assert!(matches!(err, OAuth2Error::StateMismatch));
    }

    #[tokio::test]
    async fn callback_with_unknown_state_is_a_mismatch() {
        let auth = auth_state();
        let err = callback_error(
            &auth,
            Provider::Google,
            &query(Some("never-issued"), Some("code"), None),
        )
        .await;
        assert!(matches!(err, OAuth2Error::StateMismatch));
    }

    #[tokio::test]
    async fn callback_on_the_wrong_provider_is_a_mismatch() {
        let auth = auth_state();
        auth.pending()
            .insert("nonce".to_string(), Provider::Facebook, None);
        let err = callback_error(
            &auth,
            Provider::Google,
            &query(Some("nonce"), Some("code"), None),
        )
        .await;
        assert!(matches!(err, OAuth2Error::StateMismatch));
    }

    #[tokio::test]
    async fn denied_consent_is_reported_before_any_exchange() {
        let auth = auth_state();
        auth.pending()
            .insert("nonce".to_string(), Provider::Google, None);
        let err = callback_error(
            &auth,
            Provider::Google,
            &query(Some("nonce"), None, Some("access_denied")),
        )
        .await;
        assert!(matches!(err, OAuth2Error::Denied(Provider::Google)));
    }

    #[tokio::test]
    async fn missing_code_counts_as_denied() {
        let auth = auth_state();
        auth.pending()
            .insert("nonce".to_string(), Provider::Google, None);
        let err =
            callback_error(&auth, Provider::Google, &query(Some("nonce"), None, None)).await;
        assert!(matches!(err, OAuth2Error::Denied(Provider::Google)));
    }

    #[tokio::test]
    async fn state_nonce_is_take_once() {
        let pending = PendingAuthorizations::default();
        pending.insert("nonce".to_string(), Provider::Google, None);
        assert!(pending.take("nonce").is_some());
        assert!(pending.take("nonce").is_none());
    }
}
