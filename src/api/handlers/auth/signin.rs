//! Local (email + password) sign-in and registration.

use crate::api::handlers::auth::{
    identity::{CreateOutcome, Identity, IdentityStore},
    session::session_cookie,
    state::{AuthConfig, AuthState},
    storage::{insert_session, sweep_expired_sessions, PgIdentityStore},
    types::{SignInForm, SignInQuery, SignUpForm},
    utils::{normalize_email, sanitize_next, valid_email, valid_password},
};
use crate::api::handlers::auth::providers::Provider;
use anyhow::Result;
use axum::{
    extract::Query,
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, warn};

const INVALID_CREDENTIALS: &str = "Invalid username or password.";
const ACCOUNT_EXISTS: &str = "An account with that email already exists.";

/// Redirect target after a successful sign-in.
fn signed_in_response(config: &AuthConfig, token: &str, next: Option<String>) -> Response {
    let target = next.unwrap_or_else(|| "/?notice=signed-in".to_string());
    (
        [(header::SET_COOKIE, session_cookie(config, token))],
        Redirect::to(&target),
    )
        .into_response()
}

/// Check email + password against the identity store.
///
/// Unknown email, wrong password and non-local accounts all come back
/// as `None`, so callers cannot tell them apart.
pub(crate) async fn verify_local_credentials(
    store: &dyn IdentityStore,
    email_address: &str,
    password: &str,
) -> Result<Option<Identity>> {
    let email = normalize_email(email_address);
    if !valid_email(&email) {
        return Ok(None);
    }

    match store.find_by_email(&email).await? {
        Some(identity) if identity.is_local() && identity.verify_password(password) => {
            Ok(Some(identity))
        }
        _ => Ok(None),
    }
}

/// Result of a local registration attempt.
#[derive(Debug)]
pub(crate) enum RegisterOutcome {
    Registered(Identity),
    /// An identity with that email already exists, local or social.
    EmailTaken,
}

/// Create a local identity for a normalized, validated email.
///
/// The email is checked first, and a lost insert race still reports
/// `EmailTaken` through the unique constraint.
pub(crate) async fn register_local(
    store: &dyn IdentityStore,
    email_normalized: &str,
    username: Option<String>,
    password: &str,
    time_cost: u32,
) -> Result<RegisterOutcome> {
    if store.find_by_email(email_normalized).await?.is_some() {
        return Ok(RegisterOutcome::EmailTaken);
    }

    let identity = Identity::new_local(email_normalized, username, password, time_cost)?;
    match store.create(identity).await? {
        CreateOutcome::Created(identity) => Ok(RegisterOutcome::Registered(identity)),
        CreateOutcome::Conflict => Ok(RegisterOutcome::EmailTaken),
    }
}

/// Sign-in entry point. Lists the ways to sign in; the auth gate sends
/// anonymous requests here with the original path in `next`.
#[utoipa::path(
    get,
    path = "/oauth2/sign-in",
    tag = "auth",
    responses(
        (status = 200, description = "Available sign-in methods")
    )
)]
pub(crate) async fn sign_in_options(
    Query(query): Query<SignInQuery>,
    Extension(auth): Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let providers: Vec<&str> = Provider::ALL
        .iter()
        .copied()
        .filter(|provider| auth.registry().is_configured(*provider))
        .map(Provider::name)
        .collect();

    Json(json!({
        "local": "/oauth2/sign-in",
        "sign_up": "/oauth2/sign-up",
        "providers": providers,
        "next": sanitize_next(query.next.as_deref()),
    }))
}

/// Verify email + password and open a session.
///
/// Unknown email, wrong password and non-local accounts all answer with
/// the same message.
#[utoipa::path(
    post,
    path = "/oauth2/sign-in",
    tag = "auth",
    request_body(content = SignInForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in, session cookie set"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub(crate) async fn sign_in(
    Extension(auth): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    Form(form): Form<SignInForm>,
) -> Response {
    let store = PgIdentityStore::new(pool.clone());
    let identity =
        match verify_local_credentials(&store, &form.email_address, &form.password).await {
            Ok(identity) => identity,
            Err(err) => {
                error!("sign-in lookup failed: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

    match identity {
        Some(identity) => {
            open_session(&auth, &pool, &identity, sanitize_next(form.next.as_deref())).await
        }
        None => {
            debug!("rejected local sign-in for {}", form.email_address);
            (StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS).into_response()
        }
    }
}

/// Register a local account and sign it in.
#[utoipa::path(
    post,
    path = "/oauth2/sign-up",
    tag = "auth",
    request_body(content = SignUpForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Account created, session cookie set"),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered")
    )
)]
pub(crate) async fn sign_up(
    Extension(auth): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    Form(form): Form<SignUpForm>,
) -> Response {
    let email = normalize_email(&form.email_address);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email address.").into_response();
    }
    if !valid_password(&form.password) {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters long.",
        )
            .into_response();
    }

    let username = form
        .username
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string);

    let store = PgIdentityStore::new(pool.clone());
    match register_local(
        &store,
        &email,
        username,
        &form.password,
        auth.config().argon2_time_cost(),
    )
    .await
    {
        Ok(RegisterOutcome::Registered(identity)) => {
            open_session(&auth, &pool, &identity, sanitize_next(form.next.as_deref())).await
        }
        Ok(RegisterOutcome::EmailTaken) => (StatusCode::CONFLICT, ACCOUNT_EXISTS).into_response(),
        Err(err) => {
            error!("sign-up failed for {email}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn open_session(
    auth: &AuthState,
    pool: &PgPool,
    identity: &Identity,
    next: Option<String>,
) -> Response {
    if let Err(err) = sweep_expired_sessions(pool).await {
        warn!("session sweep failed: {err}");
    }

    match insert_session(pool, identity.id, None, auth.config().session_ttl_seconds()).await {
        Ok(token) => signed_in_response(auth.config(), &token, next),
        Err(err) => {
            error!("session insert failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::identity::testing::MemoryIdentityStore;
    use crate::api::handlers::auth::providers::{Provider, ProviderProfile};

    async fn seed_local(store: &MemoryIdentityStore, email: &str, password: &str) -> Identity {
        let identity = Identity::new_local(email, None, password, 2).expect("identity");
        match store.create(identity).await.expect("create") {
            CreateOutcome::Created(identity) => identity,
            CreateOutcome::Conflict => panic!("seed conflicted"),
        }
    }

    #[tokio::test]
    async fn correct_password_yields_the_identity() -> Result<()> {
        let store = MemoryIdentityStore::default();
        let seeded = seed_local(&store, "alice@example.com", "hunter2hunter2").await;

        let identity =
            verify_local_credentials(&store, " Alice@Example.COM ", "hunter2hunter2").await?;
        assert_eq!(identity.map(|identity| identity.id), Some(seeded.id));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() -> Result<()> {
        let store = MemoryIdentityStore::default();
        seed_local(&store, "alice@example.com", "hunter2hunter2").await;

        let identity =
            verify_local_credentials(&store, "alice@example.com", "wrong-password").await?;
        assert!(identity.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_email_is_rejected() -> Result<()> {
        let store = MemoryIdentityStore::default();
        assert!(
            verify_local_credentials(&store, "nobody@example.com", "whatever")
                .await?
                .is_none()
        );
        assert!(verify_local_credentials(&store, "not-an-email", "whatever")
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn social_account_cannot_sign_in_locally() -> Result<()> {
        let store = MemoryIdentityStore::default();
        let profile = ProviderProfile {
            provider: Provider::Google,
            social_id: "109876543210987654321".to_string(),
            email_address: Some("alice@example.com".to_string()),
            username: Some("Alice".to_string()),
        };
        store.create(Identity::from_profile(&profile)).await?;

        let identity = verify_local_credentials(&store, "alice@example.com", "").await?;
        assert!(identity.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn register_then_sign_in() -> Result<()> {
        let store = MemoryIdentityStore::default();
        let outcome = register_local(
            &store,
            "bob@example.com",
            Some("bob".to_string()),
            "correct horse",
            2,
        )
        .await?;
        let registered = match outcome {
            RegisterOutcome::Registered(identity) => identity,
            RegisterOutcome::EmailTaken => anyhow::bail!("fresh email reported taken"),
        };
        assert!(registered.is_local());
        assert_eq!(registered.display_name(), "bob");

        let identity = verify_local_credentials(&store, "bob@example.com", "correct horse").await?;
        assert_eq!(identity.map(|identity| identity.id), Some(registered.id));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_reports_taken() -> Result<()> {
        let store = MemoryIdentityStore::default();
        seed_local(&store, "alice@example.com", "hunter2hunter2").await;

        let outcome =
            register_local(&store, "alice@example.com", None, "another password", 2).await?;
        assert!(matches!(outcome, RegisterOutcome::EmailTaken));
        Ok(())
    }

    #[tokio::test]
    async fn social_email_blocks_local_registration() -> Result<()> {
        let store = MemoryIdentityStore::default();
        let profile = ProviderProfile {
            provider: Provider::Google,
            social_id: "109876543210987654321".to_string(),
            email_address: Some("alice@example.com".to_string()),
            username: None,
        };
        store.create(Identity::from_profile(&profile)).await?;

        let outcome = register_local(&store, "alice@example.com", None, "some password", 2).await?;
        assert!(matches!(outcome, RegisterOutcome::EmailTaken));
        Ok(())
    }
}
