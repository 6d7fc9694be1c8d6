//! Session cookie handling and the authentication gate.

use crate::api::handlers::auth::{
    identity::{Identity, IdentityStore},
    state::AuthConfig,
    storage::{self, PgIdentityStore},
    utils::hash_session_token,
};
use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use sqlx::PgPool;
use tracing::error;

pub(crate) const SESSION_COOKIE_NAME: &str = "storenet_session";

/// Set-Cookie value for a fresh session.
pub(crate) fn session_cookie(config: &AuthConfig, token: &str) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        config.session_ttl_seconds()
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Set-Cookie value that drops the session cookie.
pub(crate) fn clear_session_cookie(config: &AuthConfig) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Pull the session token out of the request: the session cookie first,
/// a bearer token for API clients second.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(cookies) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        for cookie in cookies.split(';') {
            if let Some((name, value)) = cookie.trim().split_once('=') {
                if name == SESSION_COOKIE_NAME && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
}

/// Resolve the request to an identity, if it carries a live session.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    pool: &PgPool,
) -> Result<Option<Identity>, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    let token_hash = hash_session_token(&token);

    let identity_id = storage::lookup_session(pool, &token_hash)
        .await
        .map_err(|err| {
            error!("session lookup failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let Some(identity_id) = identity_id else {
        return Ok(None);
    };

    PgIdentityStore::new(pool.clone())
        .load_for_session(identity_id)
        .await
        .map_err(|err| {
            error!("identity load failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Gate for pages that need a signed-in user.
///
/// Anonymous requests are bounced to the sign-in entry point with the
/// original path in `next`, so the flow can return them afterwards.
pub(crate) async fn require_authentication(
    headers: &HeaderMap,
    pool: &PgPool,
    original_path: &str,
) -> Result<Identity, Response> {
    match authenticate_session(headers, pool).await {
        Ok(Some(identity)) => Ok(identity),
        Ok(None) => {
            let target = format!(
                "/oauth2/sign-in?next={}",
                url::form_urlencoded::byte_serialize(original_path.as_bytes()).collect::<String>()
            );
            Err(Redirect::to(&target).into_response())
        }
        Err(status) => Err(status.into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::globals::GlobalArgs;
    use crate::api::handlers::auth::state::AuthState;
    use axum::http::HeaderValue;

    fn config(secure: bool) -> crate::api::handlers::auth::state::AuthConfig {
        let mut globals = GlobalArgs::new("http://localhost:8080".to_string());
        globals.session_cookie_secure = secure;
        AuthState::new(&globals).expect("state").config().clone()
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie(&config(false), "tok123");
        assert!(cookie.starts_with("storenet_session=tok123; "));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));

        let secure = session_cookie(&config(true), "tok123");
        assert!(secure.ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(&config(false));
        assert!(cookie.starts_with("storenet_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn extract_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; storenet_session=tok123; lang=en"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn extract_token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer tok456"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok456"));
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("storenet_session=cookie-token"),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("cookie-token")
        );
    }

    #[test]
    fn no_token_without_credentials() {
        let headers = HeaderMap::new();
        assert!(extract_session_token(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("storenet_session="));
        assert!(extract_session_token(&headers).is_none());
    }
}
