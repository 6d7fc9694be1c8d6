//! Who-am-I endpoint for signed-in users.

use crate::api::handlers::auth::{
    identity::Identity,
    session::{extract_session_token, require_authentication},
    storage::provider_token,
    utils::hash_session_token,
};
use axum::{
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct MeResponse {
    provider: String,
    social_id: String,
    email_address: Option<String>,
    username: Option<String>,
    display_name: String,
    /// Whether this session still holds a provider bearer token.
    provider_session: bool,
}

impl MeResponse {
    fn new(identity: Identity, provider_session: bool) -> Self {
        let display_name = identity.display_name().to_string();
        Self {
            provider: identity.provider,
            social_id: identity.social_id,
            email_address: identity.email_address,
            username: identity.username,
            display_name,
            provider_session,
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/me",
    tag = "auth",
    responses(
        (status = 200, description = "The signed-in identity", body = MeResponse),
        (status = 303, description = "Anonymous, redirected to sign-in")
    )
)]
pub(crate) async fn me(headers: HeaderMap, Extension(pool): Extension<PgPool>) -> Response {
    let identity = match require_authentication(&headers, &pool, "/v1/me").await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let provider_session = match extract_session_token(&headers) {
        Some(token) => match provider_token(&pool, &hash_session_token(&token)).await {
            Ok(token) => token.is_some(),
            Err(err) => {
                warn!("provider token read failed: {err}");
                false
            }
        },
        None => false,
    };

    Json(MeResponse::new(identity, provider_session)).into_response()
}
