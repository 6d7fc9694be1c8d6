//! Postgres persistence for identities and sessions.

use crate::api::handlers::auth::{
    identity::{CreateOutcome, Identity, IdentityStore},
    utils::{generate_session_token, hash_session_token, is_unique_violation},
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, instrument, Instrument};
use uuid::Uuid;

const SESSION_INSERT_ATTEMPTS: usize = 3;

pub(crate) struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn identity_from_row(row: &PgRow) -> Identity {
    Identity {
        id: row.get("id"),
        provider: row.get("provider"),
        social_id: row.get("social_id"),
        email_address: row.get("email_address"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    #[instrument(skip(self))]
    async fn find_by_provider_and_social_id(
        &self,
        provider: &str,
        social_id: &str,
    ) -> Result<Option<Identity>> {
        let span = info_span!("db.query", query = "find identity by provider and social id");

        let row = sqlx::query(
            r"
            SELECT id, provider, social_id, email_address, username, password_hash,
                   created_at, updated_at
            FROM identities
            WHERE provider = $1 AND social_id = $2
            ",
        )
        .bind(provider)
        .bind(social_id)
        .fetch_optional(&self.pool)
        .instrument(span)
        .await
        .context("failed to query identity by provider and social id")?;

        Ok(row.as_ref().map(identity_from_row))
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email_normalized: &str) -> Result<Option<Identity>> {
        let span = info_span!("db.query", query = "find identity by email");

        let row = sqlx::query(
            r"
            SELECT id, provider, social_id, email_address, username, password_hash,
                   created_at, updated_at
            FROM identities
            WHERE email_address = $1
            ",
        )
        .bind(email_normalized)
        .fetch_optional(&self.pool)
        .instrument(span)
        .await
        .context("failed to query identity by email")?;

        Ok(row.as_ref().map(identity_from_row))
    }

    #[instrument(skip_all, fields(provider = %identity.provider))]
    async fn create(&self, identity: Identity) -> Result<CreateOutcome> {
        let span = info_span!("db.query", query = "insert identity");

        let result = sqlx::query(
            r"
            INSERT INTO identities (id, provider, social_id, email_address, username, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING created_at
            ",
        )
        .bind(identity.id)
        .bind(&identity.provider)
        .bind(&identity.social_id)
        .bind(&identity.email_address)
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .fetch_one(&self.pool)
        .instrument(span)
        .await;

        match result {
            Ok(row) => {
                let mut identity = identity;
                identity.created_at = row.get("created_at");
                Ok(CreateOutcome::Created(identity))
            }
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert identity"),
        }
    }

    #[instrument(skip(self))]
    async fn load_for_session(&self, id: Uuid) -> Result<Option<Identity>> {
        let span = info_span!("db.query", query = "load identity for session");

        let row = sqlx::query(
            r"
            SELECT id, provider, social_id, email_address, username, password_hash,
                   created_at, updated_at
            FROM identities
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .instrument(span)
        .await
        .context("failed to load identity for session")?;

        Ok(row.as_ref().map(identity_from_row))
    }
}

/// Create a session row and return the raw token for the cookie.
///
/// Only the SHA-256 hash of the token is stored. The token is random, a
/// hash collision would need a duplicate token; retry a couple of times
/// instead of failing the sign-in on the first one.
pub(crate) async fn insert_session(
    pool: &PgPool,
    identity_id: Uuid,
    provider_token: Option<&str>,
    ttl_seconds: i64,
) -> Result<String> {
    let expires_at: DateTime<Utc> = Utc::now() + Duration::seconds(ttl_seconds);

    for attempt in 1..=SESSION_INSERT_ATTEMPTS {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);

        let span = info_span!("db.query", query = "insert session", attempt);

        let result = sqlx::query(
            r"
            INSERT INTO user_sessions (token_hash, identity_id, provider_token, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&token_hash)
        .bind(identity_id)
        .bind(provider_token)
        .bind(expires_at)
        .execute(pool)
        .instrument(span)
        .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => continue,
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!(
        "failed to insert session after {SESSION_INSERT_ATTEMPTS} attempts"
    ))
}

/// Resolve a token hash to the identity id of a live session.
pub(crate) async fn lookup_session(pool: &PgPool, token_hash: &[u8]) -> Result<Option<Uuid>> {
    let span = info_span!("db.query", query = "lookup session");

    let row = sqlx::query(
        r"
        UPDATE user_sessions
        SET last_seen_at = NOW()
        WHERE token_hash = $1 AND expires_at > NOW()
        RETURNING identity_id
        ",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .instrument(span)
    .await
    .context("failed to look up session")?;

    Ok(row.map(|row| row.get("identity_id")))
}

/// Drop a session row. Removing the row also discards the provider
/// token stored with it. Idempotent.
pub(crate) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let span = info_span!("db.query", query = "delete session");

    sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;

    Ok(())
}

/// Read the provider bearer token attached to a session, if any.
pub(crate) async fn provider_token(pool: &PgPool, token_hash: &[u8]) -> Result<Option<String>> {
    let span = info_span!("db.query", query = "read provider token");

    let row = sqlx::query(
        r"
        SELECT provider_token
        FROM user_sessions
        WHERE token_hash = $1 AND expires_at > NOW()
        ",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .instrument(span)
    .await
    .context("failed to read provider token")?;

    Ok(row.and_then(|row| row.get("provider_token")))
}

/// Detach the provider token from a session without ending it.
/// Idempotent: clearing an already-clear token is a no-op.
pub(crate) async fn clear_provider_token(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let span = info_span!("db.query", query = "clear provider token");

    sqlx::query(
        r"
        UPDATE user_sessions
        SET provider_token = NULL
        WHERE token_hash = $1
        ",
    )
    .bind(token_hash)
    .execute(pool)
    .instrument(span)
    .await
    .context("failed to clear provider token")?;

    Ok(())
}

/// Remove expired session rows. Called opportunistically on sign-in.
pub(crate) async fn sweep_expired_sessions(pool: &PgPool) -> Result<u64> {
    let span = info_span!("db.query", query = "sweep expired sessions");

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= NOW()")
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to sweep expired sessions")?;

    Ok(result.rows_affected())
}
