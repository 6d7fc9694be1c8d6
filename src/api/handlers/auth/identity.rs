//! Identities and the store they live in.
//!
//! One identity per (provider, social_id) pair. Local accounts use the
//! `local` provider with a generated numeric social id; social accounts
//! carry whatever stable id the provider hands out.

use crate::api::handlers::auth::{
    password,
    providers::ProviderProfile,
    utils::{generate_local_social_id, normalize_email},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Provider marker for accounts created with email + password.
pub(crate) const LOCAL_PROVIDER: &str = "local";

#[derive(Debug, Error)]
pub(crate) enum PasswordError {
    /// The plaintext password is write-only, only hashes are kept.
    #[error("password is not a readable attribute")]
    WriteOnly,
    #[error("failed to hash password: {0}")]
    Hash(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Identity {
    pub id: Uuid,
    pub provider: String,
    pub social_id: String,
    pub email_address: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Identity backed by an external OAuth2 provider.
    pub(crate) fn from_profile(profile: &ProviderProfile) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: profile.provider.to_string(),
            social_id: profile.social_id.clone(),
            email_address: profile.email_address.as_deref().map(normalize_email),
            username: profile.username.clone(),
            password_hash: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Local identity with a freshly hashed password and generated social id.
    pub(crate) fn new_local(
        email_address: &str,
        username: Option<String>,
        password: &str,
        time_cost: u32,
    ) -> Result<Self, PasswordError> {
        let mut identity = Self {
            id: Uuid::new_v4(),
            provider: LOCAL_PROVIDER.to_string(),
            social_id: generate_local_social_id(),
            email_address: Some(normalize_email(email_address)),
            username,
            password_hash: None,
            created_at: None,
            updated_at: None,
        };
        identity.set_password(password, time_cost)?;
        Ok(identity)
    }

    /// Replace the stored hash with one derived from `password`.
    pub(crate) fn set_password(
        &mut self,
        password: &str,
        time_cost: u32,
    ) -> Result<(), PasswordError> {
        let hash = password::hash_password(password, time_cost)
            .map_err(|err| PasswordError::Hash(err.to_string()))?;
        self.password_hash = Some(hash);
        Ok(())
    }

    /// Plaintext passwords can be set but never read back.
    pub(crate) fn password(&self) -> Result<&str, PasswordError> {
        Err(PasswordError::WriteOnly)
    }

    /// Check a candidate password. Identities without a stored hash
    /// (social accounts) never verify.
    pub(crate) fn verify_password(&self, candidate: &str) -> bool {
        self.password_hash
            .as_deref()
            .is_some_and(|hash| password::verify_password(candidate, hash))
    }

    pub(crate) fn is_local(&self) -> bool {
        self.provider == LOCAL_PROVIDER
    }

    /// Name shown in the UI: username, then email, then the social id.
    pub(crate) fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.email_address.as_deref())
            .unwrap_or(&self.social_id)
    }
}

/// Result of attempting to persist a new identity.
#[derive(Debug)]
pub(crate) enum CreateOutcome {
    Created(Identity),
    /// Another identity with the same (provider, social_id) already exists.
    Conflict,
}

/// Persistence seam for identities, so the sign-in flow can be tested
/// without a database.
#[async_trait]
pub(crate) trait IdentityStore: Send + Sync {
    async fn find_by_provider_and_social_id(
        &self,
        provider: &str,
        social_id: &str,
    ) -> Result<Option<Identity>>;

    async fn find_by_email(&self, email_normalized: &str) -> Result<Option<Identity>>;

    async fn create(&self, identity: Identity) -> Result<CreateOutcome>;

    async fn load_for_session(&self, id: Uuid) -> Result<Option<Identity>>;
}

/// Find-or-create for a provider profile.
///
/// A concurrent first sign-in can lose the insert race; the unique
/// (provider, social_id) constraint reports the conflict and the loser
/// re-reads the winner's row, so both requests end up on one identity.
pub(crate) async fn reconcile<S: IdentityStore + ?Sized>(
    store: &S,
    profile: &ProviderProfile,
) -> Result<Identity> {
    if let Some(existing) = store
        .find_by_provider_and_social_id(profile.provider.name(), &profile.social_id)
        .await?
    {
        return Ok(existing);
    }

    match store.create(Identity::from_profile(profile)).await? {
        CreateOutcome::Created(identity) => Ok(identity),
        CreateOutcome::Conflict => store
            .find_by_provider_and_social_id(profile.provider.name(), &profile.social_id)
            .await?
            .ok_or_else(|| anyhow!("identity disappeared after insert conflict")),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store with the same uniqueness rule as the database.
    #[derive(Default)]
    pub(crate) struct MemoryIdentityStore {
        identities: Mutex<HashMap<(String, String), Identity>>,
    }

    #[async_trait]
    impl IdentityStore for MemoryIdentityStore {
        async fn find_by_provider_and_social_id(
            &self,
            provider: &str,
            social_id: &str,
        ) -> Result<Option<Identity>> {
            let identities = self.identities.lock().map_err(|_| anyhow!("poisoned"))?;
            Ok(identities
                .get(&(provider.to_string(), social_id.to_string()))
                .cloned())
        }

        async fn find_by_email(&self, email_normalized: &str) -> Result<Option<Identity>> {
            let identities = self.identities.lock().map_err(|_| anyhow!("poisoned"))?;
            Ok(identities
                .values()
                .find(|identity| identity.email_address.as_deref() == Some(email_normalized))
                .cloned())
        }

        async fn create(&self, identity: Identity) -> Result<CreateOutcome> {
            let mut identities = self.identities.lock().map_err(|_| anyhow!("poisoned"))?;
            let key = (identity.provider.clone(), identity.social_id.clone());
            if identities.contains_key(&key) {
                return Ok(CreateOutcome::Conflict);
            }
            identities.insert(key, identity.clone());
            Ok(CreateOutcome::Created(identity))
        }

        async fn load_for_session(&self, id: Uuid) -> Result<Option<Identity>> {
            let identities = self.identities.lock().map_err(|_| anyhow!("poisoned"))?;
            Ok(identities.values().find(|identity| identity.id == id).cloned())
        }
    }
}
