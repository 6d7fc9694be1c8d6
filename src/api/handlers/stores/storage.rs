//! Queries behind the store inventory API.

use crate::api::handlers::auth::utils::{is_foreign_key_violation, is_unique_violation};
use crate::api::handlers::stores::types::{
    CountryRecord, DistributionCenterRecord, StoreComponentForm, StoreComponentRecord, StoreForm,
    StoreRecord, StoreStatusRecord, UserRecord,
};
use anyhow::{Context, Result};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// Store identifier plus its creator, enough for ownership checks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StoreOwner {
    pub id: i32,
    pub identity_id: Uuid,
}

/// How an inventory write ended.
#[derive(Debug)]
pub(crate) enum WriteOutcome {
    Applied,
    /// A unique constraint rejected the row.
    Conflict,
    /// A referenced country, distribution center or status does not exist.
    BadReference,
}

fn write_outcome(result: sqlx::Result<sqlx::postgres::PgQueryResult>) -> Result<WriteOutcome> {
    match result {
        Ok(_) => Ok(WriteOutcome::Applied),
        Err(err) if is_unique_violation(&err) => Ok(WriteOutcome::Conflict),
        Err(err) if is_foreign_key_violation(&err) => Ok(WriteOutcome::BadReference),
        Err(err) => Err(err).context("inventory write failed"),
    }
}

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        provider: row.get("provider"),
        social_id: row.get("social_id"),
        email_address: row.get("email_address"),
        username: row.get("username"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn country_from_row(row: &PgRow) -> CountryRecord {
    CountryRecord {
        country_code: row.get("country_code"),
        country_name: row.get("country_name"),
    }
}

fn distribution_center_from_row(row: &PgRow) -> DistributionCenterRecord {
    DistributionCenterRecord {
        country_code: row.get("country_code"),
        number: row.get("number"),
        name: row.get("name"),
        tag: row.get("tag"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn store_status_from_row(row: &PgRow) -> StoreStatusRecord {
    StoreStatusRecord {
        sequence: row.get("sequence"),
        name: row.get("name"),
        description: row.get("description"),
    }
}

fn store_from_row(row: &PgRow) -> StoreRecord {
    StoreRecord {
        country_code: row.get("country_code"),
        dc_id: row.get("dc_id"),
        number: row.get("number"),
        name: row.get("name"),
        status_id: row.get("status_id"),
        street_name: row.get("street_name"),
        street_number: row.get("street_number"),
        postal_code: row.get("postal_code"),
        city: row.get("city"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn store_component_from_row(row: &PgRow) -> StoreComponentRecord {
    StoreComponentRecord {
        store_id: row.get("store_id"),
        component_type: row.get("component_type"),
        hostname: row.get("hostname"),
        ip_address: row.get("ip_address"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) async fn list_users(pool: &PgPool) -> Result<Vec<UserRecord>> {
    let span = info_span!("db.query", query = "list users");

    let rows = sqlx::query(
        r"
        SELECT provider, social_id, email_address, username, created_at, updated_at
        FROM identities
        ",
    )
    .fetch_all(pool)
    .instrument(span)
    .await
    .context("failed to list users")?;

    Ok(rows.iter().map(user_from_row).collect())
}

pub(crate) async fn list_countries(pool: &PgPool) -> Result<Vec<CountryRecord>> {
    let span = info_span!("db.query", query = "list countries");

    let rows = sqlx::query(
        "SELECT country_code, country_name FROM countries ORDER BY country_code",
    )
    .fetch_all(pool)
    .instrument(span)
    .await
    .context("failed to list countries")?;

    Ok(rows.iter().map(country_from_row).collect())
}

pub(crate) async fn find_country(pool: &PgPool, country_code: &str) -> Result<Option<CountryRecord>> {
    let span = info_span!("db.query", query = "find country");

    let row = sqlx::query(
        "SELECT country_code, country_name FROM countries WHERE country_code = $1",
    )
    .bind(country_code)
    .fetch_optional(pool)
    .instrument(span)
    .await
    .context("failed to find country")?;

    Ok(row.as_ref().map(country_from_row))
}

pub(crate) async fn list_distribution_centers(
    pool: &PgPool,
) -> Result<Vec<DistributionCenterRecord>> {
    let span = info_span!("db.query", query = "list distribution centers");

    let rows = sqlx::query(
        r"
        SELECT country_code, number, name, tag, created_at, updated_at
        FROM distribution_centers
        ORDER BY country_code, number
        ",
    )
    .fetch_all(pool)
    .instrument(span)
    .await
    .context("failed to list distribution centers")?;

    Ok(rows.iter().map(distribution_center_from_row).collect())
}

pub(crate) async fn find_distribution_center_by_country(
    pool: &PgPool,
    country_code: &str,
) -> Result<Option<DistributionCenterRecord>> {
    let span = info_span!("db.query", query = "find distribution center");

    let row = sqlx::query(
        r"
        SELECT country_code, number, name, tag, created_at, updated_at
        FROM distribution_centers
        WHERE country_code = $1
        ORDER BY number
        LIMIT 1
        ",
    )
    .bind(country_code)
    .fetch_optional(pool)
    .instrument(span)
    .await
    .context("failed to find distribution center")?;

    Ok(row.as_ref().map(distribution_center_from_row))
}

pub(crate) async fn list_store_status(pool: &PgPool) -> Result<Vec<StoreStatusRecord>> {
    let span = info_span!("db.query", query = "list store status");

    let rows = sqlx::query(
        "SELECT sequence, name, description FROM store_status ORDER BY sequence",
    )
    .fetch_all(pool)
    .instrument(span)
    .await
    .context("failed to list store status")?;

    Ok(rows.iter().map(store_status_from_row).collect())
}

const STORE_COLUMNS: &str = r"
    SELECT country_code, dc_id, number, name, status_id,
           street_name, street_number, postal_code, city, created_at, updated_at
    FROM stores
";

pub(crate) async fn list_stores(pool: &PgPool) -> Result<Vec<StoreRecord>> {
    let span = info_span!("db.query", query = "list stores");

    let rows = sqlx::query(&format!("{STORE_COLUMNS} ORDER BY country_code, number"))
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list stores")?;

    Ok(rows.iter().map(store_from_row).collect())
}

pub(crate) async fn stores_by_number(pool: &PgPool, number: i32) -> Result<Vec<StoreRecord>> {
    let span = info_span!("db.query", query = "stores by number");

    let rows = sqlx::query(&format!("{STORE_COLUMNS} WHERE number = $1"))
        .bind(number)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to query stores by number")?;

    Ok(rows.iter().map(store_from_row).collect())
}

pub(crate) async fn stores_by_country(
    pool: &PgPool,
    country_code: &str,
) -> Result<Vec<StoreRecord>> {
    let span = info_span!("db.query", query = "stores by country");

    let rows = sqlx::query(&format!(
        "{STORE_COLUMNS} WHERE country_code = $1 ORDER BY number"
    ))
    .bind(country_code)
    .fetch_all(pool)
    .instrument(span)
    .await
    .context("failed to query stores by country")?;

    Ok(rows.iter().map(store_from_row).collect())
}

pub(crate) async fn list_store_components(pool: &PgPool) -> Result<Vec<StoreComponentRecord>> {
    let span = info_span!("db.query", query = "list store components");

    let rows = sqlx::query(
        r"
        SELECT store_id, component_type, hostname, ip_address, created_at, updated_at
        FROM store_components
        ORDER BY store_id, hostname
        ",
    )
    .fetch_all(pool)
    .instrument(span)
    .await
    .context("failed to list store components")?;

    Ok(rows.iter().map(store_component_from_row).collect())
}

pub(crate) async fn store_components_by_type(
    pool: &PgPool,
    component_type: &str,
) -> Result<Vec<StoreComponentRecord>> {
    let span = info_span!("db.query", query = "store components by type");

    let rows = sqlx::query(
        r"
        SELECT store_id, component_type, hostname, ip_address, created_at, updated_at
        FROM store_components
        WHERE component_type = $1
        ORDER BY store_id, hostname
        ",
    )
    .bind(component_type)
    .fetch_all(pool)
    .instrument(span)
    .await
    .context("failed to query store components by type")?;

    Ok(rows.iter().map(store_component_from_row).collect())
}

pub(crate) async fn find_store_owner(
    pool: &PgPool,
    country_code: &str,
    number: i32,
) -> Result<Option<StoreOwner>> {
    let span = info_span!("db.query", query = "find store owner");

    let row = sqlx::query(
        "SELECT id, identity_id FROM stores WHERE country_code = $1 AND number = $2",
    )
    .bind(country_code)
    .bind(number)
    .fetch_optional(pool)
    .instrument(span)
    .await
    .context("failed to find store")?;

    Ok(row.map(|row| StoreOwner {
        id: row.get("id"),
        identity_id: row.get("identity_id"),
    }))
}

pub(crate) async fn insert_store(
    pool: &PgPool,
    identity_id: Uuid,
    form: &StoreForm,
) -> Result<WriteOutcome> {
    let span = info_span!("db.query", query = "insert store");

    let result = sqlx::query(
        r"
        INSERT INTO stores (identity_id, country_code, dc_id, number, name, status_id,
                            street_number, street_name, postal_code, city)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ",
    )
    .bind(identity_id)
    .bind(&form.country_code)
    .bind(form.dc_id)
    .bind(form.number)
    .bind(&form.name)
    .bind(form.status_id)
    .bind(&form.street_number)
    .bind(&form.street_name)
    .bind(&form.postal_code)
    .bind(&form.city)
    .execute(pool)
    .instrument(span)
    .await;

    write_outcome(result)
}

pub(crate) async fn update_store(
    pool: &PgPool,
    store_id: i32,
    form: &StoreForm,
) -> Result<WriteOutcome> {
    let span = info_span!("db.query", query = "update store");

    let result = sqlx::query(
        r"
        UPDATE stores
        SET country_code = $2, dc_id = $3, number = $4, name = $5, status_id = $6,
            street_number = $7, street_name = $8, postal_code = $9, city = $10,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(store_id)
    .bind(&form.country_code)
    .bind(form.dc_id)
    .bind(form.number)
    .bind(&form.name)
    .bind(form.status_id)
    .bind(&form.street_number)
    .bind(&form.street_name)
    .bind(&form.postal_code)
    .bind(&form.city)
    .execute(pool)
    .instrument(span)
    .await;

    write_outcome(result)
}

/// Delete a store and its components in one transaction.
pub(crate) async fn delete_store(pool: &PgPool, store_id: i32) -> Result<()> {
    let span = info_span!("db.query", query = "delete store");

    async {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM store_components WHERE store_id = $1")
            .bind(store_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM stores WHERE id = $1")
            .bind(store_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }
    .instrument(span)
    .await
    .context("failed to delete store")
}

pub(crate) async fn components_for_store(
    pool: &PgPool,
    store_id: i32,
) -> Result<Vec<StoreComponentRecord>> {
    let span = info_span!("db.query", query = "components for store");

    let rows = sqlx::query(
        r"
        SELECT store_id, component_type, hostname, ip_address, created_at, updated_at
        FROM store_components
        WHERE store_id = $1
        ORDER BY component_type, hostname
        ",
    )
    .bind(store_id)
    .fetch_all(pool)
    .instrument(span)
    .await
    .context("failed to query components for store")?;

    Ok(rows.iter().map(store_component_from_row).collect())
}

pub(crate) async fn insert_component(
    pool: &PgPool,
    store_id: i32,
    form: &StoreComponentForm,
) -> Result<WriteOutcome> {
    let span = info_span!("db.query", query = "insert component");

    let result = sqlx::query(
        r"
        INSERT INTO store_components (store_id, component_type, hostname, ip_address)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(store_id)
    .bind(&form.component_type)
    .bind(&form.hostname)
    .bind(&form.ip_address)
    .execute(pool)
    .instrument(span)
    .await;

    write_outcome(result)
}

/// Returns whether a row was deleted.
pub(crate) async fn delete_component(
    pool: &PgPool,
    store_id: i32,
    hostname: &str,
) -> Result<bool> {
    let span = info_span!("db.query", query = "delete component");

    let result = sqlx::query(
        "DELETE FROM store_components WHERE store_id = $1 AND hostname = $2",
    )
    .bind(store_id)
    .bind(hostname)
    .execute(pool)
    .instrument(span)
    .await
    .context("failed to delete component")?;

    Ok(result.rows_affected() > 0)
}
