//! JSON API over the store inventory tables.
//!
//! Reads are public. Writes need a session, and only the identity that
//! created a store may edit or delete it.

pub(crate) mod storage;
pub(crate) mod types;

use crate::api::handlers::auth::session::require_authentication;
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use sqlx::PgPool;
use storage::{StoreOwner, WriteOutcome};
use tracing::error;
use types::{
    valid_component_type, CountriesResponse, CountryRecord, DistributionCenterRecord,
    DistributionCentersResponse, StoreComponentForm, StoreComponentsResponse, StoreForm,
    StoreResponse, StoreStatusResponse, StoresResponse, UsersResponse,
};
use uuid::Uuid;

fn internal_error(err: &anyhow::Error) -> Response {
    error!("store inventory query failed: {err}");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

fn store_conflict_message(country_code: &str, number: i32) -> String {
    format!("Country {country_code} already has a store with number {number}.")
}

fn ownership_message(action: &str, country_code: &str, number: i32) -> String {
    format!("You can only {action} store {country_code} {number} if you created it!")
}

fn component_conflict_message(hostname: &str) -> String {
    format!("Store already has a component named {hostname}.")
}

const BAD_REFERENCE: &str = "Unknown country, distribution center or store status.";

/// Resolve a store for a write: 404 when it does not exist, 403 when
/// someone other than its creator tries to change it.
async fn store_for_write(
    pool: &PgPool,
    country_code: &str,
    number: i32,
    identity_id: Uuid,
    action: &str,
) -> Result<StoreOwner, Response> {
    match storage::find_store_owner(pool, country_code, number).await {
        Ok(Some(owner)) if owner.identity_id == identity_id => Ok(owner),
        Ok(Some(_)) => Err((
            StatusCode::FORBIDDEN,
            ownership_message(action, country_code, number),
        )
            .into_response()),
        Ok(None) => Err(StatusCode::NOT_FOUND.into_response()),
        Err(err) => Err(internal_error(&err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "inventory",
    responses(
        (status = 200, description = "All identities, without credentials", body = UsersResponse)
    )
)]
pub(crate) async fn users(Extension(pool): Extension<PgPool>) -> Response {
    match storage::list_users(&pool).await {
        Ok(users) => Json(UsersResponse { users }).into_response(),
        Err(err) => internal_error(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/countries",
    tag = "inventory",
    responses(
        (status = 200, description = "All countries", body = CountriesResponse)
    )
)]
pub(crate) async fn countries(Extension(pool): Extension<PgPool>) -> Response {
    match storage::list_countries(&pool).await {
        Ok(countries) => Json(CountriesResponse { countries }).into_response(),
        Err(err) => internal_error(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/countries/{country_code}",
    tag = "inventory",
    responses(
        (status = 200, description = "One country", body = CountryRecord),
        (status = 404, description = "Unknown country code")
    )
)]
pub(crate) async fn country_by_code(
    Path(country_code): Path<String>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    match storage::find_country(&pool, &country_code).await {
        Ok(Some(country)) => Json(country).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/distribution_centers",
    tag = "inventory",
    responses(
        (status = 200, description = "All distribution centers", body = DistributionCentersResponse)
    )
)]
pub(crate) async fn distribution_centers(Extension(pool): Extension<PgPool>) -> Response {
    match storage::list_distribution_centers(&pool).await {
        Ok(distribution_centers) => Json(DistributionCentersResponse {
            distribution_centers,
        })
        .into_response(),
        Err(err) => internal_error(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/distribution_centers/{country_code}",
    tag = "inventory",
    responses(
        (status = 200, description = "The country's distribution center", body = DistributionCenterRecord),
        (status = 404, description = "No distribution center for that country")
    )
)]
pub(crate) async fn distribution_center_by_country(
    Path(country_code): Path<String>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    match storage::find_distribution_center_by_country(&pool, &country_code).await {
        Ok(Some(distribution_center)) => Json(distribution_center).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/store_status",
    tag = "inventory",
    responses(
        (status = 200, description = "All store statuses", body = StoreStatusResponse)
    )
)]
pub(crate) async fn store_status(Extension(pool): Extension<PgPool>) -> Response {
    match storage::list_store_status(&pool).await {
        Ok(store_status) => Json(StoreStatusResponse { store_status }).into_response(),
        Err(err) => internal_error(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/stores",
    tag = "inventory",
    responses(
        (status = 200, description = "All stores", body = StoresResponse)
    )
)]
pub(crate) async fn stores(Extension(pool): Extension<PgPool>) -> Response {
    match storage::list_stores(&pool).await {
        Ok(stores) => Json(StoresResponse { stores }).into_response(),
        Err(err) => internal_error(&err),
    }
}

/// Instance lookup. A numeric key selects by store number, anything
/// else is treated as a country code. The parameter shares its name
/// with the write routes below; overlapping routes must agree on it.
#[utoipa::path(
    get,
    path = "/api/stores/{country_code}",
    tag = "inventory",
    responses(
        (status = 200, description = "Stores matching a number or country code")
    )
)]
pub(crate) async fn stores_by_key(
    Path(key): Path<String>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    if let Ok(number) = key.parse::<i32>() {
        match storage::stores_by_number(&pool, number).await {
            Ok(store) => Json(StoreResponse { store }).into_response(),
            Err(err) => internal_error(&err),
        }
    } else {
        match storage::stores_by_country(&pool, &key).await {
            Ok(stores) => Json(StoresResponse { stores }).into_response(),
            Err(err) => internal_error(&err),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/store_components",
    tag = "inventory",
    responses(
        (status = 200, description = "All store components", body = StoreComponentsResponse)
    )
)]
pub(crate) async fn store_components(Extension(pool): Extension<PgPool>) -> Response {
    match storage::list_store_components(&pool).await {
        Ok(store_components) => {
            Json(StoreComponentsResponse { store_components }).into_response()
        }
        Err(err) => internal_error(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/store_components/{component_type}",
    tag = "inventory",
    responses(
        (status = 200, description = "Store components of one type", body = StoreComponentsResponse)
    )
)]
pub(crate) async fn store_components_by_type(
    Path(component_type): Path<String>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    match storage::store_components_by_type(&pool, &component_type).await {
        Ok(store_components) => {
            Json(StoreComponentsResponse { store_components }).into_response()
        }
        Err(err) => internal_error(&err),
    }
}

/// Create a store owned by the signed-in identity.
#[utoipa::path(
    post,
    path = "/api/stores",
    tag = "inventory",
    request_body(content = StoreForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Store created"),
        (status = 400, description = "Unknown country, distribution center or status"),
        (status = 409, description = "Country already has a store with that number")
    )
)]
pub(crate) async fn create_store(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Form(form): Form<StoreForm>,
) -> Response {
    let identity = match require_authentication(&headers, &pool, "/api/stores").await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match storage::insert_store(&pool, identity.id, &form).await {
        Ok(WriteOutcome::Applied) => (StatusCode::CREATED, "Store created.").into_response(),
        Ok(WriteOutcome::Conflict) => (
            StatusCode::CONFLICT,
            store_conflict_message(&form.country_code, form.number),
        )
            .into_response(),
        Ok(WriteOutcome::BadReference) => (StatusCode::BAD_REQUEST, BAD_REFERENCE).into_response(),
        Err(err) => internal_error(&err),
    }
}

/// Edit a store. Only its creator may.
#[utoipa::path(
    put,
    path = "/api/stores/{country_code}/{number}",
    tag = "inventory",
    request_body(content = StoreForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Store updated"),
        (status = 403, description = "Not the store's creator"),
        (status = 404, description = "No such store"),
        (status = 409, description = "Country already has a store with that number")
    )
)]
pub(crate) async fn edit_store(
    Path((country_code, number)): Path<(String, i32)>,
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Form(form): Form<StoreForm>,
) -> Response {
    let path = format!("/api/stores/{country_code}/{number}");
    let identity = match require_authentication(&headers, &pool, &path).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let store = match store_for_write(&pool, &country_code, number, identity.id, "edit").await {
        Ok(store) => store,
        Err(response) => return response,
    };

    match storage::update_store(&pool, store.id, &form).await {
        Ok(WriteOutcome::Applied) => (StatusCode::OK, "Store updated.").into_response(),
        Ok(WriteOutcome::Conflict) => (
            StatusCode::CONFLICT,
            store_conflict_message(&form.country_code, form.number),
        )
            .into_response(),
        Ok(WriteOutcome::BadReference) => (StatusCode::BAD_REQUEST, BAD_REFERENCE).into_response(),
        Err(err) => internal_error(&err),
    }
}

/// Delete a store and its components. Only its creator may.
#[utoipa::path(
    delete,
    path = "/api/stores/{country_code}/{number}",
    tag = "inventory",
    responses(
        (status = 200, description = "Store deleted"),
        (status = 403, description = "Not the store's creator"),
        (status = 404, description = "No such store")
    )
)]
pub(crate) async fn remove_store(
    Path((country_code, number)): Path<(String, i32)>,
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let path = format!("/api/stores/{country_code}/{number}");
    let identity = match require_authentication(&headers, &pool, &path).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let store = match store_for_write(&pool, &country_code, number, identity.id, "delete").await {
        Ok(store) => store,
        Err(response) => return response,
    };

    match storage::delete_store(&pool, store.id).await {
        Ok(()) => (StatusCode::OK, "Store deleted.").into_response(),
        Err(err) => internal_error(&err),
    }
}

/// Components installed in one store.
#[utoipa::path(
    get,
    path = "/api/stores/{country_code}/{number}/components",
    tag = "inventory",
    responses(
        (status = 200, description = "Components of one store", body = StoreComponentsResponse),
        (status = 404, description = "No such store")
    )
)]
pub(crate) async fn components_for_store(
    Path((country_code, number)): Path<(String, i32)>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let store = match storage::find_store_owner(&pool, &country_code, number).await {
        Ok(Some(store)) => store,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error(&err),
    };

    match storage::components_for_store(&pool, store.id).await {
        Ok(store_components) => {
            Json(StoreComponentsResponse { store_components }).into_response()
        }
        Err(err) => internal_error(&err),
    }
}

/// Add a component to a store.
#[utoipa::path(
    post,
    path = "/api/stores/{country_code}/{number}/components",
    tag = "inventory",
    request_body(content = StoreComponentForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Component added"),
        (status = 400, description = "Unknown component type"),
        (status = 404, description = "No such store"),
        (status = 409, description = "Store already has a component with that hostname")
    )
)]
pub(crate) async fn add_component(
    Path((country_code, number)): Path<(String, i32)>,
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Form(form): Form<StoreComponentForm>,
) -> Response {
    let path = format!("/api/stores/{country_code}/{number}/components");
    if let Err(response) = require_authentication(&headers, &pool, &path).await {
        return response;
    }

    if !valid_component_type(&form.component_type) {
        return (
            StatusCode::BAD_REQUEST,
            format!("Unknown component type {}.", form.component_type),
        )
            .into_response();
    }

    let store = match storage::find_store_owner(&pool, &country_code, number).await {
        Ok(Some(store)) => store,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error(&err),
    };

    match storage::insert_component(&pool, store.id, &form).await {
        Ok(WriteOutcome::Applied) => (StatusCode::CREATED, "Component added.").into_response(),
        Ok(WriteOutcome::Conflict) => (
            StatusCode::CONFLICT,
            component_conflict_message(&form.hostname),
        )
            .into_response(),
        Ok(WriteOutcome::BadReference) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error(&err),
    }
}

/// Remove a component from a store.
#[utoipa::path(
    delete,
    path = "/api/stores/{country_code}/{number}/components/{hostname}",
    tag = "inventory",
    responses(
        (status = 200, description = "Component removed"),
        (status = 404, description = "No such store or component")
    )
)]
pub(crate) async fn remove_component(
    Path((country_code, number, hostname)): Path<(String, i32, String)>,
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let path = format!("/api/stores/{country_code}/{number}/components/{hostname}");
    if let Err(response) = require_authentication(&headers, &pool, &path).await {
        return response;
    }

    let store = match storage::find_store_owner(&pool, &country_code, number).await {
        Ok(Some(store)) => store,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error(&err),
    };

    match storage::delete_component(&pool, store.id, &hostname).await {
        Ok(true) => (StatusCode::OK, "Component removed.").into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_and_ownership_messages() {
        assert_eq!(
            store_conflict_message("be", 42),
            "Country be already has a store with number 42."
        );
        assert_eq!(
            ownership_message("edit", "be", 42),
            "You can only edit store be 42 if you created it!"
        );
        assert_eq!(
            ownership_message("delete", "nl", 7),
            "You can only delete store nl 7 if you created it!"
        );
        assert_eq!(
            component_conflict_message("bo-01"),
            "Store already has a component named bo-01."
        );
    }
}
