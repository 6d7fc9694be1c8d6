//! Request and response shapes for the store inventory API.
//!
//! Collections are wrapped in an object keyed by the resource name, so
//! payloads stay extensible without breaking clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Component types a store can carry.
pub(crate) const COMPONENT_TYPES: [&str; 4] = [
    "backoffice",
    "network_routers",
    "network_switches",
    "network_access_points",
];

pub(crate) fn valid_component_type(component_type: &str) -> bool {
    COMPONENT_TYPES.contains(&component_type)
}

/// Identity as exposed over the API. No password hash, no internal id.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UserRecord {
    pub provider: String,
    pub social_id: String,
    pub email_address: Option<String>,
    pub username: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UsersResponse {
    pub users: Vec<UserRecord>,
}

/// ISO 3166-1 alpha-2 code plus the country name.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct CountryRecord {
    pub country_code: String,
    pub country_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct CountriesResponse {
    pub countries: Vec<CountryRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct DistributionCenterRecord {
    pub country_code: String,
    pub number: i32,
    pub name: String,
    pub tag: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct DistributionCentersResponse {
    pub distribution_centers: Vec<DistributionCenterRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct StoreStatusRecord {
    pub sequence: i32,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct StoreStatusResponse {
    pub store_status: Vec<StoreStatusRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct StoreRecord {
    pub country_code: String,
    pub dc_id: i32,
    pub number: i32,
    pub name: String,
    pub status_id: i32,
    pub street_name: Option<String>,
    pub street_number: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct StoresResponse {
    pub stores: Vec<StoreRecord>,
}

/// Instance lookup by store number; the original payload wraps the
/// match in a list under `store`.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct StoreResponse {
    pub store: Vec<StoreRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct StoreComponentRecord {
    pub store_id: i32,
    pub component_type: String,
    pub hostname: String,
    pub ip_address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct StoreComponentsResponse {
    pub store_components: Vec<StoreComponentRecord>,
}

/// Form body for creating or editing a store.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct StoreForm {
    pub country_code: String,
    pub dc_id: i32,
    pub number: i32,
    pub name: String,
    pub status_id: i32,
    pub street_number: Option<String>,
    pub street_name: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

/// Form body for adding a component to a store.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct StoreComponentForm {
    pub component_type: String,
    pub hostname: String,
    pub ip_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_type_membership() {
        for component_type in COMPONENT_TYPES {
            assert!(valid_component_type(component_type));
        }
        assert!(!valid_component_type("printer"));
        assert!(!valid_component_type("Backoffice"));
        assert!(!valid_component_type(""));
    }
}
