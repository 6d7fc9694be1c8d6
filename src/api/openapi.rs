use crate::api::handlers::{
    auth::{oauth2, signin},
    health, me, stores,
};
use axum::Json;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Serve the generated document.
pub(crate) async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
/// Routes added outside (like `/` and `/openapi.json`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(signin::sign_in_options, signin::sign_in))
        .routes(routes!(signin::sign_up))
        .routes(routes!(oauth2::oauth2_redirect))
        .routes(routes!(oauth2::oauth2_authorized))
        .routes(routes!(oauth2::sign_out))
        .routes(routes!(me::me))
        .routes(routes!(stores::users))
        .routes(routes!(stores::countries))
        .routes(routes!(stores::country_by_code))
        .routes(routes!(stores::distribution_centers))
        .routes(routes!(stores::distribution_center_by_country))
        .routes(routes!(stores::store_status))
        .routes(routes!(stores::stores, stores::create_store))
        .routes(routes!(stores::stores_by_key))
        .routes(routes!(stores::edit_store, stores::remove_store))
        .routes(routes!(stores::components_for_store, stores::add_component))
        .routes(routes!(stores::remove_component))
        .routes(routes!(stores::store_components))
        .routes(routes!(stores::store_components_by_type))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("OAuth2 and local sign-in".to_string());

    let mut inventory_tag = Tag::new("inventory");
    inventory_tag.description = Some("Store inventory API".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service health".to_string());

    OpenApiBuilder::new()
        .info(info)
        .tags(Some([auth_tag, inventory_tag, health_tag]))
        .build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_author_with_email() {
        assert_eq!(
            parse_author("Jane Doe <jane@example.com>"),
            (Some("Jane Doe"), Some("jane@example.com"))
        );
    }

    #[test]
    fn parse_author_without_email() {
        assert_eq!(parse_author("Jane Doe"), (Some("Jane Doe"), None));
        assert_eq!(parse_author("  "), (None, None));
    }

    #[test]
    fn openapi_lists_the_documented_routes() {
        let document = openapi();
        let paths = &document.paths.paths;
        for path in [
            "/health",
            "/oauth2/sign-in",
            "/oauth2/sign-up",
            "/oauth2/sign-in/{provider}",
            "/oauth2/sign-in/{provider}/authorized",
            "/oauth2/sign-out",
            "/v1/me",
            "/api/users",
            "/api/countries",
            "/api/countries/{country_code}",
            "/api/distribution_centers",
            "/api/distribution_centers/{country_code}",
            "/api/store_status",
            "/api/stores",
            "/api/stores/{country_code}",
            "/api/stores/{country_code}/{number}",
            "/api/stores/{country_code}/{number}/components",
            "/api/stores/{country_code}/{number}/components/{hostname}",
            "/api/store_components",
            "/api/store_components/{component_type}",
        ] {
            assert!(paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn openapi_carries_the_tag_descriptions() {
        let document = openapi();
        let tags = document.tags.unwrap_or_default();
        let names: Vec<&str> = tags.iter().map(|tag| tag.name.as_str()).collect();
        assert_eq!(names, ["auth", "inventory", "health"]);
        assert!(tags.iter().all(|tag| tag.description.is_some()));
    }

    #[test]
    fn openapi_info_comes_from_cargo_metadata() {
        let document = openapi();
        assert_eq!(document.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(document.info.version, env!("CARGO_PKG_VERSION"));
    }
}
