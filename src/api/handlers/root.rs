//! Landing page. Sign-in redirects land here with a `notice` query
//! parameter describing the outcome.

use axum::{extract::Query, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct RootQuery {
    notice: Option<String>,
}

fn notice_message(notice: &str) -> Option<&'static str> {
    match notice {
        "signed-in" => Some("Signed in successfully."),
        "signed-out" => Some("Signed out."),
        "authentication-failed" => Some("Authentication failed!"),
        _ => None,
    }
}

pub async fn root(Query(query): Query<RootQuery>) -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "notice": query.notice.as_deref().and_then(notice_message),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_notices_have_messages() {
        assert_eq!(notice_message("signed-in"), Some("Signed in successfully."));
        assert_eq!(notice_message("signed-out"), Some("Signed out."));
        assert_eq!(
            notice_message("authentication-failed"),
            Some("Authentication failed!")
        );
    }

    #[test]
    fn unknown_notice_is_dropped() {
        assert_eq!(notice_message("made-up"), None);
    }
}
