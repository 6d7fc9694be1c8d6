use serde::Deserialize;
use utoipa::ToSchema;

/// Local sign-in form body.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct SignInForm {
    pub email_address: String,
    pub password: String,
    /// Application path to return to after sign-in.
    pub next: Option<String>,
}

/// Local account registration form body.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct SignUpForm {
    pub email_address: String,
    pub username: Option<String>,
    pub password: String,
    /// Application path to return to after sign-up.
    pub next: Option<String>,
}

/// Query for the sign-in entry points.
#[derive(Debug, Deserialize)]
pub(crate) struct SignInQuery {
    pub next: Option<String>,
}

/// Query the provider sends to the callback route.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthorizedQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
