use clap::{Arg, Command};

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_FACEBOOK_CLIENT_ID: &str = "facebook-client-id";
pub const ARG_FACEBOOK_CLIENT_SECRET: &str = "facebook-client-secret";
pub const ARG_ARGON2_TIME_COST: &str = "argon2-time-cost";
pub const ARG_SESSION_TTL: &str = "session-ttl";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";

/// Sign-in related arguments: provider client credentials, password
/// hashing cost and session settings. Providers without credentials are
/// simply not offered.
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("External base URL, used to build OAuth2 redirect URIs")
                .default_value("http://localhost:8080")
                .env("STORENET_BASE_URL"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth2 client id")
                .env("STORENET_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("Google OAuth2 client secret")
                .env("STORENET_GOOGLE_CLIENT_SECRET")
                .requires(ARG_GOOGLE_CLIENT_ID),
        )
        .arg(
            Arg::new(ARG_FACEBOOK_CLIENT_ID)
                .long(ARG_FACEBOOK_CLIENT_ID)
                .help("Facebook app id")
                .env("STORENET_FACEBOOK_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_FACEBOOK_CLIENT_SECRET)
                .long(ARG_FACEBOOK_CLIENT_SECRET)
                .help("Facebook app secret")
                .env("STORENET_FACEBOOK_CLIENT_SECRET")
                .requires(ARG_FACEBOOK_CLIENT_ID),
        )
        .arg(
            Arg::new(ARG_ARGON2_TIME_COST)
                .long(ARG_ARGON2_TIME_COST)
                .help("Argon2 time cost (rounds) for local password hashing")
                .default_value("4")
                .env("STORENET_ARGON2_TIME_COST")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Session lifetime in seconds")
                .default_value("86400")
                .env("STORENET_SESSION_TTL")
                .value_parser(clap::value_parser!(i64).range(60..)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (HTTPS only)")
                .env("STORENET_SESSION_COOKIE_SECURE")
                .action(clap::ArgAction::SetTrue),
        )
}
