use crate::cli::{
    actions::Action,
    commands::oauth2,
    globals::{GlobalArgs, ProviderCredentials},
};
use anyhow::Result;
use secrecy::SecretString;

fn credentials(
    matches: &clap::ArgMatches,
    id_arg: &str,
    secret_arg: &str,
) -> Option<ProviderCredentials> {
    let client_id = matches.get_one::<String>(id_arg)?.clone();
    let client_secret = matches.get_one::<String>(secret_arg)?.clone();
    Some(ProviderCredentials {
        client_id,
        client_secret: SecretString::from(client_secret),
    })
}

pub fn handler(matches: &clap::ArgMatches) -> Result<(Action, GlobalArgs)> {
    let action = Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
    };

    let base_url = matches
        .get_one::<String>(oauth2::ARG_BASE_URL)
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let mut globals = GlobalArgs::new(base_url);
    globals.google = credentials(
        matches,
        oauth2::ARG_GOOGLE_CLIENT_ID,
        oauth2::ARG_GOOGLE_CLIENT_SECRET,
    );
    globals.facebook = credentials(
        matches,
        oauth2::ARG_FACEBOOK_CLIENT_ID,
        oauth2::ARG_FACEBOOK_CLIENT_SECRET,
    );
    globals.argon2_time_cost = matches
        .get_one::<u32>(oauth2::ARG_ARGON2_TIME_COST)
        .copied()
        .unwrap_or(4);
    globals.session_ttl_seconds = matches
        .get_one::<i64>(oauth2::ARG_SESSION_TTL)
        .copied()
        .unwrap_or(86400);
    globals.session_cookie_secure = matches.get_flag(oauth2::ARG_SESSION_COOKIE_SECURE);

    Ok((action, globals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn test_handler_defaults() -> Result<()> {
        let matches = commands::new().try_get_matches_from(vec![
            "storenet",
            "--dsn",
            "postgres://localhost/storenet",
        ])?;
        let (action, globals) = handler(&matches)?;

        match action {
            Action::Server { port, dsn } => {
                assert_eq!(port, 8080);
                assert_eq!(dsn, "postgres://localhost/storenet");
            }
        }
        assert_eq!(globals.base_url, "http://localhost:8080");
        assert!(globals.google.is_none());
        assert_eq!(globals.argon2_time_cost, 4);
        assert_eq!(globals.session_ttl_seconds, 86400);
        assert!(!globals.session_cookie_secure);
        Ok(())
    }

    #[test]
    fn test_handler_trims_base_url() -> Result<()> {
        let matches = commands::new().try_get_matches_from(vec![
            "storenet",
            "--dsn",
            "postgres://localhost/storenet",
            "--base-url",
            "https://stores.example.com/",
            "--google-client-id",
            "id",
            "--google-client-secret",
            "secret",
        ])?;
        let (_, globals) = handler(&matches)?;

        assert_eq!(globals.base_url, "https://stores.example.com");
        let google = globals.google.expect("google credentials");
        assert_eq!(google.client_id, "id");
        assert_eq!(google.client_secret.expose_secret(), "secret");
        Ok(())
    }
}
