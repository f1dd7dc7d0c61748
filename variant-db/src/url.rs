use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::path::PathBuf;

/// Assembles a `postgres://` URL from `POSTGRES_*` environment variables,
/// exactly the convention the teacher's store uses: `POSTGRES_USER`,
/// `POSTGRES_PASSWORD` (or `POSTGRES_PASSWORD_FILE`), `POSTGRES_DB`, and
/// `POSTGRES_HOST` (added here since this service is not assumed to run
/// with a `db` hostname alias provided by docker-compose).
pub fn postgres_url_from_environment() -> String {
    #[derive(Debug, PartialEq, Deserialize)]
    struct PostgresConfig {
        user: String,
        password: Option<String>,
        password_file: Option<PathBuf>,
        db: String,
        #[serde(default = "default_host")]
        host: String,
    }

    fn default_host() -> String {
        "localhost".to_string()
    }

    let provider = figment::providers::Env::prefixed("POSTGRES_");
    let postgres_config: PostgresConfig = figment::Figment::from(provider)
        .extract()
        .expect("Postgres configuration environment variable(s) missing or invalid");

    let password = if let Some(password) = postgres_config.password {
        password
    } else if let Some(password_file) = postgres_config.password_file {
        std::fs::read_to_string(password_file).expect("Failed to read postgres password file")
    } else {
        panic!("One of POSTGRES_PASSWORD or POSTGRES_PASSWORD_FILE must be provided");
    };

    // Postgres truncates a password at the first newline. Rather than
    // mimic that silently, strip exactly one trailing newline (the
    // extremely common "my editor added one" case) and refuse anything
    // with an interior newline, since that would otherwise truncate to a
    // much weaker password than the user intended.
    let password = password.strip_suffix('\n').unwrap_or(&password);

    if password.contains('\n') {
        panic!(
            "Postgres password contains a non-terminal newline. This password would be \
            insecurely truncated by Postgres. Please provide a password without non-terminal \
            newlines."
        );
    }

    let password = utf8_percent_encode(password, NON_ALPHANUMERIC);

    format!(
        "postgres://{}:{}@{}/{}",
        postgres_config.user, password, postgres_config.host, postgres_config.db
    )
}
