use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

/// Builds the database URL from `DATABASE_URL`, merging `DB_PASSWORD` into
/// the URL when the URL itself carries none. Returns `None` when
/// `DATABASE_URL` is absent, which degrades the read API to empty responses
/// and disables ingestion.
pub fn database_url_from_environment() -> Option<String> {
    #[derive(Debug, PartialEq, Deserialize)]
    struct DbEnv {
        database_url: Option<String>,
        db_password: Option<String>,
    }

    let provider = figment::providers::Env::raw().only(&["DATABASE_URL", "DB_PASSWORD"]);
    let env: DbEnv = figment::Figment::from(provider)
        .extract()
        .expect("database environment variables were not valid UTF-8 strings");

    let url = env.database_url?;

    let Some(password) = env.db_password else {
        return Some(url);
    };

    Some(merge_password(&url, &password))
}

// postgres://user@host/db + DB_PASSWORD -> postgres://user:pw@host/db.
// A URL that already carries a password is left alone.
fn merge_password(url: &str, password: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    let Some((userinfo, tail)) = rest.rsplit_once('@') else {
        return url.to_string();
    };

    if userinfo.contains(':') {
        return url.to_string();
    }

    let password = utf8_percent_encode(password, NON_ALPHANUMERIC);
    format!("{scheme}://{userinfo}:{password}@{tail}")
}

/// Detects a transaction-level pooler (PgBouncer and friends) in front of
/// the database, inferred from port 6543 or a `pooler` host label. Sessions
/// behind such a pooler must not rely on server-side prepared-statement
/// caches.
pub fn is_transaction_pooler(url: &str) -> bool {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = rest.rsplit_once('@').map(|(_, tail)| tail).unwrap_or(rest);
    let host_port = authority
        .split_once('/')
        .map(|(hp, _)| hp)
        .unwrap_or(authority);

    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (host_port, None),
    };

    port == Some("6543") || host.contains("pooler")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_password_when_url_has_none() {
        let merged = merge_password("postgres://ingest@db:5432/minutes", "s3cret/");
        assert_eq!(merged, "postgres://ingest:s3cret%2F@db:5432/minutes");
    }

    #[test]
    fn leaves_url_with_password_alone() {
        let url = "postgres://ingest:pw@db/minutes";
        assert_eq!(merge_password(url, "other"), url);
    }

    #[test]
    fn detects_pooler_by_port_and_host() {
        assert!(is_transaction_pooler(
            "postgres://u:p@db.example.com:6543/minutes"
        ));
        assert!(is_transaction_pooler(
            "postgres://u:p@aws-0-eu-west-1.pooler.example.com:5432/minutes"
        ));
        assert!(!is_transaction_pooler("postgres://u:p@db:5432/minutes"));
    }
}
