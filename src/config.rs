//! Runtime configuration, read from the environment (and `.env` if present).

use std::net::SocketAddr;

/// Outbound mail settings. Present only when both the relay URL and the
/// sender address are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub relay_url: String,
    pub relay_token: Option<String>,
    pub from_email: String,
    pub from_name: String,
}

impl MailConfig {
    /// `Name <address>` header value.
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub session_key: Option<String>,
    pub site_url: String,
    pub mail: Option<MailConfig>,
    pub db_max_connections: u32,
    pub cookie_secure: bool,
}

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_SITE_URL: &str = "http://localhost:8080";
const DEFAULT_FROM_NAME: &str = "Decision Log";
const DEFAULT_MAX_CONNECTIONS: u32 = 8;

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("BIND_ADDR: {e}"))?;

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|e| format!("DB_MAX_CONNECTIONS: {e}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let cookie_secure = match get("COOKIE_SECURE").as_deref() {
            None => false,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => return Err(format!("COOKIE_SECURE: expected true/false, got '{other}'")),
        };

        let mail = match (get("MAIL_RELAY_URL"), get("MAIL_FROM_EMAIL")) {
            (Some(relay_url), Some(from_email)) => Some(MailConfig {
                relay_url,
                relay_token: get("MAIL_RELAY_TOKEN"),
                from_email,
                from_name: get("MAIL_FROM_NAME").unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
            }),
            _ => None,
        };

        Ok(Config {
            database_url: get("DATABASE_URL"),
            bind_addr,
            session_key: get("SESSION_KEY"),
            site_url: get("SITE_URL")
                .unwrap_or_else(|| DEFAULT_SITE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            mail,
            db_max_connections,
            cookie_secure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let c = config(&[]).unwrap();
        assert!(c.database_url.is_none());
        assert_eq!(c.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(c.site_url, "http://localhost:8080");
        assert_eq!(c.db_max_connections, 8);
        assert!(!c.cookie_secure);
        assert!(c.mail.is_none());
    }

    #[test]
    fn mail_needs_relay_and_sender() {
        let c = config(&[("MAIL_RELAY_URL", "https://relay.example/send")]).unwrap();
        assert!(c.mail.is_none());

        let c = config(&[
            ("MAIL_RELAY_URL", "https://relay.example/send"),
            ("MAIL_FROM_EMAIL", "noreply@example.com"),
        ])
        .unwrap();
        let mail = c.mail.unwrap();
        assert_eq!(mail.from_name, "Decision Log");
        assert_eq!(mail.from_header(), "Decision Log <noreply@example.com>");
        assert!(mail.relay_token.is_none());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let c = config(&[("DATABASE_URL", "  "), ("SITE_URL", "https://decisions.example/")]).unwrap();
        assert!(c.database_url.is_none());
        assert_eq!(c.site_url, "https://decisions.example");
    }

    #[test]
    fn bad_numbers_are_reported() {
        assert!(config(&[("DB_MAX_CONNECTIONS", "many")]).is_err());
        assert!(config(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(config(&[("COOKIE_SECURE", "maybe")]).is_err());
    }
}
