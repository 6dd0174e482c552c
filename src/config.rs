use std::time::Duration;
use url::Url;

pub const DEFAULT_AUTH_API: &str = "https://api-web.nitrograph.com/api";
pub const DEFAULT_COMMUNITY_API: &str = "https://community.nitrograph.com/api";

pub const REFERRAL_CODE: &str = "Y8UUD9HU";
pub const CHAIN_ID: u64 = 200024;

pub const SITE_ORIGIN: &str = "https://community.nitrograph.com";
pub const SITE_DOMAIN: &str = "community.nitrograph.com";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const LOOP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub const DAILY_CLAIM_RULE: &str = "DAILY_CLAIM";

#[derive(Debug)]
pub enum ConfigError {
    MissingPrivateKeys,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingPrivateKeys => {
                write!(f, "No private keys found. Please set PRIVATE_KEYS in your .env")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Base URLs of the two hosts the bot talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub auth_api: Url,
    pub community_api: Url,
}

impl Endpoints {
    pub fn new(auth_api: Url, community_api: Url) -> Self {
        Self { auth_api, community_api }
    }

    pub fn auth(&self, path: &str) -> String {
        join(&self.auth_api, path)
    }

    pub fn community(&self, path: &str) -> String {
        join(&self.community_api, path)
    }
}

fn join(base: &Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Splits a comma-separated key list, trimming entries and dropping empty ones.
pub fn parse_private_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads `PRIVATE_KEYS` from the environment (after `.env` has been loaded).
pub fn private_keys_from_env() -> Result<Vec<String>, ConfigError> {
    let raw = std::env::var("PRIVATE_KEYS").unwrap_or_default();
    let keys = parse_private_keys(&raw);
    if keys.is_empty() {
        return Err(ConfigError::MissingPrivateKeys);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_keys_are_trimmed_and_empties_dropped() {
        let keys = parse_private_keys(" 0xaa , ,0xbb,, 0xcc ");
        assert_eq!(keys, vec!["0xaa", "0xbb", "0xcc"]);
    }

    #[test]
    fn empty_key_list_parses_to_nothing() {
        assert!(parse_private_keys("").is_empty());
        assert!(parse_private_keys(" , ,").is_empty());
    }

    #[test]
    fn endpoint_paths_join_without_double_slashes() {
        let endpoints = Endpoints::new(
            Url::parse("http://127.0.0.1:9000/api/").unwrap(),
            Url::parse("http://127.0.0.1:9001").unwrap(),
        );
        assert_eq!(endpoints.auth("/auth/nonce"), "http://127.0.0.1:9000/api/auth/nonce");
        assert_eq!(endpoints.community("loyalties/rules"), "http://127.0.0.1:9001/loyalties/rules");
    }
}
