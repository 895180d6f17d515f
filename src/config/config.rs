//! Configuration structures for the gate.
//!
//! The on-disk format is a single JSON object whose keys keep their
//! historical PascalCase names (`ForbiddenUserAgents`, `RedirectURL`, ...).
//! Network prefixes are parsed during deserialization, so a malformed CIDR
//! fails the load instead of failing silently on every request.

use super::ConfigError;
use ipnet::IpNet;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Keys of the configuration object. They are matched case-insensitively.
const KNOWN_KEYS: [&str; 8] = [
    "ForbiddenUserAgents",
    "ForbiddenResponse",
    "ForbiddenNetworks",
    "ForbiddenHeaders",
    "RedirectURL",
    "RedirectHTTPResponse",
    "ListenAddress",
    "TimeoutSeconds",
];

/// Headers the gate writes itself when framing a response.
const RESERVED_HEADERS: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Substrings that block a request when found in its User-Agent.
    #[serde(rename = "ForbiddenUserAgents", default, deserialize_with = "null_as_default")]
    pub forbidden_user_agents: Vec<String>,

    /// HTML body of the blocked response.
    #[serde(rename = "ForbiddenResponse", default, deserialize_with = "null_as_default")]
    pub forbidden_response: String,

    /// Client networks that block a request.
    #[serde(rename = "ForbiddenNetworks", default, deserialize_with = "null_as_default")]
    pub forbidden_networks: Vec<IpNet>,

    /// Extra headers set on the blocked response.
    #[serde(rename = "ForbiddenHeaders", default, deserialize_with = "null_as_default")]
    pub forbidden_headers: BTreeMap<String, String>,

    /// Where everyone else is sent.
    #[serde(rename = "RedirectURL")]
    pub redirect_url: String,

    /// Status code of the redirect.
    #[serde(rename = "RedirectHTTPResponse")]
    pub redirect_status: u16,

    #[serde(rename = "ListenAddress", default = "default_listen_address")]
    pub listen_address: String,

    #[serde(rename = "TimeoutSeconds", default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Treat an explicit JSON `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Config {
    /// Load and validate the configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if contents.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: path.to_path_buf(),
            });
        }

        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON string without validating it.
    ///
    /// Keys match regardless of case, so `forbiddenNetworks` still sets
    /// `ForbiddenNetworks`. An exact-case key wins over a differently cased
    /// duplicate.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let value = match serde_json::from_str::<Value>(contents)? {
            Value::Object(object) => Value::Object(canonicalize_keys(object)),
            other => other,
        };
        Ok(serde_json::from_value(value)?)
    }

    /// Check the settings that JSON typing alone can't enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redirect_url.trim().is_empty() {
            return Err(ConfigError::MissingRedirectUrl);
        }

        if !is_redirect_status(self.redirect_status) {
            return Err(ConfigError::InvalidRedirectStatus(self.redirect_status));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        for (name, value) in &self.forbidden_headers {
            validate_header(name, value)?;
        }

        if self.forbidden_user_agents.iter().any(|ua| ua.is_empty()) {
            warn!("ForbiddenUserAgents contains an empty string; every request will be blocked");
        }

        Ok(())
    }
}

fn canonicalize_keys(object: Map<String, Value>) -> Map<String, Value> {
    let mut exact = Map::new();
    let mut folded = Map::new();

    for (key, value) in object {
        match KNOWN_KEYS.iter().find(|known| known.eq_ignore_ascii_case(&key)) {
            Some(known) if *known == key => {
                exact.insert(key, value);
            }
            Some(known) => {
                folded.insert(known.to_string(), value);
            }
            None => warn!(key = %key, "Ignoring unknown configuration key"),
        }
    }

    folded.extend(exact);
    folded
}

fn is_redirect_status(status: u16) -> bool {
    (300..=308).contains(&status) || status == 201
}

fn validate_header(name: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if !name.bytes().all(is_token_byte) {
        return Err(invalid("name is not a valid HTTP token"));
    }
    if RESERVED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(invalid("framing headers are managed by the gate"));
    }
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
        return Err(invalid("value contains CR, LF or NUL"));
    }

    Ok(())
}

/// RFC 9110 `tchar`.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"{
        "ForbiddenUserAgents": ["BadBot", "curl/"],
        "ForbiddenResponse": "<h1>go away</h1>",
        "ForbiddenNetworks": ["10.0.0.0/8", "2001:db8::/32"],
        "ForbiddenHeaders": {"X-Robots-Tag": "noindex", "Cache-Control": "no-store"},
        "RedirectURL": "https://example.com/",
        "RedirectHTTPResponse": 302
    }"#;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_config() {
        let config = Config::from_json(FULL).unwrap();
        assert_eq!(config.forbidden_user_agents, vec!["BadBot", "curl/"]);
        assert_eq!(config.forbidden_response, "<h1>go away</h1>");
        assert_eq!(config.forbidden_networks.len(), 2);
        assert_eq!(config.forbidden_networks[0], "10.0.0.0/8".parse::<IpNet>().unwrap());
        assert_eq!(config.forbidden_headers["X-Robots-Tag"], "noindex");
        assert_eq!(config.redirect_url, "https://example.com/");
        assert_eq!(config.redirect_status, 302);
        assert_eq!(config.listen_address, "0.0.0.0:8080");
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_absent_and_null_rule_lists() {
        let config = Config::from_json(
            r#"{
                "ForbiddenUserAgents": null,
                "ForbiddenNetworks": null,
                "RedirectURL": "https://example.com/",
                "RedirectHTTPResponse": 301
            }"#,
        )
        .unwrap();

        assert!(config.forbidden_user_agents.is_empty());
        assert!(config.forbidden_networks.is_empty());
        assert!(config.forbidden_headers.is_empty());
        assert_eq!(config.forbidden_response, "");
    }

    #[test]
    fn test_optional_server_settings() {
        let config = Config::from_json(
            r#"{
                "RedirectURL": "https://example.com/",
                "RedirectHTTPResponse": 308,
                "ListenAddress": "127.0.0.1:9000",
                "TimeoutSeconds": 5,
                "SomethingElse": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.listen_address, "127.0.0.1:9000");
        assert_eq!(config.timeout_seconds, 5);
    }

    #[test]
    fn test_keys_match_case_insensitively() {
        let config = Config::from_json(
            r#"{
                "forbiddenNetworks": ["10.0.0.0/8"],
                "forbiddenuseragents": ["BadBot"],
                "redirectUrl": "https://example.com/",
                "REDIRECTHTTPRESPONSE": 302
            }"#,
        )
        .unwrap();

        assert_eq!(config.forbidden_networks, vec!["10.0.0.0/8".parse::<IpNet>().unwrap()]);
        assert_eq!(config.forbidden_user_agents, vec!["BadBot"]);
        assert_eq!(config.redirect_url, "https://example.com/");
        assert_eq!(config.redirect_status, 302);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_exact_case_key_wins_over_folded_duplicate() {
        let config = Config::from_json(
            r#"{
                "ForbiddenNetworks": ["10.0.0.0/8"],
                "forbiddennetworks": ["192.168.0.0/16"],
                "RedirectURL": "https://example.com/",
                "RedirectHTTPResponse": 302
            }"#,
        )
        .unwrap();

        assert_eq!(config.forbidden_networks, vec!["10.0.0.0/8".parse::<IpNet>().unwrap()]);
    }

    #[test]
    fn test_miscased_malformed_cidr_still_fails_load() {
        let result = Config::from_json(
            r#"{
                "forbiddenNetworks": ["not-a-network"],
                "RedirectURL": "https://example.com/",
                "RedirectHTTPResponse": 302
            }"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_non_object_json_fails_load() {
        assert!(matches!(Config::from_json("[]"), Err(ConfigError::Parse(_))));
        assert!(matches!(Config::from_json("null"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_malformed_cidr_fails_load() {
        let result = Config::from_json(
            r#"{
                "ForbiddenNetworks": ["10.0.0.0/8", "not-a-network"],
                "RedirectURL": "https://example.com/",
                "RedirectHTTPResponse": 302
            }"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        // A bare address is not a prefix.
        let result = Config::from_json(
            r#"{
                "ForbiddenNetworks": ["10.0.0.1"],
                "RedirectURL": "https://example.com/",
                "RedirectHTTPResponse": 302
            }"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_redirect_fields_fail_load() {
        let result = Config::from_json(r#"{"RedirectHTTPResponse": 302}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        let result = Config::from_json(r#"{"RedirectURL": "https://example.com/"}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(FULL);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.redirect_status, 302);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("config.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_empty_file() {
        let file = write_config("  \n");
        let result = Config::load(file.path());
        assert!(matches!(result, Err(ConfigError::Empty { .. })));
    }

    #[test]
    fn test_invalid_json_file() {
        let file = write_config("{ \"RedirectURL\": ");
        let result = Config::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_redirect_validation() {
        let mut config = Config::from_json(FULL).unwrap();

        for status in [201, 300, 301, 302, 303, 307, 308] {
            config.redirect_status = status;
            assert!(config.validate().is_ok(), "status {} should be accepted", status);
        }

        for status in [0, 200, 299, 309, 404] {
            config.redirect_status = status;
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidRedirectStatus(s)) if s == status
            ));
        }

        config.redirect_status = 302;
        config.redirect_url = "   ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::MissingRedirectUrl)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::from_json(FULL).unwrap();
        config.timeout_seconds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_header_validation() {
        let mut config = Config::from_json(FULL).unwrap();

        config.forbidden_headers.insert("Bad Header".to_string(), "x".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHeader { .. })));
        config.forbidden_headers.remove("Bad Header");

        config
            .forbidden_headers
            .insert("X-Injected".to_string(), "a\r\nSet-Cookie: evil".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHeader { .. })));
        config.forbidden_headers.remove("X-Injected");

        config.forbidden_headers.insert("Content-Length".to_string(), "0".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHeader { .. })));
        config.forbidden_headers.remove("Content-Length");

        // Content-Type is allowed here; the gate overrides it when rendering.
        config.forbidden_headers.insert("Content-Type".to_string(), "text/plain".to_string());
        assert!(config.validate().is_ok());
    }
}
