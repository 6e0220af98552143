//! Configuration for the Nuvla client.

use secrecy::SecretString;
use serde::Deserialize;

/// Nuvla endpoint and API-key credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct NuvlaConfig {
    /// Base URL of the Nuvla deployment (without the `/api` suffix).
    #[serde(default = "default_url")]
    pub url: String,

    /// API key identifier (`credential/<uuid>`).
    #[serde(default)]
    pub api_key: String,

    /// API key secret.
    #[serde(default = "empty_secret")]
    pub api_secret: SecretString,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates (self-hosted test instances only).
    #[serde(default)]
    pub insecure: bool,
}

fn default_url() -> String {
    "https://nuvla.io".to_owned()
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for NuvlaConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: String::new(),
            api_secret: empty_secret(),
            timeout_secs: default_timeout_secs(),
            insecure: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults() {
        let config = NuvlaConfig::default();
        assert_eq!(config.url, "https://nuvla.io");
        assert_eq!(config.timeout_secs, 30);
        assert!(!config.insecure);
    }

    #[test]
    fn from_toml() {
        let config: NuvlaConfig = toml::from_str(
            r#"
            api_key = "credential/abc"
            api_secret = "s3cr3t"
            "#,
        )
        .unwrap();
        assert_eq!(config.url, "https://nuvla.io");
        assert_eq!(config.api_key, "credential/abc");
        assert_eq!(config.api_secret.expose_secret(), "s3cr3t");
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let config = NuvlaConfig {
            api_secret: SecretString::from("s3cr3t".to_owned()),
            ..NuvlaConfig::default()
        };
        assert!(!format!("{config:?}").contains("s3cr3t"));
    }
}
