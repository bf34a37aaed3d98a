//! Configuration management for Crosscast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    pub twitter: Option<TwitterConfig>,
    pub mastodon: Option<MastodonConfig>,
    pub bluesky: Option<BlueskyConfig>,
    pub linkedin: Option<LinkedinConfig>,
    pub threads: Option<ThreadsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Public base URL under which feed entries are served.
    pub base_url: String,
}

/// OAuth1.0a application credentials for Twitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    pub instance: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    #[serde(default = "default_bluesky_service")]
    pub service_url: String,
    pub identifier: String,
    pub app_password: String,
}

/// OAuth2 application credentials for LinkedIn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedinConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// OAuth2 application credentials for Threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadsConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

fn default_bluesky_service() -> String {
    crate::targets::bluesky::DEFAULT_SERVICE_URL.to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/crosscast/crosscast.db".to_string(),
            },
            feed: FeedConfig {
                base_url: "http://localhost:8080".to_string(),
            },
            twitter: None,
            mastodon: None,
            bluesky: None,
            linkedin: None,
            threads: None,
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosscast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("crosscast"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [database]
            path = "/tmp/crosscast.db"

            [feed]
            base_url = "https://feed.example.org"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.path, "/tmp/crosscast.db");
        assert_eq!(config.feed.base_url, "https://feed.example.org");
        assert!(config.twitter.is_none());
        assert!(config.mastodon.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [database]
            path = "/tmp/crosscast.db"

            [feed]
            base_url = "https://feed.example.org"

            [twitter]
            consumer_key = "ck"
            consumer_secret = "cs"
            callback_url = "https://app.example.org/callback/twitter"

            [mastodon]
            instance = "mastodon.social"
            access_token = "tok"

            [bluesky]
            identifier = "alice.example.org"
            app_password = "app-pass"

            [linkedin]
            client_id = "lid"
            client_secret = "lsec"
            redirect_uri = "https://app.example.org/callback/linkedin"

            [threads]
            client_id = "tid"
            client_secret = "tsec"
            redirect_uri = "https://app.example.org/callback/threads"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.twitter.unwrap().consumer_key, "ck");
        assert_eq!(config.mastodon.unwrap().instance, "mastodon.social");
        // Omitted service_url falls back to the public PDS.
        assert_eq!(
            config.bluesky.unwrap().service_url,
            "https://bsky.social"
        );
        assert_eq!(config.linkedin.unwrap().client_id, "lid");
        assert_eq!(config.threads.unwrap().client_id, "tid");
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[database]\npath = \"/tmp/x.db\"\n\n[feed]\nbase_url = \"https://f.example.org\"\n"
        )
        .unwrap();

        let config = Config::load_from_path(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.database.path, "/tmp/x.db");
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let error =
            Config::load_from_path(&PathBuf::from("/nonexistent/crosscast.toml")).unwrap_err();
        assert_eq!(error.status(), 500);
    }

    #[test]
    #[serial]
    fn test_config_path_env_override() {
        std::env::set_var("CROSSCAST_CONFIG", "/tmp/override/crosscast.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("CROSSCAST_CONFIG");

        assert_eq!(path, PathBuf::from("/tmp/override/crosscast.toml"));
    }

    #[test]
    #[serial]
    fn test_config_path_env_override_expands_tilde() {
        std::env::set_var("CROSSCAST_CONFIG", "~/crosscast.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("CROSSCAST_CONFIG");

        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("crosscast.toml"));
    }

    #[test]
    #[serial]
    fn test_config_path_defaults_to_xdg_dir() {
        std::env::remove_var("CROSSCAST_CONFIG");
        let path = resolve_config_path().unwrap();

        assert!(path.ends_with("crosscast/config.toml"));
    }

    #[test]
    #[serial]
    fn test_load_honors_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[database]\npath = \"/tmp/env.db\"\n\n[feed]\nbase_url = \"https://f.example.org\"\n"
        )
        .unwrap();

        std::env::set_var("CROSSCAST_CONFIG", file.path());
        let config = Config::load().unwrap();
        std::env::remove_var("CROSSCAST_CONFIG");

        assert_eq!(config.database.path, "/tmp/env.db");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not valid toml [[[").unwrap();

        assert!(Config::load_from_path(&file.path().to_path_buf()).is_err());
    }
}
