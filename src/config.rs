use std::fmt;
use std::path::PathBuf;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    MissingVar { name: &'static str },
    /// PORT is not a valid port number.
    InvalidPort { value: String, source: std::num::ParseIntError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar { name } => {
                write!(f, "missing required environment variable {}", name)
            }
            Self::InvalidPort { value, source } => {
                write!(f, "invalid PORT value '{}': {}", value, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MissingVar { .. } => None,
            Self::InvalidPort { source, .. } => Some(source),
        }
    }
}

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_VERIFY_TOKEN: &str = "AIRICHAN123";
const DEFAULT_STATIC_DIR: &str = "static";

pub struct Config {
    pub port: u16,
    /// Secret the platform echoes back during webhook subscription.
    pub verify_token: String,
    /// Page access token for the send API.
    pub page_token: String,
    pub openai_api_key: String,
    /// Speech API key. Unset disables audio replies entirely.
    pub eleven_api_key: Option<String>,
    /// Public base URL under which generated audio is reachable.
    pub base_url: Option<String>,
    /// Directory for generated audio files.
    pub static_dir: PathBuf,
    /// Directory for state files (logs). Defaults to current directory.
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a Config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidPort { value, source: e })?,
            None => DEFAULT_PORT,
        };

        let page_token = get("META_PAGE_TOKEN")
            .ok_or(ConfigError::MissingVar { name: "META_PAGE_TOKEN" })?;
        let openai_api_key = get("OPENAI_API_KEY")
            .ok_or(ConfigError::MissingVar { name: "OPENAI_API_KEY" })?;

        Ok(Self {
            port,
            verify_token: get("VERIFY_TOKEN").unwrap_or_else(|| DEFAULT_VERIFY_TOKEN.to_string()),
            page_token,
            openai_api_key,
            eleven_api_key: get("ELEVEN_API_KEY"),
            base_url: get("BASE_URL"),
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
            data_dir: get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    fn assert_err(result: Result<Config, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("META_PAGE_TOKEN", "page-token"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .expect("should load minimal config");

        assert_eq!(config.port, 3000);
        assert_eq!(config.verify_token, "AIRICHAN123");
        assert!(config.eleven_api_key.is_none());
        assert!(config.base_url.is_none());
        assert_eq!(config.static_dir, PathBuf::from("static"));
    }

    #[test]
    fn test_all_variables_honored() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("VERIFY_TOKEN", "sekrit"),
            ("META_PAGE_TOKEN", "page-token"),
            ("OPENAI_API_KEY", "sk-test"),
            ("ELEVEN_API_KEY", "el-test"),
            ("BASE_URL", "https://airi.example.com"),
            ("STATIC_DIR", "/var/airi/static"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.verify_token, "sekrit");
        assert_eq!(config.eleven_api_key.as_deref(), Some("el-test"));
        assert_eq!(config.base_url.as_deref(), Some("https://airi.example.com"));
        assert_eq!(config.static_dir, PathBuf::from("/var/airi/static"));
    }

    #[test]
    fn test_missing_page_token() {
        let err = assert_err(Config::from_lookup(lookup_from(&[(
            "OPENAI_API_KEY",
            "sk-test",
        )])));
        assert!(matches!(err, ConfigError::MissingVar { name: "META_PAGE_TOKEN" }));
        assert!(err.to_string().contains("META_PAGE_TOKEN"));
    }

    #[test]
    fn test_missing_openai_key() {
        let err = assert_err(Config::from_lookup(lookup_from(&[(
            "META_PAGE_TOKEN",
            "page-token",
        )])));
        assert!(matches!(err, ConfigError::MissingVar { name: "OPENAI_API_KEY" }));
    }

    #[test]
    fn test_empty_value_counts_as_unset() {
        let err = assert_err(Config::from_lookup(lookup_from(&[
            ("META_PAGE_TOKEN", ""),
            ("OPENAI_API_KEY", "sk-test"),
        ])));
        assert!(matches!(err, ConfigError::MissingVar { .. }));
    }

    #[test]
    fn test_empty_base_url_means_no_audio_urls() {
        let config = Config::from_lookup(lookup_from(&[
            ("META_PAGE_TOKEN", "page-token"),
            ("OPENAI_API_KEY", "sk-test"),
            ("BASE_URL", ""),
        ]))
        .unwrap();
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_invalid_port() {
        let err = assert_err(Config::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("META_PAGE_TOKEN", "page-token"),
            ("OPENAI_API_KEY", "sk-test"),
        ])));
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
    }

    #[test]
    fn test_out_of_range_port() {
        let err = assert_err(Config::from_lookup(lookup_from(&[
            ("PORT", "70000"),
            ("META_PAGE_TOKEN", "page-token"),
            ("OPENAI_API_KEY", "sk-test"),
        ])));
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
    }
}
