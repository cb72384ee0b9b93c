use derive_more::derive::From;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Why a configuration could not be produced.
#[derive(Debug, From)]
pub enum ConfigError {
    Io(std::io::Error),

    Parse(toml::de::Error),

    #[from(ignore)]
    InvalidPath(PathBuf),

    /// Parsed fine but holds a value the server cannot run with.
    #[from(ignore)]
    Invalid(String),
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::InvalidPath(path) => write!(f, "no config file at {}", path.display()),
            Self::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SEED: u64 = 1;
pub const DEFAULT_FUZZ_PERIOD: u64 = 500;
pub const DEFAULT_RESTART_INTERVAL: u64 = 10_000;
pub const DEFAULT_ASSET_DIR: &str = "assets";

/// Runtime settings of the server. Every field may be omitted from a
/// config file and falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub seed: u64,
    /// Number of fuzz sessions in one intensity cycle.
    pub fuzz_period: u64,
    /// Dispatched requests between listener restarts.
    pub restart_interval: u64,
    /// Directory static assets are served from.
    pub asset_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            seed: DEFAULT_SEED,
            fuzz_period: DEFAULT_FUZZ_PERIOD,
            restart_interval: DEFAULT_RESTART_INTERVAL,
            asset_dir: PathBuf::from(DEFAULT_ASSET_DIR),
        }
    }
}

impl ServerConfig {
    /// Loads and validates a TOML config file.
    pub fn load(target: impl AsRef<Path>) -> ConfigResult<Self> {
        let target = target.as_ref();
        if !target.is_file() {
            return Err(ConfigError::InvalidPath(target.to_path_buf()));
        }

        let config: Self = from_path(target)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.fuzz_period < 1 {
            return Err(ConfigError::Invalid("fuzz_period must be at least 1".into()));
        }
        if self.restart_interval < 1 {
            return Err(ConfigError::Invalid(
                "restart_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// `host:port` as handed to the listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reads and deserializes any TOML document.
pub fn from_path<T: DeserializeOwned>(target: impl AsRef<Path>) -> ConfigResult<T> {
    let content = std::fs::read_to_string(target)?;
    from_str(&content)
}

pub fn from_str<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: ServerConfig = from_str("").expect("defaults");
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_address(), "localhost:8080");
    }

    #[test]
    fn fields_can_be_overridden_individually() {
        let config: ServerConfig =
            from_str("port = 9000\nseed = 42\nasset_dir = \"/srv/wyrm\"\n").expect("valid");
        assert_eq!(config.port, 9000);
        assert_eq!(config.seed, 42);
        assert_eq!(config.asset_dir, PathBuf::from("/srv/wyrm"));
        assert_eq!(config.fuzz_period, DEFAULT_FUZZ_PERIOD);
    }

    #[test]
    fn zero_intervals_are_invalid() {
        let config = ServerConfig {
            restart_interval: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ServerConfig {
            fuzz_period: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn wrong_types_fail_to_deserialize() {
        let result: ConfigResult<ServerConfig> = from_str("port = \"eighty\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_invalid_path() {
        let result = ServerConfig::load("/definitely/not/here/wyrm.toml");
        assert!(matches!(result, Err(ConfigError::InvalidPath(_))));
    }

    #[test]
    fn load_reads_toml_from_disk() {
        let path = std::env::temp_dir().join(format!("wyrm-config-{}.toml", std::process::id()));
        std::fs::write(&path, "restart_interval = 3\n").expect("write config");

        let config = ServerConfig::load(&path).expect("load");
        std::fs::remove_file(&path).expect("cleanup");
        assert_eq!(config.restart_interval, 3);
    }
}
