//! Layered runtime configuration.
//!
//! Values resolve as defaults, then `coupons.toml` (or `config/coupons.toml`), then `COUPONS_*`
//! environment variables, then explicit overrides. Every layer writes through [`SETTINGS`], so
//! the file keys and env names that the CLI reports are the same ones the loader honours.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::Value;

pub const DEFAULT_CONFIG_FILE: &str = "coupons.toml";
pub const NESTED_CONFIG_FILE: &str = "config/coupons.toml";

/// A dotted config key and the environment variables that set it, highest priority first.
#[derive(Clone, Copy, Debug)]
pub struct Setting {
    pub key: &'static str,
    pub env: &'static [&'static str],
}

pub const SETTINGS: [Setting; 8] = [
    Setting { key: "database.url", env: &["COUPONS_DATABASE_URL"] },
    Setting { key: "database.max_connections", env: &["COUPONS_DATABASE_MAX_CONNECTIONS"] },
    Setting { key: "database.timeout_secs", env: &["COUPONS_DATABASE_TIMEOUT_SECS"] },
    Setting { key: "server.bind_address", env: &["COUPONS_SERVER_BIND_ADDRESS"] },
    Setting { key: "server.port", env: &["COUPONS_SERVER_PORT"] },
    Setting {
        key: "server.graceful_shutdown_secs",
        env: &["COUPONS_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    },
    Setting { key: "logging.level", env: &["COUPONS_LOGGING_LEVEL", "COUPONS_LOG_LEVEL"] },
    Setting { key: "logging.format", env: &["COUPONS_LOGGING_FORMAT", "COUPONS_LOG_FORMAT"] },
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("unknown config key `{key}` in `{path}`")]
    UnknownKey { key: String, path: PathBuf },
    #[error("invalid value `{value}` for `{key}` (from {origin})")]
    InvalidValue { key: String, value: String, origin: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://coupons.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

enum AssignError {
    UnknownKey,
    BadValue,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => config.apply_file(&path)?,
            None if options.require_file => {
                let expected =
                    options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.apply_env()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Renders the current value of a dotted key, or `None` when the key is unknown.
    pub fn value(&self, key: &str) -> Option<String> {
        let value = match key {
            "database.url" => self.database.url.clone(),
            "database.max_connections" => self.database.max_connections.to_string(),
            "database.timeout_secs" => self.database.timeout_secs.to_string(),
            "server.bind_address" => self.server.bind_address.clone(),
            "server.port" => self.server.port.to_string(),
            "server.graceful_shutdown_secs" => self.server.graceful_shutdown_secs.to_string(),
            "logging.level" => self.logging.level.clone(),
            "logging.format" => self.logging.format.to_string(),
            _ => return None,
        };
        Some(value)
    }

    fn assign(&mut self, key: &str, raw: &str) -> Result<(), AssignError> {
        match key {
            "database.url" => self.database.url = raw.to_string(),
            "database.max_connections" => self.database.max_connections = parse(raw)?,
            "database.timeout_secs" => self.database.timeout_secs = parse(raw)?,
            "server.bind_address" => self.server.bind_address = raw.to_string(),
            "server.port" => self.server.port = parse(raw)?,
            "server.graceful_shutdown_secs" => self.server.graceful_shutdown_secs = parse(raw)?,
            "logging.level" => self.logging.level = raw.to_string(),
            "logging.format" => {
                self.logging.format = raw.parse().map_err(|_| AssignError::BadValue)?;
            }
            _ => return Err(AssignError::UnknownKey),
        }
        Ok(())
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        for (key, raw) in read_file_entries(path)? {
            self.assign(&key, &raw).map_err(|error| match error {
                AssignError::UnknownKey => {
                    ConfigError::UnknownKey { key: key.clone(), path: path.to_path_buf() }
                }
                AssignError::BadValue => ConfigError::InvalidValue {
                    key: key.clone(),
                    value: raw.clone(),
                    origin: path.display().to_string(),
                },
            })?;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        for setting in SETTINGS {
            let found = setting.env.iter().find_map(|var| read_env(var).map(|raw| (*var, raw)));
            let Some((var, raw)) = found else {
                continue;
            };
            self.assign(setting.key, &raw).map_err(|_| ConfigError::InvalidValue {
                key: setting.key.to_string(),
                value: raw.clone(),
                origin: format!("env {var}"),
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.database.url.trim();
        let level = self.logging.level.trim().to_ascii_lowercase();

        let checks = [
            (
                url.starts_with("sqlite:") || url == ":memory:",
                "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
            ),
            (
                self.database.max_connections > 0,
                "database.max_connections must be greater than zero",
            ),
            (
                (1..=300).contains(&self.database.timeout_secs),
                "database.timeout_secs must be in range 1..=300",
            ),
            (!self.server.bind_address.trim().is_empty(), "server.bind_address must not be empty"),
            (self.server.port > 0, "server.port must be greater than zero"),
            (
                self.server.graceful_shutdown_secs > 0,
                "server.graceful_shutdown_secs must be greater than zero",
            ),
            (
                matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error"),
                "logging.level must be one of trace|debug|info|warn|error",
            ),
        ];

        match checks.into_iter().find(|(holds, _)| !holds) {
            Some((_, message)) => Err(ConfigError::Validation(message.to_string())),
            None => Ok(()),
        }
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

/// Reads a config file into `(dotted.key, raw value)` pairs after `${VAR}` interpolation.
fn read_file_entries(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    let document = toml::from_str::<toml::Table>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })?;

    let mut entries = Vec::new();
    for (key, value) in &document {
        flatten(key, value, &mut entries);
    }
    Ok(entries)
}

fn flatten(key: &str, value: &Value, entries: &mut Vec<(String, String)>) {
    match value {
        Value::Table(table) => {
            for (child, nested) in table {
                flatten(&format!("{key}.{child}"), nested, entries);
            }
        }
        Value::String(text) => entries.push((key.to_string(), text.clone())),
        other => entries.push((key.to_string(), other.to_string())),
    }
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let expression = &rest[start + 2..];
        let end = expression.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &expression[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &expression[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

/// Reads an environment variable, treating blank values as unset.
pub fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse<T: FromStr>(raw: &str) -> Result<T, AssignError> {
    raw.trim().parse().map_err(|_| AssignError::BadValue)
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, SETTINGS};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn write_config(dir: &TempDir, contents: &str) -> Result<PathBuf, String> {
        let path = dir.path().join("coupons.toml");
        fs::write(&path, contents).map_err(|err| err.to_string())?;
        Ok(path)
    }

    fn load_from(path: PathBuf) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
    }

    fn with_vars<T>(vars: &[(&str, &str)], body: impl FnOnce() -> T) -> T {
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let outcome = body();
        for (key, _) in vars {
            env::remove_var(key);
        }
        outcome
    }

    #[test]
    fn defaults_are_valid_without_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.server.port == 8080, "default port should be 8080")?;
        ensure(config.logging.format == LogFormat::Compact, "default format should be compact")
    }

    #[test]
    fn every_setting_key_renders_a_value() -> Result<(), String> {
        let config = AppConfig::default();

        ensure(
            SETTINGS.iter().all(|setting| config.value(setting.key).is_some()),
            "each advertised key should be readable",
        )?;
        ensure(config.value("database.password").is_none(), "unknown keys render nothing")?;
        ensure(
            config.value("logging.format").as_deref() == Some("compact"),
            "log format renders in its config spelling",
        )
    }

    #[test]
    fn file_values_apply_with_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            "[database]\nurl = \"${TEST_COUPONS_DB_PATH}\"\nmax_connections = 2\n\n[logging]\nformat = \"json\"\n",
        )?;

        let config = with_vars(&[("TEST_COUPONS_DB_PATH", "sqlite://interpolated.db")], || {
            load_from(path)
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.database.url == "sqlite://interpolated.db", "url should be interpolated")?;
        ensure(config.database.max_connections == 2, "integer from file should apply")?;
        ensure(config.logging.format == LogFormat::Json, "format from file should apply")
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(&dir, "[database]\nurl = \"${TEST_COUPONS_NEVER_SET}\"\n")?;

        ensure(
            matches!(
                load_from(path),
                Err(ConfigError::MissingEnvInterpolation { ref var }) if var == "TEST_COUPONS_NEVER_SET"
            ),
            "missing variable should be named in the error",
        )
    }

    #[test]
    fn unterminated_interpolation_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(&dir, "[database]\nurl = \"${OPEN\"\n")?;

        ensure(
            matches!(load_from(path), Err(ConfigError::UnterminatedInterpolation)),
            "an open interpolation should be reported",
        )
    }

    #[test]
    fn unknown_file_key_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(&dir, "[server]\nprot = 9090\n")?;

        ensure(
            matches!(
                load_from(path),
                Err(ConfigError::UnknownKey { ref key, .. }) if key == "server.prot"
            ),
            "misspelled key should be named",
        )
    }

    #[test]
    fn mistyped_file_value_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(&dir, "[server]\nport = \"eighty\"\n")?;

        ensure(
            matches!(
                load_from(path),
                Err(ConfigError::InvalidValue { ref key, .. }) if key == "server.port"
            ),
            "non-numeric port should be rejected",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let vars = [("COUPONS_LOG_LEVEL", "warn"), ("COUPONS_LOG_FORMAT", "pretty")];
        let config = with_vars(&vars, || AppConfig::load(LoadOptions::default()))
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.logging.level == "warn", "level should come from the alias")?;
        ensure(config.logging.format == LogFormat::Pretty, "format should come from the alias")
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[database]
url = "sqlite://from-file.db"
max_connections = 3

[server]
port = 7070

[logging]
level = "warn"
"#,
        )?;

        let vars =
            [("COUPONS_DATABASE_URL", "sqlite://from-env.db"), ("COUPONS_SERVER_PORT", "9090")];
        let config = with_vars(&vars, || {
            AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.database.url == "sqlite://from-override.db", "override url should win")?;
        ensure(config.database.max_connections == 3, "file value should beat the default")?;
        ensure(config.server.port == 9090, "env port should win over file")?;
        ensure(config.logging.level == "debug", "override level should win")
    }

    #[test]
    fn invalid_numeric_env_value_names_its_variable() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = with_vars(&[("COUPONS_SERVER_PORT", "not-a-port")], || {
            AppConfig::load(LoadOptions::default())
        });

        ensure(
            matches!(
                result,
                Err(ConfigError::InvalidValue { ref key, ref origin, .. })
                    if key == "server.port" && origin == "env COUPONS_SERVER_PORT"
            ),
            "invalid port should be reported with its key and variable",
        )
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://localhost/coupons".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        ensure(
            matches!(
                result,
                Err(ConfigError::Validation(ref message)) if message.contains("database.url")
            ),
            "validation failure should mention database.url",
        )
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;

        let result = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "missing required file should be reported",
        )
    }
}
