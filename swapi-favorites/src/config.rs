use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://swapi-favorites.db";
pub const DEFAULT_JWT_SECRET: &str = "super-secret-key";
pub const DEFAULT_TOKEN_TTL: &str = "15m";

#[derive(Debug, Parser)]
#[command(
    name = "swapi-favorites",
    version,
    about = "Star Wars people and planets API with per-user favorites"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    #[arg(long, value_name = "DURATION")]
    pub token_ttl: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub seed_file: Option<PathBuf>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub database_url: String,
    pub jwt_secret: String,
    /// True when no secret was configured and the built-in fallback is in use.
    pub default_jwt_secret: bool,
    pub token_ttl: Duration,
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid port in env var {key}: {value}")]
    InvalidPort { key: String, value: String },
    #[error("invalid duration for {key}: {value}")]
    InvalidDuration { key: String, value: String },
    #[error("env var {key} is not valid unicode")]
    NotUnicode { key: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    token_ttl: Option<String>,
    seed_file: Option<PathBuf>,
}

/// Environment variables the server reads, captured once at startup.
#[derive(Debug, Default, Clone)]
pub struct EnvVars {
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub port: Option<String>,
}

impl EnvVars {
    pub fn from_process() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: read_env("DATABASE_URL")?,
            jwt_secret: read_env("JWT_SECRET_KEY")?,
            port: read_env("PORT")?,
        })
    }
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let env = EnvVars::from_process()?;
        Self::resolve(cli, &env)
    }

    pub fn resolve(cli: Cli, env: &EnvVars) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;

        let env_bind = match non_empty(env.port.clone()) {
            Some(raw) => Some(SocketAddr::from(([0, 0, 0, 0], parse_port("PORT", &raw)?))),
            None => None,
        };
        let bind = cli
            .bind
            .or(env_bind)
            .or(from_file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)));

        let database_url = cli
            .database_url
            .or_else(|| non_empty(env.database_url.clone()))
            .or(from_file.database_url)
            .unwrap_or_else(|| String::from(DEFAULT_DATABASE_URL));

        let configured_secret =
            non_empty(env.jwt_secret.clone()).or_else(|| non_empty(from_file.jwt_secret));
        let default_jwt_secret = configured_secret.is_none();
        let jwt_secret = configured_secret.unwrap_or_else(|| String::from(DEFAULT_JWT_SECRET));

        let raw_ttl = cli
            .token_ttl
            .or(from_file.token_ttl)
            .unwrap_or_else(|| String::from(DEFAULT_TOKEN_TTL));
        let token_ttl = parse_duration("token_ttl", &raw_ttl)?.max(Duration::from_secs(1));

        let seed_file = cli.seed_file.or(from_file.seed_file);

        Ok(Self {
            bind,
            database_url,
            jwt_secret,
            default_jwt_secret,
            token_ttl,
            seed_file,
        })
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn read_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
            key: String::from(key),
        }),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_port(key: &str, raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort {
            key: String::from(key),
            value: String::from(raw),
        })
}

fn parse_duration(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|_| ConfigError::InvalidDuration {
        key: String::from(key),
        value: String::from(raw),
    })
}
