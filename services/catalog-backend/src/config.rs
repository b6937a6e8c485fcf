//! Configuration types and loading
//!
//! Config precedence: CLI `--config` > `CONFIG_PATH` env var > default file.
//! `CATALOG_ADMIN_PASSWORD` overrides the password of the `admin` account so
//! the checked-in file never has to carry a real one.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_users")]
    pub users: Vec<UserConfig>,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Artificial latency added to every response, for exercising loading states
    #[serde(default)]
    pub response_delay_ms: u64,
}

/// Token lifetimes
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
}

/// An account allowed to log in
#[derive(Debug, Deserialize)]
pub struct UserConfig {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: Secret<String>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    /// Start with the sample books
    #[serde(default = "default_seed")]
    pub seed: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

pub const ADMIN_USERNAME: &str = "admin";

fn default_max_connections() -> usize {
    1000
}

fn default_access_ttl() -> u64 {
    catalog_auth::ACCESS_TOKEN_TTL.as_secs()
}

fn default_refresh_ttl() -> u64 {
    catalog_auth::REFRESH_TOKEN_TTL.as_secs()
}

fn default_seed() -> bool {
    true
}

fn default_users() -> Vec<UserConfig> {
    vec![UserConfig {
        username: ADMIN_USERNAME.into(),
        email: Some("admin@example.com".into()),
        password: Secret::new("admin".into()),
    }]
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;

        if let Ok(password) = std::env::var("CATALOG_ADMIN_PASSWORD") {
            config.set_admin_password(password)?;
        }

        Ok(config)
    }

    /// Parse and validate TOML without touching the environment.
    pub fn parse(contents: &str) -> common::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.auth.access_ttl_secs == 0 {
            return Err(common::Error::Config(
                "access_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.auth.refresh_ttl_secs < self.auth.access_ttl_secs {
            return Err(common::Error::Config(
                "refresh_ttl_secs must not be shorter than access_ttl_secs".into(),
            ));
        }
        if self.users.is_empty() {
            return Err(common::Error::Config("at least one user is required".into()));
        }
        for (i, user) in self.users.iter().enumerate() {
            if user.username.trim().is_empty() {
                return Err(common::Error::Config(format!("users[{i}] has an empty username")));
            }
            if user.password.expose().is_empty() {
                return Err(common::Error::Config(format!(
                    "user {} has an empty password",
                    user.username
                )));
            }
            if self.users[..i].iter().any(|u| u.username == user.username) {
                return Err(common::Error::Config(format!(
                    "duplicate username: {}",
                    user.username
                )));
            }
        }
        Ok(())
    }

    fn set_admin_password(&mut self, password: String) -> common::Result<()> {
        if password.is_empty() {
            return Err(common::Error::Config(
                "CATALOG_ADMIN_PASSWORD must not be empty".into(),
            ));
        }
        let admin = self
            .users
            .iter_mut()
            .find(|u| u.username == ADMIN_USERNAME)
            .ok_or_else(|| common::Error::UnknownUser(ADMIN_USERNAME.into()))?;
        admin.password = Secret::new(password);
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("catalog-backend.toml")
    }
}
