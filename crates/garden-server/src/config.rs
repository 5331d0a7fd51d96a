use anyhow::{Context, Result, bail};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("GARDEN_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("GARDEN_JWT_SECRET is unset or still a placeholder");
        }

        let port = match get("GARDEN_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("GARDEN_PORT is not a valid port: {}", raw))?,
            None => 4000,
        };

        Ok(Self {
            jwt_secret,
            host: get("GARDEN_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: get("GARDEN_DB_PATH").unwrap_or_else(|| "garden.db".into()).into(),
            upload_dir: get("GARDEN_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into(),
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
