// src/config.rs

use std::{env, fmt, net::SocketAddr, time::Duration};

use dotenvy::dotenv;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub mail_from: String,
    pub smtp: Option<SmtpConfig>,
    pub s3: Option<S3Config>,
    pub presign_ttl: Duration,
    pub pilot_delete_timeout: Duration,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: Url,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, reason } => write!(f, "{} is invalid: {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;
        let jwt_expiration = parse_or(&lookup, "JWT_EXPIRATION", 86_400u64)?;
        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());
        let bind_addr = parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;
        let mail_from = lookup("MAIL_FROM")
            .unwrap_or_else(|| "AI-PRISM <no-reply@ai-prism.local>".to_string());

        let smtp = match lookup("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(&lookup, "SMTP_PORT", 587u16)?,
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
            }),
            None => None,
        };

        let s3 = match lookup("S3_ENDPOINT") {
            Some(endpoint) => Some(S3Config {
                endpoint: Url::parse(&endpoint).map_err(|e| ConfigError::Invalid {
                    key: "S3_ENDPOINT",
                    reason: e.to_string(),
                })?,
                region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                bucket: required("S3_BUCKET")?,
                access_key: required("S3_ACCESS_KEY")?,
                secret_key: required("S3_SECRET_KEY")?,
            }),
            None => None,
        };

        let presign_ttl = Duration::from_secs(parse_or(&lookup, "PRESIGN_TTL_SECS", 3600u64)?);
        let pilot_delete_timeout =
            Duration::from_secs(parse_or(&lookup, "PILOT_DELETE_TIMEOUT_SECS", 30u64)?);

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            mail_from,
            smtp,
            s3,
            presign_ttl,
            pilot_delete_timeout,
            admin_email: lookup("ADMIN_EMAIL"),
            admin_password: lookup("ADMIN_PASSWORD"),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
