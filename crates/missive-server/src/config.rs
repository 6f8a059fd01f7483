use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use missive_api::auth::SessionPolicy;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Upper bound for session lifetime and idle timeout (ten years).
const MAX_SESSION_HOURS: i64 = 10 * 365 * 24;

/// Server configuration, read from `MISSIVE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub sessions: SessionPolicy,
    pub session_sweep_secs: u64,
    pub registry_cache: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("MISSIVE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MISSIVE_JWT_SECRET is unset or still a placeholder");
        }

        let host = lookup("MISSIVE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "MISSIVE_PORT", 3000)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let defaults = SessionPolicy::default();
        let sessions = SessionPolicy {
            lifetime_secs: session_secs(
                &lookup,
                "MISSIVE_SESSION_LIFETIME_HOURS",
                defaults.lifetime_secs,
            )?,
            idle_timeout_secs: session_secs(
                &lookup,
                "MISSIVE_SESSION_IDLE_HOURS",
                defaults.idle_timeout_secs,
            )?,
        };

        Ok(Self {
            addr,
            db_path: lookup("MISSIVE_DB_PATH")
                .unwrap_or_else(|| "missive.db".into())
                .into(),
            jwt_secret,
            sessions,
            session_sweep_secs: parse_or(&lookup, "MISSIVE_SESSION_SWEEP_SECS", 600)?,
            registry_cache: parse_or(&lookup, "MISSIVE_REGISTRY_CACHE", false)?,
        })
    }
}

/// Read a session duration given in hours and return it in seconds.
/// Must be between 1 hour and [`MAX_SESSION_HOURS`].
fn session_secs<F>(lookup: &F, key: &str, default_secs: i64) -> Result<i64>
where
    F: Fn(&str) -> Option<String>,
{
    let hours: i64 = parse_or(lookup, key, default_secs / 3600)?;
    if !(1..=MAX_SESSION_HOURS).contains(&hours) {
        bail!("{} must be between 1 and {} hours, got {}", key, MAX_SESSION_HOURS, hours);
    }
    hours
        .checked_mul(3600)
        .with_context(|| format!("{} is too large: {}", key, hours))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value {:?}", key, raw)),
        None => Ok(default),
    }
}
