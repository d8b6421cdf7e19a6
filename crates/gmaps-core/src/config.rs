use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable is optional; the lookup is injected so tests can use a
/// plain `HashMap` instead of mutating the process environment.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let optional_path = |var: &str| -> Option<PathBuf> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    };

    let env = parse_environment(&or_default("GMAPS_ENV", "development"))?;
    let log_level = or_default("GMAPS_LOG_LEVEL", "info");

    let base_url = or_default("GMAPS_BASE_URL", crate::scraper_config::DEFAULT_BASE_URL);
    if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
        return Err(ConfigError::InvalidEnvVar {
            var: "GMAPS_BASE_URL".to_string(),
            reason: format!("expected an http(s) URL, got {base_url:?}"),
        });
    }

    let nav_timeout_secs = parse_u64("GMAPS_NAV_TIMEOUT_SECS", "30")?;
    let job_timeout_secs = parse_u64("GMAPS_JOB_TIMEOUT_SECS", "600")?;
    let discovery_timeout_secs = parse_u64("GMAPS_DISCOVERY_TIMEOUT_SECS", "180")?;
    let consent_timeout_ms = parse_u64("GMAPS_CONSENT_TIMEOUT_MS", "5000")?;
    let feed_timeout_ms = parse_u64("GMAPS_FEED_TIMEOUT_MS", "10000")?;
    let place_settle_timeout_ms = parse_u64("GMAPS_PLACE_SETTLE_TIMEOUT_MS", "5000")?;
    let pacing_min_ms = parse_u64("GMAPS_PACING_MIN_MS", "1000")?;
    let pacing_max_ms = parse_u64("GMAPS_PACING_MAX_MS", "2000")?;
    if pacing_min_ms > pacing_max_ms {
        return Err(ConfigError::InvalidEnvVar {
            var: "GMAPS_PACING_MAX_MS".to_string(),
            reason: format!("must be >= GMAPS_PACING_MIN_MS ({pacing_min_ms})"),
        });
    }

    let stall_scrolls = parse_u32("GMAPS_STALL_SCROLLS", "3")?;
    if stall_scrolls == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "GMAPS_STALL_SCROLLS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let session_init_retries = parse_u32("GMAPS_SESSION_INIT_RETRIES", "3")?;
    let session_backoff_ms = parse_u64("GMAPS_SESSION_BACKOFF_MS", "500")?;

    Ok(AppConfig {
        env,
        log_level,
        base_url,
        chrome_executable: optional_path("GMAPS_CHROME_EXECUTABLE"),
        diagnostics_dir: optional_path("GMAPS_DIAGNOSTICS_DIR"),
        nav_timeout_secs,
        job_timeout_secs,
        discovery_timeout_secs,
        consent_timeout_ms,
        feed_timeout_ms,
        place_settle_timeout_ms,
        pacing_min_ms,
        pacing_max_ms,
        stall_scrolls,
        session_init_retries,
        session_backoff_ms,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "GMAPS_ENV".to_string(),
            reason: format!("unknown environment {other:?}"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
