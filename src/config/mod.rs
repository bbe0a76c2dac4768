//! Configuration management for the Mesto API

use anyhow::{bail, Context, Result};
use std::env;

/// Secret used to sign credentials outside production when `JWT_SECRET` is unset
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me-before-deploying";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Whether the process runs in production (`APP_ENV=production`)
    pub production: bool,
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Security headers configuration
    pub security_headers: SecurityHeadersConfig,
    /// Request body decoding limits
    pub body: BodyConfig,
    /// Logging and metrics configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    /// Credential lifetime; also the `Max-Age` of the credential cookie
    pub ttl_secs: i64,
    /// Name of the cookie carrying the credential
    pub cookie_name: String,
    /// Add `Secure` to the credential cookie
    pub cookie_secure: bool,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEV_JWT_SECRET.to_string(),
            issuer: "mesto-api".to_string(),
            ttl_secs: 7 * 24 * 3600,
            cookie_name: "jwt".to_string(),
            cookie_secure: false,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Requests allowed per client within one window
    pub max_requests: u64,
    /// Window size in seconds
    pub window_secs: u64,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the socket address.
    /// Only safe behind a proxy that overwrites these headers.
    pub trust_proxy_headers: bool,
    /// How often expired windows are evicted, in seconds
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 50,
            window_secs: 15 * 60,
            trust_proxy_headers: false,
            sweep_interval_secs: 60,
        }
    }
}

/// Security headers configuration
#[derive(Debug, Clone)]
pub struct SecurityHeadersConfig {
    pub hsts_enabled: bool,
    pub hsts_max_age_secs: u64,
    pub hsts_include_subdomains: bool,
    pub hsts_preload: bool,
    /// Only emit HSTS on requests that arrived over HTTPS
    pub hsts_https_only: bool,
    /// Treat `X-Forwarded-Proto: https` as proof of HTTPS
    pub hsts_trust_x_forwarded_proto: bool,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            hsts_enabled: true,
            hsts_max_age_secs: 15_552_000,
            hsts_include_subdomains: true,
            hsts_preload: false,
            hsts_https_only: true,
            hsts_trust_x_forwarded_proto: true,
        }
    }
}

/// Request body decoding limits
#[derive(Debug, Clone)]
pub struct BodyConfig {
    pub max_bytes: usize,
    /// Maximum bracket nesting in extended URL-encoded keys
    pub max_form_depth: usize,
    /// Maximum number of URL-encoded parameters
    pub max_form_params: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024,
            max_form_depth: 5,
            max_form_params: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `json` or `pretty`
    pub log_format: String,
    /// Address of the Prometheus scrape listener; metrics export is off when unset
    pub metrics_addr: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_addr: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            production: false,
            jwt: JwtConfig::default(),
            rate_limit: RateLimitConfig::default(),
            security_headers: SecurityHeadersConfig::default(),
            body: BodyConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .ok()
            .with_context(|| format!("Invalid {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let production = env::var("APP_ENV")
            .map(|s| s.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if production => bail!("JWT_SECRET is required when APP_ENV=production"),
            _ => DEV_JWT_SECRET.to_string(),
        };

        let jwt_defaults = JwtConfig::default();
        let rate_defaults = RateLimitConfig::default();
        let header_defaults = SecurityHeadersConfig::default();
        let body_defaults = BodyConfig::default();

        let config = Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env_parse("HTTP_PORT", 3000)?,
            production,
            jwt: JwtConfig {
                secret,
                issuer: env::var("JWT_ISSUER").unwrap_or(jwt_defaults.issuer),
                ttl_secs: env_parse("JWT_TTL_SECS", jwt_defaults.ttl_secs)?,
                cookie_name: env::var("JWT_COOKIE_NAME").unwrap_or(jwt_defaults.cookie_name),
                cookie_secure: env_flag("COOKIE_SECURE", production),
            },
            rate_limit: RateLimitConfig {
                enabled: env_flag("RATE_LIMIT_ENABLED", rate_defaults.enabled),
                max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", rate_defaults.max_requests)?,
                window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", rate_defaults.window_secs)?,
                trust_proxy_headers: env_flag(
                    "RATE_LIMIT_TRUST_PROXY",
                    rate_defaults.trust_proxy_headers,
                ),
                sweep_interval_secs: env_parse(
                    "RATE_LIMIT_SWEEP_INTERVAL_SECS",
                    rate_defaults.sweep_interval_secs,
                )?,
            },
            security_headers: SecurityHeadersConfig {
                hsts_enabled: env_flag("HSTS_ENABLED", header_defaults.hsts_enabled),
                hsts_max_age_secs: env_parse("HSTS_MAX_AGE_SECS", header_defaults.hsts_max_age_secs)?,
                hsts_include_subdomains: env_flag(
                    "HSTS_INCLUDE_SUBDOMAINS",
                    header_defaults.hsts_include_subdomains,
                ),
                hsts_preload: env_flag("HSTS_PRELOAD", header_defaults.hsts_preload),
                hsts_https_only: env_flag("HSTS_HTTPS_ONLY", header_defaults.hsts_https_only),
                hsts_trust_x_forwarded_proto: env_flag(
                    "HSTS_TRUST_X_FORWARDED_PROTO",
                    header_defaults.hsts_trust_x_forwarded_proto,
                ),
            },
            body: BodyConfig {
                max_bytes: env_parse("BODY_LIMIT_BYTES", body_defaults.max_bytes)?,
                max_form_depth: body_defaults.max_form_depth,
                max_form_params: body_defaults.max_form_params,
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                metrics_addr: env::var("METRICS_ADDR").ok().filter(|s| !s.is_empty()),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.enabled && self.rate_limit.max_requests == 0 {
            bail!("RATE_LIMIT_MAX_REQUESTS must be at least 1");
        }
        if self.rate_limit.window_secs == 0 {
            bail!("RATE_LIMIT_WINDOW_SECS must be at least 1");
        }
        if self.jwt.ttl_secs <= 0 {
            bail!("JWT_TTL_SECS must be positive");
        }
        if self.production && self.jwt.secret == DEV_JWT_SECRET {
            bail!("the development JWT secret cannot be used in production");
        }
        Ok(())
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_addresses() {
        let config = Config {
            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
            ..Config::default()
        };
        assert_eq!(config.http_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_rate_limit_defaults_match_service_policy() {
        let rl = RateLimitConfig::default();
        assert!(rl.enabled);
        assert_eq!(rl.max_requests, 50);
        assert_eq!(rl.window_secs, 900);
        assert!(!rl.trust_proxy_headers);
    }

    #[test]
    fn test_jwt_defaults() {
        let jwt = JwtConfig::default();
        assert_eq!(jwt.cookie_name, "jwt");
        assert_eq!(jwt.ttl_secs, 604_800);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = Config::default();
        config.rate_limit.window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dev_secret_in_production() {
        let config = Config {
            production: true,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config {
            production: true,
            ..Config::default()
        };
        config.jwt.secret = "a-real-production-secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }
}
