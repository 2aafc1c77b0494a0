use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Base URL used when building links in emails (reset, invite)
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            public_url: default_public_url(),
        }
    }
}

impl ServerConfig {
    /// Session cookies carry the Secure attribute when the dashboard is served over https
    pub fn is_https(&self) -> bool {
        self.public_url.starts_with("https://")
    }

    /// Join a path onto the public URL without doubling slashes
    pub fn public_link(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.public_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
    #[serde(default = "default_reset_token_ttl_minutes")]
    pub reset_token_ttl_minutes: i64,
    #[serde(default = "default_invite_ttl_days")]
    pub invite_ttl_days: i64,
    /// How often expired sessions and reset tokens are purged
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Bootstrap owner account created at startup when no users exist
    pub owner_email: Option<String>,
    pub owner_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_days: default_session_ttl_days(),
            reset_token_ttl_minutes: default_reset_token_ttl_minutes(),
            invite_ttl_days: default_invite_ttl_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
            owner_email: None,
            owner_password: None,
        }
    }
}

fn default_session_ttl_days() -> i64 {
    7
}

fn default_reset_token_ttl_minutes() -> i64 {
    60
}

fn default_invite_ttl_days() -> i64 {
    7
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

/// Shop rates applied when an estimate does not carry its own settings
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_hourly_rate")]
    pub hourly_rate: f64,
    #[serde(default = "default_markup_pct")]
    pub markup_pct: f64,
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,
    #[serde(default = "default_paint_price_per_gallon")]
    pub paint_price_per_gallon: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            hourly_rate: default_hourly_rate(),
            markup_pct: default_markup_pct(),
            tax_rate: default_tax_rate(),
            paint_price_per_gallon: default_paint_price_per_gallon(),
        }
    }
}

fn default_hourly_rate() -> f64 {
    35.0
}

fn default_markup_pct() -> f64 {
    20.0
}

fn default_tax_rate() -> f64 {
    13.0
}

fn default_paint_price_per_gallon() -> f64 {
    42.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_tls: default_smtp_tls(),
            from_address: None,
            from_name: default_from_name(),
        }
    }
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.as_deref().is_some_and(|h| !h.is_empty())
            && self.from_address.as_deref().is_some_and(|a| !a.is_empty())
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "Brushwork".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_requests_per_window")]
    pub api_requests_per_window: u32,
    /// Applies to login, password reset and invite acceptance
    #[serde(default = "default_auth_requests_per_window")]
    pub auth_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Read the client address from X-Forwarded-For / X-Real-IP. Only enable
    /// behind a reverse proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            api_requests_per_window: default_api_requests_per_window(),
            auth_requests_per_window: default_auth_requests_per_window(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
            trust_proxy: false,
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_api_requests_per_window() -> u32 {
    120
}

fn default_auth_requests_per_window() -> u32 {
    20
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse configuration file")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.session_ttl_days, 7);
        assert_eq!(config.auth.reset_token_ttl_minutes, 60);
        assert!((config.pricing.paint_price_per_gallon - 42.0).abs() < f64::EPSILON);
        assert!(!config.email.is_configured());
        assert!(config.rate_limit.enabled);
        assert!(!config.rate_limit.trust_proxy);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            public_url = "https://crm.example.com/"

            [pricing]
            hourly_rate = 48.5

            [email]
            smtp_host = "smtp.example.com"
            from_address = "office@example.com"

            [rate_limit]
            trust_proxy = true
            "#,
        )
        .unwrap();

        assert!(config.server.is_https());
        assert_eq!(
            config.server.public_link("/reset-password?token=abc"),
            "https://crm.example.com/reset-password?token=abc"
        );
        assert!((config.pricing.hourly_rate - 48.5).abs() < f64::EPSILON);
        assert!((config.pricing.markup_pct - 20.0).abs() < f64::EPSILON);
        assert!(config.email.is_configured());
        assert_eq!(config.email.smtp_port, 587);
        assert!(config.rate_limit.trust_proxy);
        assert_eq!(config.rate_limit.auth_requests_per_window, default_auth_requests_per_window());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[auth]\nsession_ttl_days = 1\nowner_email = \"boss@example.com\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.auth.session_ttl_days, 1);
        assert_eq!(config.auth.owner_email.as_deref(), Some("boss@example.com"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("/nonexistent/brushwork.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml("[server\nport = 1").is_err());
    }
}
