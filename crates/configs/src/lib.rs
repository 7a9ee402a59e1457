use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            acquire_timeout_secs: default_acquire_timeout(),
            sqlx_logging: false,
        }
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }

/// Auth Service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,
    #[serde(default = "default_true")]
    pub require_email_confirmation: bool,
    #[serde(default = "default_site_url")]
    pub site_url: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            session_ttl_hours: default_session_ttl(),
            require_email_confirmation: true,
            site_url: default_site_url(),
        }
    }
}

fn default_session_ttl() -> i64 { 12 }
fn default_true() -> bool { true }
fn default_site_url() -> String { "http://localhost:3000".into() }

/// Fixed-delay retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FixedRetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

/// Linear backoff retry settings, capped at `max_ms`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearRetryConfig {
    pub max_attempts: u32,
    pub initial_ms: u64,
    pub max_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_profile_lookup")]
    pub profile_lookup: FixedRetryConfig,
    #[serde(default = "default_membership_check")]
    pub membership_check: LinearRetryConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self { profile_lookup: default_profile_lookup(), membership_check: default_membership_check() }
    }
}

fn default_profile_lookup() -> FixedRetryConfig { FixedRetryConfig { max_attempts: 3, delay_ms: 500 } }
fn default_membership_check() -> LinearRetryConfig { LinearRetryConfig { max_attempts: 3, initial_ms: 500, max_ms: 1000 } }

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_client_state_path")]
    pub client_state_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self { Self { client_state_path: default_client_state_path() } }
}

fn default_client_state_path() -> String { "data/client_state.json".into() }

/// `CONFIG_PATH`, defaulting to `config.toml`.
pub fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content).with_context(|| format!("invalid config file {path}"))
}

/// Parsed file, or defaults when the file does not exist. Unreadable or
/// malformed files are errors.
pub fn load_file_or_default(path: &str) -> Result<AppConfig> {
    match load_from_file(path) {
        Ok(cfg) => Ok(cfg),
        Err(e) if is_missing_file(&e) => Ok(AppConfig::default()),
        Err(e) => Err(e),
    }
}

fn is_missing_file(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>().is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Config file if present, otherwise defaults filled from the environment.
    pub fn load_or_env() -> Result<Self> {
        let mut cfg = load_file_or_default(&config_path())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        // 归一化 server
        self.server.normalize()?;
        // 归一化 database（支持从环境变量填充 URL）
        self.database.normalize_from_env();
        self.database.validate()?;
        self.auth.normalize_from_env();
        self.auth.validate()?;
        self.bootstrap.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        // 若 TOML 中未提供 URL，则尝试从环境变量填充
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl AuthSettings {
    pub fn normalize_from_env(&mut self) {
        if self.jwt_secret.trim().is_empty() {
            if let Ok(secret) = std::env::var("JWT_SECRET") {
                self.jwt_secret = secret;
            }
        }
        if let Ok(url) = std::env::var("SITE_URL") {
            if !url.trim().is_empty() {
                self.site_url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < 16 {
            return Err(anyhow!("auth.jwt_secret must be at least 16 bytes; set it in config.toml or JWT_SECRET"));
        }
        if self.session_ttl_hours <= 0 {
            return Err(anyhow!("auth.session_ttl_hours must be positive"));
        }
        Ok(())
    }
}

impl BootstrapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.profile_lookup.max_attempts == 0 || self.membership_check.max_attempts == 0 {
            return Err(anyhow!("bootstrap retry max_attempts must be >= 1"));
        }
        if self.membership_check.max_ms < self.membership_check.initial_ms {
            return Err(anyhow!("bootstrap.membership_check.max_ms must be >= initial_ms"));
        }
        Ok(())
    }
}
