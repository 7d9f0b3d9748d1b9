//! Configuration types and builders.

use crate::error::{ConfigError, McpError, Result};
use crate::security::rate_limiter::{
    DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECONDS, MAX_WINDOW_SECONDS,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for `max_rows`.
pub const MAX_ROWS_LIMIT: usize = 10_000;

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("Invalid regex: username"));

static WEAK_PASSWORD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(password\d*|admin\d*|test\d*|123+|oracle\d*)$")
        .expect("Invalid regex: weak password")
});

const DEFAULT_USERNAMES: &[&str] = &["admin", "oracle", "test", "user", "root"];

/// Oracle connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Explicit ORDS REST-enabled SQL endpoint; derived from host when unset.
    pub rest_url: Option<String>,
    pub connection_timeout: Duration,
    pub query_timeout: Duration,
    pub max_rows: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1521,
            service_name: "ORCL".into(),
            username: String::new(),
            password: String::new(),
            rest_url: None,
            connection_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(300),
            max_rows: 1000,
        }
    }
}

impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("service_name", &self.service_name)
            .field("username", &self.username)
            .field("password", &mask_secret(&self.password))
            .field("rest_url", &self.rest_url)
            .field("connection_timeout", &self.connection_timeout)
            .field("query_timeout", &self.query_timeout)
            .field("max_rows", &self.max_rows)
            .finish()
    }
}

impl OracleConfig {
    pub fn builder() -> OracleConfigBuilder {
        OracleConfigBuilder::new()
    }

    /// Easy Connect descriptor: `host:port/service_name`.
    pub fn dsn(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.service_name)
    }

    /// REST-enabled SQL endpoint used by the ORDS driver.
    pub fn rest_endpoint(&self) -> String {
        match &self.rest_url {
            Some(url) => url.clone(),
            None => format!(
                "http://{}:8080/ords/{}/_/sql",
                self.host,
                self.username.to_lowercase()
            ),
        }
    }
}

/// Builder for OracleConfig with fluent API.
#[derive(Default)]
pub struct OracleConfigBuilder {
    config: OracleConfig,
}

impl OracleConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.config.service_name = service_name.into();
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn rest_url(mut self, url: impl Into<String>) -> Self {
        self.config.rest_url = Some(url.into());
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = timeout;
        self
    }

    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.config.max_rows = max_rows;
        self
    }

    /// Build from environment variables.
    pub fn from_env(self) -> Result<Self> {
        self.from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ORACLE_HOST") {
            self.config.host = host;
        }

        if let Some(port) = lookup("ORACLE_PORT") {
            self.config.port = parse_number("ORACLE_PORT", &port)?;
        }

        if let Some(service_name) = lookup("ORACLE_SERVICE_NAME") {
            self.config.service_name = service_name;
        }

        if let Some(username) = lookup("ORACLE_USERNAME") {
            self.config.username = username;
        }

        if let Some(password) = lookup("ORACLE_PASSWORD") {
            self.config.password = password;
        }

        if let Some(url) = lookup("ORACLE_REST_URL").filter(|u| !u.trim().is_empty()) {
            self.config.rest_url = Some(url);
        }

        if let Some(secs) = lookup("CONNECTION_TIMEOUT") {
            self.config.connection_timeout =
                Duration::from_secs(parse_number("CONNECTION_TIMEOUT", &secs)?);
        }

        if let Some(secs) = lookup("QUERY_TIMEOUT") {
            self.config.query_timeout = Duration::from_secs(parse_number("QUERY_TIMEOUT", &secs)?);
        }

        if let Some(rows) = lookup("MAX_ROWS") {
            self.config.max_rows = parse_number("MAX_ROWS", &rows)?;
        }

        Ok(self)
    }

    pub fn build(self) -> Result<OracleConfig> {
        self.validate()?;
        Ok(self.config)
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;

        if c.host.trim().is_empty() {
            return Err(ConfigError::MissingField("host".into()).into());
        }
        if c.service_name.trim().is_empty() {
            return Err(ConfigError::MissingField("service_name".into()).into());
        }
        if c.username.is_empty() {
            return Err(ConfigError::MissingField("username".into()).into());
        }
        if c.password.is_empty() {
            return Err(ConfigError::MissingField("password".into()).into());
        }
        if c.port == 0 {
            return Err(invalid("port", "Port must be between 1 and 65535"));
        }
        if c.connection_timeout.is_zero() {
            return Err(invalid("connection_timeout", "Timeout must be positive"));
        }
        if c.query_timeout.is_zero() {
            return Err(invalid("query_timeout", "Timeout must be positive"));
        }
        if !(1..=MAX_ROWS_LIMIT).contains(&c.max_rows) {
            return Err(invalid("max_rows", "Max rows must be between 1 and 10000"));
        }
        if c.username.chars().count() < 2 {
            return Err(invalid(
                "username",
                "Username must be at least 2 characters long",
            ));
        }
        if !USERNAME_REGEX.is_match(&c.username) {
            return Err(invalid(
                "username",
                "Username must start with a letter and contain only letters, numbers, and underscores",
            ));
        }
        if c.password.chars().count() < 6 {
            return Err(invalid(
                "password",
                "Password must be at least 6 characters long",
            ));
        }
        Ok(())
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_requests: DEFAULT_MAX_REQUESTS,
            rate_limit_window_secs: DEFAULT_WINDOW_SECONDS,
        }
    }
}

impl SecurityConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(max) = lookup("RATE_LIMIT_MAX_REQUESTS") {
            config.rate_limit_max_requests = parse_number("RATE_LIMIT_MAX_REQUESTS", &max)?;
        }
        if let Some(window) = lookup("RATE_LIMIT_WINDOW_SECONDS") {
            config.rate_limit_window_secs = parse_number("RATE_LIMIT_WINDOW_SECONDS", &window)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.rate_limit_max_requests == 0 {
            return Err(invalid(
                "rate_limit_max_requests",
                "Must be greater than 0",
            ));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(invalid("rate_limit_window_secs", "Must be greater than 0"));
        }
        if self.rate_limit_window_secs > MAX_WINDOW_SECONDS {
            return Err(invalid(
                "rate_limit_window_secs",
                "Must be at most 86400 seconds",
            ));
        }
        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: Cow<'static, str>,
    pub version: Cow<'static, str>,
    pub oracle: OracleConfig,
    pub security: SecurityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "oracle-mcp-server".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            oracle: OracleConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Load the full configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let oracle = OracleConfigBuilder::new().from_lookup(&lookup)?.build()?;
        let security = SecurityConfig::from_lookup(&lookup)?;

        Ok(Self::builder().oracle(oracle).security(security).build())
    }

    /// Non-fatal advisories about a valid but questionable configuration.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let oracle = &self.oracle;

        if DEFAULT_USERNAMES.contains(&oracle.username.to_lowercase().as_str()) {
            warnings.push(format!(
                "Using potentially insecure default username: {}",
                oracle.username
            ));
        }

        if !oracle.password.is_empty() {
            if oracle.password.chars().count() < 8 {
                warnings.push("Database password is shorter than 8 characters".into());
            }
            if WEAK_PASSWORD_REGEX.is_match(&oracle.password.to_lowercase()) {
                warnings.push("Database password appears to use a common weak pattern".into());
            }
        }

        if oracle.connection_timeout > Duration::from_secs(300) {
            warnings.push("Connection timeout is very high, may cause resource issues".into());
        }

        if oracle.query_timeout > Duration::from_secs(1800) {
            warnings.push("Query timeout is very high, may cause resource issues".into());
        }

        warnings
    }
}

/// Builder for ServerConfig.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn oracle(mut self, oracle: OracleConfig) -> Self {
        self.config.oracle = oracle;
        self
    }

    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

/// Mask a secret for display: short values fully, longer ones keep two
/// characters at each end.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 4))
}

fn parse_number<T: FromStr>(field: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        McpError::Config(ConfigError::InvalidValue {
            field: field.into(),
            message: format!("Invalid number: '{}'", raw).into(),
        })
    })
}

fn invalid(field: &'static str, message: &'static str) -> McpError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
    .into()
}
