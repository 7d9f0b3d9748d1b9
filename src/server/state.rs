//! Server state management.

use crate::config::ServerConfig;
use crate::database::OracleDriver;
use crate::error::{ConfigError, Result};
use crate::protocol::ClientInfo;
use crate::security::{RateLimiter, SqlValidator};
use crate::tools::{ToolContext, ToolRegistry};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

pub struct ServerState {
    pub config: ServerConfig,
    pub driver: Arc<dyn OracleDriver>,
    pub tools: ToolRegistry,
    pub validator: SqlValidator,
    pub rate_limiter: Arc<RateLimiter>,
    /// Prefix of every rate-limit client id issued by this process.
    pub session_id: Arc<str>,
    initialized: AtomicBool,
    client_info: RwLock<Option<ClientInfo>>,
}

impl ServerState {
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_initialized(&self, client_info: ClientInfo) {
        *self.client_info.write() = Some(client_info);
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.client_info.read().clone()
    }
}

pub struct ServerStateBuilder {
    config: Option<ServerConfig>,
    driver: Option<Arc<dyn OracleDriver>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    session_id: Option<Arc<str>>,
}

impl ServerStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            driver: None,
            rate_limiter: None,
            session_id: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn driver(mut self, driver: Arc<dyn OracleDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Fix the session id instead of generating a random one.
    pub fn session_id(mut self, session_id: impl Into<Arc<str>>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn build(self) -> Result<ServerState> {
        let config = self.config.unwrap_or_default();
        let driver = self
            .driver
            .ok_or(ConfigError::MissingField("driver".into()))?;
        let rate_limiter = self.rate_limiter.unwrap_or_else(|| {
            Arc::new(RateLimiter::new(
                config.security.rate_limit_max_requests,
                config.security.rate_limit_window_secs,
            ))
        });
        let session_id = self
            .session_id
            .unwrap_or_else(|| Arc::from(Uuid::new_v4().to_string()));
        let validator = SqlValidator::new();

        let tools = crate::tools::create_registry(ToolContext {
            driver: Arc::clone(&driver),
            validator,
            rate_limiter: Arc::clone(&rate_limiter),
            session_id: Arc::clone(&session_id),
            max_rows: config.oracle.max_rows,
        });

        Ok(ServerState {
            config,
            driver,
            tools,
            validator,
            rate_limiter,
            session_id,
            initialized: AtomicBool::new(false),
            client_info: RwLock::new(None),
        })
    }
}

impl Default for ServerStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
