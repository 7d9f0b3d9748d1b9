//! MCP tool definitions and registry.

pub mod query;
pub mod registry;
pub mod schema;
pub mod status;

pub use query::QueryOracleTool;
pub use registry::{ToolHandler, ToolRegistry, error_result_for};
pub use schema::DescribeTableTool;
pub use status::RateLimitStatusTool;

use crate::database::OracleDriver;
use crate::security::{RateLimiter, SqlValidator};
use std::sync::Arc;

/// Tools whose calls count against the rate limiter.
pub const RATE_LIMITED_TOOLS: &[&str] = &[query::TOOL_NAME, schema::TOOL_NAME];

/// Rate-limit bucket for one tool within one server session.
pub fn client_id(session_id: &str, tool: &str) -> String {
    format!("{session_id}_{tool}")
}

/// Everything a tool needs to reach the database safely.
#[derive(Clone)]
pub struct ToolContext {
    pub driver: Arc<dyn OracleDriver>,
    pub validator: SqlValidator,
    pub rate_limiter: Arc<RateLimiter>,
    pub session_id: Arc<str>,
    pub max_rows: usize,
}

impl ToolContext {
    pub fn client_id(&self, tool: &str) -> String {
        client_id(&self.session_id, tool)
    }
}

/// Create and register all tools.
pub fn create_registry(context: ToolContext) -> ToolRegistry {
    let registry = ToolRegistry::new();

    registry.register(QueryOracleTool::new(context.clone()));
    registry.register(DescribeTableTool::new(context.clone()));
    registry.register(RateLimitStatusTool::new(
        context.rate_limiter,
        context.session_id,
    ));

    registry
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory driver double for tool and server tests.

    use super::ToolContext;
    use crate::database::{ColumnDescription, ObjectInfo, OracleDriver, QueryResult};
    use crate::error::{DatabaseError, DbResult};
    use crate::security::{RateLimiter, SqlValidator};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    pub struct MockDriver {
        pub result: Mutex<Option<QueryResult>>,
        pub columns: Mutex<Vec<ColumnDescription>>,
        pub tables: Vec<ObjectInfo>,
        pub views: Vec<ObjectInfo>,
        pub fail_with: Mutex<Option<(i64, String)>>,
        pub executed: Mutex<Vec<String>>,
    }

    impl MockDriver {
        pub fn with_result(result: QueryResult) -> Self {
            Self {
                result: Mutex::new(Some(result)),
                ..Self::default()
            }
        }

        pub fn executed(&self) -> Vec<String> {
            self.executed.lock().clone()
        }

        fn check_failure(&self) -> DbResult<()> {
            match self.fail_with.lock().clone() {
                Some((code, message)) => Err(DatabaseError::Oracle { code, message }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl OracleDriver for MockDriver {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn ping(&self) -> DbResult<()> {
            self.check_failure()
        }

        async fn execute_query(&self, query: &str) -> DbResult<QueryResult> {
            self.executed.lock().push(query.to_string());
            self.check_failure()?;
            Ok(self.result.lock().clone().unwrap_or_else(QueryResult::empty))
        }

        async fn describe_table(&self, table_name: &str) -> DbResult<Vec<ColumnDescription>> {
            self.executed.lock().push(format!("describe {table_name}"));
            self.check_failure()?;
            Ok(self.columns.lock().clone())
        }

        async fn list_tables(&self) -> DbResult<Vec<ObjectInfo>> {
            self.check_failure()?;
            Ok(self.tables.clone())
        }

        async fn list_views(&self) -> DbResult<Vec<ObjectInfo>> {
            self.check_failure()?;
            Ok(self.views.clone())
        }
    }

    pub fn context(driver: Arc<MockDriver>, max_requests: u32) -> ToolContext {
        ToolContext {
            driver,
            validator: SqlValidator::new(),
            rate_limiter: Arc::new(RateLimiter::new(max_requests, 60)),
            session_id: Arc::from("session-1"),
            max_rows: 1000,
        }
    }
}
