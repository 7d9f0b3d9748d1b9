//! Read-only query execution tool.

use crate::database::apply_row_limit;
use crate::error::{Result, ToolError};
use crate::protocol::{CallToolResult, Tool};
use crate::security::validator::fingerprint;
use crate::tools::ToolContext;
use crate::tools::registry::ToolHandler;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{info, instrument, warn};

pub const TOOL_NAME: &str = "query_oracle";

/// Row limit when the caller gives none.
pub const DEFAULT_LIMIT: i64 = 100;

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct QueryOracleArgs {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub struct QueryOracleTool {
    context: ToolContext,
}

impl QueryOracleTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ToolHandler for QueryOracleTool {
    fn definition(&self) -> Tool {
        crate::define_tool! {
            name: TOOL_NAME,
            description: "Execute a read-only SQL query against Oracle. \
                Only a single SELECT statement is accepted; comments, semicolons, \
                UNION SELECT and Oracle system packages are rejected. \
                Rows are capped with the 'limit' parameter, so do not add ROWNUM \
                or FETCH FIRST clauses yourself.",
            schema: {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The SELECT statement to run"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of rows to return (default 100, capped by the server's max rows)",
                        "minimum": 0,
                        "default": 100
                    }
                },
                "required": ["query"]
            }
        }
    }

    #[instrument(skip(self, arguments), fields(tool = TOOL_NAME))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: QueryOracleArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let start = Instant::now();
        let client_id = self.context.client_id(TOOL_NAME);
        let query_hash = fingerprint(&args.query);

        let admission = self.context.rate_limiter.is_allowed(&client_id);
        if !admission.allowed {
            warn!(client_id = %client_id, message = %admission.message, "Rate limit exceeded");
        }
        admission.into_result()?;

        info!(
            query_hash,
            query_length = args.query.len(),
            limit = args.limit,
            "Tool execution started"
        );

        self.context
            .validator
            .validate_query(&args.query)
            .into_result()?;

        if args.limit < 0 {
            return Err(ToolError::InvalidArguments(format!(
                "Invalid limit value: {}. Must be a non-negative integer.",
                args.limit
            ))
            .into());
        }
        let limit = (args.limit as u64).min(self.context.max_rows as u64) as usize;
        let query = apply_row_limit(&args.query, limit);

        let result = self.context.driver.execute_query(&query).await.map_err(|e| {
            warn!(query_hash, error = %e, "Query execution failed");
            e
        })?;

        info!(
            query_hash,
            row_count = result.row_count,
            column_count = result.columns.len(),
            query_time_ms = result.execution_time_ms,
            total_time_ms = start.elapsed().as_millis() as u64,
            "Query executed successfully"
        );

        Ok(CallToolResult::json(&result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::QueryResult;
    use crate::tools::testing::{MockDriver, context};
    use serde_json::json;
    use std::sync::Arc;

    fn employees() -> QueryResult {
        QueryResult::new(
            vec!["ID".into(), "NAME".into()],
            vec![vec![json!(1), json!("Ada")], vec![json!(2), json!("Grace")]],
            3.5,
        )
    }

    #[test]
    fn test_tool_definition() {
        let tool = QueryOracleTool::new(context(Arc::new(MockDriver::default()), 10));
        let definition = tool.definition();
        assert_eq!(definition.name, "query_oracle");
        assert_eq!(definition.input_schema["required"], json!(["query"]));
        assert_eq!(definition.input_schema["properties"]["limit"]["default"], 100);
    }

    #[tokio::test]
    async fn test_executes_with_default_limit() {
        let driver = Arc::new(MockDriver::with_result(employees()));
        let tool = QueryOracleTool::new(context(driver.clone(), 10));

        let result = tool
            .execute(json!({"query": "SELECT id, name FROM employees"}))
            .await
            .unwrap();

        assert!(!result.is_error());
        let body: Value = serde_json::from_str(&result.text_content()).unwrap();
        assert_eq!(body["columns"], json!(["ID", "NAME"]));
        assert_eq!(body["row_count"], 2);
        assert_eq!(body["rows"][1], json!([2, "Grace"]));
        assert_eq!(body["execution_time_ms"], 3.5);

        assert_eq!(
            driver.executed(),
            vec!["SELECT * FROM (SELECT id, name FROM employees) WHERE ROWNUM <= 100"]
        );
    }

    #[tokio::test]
    async fn test_limit_capped_by_max_rows() {
        let driver = Arc::new(MockDriver::default());
        let mut ctx = context(driver.clone(), 10);
        ctx.max_rows = 50;
        let tool = QueryOracleTool::new(ctx);

        tool.execute(json!({"query": "SELECT * FROM t", "limit": 5000}))
            .await
            .unwrap();
        tool.execute(json!({"query": "SELECT * FROM t", "limit": 0}))
            .await
            .unwrap();
        tool.execute(json!({"query": "SELECT * FROM t WHERE ROWNUM < 3", "limit": 10}))
            .await
            .unwrap();

        assert_eq!(
            driver.executed(),
            vec![
                "SELECT * FROM (SELECT * FROM t) WHERE ROWNUM <= 50",
                "SELECT * FROM t",
                "SELECT * FROM t WHERE ROWNUM < 3",
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_query_never_reaches_driver() {
        let driver = Arc::new(MockDriver::default());
        let tool = QueryOracleTool::new(context(driver.clone(), 10));

        let err = tool
            .execute(json!({"query": "SELECT * FROM employees; DROP TABLE employees;"}))
            .await
            .unwrap_err();
        let result = crate::tools::error_result_for(&err);
        assert!(result.is_error());
        assert!(
            result
                .text_content()
                .starts_with("Security Error: Query contains blocked pattern")
        );
        assert!(driver.executed().is_empty());
    }

    #[tokio::test]
    async fn test_negative_limit() {
        let driver = Arc::new(MockDriver::default());
        let tool = QueryOracleTool::new(context(driver.clone(), 10));

        let err = tool
            .execute(json!({"query": "SELECT 1 FROM t", "limit": -1}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid limit value: -1"));
        assert!(driver.executed().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let driver = Arc::new(MockDriver::default());
        let tool = QueryOracleTool::new(context(driver.clone(), 2));

        for _ in 0..2 {
            tool.execute(json!({"query": "SELECT 1 FROM t"})).await.unwrap();
        }
        let err = tool
            .execute(json!({"query": "SELECT 1 FROM t"}))
            .await
            .unwrap_err();
        let text = crate::tools::error_result_for(&err).text_content();
        assert!(text.starts_with("Error: Rate limit exceeded (2 requests per 60s)"), "{text}");
        assert_eq!(driver.executed().len(), 2);
    }

    #[tokio::test]
    async fn test_database_error() {
        let driver = Arc::new(MockDriver::default());
        *driver.fail_with.lock() = Some((942, "table or view does not exist".into()));
        let tool = QueryOracleTool::new(context(driver, 10));

        let err = tool
            .execute(json!({"query": "SELECT * FROM nowhere"}))
            .await
            .unwrap_err();
        assert_eq!(
            crate::tools::error_result_for(&err).text_content(),
            "Database Error: ORA-00942: table or view does not exist"
        );
    }

    #[tokio::test]
    async fn test_missing_query_argument() {
        let tool = QueryOracleTool::new(context(Arc::new(MockDriver::default()), 10));
        let err = tool.execute(json!({"limit": 5})).await.unwrap_err();
        assert!(err.to_string().contains("missing field `query`"));
    }
}
