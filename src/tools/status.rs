//! Rate limit introspection tool.

use crate::error::{Result, ToolError};
use crate::protocol::{CallToolResult, Tool};
use crate::security::{RateLimitStatus, RateLimiter};
use crate::tools::registry::ToolHandler;
use crate::tools::{RATE_LIMITED_TOOLS, client_id};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

pub const TOOL_NAME: &str = "rate_limit_status";

#[derive(Debug, Deserialize)]
pub struct RateLimitStatusArgs {
    pub tool: String,
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    tool: &'a str,
    max_requests: u32,
    window_seconds: u64,
    #[serde(flatten)]
    status: RateLimitStatus,
}

/// Reports this session's quota for a rate-limited tool. Not itself limited.
pub struct RateLimitStatusTool {
    rate_limiter: Arc<RateLimiter>,
    session_id: Arc<str>,
}

impl RateLimitStatusTool {
    pub fn new(rate_limiter: Arc<RateLimiter>, session_id: Arc<str>) -> Self {
        Self {
            rate_limiter,
            session_id,
        }
    }
}

#[async_trait]
impl ToolHandler for RateLimitStatusTool {
    fn definition(&self) -> Tool {
        crate::define_tool! {
            name: TOOL_NAME,
            description: "Show how many requests remain in the current rate-limit \
                window for a tool, and whether it is temporarily blocked.",
            schema: {
                "type": "object",
                "properties": {
                    "tool": {
                        "type": "string",
                        "enum": RATE_LIMITED_TOOLS
                    }
                },
                "required": ["tool"]
            }
        }
    }

    #[instrument(skip(self, arguments), fields(tool = TOOL_NAME))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: RateLimitStatusArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        if !RATE_LIMITED_TOOLS.contains(&args.tool.as_str()) {
            return Err(ToolError::InvalidArguments(format!(
                "'{}' is not rate limited; expected one of: {}",
                args.tool,
                RATE_LIMITED_TOOLS.join(", ")
            ))
            .into());
        }

        let status = self
            .rate_limiter
            .get_client_status(&client_id(&self.session_id, &args.tool));

        Ok(CallToolResult::json(&StatusReport {
            tool: &args.tool,
            max_requests: self.rate_limiter.max_requests(),
            window_seconds: self.rate_limiter.window_seconds(),
            status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_reports_session_bucket() {
        let limiter = Arc::new(RateLimiter::new(3, 60));
        limiter.is_allowed("s1_query_oracle");
        limiter.is_allowed("s2_query_oracle");
        limiter.is_allowed("s2_query_oracle");

        let tool = RateLimitStatusTool::new(limiter, Arc::from("s1"));
        let result = tool.execute(json!({"tool": "query_oracle"})).await.unwrap();
        let body: Value = serde_json::from_str(&result.text_content()).unwrap();

        assert_eq!(body["tool"], "query_oracle");
        assert_eq!(body["max_requests"], 3);
        assert_eq!(body["blocked"], false);
        assert_eq!(body["requests_used"], 1);
        assert_eq!(body["requests_remaining"], 2);
        assert!(body.get("remaining_block_time").is_none());
    }

    #[tokio::test]
    async fn test_does_not_consume_quota() {
        let limiter = Arc::new(RateLimiter::new(1, 60));
        let tool = RateLimitStatusTool::new(Arc::clone(&limiter), Arc::from("s1"));
        for _ in 0..3 {
            tool.execute(json!({"tool": "describe_table"})).await.unwrap();
        }
        assert!(limiter.is_allowed("s1_describe_table").allowed);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let tool = RateLimitStatusTool::new(Arc::new(RateLimiter::default()), Arc::from("s1"));
        let err = tool
            .execute(json!({"tool": "rate_limit_status"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is not rate limited"));
    }
}
