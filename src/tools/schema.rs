//! Table description tool.

use crate::database::ColumnDescription;
use crate::error::{Result, ToolError};
use crate::protocol::{CallToolResult, Tool};
use crate::tools::ToolContext;
use crate::tools::registry::ToolHandler;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{info, instrument, warn};

pub const TOOL_NAME: &str = "describe_table";

#[derive(Debug, Deserialize)]
pub struct DescribeTableArgs {
    pub table_name: String,
}

#[derive(Debug, Serialize)]
struct TableDescription {
    table_name: String,
    columns: Vec<ColumnDescription>,
    column_count: usize,
}

pub struct DescribeTableTool {
    context: ToolContext,
}

impl DescribeTableTool {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ToolHandler for DescribeTableTool {
    fn definition(&self) -> Tool {
        crate::define_tool! {
            name: TOOL_NAME,
            description: "Describe the columns of an Oracle table visible to the \
                connected user: name, data type, nullability, default and position.",
            schema: {
                "type": "object",
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "Unqualified table name; matched case-insensitively"
                    }
                },
                "required": ["table_name"]
            }
        }
    }

    #[instrument(skip(self, arguments), fields(tool = TOOL_NAME))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: DescribeTableArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let start = Instant::now();
        let client_id = self.context.client_id(TOOL_NAME);

        let admission = self.context.rate_limiter.is_allowed(&client_id);
        if !admission.allowed {
            warn!(client_id = %client_id, message = %admission.message, "Rate limit exceeded");
        }
        admission.into_result()?;

        self.context
            .validator
            .validate_table_name(&args.table_name)
            .into_result()?;

        let columns = self.context.driver.describe_table(&args.table_name).await?;

        if columns.is_empty() {
            info!(table_name = %args.table_name, "Table not found or no access");
            return Ok(CallToolResult::text(format!(
                "Table '{}' not found or no access",
                args.table_name
            )));
        }

        let description = TableDescription {
            table_name: args.table_name.to_uppercase(),
            column_count: columns.len(),
            columns,
        };

        info!(
            table_name = %description.table_name,
            column_count = description.column_count,
            describe_time_ms = start.elapsed().as_millis() as u64,
            "Table described successfully"
        );

        Ok(CallToolResult::json(&description))
    }
}
