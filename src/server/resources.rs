//! Read-only catalog resources.

use crate::database::{ObjectInfo, OracleDriver};
use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{ReadResourceResult, Resource, ResourceContent};
use serde_json::{Value, json};
use tracing::{info, warn};

pub const TABLES_URI: &str = "oracle://tables";
pub const VIEWS_URI: &str = "oracle://views";

const JSON_MIME: &str = "application/json";

pub fn list() -> Vec<Resource> {
    vec![
        Resource {
            uri: TABLES_URI.into(),
            name: "Oracle Tables".into(),
            description: Some("Tables visible to the connected user".into()),
            mime_type: Some(JSON_MIME.into()),
        },
        Resource {
            uri: VIEWS_URI.into(),
            name: "Oracle Views".into(),
            description: Some("Views visible to the connected user".into()),
            mime_type: Some(JSON_MIME.into()),
        },
    ]
}

/// Render a catalog resource as JSON text.
pub async fn read(driver: &dyn OracleDriver, uri: &str) -> ProtocolResult<ReadResourceResult> {
    let (objects, key) = match uri {
        TABLES_URI => (driver.list_tables().await, "table_name"),
        VIEWS_URI => (driver.list_views().await, "view_name"),
        other => return Err(ProtocolError::ResourceNotFound(other.to_string())),
    };

    let objects = objects.map_err(|e| {
        warn!(uri, error = %e, "Failed to read resource");
        ProtocolError::InternalError(format!("Database Error: {e}").into())
    })?;

    info!(uri, count = objects.len(), "Resource read");

    let text = serde_json::to_string_pretty(&render(&objects, key))
        .map_err(|e| ProtocolError::InternalError(e.to_string().into()))?;

    Ok(ReadResourceResult {
        contents: vec![ResourceContent {
            uri: uri.to_string(),
            mime_type: Some(JSON_MIME.into()),
            text,
        }],
    })
}

fn render(objects: &[ObjectInfo], key: &str) -> Value {
    objects
        .iter()
        .map(|o| json!({ key: o.name, "owner": o.owner }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::MockDriver;

    fn driver() -> MockDriver {
        MockDriver {
            tables: vec![
                ObjectInfo::new("EMPLOYEES", "HR"),
                ObjectInfo::new("ORDERS", "SALES"),
            ],
            views: vec![ObjectInfo::new("EMP_DETAILS_VIEW", "HR")],
            ..MockDriver::default()
        }
    }

    #[test]
    fn test_list() {
        let resources = list();
        let uris: Vec<&str> = resources.iter().map(|r| r.uri.as_str()).collect();
        assert_eq!(uris, vec!["oracle://tables", "oracle://views"]);
        assert!(
            resources
                .iter()
                .all(|r| r.mime_type.as_deref() == Some("application/json"))
        );
    }

    #[tokio::test]
    async fn test_read_tables() {
        let result = read(&driver(), TABLES_URI).await.unwrap();
        let content = &result.contents[0];
        assert_eq!(content.uri, TABLES_URI);

        let body: Value = serde_json::from_str(&content.text).unwrap();
        assert_eq!(
            body,
            json!([
                {"table_name": "EMPLOYEES", "owner": "HR"},
                {"table_name": "ORDERS", "owner": "SALES"}
            ])
        );
    }

    #[tokio::test]
    async fn test_read_views() {
        let result = read(&driver(), VIEWS_URI).await.unwrap();
        let body: Value = serde_json::from_str(&result.contents[0].text).unwrap();
        assert_eq!(body[0]["view_name"], "EMP_DETAILS_VIEW");
    }

    #[tokio::test]
    async fn test_unknown_uri() {
        let err = read(&driver(), "oracle://users").await.unwrap_err();
        assert_eq!(err.code(), -32002);
    }

    #[tokio::test]
    async fn test_database_failure() {
        let driver = driver();
        *driver.fail_with.lock() = Some((1017, "invalid username/password".into()));
        let err = read(&driver, TABLES_URI).await.unwrap_err();
        assert_eq!(err.code(), -32603);
        assert!(err.to_string().contains("ORA-01017"));
    }
}
