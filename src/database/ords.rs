//! Oracle driver over ORDS REST-enabled SQL using `reqwest`.
//!
//! Each statement is a `POST` of `{statementText, binds}` to the
//! `/_/sql` endpoint with basic auth. ORDS answers 200 even for failed
//! statements and reports the ORA- error inside the first item.

use crate::config::OracleConfig;
use crate::database::result::{ColumnDescription, ObjectInfo, QueryResult};
use crate::database::sql::{DESCRIBE_TABLE_SQL, LIST_TABLES_SQL, LIST_VIEWS_SQL, PING_SQL};
use crate::database::traits::OracleDriver;
use crate::error::{DatabaseError, DbResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SqlRequest<'a> {
    statement_text: &'a str,
    #[serde(skip_serializing_if = "no_binds")]
    binds: &'a [Bind<'a>],
}

fn no_binds(binds: &&[Bind<'_>]) -> bool {
    binds.is_empty()
}

#[derive(Debug, Serialize)]
struct Bind<'a> {
    name: &'a str,
    data_type: &'static str,
    value: &'a str,
}

impl<'a> Bind<'a> {
    fn varchar(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            data_type: "VARCHAR2",
            value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SqlResponse {
    #[serde(default)]
    items: Vec<StatementResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResult {
    result_set: Option<ResultSet>,
    error_code: Option<i64>,
    error_message: Option<String>,
    error_details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    metadata: Vec<ColumnMetadata>,
    #[serde(default)]
    items: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColumnMetadata {
    column_name: String,
    json_column_name: String,
}

impl ResultSet {
    fn into_query_result(self, elapsed: Duration) -> QueryResult {
        let columns: Vec<String> = self.metadata.iter().map(|m| m.column_name.clone()).collect();
        let rows = self
            .items
            .into_iter()
            .map(|mut item| {
                self.metadata
                    .iter()
                    .map(|m| item.remove(&m.json_column_name).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        QueryResult::new(columns, rows, elapsed.as_secs_f64() * 1000.0)
    }
}

/// ORDS-backed Oracle driver.
pub struct OrdsDriver {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
    query_timeout: Duration,
}

impl OrdsDriver {
    /// Create a new driver. Does not contact the database.
    pub fn new(config: &OracleConfig) -> DbResult<Self> {
        let endpoint = config.rest_endpoint();
        info!(endpoint = %endpoint, dsn = %config.dsn(), "Configuring ORDS driver");

        let client = Client::builder()
            .connect_timeout(config.connection_timeout)
            .build()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            query_timeout: config.query_timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one statement and return its result set.
    async fn run(&self, statement: &str, binds: &[Bind<'_>]) -> DbResult<ResultSet> {
        let request = async {
            let response = self
                .client
                .post(&self.endpoint)
                .basic_auth(&self.username, Some(&self.password))
                .json(&SqlRequest {
                    statement_text: statement,
                    binds,
                })
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(DatabaseError::ConnectionFailed(format!(
                    "ORDS rejected credentials (HTTP {})",
                    status.as_u16()
                )));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DatabaseError::QueryFailed(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    body.trim()
                )));
            }

            response
                .json::<SqlResponse>()
                .await
                .map_err(|e| DatabaseError::InvalidResponse(e.to_string()))
        };

        let body = timeout(self.query_timeout, request)
            .await
            .map_err(|_| DatabaseError::Timeout(self.query_timeout.as_millis() as u64))??;

        let item = body
            .items
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::InvalidResponse("response has no items".into()))?;

        if let Some(code) = item.error_code {
            let message = item
                .error_message
                .or(item.error_details)
                .unwrap_or_else(|| "unknown error".into());
            return Err(DatabaseError::Oracle {
                code,
                message: strip_ora_prefix(&message).to_string(),
            });
        }

        item.result_set
            .ok_or_else(|| DatabaseError::InvalidResponse("statement returned no result set".into()))
    }

    async fn list_objects(&self, statement: &str) -> DbResult<Vec<ObjectInfo>> {
        let start = Instant::now();
        let result = self.run(statement, &[]).await?.into_query_result(start.elapsed());

        Ok(result
            .rows
            .iter()
            .map(|row| {
                ObjectInfo::new(
                    text_at(row, 0).unwrap_or_default(),
                    text_at(row, 1).unwrap_or_default(),
                )
            })
            .collect())
    }
}

#[async_trait]
impl OracleDriver for OrdsDriver {
    fn name(&self) -> &'static str {
        "ords"
    }

    async fn ping(&self) -> DbResult<()> {
        self.run(PING_SQL, &[]).await.map(|_| ())
    }

    #[instrument(skip(self, query), fields(db = "ords", query_length = query.len()))]
    async fn execute_query(&self, query: &str) -> DbResult<QueryResult> {
        let start = Instant::now();
        let result = self.run(query, &[]).await?.into_query_result(start.elapsed());

        debug!(
            row_count = result.row_count,
            column_count = result.columns.len(),
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );
        Ok(result)
    }

    #[instrument(skip(self), fields(db = "ords"))]
    async fn describe_table(&self, table_name: &str) -> DbResult<Vec<ColumnDescription>> {
        let start = Instant::now();
        let binds = [Bind::varchar("table_name", table_name)];
        let result = self
            .run(DESCRIBE_TABLE_SQL, &binds)
            .await?
            .into_query_result(start.elapsed());

        Ok(result
            .rows
            .iter()
            .map(|row| ColumnDescription {
                column_name: text_at(row, 0).unwrap_or_default(),
                data_type: text_at(row, 1).unwrap_or_default(),
                nullable: text_at(row, 2).unwrap_or_default(),
                default_value: text_at(row, 3),
                column_id: row.get(4).and_then(int_value).unwrap_or_default(),
            })
            .collect())
    }

    async fn list_tables(&self) -> DbResult<Vec<ObjectInfo>> {
        self.list_objects(LIST_TABLES_SQL).await
    }

    async fn list_views(&self) -> DbResult<Vec<ObjectInfo>> {
        self.list_objects(LIST_VIEWS_SQL).await
    }
}

fn map_transport_error(e: reqwest::Error) -> DatabaseError {
    if e.is_connect() || e.is_timeout() {
        DatabaseError::ConnectionFailed(e.to_string())
    } else {
        DatabaseError::QueryFailed(e.to_string())
    }
}

/// `"ORA-00942: table ..."` -> `"table ..."`; the code is rendered separately.
fn strip_ora_prefix(message: &str) -> &str {
    match message.split_once(": ") {
        Some((prefix, rest)) if prefix.starts_with("ORA-") => rest,
        _ => message,
    }
}

/// Text form of a cell; numbers are stringified, nulls are `None`.
fn text_at(row: &[Value], index: usize) -> Option<String> {
    match row.get(index)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SQL_PATH: &str = "/ords/hr/_/sql";

    fn driver_for(server: &MockServer) -> OrdsDriver {
        let config = OracleConfig::builder()
            .username("hr")
            .password("hr_password")
            .rest_url(format!("{}{}", server.uri(), SQL_PATH))
            .query_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        OrdsDriver::new(&config).unwrap()
    }

    fn result_set(metadata: Value, items: Value) -> Value {
        json!({
            "env": { "defaultTimeZone": "UTC" },
            "items": [{
                "statementId": 1,
                "statementType": "query",
                "resultSet": {
                    "metadata": metadata,
                    "items": items,
                    "hasMore": false,
                    "limit": 10000,
                    "offset": 0
                }
            }]
        })
    }

    #[tokio::test]
    async fn test_execute_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SQL_PATH))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({
                "statementText": "SELECT * FROM (SELECT id, name FROM employees) WHERE ROWNUM <= 10"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(result_set(
                json!([
                    { "columnName": "ID", "jsonColumnName": "id", "columnTypeName": "NUMBER" },
                    { "columnName": "NAME", "jsonColumnName": "name", "columnTypeName": "VARCHAR2" }
                ]),
                json!([
                    { "id": 1, "name": "Ada" },
                    { "id": 2, "name": null }
                ]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let driver = driver_for(&server);
        let result = driver
            .execute_query("SELECT * FROM (SELECT id, name FROM employees) WHERE ROWNUM <= 10")
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["ID", "NAME"]);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.rows[0], vec![json!(1), json!("Ada")]);
        assert_eq!(result.rows[1], vec![json!(2), Value::Null]);
    }

    #[tokio::test]
    async fn test_oracle_error_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SQL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "statementId": 1,
                    "statementType": "query",
                    "errorCode": 942,
                    "errorLine": 1,
                    "errorColumn": 15,
                    "errorMessage": "ORA-00942: table or view does not exist",
                    "errorDetails": "ORA-00942: table or view does not exist\n\nhttps://docs.oracle.com/error-help/db/ora-00942/"
                }]
            })))
            .mount(&server)
            .await;

        let driver = driver_for(&server);
        let err = driver.execute_query("SELECT * FROM missing").await.unwrap_err();
        match err {
            DatabaseError::Oracle { code, message } => {
                assert_eq!(code, 942);
                assert_eq!(message, "table or view does not exist");
            }
            other => panic!("expected Oracle error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let driver = driver_for(&server);
        let err = driver.ping().await.unwrap_err();
        assert!(matches!(err, DatabaseError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let driver = driver_for(&server);
        let err = driver.execute_query("SELECT 1 FROM t").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Query execution failed: HTTP 503: maintenance"
        );
    }

    #[tokio::test]
    async fn test_query_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(result_set(json!([]), json!([])))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let driver = driver_for(&server);
        let err = driver.execute_query("SELECT 1 FROM t").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Timeout(2000)));
    }

    #[tokio::test]
    async fn test_describe_table_binds_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "binds": [{ "name": "table_name", "data_type": "VARCHAR2", "value": "employees" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(result_set(
                json!([
                    { "columnName": "COLUMN_NAME", "jsonColumnName": "column_name" },
                    { "columnName": "DATA_TYPE", "jsonColumnName": "data_type" },
                    { "columnName": "NULLABLE", "jsonColumnName": "nullable" },
                    { "columnName": "DATA_DEFAULT", "jsonColumnName": "data_default" },
                    { "columnName": "COLUMN_ID", "jsonColumnName": "column_id" }
                ]),
                json!([
                    { "column_name": "ID", "data_type": "NUMBER", "nullable": "N", "data_default": null, "column_id": 1 },
                    { "column_name": "HIRED", "data_type": "DATE", "nullable": "Y", "data_default": "SYSDATE", "column_id": 2 }
                ]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let driver = driver_for(&server);
        let columns = driver.describe_table("employees").await.unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].column_name, "ID");
        assert_eq!(columns[0].nullable, "N");
        assert_eq!(columns[0].default_value, None);
        assert_eq!(columns[1].default_value.as_deref(), Some("SYSDATE"));
        assert_eq!(columns[1].column_id, 2);
    }

    #[tokio::test]
    async fn test_list_tables() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "statementText": LIST_TABLES_SQL })))
            .respond_with(ResponseTemplate::new(200).set_body_json(result_set(
                json!([
                    { "columnName": "TABLE_NAME", "jsonColumnName": "table_name" },
                    { "columnName": "OWNER", "jsonColumnName": "owner" }
                ]),
                json!([
                    { "table_name": "DEPARTMENTS", "owner": "HR" },
                    { "table_name": "EMPLOYEES", "owner": "HR" }
                ]),
            )))
            .mount(&server)
            .await;

        let driver = driver_for(&server);
        let tables = driver.list_tables().await.unwrap();
        assert_eq!(
            tables,
            vec![
                ObjectInfo::new("DEPARTMENTS", "HR"),
                ObjectInfo::new("EMPLOYEES", "HR")
            ]
        );
    }

    #[test]
    fn test_request_serialization() {
        let binds = [Bind::varchar("table_name", "EMP")];
        let body = serde_json::to_value(SqlRequest {
            statement_text: "SELECT 1 FROM DUAL",
            binds: &binds,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "statementText": "SELECT 1 FROM DUAL",
                "binds": [{ "name": "table_name", "data_type": "VARCHAR2", "value": "EMP" }]
            })
        );

        let body = serde_json::to_value(SqlRequest {
            statement_text: "SELECT 1 FROM DUAL",
            binds: &[],
        })
        .unwrap();
        assert!(body.get("binds").is_none());
    }
}
