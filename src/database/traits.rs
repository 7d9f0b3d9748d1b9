//! Database driver trait.

use crate::database::result::{ColumnDescription, ObjectInfo, QueryResult};
use crate::error::DbResult;
use async_trait::async_trait;

/// Async Oracle driver.
///
/// Implementations: [`OrdsDriver`](crate::database::OrdsDriver). Tests use
/// in-memory doubles.
#[async_trait]
pub trait OracleDriver: Send + Sync {
    /// Returns the driver name (e.g., "ords").
    fn name(&self) -> &'static str;

    /// Round-trips a trivial statement to confirm the database is reachable.
    async fn ping(&self) -> DbResult<()>;

    /// Executes a SQL statement that has already passed validation.
    ///
    /// Row limiting is the caller's job; see
    /// [`apply_row_limit`](crate::database::apply_row_limit).
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Oracle`](crate::error::DatabaseError::Oracle)
    /// for ORA- errors and
    /// [`DatabaseError::Timeout`](crate::error::DatabaseError::Timeout) when
    /// the query timeout elapses.
    async fn execute_query(&self, query: &str) -> DbResult<QueryResult>;

    /// Column metadata for a table visible to the connected user, ordered by
    /// column id. An empty vector means the table is missing or not visible.
    async fn describe_table(&self, table_name: &str) -> DbResult<Vec<ColumnDescription>>;

    /// Tables outside the Oracle-maintained schemas.
    async fn list_tables(&self) -> DbResult<Vec<ObjectInfo>>;

    /// Views outside the Oracle-maintained schemas.
    async fn list_views(&self) -> DbResult<Vec<ObjectInfo>>;
}
