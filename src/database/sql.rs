//! Catalog statements and row limiting.

/// Oracle-maintained schemas hidden from the catalog listings.
pub const SYSTEM_OWNERS: &[&str] = &["SYS", "SYSTEM", "CTXSYS", "MDSYS", "OLAPSYS", "WMSYS"];

/// Column metadata lookup; binds `:table_name`.
pub const DESCRIBE_TABLE_SQL: &str = "SELECT column_name, data_type, nullable, data_default, column_id \
FROM all_tab_columns \
WHERE table_name = UPPER(:table_name) \
ORDER BY column_id";

pub const LIST_TABLES_SQL: &str = "SELECT table_name, owner \
FROM all_tables \
WHERE owner NOT IN ('SYS', 'SYSTEM', 'CTXSYS', 'MDSYS', 'OLAPSYS', 'WMSYS') \
ORDER BY owner, table_name";

pub const LIST_VIEWS_SQL: &str = "SELECT view_name, owner \
FROM all_views \
WHERE owner NOT IN ('SYS', 'SYSTEM', 'CTXSYS', 'MDSYS', 'OLAPSYS', 'WMSYS') \
ORDER BY owner, view_name";

pub const PING_SQL: &str = "SELECT 1 FROM DUAL";

/// Wrap `query` so at most `limit` rows come back.
///
/// Left alone when the query already mentions `ROWNUM` or `limit` is zero.
pub fn apply_row_limit(query: &str, limit: usize) -> String {
    if limit == 0 || query.to_uppercase().contains("ROWNUM") {
        return query.to_string();
    }
    format!("SELECT * FROM ({query}) WHERE ROWNUM <= {limit}")
}
