//! Catalog queries issued by the MySQL driver

/// Schemas that belong to the server itself and are never listed as catalogs
pub const SYSTEM_SCHEMAS: [&str; 4] = ["information_schema", "mysql", "performance_schema", "sys"];

pub const LIST_DATABASES: &str = "SELECT schema_name FROM information_schema.schemata \
     WHERE schema_name NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys') \
     ORDER BY schema_name";

/// Tables and views of one schema; `?` is the schema
pub const LIST_TABLES: &str = "SELECT table_name FROM information_schema.tables \
     WHERE table_schema = ? ORDER BY table_name";

/// Primary-key column names in key order; schema, then table
pub const PRIMARY_KEY_COLUMNS: &str = "SELECT column_name FROM information_schema.key_column_usage \
     WHERE table_schema = ? AND table_name = ? AND constraint_name = 'PRIMARY' \
     ORDER BY ordinal_position";

/// `(column_name, data_type)` in declaration order; schema, then table
pub const COLUMNS: &str = "SELECT column_name, data_type FROM information_schema.columns \
     WHERE table_schema = ? AND table_name = ? \
     ORDER BY ordinal_position";

pub fn is_system_schema(name: &str) -> bool {
    SYSTEM_SCHEMAS.iter().any(|s| s.eq_ignore_ascii_case(name))
}
