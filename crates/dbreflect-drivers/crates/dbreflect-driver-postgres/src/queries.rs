//! Catalog queries issued by the PostgreSQL driver

/// Non-template databases
pub const LIST_DATABASES: &str =
    "SELECT datname::text FROM pg_database WHERE datistemplate = false ORDER BY datname";

/// Tables and views of one schema; `$1` is the schema
pub const LIST_TABLES: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = $1 ORDER BY table_name";

/// Primary-key column names in key order; `$1` schema, `$2` table
pub const PRIMARY_KEY_COLUMNS: &str = "SELECT kcu.column_name::text \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name \
      AND tc.table_schema = kcu.table_schema \
      AND tc.table_name = kcu.table_name \
     WHERE tc.constraint_type = 'PRIMARY KEY' \
       AND tc.table_schema = $1 \
       AND tc.table_name = $2 \
     ORDER BY kcu.ordinal_position";

/// `(column_name, data_type)` in declaration order; `$1` schema, `$2` table
pub const COLUMNS: &str = "SELECT column_name::text, data_type::text \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 \
     ORDER BY ordinal_position";
