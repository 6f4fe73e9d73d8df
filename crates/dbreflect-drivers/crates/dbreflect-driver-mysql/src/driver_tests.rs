use crate::{MySqlDriver, queries};
use dbreflect_core::mock::{MockConnector, MockQuery, column_rows, text_rows};
use dbreflect_core::{
    ColumnInfo, ConnectionConfig, ConnectionState, PrimaryKeyPolicy, ReflectError, RetryPolicy,
    Row, SchemaDriver, Table,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// `users` (the descriptor's database) holds two tables, `billing` one.
/// The catalog listing leaks `sys` to exercise client-side exclusion.
fn respond(query: &MockQuery) -> dbreflect_core::Result<Vec<Row>> {
    match query.sql.as_str() {
        queries::LIST_DATABASES => Ok(text_rows("SCHEMA_NAME", &["billing", "sys", "users"])),
        queries::LIST_TABLES => match query.param(0) {
            "users" => Ok(text_rows("TABLE_NAME", &["accounts", "memberships"])),
            "billing" => Ok(text_rows("TABLE_NAME", &["invoices"])),
            "flaky" => Ok(text_rows("TABLE_NAME", &["ghost"])),
            _ => Ok(Vec::new()),
        },
        queries::PRIMARY_KEY_COLUMNS => match query.param(1) {
            "accounts" => Ok(text_rows("COLUMN_NAME", &["id"])),
            "memberships" => Ok(text_rows("COLUMN_NAME", &["account_id", "group_id"])),
            _ => Ok(Vec::new()),
        },
        queries::COLUMNS => match query.param(1) {
            "accounts" => Ok(column_rows(&[("id", "bigint"), ("email", "varchar")])),
            "memberships" => Ok(column_rows(&[
                ("account_id", "bigint"),
                ("group_id", "bigint"),
                ("joined_at", "datetime"),
            ])),
            "invoices" => Ok(column_rows(&[("number", "varchar"), ("total", "decimal")])),
            "ghost" => Err(ReflectError::Query("Table 'flaky.ghost' doesn't exist".into())),
            _ => Ok(Vec::new()),
        },
        other => Err(ReflectError::Query(format!("unexpected query: {}", other))),
    }
}

async fn connected(policy: PrimaryKeyPolicy) -> (MockConnector, MySqlDriver) {
    let connector = MockConnector::new(respond);
    let driver = MySqlDriver::with_connector(
        ConnectionConfig::mysql_default(),
        RetryPolicy::no_retry(),
        Arc::new(connector.clone()),
    )
    .with_primary_key_policy(policy);
    driver.connect().await.unwrap();
    (connector, driver)
}

#[tokio::test]
async fn test_driver_identity_and_state() {
    let (_connector, driver) = connected(PrimaryKeyPolicy::default()).await;

    assert_eq!(driver.name(), "mysql");
    assert_eq!(driver.display_name(), "MySQL");
    assert_eq!(driver.state(), ConnectionState::Connected);
    assert!(driver.raw_handle().is_some());
}

#[tokio::test]
async fn test_list_catalogs_excludes_system_schemas() {
    let (_connector, driver) = connected(PrimaryKeyPolicy::default()).await;

    let catalogs = driver.list_catalogs().await.unwrap();

    assert_eq!(catalogs, vec!["billing", "users"]);
}

#[tokio::test]
async fn test_empty_schema_uses_descriptor_database() {
    let (connector, driver) = connected(PrimaryKeyPolicy::default()).await;

    let tables = driver.list_tables("").await.unwrap();

    assert_eq!(connector.queries()[0].param(0), "users");
    assert_eq!(
        tables[0],
        Table::new(
            "accounts",
            vec![
                ColumnInfo::new("id", "bigint").primary(),
                ColumnInfo::new("email", "varchar"),
            ],
        )
    );
}

#[tokio::test]
async fn test_primary_key_policies() {
    let (_connector, first) = connected(PrimaryKeyPolicy::FirstColumn).await;
    let (_connector, all) = connected(PrimaryKeyPolicy::AllColumns).await;

    let flagged = |tables: &[Table]| -> Vec<String> {
        tables
            .iter()
            .find(|t| t.name == "memberships")
            .unwrap()
            .primary_columns()
            .map(|c| c.name.clone())
            .collect()
    };

    assert_eq!(flagged(&first.list_tables("users").await.unwrap()), vec!["account_id"]);
    assert_eq!(
        flagged(&all.list_tables("users").await.unwrap()),
        vec!["account_id", "group_id"]
    );
}

#[tokio::test]
async fn test_keys_are_fetched_before_columns_per_table() {
    let (connector, driver) = connected(PrimaryKeyPolicy::default()).await;

    driver.list_tables("users").await.unwrap();

    let trace: Vec<(String, String)> = connector
        .queries()
        .iter()
        .map(|q| {
            let kind = match q.sql.as_str() {
                queries::LIST_TABLES => "tables",
                queries::PRIMARY_KEY_COLUMNS => "keys",
                queries::COLUMNS => "columns",
                _ => "other",
            };
            (kind.to_string(), q.param(1).to_string())
        })
        .collect();
    let expected: Vec<(String, String)> = [
        ("tables", ""),
        ("keys", "accounts"),
        ("columns", "accounts"),
        ("keys", "memberships"),
        ("columns", "memberships"),
    ]
    .iter()
    .map(|(k, t)| (k.to_string(), t.to_string()))
    .collect();
    assert_eq!(trace, expected);
}

#[tokio::test]
async fn test_reflection_is_repeatable() {
    let (_connector, driver) = connected(PrimaryKeyPolicy::AllColumns).await;

    let first = driver.list_tables("users").await.unwrap();
    let second = driver.list_tables("users").await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_table_without_key_has_no_primary_column() {
    let (_connector, driver) = connected(PrimaryKeyPolicy::AllColumns).await;

    let tables = driver.list_tables("billing").await.unwrap();

    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].primary_columns().count(), 0);
}

#[tokio::test]
async fn test_catalog_switch_reuses_connection_and_ignores_schema() {
    let (connector, driver) = connected(PrimaryKeyPolicy::default()).await;
    let handle = driver.raw_handle().unwrap();

    let tables = driver.list_tables_in_catalog("billing", "public").await.unwrap();

    assert_eq!(tables[0].name, "invoices");
    assert_eq!(connector.open_attempts(), 1);
    assert!(Arc::ptr_eq(&handle, &driver.raw_handle().unwrap()));
    assert!(connector.queries().iter().all(|q| q.param(0) == "billing"));
}

#[tokio::test]
async fn test_column_failure_propagates() {
    let (_connector, driver) = connected(PrimaryKeyPolicy::default()).await;

    assert!(matches!(driver.list_tables("flaky").await, Err(ReflectError::Query(_))));
}

#[tokio::test]
async fn test_unreachable_server_fails_connect() {
    let connector = MockConnector::unreachable();
    let driver = MySqlDriver::with_connector(
        ConnectionConfig::mysql_default(),
        RetryPolicy::no_retry(),
        Arc::new(connector.clone()),
    );

    let err = driver.connect().await.unwrap_err();

    assert!(err.is_connection());
    assert_eq!(driver.state(), ConnectionState::Failed);
    assert!(matches!(driver.list_catalogs().await, Err(ReflectError::NotConnected)));
}
