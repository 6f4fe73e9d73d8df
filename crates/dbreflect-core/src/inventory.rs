//! Whole-server reflection: every catalog, one schema each.
//!
//! Listing catalogs is all-or-nothing. After that, a failure inside one
//! catalog is logged and recorded on that catalog's entry, and the walk
//! continues with the next catalog.

use crate::{Result, SchemaDriver, Table};
use serde::Serialize;

/// Outcome of reflecting one catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogReflection {
    pub catalog: String,
    pub tables: Vec<Table>,
    /// Set when reflection of this catalog failed; `tables` is then empty
    pub error: Option<String>,
}

impl CatalogReflection {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Reflect `schema` in every catalog the driver can see
#[tracing::instrument(skip(driver), fields(backend = driver.name()))]
pub async fn reflect_catalogs(
    driver: &dyn SchemaDriver,
    schema: &str,
) -> Result<Vec<CatalogReflection>> {
    let catalogs = driver.list_catalogs().await?;
    tracing::info!(count = catalogs.len(), "reflecting catalogs");

    let mut reflections = Vec::with_capacity(catalogs.len());
    for catalog in catalogs {
        let reflection = match driver.list_tables_in_catalog(&catalog, schema).await {
            Ok(tables) => {
                tracing::debug!(catalog = %catalog, tables = tables.len(), "catalog reflected");
                CatalogReflection {
                    catalog,
                    tables,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(catalog = %catalog, error = %e, "skipping catalog after reflection error");
                CatalogReflection {
                    catalog,
                    tables: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };
        reflections.push(reflection);
    }
    Ok(reflections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CatalogConnection, ColumnInfo, ConnectionConfig, ConnectionState, ReflectError,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct FakeDriver {
        config: ConnectionConfig,
        catalogs: Result<Vec<String>>,
        broken: &'static str,
    }

    #[async_trait]
    impl SchemaDriver for FakeDriver {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn config(&self) -> &ConnectionConfig {
            &self.config
        }

        fn state(&self) -> ConnectionState {
            ConnectionState::Connected
        }

        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        fn raw_handle(&self) -> Option<Arc<dyn CatalogConnection>> {
            None
        }

        async fn list_catalogs(&self) -> Result<Vec<String>> {
            match &self.catalogs {
                Ok(names) => Ok(names.clone()),
                Err(e) => Err(ReflectError::Query(e.to_string())),
            }
        }

        async fn list_tables(&self, schema: &str) -> Result<Vec<Table>> {
            self.list_tables_in_catalog(&self.config.database, schema).await
        }

        async fn list_tables_in_catalog(&self, catalog: &str, schema: &str) -> Result<Vec<Table>> {
            if catalog == self.broken {
                return Err(ReflectError::Query(format!("permission denied for {}", catalog)));
            }
            Ok(vec![Table::new(
                format!("{}_{}", catalog, schema),
                vec![ColumnInfo::new("id", "integer").primary()],
            )])
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_catalog_is_skipped_not_fatal() {
        let driver = FakeDriver {
            config: ConnectionConfig::postgres_default(),
            catalogs: Ok(vec!["app".into(), "locked".into(), "audit".into()]),
            broken: "locked",
        };

        let reflections = reflect_catalogs(&driver, "public").await.unwrap();

        let names: Vec<_> = reflections.iter().map(|r| r.catalog.as_str()).collect();
        assert_eq!(names, vec!["app", "locked", "audit"]);
        assert!(reflections[0].is_ok());
        assert_eq!(reflections[0].tables[0].name, "app_public");
        assert!(!reflections[1].is_ok());
        assert!(reflections[1].tables.is_empty());
        assert_eq!(
            reflections[1].error.as_deref(),
            Some("Query error: permission denied for locked")
        );
        assert!(reflections[2].is_ok());
    }

    #[tokio::test]
    async fn test_catalog_listing_failure_aborts() {
        let driver = FakeDriver {
            config: ConnectionConfig::postgres_default(),
            catalogs: Err(ReflectError::Query("relation pg_database does not exist".into())),
            broken: "",
        };

        assert!(reflect_catalogs(&driver, "public").await.is_err());
    }
}
