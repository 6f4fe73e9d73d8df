//! Building blocks shared by the dialect reflection algorithms

use crate::{ColumnInfo, Result, Row};
use serde::{Deserialize, Serialize};

/// How a table's primary-key column list is mapped onto its columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKeyPolicy {
    /// Only the column named by the first key entry is flagged.
    ///
    /// Members of a composite key after the first stay unflagged.
    #[default]
    FirstColumn,
    /// Every column in the key set is flagged
    AllColumns,
}

impl PrimaryKeyPolicy {
    /// Whether `column` is flagged primary given the ordered key list.
    ///
    /// An empty key list flags nothing.
    pub fn is_primary(&self, column: &str, keys: &[String]) -> bool {
        match self {
            PrimaryKeyPolicy::FirstColumn => keys.first().is_some_and(|key| key == column),
            PrimaryKeyPolicy::AllColumns => keys.iter().any(|key| key == column),
        }
    }
}

/// Scan the first column of every row as text
pub fn scan_names(rows: &[Row]) -> Result<Vec<String>> {
    rows.iter().map(|row| row.get_string(0)).collect()
}

/// Scan `(column_name, data_type)` rows and flag primary-key columns
pub fn scan_columns(
    rows: &[Row],
    primary_keys: &[String],
    policy: PrimaryKeyPolicy,
) -> Result<Vec<ColumnInfo>> {
    rows.iter()
        .map(|row| {
            let name = row.get_string(0)?;
            let data_type = row.get_string(1)?;
            let is_primary = policy.is_primary(&name, primary_keys);
            Ok(ColumnInfo {
                name,
                data_type,
                is_primary,
            })
        })
        .collect()
}
