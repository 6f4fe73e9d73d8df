//! Rendering of reflection results

use clap::ValueEnum;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table as ComfyTable};
use dbreflect_core::{CatalogReflection, Table};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

fn new_table(header: Vec<&str>) -> ComfyTable {
    let mut table = ComfyTable::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// One grid per reflected table: column, type, primary-key marker
pub fn render_tables(tables: &[Table]) -> String {
    if tables.is_empty() {
        return "(no tables)".to_string();
    }

    let mut out = Vec::with_capacity(tables.len());
    for table in tables {
        let mut grid = new_table(vec!["Column", "Type", "PK"]);
        for column in &table.columns {
            grid.add_row(vec![
                column.name.as_str(),
                column.data_type.as_str(),
                if column.is_primary { "yes" } else { "" },
            ]);
        }
        out.push(format!("{}\n{}", table.name, grid));
    }
    out.join("\n\n")
}

pub fn render_catalogs(catalogs: &[String]) -> String {
    let mut grid = new_table(vec!["Catalog"]);
    for catalog in catalogs {
        grid.add_row(vec![catalog.as_str()]);
    }
    grid.to_string()
}

pub fn render_inventory(reflections: &[CatalogReflection]) -> String {
    reflections
        .iter()
        .map(|reflection| match &reflection.error {
            Some(error) => format!("== {} (skipped: {})", reflection.catalog, error),
            None => format!(
                "== {}\n{}",
                reflection.catalog,
                render_tables(&reflection.tables)
            ),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
