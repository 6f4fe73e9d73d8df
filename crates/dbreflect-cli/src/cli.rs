//! dbreflect CLI - reflect tables, columns and primary keys of a database server

mod logging;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use dbreflect_core::{ReflectConfig, SchemaDriver, reflect_catalogs};
use dbreflect_drivers::create_driver;
use logging::LogFormat;
use output::OutputFormat;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "dbreflect")]
#[command(about = "Reflect database schemas: catalogs, tables, columns and primary keys")]
#[command(version)]
struct Cli {
    /// Path to a TOML settings file
    #[arg(short, long, env = "DBREFLECT_CONFIG")]
    config: Option<PathBuf>,

    /// Backend key: postgres, postgresql, pg, mysql, mariadb
    #[arg(short, long, env = "DBREFLECT_BACKEND", default_value = "postgres")]
    backend: String,

    /// Schema to reflect (dialect default when omitted)
    #[arg(short, long, default_value = "")]
    schema: String,

    /// Reflect only this catalog instead of every catalog on the server
    #[arg(long)]
    catalog: Option<String>,

    /// Only list catalogs
    #[arg(long, conflicts_with = "catalog")]
    list_catalogs: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    verbosity: String,
}

fn load_settings(path: Option<&PathBuf>) -> Result<ReflectConfig> {
    match path {
        Some(path) => ReflectConfig::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => Ok(ReflectConfig::default()),
    }
}

async fn reflect(cli: &Cli, driver: &dyn SchemaDriver) -> Result<String> {
    if cli.list_catalogs {
        let catalogs = driver.list_catalogs().await.context("failed to list catalogs")?;
        return match cli.format {
            OutputFormat::Table => Ok(output::render_catalogs(&catalogs)),
            OutputFormat::Json => output::to_json(&catalogs),
        };
    }

    if let Some(catalog) = &cli.catalog {
        let tables = driver
            .list_tables_in_catalog(catalog, &cli.schema)
            .await
            .with_context(|| format!("failed to reflect catalog {}", catalog))?;
        return match cli.format {
            OutputFormat::Table => Ok(output::render_tables(&tables)),
            OutputFormat::Json => output::to_json(&tables),
        };
    }

    let reflections = reflect_catalogs(driver, &cli.schema)
        .await
        .context("failed to reflect catalogs")?;
    match cli.format {
        OutputFormat::Table => Ok(output::render_inventory(&reflections)),
        OutputFormat::Json => output::to_json(&reflections),
    }
}

async fn run(cli: Cli) -> Result<()> {
    logging::init(&cli.verbosity, cli.log_format)?;

    let settings = load_settings(cli.config.as_ref())?;
    let driver = create_driver(&cli.backend, &settings);
    tracing::info!(
        backend = driver.name(),
        host = %driver.config().host,
        database = %driver.config().database,
        "starting reflection"
    );

    driver
        .connect()
        .await
        .with_context(|| format!("could not connect to {}", driver.display_name()))?;

    let result = reflect(&cli, driver.as_ref()).await;
    if let Err(e) = driver.close().await {
        tracing::warn!(error = %e, "failed to close connection");
    }

    println!("{}", result?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
