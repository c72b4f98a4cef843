//! mssql-admin CLI - SQL Server administration and row tracking.

use clap::{Parser, Subcommand};
use mssql_admin::core::identifier::{column_display_name, column_from_display};
use mssql_admin::mapping::tracking_key;
use mssql_admin::{
    AdminError, BackendKind, Config, ConnectionString, DataAccessResult, OperationContext,
    ProviderRouter, RowTrackingSession, SqlValue, TableData, ALLOWED_DATA_TYPES,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "mssql-admin")]
#[command(about = "SQL Server administration with raw and mapped backends")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Backend for catalog reads: raw (SQL) or mapped (ORM). Overrides admin.mode
    #[arg(long)]
    mode: Option<String>,

    /// Label attached to results and log spans
    #[arg(long, default_value = "cli")]
    source: String,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "warn")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List declared column types accepted by add-column
    Types,

    /// Test connectivity to the server
    HealthCheck,

    /// List user databases
    Databases,

    /// Create a database (no-op if it exists)
    CreateDatabase { name: String },

    /// Drop a database, disconnecting other sessions (no-op if missing)
    DropDatabase { name: String },

    /// List tables of a database
    Tables { db: String },

    /// Create a table with an identity primary key column `Id`
    CreateTable { db: String, table: String },

    /// Drop a table (no-op if missing)
    DropTable { db: String, table: String },

    /// Show column types with key markers
    Columns { db: String, table: String },

    /// Add a nullable column of an allowed type (see `types`)
    AddColumn {
        db: String,
        table: String,
        column: String,
        data_type: String,
    },

    /// Drop a column (no-op if missing)
    DropColumn {
        db: String,
        table: String,
        column: String,
    },

    /// Show the first rows of a table
    Rows {
        db: String,
        table: String,

        /// Maximum rows to fetch (default: admin.max_rows)
        #[arg(long, allow_negative_numbers = true)]
        max_rows: Option<i32>,
    },

    /// Load one row as a tracked entity, edit it in memory and show the diff
    Track {
        db: String,
        table: String,

        /// Primary key value of the row
        #[arg(long)]
        key: String,

        /// COLUMN=VALUE to set; a bare COLUMN gets a demo value
        #[arg(long = "set")]
        sets: Vec<String>,

        /// Revert all changes after showing them
        #[arg(long)]
        revert: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), AdminError> {
    let cli = Cli::parse();

    // Handle types separately (doesn't need a config or a server)
    if let Commands::Types = cli.command {
        if cli.output_json {
            println!("{}", serde_json::to_string_pretty(ALLOWED_DATA_TYPES)?);
        } else {
            for t in ALLOWED_DATA_TYPES {
                println!("{}", t);
            }
        }
        return Ok(());
    }

    setup_logging(&cli.verbosity, &cli.log_format).map_err(AdminError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let mode = match &cli.mode {
        Some(m) => m.parse::<BackendKind>()?,
        None => config.admin.mode,
    };
    let ctx = OperationContext::new(mode, cli.source.clone());
    let base = config.connection.connection_string()?;
    let router = ProviderRouter::default();
    let out = Output {
        json: cli.output_json,
    };

    match cli.command {
        Commands::Types => unreachable!(), // Handled above

        Commands::HealthCheck => {
            router.admin().test_connection(&base).await?;
            out.message("ok", "Connection OK")?;
        }

        Commands::Databases => {
            let result = router.list_databases(&ctx, &base).await?;
            out.list(&result)?;
        }

        Commands::CreateDatabase { name } => {
            let created = router.admin().create_database(&base, &name).await?;
            out.changed(created, &format!("database {}", name), "created", "already exists")?;
        }

        Commands::DropDatabase { name } => {
            let dropped = router.admin().drop_database(&base, &name).await?;
            out.changed(dropped, &format!("database {}", name), "dropped", "does not exist")?;
        }

        Commands::Tables { db } => {
            let result = router.list_tables(&ctx, &base, &db).await?;
            out.list(&result)?;
        }

        Commands::CreateTable { db, table } => {
            let created = router.admin().create_table(&base, &db, &table).await?;
            out.changed(created, &format!("table {}.{}", db, table), "created", "already exists")?;
        }

        Commands::DropTable { db, table } => {
            let dropped = router.admin().drop_table(&base, &db, &table).await?;
            out.changed(dropped, &format!("table {}.{}", db, table), "dropped", "does not exist")?;
        }

        Commands::Columns { db, table } => {
            show_columns(&router, &ctx, &base, &db, &table, &out).await?;
        }

        Commands::AddColumn {
            db,
            table,
            column,
            data_type,
        } => {
            let created = router
                .admin()
                .create_column(&base, &db, &table, &column, &data_type)
                .await?;
            out.changed(
                created,
                &format!("column {}.{}.{}", db, table, column),
                "added",
                "already exists",
            )?;
        }

        Commands::DropColumn { db, table, column } => {
            let dropped = router.admin().drop_column(&base, &db, &table, &column).await?;
            out.changed(
                dropped,
                &format!("column {}.{}.{}", db, table, column),
                "dropped",
                "does not exist",
            )?;
        }

        Commands::Rows { db, table, max_rows } => {
            let max_rows = max_rows.unwrap_or(config.admin.max_rows);
            let result = router.fetch_rows(&ctx, &base, &db, &table, max_rows).await?;
            out.table(&result)?;
        }

        Commands::Track {
            db,
            table,
            key,
            sets,
            revert,
        } => {
            track(&router, &ctx, &base, &db, &table, &key, &sets, revert, &out).await?;
        }
    }

    Ok(())
}

async fn show_columns(
    router: &ProviderRouter,
    ctx: &OperationContext,
    base: &ConnectionString,
    db: &str,
    table: &str,
    out: &Output,
) -> Result<(), AdminError> {
    let types = router.get_column_types(ctx, base, db, table).await?;
    let pk = router.get_primary_key_columns(ctx, base, db, table).await?;
    let fk = router.get_foreign_key_columns(ctx, base, db, table).await?;

    #[derive(Serialize)]
    struct ColumnRow {
        name: String,
        data_type: String,
        primary_key: bool,
        foreign_key: bool,
    }

    let rows = types.map(|types| {
        types
            .iter()
            .map(|c| ColumnRow {
                name: c.name.clone(),
                data_type: c.data_type.clone(),
                primary_key: pk.data.contains(&c.name),
                foreign_key: fk.data.contains(&c.name),
            })
            .collect::<Vec<_>>()
    });

    if out.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("[{}] {}.{}", rows.provider, db, table);
    for c in &rows.data {
        let fk_marker = if c.foreign_key { "  (FK)" } else { "" };
        println!(
            "  {:<40} {}{}",
            column_display_name(&c.name, c.primary_key),
            c.data_type,
            fk_marker
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn track(
    router: &ProviderRouter,
    ctx: &OperationContext,
    base: &ConnectionString,
    db: &str,
    table: &str,
    key: &str,
    sets: &[String],
    revert: bool,
    out: &Output,
) -> Result<(), AdminError> {
    // Column kinds come from a loaded result set, as when a row is picked from a grid
    let sample = router.fetch_rows(ctx, base, db, table, 1).await?;
    let pk = router.get_primary_key_columns(ctx, base, db, table).await?;
    let key_column = tracking_key(&pk.data)?;

    let mut session = router
        .tracking()
        .start_tracking(
            base,
            db,
            table,
            &key_column,
            SqlValue::from(key),
            &sample.data.field_specs(),
        )
        .await?;

    let result = apply_edits(&mut session, &sample.data, sets, revert, out);
    session.dispose().await;
    result
}

fn apply_edits(
    session: &mut RowTrackingSession,
    sample: &TableData,
    sets: &[String],
    revert: bool,
    out: &Output,
) -> Result<(), AdminError> {
    for assignment in sets {
        let (column_text, value_text) = match assignment.split_once('=') {
            Some((c, v)) => (c, Some(v)),
            None => (assignment.as_str(), None),
        };
        let column = column_from_display(column_text)?;

        let value = match value_text {
            Some(text) => {
                let kind = sample
                    .columns
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(column.as_str()))
                    .map(|c| c.kind)
                    .ok_or_else(|| {
                        AdminError::Validation(format!("Unknown column {:?}", column.as_str()))
                    })?;
                kind.coerce(SqlValue::from(text))?
            }
            None => session
                .get(column.as_str())
                .map(SqlValue::demo_value)
                .unwrap_or_else(|| SqlValue::from("DemoValue")),
        };

        session.set_value(column.as_str(), value)?;
    }

    let modified = session.snapshot();

    #[derive(Serialize)]
    struct TrackReport<'a> {
        entity: &'a str,
        values: Vec<(&'a str, &'a SqlValue)>,
        snapshot: &'a mssql_admin::TrackingSnapshot,
        reverted: Option<mssql_admin::TrackingSnapshot>,
    }

    if revert {
        session.revert();
    }
    let reverted = revert.then(|| session.snapshot());

    let entity = session.entity();
    let report = TrackReport {
        entity: entity.model().entity_name(),
        values: entity.values().collect(),
        snapshot: &modified,
        reverted,
    };

    if out.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", report.entity);
    let key_column = entity.model().key_column().as_str();
    for (name, value) in &report.values {
        println!(
            "  {:<40} {}",
            column_display_name(name, name.eq_ignore_ascii_case(key_column)),
            value
        );
    }
    println!("{}", report.snapshot.state_text());
    if let Some(after) = &report.reverted {
        println!("After revert: {}", after.state_text());
    }
    Ok(())
}

/// Renders results as text or JSON.
struct Output {
    json: bool,
}

impl Output {
    fn message(&self, status: &str, text: &str) -> Result<(), AdminError> {
        if self.json {
            println!("{}", serde_json::json!({ "status": status }));
        } else {
            println!("{}", text);
        }
        Ok(())
    }

    fn changed(&self, changed: bool, what: &str, done: &str, noop: &str) -> Result<(), AdminError> {
        if self.json {
            println!(
                "{}",
                serde_json::to_string(&serde_json::json!({ "target": what, "changed": changed }))?
            );
        } else if changed {
            println!("{} {}", capitalize(what), done);
        } else {
            println!("{} {} (nothing to do)", capitalize(what), noop);
        }
        Ok(())
    }

    fn list(&self, result: &DataAccessResult<Vec<String>>) -> Result<(), AdminError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(result)?);
        } else {
            println!("[{}]", result.provider);
            for name in &result.data {
                println!("  {}", name);
            }
        }
        Ok(())
    }

    fn table(&self, result: &DataAccessResult<TableData>) -> Result<(), AdminError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(result)?);
            return Ok(());
        }

        println!("[{}] {} rows", result.provider, result.data.row_count());
        let header: Vec<&str> = result.data.columns.iter().map(|c| c.name.as_str()).collect();
        println!("{}", header.join("\t"));
        for row in &result.data.rows {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            println!("{}", cells.join("\t"));
        }
        Ok(())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Setup logging based on verbosity and format.
fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Unknown verbosity {:?}", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Unknown log format {:?}", other)),
    }

    Ok(())
}
