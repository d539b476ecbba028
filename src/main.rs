//! Command-line front end for inspecting and restoring an APN table.

use anyhow::{Context, Result};
use apnstore::lookup::{StaticCarrierIdentity, StaticDefaults};
use apnstore::prelude::*;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "apnstore")]
#[command(about = "APN table merge, precedence and restore tool")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    inputs: Inputs,

    /// Write JSON output to this file instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Factory default APNs (JSON array of records)
    #[arg(long, env = "APNSTORE_DEFAULTS")]
    defaults: Option<PathBuf>,

    /// Rows already in the table (JSON array of records)
    #[arg(long)]
    rows: Option<PathBuf>,

    /// Carrier identity of the device (JSON)
    #[arg(long)]
    identity: Option<PathBuf>,

    /// Provider configuration (JSON)
    #[arg(long, env = "APNSTORE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    General,
    Dpc,
    Filtered,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::General => Scope::General,
            ScopeArg::Dpc => Scope::Dpc,
            ScopeArg::Filtered => Scope::Filtered,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List visible rows of a scope
    List {
        #[arg(long, value_enum, default_value = "general")]
        scope: ScopeArg,
        /// Only rows belonging to this subscription
        #[arg(long)]
        subscription: Option<i32>,
    },
    /// Best APN candidates for the SIM of a subscription
    SimList {
        #[arg(long, default_value_t = 0)]
        subscription: i32,
    },
    /// Restore factory defaults and print the report and resulting table
    Restore {
        #[arg(long, default_value_t = 0)]
        subscription: i32,
    },
    /// Rewrite legacy integer MCC/MNC rows and print the resulting table
    Migrate,
}

#[derive(Serialize)]
struct RestoreOutput {
    report: RestoreReport,
    rows: Vec<ApnRecord>,
}

fn build_provider(inputs: &Inputs) -> Result<ApnProvider> {
    let config = match &inputs.config {
        Some(path) => ProviderConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ProviderConfig::default(),
    };

    let defaults = match &inputs.defaults {
        Some(path) => StaticDefaults::from_json_file(path)
            .with_context(|| format!("loading defaults {}", path.display()))?,
        None => StaticDefaults::default(),
    };

    let identity = match &inputs.identity {
        Some(path) => StaticCarrierIdentity::from_json_file(path)
            .with_context(|| format!("loading identity {}", path.display()))?,
        None => StaticCarrierIdentity::new(1),
    };

    let store = match &inputs.rows {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading rows {}", path.display()))?;
            let rows: Vec<ApnRecord> = serde_json::from_str(&text)?;
            InMemoryApnStore::with_rows(rows)?
        }
        None => InMemoryApnStore::new(),
    };

    tracing::info!(defaults = defaults.len(), "apnstore v{}", env!("CARGO_PKG_VERSION"));
    Ok(ApnProvider::new(
        config,
        Arc::new(store),
        Arc::new(identity),
        Arc::new(defaults),
    )?)
}

async fn all_rows(provider: &ApnProvider, caller: &Caller) -> Result<Vec<ApnRecord>> {
    Ok(provider
        .query(caller, Target::table(Scope::General), &Predicate::All, Order::IdAscending)
        .await?)
}

/// Replace `path` atomically with the serialized value.
fn write_atomically(path: &Path, json: &str) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => write_atomically(path, &json),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("APNSTORE_LOG")
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let provider = build_provider(&cli.inputs)?;
    let caller = Caller::system();
    let output = cli.output.as_deref();

    match cli.command {
        Commands::List { scope, subscription } => {
            let target = match subscription {
                Some(sub) => Target::subscription(scope.into(), SubscriptionId(sub)),
                None => Target::table(scope.into()),
            };
            let rows = provider
                .query(&caller, target, &Predicate::All, Order::IdAscending)
                .await?;
            emit(&rows, output)
        }
        Commands::SimList { subscription } => {
            let rows = provider.sim_apn_list(&caller, SubscriptionId(subscription)).await?;
            emit(&rows, output)
        }
        Commands::Restore { subscription } => {
            let report = provider
                .restore_to_default(&caller, SubscriptionId(subscription))
                .await?;
            let rows = all_rows(&provider, &caller).await?;
            emit(&RestoreOutput { report, rows }, output)
        }
        Commands::Migrate => {
            let migrated = provider.migrate_all(&caller).await?;
            tracing::info!(migrated, "migration finished");
            emit(&all_rows(&provider, &caller).await?, output)
        }
    }
}
