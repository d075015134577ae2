use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rmx_config::{load_file_config, Overrides, Settings};
use rmx_engine::MergePolicy;
use rmx_model::{RoaExport, SourceMap};
use tracing::debug;

#[derive(Parser)]
#[command(name = "rmx")]
#[command(about = "Reconcile registry route objects against an authoritative ROA export", long_about = None)]
struct Cli {
    /// Force debug-level logging regardless of RUST_LOG.
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an export.json document from registry and authoritative data.
    Merge {
        /// Path to a YAML config file (default: ./roamix.yaml, then /etc/roamix/roamix.yaml).
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Local file containing registry data (repeatable).
        #[arg(short = 'f', long = "file", value_name = "PATH")]
        file: Vec<String>,

        /// URL to fetch containing registry data, http(s) or ftp (repeatable).
        #[arg(short = 'i', long = "irrdb", value_name = "URL")]
        irrdb: Vec<String>,

        /// URL to fetch containing the authoritative ROA export.
        #[arg(short = 'r', long = "rpki", value_name = "URL")]
        rpki: Option<String>,

        /// Write to file instead of stdout.
        #[arg(short = 'o', long = "output", value_name = "PATH")]
        output: Option<String>,

        /// Append covered registry routes instead of dropping them.
        #[arg(long = "unsafe")]
        unsafe_merge: bool,

        /// Emit compact JSON instead of tab-indented.
        #[arg(long)]
        compact: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.cmd {
        Commands::Merge {
            config,
            file,
            irrdb,
            rpki,
            output,
            unsafe_merge,
            compact,
        } => {
            let (file_cfg, cfg_path) = load_file_config(config.as_deref())?;
            if let Some(path) = &cfg_path {
                debug!(config = %path.display(), "loaded config file");
            }
            let settings = Settings::resolve(
                file_cfg,
                Overrides {
                    files: file,
                    urls: irrdb,
                    rpki,
                    refresh_secs: None,
                    unsafe_merge,
                    listen: None,
                    output,
                },
            )?;

            run_merge(&settings, compact).await?;
        }
    }

    Ok(())
}

async fn run_merge(settings: &Settings, compact: bool) -> Result<()> {
    let client = reqwest::Client::new();

    let sources = rmx_irr::build_sources(&settings.files, &settings.urls, &client);
    let routes = rmx_irr::acquire_sources(sources, settings.refresh)
        .await
        .context("registry read")?;
    log_depth_stats(&routes);

    let roas = rmx_rpki::fetch_export(&client, &settings.rpki)
        .await
        .context("authoritative export fetch")?;
    debug!(roas = roas.len(), "authoritative export parsed");

    let policy = if settings.unsafe_merge {
        MergePolicy::Unsafe
    } else {
        MergePolicy::Safe
    };
    let mut results = rmx_engine::merge(&roas, &routes, policy).context("reconcile")?;
    rmx_engine::sort_canonical(&mut results);
    debug!(roas = results.len(), "new total roas");

    let export = RoaExport::new(results);
    let encoded = if compact {
        export.to_json()
    } else {
        export.to_json_pretty()
    }
    .context("export encoding")?;

    match &settings.output {
        Some(path) => {
            std::fs::write(path, &encoded)
                .with_context(|| format!("write output file '{path}'"))?;
        }
        None => println!("{encoded}"),
    }

    Ok(())
}

/// All tracing output goes to stderr so stdout stays pure export JSON.
fn init_tracing(debug: bool) {
    let filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Registry multiplicity histogram, logged at debug level: for each distinct
/// prefix, how many origin declarations it has across all sources, then how
/// many prefixes share each declaration count.
fn log_depth_stats(routes: &SourceMap) {
    let mut declarations: HashMap<String, usize> = HashMap::new();
    for source_routes in routes.values() {
        for route in source_routes {
            *declarations.entry(route.prefix.to_string()).or_default() += 1;
        }
    }
    debug!(routes = declarations.len(), "registry parsed total");

    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for depth in declarations.values() {
        *histogram.entry(*depth).or_default() += 1;
    }
    for (depth, count) in histogram {
        debug!(depth, count, "registry depth stats");
    }
}
