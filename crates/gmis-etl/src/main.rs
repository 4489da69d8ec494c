//! gmis-etl batch binary.
//!
//! Reads `gmis.toml` (or the path given with `--config`) and `GMIS_*`
//! variables, loads the ontology document, opens the SQLite graph store and
//! runs every pipeline stage. The run report is printed as JSON on stdout.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use gmis_core::ontology::Ontology;
use gmis_etl::{PipelineContext, PipelineSettings, pipeline};
use gmis_store_sqlite::SqliteGraphStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "GMIS knowledge graph ETL")]
struct Cli {
  /// Path to the TOML settings file.
  #[arg(short, long, default_value = "gmis.toml")]
  config: PathBuf,

  /// Keep the existing graph instead of wiping it first.
  #[arg(long)]
  no_clear: bool,

  /// Reload segment files only.
  #[arg(long)]
  only_segments: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let mut settings = PipelineSettings::load(&cli.config)
    .with_context(|| format!("failed to read settings from {:?}", cli.config))?;
  if cli.no_clear {
    settings.clear_before_load = false;
  }
  if cli.only_segments {
    settings.only_segments = true;
  }
  settings.validate().context("invalid settings")?;

  let ontology = Ontology::load(&settings.ontology_path)
    .with_context(|| format!("failed to load ontology {:?}", settings.ontology_path))?;
  tracing::info!(
    companies = ontology.entities().count(),
    accounts = ontology.accounts().count(),
    "ontology loaded"
  );

  let store = SqliteGraphStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;

  let ctx = PipelineContext::new(store, ontology, settings).context("invalid settings")?;
  let outcome = pipeline::run(&ctx).await;
  ctx.into_store().close().await.context("failed to close store")?;
  let report = outcome.context("pipeline failed")?;

  println!(
    "{}",
    serde_json::to_string_pretty(&report).context("failed to render run report")?
  );
  Ok(())
}
