use anyhow::Context;
use clap::Parser;
use std::time::Instant;
use stylemap::pipeline;
use stylemap_cli::init_tracing;
use stylemap_cli::DataArgs;
use tracing::info;

/// Count styles, style pairs and style genres in a gzipped catalog dump.
#[derive(Parser)]
#[command(name = "count_styles")]
struct Cli {
  #[command(flatten)]
  data: DataArgs,
}

fn main() -> anyhow::Result<()> {
  init_tracing();
  let cli = Cli::parse();
  let paths = cli.data.paths();

  let started = Instant::now();
  let counters = pipeline::count_styles(&paths)
    .with_context(|| format!("counting {}", paths.catalog_dump().display()))?;
  info!(
    duration_ms = started.elapsed().as_millis(),
    records = counters.records(),
    styles = counters.singles().len(),
    pairs = counters.pairs().len(),
    "saved counters"
  );
  Ok(())
}
