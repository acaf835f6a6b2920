use anyhow::Context;
use clap::Parser;
use stylemap::pipeline;
use stylemap::pipeline::Algorithm;
use stylemap::pipeline::RenderJob;
use stylemap::ProjectionConfig;
use stylemap_cli::init_tracing;
use stylemap_cli::AlgorithmArg;
use stylemap_cli::DataArgs;

/// Project a saved embedding table and write the interactive 2D and 3D pages.
#[derive(Parser)]
#[command(name = "visual")]
struct Cli {
  #[command(flatten)]
  data: DataArgs,

  /// Which embedding table to render
  #[arg(long = "algo", value_enum, ignore_case = true, default_value = "Node2Vec")]
  algorithm: AlgorithmArg,

  /// Render only the 2D or only the 3D page
  #[arg(long, value_parser = clap::value_parser!(u8).range(2..=3))]
  only: Option<u8>,

  #[arg(long)]
  n_neighbors: Option<usize>,

  #[arg(long)]
  min_dist: Option<f32>,

  /// Layout epochs (default: picked from the table size)
  #[arg(long)]
  n_epochs: Option<usize>,

  #[arg(long, default_value_t = 42)]
  random_state: u64,
}

fn main() -> anyhow::Result<()> {
  init_tracing();
  let cli = Cli::parse();
  let paths = cli.data.paths();
  let algo: Algorithm = cli.algorithm.into();

  let mut projection = ProjectionConfig {
    random_state: cli.random_state,
    ..Default::default()
  };
  if let Some(k) = cli.n_neighbors {
    projection.graph.n_neighbors = k;
  }
  if let Some(d) = cli.min_dist {
    projection.manifold.min_dist = d;
  }
  projection.optimization.n_epochs = cli.n_epochs;

  let jobs: Vec<RenderJob> = RenderJob::published()
    .into_iter()
    .filter(|job| cli.only.map_or(true, |n| job.n_components == n as usize))
    .collect();

  let written = pipeline::run_visual(&paths, algo, &jobs, Some(&projection))
    .with_context(|| format!("rendering {algo} embedding"))?;
  for path in written {
    println!("{}", path.display());
  }
  Ok(())
}
