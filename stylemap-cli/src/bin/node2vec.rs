use anyhow::Context;
use clap::Parser;
use stylemap::pipeline;
use stylemap::Node2VecParams;
use stylemap_cli::init_tracing;
use stylemap_cli::DataArgs;

/// Embed styles with biased random walks over the co-occurrence graph.
///
/// Reads the pair and singleton counters written by count_styles.
#[derive(Parser)]
#[command(name = "node2vec")]
struct Cli {
  #[command(flatten)]
  data: DataArgs,

  #[arg(long, default_value_t = 32)]
  dimensions: usize,

  #[arg(long, default_value_t = 80)]
  walk_length: usize,

  /// Walks started from every node
  #[arg(long, default_value_t = 10)]
  num_walks: usize,

  /// Return parameter
  #[arg(long, default_value_t = 1.0)]
  p: f64,

  /// In-out parameter
  #[arg(long, default_value_t = 1.0)]
  q: f64,

  /// Threads for walk generation
  #[arg(long, default_value_t = 1)]
  workers: usize,

  /// Skip-gram context window over the walks
  #[arg(long, default_value_t = 10)]
  window: usize,

  #[arg(long, default_value_t = 5)]
  epochs: usize,

  #[arg(long, default_value_t = 42)]
  seed: u64,
}

fn main() -> anyhow::Result<()> {
  init_tracing();
  let cli = Cli::parse();
  let paths = cli.data.paths();

  let defaults = Node2VecParams::default();
  let params = Node2VecParams {
    dimensions: cli.dimensions,
    walk_length: cli.walk_length,
    num_walks: cli.num_walks,
    p: cli.p,
    q: cli.q,
    workers: cli.workers,
    word2vec: stylemap::Word2VecParams {
      window: cli.window,
      epochs: cli.epochs,
      seed: cli.seed,
      ..defaults.word2vec.clone()
    },
    ..defaults
  };

  let table = pipeline::run_node2vec(&paths, &params).context("node2vec stage failed")?;
  println!(
    "{} styles embedded in {} dimensions -> {}",
    table.len(),
    table.dimensions(),
    paths.embedding_table(pipeline::Algorithm::Node2Vec).display()
  );
  Ok(())
}
