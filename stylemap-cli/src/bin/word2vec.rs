use anyhow::Context;
use clap::Parser;
use clap::ValueEnum;
use stylemap::pipeline;
use stylemap::pipeline::Algorithm;
use stylemap::Architecture;
use stylemap::Word2VecParams;
use stylemap_cli::init_tracing;
use stylemap_cli::DataArgs;

/// Embed styles by training on the style list of every catalog record.
#[derive(Parser)]
#[command(name = "word2vec")]
struct Cli {
  #[command(flatten)]
  data: DataArgs,

  #[arg(long, default_value_t = 32)]
  vector_size: usize,

  #[arg(long, default_value_t = 10)]
  window: usize,

  /// Styles seen on fewer records are left out
  #[arg(long, default_value_t = 5)]
  min_count: u64,

  #[arg(long, default_value_t = 5)]
  epochs: usize,

  #[arg(long, value_enum, default_value = "cbow")]
  architecture: ArchitectureArg,

  #[arg(long, default_value_t = 42)]
  seed: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ArchitectureArg {
  Cbow,
  SkipGram,
}

fn main() -> anyhow::Result<()> {
  init_tracing();
  let cli = Cli::parse();
  let paths = cli.data.paths();

  let params = Word2VecParams {
    vector_size: cli.vector_size,
    window: cli.window,
    min_count: cli.min_count,
    epochs: cli.epochs,
    architecture: match cli.architecture {
      ArchitectureArg::Cbow => Architecture::Cbow,
      ArchitectureArg::SkipGram => Architecture::SkipGram,
    },
    seed: cli.seed,
    ..Default::default()
  };

  let table = pipeline::run_word2vec(&paths, &params)
    .with_context(|| format!("training on {}", paths.catalog_dump().display()))?;
  println!(
    "{} styles embedded in {} dimensions -> {}",
    table.len(),
    table.dimensions(),
    paths.embedding_table(Algorithm::Word2Vec).display()
  );
  Ok(())
}
