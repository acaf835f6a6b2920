//! Argument groups and logging setup shared by the stage binaries.

use clap::Args;
use clap::ValueEnum;
use std::path::PathBuf;
use stylemap::pipeline::Algorithm;
use stylemap::pipeline::DataPaths;
use tracing_subscriber::EnvFilter;

/// Where the stage reads and writes its files.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
  /// Directory holding raw_data/, embedding_data/, docs/ and post_script.js
  #[arg(long, default_value = ".")]
  pub base_dir: PathBuf,

  /// Catalog dump flavour, e.g. "masters" or "releases"
  #[arg(long, default_value = "masters")]
  pub search_type: String,

  /// Release date in the dump file name
  #[arg(long, default_value = "20260101")]
  pub dump_version: String,
}

impl DataArgs {
  pub fn paths(&self) -> DataPaths {
    DataPaths::builder()
      .base_dir(self.base_dir.clone())
      .search_type(self.search_type.clone())
      .dump_version(self.dump_version.clone())
      .build()
  }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum AlgorithmArg {
  #[value(name = "Node2Vec")]
  Node2vec,
  #[value(name = "Word2Vec")]
  Word2vec,
}

impl From<AlgorithmArg> for Algorithm {
  fn from(arg: AlgorithmArg) -> Self {
    match arg {
      AlgorithmArg::Node2vec => Algorithm::Node2Vec,
      AlgorithmArg::Word2vec => Algorithm::Word2Vec,
    }
  }
}

/// Log to stderr, filtered by `RUST_LOG` (default: info).
pub fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
    .with_writer(std::io::stderr)
    .init();
}
