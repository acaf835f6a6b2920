use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the embedding and visualization stages.
///
/// Precondition violations (inconsistent counters, an unsupported target
/// dimensionality, ...) are fatal for the stage that hits them; nothing here
/// is retried.
#[derive(Debug, Error)]
pub enum Error {
  #[error("style {0:?} appears in a pair but has no singleton count")]
  MissingSingleton(String),

  #[error("occurrence count of {0} is zero")]
  ZeroCount(String),

  #[error("pair ({a:?}, {b:?}) occurs {pair} times but {label:?} only occurs {single} times")]
  InconsistentCounts {
    a: String,
    b: String,
    label: String,
    pair: u64,
    single: u64,
  },

  #[error("invalid parameter: {0}")]
  InvalidParameter(String),

  #[error("n_components must be 2 or 3, got {0}")]
  InvalidComponents(usize),

  #[error("init_dragmode must be 'zoom' or 'pan', got {0:?}")]
  InvalidDragMode(String),

  #[error("projection needs at least {min} rows, got {got}")]
  TooFewSamples { got: usize, min: usize },

  #[error("no token occurs at least {0} times")]
  EmptyVocabulary(u64),

  #[error("malformed embedding table: {0}")]
  MalformedTable(String),

  #[error("{path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("xml: {0}")]
  Xml(#[from] quick_xml::Error),

  #[error("csv: {0}")]
  Csv(#[from] csv::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("bincode: {0}")]
  Bincode(#[from] bincode::Error),

  #[error("thread pool: {0}")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
  /// Attach `path` to an I/O error, for use with `map_err`.
  pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
