//! Stage entry points over the on-disk file set.
//!
//! Stages only communicate through files: counting writes the counters, the
//! embedding stages read counters or the dump and write an embedding table,
//! and the visual stage reads the table back.

use crate::catalog::record_tag;
use crate::catalog::GzCatalogReader;
use crate::catalog::StyleCorpus;
use crate::config::Node2VecParams;
use crate::config::ProjectionConfig;
use crate::config::VisualConfig;
use crate::config::Word2VecParams;
use crate::counts;
use crate::counts::CatalogCounters;
use crate::error::Error;
use crate::error::Result;
use crate::graph;
use crate::graph::StyleGraph;
use crate::keyed_vectors::KeyedVectors;
use crate::render::Scene;
use crate::table::EmbeddingTable;
use crate::walk::Node2Vec;
use crate::word2vec::Word2Vec;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;
use tracing::info;
use tracing::warn;
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
  Node2Vec,
  Word2Vec,
}

impl Algorithm {
  pub fn as_str(&self) -> &'static str {
    match self {
      Algorithm::Node2Vec => "Node2Vec",
      Algorithm::Word2Vec => "Word2Vec",
    }
  }
}

impl fmt::Display for Algorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Algorithm {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_lowercase().as_str() {
      "node2vec" => Ok(Algorithm::Node2Vec),
      "word2vec" => Ok(Algorithm::Word2Vec),
      _ => Err(Error::InvalidParameter(format!(
        "unknown algorithm {s:?}, expected Node2Vec or Word2Vec"
      ))),
    }
  }
}

/// Locations of every artifact for one catalog search type.
#[derive(TypedBuilder, Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
  #[builder(default = PathBuf::from("."), setter(into))]
  base_dir: PathBuf,
  #[builder(default = "masters".to_string(), setter(into))]
  search_type: String,
  /// Dump release date, as in `discogs_20260101_masters.xml.gz`.
  #[builder(default = "20260101".to_string(), setter(into))]
  dump_version: String,
}

impl Default for DataPaths {
  fn default() -> Self {
    Self::builder().build()
  }
}

impl DataPaths {
  pub fn base_dir(&self) -> &Path {
    &self.base_dir
  }

  pub fn search_type(&self) -> &str {
    &self.search_type
  }

  pub fn dump_version(&self) -> &str {
    &self.dump_version
  }

  fn embedding_data(&self) -> PathBuf {
    self.base_dir.join("embedding_data")
  }

  pub fn pair_counts(&self) -> PathBuf {
    self.embedding_data().join(format!("pair_counter_{}.json", self.search_type))
  }

  pub fn single_counts(&self) -> PathBuf {
    self.embedding_data().join(format!("single_counter_{}.json", self.search_type))
  }

  pub fn genre_counts(&self) -> PathBuf {
    self.embedding_data().join(format!("max_genre_counter_{}.json", self.search_type))
  }

  pub fn catalog_dump(&self) -> PathBuf {
    self.base_dir.join("raw_data").join(format!(
      "discogs_{}_{}.xml.gz",
      self.dump_version, self.search_type
    ))
  }

  pub fn edge_table(&self) -> PathBuf {
    self
      .embedding_data()
      .join(Algorithm::Node2Vec.as_str())
      .join(format!("edge_{}.csv", self.search_type))
  }

  pub fn graph(&self) -> PathBuf {
    self
      .embedding_data()
      .join(Algorithm::Node2Vec.as_str())
      .join(format!("network_{}.bin", self.search_type))
  }

  pub fn keyed_vectors(&self, algo: Algorithm) -> PathBuf {
    self
      .embedding_data()
      .join(algo.as_str())
      .join(format!("embedding_{}.kv", self.search_type))
  }

  pub fn embedding_table(&self, algo: Algorithm) -> PathBuf {
    self
      .embedding_data()
      .join(algo.as_str())
      .join(format!("embedding_df_{}.csv", self.search_type))
  }

  /// `docs/style_{algo}_{search}_umap.html`, with a `_3d` suffix for 3D.
  pub fn html_output(&self, algo: Algorithm, n_components: usize) -> PathBuf {
    let suffix = if n_components == 3 { "_3d" } else { "" };
    self.base_dir.join("docs").join(format!(
      "style_{algo}_{}_umap{suffix}.html",
      self.search_type
    ))
  }

  pub fn post_script(&self) -> PathBuf {
    self.base_dir.join("post_script.js")
  }
}

/// Count styles, style pairs and style genres over the whole dump and save
/// the three counters.
pub fn count_styles(paths: &DataPaths) -> Result<CatalogCounters> {
  let dump = paths.catalog_dump();
  info!(path = %dump.display(), "counting catalog");
  let counters = CatalogCounters::from_records(GzCatalogReader::open(
    &dump,
    record_tag(paths.search_type()),
  )?)?;
  counts::save_pairs(&paths.pair_counts(), &counters.pairs())?;
  counts::save_singles(&paths.single_counts(), counters.singles())?;
  counts::save_genres(&paths.genre_counts(), counters.genres())?;
  Ok(counters)
}

/// Build the weighted style graph from the saved counters and embed it.
pub fn run_node2vec(paths: &DataPaths, params: &Node2VecParams) -> Result<EmbeddingTable> {
  let started = Instant::now();
  let pairs = counts::load_pairs(&paths.pair_counts())?;
  let singles = counts::load_singles(&paths.single_counts())?;

  let edges = graph::build_edges(&pairs, &singles)?;
  graph::write_edges_csv(&paths.edge_table(), &edges)?;
  let style_graph = StyleGraph::from_edges(&edges);
  style_graph.save(&paths.graph())?;

  let kv = Node2Vec::new(params.clone()).fit(&style_graph)?;
  let table = export_embedding(paths, Algorithm::Node2Vec, &kv)?;
  info!(
    duration_ms = started.elapsed().as_millis(),
    styles = table.len(),
    "node2vec stage complete"
  );
  Ok(table)
}

/// Embed styles from the co-occurrence documents of the dump.
pub fn run_word2vec(paths: &DataPaths, params: &Word2VecParams) -> Result<EmbeddingTable> {
  let started = Instant::now();
  let corpus = StyleCorpus::for_search_type(paths.catalog_dump(), paths.search_type());
  let kv = Word2Vec::new(params.clone()).train(&corpus)?;
  let table = export_embedding(paths, Algorithm::Word2Vec, &kv)?;
  info!(
    duration_ms = started.elapsed().as_millis(),
    styles = table.len(),
    "word2vec stage complete"
  );
  Ok(table)
}

/// Save trained vectors in native and tabular form.
pub fn export_embedding(paths: &DataPaths, algo: Algorithm, kv: &KeyedVectors) -> Result<EmbeddingTable> {
  kv.save(&paths.keyed_vectors(algo))?;
  let table = EmbeddingTable::from_keyed_vectors(kv);
  table.write_csv(&paths.embedding_table(algo))?;
  Ok(table)
}

/// One rendered document.
#[derive(Debug, Clone)]
pub struct RenderJob {
  pub n_components: usize,
  pub visual: VisualConfig,
}

impl RenderJob {
  /// The published pair of pages: a 2D map centred on New Wave with labels
  /// shown, and an unfocused 3D map.
  pub fn published() -> Vec<RenderJob> {
    vec![
      RenderJob {
        n_components: 2,
        visual: VisualConfig {
          fig_width: 1600,
          fig_height: 1200,
          init_style: Some("New Wave".into()),
          init_dragmode: "pan".into(),
          init_margin: Some(20.0),
          init_mode: "markers+text".into(),
          ..Default::default()
        },
      },
      RenderJob {
        n_components: 3,
        visual: VisualConfig {
          fig_width: 1600,
          fig_height: 1200,
          init_margin: Some(10.0),
          ..Default::default()
        },
      },
    ]
  }
}

/// Render the saved embedding table of `algo` once per job. Returns the
/// written paths.
pub fn run_visual(
  paths: &DataPaths,
  algo: Algorithm,
  jobs: &[RenderJob],
  projection: Option<&ProjectionConfig>,
) -> Result<Vec<PathBuf>> {
  let table = EmbeddingTable::read_csv(&paths.embedding_table(algo))?;
  let tags = counts::load_genres(&paths.genre_counts())?.dominant_genres();
  let post_script = load_post_script(&paths.post_script());

  let mut written = Vec::with_capacity(jobs.len());
  for job in jobs {
    let save_path = paths.html_output(algo, job.n_components);
    Scene::builder()
      .table(&table)
      .tags(&tags)
      .n_components(job.n_components)
      .post_script(&post_script)
      .projection(projection)
      .visual(job.visual.clone())
      .build()
      .render(&save_path)?;
    written.push(save_path);
  }
  Ok(written)
}

/// The page script, or an empty script when it cannot be read.
pub fn load_post_script(path: &Path) -> String {
  match std::fs::read_to_string(path) {
    Ok(script) => script,
    Err(err) => {
      warn!(path = %path.display(), error = %err, "post script unavailable; rendering without it");
      String::new()
    }
  }
}
