use crate::catalog::tests::write_gz;
use crate::catalog::tests::MASTERS;
use crate::config::Node2VecParams;
use crate::config::OptimizationParams;
use crate::config::ProjectionConfig;
use crate::config::Word2VecParams;
use crate::counts;
use crate::error::Error;
use crate::graph;
use crate::graph::StyleGraph;
use crate::keyed_vectors::KeyedVectors;
use crate::pipeline;
use crate::pipeline::Algorithm;
use crate::pipeline::DataPaths;
use crate::pipeline::RenderJob;
use crate::table::EmbeddingTable;
use std::fs;
use tempfile::TempDir;

/// A working directory holding the sample dump at its expected location.
fn workspace() -> (TempDir, DataPaths) {
  let dir = tempfile::tempdir().unwrap();
  let paths = DataPaths::builder().base_dir(dir.path()).build();
  let dump = paths.catalog_dump();
  let raw = dump.parent().unwrap();
  fs::create_dir_all(raw).unwrap();
  write_gz(raw, dump.file_name().unwrap().to_str().unwrap(), MASTERS);
  (dir, paths)
}

fn small_node2vec() -> Node2VecParams {
  let defaults = Node2VecParams::default();
  Node2VecParams {
    dimensions: 8,
    walk_length: 12,
    num_walks: 4,
    workers: 2,
    word2vec: Word2VecParams {
      epochs: 2,
      window: 3,
      ..defaults.word2vec.clone()
    },
    ..defaults
  }
}

fn quick_projection() -> ProjectionConfig {
  ProjectionConfig {
    optimization: OptimizationParams {
      n_epochs: Some(50),
      ..Default::default()
    },
    ..Default::default()
  }
}

#[test]
fn counting_stage_saves_all_counters() {
  let (_dir, paths) = workspace();
  let counters = pipeline::count_styles(&paths).unwrap();
  assert_eq!(counters.records(), 5);

  let singles = counts::load_singles(&paths.single_counts()).unwrap();
  assert_eq!(singles["Techno"], 2);
  assert_eq!(singles["Deep_House"], 1);
  assert_eq!(singles["Jungle_&_Breaks"], 1);

  let pairs = counts::load_pairs(&paths.pair_counts()).unwrap();
  assert_eq!(pairs, counters.pairs());
  assert!(pairs.contains(&counts::OccurrencePair::new("Deep_House", "Techno", 1)));

  let dominant = counts::load_genres(&paths.genre_counts()).unwrap().dominant_genres();
  assert_eq!(dominant["Punk"], "Rock");
  assert_eq!(dominant["Techno"], "Electronic");
  assert!(!dominant.contains_key("Drum_n_Bass"));
}

#[test]
fn node2vec_pipeline_end_to_end() {
  let (_dir, paths) = workspace();
  pipeline::count_styles(&paths).unwrap();

  let table = pipeline::run_node2vec(&paths, &small_node2vec()).unwrap();
  // Punk never shares a record with another style, so it has no edges.
  assert_eq!(table.len(), 6);
  assert_eq!(table.dimensions(), 8);
  assert!(!table.labels().iter().any(|l| l == "Punk"));

  let edges = graph::read_edges_csv(&paths.edge_table()).unwrap();
  assert_eq!(edges.len(), 10);
  let style_graph = StyleGraph::load(&paths.graph()).unwrap();
  assert_eq!(style_graph.node_count(), 6);
  // Techno is on two records, one of them shared with Deep House.
  assert_eq!(style_graph.weight("Techno", "Deep_House"), Some(0.5));
  assert_eq!(style_graph.weight("Deep_House", "Techno"), Some(1.0));

  let kv = KeyedVectors::load(&paths.keyed_vectors(Algorithm::Node2Vec)).unwrap();
  assert_eq!(kv.index_to_key(), table.labels());
  let reread = EmbeddingTable::read_csv(&paths.embedding_table(Algorithm::Node2Vec)).unwrap();
  assert_eq!(reread, table);

  let written = pipeline::run_visual(
    &paths,
    Algorithm::Node2Vec,
    &RenderJob::published(),
    Some(&quick_projection()),
  )
  .unwrap();
  assert_eq!(
    written,
    vec![
      paths.html_output(Algorithm::Node2Vec, 2),
      paths.html_output(Algorithm::Node2Vec, 3),
    ]
  );
  for path in &written {
    let html = fs::read_to_string(path).unwrap();
    assert!(html.contains("Plotly.newPlot"));
    assert!(html.contains("var search_data"));
    assert!(html.contains("Deep House"));
  }
  let planar = fs::read_to_string(&written[0]).unwrap();
  assert!(planar.contains("xaxis"));
  let spatial = fs::read_to_string(&written[1]).unwrap();
  assert!(spatial.contains("zaxis"));
}

#[test]
fn word2vec_pipeline_trains_on_record_documents() {
  let (_dir, paths) = workspace();
  let params = Word2VecParams {
    vector_size: 8,
    min_count: 1,
    epochs: 3,
    ..Default::default()
  };
  let table = pipeline::run_word2vec(&paths, &params).unwrap();

  // Single-style records are skipped, so Punk never enters the vocabulary.
  assert_eq!(table.len(), 6);
  assert_eq!(table.dimensions(), 8);
  assert_eq!(table.labels()[0], "Techno");

  let kv = KeyedVectors::load(&paths.keyed_vectors(Algorithm::Word2Vec)).unwrap();
  assert_eq!(kv.len(), 6);
  assert!(paths.embedding_table(Algorithm::Word2Vec).exists());
}

#[test]
fn repeated_runs_write_identical_tables() {
  let (_dir, paths) = workspace();
  pipeline::count_styles(&paths).unwrap();
  let first = pipeline::run_node2vec(&paths, &small_node2vec()).unwrap();
  let second = pipeline::run_node2vec(&paths, &small_node2vec()).unwrap();
  assert_eq!(first, second);
}

#[test]
fn stages_report_missing_inputs() {
  let dir = tempfile::tempdir().unwrap();
  let paths = DataPaths::builder().base_dir(dir.path()).build();

  assert!(matches!(pipeline::count_styles(&paths), Err(Error::Io { .. })));
  assert!(matches!(
    pipeline::run_node2vec(&paths, &Node2VecParams::default()),
    Err(Error::Io { .. })
  ));
  assert!(matches!(
    pipeline::run_visual(&paths, Algorithm::Word2Vec, &RenderJob::published(), None),
    Err(Error::Io { .. })
  ));
}
