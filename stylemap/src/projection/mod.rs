//! Manifold projection of an embedding table to 2 or 3 dimensions.
//!
//! The projection runs in two phases:
//!
//! * [`ProjectionEngine::learn_manifold`] builds the exact k-nearest-neighbour
//!   graph and turns it into a symmetric fuzzy graph. This phase is
//!   deterministic and independent of the output dimensionality.
//! * [`ProjectionEngine::embed`] lays the fuzzy graph out in the target
//!   dimensionality by seeded stochastic gradient descent.
//!
//! Identical input and configuration give identical coordinates.

pub mod constants;
mod find_ab_params;
mod fuzzy_simplicial_set;
mod knn;
mod layout;
mod metric;
mod smooth_knn_dist;

pub use find_ab_params::find_ab_params;
pub use fuzzy_simplicial_set::SparseMat;

use crate::config::ProjectionConfig;
use crate::error::Error;
use crate::error::Result;
use crate::table::EmbeddingTable;
use crate::table::ReducedCoordinates;
use constants::DISCONNECTED;
use constants::MIN_SAMPLES;
use fuzzy_simplicial_set::FuzzySimplicialSet;
use knn::NearestNeighbors;
use layout::SimplicialSetEmbedding;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use serde::Deserialize;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Fuzzy graph and local geometry learned from the input rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedManifold {
  /// `graph[i, j]` is the membership strength of the edge between rows i
  /// and j.
  pub(crate) graph: SparseMat,
  pub(crate) sigmas: Array1<f32>,
  /// Distance to each row's nearest neighbour.
  pub(crate) rhos: Array1<f32>,
  /// Parameters of the curve `1 / (1 + a * x^(2b))`.
  pub(crate) a: f32,
  pub(crate) b: f32,
}

#[derive(Debug, Clone)]
pub struct ProjectionEngine {
  config: ProjectionConfig,
}

impl ProjectionEngine {
  pub fn new(config: ProjectionConfig) -> Result<Self> {
    validate(&config)?;
    Ok(Self { config })
  }

  pub fn config(&self) -> &ProjectionConfig {
    &self.config
  }

  pub fn learn_manifold(&self, data: ArrayView2<f32>) -> Result<LearnedManifold> {
    let n_samples = data.nrows();
    if n_samples < MIN_SAMPLES {
      return Err(Error::TooFewSamples {
        got: n_samples,
        min: MIN_SAMPLES,
      });
    }
    let config = &self.config;

    let mut n_neighbors = config.graph.n_neighbors;
    if n_neighbors >= n_samples {
      warn!(
        n_neighbors,
        n_samples,
        "n_neighbors is larger than the dataset; using n_samples - 1"
      );
      n_neighbors = n_samples - 1;
    }

    let (a, b) = match (config.manifold.a, config.manifold.b) {
      (Some(a), Some(b)) => (a, b),
      _ => find_ab_params(config.manifold.spread, config.manifold.min_dist),
    };
    debug!(a, b, "curve parameters");

    let started = Instant::now();
    let (mut knn_indices, knn_dists) = NearestNeighbors::builder()
      .data(data)
      .k(n_neighbors)
      .metric(config.metric)
      .build()
      .exec();
    info!(
      duration_ms = started.elapsed().as_millis(),
      n_samples,
      n_neighbors,
      "nearest neighbours complete"
    );

    let disconnection_distance = config
      .graph
      .disconnection_distance
      .unwrap_or_else(|| config.metric.disconnection_threshold());
    let mut edges_removed = 0;
    for ((i, j), idx) in knn_indices.indexed_iter_mut() {
      if j > 0 && knn_dists[(i, j)] >= disconnection_distance {
        *idx = DISCONNECTED;
        edges_removed += 1;
      }
    }

    let (graph, sigmas, rhos) = FuzzySimplicialSet::builder()
      .knn_indices(knn_indices.view())
      .knn_dists(knn_dists.view())
      .set_op_mix_ratio(config.graph.set_op_mix_ratio)
      .local_connectivity(config.graph.local_connectivity)
      .build()
      .exec();

    let vertices_disconnected = graph
      .outer_iterator()
      .filter(|row| row.data().iter().sum::<f32>() == 0.0)
      .count();
    raise_disconnected_warning(
      edges_removed,
      vertices_disconnected,
      disconnection_distance,
      n_samples,
      0.1,
    );

    Ok(LearnedManifold {
      graph,
      sigmas,
      rhos,
      a,
      b,
    })
  }

  pub fn embed(&self, manifold: &LearnedManifold, n_components: usize) -> Result<Array2<f32>> {
    check_components(n_components)?;
    let opt = &self.config.optimization;
    Ok(
      SimplicialSetEmbedding::builder()
        .graph(&manifold.graph)
        .n_components(n_components)
        .a(manifold.a)
        .b(manifold.b)
        .gamma(opt.repulsion_strength)
        .initial_alpha(opt.learning_rate)
        .negative_sample_rate(opt.negative_sample_rate)
        .n_epochs(opt.n_epochs)
        .random_state(self.config.random_state)
        .build()
        .exec(),
    )
  }

  pub fn fit(&self, data: ArrayView2<f32>, n_components: usize) -> Result<Array2<f32>> {
    check_components(n_components)?;
    let manifold = self.learn_manifold(data)?;
    self.embed(&manifold, n_components)
  }

  /// Coordinates for every row of `table`, in row order.
  pub fn project(&self, table: &EmbeddingTable, n_components: usize) -> Result<ReducedCoordinates> {
    let started = Instant::now();
    let coords = self.fit(table.vectors(), n_components)?;
    info!(
      duration_ms = started.elapsed().as_millis(),
      rows = table.len(),
      n_components,
      "projection complete"
    );
    ReducedCoordinates::new(table.clone(), coords)
  }
}

/// Project `table` with the default configuration, or `overrides` when given.
pub fn project(
  table: &EmbeddingTable,
  n_components: usize,
  overrides: Option<&ProjectionConfig>,
) -> Result<ReducedCoordinates> {
  check_components(n_components)?;
  let config = overrides.cloned().unwrap_or_default();
  ProjectionEngine::new(config)?.project(table, n_components)
}

fn check_components(n_components: usize) -> Result<()> {
  match n_components {
    2 | 3 => Ok(()),
    n => Err(Error::InvalidComponents(n)),
  }
}

fn validate(config: &ProjectionConfig) -> Result<()> {
  let invalid = |msg: String| Err(Error::InvalidParameter(msg));
  let manifold = &config.manifold;
  let graph = &config.graph;
  let opt = &config.optimization;

  if graph.n_neighbors < 2 {
    return invalid(format!("n_neighbors must be >= 2, got {}", graph.n_neighbors));
  }
  if !(manifold.spread > 0.0) {
    return invalid(format!("spread must be > 0, got {}", manifold.spread));
  }
  if !(manifold.min_dist >= 0.0 && manifold.min_dist <= manifold.spread) {
    return invalid(format!(
      "min_dist must be in [0, spread], got {}",
      manifold.min_dist
    ));
  }
  if !(0.0..=1.0).contains(&graph.set_op_mix_ratio) {
    return invalid(format!(
      "set_op_mix_ratio must be in [0, 1], got {}",
      graph.set_op_mix_ratio
    ));
  }
  if !(graph.local_connectivity >= 0.0) {
    return invalid(format!(
      "local_connectivity must be >= 0, got {}",
      graph.local_connectivity
    ));
  }
  if let Some(d) = graph.disconnection_distance.filter(|d| !(*d > 0.0)) {
    return invalid(format!("disconnection_distance must be > 0, got {d}"));
  }
  if !(opt.learning_rate >= 0.0) || !(opt.repulsion_strength >= 0.0) {
    return invalid("learning_rate and repulsion_strength must be >= 0".into());
  }
  if manifold.a.is_some_and(|a| !(a > 0.0)) || manifold.b.is_some_and(|b| !(b > 0.0)) {
    return invalid("a and b must be > 0".into());
  }
  Ok(())
}

fn raise_disconnected_warning(
  edges_removed: usize,
  vertices_disconnected: usize,
  disconnection_distance: f32,
  total_rows: usize,
  threshold: f64,
) {
  if vertices_disconnected == 0 {
    if edges_removed > 0 {
      debug!(
        edges_removed,
        disconnection_distance, "removed neighbours at the disconnection distance"
      );
    }
  } else if (vertices_disconnected as f64) < threshold * total_rows as f64 {
    warn!(
      vertices_disconnected,
      edges_removed,
      disconnection_distance,
      "some rows are disconnected from the graph; their coordinates will be NaN"
    );
  } else {
    warn!(
      vertices_disconnected,
      total_rows,
      disconnection_distance,
      "a large share of rows is disconnected from the graph; consider a larger disconnection_distance"
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::GraphParams;
  use crate::config::ManifoldParams;
  use crate::config::OptimizationParams;
  use rand::rngs::StdRng;
  use rand::Rng;
  use rand::SeedableRng;

  /// Two tight groups of rows pointing along different axes.
  fn two_clusters(per_cluster: usize) -> EmbeddingTable {
    let mut rng = StdRng::seed_from_u64(7);
    let dims = 8;
    let mut labels = Vec::new();
    let mut data = Array2::<f32>::zeros((2 * per_cluster, dims));
    for i in 0..2 * per_cluster {
      let cluster = i / per_cluster;
      labels.push(format!("{}{}", if cluster == 0 { "Techno" } else { "Punk" }, i));
      for d in 0..dims {
        let base = if d == cluster { 1.0 } else { 0.0 };
        data[(i, d)] = base + rng.random_range(-0.05f32..0.05);
      }
    }
    EmbeddingTable::new(labels, data).unwrap()
  }

  fn quick() -> ProjectionConfig {
    ProjectionConfig {
      graph: GraphParams {
        n_neighbors: 5,
        ..Default::default()
      },
      optimization: OptimizationParams {
        n_epochs: Some(200),
        ..Default::default()
      },
      ..Default::default()
    }
  }

  fn centroid(c: ArrayView2<f32>, rows: std::ops::Range<usize>) -> Vec<f32> {
    let n = rows.len() as f32;
    (0..c.ncols())
      .map(|d| rows.clone().map(|r| c[(r, d)]).sum::<f32>() / n)
      .collect()
  }

  fn dist(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
  }

  #[test]
  fn keeps_rows_and_returns_requested_dimensions() {
    let table = two_clusters(6);
    for n in [2, 3] {
      let reduced = project(&table, n, Some(&quick())).unwrap();
      assert_eq!(reduced.coords().shape(), &[12, n]);
      assert_eq!(reduced.labels(), table.labels());
      assert!(reduced.coords().iter().all(|v| v.is_finite()));
    }
  }

  #[test]
  fn rejects_unsupported_dimensions() {
    let table = two_clusters(3);
    for n in [0, 1, 4] {
      assert!(matches!(project(&table, n, None), Err(Error::InvalidComponents(m)) if m == n));
    }
  }

  #[test]
  fn rejects_tiny_tables() {
    let table = EmbeddingTable::new(vec!["A".into(), "B".into()], Array2::ones((2, 4))).unwrap();
    assert!(matches!(
      project(&table, 2, None),
      Err(Error::TooFewSamples { got: 2, min: 3 })
    ));
  }

  #[test]
  fn rejects_invalid_configuration() {
    let bad = ProjectionConfig {
      manifold: ManifoldParams {
        min_dist: 2.0,
        ..Default::default()
      },
      ..Default::default()
    };
    assert!(matches!(ProjectionEngine::new(bad), Err(Error::InvalidParameter(_))));
  }

  #[test]
  fn same_seed_same_coordinates() {
    let table = two_clusters(5);
    let first = project(&table, 2, Some(&quick())).unwrap();
    let second = project(&table, 2, Some(&quick())).unwrap();
    assert_eq!(first.coords(), second.coords());
  }

  #[test]
  fn clamps_neighbourhood_to_small_tables() {
    let table = two_clusters(2);
    let reduced = project(&table, 2, None).unwrap();
    assert_eq!(reduced.coords().nrows(), 4);
  }

  #[test]
  fn separates_clusters() {
    let table = two_clusters(10);
    let reduced = project(&table, 2, Some(&quick())).unwrap();
    let c = reduced.coords();
    let a = centroid(c, 0..10);
    let b = centroid(c, 10..20);
    let spread = |rows: std::ops::Range<usize>, center: &[f32]| {
      rows
        .map(|r| dist(&c.row(r).to_vec(), center))
        .fold(0.0f32, f32::max)
    };
    let between = dist(&a, &b);
    assert!(spread(0..10, &a) < between, "between = {between}");
    assert!(spread(10..20, &b) < between, "between = {between}");
  }

  #[test]
  fn manifold_is_symmetric() {
    let table = two_clusters(4);
    let engine = ProjectionEngine::new(quick()).unwrap();
    let manifold = engine.learn_manifold(table.vectors()).unwrap();
    let g = &manifold.graph;
    for (&v, (r, c)) in g.iter() {
      assert_eq!(g.get(c as usize, r as usize), Some(&v));
    }
    assert_eq!(g.rows(), 8);
    assert_eq!(manifold.sigmas.len(), 8);
  }
}
