use serde::Deserialize;
use serde::Serialize;

/// Distance used to find nearest neighbours in the embedding space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
  /// `1 - cos(a, b)`; insensitive to vector length.
  Cosine,
  Euclidean,
}

/// Shape of the low-dimensional manifold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifoldParams {
  /// Minimum distance between points in the projection.
  ///
  /// Smaller values pack neighbourhoods tighter.
  ///
  /// Default: 0.1
  pub min_dist: f32,

  /// Effective scale of projected points; `min_dist` must not exceed it.
  ///
  /// Default: 1.0
  pub spread: f32,

  /// Parameters of the curve `1 / (1 + a * x^(2b))`. Fitted from
  /// `min_dist` and `spread` when `None`.
  ///
  /// Default: None
  pub a: Option<f32>,
  pub b: Option<f32>,
}

impl Default for ManifoldParams {
  fn default() -> Self {
    Self {
      min_dist: 0.1,
      spread: 1.0,
      a: None,
      b: None,
    }
  }
}

/// Nearest-neighbour graph construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphParams {
  /// Neighbourhood size. Larger values favour global structure.
  ///
  /// Clamped to `rows - 1` for small tables. Must be >= 2.
  ///
  /// Default: 15
  pub n_neighbors: usize,

  /// Number of nearest neighbours assumed fully connected.
  ///
  /// Default: 1.0
  pub local_connectivity: f32,

  /// Interpolation between fuzzy union (1.0) and fuzzy intersection (0.0).
  ///
  /// Default: 1.0
  pub set_op_mix_ratio: f32,

  /// Neighbours at or beyond this distance are dropped from the graph.
  /// `None` uses the metric's own bound (2.0 for cosine, none for Euclidean).
  ///
  /// Default: None
  pub disconnection_distance: Option<f32>,
}

impl Default for GraphParams {
  fn default() -> Self {
    Self {
      n_neighbors: 15,
      local_connectivity: 1.0,
      set_op_mix_ratio: 1.0,
      disconnection_distance: None,
    }
  }
}

/// Stochastic gradient descent over the layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationParams {
  /// Number of epochs. `None` picks 500 for up to 10,000 rows, else 200.
  ///
  /// Default: None
  pub n_epochs: Option<usize>,

  /// Initial learning rate, decayed linearly to 0.
  ///
  /// Default: 1.0
  pub learning_rate: f32,

  /// Negative samples per positive sample.
  ///
  /// Default: 5
  pub negative_sample_rate: usize,

  /// Weight of negative samples.
  ///
  /// Default: 1.0
  pub repulsion_strength: f32,
}

impl Default for OptimizationParams {
  fn default() -> Self {
    Self {
      n_epochs: None,
      learning_rate: 1.0,
      negative_sample_rate: 5,
      repulsion_strength: 1.0,
    }
  }
}

/// Complete projection configuration.
///
/// Override individual settings with struct update syntax:
///
/// ```
/// use stylemap::config::{GraphParams, ProjectionConfig};
///
/// let config = ProjectionConfig {
///   graph: GraphParams {
///     n_neighbors: 30,
///     ..Default::default()
///   },
///   ..Default::default()
/// };
/// assert_eq!(config.random_state, 42);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
  /// Input-space metric for the neighbour search.
  ///
  /// Default: Cosine
  pub metric: DistanceMetric,

  /// Seed for initialization and negative sampling. Identical input and
  /// configuration give identical coordinates.
  ///
  /// Default: 42
  pub random_state: u64,

  pub manifold: ManifoldParams,
  pub graph: GraphParams,
  pub optimization: OptimizationParams,
}

impl Default for ProjectionConfig {
  fn default() -> Self {
    Self {
      metric: DistanceMetric::Cosine,
      random_state: 42,
      manifold: ManifoldParams::default(),
      graph: GraphParams::default(),
      optimization: OptimizationParams::default(),
    }
  }
}

/// Which objective the word-embedding trainer optimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
  /// Predict each context token from the centre token.
  SkipGram,
  /// Predict the centre token from the mean of its context.
  Cbow,
}

/// Word-embedding training over token sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word2VecParams {
  /// Default: 32
  pub vector_size: usize,

  /// Maximum distance between the centre and a context token. The effective
  /// window is resampled per position in `1..=window`.
  ///
  /// Default: 10
  pub window: usize,

  /// Tokens seen fewer times are dropped from the vocabulary.
  ///
  /// Default: 5
  pub min_count: u64,

  /// Passes over the corpus.
  ///
  /// Default: 5
  pub epochs: usize,

  /// Negative samples per positive, drawn from unigram^0.75.
  ///
  /// Default: 5
  pub negative: usize,

  /// Learning rate, decayed linearly from `alpha` to `min_alpha`.
  ///
  /// Default: 0.025 / 0.0001
  pub alpha: f32,
  pub min_alpha: f32,

  /// Default: Cbow
  pub architecture: Architecture,

  /// Default: 42
  pub seed: u64,
}

impl Default for Word2VecParams {
  fn default() -> Self {
    Self {
      vector_size: 32,
      window: 10,
      min_count: 5,
      epochs: 5,
      negative: 5,
      alpha: 0.025,
      min_alpha: 0.0001,
      architecture: Architecture::Cbow,
      seed: 42,
    }
  }
}

/// Biased random walks over the style graph, followed by skip-gram training
/// on the walks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node2VecParams {
  /// Default: 32
  pub dimensions: usize,

  /// Nodes per walk, including the start node.
  ///
  /// Default: 80
  pub walk_length: usize,

  /// Walks started from every node.
  ///
  /// Default: 10
  pub num_walks: usize,

  /// Return parameter: the walker steps back to the previous node with
  /// weight `w / p`.
  ///
  /// Default: 1.0
  pub p: f64,

  /// In-out parameter: nodes not adjacent to the previous node get weight
  /// `w / q`.
  ///
  /// Default: 1.0
  pub q: f64,

  /// Threads used to generate walks. The walks do not depend on it.
  ///
  /// Default: 1
  pub workers: usize,

  /// Skip-gram settings for the walk corpus. Its `vector_size` is replaced
  /// by `dimensions`.
  ///
  /// Default: window 10, min_count 1, skip-gram architecture
  pub word2vec: Word2VecParams,
}

impl Default for Node2VecParams {
  fn default() -> Self {
    let dimensions = 32;
    Self {
      dimensions,
      walk_length: 80,
      num_walks: 10,
      p: 1.0,
      q: 1.0,
      workers: 1,
      word2vec: Word2VecParams {
        vector_size: dimensions,
        window: 10,
        min_count: 1,
        architecture: Architecture::SkipGram,
        ..Default::default()
      },
    }
  }
}

/// Plotly Dark24 qualitative palette.
pub const DARK24: [&str; 24] = [
  "#2E91E5", "#E15F99", "#1CA71C", "#FB0D0D", "#DA16FF", "#222A2A", "#B68100", "#750D86",
  "#EB663B", "#511CFB", "#00A08B", "#FB00D1", "#FC0080", "#B2828D", "#6C7C32", "#778AA2",
  "#862A16", "#A777F1", "#620042", "#1616A7", "#DA60CA", "#6C4516", "#0D2A63", "#AF0038",
];

/// Appearance and initial state of the rendered scatter plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualConfig {
  pub fig_width: u32,
  pub fig_height: u32,

  pub marker_size: u32,
  pub marker_opacity: f32,

  pub font_size: u32,
  /// Plotly text position, e.g. "top center".
  pub text_position: String,

  /// Trace mode: "markers" or "markers+text".
  pub init_mode: String,
  /// "pan" or "zoom"; anything else is rejected at render time.
  pub init_dragmode: String,
  /// Case-insensitive label substring to centre the initial view on.
  pub init_style: Option<String>,
  /// Visible share of the full data range, in percent. `None` or 0 keeps
  /// the full range.
  pub init_margin: Option<f32>,

  pub color_palette: Vec<String>,
}

impl Default for VisualConfig {
  fn default() -> Self {
    Self {
      fig_width: 900,
      fig_height: 700,
      marker_size: 6,
      marker_opacity: 0.8,
      font_size: 8,
      text_position: "top center".into(),
      init_mode: "markers".into(),
      init_dragmode: "pan".into(),
      init_style: None,
      init_margin: None,
      color_palette: DARK24.iter().map(|c| c.to_string()).collect(),
    }
  }
}
