use super::constants::SMALL_DATASET;
use super::fuzzy_simplicial_set::SparseMat;
use super::metric::rdist;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use typed_builder::TypedBuilder;

/*
  Lay out the fuzzy graph in n_components dimensions by stochastic gradient
  descent on the fuzzy set cross entropy. Edges are sampled in proportion to
  their membership strength, with negative samples drawn uniformly.

  Parameters
  ----------
  graph: sparse matrix of shape (n_samples, n_samples)
      Symmetric fuzzy graph from FuzzySimplicialSet.

  n_components: int
      Output dimensionality.

  a, b: float
      Parameters of the low-dimensional membership curve.

  gamma: float (optional, default 1.0)
      Weight of negative samples.

  initial_alpha: float (optional, default 1.0)
      Learning rate, decayed linearly to 0 over the epochs.

  negative_sample_rate: int (optional, default 5)
      Negative samples per positive sample.

  n_epochs: int or None (optional, default None)
      None picks 500 for small graphs and 200 for large ones. Edges weaker
      than max_weight / n_epochs would never be sampled and are dropped.

  random_state: int (optional, default 42)
      Seeds the initial layout (uniform in [-10, 10], then rescaled to
      [0, 10] per axis) and the negative sampling.

  Returns
  -------
  embedding: array of shape (n_samples, n_components)
      Rows of vertices left without edges are NaN.
*/
#[derive(TypedBuilder, Debug)]
pub struct SimplicialSetEmbedding<'g> {
  graph: &'g SparseMat,
  n_components: usize,
  a: f32,
  b: f32,
  #[builder(default = 1.0)]
  gamma: f32,
  #[builder(default = 1.0)]
  initial_alpha: f32,
  #[builder(default = 5)]
  negative_sample_rate: usize,
  #[builder(default)]
  n_epochs: Option<usize>,
  #[builder(default = 42)]
  random_state: u64,
}

impl<'g> SimplicialSetEmbedding<'g> {
  pub fn exec(self) -> Array2<f32> {
    let SimplicialSetEmbedding {
      graph,
      n_components,
      a,
      b,
      gamma,
      initial_alpha,
      negative_sample_rate,
      n_epochs,
      random_state,
    } = self;

    let n_vertices = graph.rows();
    let default_epochs = if n_vertices <= SMALL_DATASET { 500 } else { 200 };
    let n_epochs = n_epochs.unwrap_or(default_epochs);

    let max_val = graph.data().iter().copied().fold(0.0f32, f32::max);
    let threshold = if n_epochs > 10 {
      max_val / n_epochs as f32
    } else {
      max_val / default_epochs as f32
    };

    let mut head = Vec::new();
    let mut tail = Vec::new();
    let mut weights = Vec::new();
    let mut degree = vec![0usize; n_vertices];
    for (row_idx, row) in graph.outer_iterator().enumerate() {
      for (&col, &val) in row.indices().iter().zip(row.data()) {
        if val >= threshold && val > 0.0 {
          head.push(row_idx);
          tail.push(col as usize);
          weights.push(val);
          degree[row_idx] += 1;
        }
      }
    }
    debug!(
      edges = head.len(),
      dropped = graph.nnz() - head.len(),
      n_epochs,
      "filtered weak edges"
    );

    let mut rng = StdRng::seed_from_u64(random_state);
    let mut embedding =
      Array2::from_shape_fn((n_vertices, n_components), |_| rng.random_range(-10.0f32..10.0));
    normalize_columns(&mut embedding);

    let epochs_per_sample = make_epochs_per_sample(ArrayView1::from(&weights), n_epochs);
    // No negative samples at all when the rate is 0.
    let epochs_per_negative_sample = epochs_per_sample.mapv(|e| {
      if negative_sample_rate == 0 {
        f64::INFINITY
      } else {
        e / negative_sample_rate as f64
      }
    });

    let started = Instant::now();
    let mut sgd = Sgd {
      embedding: &mut embedding,
      head: &head,
      tail: &tail,
      epoch_of_next_negative_sample: epochs_per_negative_sample.clone(),
      epochs_per_negative_sample,
      epoch_of_next_sample: epochs_per_sample.clone(),
      epochs_per_sample,
      a,
      b,
      gamma,
      n_vertices,
      rng,
    };
    let mut alpha = initial_alpha;
    for n in 0..n_epochs {
      sgd.epoch(n, alpha);
      alpha = initial_alpha * (1.0 - n as f32 / n_epochs as f32);
    }
    info!(
      duration_ms = started.elapsed().as_millis(),
      n_epochs,
      "layout optimization complete"
    );

    for (i, &d) in degree.iter().enumerate() {
      if d == 0 {
        embedding.row_mut(i).fill(f32::NAN);
      }
    }
    embedding
  }
}

/// Rescale every column to [0, 10].
fn normalize_columns(embedding: &mut Array2<f32>) {
  for mut col in embedding.columns_mut() {
    let (min, max) = col
      .iter()
      .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if range > 0.0 {
      col.mapv_inplace(|v| 10.0 * (v - min) / range);
    }
  }
}

/*
  Number of epochs between samples of each edge: the strongest edge is
  sampled every epoch, an edge of half its weight every other epoch.
  Edges that would never be sampled get -1.
*/
pub fn make_epochs_per_sample(weights: ArrayView1<f32>, n_epochs: usize) -> Array1<f64> {
  let max_weight = weights.iter().copied().fold(0.0f32, f32::max) as f64;
  weights.mapv(|w| {
    let n_samples = n_epochs as f64 * (w as f64 / max_weight);
    if n_samples > 0.0 {
      n_epochs as f64 / n_samples
    } else {
      -1.0
    }
  })
}

#[inline(always)]
fn clip(val: f32) -> f32 {
  val.clamp(-4.0, 4.0)
}

struct Sgd<'e> {
  embedding: &'e mut Array2<f32>,
  head: &'e [usize],
  tail: &'e [usize],
  epochs_per_sample: Array1<f64>,
  epochs_per_negative_sample: Array1<f64>,
  epoch_of_next_negative_sample: Array1<f64>,
  epoch_of_next_sample: Array1<f64>,
  a: f32,
  b: f32,
  gamma: f32,
  n_vertices: usize,
  rng: StdRng,
}

impl<'e> Sgd<'e> {
  fn epoch(&mut self, n: usize, alpha: f32) {
    let n = n as f64;
    let dim = self.embedding.ncols();
    let (a, b, gamma) = (self.a, self.b, self.gamma);

    for i in 0..self.epochs_per_sample.len() {
      if self.epochs_per_sample[i] <= 0.0 || self.epoch_of_next_sample[i] > n {
        continue;
      }
      let j = self.head[i];
      let k = self.tail[i];

      let dist_squared = rdist(&self.embedding.row(j), &self.embedding.row(k));
      let grad_coeff = if dist_squared > 0.0 {
        let dist_pow_b = dist_squared.powf(b);
        -2.0 * a * b * dist_pow_b / dist_squared / (a * dist_pow_b + 1.0)
      } else {
        0.0
      };
      for d in 0..dim {
        let grad_d = clip(grad_coeff * (self.embedding[(j, d)] - self.embedding[(k, d)]));
        self.embedding[(j, d)] += grad_d * alpha;
        self.embedding[(k, d)] -= grad_d * alpha;
      }

      self.epoch_of_next_sample[i] += self.epochs_per_sample[i];

      let n_neg_samples = if self.epochs_per_negative_sample[i].is_finite() {
        ((n - self.epoch_of_next_negative_sample[i]) / self.epochs_per_negative_sample[i]) as usize
      } else {
        0
      };
      for _ in 0..n_neg_samples {
        let k = self.rng.random_range(0..self.n_vertices);
        if j == k {
          continue;
        }
        let dist_squared = rdist(&self.embedding.row(j), &self.embedding.row(k));
        let grad_coeff = if dist_squared > 0.0 {
          let dist_pow_b = dist_squared.powf(b);
          2.0 * gamma * b / ((0.001 + dist_squared) * (a * dist_pow_b + 1.0))
        } else {
          0.0
        };
        if grad_coeff > 0.0 {
          for d in 0..dim {
            let grad_d = clip(grad_coeff * (self.embedding[(j, d)] - self.embedding[(k, d)]));
            self.embedding[(j, d)] += grad_d * alpha;
          }
        }
      }
      if n_neg_samples > 0 {
        self.epoch_of_next_negative_sample[i] +=
          n_neg_samples as f64 * self.epochs_per_negative_sample[i];
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;

  #[test]
  fn epochs_per_sample_scales_inversely_with_weight() {
    let e = make_epochs_per_sample(array![1.0f32, 0.5, 0.0].view(), 100);
    assert_eq!(e.to_vec(), vec![1.0, 2.0, -1.0]);
  }

  #[test]
  fn isolated_vertices_are_nan() {
    // 0 - 1 connected, 2 isolated.
    let graph = SparseMat::new((3, 3), vec![0, 1, 2, 2], vec![1, 0], vec![1.0, 1.0]);
    let out = SimplicialSetEmbedding::builder()
      .graph(&graph)
      .n_components(2)
      .a(1.577)
      .b(0.895)
      .n_epochs(Some(20))
      .build()
      .exec();
    assert!(out.row(0).iter().all(|v| v.is_finite()));
    assert!(out.row(2).iter().all(|v| v.is_nan()));
  }
}
