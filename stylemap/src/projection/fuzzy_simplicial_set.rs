use super::constants::DISCONNECTED;
use super::smooth_knn_dist::SmoothKnnDist;
use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use sprs::CsMatI;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;
use typed_builder::TypedBuilder;

/// Sparse matrix with u32 indices.
pub type SparseMat = CsMatI<f32, u32>;

/*
  Turn each point's nearest neighbours into a local fuzzy set and combine the
  local sets into one symmetric fuzzy graph.

  Parameters
  ----------
  knn_indices: array of shape (n_samples, n_neighbors)
      Neighbour indices, self first. Slots holding DISCONNECTED are skipped.

  knn_dists: array of shape (n_samples, n_neighbors)
      Matching sorted distances.

  set_op_mix_ratio: float (optional, default 1.0)
      1.0 is a pure fuzzy union, 0.0 a pure fuzzy intersection; both use the
      product t-norm.

  local_connectivity: float (optional, default 1.0)
      Number of nearest neighbours assumed fully connected.

  apply_set_operations: bool (optional, default true)
      Symmetrize the graph. Without it the directed memberships are returned.

  Returns
  -------
  graph: sparse matrix of shape (n_samples, n_samples)
      Membership strength of each 1-simplex.

  sigmas, rhos: arrays of shape (n_samples,)
      Local normalization from smooth_knn_dist.
*/
#[derive(TypedBuilder, Debug)]
pub struct FuzzySimplicialSet<'a> {
  knn_indices: ArrayView2<'a, u32>,
  knn_dists: ArrayView2<'a, f32>,
  #[builder(default = 1.0)]
  set_op_mix_ratio: f32,
  #[builder(default = 1.0)]
  local_connectivity: f32,
  #[builder(default = true)]
  apply_set_operations: bool,
}

impl<'a> FuzzySimplicialSet<'a> {
  pub fn exec(self) -> (SparseMat, Array1<f32>, Array1<f32>) {
    let FuzzySimplicialSet {
      knn_indices,
      knn_dists,
      set_op_mix_ratio,
      local_connectivity,
      apply_set_operations,
    } = self;
    let n_samples = knn_indices.nrows();

    let started = Instant::now();
    let (sigmas, rhos) = SmoothKnnDist::builder()
      .distances(knn_dists)
      .k(knn_indices.ncols())
      .local_connectivity(local_connectivity)
      .build()
      .exec();
    info!(
      duration_ms = started.elapsed().as_millis(),
      "smooth_knn_dist complete"
    );

    let memberships = membership_strengths(knn_indices, knn_dists, sigmas.view(), rhos.view());
    let entries = if apply_set_operations {
      symmetrize(&memberships, set_op_mix_ratio)
    } else {
      memberships
    };
    let graph = to_csr(n_samples, &entries);
    info!(nnz = graph.nnz(), "fuzzy simplicial set complete");

    (graph, sigmas, rhos)
  }
}

fn membership_strengths(
  knn_indices: ArrayView2<u32>,
  knn_dists: ArrayView2<f32>,
  sigmas: ArrayView1<f32>,
  rhos: ArrayView1<f32>,
) -> BTreeMap<(u32, u32), f32> {
  let mut entries = BTreeMap::new();
  for ((i, j), &idx) in knn_indices.indexed_iter() {
    if idx == DISCONNECTED || idx == i as u32 {
      continue;
    }
    let d = knn_dists[(i, j)] - rhos[i];
    let val = if d <= 0.0 || sigmas[i] == 0.0 {
      1.0
    } else {
      (-d / sigmas[i]).exp()
    };
    if val > 0.0 {
      entries.insert((i as u32, idx), val);
    }
  }
  entries
}

/// `mix * (A + Aᵀ - A∘Aᵀ) + (1 - mix) * A∘Aᵀ`.
fn symmetrize(a: &BTreeMap<(u32, u32), f32>, mix: f32) -> BTreeMap<(u32, u32), f32> {
  let mut out = BTreeMap::new();
  for &(i, j) in a.keys() {
    for key in [(i, j), (j, i)] {
      if out.contains_key(&key) {
        continue;
      }
      let v = a.get(&key).copied().unwrap_or(0.0);
      let t = a.get(&(key.1, key.0)).copied().unwrap_or(0.0);
      let prod = v * t;
      let val = mix * (v + t - prod) + (1.0 - mix) * prod;
      out.insert(key, val);
    }
  }
  out.retain(|_, v| *v > 0.0);
  out
}

fn to_csr(n: usize, entries: &BTreeMap<(u32, u32), f32>) -> SparseMat {
  let mut indptr = vec![0u32; n + 1];
  let mut indices = Vec::with_capacity(entries.len());
  let mut data = Vec::with_capacity(entries.len());
  for (&(row, col), &val) in entries {
    indptr[row as usize + 1] += 1;
    indices.push(col);
    data.push(val);
  }
  for i in 0..n {
    indptr[i + 1] += indptr[i];
  }
  CsMatI::new((n, n), indptr, indices, data)
}
