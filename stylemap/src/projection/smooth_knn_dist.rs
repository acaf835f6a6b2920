use super::constants::MIN_K_DIST_SCALE;
use super::constants::SMOOTH_K_TOLERANCE;
use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use rayon::prelude::*;
use typed_builder::TypedBuilder;

#[derive(TypedBuilder, Debug)]
pub struct SmoothKnnDist<'a> {
  distances: ArrayView2<'a, f32>,
  k: usize,
  #[builder(default = 64)]
  n_iter: usize,
  #[builder(default = 1.0)]
  local_connectivity: f32,
  #[builder(default = 1.0)]
  bandwidth: f32,
}

impl<'a> SmoothKnnDist<'a> {
  /*
    Compute a continuous version of the distance to the kth nearest
    neighbour, so that the fuzzy set around each point has cardinality
    log2(k) * bandwidth.

    Parameters
    ----------
    distances: array of shape (n_samples, n_neighbors)
        Sorted distances to each sample's nearest neighbours. Column 0 is
        the sample itself and is excluded from the cardinality sum.

    k: int
        The number of nearest neighbours to approximate for.

    n_iter: int (optional, default 64)
        Maximum binary search iterations per sample.

    local_connectivity: float (optional, default 1)
        Number of nearest neighbours assumed fully connected. Fractional
        values interpolate between neighbour distances.

    bandwidth: float (optional, default 1)
        Target bandwidth of the kernel.

    Returns
    -------
    sigmas: array of shape (n_samples,)
        Per-sample normalization factor.

    rhos: array of shape (n_samples,)
        Distance to the local_connectivity-th nearest non-zero neighbour.
  */
  pub fn exec(self) -> (Array1<f32>, Array1<f32>) {
    let SmoothKnnDist {
      distances,
      k,
      n_iter,
      local_connectivity,
      bandwidth,
    } = self;

    let target = (k as f32).log2() * bandwidth;
    let mean_distances = distances.mean().unwrap_or(0.0);

    let (sigmas, rhos): (Vec<f32>, Vec<f32>) = (0..distances.nrows())
      .into_par_iter()
      .map(|i| {
        let row = distances.row(i);
        let rho = local_rho(row, local_connectivity);
        let mut sigma = search_sigma(row, rho, target, n_iter);

        let floor = if rho > 0.0 {
          MIN_K_DIST_SCALE * row.mean().unwrap_or(0.0)
        } else {
          MIN_K_DIST_SCALE * mean_distances
        };
        if sigma < floor {
          sigma = floor;
        }
        (sigma, rho)
      })
      .unzip();

    (Array1::from(sigmas), Array1::from(rhos))
  }
}

fn local_rho(row: ArrayView1<f32>, local_connectivity: f32) -> f32 {
  let non_zero: Vec<f32> = row.iter().copied().filter(|&d| d > 0.0).collect();
  if non_zero.is_empty() {
    return 0.0;
  }
  if (non_zero.len() as f32) < local_connectivity {
    return non_zero.iter().copied().fold(0.0, f32::max);
  }

  let index = local_connectivity.floor() as usize;
  let interpolation = local_connectivity - local_connectivity.floor();
  if index == 0 {
    return interpolation * non_zero[0];
  }
  let mut rho = non_zero[index - 1];
  if interpolation > SMOOTH_K_TOLERANCE {
    if let Some(&next) = non_zero.get(index) {
      rho += interpolation * (next - rho);
    }
  }
  rho
}

fn search_sigma(row: ArrayView1<f32>, rho: f32, target: f32, n_iter: usize) -> f32 {
  let mut lo = 0.0;
  let mut hi = f32::INFINITY;
  let mut mid = 1.0;

  for _ in 0..n_iter {
    let psum: f32 = row
      .iter()
      .skip(1)
      .map(|&d| {
        let d = d - rho;
        if d > 0.0 {
          (-(d / mid)).exp()
        } else {
          1.0
        }
      })
      .sum();

    if (psum - target).abs() < SMOOTH_K_TOLERANCE {
      break;
    }
    if psum > target {
      hi = mid;
      mid = (lo + hi) / 2.0;
    } else {
      lo = mid;
      if hi == f32::INFINITY {
        mid *= 2.0;
      } else {
        mid = (lo + hi) / 2.0;
      }
    }
  }
  mid
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;

  #[test]
  fn rho_is_nearest_non_zero_distance() {
    let d = array![[0.0f32, 0.5, 1.0, 2.0], [0.0, 0.0, 0.3, 0.6]];
    let (sigmas, rhos) = SmoothKnnDist::builder().distances(d.view()).k(4).build().exec();
    assert_eq!(rhos.to_vec(), vec![0.5, 0.3]);
    assert!(sigmas.iter().all(|&s| s > 0.0));
  }

  #[test]
  fn sigma_hits_target_cardinality() {
    let d = array![[0.0f32, 0.1, 0.4, 0.9, 1.6, 2.5]];
    let (sigmas, rhos) = SmoothKnnDist::builder().distances(d.view()).k(6).build().exec();
    let psum: f32 = d
      .row(0)
      .iter()
      .skip(1)
      .map(|&x| (-((x - rhos[0]).max(0.0) / sigmas[0])).exp())
      .sum();
    assert!((psum - 6f32.log2()).abs() < 1e-3);
  }
}
