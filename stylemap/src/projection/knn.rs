use crate::config::DistanceMetric;
use ndarray::Array2;
use ndarray::ArrayView2;
use rayon::prelude::*;
use typed_builder::TypedBuilder;

/*
  Exact k-nearest neighbours by brute force.

  Parameters
  ----------
  data: array of shape (n_samples, n_features)

  k: int
      Neighbours per row, counting the row itself.

  metric: DistanceMetric

  Returns
  -------
  knn_indices: array of shape (n_samples, k)
      Row i starts with i itself, followed by the other rows by increasing
      distance. Equal distances are ordered by index.

  knn_dists: array of shape (n_samples, k)
      The matching distances; the first column is 0.
*/
#[derive(TypedBuilder, Debug)]
pub struct NearestNeighbors<'a> {
  data: ArrayView2<'a, f32>,
  k: usize,
  metric: DistanceMetric,
}

impl<'a> NearestNeighbors<'a> {
  pub fn exec(self) -> (Array2<u32>, Array2<f32>) {
    let NearestNeighbors { data, k, metric } = self;
    let n = data.nrows();
    let k = k.min(n);

    let rows: Vec<Vec<(u32, f32)>> = (0..n)
      .into_par_iter()
      .map(|i| {
        let mut row: Vec<(u32, f32)> = (0..n)
          .filter(|&j| j != i)
          .map(|j| (j as u32, metric.distance(data.row(i), data.row(j))))
          .collect();
        row.sort_unstable_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        row.truncate(k.saturating_sub(1));
        row.insert(0, (i as u32, 0.0));
        row
      })
      .collect();

    let mut knn_indices = Array2::<u32>::zeros((n, k));
    let mut knn_dists = Array2::<f32>::zeros((n, k));
    for (i, row) in rows.into_iter().enumerate() {
      for (j, (idx, dist)) in row.into_iter().enumerate() {
        knn_indices[(i, j)] = idx;
        knn_dists[(i, j)] = dist;
      }
    }
    (knn_indices, knn_dists)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;

  #[test]
  fn self_first_then_by_distance() {
    let data = array![[0.0f32], [5.0], [1.0], [3.0]];
    let (idx, dist) = NearestNeighbors::builder()
      .data(data.view())
      .k(3)
      .metric(DistanceMetric::Euclidean)
      .build()
      .exec();
    assert_eq!(idx.row(0).to_vec(), vec![0, 2, 3]);
    assert_eq!(dist.row(0).to_vec(), vec![0.0, 1.0, 3.0]);
    assert_eq!(idx.row(1).to_vec(), vec![1, 3, 2]);
  }

  #[test]
  fn ties_break_by_index() {
    let data = array![[0.0f32], [1.0], [-1.0]];
    let (idx, _) = NearestNeighbors::builder()
      .data(data.view())
      .k(3)
      .metric(DistanceMetric::Euclidean)
      .build()
      .exec();
    assert_eq!(idx.row(0).to_vec(), vec![0, 1, 2]);
  }
}
