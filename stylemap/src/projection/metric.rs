use crate::config::DistanceMetric;
use ndarray::ArrayView1;

impl DistanceMetric {
  pub fn distance(&self, x: ArrayView1<f32>, y: ArrayView1<f32>) -> f32 {
    match self {
      DistanceMetric::Euclidean => rdist(&x, &y).sqrt(),
      DistanceMetric::Cosine => {
        let (mut dot, mut nx, mut ny) = (0.0f32, 0.0f32, 0.0f32);
        for (a, b) in x.iter().zip(y.iter()) {
          dot += a * b;
          nx += a * a;
          ny += b * b;
        }
        if nx == 0.0 && ny == 0.0 {
          0.0
        } else if nx == 0.0 || ny == 0.0 {
          1.0
        } else {
          1.0 - dot / (nx * ny).sqrt()
        }
      }
    }
  }

  /// Distance at which two points are treated as unrelated. Cosine distance
  /// never exceeds 2.
  pub fn disconnection_threshold(&self) -> f32 {
    match self {
      DistanceMetric::Cosine => 2.0,
      DistanceMetric::Euclidean => f32::INFINITY,
    }
  }
}

/// Squared Euclidean distance.
#[inline(always)]
pub fn rdist(x: &ArrayView1<f32>, y: &ArrayView1<f32>) -> f32 {
  x.iter()
    .zip(y.iter())
    .map(|(a, b)| {
      let diff = a - b;
      diff * diff
    })
    .sum()
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;

  #[test]
  fn cosine_handles_zero_vectors() {
    let m = DistanceMetric::Cosine;
    let zero = array![0.0f32, 0.0];
    let x = array![1.0f32, 0.0];
    assert_eq!(m.distance(zero.view(), zero.view()), 0.0);
    assert_eq!(m.distance(zero.view(), x.view()), 1.0);
    assert!((m.distance(x.view(), array![-2.0f32, 0.0].view()) - 2.0).abs() < 1e-6);
    assert!(m.distance(x.view(), array![3.0f32, 0.0].view()).abs() < 1e-6);
  }

  #[test]
  fn euclidean_is_l2() {
    let d = DistanceMetric::Euclidean.distance(array![0.0f32, 0.0].view(), array![3.0f32, 4.0].view());
    assert_eq!(d, 5.0);
  }
}
