/*
  Fit a, b for the curve 1 / (1 + a * x^(2b)) used as the low-dimensional
  membership kernel, so that it best matches an offset exponential decay:
  1 below min_dist, exp(-(x - min_dist) / spread) above it.

  Least squares over 300 points in [0, 3 * spread], solved with
  Levenberg-Marquardt from (1, 1).
*/
pub fn find_ab_params(spread: f32, min_dist: f32) -> (f32, f32) {
  let spread = spread as f64;
  let min_dist = min_dist as f64;
  let n_points = 300;
  let xs: Vec<f64> = (0..n_points)
    .map(|i| spread * 3.0 * i as f64 / (n_points - 1) as f64)
    .collect();
  let ys: Vec<f64> = xs
    .iter()
    .map(|&x| {
      if x < min_dist {
        1.0
      } else {
        (-(x - min_dist) / spread).exp()
      }
    })
    .collect();

  let sse = |a: f64, b: f64| -> f64 {
    xs.iter()
      .zip(&ys)
      .map(|(&x, &y)| {
        let r = curve(x, a, b) - y;
        r * r
      })
      .sum()
  };

  let (mut a, mut b) = (1.0f64, 1.0f64);
  let mut err = sse(a, b);
  let mut lambda = 1e-3;

  for _ in 0..200 {
    // Normal equations J^T J and J^T r.
    let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&x, &y) in xs.iter().zip(&ys) {
      let x2b = if x > 0.0 { x.powf(2.0 * b) } else { 0.0 };
      let denom = 1.0 + a * x2b;
      let r = 1.0 / denom - y;
      let da = -x2b / (denom * denom);
      let db = if x > 0.0 {
        -2.0 * a * x2b * x.ln() / (denom * denom)
      } else {
        0.0
      };
      jaa += da * da;
      jab += da * db;
      jbb += db * db;
      ga += da * r;
      gb += db * r;
    }

    let mut improved = false;
    while lambda < 1e10 {
      let m00 = jaa * (1.0 + lambda);
      let m11 = jbb * (1.0 + lambda);
      let det = m00 * m11 - jab * jab;
      if det.abs() < f64::MIN_POSITIVE {
        lambda *= 10.0;
        continue;
      }
      let step_a = (-ga * m11 + gb * jab) / det;
      let step_b = (-gb * m00 + ga * jab) / det;
      let (na, nb) = (a + step_a, b + step_b);
      let next = sse(na, nb);
      if next.is_finite() && next < err {
        let converged = (err - next) < 1e-12 * err.max(1e-12);
        a = na;
        b = nb;
        err = next;
        lambda = (lambda / 10.0).max(1e-12);
        improved = !converged;
        break;
      }
      lambda *= 10.0;
    }
    if !improved {
      break;
    }
  }

  (a as f32, b as f32)
}

fn curve(x: f64, a: f64, b: f64) -> f64 {
  if x > 0.0 {
    1.0 / (1.0 + a * x.powf(2.0 * b))
  } else {
    1.0
  }
}
