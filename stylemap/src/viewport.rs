use crate::catalog::to_display;
use crate::table::ReducedCoordinates;
use serde::Serialize;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

const AXES: [&str; 3] = ["xaxis", "yaxis", "zaxis"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
  pub min: f64,
  pub max: f64,
}

impl AxisRange {
  pub fn width(&self) -> f64 {
    self.max - self.min
  }
}

/// Initial visible range per axis of the rendered scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
  ranges: Vec<AxisRange>,
  focused: bool,
}

impl Viewport {
  /// Centre the view on the rows whose display label contains `focus`,
  /// ignoring case.
  ///
  /// Each axis spans `margin` percent of the full data range around the
  /// centroid of the matches. A margin of `None` or 0 keeps the full width.
  /// Returns `None` when there is no focus. A focus that matches nothing, or
  /// only rows without coordinates, yields the full data range.
  pub fn compute(coords: &ReducedCoordinates, focus: Option<&str>, margin: Option<f32>) -> Option<Self> {
    let focus = focus?;
    let full = Self::full_range(coords);
    let matches = matching_rows(coords.labels(), focus);
    if matches.is_empty() {
      debug!(focus, "no style matches the focus; using the full range");
      return Some(full);
    }

    let ratio = margin_ratio(margin);
    let c = coords.coords();
    let mut ranges = Vec::with_capacity(full.ranges.len());
    for (axis, range) in full.ranges.iter().enumerate() {
      let center = nan_mean(matches.iter().map(|&row| c[(row, axis)]));
      if !center.is_finite() {
        debug!(focus, axis, "matched styles have no coordinates; using the full range");
        return Some(full);
      }
      let half = range.width() * ratio / 2.0;
      ranges.push(AxisRange {
        min: center - half,
        max: center + half,
      });
    }
    debug!(focus, matches = matches.len(), ratio, "centred viewport");
    Some(Self { ranges, focused: true })
  }

  /// Data min and max on every axis, ignoring NaN rows.
  pub fn full_range(coords: &ReducedCoordinates) -> Self {
    let ranges = coords
      .coords()
      .columns()
      .into_iter()
      .map(|col| {
        let (min, max) = col
          .iter()
          .filter(|v| !v.is_nan())
          .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
          });
        AxisRange { min, max }
      })
      .collect();
    Self { ranges, focused: false }
  }

  pub fn ranges(&self) -> &[AxisRange] {
    &self.ranges
  }

  /// Whether the ranges were centred on matched styles rather than taken
  /// from the whole data set.
  pub fn is_focused(&self) -> bool {
    self.focused
  }

  /// Layout update in plotly's shape: flat `xaxis.range` keys for a planar
  /// scene, a nested `scene` object for a 3D one.
  pub fn to_layout(&self) -> Value {
    let axes = AXES.iter().zip(&self.ranges);
    if self.ranges.len() == 3 {
      let scene: Map<String, Value> = axes
        .map(|(axis, r)| (axis.to_string(), json!({ "range": [r.min, r.max] })))
        .collect();
      json!({ "scene": scene })
    } else {
      Value::Object(
        axes
          .map(|(axis, r)| (format!("{axis}.range"), json!([r.min, r.max])))
          .collect(),
      )
    }
  }
}

/// Visible share of the full range. `None` and 0 mean the full range.
pub fn margin_ratio(margin: Option<f32>) -> f64 {
  match margin {
    Some(m) if m != 0.0 => m as f64 / 100.0,
    _ => 1.0,
  }
}

/// Rows whose display label contains `focus`, ignoring case.
pub fn matching_rows(labels: &[String], focus: &str) -> Vec<usize> {
  let needle = focus.to_lowercase();
  labels
    .iter()
    .enumerate()
    .filter(|(_, label)| to_display(label).to_lowercase().contains(&needle))
    .map(|(i, _)| i)
    .collect()
}

fn nan_mean(values: impl Iterator<Item = f32>) -> f64 {
  let (sum, n) = values
    .filter(|v| !v.is_nan())
    .fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
  sum / n as f64
}
