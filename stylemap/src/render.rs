//! Interactive scatter plot of projected styles as a standalone plotly page.

use crate::catalog::to_display;
use crate::config::ProjectionConfig;
use crate::config::VisualConfig;
use crate::counts::GenreAssignment;
use crate::error::Error;
use crate::error::Result;
use crate::fsutil;
use crate::projection;
use crate::table::EmbeddingTable;
use crate::table::ReducedCoordinates;
use crate::viewport::Viewport;
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::info;
use typed_builder::TypedBuilder;

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
pub const PLOT_DIV_ID: &str = "stylemap-plot";
pub const UNKNOWN_TAG: &str = "Unknown";
const DRAG_MODES: [&str; 2] = ["zoom", "pan"];
const AXIS_KEYS: [&str; 3] = ["x", "y", "z"];

/// Render `table` projected to `n_components` dimensions, with points
/// coloured by `tags`.
#[derive(TypedBuilder)]
pub struct Scene<'a> {
  table: &'a EmbeddingTable,
  tags: &'a GenreAssignment,
  n_components: usize,
  #[builder(default = "Main Genre")]
  tag_name: &'a str,
  #[builder(default = "")]
  post_script: &'a str,
  #[builder(default)]
  projection: Option<&'a ProjectionConfig>,
  #[builder(default)]
  visual: VisualConfig,
}

impl<'a> Scene<'a> {
  pub fn render_document(&self) -> Result<String> {
    let reduced = projection::project(self.table, self.n_components, self.projection)?;
    let figure = Figure::new(&reduced, self.tags, self.tag_name, &self.visual)?;
    figure.to_html(self.post_script)
  }

  pub fn render(&self, save_path: &Path) -> Result<()> {
    let started = Instant::now();
    let html = self.render_document()?;
    let mut out = fsutil::create(save_path)?;
    out
      .write_all(html.as_bytes())
      .and_then(|_| out.flush())
      .map_err(Error::io(save_path))?;
    info!(
      duration_ms = started.elapsed().as_millis(),
      path = %save_path.display(),
      n_components = self.n_components,
      "rendered scene"
    );
    Ok(())
  }
}

fn check_drag_mode(mode: &str) -> Result<()> {
  if DRAG_MODES.contains(&mode) {
    Ok(())
  } else {
    Err(Error::InvalidDragMode(mode.to_string()))
  }
}

/// One displayed point.
struct Point {
  style: String,
  tag: String,
  vector: Vec<f32>,
  coords: Vec<f32>,
}

/// Serializes as one record of the embedded search data: `style`, the vector
/// components keyed `"0"..`, the coordinates keyed `dim_0..`, then the tag.
struct SearchRecord<'p> {
  point: &'p Point,
  tag_name: &'p str,
}

impl Serialize for SearchRecord<'_> {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let p = self.point;
    let mut map = serializer.serialize_map(Some(2 + p.vector.len() + p.coords.len()))?;
    map.serialize_entry("style", &p.style)?;
    for (i, v) in p.vector.iter().enumerate() {
      map.serialize_entry(&i.to_string(), v)?;
    }
    for (i, v) in p.coords.iter().enumerate() {
      map.serialize_entry(&format!("dim_{i}"), v)?;
    }
    map.serialize_entry(self.tag_name, &p.tag)?;
    map.end()
  }
}

/// Plotly figure: traces, layout and the search data for the page script.
#[derive(Debug, Clone)]
pub struct Figure {
  data: Vec<Value>,
  layout: Value,
  search_data: String,
}

impl Figure {
  pub fn new(
    reduced: &ReducedCoordinates,
    tags: &GenreAssignment,
    tag_name: &str,
    visual: &VisualConfig,
  ) -> Result<Self> {
    check_drag_mode(&visual.init_dragmode)?;
    let n_components = reduced.n_components();
    if !(2..=3).contains(&n_components) {
      return Err(Error::InvalidComponents(n_components));
    }

    let table = reduced.table();
    let coords = reduced.coords();
    let points: Vec<Point> = (0..table.len())
      .map(|i| {
        let (label, vector) = table.row(i);
        Point {
          style: to_display(label),
          tag: to_display(tags.get(label).map(String::as_str).unwrap_or(UNKNOWN_TAG)),
          vector: vector.to_vec(),
          coords: coords.row(i).to_vec(),
        }
      })
      .collect();

    let mut groups: IndexMap<&str, Vec<&Point>> = IndexMap::new();
    for p in &points {
      groups.entry(p.tag.as_str()).or_default().push(p);
    }
    let data = groups
      .iter()
      .enumerate()
      .map(|(i, (tag, members))| {
        let color = visual
          .color_palette
          .get(i % visual.color_palette.len().max(1))
          .map(String::as_str)
          .unwrap_or("#636EFA");
        trace(tag, members, color, tag_name, n_components, visual)
      })
      .collect();

    let mut layout = base_layout(tag_name, n_components, visual);
    // An unfocused view covers the whole data set, which plotly's autorange
    // already does with padding.
    let view = Viewport::compute(reduced, visual.init_style.as_deref(), visual.init_margin);
    if let Some(view) = view.filter(Viewport::is_focused) {
      apply_relayout(&mut layout, &view.to_layout());
    }

    let records: Vec<SearchRecord> = points
      .iter()
      .map(|point| SearchRecord { point, tag_name })
      .collect();
    let search_data = serde_json::to_string(&records)?;

    Ok(Self {
      data,
      layout,
      search_data,
    })
  }

  pub fn data(&self) -> &[Value] {
    &self.data
  }

  pub fn layout(&self) -> &Value {
    &self.layout
  }

  pub fn search_data(&self) -> &str {
    &self.search_data
  }

  /// Standalone page loading plotly.js from the CDN. `post_script` runs once
  /// the plot exists, after `search_data` is defined.
  pub fn to_html(&self, post_script: &str) -> Result<String> {
    let data = script_safe(&serde_json::to_string(&self.data)?);
    let layout = script_safe(&serde_json::to_string(&self.layout)?);
    let search_data = script_safe(&self.search_data);
    let post_script = script_safe(post_script);
    Ok(format!(
      r#"<html>
<head><meta charset="utf-8" /></head>
<body>
  <div>
    <script type="text/javascript" src="{PLOTLY_CDN}" charset="utf-8"></script>
    <div id="{PLOT_DIV_ID}" class="plotly-graph-div" style="height:100%; width:100%;"></div>
    <script type="text/javascript">
      window.PLOTLYENV = window.PLOTLYENV || {{}};
      if (document.getElementById("{PLOT_DIV_ID}")) {{
        Plotly.newPlot("{PLOT_DIV_ID}", {data}, {layout}, {{"responsive": true}}).then(function () {{
var search_data = {search_data};
 {post_script}
        }});
      }}
    </script>
  </div>
</body>
</html>
"#
    ))
  }
}

fn trace(
  tag: &str,
  members: &[&Point],
  color: &str,
  tag_name: &str,
  n_components: usize,
  visual: &VisualConfig,
) -> Value {
  let text: Vec<&str> = members.iter().map(|p| p.style.as_str()).collect();
  let mut hover = format!("<b>%{{hovertext}}</b><br><br>{tag_name}={tag}");
  let mut t = Map::new();
  t.insert(
    "type".into(),
    json!(if n_components == 3 { "scatter3d" } else { "scatter" }),
  );
  t.insert("name".into(), json!(tag));
  t.insert("legendgroup".into(), json!(tag));
  t.insert("showlegend".into(), json!(true));
  for (axis, key) in AXIS_KEYS.iter().take(n_components).enumerate() {
    let values: Vec<f32> = members.iter().map(|p| p.coords[axis]).collect();
    t.insert(key.to_string(), json!(values));
    hover.push_str(&format!("<br>dim_{axis}=%{{{key}}}"));
  }
  t.insert("text".into(), json!(text));
  t.insert("hovertext".into(), json!(text));
  t.insert("hovertemplate".into(), json!(format!("{hover}<extra></extra>")));
  t.insert(
    "marker".into(),
    json!({
      "color": color,
      "size": visual.marker_size,
      "opacity": visual.marker_opacity,
      "symbol": "circle",
    }),
  );
  t.insert("mode".into(), json!(visual.init_mode));
  t.insert("textposition".into(), json!(visual.text_position));
  t.insert("textfont".into(), json!({ "size": visual.font_size }));
  Value::Object(t)
}

fn base_layout(tag_name: &str, n_components: usize, visual: &VisualConfig) -> Value {
  let mut layout = json!({
    "width": visual.fig_width,
    "height": visual.fig_height,
    "dragmode": visual.init_dragmode,
    "legend": { "title": { "text": tag_name }, "tracegroupgap": 0 },
    "margin": { "t": 60 },
  });
  let axes: Map<String, Value> = AXIS_KEYS
    .iter()
    .take(n_components)
    .enumerate()
    .map(|(i, key)| (format!("{key}axis"), json!({ "title": { "text": format!("dim_{i}") } })))
    .collect();
  if n_components == 3 {
    layout["scene"] = Value::Object(axes);
  } else if let Value::Object(map) = &mut layout {
    map.extend(axes);
  }
  layout
}

/// Merge `update` into `layout` the way plotly's relayout does: dotted keys
/// address nested attributes and objects merge recursively.
pub fn apply_relayout(layout: &mut Value, update: &Value) {
  let Value::Object(update) = update else {
    return;
  };
  for (key, value) in update {
    let path: Vec<&str> = key.split('.').collect();
    set_path(layout, &path, value);
  }
}

fn set_path(target: &mut Value, path: &[&str], value: &Value) {
  let Some((head, rest)) = path.split_first() else {
    return;
  };
  if !target.is_object() {
    *target = Value::Object(Map::new());
  }
  if let Value::Object(map) = target {
    let slot = map.entry(head.to_string()).or_insert(Value::Null);
    if !rest.is_empty() {
      set_path(slot, rest, value);
    } else if slot.is_object() && value.is_object() {
      apply_relayout(slot, value);
    } else {
      *slot = value.clone();
    }
  }
}

/// Keep embedded JSON and script text from closing the surrounding tag.
fn script_safe(text: &str) -> String {
  text.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;
  use ndarray::Array2;

  fn reduced() -> ReducedCoordinates {
    let table = EmbeddingTable::new(
      vec!["Deep_House".into(), "New_Wave".into(), "Synth-pop".into(), "Polka".into()],
      array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6], [0.7, 0.8]],
    )
    .unwrap();
    ReducedCoordinates::new(table, array![[0.0, 0.0], [10.0, 10.0], [5.0, 5.0], [1.0, 2.0]]).unwrap()
  }

  fn tags() -> GenreAssignment {
    [("Deep_House", "Electronic"), ("New_Wave", "Rock"), ("Synth-pop", "Electronic")]
      .into_iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn one_trace_per_tag_in_first_seen_order() {
    let fig = Figure::new(&reduced(), &tags(), "Main Genre", &VisualConfig::default()).unwrap();
    let names: Vec<&str> = fig.data().iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Electronic", "Rock", "Unknown"]);

    let electronic = &fig.data()[0];
    assert_eq!(electronic["type"], "scatter");
    assert_eq!(electronic["text"], json!(["Deep House", "Synth-pop"]));
    assert_eq!(electronic["x"], json!([0.0, 5.0]));
    assert_eq!(electronic["marker"]["color"], "#2E91E5");
    assert_eq!(fig.data()[1]["marker"]["color"], "#E15F99");
    assert_eq!(electronic["mode"], "markers");
    assert!(electronic.get("z").is_none());
  }

  #[test]
  fn viewport_is_applied_to_layout() {
    let visual = VisualConfig {
      init_style: Some("new wave".into()),
      init_margin: Some(20.0),
      ..Default::default()
    };
    let fig = Figure::new(&reduced(), &tags(), "Main Genre", &visual).unwrap();
    assert_eq!(fig.layout()["xaxis"]["range"], json!([9.0, 11.0]));
    assert_eq!(fig.layout()["yaxis"]["range"], json!([9.0, 11.0]));
    assert_eq!(fig.layout()["xaxis"]["title"]["text"], "dim_0");
    assert_eq!(fig.layout()["dragmode"], "pan");
  }

  #[test]
  fn unmatched_focus_leaves_autorange() {
    let visual = VisualConfig {
      init_style: Some("gabber".into()),
      init_margin: Some(20.0),
      ..Default::default()
    };
    let fig = Figure::new(&reduced(), &tags(), "Main Genre", &visual).unwrap();
    assert!(fig.layout()["xaxis"].get("range").is_none());
  }

  #[test]
  fn focus_on_isolated_style_leaves_autorange() {
    let table = reduced().table().clone();
    let coords = ReducedCoordinates::new(
      table,
      array![[0.0, 0.0], [10.0, 10.0], [5.0, 5.0], [f32::NAN, f32::NAN]],
    )
    .unwrap();
    let visual = VisualConfig {
      init_style: Some("polka".into()),
      init_margin: Some(20.0),
      ..Default::default()
    };
    let fig = Figure::new(&coords, &tags(), "Main Genre", &visual).unwrap();
    assert!(fig.layout()["xaxis"].get("range").is_none());
    assert!(fig.layout()["yaxis"].get("range").is_none());
  }

  #[test]
  fn spatial_scene_uses_nested_axes() {
    let table = reduced().table().clone();
    let coords = ReducedCoordinates::new(table, Array2::from_elem((4, 3), 1.0)).unwrap();
    let visual = VisualConfig {
      init_style: Some("polka".into()),
      ..Default::default()
    };
    let fig = Figure::new(&coords, &tags(), "Main Genre", &visual).unwrap();
    assert_eq!(fig.data()[0]["type"], "scatter3d");
    assert_eq!(fig.layout()["scene"]["zaxis"]["range"], json!([1.0, 1.0]));
    assert_eq!(fig.layout()["scene"]["zaxis"]["title"]["text"], "dim_2");
  }

  #[test]
  fn search_data_records_every_column() {
    let fig = Figure::new(&reduced(), &tags(), "Main Genre", &VisualConfig::default()).unwrap();
    let records: Value = serde_json::from_str(fig.search_data()).unwrap();
    let first = &records[0];
    let keys: Vec<&String> = first.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["style", "0", "1", "dim_0", "dim_1", "Main Genre"]);
    assert_eq!(first["style"], "Deep House");
    assert_eq!(records[3]["Main Genre"], "Unknown");
  }

  #[test]
  fn rejects_unknown_drag_mode() {
    let visual = VisualConfig {
      init_dragmode: "lasso".into(),
      ..Default::default()
    };
    let err = Figure::new(&reduced(), &tags(), "Main Genre", &visual).unwrap_err();
    assert!(matches!(err, Error::InvalidDragMode(m) if m == "lasso"));
  }

  #[test]
  fn html_embeds_search_data_before_post_script() {
    let fig = Figure::new(&reduced(), &tags(), "Main Genre", &VisualConfig::default()).unwrap();
    let html = fig.to_html("console.log('</script>');").unwrap();
    assert!(html.contains(PLOTLY_CDN));
    let data_at = html.find("var search_data = [").unwrap();
    let script_at = html.find("console.log('<\\/script>');").unwrap();
    assert!(data_at < script_at);
    assert_eq!(html.matches("</script>").count(), 2);
  }

  #[test]
  fn relayout_expands_dotted_keys() {
    let mut layout = json!({ "xaxis": { "title": { "text": "dim_0" } } });
    apply_relayout(&mut layout, &json!({ "xaxis.range": [1, 2], "scene": { "xaxis": { "range": [0, 1] } } }));
    assert_eq!(
      layout,
      json!({
        "xaxis": { "title": { "text": "dim_0" }, "range": [1, 2] },
        "scene": { "xaxis": { "range": [0, 1] } },
      })
    );
  }
}
