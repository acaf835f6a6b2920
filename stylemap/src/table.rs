use crate::error::Error;
use crate::error::Result;
use crate::fsutil;
use crate::keyed_vectors::KeyedVectors;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Name of the label column in persisted embedding tables.
pub const LABEL_COLUMN: &str = "style";

/// Label-indexed embedding matrix; the exchange format between the training
/// and visualization stages.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTable {
  labels: Vec<String>,
  vectors: Array2<f32>,
}

impl EmbeddingTable {
  pub fn new(labels: Vec<String>, vectors: Array2<f32>) -> Result<Self> {
    if labels.len() != vectors.nrows() {
      return Err(Error::MalformedTable(format!(
        "{} labels for {} rows",
        labels.len(),
        vectors.nrows()
      )));
    }
    let mut seen = HashSet::with_capacity(labels.len());
    if let Some(dup) = labels.iter().find(|l| !seen.insert(l.as_str())) {
      return Err(Error::MalformedTable(format!("duplicate label {dup:?}")));
    }
    Ok(Self { labels, vectors })
  }

  /// Rows keep the trainer's vocabulary order.
  pub fn from_keyed_vectors(kv: &KeyedVectors) -> Self {
    Self {
      labels: kv.index_to_key().to_vec(),
      vectors: kv.vectors().to_owned(),
    }
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn vectors(&self) -> ArrayView2<'_, f32> {
    self.vectors.view()
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn dimensions(&self) -> usize {
    self.vectors.ncols()
  }

  pub fn row(&self, i: usize) -> (&str, ArrayView1<'_, f32>) {
    (&self.labels[i], self.vectors.row(i))
  }

  /// Header `style,0,1,...`; one row per label.
  pub fn write_csv(&self, path: &Path) -> Result<()> {
    let mut w = csv::Writer::from_writer(fsutil::create(path)?);
    let mut header = vec![LABEL_COLUMN.to_string()];
    header.extend((0..self.dimensions()).map(|d| d.to_string()));
    w.write_record(&header)?;
    for (label, row) in self.labels.iter().zip(self.vectors.rows()) {
      w.write_field(label)?;
      for v in row {
        w.write_field(v.to_string())?;
      }
      w.write_record(None::<&[u8]>)?;
    }
    w.flush().map_err(Error::io(path))?;
    debug!(path = %path.display(), rows = self.len(), "wrote embedding table");
    Ok(())
  }

  /// Every column other than `style` is read as a vector component, in file
  /// order.
  pub fn read_csv(path: &Path) -> Result<Self> {
    let mut r = csv::ReaderBuilder::new()
      .flexible(true)
      .from_reader(fsutil::open(path)?);
    let header = r.headers()?.clone();
    let label_col = header
      .iter()
      .position(|h| h == LABEL_COLUMN)
      .ok_or_else(|| Error::MalformedTable(format!("no {LABEL_COLUMN:?} column")))?;
    let dims = header.len() - 1;

    let mut labels = Vec::new();
    let mut values = Vec::new();
    for record in r.records() {
      let record = record?;
      if record.len() != header.len() {
        return Err(Error::MalformedTable(format!(
          "row {} has {} fields, expected {}",
          labels.len() + 1,
          record.len(),
          header.len()
        )));
      }
      for (i, field) in record.iter().enumerate() {
        if i == label_col {
          labels.push(field.to_string());
        } else {
          let v = field
            .trim()
            .parse::<f32>()
            .map_err(|e| Error::MalformedTable(format!("{field:?}: {e}")))?;
          values.push(v);
        }
      }
    }

    let vectors = Array2::from_shape_vec((labels.len(), dims), values)
      .map_err(|e| Error::MalformedTable(e.to_string()))?;
    Self::new(labels, vectors)
  }
}

/// An [`EmbeddingTable`] with projected coordinates, columns `dim_0..`.
#[derive(Debug, Clone)]
pub struct ReducedCoordinates {
  table: EmbeddingTable,
  coords: Array2<f32>,
}

impl ReducedCoordinates {
  pub fn new(table: EmbeddingTable, coords: Array2<f32>) -> Result<Self> {
    if coords.nrows() != table.len() {
      return Err(Error::MalformedTable(format!(
        "{} coordinates for {} rows",
        coords.nrows(),
        table.len()
      )));
    }
    Ok(Self { table, coords })
  }

  pub fn table(&self) -> &EmbeddingTable {
    &self.table
  }

  pub fn labels(&self) -> &[String] {
    self.table.labels()
  }

  pub fn coords(&self) -> ArrayView2<'_, f32> {
    self.coords.view()
  }

  pub fn n_components(&self) -> usize {
    self.coords.ncols()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;
  use std::fs;

  fn table() -> EmbeddingTable {
    EmbeddingTable::new(
      vec!["Deep_House".into(), "Techno".into()],
      array![[0.5, -1.0, 2.0], [0.25, 0.0, 3.5]],
    )
    .unwrap()
  }

  #[test]
  fn csv_has_style_column_and_numbered_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("embedding_df_masters.csv");
    table().write_csv(&path).unwrap();
    assert_eq!(
      fs::read_to_string(&path).unwrap(),
      "style,0,1,2\nDeep_House,0.5,-1,2\nTechno,0.25,0,3.5\n"
    );
    assert_eq!(EmbeddingTable::read_csv(&path).unwrap(), table());
  }

  #[test]
  fn keeps_vocabulary_order() {
    let kv = KeyedVectors::new(
      vec!["Techno".into(), "House".into(), "Ambient".into()],
      Array2::zeros((3, 2)),
    )
    .unwrap();
    let t = EmbeddingTable::from_keyed_vectors(&kv);
    assert_eq!(t.labels(), &["Techno", "House", "Ambient"]);
    assert_eq!(t.dimensions(), 2);
  }

  #[test]
  fn rejects_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.csv");

    fs::write(&path, "label,0\nA,1\n").unwrap();
    assert!(matches!(EmbeddingTable::read_csv(&path), Err(Error::MalformedTable(_))));

    fs::write(&path, "style,0\nA,x\n").unwrap();
    assert!(matches!(EmbeddingTable::read_csv(&path), Err(Error::MalformedTable(_))));

    fs::write(&path, "style,0,1\nA,1\n").unwrap();
    assert!(matches!(EmbeddingTable::read_csv(&path), Err(Error::MalformedTable(_))));

    fs::write(&path, "style,0\nA,1\nA,2\n").unwrap();
    assert!(matches!(EmbeddingTable::read_csv(&path), Err(Error::MalformedTable(_))));
  }

  #[test]
  fn coordinates_must_cover_every_row() {
    let reduced = ReducedCoordinates::new(table(), Array2::zeros((2, 3))).unwrap();
    assert_eq!(reduced.n_components(), 3);
    assert!(ReducedCoordinates::new(table(), Array2::zeros((1, 2))).is_err());
  }
}
