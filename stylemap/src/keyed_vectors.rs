use crate::error::Error;
use crate::error::Result;
use crate::fsutil;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Trained vectors with their vocabulary.
///
/// Row `i` of `vectors` belongs to `index_to_key[i]`; the vocabulary order is
/// the trainer's (descending frequency).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyedVectors {
  index_to_key: Vec<String>,
  vectors: Array2<f32>,
  #[serde(skip)]
  key_to_index: HashMap<String, usize>,
}

impl KeyedVectors {
  pub fn new(index_to_key: Vec<String>, vectors: Array2<f32>) -> Result<Self> {
    if index_to_key.len() != vectors.nrows() {
      return Err(Error::MalformedTable(format!(
        "{} keys for {} vectors",
        index_to_key.len(),
        vectors.nrows()
      )));
    }
    let key_to_index = index_keys(&index_to_key);
    if key_to_index.len() != index_to_key.len() {
      return Err(Error::MalformedTable("duplicate keys".into()));
    }
    Ok(Self {
      index_to_key,
      vectors,
      key_to_index,
    })
  }

  pub fn index_to_key(&self) -> &[String] {
    &self.index_to_key
  }

  pub fn vectors(&self) -> ArrayView2<'_, f32> {
    self.vectors.view()
  }

  pub fn len(&self) -> usize {
    self.index_to_key.len()
  }

  pub fn is_empty(&self) -> bool {
    self.index_to_key.is_empty()
  }

  pub fn vector_size(&self) -> usize {
    self.vectors.ncols()
  }

  pub fn get(&self, key: &str) -> Option<ArrayView1<'_, f32>> {
    self.key_to_index.get(key).map(|&i| self.vectors.row(i))
  }

  pub fn save(&self, path: &Path) -> Result<()> {
    fsutil::write_bincode(path, self)
  }

  pub fn load(path: &Path) -> Result<Self> {
    let mut kv: Self = fsutil::read_bincode(path)?;
    kv.key_to_index = index_keys(&kv.index_to_key);
    Ok(kv)
  }
}

fn index_keys(keys: &[String]) -> HashMap<String, usize> {
  keys.iter().enumerate().map(|(i, k)| (k.clone(), i)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;

  #[test]
  fn lookup_and_native_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("embedding_masters.kv");
    let kv = KeyedVectors::new(
      vec!["Techno".into(), "House".into()],
      array![[1.0, 2.0], [3.0, 4.0]],
    )
    .unwrap();
    kv.save(&path).unwrap();

    let loaded = KeyedVectors::load(&path).unwrap();
    assert_eq!(loaded.index_to_key(), kv.index_to_key());
    assert_eq!(loaded.get("House").unwrap().to_vec(), vec![3.0, 4.0]);
    assert!(loaded.get("Polka").is_none());
  }

  #[test]
  fn rejects_mismatched_shapes_and_duplicates() {
    assert!(KeyedVectors::new(vec!["A".into()], Array2::zeros((2, 3))).is_err());
    assert!(KeyedVectors::new(vec!["A".into(), "A".into()], Array2::zeros((2, 3))).is_err());
  }
}
