//! Occurrence counters over catalog records.
//!
//! Pair counts, singleton counts and per-style genre counters are produced
//! once by [`CatalogCounters`] and persisted as JSON; the graph stage and the
//! visualization stage each reload the files they need.

use crate::catalog::to_token;
use crate::catalog::CatalogRecord;
use crate::error::Result;
use crate::fsutil;
use indexmap::IndexMap;
use indexmap::IndexSet;
use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Unordered pair of styles and how many records carry both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, u64)", into = "(String, String, u64)")]
pub struct OccurrencePair {
  pub a: String,
  pub b: String,
  pub count: u64,
}

impl OccurrencePair {
  pub fn new(a: impl Into<String>, b: impl Into<String>, count: u64) -> Self {
    Self {
      a: a.into(),
      b: b.into(),
      count,
    }
  }
}

impl From<(String, String, u64)> for OccurrencePair {
  fn from((a, b, count): (String, String, u64)) -> Self {
    Self { a, b, count }
  }
}

impl From<OccurrencePair> for (String, String, u64) {
  fn from(p: OccurrencePair) -> Self {
    (p.a, p.b, p.count)
  }
}

/// Total number of records each style occurs on.
pub type SingleCounts = IndexMap<String, u64>;

/// Style → dominant genre, used for coloring only.
pub type GenreAssignment = IndexMap<String, String>;

/// Per-style genre counters: how often each genre accompanies the style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenreCounts(pub IndexMap<String, IndexMap<String, u64>>);

impl GenreCounts {
  /// The most frequent genre of every style. Ties go to the genre that was
  /// counted first.
  pub fn dominant_genres(&self) -> GenreAssignment {
    self
      .0
      .iter()
      .filter_map(|(style, genres)| {
        let mut best: Option<(&String, u64)> = None;
        for (genre, &count) in genres {
          if best.map_or(true, |(_, c)| count > c) {
            best = Some((genre, count));
          }
        }
        best.map(|(genre, _)| (style.clone(), genre.clone()))
      })
      .collect()
  }
}

pub fn load_pairs(path: &Path) -> Result<Vec<OccurrencePair>> {
  fsutil::read_json(path)
}

pub fn save_pairs(path: &Path, pairs: &[OccurrencePair]) -> Result<()> {
  fsutil::write_json(path, pairs)
}

pub fn load_singles(path: &Path) -> Result<SingleCounts> {
  fsutil::read_json(path)
}

pub fn save_singles(path: &Path, singles: &SingleCounts) -> Result<()> {
  fsutil::write_json(path, singles)
}

pub fn load_genres(path: &Path) -> Result<GenreCounts> {
  fsutil::read_json(path)
}

pub fn save_genres(path: &Path, genres: &GenreCounts) -> Result<()> {
  fsutil::write_json(path, genres)
}

/// Accumulates the three counters over a stream of records.
///
/// Labels are stored in token form (spaces replaced by the spacer). A style
/// listed twice on one record counts once. Pair keys are ordered
/// lexicographically so `(A, B)` and `(B, A)` share a counter.
#[derive(Debug, Default)]
pub struct CatalogCounters {
  pairs: IndexMap<(String, String), u64>,
  singles: SingleCounts,
  genres: GenreCounts,
  records: usize,
}

impl CatalogCounters {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn observe(&mut self, record: &CatalogRecord) {
    self.records += 1;
    let styles: IndexSet<String> = record.styles.iter().map(|s| to_token(s)).collect();
    let genres: IndexSet<String> = record.genres.iter().map(|g| to_token(g)).collect();

    for style in &styles {
      *self.singles.entry(style.clone()).or_default() += 1;
      let per_style = self.genres.0.entry(style.clone()).or_default();
      for genre in &genres {
        *per_style.entry(genre.clone()).or_default() += 1;
      }
    }

    for (a, b) in styles.iter().sorted().tuple_combinations() {
      *self.pairs.entry((a.clone(), b.clone())).or_default() += 1;
    }
  }

  /// Count every record of `records`, stopping at the first read error.
  pub fn from_records<I>(records: I) -> Result<Self>
  where
    I: IntoIterator<Item = Result<CatalogRecord>>,
  {
    let started = Instant::now();
    let mut counters = Self::new();
    for record in records {
      counters.observe(&record?);
    }
    info!(
      duration_ms = started.elapsed().as_millis(),
      records = counters.records,
      styles = counters.singles.len(),
      pairs = counters.pairs.len(),
      "counted catalog"
    );
    Ok(counters)
  }

  pub fn records(&self) -> usize {
    self.records
  }

  pub fn singles(&self) -> &SingleCounts {
    &self.singles
  }

  pub fn genres(&self) -> &GenreCounts {
    &self.genres
  }

  pub fn pairs(&self) -> Vec<OccurrencePair> {
    self
      .pairs
      .iter()
      .map(|((a, b), &count)| OccurrencePair::new(a.clone(), b.clone(), count))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(styles: &[&str], genres: &[&str]) -> CatalogRecord {
    CatalogRecord {
      styles: styles.iter().map(|s| s.to_string()).collect(),
      genres: genres.iter().map(|s| s.to_string()).collect(),
    }
  }

  #[test]
  fn counts_pairs_singles_and_genres() {
    let counters = CatalogCounters::from_records(vec![
      Ok(record(&["Techno", "Deep House"], &["Electronic"])),
      Ok(record(&["Deep House", "Techno", "Techno"], &["Electronic", "Pop"])),
      Ok(record(&["Punk"], &["Rock"])),
    ])
    .unwrap();

    assert_eq!(counters.records(), 3);
    assert_eq!(
      counters.pairs(),
      vec![OccurrencePair::new("Deep_House", "Techno", 2)]
    );
    assert_eq!(counters.singles()["Techno"], 2);
    assert_eq!(counters.singles()["Punk"], 1);
    assert_eq!(counters.genres().0["Deep_House"]["Electronic"], 2);
    assert_eq!(counters.genres().0["Deep_House"]["Pop"], 1);
  }

  #[test]
  fn dominant_genre_prefers_first_on_ties() {
    let mut genres = GenreCounts::default();
    genres.0.insert(
      "Synth-pop".into(),
      IndexMap::from([("Pop".to_string(), 3), ("Electronic".to_string(), 3)]),
    );
    genres.0.insert(
      "Techno".into(),
      IndexMap::from([("Pop".to_string(), 1), ("Electronic".to_string(), 7)]),
    );
    genres.0.insert("Orphan".into(), IndexMap::new());

    let dominant = genres.dominant_genres();
    assert_eq!(dominant["Synth-pop"], "Pop");
    assert_eq!(dominant["Techno"], "Electronic");
    assert!(!dominant.contains_key("Orphan"));
  }

  #[test]
  fn pairs_persist_as_triples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairs.json");
    let pairs = vec![OccurrencePair::new("A", "B", 10)];
    save_pairs(&path, &pairs).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"[["A","B",10]]"#);
    assert_eq!(load_pairs(&path).unwrap(), pairs);
  }

  #[test]
  fn first_read_error_stops_counting() {
    let records = vec![
      Ok(record(&["A", "B"], &[])),
      Err(crate::Error::MalformedTable("boom".into())),
    ];
    assert!(CatalogCounters::from_records(records).is_err());
  }
}
