//! Directed, asymmetrically weighted style graph.
//!
//! Every unordered co-occurrence pair `(A, B)` with count `C` becomes two
//! edges: `A → B` weighted `C / count(A)` and `B → A` weighted
//! `C / count(B)`. The weight is the conditional frequency of seeing the
//! destination given the source, so a rare style points strongly at the
//! common styles it rides along with while the reverse edge stays weak.

use crate::counts::OccurrencePair;
use crate::counts::SingleCounts;
use crate::error::Error;
use crate::error::Result;
use crate::fsutil;
use indexmap::IndexMap;
use indexmap::IndexSet;
use serde::Deserialize;
use serde::Serialize;
use sprs::CsMatI;
use std::path::Path;
use tracing::info;

/// Sparse adjacency with u32 indices; `adjacency[i, j]` is the weight of `i → j`.
pub type Adjacency = CsMatI<f32, u32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectedEdge {
  pub src: String,
  pub dst: String,
  pub weight: f32,
}

fn singleton(singles: &SingleCounts, label: &str) -> Result<u64> {
  match singles.get(label) {
    None => Err(Error::MissingSingleton(label.to_string())),
    Some(0) => Err(Error::ZeroCount(format!("style {label:?}"))),
    Some(&count) => Ok(count),
  }
}

fn conditional(pair: &OccurrencePair, label: &str, single: u64) -> Result<f32> {
  if pair.count > single {
    return Err(Error::InconsistentCounts {
      a: pair.a.clone(),
      b: pair.b.clone(),
      label: label.to_string(),
      pair: pair.count,
      single,
    });
  }
  Ok((pair.count as f64 / single as f64) as f32)
}

/// Derive both directed edges of every pair, in input order.
///
/// Counters must be mutually consistent: every label of a pair needs a
/// non-zero singleton count at least as large as the pair count, and pair
/// counts must be non-zero. Any violation aborts the whole build.
pub fn build_edges(pairs: &[OccurrencePair], singles: &SingleCounts) -> Result<Vec<DirectedEdge>> {
  let mut edges = Vec::with_capacity(pairs.len() * 2);
  for pair in pairs {
    if pair.count == 0 {
      return Err(Error::ZeroCount(format!("pair ({:?}, {:?})", pair.a, pair.b)));
    }
    let a_pop = singleton(singles, &pair.a)?;
    let b_pop = singleton(singles, &pair.b)?;
    edges.push(DirectedEdge {
      src: pair.a.clone(),
      dst: pair.b.clone(),
      weight: conditional(pair, &pair.a, a_pop)?,
    });
    edges.push(DirectedEdge {
      src: pair.b.clone(),
      dst: pair.a.clone(),
      weight: conditional(pair, &pair.b, b_pop)?,
    });
  }
  Ok(edges)
}

/// Write the edge list as CSV with a leading unnamed row-index column.
pub fn write_edges_csv(path: &Path, edges: &[DirectedEdge]) -> Result<()> {
  let mut out = csv::Writer::from_writer(fsutil::create(path)?);
  out.write_record(["", "src", "dst", "weight"])?;
  for (i, edge) in edges.iter().enumerate() {
    out.write_record([
      i.to_string(),
      edge.src.clone(),
      edge.dst.clone(),
      edge.weight.to_string(),
    ])?;
  }
  out.flush().map_err(Error::io(path))
}

pub fn read_edges_csv(path: &Path) -> Result<Vec<DirectedEdge>> {
  let mut input = csv::Reader::from_reader(fsutil::open(path)?);
  let mut edges = Vec::new();
  for record in input.records() {
    let record = record?;
    let field = |i: usize| {
      record
        .get(i)
        .ok_or_else(|| Error::MalformedTable(format!("edge row has {} fields", record.len())))
    };
    let weight = field(3)?
      .parse::<f32>()
      .map_err(|e| Error::MalformedTable(format!("edge weight: {e}")))?;
    edges.push(DirectedEdge {
      src: field(1)?.to_string(),
      dst: field(2)?.to_string(),
      weight,
    });
  }
  Ok(edges)
}

/// Immutable directed graph over style labels.
///
/// Nodes are numbered in first-seen order over the edge list (source before
/// destination). Repeating an `(src, dst)` edge replaces its weight rather
/// than adding a parallel edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleGraph {
  nodes: IndexSet<String>,
  adjacency: Adjacency,
}

impl StyleGraph {
  pub fn from_edges(edges: &[DirectedEdge]) -> Self {
    let mut nodes = IndexSet::new();
    let mut weights: IndexMap<(u32, u32), f32> = IndexMap::new();
    for edge in edges {
      let (src, _) = nodes.insert_full(edge.src.clone());
      let (dst, _) = nodes.insert_full(edge.dst.clone());
      weights.insert((src as u32, dst as u32), edge.weight);
    }

    let n = nodes.len();
    let mut rows: Vec<Vec<(u32, f32)>> = vec![Vec::new(); n];
    for (&(src, dst), &weight) in &weights {
      rows[src as usize].push((dst, weight));
    }

    let mut indptr = Vec::with_capacity(n + 1);
    let mut indices = Vec::with_capacity(weights.len());
    let mut data = Vec::with_capacity(weights.len());
    indptr.push(0u32);
    for row in &mut rows {
      row.sort_unstable_by_key(|&(dst, _)| dst);
      for &(dst, weight) in row.iter() {
        indices.push(dst);
        data.push(weight);
      }
      indptr.push(indices.len() as u32);
    }

    let adjacency = CsMatI::new((n, n), indptr, indices, data);
    info!(nodes = n, edges = adjacency.nnz(), "built style graph");
    Self { nodes, adjacency }
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  pub fn edge_count(&self) -> usize {
    self.adjacency.nnz()
  }

  pub fn labels(&self) -> impl ExactSizeIterator<Item = &str> {
    self.nodes.iter().map(String::as_str)
  }

  pub fn label(&self, node: u32) -> &str {
    &self.nodes[node as usize]
  }

  pub fn index_of(&self, label: &str) -> Option<u32> {
    self.nodes.get_index_of(label).map(|i| i as u32)
  }

  /// Out-neighbours of `node`, sorted by index, with their edge weights.
  pub fn out_edges(&self, node: u32) -> (&[u32], &[f32]) {
    let range = self.adjacency.indptr().outer_inds_sz(node as usize);
    (
      &self.adjacency.indices()[range.clone()],
      &self.adjacency.data()[range],
    )
  }

  pub fn has_edge(&self, src: u32, dst: u32) -> bool {
    self.out_edges(src).0.binary_search(&dst).is_ok()
  }

  pub fn weight(&self, src: &str, dst: &str) -> Option<f32> {
    let src = self.index_of(src)?;
    let dst = self.index_of(dst)?;
    let (targets, weights) = self.out_edges(src);
    targets.binary_search(&dst).ok().map(|i| weights[i])
  }

  pub fn save(&self, path: &Path) -> Result<()> {
    fsutil::write_bincode(path, self)
  }

  pub fn load(path: &Path) -> Result<Self> {
    fsutil::read_bincode(path)
  }
}
