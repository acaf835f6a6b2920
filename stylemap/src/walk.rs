use crate::config::Node2VecParams;
use crate::config::Word2VecParams;
use crate::error::Error;
use crate::error::Result;
use crate::graph::StyleGraph;
use crate::keyed_vectors::KeyedVectors;
use crate::word2vec::Word2Vec;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::time::Instant;
use tracing::info;
use typed_builder::TypedBuilder;

/*
  Generate second-order biased random walks over a weighted directed graph.

  Parameters
  ----------
  graph: StyleGraph
      Edge weights are used as unnormalized transition probabilities.

  walk_length: int
      Maximum number of nodes per walk, including the start node. A walk
      stops early when it reaches a node without out-edges.

  num_walks: int
      Number of rounds. Each round starts one walk from every node, in an
      order shuffled per round.

  p: float
      Return parameter. Stepping back to the previous node is weighted w / p.

  q: float
      In-out parameter. Stepping to a node that the previous node has no edge
      to is weighted w / q. Nodes adjacent to the previous node keep w.

  workers: int
      Size of the thread pool. Every walk owns an RNG seeded from
      (seed, round, start node), so the output does not depend on it.

  Returns
  -------
  walks: list of node index sequences, grouped by round.
*/
#[derive(TypedBuilder, Debug)]
pub struct RandomWalks<'g> {
  graph: &'g StyleGraph,
  #[builder(default = 80)]
  walk_length: usize,
  #[builder(default = 10)]
  num_walks: usize,
  #[builder(default = 1.0)]
  p: f64,
  #[builder(default = 1.0)]
  q: f64,
  #[builder(default = 1)]
  workers: usize,
  #[builder(default = 42)]
  seed: u64,
}

impl<'g> RandomWalks<'g> {
  pub fn exec(self) -> Result<Vec<Vec<u32>>> {
    let RandomWalks {
      graph,
      walk_length,
      num_walks,
      p,
      q,
      workers,
      seed,
    } = self;

    if !(p > 0.0 && q > 0.0) {
      return Err(Error::InvalidParameter(format!("p and q must be positive, got p={p} q={q}")));
    }
    if walk_length == 0 || workers == 0 {
      return Err(Error::InvalidParameter(
        "walk_length and workers must be at least 1".into(),
      ));
    }

    let started = Instant::now();
    let n = graph.node_count() as u32;
    let mut jobs = Vec::with_capacity(n as usize * num_walks);
    for round in 0..num_walks {
      let mut order: Vec<u32> = (0..n).collect();
      order.shuffle(&mut StdRng::seed_from_u64(job_seed(seed, round, u32::MAX)));
      jobs.extend(order.into_iter().map(|start| (round, start)));
    }

    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
    let walks: Vec<Vec<u32>> = pool.install(|| {
      jobs
        .par_iter()
        .map(|&(round, start)| {
          let mut rng = StdRng::seed_from_u64(job_seed(seed, round, start));
          walk_from(graph, start, walk_length, p, q, &mut rng)
        })
        .collect()
    });

    info!(
      duration_ms = started.elapsed().as_millis(),
      walks = walks.len(),
      nodes = n,
      workers,
      "random walks complete"
    );
    Ok(walks)
  }
}

fn job_seed(seed: u64, round: usize, start: u32) -> u64 {
  seed
    .wrapping_mul(0x9E37_79B9_7F4A_7C15)
    .wrapping_add(((round as u64) << 32) | start as u64)
}

fn walk_from(
  graph: &StyleGraph,
  start: u32,
  walk_length: usize,
  p: f64,
  q: f64,
  rng: &mut StdRng,
) -> Vec<u32> {
  let mut walk = Vec::with_capacity(walk_length);
  walk.push(start);
  let mut bias = Vec::new();

  while walk.len() < walk_length {
    let cur = walk[walk.len() - 1];
    let (targets, weights) = graph.out_edges(cur);
    if targets.is_empty() {
      break;
    }

    bias.clear();
    match walk.len().checked_sub(2).map(|i| walk[i]) {
      None => bias.extend(weights.iter().map(|&w| w as f64)),
      Some(prev) => bias.extend(targets.iter().zip(weights).map(|(&dst, &w)| {
        let w = w as f64;
        if dst == prev {
          w / p
        } else if graph.has_edge(prev, dst) {
          w
        } else {
          w / q
        }
      })),
    }

    match sample_weighted(&bias, rng) {
      Some(i) => walk.push(targets[i]),
      None => break,
    }
  }
  walk
}

fn sample_weighted(weights: &[f64], rng: &mut StdRng) -> Option<usize> {
  let total: f64 = weights.iter().sum();
  if !(total > 0.0) {
    return None;
  }
  let mut x = rng.random::<f64>() * total;
  for (i, &w) in weights.iter().enumerate() {
    if x < w {
      return Some(i);
    }
    x -= w;
  }
  // Rounding can leave a sliver past the last bucket.
  weights.iter().rposition(|&w| w > 0.0)
}

/// Graph embedding: biased walks over the style graph, then skip-gram
/// training on the walks as sentences.
pub struct Node2Vec {
  params: Node2VecParams,
}

impl Node2Vec {
  pub fn new(params: Node2VecParams) -> Self {
    Self { params }
  }

  pub fn walks(&self, graph: &StyleGraph) -> Result<Vec<Vec<u32>>> {
    let params = &self.params;
    RandomWalks::builder()
      .graph(graph)
      .walk_length(params.walk_length)
      .num_walks(params.num_walks)
      .p(params.p)
      .q(params.q)
      .workers(params.workers)
      .seed(params.word2vec.seed)
      .build()
      .exec()
  }

  /// Walks rendered as label sequences.
  pub fn sentences(&self, graph: &StyleGraph) -> Result<Vec<Vec<String>>> {
    Ok(
      self
        .walks(graph)?
        .into_iter()
        .map(|walk| walk.into_iter().map(|n| graph.label(n).to_string()).collect())
        .collect(),
    )
  }

  pub fn fit(&self, graph: &StyleGraph) -> Result<KeyedVectors> {
    let sentences = self.sentences(graph)?;
    let word2vec = Word2VecParams {
      vector_size: self.params.dimensions,
      ..self.params.word2vec.clone()
    };
    Word2Vec::new(word2vec).train(&sentences)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::DirectedEdge;

  fn edge(src: &str, dst: &str, weight: f32) -> DirectedEdge {
    DirectedEdge {
      src: src.into(),
      dst: dst.into(),
      weight,
    }
  }

  fn ring() -> StyleGraph {
    let names = ["A", "B", "C", "D", "E", "F"];
    let mut edges = Vec::new();
    for i in 0..names.len() {
      let j = (i + 1) % names.len();
      edges.push(edge(names[i], names[j], 0.5));
      edges.push(edge(names[j], names[i], 0.5));
    }
    StyleGraph::from_edges(&edges)
  }

  #[test]
  fn walks_follow_edges_and_respect_length() {
    let graph = ring();
    let walks = RandomWalks::builder()
      .graph(&graph)
      .walk_length(7)
      .num_walks(3)
      .build()
      .exec()
      .unwrap();
    assert_eq!(walks.len(), 18);
    for walk in &walks {
      assert_eq!(walk.len(), 7);
      for step in walk.windows(2) {
        assert!(graph.has_edge(step[0], step[1]));
      }
    }
  }

  #[test]
  fn dead_ends_stop_the_walk() {
    let graph = StyleGraph::from_edges(&[edge("A", "B", 1.0)]);
    let walks = RandomWalks::builder().graph(&graph).num_walks(1).build().exec().unwrap();
    let a = graph.index_of("A").unwrap();
    let b = graph.index_of("B").unwrap();
    assert!(walks.contains(&vec![a, b]));
    assert!(walks.contains(&vec![b]));
  }

  #[test]
  fn output_does_not_depend_on_worker_count() {
    let graph = ring();
    let run = |workers| {
      RandomWalks::builder()
        .graph(&graph)
        .walk_length(20)
        .workers(workers)
        .q(0.5)
        .build()
        .exec()
        .unwrap()
    };
    assert_eq!(run(1), run(4));
  }

  #[test]
  fn small_return_parameter_bounces_back() {
    let graph = ring();
    let walks = RandomWalks::builder()
      .graph(&graph)
      .walk_length(12)
      .p(1e-9)
      .build()
      .exec()
      .unwrap();
    for walk in &walks {
      for w in walk.windows(3) {
        assert_eq!(w[0], w[2]);
      }
    }
  }

  #[test]
  fn rejects_non_positive_bias() {
    let graph = ring();
    let err = RandomWalks::builder().graph(&graph).q(0.0).build().exec().unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
  }

  #[test]
  fn fit_embeds_every_reachable_node() {
    let graph = ring();
    let params = Node2VecParams {
      dimensions: 4,
      walk_length: 10,
      num_walks: 2,
      ..Default::default()
    };
    let kv = Node2Vec::new(params).fit(&graph).unwrap();
    assert_eq!(kv.len(), 6);
    assert_eq!(kv.vector_size(), 4);
    assert!(kv.get("C").is_some());
  }
}
