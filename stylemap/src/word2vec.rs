//! Word-embedding training with negative sampling.
//!
//! Tokens that share contexts end up with similar vectors. The trainer makes
//! one vocabulary pass and then `epochs` training passes over a
//! [`SentenceSource`], so the corpus is streamed rather than held in memory.

use crate::catalog::SentenceSource;
use crate::config::Architecture;
use crate::config::Word2VecParams;
use crate::error::Error;
use crate::error::Result;
use crate::keyed_vectors::KeyedVectors;
use indexmap::IndexMap;
use ndarray::Array1;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;
use tracing::info;

/// Beyond this dot product the sigmoid is treated as saturated.
const MAX_EXP: f32 = 6.0;

/// Tokens kept for training, most frequent first. Ties keep first-seen order.
#[derive(Debug, Clone)]
pub struct Vocabulary {
  keys: Vec<String>,
  counts: Vec<u64>,
  index: HashMap<String, u32>,
}

impl Vocabulary {
  pub fn scan<S: SentenceSource + ?Sized>(source: &S, min_count: u64) -> Result<Self> {
    let mut seen: IndexMap<String, u64> = IndexMap::new();
    for sentence in source.sentences()? {
      for token in sentence? {
        *seen.entry(token).or_default() += 1;
      }
    }
    let raw_tokens = seen.len();

    let mut kept: Vec<(String, u64)> = seen.into_iter().filter(|&(_, c)| c >= min_count).collect();
    if kept.is_empty() {
      return Err(Error::EmptyVocabulary(min_count));
    }
    kept.sort_by(|a, b| b.1.cmp(&a.1));
    debug!(raw_tokens, kept = kept.len(), min_count, "vocabulary scanned");

    let (keys, counts): (Vec<_>, Vec<_>) = kept.into_iter().unzip();
    let index = keys
      .iter()
      .enumerate()
      .map(|(i, k)| (k.clone(), i as u32))
      .collect();
    Ok(Self {
      keys,
      counts,
      index,
    })
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }

  pub fn keys(&self) -> &[String] {
    &self.keys
  }

  pub fn counts(&self) -> &[u64] {
    &self.counts
  }

  pub fn index_of(&self, token: &str) -> Option<u32> {
    self.index.get(token).copied()
  }

  /// Total retained tokens in one pass over the corpus.
  pub fn total(&self) -> u64 {
    self.counts.iter().sum()
  }
}

pub struct Word2Vec {
  params: Word2VecParams,
}

impl Word2Vec {
  pub fn new(params: Word2VecParams) -> Self {
    Self { params }
  }

  /// Build the vocabulary and train vectors for it.
  ///
  /// Out-of-vocabulary tokens are dropped from each sentence before the
  /// context window is applied.
  pub fn train<S: SentenceSource + ?Sized>(&self, source: &S) -> Result<KeyedVectors> {
    let params = &self.params;
    if params.vector_size == 0 {
      return Err(Error::InvalidParameter("vector_size must be > 0".into()));
    }

    let started = Instant::now();
    let vocab = Vocabulary::scan(source, params.min_count)?;
    info!(
      duration_ms = started.elapsed().as_millis(),
      vocabulary = vocab.len(),
      tokens = vocab.total(),
      "vocabulary built"
    );

    let mut state = TrainingState::new(&vocab, params);
    let total_words = (vocab.total() * params.epochs as u64).max(1);
    let mut processed = 0u64;
    let mut ids = Vec::new();

    for epoch in 0..params.epochs {
      let started = Instant::now();
      for sentence in source.sentences()? {
        ids.clear();
        ids.extend(sentence?.iter().filter_map(|t| vocab.index_of(t)));
        let progress = processed as f32 / total_words as f32;
        let alpha = (params.alpha - (params.alpha - params.min_alpha) * progress).max(params.min_alpha);
        state.train_sentence(&ids, alpha, params.architecture);
        processed += ids.len() as u64;
      }
      info!(
        epoch,
        duration_ms = started.elapsed().as_millis(),
        processed,
        "word2vec epoch complete"
      );
    }

    KeyedVectors::new(vocab.keys, state.syn0)
  }
}

struct TrainingState {
  /// Input vectors; these are the embeddings handed back.
  syn0: Array2<f32>,
  /// Output vectors for negative sampling.
  syn1neg: Array2<f32>,
  /// Cumulative unigram^0.75 distribution over the vocabulary.
  cum_table: Vec<f64>,
  neu1e: Array1<f32>,
  window: usize,
  negative: usize,
  rng: StdRng,
}

impl TrainingState {
  fn new(vocab: &Vocabulary, params: &Word2VecParams) -> Self {
    let dim = params.vector_size;
    let mut rng = StdRng::seed_from_u64(params.seed);
    let syn0 = Array2::from_shape_fn((vocab.len(), dim), |_| {
      (rng.random::<f32>() - 0.5) / dim as f32
    });

    let powered: Vec<f64> = vocab.counts().iter().map(|&c| (c as f64).powf(0.75)).collect();
    let norm: f64 = powered.iter().sum();
    let mut running = 0.0;
    let cum_table = powered
      .iter()
      .map(|p| {
        running += p / norm;
        running
      })
      .collect();

    Self {
      syn0,
      syn1neg: Array2::zeros((vocab.len(), dim)),
      cum_table,
      neu1e: Array1::zeros(dim),
      window: params.window.max(1),
      negative: params.negative,
      rng,
    }
  }

  fn sample_negative(&mut self) -> usize {
    let x: f64 = self.rng.random();
    self
      .cum_table
      .partition_point(|&c| c <= x)
      .min(self.cum_table.len() - 1)
  }

  fn train_sentence(&mut self, ids: &[u32], alpha: f32, architecture: Architecture) {
    let mut context = Vec::with_capacity(2 * self.window);
    for pos in 0..ids.len() {
      let span = self.window - self.rng.random_range(0..self.window);
      let start = pos.saturating_sub(span);
      let end = (pos + span + 1).min(ids.len());
      let center = ids[pos] as usize;

      context.clear();
      context.extend((start..end).filter(|&c| c != pos).map(|c| ids[c] as usize));
      if context.is_empty() {
        continue;
      }

      match architecture {
        Architecture::SkipGram => {
          for &other in &context {
            self.train_pair(center, other, alpha);
          }
        }
        Architecture::Cbow => self.train_cbow(&context, center, alpha),
      }
    }
  }

  fn train_pair(&mut self, input: usize, output: usize, alpha: f32) {
    let l1 = self.syn0.row(input).to_owned();
    self.neu1e.fill(0.0);
    self.negative_sampling(&l1, output, alpha);
    self.syn0.row_mut(input).scaled_add(1.0, &self.neu1e);
  }

  fn train_cbow(&mut self, context: &[usize], center: usize, alpha: f32) {
    let mut l1 = Array1::<f32>::zeros(self.syn0.ncols());
    for &c in context {
      l1 += &self.syn0.row(c);
    }
    l1 /= context.len() as f32;

    self.neu1e.fill(0.0);
    self.negative_sampling(&l1, center, alpha);
    for &c in context {
      self.syn0.row_mut(c).scaled_add(1.0, &self.neu1e);
    }
  }

  /// One positive update towards `target` plus `negative` updates away from
  /// sampled tokens. Accumulates the input-side gradient in `neu1e`.
  fn negative_sampling(&mut self, l1: &Array1<f32>, target: usize, alpha: f32) {
    for d in 0..=self.negative {
      let (word, label) = if d == 0 {
        (target, 1.0)
      } else {
        let word = self.sample_negative();
        if word == target {
          continue;
        }
        (word, 0.0)
      };

      let mut out = self.syn1neg.row_mut(word);
      let f = l1.dot(&out);
      let g = if f > MAX_EXP {
        (label - 1.0) * alpha
      } else if f < -MAX_EXP {
        label * alpha
      } else {
        (label - 1.0 / (1.0 + (-f).exp())) * alpha
      };
      self.neu1e.scaled_add(g, &out);
      out.scaled_add(g, l1);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn corpus(groups: &[(&[&str], usize)]) -> Vec<Vec<String>> {
    groups
      .iter()
      .flat_map(|&(tokens, times)| {
        std::iter::repeat(tokens.iter().map(|t| t.to_string()).collect::<Vec<_>>()).take(times)
      })
      .collect()
  }

  fn cosine(a: ndarray::ArrayView1<f32>, b: ndarray::ArrayView1<f32>) -> f32 {
    a.dot(&b) / (a.dot(&a).sqrt() * b.dot(&b).sqrt())
  }

  #[test]
  fn vocabulary_orders_by_frequency_then_first_seen() {
    let sentences = corpus(&[(&["b", "a"], 1), (&["c", "a", "c"], 1), (&["d", "b"], 1)]);
    let vocab = Vocabulary::scan(&sentences, 1).unwrap();
    assert_eq!(vocab.keys(), &["b", "a", "c", "d"]);
    assert_eq!(vocab.counts(), &[2, 2, 2, 1]);

    let pruned = Vocabulary::scan(&sentences, 2).unwrap();
    assert_eq!(pruned.keys(), &["b", "a", "c"]);
    assert_eq!(pruned.index_of("d"), None);
  }

  #[test]
  fn empty_vocabulary_is_an_error() {
    let sentences = corpus(&[(&["a", "b"], 1)]);
    let err = Word2Vec::new(Word2VecParams::default()).train(&sentences).unwrap_err();
    assert!(matches!(err, Error::EmptyVocabulary(5)));
  }

  #[test]
  fn training_is_deterministic() {
    let sentences = corpus(&[(&["a", "b", "c"], 20), (&["x", "y"], 20)]);
    let params = Word2VecParams {
      vector_size: 8,
      min_count: 1,
      epochs: 2,
      ..Default::default()
    };
    let first = Word2Vec::new(params.clone()).train(&sentences).unwrap();
    let second = Word2Vec::new(params).train(&sentences).unwrap();
    assert_eq!(first.index_to_key(), second.index_to_key());
    assert_eq!(first.vectors(), second.vectors());
    assert_eq!(first.vectors().shape(), &[5, 8]);
  }

  #[test]
  fn shared_contexts_pull_vectors_together() {
    let sentences = corpus(&[
      (&["house", "techno", "trance"], 150),
      (&["punk", "grunge", "emo"], 150),
    ]);
    for architecture in [Architecture::SkipGram, Architecture::Cbow] {
      let params = Word2VecParams {
        vector_size: 16,
        window: 3,
        min_count: 1,
        epochs: 10,
        architecture,
        ..Default::default()
      };
      let kv = Word2Vec::new(params).train(&sentences).unwrap();
      let v = |k: &str| kv.get(k).unwrap();
      assert!(
        cosine(v("house"), v("techno")) > cosine(v("house"), v("grunge")),
        "{architecture:?}"
      );
    }
  }
}
