//! Embeddings of music style tags, learned from how styles co-occur on
//! catalog records, projected to 2D or 3D with UMAP and rendered as an
//! interactive plotly page.
//!
//! The pipeline runs in separate stages that communicate through files:
//!
//! 1. [`pipeline::count_styles`] streams a gzipped catalog dump and saves
//!    pair, singleton and per-style genre counts.
//! 2. Either [`pipeline::run_node2vec`], which builds a weighted directed
//!    graph from the counts and trains skip-gram on biased random walks, or
//!    [`pipeline::run_word2vec`], which trains directly on the style lists of
//!    each record. Both save an [`EmbeddingTable`].
//! 3. [`pipeline::run_visual`] projects the table, colours each style by its
//!    dominant genre and writes standalone HTML.
//!
//! # Example
//!
//! ```ignore
//! use stylemap::pipeline;
//! use stylemap::pipeline::Algorithm;
//! use stylemap::pipeline::DataPaths;
//! use stylemap::pipeline::RenderJob;
//! use stylemap::Node2VecParams;
//!
//! let paths = DataPaths::builder().base_dir("data").search_type("masters").build();
//! pipeline::count_styles(&paths)?;
//! pipeline::run_node2vec(&paths, &Node2VecParams::default())?;
//! pipeline::run_visual(&paths, Algorithm::Node2Vec, &RenderJob::published(), None)?;
//! ```
//!
//! Every stochastic step is seeded, so the same inputs and parameters give
//! the same outputs.

pub mod catalog;
pub mod config;
pub mod counts;
pub mod error;
pub mod graph;
pub mod keyed_vectors;
pub mod pipeline;
pub mod projection;
pub mod render;
pub mod table;
pub mod viewport;
pub mod walk;
pub mod word2vec;

mod fsutil;

pub use catalog::CatalogRecord;
pub use catalog::SentenceSource;
pub use catalog::StyleCorpus;
pub use config::Architecture;
pub use config::DistanceMetric;
pub use config::GraphParams;
pub use config::ManifoldParams;
pub use config::Node2VecParams;
pub use config::OptimizationParams;
pub use config::ProjectionConfig;
pub use config::VisualConfig;
pub use config::Word2VecParams;
pub use counts::CatalogCounters;
pub use counts::GenreAssignment;
pub use counts::OccurrencePair;
pub use error::Error;
pub use error::Result;
pub use graph::StyleGraph;
pub use keyed_vectors::KeyedVectors;
pub use projection::project;
pub use projection::LearnedManifold;
pub use projection::ProjectionEngine;
pub use render::Scene;
pub use table::EmbeddingTable;
pub use table::ReducedCoordinates;
pub use viewport::Viewport;
pub use walk::Node2Vec;
pub use word2vec::Word2Vec;

#[cfg(test)]
mod tests;
