//! Visual similarity search over a categorized image collection.
//!
//! An offline indexer embeds every image of a dataset laid out as
//! `<dataset>/<category>/<image>` and persists the vectors together with their
//! relative paths and categories. At query time an uploaded image is embedded
//! the same way and the collection is ranked by cosine similarity, filtered by
//! a threshold and an optional category, and cut to the top 30.
//!
//! # Architecture
//!
//! - **Embeddings**: MobileNetV2 feature extractor (1280 dimensions) via ONNX Runtime,
//!   behind the [`embedding::EmbeddingCapability`] trait
//! - **Storage**: one SQLite file per [`store::FeatureStore`], rebuilt wholesale
//! - **Search**: exact brute-force cosine scan, stable tie-break on index order
//! - **Transport**: small axum HTTP server, plus a CLI
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`embedding`]: Image decoding, preprocessing and the embedding capability
//! - [`store`]: The aligned embedding matrix + metadata, persistence, live swapping
//! - [`indexer`]: Dataset walk producing a feature store
//! - [`matching`]: Cosine similarity ranking
//! - [`service`]: Async query entry point used by the server and CLI
//! - [`server`]: HTTP routes for matching, upload retrieval and reload
//! - [`cli`]: Indexing, search, stats and model download commands
//! - [`error`]: Typed failures with a stable machine-readable kind

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod matching;
pub mod server;
pub mod service;
pub mod store;

pub use error::{ErrorKind, MatchError};
