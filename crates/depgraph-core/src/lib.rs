//! depgraph core library: ingestion of Java source into a persisted code graph.
//!
//! Source units are turned into facts by the tree-sitter front-end
//! ([`indexer`]), classified into entities with deterministic IDs and typed
//! dependency edges ([`classify`], [`identity`]), and reconciled against the
//! SQLite store by the upsert engine ([`reconcile`], [`store`]).  With the
//! `python` feature the crate also builds as a Python extension module
//! (`depgraph_core`) via PyO3.

pub mod classify;
pub mod config;
pub mod errors;
pub mod facts;
pub mod identity;
pub mod indexer;
pub mod models;
pub mod reconcile;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use classify::{classify, Classified, Classifier};
pub use errors::{GraphError, GraphResult};
pub use reconcile::UpsertEngine;
pub use store::Database;
