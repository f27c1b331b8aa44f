//! Shared test utilities for the metasync workspace.
//!
//! This crate provides standardised fixtures so the core, CLI and
//! integration suites describe catalogs the same way. It is a
//! dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`scopes`]: the three canonical scope shapes (databases, glossaries, lineage)
//! - [`seed`]: helpers that populate a [`MemoryCatalog`](metasync_core::MemoryCatalog)
//! - [`faulty`]: [`FaultyClient`], a client wrapper that fails on demand
//! - [`skewed`]: [`SkewedClient`], a client wrapper whose clock runs ahead
//! - [`audit`]: [`RecordingAuditSink`], an audit sink that keeps every event

pub mod audit;
pub mod faulty;
pub mod scopes;
pub mod seed;
pub mod skewed;

pub use audit::RecordingAuditSink;
pub use faulty::{FaultyClient, Operation};
pub use scopes::{database_scope, glossary_scope, lineage_scope};
pub use seed::{Workspace, seed_database, seed_glossary, source_named};
pub use skewed::SkewedClient;
