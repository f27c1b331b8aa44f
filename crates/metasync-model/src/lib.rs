//! Payload shapes and client boundary for metasync
//!
//! This crate holds the inert value types exchanged between the
//! reconciliation engine and the two metadata systems it pairs:
//!
//! - **Envelopes**: [`EntityEnvelope`] and [`EntityHeader`], a generic view of
//!   one entity as retrieved from either system
//! - **Correlation**: [`CorrelationRecord`], the persisted link between a source
//!   entity and its destination counterpart
//! - **Client boundary**: [`MetadataClient`] and [`CorrelationLinks`], the
//!   operations the engine consumes from each system
//!
//! Nothing in here performs I/O; implementations of the client traits live
//! with whoever owns the transport.

pub mod client;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod side;

pub use client::{CorrelationLinks, DestinationClient, MetadataClient};
pub use correlation::{CorrelationRecord, Provenance};
pub use envelope::{EntityEnvelope, EntityHeader, ParentLink};
pub use error::{ClientError, ClientResult};
pub use side::{Direction, Side};
