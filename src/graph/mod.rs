//! Graph store collaborators
//!
//! The graph store itself is external. This module owns the two things the
//! router needs from it: a per-run connection handle and the schema text the
//! query generators work against.

pub mod connection;
pub mod schema;

pub use connection::{ConnectionGuard, GraphConnector, GraphSession, Neo4jHttpConnector};
pub use schema::{MarkdownSchemaProvider, SchemaProvider};
