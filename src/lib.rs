//! Cinegraph: SQL Server to Neo4j export of film credits
//!
//! This crate reloads a Neo4j graph from three relational tables:
//!
//! 1. **Films** -- every `TFilm` row becomes a `Film` node keyed by `idFilm`
//! 2. **Artists** -- every `tArtist` row becomes an `Artist` node keyed by `idArtist`
//! 3. **Relationships** -- every `tJob` row whose category is one of `acted in`,
//!    `directed`, `produced` or `composed` becomes an `ACTED_IN`, `DIRECTED`,
//!    `PRODUCED` or `COMPOSED` relationship from the artist to the film
//!
//! Each run is a full refresh: existing `Film`/`Artist` nodes and all
//! relationships are deleted first. Phases run strictly in order because
//! relationships match both endpoints by key property.
//!
//! # Architecture
//!
//! - **Paged extraction** -- rows are streamed from SQL Server and cut into pages
//!   of [`config::BATCH_SIZE`] rows; nothing else is buffered
//! - **One bulk call per page** -- `UNWIND` queries create a page's nodes, or a
//!   page's relationships of one type, in a single round trip
//! - **Keep going on batch errors** -- a failed bulk call is logged, recorded in
//!   the [`stats::RunReport`] and the phase continues with the next page
//! - **Pluggable stores** -- the pipeline is generic over
//!   [`source::RelationalSource`] and [`graph::GraphSink`]
//!
//! # Key Modules
//!
//! - [`pipeline`] -- Phase orchestration and failure accounting
//! - [`source`] -- Paged reads from SQL Server via tiberius
//! - [`transform`] -- Row decoding, node records and relationship grouping
//! - [`graph`] -- Neo4j bulk writes via neo4rs
//! - [`progress`] -- Per-batch progress lines
//! - [`models`] -- Row, node and relationship types
//! - [`stats`] -- Phase and run reports
//! - [`config`] -- Connection settings and constants
//!
//! # Example Usage
//!
//! ```bash
//! # Connection settings come from the environment or a .env file
//! export TPBDD_SERVER=tcp:myserver.database.windows.net
//! export TPBDD_NEO4J_SERVER=bolt://localhost:7687
//! cinegraph -v
//! ```

pub mod config;
pub mod graph;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod source;
pub mod stats;
pub mod transform;
