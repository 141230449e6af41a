//! HTTP API for sequence search.
//!
//! ## Starting the Server
//!
//! ```text
//! # Start on default port 8080 with the embedded catalog
//! flashmap serve
//!
//! # Custom catalog and port
//! flashmap serve --catalog indexes.json --port 3000
//!
//! # Bind to all interfaces
//! flashmap serve --address 0.0.0.0
//! ```
//!
//! ## API Endpoints
//!
//! - `POST /api/search` - Search a query against an index (JSON body:
//!   `querySequence`, `indexName`, `substitutionRate`, optional `mode` and
//!   `fragmentSize`)
//! - `GET /api/indexes` - List the indexes in the catalog
//! - `GET /api/health` - Liveness check

pub mod server;
