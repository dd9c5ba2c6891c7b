//! Gridstream
//!
//! Incremental columnar queries over registered table sources, and a
//! virtualized grid that consumes them window by window.
//!
//! Module organization:
//! - `datatable`: shared data model, handles, filters and the wire format
//! - `server`: source registry, windowed fetch, table builder and reaper
//! - `grid`: columnar cache, prefetch controller and the table session
//! - `config`: table, server and viewport configuration

pub mod config;
pub mod datatable;
pub mod grid;
pub mod server;
