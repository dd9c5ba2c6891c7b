//! Consuming side: a virtualized grid over one connection
//!
//! The grid never holds a source, only a descriptor. Rows arrive in windows
//! through a [`FetchTransport`] and accumulate in a [`ColumnarCache`]; the
//! [`TableSession`] decides when to ask for the next window and throws the
//! cache away whenever the connection, filter or sort changes.

pub mod arrangement;
pub mod cache;
pub mod link;
pub mod mapper;
pub mod merge;
pub mod prefetch;
pub mod session;
pub mod sorting;
pub mod transport;
pub mod viewport;

pub use arrangement::ColumnArrangement;
pub use cache::ColumnarCache;
pub use link::{classify_link, Navigation};
pub use mapper::{CoordinateMapper, GridEvent};
pub use merge::merge_columns;
pub use prefetch::{Completion, FetchTicket, PrefetchController, PrefetchState};
pub use session::{QueryKey, TableSession};
pub use sorting::SortState;
pub use transport::{FetchTransport, InProcessTransport};
pub use viewport::{ContainerSize, ContainerTracker, Debouncer, VisibleRegion};
