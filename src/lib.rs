pub mod cancel;
pub mod combinators;
pub mod config;
pub mod element;
pub mod error;
pub mod paged;
pub mod paginator;
pub mod source;
pub mod stream;

// Re-export the main entry points at the crate root
pub use cancel::CancelToken;
pub use combinators::{
    collect_partial, collect_to_vec, filter, flat_map, for_each, for_each_async, into_results,
    map, try_map,
};
pub use config::{PagingConfig, DEFAULT_PAGE_SIZE};
pub use element::Element;
pub use error::{ConfigError, SourceError, SourceResult, StreamError, StreamResult};
pub use paged::{session_stream, stream_paged_query, QueryOf, RowOf};
pub use paginator::{PageWindow, Paginator};
pub use source::{DataSource, MemoryQuery, MemorySource, Session};
pub use stream::{create_stream, ElementStream, StreamSink};
