//! Data source seam for paged streaming
//!
//! A [`DataSource`] opens a [`Session`]: one transactional scope under which
//! every page of a stream is fetched. The paging loop commits the session
//! after the last page and rolls it back on any failure or cancellation.

pub mod memory;

use async_trait::async_trait;

use crate::error::SourceResult;
use crate::paginator::PageWindow;

pub use memory::{MemoryQuery, MemorySession, MemorySource, SessionStats};

/// Something that can open transactional sessions
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    type Session: Session;

    /// Open a session; all pages of one stream are fetched through it
    async fn open_session(&self) -> SourceResult<Self::Session>;
}

/// One transactional scope against a data source
#[async_trait]
pub trait Session: Send + 'static {
    /// Query shape, including its explicit ordering
    type Query: Send + Sync + 'static;

    /// Row type produced by a fetch
    type Row: Send + 'static;

    /// Execute `query` restricted to `window` and return the rows in query order
    async fn fetch_page(
        &mut self,
        query: &Self::Query,
        window: PageWindow,
    ) -> SourceResult<Vec<Self::Row>>;

    async fn commit(self) -> SourceResult<()>;

    async fn rollback(self) -> SourceResult<()>;
}
