//! Streaming a query result out of a [`DataSource`] one page at a time
//!
//! The producer task opens one session, walks the result with a
//! [`Paginator`] and forwards each page into an [`ElementStream`]. At most
//! `page_size + queue_capacity` rows are held in memory at once.
//!
//! Paging uses limit/offset windows. Under concurrent writes to the queried
//! rows a source without snapshot sessions may skip or repeat rows across
//! page boundaries; sources that need strict consistency should back their
//! sessions with a snapshot or a server-side cursor.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::PagingConfig;
use crate::error::{StreamError, StreamResult};
use crate::paginator::Paginator;
use crate::source::{DataSource, Session};
use crate::stream::{create_stream, ElementStream, StreamSink};

/// Query type accepted by the sessions of `D`
pub type QueryOf<D> = <<D as DataSource>::Session as Session>::Query;

/// Row type produced by the sessions of `D`
pub type RowOf<D> = <<D as DataSource>::Session as Session>::Row;

/// Stream the rows of `query` from `source`, page by page.
///
/// All pages are fetched under one session. On exhaustion (the first empty
/// page) the session is committed and the stream ends without failure. A
/// source error ends the stream with [`StreamError::Source`]; a page that
/// cannot be handed to the consumer before `token` fires ends it with
/// [`StreamError::Cancelled`], and a panicking fetch with
/// [`StreamError::Panicked`]. All of them roll the session back.
///
/// A zero page size or queue capacity is treated as 1.
pub fn stream_paged_query<D>(
    source: Arc<D>,
    config: &PagingConfig,
    query: QueryOf<D>,
    token: CancelToken,
) -> ElementStream<RowOf<D>>
where
    D: DataSource,
{
    let paginator = Paginator::new(config.page_size);
    create_stream(config.effective_queue_capacity(), move |sink| {
        run_session(source, query, paginator, sink, token)
    })
}

/// Body of the producer task: one session, committed or rolled back
async fn run_session<D>(
    source: Arc<D>,
    query: QueryOf<D>,
    paginator: Paginator,
    sink: StreamSink<RowOf<D>>,
    token: CancelToken,
) -> StreamResult<()>
where
    D: DataSource,
{
    let mut session = source.open_session().await.map_err(|err| {
        log::warn!("could not open session for paged stream: {}", err);
        StreamError::Source(err)
    })?;
    log::debug!("paged stream session opened, page size {}", paginator.limit());

    // a panicking fetch must still release the session
    let outcome = AssertUnwindSafe(fetch_pages(&mut session, &query, paginator, &sink, &token))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(StreamError::from_panic(payload)));

    match outcome {
        Ok(rows) => {
            session.commit().await.map_err(|err| {
                log::warn!("commit of paged stream session failed: {}", err);
                StreamError::Source(err)
            })?;
            log::debug!("paged stream committed after {} rows", rows);
            Ok(())
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                log::warn!("rollback of paged stream session failed: {}", rollback_err);
            } else {
                log::debug!("paged stream session rolled back: {}", err);
            }
            Err(err)
        }
    }
}

/// [`stream_paged_query`] without an external deadline
pub fn session_stream<D>(
    source: Arc<D>,
    page_size: usize,
    query: QueryOf<D>,
) -> ElementStream<RowOf<D>>
where
    D: DataSource,
{
    let config = PagingConfig::new().page_size(page_size);
    stream_paged_query(source, &config, query, CancelToken::never())
}

/// Fetch and forward pages until the first empty one; returns the row count
async fn fetch_pages<S>(
    session: &mut S,
    query: &S::Query,
    mut paginator: Paginator,
    sink: &StreamSink<S::Row>,
    token: &CancelToken,
) -> StreamResult<usize>
where
    S: Session,
{
    while paginator.has_next() {
        let window = paginator.scope();

        let rows = tokio::select! {
            biased;
            _ = token.cancelled() => {
                log::error!("breaking transaction: deadline expired while fetching offset {}", window.offset);
                return Err(StreamError::Cancelled);
            }
            fetched = session.fetch_page(query, window) => fetched.map_err(|err| {
                log::warn!("page fetch at offset {} failed: {}", window.offset, err);
                StreamError::Source(err)
            })?,
        };

        paginator.record_page_result(rows.len());

        if !sink.send_batch(rows, token).await {
            if sink.is_closed() {
                log::debug!("paged stream abandoned by consumer at offset {}", window.offset);
            } else {
                log::error!("breaking transaction: page at offset {} not accepted before deadline", window.offset);
            }
            return Err(StreamError::Cancelled);
        }
    }

    Ok(paginator.offset())
}
