//! In-memory table implementing [`DataSource`]
//!
//! Sessions read from a snapshot taken when they open, so every page of one
//! stream sees the same rows even if the table is written concurrently.
//! A session filters and sorts its snapshot once per query and serves later
//! pages from that ordering.

use async_trait::async_trait;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{DataSource, Session};
use crate::error::SourceResult;
use crate::paginator::PageWindow;

type Filter<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;
type Comparator<R> = Arc<dyn Fn(&R, &R) -> CmpOrdering + Send + Sync>;

/// Filter plus ordering over a [`MemorySource`]
pub struct MemoryQuery<R> {
    filter: Option<Filter<R>>,
    order: Option<Comparator<R>>,
}

impl<R> MemoryQuery<R> {
    /// Every row, in insertion order
    pub fn all() -> Self {
        Self {
            filter: None,
            order: None,
        }
    }

    /// Keep only rows matching `predicate`; repeated calls are and-ed
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
        R: 'static,
    {
        self.filter = Some(match self.filter.take() {
            Some(previous) => Arc::new(move |row: &R| previous(row) && predicate(row)),
            None => Arc::new(predicate),
        });
        self
    }

    /// Order ascending by `key`; ties keep insertion order
    pub fn order_by_key<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&R) -> K + Send + Sync + 'static,
        R: 'static,
    {
        self.order = Some(Arc::new(move |a: &R, b: &R| key(a).cmp(&key(b))));
        self
    }

    fn matches(&self, row: &R) -> bool {
        self.filter.as_ref().map_or(true, |f| f(row))
    }

    /// True when both queries share the same filter and ordering closures
    fn same_as(&self, other: &Self) -> bool {
        fn same<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        same(&self.filter, &other.filter) && same(&self.order, &other.order)
    }

    /// Positions in `rows` matching the query, in query order
    fn positions(&self, rows: &[R]) -> Vec<usize> {
        let mut positions: Vec<usize> = (0..rows.len()).filter(|&i| self.matches(&rows[i])).collect();
        if let Some(order) = &self.order {
            positions.sort_by(|&a, &b| order(&rows[a], &rows[b]));
        }
        positions
    }
}

impl<R> Clone for MemoryQuery<R> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            order: self.order.clone(),
        }
    }
}

impl<R> fmt::Debug for MemoryQuery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQuery")
            .field("filtered", &self.filter.is_some())
            .field("ordered", &self.order.is_some())
            .finish()
    }
}

/// Session lifecycle counters
#[derive(Debug, Default)]
pub struct SessionStats {
    opened: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
}

impl SessionStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::Acquire)
    }

    pub fn committed(&self) -> usize {
        self.committed.load(Ordering::Acquire)
    }

    pub fn rolled_back(&self) -> usize {
        self.rolled_back.load(Ordering::Acquire)
    }

    /// Sessions opened but not yet committed or rolled back
    pub fn active(&self) -> usize {
        self.opened()
            .saturating_sub(self.committed() + self.rolled_back())
    }
}

/// Shared in-memory table
pub struct MemorySource<R> {
    rows: RwLock<Arc<Vec<R>>>,
    stats: Arc<SessionStats>,
}

impl<R> MemorySource<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::from_rows(Vec::new())
    }

    pub fn from_rows(rows: Vec<R>) -> Self {
        Self {
            rows: RwLock::new(Arc::new(rows)),
            stats: Arc::new(SessionStats::default()),
        }
    }

    pub async fn insert(&self, row: R) {
        let mut rows = self.rows.write().await;
        Arc::make_mut(&mut *rows).push(row);
    }

    /// Delete rows matching `predicate`, returning how many were removed
    pub async fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&R) -> bool,
    {
        let mut rows = self.rows.write().await;
        let table = Arc::make_mut(&mut *rows);
        let before = table.len();
        table.retain(|row| !predicate(row));
        before - table.len()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }
}

impl<R> Default for MemorySource<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R> DataSource for MemorySource<R>
where
    R: Clone + Send + Sync + 'static,
{
    type Session = MemorySession<R>;

    async fn open_session(&self) -> SourceResult<Self::Session> {
        let snapshot = Arc::clone(&*self.rows.read().await);
        self.stats.opened.fetch_add(1, Ordering::AcqRel);
        Ok(MemorySession {
            snapshot,
            stats: Arc::clone(&self.stats),
            matched: None,
        })
    }
}

/// Session over a snapshot of a [`MemorySource`]
pub struct MemorySession<R> {
    snapshot: Arc<Vec<R>>,
    stats: Arc<SessionStats>,
    matched: Option<(MemoryQuery<R>, Vec<usize>)>,
}

#[async_trait]
impl<R> Session for MemorySession<R>
where
    R: Clone + Send + Sync + 'static,
{
    type Query = MemoryQuery<R>;
    type Row = R;

    async fn fetch_page(
        &mut self,
        query: &Self::Query,
        window: PageWindow,
    ) -> SourceResult<Vec<R>> {
        let stale = !matches!(&self.matched, Some((cached, _)) if cached.same_as(query));
        if stale {
            self.matched = Some((query.clone(), query.positions(&self.snapshot)));
        }
        let positions = match &self.matched {
            Some((_, positions)) => positions.as_slice(),
            None => &[][..],
        };
        Ok(positions
            .iter()
            .skip(window.offset)
            .take(window.limit)
            .map(|&i| self.snapshot[i].clone())
            .collect())
    }

    async fn commit(self) -> SourceResult<()> {
        self.stats.committed.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn rollback(self) -> SourceResult<()> {
        self.stats.rolled_back.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
