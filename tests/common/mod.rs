// Shared test doubles for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use rs2_paging::{DataSource, PageWindow, Session, SourceError, SourceResult};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters shared between a source, its sessions and the test
#[derive(Debug, Default)]
pub struct Probe {
    pub rows_fetched: AtomicU64,
    pub pages: AtomicUsize,
    pub committed: AtomicUsize,
    pub rolled_back: AtomicUsize,
    pub windows: Mutex<Vec<PageWindow>>,
}

impl Probe {
    pub fn rows_fetched(&self) -> u64 {
        self.rows_fetched.load(Ordering::SeqCst)
    }

    pub fn committed(&self) -> usize {
        self.committed.load(Ordering::SeqCst)
    }

    pub fn rolled_back(&self) -> usize {
        self.rolled_back.load(Ordering::SeqCst)
    }

    pub fn windows(&self) -> Vec<PageWindow> {
        self.windows.lock().unwrap().clone()
    }
}

/// Source of the rows `0..total`, generated on demand
#[derive(Clone)]
pub struct CountingSource {
    total: u64,
    fail_on_page: Option<usize>,
    panic_on_page: Option<usize>,
    fail_on_open: bool,
    fail_on_commit: bool,
    fetch_delay: Option<Duration>,
    pub probe: Arc<Probe>,
}

impl CountingSource {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            fail_on_page: None,
            panic_on_page: None,
            fail_on_open: false,
            fail_on_commit: false,
            fetch_delay: None,
            probe: Arc::new(Probe::default()),
        }
    }

    /// Rows without end; only a failure or cancellation stops the stream
    pub fn unbounded() -> Self {
        Self::new(u64::MAX)
    }

    /// Fail the `page`-th fetch (1-based)
    pub fn fail_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    /// Panic inside the `page`-th fetch (1-based)
    pub fn panic_on_page(mut self, page: usize) -> Self {
        self.panic_on_page = Some(page);
        self
    }

    pub fn fail_on_commit(mut self) -> Self {
        self.fail_on_commit = true;
        self
    }

    pub fn fail_on_open(mut self) -> Self {
        self.fail_on_open = true;
        self
    }

    pub fn fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }
}

#[async_trait]
impl DataSource for CountingSource {
    type Session = CountingSession;

    async fn open_session(&self) -> SourceResult<CountingSession> {
        if self.fail_on_open {
            return Err(SourceError::Connection("connection refused".to_string()));
        }
        Ok(CountingSession {
            source: self.clone(),
        })
    }
}

pub struct CountingSession {
    source: CountingSource,
}

#[async_trait]
impl Session for CountingSession {
    type Query = ();
    type Row = u64;

    async fn fetch_page(&mut self, _query: &(), window: PageWindow) -> SourceResult<Vec<u64>> {
        let probe = &self.source.probe;
        let page = probe.pages.fetch_add(1, Ordering::SeqCst) + 1;
        probe.windows.lock().unwrap().push(window);

        if let Some(delay) = self.source.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.source.panic_on_page == Some(page) {
            panic!("driver crashed on page {}", page);
        }
        if self.source.fail_on_page == Some(page) {
            return Err(SourceError::Execution(format!("page {} failed", page)));
        }

        let start = (window.offset as u64).min(self.source.total);
        let end = start.saturating_add(window.limit as u64).min(self.source.total);
        probe.rows_fetched.fetch_add(end - start, Ordering::SeqCst);
        Ok((start..end).collect())
    }

    async fn commit(self) -> SourceResult<()> {
        if self.source.fail_on_commit {
            return Err(SourceError::Transaction("commit rejected".to_string()));
        }
        self.source.probe.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> SourceResult<()> {
        self.source.probe.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Source that returns pages of the scripted sizes, then empty pages
#[derive(Clone)]
pub struct ScriptedPages {
    sizes: Arc<Vec<usize>>,
    pub probe: Arc<Probe>,
}

impl ScriptedPages {
    pub fn new(sizes: Vec<usize>) -> Self {
        Self {
            sizes: Arc::new(sizes),
            probe: Arc::new(Probe::default()),
        }
    }
}

#[async_trait]
impl DataSource for ScriptedPages {
    type Session = ScriptedSession;

    async fn open_session(&self) -> SourceResult<ScriptedSession> {
        Ok(ScriptedSession {
            source: self.clone(),
            next: 0,
        })
    }
}

pub struct ScriptedSession {
    source: ScriptedPages,
    next: usize,
}

#[async_trait]
impl Session for ScriptedSession {
    type Query = ();
    type Row = usize;

    async fn fetch_page(&mut self, _query: &(), window: PageWindow) -> SourceResult<Vec<usize>> {
        self.source.probe.windows.lock().unwrap().push(window);
        let size = self.source.sizes.get(self.next).copied().unwrap_or(0);
        self.next += 1;
        Ok((window.offset..window.offset + size).collect())
    }

    async fn commit(self) -> SourceResult<()> {
        self.source.probe.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> SourceResult<()> {
        self.source.probe.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
