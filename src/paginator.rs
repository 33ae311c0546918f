//! Offset/limit cursor that walks a query result page by page

/// The limit/offset window applied to the next page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: usize,
    pub offset: usize,
}

/// Cursor state for one paged stream.
///
/// Owned by the producer task of a single stream. Paging ends the first time
/// a fetch comes back empty; there is no row-count query up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
    offset: usize,
    exhausted: bool,
}

impl Paginator {
    /// A cursor at offset 0. A `page_size` of 0 is treated as 1.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            offset: 0,
            exhausted: false,
        }
    }

    /// Window for the next fetch. Pure: performs no I/O.
    pub fn scope(&self) -> PageWindow {
        PageWindow {
            limit: self.page_size,
            offset: self.offset,
        }
    }

    /// Record how many rows the last fetch returned.
    ///
    /// Must be called exactly once per fetch, by the task that issued it.
    pub fn record_page_result(&mut self, rows_returned: usize) {
        if rows_returned == 0 {
            self.exhausted = true;
        } else {
            self.offset += rows_returned;
        }
    }

    pub fn has_next(&self) -> bool {
        !self.exhausted
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn limit(&self) -> usize {
        self.page_size
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}
