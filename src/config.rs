//! Configuration for paged streams

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Rows fetched per page when nothing else is configured
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Page size and queue sizing for [`stream_paged_query`](crate::paged::stream_paged_query).
///
/// At most `page_size + queue_capacity` fetched rows are held in memory by
/// one stream at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Rows requested per page (the `LIMIT` of each fetch)
    pub page_size: usize,
    /// Values queued between producer and consumer; defaults to the page size
    pub queue_capacity: Option<usize>,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            queue_capacity: None,
        }
    }
}

impl PagingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Effective queue capacity
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.page_size)
    }

    /// Upper bound on rows held in memory by one stream
    pub fn max_in_flight(&self) -> usize {
        self.page_size + self.effective_queue_capacity()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}
