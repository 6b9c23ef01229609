use serde::{Deserialize, Serialize};

/// Where NULL lands when ordering rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NullOrdering {
    /// NULL sorts above every other value: last for ASC, first for DESC
    #[default]
    NullsLargest,
    /// NULL sorts below every other value: first for ASC, last for DESC
    NullsSmallest,
    /// NULL always comes first regardless of direction
    NullsFirst,
    /// NULL always comes last regardless of direction
    NullsLast,
}

/// Configuration for execution pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Number of document positions fetched per `load_next_batch`
    pub batch_size: usize,

    /// Byte limit for the per-query accounting context
    pub memory_limit_bytes: usize,

    /// Default null placement for ORDER BY keys without an explicit policy
    pub null_ordering: NullOrdering,

    /// Segment size used by the index writer
    pub max_docs_per_segment: usize,

    /// Name given to worker threads that run pending batch loads
    pub loader_thread_name: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            memory_limit_bytes: 64 * 1024 * 1024, // 64 MB default
            null_ordering: NullOrdering::NullsLargest,
            max_docs_per_segment: 4096,
            loader_thread_name: "batch-loader".to_string(),
        }
    }
}

impl ExecutionConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_memory_limit(mut self, memory_limit_bytes: usize) -> Self {
        self.memory_limit_bytes = memory_limit_bytes;
        self
    }

    pub fn with_null_ordering(mut self, null_ordering: NullOrdering) -> Self {
        self.null_ordering = null_ordering;
        self
    }
}
