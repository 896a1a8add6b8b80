use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::loader::load_file;
use super::model::Table;
use crate::config::DashboardConfig;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Data sources
// ---------------------------------------------------------------------------

/// Anything that can turn query text into a result table.
pub trait DataSource {
    fn fetch(&self, query: &str) -> Result<Table>;
}

/// Treats the query text as a path to an exported result file under `root`.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DataSource for FileSource {
    fn fetch(&self, query: &str) -> Result<Table> {
        load_file(&self.root.join(query))
    }
}

// ---------------------------------------------------------------------------
// Read-through cache
// ---------------------------------------------------------------------------

struct CacheEntry {
    fetched_at: Instant,
    table: Arc<Table>,
}

/// Time-boxed read-through cache keyed by query text.
///
/// Source data is append-only, so entries are only ever replaced after they
/// go stale. Failed fetches are not cached.
pub struct QueryCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Return the cached table for `query` if it is younger than the TTL at
    /// `now`, otherwise fetch it from `source` and remember it.
    pub fn get_or_fetch(
        &mut self,
        source: &dyn DataSource,
        query: &str,
        now: Instant,
    ) -> Result<Arc<Table>> {
        if let Some(entry) = self.entries.get(query) {
            if now.saturating_duration_since(entry.fetched_at) < self.ttl {
                log::debug!("cache hit for '{query}'");
                return Ok(Arc::clone(&entry.table));
            }
            log::debug!("cache entry for '{query}' is stale");
        }

        let table = Arc::new(source.fetch(query)?);
        self.entries.insert(
            query.to_string(),
            CacheEntry {
                fetched_at: now,
                table: Arc::clone(&table),
            },
        );
        Ok(table)
    }

    /// Drop the entry for `query` so the next read refetches it.
    pub fn evict(&mut self, query: &str) {
        self.entries.remove(query);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a page needs to obtain data: configuration, the data source
/// and the shared cache. Built once at startup and passed down explicitly.
pub struct DashboardContext {
    pub config: DashboardConfig,
    source: Box<dyn DataSource>,
    cache: QueryCache,
}

impl DashboardContext {
    pub fn new(config: DashboardConfig, source: Box<dyn DataSource>) -> Self {
        let cache = QueryCache::new(config.cache_ttl());
        Self {
            config,
            source,
            cache,
        }
    }

    /// Context reading exported files from `config.data_root`.
    pub fn from_config(config: DashboardConfig) -> Self {
        let source = FileSource::new(config.data_root.clone());
        Self::new(config, Box::new(source))
    }

    /// Run `query` through the cache.
    pub fn run_query(&mut self, query: &str) -> Result<Arc<Table>> {
        self.cache
            .get_or_fetch(self.source.as_ref(), query, Instant::now())
    }

    /// Force the next [`run_query`](Self::run_query) for `query` to refetch.
    pub fn refresh(&mut self, query: &str) {
        self.cache.evict(query);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::Cell;

    use super::*;

    /// Serves a fixed table and counts fetches.
    pub struct StaticSource {
        pub table: Table,
        pub fetches: Cell<usize>,
    }

    impl StaticSource {
        pub fn new(table: Table) -> Self {
            Self {
                table,
                fetches: Cell::new(0),
            }
        }
    }

    impl DataSource for StaticSource {
        fn fetch(&self, _query: &str) -> Result<Table> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(self.table.clone())
        }
    }
}
