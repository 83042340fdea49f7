use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use log::{info, trace};
use prettytable::Table;
use serde::{Deserialize, Serialize};

use crate::cardinality::Cardinality;
use crate::error::{OptResult, OptimizerError};
use crate::join_ordering::JoinGraphKey;

#[derive(Clone, Debug, Default)]
struct CacheEntry {
    cardinality: Option<Cardinality>,
    timeout: Option<Duration>,
    request_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedEntry {
    key: JoinGraphKey,
    cardinality: Option<Cardinality>,
    timeout: Option<Duration>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SerializedCache {
    entries: Vec<SerializedEntry>,
    hit_count: usize,
    miss_count: usize,
    distinct_hit_count: usize,
    distinct_miss_count: usize,
}

/// Cardinalities of normalized join graphs, optionally persisted as JSON.
///
/// Besides cardinalities, the cache remembers the longest time an execution based estimation of a graph
/// ran without finishing, so that it isn't retried with the same or a smaller budget.
#[derive(Debug, Default)]
pub struct CardinalityEstimationCache {
    entries: HashMap<JoinGraphKey, CacheEntry>,
    hit_count: usize,
    miss_count: usize,
    distinct_hit_count: usize,
    distinct_miss_count: usize,
}

impl CardinalityEstimationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a cache previously written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> OptResult<Self> {
        let path = path.as_ref();
        let serialized = read_serialized(path)?;
        let mut cache = Self {
            hit_count: serialized.hit_count,
            miss_count: serialized.miss_count,
            distinct_hit_count: serialized.distinct_hit_count,
            distinct_miss_count: serialized.distinct_miss_count,
            ..Self::default()
        };
        cache.merge(serialized.entries);
        info!("Loaded {} cardinalities from {:?}", cache.size(), path);
        Ok(cache)
    }

    /// Writes all entries and counters to `path`, entries sorted by key.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> OptResult<()> {
        let path = path.as_ref();
        let mut entries: Vec<SerializedEntry> = self
            .entries
            .iter()
            .filter(|(_, e)| e.cardinality.is_some() || e.timeout.is_some())
            .map(|(key, e)| SerializedEntry {
                key: key.clone(),
                cardinality: e.cardinality,
                timeout: e.timeout,
            })
            .collect();
        entries.sort_by(|l, r| l.key.cmp(&r.key));

        let serialized = SerializedCache {
            entries,
            hit_count: self.hit_count,
            miss_count: self.miss_count,
            distinct_hit_count: self.distinct_hit_count,
            distinct_miss_count: self.distinct_miss_count,
        };
        let json = serde_json::to_string_pretty(&serialized).map_err(|source| {
            OptimizerError::CacheFormat {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, json).map_err(|source| OptimizerError::CacheIo {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Merges the entries stored at `path` with the in-memory ones and writes the result back to
    /// `path`. In-memory entries win on conflicts.
    pub fn update<P: AsRef<Path>>(&mut self, path: P) -> OptResult<()> {
        let path = path.as_ref();
        let before = self.size();
        let serialized = read_serialized(path)?;
        self.merge(serialized.entries);
        self.save(path)?;
        info!(
            "Added {} cardinalities from {:?}, {} written back",
            self.size() - before,
            path,
            self.size()
        );
        Ok(())
    }

    fn merge(&mut self, entries: Vec<SerializedEntry>) {
        for serialized in entries {
            let entry = self.entries.entry(serialized.key).or_default();
            if entry.cardinality.is_none() {
                entry.cardinality = serialized.cardinality;
            }
            if entry.timeout.is_none() {
                entry.timeout = serialized.timeout;
            }
        }
    }

    /// Cached cardinality of `key`, counting the request as a hit or a miss.
    pub fn get(&mut self, key: &JoinGraphKey) -> Option<Cardinality> {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.request_count += 1;
        let first_request = entry.request_count == 1;

        match entry.cardinality {
            Some(cardinality) => {
                trace!("HIT {}: {}", key, cardinality);
                self.hit_count += 1;
                if first_request {
                    self.distinct_hit_count += 1;
                }
                Some(cardinality)
            }
            None => {
                trace!("MISS {}", key);
                self.miss_count += 1;
                if first_request {
                    self.distinct_miss_count += 1;
                }
                None
            }
        }
    }

    pub fn put(&mut self, key: JoinGraphKey, cardinality: Cardinality) {
        trace!("PUT {}: {}", key, cardinality);
        self.entries.entry(key).or_default().cardinality = Some(cardinality);
    }

    /// Remembers that estimating `key` didn't finish within `timeout`.
    pub fn set_timeout(&mut self, key: JoinGraphKey, timeout: Duration) {
        let entry = self.entries.entry(key).or_default();
        entry.timeout = Some(entry.timeout.map_or(timeout, |t| t.max(timeout)));
    }

    pub fn get_timeout(&self, key: &JoinGraphKey) -> Option<Duration> {
        self.entries.get(key).and_then(|e| e.timeout)
    }

    /// Drops all entries. Hit and miss totals are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.distinct_hit_count = 0;
        self.distinct_miss_count = 0;
    }

    /// Starts counting distinct requests anew, e.g. between the queries of a benchmark.
    pub fn reset_distinct_hit_miss_counts(&mut self) {
        self.distinct_hit_count = 0;
        self.distinct_miss_count = 0;
        for entry in self.entries.values_mut() {
            entry.request_count = 0;
        }
    }

    /// Number of cached cardinalities.
    pub fn size(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.cardinality.is_some())
            .count()
    }

    pub fn hit_count(&self) -> usize {
        self.hit_count
    }

    pub fn miss_count(&self) -> usize {
        self.miss_count
    }

    pub fn distinct_hit_count(&self) -> usize {
        self.distinct_hit_count
    }

    pub fn distinct_miss_count(&self) -> usize {
        self.distinct_miss_count
    }

    pub fn distinct_request_count(&self) -> usize {
        self.distinct_hit_count + self.distinct_miss_count
    }

    pub fn print(&self, out: &mut dyn Write) -> OptResult<()> {
        let mut table = Table::new();
        table.set_titles(row!["Join graph", "Cardinality", "Timeout"]);
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|l, r| l.0.cmp(r.0));
        for (key, entry) in entries {
            let cardinality = entry
                .cardinality
                .map_or_else(|| "-".to_string(), |c| c.to_string());
            let timeout = entry
                .timeout
                .map_or_else(|| "-".to_string(), |t| format!("{:?}", t));
            table.add_row(row![key.to_string(), cardinality, timeout]);
        }
        table.print(out)?;
        writeln!(
            out,
            "hits: {} ({} distinct), misses: {} ({} distinct)",
            self.hit_count, self.distinct_hit_count, self.miss_count, self.distinct_miss_count
        )?;
        Ok(())
    }
}

fn read_serialized(path: &Path) -> OptResult<SerializedCache> {
    let json = fs::read_to_string(path).map_err(|source| OptimizerError::CacheIo {
        path: path.to_path_buf(),
        source,
    })?;
    let serialized = serde_json::from_str(&json).map_err(|source| OptimizerError::CacheFormat {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serialized)
}
