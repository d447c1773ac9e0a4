use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::db::load_category_candidates;
use crate::error::{CatalogError, CommandResult};
use crate::runtime::AppHandle;
use crate::scoring::rank_categories;
use crate::search::{tokenize, MAX_QUERY_CHARS};
use crate::types::CategoryHit;
use crate::util::now_ms;

#[derive(Clone)]
struct CacheEntry {
    created_at_ms: i64,
    results: Vec<CategoryHit>,
}

pub(crate) struct QueryCache {
    ttl_ms: i64,
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, CacheEntry>,
    generation: u64,
}

impl QueryCache {
    pub(crate) fn new(ttl_ms: i64, capacity: usize) -> Self {
        Self {
            ttl_ms,
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
            generation: 0,
        }
    }

    fn enabled(&self) -> bool {
        self.ttl_ms > 0 && self.capacity > 0
    }

    fn get(&self, key: &str) -> Option<Vec<CategoryHit>> {
        let entry = self.entries.get(key)?;
        if now_ms() - entry.created_at_ms > self.ttl_ms {
            return None;
        }
        Some(entry.results.clone())
    }

    fn put(&mut self, key: String, results: Vec<CategoryHit>) {
        if !self.enabled() {
            return;
        }
        if self.entries.contains_key(&key) {
            self.order.retain(|item| item != &key);
        }
        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                created_at_ms: now_ms(),
                results,
            },
        );
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Bumped on every clear; results computed under an older generation may be stale.
    fn generation(&self) -> u64 {
        self.generation
    }

    fn put_if_current(&mut self, generation: u64, key: String, results: Vec<CategoryHit>) {
        if generation == self.generation {
            self.put(key, results);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(crate) fn clear_query_cache(app: &AppHandle) {
    if let Ok(mut cache) = app.query_cache().lock() {
        cache.clear();
    }
}

fn normalize_query(query: &str) -> String {
    query
        .trim()
        .chars()
        .take(MAX_QUERY_CHARS)
        .collect::<String>()
}

fn cache_key(query: &str, limit: Option<usize>) -> String {
    format!(
        "{}|{}",
        query.to_lowercase(),
        limit.map(|value| value.to_string()).unwrap_or_default()
    )
}

/// Ranked category search. Blank queries return an empty list.
pub(crate) fn search_categories(
    app: &AppHandle,
    query: &str,
    limit: Option<usize>,
) -> CommandResult<Vec<CategoryHit>> {
    let started = Instant::now();
    let capped_query = normalize_query(query);
    let tokens = tokenize(&capped_query);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let key = cache_key(&capped_query, limit);
    let generation = {
        let cache = app
            .query_cache()
            .lock()
            .map_err(|_| CatalogError::Poisoned("query cache"))?;
        if let Some(cached) = cache.get(&key) {
            return Ok(cached);
        }
        cache.generation()
    };

    let candidates = app.with_connection(|connection| load_category_candidates(connection))?;
    let candidate_count = candidates.len();
    let mut results = rank_categories(&capped_query, &tokens, candidates);
    if let Some(limit) = limit {
        results.truncate(limit.max(1));
    }

    app.query_cache()
        .lock()
        .map_err(|_| CatalogError::Poisoned("query cache"))?
        .put_if_current(generation, key, results.clone());

    let elapsed_ms = started.elapsed().as_millis();
    if elapsed_ms > u128::from(app.config().slow_query_ms) {
        tracing::warn!(
            elapsed_ms = elapsed_ms as u64,
            candidates = candidate_count,
            query = %tokens.join(" "),
            "Category search over budget"
        );
    } else {
        tracing::debug!(
            elapsed_ms = elapsed_ms as u64,
            candidates = candidate_count,
            hits = results.len(),
            "Category search"
        );
    }

    Ok(results)
}
