//! Plan cache (SPEC_FULL.md §4.4 "Plan cache"), grounded on
//! `zvec_cached_sql_parser.h`'s cache-key/vector-graft split and chroma's
//! `parking_lot::RwLock`-guarded shared mutable state convention.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::RwLock;
use tracing::debug;
use zvec_types::SelectInfo;

use crate::error::QueryError;
use crate::parser::Parser;

const VECTOR_PLACEHOLDER_TOKEN: &str = "\u{0}__ZVEC_VECTOR__\u{0}";
pub const DEFAULT_CAPACITY: usize = 100;

/// Replaces the first top-level bracketed literal (`[...]`, which may
/// itself nest brackets for a matrix) with a placeholder token, returning
/// the normalized key and the raw literal text that was cut out.
fn normalize_query(query: &str) -> (String, Option<String>) {
    match find_bracket_span(query) {
        Some((start, end)) => {
            let mut normalized = String::with_capacity(query.len());
            normalized.push_str(&query[..start]);
            normalized.push_str(VECTOR_PLACEHOLDER_TOKEN);
            normalized.push_str(&query[end..]);
            (normalized, Some(query[start..end].to_string()))
        }
        None => (query.to_string(), None),
    }
}

fn find_bracket_span(query: &str) -> Option<(usize, usize)> {
    let start = query.find('[')?;
    let mut depth = 0i32;
    for (i, c) in query.char_indices().skip_while(|&(i, _)| i < start) {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, i + c.len_utf8()));
                }
            }
            _ => {}
        }
    }
    None
}

/// Bounded LRU cache from normalized query text to a parsed [`SelectInfo`]
/// whose vector/matrix literal has been replaced by a
/// [`zvec_types::FilterNode::VectorPlaceholder`].
pub struct PlanCache {
    inner: RwLock<LruCache<String, SelectInfo>>,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap());
        Self {
            inner: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Parses `query`, consulting (and populating) the cache. On a hit,
    /// the cached plan is deep-cloned and the freshly-extracted vector
    /// literal is grafted into the placeholder position.
    pub fn get_or_parse(&self, query: &str) -> Result<SelectInfo, QueryError> {
        let (key, vector_text) = normalize_query(query);

        if let Some(mut plan) = self.inner.write().get(&key).cloned() {
            if let Some(text) = vector_text {
                let literal = Parser::parse_literal_str(&text)?;
                if let Some(cond) = plan.search_cond.as_mut() {
                    cond.graft_vector(literal);
                }
            }
            debug!(%key, "plan cache hit");
            return Ok(plan);
        }

        let plan = Parser::parse(query)?;
        let mut cached = plan.clone();
        if let Some(cond) = cached.search_cond.as_mut() {
            cond.placeholderize();
        }
        let evicted = self.inner.write().put(key.clone(), cached);
        debug!(%key, evicted = evicted.is_some(), "plan cache miss, inserted");
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zvec_types::{FilterNode, Literal};

    #[test]
    fn cache_hit_grafts_fresh_vector() {
        let cache = PlanCache::new(10);
        let q1 = "select * from docs where embedding = [1.0, 2.0]";
        let q2 = "select * from docs where embedding = [3.0, 4.0]";

        let plan1 = cache.get_or_parse(q1).unwrap();
        assert_eq!(cache.len(), 1);
        let plan2 = cache.get_or_parse(q2).unwrap();
        assert_eq!(cache.len(), 1, "same normalized key should hit, not insert again");

        match (plan1.search_cond, plan2.search_cond) {
            (Some(FilterNode::Rel { rhs: Some(r1), .. }), Some(FilterNode::Rel { rhs: Some(r2), .. })) => {
                assert_eq!(*r1, FilterNode::Const(Literal::Vector(vec![1.0, 2.0])));
                assert_eq!(*r2, FilterNode::Const(Literal::Vector(vec![3.0, 4.0])));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn distinct_queries_are_distinct_cache_entries() {
        let cache = PlanCache::new(10);
        cache.get_or_parse("select * from a where x = 1").unwrap();
        cache.get_or_parse("select * from b where x = 1").unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn bounded_capacity_evicts_lru() {
        let cache = PlanCache::new(1);
        cache.get_or_parse("select * from a").unwrap();
        cache.get_or_parse("select * from b").unwrap();
        assert_eq!(cache.len(), 1);
    }
}
