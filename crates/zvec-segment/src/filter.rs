//! Row-level filtering (SPEC_FULL.md §4.4 "IndexFilter", §6.3).
//!
//! `IndexFilter::is_filtered` returns `true` when a row is *excluded* —
//! the opposite polarity from [`crate::writer::ForwardWriter`]'s "keep"
//! mask (DESIGN.md, Open Question). Both live in this crate so the
//! asymmetry is visible at a glance rather than hidden behind a shared
//! name.

use roaring::RoaringTreemap;

/// A predicate over row ids, used by the planner to prune rows before a
/// kernel runs (`check_not_filtered`, see [`crate::kernels`]).
pub trait IndexFilter: Send + Sync {
    /// `true` if `row_id` must be excluded from the result set.
    fn is_filtered(&self, row_id: u64) -> bool;
}

/// Adapts any `Fn(u64) -> bool` into an [`IndexFilter`], for filters
/// derived ad hoc from a lowered [`zvec_types::filter::FilterNode`]
/// rather than backed by a persistent structure.
pub struct EasyIndexFilter<F>(F)
where
    F: Fn(u64) -> bool + Send + Sync;

impl<F> EasyIndexFilter<F>
where
    F: Fn(u64) -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> IndexFilter for EasyIndexFilter<F>
where
    F: Fn(u64) -> bool + Send + Sync,
{
    fn is_filtered(&self, row_id: u64) -> bool {
        (self.0)(row_id)
    }
}

/// An [`IndexFilter`] backed by a 64-bit roaring bitmap, used when a
/// filter's excluded-row set is cheaper to materialize once (e.g. a
/// tombstone set) than to re-evaluate per row.
pub struct BitmapIndexFilter {
    excluded: RoaringTreemap,
}

impl BitmapIndexFilter {
    pub fn from_excluded(excluded: RoaringTreemap) -> Self {
        Self { excluded }
    }

    pub fn empty() -> Self {
        Self {
            excluded: RoaringTreemap::new(),
        }
    }

    pub fn exclude(&mut self, row_id: u64) {
        self.excluded.insert(row_id);
    }
}

impl IndexFilter for BitmapIndexFilter {
    fn is_filtered(&self, row_id: u64) -> bool {
        self.excluded.contains(row_id)
    }
}

/// The filter that excludes nothing — the default when a query carries no
/// `WHERE` clause.
pub struct NoopIndexFilter;

impl IndexFilter for NoopIndexFilter {
    fn is_filtered(&self, _row_id: u64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_filter_keeps_everything() {
        let f = NoopIndexFilter;
        assert!(!f.is_filtered(0));
        assert!(!f.is_filtered(u64::MAX));
    }

    #[test]
    fn bitmap_filter_excludes_inserted_rows() {
        let mut f = BitmapIndexFilter::empty();
        f.exclude(7);
        f.exclude(1_000_000_000_000);
        assert!(f.is_filtered(7));
        assert!(f.is_filtered(1_000_000_000_000));
        assert!(!f.is_filtered(8));
    }

    #[test]
    fn easy_filter_delegates_to_closure() {
        let f = EasyIndexFilter::new(|row_id| row_id % 2 == 0);
        assert!(f.is_filtered(4));
        assert!(!f.is_filtered(5));
    }
}
