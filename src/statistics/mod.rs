use std::sync::atomic::{AtomicU64, Ordering};

/// Batch and iterator statistics
///
/// Thread-safe counters shared by a batch and every iterator created from
/// it. Uses atomic counters for lock-free updates.
#[derive(Debug, Default)]
pub struct Statistics {
    // Mutation log
    pub num_ops_appended: AtomicU64,
    pub num_range_ops_appended: AtomicU64,
    pub bytes_appended: AtomicU64,

    // Fragment cache
    pub num_fragment_extensions: AtomicU64,
    pub num_range_ops_folded: AtomicU64,
    pub num_views_resolved: AtomicU64,
    pub num_fragments_rebuilt: AtomicU64,

    // Iterators
    pub num_iterators_created: AtomicU64,
    pub num_iterator_clones: AtomicU64,
    pub num_iterator_refreshes: AtomicU64,
    pub num_base_snapshots: AtomicU64,

    // Point lookups
    pub num_batch_hits: AtomicU64,
    pub num_base_lookups: AtomicU64,

    // Error counts
    pub num_errors: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Statistics::default()
    }

    // Mutation log tracking
    #[inline]
    pub fn record_append(&self, bytes: u64, is_range_op: bool) {
        self.num_ops_appended.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended.fetch_add(bytes, Ordering::Relaxed);
        if is_range_op {
            self.num_range_ops_appended.fetch_add(1, Ordering::Relaxed);
        }
    }

    // Fragment cache tracking
    #[inline]
    pub fn record_fragment_extension(&self, range_ops_folded: u64) {
        self.num_fragment_extensions.fetch_add(1, Ordering::Relaxed);
        self.num_range_ops_folded
            .fetch_add(range_ops_folded, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_view_resolved(&self) {
        self.num_views_resolved.fetch_add(1, Ordering::Relaxed);
    }

    /// Fragments re-resolved while rebuilding the view at the watermark
    #[inline]
    pub fn record_fragments_rebuilt(&self, fragments: u64) {
        self.num_fragments_rebuilt
            .fetch_add(fragments, Ordering::Relaxed);
    }

    // Iterator tracking
    #[inline]
    pub fn record_iterator_created(&self) {
        self.num_iterators_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_iterator_clone(&self) {
        self.num_iterator_clones.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_iterator_refresh(&self) {
        self.num_iterator_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_base_snapshot(&self) {
        self.num_base_snapshots.fetch_add(1, Ordering::Relaxed);
    }

    // Point lookup tracking
    #[inline]
    pub fn record_batch_hit(&self) {
        self.num_batch_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_base_lookup(&self) {
        self.num_base_lookups.fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking
    #[inline]
    pub fn record_error(&self) {
        self.num_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Getters (snapshot values)
    pub fn ops_appended(&self) -> u64 {
        self.num_ops_appended.load(Ordering::Relaxed)
    }

    pub fn range_ops_appended(&self) -> u64 {
        self.num_range_ops_appended.load(Ordering::Relaxed)
    }

    pub fn bytes_appended(&self) -> u64 {
        self.bytes_appended.load(Ordering::Relaxed)
    }

    pub fn fragment_extensions(&self) -> u64 {
        self.num_fragment_extensions.load(Ordering::Relaxed)
    }

    pub fn range_ops_folded(&self) -> u64 {
        self.num_range_ops_folded.load(Ordering::Relaxed)
    }

    pub fn views_resolved(&self) -> u64 {
        self.num_views_resolved.load(Ordering::Relaxed)
    }

    pub fn fragments_rebuilt(&self) -> u64 {
        self.num_fragments_rebuilt.load(Ordering::Relaxed)
    }

    pub fn iterators_created(&self) -> u64 {
        self.num_iterators_created.load(Ordering::Relaxed)
    }

    pub fn iterator_clones(&self) -> u64 {
        self.num_iterator_clones.load(Ordering::Relaxed)
    }

    pub fn iterator_refreshes(&self) -> u64 {
        self.num_iterator_refreshes.load(Ordering::Relaxed)
    }

    pub fn base_snapshots(&self) -> u64 {
        self.num_base_snapshots.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.num_errors.load(Ordering::Relaxed)
    }

    pub fn batch_hit_rate(&self) -> f64 {
        let hits = self.num_batch_hits.load(Ordering::Relaxed) as f64;
        let total = hits + self.num_base_lookups.load(Ordering::Relaxed) as f64;
        if total > 0.0 { hits / total } else { 0.0 }
    }

    /// Range ops folded per cache extension
    pub fn avg_ops_per_extension(&self) -> f64 {
        let folded = self.range_ops_folded() as f64;
        let extensions = self.fragment_extensions() as f64;
        if extensions > 0.0 {
            folded / extensions
        } else {
            0.0
        }
    }

    /// Reset all statistics to zero
    pub fn reset(&self) {
        self.num_ops_appended.store(0, Ordering::Relaxed);
        self.num_range_ops_appended.store(0, Ordering::Relaxed);
        self.bytes_appended.store(0, Ordering::Relaxed);
        self.num_fragment_extensions.store(0, Ordering::Relaxed);
        self.num_range_ops_folded.store(0, Ordering::Relaxed);
        self.num_views_resolved.store(0, Ordering::Relaxed);
        self.num_fragments_rebuilt.store(0, Ordering::Relaxed);
        self.num_iterators_created.store(0, Ordering::Relaxed);
        self.num_iterator_clones.store(0, Ordering::Relaxed);
        self.num_iterator_refreshes.store(0, Ordering::Relaxed);
        self.num_base_snapshots.store(0, Ordering::Relaxed);
        self.num_batch_hits.store(0, Ordering::Relaxed);
        self.num_base_lookups.store(0, Ordering::Relaxed);
        self.num_errors.store(0, Ordering::Relaxed);
    }

    /// Get a formatted statistics report
    pub fn report(&self) -> String {
        format!(
            "Batch Statistics:\n\
            \n\
            Mutation log:\n\
            - Ops appended:    {}\n\
            - Range ops:       {}\n\
            - Bytes appended:  {} ({:.2} MB)\n\
            \n\
            Fragment cache:\n\
            - Extensions:      {}\n\
            - Range ops folded: {}\n\
            - Ops/extension:   {:.2}\n\
            - Views resolved:  {}\n\
            - Fragments rebuilt: {}\n\
            \n\
            Iterators:\n\
            - Created:         {}\n\
            - Clones:          {}\n\
            - Refreshes:       {}\n\
            - Base snapshots:  {}\n\
            \n\
            Lookups:\n\
            - Batch hit rate:  {:.2}%\n\
            \n\
            Errors:            {}",
            self.ops_appended(),
            self.range_ops_appended(),
            self.bytes_appended(),
            self.bytes_appended() as f64 / 1024.0 / 1024.0,
            self.fragment_extensions(),
            self.range_ops_folded(),
            self.avg_ops_per_extension(),
            self.views_resolved(),
            self.fragments_rebuilt(),
            self.iterators_created(),
            self.iterator_clones(),
            self.iterator_refreshes(),
            self.base_snapshots(),
            self.batch_hit_rate() * 100.0,
            self.errors(),
        )
    }
}
