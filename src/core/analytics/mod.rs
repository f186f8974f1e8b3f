//! Batch aggregation and analytics
//!
//! Recomputes batch metrics, histograms and recommendations on demand from a
//! finished (or partially finished) batch. See [`aggregator::analyze`].

pub mod aggregator;

pub use aggregator::{
    analyze, BatchAnalytics, QualityStats, Recommendation, StageAnalytics, SubstageAnalytics,
};
